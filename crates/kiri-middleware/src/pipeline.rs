//! Middleware composition.
//!
//! A [`Pipeline`] folds an ordered list of middlewares around a handler,
//! innermost first, so that the first middleware in the list runs first:
//!
//! ```text
//! [m1, m2, m3] + h   =>   m1 ( m2 ( m3 ( h ) ) )
//! ```
//!
//! Composition is a pure function of the list and the handler. Dispatch
//! builds one pipeline per request from the global middlewares followed by
//! the route's own chain.

use crate::handler::BoxedHandler;
use crate::middleware::{BoxedMiddleware, Next};
use kiri_core::{HandlerResult, Request};

/// An ordered middleware chain ending in a handler.
#[derive(Clone)]
pub struct Pipeline {
    middlewares: Vec<BoxedMiddleware>,
    handler: BoxedHandler,
}

impl Pipeline {
    /// Composes `middlewares` (outermost first) around `handler`.
    #[must_use]
    pub fn new(middlewares: Vec<BoxedMiddleware>, handler: BoxedHandler) -> Self {
        Self {
            middlewares,
            handler,
        }
    }

    /// Runs a request through the chain.
    pub async fn run(&self, request: Request) -> HandlerResult {
        self.build_chain().run(request).await
    }

    fn build_chain(&self) -> Next<'_> {
        self.middlewares
            .iter()
            .rev()
            .fold(Next::handler(self.handler.as_ref()), |next, middleware| {
                Next::new(middleware.as_ref(), next)
            })
    }

    /// Returns the middleware names in execution order.
    #[must_use]
    pub fn stage_names(&self) -> Vec<&'static str> {
        self.middlewares.iter().map(|mw| mw.name()).collect()
    }

    /// Returns the number of middlewares.
    #[must_use]
    pub fn len(&self) -> usize {
        self.middlewares.len()
    }

    /// Returns true if the handler runs without any middleware.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.middlewares.is_empty()
    }
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("stages", &self.stage_names())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handler::BoxFuture;
    use crate::middleware::{FnMiddleware, Middleware};
    use kiri_core::{CancellationToken, HandlerError, HttpError, HttpMethod, Response};
    use std::sync::{Arc, Mutex};

    type Trace = Arc<Mutex<Vec<&'static str>>>;

    /// Records its name on the way in and on the way out.
    struct OrderTrackingMiddleware {
        name: &'static str,
        trace: Trace,
    }

    impl Middleware for OrderTrackingMiddleware {
        fn name(&self) -> &'static str {
            self.name
        }

        fn handle<'a>(&'a self, request: Request, next: Next<'a>) -> BoxFuture<'a, HandlerResult> {
            Box::pin(async move {
                self.trace.lock().unwrap().push(self.name);
                let result = next.run(request).await;
                self.trace.lock().unwrap().push(self.name);
                result
            })
        }
    }

    fn tracker(name: &'static str, trace: &Trace) -> BoxedMiddleware {
        Arc::new(OrderTrackingMiddleware {
            name,
            trace: trace.clone(),
        })
    }

    fn tracking_handler(trace: &Trace) -> BoxedHandler {
        let trace = trace.clone();
        Arc::new(move |_req: Request| {
            let trace = trace.clone();
            async move {
                trace.lock().unwrap().push("H");
                Ok(Response::ok("done"))
            }
        })
    }

    fn request() -> Request {
        Request::new(HttpMethod::Get, "/", "", CancellationToken::never())
    }

    #[tokio::test]
    async fn test_pipeline_executes_in_order() {
        let trace: Trace = Arc::default();
        let pipeline = Pipeline::new(
            vec![
                tracker("A", &trace),
                tracker("B", &trace),
                tracker("C", &trace),
                tracker("D", &trace),
            ],
            tracking_handler(&trace),
        );

        let response = pipeline.run(request()).await.unwrap();

        assert_eq!(response.text(), Some("done"));
        assert_eq!(
            *trace.lock().unwrap(),
            vec!["A", "B", "C", "D", "H", "D", "C", "B", "A"]
        );
        assert_eq!(pipeline.stage_names(), vec!["A", "B", "C", "D"]);
        assert_eq!(pipeline.len(), 4);
    }

    #[tokio::test]
    async fn test_empty_pipeline() {
        let trace: Trace = Arc::default();
        let pipeline = Pipeline::new(Vec::new(), tracking_handler(&trace));

        assert!(pipeline.is_empty());
        let response = pipeline.run(request()).await.unwrap();
        assert_eq!(response.status(), 200);
        assert_eq!(*trace.lock().unwrap(), vec!["H"]);
    }

    #[tokio::test]
    async fn test_short_circuit_skips_rest_of_chain() {
        let trace: Trace = Arc::default();
        let deny: BoxedMiddleware = Arc::new(FnMiddleware::new("deny", |_req, _next| {
            Box::pin(async { Err(HttpError::new(403, "forbidden").into()) })
        }));
        let pipeline = Pipeline::new(
            vec![tracker("A", &trace), deny, tracker("B", &trace)],
            tracking_handler(&trace),
        );

        let err = pipeline.run(request()).await.unwrap_err();

        assert_eq!(err.into_response().status(), 403);
        assert_eq!(*trace.lock().unwrap(), vec!["A", "A"]);
    }

    #[tokio::test]
    async fn test_outer_middleware_sees_inner_errors() {
        let recover: BoxedMiddleware = Arc::new(FnMiddleware::new("recover", |req, next| {
            Box::pin(async move {
                next.run(req)
                    .await
                    .or_else(|err| Ok(Response::new(299, err.to_string())))
            })
        }));
        let failing: BoxedHandler =
            Arc::new(|_req: Request| async { Err(HandlerError::msg("deep failure")) });

        let response = Pipeline::new(vec![recover], failing)
            .run(request())
            .await
            .unwrap();

        assert_eq!(response.status(), 299);
        assert_eq!(response.text(), Some("deep failure"));
    }

    #[tokio::test]
    async fn test_pipeline_is_reusable() {
        let trace: Trace = Arc::default();
        let pipeline = Pipeline::new(vec![tracker("A", &trace)], tracking_handler(&trace));

        pipeline.run(request()).await.unwrap();
        pipeline.run(request()).await.unwrap();

        assert_eq!(trace.lock().unwrap().len(), 6);
    }
}
