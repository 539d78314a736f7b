//! Exactly-once completion of a request.

use crate::cancellation::CancellationHandle;
use crate::engine::{Engine, ForeignPtr};
use kiri_core::frame::MAX_BODY_LEN;
use kiri_core::{FrameCodec, Response};
use parking_lot::Mutex;
use std::fmt;
use std::sync::Arc;

/// What [`CompletionToken::complete`] did with the context.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Completion {
    /// A response frame was delivered.
    Sent,
    /// The request was cancelled; the context was freed without a response.
    Released,
    /// The context had already been consumed.
    AlreadyConsumed,
}

/// Holds the completion context of one request.
///
/// The context is taken under a lock, so no matter how many times or from
/// how many threads `complete` runs, the engine sees exactly one terminal
/// call. Dropping an unconsumed token frees the context.
pub struct CompletionToken<E: Engine> {
    engine: Arc<E>,
    codec: FrameCodec,
    context: Mutex<Option<ForeignPtr>>,
}

impl<E: Engine> CompletionToken<E> {
    /// Takes ownership of a completion context.
    pub fn new(engine: Arc<E>, codec: FrameCodec, context: Option<ForeignPtr>) -> Self {
        Self {
            engine,
            codec,
            context: Mutex::new(context),
        }
    }

    /// Sends `response`, or frees the context if the request was cancelled.
    ///
    /// Bodies too large for a response frame are replaced by a `500`.
    pub fn complete(&self, response: Response, cancellation: &CancellationHandle<E>) -> Completion {
        let Some(context) = self.take() else {
            return Completion::AlreadyConsumed;
        };

        if cancellation.is_cancelled() {
            self.engine.request_free(context);
            return Completion::Released;
        }

        let response = if response.body().len() > MAX_BODY_LEN {
            tracing::warn!(
                body_len = response.body().len(),
                "response body exceeds frame limit"
            );
            Response::internal_server_error("response body too large")
        } else {
            response
        };

        let frame = self.codec.encode_response(&response);
        self.engine.request_complete(context, &frame);
        Completion::Sent
    }

    /// Returns true once the context has been consumed.
    pub fn is_consumed(&self) -> bool {
        self.context.lock().is_none()
    }

    fn take(&self) -> Option<ForeignPtr> {
        self.context.lock().take()
    }
}

impl<E: Engine> Drop for CompletionToken<E> {
    fn drop(&mut self) {
        if let Some(context) = self.context.get_mut().take() {
            tracing::debug!("completion token dropped before completing");
            self.engine.request_free(context);
        }
    }
}

impl<E: Engine> fmt::Debug for CompletionToken<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompletionToken")
            .field("consumed", &self.is_consumed())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{Event, RecordingEngine};

    fn setup() -> (Arc<RecordingEngine>, crate::testing::Ctx, crate::testing::Ctx) {
        let engine = RecordingEngine::new();
        let completion = engine.new_context();
        let cancellation = engine.new_context();
        (engine, completion, cancellation)
    }

    #[test]
    fn test_complete_sends_frame_once() {
        let (engine, ctx, cctx) = setup();
        let token = CompletionToken::new(engine.clone(), FrameCodec::new(), Some(ctx.ptr()));
        let cancellation = CancellationHandle::new(engine.clone(), Some(cctx.ptr()));

        assert_eq!(token.complete(Response::ok("hi"), &cancellation), Completion::Sent);
        assert!(token.is_consumed());
        assert_eq!(
            token.complete(Response::ok("again"), &cancellation),
            Completion::AlreadyConsumed
        );
        drop(token);

        let expected = FrameCodec::new().encode_response(&Response::ok("hi"));
        assert_eq!(engine.events(), vec![Event::Completed(ctx, expected)]);
    }

    #[test]
    fn test_cancelled_request_is_released() {
        let (engine, ctx, cctx) = setup();
        let token = CompletionToken::new(engine.clone(), FrameCodec::new(), Some(ctx.ptr()));
        let cancellation = CancellationHandle::new(engine.clone(), Some(cctx.ptr()));
        engine.cancel(cctx);

        assert_eq!(token.complete(Response::ok("late"), &cancellation), Completion::Released);
        assert_eq!(engine.events(), vec![Event::RequestFreed(ctx)]);
    }

    #[test]
    fn test_missing_cancellation_context_releases() {
        let (engine, ctx, _) = setup();
        let token = CompletionToken::new(engine.clone(), FrameCodec::new(), Some(ctx.ptr()));
        let cancellation = CancellationHandle::new(engine.clone(), None);

        assert_eq!(token.complete(Response::ok("x"), &cancellation), Completion::Released);
    }

    #[test]
    fn test_drop_frees_unconsumed_context() {
        let (engine, ctx, _) = setup();
        let token = CompletionToken::new(engine.clone(), FrameCodec::new(), Some(ctx.ptr()));
        drop(token);
        assert_eq!(engine.events(), vec![Event::RequestFreed(ctx)]);
    }

    #[test]
    fn test_null_context_is_consumed_from_the_start() {
        let (engine, _, cctx) = setup();
        let token = CompletionToken::new(engine.clone(), FrameCodec::new(), None);
        let cancellation = CancellationHandle::new(engine.clone(), Some(cctx.ptr()));

        assert!(token.is_consumed());
        assert_eq!(
            token.complete(Response::ok("x"), &cancellation),
            Completion::AlreadyConsumed
        );
        drop(token);
        drop(cancellation);
        assert_eq!(engine.events(), vec![Event::CancellationFreed(cctx)]);
    }

    #[test]
    fn test_concurrent_completion_sends_once() {
        let (engine, ctx, cctx) = setup();
        let token = Arc::new(CompletionToken::new(
            engine.clone(),
            FrameCodec::new(),
            Some(ctx.ptr()),
        ));
        let cancellation = Arc::new(CancellationHandle::new(engine.clone(), Some(cctx.ptr())));

        let threads: Vec<_> = (0..8)
            .map(|i| {
                let token = token.clone();
                let cancellation = cancellation.clone();
                std::thread::spawn(move || {
                    token.complete(Response::ok(format!("thread {i}")), &cancellation)
                })
            })
            .collect();

        let sent = threads
            .into_iter()
            .map(|t| t.join().unwrap())
            .filter(|c| *c == Completion::Sent)
            .count();

        assert_eq!(sent, 1);
        assert_eq!(engine.completions(ctx), 1);
    }
}
