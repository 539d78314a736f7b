//! Route registration and the start lifecycle.
//!
//! A [`Router`] owns the engine's route table and a [`RouteRegistry`]. It
//! moves through three phases:
//!
//! ```text
//! Building ──begin_start──▶ Starting ──commit_start──▶ Started
//!     ▲                        │
//!     └──────rollback_start────┘
//! ```
//!
//! Registration is only legal while `Building`. Calling any operation in the
//! wrong phase is a programming error and panics.

use crate::engine::{Engine, ForeignPtr};
use crate::error::FfiError;
use crate::registry::{RouteId, RouteRegistry};
use kiri_core::path::join;
use kiri_core::HttpMethod;
use kiri_middleware::{BoxedMiddleware, Handler};
use parking_lot::Mutex;
use std::fmt;
use std::sync::Arc;

/// Lifecycle phase of a [`Router`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Routes and middlewares may be registered.
    Building,
    /// A server start is in progress.
    Starting,
    /// The route table is frozen.
    Started,
}

/// The engine's route table plus the handlers behind each route.
pub struct Router<E: Engine> {
    engine: Arc<E>,
    handle: Option<ForeignPtr>,
    phase: Mutex<Phase>,
    registry: Arc<RouteRegistry>,
}

impl<E: Engine> Router<E> {
    /// Allocates an empty route table on `engine`.
    pub fn new(engine: Arc<E>) -> Result<Self, FfiError> {
        let handle = engine.router_create().ok_or(FfiError::RouterCreate)?;
        Ok(Self {
            engine,
            handle: Some(handle),
            phase: Mutex::new(Phase::Building),
            registry: Arc::new(RouteRegistry::new()),
        })
    }

    /// Adds a middleware that runs before every route's own chain.
    pub fn use_middleware(&self, middleware: BoxedMiddleware) -> &Self {
        let phase = self.phase.lock();
        assert_building(*phase, "use_middleware");
        self.registry.add_global(middleware);
        self
    }

    /// Registers `handler` for `method` and `path`, behind `middlewares`.
    ///
    /// # Panics
    ///
    /// Panics outside the `Building` phase, or if the engine rejects the
    /// pattern.
    pub fn route<H: Handler>(
        &self,
        method: HttpMethod,
        path: &str,
        middlewares: Vec<BoxedMiddleware>,
        handler: H,
    ) -> RouteId {
        let phase = self.phase.lock();
        assert_building(*phase, "route");

        let pattern = join("", path);
        let table = self.native_table();
        let route_id = self
            .registry
            .register_with(Arc::new(handler), middlewares, |route_id| {
                let rc = self
                    .engine
                    .register_route(table, method, pattern.as_bytes(), route_id);
                assert!(
                    rc == 0,
                    "engine rejected route {method} {pattern} (code {rc})"
                );
            });

        tracing::debug!(route_id, http.method = %method, http.path = %pattern, "route registered");
        route_id
    }

    /// Registers a `GET` route.
    pub fn get<H: Handler>(&self, path: &str, handler: H) -> RouteId {
        self.route(HttpMethod::Get, path, Vec::new(), handler)
    }

    /// Registers a `GET` route behind route-specific middlewares.
    pub fn get_with<H: Handler>(
        &self,
        path: &str,
        middlewares: Vec<BoxedMiddleware>,
        handler: H,
    ) -> RouteId {
        self.route(HttpMethod::Get, path, middlewares, handler)
    }

    /// Registers routes under `prefix`, each behind `middlewares`.
    pub fn group<F>(&self, prefix: &str, middlewares: Vec<BoxedMiddleware>, configure: F) -> &Self
    where
        F: FnOnce(&RouteGroup<'_, E>),
    {
        assert_building(self.phase(), "group");
        configure(&RouteGroup {
            router: self,
            base: join("", prefix),
            middlewares,
        });
        self
    }

    /// Building → Starting.
    pub fn begin_start(&self) {
        self.transition(Phase::Building, Phase::Starting, "begin_start");
    }

    /// Starting → Started. Seals the registry.
    pub fn commit_start(&self) {
        self.transition(Phase::Starting, Phase::Started, "commit_start");
        self.registry.seal();
    }

    /// Starting → Building, after a failed start.
    pub fn rollback_start(&self) {
        self.transition(Phase::Starting, Phase::Building, "rollback_start");
    }

    fn transition(&self, from: Phase, to: Phase, operation: &str) {
        let mut phase = self.phase.lock();
        assert!(
            *phase == from,
            "{operation} requires phase {from:?}, router is {:?}",
            *phase
        );
        *phase = to;
    }

    /// Returns the current phase.
    pub fn phase(&self) -> Phase {
        *self.phase.lock()
    }

    /// Returns the number of registered routes.
    pub fn route_count(&self) -> usize {
        self.registry.len()
    }

    /// Returns the registry dispatch reads from.
    ///
    /// Outside this crate the registry is read-only.
    pub fn registry(&self) -> &Arc<RouteRegistry> {
        &self.registry
    }

    /// Returns the engine this router was created on.
    pub fn engine(&self) -> &Arc<E> {
        &self.engine
    }

    /// Returns the engine's route table handle.
    pub fn native_handle(&self) -> Option<&ForeignPtr> {
        self.handle.as_ref()
    }

    fn native_table(&self) -> &ForeignPtr {
        match &self.handle {
            Some(handle) => handle,
            None => unreachable!("route table is only released on drop"),
        }
    }
}

impl<E: Engine> Drop for Router<E> {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            self.engine.router_free(handle);
        }
    }
}

impl<E: Engine> fmt::Debug for Router<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Router")
            .field("phase", &self.phase())
            .field("routes", &self.route_count())
            .finish_non_exhaustive()
    }
}

fn assert_building(phase: Phase, operation: &str) {
    assert!(
        phase == Phase::Building,
        "{operation} is only allowed while building, router is {phase:?}"
    );
}

/// Routes registered under a shared prefix and middleware chain.
///
/// Created by [`Router::group`] or [`RouteGroup::group`].
pub struct RouteGroup<'r, E: Engine> {
    router: &'r Router<E>,
    base: String,
    middlewares: Vec<BoxedMiddleware>,
}

impl<E: Engine> RouteGroup<'_, E> {
    /// Returns the normalised prefix of this group.
    pub fn prefix(&self) -> &str {
        &self.base
    }

    /// Nests a group. Its chain runs after this group's chain.
    pub fn group<F>(&self, prefix: &str, middlewares: Vec<BoxedMiddleware>, configure: F) -> &Self
    where
        F: FnOnce(&RouteGroup<'_, E>),
    {
        let chain = self.middlewares.iter().cloned().chain(middlewares).collect();
        configure(&RouteGroup {
            router: self.router,
            base: join(&self.base, prefix),
            middlewares: chain,
        });
        self
    }

    /// Registers a route under this group's prefix.
    pub fn route<H: Handler>(
        &self,
        method: HttpMethod,
        path: &str,
        middlewares: Vec<BoxedMiddleware>,
        handler: H,
    ) -> RouteId {
        let chain = self.middlewares.iter().cloned().chain(middlewares).collect();
        self.router
            .route(method, &join(&self.base, path), chain, handler)
    }

    /// Registers a `GET` route under this group's prefix.
    pub fn get<H: Handler>(&self, path: &str, handler: H) -> RouteId {
        self.route(HttpMethod::Get, path, Vec::new(), handler)
    }

    /// Registers a `GET` route behind extra route-specific middlewares.
    pub fn get_with<H: Handler>(
        &self,
        path: &str,
        middlewares: Vec<BoxedMiddleware>,
        handler: H,
    ) -> RouteId {
        self.route(HttpMethod::Get, path, middlewares, handler)
    }
}

impl<E: Engine> fmt::Debug for RouteGroup<'_, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RouteGroup")
            .field("prefix", &self.base)
            .field("middlewares", &self.middlewares.len())
            .finish_non_exhaustive()
    }
}
