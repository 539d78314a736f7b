//! Route storage and ID allocation.
//!
//! Each [`Router`](crate::Router) owns one registry. IDs start at `0` and
//! grow by one per registration; they are what the engine hands back to
//! the dispatch callback.
//!
//! Only the owning router mutates a registry, and only while building. Once
//! the router has started, the registry is sealed and stays read-only.

use kiri_middleware::{BoxedHandler, BoxedMiddleware};
use parking_lot::RwLock;
use std::fmt;
use std::sync::Arc;

/// Identifier the engine uses to name a registered route.
pub type RouteId = u16;

/// A handler and the middlewares that apply only to its route.
///
/// Group middlewares are already flattened into `middlewares`, outer group
/// first.
pub struct RouteEntry {
    handler: BoxedHandler,
    middlewares: Vec<BoxedMiddleware>,
}

impl RouteEntry {
    /// Returns the handler.
    pub fn handler(&self) -> &BoxedHandler {
        &self.handler
    }

    /// Returns the route-specific middlewares in execution order.
    pub fn middlewares(&self) -> &[BoxedMiddleware] {
        &self.middlewares
    }
}

impl fmt::Debug for RouteEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<_> = self.middlewares.iter().map(|mw| mw.name()).collect();
        f.debug_struct("RouteEntry")
            .field("middlewares", &names)
            .finish_non_exhaustive()
    }
}

#[derive(Default)]
struct Inner {
    routes: Vec<Arc<RouteEntry>>,
    globals: Vec<BoxedMiddleware>,
    sealed: bool,
}

impl Inner {
    fn assert_open(&self, operation: &str) {
        assert!(!self.sealed, "route registry is sealed, cannot {operation}");
    }
}

/// Thread-safe map from [`RouteId`] to [`RouteEntry`], plus the global
/// middleware list.
#[derive(Default)]
pub struct RouteRegistry {
    inner: RwLock<Inner>,
}

impl RouteRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores a route and returns its ID.
    #[cfg(test)]
    pub(crate) fn register(
        &self,
        handler: BoxedHandler,
        middlewares: Vec<BoxedMiddleware>,
    ) -> RouteId {
        self.register_with(handler, middlewares, |_| {})
    }

    /// Allocates the next ID, hands it to `announce`, then stores the route.
    ///
    /// If `announce` panics nothing is stored and the ID stays free.
    ///
    /// # Panics
    ///
    /// Panics once all 65536 IDs are in use, or if the registry is sealed.
    pub(crate) fn register_with<F>(
        &self,
        handler: BoxedHandler,
        middlewares: Vec<BoxedMiddleware>,
        announce: F,
    ) -> RouteId
    where
        F: FnOnce(RouteId),
    {
        let mut inner = self.inner.write();
        inner.assert_open("register a route");
        let id = RouteId::try_from(inner.routes.len()).unwrap_or_else(|_| {
            panic!("route id space exhausted ({} routes)", inner.routes.len())
        });
        announce(id);
        inner.routes.push(Arc::new(RouteEntry {
            handler,
            middlewares,
        }));
        id
    }

    /// Appends a middleware that runs before every route's own chain.
    pub(crate) fn add_global(&self, middleware: BoxedMiddleware) {
        let mut inner = self.inner.write();
        inner.assert_open("add a global middleware");
        inner.globals.push(middleware);
    }

    /// Freezes the registry. Later mutation panics.
    pub(crate) fn seal(&self) {
        self.inner.write().sealed = true;
    }

    /// Returns true once the owning router has started.
    pub fn is_sealed(&self) -> bool {
        self.inner.read().sealed
    }

    /// Looks up a route.
    pub fn entry(&self, id: RouteId) -> Option<Arc<RouteEntry>> {
        self.inner.read().routes.get(usize::from(id)).cloned()
    }

    /// Returns a snapshot of the global middlewares in registration order.
    pub fn global_middlewares(&self) -> Vec<BoxedMiddleware> {
        self.inner.read().globals.clone()
    }

    /// Returns the number of registered routes.
    pub fn len(&self) -> usize {
        self.inner.read().routes.len()
    }

    /// Returns true if no route is registered.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl fmt::Debug for RouteRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.read();
        f.debug_struct("RouteRegistry")
            .field("routes", &inner.routes.len())
            .field("globals", &inner.globals.len())
            .field("sealed", &inner.sealed)
            .finish()
    }
}
