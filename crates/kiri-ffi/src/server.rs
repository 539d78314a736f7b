//! Server start/stop on top of a [`Router`].

use crate::dispatch::Dispatcher;
use crate::engine::{Engine, ForeignPtr};
use crate::error::FfiError;
use crate::router::Router;
use kiri_core::{FrameCodec, FrameLimits};
use parking_lot::Mutex;
use std::fmt;
use std::sync::Arc;
use tokio::runtime::Handle;

/// A native server bound to a port and serving a router's routes.
pub struct Server<E: Engine> {
    port: u16,
    router: Arc<Router<E>>,
    dispatcher: Arc<Dispatcher<E>>,
    handle: Mutex<Option<ForeignPtr>>,
}

impl<E: Engine> Server<E> {
    /// Prepares a server. Handler chains run on `runtime`.
    pub fn new(port: u16, router: Arc<Router<E>>, runtime: Handle) -> Self {
        Self::with_frame_limits(port, router, runtime, FrameLimits::default())
    }

    /// Prepares a server that rejects request frames over `limits`.
    pub fn with_frame_limits(
        port: u16,
        router: Arc<Router<E>>,
        runtime: Handle,
        limits: FrameLimits,
    ) -> Self {
        let dispatcher = Arc::new(Dispatcher::with_codec(
            router.engine().clone(),
            router.registry().clone(),
            runtime,
            FrameCodec::with_limits(limits),
        ));
        Self {
            port,
            router,
            dispatcher,
            handle: Mutex::new(None),
        }
    }

    /// Freezes the router and starts serving.
    ///
    /// On failure the router is rolled back to `Building`, so routes can be
    /// added and `start` retried.
    ///
    /// # Panics
    ///
    /// Panics if the router is not in the `Building` phase.
    pub fn start(&self) -> Result<(), FfiError> {
        let mut handle = self.handle.lock();
        self.router.begin_start();
        let engine = self.router.engine();

        if let Err(message) = engine.attach(&self.dispatcher) {
            self.router.rollback_start();
            tracing::warn!(port = self.port, error = %message, "failed to attach dispatcher");
            return Err(FfiError::Startup(message));
        }

        match engine.server_start(self.port, self.router.native_handle()) {
            Some(server) => {
                *handle = Some(server);
                self.router.commit_start();
                tracing::info!(
                    port = self.port,
                    routes = self.router.route_count(),
                    "server started"
                );
                Ok(())
            }
            None => {
                engine.detach();
                self.router.rollback_start();
                let message = engine
                    .last_error_message()
                    .unwrap_or_else(|| "Unexpected error".to_owned());
                tracing::warn!(port = self.port, error = %message, "server failed to start");
                Err(FfiError::Startup(message))
            }
        }
    }

    /// Stops serving. Does nothing if the server is not running.
    pub fn stop(&self) {
        if let Some(server) = self.handle.lock().take() {
            let engine = self.router.engine();
            engine.server_stop(server);
            engine.detach();
            tracing::info!(port = self.port, "server stopped");
        }
    }

    /// Returns true between a successful `start` and `stop`.
    pub fn is_running(&self) -> bool {
        self.handle.lock().is_some()
    }

    /// Returns the port.
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Returns the router.
    pub fn router(&self) -> &Arc<Router<E>> {
        &self.router
    }

    /// Returns the dispatcher attached on start.
    pub fn dispatcher(&self) -> &Arc<Dispatcher<E>> {
        &self.dispatcher
    }
}

impl<E: Engine> Drop for Server<E> {
    fn drop(&mut self) {
        self.stop();
    }
}

impl<E: Engine> fmt::Debug for Server<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Server")
            .field("port", &self.port)
            .field("running", &self.is_running())
            .finish_non_exhaustive()
    }
}
