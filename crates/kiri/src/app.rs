//! A router and a server bound to one port.

use crate::error::{AppError, AppResult};
use kiri_config::KiriConfig;
use kiri_core::FrameLimits;
use kiri_ffi::{build_runtime, shared_runtime, Engine, RouteGroup, RouteId, Router, RuntimeConfig, Server};
use kiri_middleware::{BoxedMiddleware, Handler};
use std::fmt;
use std::sync::Arc;
use tokio::runtime::{Handle, Runtime};

/// A Kiri application.
///
/// Register routes, then [`start`](Self::start). Registration is only legal
/// before the first successful start.
///
/// ```rust,ignore
/// use kiri::prelude::*;
///
/// let app = App::native(8080)?;
/// app.get("/", |_req: Request| async { Ok(Response::ok("hello")) });
/// app.start()?;
/// ```
pub struct App<E: Engine> {
    router: Arc<Router<E>>,
    server: Server<E>,
    runtime: Option<Runtime>,
}

impl<E: Engine> App<E> {
    /// Creates an app whose handlers run on the shared runtime.
    pub fn new(engine: Arc<E>, port: u16) -> AppResult<Self> {
        let handle = shared_runtime()?.handle().clone();
        Self::with_runtime(engine, port, handle)
    }

    /// Creates an app whose handlers run on `runtime`.
    pub fn with_runtime(engine: Arc<E>, port: u16, runtime: Handle) -> AppResult<Self> {
        Self::assemble(engine, port, runtime, FrameLimits::default(), None)
    }

    /// Creates an app from a validated configuration.
    ///
    /// The app gets its own runtime built from the `[runtime]` section.
    /// Logging is not installed here; see [`init_telemetry`](crate::init_telemetry).
    pub fn from_config(engine: Arc<E>, config: &KiriConfig) -> AppResult<Self> {
        config.validate()?;
        let runtime = build_runtime(&runtime_config(config))
            .map_err(kiri_ffi::FfiError::from)?;
        let handle = runtime.handle().clone();
        Self::assemble(
            engine,
            config.server.port,
            handle,
            config.frame.limits(),
            Some(runtime),
        )
    }

    fn assemble(
        engine: Arc<E>,
        port: u16,
        handle: Handle,
        limits: FrameLimits,
        runtime: Option<Runtime>,
    ) -> AppResult<Self> {
        let router = Arc::new(Router::new(engine)?);
        let server = Server::with_frame_limits(port, router.clone(), handle, limits);
        Ok(Self {
            router,
            server,
            runtime,
        })
    }

    /// Adds a middleware that runs before every route's own chain.
    pub fn use_middleware(&self, middleware: BoxedMiddleware) -> &Self {
        self.router.use_middleware(middleware);
        self
    }

    /// Registers a `GET` route.
    pub fn get<H: Handler>(&self, path: &str, handler: H) -> RouteId {
        self.router.get(path, handler)
    }

    /// Registers a `GET` route behind route-specific middlewares.
    pub fn get_with<H: Handler>(
        &self,
        path: &str,
        middlewares: Vec<BoxedMiddleware>,
        handler: H,
    ) -> RouteId {
        self.router.get_with(path, middlewares, handler)
    }

    /// Registers routes under a shared prefix and middleware chain.
    pub fn group<F>(&self, prefix: &str, middlewares: Vec<BoxedMiddleware>, configure: F) -> &Self
    where
        F: FnOnce(&RouteGroup<'_, E>),
    {
        self.router.group(prefix, middlewares, configure);
        self
    }

    /// Starts serving.
    pub fn start(&self) -> AppResult<()> {
        self.server.start()?;
        Ok(())
    }

    /// Stops serving.
    pub fn stop(&self) {
        self.server.stop();
    }

    /// Starts serving and waits for Ctrl-C, then stops.
    pub async fn run(&self) -> AppResult<()> {
        self.start()?;
        let signal = tokio::signal::ctrl_c().await;
        tracing::info!(port = self.port(), "stopping");
        self.stop();
        signal.map_err(AppError::Signal)
    }

    /// Returns true while the server is running.
    pub fn is_running(&self) -> bool {
        self.server.is_running()
    }

    /// Returns the port.
    pub fn port(&self) -> u16 {
        self.server.port()
    }

    /// Returns the router.
    pub fn router(&self) -> &Arc<Router<E>> {
        &self.router
    }
}

#[cfg(feature = "native")]
impl App<kiri_ffi::NativeEngine> {
    /// Creates an app on the linked native engine.
    pub fn native(port: u16) -> AppResult<Self> {
        Self::new(kiri_ffi::NativeEngine::shared(), port)
    }
}

impl<E: Engine> Drop for App<E> {
    fn drop(&mut self) {
        self.server.stop();
        if let Some(runtime) = self.runtime.take() {
            runtime.shutdown_background();
        }
    }
}

impl<E: Engine> fmt::Debug for App<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("App")
            .field("server", &self.server)
            .field("router", &self.router)
            .field("owns_runtime", &self.runtime.is_some())
            .finish()
    }
}

fn runtime_config(config: &KiriConfig) -> RuntimeConfig {
    let defaults = RuntimeConfig::default();
    RuntimeConfig {
        worker_threads: config.runtime.worker_threads.unwrap_or(0),
        thread_stack_size: config
            .runtime
            .thread_stack_size
            .unwrap_or(defaults.thread_stack_size),
        thread_name: config.runtime.thread_name.clone(),
    }
}
