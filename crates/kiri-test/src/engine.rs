//! An in-memory stand-in for the native engine.

use crate::error::TestError;
use kiri_core::HttpMethod;
use kiri_ffi::{Dispatcher, Engine, ForeignPtr, RouteId};
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::ffi::c_void;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::Notify;

/// A fake foreign context. The address is never dereferenced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ContextId(usize);

impl ContextId {
    /// Returns the raw address handed to the dispatcher.
    pub fn as_raw(self) -> *mut c_void {
        self.0 as *mut c_void
    }

    fn of(ptr: &ForeignPtr) -> Self {
        Self(ptr.as_ptr() as usize)
    }

    fn mint(self) -> ForeignPtr {
        match unsafe { ForeignPtr::from_raw(self.as_raw()) } {
            Some(ptr) => ptr,
            None => unreachable!("context ids start above zero"),
        }
    }
}

/// The terminal action the engine observed for a completion context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Terminal {
    /// `request_complete` with a response frame.
    Completed {
        /// The completion context.
        context: ContextId,
        /// The encoded response frame.
        frame: Vec<u8>,
    },
    /// `request_free`, without a response.
    Released {
        /// The completion context.
        context: ContextId,
    },
}

impl Terminal {
    /// Returns the completion context this action consumed.
    pub fn context(&self) -> ContextId {
        match self {
            Self::Completed { context, .. } | Self::Released { context } => *context,
        }
    }
}

/// A route registered through `register_route`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegisteredRoute {
    /// Request method
    pub method: HttpMethod,
    /// Normalised pattern
    pub pattern: String,
    /// Id the dispatcher resolves
    pub route_id: RouteId,
}

#[derive(Default)]
struct State {
    routes: Vec<RegisteredRoute>,
    terminals: Vec<Terminal>,
    cancelled: HashSet<ContextId>,
    issued: HashSet<ContextId>,
    cancellations_freed: HashMap<ContextId, usize>,
    routers_live: HashSet<ContextId>,
    servers_live: HashMap<ContextId, u16>,
    start_error: Option<Option<String>>,
    last_error: Option<String>,
    dispatcher: Option<Arc<Dispatcher<MockEngine>>>,
}

/// [`Engine`] that records every call and routes requests in memory.
///
/// Route matching is exact on the normalised pattern.
pub struct MockEngine {
    next: AtomicUsize,
    state: Mutex<State>,
    terminal: Notify,
}

impl MockEngine {
    /// Creates an engine with nothing registered.
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            next: AtomicUsize::new(0x10),
            state: Mutex::new(State::default()),
            terminal: Notify::new(),
        })
    }

    /// Allocates a fresh context.
    pub fn new_context(&self) -> ContextId {
        ContextId(self.next.fetch_add(0x10, Ordering::Relaxed))
    }

    /// Makes the next `server_start` calls fail. `None` leaves no message.
    pub fn fail_start(&self, message: Option<&str>) {
        self.state.lock().start_error = Some(message.map(str::to_owned));
    }

    /// Lets `server_start` succeed again.
    pub fn allow_start(&self) {
        self.state.lock().start_error = None;
    }

    /// Flags a cancellation context as abandoned by the peer.
    pub fn cancel(&self, cancellation: ContextId) {
        self.state.lock().cancelled.insert(cancellation);
    }

    /// Returns the routes registered so far.
    pub fn routes(&self) -> Vec<RegisteredRoute> {
        self.state.lock().routes.clone()
    }

    /// Finds the route id for a method and path, like the native matcher.
    pub fn resolve(&self, method: HttpMethod, path: &str) -> Option<RouteId> {
        let path = kiri_core::path::join("", path);
        self.state
            .lock()
            .routes
            .iter()
            .find(|r| r.method == method && r.pattern == path)
            .map(|r| r.route_id)
    }

    /// Returns the attached dispatcher, if a server is running.
    pub fn dispatcher(&self) -> Option<Arc<Dispatcher<Self>>> {
        self.state.lock().dispatcher.clone()
    }

    /// Returns true if a server is running.
    pub fn is_serving(&self) -> bool {
        !self.state.lock().servers_live.is_empty()
    }

    /// Returns the port of every running server.
    pub fn ports(&self) -> Vec<u16> {
        self.state.lock().servers_live.values().copied().collect()
    }

    /// Returns the number of route tables not yet freed.
    pub fn live_routers(&self) -> usize {
        self.state.lock().routers_live.len()
    }

    /// Returns every terminal action so far, in order.
    pub fn terminals(&self) -> Vec<Terminal> {
        self.state.lock().terminals.clone()
    }

    /// Returns how many terminal actions consumed `context`.
    pub fn terminal_count(&self, context: ContextId) -> usize {
        self.state
            .lock()
            .terminals
            .iter()
            .filter(|t| t.context() == context)
            .count()
    }

    /// Returns how many times `cancellation` was released.
    pub fn cancellation_free_count(&self, cancellation: ContextId) -> usize {
        self.state
            .lock()
            .cancellations_freed
            .get(&cancellation)
            .copied()
            .unwrap_or(0)
    }

    /// Waits for the terminal action on `context`.
    pub async fn wait_terminal(&self, context: ContextId) -> Terminal {
        loop {
            let notified = self.terminal.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if let Some(found) = self.find_terminal(context) {
                return found;
            }
            notified.await;
        }
    }

    fn find_terminal(&self, context: ContextId) -> Option<Terminal> {
        self.state
            .lock()
            .terminals
            .iter()
            .find(|t| t.context() == context)
            .cloned()
    }

    /// Invokes the attached dispatcher the way the native engine would.
    ///
    /// Returns the completion and cancellation contexts handed over.
    pub fn dispatch_frame(
        &self,
        route_id: RouteId,
        frame: &[u8],
        cancelled: bool,
    ) -> Result<(ContextId, ContextId), TestError> {
        let dispatcher = self.dispatcher().ok_or(TestError::NotRunning)?;
        let completion = self.new_context();
        let cancellation = self.new_context();
        {
            let mut state = self.state.lock();
            state.issued.insert(completion);
            if cancelled {
                state.cancelled.insert(cancellation);
            }
        }

        let request = if frame.is_empty() {
            std::ptr::null()
        } else {
            frame.as_ptr()
        };
        // SAFETY: `frame` outlives the call and both contexts are fresh.
        unsafe {
            dispatcher.dispatch(
                route_id,
                request,
                frame.len(),
                completion.as_raw(),
                cancellation.as_raw(),
            );
        }
        Ok((completion, cancellation))
    }

    /// Returns completion contexts that were dispatched but never consumed.
    pub fn unterminated(&self) -> Vec<ContextId> {
        let state = self.state.lock();
        let mut open: Vec<_> = state
            .issued
            .iter()
            .filter(|c| !state.terminals.iter().any(|t| t.context() == **c))
            .copied()
            .collect();
        open.sort();
        open
    }

    fn record_terminal(&self, terminal: Terminal) {
        self.state.lock().terminals.push(terminal);
        self.terminal.notify_waiters();
    }
}

impl Engine for MockEngine {
    fn router_create(&self) -> Option<ForeignPtr> {
        let id = self.new_context();
        self.state.lock().routers_live.insert(id);
        Some(id.mint())
    }

    fn router_free(&self, router: ForeignPtr) {
        self.state.lock().routers_live.remove(&ContextId::of(&router));
    }

    fn register_route(
        &self,
        router: &ForeignPtr,
        method: HttpMethod,
        pattern: &[u8],
        route_id: RouteId,
    ) -> i32 {
        let mut state = self.state.lock();
        if !state.routers_live.contains(&ContextId::of(router)) {
            return -1;
        }
        let Ok(pattern) = std::str::from_utf8(pattern) else {
            return -2;
        };
        state.routes.push(RegisteredRoute {
            method,
            pattern: pattern.to_owned(),
            route_id,
        });
        0
    }

    fn server_start(&self, port: u16, _router: Option<&ForeignPtr>) -> Option<ForeignPtr> {
        let mut state = self.state.lock();
        if let Some(message) = state.start_error.clone() {
            state.last_error = message;
            return None;
        }
        let id = self.new_context();
        state.servers_live.insert(id, port);
        Some(id.mint())
    }

    fn server_stop(&self, server: ForeignPtr) {
        self.state.lock().servers_live.remove(&ContextId::of(&server));
    }

    fn last_error_message(&self) -> Option<String> {
        self.state.lock().last_error.take()
    }

    fn request_complete(&self, context: ForeignPtr, frame: &[u8]) {
        self.record_terminal(Terminal::Completed {
            context: ContextId::of(&context),
            frame: frame.to_vec(),
        });
    }

    fn request_free(&self, context: ForeignPtr) {
        self.record_terminal(Terminal::Released {
            context: ContextId::of(&context),
        });
    }

    fn request_is_cancelled(&self, cancellation: &ForeignPtr) -> bool {
        self.state
            .lock()
            .cancelled
            .contains(&ContextId::of(cancellation))
    }

    fn cancellation_free(&self, cancellation: ForeignPtr) {
        *self
            .state
            .lock()
            .cancellations_freed
            .entry(ContextId::of(&cancellation))
            .or_default() += 1;
    }

    fn attach(&self, dispatcher: &Arc<Dispatcher<Self>>) -> Result<(), String> {
        let mut state = self.state.lock();
        if state.dispatcher.is_some() {
            return Err("a server is already running on this engine".to_owned());
        }
        state.dispatcher = Some(dispatcher.clone());
        Ok(())
    }

    fn detach(&self) {
        self.state.lock().dispatcher = None;
    }
}

impl std::fmt::Debug for MockEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock();
        f.debug_struct("MockEngine")
            .field("routes", &state.routes.len())
            .field("terminals", &state.terminals.len())
            .field("attached", &state.dispatcher.is_some())
            .finish_non_exhaustive()
    }
}
