//! In-memory engine for unit tests.

use crate::dispatch::Dispatcher;
use crate::engine::{Engine, ForeignPtr};
use crate::registry::RouteId;
use kiri_core::HttpMethod;
use parking_lot::Mutex;
use std::collections::HashSet;
use std::ffi::c_void;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// A fake foreign address. Never dereferenced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Ctx(usize);

impl Ctx {
    pub fn ptr(self) -> ForeignPtr {
        unsafe { ForeignPtr::from_raw(self.raw()) }.unwrap()
    }

    pub fn raw(self) -> *mut c_void {
        self.0 as *mut c_void
    }

    fn of(ptr: &ForeignPtr) -> Self {
        Self(ptr.as_ptr() as usize)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    Completed(Ctx, Vec<u8>),
    RequestFreed(Ctx),
    CancellationFreed(Ctx),
    RouterFreed(Ctx),
    ServerStopped(Ctx),
}

#[derive(Default)]
struct State {
    events: Vec<Event>,
    cancelled: HashSet<Ctx>,
    routes: Vec<(HttpMethod, String, RouteId)>,
    route_rc: i32,
    fail_router_create: bool,
    start_error: Option<String>,
    attach_error: Option<String>,
    last_error: Option<String>,
    attached: usize,
    detached: usize,
}

pub struct RecordingEngine {
    next: AtomicUsize,
    state: Mutex<State>,
}

impl RecordingEngine {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            next: AtomicUsize::new(0x1000),
            state: Mutex::new(State::default()),
        })
    }

    pub fn new_context(&self) -> Ctx {
        Ctx(self.next.fetch_add(8, Ordering::Relaxed))
    }

    pub fn cancel(&self, ctx: Ctx) {
        self.state.lock().cancelled.insert(ctx);
    }

    pub fn events(&self) -> Vec<Event> {
        self.state.lock().events.clone()
    }

    pub fn completions(&self, ctx: Ctx) -> usize {
        self.state
            .lock()
            .events
            .iter()
            .filter(|e| matches!(e, Event::Completed(c, _) | Event::RequestFreed(c) if *c == ctx))
            .count()
    }

    pub fn routes(&self) -> Vec<(HttpMethod, String, RouteId)> {
        self.state.lock().routes.clone()
    }

    pub fn fail_router_create(&self) {
        self.state.lock().fail_router_create = true;
    }

    pub fn reject_routes(&self, rc: i32) {
        self.state.lock().route_rc = rc;
    }

    pub fn fail_start(&self, message: Option<&str>) {
        let mut state = self.state.lock();
        state.start_error = Some(message.unwrap_or_default().to_owned());
        state.last_error = message.map(str::to_owned);
    }

    pub fn fail_attach(&self, message: &str) {
        self.state.lock().attach_error = Some(message.to_owned());
    }

    pub fn allow_start(&self) {
        self.state.lock().start_error = None;
    }

    pub fn attach_count(&self) -> (usize, usize) {
        let state = self.state.lock();
        (state.attached, state.detached)
    }

    /// Waits for the terminal event of a completion context.
    pub async fn terminal(&self, ctx: Ctx) -> Event {
        for _ in 0..500 {
            let found = self.state.lock().events.iter().find_map(|e| match e {
                Event::Completed(c, _) | Event::RequestFreed(c) if *c == ctx => Some(e.clone()),
                _ => None,
            });
            if let Some(event) = found {
                return event;
            }
            tokio::time::sleep(Duration::from_millis(2)).await;
        }
        panic!("no terminal action for {ctx:?}");
    }

    fn push(&self, event: Event) {
        self.state.lock().events.push(event);
    }
}

impl Engine for RecordingEngine {
    fn router_create(&self) -> Option<ForeignPtr> {
        if self.state.lock().fail_router_create {
            return None;
        }
        Some(self.new_context().ptr())
    }

    fn router_free(&self, router: ForeignPtr) {
        self.push(Event::RouterFreed(Ctx::of(&router)));
    }

    fn register_route(
        &self,
        _router: &ForeignPtr,
        method: HttpMethod,
        pattern: &[u8],
        route_id: RouteId,
    ) -> i32 {
        let mut state = self.state.lock();
        if state.route_rc != 0 {
            return state.route_rc;
        }
        let pattern = String::from_utf8_lossy(pattern).into_owned();
        state.routes.push((method, pattern, route_id));
        0
    }

    fn server_start(&self, _port: u16, _router: Option<&ForeignPtr>) -> Option<ForeignPtr> {
        if self.state.lock().start_error.is_some() {
            return None;
        }
        Some(self.new_context().ptr())
    }

    fn server_stop(&self, server: ForeignPtr) {
        self.push(Event::ServerStopped(Ctx::of(&server)));
    }

    fn last_error_message(&self) -> Option<String> {
        self.state.lock().last_error.clone()
    }

    fn request_complete(&self, context: ForeignPtr, frame: &[u8]) {
        self.push(Event::Completed(Ctx::of(&context), frame.to_vec()));
    }

    fn request_free(&self, context: ForeignPtr) {
        self.push(Event::RequestFreed(Ctx::of(&context)));
    }

    fn request_is_cancelled(&self, cancellation: &ForeignPtr) -> bool {
        self.state.lock().cancelled.contains(&Ctx::of(cancellation))
    }

    fn cancellation_free(&self, cancellation: ForeignPtr) {
        self.push(Event::CancellationFreed(Ctx::of(&cancellation)));
    }

    fn attach(&self, _dispatcher: &Arc<Dispatcher<Self>>) -> Result<(), String> {
        let mut state = self.state.lock();
        if let Some(message) = state.attach_error.clone() {
            return Err(message);
        }
        state.attached += 1;
        Ok(())
    }

    fn detach(&self) {
        self.state.lock().detached += 1;
    }
}
