//! Bindings to `libkiri`.
//!
//! # Safety
//!
//! Every `extern "C"` function below follows the engine's ownership rules:
//! handles returned by a `*_create`/`*_start` call stay valid until passed to
//! the matching `*_free`/`*_stop`; completion and cancellation contexts are
//! owned by the dispatch callback that receives them. [`ForeignPtr`] encodes
//! those rules, so each call site only has to uphold pointer validity.

use crate::dispatch::{reject, DispatchError, Dispatcher};
use crate::engine::{Engine, ForeignPtr};
use crate::registry::RouteId;
use crate::{CancellationHandle, CompletionToken};
use kiri_core::{FrameCodec, HttpMethod};
use parking_lot::RwLock;
use std::ffi::{c_char, c_void, CStr};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

#[link(name = "kiri")]
extern "C" {
    fn kiri_router_create() -> *mut c_void;
    fn kiri_router_free(router: *mut c_void);
    fn kiri_router_register_route(
        router: *mut c_void,
        method: u8,
        pattern: *const u8,
        pattern_len: usize,
        route_id: u16,
    ) -> i32;
    fn kiri_server_start_with_router(port: u16, router: *mut c_void) -> *mut c_void;
    fn kiri_server_start(port: u16) -> *mut c_void;
    fn kiri_server_stop(server: *mut c_void);
    fn kiri_last_error_message() -> *mut c_char;
    fn kiri_last_error_message_free(message: *mut c_char);
    fn kiri_request_complete(context: *mut c_void, response: *const u8, len: usize);
    fn kiri_request_free(context: *mut c_void);
    fn kiri_request_is_cancelled(context: *const c_void) -> bool;
    fn kiri_cancellation_free(context: *mut c_void);
}

/// The dispatcher `kiri_dispatch` forwards to. One server per process.
static DISPATCHER: RwLock<Option<Arc<Dispatcher<NativeEngine>>>> = parking_lot::const_rwlock(None);

/// [`Engine`] backed by the linked `libkiri`.
#[derive(Debug, Default, Clone, Copy)]
pub struct NativeEngine;

impl NativeEngine {
    /// Returns a shared handle to the linked engine.
    pub fn shared() -> Arc<Self> {
        Arc::new(Self)
    }
}

impl Engine for NativeEngine {
    fn router_create(&self) -> Option<ForeignPtr> {
        unsafe { ForeignPtr::from_raw(kiri_router_create()) }
    }

    fn router_free(&self, router: ForeignPtr) {
        unsafe { kiri_router_free(router.into_raw()) }
    }

    fn register_route(
        &self,
        router: &ForeignPtr,
        method: HttpMethod,
        pattern: &[u8],
        route_id: RouteId,
    ) -> i32 {
        unsafe {
            kiri_router_register_route(
                router.as_ptr(),
                method.code(),
                pattern.as_ptr(),
                pattern.len(),
                route_id,
            )
        }
    }

    fn server_start(&self, port: u16, router: Option<&ForeignPtr>) -> Option<ForeignPtr> {
        let server = match router {
            Some(router) => unsafe { kiri_server_start_with_router(port, router.as_ptr()) },
            None => unsafe { kiri_server_start(port) },
        };
        unsafe { ForeignPtr::from_raw(server) }
    }

    fn server_stop(&self, server: ForeignPtr) {
        unsafe { kiri_server_stop(server.into_raw()) }
    }

    fn last_error_message(&self) -> Option<String> {
        let raw = unsafe { kiri_last_error_message() };
        if raw.is_null() {
            return None;
        }
        let message = unsafe { CStr::from_ptr(raw) }.to_string_lossy().into_owned();
        unsafe { kiri_last_error_message_free(raw) };
        Some(message)
    }

    fn request_complete(&self, context: ForeignPtr, frame: &[u8]) {
        unsafe { kiri_request_complete(context.into_raw(), frame.as_ptr(), frame.len()) }
    }

    fn request_free(&self, context: ForeignPtr) {
        unsafe { kiri_request_free(context.into_raw()) }
    }

    fn request_is_cancelled(&self, cancellation: &ForeignPtr) -> bool {
        unsafe { kiri_request_is_cancelled(cancellation.as_ptr()) }
    }

    fn cancellation_free(&self, cancellation: ForeignPtr) {
        unsafe { kiri_cancellation_free(cancellation.into_raw()) }
    }

    fn attach(&self, dispatcher: &Arc<Dispatcher<Self>>) -> Result<(), String> {
        let mut slot = DISPATCHER.write();
        if slot.is_some() {
            return Err("a server is already running in this process".to_owned());
        }
        *slot = Some(dispatcher.clone());
        Ok(())
    }

    fn detach(&self) {
        DISPATCHER.write().take();
    }
}

/// Dispatch callback invoked by `libkiri` for every request.
///
/// # Safety
///
/// Called by the engine only. `request` must point to `len` readable bytes
/// (or be null); both contexts are handed over to this function.
#[no_mangle]
pub unsafe extern "C" fn kiri_dispatch(
    route_id: u16,
    request: *const u8,
    len: usize,
    completion: *mut c_void,
    cancellation: *mut c_void,
) {
    let result = catch_unwind(AssertUnwindSafe(|| {
        let dispatcher = DISPATCHER.read().clone();
        match dispatcher {
            Some(dispatcher) => dispatcher.dispatch(route_id, request, len, completion, cancellation),
            None => {
                let engine = NativeEngine::shared();
                let completion = CompletionToken::new(
                    engine.clone(),
                    FrameCodec::new(),
                    ForeignPtr::from_raw(completion),
                );
                let cancellation =
                    CancellationHandle::new(engine, ForeignPtr::from_raw(cancellation));
                reject(route_id, DispatchError::NoDispatcher, &completion, &cancellation);
            }
        }
    }));

    if result.is_err() {
        tracing::error!(route_id, "panic while dispatching request");
    }
}
