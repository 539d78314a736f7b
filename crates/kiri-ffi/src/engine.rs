//! The native engine's C ABI, as a safe trait.
//!
//! Every foreign resource crosses into Rust as a [`ForeignPtr`]. Operations
//! that consume a resource take it by value, so a context can be completed,
//! freed, or released at most once without any runtime bookkeeping.

use crate::dispatch::Dispatcher;
use crate::registry::RouteId;
use kiri_core::HttpMethod;
use std::ffi::c_void;
use std::fmt;
use std::ptr::NonNull;
use std::sync::Arc;

/// Owned, non-null handle to a resource that belongs to the native engine.
///
/// Deliberately neither `Clone` nor `Copy`.
pub struct ForeignPtr(NonNull<c_void>);

// SAFETY: the engine documents every handle it hands out as usable from any
// thread; Rust never dereferences the pointer itself.
unsafe impl Send for ForeignPtr {}
unsafe impl Sync for ForeignPtr {}

impl ForeignPtr {
    /// Takes ownership of a raw engine pointer. Returns `None` for null.
    ///
    /// # Safety
    ///
    /// `ptr` must be null or a live handle produced by the engine that no
    /// other `ForeignPtr` owns.
    pub unsafe fn from_raw(ptr: *mut c_void) -> Option<Self> {
        NonNull::new(ptr).map(Self)
    }

    /// Returns the raw pointer without giving up ownership.
    #[must_use]
    pub fn as_ptr(&self) -> *mut c_void {
        self.0.as_ptr()
    }

    /// Gives up ownership and returns the raw pointer.
    #[must_use]
    pub fn into_raw(self) -> *mut c_void {
        self.0.as_ptr()
    }
}

impl fmt::Debug for ForeignPtr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ForeignPtr").field(&self.0).finish()
    }
}

/// The operations the bridge needs from the native engine.
///
/// [`NativeEngine`](crate::NativeEngine) forwards them to `libkiri`; tests
/// use an in-memory implementation.
pub trait Engine: Send + Sync + 'static {
    /// Creates a native route table.
    fn router_create(&self) -> Option<ForeignPtr>;

    /// Frees a route table.
    fn router_free(&self, router: ForeignPtr);

    /// Adds a route to a table. Returns `0` on success.
    fn register_route(
        &self,
        router: &ForeignPtr,
        method: HttpMethod,
        pattern: &[u8],
        route_id: RouteId,
    ) -> i32;

    /// Starts serving on `port`, with a route table if one is given.
    ///
    /// Returns `None` on failure; the reason is then available from
    /// [`last_error_message`](Self::last_error_message).
    fn server_start(&self, port: u16, router: Option<&ForeignPtr>) -> Option<ForeignPtr>;

    /// Stops a server and frees its handle.
    fn server_stop(&self, server: ForeignPtr);

    /// Returns the message of the engine's most recent failure.
    fn last_error_message(&self) -> Option<String>;

    /// Delivers a response frame and consumes the completion context.
    fn request_complete(&self, context: ForeignPtr, frame: &[u8]);

    /// Consumes the completion context without sending anything.
    fn request_free(&self, context: ForeignPtr);

    /// Asks whether the peer abandoned the request.
    fn request_is_cancelled(&self, cancellation: &ForeignPtr) -> bool;

    /// Releases a cancellation context.
    fn cancellation_free(&self, cancellation: ForeignPtr);

    /// Routes the engine's dispatch callback to `dispatcher`.
    ///
    /// Called by [`Server::start`](crate::Server::start) before the native
    /// server starts. Engines that dispatch in-process can keep the default.
    fn attach(&self, dispatcher: &Arc<Dispatcher<Self>>) -> Result<(), String>
    where
        Self: Sized,
    {
        let _ = dispatcher;
        Ok(())
    }

    /// Undoes [`attach`](Self::attach).
    fn detach(&self) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_null_is_rejected() {
        let ptr = unsafe { ForeignPtr::from_raw(std::ptr::null_mut()) };
        assert!(ptr.is_none());
    }

    #[test]
    fn test_round_trip_raw() {
        let mut slot = 0u8;
        let raw = std::ptr::addr_of_mut!(slot).cast::<c_void>();
        let ptr = unsafe { ForeignPtr::from_raw(raw) }.unwrap();
        assert_eq!(ptr.as_ptr(), raw);
        assert_eq!(ptr.into_raw(), raw);
    }
}
