//! Owner of the foreign cancellation context.

use crate::engine::{Engine, ForeignPtr};
use kiri_core::CancellationSource;
use std::fmt;
use std::sync::Arc;

/// Wraps the cancellation context handed over with a request.
///
/// A missing context counts as cancelled. The context is released when the
/// handle is dropped, which happens once the last
/// [`CancellationToken`](kiri_core::CancellationToken) derived from it is
/// gone.
pub struct CancellationHandle<E: Engine> {
    engine: Arc<E>,
    context: Option<ForeignPtr>,
}

impl<E: Engine> CancellationHandle<E> {
    /// Takes ownership of a cancellation context.
    pub fn new(engine: Arc<E>, context: Option<ForeignPtr>) -> Self {
        Self { engine, context }
    }

    /// Returns true if the peer abandoned the request or no context exists.
    pub fn is_cancelled(&self) -> bool {
        match &self.context {
            Some(context) => self.engine.request_is_cancelled(context),
            None => true,
        }
    }
}

impl<E: Engine> CancellationSource for CancellationHandle<E> {
    fn is_cancelled(&self) -> bool {
        Self::is_cancelled(self)
    }
}

impl<E: Engine> Drop for CancellationHandle<E> {
    fn drop(&mut self) {
        if let Some(context) = self.context.take() {
            self.engine.cancellation_free(context);
        }
    }
}

impl<E: Engine> fmt::Debug for CancellationHandle<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CancellationHandle")
            .field("context", &self.context)
            .finish_non_exhaustive()
    }
}
