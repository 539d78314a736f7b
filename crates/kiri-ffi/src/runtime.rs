//! Tokio runtime that runs handler chains.
//!
//! The engine calls dispatch from its own threads; all handler work is
//! spawned onto a Tokio runtime so those threads return immediately.

use crate::error::FfiError;
use parking_lot::Mutex;
use std::sync::OnceLock;
use tokio::runtime::Runtime;

static RUNTIME: OnceLock<Runtime> = OnceLock::new();
static INIT: Mutex<()> = parking_lot::const_mutex(());

/// Returns the process-wide runtime, building it on first use.
///
/// Only one caller ever builds a runtime, so none is dropped here. That
/// keeps this callable from inside an async context.
pub fn shared_runtime() -> Result<&'static Runtime, FfiError> {
    if let Some(runtime) = RUNTIME.get() {
        return Ok(runtime);
    }

    let _init = INIT.lock();
    if let Some(runtime) = RUNTIME.get() {
        return Ok(runtime);
    }
    let runtime = build_runtime(&RuntimeConfig::default())?;
    Ok(RUNTIME.get_or_init(|| runtime))
}

/// Runtime configuration options
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    /// Number of worker threads (0 = one per core)
    pub worker_threads: usize,
    /// Stack size for worker threads in bytes
    pub thread_stack_size: usize,
    /// Thread name prefix
    pub thread_name: String,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            worker_threads: 0,
            thread_stack_size: 2 * 1024 * 1024,
            thread_name: "kiri-worker".to_string(),
        }
    }
}

/// Builds a dedicated multi-threaded runtime.
pub fn build_runtime(config: &RuntimeConfig) -> std::io::Result<Runtime> {
    let mut builder = tokio::runtime::Builder::new_multi_thread();
    builder
        .enable_all()
        .thread_name(&config.thread_name)
        .thread_stack_size(config.thread_stack_size);

    if config.worker_threads > 0 {
        builder.worker_threads(config.worker_threads);
    }

    builder.build()
}
