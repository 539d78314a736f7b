//! Ready-made middleware stages.

pub mod logging;

pub use logging::LoggingMiddleware;
