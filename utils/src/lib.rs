//! Shared utilities for the producer elector.

pub mod logging;

pub use logging::{init_logging, LogFormat, UnknownLogFormat};
