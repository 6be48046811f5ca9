//! Utility modules for kitbuilder
//!
//! - Structured logging setup
//! - Filesystem helpers shared by build steps and tasks
//! - External process execution with output forwarded to tracing

pub mod fs;
pub mod logging;
pub mod process;

pub use logging::{init_default, init_from_env, init_logging, LoggingConfig};
pub use process::{run_and_log, ProcessError};
