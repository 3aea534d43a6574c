pub mod bar;
pub mod config;
pub mod logging;
pub mod ops;
pub mod process;
mod telemetry;
pub mod tunnel;

pub use logging::{init_logging, log_debug, log_debug_content, log_panic};
