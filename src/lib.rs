pub mod cli;
pub mod clock;
pub mod config;
pub mod error;
pub mod forwarder;
pub mod host;
pub mod path;
pub mod probe;
pub mod scheduler;
pub mod telemetry;

pub use error::{NetpathError, Result};
pub use scheduler::NetworkPathScheduler;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
