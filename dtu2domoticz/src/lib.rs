// externally visible interfaces
pub mod config;
pub mod domoticz;
pub mod dtu;
pub mod engine;
pub mod error;
pub mod http_wrapper;
pub mod model;
pub mod notifier;
pub mod registry;
pub mod scheduler;
pub mod sink;
pub mod telegram;
pub mod telemetry;

// internal interfaces
mod dtu_response;

pub use error::{Error, Result};
