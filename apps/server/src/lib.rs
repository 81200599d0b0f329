pub mod api;
pub mod config;
pub mod error;
mod main_lib;

pub use main_lib::{build_state, init_tracing, AppState, LoggingRecorder};
