//! The mailpush relay process: configuration and component wiring.

#[cfg(not(unix))]
compile_error!("Only unix targets are currently supported");

pub mod config;
pub mod controller;

pub use config::Config;
pub use controller::{Mailpush, Running};
