//! Policies governing delivery behaviour

pub mod retry;

pub use retry::RetryPolicy;
