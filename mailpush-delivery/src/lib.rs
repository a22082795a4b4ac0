//! Delivery of forwarded mail to a push-notification endpoint.
//!
//! [`job::apply_rules`] turns the rules matching a recipient into
//! [`DispatchJob`]s, the [`Dispatcher`] queues them for a fixed pool of
//! workers, and each worker [`client::deliver`]s its job with exponential
//! backoff according to a [`RetryPolicy`].

pub mod client;
pub mod dispatcher;
pub mod error;
pub mod job;
pub mod policy;

pub use client::{HttpTransport, Transport, deliver};
pub use dispatcher::{Dispatcher, DispatcherConfig, EnqueueOutcome};
pub use error::{ApplyError, AttemptError, DeliveryError, RuleError};
pub use job::{DispatchJob, Notification, apply_rules};
pub use policy::RetryPolicy;
