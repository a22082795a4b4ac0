pub mod harness;
pub mod mock_notify;

pub use harness::E2ETestHarness;
