pub mod mock_notify;
