//! Process configuration, read from the command line or the environment.

use std::{
    net::{Ipv4Addr, SocketAddr},
    path::PathBuf,
    time::Duration,
};

use clap::Parser;
use mailpush_delivery::{DispatcherConfig, RetryPolicy};
use mailpush_smtp::{Credentials, Extension};

mod defaults {
    pub const LISTEN: &str = "25";
    pub const APPRISE_URL: &str = "http://apprise:8000/notify";
    pub const DATA_DIR: &str = "data";
    pub const STORE_FILE: &str = "records.ron";
    pub const QUEUE_CAPACITY: &str = "50";
    pub const WORKERS: &str = "5";
    pub const MAX_ATTEMPTS: &str = "5";
    pub const MAX_MESSAGE_SIZE: &str = "10485760";
    pub const REQUEST_TIMEOUT_SECS: &str = "10";
}

#[derive(Debug, Clone, Parser)]
#[command(
    name = "mailpush",
    version,
    about = "Relay mail received over SMTP to push notifications"
)]
pub struct Config {
    /// Port or socket address to accept SMTP connections on
    #[arg(
        long = "listen",
        env = "LISTEN_SMTP",
        default_value = defaults::LISTEN,
        value_parser = listen_address
    )]
    pub listen: SocketAddr,

    /// Notification endpoint; each rule posts to `{url}/{destination_key}`
    #[arg(long, env = "APPRISE_URL", default_value = defaults::APPRISE_URL)]
    pub apprise_url: String,

    #[arg(long, env = "ADMIN_USER")]
    pub admin_user: Option<String>,

    #[arg(long, env = "ADMIN_PASS", hide_env_values = true)]
    pub admin_pass: Option<String>,

    #[arg(long, env = "DATA_DIR", default_value = defaults::DATA_DIR)]
    pub data_dir: PathBuf,

    /// Rule file, relative to the data directory unless absolute
    #[arg(long, env = "STORE_FILE", default_value = defaults::STORE_FILE)]
    pub store_file: PathBuf,

    #[arg(
        long,
        env = "QUEUE_CAPACITY",
        default_value = defaults::QUEUE_CAPACITY,
        value_parser = positive
    )]
    pub queue_capacity: usize,

    #[arg(long, env = "WORKERS", default_value = defaults::WORKERS, value_parser = positive)]
    pub workers: usize,

    #[arg(
        long,
        env = "MAX_ATTEMPTS",
        default_value = defaults::MAX_ATTEMPTS,
        value_parser = clap::value_parser!(u32).range(1..)
    )]
    pub max_attempts: u32,

    /// Largest message accepted, in bytes. Zero disables the limit
    #[arg(long, env = "MAX_MESSAGE_SIZE", default_value = defaults::MAX_MESSAGE_SIZE)]
    pub max_message_size: usize,

    /// Timeout for a single notification request, in seconds
    #[arg(long, env = "REQUEST_TIMEOUT", default_value = defaults::REQUEST_TIMEOUT_SECS)]
    pub request_timeout: u64,

    /// Name announced in the SMTP greeting
    #[arg(long, env = "HOSTNAME", default_value = "localhost")]
    pub hostname: String,

    #[arg(long, env = "LOG_LEVEL")]
    pub log_level: Option<String>,
}

/// Accept either a bare port, bound on every interface, or a full address
fn listen_address(value: &str) -> Result<SocketAddr, String> {
    if let Ok(port) = value.parse::<u16>() {
        return Ok(SocketAddr::from((Ipv4Addr::UNSPECIFIED, port)));
    }

    value
        .parse()
        .map_err(|_| format!("`{value}` is neither a port nor a socket address"))
}

fn positive(value: &str) -> Result<usize, String> {
    match value.parse::<usize>() {
        Ok(0) => Err("must be at least 1".to_string()),
        Ok(n) => Ok(n),
        Err(err) => Err(err.to_string()),
    }
}

impl Config {
    pub fn store_path(&self) -> PathBuf {
        self.data_dir.join(&self.store_file)
    }

    /// The credentials SMTP clients must present, if both halves are set
    pub fn credentials(&self) -> Option<Credentials> {
        match (&self.admin_user, &self.admin_pass) {
            (Some(user), Some(pass)) if !user.is_empty() => Some(Credentials::new(user, pass)),
            _ => None,
        }
    }

    pub fn extensions(&self) -> Vec<Extension> {
        vec![Extension::Auth, Extension::Size(self.max_message_size)]
    }

    pub fn dispatcher(&self) -> DispatcherConfig {
        DispatcherConfig {
            capacity: self.queue_capacity,
            workers: self.workers,
            retry: RetryPolicy::new().with_max_attempts(self.max_attempts),
        }
    }

    pub const fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout)
    }
}
