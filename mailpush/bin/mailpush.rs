use clap::Parser;
use mailpush::{Config, Mailpush};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    Mailpush::new(Config::parse()).run().await
}
