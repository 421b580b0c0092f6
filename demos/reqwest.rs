//! Follows a line-delimited stream and prints each item as it arrives
//!
//! Run with: RUST_LOG=firehose=debug cargo run --example reqwest --features reqwest -- <host> <path>

use std::time::Duration;

use firehose::{SessionEvent, StreamSession, config::{Method, StreamConfig}};
use futures::StreamExt;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let mut args = std::env::args().skip(1);
    let host = args.next().unwrap_or_else(|| "stream.example.com".to_owned());
    let path = args.next().unwrap_or_else(|| "/1/statuses/sample.json".to_owned());

    let config = StreamConfig::new(host, 443)
        .with_method(Method::Get)
        .with_path(path)
        .with_header("Accept-Encoding", "gzip")
        .with_timeout(Duration::from_secs(90));

    let mut session = StreamSession::from_config(config)?;

    while let Some(event) = session.next().await {
        match event {
            SessionEvent::Open { encoding } => println!("connected ({encoding:?})"),
            SessionEvent::Item(item) => println!("{}", &*item),
            SessionEvent::Error(e) => eprintln!("error: {e}"),
            SessionEvent::Reconnect { attempt, delay } => {
                eprintln!("reconnect #{attempt} in {delay:?}");
            }
            SessionEvent::MaxReconnectsExceeded { attempts } => {
                eprintln!("giving up after {attempts} attempts");
            }
            SessionEvent::Unauthorized | SessionEvent::Forbidden => {
                eprintln!("credentials rejected, stopping");
                session.close();
            }
            other => eprintln!("{other:?}"),
        }
    }

    println!("Stream ended");
    Ok(())
}
