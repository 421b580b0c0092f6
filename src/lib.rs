//! A client for long-lived HTTP streams whose body is an endless sequence of delimited items, such as the
//! newline-delimited JSON firehoses served by social media streaming APIs.
//!
//! `firehose` is layered:
//!
//! - [`StreamSession`] (requires `session` feature, on by default) - keeps one connection open through a
//!   [`Connect`][transport::Connect] implementation, emits each item as a [`SessionEvent`] and reconnects with a
//!   linear [`BackoffPolicy`] whenever the connection is lost or rejected.
//! - [`ReqwestConnector`][reqwest::ReqwestConnector] (requires `reqwest` feature) - the [`reqwest`][::reqwest]
//!   backed transport, with proxy, basic auth and read timeout support.
//! - [`ItemStream`] - a generic [`Stream`][futures_core::Stream] adapter that turns any
//!   `Stream<Item = Result<impl AsRef<[u8]>, E>>` into a stream of UTF-8 items, optionally inflating gzip first.
//! - [`JsonItemStream`][json_stream::JsonItemStream] (requires `json` feature) - deserialises each item into a typed
//!   value via [`serde_json`].
//! - The building blocks underneath: [`LineTokenizer`][tokenizer::LineTokenizer],
//!   [`ItemAccumulator`][accumulator::ItemAccumulator], [`status::classify`] and [`BackoffPolicy`].
//!
//! # Quick start with `reqwest`
//!
//! ```ignore
//! use firehose::{SessionEvent, StreamSession, config::StreamConfig};
//! use futures::StreamExt;
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = StreamConfig::new("stream.example.com", 443)
//!     .with_path("/1/statuses/filter.json")
//!     .with_param("track", "rust");
//! let mut session = StreamSession::from_config(config)?;
//!
//! while let Some(event) = session.next().await {
//!     match event {
//!         SessionEvent::Item(item) => println!("{}", &*item),
//!         SessionEvent::Unauthorized => session.close(),
//!         other => eprintln!("{other:?}"),
//!     }
//! }
//! # Ok(())
//! # }
//! ```
//!
//! # Using `ItemStream` directly
//!
//! If you already have a byte stream and don't need reconnecting:
//!
//! ```rust
//! use bytes::Bytes;
//! use futures::StreamExt;
//! use firehose::ItemStream;
//!
//! # #[tokio::main]
//! # async fn main() {
//! let chunks = vec![
//!     Ok::<_, std::io::Error>(Bytes::from("{\"id\":1}\r\n\r\n{\"id\":")),
//!     Ok(Bytes::from("2}\r\n")),
//! ];
//! let mut stream = ItemStream::new(futures::stream::iter(chunks));
//!
//! while let Some(Ok(item)) = stream.next().await {
//!     println!("{}", &*item);
//! }
//! # }
//! ```
//!
//! # Feature flags
//!
//! | Feature | Default | Description | no std? |
//! | --- | --- | --- | --- |
//! | `std` | off | Enables standard library support in core dependencies (`bytes`, `memchr`, `futures-core`, `tracing`). Turned on by every feature below. | false |
//! | `gzip` | off | gzip `Content-Encoding` support in [`Decoder`][decoder::Decoder] through [`flate2`]. | false |
//! | `session` | on | [`StreamSession`], [`config`] and the [`transport`] seam, implies `gzip`. | false |
//! | `reqwest` | off | [`ReqwestConnector`][reqwest::ReqwestConnector], `StreamSession::from_config` and [`response_to_stream`]. | false |
//! | `serde` | off | Derives [`Serialize`][::serde::Serialize] and [`Deserialize`][::serde::Deserialize] on the config types. | false |
//! | `json` | off | Provides [`JsonItemStream`][json_stream::JsonItemStream], with plain [`serde_json`] errors or [`serde_path_to_error`] ones. | false |
//!
//! With default features off the crate is `no_std` and provides [`ItemStream`], the tokenizer, the status
//! classifier and [`BackoffPolicy`].

#![cfg_attr(not(feature = "std"), no_std)]

extern crate alloc;

pub mod accumulator;
pub mod backoff;
pub(crate) mod constants;
pub mod decoder;
pub mod errors;
pub mod item_stream;
pub mod status;
pub mod tokenizer;

#[cfg(feature = "std")]
pub mod config;
#[cfg(feature = "json")]
pub mod json_stream;
#[cfg(feature = "reqwest")]
pub mod reqwest;
#[cfg(feature = "session")]
pub mod session;
#[cfg(feature = "session")]
pub mod transport;

pub use backoff::BackoffPolicy;
pub use constants::{DEFAULT_DELIMITER, MAX_LINE_LENGTH};
pub use item_stream::ItemStream;
pub use status::Outcome;

#[cfg(feature = "reqwest")]
pub use reqwest::response_to_stream;
#[cfg(feature = "session")]
pub use session::{SessionEvent, StreamSession};
