//! The seam between a [`StreamSession`][crate::session::StreamSession] and whatever speaks HTTP for it

use bytes::Bytes;
use futures_core::{future::BoxFuture, stream::BoxStream};

use crate::{config::StreamConfig, status::ContentEncoding};

pub use crate::errors::TransportError;

/// Body chunks as they come off the wire, still encoded
pub type ByteStream = BoxStream<'static, Result<Bytes, TransportError>>;

/// Response headers in the order they were received, looked up case-insensitively
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Headers(Vec<(String, String)>);

impl Headers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.0.push((name.into(), value.into()));
    }

    /// First value for `name`
    pub fn get(&self, name: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn content_encoding(&self) -> ContentEncoding {
        ContentEncoding::from_header(self.get("content-encoding"))
    }
}

impl<K, V> FromIterator<(K, V)> for Headers
where
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        Self(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

/// Status line and headers of a response, with the body still to be read
pub struct StreamResponse {
    /// Zero means the connection closed before a status line arrived
    pub status: u16,
    pub headers: Headers,
    pub body: ByteStream,
}

impl core::fmt::Debug for StreamResponse {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("StreamResponse")
            .field("status", &self.status)
            .field("headers", &self.headers)
            .finish_non_exhaustive()
    }
}

impl StreamResponse {
    pub fn new(status: u16, headers: Headers, body: ByteStream) -> Self {
        Self {
            status,
            headers,
            body,
        }
    }
}

/// Opens one connection and sends the request described by a [`StreamConfig`].
///
/// The returned future resolves once the status line and headers are in, the body is read afterwards through
/// [`StreamResponse::body`]. Connection failures, timeouts and resets all come back as [`TransportError`].
pub trait Connect {
    fn connect(&self, config: &StreamConfig) -> BoxFuture<'static, Result<StreamResponse, TransportError>>;
}

impl<C> Connect for &C
where
    C: Connect + ?Sized,
{
    fn connect(&self, config: &StreamConfig) -> BoxFuture<'static, Result<StreamResponse, TransportError>> {
        (**self).connect(config)
    }
}

impl<C> Connect for std::sync::Arc<C>
where
    C: Connect + ?Sized,
{
    fn connect(&self, config: &StreamConfig) -> BoxFuture<'static, Result<StreamResponse, TransportError>> {
        (**self).connect(config)
    }
}
