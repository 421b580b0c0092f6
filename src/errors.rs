//! [`Error`][core::error::Error] implementations used across the crate

use core::{
    fmt::{Display, Formatter},
    str::Utf8Error,
};

#[cfg(feature = "session")]
pub mod session;
#[cfg(feature = "session")]
pub use session::{StreamError, TransportError};

/// The [`BackoffPolicy`][crate::backoff::BackoffPolicy] ran out of attempts or delay, the stream must not be retried automatically
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExhaustedError {
    /// Reconnect attempts counted when the policy gave up
    pub attempts: u32,
}

impl Display for ExhaustedError {
    fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
        write!(f, "{} reconnects", self.attempts)
    }
}

impl core::error::Error for ExhaustedError {}

/// A line grew past the tokenizer's limit without being terminated
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineTooLong {
    pub limit: usize,
}

impl Display for LineTooLong {
    fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
        write!(f, "line exceeded the maximum length of {} bytes", self.limit)
    }
}

impl core::error::Error for LineTooLong {}

/// The response body could not be decompressed
#[cfg(feature = "gzip")]
#[derive(Debug, Clone)]
pub struct DecodeError(std::sync::Arc<std::io::Error>);

#[cfg(feature = "gzip")]
impl From<std::io::Error> for DecodeError {
    fn from(value: std::io::Error) -> Self {
        Self(std::sync::Arc::new(value))
    }
}

#[cfg(feature = "gzip")]
impl Display for DecodeError {
    fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
        write!(f, "failed to decode response body: {}", self.0)
    }
}

#[cfg(feature = "gzip")]
impl core::error::Error for DecodeError {
    fn source(&self) -> Option<&(dyn core::error::Error + 'static)> {
        Some(self.0.as_ref())
    }
}

/// Anything that stops bytes from becoming items
#[derive(Debug, Clone)]
pub enum ItemError {
    LineTooLong(LineTooLong),
    /// An item was not valid utf8
    Utf8Error(Utf8Error),
    #[cfg(feature = "gzip")]
    Decode(DecodeError),
}

impl From<LineTooLong> for ItemError {
    fn from(value: LineTooLong) -> Self {
        Self::LineTooLong(value)
    }
}

impl From<Utf8Error> for ItemError {
    fn from(value: Utf8Error) -> Self {
        Self::Utf8Error(value)
    }
}

#[cfg(feature = "gzip")]
impl From<DecodeError> for ItemError {
    fn from(value: DecodeError) -> Self {
        Self::Decode(value)
    }
}

impl Display for ItemError {
    fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
        match self {
            ItemError::LineTooLong(e) => e.fmt(f),
            ItemError::Utf8Error(e) => e.fmt(f),
            #[cfg(feature = "gzip")]
            ItemError::Decode(e) => e.fmt(f),
        }
    }
}

impl core::error::Error for ItemError {
    fn source(&self) -> Option<&(dyn core::error::Error + 'static)> {
        match self {
            ItemError::LineTooLong(e) => Some(e),
            ItemError::Utf8Error(e) => Some(e),
            #[cfg(feature = "gzip")]
            ItemError::Decode(e) => Some(e),
        }
    }
}

/// Error from an [`ItemStream`][crate::item_stream::ItemStream]
#[derive(Debug, Clone)]
pub enum ItemStreamError<E> {
    /// Something went wrong with the underlying stream
    Transport(E),
    /// The bytes made it through but could not be turned into an item
    Item(ItemError),
}

impl<E> From<ItemError> for ItemStreamError<E> {
    fn from(value: ItemError) -> Self {
        Self::Item(value)
    }
}

impl<E> Display for ItemStreamError<E>
where
    E: Display,
{
    fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
        match self {
            ItemStreamError::Transport(e) => e.fmt(f),
            ItemStreamError::Item(e) => e.fmt(f),
        }
    }
}

impl<E> core::error::Error for ItemStreamError<E> where E: core::error::Error {}
