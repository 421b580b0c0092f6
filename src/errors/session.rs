use core::fmt::{Display, Formatter};
use std::sync::Arc;

use super::ItemError;

type BoxError = Box<dyn core::error::Error + Send + Sync>;

/// Failure reported by a [`Connect`][crate::transport::Connect] implementation, either while connecting or while reading the body.
///
/// Cheap to clone so it can ride along in a [`SessionEvent`][crate::session::SessionEvent].
#[derive(Debug, Clone)]
pub struct TransportError(Arc<dyn core::error::Error + Send + Sync>);

impl TransportError {
    pub fn new<E>(error: E) -> Self
    where
        E: core::error::Error + Send + Sync + 'static,
    {
        Self(Arc::new(error))
    }

    pub fn msg(message: impl Into<String>) -> Self {
        let message: String = message.into();
        let boxed: BoxError = message.into();
        Self(Arc::from(boxed))
    }

    pub fn inner(&self) -> &(dyn core::error::Error + Send + Sync + 'static) {
        self.0.as_ref()
    }
}

impl Display for TransportError {
    fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
        self.0.fmt(f)
    }
}

impl core::error::Error for TransportError {
    fn source(&self) -> Option<&(dyn core::error::Error + 'static)> {
        self.0.source()
    }
}

/// Everything that can go wrong on one connection of a [`StreamSession`][crate::session::StreamSession]
#[derive(Debug, Clone)]
pub enum StreamError {
    /// The server answered with a status that has no dedicated event
    UnexpectedStatus(u16),
    /// The connection went away before a status line arrived
    NoResponse,
    /// The body could not be turned into items
    Item(ItemError),
    Transport(TransportError),
}

impl StreamError {
    /// Status code carried by [`StreamError::UnexpectedStatus`]
    pub fn status_code(&self) -> Option<u16> {
        match self {
            StreamError::UnexpectedStatus(code) => Some(*code),
            _ => None,
        }
    }
}

impl From<ItemError> for StreamError {
    fn from(value: ItemError) -> Self {
        Self::Item(value)
    }
}

impl From<TransportError> for StreamError {
    fn from(value: TransportError) -> Self {
        Self::Transport(value)
    }
}

impl Display for StreamError {
    fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
        match self {
            StreamError::UnexpectedStatus(code) => write!(f, "invalid status code: {code}."),
            StreamError::NoResponse => "connection closed before a response was received".fmt(f),
            StreamError::Item(e) => e.fmt(f),
            StreamError::Transport(e) => write!(f, "transport error: {e}"),
        }
    }
}

impl core::error::Error for StreamError {
    fn source(&self) -> Option<&(dyn core::error::Error + 'static)> {
        match self {
            StreamError::Item(e) => Some(e),
            StreamError::Transport(e) => Some(e),
            StreamError::UnexpectedStatus(_) | StreamError::NoResponse => None,
        }
    }
}
