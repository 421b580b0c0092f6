//! Typed items on top of an item stream

use core::{
    error::Error,
    fmt::{self, Display},
    marker::PhantomData,
    pin::Pin,
    task::{Context, Poll, ready},
};

use bytes_utils::Str;
use futures_core::Stream;
use serde::de::DeserializeOwned;

pin_project_lite::pin_project! {
    /// Deserialises each item of `S` as a JSON document.
    ///
    /// A document that fails to deserialise is reported and skipped over, the stream carries on with the next item.
    /// Errors from `S` itself are passed through unchanged.
    #[derive(Debug)]
    pub struct JsonItemStream<T, S, DeserError = serde_json::Error> {
        #[pin]
        stream: S,
        finished: bool,
        output: PhantomData<fn() -> (T, DeserError)>,
    }
}

/// Errors carry the path to the field that failed, via [serde_path_to_error]
pub type PathJsonItemStream<T, S> = JsonItemStream<T, S, serde_path_to_error::Error<serde_json::Error>>;

impl<T, S> JsonItemStream<T, S> {
    #[must_use]
    pub fn new(stream: S) -> Self {
        JsonItemStream {
            stream,
            finished: false,
            output: PhantomData,
        }
    }

    #[must_use]
    pub fn with_paths(stream: S) -> PathJsonItemStream<T, S> {
        JsonItemStream {
            stream,
            finished: false,
            output: PhantomData,
        }
    }
}

impl<T, S, DeserError> JsonItemStream<T, S, DeserError> {
    pub fn into_inner(self) -> S {
        self.stream
    }
}

#[derive(Debug)]
pub enum JsonItemError<E, D> {
    Stream(E),
    Deserialize { item: Str, error: D },
}

impl<E, D> Display for JsonItemError<E, D>
where
    E: Display,
    D: Display,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JsonItemError::Stream(e) => e.fmt(f),
            JsonItemError::Deserialize { error, .. } => write!(f, "malformed item: {error}"),
        }
    }
}

impl<E, D> Error for JsonItemError<E, D>
where
    E: Error + 'static,
    D: Error + 'static,
{
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            JsonItemError::Stream(e) => Some(e),
            JsonItemError::Deserialize { error, .. } => Some(error),
        }
    }
}

/// How one item becomes a `T`, picked by the stream's error type
pub trait ItemDeserializer<T>: Sized {
    fn deserialize(item: &str) -> Result<T, Self>;
}

impl<T: DeserializeOwned> ItemDeserializer<T> for serde_json::Error {
    fn deserialize(item: &str) -> Result<T, Self> {
        serde_json::from_str(item)
    }
}

impl<T: DeserializeOwned> ItemDeserializer<T> for serde_path_to_error::Error<serde_json::Error> {
    fn deserialize(item: &str) -> Result<T, Self> {
        let mut deserializer = serde_json::Deserializer::from_str(item);
        serde_path_to_error::deserialize(&mut deserializer)
    }
}

impl<T, S, E, D> Stream for JsonItemStream<T, S, D>
where
    S: Stream<Item = Result<Str, E>>,
    D: ItemDeserializer<T>,
{
    type Item = Result<T, JsonItemError<E, D>>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.project();
        if *this.finished {
            return Poll::Ready(None);
        }

        let Some(next) = ready!(this.stream.poll_next(cx)) else {
            *this.finished = true;
            return Poll::Ready(None);
        };

        Poll::Ready(Some(next.map_err(JsonItemError::Stream).and_then(|item| {
            D::deserialize(&item).map_err(|error| JsonItemError::Deserialize { item, error })
        })))
    }
}
