//! A stream that stays connected.
//!
//! [`StreamSession`] owns one connection at a time, turns its body into [`SessionEvent::Item`]s and, when the
//! connection goes away for any reason other than [`StreamSession::close`], waits out the [`BackoffPolicy`] delay
//! and connects again. Every failure is reported as an event, nothing is returned as an error once the session exists.

use std::{
    collections::VecDeque,
    pin::Pin,
    task::{Context, Poll},
    time::Duration,
};

use bytes_utils::Str;
use futures_core::{Stream, future::BoxFuture, ready};
use futures_timer::Delay;
use pin_project_lite::pin_project;

use crate::{
    backoff::{BackoffPolicy, ExhaustedError},
    config::StreamConfig,
    decoder::Decoder,
    errors::{ItemStreamError, StreamError},
    item_stream::ItemStream,
    status::{ContentEncoding, Outcome},
    transport::{ByteStream, Connect, Headers, StreamResponse, TransportError},
};

#[cfg(test)]
mod tests;

/// Everything a session reports, in the order it happened
#[derive(Debug, Clone)]
pub enum SessionEvent {
    /// The server answered 200 and the body is being read
    Open { encoding: ContentEncoding },
    /// One complete item from the body
    Item(Str),
    /// Something went wrong on the current connection, a [`Close`][SessionEvent::Close] follows
    Error(StreamError),
    /// 401
    Unauthorized,
    /// 403
    Forbidden,
    /// 404
    NotFound,
    /// 406
    NotAcceptable,
    /// 413
    PayloadTooLarge,
    /// 416
    RangeNotSatisfiable,
    /// 420
    RateLimited,
    /// The current connection is gone
    Close,
    /// A new connection will be made after `delay`, `attempt` counts from 1 since the last healthy connection
    Reconnect { attempt: u32, delay: Duration },
    /// The backoff is exhausted and the session has stopped for good, see [`StreamSession::restart`]
    MaxReconnectsExceeded { attempts: u32 },
}

impl SessionEvent {
    /// How a non-success [`Outcome`] is reported, [None] for [`Outcome::Success`]
    pub fn rejection(outcome: Outcome) -> Option<Self> {
        let event = match outcome {
            Outcome::Success => return None,
            Outcome::Unauthorized => SessionEvent::Unauthorized,
            Outcome::Forbidden => SessionEvent::Forbidden,
            Outcome::NotFound => SessionEvent::NotFound,
            Outcome::NotAcceptable => SessionEvent::NotAcceptable,
            Outcome::PayloadTooLarge => SessionEvent::PayloadTooLarge,
            Outcome::RangeNotSatisfiable => SessionEvent::RangeNotSatisfiable,
            Outcome::RateLimited => SessionEvent::RateLimited,
            Outcome::ProtocolError(code) => SessionEvent::Error(StreamError::UnexpectedStatus(code)),
        };
        Some(event)
    }

    pub fn item(&self) -> Option<&Str> {
        match self {
            SessionEvent::Item(item) => Some(item),
            _ => None,
        }
    }

    pub fn into_item(self) -> Option<Str> {
        match self {
            SessionEvent::Item(item) => Some(item),
            _ => None,
        }
    }
}

/// Where a [`StreamSession`] currently is
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Not polled yet, or restarted
    Idle,
    /// Waiting on the transport for a status line and headers
    Connecting,
    StreamingBody,
    /// Waiting out the backoff delay
    WaitingToReconnect,
    Exhausted,
    Closed,
}

impl SessionState {
    /// Whether the session will never produce another event without [`StreamSession::restart`]
    pub fn is_terminal(&self) -> bool {
        matches!(self, SessionState::Exhausted | SessionState::Closed)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttemptPhase {
    Pending,
    HeadersReceived,
    StreamingBody,
    Closed,
}

/// What is known about the most recent connection
#[derive(Debug, Clone)]
pub struct ConnectionAttempt {
    phase: AttemptPhase,
    status_code: Option<u16>,
    headers: Headers,
}

impl ConnectionAttempt {
    fn pending() -> Self {
        Self {
            phase: AttemptPhase::Pending,
            status_code: None,
            headers: Headers::new(),
        }
    }

    pub fn phase(&self) -> AttemptPhase {
        self.phase
    }

    pub fn status_code(&self) -> Option<u16> {
        self.status_code
    }

    pub fn headers(&self) -> &Headers {
        &self.headers
    }
}

pin_project! {
    #[project = ConnectionStateProjection]
    enum ConnectionState {
        Idle,
        Connecting {
            #[pin]
            future: BoxFuture<'static, Result<StreamResponse, TransportError>>,
        },
        Streaming {
            #[pin]
            items: ItemStream<ByteStream>,
        },
        Retrying {
            #[pin]
            delay: Delay,
        },
        Exhausted,
        Closed,
    }
}

pin_project! {
    /// Long-lived stream of [`SessionEvent`]s over reconnecting connections.
    ///
    /// Nothing happens until the session is first polled. Dropping it or calling [`close`][Self::close] tears down the
    /// connection or pending reconnect, after which no further events are produced.
    #[project = StreamSessionProjection]
    pub struct StreamSession<C> {
        connector: C,
        config: StreamConfig,
        backoff: BackoffPolicy,
        #[pin]
        connection_state: ConnectionState,
        attempt: Option<ConnectionAttempt>,
        pending: VecDeque<SessionEvent>,
    }
}

impl<C> StreamSession<C> {
    pub fn new(connector: C, config: StreamConfig) -> Self {
        let backoff = BackoffPolicy::new(config.backoff);
        Self {
            connector,
            config,
            backoff,
            connection_state: ConnectionState::Idle,
            attempt: None,
            pending: VecDeque::new(),
        }
    }

    /// Starts from an existing backoff state instead of a fresh one
    #[must_use]
    pub fn with_backoff(mut self, backoff: BackoffPolicy) -> Self {
        self.backoff = backoff;
        self
    }

    pub fn config(&self) -> &StreamConfig {
        &self.config
    }

    pub fn connector(&self) -> &C {
        &self.connector
    }

    pub fn backoff(&self) -> &BackoffPolicy {
        &self.backoff
    }

    /// The current connection, or the last one if the session is between connections
    pub fn attempt(&self) -> Option<&ConnectionAttempt> {
        self.attempt.as_ref()
    }

    pub fn state(&self) -> SessionState {
        match &self.connection_state {
            ConnectionState::Idle => SessionState::Idle,
            ConnectionState::Connecting { .. } => SessionState::Connecting,
            ConnectionState::Streaming { .. } => SessionState::StreamingBody,
            ConnectionState::Retrying { .. } => SessionState::WaitingToReconnect,
            ConnectionState::Exhausted => SessionState::Exhausted,
            ConnectionState::Closed => SessionState::Closed,
        }
    }

    /// Shuts the session down without reconnecting. Any connection or pending reconnect is dropped along with events
    /// that have not been polled yet, the stream yields [None] from here on.
    pub fn close(&mut self) {
        if !self.state().is_terminal() {
            tracing::debug!("stream closed by the application");
        }
        self.pending.clear();
        if let Some(attempt) = self.attempt.as_mut() {
            attempt.phase = AttemptPhase::Closed;
        }
        self.connection_state = ConnectionState::Closed;
    }

    /// Drops the current connection or pending reconnect and connects again on the next poll, leaving the backoff as
    /// it is. Does nothing once the session is closed or exhausted, use [`restart`][Self::restart] for that.
    pub fn reconnect_now(&mut self) {
        if self.state().is_terminal() {
            return;
        }
        tracing::debug!("immediate reconnect requested");
        self.pending.clear();
        if let Some(attempt) = self.attempt.as_mut() {
            attempt.phase = AttemptPhase::Closed;
        }
        self.connection_state = ConnectionState::Idle;
    }

    /// Brings a session back from any state, including exhausted or closed, with a fresh backoff
    pub fn restart(&mut self) {
        tracing::debug!("stream restarted");
        self.pending.clear();
        self.backoff.reset();
        self.attempt = None;
        self.connection_state = ConnectionState::Idle;
    }
}

impl<C> StreamSessionProjection<'_, C>
where
    C: Connect,
{
    fn start_connection(&mut self) {
        let (host, port) = self.config.connect_target();
        tracing::debug!(host, port, url = %self.config.url(), "connecting");

        let future = self.connector.connect(self.config);
        *self.attempt = Some(ConnectionAttempt::pending());
        self.connection_state
            .set(ConnectionState::Connecting { future });
    }

    fn handle_response(&mut self, response: StreamResponse) {
        let StreamResponse {
            status,
            headers,
            body,
        } = response;

        let encoding = headers.content_encoding();
        if let Some(attempt) = self.attempt.as_mut() {
            attempt.phase = AttemptPhase::HeadersReceived;
            attempt.status_code = Some(status);
            attempt.headers = headers;
        }

        // a zero status means the transport never saw a status line
        if status == 0 {
            self.fail(StreamError::NoResponse);
            return;
        }

        match Outcome::classify(status) {
            Outcome::Success => {
                tracing::info!(status, ?encoding, "stream open");
                self.backoff.reset();
                if let Some(attempt) = self.attempt.as_mut() {
                    attempt.phase = AttemptPhase::StreamingBody;
                }

                let items =
                    ItemStream::with_parts(body, Decoder::for_encoding(encoding), self.config.tokenizer());
                self.connection_state
                    .set(ConnectionState::Streaming { items });
                self.pending.push_back(SessionEvent::Open { encoding });
            }
            outcome => {
                drop(body);
                tracing::warn!(status, ?outcome, "stream rejected");
                if let Some(event) = SessionEvent::rejection(outcome) {
                    self.pending.push_back(event);
                }
                self.connection_lost();
            }
        }
    }

    fn fail(&mut self, error: StreamError) {
        tracing::warn!(%error, "stream error");
        self.pending.push_back(SessionEvent::Error(error));
        self.connection_lost();
    }

    fn connection_lost(&mut self) {
        if let Some(attempt) = self.attempt.as_mut() {
            attempt.phase = AttemptPhase::Closed;
        }
        self.pending.push_back(SessionEvent::Close);

        if !self.config.auto_reconnect {
            tracing::info!("connection closed and reconnecting is disabled");
            self.connection_state.set(ConnectionState::Closed);
            return;
        }

        match self.backoff.record_failure_and_advance() {
            Ok(delay) => {
                let attempt = self.backoff.attempt_count();
                tracing::info!(attempt, ?delay, "reconnecting");
                self.pending
                    .push_back(SessionEvent::Reconnect { attempt, delay });
                self.connection_state.set(ConnectionState::Retrying {
                    delay: Delay::new(delay),
                });
            }
            Err(ExhaustedError { attempts }) => {
                tracing::error!(attempts, "maximum reconnects exceeded, giving up");
                self.pending
                    .push_back(SessionEvent::MaxReconnectsExceeded { attempts });
                self.connection_state.set(ConnectionState::Exhausted);
            }
        }
    }
}

impl<C> Stream for StreamSession<C>
where
    C: Connect,
{
    type Item = SessionEvent;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let mut this = self.project();

        loop {
            if let Some(event) = this.pending.pop_front() {
                return Poll::Ready(Some(event));
            }

            match this.connection_state.as_mut().project() {
                ConnectionStateProjection::Idle => this.start_connection(),
                ConnectionStateProjection::Connecting { future } => match ready!(future.poll(cx)) {
                    Ok(response) => this.handle_response(response),
                    Err(e) => this.fail(StreamError::Transport(e)),
                },
                ConnectionStateProjection::Streaming { items } => match ready!(items.poll_next(cx)) {
                    Some(Ok(item)) => return Poll::Ready(Some(SessionEvent::Item(item))),
                    Some(Err(ItemStreamError::Transport(e))) => this.fail(StreamError::Transport(e)),
                    Some(Err(ItemStreamError::Item(e))) => this.fail(StreamError::Item(e)),
                    None => {
                        tracing::info!("server ended the stream");
                        this.connection_lost();
                    }
                },
                ConnectionStateProjection::Retrying { delay } => {
                    ready!(delay.poll(cx));
                    this.start_connection();
                }
                ConnectionStateProjection::Exhausted | ConnectionStateProjection::Closed => {
                    return Poll::Ready(None);
                }
            }
        }
    }
}
