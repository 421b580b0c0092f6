use std::{
    collections::VecDeque,
    io::Write,
    sync::{
        Arc, Mutex,
        atomic::{AtomicUsize, Ordering},
    },
};

use bytes::Bytes;
use flate2::{Compression, write::GzEncoder};
use futures::prelude::*;

use super::*;
use crate::{backoff::BackoffConfig, errors::ItemError};

type Scripted = Result<StreamResponse, TransportError>;

/// Hands out scripted responses in order, refusing connections once the script runs out
#[derive(Clone, Default)]
struct ScriptedConnector {
    script: Arc<Mutex<VecDeque<Scripted>>>,
    connects: Arc<AtomicUsize>,
}

impl ScriptedConnector {
    fn new(script: impl IntoIterator<Item = Scripted>) -> Self {
        let connector = Self::default();
        connector.script.lock().unwrap().extend(script);
        connector
    }

    fn push(&self, response: Scripted) {
        self.script.lock().unwrap().push_back(response);
    }

    fn connects(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }
}

impl Connect for ScriptedConnector {
    fn connect(&self, _config: &StreamConfig) -> BoxFuture<'static, Result<StreamResponse, TransportError>> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        let next = self
            .script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(TransportError::msg("connection refused")));
        Box::pin(async move { next })
    }
}

fn body(chunks: Vec<Result<Bytes, TransportError>>) -> ByteStream {
    Box::pin(futures::stream::iter(chunks))
}

fn response(status: u16, headers: &[(&str, &str)], chunks: &[&'static [u8]]) -> Scripted {
    let chunks = chunks.iter().map(|c| Ok(Bytes::from_static(c))).collect();
    Ok(StreamResponse::new(
        status,
        headers.iter().copied().collect(),
        body(chunks),
    ))
}

/// 200 whose body never ends after `chunks`
fn open_response(chunks: &[&'static [u8]]) -> Scripted {
    let chunks = chunks
        .iter()
        .map(|c| Ok(Bytes::from_static(c)))
        .collect::<Vec<_>>();
    Ok(StreamResponse::new(
        200,
        Headers::new(),
        Box::pin(futures::stream::iter(chunks).chain(futures::stream::pending())),
    ))
}

fn fast_config() -> StreamConfig {
    StreamConfig::default().with_backoff(
        BackoffConfig::default()
            .with_start(Duration::from_millis(1))
            .with_increment(Duration::from_millis(1))
            .with_max_delay(Duration::from_millis(5)),
    )
}

async fn take<C: Connect>(session: &mut StreamSession<C>, n: usize) -> Vec<SessionEvent> {
    let mut events = Vec::with_capacity(n);
    for _ in 0..n {
        events.push(session.next().await.expect("session ended early"));
    }
    events
}

#[tokio::test]
async fn item_is_delivered_once() {
    let connector = ScriptedConnector::new([response(200, &[], &[b"hello\r"])]);
    let mut session = StreamSession::new(connector, StreamConfig::default());
    assert_eq!(session.state(), SessionState::Idle);

    let events = take(&mut session, 4).await;
    assert!(matches!(
        events[0],
        SessionEvent::Open {
            encoding: ContentEncoding::Identity
        }
    ));
    assert_eq!(events[1].item(), Some(&Str::from_static("hello")));
    assert!(matches!(events[2], SessionEvent::Close));
    assert!(matches!(
        events[3],
        SessionEvent::Reconnect { attempt: 1, delay } if delay == Duration::from_millis(500)
    ));
    assert_eq!(session.state(), SessionState::WaitingToReconnect);
}

#[tokio::test]
async fn unexpected_status_is_an_error_then_reconnect() {
    let connector = ScriptedConnector::new([response(503, &[], &[])]);
    let mut session = StreamSession::new(connector, StreamConfig::default());

    let events = take(&mut session, 3).await;
    match &events[0] {
        SessionEvent::Error(error) => {
            assert_eq!(error.status_code(), Some(503));
            assert!(error.to_string().contains("503"));
        }
        other => panic!("expected an error, got {other:?}"),
    }
    assert!(matches!(events[1], SessionEvent::Close));
    assert!(matches!(
        events[2],
        SessionEvent::Reconnect { attempt: 1, delay } if delay == Duration::from_millis(500)
    ));

    let attempt = session.attempt().unwrap();
    assert_eq!(attempt.status_code(), Some(503));
    assert_eq!(attempt.phase(), AttemptPhase::Closed);
    assert_eq!(session.backoff().attempt_count(), 1);
}

#[tokio::test]
async fn named_statuses_have_their_own_events() {
    let cases = [
        (401, SessionEvent::Unauthorized),
        (403, SessionEvent::Forbidden),
        (404, SessionEvent::NotFound),
        (406, SessionEvent::NotAcceptable),
        (413, SessionEvent::PayloadTooLarge),
        (416, SessionEvent::RangeNotSatisfiable),
        (420, SessionEvent::RateLimited),
    ];

    for (status, expected) in cases {
        let connector = ScriptedConnector::new([response(status, &[], &[])]);
        let mut session = StreamSession::new(connector, StreamConfig::default());

        let events = take(&mut session, 3).await;
        assert_eq!(
            std::mem::discriminant(&events[0]),
            std::mem::discriminant(&expected),
            "status {status} gave {:?}",
            events[0]
        );
        assert!(matches!(events[1], SessionEvent::Close));
        assert!(matches!(events[2], SessionEvent::Reconnect { attempt: 1, .. }));
    }
}

#[tokio::test]
async fn gives_up_after_eleven_failures() {
    let connector = ScriptedConnector::new([]);
    let mut session = StreamSession::new(connector.clone(), fast_config());

    let events = (&mut session).collect::<Vec<_>>().await;

    let errors = events
        .iter()
        .filter(|e| matches!(e, SessionEvent::Error(StreamError::Transport(_))))
        .count();
    let closes = events
        .iter()
        .filter(|e| matches!(e, SessionEvent::Close))
        .count();
    let reconnects = events
        .iter()
        .filter_map(|e| match e {
            SessionEvent::Reconnect { attempt, .. } => Some(*attempt),
            _ => None,
        })
        .collect::<Vec<_>>();
    let exhausted = events
        .iter()
        .filter(|e| matches!(e, SessionEvent::MaxReconnectsExceeded { .. }))
        .count();

    assert_eq!(errors, 11);
    assert_eq!(closes, 11);
    assert_eq!(reconnects, (1..=10).collect::<Vec<_>>());
    assert_eq!(exhausted, 1);
    assert!(matches!(
        events.last(),
        Some(SessionEvent::MaxReconnectsExceeded { attempts: 11 })
    ));
    assert_eq!(connector.connects(), 11);
    assert_eq!(session.state(), SessionState::Exhausted);

    // stays finished
    assert!(session.next().await.is_none());
    assert_eq!(connector.connects(), 11);
}

#[tokio::test]
async fn gzip_bodies_are_inflated() {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(b"{\"id\":1}\r\n{\"id\":2}\r\n").unwrap();
    let compressed = Bytes::from(encoder.finish().unwrap());
    let (head, tail) = compressed.split_at(compressed.len() / 3);

    let connector = ScriptedConnector::new([Ok(StreamResponse::new(
        200,
        [("Content-Encoding", "gzip")].into_iter().collect(),
        body(vec![
            Ok(Bytes::copy_from_slice(head)),
            Ok(Bytes::copy_from_slice(tail)),
        ]),
    ))]);
    let mut session = StreamSession::new(connector, StreamConfig::default());

    let events = take(&mut session, 4).await;
    assert!(matches!(
        events[0],
        SessionEvent::Open {
            encoding: ContentEncoding::Gzip
        }
    ));
    assert_eq!(events[1].item(), Some(&Str::from_static("{\"id\":1}")));
    assert_eq!(events[2].item(), Some(&Str::from_static("{\"id\":2}")));
    assert!(matches!(events[3], SessionEvent::Close));
}

#[tokio::test]
async fn keep_alives_are_not_items() {
    let connector = ScriptedConnector::new([response(
        200,
        &[],
        &[b"\r\n", b"\r\n", b"{\"a\":1}\r\n", b"\r\n"],
    )]);
    let mut session = StreamSession::new(connector, StreamConfig::default());

    let events = take(&mut session, 3).await;
    assert!(matches!(events[0], SessionEvent::Open { .. }));
    assert_eq!(events[1].item(), Some(&Str::from_static("{\"a\":1}")));
    assert!(matches!(events[2], SessionEvent::Close));
}

#[tokio::test]
async fn close_cancels_a_pending_reconnect() {
    let connector = ScriptedConnector::new([response(503, &[], &[])]);
    let mut session = StreamSession::new(connector.clone(), fast_config());

    let events = take(&mut session, 3).await;
    assert!(matches!(events[2], SessionEvent::Reconnect { .. }));

    session.close();
    assert_eq!(session.state(), SessionState::Closed);
    assert!(session.next().await.is_none());

    tokio::time::sleep(Duration::from_millis(20)).await;
    assert!(session.next().await.is_none());
    assert_eq!(connector.connects(), 1);
}

#[tokio::test]
async fn close_while_streaming() {
    let connector = ScriptedConnector::new([open_response(&[b"one\r"])]);
    let mut session = StreamSession::new(connector.clone(), StreamConfig::default());

    let events = take(&mut session, 2).await;
    assert!(matches!(events[0], SessionEvent::Open { .. }));
    assert_eq!(events[1].item(), Some(&Str::from_static("one")));
    assert_eq!(session.state(), SessionState::StreamingBody);

    session.close();
    assert!(session.next().await.is_none());
    assert_eq!(session.attempt().unwrap().phase(), AttemptPhase::Closed);
    assert_eq!(connector.connects(), 1);
}

#[tokio::test]
async fn healthy_connection_resets_backoff() {
    let connector = ScriptedConnector::new([
        Err(TransportError::msg("connection refused")),
        Err(TransportError::msg("connection refused")),
        response(200, &[], &[b"x\r"]),
    ]);
    let mut session = StreamSession::new(connector, fast_config());

    let events = take(&mut session, 6).await;
    assert!(matches!(events[2], SessionEvent::Reconnect { attempt: 1, .. }));
    assert!(matches!(events[5], SessionEvent::Reconnect { attempt: 2, .. }));

    let events = take(&mut session, 4).await;
    assert!(matches!(events[0], SessionEvent::Open { .. }));
    assert_eq!(events[1].item(), Some(&Str::from_static("x")));
    assert!(matches!(events[2], SessionEvent::Close));
    assert!(matches!(
        events[3],
        SessionEvent::Reconnect { attempt: 1, delay } if delay == Duration::from_millis(2)
    ));
}

#[tokio::test]
async fn oversize_line_closes_the_connection() {
    let connector = ScriptedConnector::new([response(200, &[], &[b"0123456789abcdef\r"])]);
    let mut session = StreamSession::new(connector, StreamConfig::default().with_max_line_length(8));

    let events = take(&mut session, 4).await;
    assert!(matches!(events[0], SessionEvent::Open { .. }));
    assert!(matches!(
        &events[1],
        SessionEvent::Error(StreamError::Item(ItemError::LineTooLong(_)))
    ));
    assert!(matches!(events[2], SessionEvent::Close));
    assert!(matches!(events[3], SessionEvent::Reconnect { attempt: 1, .. }));
}

#[tokio::test]
async fn compressed_oversize_line_closes_the_connection() {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(&vec![b'a'; 4 * 1024 * 1024]).unwrap();
    let compressed = Bytes::from(encoder.finish().unwrap());

    let connector = ScriptedConnector::new([Ok(StreamResponse::new(
        200,
        [("Content-Encoding", "gzip")].into_iter().collect(),
        body(vec![Ok(compressed)]),
    ))]);
    let mut session = StreamSession::new(
        connector,
        StreamConfig::default().with_max_line_length(64 * 1024),
    );

    let events = take(&mut session, 4).await;
    assert!(matches!(
        &events[1],
        SessionEvent::Error(StreamError::Item(ItemError::LineTooLong(_)))
    ));
    assert!(matches!(events[2], SessionEvent::Close));
    assert!(matches!(events[3], SessionEvent::Reconnect { attempt: 1, .. }));
}

#[tokio::test]
async fn corrupt_gzip_closes_the_connection() {
    let connector = ScriptedConnector::new([response(
        200,
        &[("content-encoding", "gzip")],
        &[b"plain text pretending to be gzip\r\n"],
    )]);
    let mut session = StreamSession::new(connector, StreamConfig::default());

    let events = take(&mut session, 3).await;
    assert!(matches!(
        &events[1],
        SessionEvent::Error(StreamError::Item(ItemError::Decode(_)))
    ));
    assert!(matches!(events[2], SessionEvent::Close));
}

#[tokio::test]
async fn transport_error_mid_body() {
    let connector = ScriptedConnector::new([Ok(StreamResponse::new(
        200,
        Headers::new(),
        body(vec![
            Ok(Bytes::from_static(b"a\r")),
            Err(TransportError::msg("connection reset by peer")),
        ]),
    ))]);
    let mut session = StreamSession::new(connector, StreamConfig::default());

    let events = take(&mut session, 5).await;
    assert_eq!(events[1].item(), Some(&Str::from_static("a")));
    match &events[2] {
        SessionEvent::Error(error @ StreamError::Transport(_)) => {
            assert!(error.to_string().contains("connection reset by peer"));
        }
        other => panic!("expected a transport error, got {other:?}"),
    }
    assert!(matches!(events[3], SessionEvent::Close));
    assert!(matches!(events[4], SessionEvent::Reconnect { attempt: 1, .. }));
}

#[tokio::test]
async fn zero_status_is_a_network_failure() {
    let connector = ScriptedConnector::new([response(0, &[], &[])]);
    let mut session = StreamSession::new(connector, StreamConfig::default());

    let events = take(&mut session, 3).await;
    assert!(matches!(
        events[0],
        SessionEvent::Error(StreamError::NoResponse)
    ));
    assert!(matches!(events[1], SessionEvent::Close));
    assert!(matches!(events[2], SessionEvent::Reconnect { attempt: 1, .. }));
}

#[tokio::test]
async fn no_auto_reconnect_ends_after_close() {
    let connector = ScriptedConnector::new([response(200, &[], &[b"a\r"])]);
    let mut session = StreamSession::new(
        connector.clone(),
        StreamConfig::default().with_auto_reconnect(false),
    );

    let events = (&mut session).collect::<Vec<_>>().await;
    assert_eq!(events.len(), 3);
    assert!(matches!(events[2], SessionEvent::Close));
    assert_eq!(session.state(), SessionState::Closed);
    assert_eq!(session.backoff().attempt_count(), 0);
    assert_eq!(connector.connects(), 1);
}

#[tokio::test]
async fn partial_items_do_not_survive_a_reconnect() {
    let connector = ScriptedConnector::new([
        response(200, &[], &[b"first\rpar"]),
        response(200, &[], &[b"tial\r"]),
    ]);
    let mut session = StreamSession::new(connector, fast_config());

    let items = (&mut session)
        .take_while(|e| futures::future::ready(!matches!(e, SessionEvent::MaxReconnectsExceeded { .. })))
        .filter_map(|e| futures::future::ready(e.into_item()))
        .collect::<Vec<_>>()
        .await;

    assert_eq!(
        items,
        vec![Str::from_static("first"), Str::from_static("tial")]
    );
}

#[tokio::test]
async fn restart_after_exhaustion() {
    let connector = ScriptedConnector::new([]);
    let config = fast_config().with_backoff(
        BackoffConfig::default()
            .with_start(Duration::from_millis(1))
            .with_increment(Duration::from_millis(1))
            .with_max_reconnects(1),
    );
    let mut session = StreamSession::new(connector.clone(), config);

    let events = (&mut session).collect::<Vec<_>>().await;
    assert!(matches!(
        events.last(),
        Some(SessionEvent::MaxReconnectsExceeded { attempts: 2 })
    ));
    assert!(session.state().is_terminal());

    // reconnect_now can't revive a finished session
    session.reconnect_now();
    assert_eq!(session.state(), SessionState::Exhausted);

    connector.push(response(200, &[], &[b"back\r"]));
    session.restart();
    assert_eq!(session.state(), SessionState::Idle);
    assert_eq!(session.backoff().attempt_count(), 0);

    let events = take(&mut session, 2).await;
    assert!(matches!(events[0], SessionEvent::Open { .. }));
    assert_eq!(events[1].item(), Some(&Str::from_static("back")));
}

#[tokio::test]
async fn reconnect_now_skips_the_backoff() {
    let connector = ScriptedConnector::new([
        open_response(&[b"one\r"]),
        open_response(&[b"two\r"]),
    ]);
    let mut session = StreamSession::new(connector.clone(), StreamConfig::default());

    let events = take(&mut session, 2).await;
    assert_eq!(events[1].item(), Some(&Str::from_static("one")));

    assert_eq!(session.attempt().unwrap().phase(), AttemptPhase::StreamingBody);
    session.reconnect_now();
    assert_eq!(session.state(), SessionState::Idle);
    assert_eq!(session.attempt().unwrap().phase(), AttemptPhase::Closed);

    let events = take(&mut session, 2).await;
    assert!(matches!(events[0], SessionEvent::Open { .. }));
    assert_eq!(events[1].item(), Some(&Str::from_static("two")));
    assert_eq!(connector.connects(), 2);
    assert_eq!(session.backoff().attempt_count(), 0);
}

#[tokio::test]
async fn resumed_backoff_is_used() {
    let connector = ScriptedConnector::new([]);
    let config = fast_config();
    let backoff = BackoffPolicy::resume(config.backoff, Duration::from_millis(3), 4);
    let mut session = StreamSession::new(connector, config).with_backoff(backoff);

    let events = take(&mut session, 3).await;
    assert!(matches!(
        events[2],
        SessionEvent::Reconnect { attempt: 5, delay } if delay == Duration::from_millis(4)
    ));
}

#[test]
fn rejection_mapping() {
    assert!(SessionEvent::rejection(Outcome::Success).is_none());
    assert!(matches!(
        SessionEvent::rejection(Outcome::ProtocolError(499)),
        Some(SessionEvent::Error(StreamError::UnexpectedStatus(499)))
    ));
    assert!(matches!(
        SessionEvent::rejection(Outcome::RateLimited),
        Some(SessionEvent::RateLimited)
    ));
}
