//! Stream session lifecycle against a recording fake renderer.

#![allow(clippy::unwrap_used)]

mod common;

use camwatch_api::{RenderEvent, RenderFailure, RenderSignal};
use camwatch_core::{CameraRef, SessionError, SessionState, StreamSession};
use common::{Call, Recorder};
use pretty_assertions::assert_eq;
use std::io;
use std::sync::{Arc, Mutex};

fn lobby() -> CameraRef {
    CameraRef {
        building: "b1".into(),
        floor: "b1-f1".into(),
        camera: "b1-f1-c1".into(),
    }
}

fn session(recorder: &Recorder) -> StreamSession {
    let (context, _events) = common::context(recorder);
    StreamSession::new(lobby(), context)
}

async fn signal(session: &mut StreamSession, signal: RenderSignal) -> bool {
    let attempt = session.attempt();
    session.handle_event(RenderEvent { attempt, signal }).await
}

fn transport(reason: &str) -> RenderSignal {
    RenderSignal::Failed(RenderFailure::Transport(reason.into()))
}

fn decode(reason: &str) -> RenderSignal {
    RenderSignal::Failed(RenderFailure::Decode(reason.into()))
}

#[tokio::test]
async fn open_without_token_never_dials() {
    let recorder = Recorder::default();
    let mut session = session(&recorder);

    let result = session.open(None).await;

    assert_eq!(result, Err(SessionError::AuthUnavailable));
    assert_eq!(session.state(), SessionState::Idle);
    assert_eq!(session.last_error(), Some(&SessionError::AuthUnavailable));
    assert_eq!(recorder.creates(), 0);
}

#[tokio::test]
async fn endpoint_binds_camera_and_token() {
    let recorder = Recorder::default();
    let mut session = session(&recorder);
    session.open(Some(common::token("abc"))).await.unwrap();

    assert_eq!(session.state(), SessionState::Connecting);
    assert_eq!(
        recorder.last_url(),
        "ws://nvr.test/stream?cameraId=b1-f1-c1&access_token=abc"
    );
    assert!(!session.endpoint().unwrap().to_string().contains("abc"));
}

#[tokio::test]
async fn first_frame_moves_to_playing() {
    let recorder = Recorder::default();
    let mut session = session(&recorder);
    session.open(Some(common::token("t"))).await.unwrap();

    assert!(signal(&mut session, RenderSignal::FirstFrame).await);
    assert_eq!(session.state(), SessionState::Playing);
    assert_eq!(session.reconnect_attempt(), 0);
    assert!(session.last_error().is_none());
}

#[tokio::test]
async fn stall_then_two_connect_failures_then_success() {
    let recorder = Recorder::default();
    let mut session = session(&recorder);
    session.open(Some(common::token("t"))).await.unwrap();
    signal(&mut session, RenderSignal::FirstFrame).await;

    signal(&mut session, RenderSignal::Stall).await;
    assert_eq!(session.state(), SessionState::Reconnecting);
    assert_eq!(session.reconnect_attempt(), 1);
    assert_eq!(session.last_error(), Some(&SessionError::StallTimeout));
    assert!(session.retry_deadline().is_some());
    assert!(!session.has_resources());

    for expected_attempt in [2, 3] {
        assert!(session.resume().await);
        assert_eq!(session.state(), SessionState::Connecting);
        signal(&mut session, transport("connection refused")).await;
        assert_eq!(session.state(), SessionState::Reconnecting);
        assert_eq!(session.reconnect_attempt(), expected_attempt);
    }

    assert!(session.resume().await);
    signal(&mut session, RenderSignal::FirstFrame).await;
    assert_eq!(session.state(), SessionState::Playing);
    assert_eq!(session.reconnect_attempt(), 0);
    assert_eq!(recorder.creates(), 4);
}

#[derive(Clone, Default)]
struct LogBuffer(Arc<Mutex<Vec<u8>>>);

impl io::Write for LogBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl LogBuffer {
    fn transitions(&self) -> Vec<String> {
        let text = String::from_utf8(self.0.lock().unwrap().clone()).unwrap();
        text.lines()
            .filter(|line| line.contains("session state changed"))
            .filter_map(|line| {
                let from = line.split("from=").nth(1)?.split_whitespace().next()?;
                let to = line.split(" state=").nth(1)?.split_whitespace().next()?;
                Some(format!("{from}->{to}"))
            })
            .collect()
    }
}

#[tokio::test]
async fn giving_up_passes_through_reconnecting() {
    let logs = LogBuffer::default();
    let writer = logs.clone();
    let subscriber = tracing_subscriber::fmt()
        .with_ansi(false)
        .with_max_level(tracing::Level::INFO)
        .with_writer(move || writer.clone())
        .finish();
    let _guard = tracing::subscriber::set_default(subscriber);

    let recorder = Recorder::default();
    let mut session = session(&recorder);
    session.open(Some(common::token("t"))).await.unwrap();
    loop {
        signal(&mut session, transport("connection refused")).await;
        if !session.resume().await {
            break;
        }
    }
    assert_eq!(session.state(), SessionState::Failed);

    let transitions = logs.transitions();
    assert_eq!(transitions.last().map(String::as_str), Some("reconnecting->failed"));
    assert!(!transitions.iter().any(|t| t == "connecting->failed"));
}

#[tokio::test]
async fn retry_bound_stops_connection_attempts() {
    let recorder = Recorder::default();
    let mut session = session(&recorder);
    session.open(Some(common::token("t"))).await.unwrap();

    // initial attempt plus max_attempts reconnects, all failing
    loop {
        signal(&mut session, transport("connection refused")).await;
        if !session.resume().await {
            break;
        }
    }

    assert_eq!(session.state(), SessionState::Failed);
    assert_eq!(recorder.creates(), 6);
    assert!(matches!(
        session.last_error(),
        Some(SessionError::MaxRetriesExceeded { attempts: 6, cause })
            if matches!(**cause, SessionError::ConnectFailed { .. })
    ));
    assert!(session.retry_deadline().is_none());

    // terminal: nothing else dials
    assert!(!session.resume().await);
    assert_eq!(recorder.creates(), 6);
}

#[tokio::test]
async fn renderer_refusal_goes_through_reconnect_path() {
    let recorder = Recorder::default();
    recorder.refuse_creates(true);
    let mut session = session(&recorder);
    session.open(Some(common::token("t"))).await.unwrap();

    assert_eq!(session.state(), SessionState::Reconnecting);
    assert!(matches!(
        session.last_error(),
        Some(SessionError::ConnectFailed { .. })
    ));

    recorder.refuse_creates(false);
    assert!(session.resume().await);
    assert_eq!(session.state(), SessionState::Connecting);
    assert_eq!(recorder.creates(), 1);
}

#[tokio::test]
async fn stale_events_from_abandoned_attempts_are_discarded() {
    let recorder = Recorder::default();
    let mut session = session(&recorder);
    session.open(Some(common::token("t"))).await.unwrap();
    let first_attempt = session.attempt();

    signal(&mut session, transport("reset")).await;
    session.resume().await;
    assert_ne!(session.attempt(), first_attempt);

    let stale = RenderEvent {
        attempt: first_attempt,
        signal: RenderSignal::FirstFrame,
    };
    assert!(!session.handle_event(stale).await);
    assert_eq!(session.state(), SessionState::Connecting);
}

#[tokio::test]
async fn transport_loss_while_playing_counts_as_stall() {
    let recorder = Recorder::default();
    let mut session = session(&recorder);
    session.open(Some(common::token("t"))).await.unwrap();
    signal(&mut session, RenderSignal::FirstFrame).await;

    signal(&mut session, transport("stream ended")).await;
    assert_eq!(session.state(), SessionState::Reconnecting);
    assert_eq!(session.last_error(), Some(&SessionError::StallTimeout));
}

#[tokio::test]
async fn repeated_decode_errors_fail_even_after_frames() {
    let recorder = Recorder::default();
    let mut session = session(&recorder);
    session.open(Some(common::token("t"))).await.unwrap();

    for _ in 0..2 {
        signal(&mut session, RenderSignal::FirstFrame).await;
        signal(&mut session, decode("corrupt packet")).await;
        assert_eq!(session.state(), SessionState::Reconnecting);
        session.resume().await;
    }
    signal(&mut session, RenderSignal::FirstFrame).await;
    signal(&mut session, decode("corrupt packet")).await;

    assert_eq!(session.state(), SessionState::Failed);
    assert!(matches!(
        session.last_error(),
        Some(SessionError::MaxRetriesExceeded { cause, .. })
            if matches!(**cause, SessionError::DecodeError { .. })
    ));
}

#[tokio::test]
async fn close_twice_releases_once() {
    let recorder = Recorder::default();
    let mut session = session(&recorder);
    session.open(Some(common::token("t"))).await.unwrap();
    signal(&mut session, RenderSignal::FirstFrame).await;

    session.close().await;
    session.close().await;

    assert_eq!(session.state(), SessionState::Closed);
    assert_eq!(recorder.destroys(), 1);
    assert!(!session.has_resources());
    assert!(!signal(&mut session, RenderSignal::Stall).await);
}

#[tokio::test]
async fn close_while_reconnecting_cancels_pending_retry() {
    let recorder = Recorder::default();
    let mut session = session(&recorder);
    session.open(Some(common::token("t"))).await.unwrap();
    signal(&mut session, transport("refused")).await;
    assert!(session.retry_deadline().is_some());

    session.close().await;

    assert_eq!(session.state(), SessionState::Closed);
    assert!(session.retry_deadline().is_none());
    assert!(!session.resume().await);
    assert_eq!(recorder.creates(), 1);
}

#[tokio::test]
async fn close_from_idle_and_failed() {
    let recorder = Recorder::default();
    let mut idle = session(&recorder);
    idle.close().await;
    assert_eq!(idle.state(), SessionState::Closed);

    let mut failed = session(&recorder);
    failed.open(Some(common::token("t"))).await.unwrap();
    loop {
        signal(&mut failed, transport("refused")).await;
        if !failed.resume().await {
            break;
        }
    }
    failed.close().await;
    assert_eq!(failed.state(), SessionState::Failed);
}

#[tokio::test]
async fn every_attempt_is_destroyed_before_the_next_is_created() {
    let recorder = Recorder::default();
    let mut session = session(&recorder);
    session.open(Some(common::token("t"))).await.unwrap();
    for _ in 0..3 {
        signal(&mut session, transport("refused")).await;
        session.resume().await;
    }
    session.close().await;

    let calls = recorder.calls();
    for pair in calls.chunks(2) {
        assert!(
            matches!(pair, [Call::Create { attempt: a, .. }, Call::Destroy { attempt: b, .. }] if a == b),
            "unexpected order: {calls:?}"
        );
    }
}
