//! Coordinator ordering, token and catalog reactions.

#![allow(clippy::unwrap_used)]

mod common;

use std::sync::Arc;
use std::time::Duration;

use camwatch_api::{RenderEvent, RenderFailure, RenderSignal};
use camwatch_core::{
    Catalog, SelectionController, SessionConfig, SessionCoordinator, SessionError, SessionState,
    TokenCell,
};
use common::{Call, FakeRenderer, Recorder};
use pretty_assertions::assert_eq;
use tokio_util::sync::CancellationToken;

struct Rig {
    recorder: Recorder,
    catalog: Arc<Catalog>,
    tokens: Arc<TokenCell>,
    coordinator: SessionCoordinator,
}

fn rig(token: Option<&str>) -> Rig {
    let recorder = Recorder::default();
    let catalog = Arc::new(Catalog::new(common::seed()));
    let tokens = Arc::new(TokenCell::new(token.map(common::token)));
    let coordinator = SessionCoordinator::new(
        Arc::clone(&catalog),
        tokens.clone(),
        Arc::new(FakeRenderer::new(recorder.clone())),
        common::endpoints(),
        SessionConfig::default(),
    );
    Rig {
        recorder,
        catalog,
        tokens,
        coordinator,
    }
}

fn camera(rig: &Rig, id: &str) -> camwatch_core::Camera {
    rig.catalog.snapshot().find_camera(&id.into()).unwrap().clone()
}

fn created(camera: &str) -> impl Fn(&Call) -> bool + '_ {
    move |call| matches!(call, Call::Create { camera: c, .. } if c == camera)
}

fn destroyed(camera: &str) -> impl Fn(&Call) -> bool + '_ {
    move |call| matches!(call, Call::Destroy { camera: c, .. } if c == camera)
}

async fn first_frame(rig: &mut Rig) {
    let attempt = rig.coordinator.session().unwrap().attempt();
    rig.coordinator
        .dispatch(RenderEvent {
            attempt,
            signal: RenderSignal::FirstFrame,
        })
        .await;
}

#[tokio::test]
async fn switching_cameras_closes_before_opening() {
    let mut rig = rig(Some("t"));
    let (mut selection, mut changes) = SelectionController::new();

    selection.select_camera(&camera(&rig, "b1-f1-c1"));
    rig.coordinator.on_selection_changed(changes.recv().await.unwrap()).await;
    first_frame(&mut rig).await;

    selection.select_camera(&camera(&rig, "b1-f1-c2"));
    rig.coordinator.on_selection_changed(changes.recv().await.unwrap()).await;

    let calls = rig.recorder.calls();
    let close_x = calls.iter().position(destroyed("b1-f1-c1")).unwrap();
    let open_y = calls.iter().position(created("b1-f1-c2")).unwrap();
    assert!(close_x < open_y, "{calls:?}");
    assert_eq!(rig.recorder.creates() - rig.recorder.destroys(), 1);
    assert_eq!(
        rig.coordinator.session().unwrap().camera().camera.as_str(),
        "b1-f1-c2"
    );
}

#[tokio::test]
async fn selecting_building_only_closes_session() {
    let mut rig = rig(Some("t"));
    let (mut selection, mut changes) = SelectionController::new();
    selection.select_camera(&camera(&rig, "b1-f1-c1"));
    rig.coordinator.on_selection_changed(changes.recv().await.unwrap()).await;

    selection.select_building("b2".into());
    rig.coordinator.on_selection_changed(changes.recv().await.unwrap()).await;

    assert!(rig.coordinator.session().is_none());
    assert_eq!(rig.recorder.destroys(), 1);
    let status = rig.coordinator.current_status();
    assert_eq!(status.state, SessionState::Idle);
    assert!(status.camera.is_none());
}

#[tokio::test]
async fn no_token_stays_idle_until_renewal() {
    let mut rig = rig(None);
    let (mut selection, mut changes) = SelectionController::new();
    selection.select_camera(&camera(&rig, "b1-f1-c1"));
    rig.coordinator.on_selection_changed(changes.recv().await.unwrap()).await;

    let status = rig.coordinator.current_status();
    assert_eq!(status.state, SessionState::Idle);
    assert_eq!(status.durable_error(), Some(&SessionError::AuthUnavailable));
    assert_eq!(rig.recorder.creates(), 0);

    rig.tokens.set(common::token("fresh"));
    let token = camwatch_core::TokenSource::token(rig.tokens.as_ref());
    rig.coordinator.on_token_changed(token).await;

    assert_eq!(rig.recorder.creates(), 1);
    assert_eq!(rig.coordinator.current_status().state, SessionState::Connecting);
}

#[tokio::test]
async fn revocation_closes_unconditionally() {
    let mut rig = rig(Some("t"));
    let (mut selection, mut changes) = SelectionController::new();
    selection.select_camera(&camera(&rig, "b1-f1-c1"));
    rig.coordinator.on_selection_changed(changes.recv().await.unwrap()).await;
    first_frame(&mut rig).await;

    rig.coordinator.on_token_changed(None).await;

    assert!(rig.coordinator.session().is_none());
    assert_eq!(rig.recorder.destroys(), 1);
    let status = rig.coordinator.current_status();
    assert_eq!(status.durable_error(), Some(&SessionError::AuthUnavailable));
    assert!(status.camera.is_some());
}

#[tokio::test]
async fn renewal_keeps_playing_and_applies_on_reconnect() {
    let mut rig = rig(Some("old"));
    let (mut selection, mut changes) = SelectionController::new();
    selection.select_camera(&camera(&rig, "b1-f1-c1"));
    rig.coordinator.on_selection_changed(changes.recv().await.unwrap()).await;
    first_frame(&mut rig).await;

    rig.coordinator
        .on_token_changed(Some(common::token("new")))
        .await;
    assert_eq!(rig.coordinator.current_status().state, SessionState::Playing);
    assert_eq!(rig.recorder.destroys(), 0);

    let attempt = rig.coordinator.session().unwrap().attempt();
    rig.coordinator
        .dispatch(RenderEvent {
            attempt,
            signal: RenderSignal::Stall,
        })
        .await;
    assert_eq!(rig.coordinator.current_status().state, SessionState::Reconnecting);

    tokio::time::pause();
    tokio::time::advance(Duration::from_secs(1)).await;
    assert!(rig.coordinator.resume_due().await);
    assert!(rig.recorder.last_url().ends_with("access_token=new"));
}

#[tokio::test]
async fn removed_camera_closes_session() {
    let mut rig = rig(Some("t"));
    let (mut selection, mut changes) = SelectionController::new();
    let lobby = camera(&rig, "b1-f1-c1");
    selection.select_camera(&lobby);
    rig.coordinator.on_selection_changed(changes.recv().await.unwrap()).await;

    rig.catalog.remove_camera(&lobby.camera_ref()).unwrap();
    let tree = rig.catalog.snapshot();
    rig.coordinator.on_catalog_changed(&tree).await;

    assert!(rig.coordinator.session().is_none());
    assert!(rig.coordinator.selection().camera().is_none());
    assert_eq!(rig.recorder.destroys(), 1);
}

#[tokio::test]
async fn callbacks_from_previous_camera_are_suppressed() {
    let mut rig = rig(Some("t"));
    let (mut selection, mut changes) = SelectionController::new();
    selection.select_camera(&camera(&rig, "b1-f1-c1"));
    rig.coordinator.on_selection_changed(changes.recv().await.unwrap()).await;
    let old_callbacks = rig.recorder.last_callbacks();

    selection.select_camera(&camera(&rig, "b1-f1-c2"));
    rig.coordinator.on_selection_changed(changes.recv().await.unwrap()).await;

    old_callbacks.on_first_frame();
    old_callbacks.on_error(RenderFailure::Transport("late".into()));
    assert_eq!(rig.coordinator.pump_events().await, 0);
    assert_eq!(rig.coordinator.current_status().state, SessionState::Connecting);

    rig.recorder.last_callbacks().on_first_frame();
    assert_eq!(rig.coordinator.pump_events().await, 1);
    assert_eq!(rig.coordinator.current_status().state, SessionState::Playing);
}

#[tokio::test(start_paused = true)]
async fn run_loop_reconnects_after_backoff_and_shuts_down() {
    let rig = rig(Some("t"));
    let lobby = camera(&rig, "b1-f1-c1");
    let Rig {
        recorder,
        coordinator,
        ..
    } = rig;

    let mut status = coordinator.status();
    let (mut selection, changes) = SelectionController::new();
    let cancel = CancellationToken::new();
    let task = tokio::spawn(coordinator.run(changes, cancel.clone()));

    selection.select_camera(&lobby);
    status
        .wait_for(|s| s.state == SessionState::Connecting)
        .await
        .unwrap();
    assert_eq!(recorder.creates(), 1);

    recorder
        .last_callbacks()
        .on_error(RenderFailure::Transport("connection refused".into()));
    status
        .wait_for(|s| s.state == SessionState::Reconnecting)
        .await
        .unwrap();

    // initial backoff is 500ms; paused time auto-advances to it
    status
        .wait_for(|s| s.state == SessionState::Connecting)
        .await
        .unwrap();
    assert_eq!(recorder.creates(), 2);

    recorder.last_callbacks().on_first_frame();
    status
        .wait_for(|s| s.state == SessionState::Playing && s.reconnect_attempt == 0)
        .await
        .unwrap();

    cancel.cancel();
    task.await.unwrap();
    assert_eq!(recorder.creates(), recorder.destroys());
    assert_eq!(status.borrow().state, SessionState::Closed);
}

#[tokio::test]
async fn run_loop_follows_token_and_catalog_changes() {
    let rig = rig(Some("t"));
    let lobby = camera(&rig, "b1-f1-c1");
    let Rig {
        recorder,
        catalog,
        tokens,
        coordinator,
    } = rig;

    let mut status = coordinator.status();
    let (mut selection, changes) = SelectionController::new();
    let cancel = CancellationToken::new();
    let task = tokio::spawn(coordinator.run(changes, cancel.clone()));

    selection.select_camera(&lobby);
    status
        .wait_for(|s| s.state == SessionState::Connecting)
        .await
        .unwrap();

    tokens.revoke();
    status
        .wait_for(|s| {
            s.state == SessionState::Idle
                && s.camera.is_some()
                && s.durable_error() == Some(&SessionError::AuthUnavailable)
        })
        .await
        .unwrap();
    assert_eq!(recorder.destroys(), 1);

    tokens.set(common::token("fresh"));
    status
        .wait_for(|s| s.state == SessionState::Connecting)
        .await
        .unwrap();
    assert_eq!(recorder.creates(), 2);
    assert!(recorder.last_url().ends_with("access_token=fresh"));

    catalog.remove_camera(&lobby.camera_ref()).unwrap();
    status
        .wait_for(|s| s.state == SessionState::Idle && s.camera.is_none())
        .await
        .unwrap();
    assert_eq!(recorder.destroys(), 2);

    cancel.cancel();
    task.await.unwrap();
    assert_eq!(recorder.creates(), recorder.destroys());
}
