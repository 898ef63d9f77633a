//! Recording fake renderer shared by the session and coordinator tests.

#![allow(clippy::unwrap_used, dead_code)]

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use camwatch_api::{
    AttemptToken, CredentialPlacement, Endpoint, EndpointFactory, Error, RenderCallbacks,
    RenderEvent, RenderHandle, RenderOptions, Renderer,
};
use camwatch_core::{CatalogTree, SessionConfig, SessionContext};
use secrecy::SecretString;
use tokio::sync::mpsc;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Create { camera: String, attempt: AttemptToken },
    Destroy { camera: String, attempt: AttemptToken },
}

/// Shared log of every renderer interaction, in order.
#[derive(Debug, Clone, Default)]
pub struct Recorder {
    calls: Arc<Mutex<Vec<Call>>>,
    callbacks: Arc<Mutex<Vec<RenderCallbacks>>>,
    urls: Arc<Mutex<Vec<String>>>,
    refuse: Arc<AtomicBool>,
}

impl Recorder {
    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn creates(&self) -> usize {
        self.calls()
            .iter()
            .filter(|c| matches!(c, Call::Create { .. }))
            .count()
    }

    pub fn destroys(&self) -> usize {
        self.calls()
            .iter()
            .filter(|c| matches!(c, Call::Destroy { .. }))
            .count()
    }

    /// Callbacks handed to the most recent `create`.
    pub fn last_callbacks(&self) -> RenderCallbacks {
        self.callbacks.lock().unwrap().last().cloned().unwrap()
    }

    pub fn last_url(&self) -> String {
        self.urls.lock().unwrap().last().cloned().unwrap()
    }

    /// Make `create` fail until reset.
    pub fn refuse_creates(&self, refuse: bool) {
        self.refuse.store(refuse, Ordering::SeqCst);
    }
}

pub struct FakeRenderer {
    recorder: Recorder,
}

impl FakeRenderer {
    pub fn new(recorder: Recorder) -> Self {
        Self { recorder }
    }
}

impl Renderer for FakeRenderer {
    fn create(
        &self,
        endpoint: &Endpoint,
        options: RenderOptions,
    ) -> Result<Box<dyn RenderHandle>, Error> {
        if self.recorder.refuse.load(Ordering::SeqCst) {
            return Err(Error::RendererUnavailable {
                message: "refused by test".into(),
            });
        }
        let camera = endpoint.camera_id().to_owned();
        let attempt = options.callbacks.attempt();
        self.recorder.calls.lock().unwrap().push(Call::Create {
            camera: camera.clone(),
            attempt,
        });
        self.recorder
            .urls
            .lock()
            .unwrap()
            .push(endpoint.connect_url().to_string());
        self.recorder
            .callbacks
            .lock()
            .unwrap()
            .push(options.callbacks.clone());
        Ok(Box::new(FakeHandle {
            recorder: self.recorder.clone(),
            camera,
            attempt,
            destroyed: false,
        }))
    }
}

struct FakeHandle {
    recorder: Recorder,
    camera: String,
    attempt: AttemptToken,
    destroyed: bool,
}

#[async_trait]
impl RenderHandle for FakeHandle {
    async fn destroy(&mut self) {
        if self.destroyed {
            return;
        }
        self.destroyed = true;
        tokio::task::yield_now().await;
        self.recorder.calls.lock().unwrap().push(Call::Destroy {
            camera: self.camera.clone(),
            attempt: self.attempt,
        });
    }
}

pub fn endpoints() -> EndpointFactory {
    EndpointFactory::parse("http://nvr.test", "/stream", CredentialPlacement::Query).unwrap()
}

pub fn token(raw: &str) -> SecretString {
    SecretString::from(raw.to_owned())
}

pub fn context(recorder: &Recorder) -> (SessionContext, mpsc::UnboundedReceiver<RenderEvent>) {
    let (events, rx) = mpsc::unbounded_channel();
    (
        SessionContext {
            renderer: Arc::new(FakeRenderer::new(recorder.clone())),
            endpoints: endpoints(),
            events,
            config: SessionConfig::default(),
        },
        rx,
    )
}

/// HQ / 1 / [Lobby (Entrance), Back Door (Rear)], plus an empty Annex.
pub fn seed() -> CatalogTree {
    CatalogTree::from_json(
        r#"[
        {"id": "b1", "name": "HQ", "address": "1 Main St", "floors": [
            {"id": "b1-f1", "name": "1", "cameras": [
                {"id": "b1-f1-c1", "name": "Lobby", "type": "Fixed Camera", "location": "Entrance"},
                {"id": "b1-f1-c2", "name": "Back Door", "type": "CCTV", "location": "Rear"}
            ]}
        ]},
        {"id": "b2", "name": "Annex", "address": "2 Side St", "floors": []}
    ]"#,
    )
    .unwrap()
}
