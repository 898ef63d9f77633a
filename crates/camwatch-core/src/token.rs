// ── Bearer token source ──
//
// The identity provider seam: the current token (if any) plus a change
// notification. `TokenCell` is the in-process implementation the CLI and
// tests use.

use secrecy::SecretString;
use tokio::sync::watch;

pub trait TokenSource: Send + Sync {
    /// The token to use right now, if the operator has one.
    fn token(&self) -> Option<SecretString>;

    /// Notified on every renewal and revocation.
    fn subscribe(&self) -> watch::Receiver<Option<SecretString>>;
}

#[derive(Debug)]
pub struct TokenCell {
    tx: watch::Sender<Option<SecretString>>,
}

impl TokenCell {
    pub fn new(initial: Option<SecretString>) -> Self {
        let (tx, _) = watch::channel(initial);
        Self { tx }
    }

    pub fn set(&self, token: SecretString) {
        tracing::info!("bearer token renewed");
        self.tx.send_replace(Some(token));
    }

    pub fn revoke(&self) {
        tracing::info!("bearer token revoked");
        self.tx.send_replace(None);
    }

    pub fn is_present(&self) -> bool {
        self.tx.borrow().is_some()
    }
}

impl Default for TokenCell {
    fn default() -> Self {
        Self::new(None)
    }
}

impl TokenSource for TokenCell {
    fn token(&self) -> Option<SecretString> {
        self.tx.borrow().clone()
    }

    fn subscribe(&self) -> watch::Receiver<Option<SecretString>> {
        self.tx.subscribe()
    }
}
