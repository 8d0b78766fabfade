use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use thiserror::Error;
use tokio::sync::watch;
use tracing::{error, info, warn};
use uuid::Uuid;

use solace_platform::{Authenticator, ClientConfig, DocumentStore, HttpPlatform, PersistenceMode};
use solace_types::error::PlatformError;
use solace_types::models::Identity;

/// An established client session: who we are and where documents go.
///
/// Cheap to clone; downstream components take it by value. `store` is absent
/// only when bootstrap failed outright, which puts the client in unsaved
/// mode: reads and writes become logged no-ops.
#[derive(Clone)]
pub struct Session {
    pub user_id: String,
    pub authenticated: bool,
    pub app_id: String,
    store: Option<Arc<dyn DocumentStore>>,
}

impl Session {
    pub fn new(
        user_id: impl Into<String>,
        authenticated: bool,
        app_id: impl Into<String>,
        store: Option<Arc<dyn DocumentStore>>,
    ) -> Self {
        Self {
            user_id: user_id.into(),
            authenticated,
            app_id: app_id.into(),
            store,
        }
    }

    pub fn store(&self) -> Option<&Arc<dyn DocumentStore>> {
        self.store.as_ref()
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("user_id", &self.user_id)
            .field("authenticated", &self.authenticated)
            .field("app_id", &self.app_id)
            .field("store", &self.store.is_some())
            .finish()
    }
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error("platform connection failed: {0}")]
    Connect(PlatformError),
    #[error("authentication failed: {0}")]
    Auth(PlatformError),
}

/// Brings a session up and keeps publishing the current one.
///
/// Subscribers get every session change over a watch channel: the initial
/// sign-in, any later auth-state change, and the degraded fallback when
/// bootstrap fails.
#[derive(Clone)]
pub struct SessionBootstrapper {
    inner: Arc<BootstrapperInner>,
}

struct BootstrapperInner {
    config: ClientConfig,
    injected: Option<(Arc<dyn Authenticator>, Arc<dyn DocumentStore>)>,
    session_tx: watch::Sender<Option<Session>>,
    watcher_started: AtomicBool,
}

impl SessionBootstrapper {
    /// Uses the production HTTP platform built from `config`.
    pub fn new(config: ClientConfig) -> Self {
        Self::build(config, None)
    }

    /// Injects backend handles instead of connecting over HTTP.
    pub fn with_backends(
        config: ClientConfig,
        authenticator: Arc<dyn Authenticator>,
        store: Arc<dyn DocumentStore>,
    ) -> Self {
        Self::build(config, Some((authenticator, store)))
    }

    fn build(
        config: ClientConfig,
        injected: Option<(Arc<dyn Authenticator>, Arc<dyn DocumentStore>)>,
    ) -> Self {
        let (session_tx, _) = watch::channel(None);
        Self {
            inner: Arc::new(BootstrapperInner {
                config,
                injected,
                session_tx,
                watcher_started: AtomicBool::new(false),
            }),
        }
    }

    /// Current-session stream. Seed value is `None` until bootstrap runs.
    pub fn subscribe(&self) -> watch::Receiver<Option<Session>> {
        self.inner.session_tx.subscribe()
    }

    /// Brings the session up, in order: connect the platform, force the
    /// credential cache to in-memory, authenticate (one-time token when the
    /// environment supplied one, anonymously otherwise), then start the
    /// identity watcher.
    ///
    /// On failure the error is logged and returned, and a degraded session
    /// under a fresh random id is still published, so subscribers can carry
    /// on in unsaved mode. Call once at startup.
    pub async fn initialize(&self) -> Result<Session, BootstrapError> {
        match self.try_initialize().await {
            Ok(session) => Ok(session),
            Err(err) => {
                error!("Session bootstrap failed: {err}");
                let fallback = Session {
                    user_id: Uuid::new_v4().to_string(),
                    authenticated: false,
                    app_id: self.inner.config.app_id.clone(),
                    store: None,
                };
                warn!("Continuing without a store as {}", fallback.user_id);
                self.inner.session_tx.send_replace(Some(fallback));
                Err(err)
            }
        }
    }

    async fn try_initialize(&self) -> Result<Session, BootstrapError> {
        let (authenticator, store) = match &self.inner.injected {
            Some((authenticator, store)) => (authenticator.clone(), store.clone()),
            None => {
                let platform = Arc::new(
                    HttpPlatform::connect(self.inner.config.platform.clone())
                        .await
                        .map_err(BootstrapError::Connect)?,
                );
                (
                    platform.clone() as Arc<dyn Authenticator>,
                    platform as Arc<dyn DocumentStore>,
                )
            }
        };

        // The host environment may be sandboxed; never leave credentials on
        // disk there.
        authenticator
            .set_persistence(PersistenceMode::InMemory)
            .await
            .map_err(BootstrapError::Connect)?;

        let identity = match &self.inner.config.auth_token {
            Some(token) => authenticator.sign_in_with_token(token).await,
            None => authenticator.sign_in_anonymously().await,
        }
        .map_err(BootstrapError::Auth)?;
        info!("Signed in as {}", identity.user_id);

        let session = Session {
            user_id: identity.user_id,
            authenticated: true,
            app_id: self.inner.config.app_id.clone(),
            store: Some(store.clone()),
        };
        self.inner.session_tx.send_replace(Some(session.clone()));

        self.spawn_identity_watcher(authenticator.watch_identity(), store);

        Ok(session)
    }

    /// Translates auth-state changes into published sessions for as long as
    /// the authenticator lives. A signed-out state maps to a throwaway
    /// unauthenticated identity so the UI never loses its user id.
    fn spawn_identity_watcher(
        &self,
        mut identities: watch::Receiver<Option<Identity>>,
        store: Arc<dyn DocumentStore>,
    ) {
        if self.inner.watcher_started.swap(true, Ordering::SeqCst) {
            return;
        }
        let inner = self.inner.clone();
        tokio::spawn(async move {
            while identities.changed().await.is_ok() {
                let session = match identities.borrow_and_update().as_ref().cloned() {
                    Some(identity) => Session {
                        user_id: identity.user_id,
                        authenticated: true,
                        app_id: inner.config.app_id.clone(),
                        store: Some(store.clone()),
                    },
                    None => {
                        let fallback = Uuid::new_v4().to_string();
                        warn!("Signed out; continuing as {fallback}");
                        Session {
                            user_id: fallback,
                            authenticated: false,
                            app_id: inner.config.app_id.clone(),
                            store: Some(store.clone()),
                        }
                    }
                };
                inner.session_tx.send_replace(Some(session));
            }
        });
    }
}
