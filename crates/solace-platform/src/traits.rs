use async_trait::async_trait;
use tokio::sync::{mpsc, watch};

use solace_types::error::PlatformResult;
use solace_types::events::ListenEvent;
use solace_types::models::Identity;

use crate::persist::PersistenceMode;

/// Authentication surface of the platform.
///
/// Every sign-in variant resolves to the resulting identity and also feeds
/// the identity watch, so long-lived observers see the change.
#[async_trait]
pub trait Authenticator: Send + Sync + 'static {
    async fn sign_in_anonymously(&self) -> PlatformResult<Identity>;

    /// Redeems a one-time token handed to the client by its host environment.
    async fn sign_in_with_token(&self, token: &str) -> PlatformResult<Identity>;

    /// Creates an email/password account and signs in as it.
    async fn create_account(&self, email: &str, password: &str) -> PlatformResult<Identity>;

    /// Switches where the signed-in credential is kept between runs.
    async fn set_persistence(&self, mode: PersistenceMode) -> PlatformResult<()>;

    /// Auth-state changes. The seed value `None` is the pre-sign-in state;
    /// each sign-in publishes `Some(identity)`.
    fn watch_identity(&self) -> watch::Receiver<Option<Identity>>;
}

/// Document surface of the platform.
#[async_trait]
pub trait DocumentStore: Send + Sync + 'static {
    /// Creates a document in a collection. The platform assigns the id and
    /// the server timestamp and returns the id.
    async fn add_document(
        &self,
        collection_path: &str,
        fields: serde_json::Value,
    ) -> PlatformResult<String>;

    /// Upserts a document at a fully qualified path.
    async fn put_document(&self, document_path: &str, fields: serde_json::Value)
    -> PlatformResult<()>;

    /// Opens a long-lived change stream over a collection. The first frame is
    /// a snapshot of the current contents; every later frame is again a full
    /// snapshot. A delivery failure surfaces one `Err` and ends the stream.
    /// Dropping the receiver ends it from the consumer side.
    async fn listen(
        &self,
        collection_path: &str,
    ) -> PlatformResult<mpsc::Receiver<PlatformResult<ListenEvent>>>;
}
