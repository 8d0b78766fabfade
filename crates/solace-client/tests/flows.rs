/// Behavior tests for bootstrap, chat sync and registration, driven through
/// mock backend handles so every flow runs without a network.
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::{Value, json};
use tokio::sync::{mpsc, watch};

use solace_client::{
    BootstrapError, ChatSync, RegistrationDetails, RegistrationForm, RegistrationOutcome, Session,
    SessionBootstrapper, register_user,
};
use solace_platform::{Authenticator, ClientConfig, DocumentStore, PersistenceMode, PlatformConfig};
use solace_types::api::Document;
use solace_types::error::{BackendErrorKind, PlatformError, PlatformResult};
use solace_types::events::ListenEvent;
use solace_types::models::{Identity, MessageRole};

// -- Mock backend --

struct MockPlatform {
    ops: Mutex<Vec<String>>,
    create_calls: AtomicUsize,
    fail_anonymous: Mutex<Option<BackendErrorKind>>,
    fail_create: Mutex<Option<BackendErrorKind>>,
    fail_put: Mutex<Option<BackendErrorKind>>,
    adds: Mutex<Vec<(String, Value)>>,
    puts: Mutex<Vec<(String, Value)>>,
    listen_tx: Mutex<Option<mpsc::Sender<PlatformResult<ListenEvent>>>>,
    identity_tx: watch::Sender<Option<Identity>>,
}

impl MockPlatform {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            ops: Mutex::new(Vec::new()),
            create_calls: AtomicUsize::new(0),
            fail_anonymous: Mutex::new(None),
            fail_create: Mutex::new(None),
            fail_put: Mutex::new(None),
            adds: Mutex::new(Vec::new()),
            puts: Mutex::new(Vec::new()),
            listen_tx: Mutex::new(None),
            identity_tx: watch::channel(None).0,
        })
    }

    fn push_identity(&self, identity: Option<Identity>) {
        self.identity_tx.send_replace(identity);
    }

    fn take_listen_sender(&self) -> mpsc::Sender<PlatformResult<ListenEvent>> {
        self.listen_tx
            .lock()
            .unwrap()
            .take()
            .expect("listen was never opened")
    }

    fn ops(&self) -> Vec<String> {
        self.ops.lock().unwrap().clone()
    }
}

#[async_trait]
impl Authenticator for MockPlatform {
    async fn sign_in_anonymously(&self) -> PlatformResult<Identity> {
        self.ops.lock().unwrap().push("anonymous".to_string());
        if let Some(kind) = self.fail_anonymous.lock().unwrap().take() {
            return Err(PlatformError::Backend(kind));
        }
        let identity = Identity {
            user_id: "mock-user".to_string(),
        };
        self.identity_tx.send_replace(Some(identity.clone()));
        Ok(identity)
    }

    async fn sign_in_with_token(&self, token: &str) -> PlatformResult<Identity> {
        self.ops.lock().unwrap().push(format!("token:{token}"));
        if token != "valid-token" {
            return Err(PlatformError::Backend(BackendErrorKind::Other {
                code: "auth/invalid-token".to_string(),
                message: "token not recognized".to_string(),
            }));
        }
        let identity = Identity {
            user_id: "token-user".to_string(),
        };
        self.identity_tx.send_replace(Some(identity.clone()));
        Ok(identity)
    }

    async fn create_account(&self, _email: &str, _password: &str) -> PlatformResult<Identity> {
        self.create_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(kind) = self.fail_create.lock().unwrap().take() {
            return Err(PlatformError::Backend(kind));
        }
        Ok(Identity {
            user_id: "acct-123".to_string(),
        })
    }

    async fn set_persistence(&self, mode: PersistenceMode) -> PlatformResult<()> {
        self.ops.lock().unwrap().push(format!("persistence:{mode:?}"));
        Ok(())
    }

    fn watch_identity(&self) -> watch::Receiver<Option<Identity>> {
        self.identity_tx.subscribe()
    }
}

#[async_trait]
impl DocumentStore for MockPlatform {
    async fn add_document(
        &self,
        collection_path: &str,
        fields: Value,
    ) -> PlatformResult<String> {
        let mut adds = self.adds.lock().unwrap();
        adds.push((collection_path.to_string(), fields));
        Ok(format!("doc-{}", adds.len()))
    }

    async fn put_document(&self, document_path: &str, fields: Value) -> PlatformResult<()> {
        if let Some(kind) = self.fail_put.lock().unwrap().take() {
            return Err(PlatformError::Backend(kind));
        }
        self.puts
            .lock()
            .unwrap()
            .push((document_path.to_string(), fields));
        Ok(())
    }

    async fn listen(
        &self,
        _collection_path: &str,
    ) -> PlatformResult<mpsc::Receiver<PlatformResult<ListenEvent>>> {
        let (tx, rx) = mpsc::channel(8);
        *self.listen_tx.lock().unwrap() = Some(tx);
        Ok(rx)
    }
}

fn test_config(auth_token: Option<&str>) -> ClientConfig {
    ClientConfig {
        app_id: "test-app".to_string(),
        platform: PlatformConfig {
            endpoint: "http://unused.invalid".to_string(),
            api_key: "k".to_string(),
            project_id: "p".to_string(),
        },
        auth_token: auth_token.map(str::to_string),
    }
}

fn bootstrapper(mock: &Arc<MockPlatform>, auth_token: Option<&str>) -> SessionBootstrapper {
    SessionBootstrapper::with_backends(test_config(auth_token), mock.clone(), mock.clone())
}

fn mock_session(mock: &Arc<MockPlatform>, user_id: &str) -> Session {
    Session::new(user_id, true, "test-app", Some(mock.clone() as Arc<dyn DocumentStore>))
}

fn doc(id: &str, fields: Value) -> Document {
    Document {
        id: id.to_string(),
        fields,
    }
}

// -- Session bootstrap --

#[tokio::test]
async fn bootstrap_signs_in_anonymously_and_publishes_the_session() {
    let mock = MockPlatform::new();
    let boot = bootstrapper(&mock, None);
    let sessions = boot.subscribe();
    assert!(sessions.borrow().is_none(), "no session before initialize");

    let session = boot.initialize().await.expect("bootstrap should succeed");
    assert_eq!(session.user_id, "mock-user");
    assert!(session.authenticated);
    assert!(session.store().is_some());

    let published = sessions.borrow().clone().expect("session was published");
    assert_eq!(published.user_id, "mock-user");

    // Persistence is forced to memory before any sign-in happens.
    assert_eq!(mock.ops(), ["persistence:InMemory", "anonymous"]);
}

#[tokio::test]
async fn bootstrap_redeems_the_supplied_token_instead_of_anonymous() {
    let mock = MockPlatform::new();
    let boot = bootstrapper(&mock, Some("valid-token"));

    let session = boot.initialize().await.unwrap();
    assert_eq!(session.user_id, "token-user");
    assert_eq!(mock.ops(), ["persistence:InMemory", "token:valid-token"]);
}

#[tokio::test]
async fn failed_bootstrap_reports_and_still_publishes_a_degraded_session() {
    let mock = MockPlatform::new();
    *mock.fail_anonymous.lock().unwrap() = Some(BackendErrorKind::Other {
        code: "auth/unavailable".to_string(),
        message: "backend down".to_string(),
    });
    let boot = bootstrapper(&mock, None);
    let sessions = boot.subscribe();

    let err = boot.initialize().await.unwrap_err();
    assert!(matches!(err, BootstrapError::Auth(_)));

    let degraded = sessions.borrow().clone().expect("degraded session published");
    assert!(!degraded.authenticated);
    assert!(degraded.store().is_none(), "unsaved mode has no store");
    assert!(!degraded.user_id.is_empty(), "fallback id still produced");
    assert_ne!(degraded.user_id, "mock-user");
}

#[tokio::test]
async fn identity_changes_keep_flowing_to_subscribers() {
    let mock = MockPlatform::new();
    let boot = bootstrapper(&mock, None);
    let mut sessions = boot.subscribe();
    boot.initialize().await.unwrap();
    sessions.mark_unchanged();

    // Signed-out state: a throwaway id appears, the store stays usable.
    mock.push_identity(None);
    sessions.changed().await.unwrap();
    let signed_out = sessions.borrow_and_update().clone().unwrap();
    assert!(!signed_out.authenticated);
    assert!(signed_out.store().is_some());
    assert_ne!(signed_out.user_id, "mock-user");

    // A later sign-in restores a real identity.
    mock.push_identity(Some(Identity {
        user_id: "returning-user".to_string(),
    }));
    sessions.changed().await.unwrap();
    let signed_in = sessions.borrow_and_update().clone().unwrap();
    assert!(signed_in.authenticated);
    assert_eq!(signed_in.user_id, "returning-user");
}

// -- Chat sync --

#[tokio::test]
async fn append_without_a_store_is_a_quiet_no_op() {
    let chat = ChatSync::new(Session::new("u-1", false, "test-app", None));
    chat.append_message("hello", MessageRole::User, false)
        .await
        .expect("unsaved mode must not error");
}

#[tokio::test]
async fn subscribe_without_a_store_yields_nothing() {
    let chat = ChatSync::new(Session::new("u-1", false, "test-app", None));
    assert!(chat.subscribe().await.is_none());
}

#[tokio::test]
async fn append_writes_into_the_callers_own_scope() {
    let mock = MockPlatform::new();
    let chat = ChatSync::new(mock_session(&mock, "mock-user"));

    chat.append_message("I feel better today", MessageRole::User, false)
        .await
        .unwrap();

    let adds = mock.adds.lock().unwrap();
    let (path, fields) = &adds[0];
    assert_eq!(path, "artifacts/test-app/users/mock-user/chats");
    assert_eq!(fields["text"], "I feel better today");
    assert_eq!(fields["role"], "user");
    assert_eq!(fields["isCrisis"], false);
    assert!(
        fields.get("timestamp").is_none(),
        "the platform assigns the timestamp, not the client"
    );
}

#[tokio::test]
async fn snapshots_arrive_sorted_and_always_carry_the_full_history() {
    let mock = MockPlatform::new();
    let chat = ChatSync::new(mock_session(&mock, "mock-user"));
    let mut sub = chat.subscribe().await.expect("store present");
    let tx = mock.take_listen_sender();

    tx.send(Ok(ListenEvent::Snapshot {
        documents: vec![
            doc("late", json!({ "text": "b", "role": "bot", "timestamp": "2026-03-01T10:00:02Z" })),
            doc("early", json!({ "text": "a", "role": "user", "timestamp": "2026-03-01T10:00:01Z" })),
            doc("pending", json!({ "text": "c", "role": "user" })),
        ],
    }))
    .await
    .unwrap();

    let first = sub.next_snapshot().await.unwrap();
    let ids: Vec<&str> = first.iter().map(|m| m.id.as_str()).collect();
    assert_eq!(ids, ["early", "late", "pending"]);
    assert_eq!(first[2].timestamp, None);

    // Pings are swallowed; the next snapshot is again the full history.
    tx.send(Ok(ListenEvent::Ping)).await.unwrap();
    tx.send(Ok(ListenEvent::Snapshot {
        documents: vec![
            doc("early", json!({ "text": "a", "role": "user", "timestamp": "2026-03-01T10:00:01Z" })),
            doc("late", json!({ "text": "b", "role": "bot", "timestamp": "2026-03-01T10:00:02Z" })),
            doc("pending", json!({ "text": "c", "role": "user", "timestamp": "2026-03-01T10:00:03Z" })),
            doc("newest", json!({ "text": "d", "role": "bot" })),
        ],
    }))
    .await
    .unwrap();

    let second = sub.next_snapshot().await.unwrap();
    assert_eq!(second.len(), 4, "full history, not a delta");
    assert_eq!(second.last().unwrap().id, "newest");
}

#[tokio::test]
async fn malformed_documents_are_skipped_not_fatal() {
    let mock = MockPlatform::new();
    let chat = ChatSync::new(mock_session(&mock, "mock-user"));
    let mut sub = chat.subscribe().await.unwrap();
    let tx = mock.take_listen_sender();

    tx.send(Ok(ListenEvent::Snapshot {
        documents: vec![
            doc("good", json!({ "text": "fine", "role": "user" })),
            doc("broken", json!({ "text": "no role here", "role": 42 })),
        ],
    }))
    .await
    .unwrap();

    let snapshot = sub.next_snapshot().await.unwrap();
    assert_eq!(snapshot.len(), 1);
    assert_eq!(snapshot[0].id, "good");
}

#[tokio::test]
async fn a_delivery_error_ends_the_subscription() {
    let mock = MockPlatform::new();
    let chat = ChatSync::new(mock_session(&mock, "mock-user"));
    let mut sub = chat.subscribe().await.unwrap();
    let tx = mock.take_listen_sender();

    tx.send(Err(PlatformError::Transport("connection reset".to_string())))
        .await
        .unwrap();

    assert!(sub.next_snapshot().await.is_none(), "stream ends after the error");
}

#[tokio::test]
async fn cancel_tears_the_subscription_down() {
    let mock = MockPlatform::new();
    let chat = ChatSync::new(mock_session(&mock, "mock-user"));
    let mut sub = chat.subscribe().await.unwrap();
    let tx = mock.take_listen_sender();

    sub.cancel();
    assert!(sub.next_snapshot().await.is_none());

    // The platform-side stream is gone too once the pump is aborted.
    let mut rejected = false;
    for _ in 0..50 {
        if tx
            .send(Ok(ListenEvent::Snapshot { documents: vec![] }))
            .await
            .is_err()
        {
            rejected = true;
            break;
        }
        tokio::task::yield_now().await;
    }
    assert!(rejected, "listen channel should close after cancel");
}

// -- Registration --

#[derive(Default)]
struct RecordingForm {
    cleared: AtomicUsize,
    errors: Mutex<Vec<String>>,
    busy: Mutex<Vec<bool>>,
}

impl RegistrationForm for RecordingForm {
    fn clear_error(&self) {
        self.cleared.fetch_add(1, Ordering::SeqCst);
    }

    fn show_error(&self, message: &str) {
        self.errors.lock().unwrap().push(message.to_string());
    }

    fn set_busy(&self, busy: bool) {
        self.busy.lock().unwrap().push(busy);
    }
}

fn details() -> RegistrationDetails {
    RegistrationDetails {
        name: "Ada Lovelace".to_string(),
        email: "ada@example.com".to_string(),
        phone: "555-0101".to_string(),
        password: "s3cret!pass".to_string(),
        confirm_password: "s3cret!pass".to_string(),
    }
}

async fn run_registration(
    mock: &Arc<MockPlatform>,
    form: &RecordingForm,
    details: RegistrationDetails,
) -> RegistrationOutcome {
    let auth: Arc<dyn Authenticator> = mock.clone();
    let store: Arc<dyn DocumentStore> = mock.clone();
    register_user(&auth, &store, form, details).await
}

#[tokio::test]
async fn mismatched_passwords_never_reach_the_backend() {
    let mock = MockPlatform::new();
    let form = RecordingForm::default();
    let mut input = details();
    input.confirm_password = "different".to_string();

    let outcome = run_registration(&mock, &form, input).await;

    assert_eq!(outcome, RegistrationOutcome::PasswordMismatch);
    assert_eq!(mock.create_calls.load(Ordering::SeqCst), 0);
    assert_eq!(form.errors.lock().unwrap().as_slice(), ["Passwords do not match."]);
    assert!(form.busy.lock().unwrap().is_empty(), "busy untouched on local rejection");
}

#[tokio::test]
async fn successful_registration_writes_one_profile_keyed_by_the_account() {
    let mock = MockPlatform::new();
    let form = RecordingForm::default();

    let outcome = run_registration(&mock, &form, details()).await;

    assert_eq!(
        outcome,
        RegistrationOutcome::Registered {
            user_id: "acct-123".to_string()
        }
    );
    assert_eq!(mock.create_calls.load(Ordering::SeqCst), 1);

    let puts = mock.puts.lock().unwrap();
    assert_eq!(puts.len(), 1, "exactly one profile write");
    let (path, fields) = &puts[0];
    assert_eq!(path, "users/acct-123");
    assert_eq!(fields["uid"], "acct-123", "profile is keyed by the new account");
    assert_eq!(fields["email"], "ada@example.com");
    assert_eq!(fields["name"], "Ada Lovelace");
    assert_eq!(fields["phone"], "555-0101");
    assert!(fields["createdAt"].is_string(), "creation time is an ISO string");

    assert_eq!(form.cleared.load(Ordering::SeqCst), 1);
    assert!(form.errors.lock().unwrap().is_empty());
    assert_eq!(form.busy.lock().unwrap().as_slice(), [true, false]);
}

#[tokio::test]
async fn duplicate_email_shows_the_fixed_message_not_the_raw_one() {
    let mock = MockPlatform::new();
    *mock.fail_create.lock().unwrap() = Some(BackendErrorKind::EmailAlreadyInUse);
    let form = RecordingForm::default();

    let outcome = run_registration(&mock, &form, details()).await;

    assert_eq!(outcome, RegistrationOutcome::Failed(BackendErrorKind::EmailAlreadyInUse));
    assert_eq!(
        form.errors.lock().unwrap().as_slice(),
        ["This email is already registered."]
    );
    assert!(mock.puts.lock().unwrap().is_empty(), "no profile without an account");
    assert_eq!(form.busy.lock().unwrap().as_slice(), [true, false]);
}

#[tokio::test]
async fn profile_write_failure_leaves_the_account_in_place() {
    let mock = MockPlatform::new();
    *mock.fail_put.lock().unwrap() = Some(BackendErrorKind::PermissionDenied);
    let form = RecordingForm::default();

    let outcome = run_registration(&mock, &form, details()).await;

    assert_eq!(outcome, RegistrationOutcome::Failed(BackendErrorKind::PermissionDenied));
    assert_eq!(
        mock.create_calls.load(Ordering::SeqCst),
        1,
        "the account was created and nothing rolls it back"
    );
    assert_eq!(
        form.errors.lock().unwrap().as_slice(),
        ["Data save failed. Check your document store security rules!"]
    );
    assert_eq!(form.busy.lock().unwrap().as_slice(), [true, false]);
}

#[tokio::test]
async fn unknown_backend_errors_surface_their_raw_message() {
    let mock = MockPlatform::new();
    *mock.fail_create.lock().unwrap() = Some(BackendErrorKind::Other {
        code: "auth/weak-password".to_string(),
        message: "Password should be at least 6 characters".to_string(),
    });
    let form = RecordingForm::default();

    let outcome = run_registration(&mock, &form, details()).await;

    assert!(matches!(outcome, RegistrationOutcome::Failed(_)));
    assert_eq!(
        form.errors.lock().unwrap().as_slice(),
        ["Password should be at least 6 characters"]
    );
    assert_eq!(form.busy.lock().unwrap().as_slice(), [true, false]);
}
