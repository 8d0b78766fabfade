use std::sync::Arc;

use tracing::{info, warn};

use solace_platform::{Authenticator, DocumentStore};
use solace_types::error::{BackendErrorKind, PlatformError};
use solace_types::models::UserProfile;

/// The two UI side effects registration performs: the error line and the
/// busy state of the submit control. The caller owns the actual widgets.
pub trait RegistrationForm: Send + Sync {
    fn clear_error(&self);
    fn show_error(&self, message: &str);
    fn set_busy(&self, busy: bool);
}

/// Raw form input, confirmation field included.
#[derive(Debug, Clone)]
pub struct RegistrationDetails {
    pub name: String,
    pub email: String,
    pub phone: String,
    pub password: String,
    pub confirm_password: String,
}

/// How an attempt ended. Backend failures are displayed through the form and
/// folded in here; they are not re-raised.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistrationOutcome {
    Registered { user_id: String },
    /// Rejected locally, before any backend call.
    PasswordMismatch,
    Failed(BackendErrorKind),
}

fn profile_document(uid: &str) -> String {
    format!("users/{uid}")
}

/// Creates the account, then writes the profile document keyed by the new
/// account's id. The form is marked busy for the duration of the backend
/// work and always restored, whatever the outcome.
///
/// There is no rollback: if the account is created and the profile write
/// then fails, the orphaned account stays (warned about in the log) and the
/// outcome reports the failure.
pub async fn register_user(
    authenticator: &Arc<dyn Authenticator>,
    store: &Arc<dyn DocumentStore>,
    form: &dyn RegistrationForm,
    details: RegistrationDetails,
) -> RegistrationOutcome {
    form.clear_error();

    if details.password != details.confirm_password {
        form.show_error("Passwords do not match.");
        return RegistrationOutcome::PasswordMismatch;
    }

    form.set_busy(true);
    let outcome = run_registration(authenticator, store, form, details).await;
    form.set_busy(false);
    outcome
}

async fn run_registration(
    authenticator: &Arc<dyn Authenticator>,
    store: &Arc<dyn DocumentStore>,
    form: &dyn RegistrationForm,
    details: RegistrationDetails,
) -> RegistrationOutcome {
    let account = match authenticator
        .create_account(&details.email, &details.password)
        .await
    {
        Ok(identity) => identity,
        Err(err) => return fail(form, err, "Account creation failed"),
    };

    let profile = UserProfile {
        uid: account.user_id,
        name: details.name,
        email: details.email,
        phone: details.phone,
        created_at: chrono::Utc::now(),
    };
    let fields = match serde_json::to_value(&profile) {
        Ok(fields) => fields,
        Err(err) => return fail(form, PlatformError::Json(err), "Profile encoding failed"),
    };

    if let Err(err) = store.put_document(&profile_document(&profile.uid), fields).await {
        // No rollback here: the account outlives its failed profile write.
        warn!("Account {} created but its profile write failed", profile.uid);
        return fail(form, err, "Profile save failed");
    }

    info!("Registered {} as {}", profile.email, profile.uid);
    RegistrationOutcome::Registered {
        user_id: profile.uid,
    }
}

/// Classifies the error, shows the user-facing text, reports the kind.
fn fail(form: &dyn RegistrationForm, err: PlatformError, context: &str) -> RegistrationOutcome {
    let kind = match err {
        PlatformError::Backend(kind) => kind,
        other => BackendErrorKind::Other {
            code: "client/error".to_string(),
            message: other.to_string(),
        },
    };
    warn!("{context}: {kind}");
    form.show_error(&kind.user_message());
    RegistrationOutcome::Failed(kind)
}
