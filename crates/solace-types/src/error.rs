use std::fmt;

use thiserror::Error;

/// Result type for platform operations.
pub type PlatformResult<T> = std::result::Result<T, PlatformError>;

/// The closed set of backend error kinds the client distinguishes. Everything
/// the backend reports outside the known codes lands in `Other`, which keeps
/// the backend's own code and message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendErrorKind {
    EmailAlreadyInUse,
    PermissionDenied,
    Other { code: String, message: String },
}

impl BackendErrorKind {
    pub const EMAIL_ALREADY_IN_USE: &'static str = "auth/email-already-in-use";
    pub const PERMISSION_DENIED: &'static str = "store/permission-denied";

    /// Classifies a backend error payload.
    pub fn from_code(code: &str, message: &str) -> Self {
        match code {
            Self::EMAIL_ALREADY_IN_USE => BackendErrorKind::EmailAlreadyInUse,
            Self::PERMISSION_DENIED => BackendErrorKind::PermissionDenied,
            _ => BackendErrorKind::Other {
                code: code.to_string(),
                message: message.to_string(),
            },
        }
    }

    pub fn code(&self) -> &str {
        match self {
            BackendErrorKind::EmailAlreadyInUse => Self::EMAIL_ALREADY_IN_USE,
            BackendErrorKind::PermissionDenied => Self::PERMISSION_DENIED,
            BackendErrorKind::Other { code, .. } => code,
        }
    }

    /// The user-facing message for this kind. Known kinds map to fixed text;
    /// the default case surfaces the backend's raw message.
    pub fn user_message(&self) -> String {
        match self {
            BackendErrorKind::EmailAlreadyInUse => "This email is already registered.".to_string(),
            BackendErrorKind::PermissionDenied => {
                "Data save failed. Check your document store security rules!".to_string()
            }
            BackendErrorKind::Other { message, .. } => message.clone(),
        }
    }
}

impl fmt::Display for BackendErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackendErrorKind::Other { code, message } => write!(f, "{code}: {message}"),
            known => f.write_str(known.code()),
        }
    }
}

/// Errors surfaced by the platform connector.
#[derive(Error, Debug)]
pub enum PlatformError {
    /// The backend answered the request with a structured error.
    #[error("backend error: {0}")]
    Backend(BackendErrorKind),

    /// The request never got a usable answer.
    #[error("transport failure: {0}")]
    Transport(String),

    /// The backend answered with something we could not decode.
    #[error("unexpected backend response: {0}")]
    Decode(String),

    /// Local JSON encode/decode failure.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl PlatformError {
    pub fn transport(err: impl fmt::Display) -> Self {
        PlatformError::Transport(err.to_string())
    }

    pub fn decode(err: impl fmt::Display) -> Self {
        PlatformError::Decode(err.to_string())
    }

    /// The classified backend kind, if the backend produced one.
    pub fn backend_kind(&self) -> Option<&BackendErrorKind> {
        match self {
            PlatformError::Backend(kind) => Some(kind),
            _ => None,
        }
    }
}

impl From<BackendErrorKind> for PlatformError {
    fn from(kind: BackendErrorKind) -> Self {
        PlatformError::Backend(kind)
    }
}
