use serde::{Deserialize, Serialize};

// -- Auth --

/// Result of any sign-in or sign-up call. The id token is opaque to the
/// client and is replayed verbatim on document requests.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenGrant {
    pub user_id: String,
    pub id_token: String,
    pub expires_in: u64,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SignInTokenRequest {
    pub token: String,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SignUpRequest {
    pub email: String,
    pub password: String,
}

// -- Documents --

/// A stored document: platform-assigned id plus the raw field map.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    pub fields: serde_json::Value,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CreateDocumentResponse {
    pub id: String,
}

/// Fields of a chat message as written. The platform assigns the id and the
/// server timestamp, so neither appears here.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageWrite {
    pub text: String,
    pub role: crate::models::MessageRole,
    pub is_crisis: bool,
}

// -- Errors --

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: ErrorDetail,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorDetail {
    pub code: String,
    pub message: String,
}
