use serde::{Deserialize, Serialize};
use tracing::warn;

pub const ENV_APP_ID: &str = "SOLACE_APP_ID";
pub const ENV_PLATFORM_CONFIG: &str = "SOLACE_PLATFORM_CONFIG";
pub const ENV_AUTH_TOKEN: &str = "SOLACE_AUTH_TOKEN";

pub const DEFAULT_APP_ID: &str = "default-app-id";

/// Connection settings for the platform API. Host environments inject these
/// as a JSON payload; unknown keys are tolerated so newer payloads still
/// parse.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlatformConfig {
    pub endpoint: String,
    pub api_key: String,
    pub project_id: String,
}

impl PlatformConfig {
    /// Built-in configuration used whenever no usable payload is injected.
    pub fn fallback() -> Self {
        Self {
            endpoint: "https://api.solace-app.dev".to_string(),
            api_key: "solace-web-2fd1a9c4e7".to_string(),
            project_id: "solace-prod".to_string(),
        }
    }

    /// Prefers the injected JSON payload. Malformed or absent input falls
    /// back to the built-in configuration instead of failing startup.
    pub fn resolve(injected: Option<&str>) -> Self {
        match injected {
            Some(raw) => match serde_json::from_str(raw) {
                Ok(config) => config,
                Err(err) => {
                    warn!("Injected platform config is invalid, using fallback: {err}");
                    Self::fallback()
                }
            },
            None => Self::fallback(),
        }
    }
}

/// Everything the client layer needs to come up: platform settings plus the
/// application scope and the optional one-time auth token.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub app_id: String,
    pub platform: PlatformConfig,
    pub auth_token: Option<String>,
}

impl ClientConfig {
    /// Reads the standard environment bindings. Every one is optional.
    pub fn from_env() -> Self {
        let app_id =
            std::env::var(ENV_APP_ID).unwrap_or_else(|_| DEFAULT_APP_ID.to_string());
        let injected = std::env::var(ENV_PLATFORM_CONFIG).ok();
        let platform = PlatformConfig::resolve(injected.as_deref());
        let auth_token = std::env::var(ENV_AUTH_TOKEN).ok().filter(|t| !t.is_empty());
        Self {
            app_id,
            platform,
            auth_token,
        }
    }
}
