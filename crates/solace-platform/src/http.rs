use std::path::PathBuf;

use async_trait::async_trait;
use futures_util::TryStreamExt;
use serde_json::Value;
use tokio::io::AsyncBufReadExt;
use tokio::sync::{Mutex, mpsc, watch};
use tokio_util::io::StreamReader;
use tracing::{debug, warn};

use solace_types::api::{
    CreateDocumentResponse, ErrorResponse, SignInTokenRequest, SignUpRequest, TokenGrant,
};
use solace_types::error::{BackendErrorKind, PlatformError, PlatformResult};
use solace_types::events::ListenEvent;
use solace_types::models::Identity;

use crate::config::PlatformConfig;
use crate::persist::{CredentialCache, PersistenceMode};
use crate::traits::{Authenticator, DocumentStore};

const API_KEY_HEADER: &str = "x-api-key";
const DEFAULT_CACHE_FILE: &str = ".solace-credentials.json";
const LISTEN_BUFFER: usize = 16;

/// Production connector speaking the platform REST + NDJSON protocol.
///
/// One instance carries both the auth and the document surface; callers hand
/// it around as `Arc<dyn Authenticator>` / `Arc<dyn DocumentStore>`.
pub struct HttpPlatform {
    http: reqwest::Client,
    config: PlatformConfig,
    cache: CredentialCache,
    grant: Mutex<Option<TokenGrant>>,
    identity_tx: watch::Sender<Option<Identity>>,
}

impl HttpPlatform {
    /// Connects with the default credential cache location.
    pub async fn connect(config: PlatformConfig) -> PlatformResult<Self> {
        Self::connect_with_cache(config, PathBuf::from(DEFAULT_CACHE_FILE)).await
    }

    /// Connects and restores a persisted credential if one is cached.
    pub async fn connect_with_cache(
        config: PlatformConfig,
        cache_path: PathBuf,
    ) -> PlatformResult<Self> {
        let http = reqwest::Client::builder()
            .build()
            .map_err(PlatformError::transport)?;
        let (identity_tx, _) = watch::channel(None);
        let platform = Self {
            http,
            config,
            cache: CredentialCache::new(cache_path),
            grant: Mutex::new(None),
            identity_tx,
        };
        if let Some(grant) = platform.cache.load().await {
            debug!("Restored persisted credential for {}", grant.user_id);
            let identity = Identity {
                user_id: grant.user_id.clone(),
            };
            *platform.grant.lock().await = Some(grant);
            platform.identity_tx.send_replace(Some(identity));
        }
        Ok(platform)
    }

    fn auth_request(&self, verb: &str) -> reqwest::RequestBuilder {
        let url = format!("{}/auth/v1/accounts:{}", self.config.endpoint, verb);
        self.http
            .post(url)
            .header(API_KEY_HEADER, self.config.api_key.as_str())
    }

    fn document_url(&self, path: &str) -> String {
        format!("{}/data/v1/documents/{}", self.config.endpoint, path)
    }

    /// Attaches the api key and, when signed in, the bearer token. Document
    /// requests without a signed-in grant go out unauthenticated and get
    /// judged by the backend's rules.
    async fn authed(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        let builder = builder.header(API_KEY_HEADER, self.config.api_key.as_str());
        match self.grant.lock().await.as_ref() {
            Some(grant) => builder.header("Authorization", format!("Bearer {}", grant.id_token)),
            None => builder,
        }
    }

    async fn send_json<T>(&self, req: reqwest::RequestBuilder) -> PlatformResult<T>
    where
        T: serde::de::DeserializeOwned,
    {
        let resp = req.send().await.map_err(PlatformError::transport)?;
        if resp.status().is_success() {
            resp.json::<T>().await.map_err(PlatformError::decode)
        } else {
            Err(Self::read_backend_error(resp).await)
        }
    }

    /// Turns a non-2xx response into the classified backend error. Bodies
    /// that are not the structured error shape land in the default kind with
    /// the raw text preserved.
    async fn read_backend_error(resp: reqwest::Response) -> PlatformError {
        let status = resp.status();
        let body = resp.text().await.unwrap_or_default();
        match serde_json::from_str::<ErrorResponse>(&body) {
            Ok(parsed) => PlatformError::Backend(BackendErrorKind::from_code(
                &parsed.error.code,
                &parsed.error.message,
            )),
            Err(_) => PlatformError::Backend(BackendErrorKind::Other {
                code: format!("http/{}", status.as_u16()),
                message: if body.is_empty() {
                    status.to_string()
                } else {
                    body
                },
            }),
        }
    }

    async fn complete_sign_in(&self, grant: TokenGrant) -> PlatformResult<Identity> {
        let identity = Identity {
            user_id: grant.user_id.clone(),
        };
        self.cache.persist(&grant).await;
        *self.grant.lock().await = Some(grant);
        self.identity_tx.send_replace(Some(identity.clone()));
        Ok(identity)
    }
}

#[async_trait]
impl Authenticator for HttpPlatform {
    async fn sign_in_anonymously(&self) -> PlatformResult<Identity> {
        let req = self.auth_request("signInAnonymously").json(&serde_json::json!({}));
        let grant: TokenGrant = self.send_json(req).await?;
        self.complete_sign_in(grant).await
    }

    async fn sign_in_with_token(&self, token: &str) -> PlatformResult<Identity> {
        let body = SignInTokenRequest {
            token: token.to_string(),
        };
        let req = self.auth_request("signInWithToken").json(&body);
        let grant: TokenGrant = self.send_json(req).await?;
        self.complete_sign_in(grant).await
    }

    async fn create_account(&self, email: &str, password: &str) -> PlatformResult<Identity> {
        let body = SignUpRequest {
            email: email.to_string(),
            password: password.to_string(),
        };
        let req = self.auth_request("signUp").json(&body);
        let grant: TokenGrant = self.send_json(req).await?;
        self.complete_sign_in(grant).await
    }

    async fn set_persistence(&self, mode: PersistenceMode) -> PlatformResult<()> {
        self.cache.set_mode(mode).await;
        if mode == PersistenceMode::Durable {
            if let Some(grant) = self.grant.lock().await.as_ref() {
                self.cache.persist(grant).await;
            }
        }
        Ok(())
    }

    fn watch_identity(&self) -> watch::Receiver<Option<Identity>> {
        self.identity_tx.subscribe()
    }
}

#[async_trait]
impl DocumentStore for HttpPlatform {
    async fn add_document(
        &self,
        collection_path: &str,
        fields: Value,
    ) -> PlatformResult<String> {
        let url = self.document_url(collection_path);
        let req = self.authed(self.http.post(url)).await.json(&fields);
        let resp: CreateDocumentResponse = self.send_json(req).await?;
        Ok(resp.id)
    }

    async fn put_document(
        &self,
        document_path: &str,
        fields: Value,
    ) -> PlatformResult<()> {
        let url = self.document_url(document_path);
        let req = self.authed(self.http.put(url)).await.json(&fields);
        let resp = req.send().await.map_err(PlatformError::transport)?;
        if resp.status().is_success() {
            Ok(())
        } else {
            Err(Self::read_backend_error(resp).await)
        }
    }

    async fn listen(
        &self,
        collection_path: &str,
    ) -> PlatformResult<mpsc::Receiver<PlatformResult<ListenEvent>>> {
        let url = format!("{}:listen", self.document_url(collection_path));
        let req = self.authed(self.http.get(url)).await;
        let resp = req.send().await.map_err(PlatformError::transport)?;
        if !resp.status().is_success() {
            return Err(Self::read_backend_error(resp).await);
        }
        debug!("Listen stream open on {collection_path}");
        let (tx, rx) = mpsc::channel(LISTEN_BUFFER);
        tokio::spawn(pump_listen_frames(resp, tx));
        Ok(rx)
    }
}

/// Reads NDJSON frames off the response body until the stream or the
/// receiver goes away. One transport error is forwarded, then the stream
/// ends; reconnecting is the caller's decision.
async fn pump_listen_frames(
    resp: reqwest::Response,
    tx: mpsc::Sender<PlatformResult<ListenEvent>>,
) {
    let stream = resp.bytes_stream().map_err(std::io::Error::other);
    let mut lines = StreamReader::new(stream).lines();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) => {
                let frame = line.trim();
                if frame.is_empty() {
                    continue;
                }
                match serde_json::from_str::<ListenEvent>(frame) {
                    Ok(event) => {
                        if tx.send(Ok(event)).await.is_err() {
                            // Receiver dropped; stop reading.
                            break;
                        }
                    }
                    Err(err) => warn!("Skipping undecodable listen frame: {err}"),
                }
            }
            Ok(None) => {
                debug!("Listen stream ended");
                break;
            }
            Err(err) => {
                let _ = tx.send(Err(PlatformError::transport(&err))).await;
                break;
            }
        }
    }
}
