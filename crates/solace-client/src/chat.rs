use std::pin::Pin;
use std::task::{Context, Poll};

use futures_util::Stream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, warn};

use solace_types::api::MessageWrite;
use solace_types::error::PlatformResult;
use solace_types::events::ListenEvent;
use solace_types::models::{ChatMessage, MessageRole};

use crate::session::Session;

const SNAPSHOT_BUFFER: usize = 8;

/// Per-user message collection path.
fn chat_collection(app_id: &str, user_id: &str) -> String {
    format!("artifacts/{app_id}/users/{user_id}/chats")
}

/// Synchronizes one user's chat history with the platform.
pub struct ChatSync {
    session: Session,
}

impl ChatSync {
    pub fn new(session: Session) -> Self {
        Self { session }
    }

    /// Opens the history stream. Every delivery is the full history, sorted
    /// oldest first with still-unstamped messages at the end. In store-less
    /// sessions there is nothing to subscribe to: that is logged and `None`
    /// comes back, as it does when the stream cannot be opened.
    pub async fn subscribe(&self) -> Option<ChatSubscription> {
        let Some(store) = self.session.store() else {
            error!("Chat subscription requested without a store");
            return None;
        };
        let path = chat_collection(&self.session.app_id, &self.session.user_id);
        let mut frames = match store.listen(&path).await {
            Ok(frames) => frames,
            Err(err) => {
                error!("Could not open chat listen stream: {err}");
                return None;
            }
        };

        let (tx, rx) = mpsc::channel(SNAPSHOT_BUFFER);
        let pump = tokio::spawn(async move {
            while let Some(frame) = frames.recv().await {
                match frame {
                    Ok(ListenEvent::Snapshot { documents }) => {
                        let mut history = Vec::with_capacity(documents.len());
                        for doc in documents {
                            let id = doc.id.clone();
                            match ChatMessage::from_document(doc) {
                                Ok(message) => history.push(message),
                                Err(err) => warn!("Skipping malformed message {id}: {err}"),
                            }
                        }
                        sort_history(&mut history);
                        if tx.send(history).await.is_err() {
                            // Subscriber gone.
                            break;
                        }
                    }
                    Ok(ListenEvent::Ping) => {}
                    Err(err) => {
                        // Logged only; subscribers just see the stream end.
                        error!("Chat listen stream failed: {err}");
                        break;
                    }
                }
            }
            debug!("Chat snapshot pump finished");
        });

        Some(ChatSubscription { rx, pump })
    }

    /// Appends one message under the caller's own history. In store-less
    /// sessions this is a logged no-op: the conversation goes on, unsaved.
    /// Backend rejections propagate to the caller untouched.
    pub async fn append_message(
        &self,
        text: &str,
        role: MessageRole,
        is_crisis: bool,
    ) -> PlatformResult<()> {
        let Some(store) = self.session.store() else {
            warn!("Dropping message append, session has no store");
            return Ok(());
        };
        let write = MessageWrite {
            text: text.to_string(),
            role,
            is_crisis,
        };
        let path = chat_collection(&self.session.app_id, &self.session.user_id);
        let id = store.add_document(&path, serde_json::to_value(&write)?).await?;
        debug!("Appended message {id}");
        Ok(())
    }
}

/// Oldest first; messages without a server timestamp sink to the end. The
/// sort is stable, so ties and unstamped runs keep their document order.
fn sort_history(history: &mut [ChatMessage]) {
    history.sort_by(|a, b| match (&a.timestamp, &b.timestamp) {
        (Some(x), Some(y)) => x.cmp(y),
        (Some(_), None) => std::cmp::Ordering::Less,
        (None, Some(_)) => std::cmp::Ordering::Greater,
        (None, None) => std::cmp::Ordering::Equal,
    });
}

/// Live view over one user's history. Dropping it (or calling `cancel`)
/// aborts the pump, which tears down the platform stream as well.
pub struct ChatSubscription {
    rx: mpsc::Receiver<Vec<ChatMessage>>,
    pump: JoinHandle<()>,
}

impl ChatSubscription {
    /// The next full-history snapshot, or `None` once the stream is over.
    pub async fn next_snapshot(&mut self) -> Option<Vec<ChatMessage>> {
        self.rx.recv().await
    }

    /// Stops delivery now. Safe to call more than once.
    pub fn cancel(&self) {
        self.pump.abort();
    }
}

impl Stream for ChatSubscription {
    type Item = Vec<ChatMessage>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.rx.poll_recv(cx)
    }
}

impl Drop for ChatSubscription {
    fn drop(&mut self) {
        self.pump.abort();
    }
}
