use std::io::Write as _;
use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};
use tracing::{error, info, warn};

use solace_client::{
    ChatSubscription, ChatSync, RegistrationDetails, RegistrationForm, RegistrationOutcome,
    SessionBootstrapper, register_user,
};
use solace_platform::{Authenticator, ClientConfig, DocumentStore, HttpPlatform, PersistenceMode};
use solace_types::models::{ChatMessage, MessageRole};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "solace=info".into()),
        )
        .init();

    let config = ClientConfig::from_env();

    match std::env::args().nth(1).as_deref() {
        None => run_chat(config).await,
        Some("register") => run_registration(config).await,
        Some(other) => anyhow::bail!("unknown mode {other:?} (expected no argument or \"register\")"),
    }
}

// ── Chat mode ───────────────────────────────────────────────────────────

async fn run_chat(config: ClientConfig) -> anyhow::Result<()> {
    let bootstrapper = SessionBootstrapper::new(config);
    let sessions = bootstrapper.subscribe();

    // A failed bootstrap still publishes a degraded session; chat continues
    // without saving anything.
    let session = match bootstrapper.initialize().await {
        Ok(session) => session,
        Err(e) => {
            error!("Bootstrap failed, continuing unsaved: {}", e);
            sessions
                .borrow()
                .clone()
                .ok_or_else(|| anyhow::anyhow!("no session published after failed bootstrap"))?
        }
    };
    info!(
        "Session ready for {} (authenticated: {})",
        session.user_id, session.authenticated
    );

    let chat = ChatSync::new(session);
    let mut subscription = chat.subscribe().await;
    if subscription.is_none() {
        warn!("History is unavailable; messages will not be saved");
    }

    println!("Type a message and press Enter. Ctrl-D or Ctrl-C exits.");
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        tokio::select! {
            snapshot = next_snapshot(&mut subscription) => {
                match snapshot {
                    Some(history) => render_history(&history),
                    None => {
                        warn!("History stream ended; new messages will no longer appear");
                        subscription = None;
                    }
                }
            }
            line = lines.next_line() => {
                match line? {
                    Some(text) => {
                        let text = text.trim();
                        if text.is_empty() {
                            continue;
                        }
                        if let Err(e) = chat.append_message(text, MessageRole::User, false).await {
                            error!("Message save failed: {}", e);
                        }
                    }
                    None => break,
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted, leaving chat");
                break;
            }
        }
    }

    if let Some(sub) = subscription.as_ref() {
        sub.cancel();
    }
    Ok(())
}

/// Resolves to the next snapshot, or never when there is no subscription so
/// the select loop keeps serving stdin.
async fn next_snapshot(subscription: &mut Option<ChatSubscription>) -> Option<Vec<ChatMessage>> {
    match subscription {
        Some(sub) => sub.next_snapshot().await,
        None => std::future::pending().await,
    }
}

fn render_history(history: &[ChatMessage]) {
    println!("--- {} message(s) ---", history.len());
    for message in history {
        let stamp = message
            .timestamp
            .map(|t| t.format("%H:%M:%S").to_string())
            .unwrap_or_else(|| "--:--:--".to_string());
        let marker = if message.is_crisis { " [crisis]" } else { "" };
        println!("[{}] {}{}: {}", stamp, message.role, marker, message.text);
    }
}

// ── Registration mode ───────────────────────────────────────────────────

/// Form surface that reports through the terminal.
struct ConsoleForm;

impl RegistrationForm for ConsoleForm {
    fn clear_error(&self) {}

    fn show_error(&self, message: &str) {
        eprintln!("{message}");
    }

    fn set_busy(&self, busy: bool) {
        if busy {
            println!("Creating your account...");
        }
    }
}

async fn run_registration(config: ClientConfig) -> anyhow::Result<()> {
    let platform = Arc::new(HttpPlatform::connect(config.platform).await?);
    let authenticator: Arc<dyn Authenticator> = platform.clone();
    let store: Arc<dyn DocumentStore> = platform;

    // One-shot flow; never leave credentials on disk, same as the chat
    // bootstrap.
    authenticator
        .set_persistence(PersistenceMode::InMemory)
        .await?;

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let details = RegistrationDetails {
        name: prompt(&mut lines, "Name").await?,
        email: prompt(&mut lines, "Email").await?,
        phone: prompt(&mut lines, "Phone").await?,
        password: prompt(&mut lines, "Password").await?,
        confirm_password: prompt(&mut lines, "Confirm password").await?,
    };

    match register_user(&authenticator, &store, &ConsoleForm, details).await {
        RegistrationOutcome::Registered { user_id } => {
            println!("Registered. Your user id is {user_id}.");
            Ok(())
        }
        // The form already printed the reason.
        RegistrationOutcome::PasswordMismatch | RegistrationOutcome::Failed(_) => {
            anyhow::bail!("registration failed")
        }
    }
}

async fn prompt(lines: &mut Lines<BufReader<Stdin>>, label: &str) -> anyhow::Result<String> {
    print!("{label}: ");
    std::io::stdout().flush()?;
    let line = lines
        .next_line()
        .await?
        .ok_or_else(|| anyhow::anyhow!("input closed before {label}"))?;
    Ok(line.trim().to_string())
}
