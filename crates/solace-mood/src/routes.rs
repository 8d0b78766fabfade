use std::collections::BTreeMap;
use std::sync::Arc;

use axum::{Json, extract::State, http::StatusCode};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::analysis;
use crate::db::MoodDb;

/// Shared application state for all route handlers.
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<MoodDb>,
}

// ── Request/response types ──────────────────────────────────────────────

/// One captured expression sample from a client-side log.
#[derive(Debug, Clone, Deserialize)]
pub struct MoodSample {
    pub expression: String,
    #[serde(default)]
    pub captured_at: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct AnalyzeRequest {
    #[serde(default)]
    pub data_log: Vec<MoodSample>,
}

#[derive(Debug, Serialize)]
pub struct MoodReport {
    pub success: bool,
    pub total_samples: usize,
    pub dominant_mood: String,
    pub report_message: String,
    pub pie_chart_data: BTreeMap<String, f64>,
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
}

// ── Handlers ────────────────────────────────────────────────────────────

/// POST /api/mood/analyze — turn one raw expression log into a report.
pub async fn analyze_mood(
    State(state): State<AppState>,
    Json(req): Json<AnalyzeRequest>,
) -> Result<Json<MoodReport>, (StatusCode, Json<ErrorBody>)> {
    if req.data_log.is_empty() {
        return Err((
            StatusCode::BAD_REQUEST,
            Json(ErrorBody {
                error: "No valid data log received.".to_string(),
            }),
        ));
    }

    let report = analysis::analyze(&req.data_log);

    // History is best-effort; the report never depends on it.
    if let Err(e) = state.db.append_samples(&req.data_log) {
        warn!("Failed to append mood history: {}", e);
    }

    info!(
        "Analyzed {} samples, dominant mood {}",
        report.total_samples, report.dominant_mood
    );
    Ok(Json(report))
}

/// GET /health
pub async fn health() -> &'static str {
    "ok"
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_state(name: &str) -> (AppState, std::path::PathBuf) {
        let path = std::env::temp_dir()
            .join(format!("solace_mood_routes_{}_{}.db", name, std::process::id()));
        let _ = std::fs::remove_file(&path);
        let db = MoodDb::open(&path).unwrap();
        (AppState { db: Arc::new(db) }, path)
    }

    fn log(expressions: &[&str]) -> Vec<MoodSample> {
        expressions
            .iter()
            .map(|e| MoodSample {
                expression: e.to_string(),
                captured_at: None,
            })
            .collect()
    }

    #[tokio::test]
    async fn an_empty_log_is_rejected_with_a_400() {
        let (state, path) = temp_state("empty");

        let result = analyze_mood(State(state), Json(AnalyzeRequest { data_log: vec![] })).await;

        let (status, Json(body)) = result.expect_err("an empty log must be rejected");
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body.error, "No valid data log received.");

        let _ = std::fs::remove_file(&path);
    }

    #[tokio::test]
    async fn a_valid_log_yields_a_report_and_lands_in_history() {
        let (state, path) = temp_state("report");

        let request = AnalyzeRequest {
            data_log: log(&["happy", "happy", "sad"]),
        };
        let Json(report) = analyze_mood(State(state), Json(request))
            .await
            .expect("a non-empty log must produce a report");

        assert!(report.success);
        assert_eq!(report.total_samples, 3);
        assert_eq!(report.dominant_mood, "HAPPY");

        let count: i64 = {
            let conn = rusqlite::Connection::open(&path).unwrap();
            conn.query_row("SELECT COUNT(*) FROM mood_samples", [], |r| r.get(0))
                .unwrap()
        };
        assert_eq!(count, 3);

        let _ = std::fs::remove_file(&path);
    }
}
