use std::path::Path;
use std::sync::Mutex;

use anyhow::Result;
use rusqlite::Connection;
use tracing::info;

use crate::routes::MoodSample;

/// Mood history database. Append-heavy with tiny batches, so one connection
/// behind a mutex is enough.
pub struct MoodDb {
    conn: Mutex<Connection>,
}

impl MoodDb {
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)?;
        conn.pragma_update(None, "journal_mode", "WAL")?;

        run_migrations(&conn)?;

        info!("Mood DB opened at {}", path.display());
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Appends one request's samples to the history table.
    pub fn append_samples(&self, samples: &[MoodSample]) -> Result<()> {
        let conn = self
            .conn
            .lock()
            .map_err(|e| anyhow::anyhow!("DB lock poisoned: {}", e))?;
        for sample in samples {
            conn.execute(
                "INSERT INTO mood_samples (expression, captured_at) VALUES (?1, ?2)",
                rusqlite::params![&sample.expression, &sample.captured_at],
            )?;
        }
        Ok(())
    }
}

fn run_migrations(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL);",
    )?;

    let version: i64 = conn
        .query_row("SELECT COALESCE(MAX(version), 0) FROM schema_version", [], |r| r.get(0))?;

    if version < 1 {
        info!("Mood DB: running migration v1 (initial schema)");
        conn.execute_batch(
            "
            CREATE TABLE mood_samples (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                expression TEXT NOT NULL,
                captured_at TEXT,
                recorded_at TEXT NOT NULL DEFAULT (datetime('now'))
            );

            INSERT INTO schema_version (version) VALUES (1);
            ",
        )?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn appended_samples_land_in_the_history_table() {
        let path =
            std::env::temp_dir().join(format!("solace_mood_db_{}.db", std::process::id()));
        let _ = std::fs::remove_file(&path);

        let db = MoodDb::open(&path).unwrap();
        db.append_samples(&[
            MoodSample {
                expression: "happy".to_string(),
                captured_at: Some("2026-03-01T10:00:00Z".to_string()),
            },
            MoodSample {
                expression: "sad".to_string(),
                captured_at: None,
            },
        ])
        .unwrap();

        let count: i64 = {
            let conn = Connection::open(&path).unwrap();
            conn.query_row("SELECT COUNT(*) FROM mood_samples", [], |r| r.get(0))
                .unwrap()
        };
        assert_eq!(count, 2);

        drop(db);
        let _ = std::fs::remove_file(&path);
    }
}
