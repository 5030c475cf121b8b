use std::{
    path::{Path, PathBuf},
    sync::{mpsc, Arc, Mutex},
    thread::{self, JoinHandle},
};

use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Utc};
use log::{debug, error, info};
use rusqlite::{params, Connection, Transaction};
use tokio::sync::oneshot;

mod helpers;
mod migrations;

pub use helpers::{format_instant, parse_datetime};
use migrations::run_migrations;

use crate::channel::Channel;
use crate::error::StoreError;
use crate::models::{SeriesPoint, WindowSummary};

type DbTask = Box<dyn FnOnce(&mut Connection) + Send + 'static>;

enum DbCommand {
    Execute(DbTask),
    Shutdown,
}

struct DatabaseInner {
    sender: mpsc::Sender<DbCommand>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl Drop for DatabaseInner {
    fn drop(&mut self) {
        let mut guard = match self.worker.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };

        if let Some(handle) = guard.take() {
            if let Err(err) = self.sender.send(DbCommand::Shutdown) {
                error!("Failed to send shutdown to DB thread: {err}");
            }
            if let Err(join_err) = handle.join() {
                error!("Failed to join DB thread: {join_err:?}");
            }
        }
    }
}

/// SQLite store behind a dedicated worker thread. All access goes through
/// the command channel, so one connection serves the single-writer ingestion
/// loop and any number of concurrent readers.
#[derive(Clone)]
pub struct Database {
    inner: Arc<DatabaseInner>,
    db_path: Arc<PathBuf>,
}

impl Database {
    pub fn new(db_path: PathBuf) -> Result<Self> {
        if let Some(parent) = db_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).with_context(|| {
                    format!("failed to create database directory {}", parent.display())
                })?;
            }
        }

        let (command_tx, command_rx) = mpsc::channel::<DbCommand>();
        let (ready_tx, ready_rx) = mpsc::channel();
        let path_for_thread = db_path.clone();

        let worker = thread::Builder::new()
            .name("cardata-db".into())
            .spawn(move || {
                let mut conn = match Connection::open(&path_for_thread) {
                    Ok(connection) => connection,
                    Err(err) => {
                        let _ = ready_tx.send(Err(anyhow::Error::new(err)
                            .context("failed to open SQLite database")));
                        return;
                    }
                };

                if let Err(err) = conn.pragma_update(None, "journal_mode", "WAL") {
                    error!("Failed to enable WAL mode: {err}");
                }
                if let Err(err) = conn.pragma_update(None, "foreign_keys", "ON") {
                    error!("Failed to enable foreign keys: {err}");
                }

                let init_result =
                    run_migrations(&mut conn).context("failed to run database migrations");
                if ready_tx.send(init_result).is_err() {
                    error!("DB initialization receiver dropped before ready signal");
                    return;
                }

                while let Ok(command) = command_rx.recv() {
                    match command {
                        DbCommand::Execute(task) => {
                            task(&mut conn);
                        }
                        DbCommand::Shutdown => break,
                    }
                }

                info!("Database thread shutting down");
            })
            .with_context(|| "failed to spawn database worker thread")?;

        ready_rx
            .recv()
            .context("database worker exited before signaling readiness")??;

        info!("Database initialized at {}", db_path.as_path().display());

        Ok(Self {
            inner: Arc::new(DatabaseInner {
                sender: command_tx,
                worker: Mutex::new(Some(worker)),
            }),
            db_path: Arc::new(db_path),
        })
    }

    pub fn path(&self) -> &Path {
        self.db_path.as_path()
    }

    pub async fn execute<F, T>(&self, task: F) -> Result<T>
    where
        F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let sender = self.inner.sender.clone();
        let (reply_tx, reply_rx) = oneshot::channel();

        let command = DbCommand::Execute(Box::new(move |conn| {
            let result = task(conn);
            if reply_tx.send(result).is_err() {
                error!("DB caller dropped before receiving result");
            }
        }));

        sender
            .send(command)
            .map_err(|err| anyhow!("failed to send command to DB thread: {err}"))?;

        reply_rx
            .await
            .map_err(|_| anyhow!("database thread terminated unexpectedly"))?
    }

    /// Create the user row if it does not exist yet.
    pub async fn ensure_user(&self, user_id: i64) -> Result<()> {
        self.execute(move |conn| {
            conn.execute(
                "INSERT OR IGNORE INTO users (id) VALUES (?1)",
                params![user_id],
            )
            .with_context(|| format!("failed to ensure user {user_id}"))?;
            Ok(())
        })
        .await
    }

    pub async fn user_exists(&self, user_id: i64) -> Result<bool> {
        self.execute(move |conn| {
            let mut stmt = conn.prepare("SELECT 1 FROM users WHERE id = ?1")?;
            let exists = stmt.exists(params![user_id])?;
            Ok(exists)
        })
        .await
    }

    /// Persist one flushed window: resolve or create the timestamp row for
    /// `window_start` (second granularity), then insert one value row per
    /// channel present in the summary, all in a single transaction. Returns
    /// the timestamp id, or None when the summary had nothing to write.
    pub async fn write_summary(
        &self,
        user_id: i64,
        window_start: DateTime<Utc>,
        summary: &WindowSummary,
    ) -> std::result::Result<Option<i64>, StoreError> {
        if summary.is_empty() {
            debug!("skipping empty window at {window_start}");
            return Ok(None);
        }

        let summary = summary.clone();
        let timestamp_id = self
            .execute(move |conn| {
                let tx = conn
                    .transaction()
                    .context("failed to open write transaction")?;

                let timestamp_id = lookup_or_insert_timestamp(&tx, window_start)?;

                for (channel, value) in &summary.means {
                    tx.execute(
                        "INSERT INTO channel_values (user_id, channel, timestamp_id, value)
                         VALUES (?1, ?2, ?3, ?4)",
                        params![user_id, channel.as_str(), timestamp_id, value],
                    )
                    .with_context(|| format!("failed to insert {channel} value"))?;
                }

                for code in &summary.diagnostic_codes {
                    tx.execute(
                        "INSERT INTO diagnostic_codes (user_id, timestamp_id, code)
                         VALUES (?1, ?2, ?3)",
                        params![user_id, timestamp_id, code],
                    )
                    .with_context(|| format!("failed to insert diagnostic code {code}"))?;
                }

                tx.commit().context("failed to commit window write")?;
                Ok(timestamp_id)
            })
            .await?;

        debug!("persisted window at {window_start} as timestamp {timestamp_id}");
        Ok(Some(timestamp_id))
    }

    /// All stored (timestamp, value) pairs for one numeric channel and user,
    /// ascending by timestamp. No resampling.
    pub async fn fetch_channel_series(
        &self,
        user_id: i64,
        channel: Channel,
    ) -> Result<Vec<SeriesPoint>> {
        self.execute(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT t.timestamp, v.value
                 FROM channel_values v
                 JOIN timestamps t ON t.id = v.timestamp_id
                 WHERE v.user_id = ?1 AND v.channel = ?2
                 ORDER BY t.timestamp ASC",
            )?;

            let mut rows = stmt.query(params![user_id, channel.as_str()])?;
            let mut points = Vec::new();
            while let Some(row) = rows.next()? {
                let timestamp = parse_datetime(&row.get::<_, String>(0)?, "timestamp")?;
                let value: f64 = row.get(1)?;
                points.push(SeriesPoint::new(timestamp, value));
            }

            Ok(points)
        })
        .await
    }

    /// All stored diagnostic codes for one user, ascending by timestamp.
    pub async fn fetch_diagnostic_codes(
        &self,
        user_id: i64,
    ) -> Result<Vec<(DateTime<Utc>, String)>> {
        self.execute(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT t.timestamp, d.code
                 FROM diagnostic_codes d
                 JOIN timestamps t ON t.id = d.timestamp_id
                 WHERE d.user_id = ?1
                 ORDER BY t.timestamp ASC",
            )?;

            let mut rows = stmt.query(params![user_id])?;
            let mut codes = Vec::new();
            while let Some(row) = rows.next()? {
                let timestamp = parse_datetime(&row.get::<_, String>(0)?, "timestamp")?;
                let code: String = row.get(1)?;
                codes.push((timestamp, code));
            }

            Ok(codes)
        })
        .await
    }
}

/// Resolve the surrogate id for an instant, inserting the timestamp row if
/// this is the first write for it. At most one row ever exists per distinct
/// second-truncated instant.
fn lookup_or_insert_timestamp(tx: &Transaction<'_>, instant: DateTime<Utc>) -> Result<i64> {
    let stored = format_instant(instant);

    let existing: Option<i64> = tx
        .query_row(
            "SELECT id FROM timestamps WHERE timestamp = ?1",
            params![stored],
            |row| row.get(0),
        )
        .map(Some)
        .or_else(|err| match err {
            rusqlite::Error::QueryReturnedNoRows => Ok(None),
            other => Err(other),
        })
        .context("failed to look up timestamp row")?;

    if let Some(id) = existing {
        return Ok(id);
    }

    let id = tx
        .query_row(
            "INSERT INTO timestamps (timestamp) VALUES (?1) RETURNING id",
            params![stored],
            |row| row.get(0),
        )
        .context("failed to insert timestamp row")?;

    Ok(id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn summary_with_speed(value: f64) -> WindowSummary {
        WindowSummary {
            means: vec![(Channel::Speed, value)],
            diagnostic_codes: Vec::new(),
        }
    }

    async fn open_test_db() -> Database {
        let db = Database::new(PathBuf::from(":memory:")).expect("in-memory db");
        db.ensure_user(1).await.expect("ensure user");
        db
    }

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()
    }

    #[tokio::test]
    async fn write_resolves_same_timestamp_to_one_row() {
        let db = open_test_db().await;

        let first = db
            .write_summary(1, t0(), &summary_with_speed(10.0))
            .await
            .unwrap()
            .unwrap();
        let second = db
            .write_summary(1, t0(), &summary_with_speed(20.0))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(first, second);

        let (timestamp_rows, value_rows) = db
            .execute(|conn| {
                let timestamps: i64 =
                    conn.query_row("SELECT COUNT(*) FROM timestamps", [], |r| r.get(0))?;
                let values: i64 =
                    conn.query_row("SELECT COUNT(*) FROM channel_values", [], |r| r.get(0))?;
                Ok((timestamps, values))
            })
            .await
            .unwrap();
        assert_eq!(timestamp_rows, 1);
        assert_eq!(value_rows, 2);
    }

    #[tokio::test]
    async fn absent_channel_produces_no_row() {
        let db = open_test_db().await;
        db.write_summary(1, t0(), &summary_with_speed(10.0))
            .await
            .unwrap();

        let rpm = db.fetch_channel_series(1, Channel::Rpm).await.unwrap();
        assert!(rpm.is_empty());
    }

    #[tokio::test]
    async fn empty_summary_writes_nothing() {
        let db = open_test_db().await;
        let id = db
            .write_summary(1, t0(), &WindowSummary::default())
            .await
            .unwrap();
        assert_eq!(id, None);

        let timestamp_rows: i64 = db
            .execute(|conn| {
                Ok(conn.query_row("SELECT COUNT(*) FROM timestamps", [], |r| r.get(0))?)
            })
            .await
            .unwrap();
        assert_eq!(timestamp_rows, 0);
    }

    #[tokio::test]
    async fn failed_write_rolls_back_the_whole_window() {
        let db = open_test_db().await;

        // User 42 does not exist, so the channel insert violates the foreign
        // key and the transaction, including the timestamp row, rolls back.
        let result = db.write_summary(42, t0(), &summary_with_speed(10.0)).await;
        assert!(result.is_err());

        let timestamp_rows: i64 = db
            .execute(|conn| {
                Ok(conn.query_row("SELECT COUNT(*) FROM timestamps", [], |r| r.get(0))?)
            })
            .await
            .unwrap();
        assert_eq!(timestamp_rows, 0);
    }

    #[tokio::test]
    async fn series_comes_back_in_ascending_order() {
        let db = open_test_db().await;
        for (offset, value) in [(120, 30.0), (0, 10.0), (60, 20.0)] {
            db.write_summary(
                1,
                t0() + chrono::Duration::seconds(offset),
                &summary_with_speed(value),
            )
            .await
            .unwrap();
        }

        let series = db.fetch_channel_series(1, Channel::Speed).await.unwrap();
        assert_eq!(series.len(), 3);
        assert!(series.windows(2).all(|w| w[0].timestamp < w[1].timestamp));
        assert_eq!(series[0].value, 10.0);
        assert_eq!(series[2].value, 30.0);
    }

    #[tokio::test]
    async fn diagnostic_codes_round_trip() {
        let db = open_test_db().await;
        let summary = WindowSummary {
            means: vec![(Channel::Rpm, 900.0)],
            diagnostic_codes: vec!["P0301".to_string(), "P0420".to_string()],
        };
        db.write_summary(1, t0(), &summary).await.unwrap();

        let codes = db.fetch_diagnostic_codes(1).await.unwrap();
        let names: Vec<&str> = codes.iter().map(|(_, c)| c.as_str()).collect();
        assert_eq!(names, vec!["P0301", "P0420"]);
    }

    #[tokio::test]
    async fn user_existence_check() {
        let db = open_test_db().await;
        assert!(db.user_exists(1).await.unwrap());
        assert!(!db.user_exists(7).await.unwrap());
    }
}
