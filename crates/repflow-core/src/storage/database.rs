//! SQLite-based workout history.
//!
//! Provides persistent storage for:
//! - Completed workout sessions
//! - Their per-activity timelines
//! - Aggregate statistics

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};
use serde::{Deserialize, Serialize};

use super::data_dir;
use crate::error::HistoryError;
use crate::workout::{ActivityOutcome, ActivityRecord, CompletedSession};

/// Accepts finished workouts. Failures go back to the caller; nothing is retried.
pub trait HistoryStore {
    fn save(&mut self, session: &CompletedSession) -> Result<i64, HistoryError>;
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionSummary {
    pub id: i64,
    pub session_uuid: String,
    pub routine_id: String,
    pub routine_name: String,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
    pub duration_secs: u64,
    pub paused_secs: u64,
    pub total_activities: usize,
    pub completed_activities: usize,
    pub skipped_activities: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct HistoryStats {
    pub total_sessions: u64,
    pub total_active_secs: u64,
    pub completed_activities: u64,
    pub skipped_activities: u64,
}

/// SQLite database for workout history.
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Get a reference to the underlying SQLite connection.
    pub fn conn(&self) -> &Connection {
        &self.conn
    }

    /// Open the database at `~/.config/repflow/history.db`.
    ///
    /// Creates the database file and schema if they don't exist.
    ///
    /// # Errors
    /// Returns an error if the database cannot be opened or migrated.
    pub fn open() -> Result<Self, HistoryError> {
        Self::open_at(&data_dir()?.join("history.db"))
    }

    /// Open a database file at an explicit path.
    ///
    /// # Errors
    /// Returns an error if the database cannot be opened or migrated.
    pub fn open_at(path: &std::path::Path) -> Result<Self, HistoryError> {
        let conn = Connection::open(path).map_err(|source| HistoryError::OpenFailed {
            path: path.to_path_buf(),
            source,
        })?;
        let db = Self { conn };
        db.migrate()?;
        Ok(db)
    }

    /// Open an in-memory database (for tests).
    ///
    /// # Errors
    /// Returns an error if the schema cannot be created.
    pub fn open_memory() -> Result<Self, HistoryError> {
        let conn = Connection::open_in_memory()?;
        let db = Self { conn };
        db.migrate()?;
        Ok(db)
    }

    fn migrate(&self) -> Result<(), rusqlite::Error> {
        self.conn.execute_batch(
            "PRAGMA foreign_keys = ON;

            CREATE TABLE IF NOT EXISTS sessions (
                id                   INTEGER PRIMARY KEY AUTOINCREMENT,
                session_uuid         TEXT NOT NULL UNIQUE,
                routine_id           TEXT NOT NULL,
                routine_name         TEXT NOT NULL DEFAULT '',
                started_at           TEXT NOT NULL,
                completed_at         TEXT NOT NULL,
                duration_secs        INTEGER NOT NULL,
                paused_secs          INTEGER NOT NULL DEFAULT 0,
                total_activities     INTEGER NOT NULL,
                completed_activities INTEGER NOT NULL,
                skipped_activities   INTEGER NOT NULL DEFAULT 0
            );

            CREATE TABLE IF NOT EXISTS session_activities (
                session_id    INTEGER NOT NULL REFERENCES sessions(id) ON DELETE CASCADE,
                ordinal       INTEGER NOT NULL,
                activity_id   TEXT NOT NULL,
                activity_name TEXT NOT NULL DEFAULT '',
                block_index   INTEGER NOT NULL,
                repetition    INTEGER NOT NULL,
                outcome       TEXT,
                started_at    TEXT NOT NULL,
                ended_at      TEXT,
                paused_ms     INTEGER NOT NULL DEFAULT 0,
                PRIMARY KEY (session_id, ordinal)
            );

            CREATE INDEX IF NOT EXISTS idx_sessions_completed_at ON sessions(completed_at);
            CREATE INDEX IF NOT EXISTS idx_sessions_routine_id ON sessions(routine_id);",
        )?;
        Ok(())
    }

    /// Record a completed session and its timeline in one transaction.
    ///
    /// # Errors
    /// Returns an error if any insert fails; nothing is written in that case.
    pub fn record_session(&mut self, session: &CompletedSession) -> Result<i64, HistoryError> {
        let tx = self.conn.transaction()?;
        tx.execute(
            "INSERT INTO sessions (session_uuid, routine_id, routine_name, started_at, completed_at,
                                   duration_secs, paused_secs, total_activities,
                                   completed_activities, skipped_activities)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            params![
                session.id,
                session.routine_id,
                session.routine_name,
                session.started_at.to_rfc3339(),
                session.completed_at.to_rfc3339(),
                session.duration_secs,
                session.paused_secs,
                session.total_activities as i64,
                session.completed_activities as i64,
                session.skipped_activities as i64,
            ],
        )?;
        let session_id = tx.last_insert_rowid();
        {
            let mut stmt = tx.prepare(
                "INSERT INTO session_activities (session_id, ordinal, activity_id, activity_name,
                                                 block_index, repetition, outcome, started_at,
                                                 ended_at, paused_ms)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            )?;
            for (ordinal, record) in session.timeline.iter().enumerate() {
                stmt.execute(params![
                    session_id,
                    ordinal as i64,
                    record.activity_id,
                    record.activity_name,
                    record.block_index as i64,
                    record.repetition,
                    record.outcome.map(|o| o.as_str()),
                    record.started_at.to_rfc3339(),
                    record.ended_at.map(|t| t.to_rfc3339()),
                    record.paused_ms,
                ])?;
            }
        }
        tx.commit()?;
        Ok(session_id)
    }

    /// Most recent sessions first.
    pub fn list_sessions(&self, limit: usize) -> Result<Vec<SessionSummary>, HistoryError> {
        let mut stmt = self.conn.prepare(
            "SELECT id, session_uuid, routine_id, routine_name, started_at, completed_at,
                    duration_secs, paused_secs, total_activities, completed_activities,
                    skipped_activities
             FROM sessions
             ORDER BY completed_at DESC, id DESC
             LIMIT ?1",
        )?;
        let rows = stmt.query_map(params![limit as i64], |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, String>(3)?,
                row.get::<_, String>(4)?,
                row.get::<_, String>(5)?,
                row.get::<_, u64>(6)?,
                row.get::<_, u64>(7)?,
                row.get::<_, i64>(8)?,
                row.get::<_, i64>(9)?,
                row.get::<_, i64>(10)?,
            ))
        })?;

        let mut out = Vec::new();
        for row in rows {
            let (id, uuid, routine_id, routine_name, started, completed, dur, paused, total, done, skipped) =
                row?;
            out.push(SessionSummary {
                id,
                session_uuid: uuid,
                routine_id,
                routine_name,
                started_at: parse_ts(&started)?,
                completed_at: parse_ts(&completed)?,
                duration_secs: dur,
                paused_secs: paused,
                total_activities: total as usize,
                completed_activities: done as usize,
                skipped_activities: skipped as usize,
            });
        }
        Ok(out)
    }

    /// Timeline of one stored session, in execution order.
    pub fn session_timeline(&self, session_id: i64) -> Result<Vec<ActivityRecord>, HistoryError> {
        let mut stmt = self.conn.prepare(
            "SELECT activity_id, activity_name, block_index, repetition, outcome,
                    started_at, ended_at, paused_ms
             FROM session_activities
             WHERE session_id = ?1
             ORDER BY ordinal",
        )?;
        let rows = stmt.query_map(params![session_id], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, i64>(2)?,
                row.get::<_, u32>(3)?,
                row.get::<_, Option<String>>(4)?,
                row.get::<_, String>(5)?,
                row.get::<_, Option<String>>(6)?,
                row.get::<_, u64>(7)?,
            ))
        })?;

        let mut out = Vec::new();
        for row in rows {
            let (activity_id, activity_name, block_index, repetition, outcome, started, ended, paused_ms) =
                row?;
            let outcome = match outcome {
                Some(s) => Some(
                    ActivityOutcome::parse(&s)
                        .ok_or_else(|| HistoryError::Corrupt(format!("unknown outcome '{s}'")))?,
                ),
                None => None,
            };
            out.push(ActivityRecord {
                activity_id,
                activity_name,
                block_index: block_index as usize,
                repetition,
                outcome,
                started_at: parse_ts(&started)?,
                ended_at: ended.as_deref().map(parse_ts).transpose()?,
                paused_ms,
            });
        }
        Ok(out)
    }

    pub fn stats(&self) -> Result<HistoryStats, HistoryError> {
        let stats = self.conn.query_row(
            "SELECT COUNT(*),
                    COALESCE(SUM(duration_secs - paused_secs), 0),
                    COALESCE(SUM(completed_activities), 0),
                    COALESCE(SUM(skipped_activities), 0)
             FROM sessions",
            [],
            |row| {
                Ok(HistoryStats {
                    total_sessions: row.get(0)?,
                    total_active_secs: row.get(1)?,
                    completed_activities: row.get(2)?,
                    skipped_activities: row.get(3)?,
                })
            },
        )?;
        Ok(stats)
    }
}

impl HistoryStore for Database {
    fn save(&mut self, session: &CompletedSession) -> Result<i64, HistoryError> {
        self.record_session(session)
    }
}

fn parse_ts(s: &str) -> Result<DateTime<Utc>, HistoryError> {
    DateTime::parse_from_rfc3339(s)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| HistoryError::Corrupt(format!("bad timestamp '{s}': {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn sample(name: &str, offset_min: i64) -> CompletedSession {
        let start = Utc::now() + Duration::minutes(offset_min);
        CompletedSession {
            id: uuid::Uuid::new_v4().to_string(),
            routine_id: "r-1".into(),
            routine_name: name.into(),
            started_at: start,
            completed_at: start + Duration::seconds(90),
            duration_secs: 90,
            paused_secs: 10,
            total_activities: 2,
            completed_activities: 1,
            skipped_activities: 1,
            timeline: vec![
                ActivityRecord {
                    activity_id: "a".into(),
                    activity_name: "Burpees".into(),
                    block_index: 0,
                    repetition: 1,
                    outcome: Some(ActivityOutcome::PostponedThenCompleted),
                    started_at: start,
                    ended_at: Some(start + Duration::seconds(60)),
                    paused_ms: 10_000,
                },
                ActivityRecord {
                    activity_id: "b".into(),
                    activity_name: "Sprint".into(),
                    block_index: 0,
                    repetition: 1,
                    outcome: Some(ActivityOutcome::Skipped),
                    started_at: start + Duration::seconds(60),
                    ended_at: Some(start + Duration::seconds(61)),
                    paused_ms: 0,
                },
            ],
        }
    }

    #[test]
    fn record_and_list_sessions() {
        let mut db = Database::open_memory().unwrap();
        db.save(&sample("Older", -60)).unwrap();
        let id = db.save(&sample("Newer", 0)).unwrap();

        let sessions = db.list_sessions(10).unwrap();
        assert_eq!(sessions.len(), 2);
        assert_eq!(sessions[0].routine_name, "Newer");
        assert_eq!(sessions[0].id, id);
        assert_eq!(sessions[0].completed_activities, 1);
        assert_eq!(db.list_sessions(1).unwrap().len(), 1);
    }

    #[test]
    fn timeline_roundtrips_outcomes() {
        let mut db = Database::open_memory().unwrap();
        let session = sample("Timeline", 0);
        let id = db.save(&session).unwrap();
        let timeline = db.session_timeline(id).unwrap();
        assert_eq!(timeline.len(), 2);
        assert_eq!(timeline[0].outcome, Some(ActivityOutcome::PostponedThenCompleted));
        assert_eq!(timeline[1].outcome, Some(ActivityOutcome::Skipped));
        assert_eq!(timeline[0].paused_ms, 10_000);
    }

    #[test]
    fn duplicate_session_is_rejected_atomically() {
        let mut db = Database::open_memory().unwrap();
        let session = sample("Dup", 0);
        db.save(&session).unwrap();
        assert!(db.save(&session).is_err());
        assert_eq!(db.list_sessions(10).unwrap().len(), 1);
    }

    #[test]
    fn stats_aggregate_active_time() {
        let mut db = Database::open_memory().unwrap();
        assert_eq!(db.stats().unwrap(), HistoryStats::default());
        db.save(&sample("A", 0)).unwrap();
        db.save(&sample("B", 1)).unwrap();
        let stats = db.stats().unwrap();
        assert_eq!(stats.total_sessions, 2);
        assert_eq!(stats.total_active_secs, 160);
        assert_eq!(stats.completed_activities, 2);
        assert_eq!(stats.skipped_activities, 2);
    }

    #[test]
    fn open_at_creates_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("history.db");
        let mut db = Database::open_at(&path).unwrap();
        db.save(&sample("Disk", 0)).unwrap();
        drop(db);
        let db = Database::open_at(&path).unwrap();
        assert_eq!(db.list_sessions(5).unwrap().len(), 1);
    }
}
