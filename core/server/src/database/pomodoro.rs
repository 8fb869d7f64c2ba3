use anyhow::Result;
use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension, Row};
use study_desk_schemas::{PomodoroId, PomodoroSession};
use tracing::debug;

use super::{get_time, get_time_opt, to_db_time, Database};

const POMODORO_COLUMNS: &str = "id, user_id, task, duration, start_time, end_time, completed,
                                created_at";

impl Database {
    pub(super) fn init_pomodoro_schema(&self) -> Result<()> {
        self.conn.execute(
            "CREATE TABLE IF NOT EXISTS pomodoro_sessions (
                id TEXT PRIMARY KEY,
                user_id TEXT NOT NULL,
                task TEXT,
                duration INTEGER NOT NULL DEFAULT 25 CHECK (duration > 0),
                start_time TEXT NOT NULL,
                end_time TEXT,
                completed INTEGER NOT NULL DEFAULT 0,
                created_at TEXT NOT NULL
            )",
            [],
        )?;

        self.conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_pomodoro_user ON pomodoro_sessions(user_id, created_at)",
            [],
        )?;

        Ok(())
    }

    fn row_to_pomodoro(row: &Row) -> rusqlite::Result<PomodoroSession> {
        Ok(PomodoroSession {
            id: PomodoroId(row.get(0)?),
            user_id: row.get(1)?,
            task: row.get(2)?,
            duration: row.get(3)?,
            start_time: get_time(row, 4)?,
            end_time: get_time_opt(row, 5)?,
            completed: row.get(6)?,
            created_at: get_time(row, 7)?,
        })
    }

    pub fn insert_pomodoro(&self, session: &PomodoroSession) -> Result<()> {
        self.conn.execute(
            "INSERT INTO pomodoro_sessions (id, user_id, task, duration, start_time, end_time,
                                            completed, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                session.id.0,
                session.user_id,
                session.task,
                session.duration,
                to_db_time(&session.start_time),
                session.end_time.as_ref().map(to_db_time),
                session.completed,
                to_db_time(&session.created_at),
            ],
        )?;

        debug!("Started pomodoro {} ({} min)", session.id, session.duration);
        Ok(())
    }

    /// The user's most recent unfinished session
    pub fn get_active_pomodoro(&self, user_id: &str) -> Result<Option<PomodoroSession>> {
        let session = self
            .conn
            .query_row(
                &format!(
                    "SELECT {} FROM pomodoro_sessions
                     WHERE user_id = ?1 AND completed = 0
                     ORDER BY created_at DESC
                     LIMIT 1",
                    POMODORO_COLUMNS
                ),
                params![user_id],
                Self::row_to_pomodoro,
            )
            .optional()?;

        Ok(session)
    }

    /// A user's sessions, newest first, optionally capped at `limit`
    pub fn get_pomodoros_by_user(
        &self,
        user_id: &str,
        limit: Option<usize>,
    ) -> Result<Vec<PomodoroSession>> {
        let limit = limit.map(|l| l as i64).unwrap_or(-1);
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM pomodoro_sessions
             WHERE user_id = ?1
             ORDER BY created_at DESC
             LIMIT ?2",
            POMODORO_COLUMNS
        ))?;

        let sessions = stmt
            .query_map(params![user_id, limit], Self::row_to_pomodoro)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(sessions)
    }

    /// Mark a session finished. Completing it again keeps the first end time.
    pub fn complete_pomodoro(&self, id: &PomodoroId, now: DateTime<Utc>) -> Result<bool> {
        let changed = self.conn.execute(
            "UPDATE pomodoro_sessions
             SET completed = 1, end_time = COALESCE(end_time, ?1)
             WHERE id = ?2",
            params![to_db_time(&now), id.0],
        )?;

        Ok(changed > 0)
    }
}
