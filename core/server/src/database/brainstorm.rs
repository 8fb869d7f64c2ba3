use anyhow::Result;
use rusqlite::{params, OptionalExtension, Row};
use study_desk_schemas::{BrainstormId, BrainstormSession, BrainstormStatus, PanelMessage};
use tracing::debug;

use super::{get_json, get_time, label_error, to_db_time, Database};

const BRAINSTORM_COLUMNS: &str = "id, user_id, topic, messages, synthesis, status, created_at";

impl Database {
    pub(super) fn init_brainstorm_schema(&self) -> Result<()> {
        self.conn.execute(
            "CREATE TABLE IF NOT EXISTS brainstorm_sessions (
                id TEXT PRIMARY KEY,
                user_id TEXT NOT NULL,
                topic TEXT NOT NULL,
                messages TEXT NOT NULL DEFAULT '[]',
                synthesis TEXT,
                status TEXT NOT NULL DEFAULT 'active',
                created_at TEXT NOT NULL
            )",
            [],
        )?;

        Ok(())
    }

    fn row_to_brainstorm(row: &Row) -> rusqlite::Result<BrainstormSession> {
        let status_raw: String = row.get(5)?;
        let status = BrainstormStatus::parse(&status_raw)
            .ok_or_else(|| label_error(5, "brainstorm status", &status_raw))?;

        Ok(BrainstormSession {
            id: BrainstormId(row.get(0)?),
            user_id: row.get(1)?,
            topic: row.get(2)?,
            messages: get_json(row, 3)?,
            synthesis: row.get(4)?,
            status,
            created_at: get_time(row, 6)?,
        })
    }

    pub fn insert_brainstorm(&self, session: &BrainstormSession) -> Result<()> {
        self.conn.execute(
            "INSERT INTO brainstorm_sessions (id, user_id, topic, messages, synthesis, status, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                session.id.0,
                session.user_id,
                session.topic,
                serde_json::to_string(&session.messages)?,
                session.synthesis,
                session.status.as_str(),
                to_db_time(&session.created_at),
            ],
        )?;

        debug!("Inserted brainstorm session: {}", session.id);
        Ok(())
    }

    pub fn get_brainstorm(&self, id: &BrainstormId) -> Result<Option<BrainstormSession>> {
        let session = self
            .conn
            .query_row(
                &format!(
                    "SELECT {} FROM brainstorm_sessions WHERE id = ?1",
                    BRAINSTORM_COLUMNS
                ),
                params![id.0],
                Self::row_to_brainstorm,
            )
            .optional()?;

        Ok(session)
    }

    pub fn get_brainstorms_by_user(&self, user_id: &str) -> Result<Vec<BrainstormSession>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM brainstorm_sessions WHERE user_id = ?1 ORDER BY created_at DESC",
            BRAINSTORM_COLUMNS
        ))?;

        let sessions = stmt
            .query_map(params![user_id], Self::row_to_brainstorm)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(sessions)
    }

    /// Append panel contributions to whatever the session already holds.
    ///
    /// Returns the updated session, or `None` if it does not exist.
    pub fn append_brainstorm_messages(
        &self,
        id: &BrainstormId,
        messages: &[PanelMessage],
    ) -> Result<Option<BrainstormSession>> {
        let tx = self.conn.unchecked_transaction()?;

        let Some(mut session) = tx
            .query_row(
                &format!(
                    "SELECT {} FROM brainstorm_sessions WHERE id = ?1",
                    BRAINSTORM_COLUMNS
                ),
                params![id.0],
                Self::row_to_brainstorm,
            )
            .optional()?
        else {
            return Ok(None);
        };

        session.messages.extend_from_slice(messages);
        tx.execute(
            "UPDATE brainstorm_sessions SET messages = ?1 WHERE id = ?2",
            params![serde_json::to_string(&session.messages)?, id.0],
        )?;
        tx.commit()?;

        Ok(Some(session))
    }

    /// Store the closing synthesis and mark the session completed
    pub fn complete_brainstorm(&self, id: &BrainstormId, synthesis: &str) -> Result<bool> {
        let changed = self.conn.execute(
            "UPDATE brainstorm_sessions SET synthesis = ?1, status = ?2 WHERE id = ?3",
            params![synthesis, BrainstormStatus::Completed.as_str(), id.0],
        )?;

        Ok(changed > 0)
    }

    pub fn delete_brainstorm(&self, id: &BrainstormId) -> Result<bool> {
        let changed = self
            .conn
            .execute("DELETE FROM brainstorm_sessions WHERE id = ?1", params![id.0])?;
        Ok(changed > 0)
    }
}
