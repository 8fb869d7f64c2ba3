use anyhow::Result;
use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension, Row};
use study_desk_schemas::{Document, DocumentId, UpdateDocumentRequest};
use tracing::debug;

use super::{get_time, to_db_time, Database};

const DOCUMENT_COLUMNS: &str = "id, user_id, title, content, created_at, updated_at";

impl Database {
    pub(super) fn init_document_schema(&self) -> Result<()> {
        self.conn.execute(
            "CREATE TABLE IF NOT EXISTS documents (
                id TEXT PRIMARY KEY,
                user_id TEXT NOT NULL,
                title TEXT NOT NULL DEFAULT '',
                content TEXT NOT NULL DEFAULT '',
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            )",
            [],
        )?;

        self.conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_documents_user ON documents(user_id, updated_at)",
            [],
        )?;

        Ok(())
    }

    fn row_to_document(row: &Row) -> rusqlite::Result<Document> {
        Ok(Document {
            id: DocumentId(row.get(0)?),
            user_id: row.get(1)?,
            title: row.get(2)?,
            content: row.get(3)?,
            created_at: get_time(row, 4)?,
            updated_at: get_time(row, 5)?,
        })
    }

    pub fn insert_document(&self, document: &Document) -> Result<()> {
        self.conn.execute(
            "INSERT INTO documents (id, user_id, title, content, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                document.id.0,
                document.user_id,
                document.title,
                document.content,
                to_db_time(&document.created_at),
                to_db_time(&document.updated_at),
            ],
        )?;

        debug!("Inserted document: {}", document.id);
        Ok(())
    }

    pub fn get_document(&self, id: &DocumentId) -> Result<Option<Document>> {
        let document = self
            .conn
            .query_row(
                &format!("SELECT {} FROM documents WHERE id = ?1", DOCUMENT_COLUMNS),
                params![id.0],
                Self::row_to_document,
            )
            .optional()?;

        Ok(document)
    }

    /// A user's documents, most recently edited first
    pub fn get_documents_by_user(&self, user_id: &str) -> Result<Vec<Document>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM documents WHERE user_id = ?1 ORDER BY updated_at DESC",
            DOCUMENT_COLUMNS
        ))?;

        let documents = stmt
            .query_map(params![user_id], Self::row_to_document)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(documents)
    }

    pub fn update_document(
        &self,
        id: &DocumentId,
        update: &UpdateDocumentRequest,
        now: DateTime<Utc>,
    ) -> Result<bool> {
        let changed = self.conn.execute(
            "UPDATE documents SET title = ?1, content = ?2, updated_at = ?3 WHERE id = ?4",
            params![update.title, update.content, to_db_time(&now), id.0],
        )?;

        Ok(changed > 0)
    }

    pub fn delete_document(&self, id: &DocumentId) -> Result<bool> {
        let changed = self
            .conn
            .execute("DELETE FROM documents WHERE id = ?1", params![id.0])?;
        Ok(changed > 0)
    }
}
