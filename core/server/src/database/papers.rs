use anyhow::Result;
use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension, Row};
use study_desk_schemas::{Paper, PaperId};
use tracing::debug;

use super::{get_json, get_time, to_db_time, Database};

const PAPER_COLUMNS: &str = "id, user_id, title, authors, abstract, content, translated_content,
                             created_at, updated_at";

impl Database {
    pub(super) fn init_paper_schema(&self) -> Result<()> {
        self.conn.execute(
            "CREATE TABLE IF NOT EXISTS papers (
                id TEXT PRIMARY KEY,
                user_id TEXT NOT NULL,
                title TEXT NOT NULL DEFAULT '',
                authors TEXT NOT NULL DEFAULT '[]',
                abstract TEXT NOT NULL DEFAULT '',
                content TEXT NOT NULL DEFAULT '',
                translated_content TEXT,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            )",
            [],
        )?;

        Ok(())
    }

    fn row_to_paper(row: &Row) -> rusqlite::Result<Paper> {
        Ok(Paper {
            id: PaperId(row.get(0)?),
            user_id: row.get(1)?,
            title: row.get(2)?,
            authors: get_json(row, 3)?,
            abstract_text: row.get(4)?,
            content: row.get(5)?,
            translated_content: row.get(6)?,
            created_at: get_time(row, 7)?,
            updated_at: get_time(row, 8)?,
        })
    }

    pub fn insert_paper(&self, paper: &Paper) -> Result<()> {
        self.conn.execute(
            "INSERT INTO papers (id, user_id, title, authors, abstract, content,
                                 translated_content, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                paper.id.0,
                paper.user_id,
                paper.title,
                serde_json::to_string(&paper.authors)?,
                paper.abstract_text,
                paper.content,
                paper.translated_content,
                to_db_time(&paper.created_at),
                to_db_time(&paper.updated_at),
            ],
        )?;

        debug!("Inserted paper: {}", paper.id);
        Ok(())
    }

    pub fn get_paper(&self, id: &PaperId) -> Result<Option<Paper>> {
        let paper = self
            .conn
            .query_row(
                &format!("SELECT {} FROM papers WHERE id = ?1", PAPER_COLUMNS),
                params![id.0],
                Self::row_to_paper,
            )
            .optional()?;

        Ok(paper)
    }

    /// A user's papers, newest first
    pub fn get_papers_by_user(&self, user_id: &str) -> Result<Vec<Paper>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM papers WHERE user_id = ?1 ORDER BY created_at DESC",
            PAPER_COLUMNS
        ))?;

        let papers = stmt
            .query_map(params![user_id], Self::row_to_paper)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(papers)
    }

    pub fn save_paper_translation(
        &self,
        id: &PaperId,
        translated: &str,
        now: DateTime<Utc>,
    ) -> Result<bool> {
        let changed = self.conn.execute(
            "UPDATE papers SET translated_content = ?1, updated_at = ?2 WHERE id = ?3",
            params![translated, to_db_time(&now), id.0],
        )?;

        Ok(changed > 0)
    }
}
