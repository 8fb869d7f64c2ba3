use anyhow::Result;
use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension, Row};
use study_desk_schemas::{Book, BookId, CompletedStep, ReadingProgress};
use tracing::debug;

use super::{get_json, get_time, to_db_time, Database};

const BOOK_COLUMNS: &str = "id, user_id, title, author, content, summary, created_at, updated_at";

const PROGRESS_COLUMNS: &str = "book_id, user_id, current_chapter, total_chapters,
                                completed_steps, comprehension_score";

impl Database {
    pub(super) fn init_book_schema(&self) -> Result<()> {
        self.conn.execute(
            "CREATE TABLE IF NOT EXISTS books (
                id TEXT PRIMARY KEY,
                user_id TEXT NOT NULL,
                title TEXT NOT NULL DEFAULT '',
                author TEXT NOT NULL DEFAULT '',
                content TEXT NOT NULL DEFAULT '',
                summary TEXT,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            )",
            [],
        )?;

        self.conn.execute(
            "CREATE TABLE IF NOT EXISTS reading_progress (
                book_id TEXT NOT NULL REFERENCES books(id) ON DELETE CASCADE,
                user_id TEXT NOT NULL,
                current_chapter INTEGER NOT NULL DEFAULT 1,
                total_chapters INTEGER NOT NULL DEFAULT 1,
                completed_steps TEXT NOT NULL DEFAULT '[]',
                comprehension_score REAL NOT NULL DEFAULT 0,
                PRIMARY KEY (book_id, user_id)
            )",
            [],
        )?;

        Ok(())
    }

    fn row_to_book(row: &Row) -> rusqlite::Result<Book> {
        Ok(Book {
            id: BookId(row.get(0)?),
            user_id: row.get(1)?,
            title: row.get(2)?,
            author: row.get(3)?,
            content: row.get(4)?,
            summary: row.get(5)?,
            created_at: get_time(row, 6)?,
            updated_at: get_time(row, 7)?,
        })
    }

    fn row_to_progress(row: &Row) -> rusqlite::Result<ReadingProgress> {
        Ok(ReadingProgress {
            book_id: BookId(row.get(0)?),
            user_id: row.get(1)?,
            current_chapter: row.get(2)?,
            total_chapters: row.get(3)?,
            completed_steps: get_json(row, 4)?,
            comprehension_score: row.get(5)?,
        })
    }

    pub fn insert_book(&self, book: &Book) -> Result<()> {
        self.conn.execute(
            "INSERT INTO books (id, user_id, title, author, content, summary, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                book.id.0,
                book.user_id,
                book.title,
                book.author,
                book.content,
                book.summary,
                to_db_time(&book.created_at),
                to_db_time(&book.updated_at),
            ],
        )?;

        debug!("Inserted book: {} ({} chars)", book.id, book.content.len());
        Ok(())
    }

    pub fn get_book(&self, id: &BookId) -> Result<Option<Book>> {
        let book = self
            .conn
            .query_row(
                &format!("SELECT {} FROM books WHERE id = ?1", BOOK_COLUMNS),
                params![id.0],
                Self::row_to_book,
            )
            .optional()?;

        Ok(book)
    }

    pub fn get_books_by_user(&self, user_id: &str) -> Result<Vec<Book>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM books WHERE user_id = ?1 ORDER BY created_at DESC",
            BOOK_COLUMNS
        ))?;

        let books = stmt
            .query_map(params![user_id], Self::row_to_book)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(books)
    }

    pub fn save_book_summary(&self, id: &BookId, summary: &str, now: DateTime<Utc>) -> Result<bool> {
        let changed = self.conn.execute(
            "UPDATE books SET summary = ?1, updated_at = ?2 WHERE id = ?3",
            params![summary, to_db_time(&now), id.0],
        )?;

        Ok(changed > 0)
    }

    /// Remove a book along with every reader's progress through it
    pub fn delete_book(&self, id: &BookId) -> Result<bool> {
        let changed = self
            .conn
            .execute("DELETE FROM books WHERE id = ?1", params![id.0])?;
        Ok(changed > 0)
    }

    pub fn get_reading_progress(
        &self,
        book_id: &BookId,
        user_id: &str,
    ) -> Result<Option<ReadingProgress>> {
        let progress = self
            .conn
            .query_row(
                &format!(
                    "SELECT {} FROM reading_progress WHERE book_id = ?1 AND user_id = ?2",
                    PROGRESS_COLUMNS
                ),
                params![book_id.0, user_id],
                Self::row_to_progress,
            )
            .optional()?;

        Ok(progress)
    }

    /// Record one finished SQ3R step, starting the reader's progress if needed
    pub fn append_completed_step(
        &self,
        book_id: &BookId,
        user_id: &str,
        step: &CompletedStep,
    ) -> Result<ReadingProgress> {
        let tx = self.conn.unchecked_transaction()?;

        let mut progress = tx
            .query_row(
                &format!(
                    "SELECT {} FROM reading_progress WHERE book_id = ?1 AND user_id = ?2",
                    PROGRESS_COLUMNS
                ),
                params![book_id.0, user_id],
                Self::row_to_progress,
            )
            .optional()?
            .unwrap_or_else(|| ReadingProgress::not_started(book_id.clone(), user_id));
        progress.completed_steps.push(step.clone());

        tx.execute(
            "INSERT INTO reading_progress (book_id, user_id, current_chapter, total_chapters,
                                           completed_steps, comprehension_score)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)
             ON CONFLICT(book_id, user_id) DO UPDATE SET completed_steps = excluded.completed_steps",
            params![
                book_id.0,
                user_id,
                progress.current_chapter,
                progress.total_chapters,
                serde_json::to_string(&progress.completed_steps)?,
                progress.comprehension_score,
            ],
        )?;
        tx.commit()?;

        debug!(
            "Reader {} has completed {} steps of book {}",
            user_id,
            progress.completed_steps.len(),
            book_id
        );
        Ok(progress)
    }
}
