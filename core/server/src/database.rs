use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::Path;
use study_desk_schemas::{
    ChatEntry, CornellData, Difficulty, ErrorQuestion, ErrorQuestionId, Essay, EssayFeedback,
    EssayId, FeynmanResult, Mood, Note, NoteId, NoteMethod, Quote, QuoteId, RelaxationSession,
    ReviewState, SessionId, UpdateNoteRequest, WeakSubject,
};
use tracing::{debug, info};

mod books;
mod brainstorm;
mod documents;
mod papers;
mod pomodoro;
mod problems;
mod resources;

const NOTE_COLUMNS: &str = "id, user_id, title, content, method, cornell_data, feynman_result,
                            tags, next_review_at, review_count, created_at, updated_at";

const ESSAY_COLUMNS: &str = "id, user_id, title, content, subject, grade, created_at";

const ERROR_QUESTION_COLUMNS: &str = "id, user_id, question, user_answer, correct_answer,
                                      explanation, subject, difficulty, mastery_level, created_at";

const QUOTE_COLUMNS: &str = "id, content, theme, language, author, category, user_id, created_at";

pub struct Database {
    conn: Connection,
}

impl Database {
    /// Open (or create) the database and make sure the schema exists
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self> {
        let conn = Connection::open(path.as_ref())
            .with_context(|| format!("Failed to open database at {}", path.as_ref().display()))?;

        conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get::<_, String>(0))?;
        conn.pragma_update(None, "foreign_keys", "ON")?;

        let db = Self { conn };
        db.init_schema()?;

        info!("Database initialized");
        Ok(db)
    }

    /// Create all tables and indexes
    fn init_schema(&self) -> Result<()> {
        self.conn.execute(
            "CREATE TABLE IF NOT EXISTS notes (
                id TEXT PRIMARY KEY,
                user_id TEXT NOT NULL,
                title TEXT NOT NULL,
                content TEXT NOT NULL,
                method TEXT NOT NULL DEFAULT 'free',
                cornell_data TEXT,
                feynman_result TEXT,
                tags TEXT NOT NULL DEFAULT '[]',
                next_review_at TEXT NOT NULL,
                review_count INTEGER NOT NULL DEFAULT 0 CHECK (review_count >= 0),
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            )",
            [],
        )?;

        self.conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_notes_user_review
             ON notes(user_id, next_review_at)",
            [],
        )?;

        self.conn.execute(
            "CREATE TABLE IF NOT EXISTS essays (
                id TEXT PRIMARY KEY,
                user_id TEXT NOT NULL,
                title TEXT NOT NULL,
                content TEXT NOT NULL,
                subject TEXT NOT NULL DEFAULT '',
                grade TEXT NOT NULL DEFAULT '',
                feedback TEXT,
                created_at TEXT NOT NULL
            )",
            [],
        )?;

        self.conn.execute(
            "CREATE TABLE IF NOT EXISTS error_questions (
                id TEXT PRIMARY KEY,
                user_id TEXT NOT NULL,
                question TEXT NOT NULL,
                user_answer TEXT NOT NULL DEFAULT '',
                correct_answer TEXT NOT NULL DEFAULT '',
                explanation TEXT NOT NULL DEFAULT '',
                subject TEXT NOT NULL DEFAULT '',
                difficulty TEXT NOT NULL DEFAULT 'medium',
                mastery_level INTEGER NOT NULL DEFAULT 0,
                created_at TEXT NOT NULL
            )",
            [],
        )?;

        self.conn.execute(
            "CREATE TABLE IF NOT EXISTS quotes (
                id TEXT PRIMARY KEY,
                content TEXT NOT NULL,
                theme TEXT NOT NULL DEFAULT '',
                language TEXT NOT NULL DEFAULT '',
                author TEXT NOT NULL DEFAULT '',
                category TEXT NOT NULL DEFAULT '',
                user_id TEXT NOT NULL,
                is_daily INTEGER NOT NULL DEFAULT 0,
                daily_date TEXT,
                created_at TEXT NOT NULL
            )",
            [],
        )?;

        self.conn.execute(
            "CREATE TABLE IF NOT EXISTS relaxation_sessions (
                id TEXT PRIMARY KEY,
                user_id TEXT NOT NULL,
                messages TEXT NOT NULL DEFAULT '[]',
                mood TEXT,
                created_at TEXT NOT NULL
            )",
            [],
        )?;

        self.init_document_schema()?;
        self.init_paper_schema()?;
        self.init_book_schema()?;
        self.init_brainstorm_schema()?;
        self.init_pomodoro_schema()?;
        self.init_problem_schema()?;
        self.init_resource_schema()?;

        Ok(())
    }

    // ========== NOTES ==========

    fn row_to_note(row: &Row) -> rusqlite::Result<Note> {
        let method_raw: String = row.get(4)?;
        let method = NoteMethod::parse(&method_raw)
            .ok_or_else(|| label_error(4, "note method", &method_raw))?;

        Ok(Note {
            id: NoteId(row.get(0)?),
            user_id: row.get(1)?,
            title: row.get(2)?,
            content: row.get(3)?,
            method,
            cornell_data: get_json_opt(row, 5)?,
            feynman_result: get_json_opt(row, 6)?,
            tags: get_json(row, 7)?,
            next_review_at: get_time(row, 8)?,
            review_count: row.get(9)?,
            created_at: get_time(row, 10)?,
            updated_at: get_time(row, 11)?,
        })
    }

    /// Insert a note into the database
    pub fn insert_note(&self, note: &Note) -> Result<()> {
        self.conn.execute(
            "INSERT INTO notes (id, user_id, title, content, method, cornell_data, feynman_result,
                                tags, next_review_at, review_count, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
            params![
                note.id.0,
                note.user_id,
                note.title,
                note.content,
                note.method.as_str(),
                to_json_opt(note.cornell_data.as_ref())?,
                to_json_opt(note.feynman_result.as_ref())?,
                serde_json::to_string(&note.tags)?,
                to_db_time(&note.next_review_at),
                note.review_count,
                to_db_time(&note.created_at),
                to_db_time(&note.updated_at),
            ],
        )?;

        debug!("Inserted note: {}", note.id);
        Ok(())
    }

    pub fn get_note(&self, id: &NoteId) -> Result<Option<Note>> {
        let note = self
            .conn
            .query_row(
                &format!("SELECT {} FROM notes WHERE id = ?1", NOTE_COLUMNS),
                params![id.0],
                Self::row_to_note,
            )
            .optional()?;

        Ok(note)
    }

    /// All notes of a user, most recently edited first
    pub fn get_notes_by_user(&self, user_id: &str) -> Result<Vec<Note>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM notes WHERE user_id = ?1 ORDER BY updated_at DESC",
            NOTE_COLUMNS
        ))?;

        let notes = stmt
            .query_map(params![user_id], Self::row_to_note)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(notes)
    }

    /// Replace the editable fields of a note. Returns false if it does not exist.
    pub fn update_note(
        &self,
        id: &NoteId,
        update: &UpdateNoteRequest,
        now: DateTime<Utc>,
    ) -> Result<bool> {
        let changed = self.conn.execute(
            "UPDATE notes SET title = ?1, content = ?2, method = ?3, cornell_data = ?4,
                              tags = ?5, updated_at = ?6
             WHERE id = ?7",
            params![
                update.title,
                update.content,
                update.method.as_str(),
                to_json_opt(update.cornell_data.as_ref())?,
                serde_json::to_string(&update.tags)?,
                to_db_time(&now),
                id.0,
            ],
        )?;

        Ok(changed > 0)
    }

    pub fn update_note_cornell(
        &self,
        id: &NoteId,
        cornell: &CornellData,
        now: DateTime<Utc>,
    ) -> Result<bool> {
        let changed = self.conn.execute(
            "UPDATE notes SET cornell_data = ?1, method = ?2, updated_at = ?3 WHERE id = ?4",
            params![
                serde_json::to_string(cornell)?,
                NoteMethod::Cornell.as_str(),
                to_db_time(&now),
                id.0,
            ],
        )?;

        Ok(changed > 0)
    }

    pub fn update_note_feynman(
        &self,
        id: &NoteId,
        result: &FeynmanResult,
        now: DateTime<Utc>,
    ) -> Result<bool> {
        let changed = self.conn.execute(
            "UPDATE notes SET feynman_result = ?1, updated_at = ?2 WHERE id = ?3",
            params![serde_json::to_string(result)?, to_db_time(&now), id.0],
        )?;

        Ok(changed > 0)
    }

    /// Persist the outcome of a completed review
    pub fn update_review_state(
        &self,
        id: &NoteId,
        state: &ReviewState,
        now: DateTime<Utc>,
    ) -> Result<bool> {
        let changed = self.conn.execute(
            "UPDATE notes SET review_count = ?1, next_review_at = ?2, updated_at = ?3 WHERE id = ?4",
            params![
                state.review_count,
                to_db_time(&state.next_review_at),
                to_db_time(&now),
                id.0,
            ],
        )?;

        debug!(
            "Note {} reviewed {} times, next review at {}",
            id, state.review_count, state.next_review_at
        );
        Ok(changed > 0)
    }

    pub fn delete_note(&self, id: &NoteId) -> Result<bool> {
        let changed = self
            .conn
            .execute("DELETE FROM notes WHERE id = ?1", params![id.0])?;
        Ok(changed > 0)
    }

    // ========== ESSAYS ==========

    fn row_to_essay(row: &Row) -> rusqlite::Result<Essay> {
        Ok(Essay {
            id: EssayId(row.get(0)?),
            user_id: row.get(1)?,
            title: row.get(2)?,
            content: row.get(3)?,
            subject: row.get(4)?,
            grade: row.get(5)?,
            created_at: get_time(row, 6)?,
        })
    }

    pub fn insert_essay(&self, essay: &Essay) -> Result<()> {
        self.conn.execute(
            "INSERT INTO essays (id, user_id, title, content, subject, grade, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                essay.id.0,
                essay.user_id,
                essay.title,
                essay.content,
                essay.subject,
                essay.grade,
                to_db_time(&essay.created_at),
            ],
        )?;

        debug!("Inserted essay: {}", essay.id);
        Ok(())
    }

    /// An essay together with its cached grading, if it has been graded
    pub fn get_essay_with_feedback(
        &self,
        id: &EssayId,
    ) -> Result<Option<(Essay, Option<EssayFeedback>)>> {
        let found = self
            .conn
            .query_row(
                &format!("SELECT {}, feedback FROM essays WHERE id = ?1", ESSAY_COLUMNS),
                params![id.0],
                |row| Ok((Self::row_to_essay(row)?, get_json_opt(row, 7)?)),
            )
            .optional()?;

        Ok(found)
    }

    pub fn get_essays_by_user(&self, user_id: &str) -> Result<Vec<Essay>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM essays WHERE user_id = ?1 ORDER BY created_at DESC",
            ESSAY_COLUMNS
        ))?;

        let essays = stmt
            .query_map(params![user_id], Self::row_to_essay)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(essays)
    }

    pub fn save_essay_feedback(&self, id: &EssayId, feedback: &EssayFeedback) -> Result<bool> {
        let changed = self.conn.execute(
            "UPDATE essays SET feedback = ?1 WHERE id = ?2",
            params![serde_json::to_string(feedback)?, id.0],
        )?;

        Ok(changed > 0)
    }

    // ========== ERROR QUESTIONS ==========

    fn row_to_error_question(row: &Row) -> rusqlite::Result<ErrorQuestion> {
        let difficulty_raw: String = row.get(7)?;
        let difficulty = Difficulty::parse(&difficulty_raw)
            .ok_or_else(|| label_error(7, "difficulty", &difficulty_raw))?;

        Ok(ErrorQuestion {
            id: ErrorQuestionId(row.get(0)?),
            user_id: row.get(1)?,
            question: row.get(2)?,
            user_answer: row.get(3)?,
            correct_answer: row.get(4)?,
            explanation: row.get(5)?,
            subject: row.get(6)?,
            difficulty,
            mastery_level: row.get(8)?,
            created_at: get_time(row, 9)?,
        })
    }

    pub fn insert_error_question(&self, question: &ErrorQuestion) -> Result<()> {
        self.conn.execute(
            "INSERT INTO error_questions (id, user_id, question, user_answer, correct_answer,
                                          explanation, subject, difficulty, mastery_level, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            params![
                question.id.0,
                question.user_id,
                question.question,
                question.user_answer,
                question.correct_answer,
                question.explanation,
                question.subject,
                question.difficulty.as_str(),
                question.mastery_level,
                to_db_time(&question.created_at),
            ],
        )?;

        debug!("Inserted error question: {}", question.id);
        Ok(())
    }

    /// A user's error questions, newest first, optionally capped at `limit`
    pub fn get_error_questions_by_user(
        &self,
        user_id: &str,
        limit: Option<usize>,
    ) -> Result<Vec<ErrorQuestion>> {
        let limit = limit.map(|l| l as i64).unwrap_or(-1);
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM error_questions
             WHERE user_id = ?1
             ORDER BY created_at DESC
             LIMIT ?2",
            ERROR_QUESTION_COLUMNS
        ))?;

        let questions = stmt
            .query_map(params![user_id, limit], Self::row_to_error_question)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(questions)
    }

    pub fn delete_error_question(&self, id: &ErrorQuestionId) -> Result<bool> {
        let changed = self
            .conn
            .execute("DELETE FROM error_questions WHERE id = ?1", params![id.0])?;
        Ok(changed > 0)
    }

    /// Average mastery per subject, weakest first
    pub fn get_weak_subjects(&self, user_id: &str) -> Result<Vec<WeakSubject>> {
        let mut stmt = self.conn.prepare(
            "SELECT CASE WHEN subject = '' THEN 'other' ELSE subject END AS label,
                    COUNT(*),
                    AVG(mastery_level)
             FROM error_questions
             WHERE user_id = ?1
             GROUP BY label
             ORDER BY AVG(mastery_level) ASC, label ASC",
        )?;

        let subjects = stmt
            .query_map(params![user_id], |row| {
                let count: i64 = row.get(1)?;
                let average: Option<f64> = row.get(2)?;
                Ok(WeakSubject {
                    subject: row.get(0)?,
                    average_mastery: round_to_hundredths(average.unwrap_or(0.0)),
                    error_count: count as usize,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(subjects)
    }

    // ========== QUOTES ==========

    fn row_to_quote(row: &Row) -> rusqlite::Result<Quote> {
        Ok(Quote {
            id: QuoteId(row.get(0)?),
            content: row.get(1)?,
            theme: row.get(2)?,
            language: row.get(3)?,
            author: row.get(4)?,
            category: row.get(5)?,
            user_id: row.get(6)?,
            created_at: get_time(row, 7)?,
        })
    }

    /// Insert a quote; `daily_date` marks it as the daily quote for that day
    pub fn insert_quote(&self, quote: &Quote, daily_date: Option<NaiveDate>) -> Result<()> {
        self.conn.execute(
            "INSERT INTO quotes (id, content, theme, language, author, category, user_id,
                                 is_daily, daily_date, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            params![
                quote.id.0,
                quote.content,
                quote.theme,
                quote.language,
                quote.author,
                quote.category,
                quote.user_id,
                daily_date.is_some(),
                daily_date.map(|d| d.format("%Y-%m-%d").to_string()),
                to_db_time(&quote.created_at),
            ],
        )?;

        debug!("Inserted quote: {}", quote.id);
        Ok(())
    }

    /// The latest daily quote generated for `user_id` on `date`
    pub fn get_daily_quote(&self, user_id: &str, date: NaiveDate) -> Result<Option<Quote>> {
        let quote = self
            .conn
            .query_row(
                &format!(
                    "SELECT {} FROM quotes
                     WHERE user_id = ?1 AND is_daily = 1 AND daily_date = ?2
                     ORDER BY created_at DESC
                     LIMIT 1",
                    QUOTE_COLUMNS
                ),
                params![user_id, date.format("%Y-%m-%d").to_string()],
                Self::row_to_quote,
            )
            .optional()?;

        Ok(quote)
    }

    pub fn get_quotes_by_user(&self, user_id: &str) -> Result<Vec<Quote>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM quotes WHERE user_id = ?1 ORDER BY created_at DESC",
            QUOTE_COLUMNS
        ))?;

        let quotes = stmt
            .query_map(params![user_id], Self::row_to_quote)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(quotes)
    }

    pub fn get_quote_categories(&self, user_id: &str) -> Result<Vec<String>> {
        let mut stmt = self.conn.prepare(
            "SELECT DISTINCT category FROM quotes
             WHERE user_id = ?1 AND category != ''
             ORDER BY category ASC",
        )?;

        let categories = stmt
            .query_map(params![user_id], |row| row.get(0))?
            .collect::<Result<Vec<String>, _>>()?;

        Ok(categories)
    }

    pub fn get_random_quote(&self, user_id: &str) -> Result<Option<Quote>> {
        let quote = self
            .conn
            .query_row(
                &format!(
                    "SELECT {} FROM quotes WHERE user_id = ?1 ORDER BY RANDOM() LIMIT 1",
                    QUOTE_COLUMNS
                ),
                params![user_id],
                Self::row_to_quote,
            )
            .optional()?;

        Ok(quote)
    }

    pub fn delete_quote(&self, id: &QuoteId) -> Result<bool> {
        let changed = self
            .conn
            .execute("DELETE FROM quotes WHERE id = ?1", params![id.0])?;
        Ok(changed > 0)
    }

    // ========== RELAXATION SESSIONS ==========

    pub fn insert_session(&self, session: &RelaxationSession) -> Result<()> {
        self.conn.execute(
            "INSERT INTO relaxation_sessions (id, user_id, messages, mood, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                session.id.0,
                session.user_id,
                serde_json::to_string(&session.messages)?,
                session.mood.map(|m| m.as_str()),
                to_db_time(&session.created_at),
            ],
        )?;

        debug!("Inserted relaxation session: {}", session.id);
        Ok(())
    }

    pub fn get_session(&self, id: &SessionId) -> Result<Option<RelaxationSession>> {
        let session = self
            .conn
            .query_row(
                "SELECT id, user_id, messages, mood, created_at
                 FROM relaxation_sessions WHERE id = ?1",
                params![id.0],
                |row| {
                    let mood = match row.get::<_, Option<String>>(3)? {
                        Some(raw) => {
                            Some(Mood::parse(&raw).ok_or_else(|| label_error(3, "mood", &raw))?)
                        }
                        None => None,
                    };

                    Ok(RelaxationSession {
                        id: SessionId(row.get(0)?),
                        user_id: row.get(1)?,
                        messages: get_json(row, 2)?,
                        mood,
                        created_at: get_time(row, 4)?,
                    })
                },
            )
            .optional()?;

        Ok(session)
    }

    /// Append `entries` to the stored conversation.
    ///
    /// Returns the new message count, or `None` if the session does not exist.
    pub fn append_session_messages(
        &self,
        id: &SessionId,
        entries: &[ChatEntry],
    ) -> Result<Option<usize>> {
        let tx = self.conn.unchecked_transaction()?;

        let stored = tx
            .query_row(
                "SELECT messages FROM relaxation_sessions WHERE id = ?1",
                params![id.0],
                |row| get_json::<Vec<ChatEntry>>(row, 0),
            )
            .optional()?;
        let Some(mut messages) = stored else {
            return Ok(None);
        };

        messages.extend_from_slice(entries);
        tx.execute(
            "UPDATE relaxation_sessions SET messages = ?1 WHERE id = ?2",
            params![serde_json::to_string(&messages)?, id.0],
        )?;
        tx.commit()?;

        Ok(Some(messages.len()))
    }

    pub fn update_session_mood(&self, id: &SessionId, mood: Mood) -> Result<bool> {
        let changed = self.conn.execute(
            "UPDATE relaxation_sessions SET mood = ?1 WHERE id = ?2",
            params![mood.as_str(), id.0],
        )?;

        Ok(changed > 0)
    }
}

/// Timestamps are stored as fixed-width RFC 3339 so they order lexically.
fn to_db_time(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn get_time(row: &Row, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let raw: String = row.get(idx)?;
    DateTime::parse_from_rfc3339(&raw)
        .map(|ts| ts.with_timezone(&Utc))
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn get_time_opt(row: &Row, idx: usize) -> rusqlite::Result<Option<DateTime<Utc>>> {
    match row.get::<_, Option<String>>(idx)? {
        Some(_) => get_time(row, idx).map(Some),
        None => Ok(None),
    }
}

fn get_json<T: DeserializeOwned>(row: &Row, idx: usize) -> rusqlite::Result<T> {
    let raw: String = row.get(idx)?;
    serde_json::from_str(&raw).map_err(|e| json_error(idx, e))
}

fn get_json_opt<T: DeserializeOwned>(row: &Row, idx: usize) -> rusqlite::Result<Option<T>> {
    match row.get::<_, Option<String>>(idx)? {
        Some(raw) => serde_json::from_str(&raw).map(Some).map_err(|e| json_error(idx, e)),
        None => Ok(None),
    }
}

fn to_json_opt<T: Serialize>(value: Option<&T>) -> Result<Option<String>> {
    Ok(value.map(serde_json::to_string).transpose()?)
}

fn json_error(idx: usize, err: serde_json::Error) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(err))
}

fn label_error(idx: usize, what: &str, raw: &str) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(
        idx,
        Type::Text,
        format!("unknown {} {:?}", what, raw).into(),
    )
}

fn round_to_hundredths(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
