use anyhow::Result;
use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension, Row};
use study_desk_schemas::{ProblemId, ProblemRecord, StepAttempt};
use tracing::debug;

use super::{get_json, get_time, to_db_time, Database};

const PROBLEM_COLUMNS: &str = "id, user_id, question, subject, analysis, current_step,
                               user_progress, hints_used, completed, created_at";

impl Database {
    pub(super) fn init_problem_schema(&self) -> Result<()> {
        self.conn.execute(
            "CREATE TABLE IF NOT EXISTS problem_sessions (
                id TEXT PRIMARY KEY,
                user_id TEXT NOT NULL,
                question TEXT NOT NULL,
                subject TEXT NOT NULL DEFAULT '',
                analysis TEXT NOT NULL,
                current_step INTEGER NOT NULL DEFAULT 0,
                user_progress TEXT NOT NULL DEFAULT '[]',
                hints_used INTEGER NOT NULL DEFAULT 0,
                completed INTEGER NOT NULL DEFAULT 0,
                created_at TEXT NOT NULL
            )",
            [],
        )?;

        Ok(())
    }

    fn row_to_problem(row: &Row) -> rusqlite::Result<ProblemRecord> {
        Ok(ProblemRecord {
            id: ProblemId(row.get(0)?),
            user_id: row.get(1)?,
            question: row.get(2)?,
            subject: row.get(3)?,
            analysis: get_json(row, 4)?,
            current_step: row.get(5)?,
            user_progress: get_json(row, 6)?,
            hints_used: row.get(7)?,
            completed: row.get(8)?,
            created_at: get_time(row, 9)?,
        })
    }

    pub fn insert_problem(&self, problem: &ProblemRecord) -> Result<()> {
        self.conn.execute(
            "INSERT INTO problem_sessions (id, user_id, question, subject, analysis, current_step,
                                           user_progress, hints_used, completed, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            params![
                problem.id.0,
                problem.user_id,
                problem.question,
                problem.subject,
                serde_json::to_string(&problem.analysis)?,
                problem.current_step,
                serde_json::to_string(&problem.user_progress)?,
                problem.hints_used,
                problem.completed,
                to_db_time(&problem.created_at),
            ],
        )?;

        debug!("Inserted problem session: {}", problem.id);
        Ok(())
    }

    pub fn get_problem(&self, id: &ProblemId) -> Result<Option<ProblemRecord>> {
        let problem = self
            .conn
            .query_row(
                &format!("SELECT {} FROM problem_sessions WHERE id = ?1", PROBLEM_COLUMNS),
                params![id.0],
                Self::row_to_problem,
            )
            .optional()?;

        Ok(problem)
    }

    /// The user's most recent unfinished session
    pub fn get_active_problem(&self, user_id: &str) -> Result<Option<ProblemRecord>> {
        let problem = self
            .conn
            .query_row(
                &format!(
                    "SELECT {} FROM problem_sessions
                     WHERE user_id = ?1 AND completed = 0
                     ORDER BY created_at DESC
                     LIMIT 1",
                    PROBLEM_COLUMNS
                ),
                params![user_id],
                Self::row_to_problem,
            )
            .optional()?;

        Ok(problem)
    }

    pub fn get_problems_by_user(&self, user_id: &str) -> Result<Vec<ProblemRecord>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM problem_sessions WHERE user_id = ?1 ORDER BY created_at DESC",
            PROBLEM_COLUMNS
        ))?;

        let problems = stmt
            .query_map(params![user_id], Self::row_to_problem)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(problems)
    }

    /// Record the learner's next step, numbered after the latest stored one.
    ///
    /// Returns the stored attempt, or `None` if the session does not exist.
    pub fn record_problem_step(
        &self,
        id: &ProblemId,
        user_input: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<StepAttempt>> {
        let tx = self.conn.unchecked_transaction()?;

        let Some(mut problem) = tx
            .query_row(
                &format!("SELECT {} FROM problem_sessions WHERE id = ?1", PROBLEM_COLUMNS),
                params![id.0],
                Self::row_to_problem,
            )
            .optional()?
        else {
            return Ok(None);
        };

        let attempt = StepAttempt {
            step_number: problem.current_step + 1,
            user_input: user_input.to_string(),
            timestamp: now,
            needs_hint: false,
        };
        problem.user_progress.push(attempt.clone());

        tx.execute(
            "UPDATE problem_sessions SET current_step = ?1, user_progress = ?2 WHERE id = ?3",
            params![
                attempt.step_number,
                serde_json::to_string(&problem.user_progress)?,
                id.0
            ],
        )?;
        tx.commit()?;

        Ok(Some(attempt))
    }

    pub fn record_problem_hint(&self, id: &ProblemId) -> Result<bool> {
        let changed = self.conn.execute(
            "UPDATE problem_sessions SET hints_used = hints_used + 1 WHERE id = ?1",
            params![id.0],
        )?;

        Ok(changed > 0)
    }

    pub fn complete_problem(&self, id: &ProblemId) -> Result<bool> {
        let changed = self.conn.execute(
            "UPDATE problem_sessions SET completed = 1 WHERE id = ?1",
            params![id.0],
        )?;

        Ok(changed > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use study_desk_schemas::{generate_problem_id, ProblemAnalysis};
    use tempfile::NamedTempFile;

    fn base_time() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 5, 10, 8, 0, 0).unwrap()
    }

    fn problem(user_id: &str, minutes: i64) -> ProblemRecord {
        ProblemRecord {
            id: generate_problem_id(),
            user_id: user_id.to_string(),
            question: "Solve x^2 - 5x + 6 = 0".to_string(),
            subject: "math".to_string(),
            analysis: ProblemAnalysis {
                problem_type: "quadratic".to_string(),
                difficulty: "easy".to_string(),
                required_concepts: vec!["factoring".to_string()],
                estimated_time: Some(10.0),
                solution_approach: vec![],
            },
            current_step: 0,
            user_progress: vec![],
            hints_used: 0,
            completed: false,
            created_at: base_time() + Duration::minutes(minutes),
        }
    }

    #[test]
    fn test_steps_are_numbered_from_stored_state() {
        let temp = NamedTempFile::new().unwrap();
        let db = Database::new(temp.path()).unwrap();

        let quadratic = problem("u1", 0);
        db.insert_problem(&quadratic).unwrap();
        assert_eq!(db.get_problem(&quadratic.id).unwrap(), Some(quadratic.clone()));

        let first = db
            .record_problem_step(&quadratic.id, "factor it", base_time())
            .unwrap()
            .unwrap();
        let second = db
            .record_problem_step(&quadratic.id, "(x-2)(x-3)", base_time())
            .unwrap()
            .unwrap();
        assert_eq!((first.step_number, second.step_number), (1, 2));

        assert!(db.record_problem_hint(&quadratic.id).unwrap());
        let stored = db.get_problem(&quadratic.id).unwrap().unwrap();
        assert_eq!(stored.current_step, 2);
        assert_eq!(stored.user_progress.len(), 2);
        assert_eq!(stored.hints_used, 1);

        let missing = ProblemId("prob_missing".to_string());
        assert!(db.record_problem_step(&missing, "x", base_time()).unwrap().is_none());
    }

    #[test]
    fn test_active_problem_skips_completed() {
        let temp = NamedTempFile::new().unwrap();
        let db = Database::new(temp.path()).unwrap();

        let older = problem("u1", 0);
        let newer = problem("u1", 10);
        db.insert_problem(&older).unwrap();
        db.insert_problem(&newer).unwrap();

        assert_eq!(db.get_active_problem("u1").unwrap().unwrap().id, newer.id);
        assert!(db.complete_problem(&newer.id).unwrap());
        assert_eq!(db.get_active_problem("u1").unwrap().unwrap().id, older.id);
        assert_eq!(db.get_problems_by_user("u1").unwrap().len(), 2);
        assert!(db.get_active_problem("u2").unwrap().is_none());
    }
}
