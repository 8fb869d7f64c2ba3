use axum::{
    extract::{Path, State},
    Json,
};
use std::collections::BTreeMap;
use study_desk_schemas::{
    generate_error_question_id, Ack, AddErrorQuestionRequest, ErrorAnalysis, ErrorQuestion,
    ErrorQuestionId, GeneratePracticeRequest, Message, PracticeQuestion, WeakSubject,
};
use tracing::{debug, info};

use super::{require, truncate_chars};
use crate::app::AppState;
use crate::error::ApiError;
use crate::llm::{complete_json, DEFAULT_TEMPERATURE};

const DEFAULT_PRACTICE_COUNT: u32 = 3;
const MAX_PRACTICE_COUNT: u32 = 10;

/// Recent errors loaded as source material for practice questions.
const PRACTICE_SOURCE_LIMIT: usize = 10;
/// Of those, how many are summarized in the prompt.
const PRACTICE_PROMPT_ERRORS: usize = 5;
const QUESTION_EXCERPT_CHARS: usize = 50;

const WEAKEST_SUBJECT_COUNT: usize = 3;
const UNLABELLED_SUBJECT: &str = "other";

const PRACTICE_SYSTEM_PROMPT: &str = "You write practice questions from a student's past mistakes. \
     Return a JSON array: [{\"question\":\"...\",\"correctAnswer\":\"...\",\"explanation\":\"...\",\
     \"hints\":[\"...\"],\"subject\":\"...\",\"difficulty\":\"easy|medium|hard\"}]";

pub async fn add_error_question(
    State(state): State<AppState>,
    Json(request): Json<AddErrorQuestionRequest>,
) -> Result<Json<ErrorQuestion>, ApiError> {
    require("question", &request.question)?;

    let question = ErrorQuestion {
        id: generate_error_question_id(),
        user_id: request.user_id,
        question: request.question,
        user_answer: request.user_answer,
        correct_answer: request.correct_answer,
        explanation: request.explanation,
        subject: request.subject,
        difficulty: request.difficulty,
        mastery_level: 0,
        created_at: state.scheduler.now(),
    };

    state.db.lock().await.insert_error_question(&question)?;

    info!("Recorded error question {} for user {}", question.id, question.user_id);
    Ok(Json(question))
}

pub async fn delete_error_question(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Ack>, ApiError> {
    let id = ErrorQuestionId(id);
    if !state.db.lock().await.delete_error_question(&id)? {
        debug!("Delete of unknown error question {} ignored", id);
    }
    Ok(Json(Ack::ok()))
}

pub async fn list_error_questions(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Result<Json<Vec<ErrorQuestion>>, ApiError> {
    let questions = state
        .db
        .lock()
        .await
        .get_error_questions_by_user(&user_id, None)?;
    Ok(Json(questions))
}

pub async fn analysis(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Result<Json<ErrorAnalysis>, ApiError> {
    let questions = state
        .db
        .lock()
        .await
        .get_error_questions_by_user(&user_id, None)?;
    Ok(Json(error_analysis(&questions)))
}

pub async fn weak_subjects(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Result<Json<Vec<WeakSubject>>, ApiError> {
    let subjects = state.db.lock().await.get_weak_subjects(&user_id)?;
    Ok(Json(subjects))
}

/// Generate practice questions modelled on the user's recent mistakes.
pub async fn generate_practice(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    request: Option<Json<GeneratePracticeRequest>>,
) -> Result<Json<Vec<PracticeQuestion>>, ApiError> {
    let count = request
        .and_then(|Json(r)| r.count)
        .unwrap_or(DEFAULT_PRACTICE_COUNT)
        .clamp(1, MAX_PRACTICE_COUNT);

    let errors = state
        .db
        .lock()
        .await
        .get_error_questions_by_user(&user_id, Some(PRACTICE_SOURCE_LIMIT))?;

    if errors.is_empty() {
        debug!("No error questions for user {}, skipping generation", user_id);
        return Ok(Json(Vec::new()));
    }

    let summary = errors
        .iter()
        .take(PRACTICE_PROMPT_ERRORS)
        .map(|e| {
            format!(
                "- Subject: {}, question: {}",
                e.subject,
                truncate_chars(&e.question, QUESTION_EXCERPT_CHARS)
            )
        })
        .collect::<Vec<_>>()
        .join("\n");

    let messages = vec![
        Message::system(PRACTICE_SYSTEM_PROMPT),
        Message::user(format!(
            "Write {} practice questions based on these mistakes:\n{}",
            count, summary
        )),
    ];
    let mut questions: Vec<PracticeQuestion> =
        complete_json(state.llm.as_ref(), messages, DEFAULT_TEMPERATURE).await?;

    for (question, source) in questions.iter_mut().zip(&errors) {
        question.based_on_error_id = Some(source.id.clone());
    }

    info!(
        "Generated {} practice questions for user {}",
        questions.len(),
        user_id
    );
    Ok(Json(questions))
}

/// Counts per subject and difficulty, plus the subjects with the most errors.
pub fn error_analysis(questions: &[ErrorQuestion]) -> ErrorAnalysis {
    let mut subject_breakdown: BTreeMap<String, usize> = BTreeMap::new();
    let mut difficulty_breakdown: BTreeMap<String, usize> = BTreeMap::new();

    for question in questions {
        let subject = if question.subject.is_empty() {
            UNLABELLED_SUBJECT
        } else {
            question.subject.as_str()
        };
        *subject_breakdown.entry(subject.to_string()).or_default() += 1;
        *difficulty_breakdown
            .entry(question.difficulty.as_str().to_string())
            .or_default() += 1;
    }

    // BTreeMap iteration is by name, so the stable sort breaks count ties alphabetically
    let mut ranked: Vec<(&String, &usize)> = subject_breakdown.iter().collect();
    ranked.sort_by(|a, b| b.1.cmp(a.1));

    let weakest_subjects = ranked
        .into_iter()
        .take(WEAKEST_SUBJECT_COUNT)
        .map(|(subject, _)| subject.clone())
        .collect();

    ErrorAnalysis {
        total_errors: questions.len(),
        subject_breakdown,
        difficulty_breakdown,
        weakest_subjects,
    }
}
