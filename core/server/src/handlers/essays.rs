use axum::{
    extract::{Path, State},
    Json,
};
use study_desk_schemas::{
    generate_essay_id, Essay, EssayFeedback, EssayId, Message, SubmitEssayRequest,
};
use tracing::{debug, info};

use super::{require, truncate_chars};
use crate::app::AppState;
use crate::error::ApiError;
use crate::llm::{complete_json, DEFAULT_TEMPERATURE};

const MAX_PROMPT_CHARS: usize = 3000;

const GRADING_SYSTEM_PROMPT: &str = "You are an experienced essay grader. Return JSON: \
     {\"analysis\":{\"structureScore\":80,\"languageScore\":85,\"contentScore\":75,\"overallScore\":80,\
     \"structureAnalysis\":\"...\",\"languageAnalysis\":\"...\",\"contentAnalysis\":\"...\"},\
     \"improvementPoints\":[{\"category\":\"...\",\"issue\":\"...\",\"suggestion\":\"...\",\"priority\":\"high|medium|low\"}],\
     \"optimizedExamples\":[{\"originalText\":\"...\",\"optimizedText\":\"...\",\"explanation\":\"...\",\"improvementType\":\"...\"}],\
     \"strengths\":[\"...\"],\"areasForImprovement\":[\"...\"],\"overallComment\":\"...\"}";

pub async fn submit_essay(
    State(state): State<AppState>,
    Json(request): Json<SubmitEssayRequest>,
) -> Result<Json<Essay>, ApiError> {
    require("content", &request.content)?;

    let essay = Essay {
        id: generate_essay_id(),
        user_id: request.user_id,
        title: request.title,
        content: request.content,
        subject: request.subject,
        grade: request.grade,
        created_at: state.scheduler.now(),
    };

    state.db.lock().await.insert_essay(&essay)?;

    info!("Submitted essay {} for user {}", essay.id, essay.user_id);
    Ok(Json(essay))
}

pub async fn list_essays(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Result<Json<Vec<Essay>>, ApiError> {
    let essays = state.db.lock().await.get_essays_by_user(&user_id)?;
    Ok(Json(essays))
}

/// Grade an essay once; later calls return the stored feedback.
pub async fn essay_feedback(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<EssayFeedback>, ApiError> {
    let essay_id = EssayId(id);

    let (essay, cached) = state
        .db
        .lock()
        .await
        .get_essay_with_feedback(&essay_id)?
        .ok_or(ApiError::NotFound("Essay"))?;

    if let Some(feedback) = cached {
        debug!("Returning cached feedback for essay {}", essay_id);
        return Ok(Json(feedback));
    }

    let subject = match essay.subject.as_str() {
        "" => "Language arts",
        subject => subject,
    };
    let grade = match essay.grade.as_str() {
        "" => "High school",
        grade => grade,
    };

    let messages = vec![
        Message::system(GRADING_SYSTEM_PROMPT),
        Message::user(format!(
            "Grade this essay.\n\nTitle: {}\nSubject: {}\nGrade: {}\n\nContent:\n{}",
            essay.title,
            subject,
            grade,
            truncate_chars(&essay.content, MAX_PROMPT_CHARS)
        )),
    ];
    let feedback: EssayFeedback =
        complete_json(state.llm.as_ref(), messages, DEFAULT_TEMPERATURE).await?;

    state
        .db
        .lock()
        .await
        .save_essay_feedback(&essay_id, &feedback)?;

    info!(
        "Graded essay {} (overall {})",
        essay_id, feedback.analysis.overall_score
    );
    Ok(Json(feedback))
}
