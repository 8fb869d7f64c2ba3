use axum::{
    extract::{Path, State},
    Json,
};
use study_desk_engine::due_for_review;
use study_desk_schemas::{
    generate_note_id, Ack, CornellData, CreateNoteRequest, FeynmanResult, Message, Note, NoteId,
    UpdateNoteRequest,
};
use tracing::{debug, info};

use super::truncate_chars;
use crate::app::AppState;
use crate::error::ApiError;
use crate::llm::{complete_json, DEFAULT_TEMPERATURE};

/// Note bodies longer than this are cut before being sent to the model.
const MAX_PROMPT_CHARS: usize = 3000;

const CORNELL_SYSTEM_PROMPT: &str = "You are an expert in the Cornell note-taking method. \
     From the user's note, build a Cornell layout. Return JSON: \
     {\"cues\":[\"keyword\"],\"summary\":\"short summary\",\"questions\":[\"self-test question\"]}";

const FEYNMAN_SYSTEM_PROMPT: &str = "You are an expert in the Feynman technique. \
     Judge how well the user understands the topic and find weak spots. Return JSON: \
     {\"score\":85,\"level\":\"good\",\"strengths\":[\"...\"],\"weaknesses\":[\"...\"],\
     \"suggestions\":[\"...\"],\"simplifiedExplanation\":\"the idea in plain words\"}";

pub async fn create_note(
    State(state): State<AppState>,
    Json(request): Json<CreateNoteRequest>,
) -> Result<Json<Note>, ApiError> {
    let now = state.scheduler.now();
    let review = state.scheduler.initial_state(now);

    let note = Note {
        id: generate_note_id(),
        user_id: request.user_id,
        title: request.title,
        content: request.content,
        method: request.method,
        cornell_data: request.cornell_data,
        feynman_result: None,
        tags: request.tags,
        next_review_at: review.next_review_at,
        review_count: review.review_count,
        created_at: now,
        updated_at: now,
    };

    state.db.lock().await.insert_note(&note)?;

    info!("Created note {} for user {}", note.id, note.user_id);
    Ok(Json(note))
}

pub async fn list_notes(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Result<Json<Vec<Note>>, ApiError> {
    let notes = state.db.lock().await.get_notes_by_user(&user_id)?;
    Ok(Json(notes))
}

pub async fn get_note(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Note>, ApiError> {
    let note = load_note(&state, &NoteId(id)).await?;
    Ok(Json(note))
}

pub async fn update_note(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(request): Json<UpdateNoteRequest>,
) -> Result<Json<Note>, ApiError> {
    let note_id = NoteId(id);
    let now = state.scheduler.now();

    let db = state.db.lock().await;
    if !db.update_note(&note_id, &request, now)? {
        return Err(ApiError::NotFound("Note"));
    }

    let note = db.get_note(&note_id)?.ok_or(ApiError::NotFound("Note"))?;
    Ok(Json(note))
}

pub async fn delete_note(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Ack>, ApiError> {
    let note_id = NoteId(id);
    if !state.db.lock().await.delete_note(&note_id)? {
        debug!("Delete of unknown note {} ignored", note_id);
    }
    Ok(Json(Ack::ok()))
}

pub async fn generate_cornell(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<CornellData>, ApiError> {
    let note = load_note(&state, &NoteId(id)).await?;

    let messages = vec![
        Message::system(CORNELL_SYSTEM_PROMPT),
        Message::user(format!(
            "Build a Cornell layout for this note.\n\nTitle: {}\n\nContent:\n{}",
            note.title,
            truncate_chars(&note.content, MAX_PROMPT_CHARS)
        )),
    ];
    let cornell: CornellData =
        complete_json(state.llm.as_ref(), messages, DEFAULT_TEMPERATURE).await?;

    let now = state.scheduler.now();
    if !state
        .db
        .lock()
        .await
        .update_note_cornell(&note.id, &cornell, now)?
    {
        return Err(ApiError::NotFound("Note"));
    }

    info!("Generated Cornell layout for note {}", note.id);
    Ok(Json(cornell))
}

pub async fn evaluate_feynman(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<FeynmanResult>, ApiError> {
    let note = load_note(&state, &NoteId(id)).await?;

    let messages = vec![
        Message::system(FEYNMAN_SYSTEM_PROMPT),
        Message::user(format!(
            "Evaluate how well this note explains its topic.\n\nTitle: {}\n\nContent:\n{}",
            note.title,
            truncate_chars(&note.content, MAX_PROMPT_CHARS)
        )),
    ];
    let result: FeynmanResult =
        complete_json(state.llm.as_ref(), messages, DEFAULT_TEMPERATURE).await?;

    let now = state.scheduler.now();
    if !state
        .db
        .lock()
        .await
        .update_note_feynman(&note.id, &result, now)?
    {
        return Err(ApiError::NotFound("Note"));
    }

    info!("Feynman check for note {} scored {}", note.id, result.score);
    Ok(Json(result))
}

/// Notes whose review is due now, earliest first.
pub async fn review_queue(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Result<Json<Vec<Note>>, ApiError> {
    let notes = state.db.lock().await.get_notes_by_user(&user_id)?;
    let now = state.scheduler.now();

    let due: Vec<Note> = due_for_review(&notes, now).into_iter().cloned().collect();

    debug!("{} of {} notes due for user {}", due.len(), notes.len(), user_id);
    Ok(Json(due))
}

pub async fn review_done(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Note>, ApiError> {
    let note_id = NoteId(id);

    let db = state.db.lock().await;
    let note = db.get_note(&note_id)?.ok_or(ApiError::NotFound("Note"))?;

    let review = state.scheduler.mark_reviewed(note.review_count)?;
    db.update_review_state(&note_id, &review, state.scheduler.now())?;

    let note = db.get_note(&note_id)?.ok_or(ApiError::NotFound("Note"))?;

    info!(
        "Note {} reviewed ({} total), next review at {}",
        note.id, note.review_count, note.next_review_at
    );
    Ok(Json(note))
}

async fn load_note(state: &AppState, id: &NoteId) -> Result<Note, ApiError> {
    state
        .db
        .lock()
        .await
        .get_note(id)?
        .ok_or(ApiError::NotFound("Note"))
}
