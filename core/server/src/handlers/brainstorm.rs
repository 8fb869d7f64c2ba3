use axum::{
    extract::{Path, Query, State},
    Json,
};
use study_desk_schemas::{
    generate_brainstorm_id, Ack, BrainstormId, BrainstormSession, BrainstormStatus,
    CreateBrainstormRequest, DeepDiveRequest, Message, PanelMessage, Perspective, UserFilter,
};
use tracing::{debug, info};

use super::require;
use crate::app::AppState;
use crate::error::ApiError;
use crate::llm::DEFAULT_TEMPERATURE;

const PANELIST_SYSTEM_PROMPT: &str = "You are taking part in a brainstorming panel.";

const SYNTHESIS_SYSTEM_PROMPT: &str =
    "You summarise discussions, weighing every viewpoint to reach a conclusion.";

pub async fn create_session(
    State(state): State<AppState>,
    Json(request): Json<CreateBrainstormRequest>,
) -> Result<Json<BrainstormSession>, ApiError> {
    require("topic", &request.topic)?;

    let session = BrainstormSession {
        id: generate_brainstorm_id(),
        user_id: request.user_id,
        topic: request.topic,
        messages: Vec::new(),
        synthesis: None,
        status: BrainstormStatus::Active,
        created_at: state.scheduler.now(),
    };

    state.db.lock().await.insert_brainstorm(&session)?;

    info!("Opened brainstorm {} on {:?}", session.id, session.topic);
    Ok(Json(session))
}

pub async fn get_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<BrainstormSession>, ApiError> {
    let session = load_session(&state, &BrainstormId(id)).await?;
    Ok(Json(session))
}

pub async fn list_sessions(
    State(state): State<AppState>,
    Query(filter): Query<UserFilter>,
) -> Result<Json<Vec<BrainstormSession>>, ApiError> {
    let sessions = state
        .db
        .lock()
        .await
        .get_brainstorms_by_user(&filter.user_id)?;
    Ok(Json(sessions))
}

/// Let each panelist open on the topic, one after another.
pub async fn start_discussion(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<BrainstormSession>, ApiError> {
    let session_id = BrainstormId(id);
    let session = load_session(&state, &session_id).await?;

    let mut turns = Vec::with_capacity(Perspective::PANEL.len());
    for role in Perspective::PANEL {
        let messages = vec![
            Message::system(PANELIST_SYSTEM_PROMPT),
            Message::user(opening_prompt(role, &session.topic)),
        ];
        turns.push(panel_turn(&state, role, &messages).await?);
    }

    let session = append_turns(&state, &session_id, &turns).await?;
    info!("Panel opened brainstorm {}", session_id);
    Ok(Json(session))
}

/// Have every panelist dig into one point raised so far.
pub async fn deep_dive(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(request): Json<DeepDiveRequest>,
) -> Result<Json<BrainstormSession>, ApiError> {
    require("focusPoint", &request.focus_point)?;
    let session_id = BrainstormId(id);
    let session = load_session(&state, &session_id).await?;

    let mut turns = Vec::with_capacity(Perspective::PANEL.len());
    for role in Perspective::PANEL {
        let messages = vec![
            Message::system(format!(
                "You are the {} on a brainstorming panel, digging into one point.",
                role.as_str()
            )),
            Message::user(format!(
                "Topic: {}\nFocus: {}\nAnalyse the focus in depth from your perspective.",
                session.topic, request.focus_point
            )),
        ];
        turns.push(panel_turn(&state, role, &messages).await?);
    }

    let session = append_turns(&state, &session_id, &turns).await?;
    debug!(
        "Deep dive on {:?} in brainstorm {}",
        request.focus_point, session_id
    );
    Ok(Json(session))
}

/// Close the discussion with a synthesis of everything said.
pub async fn synthesize(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<BrainstormSession>, ApiError> {
    let session_id = BrainstormId(id);
    let session = load_session(&state, &session_id).await?;

    let messages = vec![
        Message::system(SYNTHESIS_SYSTEM_PROMPT),
        Message::user(format!(
            "Topic: {}\n\nDiscussion:\n{}\n\nSynthesise the viewpoints above into a \
             conclusion with recommendations.",
            session.topic,
            transcript(&session.messages)
        )),
    ];
    let synthesis = state
        .llm
        .complete(&messages, DEFAULT_TEMPERATURE)
        .await
        .map_err(ApiError::Upstream)?;

    let db = state.db.lock().await;
    if !db.complete_brainstorm(&session_id, &synthesis)? {
        return Err(ApiError::NotFound("Session"));
    }
    let session = db
        .get_brainstorm(&session_id)?
        .ok_or(ApiError::NotFound("Session"))?;

    info!("Synthesised brainstorm {}", session_id);
    Ok(Json(session))
}

pub async fn delete_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Ack>, ApiError> {
    let session_id = BrainstormId(id);
    if state.db.lock().await.delete_brainstorm(&session_id)? {
        info!("Deleted brainstorm {}", session_id);
    }
    Ok(Json(Ack::ok()))
}

async fn panel_turn(
    state: &AppState,
    role: Perspective,
    messages: &[Message],
) -> Result<PanelMessage, ApiError> {
    let content = state
        .llm
        .complete(messages, DEFAULT_TEMPERATURE)
        .await
        .map_err(ApiError::Upstream)?;

    Ok(PanelMessage {
        role,
        content,
        timestamp: state.scheduler.now(),
    })
}

async fn append_turns(
    state: &AppState,
    id: &BrainstormId,
    turns: &[PanelMessage],
) -> Result<BrainstormSession, ApiError> {
    state
        .db
        .lock()
        .await
        .append_brainstorm_messages(id, turns)?
        .ok_or(ApiError::NotFound("Session"))
}

fn opening_prompt(role: Perspective, topic: &str) -> String {
    let stance = match role {
        Perspective::Optimist => "as an optimist, pointing out opportunities and strengths",
        Perspective::Pessimist => "as a pessimist, pointing out risks and challenges",
        Perspective::Realist => "as a realist, weighing facts and evidence objectively",
        Perspective::Creative => "as a creative thinker, proposing unusual ideas and approaches",
    };
    format!(
        "Analyse the topic \"{}\" {}. Use two or three paragraphs.",
        topic, stance
    )
}

fn transcript(messages: &[PanelMessage]) -> String {
    messages
        .iter()
        .map(|message| format!("[{}]: {}", message.role.as_str(), message.content))
        .collect::<Vec<_>>()
        .join("\n")
}

async fn load_session(state: &AppState, id: &BrainstormId) -> Result<BrainstormSession, ApiError> {
    state
        .db
        .lock()
        .await
        .get_brainstorm(id)?
        .ok_or(ApiError::NotFound("Session"))
}
