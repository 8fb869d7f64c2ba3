use axum::{
    extract::{Path, State},
    Json,
};
use study_desk_schemas::{
    generate_session_id, AssistantMessage, ChatEntry, CreateSessionRequest, Message, MessageRole,
    Mood, MoodReading, RelaxationSession, RelaxationSuggestions, SendMessageRequest,
    SendMessageResponse, Sentiment, SessionCreated, SessionId,
};
use tracing::{debug, info, warn};

use super::require;
use crate::app::AppState;
use crate::error::ApiError;
use crate::llm::{complete_json, DEFAULT_TEMPERATURE};

const MIN_STRESS_LEVEL: i64 = 1;
const MAX_STRESS_LEVEL: i64 = 10;
const DEFAULT_STRESS_LEVEL: u8 = 5;

const COMPANION_SYSTEM_PROMPT: &str = "You are a warm, understanding companion. Chat in a \
     relaxed, friendly tone and help the user unwind. If you sense stress or anxiety, offer \
     gentle suggestions.";

const MOOD_SYSTEM_PROMPT: &str = "Analyse the user's mood. Return JSON: \
     {\"mood\":\"relaxed|neutral|stressed|anxious\",\"stressLevel\":5} where stressLevel is 1-10.";

const SUGGESTIONS_SYSTEM_PROMPT: &str =
    "You suggest ways to relax. Return JSON: {\"suggestions\":[\"...\",\"...\",\"...\"]}";

pub async fn create_session(
    State(state): State<AppState>,
    Json(request): Json<CreateSessionRequest>,
) -> Result<Json<SessionCreated>, ApiError> {
    let session = RelaxationSession {
        id: generate_session_id(),
        user_id: request.user_id,
        messages: Vec::new(),
        mood: None,
        created_at: state.scheduler.now(),
    };

    state.db.lock().await.insert_session(&session)?;

    info!("Opened relaxation session {} for user {}", session.id, session.user_id);
    Ok(Json(SessionCreated { id: session.id }))
}

/// Append a user message, reply to it, and read the user's mood from it.
///
/// The exchange is stored before the mood is read, so a failed mood read
/// never loses the conversation.
pub async fn send_message(
    State(state): State<AppState>,
    Json(request): Json<SendMessageRequest>,
) -> Result<Json<SendMessageResponse>, ApiError> {
    require("content", &request.content)?;
    let session_id = SessionId(request.session_id);

    let session = state
        .db
        .lock()
        .await
        .get_session(&session_id)?
        .ok_or(ApiError::NotFound("Session"))?;

    let user_entry = ChatEntry {
        role: MessageRole::User,
        content: request.content.clone(),
        timestamp: state.scheduler.now(),
    };

    let mut prompt = Vec::with_capacity(session.messages.len() + 2);
    prompt.push(Message::system(COMPANION_SYSTEM_PROMPT));
    prompt.extend(
        session
            .messages
            .iter()
            .chain(std::iter::once(&user_entry))
            .map(|entry| Message {
                role: entry.role,
                content: entry.content.clone(),
            }),
    );

    let reply = state
        .llm
        .complete(&prompt, DEFAULT_TEMPERATURE)
        .await
        .map_err(ApiError::Upstream)?;

    let timestamp = state.scheduler.now();
    let assistant_entry = ChatEntry {
        role: MessageRole::Assistant,
        content: reply.clone(),
        timestamp,
    };

    // Other turns may have landed while the model was answering; append to
    // whatever is stored now rather than to the snapshot taken above.
    let stored = state
        .db
        .lock()
        .await
        .append_session_messages(&session_id, &[user_entry, assistant_entry])?
        .ok_or(ApiError::NotFound("Session"))?;

    let reading: MoodReading = complete_json(
        state.llm.as_ref(),
        vec![
            Message::system(MOOD_SYSTEM_PROMPT),
            Message::user(request.content),
        ],
        DEFAULT_TEMPERATURE,
    )
    .await?;
    let (mood, stress_level) = resolve_mood(&reading);

    state.db.lock().await.update_session_mood(&session_id, mood)?;

    debug!(
        "Session {} now holds {} messages, mood {}",
        session_id,
        stored,
        mood.as_str()
    );

    Ok(Json(SendMessageResponse {
        assistant_message: AssistantMessage {
            content: reply,
            timestamp,
        },
        mood,
        sentiment: Sentiment { stress_level },
    }))
}

/// Settle a loose mood reading onto a known mood and a 1-10 stress level.
fn resolve_mood(reading: &MoodReading) -> (Mood, u8) {
    let mood = match reading.mood.as_deref() {
        None => Mood::default(),
        Some(raw) => Mood::parse(&raw.trim().to_lowercase()).unwrap_or_else(|| {
            warn!("Unknown mood {:?} from model, using neutral", raw);
            Mood::default()
        }),
    };

    let stress_level = match reading.stress_level {
        Some(level) if level.is_finite() => {
            level
                .round()
                .clamp(MIN_STRESS_LEVEL as f64, MAX_STRESS_LEVEL as f64) as u8
        }
        _ => DEFAULT_STRESS_LEVEL,
    };

    (mood, stress_level)
}

pub async fn suggestions(
    State(state): State<AppState>,
    Path(stress_level): Path<i64>,
) -> Result<Json<RelaxationSuggestions>, ApiError> {
    if !(MIN_STRESS_LEVEL..=MAX_STRESS_LEVEL).contains(&stress_level) {
        return Err(ApiError::InvalidRequest(format!(
            "stress level must be between {} and {}, got {}",
            MIN_STRESS_LEVEL, MAX_STRESS_LEVEL, stress_level
        )));
    }

    let messages = vec![
        Message::system(SUGGESTIONS_SYSTEM_PROMPT),
        Message::user(format!(
            "The user's stress level is {} on a 1-10 scale. Give 3 to 5 ways to relax.",
            stress_level
        )),
    ];
    let suggestions: RelaxationSuggestions =
        complete_json(state.llm.as_ref(), messages, DEFAULT_TEMPERATURE).await?;

    Ok(Json(suggestions))
}
