use axum::{
    extract::{Path, Query, State},
    Json,
};
use std::collections::BTreeMap;
use study_desk_schemas::{
    generate_pomodoro_id, Ack, DailyFocus, LimitQuery, PomodoroId, PomodoroSession,
    PomodoroStats, StartPomodoroRequest,
};
use tracing::info;

use super::require;
use crate::app::AppState;
use crate::error::ApiError;

/// Longest focus block accepted, in minutes.
const MAX_DURATION_MINUTES: u32 = 180;

const DEFAULT_HISTORY_LIMIT: usize = 20;

pub async fn start_session(
    State(state): State<AppState>,
    Json(request): Json<StartPomodoroRequest>,
) -> Result<Json<PomodoroSession>, ApiError> {
    require("userId", &request.user_id)?;
    if !(1..=MAX_DURATION_MINUTES).contains(&request.duration) {
        return Err(ApiError::InvalidRequest(format!(
            "duration must be between 1 and {} minutes",
            MAX_DURATION_MINUTES
        )));
    }

    let now = state.scheduler.now();
    let session = PomodoroSession {
        id: generate_pomodoro_id(),
        user_id: request.user_id,
        task: request.task.filter(|task| !task.trim().is_empty()),
        duration: request.duration,
        start_time: now,
        end_time: None,
        completed: false,
        created_at: now,
    };

    state.db.lock().await.insert_pomodoro(&session)?;

    info!(
        "Started {}-minute pomodoro {} for user {}",
        session.duration, session.id, session.user_id
    );
    Ok(Json(session))
}

/// The user's latest unfinished session, or `null`.
pub async fn active_session(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Result<Json<Option<PomodoroSession>>, ApiError> {
    let session = state.db.lock().await.get_active_pomodoro(&user_id)?;
    Ok(Json(session))
}

pub async fn complete_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Ack>, ApiError> {
    let session_id = PomodoroId(id);
    let now = state.scheduler.now();

    if !state.db.lock().await.complete_pomodoro(&session_id, now)? {
        return Err(ApiError::NotFound("Session"));
    }

    info!("Completed pomodoro {}", session_id);
    Ok(Json(Ack::ok()))
}

pub async fn stats(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Result<Json<PomodoroStats>, ApiError> {
    let sessions = state.db.lock().await.get_pomodoros_by_user(&user_id, None)?;
    Ok(Json(focus_stats(&sessions)))
}

pub async fn list_sessions(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    Query(query): Query<LimitQuery>,
) -> Result<Json<Vec<PomodoroSession>>, ApiError> {
    let limit = query.limit.unwrap_or(DEFAULT_HISTORY_LIMIT);
    let sessions = state
        .db
        .lock()
        .await
        .get_pomodoros_by_user(&user_id, Some(limit))?;
    Ok(Json(sessions))
}

/// Focus totals over `sessions`. Only completed sessions count as focus
/// time; days are the UTC dates sessions started on, oldest first.
pub(crate) fn focus_stats(sessions: &[PomodoroSession]) -> PomodoroStats {
    let mut daily: BTreeMap<_, (usize, u64)> = BTreeMap::new();
    let mut completed_sessions = 0;
    let mut total_focus_time = 0u64;

    for session in sessions.iter().filter(|session| session.completed) {
        let minutes = u64::from(session.duration);
        completed_sessions += 1;
        total_focus_time += minutes;

        let day = daily.entry(session.start_time.date_naive()).or_default();
        day.0 += 1;
        day.1 += minutes;
    }

    let average_session_length = if completed_sessions == 0 {
        0.0
    } else {
        (total_focus_time as f64 / completed_sessions as f64 * 10.0).round() / 10.0
    };

    PomodoroStats {
        total_sessions: sessions.len(),
        completed_sessions,
        total_focus_time,
        average_session_length,
        daily_stats: daily
            .into_iter()
            .map(|(date, (sessions, focus_time))| DailyFocus {
                date,
                sessions,
                focus_time,
            })
            .collect(),
    }
}
