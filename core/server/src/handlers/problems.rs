use axum::{
    extract::{Path, State},
    Json,
};
use serde::Deserialize;
use study_desk_schemas::{
    generate_problem_id, Ack, Hint, Message, ProblemAnalysis, ProblemHistory, ProblemId,
    ProblemOverview, ProblemRecord, ProblemRequest, ProblemSession, ProcessStepRequest,
    SessionRequest, SimilarProblem, SimilarProblemsRequest, SolutionSummary, StepFeedback,
};
use tracing::{debug, info, warn};

use super::require;
use crate::app::AppState;
use crate::error::ApiError;
use crate::llm::{complete_json, DEFAULT_TEMPERATURE};

const DEFAULT_SIMILAR_COUNT: u32 = 3;
const MAX_SIMILAR_COUNT: u32 = 10;

const ANALYSIS_SYSTEM_PROMPT: &str = "You analyse exercises. Return JSON: \
     {\"problemType\":\"type\",\"difficulty\":\"easy|medium|hard\",\"requiredConcepts\":[\"...\"],\
     \"estimatedTime\":15,\"solutionApproach\":[\"step\"]} where estimatedTime is in minutes.";

const STEP_SYSTEM_PROMPT: &str =
    "You are a tutor guiding a student through a problem. Assess their step and give feedback.";

const HINT_SYSTEM_PROMPT: &str = "You give hints for exercises. Return JSON: \
     {\"stepNumber\":1,\"hintLevel\":\"gentle|moderate|strong\",\"content\":\"the hint\",\
     \"revealsSolution\":false}";

/// Shape of a similar-problems reply. Anything but a list counts as none.
#[derive(Deserialize)]
#[serde(untagged)]
enum SimilarReply {
    List(Vec<SimilarProblem>),
    Other(serde_json::Value),
}

/// Analyse a problem without opening a session.
pub async fn analyze(
    State(state): State<AppState>,
    Json(request): Json<ProblemRequest>,
) -> Result<Json<ProblemAnalysis>, ApiError> {
    require("question", &request.question)?;
    let analysis = analyze_problem(&state, &request).await?;
    Ok(Json(analysis))
}

/// Analyse a problem and open a guided solving session on it.
pub async fn start_session(
    State(state): State<AppState>,
    Json(request): Json<ProblemRequest>,
) -> Result<Json<ProblemSession>, ApiError> {
    require("question", &request.question)?;
    let analysis = analyze_problem(&state, &request).await?;

    let problem = ProblemRecord {
        id: generate_problem_id(),
        user_id: request.user_id,
        question: request.question,
        subject: request.subject,
        analysis,
        current_step: 0,
        user_progress: Vec::new(),
        hints_used: 0,
        completed: false,
        created_at: state.scheduler.now(),
    };

    state.db.lock().await.insert_problem(&problem)?;

    info!(
        "Opened problem session {} for user {} ({})",
        problem.id, problem.user_id, problem.analysis.difficulty
    );
    Ok(Json(problem.session()))
}

/// Give feedback on the learner's next step and record it.
pub async fn process_step(
    State(state): State<AppState>,
    Json(request): Json<ProcessStepRequest>,
) -> Result<Json<StepFeedback>, ApiError> {
    require("userInput", &request.user_input)?;
    let problem_id = ProblemId(request.session_id);
    let problem = load_problem(&state, &problem_id).await?;

    let messages = vec![
        Message::system(STEP_SYSTEM_PROMPT),
        Message::user(format!(
            "Problem: {}\nSubject: {}\nStep: {}\nStudent's answer: {}\n\n\
             Assess the step and give feedback.",
            problem.question,
            problem.subject,
            problem.current_step + 1,
            request.user_input
        )),
    ];
    let feedback = state
        .llm
        .complete(&messages, DEFAULT_TEMPERATURE)
        .await
        .map_err(ApiError::Upstream)?;

    let attempt = state
        .db
        .lock()
        .await
        .record_problem_step(&problem_id, &request.user_input, state.scheduler.now())?
        .ok_or(ApiError::NotFound("Session"))?;

    debug!("Recorded step {} of {}", attempt.step_number, problem_id);
    Ok(Json(StepFeedback {
        feedback,
        should_proceed: true,
    }))
}

pub async fn hint(
    State(state): State<AppState>,
    Json(request): Json<SessionRequest>,
) -> Result<Json<Hint>, ApiError> {
    let problem_id = ProblemId(request.session_id);
    let problem = load_problem(&state, &problem_id).await?;
    let step = problem.current_step + 1;

    let mut hint: Hint = complete_json(
        state.llm.as_ref(),
        vec![
            Message::system(HINT_SYSTEM_PROMPT),
            Message::user(format!(
                "Problem: {}\nSubject: {}\nCurrent step: {}\nGive one gentle hint.",
                problem.question, problem.subject, step
            )),
        ],
        DEFAULT_TEMPERATURE,
    )
    .await?;
    if hint.step_number == 0 {
        hint.step_number = step;
    }

    state.db.lock().await.record_problem_hint(&problem_id)?;

    debug!("Hint for step {} of {}", step, problem_id);
    Ok(Json(hint))
}

pub async fn complete_session(
    State(state): State<AppState>,
    Json(request): Json<SessionRequest>,
) -> Result<Json<Ack>, ApiError> {
    let problem_id = ProblemId(request.session_id);
    if !state.db.lock().await.complete_problem(&problem_id)? {
        return Err(ApiError::NotFound("Session"));
    }

    info!("Completed problem session {}", problem_id);
    Ok(Json(Ack::ok()))
}

/// The user's latest unfinished session, or `null`.
pub async fn active_session(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Result<Json<Option<ProblemSession>>, ApiError> {
    let problem = state.db.lock().await.get_active_problem(&user_id)?;
    Ok(Json(problem.as_ref().map(ProblemRecord::session)))
}

pub async fn history(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Result<Json<ProblemHistory>, ApiError> {
    let problems = state.db.lock().await.get_problems_by_user(&user_id)?;
    Ok(Json(build_history(&problems)))
}

/// Ask for fresh problems in the style of a stored one.
pub async fn generate_similar(
    State(state): State<AppState>,
    Json(request): Json<SimilarProblemsRequest>,
) -> Result<Json<Vec<SimilarProblem>>, ApiError> {
    let problem = load_problem(&state, &ProblemId(request.problem_id)).await?;
    let count = request
        .count
        .unwrap_or(DEFAULT_SIMILAR_COUNT)
        .clamp(1, MAX_SIMILAR_COUNT);

    let reply: SimilarReply = complete_json(
        state.llm.as_ref(),
        vec![
            Message::system(format!(
                "You write exercises. Return a JSON array of {} problems: \
                 [{{\"question\":\"...\",\"subject\":\"...\",\"difficulty\":\"easy|medium|hard\",\
                 \"problemType\":\"...\"}}]",
                count
            )),
            Message::user(format!(
                "Write {} problems similar to this one.\nSubject: {}\nProblem: {}",
                count, problem.subject, problem.question
            )),
        ],
        DEFAULT_TEMPERATURE,
    )
    .await?;

    let similar = match reply {
        SimilarReply::List(problems) => problems,
        SimilarReply::Other(_) => {
            warn!("Similar problems reply was not a list, returning none");
            Vec::new()
        }
    };
    Ok(Json(similar))
}

async fn analyze_problem(
    state: &AppState,
    request: &ProblemRequest,
) -> Result<ProblemAnalysis, ApiError> {
    let analysis = complete_json(
        state.llm.as_ref(),
        vec![
            Message::system(ANALYSIS_SYSTEM_PROMPT),
            Message::user(format!(
                "Subject: {}\nProblem: {}",
                request.subject, request.question
            )),
        ],
        DEFAULT_TEMPERATURE,
    )
    .await?;
    Ok(analysis)
}

/// Split stored records into the overview, session and summary views.
pub(crate) fn build_history(problems: &[ProblemRecord]) -> ProblemHistory {
    let overviews = problems
        .iter()
        .map(|problem| ProblemOverview {
            id: problem.id.clone(),
            question: problem.question.clone(),
            subject: problem.subject.clone(),
            difficulty: problem.analysis.difficulty.clone(),
            problem_type: problem.analysis.problem_type.clone(),
            created_at: problem.created_at,
        })
        .collect();

    let summaries = problems
        .iter()
        .map(|problem| {
            let time_spent = problem
                .user_progress
                .last()
                .map_or(0, |step| (step.timestamp - problem.created_at).num_minutes());
            SolutionSummary {
                problem_id: problem.id.clone(),
                method: problem
                    .analysis
                    .solution_approach
                    .first()
                    .cloned()
                    .unwrap_or_default(),
                key_steps: problem
                    .user_progress
                    .iter()
                    .map(|step| step.user_input.clone())
                    .collect(),
                concepts: problem.analysis.required_concepts.clone(),
                time_spent,
                hints_used: problem.hints_used,
            }
        })
        .collect();

    ProblemHistory {
        problems: overviews,
        sessions: problems.iter().map(ProblemRecord::session).collect(),
        summaries,
    }
}

async fn load_problem(state: &AppState, id: &ProblemId) -> Result<ProblemRecord, ApiError> {
    state
        .db
        .lock()
        .await
        .get_problem(id)?
        .ok_or(ApiError::NotFound("Session"))
}
