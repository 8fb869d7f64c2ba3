use anyhow::{Context, Result};
use axum::{
    extract::DefaultBodyLimit,
    http::HeaderValue,
    routing::{delete, get, post},
    Router,
};
use std::sync::Arc;
use study_desk_engine::ReviewScheduler;
use tokio::sync::Mutex;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};

use crate::database::Database;
use crate::extract::MAX_UPLOAD_BYTES;
use crate::handlers::{
    self, books, brainstorm, documents, error_questions, essays, notes, papers, pomodoro,
    problems, quotes, relaxation, resources,
};
use crate::llm::ChatCompletion;

#[derive(Clone)]
pub struct AppState {
    pub db: Arc<Mutex<Database>>,
    pub llm: Arc<dyn ChatCompletion>,
    pub scheduler: Arc<ReviewScheduler>,
}

impl AppState {
    pub fn new(db: Database, llm: Arc<dyn ChatCompletion>, scheduler: ReviewScheduler) -> Self {
        Self {
            db: Arc::new(Mutex::new(db)),
            llm,
            scheduler: Arc::new(scheduler),
        }
    }
}

/// All routes, without transport layers (tracing, CORS) attached.
pub fn router(state: AppState) -> Router {
    let api = Router::new()
        // Notes
        .route("/notes", post(notes::create_note))
        .route("/notes/user/:user_id", get(notes::list_notes))
        .route("/notes/user/:user_id/review", get(notes::review_queue))
        .route(
            "/notes/:id",
            get(notes::get_note)
                .put(notes::update_note)
                .delete(notes::delete_note),
        )
        .route("/notes/:id/cornell", post(notes::generate_cornell))
        .route("/notes/:id/feynman", post(notes::evaluate_feynman))
        .route("/notes/:id/review-done", post(notes::review_done))
        // Essays
        .route("/essays", post(essays::submit_essay))
        .route("/essays/user/:user_id", get(essays::list_essays))
        .route("/essays/:id/feedback", get(essays::essay_feedback))
        // Error questions
        .route("/error-questions", post(error_questions::add_error_question))
        .route(
            "/error-questions/:id",
            delete(error_questions::delete_error_question),
        )
        .route(
            "/error-questions/user/:user_id",
            get(error_questions::list_error_questions),
        )
        .route(
            "/error-questions/user/:user_id/analysis",
            get(error_questions::analysis),
        )
        .route(
            "/error-questions/user/:user_id/weak-subjects",
            get(error_questions::weak_subjects),
        )
        .route(
            "/error-questions/user/:user_id/generate-practice",
            post(error_questions::generate_practice),
        )
        // Quotes
        .route("/quotes/daily", post(quotes::daily_quote))
        .route("/quotes/generate", post(quotes::generate_quote))
        .route("/quotes/:id", delete(quotes::delete_quote))
        .route("/quotes/user/:user_id", get(quotes::list_quotes))
        .route("/quotes/user/:user_id/today", get(quotes::today_quote))
        .route("/quotes/user/:user_id/categories", get(quotes::categories))
        .route("/quotes/user/:user_id/statistics", get(quotes::statistics))
        .route("/quotes/user/:user_id/random", get(quotes::random_quote))
        // Relaxation chat
        .route("/relaxation-chat/sessions", post(relaxation::create_session))
        .route("/relaxation-chat/messages", post(relaxation::send_message))
        .route(
            "/relaxation-chat/suggestions/:stress_level",
            get(relaxation::suggestions),
        )
        // Documents
        .route("/documents", post(documents::create_document))
        .route("/documents/generate", post(documents::generate_document))
        .route("/documents/user/:user_id", get(documents::list_documents))
        .route(
            "/documents/:id",
            get(documents::get_document)
                .put(documents::update_document)
                .delete(documents::delete_document),
        )
        .route("/documents/:id/chat", post(documents::chat))
        // Papers
        .route(
            "/papers/upload",
            post(papers::upload_paper).layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES)),
        )
        .route(
            "/papers",
            get(papers::list_papers).post(papers::create_paper),
        )
        .route("/papers/:id/translate", post(papers::translate_paper))
        .route("/papers/:id/question", post(papers::ask_question))
        .route("/papers/:id/terms", post(papers::annotate_terms))
        .route("/papers/:id/summary", post(papers::summarize))
        // Books
        .route(
            "/books/upload",
            post(books::upload_book).layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES)),
        )
        .route("/books", post(books::create_book))
        .route("/books/user/:user_id", get(books::list_books))
        .route("/books/:id", delete(books::delete_book))
        .route("/books/:id/summary", post(books::generate_summary))
        .route("/books/:id/sq3r-guide", post(books::sq3r_guide))
        .route("/books/:id/progress/:user_id", get(books::get_progress))
        .route(
            "/books/:id/progress/:user_id/complete",
            post(books::complete_step),
        )
        .route("/books/:id/author-agent", post(books::author_agent))
        .route("/books/:id/author-chat", post(books::author_chat))
        // Brainstorm panels
        .route(
            "/brainstorm/sessions",
            get(brainstorm::list_sessions).post(brainstorm::create_session),
        )
        .route(
            "/brainstorm/sessions/:id",
            get(brainstorm::get_session).delete(brainstorm::delete_session),
        )
        .route(
            "/brainstorm/sessions/:id/start-discussion",
            post(brainstorm::start_discussion),
        )
        .route(
            "/brainstorm/sessions/:id/synthesize",
            post(brainstorm::synthesize),
        )
        .route(
            "/brainstorm/sessions/:id/deep-dive",
            post(brainstorm::deep_dive),
        )
        // Guided problem solving
        .route("/problems/analyze", post(problems::analyze))
        .route("/problems/start-session", post(problems::start_session))
        .route("/problems/process-step", post(problems::process_step))
        .route("/problems/hint", post(problems::hint))
        .route("/problems/complete-session", post(problems::complete_session))
        .route(
            "/problems/active-session/:user_id",
            get(problems::active_session),
        )
        .route("/problems/history/:user_id", get(problems::history))
        .route("/problems/generate-similar", post(problems::generate_similar))
        // Resource search
        .route("/resources/search", post(resources::search))
        .route("/resources/history/:user_id", get(resources::history))
        .route("/resources/:id/format", post(resources::format_resource));

    // Focus timer routes predate the versioned prefix
    let pomodoro = Router::new()
        .route("/start", post(pomodoro::start_session))
        .route("/:id/complete", post(pomodoro::complete_session))
        .route("/user/:user_id", get(pomodoro::list_sessions))
        .route("/user/:user_id/active", get(pomodoro::active_session))
        .route("/user/:user_id/stats", get(pomodoro::stats));

    Router::new()
        .route("/api/health", get(handlers::health_check))
        .nest("/api/v1", api)
        .nest("/api/pomodoro", pomodoro)
        .with_state(state)
}

/// CORS policy allowing the configured front-end origins.
pub fn cors_layer(origins: &[String]) -> Result<CorsLayer> {
    let origins = origins
        .iter()
        .map(|origin| {
            origin
                .parse::<HeaderValue>()
                .with_context(|| format!("Invalid CORS origin: {:?}", origin))
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods(Any)
        .allow_headers(Any))
}
