use axum::{
    extract::{Path, State},
    Json,
};
use std::collections::BTreeMap;
use study_desk_schemas::{
    generate_quote_id, Ack, DailyQuoteRequest, GenerateQuoteRequest, Message, Quote, QuoteDraft,
    QuoteId, QuoteStatistics,
};
use tracing::{debug, info};

use crate::app::AppState;
use crate::error::ApiError;
use crate::llm::{complete_json, DEFAULT_TEMPERATURE};

const QUOTE_SYSTEM_PROMPT: &str = "You write short, memorable quotes. Return JSON: \
     {\"content\":\"the quote\",\"author\":\"author, optional\",\"category\":\"category\"}";

/// Quotes saved without a theme or language are counted under these.
const DEFAULT_THEME_LABEL: &str = "other";
const DEFAULT_LANGUAGE_LABEL: &str = "zh";

/// Human-readable description of a requested quote style.
fn style_description(style: &str) -> &str {
    match style {
        "inspirational" => "uplifting",
        "philosophical" => "reflective and philosophical",
        "motivational" => "energising, call-to-action",
        "educational" => "instructive",
        other => other,
    }
}

/// Today's daily quote, or `null` if none has been generated yet.
pub async fn today_quote(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Result<Json<Option<Quote>>, ApiError> {
    let today = state.scheduler.now().date_naive();
    let quote = state.db.lock().await.get_daily_quote(&user_id, today)?;
    Ok(Json(quote))
}

pub async fn daily_quote(
    State(state): State<AppState>,
    Json(request): Json<DailyQuoteRequest>,
) -> Result<Json<Quote>, ApiError> {
    let messages = vec![
        Message::system(QUOTE_SYSTEM_PROMPT),
        Message::user(format!(
            "Write today's quote on the theme \"{}\". Language: {}",
            request.theme, request.language
        )),
    ];
    let draft: QuoteDraft =
        complete_json(state.llm.as_ref(), messages, DEFAULT_TEMPERATURE).await?;

    let now = state.scheduler.now();
    let quote = Quote {
        id: generate_quote_id(),
        content: draft.content,
        theme: request.theme,
        language: request.language,
        author: draft.author,
        category: draft.category,
        user_id: request.user_id,
        created_at: now,
    };

    state
        .db
        .lock()
        .await
        .insert_quote(&quote, Some(now.date_naive()))?;

    info!("Generated daily quote {} for user {}", quote.id, quote.user_id);
    Ok(Json(quote))
}

pub async fn generate_quote(
    State(state): State<AppState>,
    Json(request): Json<GenerateQuoteRequest>,
) -> Result<Json<Quote>, ApiError> {
    let messages = vec![
        Message::system(QUOTE_SYSTEM_PROMPT),
        Message::user(format!(
            "Write a {} quote on the theme \"{}\". Language: {}",
            style_description(&request.style),
            request.theme,
            request.language
        )),
    ];
    let draft: QuoteDraft =
        complete_json(state.llm.as_ref(), messages, DEFAULT_TEMPERATURE).await?;

    let quote = Quote {
        id: generate_quote_id(),
        content: draft.content,
        theme: request.theme,
        language: request.language,
        author: draft.author,
        category: draft.category,
        user_id: request.user_id,
        created_at: state.scheduler.now(),
    };

    state.db.lock().await.insert_quote(&quote, None)?;

    info!("Generated {} quote {}", request.style, quote.id);
    Ok(Json(quote))
}

pub async fn list_quotes(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Result<Json<Vec<Quote>>, ApiError> {
    let quotes = state.db.lock().await.get_quotes_by_user(&user_id)?;
    Ok(Json(quotes))
}

pub async fn categories(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let categories = state.db.lock().await.get_quote_categories(&user_id)?;
    Ok(Json(serde_json::json!({ "categories": categories })))
}

pub async fn statistics(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Result<Json<QuoteStatistics>, ApiError> {
    let quotes = state.db.lock().await.get_quotes_by_user(&user_id)?;
    Ok(Json(quote_statistics(&quotes)))
}

pub async fn random_quote(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Result<Json<Option<Quote>>, ApiError> {
    let quote = state.db.lock().await.get_random_quote(&user_id)?;
    Ok(Json(quote))
}

pub async fn delete_quote(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Ack>, ApiError> {
    let id = QuoteId(id);
    if !state.db.lock().await.delete_quote(&id)? {
        debug!("Delete of unknown quote {} ignored", id);
    }
    Ok(Json(Ack::ok()))
}

pub fn quote_statistics(quotes: &[Quote]) -> QuoteStatistics {
    let mut theme_breakdown: BTreeMap<String, usize> = BTreeMap::new();
    let mut language_breakdown: BTreeMap<String, usize> = BTreeMap::new();

    for quote in quotes {
        *theme_breakdown
            .entry(label_or(&quote.theme, DEFAULT_THEME_LABEL))
            .or_default() += 1;
        *language_breakdown
            .entry(label_or(&quote.language, DEFAULT_LANGUAGE_LABEL))
            .or_default() += 1;
    }

    QuoteStatistics {
        total_quotes: quotes.len(),
        theme_breakdown,
        language_breakdown,
    }
}

fn label_or(value: &str, fallback: &str) -> String {
    if value.is_empty() {
        fallback.to_string()
    } else {
        value.to_string()
    }
}
