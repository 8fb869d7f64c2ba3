use axum::{
    extract::{Multipart, Path, Query, State},
    Json,
};
use study_desk_schemas::{
    generate_paper_id, CreatePaperRequest, Message, Paper, PaperAnswer, PaperId,
    PaperQuestionRequest, PaperSummary, PaperTranslation, PaperUpload, TermAnnotations,
    TermsRequest, UserFilter,
};
use tracing::{debug, info};

use super::{read_upload, require, truncate_chars};
use crate::app::AppState;
use crate::error::ApiError;
use crate::extract::{file_stem, DocumentFormat};
use crate::llm::{complete_json, DEFAULT_TEMPERATURE};

/// Paper text beyond this is left out of question and summary prompts.
const MAX_PROMPT_CHARS: usize = 3000;

/// Paper text sent alongside a selected passage.
const MAX_PASSAGE_CONTEXT_CHARS: usize = 1500;

/// Characters of extracted text offered as the abstract of an upload.
const ABSTRACT_CHARS: usize = 500;

/// Translation is done paragraph-aligned, at most this many chars per call.
const TRANSLATION_CHUNK_CHARS: usize = 2000;

const TRANSLATE_SYSTEM_PROMPT: &str = "You are an expert translator of academic papers. \
     Translate the text into Chinese, keeping technical terms accurate. Output only the \
     translation.";

const QUESTION_SYSTEM_PROMPT: &str = "You are a reading assistant for academic papers. When \
     the reader selected a passage, answer about that passage only and do not summarise the \
     whole paper. Answer concisely, accurately and plainly.";

const TERMS_SYSTEM_PROMPT: &str = "You annotate academic terminology. Return JSON: \
     {\"annotations\":[{\"term\":\"...\",\"explanation\":\"...\",\"context\":\"...\"}]}";

const SUMMARY_SYSTEM_PROMPT: &str = "You write structured summaries of academic papers. \
     Return JSON: {\"overview\":\"...\",\"keyFindings\":[\"...\"],\"methodology\":\"...\",\
     \"conclusions\":\"...\",\"significance\":\"...\"}";

/// Extract a PDF's text for the client to review. Nothing is stored.
pub async fn upload_paper(multipart: Multipart) -> Result<Json<PaperUpload>, ApiError> {
    let upload = read_upload(multipart, "pdf").await?;
    if DocumentFormat::from_file_name(&upload.file_name) != Some(DocumentFormat::Pdf) {
        return Err(ApiError::InvalidRequest(
            "Only PDF files are supported".to_string(),
        ));
    }

    let content = upload.text().await?;
    info!(
        "Extracted paper {:?} ({} chars)",
        upload.file_name,
        content.chars().count()
    );

    Ok(Json(PaperUpload {
        title: file_stem(&upload.file_name),
        abstract_text: truncate_chars(&content, ABSTRACT_CHARS).to_string(),
        content,
    }))
}

pub async fn create_paper(
    State(state): State<AppState>,
    Json(request): Json<CreatePaperRequest>,
) -> Result<Json<Paper>, ApiError> {
    require("title", &request.title)?;

    let now = state.scheduler.now();
    let paper = Paper {
        id: generate_paper_id(),
        user_id: request.user_id,
        title: request.title,
        authors: request.authors,
        abstract_text: request.abstract_text,
        content: request.content,
        translated_content: None,
        created_at: now,
        updated_at: now,
    };

    state.db.lock().await.insert_paper(&paper)?;

    info!("Saved paper {} for user {}", paper.id, paper.user_id);
    Ok(Json(paper))
}

pub async fn list_papers(
    State(state): State<AppState>,
    Query(filter): Query<UserFilter>,
) -> Result<Json<Vec<Paper>>, ApiError> {
    let papers = state.db.lock().await.get_papers_by_user(&filter.user_id)?;
    Ok(Json(papers))
}

/// Translate the full text chunk by chunk and keep the result on the paper.
pub async fn translate_paper(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<PaperTranslation>, ApiError> {
    let paper_id = PaperId(id);
    let paper = load_paper(&state, &paper_id).await?;

    let chunks = chunk_paragraphs(&paper.content, TRANSLATION_CHUNK_CHARS);
    let mut parts = Vec::with_capacity(chunks.len());
    for (index, chunk) in chunks.iter().enumerate() {
        let messages = vec![
            Message::system(TRANSLATE_SYSTEM_PROMPT),
            Message::user(format!(
                "Translate the following (part {} of {}):\n\n{}",
                index + 1,
                chunks.len(),
                chunk
            )),
        ];
        let part = state
            .llm
            .complete(&messages, DEFAULT_TEMPERATURE)
            .await
            .map_err(ApiError::Upstream)?;
        parts.push(part);
    }
    let translated_content = parts.join("\n\n");

    let now = state.scheduler.now();
    if !state
        .db
        .lock()
        .await
        .save_paper_translation(&paper_id, &translated_content, now)?
    {
        return Err(ApiError::NotFound("Paper"));
    }

    info!("Translated paper {} in {} chunks", paper_id, chunks.len());
    Ok(Json(PaperTranslation { translated_content }))
}

pub async fn ask_question(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(request): Json<PaperQuestionRequest>,
) -> Result<Json<PaperAnswer>, ApiError> {
    require("question", &request.question)?;
    let paper = load_paper(&state, &PaperId(id)).await?;

    let messages = vec![
        Message::system(QUESTION_SYSTEM_PROMPT),
        Message::user(question_prompt(&paper, &request)),
    ];
    let answer = state
        .llm
        .complete(&messages, DEFAULT_TEMPERATURE)
        .await
        .map_err(ApiError::Upstream)?;

    Ok(Json(PaperAnswer { answer }))
}

pub async fn annotate_terms(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(request): Json<TermsRequest>,
) -> Result<Json<TermAnnotations>, ApiError> {
    require("text", &request.text)?;
    load_paper(&state, &PaperId(id)).await?;

    let annotations: TermAnnotations = complete_json(
        state.llm.as_ref(),
        vec![
            Message::system(TERMS_SYSTEM_PROMPT),
            Message::user(format!(
                "Identify and explain the technical terms in this text:\n\n{}",
                request.text
            )),
        ],
        DEFAULT_TEMPERATURE,
    )
    .await?;

    debug!("Annotated {} terms", annotations.annotations.len());
    Ok(Json(annotations))
}

pub async fn summarize(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<PaperSummary>, ApiError> {
    let paper = load_paper(&state, &PaperId(id)).await?;

    let summary: PaperSummary = complete_json(
        state.llm.as_ref(),
        vec![
            Message::system(SUMMARY_SYSTEM_PROMPT),
            Message::user(format!(
                "Summarise this paper.\n\nTitle: {}\n\nContent:\n{}",
                paper.title,
                truncate_chars(&paper.content, MAX_PROMPT_CHARS)
            )),
        ],
        DEFAULT_TEMPERATURE,
    )
    .await?;

    Ok(Json(summary))
}

fn question_prompt(paper: &Paper, request: &PaperQuestionRequest) -> String {
    let passage = request.context.trim();
    if passage.is_empty() {
        return format!(
            "Paper title: {}\n\nPaper content:\n{}\n\nQuestion: {}",
            paper.title,
            truncate_chars(&paper.content, MAX_PROMPT_CHARS),
            request.question
        );
    }

    format!(
        "While reading the paper \"{}\" the reader selected this passage:\n\"{}\"\n\n\
         Their question about it: {}\n\n\
         Explain the passage's meaning, role or background. Use the rest of the paper only \
         as support.\n\nPaper context (reference only):\n{}",
        paper.title,
        passage,
        request.question,
        truncate_chars(&paper.content, MAX_PASSAGE_CONTEXT_CHARS)
    )
}

/// Group `text` line by line into chunks of at most `max_chars` characters.
///
/// A single line longer than `max_chars` becomes a chunk of its own. Empty
/// text yields no chunks.
pub(crate) fn chunk_paragraphs(text: &str, max_chars: usize) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut current_chars = 0;

    for paragraph in text.split('\n') {
        let paragraph_chars = paragraph.chars().count();
        if !current.is_empty() && current_chars + paragraph_chars + 1 > max_chars {
            chunks.push(std::mem::take(&mut current));
            current_chars = 0;
        }
        if !current.is_empty() {
            current.push('\n');
            current_chars += 1;
        }
        current.push_str(paragraph);
        current_chars += paragraph_chars;
    }

    if !current.is_empty() {
        chunks.push(current);
    }
    chunks
}

async fn load_paper(state: &AppState, id: &PaperId) -> Result<Paper, ApiError> {
    state
        .db
        .lock()
        .await
        .get_paper(id)?
        .ok_or(ApiError::NotFound("Paper"))
}
