use axum::{
    extract::{Path, State},
    Json,
};
use study_desk_schemas::{
    generate_document_id, Ack, ChatReply, CreateDocumentRequest, Document, DocumentChatRequest,
    DocumentDraft, DocumentId, GenerateDocumentRequest, Message, MessageRole,
    UpdateDocumentRequest,
};
use tracing::{debug, info};

use super::{require, truncate_chars};
use crate::app::AppState;
use crate::error::ApiError;
use crate::llm::{complete_json, DEFAULT_TEMPERATURE};

/// Document text beyond this is left out of the editing assistant's context.
const MAX_CONTEXT_CHARS: usize = 4000;

const UNTITLED: &str = "Untitled document";

const GENERATE_SYSTEM_PROMPT: &str = "You are a professional writing assistant. Write a \
     complete document for the user's request. Return JSON: \
     {\"title\":\"document title\",\"content\":\"document body\"}. The body is plain text with \
     paragraphs separated by newlines and headings marked with #.";

pub async fn create_document(
    State(state): State<AppState>,
    Json(request): Json<CreateDocumentRequest>,
) -> Result<Json<Document>, ApiError> {
    let now = state.scheduler.now();
    let document = Document {
        id: generate_document_id(),
        user_id: request.user_id,
        title: request.title,
        content: request.content,
        created_at: now,
        updated_at: now,
    };

    state.db.lock().await.insert_document(&document)?;

    info!("Created document {} for user {}", document.id, document.user_id);
    Ok(Json(document))
}

pub async fn list_documents(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Result<Json<Vec<Document>>, ApiError> {
    let documents = state.db.lock().await.get_documents_by_user(&user_id)?;
    Ok(Json(documents))
}

pub async fn get_document(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Document>, ApiError> {
    let document = load_document(&state, &DocumentId(id)).await?;
    Ok(Json(document))
}

pub async fn update_document(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(request): Json<UpdateDocumentRequest>,
) -> Result<Json<Document>, ApiError> {
    let document_id = DocumentId(id);
    let now = state.scheduler.now();

    let db = state.db.lock().await;
    if !db.update_document(&document_id, &request, now)? {
        return Err(ApiError::NotFound("Document"));
    }
    let document = db
        .get_document(&document_id)?
        .ok_or(ApiError::NotFound("Document"))?;

    debug!("Updated document {}", document_id);
    Ok(Json(document))
}

pub async fn delete_document(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Ack>, ApiError> {
    let document_id = DocumentId(id);
    if state.db.lock().await.delete_document(&document_id)? {
        info!("Deleted document {}", document_id);
    }
    Ok(Json(Ack::ok()))
}

/// One turn with the editing assistant, grounded on the stored document.
///
/// The conversation lives with the client; only the document is read here.
pub async fn chat(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(request): Json<DocumentChatRequest>,
) -> Result<Json<ChatReply>, ApiError> {
    let document = load_document(&state, &DocumentId(id)).await?;

    let mut messages = Vec::with_capacity(request.history.len() + 1);
    messages.push(Message::system(editing_prompt(&document)));
    messages.extend(
        request
            .history
            .into_iter()
            .filter(|message| message.role != MessageRole::System),
    );

    let reply = state
        .llm
        .complete(&messages, DEFAULT_TEMPERATURE)
        .await
        .map_err(ApiError::Upstream)?;

    Ok(Json(ChatReply { reply }))
}

/// Draft a whole document from a prompt and store it.
pub async fn generate_document(
    State(state): State<AppState>,
    Json(request): Json<GenerateDocumentRequest>,
) -> Result<Json<Document>, ApiError> {
    require("prompt", &request.prompt)?;

    let draft: DocumentDraft = complete_json(
        state.llm.as_ref(),
        vec![
            Message::system(GENERATE_SYSTEM_PROMPT),
            Message::user(request.prompt),
        ],
        DEFAULT_TEMPERATURE,
    )
    .await?;

    let title = match draft.title.trim() {
        "" => UNTITLED.to_string(),
        title => title.to_string(),
    };

    let now = state.scheduler.now();
    let document = Document {
        id: generate_document_id(),
        user_id: request.user_id,
        title,
        content: draft.content,
        created_at: now,
        updated_at: now,
    };

    state.db.lock().await.insert_document(&document)?;

    info!("Generated document {} ({:?})", document.id, document.title);
    Ok(Json(document))
}

fn editing_prompt(document: &Document) -> String {
    format!(
        "You are a professional writing assistant editing a document together with the user. \
         You can suggest changes, rewrite or expand passages, restructure and fix grammar. \
         When asked to change the document, reply with the full revised text without code \
         fences. Keep replies concise and practical.\n\n\
         Document title: {}\nDocument content:\n{}",
        document.title,
        truncate_chars(&document.content, MAX_CONTEXT_CHARS)
    )
}

async fn load_document(state: &AppState, id: &DocumentId) -> Result<Document, ApiError> {
    state
        .db
        .lock()
        .await
        .get_document(id)?
        .ok_or(ApiError::NotFound("Document"))
}
