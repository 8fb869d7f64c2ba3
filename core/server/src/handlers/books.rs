use axum::{
    extract::{Multipart, Path, State},
    Json,
};
use study_desk_schemas::{
    generate_book_id, Ack, AuthorChatRequest, AuthorReply, Book, BookId, BookSummary,
    BookSummaryRequest, CompleteStepRequest, CompletedStep, CreateBookRequest, Message,
    MessageRole, ReadingProgress, Sq3rGuide, Sq3rGuideRequest,
};
use tracing::{debug, info};

use super::{read_upload, require, truncate_chars};
use crate::app::AppState;
use crate::error::ApiError;
use crate::extract::file_stem;
use crate::llm::{complete_json, DEFAULT_TEMPERATURE};

/// Book text sent with summary requests.
const SUMMARY_EXCERPT_CHARS: usize = 3000;

/// Book text sent with guide and author requests.
const EXCERPT_CHARS: usize = 2000;

const SUMMARY_SYSTEM_PROMPT: &str = "You are a professional book summariser.";

const SQ3R_SYSTEM_PROMPT: &str = "You are an expert in the SQ3R reading method. Return JSON: \
     {\"steps\":[{\"step\":\"survey|question|read|recite|review\",\"title\":\"step title\",\
     \"content\":\"concrete guidance\",\"completed\":false}]}";

/// Store an uploaded .txt, .pdf or .docx book.
///
/// Form fields `title`, `author` and `userId` ride along with the `book`
/// file; the title falls back to the file name.
pub async fn upload_book(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Json<Book>, ApiError> {
    let upload = read_upload(multipart, "book").await?;
    let content = upload.text().await?;

    let now = state.scheduler.now();
    let book = Book {
        id: generate_book_id(),
        user_id: upload.field("userId").unwrap_or_default().to_string(),
        title: upload
            .field("title")
            .map(str::to_string)
            .unwrap_or_else(|| file_stem(&upload.file_name)),
        author: upload.field("author").unwrap_or_default().to_string(),
        content,
        summary: None,
        created_at: now,
        updated_at: now,
    };

    state.db.lock().await.insert_book(&book)?;

    info!(
        "Uploaded book {} ({:?}, {} chars)",
        book.id,
        upload.file_name,
        book.content.chars().count()
    );
    Ok(Json(book))
}

pub async fn create_book(
    State(state): State<AppState>,
    Json(request): Json<CreateBookRequest>,
) -> Result<Json<Book>, ApiError> {
    require("title", &request.title)?;

    let now = state.scheduler.now();
    let book = Book {
        id: generate_book_id(),
        user_id: request.user_id,
        title: request.title,
        author: request.author,
        content: request.content,
        summary: None,
        created_at: now,
        updated_at: now,
    };

    state.db.lock().await.insert_book(&book)?;

    info!("Created book {} for user {}", book.id, book.user_id);
    Ok(Json(book))
}

pub async fn list_books(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Result<Json<Vec<Book>>, ApiError> {
    let books = state.db.lock().await.get_books_by_user(&user_id)?;
    Ok(Json(books))
}

/// Remove a book together with everyone's reading progress on it.
pub async fn delete_book(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Ack>, ApiError> {
    let book_id = BookId(id);
    if state.db.lock().await.delete_book(&book_id)? {
        info!("Deleted book {}", book_id);
    }
    Ok(Json(Ack::ok()))
}

pub async fn generate_summary(
    State(state): State<AppState>,
    Path(id): Path<String>,
    request: Option<Json<BookSummaryRequest>>,
) -> Result<Json<BookSummary>, ApiError> {
    let Json(request) = request.unwrap_or_default();
    let book_id = BookId(id);
    let book = load_book(&state, &book_id).await?;

    let messages = vec![
        Message::system(SUMMARY_SYSTEM_PROMPT),
        Message::user(format!(
            "Write a {} summary of this book in at most {} words.\n\n\
             Title: {}\nAuthor: {}\n\nExcerpt:\n{}",
            request.style,
            request.max_length,
            book.title,
            book.author,
            truncate_chars(&book.content, SUMMARY_EXCERPT_CHARS)
        )),
    ];
    let summary = state
        .llm
        .complete(&messages, DEFAULT_TEMPERATURE)
        .await
        .map_err(ApiError::Upstream)?;

    let now = state.scheduler.now();
    if !state
        .db
        .lock()
        .await
        .save_book_summary(&book_id, &summary, now)?
    {
        return Err(ApiError::NotFound("Book"));
    }

    debug!("Summarised book {}", book_id);
    Ok(Json(BookSummary { summary }))
}

pub async fn sq3r_guide(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(request): Json<Sq3rGuideRequest>,
) -> Result<Json<Sq3rGuide>, ApiError> {
    let book = load_book(&state, &BookId(id)).await?;

    let guide: Sq3rGuide = complete_json(
        state.llm.as_ref(),
        vec![
            Message::system(SQ3R_SYSTEM_PROMPT),
            Message::user(format!(
                "Build an SQ3R reading guide for the chapter {:?} of \"{}\".\n\nExcerpt:\n{}",
                request.chapter_title,
                book.title,
                truncate_chars(&book.content, EXCERPT_CHARS)
            )),
        ],
        DEFAULT_TEMPERATURE,
    )
    .await?;

    Ok(Json(guide))
}

/// A reader's progress; readers who have not started get a blank record.
pub async fn get_progress(
    State(state): State<AppState>,
    Path((book_id, user_id)): Path<(String, String)>,
) -> Result<Json<ReadingProgress>, ApiError> {
    let book_id = BookId(book_id);
    let progress = state
        .db
        .lock()
        .await
        .get_reading_progress(&book_id, &user_id)?
        .unwrap_or_else(|| ReadingProgress::not_started(book_id, user_id));
    Ok(Json(progress))
}

pub async fn complete_step(
    State(state): State<AppState>,
    Path((book_id, user_id)): Path<(String, String)>,
    Json(request): Json<CompleteStepRequest>,
) -> Result<Json<ReadingProgress>, ApiError> {
    let book_id = BookId(book_id);
    let step = CompletedStep {
        step: request.step_type,
        completed: true,
        user_response: request.user_response,
    };

    let db = state.db.lock().await;
    if db.get_book(&book_id)?.is_none() {
        return Err(ApiError::NotFound("Book"));
    }
    let progress = db.append_completed_step(&book_id, &user_id, &step)?;

    debug!(
        "{} completed {:?} on book {} ({} steps)",
        user_id,
        step.step,
        book_id,
        progress.completed_steps.len()
    );
    Ok(Json(progress))
}

/// Let the book's author introduce themselves.
pub async fn author_agent(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<AuthorReply>, ApiError> {
    let book = load_book(&state, &BookId(id)).await?;

    let messages = vec![
        Message::system(author_persona(&book)),
        Message::user(format!(
            "Book excerpt:\n{}\n\nAs the author, briefly introduce yourself and invite the \
             reader's questions.",
            truncate_chars(&book.content, EXCERPT_CHARS)
        )),
    ];
    let response = state
        .llm
        .complete(&messages, DEFAULT_TEMPERATURE)
        .await
        .map_err(ApiError::Upstream)?;

    Ok(Json(AuthorReply {
        response,
        book_id: Some(book.id),
    }))
}

pub async fn author_chat(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(request): Json<AuthorChatRequest>,
) -> Result<Json<AuthorReply>, ApiError> {
    require("message", &request.message)?;
    let book = load_book(&state, &BookId(id)).await?;

    let mut messages = Vec::with_capacity(request.conversation_history.len() + 2);
    messages.push(Message::system(format!(
        "{}\n\nBook excerpt:\n{}",
        author_persona(&book),
        truncate_chars(&book.content, EXCERPT_CHARS)
    )));
    messages.extend(
        request
            .conversation_history
            .into_iter()
            .filter(|message| message.role != MessageRole::System),
    );
    messages.push(Message::user(request.message));

    let response = state
        .llm
        .complete(&messages, DEFAULT_TEMPERATURE)
        .await
        .map_err(ApiError::Upstream)?;

    Ok(Json(AuthorReply {
        response,
        book_id: None,
    }))
}

fn author_persona(book: &Book) -> String {
    let author = match book.author.trim() {
        "" => "its author",
        author => author,
    };
    format!(
        "You are {}, the author of \"{}\". Answer the reader from the book's content, in the \
         author's own voice and style.",
        author, book.title
    )
}

async fn load_book(state: &AppState, id: &BookId) -> Result<Book, ApiError> {
    state
        .db
        .lock()
        .await
        .get_book(id)?
        .ok_or(ApiError::NotFound("Book"))
}
