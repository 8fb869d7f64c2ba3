pub mod books;
pub mod brainstorm;
pub mod documents;
pub mod error_questions;
pub mod essays;
pub mod notes;
pub mod papers;
pub mod pomodoro;
pub mod problems;
pub mod quotes;
pub mod relaxation;
pub mod resources;

use axum::{
    body::Bytes,
    extract::{multipart::MultipartError, Multipart},
    response::IntoResponse,
    Json,
};
use std::collections::HashMap;
use tracing::debug;

use crate::extract::extract_text;

pub async fn health_check() -> impl IntoResponse {
    Json(serde_json::json!({
        "service": "study-desk",
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

/// Cut `text` to at most `max` characters, on a char boundary.
pub(crate) fn truncate_chars(text: &str, max: usize) -> &str {
    match text.char_indices().nth(max) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

/// Reject request bodies whose required text field is blank.
pub(crate) fn require(field: &'static str, value: &str) -> Result<(), crate::ApiError> {
    if value.trim().is_empty() {
        return Err(crate::ApiError::InvalidRequest(format!(
            "{} cannot be empty",
            field
        )));
    }
    Ok(())
}

/// A multipart upload: one file plus whatever text fields came with it.
pub(crate) struct Upload {
    pub file_name: String,
    pub bytes: Bytes,
    pub fields: HashMap<String, String>,
}

impl Upload {
    /// A text field, treating blank values as absent.
    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields
            .get(name)
            .map(|value| value.trim())
            .filter(|value| !value.is_empty())
    }

    /// Extract the file's text off the async runtime.
    pub async fn text(&self) -> Result<String, crate::ApiError> {
        let file_name = self.file_name.clone();
        let bytes = self.bytes.clone();
        let text = tokio::task::spawn_blocking(move || extract_text(&file_name, &bytes))
            .await
            .map_err(|e| crate::ApiError::Storage(e.into()))??;
        Ok(text)
    }
}

/// Drain `multipart`, keeping the file sent under `file_field`.
pub(crate) async fn read_upload(
    mut multipart: Multipart,
    file_field: &str,
) -> Result<Upload, crate::ApiError> {
    let mut file = None;
    let mut fields = HashMap::new();

    while let Some(field) = multipart.next_field().await.map_err(bad_multipart)? {
        let name = field.name().unwrap_or_default().to_string();
        if name == file_field {
            let file_name = field.file_name().unwrap_or_default().to_string();
            let bytes = field.bytes().await.map_err(bad_multipart)?;
            file = Some((file_name, bytes));
        } else {
            let value = field.text().await.map_err(bad_multipart)?;
            fields.insert(name, value);
        }
    }

    let (file_name, bytes) =
        file.ok_or_else(|| crate::ApiError::InvalidRequest("No file uploaded".to_string()))?;
    debug!("Received upload {:?} ({} bytes)", file_name, bytes.len());

    Ok(Upload {
        file_name,
        bytes,
        fields,
    })
}

fn bad_multipart(err: MultipartError) -> crate::ApiError {
    crate::ApiError::InvalidRequest(format!("Malformed upload: {}", err.body_text()))
}
