pub mod app;
pub mod config;
pub mod database;
pub mod error;
pub mod extract;
pub mod handlers;
pub mod llm;

pub use app::{cors_layer, router, AppState};
pub use config::AppConfig;
pub use database::Database;
pub use error::ApiError;
pub use llm::{complete_json, ChatCompletion, CompletionError, LLMConfig, OpenAICompatibleClient};
