use anyhow::{Context, Result};
use std::path::PathBuf;
use study_desk_engine::DEFAULT_INTERVALS;

use crate::llm::LLMConfig;

/// Service configuration, read from the environment at startup.
#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    pub db_path: PathBuf,
    pub addr: String,
    pub cors_origins: Vec<String>,
    pub review_intervals: Vec<u32>,
    pub llm: LLMConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            db_path: PathBuf::from("study-desk.db"),
            addr: "127.0.0.1:5000".to_string(),
            cors_origins: vec![
                "http://localhost:5173".to_string(),
                "http://127.0.0.1:5173".to_string(),
            ],
            review_intervals: DEFAULT_INTERVALS.to_vec(),
            llm: LLMConfig::default(),
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let review_intervals = match lookup("STUDY_DESK_REVIEW_INTERVALS") {
            Some(raw) => parse_intervals(&raw)
                .with_context(|| format!("Invalid STUDY_DESK_REVIEW_INTERVALS: {:?}", raw))?,
            None => defaults.review_intervals,
        };

        let cors_origins = match lookup("STUDY_DESK_CORS_ORIGINS") {
            Some(raw) => split_list(&raw),
            None => defaults.cors_origins,
        };

        Ok(Self {
            db_path: lookup("STUDY_DESK_DB_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.db_path),
            addr: lookup("STUDY_DESK_ADDR").unwrap_or(defaults.addr),
            cors_origins,
            review_intervals,
            llm: LLMConfig::from_lookup(&lookup)?,
        })
    }
}

/// Parse a comma-separated list of day intervals, e.g. `1,3,7,14`.
fn parse_intervals(raw: &str) -> Result<Vec<u32>> {
    split_list(raw)
        .iter()
        .map(|item| {
            item.parse::<u32>()
                .with_context(|| format!("{:?} is not a whole number of days", item))
        })
        .collect()
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(str::to_string)
        .collect()
}
