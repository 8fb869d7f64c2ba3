use axum::{
    extract::{Path, Query, State},
    Json,
};
use std::collections::BTreeMap;
use study_desk_schemas::{
    generate_resource_id, generate_resource_search_id, FormatResourceRequest, FormattedResource,
    LearningResource, LimitQuery, Message, ResourceFormat, ResourceSearch, ResourceSearchReply,
    ResourceSearchRequest,
};
use tracing::info;

use super::require;
use crate::app::AppState;
use crate::error::ApiError;
use crate::llm::{complete_json, DEFAULT_TEMPERATURE};

const DEFAULT_HISTORY_LIMIT: usize = 20;

/// Category for resources the model gave no content type.
const UNCATEGORIZED: &str = "other";

const SEARCH_SYSTEM_PROMPT: &str = "You recommend learning resources. Return JSON: \
     {\"searchStrategy\":\"how you searched\",\"resources\":[{\"title\":\"...\",\
     \"description\":\"...\",\"url\":\"https://...\",\"source\":\"...\",\
     \"contentType\":\"article|paper|book|video|website\",\"relevanceScore\":0.9,\
     \"credibilityScore\":0.8,\"tags\":[\"...\"],\"authors\":[\"...\"],\"publishDate\":\"...\"}]}";

/// Ask the model for resources on `query` and keep the result.
///
/// Every resource gets a fresh id here; ids the model invents are dropped.
pub async fn search(
    State(state): State<AppState>,
    Json(request): Json<ResourceSearchRequest>,
) -> Result<Json<ResourceSearch>, ApiError> {
    require("query", &request.query)?;

    let reply: ResourceSearchReply = complete_json(
        state.llm.as_ref(),
        vec![
            Message::system(SEARCH_SYSTEM_PROMPT),
            Message::user(format!(
                "Recommend resources for this learning need: {}",
                request.query
            )),
        ],
        DEFAULT_TEMPERATURE,
    )
    .await?;

    let mut resources = reply.resources;
    for resource in &mut resources {
        resource.id = generate_resource_id();
    }

    let search = ResourceSearch {
        id: generate_resource_search_id(),
        user_id: request.user_id,
        query: request.query,
        search_strategy: reply.search_strategy,
        categorized_resources: categorize(&resources),
        total_results: resources.len(),
        resources,
        created_at: state.scheduler.now(),
    };

    state.db.lock().await.insert_resource_search(&search)?;

    info!(
        "Resource search {} found {} results for {:?}",
        search.id, search.total_results, search.query
    );
    Ok(Json(search))
}

pub async fn history(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    Query(query): Query<LimitQuery>,
) -> Result<Json<Vec<ResourceSearch>>, ApiError> {
    let limit = query.limit.unwrap_or(DEFAULT_HISTORY_LIMIT);
    let searches = state
        .db
        .lock()
        .await
        .get_resource_searches(&user_id, Some(limit))?;
    Ok(Json(searches))
}

pub async fn format_resource(
    State(state): State<AppState>,
    Path(resource_id): Path<String>,
    request: Option<Json<FormatResourceRequest>>,
) -> Result<Json<FormattedResource>, ApiError> {
    let Json(request) = request.unwrap_or_default();
    let resource = state
        .db
        .lock()
        .await
        .find_resource(&resource_id)?
        .ok_or(ApiError::NotFound("Resource"))?;

    let content = render_resource(&resource, request.format)
        .map_err(|e| ApiError::Storage(e.into()))?;
    Ok(Json(FormattedResource { content }))
}

/// Group resources by content type, keeping their order within a group.
pub(crate) fn categorize(resources: &[LearningResource]) -> BTreeMap<String, Vec<LearningResource>> {
    let mut groups: BTreeMap<String, Vec<LearningResource>> = BTreeMap::new();
    for resource in resources {
        let category = match resource.content_type.trim() {
            "" => UNCATEGORIZED.to_string(),
            kind => kind.to_lowercase(),
        };
        groups.entry(category).or_default().push(resource.clone());
    }
    groups
}

pub(crate) fn render_resource(
    resource: &LearningResource,
    format: ResourceFormat,
) -> serde_json::Result<String> {
    let formatted = match format {
        ResourceFormat::Markdown => format!(
            "# {}\n\n**Source**: {}\n**Link**: {}\n\n{}",
            resource.title, resource.source, resource.url, resource.description
        ),
        ResourceFormat::Plain => format!(
            "{}\n\nSource: {}\nLink: {}\n\n{}",
            resource.title, resource.source, resource.url, resource.description
        ),
        ResourceFormat::Json => serde_json::to_string_pretty(resource)?,
        ResourceFormat::Citation => {
            let authors = match resource.authors.join(", ") {
                authors if authors.is_empty() => "Unknown author".to_string(),
                authors => authors,
            };
            format!(
                "{}. {}. {}. {}",
                authors, resource.title, resource.source, resource.publish_date
            )
        }
    };
    Ok(formatted)
}
