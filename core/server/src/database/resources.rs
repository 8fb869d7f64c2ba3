use anyhow::Result;
use rusqlite::{params, OptionalExtension, Row};
use study_desk_schemas::{LearningResource, ResourceSearch, ResourceSearchId};
use tracing::debug;

use super::{get_json, get_time, json_error, to_db_time, Database};

const SEARCH_COLUMNS: &str = "id, user_id, query, search_strategy, resources,
                              categorized_resources, total_results, created_at";

impl Database {
    pub(super) fn init_resource_schema(&self) -> Result<()> {
        self.conn.execute(
            "CREATE TABLE IF NOT EXISTS resource_searches (
                id TEXT PRIMARY KEY,
                user_id TEXT NOT NULL,
                query TEXT NOT NULL,
                search_strategy TEXT NOT NULL DEFAULT '',
                resources TEXT NOT NULL DEFAULT '[]',
                categorized_resources TEXT NOT NULL DEFAULT '{}',
                total_results INTEGER NOT NULL DEFAULT 0,
                created_at TEXT NOT NULL
            )",
            [],
        )?;

        Ok(())
    }

    fn row_to_search(row: &Row) -> rusqlite::Result<ResourceSearch> {
        let total: i64 = row.get(6)?;
        Ok(ResourceSearch {
            id: ResourceSearchId(row.get(0)?),
            user_id: row.get(1)?,
            query: row.get(2)?,
            search_strategy: row.get(3)?,
            resources: get_json(row, 4)?,
            categorized_resources: get_json(row, 5)?,
            total_results: total as usize,
            created_at: get_time(row, 7)?,
        })
    }

    pub fn insert_resource_search(&self, search: &ResourceSearch) -> Result<()> {
        self.conn.execute(
            "INSERT INTO resource_searches (id, user_id, query, search_strategy, resources,
                                            categorized_resources, total_results, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                search.id.0,
                search.user_id,
                search.query,
                search.search_strategy,
                serde_json::to_string(&search.resources)?,
                serde_json::to_string(&search.categorized_resources)?,
                search.total_results as i64,
                to_db_time(&search.created_at),
            ],
        )?;

        debug!(
            "Stored resource search {} ({} results)",
            search.id, search.total_results
        );
        Ok(())
    }

    /// A user's searches, newest first, optionally capped at `limit`
    pub fn get_resource_searches(
        &self,
        user_id: &str,
        limit: Option<usize>,
    ) -> Result<Vec<ResourceSearch>> {
        let limit = limit.map(|l| l as i64).unwrap_or(-1);
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM resource_searches
             WHERE user_id = ?1
             ORDER BY created_at DESC
             LIMIT ?2",
            SEARCH_COLUMNS
        ))?;

        let searches = stmt
            .query_map(params![user_id, limit], Self::row_to_search)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(searches)
    }

    /// Look up a single result by id across every stored search
    pub fn find_resource(&self, resource_id: &str) -> Result<Option<LearningResource>> {
        let resource = self
            .conn
            .query_row(
                "SELECT item.value
                 FROM resource_searches, json_each(resource_searches.resources) AS item
                 WHERE json_extract(item.value, '$.id') = ?1
                 ORDER BY resource_searches.created_at DESC
                 LIMIT 1",
                params![resource_id],
                |row| {
                    let raw: String = row.get(0)?;
                    serde_json::from_str(&raw).map_err(|e| json_error(0, e))
                },
            )
            .optional()?;

        Ok(resource)
    }
}
