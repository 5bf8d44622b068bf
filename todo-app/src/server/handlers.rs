// HTTP request handlers
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::Deserialize;
use serde_json::{json, Value};
use todo_search_repository::ProvisioningReport;
use todo_shared::{Item, ItemSearchResults};
use todo_store_repository::{ItemDraft, ItemFilter};
use todo_sync::CycleReport;
use tracing::info;

use crate::config::SyncMode;
use crate::server::error::ApiError;
use crate::server::state::AppState;

/// Filters accepted by `GET /items`.
#[derive(Debug, Default, Deserialize)]
pub struct ListQuery {
    pub completed: Option<bool>,
    pub tag: Option<String>,
    /// Case-insensitive substring of the title.
    pub title: Option<String>,
}

impl ListQuery {
    fn into_filter(self) -> ItemFilter {
        let mut filters = Vec::new();
        if let Some(completed) = self.completed {
            filters.push(ItemFilter::Completed(completed));
        }
        if let Some(tag) = self.tag.filter(|t| !t.trim().is_empty()) {
            filters.push(ItemFilter::HasTag(tag.trim().to_string()));
        }
        if let Some(title) = self.title.filter(|t| !t.trim().is_empty()) {
            filters.push(ItemFilter::TitleContains(title.trim().to_string()));
        }

        match filters.len() {
            0 => ItemFilter::All,
            1 => filters.remove(0),
            _ => ItemFilter::And(filters),
        }
    }
}

/// Optional partition key for point operations.
#[derive(Debug, Default, Deserialize)]
pub struct PartitionQuery {
    #[serde(rename = "partitionKey")]
    pub partition_key: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct TextQuery {
    #[serde(default)]
    pub q: String,
}

fn report_json(report: &CycleReport) -> Value {
    json!({
        "scanned": report.scanned,
        "new": report.new,
        "changed": report.changed,
        "unchanged": report.unchanged,
        "deleted": report.deleted,
        "watermark": report.watermark
    })
}

fn provisioning_json(report: &ProvisioningReport) -> Value {
    json!({
        "index_created": report.index_created,
        "datasource_created": report.datasource_created,
        "indexer_created": report.indexer_created
    })
}

/// Health check endpoint
pub async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    let sync = match &state.sync {
        Some(handle) => {
            let stats = handle.coordinator().stats();
            json!({
                "phase": format!("{:?}", handle.phase()),
                "cycles_completed": stats.cycles_completed,
                "cycles_failed": stats.cycles_failed,
                "cycles_skipped": stats.cycles_skipped
            })
        }
        None => Value::Null,
    };

    (
        StatusCode::OK,
        Json(json!({
            "status": "ok",
            "sync_mode": match state.sync_mode {
                SyncMode::Embedded => "embedded",
                SyncMode::Managed => "managed",
            },
            "sync": sync
        })),
    )
}

pub async fn list_items(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> Result<Json<Vec<Item>>, ApiError> {
    let items = state.items.find(&query.into_filter()).await?;
    Ok(Json(items))
}

/// First item matching the same filters as `GET /items`.
pub async fn first_item(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> Result<Json<Item>, ApiError> {
    let item = state.items.find_first(&query.into_filter()).await?;
    item.map(Json).ok_or(ApiError::NoMatch)
}

pub async fn create_item(
    State(state): State<AppState>,
    Json(draft): Json<ItemDraft>,
) -> Result<(StatusCode, Json<Item>), ApiError> {
    let item = state.items.create(draft).await?;
    info!(id = %item.id, "Item created");
    Ok((StatusCode::CREATED, Json(item)))
}

pub async fn get_item(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(query): Query<PartitionQuery>,
) -> Result<Json<Item>, ApiError> {
    let item = state
        .items
        .get(&id, query.partition_key.as_deref())
        .await?;
    Ok(Json(item))
}

pub async fn replace_item(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(draft): Json<ItemDraft>,
) -> Result<Json<Item>, ApiError> {
    let item = state.items.replace(&id, draft).await?;
    Ok(Json(item))
}

pub async fn complete_item(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(query): Query<PartitionQuery>,
) -> Result<Json<Item>, ApiError> {
    let item = state
        .items
        .complete(&id, query.partition_key.as_deref())
        .await?;
    Ok(Json(item))
}

pub async fn delete_item(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(query): Query<PartitionQuery>,
) -> Result<StatusCode, ApiError> {
    state
        .items
        .delete(&id, query.partition_key.as_deref())
        .await?;
    info!(id = %id, "Item deleted");
    Ok(StatusCode::NO_CONTENT)
}

/// Full-text search. A missing or blank `q` matches every item.
pub async fn search_items(
    State(state): State<AppState>,
    Query(query): Query<TextQuery>,
) -> Result<Json<ItemSearchResults>, ApiError> {
    let results = state.search.search(&query.q).await?;
    Ok(Json(results))
}

/// Title suggestions for a typed prefix.
pub async fn suggest_titles(
    State(state): State<AppState>,
    Query(query): Query<TextQuery>,
) -> Result<Json<Vec<String>>, ApiError> {
    let suggestions = state.search.suggest(&query.q).await?;
    Ok(Json(suggestions))
}

/// Bring the index up to date now.
///
/// Embedded mode runs a sync cycle and answers with its report; managed
/// mode asks the search service to run its indexer and answers 202.
pub async fn trigger_sync(
    State(state): State<AppState>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    match &state.sync {
        Some(handle) => {
            let report = handle.run_now().await?;
            Ok((
                StatusCode::OK,
                Json(json!({
                    "status": "success",
                    "mode": "embedded",
                    "report": report_json(&report)
                })),
            ))
        }
        None => {
            state.search.run_indexer().await?;
            Ok((
                StatusCode::ACCEPTED,
                Json(json!({
                    "status": "accepted",
                    "mode": "managed"
                })),
            ))
        }
    }
}

/// Drop every search resource, provision it again and repopulate the index.
pub async fn reset_search(State(state): State<AppState>) -> Result<Json<Value>, ApiError> {
    info!("Resetting search resources");
    state.search.delete_all().await?;

    if let Some(handle) = &state.sync {
        handle.coordinator().reset_state().await?;
    }

    let provisioning = state.provision_search().await?;

    let report = match &state.sync {
        Some(handle) => Some(report_json(&handle.run_now().await?)),
        None => {
            state.search.run_indexer().await?;
            None
        }
    };

    Ok(Json(json!({
        "status": "success",
        "provisioning": provisioning_json(&provisioning),
        "report": report
    })))
}
