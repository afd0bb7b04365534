//! Media library handlers.
//!
//! Mutations go through [`MediaLibrary`](voxgate_store::MediaLibrary), which
//! holds the document lock for each read-modify-write cycle.

use axum::Json;
use axum::extract::{Query, State};
use serde::{Deserialize, Serialize};
use voxgate_core::{FavoriteRequest, ListQuery, MediaItem, MediaPage};
use voxgate_store::FavoriteKind;

use crate::error::HttpError;
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct IdQuery {
    #[serde(default)]
    pub id: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct UnfavoriteRequest {
    #[serde(default)]
    pub id: String,
}

#[derive(Debug, Serialize)]
pub struct ItemResponse {
    pub status: &'static str,
    pub item: MediaItem,
}

impl ItemResponse {
    const fn success(item: MediaItem) -> Self {
        Self {
            status: "success",
            item,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct FavoriteResponse {
    pub status: &'static str,
    pub item: MediaItem,
    pub result: FavoriteKind,
    /// Merged into an existing item with the same identity key.
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub deduped: bool,
    /// Replaced an item with the same id.
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub updated: bool,
}

#[derive(Debug, Serialize)]
pub struct DeleteResponse {
    pub status: &'static str,
    pub removed: MediaItem,
}

#[derive(Debug, Serialize)]
pub struct ListResponse {
    pub status: &'static str,
    #[serde(flatten)]
    pub page: MediaPage,
}

/// Favorite an image or video.
pub async fn favorite(
    State(state): State<AppState>,
    Json(request): Json<FavoriteRequest>,
) -> Result<Json<FavoriteResponse>, HttpError> {
    let outcome = state.media.favorite(request).await?;
    Ok(Json(FavoriteResponse {
        status: "success",
        deduped: outcome.kind == FavoriteKind::Deduped,
        updated: outcome.kind == FavoriteKind::Updated,
        result: outcome.kind,
        item: outcome.item,
    }))
}

pub async fn unfavorite(
    State(state): State<AppState>,
    Json(request): Json<UnfavoriteRequest>,
) -> Result<Json<ItemResponse>, HttpError> {
    let item = state.media.unfavorite(&request.id).await?;
    Ok(Json(ItemResponse::success(item)))
}

pub async fn get(
    State(state): State<AppState>,
    Query(query): Query<IdQuery>,
) -> Result<Json<ItemResponse>, HttpError> {
    let item = state.media.get(&query.id).await?;
    Ok(Json(ItemResponse::success(item)))
}

pub async fn delete(
    State(state): State<AppState>,
    Query(query): Query<IdQuery>,
) -> Result<Json<DeleteResponse>, HttpError> {
    let removed = state.media.delete(&query.id).await?;
    Ok(Json(DeleteResponse {
        status: "success",
        removed,
    }))
}

/// Filtered, newest-first page of the library.
pub async fn list(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> Result<Json<ListResponse>, HttpError> {
    let page = state.media.list(&query).await?;
    Ok(Json(ListResponse {
        status: "success",
        page,
    }))
}
