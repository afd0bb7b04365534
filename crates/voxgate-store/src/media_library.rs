//! Media library: favorited images and videos in one locked document.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tracing::info;
use voxgate_core::utils::now_ms;
use voxgate_core::{CoreError, Document, FavoriteRequest, ListQuery, MediaItem, MediaPage};

use crate::store::DocumentStore;

/// Document key holding the media library.
pub const MEDIA_LIBRARY_KEY: &str = "media_library";

/// How a favorite request landed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FavoriteKind {
    Created,
    /// Same id already stored; descriptive fields replaced.
    Updated,
    /// Another item had the same identity key and absorbed this one.
    Deduped,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FavoriteOutcome {
    pub item: MediaItem,
    pub kind: FavoriteKind,
}

/// Media library service over a [`DocumentStore`].
#[derive(Debug, Clone)]
pub struct MediaLibrary {
    store: Arc<DocumentStore>,
    lock_timeout: Duration,
}

fn required_id(id: &str) -> Result<&str, CoreError> {
    let id = id.trim();
    if id.is_empty() {
        Err(CoreError::validation("id is required"))
    } else {
        Ok(id)
    }
}

fn not_found(id: &str) -> CoreError {
    CoreError::NotFound(format!("media item '{id}'"))
}

impl MediaLibrary {
    pub const fn new(store: Arc<DocumentStore>, lock_timeout: Duration) -> Self {
        Self {
            store,
            lock_timeout,
        }
    }

    /// Favorite an item, merging into an existing one when the identity key matches.
    pub async fn favorite(&self, request: FavoriteRequest) -> Result<FavoriteOutcome, CoreError> {
        let incoming = request.into_item(now_ms())?;

        let outcome = self
            .store
            .update(
                MEDIA_LIBRARY_KEY,
                self.lock_timeout,
                |doc: &mut Document<MediaItem>| {
                    let now = now_ms();
                    let identity = incoming.identity_key();

                    // The first item holding an identity key owns it.
                    let owner = doc
                        .items
                        .iter()
                        .position(|item| !item.id.is_empty() && item.identity_key() == identity);
                    if let Some(idx) = owner
                        && doc.items[idx].id != incoming.id
                    {
                        let existing = &mut doc.items[idx];
                        existing.merge_duplicate(&incoming, now);
                        return Ok::<_, CoreError>(FavoriteOutcome {
                            item: existing.clone(),
                            kind: FavoriteKind::Deduped,
                        });
                    }

                    if let Some(existing) = doc.items.iter_mut().find(|item| item.id == incoming.id)
                    {
                        existing.overwrite_from(incoming.clone(), now);
                        return Ok(FavoriteOutcome {
                            item: existing.clone(),
                            kind: FavoriteKind::Updated,
                        });
                    }

                    doc.items.push(incoming.clone());
                    Ok(FavoriteOutcome {
                        item: incoming.clone(),
                        kind: FavoriteKind::Created,
                    })
                },
            )
            .await?;

        info!(
            id = %outcome.item.id,
            media_type = %outcome.item.media_type,
            kind = ?outcome.kind,
            "Media item favorited"
        );
        Ok(outcome)
    }

    /// Clear the favorite flag on an item.
    pub async fn unfavorite(&self, id: &str) -> Result<MediaItem, CoreError> {
        let id = required_id(id)?;
        self.store
            .update(
                MEDIA_LIBRARY_KEY,
                self.lock_timeout,
                |doc: &mut Document<MediaItem>| {
                    let item = doc
                        .items
                        .iter_mut()
                        .find(|item| item.id == id)
                        .ok_or_else(|| not_found(id))?;
                    item.favorite = false;
                    item.touch(now_ms());
                    Ok::<_, CoreError>(item.clone())
                },
            )
            .await
    }

    /// Read one item without taking the lock.
    pub async fn get(&self, id: &str) -> Result<MediaItem, CoreError> {
        let id = required_id(id)?;
        let doc: Document<MediaItem> = self.store.load(MEDIA_LIBRARY_KEY).await?;
        doc.items
            .into_iter()
            .find(|item| item.id == id)
            .ok_or_else(|| not_found(id))
    }

    /// Remove an item, returning what was removed.
    pub async fn delete(&self, id: &str) -> Result<MediaItem, CoreError> {
        let id = required_id(id)?;
        let removed = self
            .store
            .update(
                MEDIA_LIBRARY_KEY,
                self.lock_timeout,
                |doc: &mut Document<MediaItem>| {
                    let idx = doc
                        .items
                        .iter()
                        .position(|item| item.id == id)
                        .ok_or_else(|| not_found(id))?;
                    Ok::<_, CoreError>(doc.items.remove(idx))
                },
            )
            .await?;
        info!(id = %removed.id, "Media item deleted");
        Ok(removed)
    }

    pub async fn list(&self, query: &ListQuery) -> Result<MediaPage, CoreError> {
        let doc: Document<MediaItem> = self.store.load(MEDIA_LIBRARY_KEY).await?;
        query.apply(doc.items)
    }
}
