//! Media library domain: favorited images and videos.

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

use crate::error::CoreError;

/// Longest prompt kept on an item, in characters.
pub const MAX_PROMPT_CHARS: usize = 4000;

/// Default and maximum page sizes for listing.
pub const DEFAULT_PAGE_SIZE: u32 = 60;
pub const MAX_PAGE_SIZE: u32 = 200;

/// Kind of media an item points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaType {
    Image,
    Video,
}

impl MediaType {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Image => "image",
            Self::Video => "video",
        }
    }

    /// Parse a user-supplied media type (trimmed, case-insensitive).
    pub fn parse(raw: &str) -> Result<Self, CoreError> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "image" => Ok(Self::Image),
            "video" => Ok(Self::Video),
            _ => Err(CoreError::validation("media_type must be image or video")),
        }
    }
}

impl fmt::Display for MediaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One stored media library entry.
///
/// Decoding is forgiving: explicit nulls read as the field default and
/// fields this version does not know about are carried in `other` so a
/// rewrite of the document keeps them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaItem {
    pub id: String,
    pub media_type: MediaType,
    #[serde(default, deserialize_with = "null_as_default")]
    pub created_at: i64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub updated_at: i64,
    #[serde(default = "default_favorite", deserialize_with = "null_as_favorite")]
    pub favorite: bool,
    #[serde(default, deserialize_with = "null_as_default")]
    pub prompt: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub parent_post_id: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub source_image_url: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub image_url: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub video_url: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub derived_from_id: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub extra: Map<String, Value>,
    #[serde(flatten)]
    pub other: Map<String, Value>,
}

const fn default_favorite() -> bool {
    true
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

fn null_as_favorite<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<bool>::deserialize(deserializer)?.unwrap_or_else(default_favorite))
}

impl MediaItem {
    /// Key used to spot near-duplicate favorites. Never persisted.
    ///
    /// Preference: parent post id, then video URL (videos only), then image
    /// URL, then the item id itself.
    #[must_use]
    pub fn identity_key(&self) -> String {
        let media_type = self.media_type.as_str();
        if !self.parent_post_id.is_empty() {
            return format!("{media_type}:pp:{}", self.parent_post_id);
        }
        if self.media_type == MediaType::Video && !self.video_url.is_empty() {
            return format!("{media_type}:v:{}", self.video_url);
        }
        if !self.image_url.is_empty() {
            return format!("{media_type}:i:{}", self.image_url);
        }
        format!("{media_type}:id:{}", self.id)
    }

    /// Advance `updated_at` so it strictly increases even within one millisecond.
    pub fn touch(&mut self, now_ms: i64) {
        self.updated_at = now_ms.max(self.updated_at.saturating_add(1));
    }

    /// Fold a duplicate favorite into this item.
    ///
    /// Re-favorites, fills only fields that are still empty and shallow-merges
    /// `extra`. Identity fields and `created_at` stay untouched.
    pub fn merge_duplicate(&mut self, incoming: &Self, now_ms: i64) {
        self.favorite = true;
        self.touch(now_ms);
        fill_if_blank(&mut self.prompt, &incoming.prompt);
        fill_if_blank(&mut self.source_image_url, &incoming.source_image_url);
        fill_if_blank(&mut self.derived_from_id, &incoming.derived_from_id);
        for (key, value) in &incoming.extra {
            self.extra.insert(key.clone(), value.clone());
        }
    }

    /// Re-favorite with the same id: descriptive fields are replaced wholesale.
    ///
    /// Unknown stored fields in `other` are kept.
    pub fn overwrite_from(&mut self, incoming: Self, now_ms: i64) {
        self.media_type = incoming.media_type;
        self.favorite = true;
        self.touch(now_ms);
        self.prompt = incoming.prompt;
        self.parent_post_id = incoming.parent_post_id;
        self.source_image_url = incoming.source_image_url;
        self.image_url = incoming.image_url;
        self.video_url = incoming.video_url;
        self.derived_from_id = incoming.derived_from_id;
        self.extra = incoming.extra;
    }
}

fn fill_if_blank(target: &mut String, candidate: &str) {
    if target.trim().is_empty() && !candidate.is_empty() {
        candidate.clone_into(target);
    }
}

/// Body of a favorite request, before normalization.
#[derive(Debug, Clone, Deserialize)]
pub struct FavoriteRequest {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default = "default_media_type")]
    pub media_type: String,
    #[serde(default)]
    pub prompt: Option<String>,
    #[serde(default)]
    pub parent_post_id: Option<String>,
    #[serde(default)]
    pub source_image_url: Option<String>,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub video_url: Option<String>,
    #[serde(default)]
    pub derived_from_id: Option<String>,
    #[serde(default)]
    pub extra: Option<Value>,
}

fn default_media_type() -> String {
    "image".to_string()
}

impl Default for FavoriteRequest {
    fn default() -> Self {
        Self {
            id: None,
            media_type: default_media_type(),
            prompt: None,
            parent_post_id: None,
            source_image_url: None,
            image_url: None,
            video_url: None,
            derived_from_id: None,
            extra: None,
        }
    }
}

impl FavoriteRequest {
    /// Validate and normalize into a fresh item stamped with `now_ms`.
    pub fn into_item(self, now_ms: i64) -> Result<MediaItem, CoreError> {
        let media_type = MediaType::parse(&self.media_type)?;
        let parent_post_id = validate_parent_post_id(self.parent_post_id.as_deref())?;
        let image_url = trimmed(self.image_url.as_deref());
        let video_url = trimmed(self.video_url.as_deref());

        match media_type {
            MediaType::Image if parent_post_id.is_empty() && image_url.is_empty() => {
                return Err(CoreError::validation(
                    "image favorite requires parent_post_id or image_url",
                ));
            }
            MediaType::Video if video_url.is_empty() => {
                return Err(CoreError::validation("video favorite requires video_url"));
            }
            _ => {}
        }

        let extra = match self.extra {
            None | Some(Value::Null) => Map::new(),
            Some(Value::Object(map)) => map,
            Some(_) => return Err(CoreError::validation("extra must be an object")),
        };

        let id = Some(trimmed(self.id.as_deref()))
            .filter(|id| !id.is_empty())
            .unwrap_or_else(|| uuid::Uuid::new_v4().simple().to_string());

        Ok(MediaItem {
            id,
            media_type,
            created_at: now_ms,
            updated_at: now_ms,
            favorite: true,
            prompt: normalize_prompt(self.prompt.as_deref()),
            parent_post_id,
            source_image_url: trimmed(self.source_image_url.as_deref()),
            image_url,
            video_url,
            derived_from_id: trimmed(self.derived_from_id.as_deref()),
            extra,
            other: Map::new(),
        })
    }
}

fn trimmed(value: Option<&str>) -> String {
    value.unwrap_or_default().trim().to_string()
}

fn normalize_prompt(value: Option<&str>) -> String {
    let raw = value.unwrap_or_default().trim();
    raw.chars().take(MAX_PROMPT_CHARS).collect()
}

/// Parent post ids are UUID-ish: 32-36 hex digits and dashes.
fn validate_parent_post_id(value: Option<&str>) -> Result<String, CoreError> {
    let raw = value.unwrap_or_default().trim();
    if raw.is_empty() {
        return Ok(String::new());
    }
    let well_formed = (32..=36).contains(&raw.len())
        && raw.chars().all(|c| c.is_ascii_hexdigit() || c == '-');
    if well_formed {
        Ok(raw.to_string())
    } else {
        Err(CoreError::validation("parent_post_id format is invalid"))
    }
}

/// Listing filters as received from the query string.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ListQuery {
    #[serde(default)]
    pub page: Option<u32>,
    #[serde(default)]
    pub page_size: Option<u32>,
    #[serde(default)]
    pub media_type: Option<String>,
    #[serde(default)]
    pub favorite_only: Option<bool>,
    #[serde(default)]
    pub q: Option<String>,
}

/// One page of listing results.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MediaPage {
    pub page: u32,
    pub page_size: u32,
    pub total: usize,
    pub items: Vec<MediaItem>,
}

impl ListQuery {
    /// Filter, sort (newest first) and paginate `items`.
    pub fn apply(&self, items: Vec<MediaItem>) -> Result<MediaPage, CoreError> {
        let page = self.page.unwrap_or(1).max(1);
        let page_size = self
            .page_size
            .unwrap_or(DEFAULT_PAGE_SIZE)
            .clamp(1, MAX_PAGE_SIZE);
        let media_type = match self.media_type.as_deref().map(str::trim) {
            Some(raw) if !raw.is_empty() => Some(MediaType::parse(raw)?),
            _ => None,
        };
        let favorite_only = self.favorite_only.unwrap_or(true);
        let keyword = self
            .q
            .as_deref()
            .map(|q| q.trim().to_lowercase())
            .unwrap_or_default();

        let mut filtered: Vec<MediaItem> = items
            .into_iter()
            .filter(|item| media_type.is_none_or(|t| item.media_type == t))
            .filter(|item| !favorite_only || item.favorite)
            .filter(|item| keyword.is_empty() || item.prompt.to_lowercase().contains(&keyword))
            .collect();
        filtered.sort_by(|a, b| b.created_at.cmp(&a.created_at));

        let total = filtered.len();
        let start = (page as usize - 1).saturating_mul(page_size as usize);
        let items = filtered
            .into_iter()
            .skip(start)
            .take(page_size as usize)
            .collect();

        Ok(MediaPage {
            page,
            page_size,
            total,
            items,
        })
    }
}
