//! Core domain types.
//!
//! Pure data plus the normalization rules that go with it. Nothing here
//! touches the network or the filesystem.
//!
//! # Structure
//!
//! - `document` - Versioned `{version, items}` envelope
//! - `media` - Media library items, favorite requests and listing
//! - `token` - Credential health signals reported by callers
//! - `task` - Stop outcomes for cancellable tasks
//! - `frame` - Relay frames
//! - `voice` - Voice token connection details and signaling URLs
//! - `chat` - Chat completion request/response helpers

pub mod chat;
pub mod document;
pub mod frame;
pub mod media;
pub mod task;
pub mod token;
pub mod voice;

pub use chat::{ChatCompletionRequest, ChatMessage};
pub use document::{DOCUMENT_VERSION, Document};
pub use frame::Frame;
pub use media::{FavoriteRequest, ListQuery, MediaItem, MediaPage, MediaType};
pub use task::StopStatus;
pub use token::{TokenHealth, TokenSignal};
pub use voice::{IceServer, VoiceConnectionInfo, VoiceTokenGrant, VoiceTokenParams};
