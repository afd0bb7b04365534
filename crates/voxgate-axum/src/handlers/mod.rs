//! HTTP request handlers for the Axum web server.
//!
//! Each submodule contains handlers for one API area.

pub mod media_library;
pub mod prompt;
pub mod system;
pub mod tokens;
pub mod voice;
pub mod voice_signal;
