//! Pure helpers shared by the adapter crates.

pub mod json_path;
pub mod mask;
pub mod time;

pub use json_path::{deep_get, first_string};
pub use mask::{mask_secret, mask_url};
pub use time::now_ms;
