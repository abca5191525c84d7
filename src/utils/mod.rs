//! Utility modules

pub mod string;

pub use string::{truncate_str, truncate_with_suffix, LOG_PREVIEW_CHARS};
