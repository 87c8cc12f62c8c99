//! Common utilities and helper functions
//!
//! This module provides shared utilities used across the application.

pub mod error;

use regex::Regex;
use std::path::PathBuf;
use std::sync::OnceLock;

/// Name of the cache dump file placed in the user's home directory
pub const DUMP_FILE_NAME: &str = ".chandere";

/// Default cache dump location, `~/.chandere`
pub fn default_dump_file() -> Option<PathBuf> {
    directories::BaseDirs::new().map(|dirs| dirs.home_dir().join(DUMP_FILE_NAME))
}

/// Sanitize filename by removing characters that are invalid on common filesystems
pub fn sanitize_filename(filename: &str) -> String {
    static INVALID_CHARS: OnceLock<Regex> = OnceLock::new();

    let re = INVALID_CHARS
        .get_or_init(|| Regex::new(r#"[<>:"/\\|?*\x00-\x1f]"#).expect("Invalid regex pattern"));

    let cleaned = re.replace_all(filename.trim(), "_").to_string();
    if cleaned.is_empty() || cleaned == "." || cleaned == ".." {
        String::from("_")
    } else {
        cleaned
    }
}

/// Format byte size as human-readable string
pub fn format_bytes(bytes: u64) -> String {
    const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB"];

    if bytes == 0 {
        return String::from("0 B");
    }

    let base: f64 = 1024.0;
    let exponent = (bytes as f64).log(base).floor() as usize;
    let exponent = exponent.min(UNITS.len() - 1);

    let value = bytes as f64 / base.powi(exponent as i32);

    format!("{value:.2} {}", UNITS[exponent])
}
