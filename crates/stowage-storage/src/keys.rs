//! Shared key generation for storage drivers.
//!
//! Key format: `{user_id}/{yyyy}/{mm}/{random}_{file_name}`.

use chrono::{Datelike, Utc};
use uuid::Uuid;

/// Generate a fresh physical key for a file owned by `user_id`.
///
/// Every call returns a new key, so content written under it never collides with
/// an object another record still references.
pub fn generate_save_key(user_id: u64, file_name: &str) -> String {
    let now = Utc::now();
    let random = Uuid::new_v4().simple().to_string();
    format!(
        "{}/{:04}/{:02}/{}_{}",
        user_id,
        now.year(),
        now.month(),
        &random[..16],
        sanitize(file_name)
    )
}

fn sanitize(file_name: &str) -> String {
    let cleaned: String = file_name
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '\0' => '_',
            c => c,
        })
        .collect();
    let cleaned = cleaned.replace("..", "_");
    if cleaned.is_empty() {
        "file".to_string()
    } else {
        cleaned
    }
}
