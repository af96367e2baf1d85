pub mod auth;
pub mod comment;
pub mod completions;
pub mod project;
pub mod react;
pub mod task;

/// `2025-03-01 09:00` in UTC, for human output.
pub fn short_time(at: chrono::DateTime<chrono::Utc>) -> String {
    at.format("%Y-%m-%d %H:%M").to_string()
}
