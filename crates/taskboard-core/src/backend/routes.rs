//! REST paths, relative to the server base URL.

use crate::model::SortOrder;

pub const SESSION: &str = "/api/session";
pub const PROJECTS: &str = "/api/projects";

#[must_use]
pub fn project(project_id: &str) -> String {
    format!("{PROJECTS}/{}", segment(project_id))
}

#[must_use]
pub fn project_tasks(project_id: &str) -> String {
    format!("{}/tasks", project(project_id))
}

#[must_use]
pub fn task(project_id: &str, task_id: &str) -> String {
    format!("{}/{}", project_tasks(project_id), segment(task_id))
}

#[must_use]
pub fn task_comments(project_id: &str, task_id: &str) -> String {
    format!("{}/comments", task(project_id, task_id))
}

#[must_use]
pub fn task_comments_sorted(project_id: &str, task_id: &str, sort: SortOrder) -> String {
    format!("{}?sort={sort}", task_comments(project_id, task_id))
}

#[must_use]
pub fn task_comment(project_id: &str, task_id: &str, comment_id: &str) -> String {
    format!(
        "{}/{}",
        task_comments(project_id, task_id),
        segment(comment_id)
    )
}

#[must_use]
pub fn comment_reactions(project_id: &str, task_id: &str, comment_id: &str) -> String {
    format!("{}/reactions", task_comment(project_id, task_id, comment_id))
}

/// Percent-encode everything outside the RFC 3986 unreserved set.
fn segment(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for byte in raw.bytes() {
        if byte.is_ascii_alphanumeric() || matches!(byte, b'-' | b'_' | b'.' | b'~') {
            out.push(char::from(byte));
        } else {
            out.push_str(&format!("%{byte:02X}"));
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nested_paths() {
        assert_eq!(project("p1"), "/api/projects/p1");
        assert_eq!(task("p1", "t1"), "/api/projects/p1/tasks/t1");
        assert_eq!(
            task_comments_sorted("p1", "t1", SortOrder::Asc),
            "/api/projects/p1/tasks/t1/comments?sort=asc"
        );
        assert_eq!(
            comment_reactions("p1", "t1", "c1"),
            "/api/projects/p1/tasks/t1/comments/c1/reactions"
        );
    }

    #[test]
    fn ids_are_escaped() {
        assert_eq!(project("a/b c"), "/api/projects/a%2Fb%20c");
    }
}
