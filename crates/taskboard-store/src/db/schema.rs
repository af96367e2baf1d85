//! SQLite schema for the taskboard store.
//!
//! - `users` / `sessions` identify the caller; session tokens are stored as
//!   SHA-256 digests only
//! - `projects` → `tasks` → `comments` → `reactions`, each owned by a user and
//!   deleted in cascade with its parent
//! - `comments.parent_id` links a reply to its top-level comment
//! - `reactions` holds one row per (comment, user, emoji); aggregates are
//!   computed on read and never stored
//! - `store_meta` records the applied schema version
//!
//! Timestamps are integer microseconds since the Unix epoch (`*_at_us`).

/// Migration v1: core tables plus store metadata.
pub const MIGRATION_V1_SQL: &str = r"
CREATE TABLE IF NOT EXISTS users (
    user_id TEXT PRIMARY KEY,
    name TEXT NOT NULL DEFAULT '',
    email TEXT NOT NULL UNIQUE CHECK (length(trim(email)) > 0),
    created_at_us INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS sessions (
    token_hash TEXT PRIMARY KEY,
    user_id TEXT NOT NULL REFERENCES users(user_id) ON DELETE CASCADE,
    created_at_us INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS projects (
    project_id TEXT PRIMARY KEY,
    name TEXT NOT NULL CHECK (length(trim(name)) > 0),
    description TEXT,
    user_id TEXT NOT NULL REFERENCES users(user_id) ON DELETE CASCADE,
    created_at_us INTEGER NOT NULL,
    updated_at_us INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS tasks (
    task_id TEXT PRIMARY KEY,
    project_id TEXT NOT NULL REFERENCES projects(project_id) ON DELETE CASCADE,
    user_id TEXT NOT NULL REFERENCES users(user_id) ON DELETE CASCADE,
    title TEXT NOT NULL CHECK (length(trim(title)) > 0),
    description TEXT,
    status TEXT NOT NULL DEFAULT 'TODO'
        CHECK (status IN ('TODO', 'IN_PROGRESS', 'DONE', 'CANCELLED')),
    priority TEXT NOT NULL DEFAULT 'MEDIUM'
        CHECK (priority IN ('LOW', 'MEDIUM', 'HIGH', 'URGENT')),
    due_date TEXT,
    created_at_us INTEGER NOT NULL,
    updated_at_us INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS comments (
    comment_id TEXT PRIMARY KEY,
    task_id TEXT NOT NULL REFERENCES tasks(task_id) ON DELETE CASCADE,
    user_id TEXT NOT NULL REFERENCES users(user_id) ON DELETE CASCADE,
    parent_id TEXT REFERENCES comments(comment_id) ON DELETE CASCADE,
    content TEXT NOT NULL CHECK (length(trim(content)) > 0),
    created_at_us INTEGER NOT NULL,
    updated_at_us INTEGER NOT NULL,
    CHECK (parent_id IS NULL OR parent_id <> comment_id)
);

CREATE TABLE IF NOT EXISTS reactions (
    reaction_id TEXT PRIMARY KEY,
    comment_id TEXT NOT NULL REFERENCES comments(comment_id) ON DELETE CASCADE,
    user_id TEXT NOT NULL REFERENCES users(user_id) ON DELETE CASCADE,
    emoji TEXT NOT NULL CHECK (length(trim(emoji)) > 0),
    created_at_us INTEGER NOT NULL,
    UNIQUE (comment_id, user_id, emoji)
);

CREATE TABLE IF NOT EXISTS store_meta (
    id INTEGER PRIMARY KEY CHECK (id = 1),
    schema_version INTEGER NOT NULL,
    created_at_us INTEGER NOT NULL DEFAULT 0
);

INSERT OR IGNORE INTO store_meta (id, schema_version, created_at_us)
VALUES (1, 1, 0);
";

/// Migration v2: read-path indexes.
pub const MIGRATION_V2_SQL: &str = r"
CREATE INDEX IF NOT EXISTS idx_sessions_user
    ON sessions(user_id);

CREATE INDEX IF NOT EXISTS idx_projects_user_updated
    ON projects(user_id, updated_at_us DESC);

CREATE INDEX IF NOT EXISTS idx_tasks_project_created
    ON tasks(project_id, created_at_us DESC);

CREATE INDEX IF NOT EXISTS idx_comments_task_parent_created
    ON comments(task_id, parent_id, created_at_us);

CREATE INDEX IF NOT EXISTS idx_comments_parent
    ON comments(parent_id);

CREATE INDEX IF NOT EXISTS idx_reactions_comment_created
    ON reactions(comment_id, created_at_us);
";

/// Indexes every fully migrated store must have.
pub const REQUIRED_INDEXES: &[&str] = &[
    "idx_sessions_user",
    "idx_projects_user_updated",
    "idx_tasks_project_created",
    "idx_comments_task_parent_created",
    "idx_comments_parent",
    "idx_reactions_comment_created",
];
