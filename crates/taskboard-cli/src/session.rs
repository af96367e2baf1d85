//! Session token resolution for CLI commands.
//!
//! The resolution chain: `--session` flag > `TASKBOARD_SESSION` env > the
//! session file written by `tb login` / `tb register`.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};
use taskboard_core::model::User;

/// Contents of the session file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SavedSession {
    pub token: String,
    pub user: User,
}

/// Environment reader for dependency injection in tests.
trait EnvReader {
    fn get(&self, key: &str) -> Option<String>;
}

struct RealEnv;

impl EnvReader for RealEnv {
    fn get(&self, key: &str) -> Option<String> {
        env::var(key).ok().filter(|v| !v.is_empty())
    }
}

fn resolve_token_with(
    cli_flag: Option<&str>,
    env: &dyn EnvReader,
    saved: impl FnOnce() -> Option<SavedSession>,
) -> Option<String> {
    if let Some(token) = cli_flag.filter(|t| !t.is_empty()) {
        return Some(token.to_string());
    }
    if let Some(token) = env.get("TASKBOARD_SESSION") {
        return Some(token);
    }
    saved().map(|s| s.token)
}

/// Resolve the session token, or `None` when signed out.
pub fn resolve_token(cli_flag: Option<&str>) -> Option<String> {
    resolve_token_with(cli_flag, &RealEnv, || {
        session_path().and_then(|path| load_session(&path).ok().flatten())
    })
}

/// `<config_dir>/taskboard/session.json`.
pub fn session_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("taskboard/session.json"))
}

/// # Errors
///
/// Returns an error if the file exists but cannot be read or parsed.
pub fn load_session(path: &Path) -> Result<Option<SavedSession>> {
    if !path.exists() {
        return Ok(None);
    }
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("read session file {}", path.display()))?;
    let session = serde_json::from_str(&raw)
        .with_context(|| format!("parse session file {}", path.display()))?;
    Ok(Some(session))
}

/// # Errors
///
/// Returns an error if the file or its directory cannot be written.
pub fn save_session(path: &Path, session: &SavedSession) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("create {}", parent.display()))?;
    }
    let raw = serde_json::to_string_pretty(session)?;
    std::fs::write(path, raw).with_context(|| format!("write session file {}", path.display()))?;
    tracing::debug!(path = %path.display(), "saved session");
    Ok(())
}

/// Remove the session file. Returns whether one existed.
///
/// # Errors
///
/// Returns an error if the file exists but cannot be removed.
pub fn clear_session(path: &Path) -> Result<bool> {
    if !path.exists() {
        return Ok(false);
    }
    std::fs::remove_file(path).with_context(|| format!("remove {}", path.display()))?;
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    struct MockEnv {
        vars: HashMap<String, String>,
    }

    impl MockEnv {
        fn new() -> Self {
            Self {
                vars: HashMap::new(),
            }
        }

        fn var(mut self, key: &str, val: &str) -> Self {
            self.vars.insert(key.to_string(), val.to_string());
            self
        }
    }

    impl EnvReader for MockEnv {
        fn get(&self, key: &str) -> Option<String> {
            self.vars.get(key).filter(|v| !v.is_empty()).cloned()
        }
    }

    fn saved(token: &str) -> SavedSession {
        SavedSession {
            token: token.into(),
            user: User {
                id: "u1".into(),
                name: "Ada".into(),
                email: "ada@example.com".into(),
            },
        }
    }

    #[test]
    fn cli_flag_takes_priority() {
        let env = MockEnv::new().var("TASKBOARD_SESSION", "from-env");
        let token = resolve_token_with(Some("from-flag"), &env, || Some(saved("from-file")));
        assert_eq!(token.as_deref(), Some("from-flag"));
    }

    #[test]
    fn env_beats_session_file() {
        let env = MockEnv::new().var("TASKBOARD_SESSION", "from-env");
        let token = resolve_token_with(None, &env, || Some(saved("from-file")));
        assert_eq!(token.as_deref(), Some("from-env"));
    }

    #[test]
    fn empty_values_fall_through_to_file() {
        let env = MockEnv::new().var("TASKBOARD_SESSION", "");
        let token = resolve_token_with(Some(""), &env, || Some(saved("from-file")));
        assert_eq!(token.as_deref(), Some("from-file"));
        assert_eq!(resolve_token_with(None, &MockEnv::new(), || None), None);
    }

    #[test]
    fn session_file_round_trips_and_clears() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("taskboard/session.json");

        assert_eq!(load_session(&path).unwrap(), None);
        save_session(&path, &saved("tok")).unwrap();
        assert_eq!(load_session(&path).unwrap(), Some(saved("tok")));

        assert!(clear_session(&path).unwrap());
        assert!(!clear_session(&path).unwrap());
    }
}
