use rusqlite::{OptionalExtension, params};
use sha2::{Digest, Sha256};
use std::fmt::Write as _;
use taskboard_core::model::User;

use super::{Store, new_id, user_from_row, validate};
use crate::error::ServiceError;

/// Opaque session token: 256 bits of randomness as lowercase hex.
fn issue_token() -> String {
    let a = uuid::Uuid::new_v4();
    let b = uuid::Uuid::new_v4();
    format!("{}{}", a.simple(), b.simple())
}

/// Tokens are only ever stored as their SHA-256 digest.
fn token_hash(token: &str) -> String {
    let digest = Sha256::digest(token.as_bytes());
    let mut out = String::with_capacity(digest.len() * 2);
    for byte in digest {
        let _ = write!(out, "{byte:02x}");
    }
    out
}

impl Store {
    /// Create an account and open a session for it.
    ///
    /// # Errors
    ///
    /// Fails validation when the email is malformed or already registered.
    pub fn register(&self, name: &str, email: &str) -> Result<(User, String), ServiceError> {
        let email = validate::required(email, "Email is required")?.to_lowercase();
        if !email.contains('@') {
            return Err(ServiceError::invalid("Valid email is required"));
        }
        let taken = self
            .conn
            .query_row("SELECT 1 FROM users WHERE email = ?1", [&email], |_| Ok(()))
            .optional()?
            .is_some();
        if taken {
            return Err(ServiceError::invalid("Email already registered"));
        }

        let user = User {
            id: new_id(),
            name: name.trim().to_string(),
            email,
        };
        self.conn.execute(
            "INSERT INTO users (user_id, name, email, created_at_us) VALUES (?1, ?2, ?3, ?4)",
            params![user.id, user.name, user.email, self.now_us()],
        )?;
        tracing::info!(user_id = %user.id, "registered user");

        let token = self.open_session(&user.id)?;
        Ok((user, token))
    }

    /// Open a new session for an existing account.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError::Unauthorized`] for an unknown email.
    pub fn login(&self, email: &str) -> Result<(User, String), ServiceError> {
        let email = email.trim().to_lowercase();
        let user = self
            .conn
            .query_row(
                "SELECT user_id, name, email FROM users WHERE email = ?1",
                [&email],
                |row| user_from_row(row, 0),
            )
            .optional()?
            .ok_or(ServiceError::Unauthorized)?;
        let token = self.open_session(&user.id)?;
        Ok((user, token))
    }

    /// The user a session token belongs to.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError::Unauthorized`] for an unknown or revoked token.
    pub fn authenticate(&self, token: &str) -> Result<User, ServiceError> {
        self.conn
            .query_row(
                "SELECT u.user_id, u.name, u.email
                 FROM sessions s JOIN users u ON u.user_id = s.user_id
                 WHERE s.token_hash = ?1",
                [token_hash(token)],
                |row| user_from_row(row, 0),
            )
            .optional()?
            .ok_or(ServiceError::Unauthorized)
    }

    /// Revoke a session. Returns whether it existed.
    ///
    /// # Errors
    ///
    /// Returns an error if the delete fails.
    pub fn logout(&self, token: &str) -> Result<bool, ServiceError> {
        let removed = self
            .conn
            .execute("DELETE FROM sessions WHERE token_hash = ?1", [token_hash(token)])?;
        Ok(removed > 0)
    }

    fn open_session(&self, user_id: &str) -> Result<String, ServiceError> {
        let token = issue_token();
        self.conn.execute(
            "INSERT INTO sessions (token_hash, user_id, created_at_us) VALUES (?1, ?2, ?3)",
            params![token_hash(&token), user_id, self.now_us()],
        )?;
        tracing::debug!(user_id, "opened session");
        Ok(token)
    }
}
