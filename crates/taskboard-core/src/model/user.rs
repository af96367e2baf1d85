use serde::{Deserialize, Serialize};

/// An authenticated account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub name: String,
    pub email: String,
}

impl User {
    /// Name shown on comments: the account name, else the email local part,
    /// else `"User"`.
    #[must_use]
    pub fn display_name(&self) -> String {
        if !self.name.trim().is_empty() {
            return self.name.clone();
        }
        match self.email.split('@').next() {
            Some(local) if !local.is_empty() => local.to_string(),
            _ => "User".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::User;

    fn user(name: &str, email: &str) -> User {
        User {
            id: "u1".into(),
            name: name.into(),
            email: email.into(),
        }
    }

    #[test]
    fn display_name_falls_back_to_email_then_placeholder() {
        assert_eq!(user("Ada", "ada@example.com").display_name(), "Ada");
        assert_eq!(user("", "ada@example.com").display_name(), "ada");
        assert_eq!(user(" ", "").display_name(), "User");
    }
}
