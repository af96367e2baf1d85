use crate::error::ServiceError;

/// Trimmed `value`, or a validation error carrying `message` when blank.
pub fn required(value: &str, message: &str) -> Result<String, ServiceError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ServiceError::invalid(message));
    }
    Ok(trimmed.to_string())
}

/// Trimmed optional text; blank collapses to `None`.
pub fn optional(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::{optional, required};
    use crate::error::ServiceError;

    #[test]
    fn required_trims_or_rejects() {
        assert_eq!(required("  hi ", "x").ok().as_deref(), Some("hi"));
        assert!(matches!(
            required(" \n", "Comment content is required"),
            Err(ServiceError::Validation(m)) if m == "Comment content is required"
        ));
    }

    #[test]
    fn optional_drops_blank() {
        assert_eq!(optional(Some("  ")), None);
        assert_eq!(optional(Some(" notes ")).as_deref(), Some("notes"));
        assert_eq!(optional(None), None);
    }
}
