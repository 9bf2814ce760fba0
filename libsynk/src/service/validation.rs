//! Input validation shared by the stores
//!
//! Only checks that need no database live here. Reference checks (does this
//! template exist for this tenant?) run inside the owning store's transaction.

use crate::error::{Result, SynkError};
use crate::types::ChannelType;

/// Maximum content size in bytes (100KB)
pub const MAX_CONTENT_LENGTH: usize = 100 * 1024;

/// Trimmed value of a required text field
pub fn required(field: &str, value: &str) -> Result<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(SynkError::validation(format!(
            "field {} is required",
            field
        )));
    }
    Ok(trimmed.to_string())
}

/// Required text field that is also bounded by [`MAX_CONTENT_LENGTH`]
pub fn content(field: &str, value: &str) -> Result<String> {
    let trimmed = required(field, value)?;
    if trimmed.len() > MAX_CONTENT_LENGTH {
        return Err(SynkError::validation(format!(
            "field {} size ({} bytes) exceeds maximum allowed size ({} bytes)",
            field,
            trimmed.len(),
            MAX_CONTENT_LENGTH
        )));
    }
    Ok(trimmed)
}

/// Blank optional text collapses to `None`
pub fn optional(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

pub fn channel_type(raw: &str) -> Result<ChannelType> {
    raw.parse::<ChannelType>().map_err(SynkError::Validation)
}

/// Drop repeated ids, keeping first-seen order
pub fn unique<T: PartialEq + Copy>(ids: &[T]) -> Vec<T> {
    let mut seen = Vec::with_capacity(ids.len());
    for id in ids {
        if !seen.contains(id) {
            seen.push(*id);
        }
    }
    seen
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::CredentialId;

    #[test]
    fn test_required_trims() {
        assert_eq!(required("name", "  Launch  ").unwrap(), "Launch");
    }

    #[test]
    fn test_required_rejects_whitespace() {
        let err = required("name", " \t\n").unwrap_err();
        assert!(matches!(err, SynkError::Validation(_)));
        assert!(err.to_string().contains("field name is required"));
    }

    #[test]
    fn test_content_size_limit() {
        let at_limit = "a".repeat(MAX_CONTENT_LENGTH);
        assert!(content("content", &at_limit).is_ok());

        let over = "a".repeat(MAX_CONTENT_LENGTH + 1);
        let err = content("content", &over).unwrap_err();
        assert!(err.to_string().contains("exceeds maximum allowed size"));
    }

    #[test]
    fn test_optional_blank_is_none() {
        assert_eq!(optional(None), None);
        assert_eq!(optional(Some("   ")), None);
        assert_eq!(
            optional(Some(" https://example.com/t.md ")),
            Some("https://example.com/t.md".to_string())
        );
    }

    #[test]
    fn test_channel_type_maps_to_validation_error() {
        assert_eq!(channel_type("discord").unwrap(), ChannelType::Discord);
        assert!(matches!(
            channel_type("fax"),
            Err(SynkError::Validation(_))
        ));
    }

    #[test]
    fn test_unique_keeps_first_seen_order() {
        let ids = [
            CredentialId(3),
            CredentialId(1),
            CredentialId(3),
            CredentialId(2),
            CredentialId(1),
        ];
        assert_eq!(
            unique(&ids),
            vec![CredentialId(3), CredentialId(1), CredentialId(2)]
        );
    }
}
