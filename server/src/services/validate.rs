//! Input validation shared by the realtime services.

use protocol::DataUriError;
use uuid::Uuid;

/// Rejected client input. Always reported back to the sender only.
#[derive(Debug, thiserror::Error)]
pub enum ValidationError {
    #[error("{0} is not a valid id")]
    InvalidId(&'static str),
    #[error("message must have content or an attachment")]
    EmptyMessage,
    #[error("attachment requires a file name")]
    MissingFileName,
    #[error("invalid attachment: {0}")]
    MalformedAttachment(#[from] DataUriError),
    #[error("attachment is {size} bytes, limit is {limit}")]
    AttachmentTooLarge { size: usize, limit: usize },
}

impl protocol::ErrorCode for ValidationError {
    fn error_code(&self) -> &'static str {
        "E_VALIDATION"
    }
}

/// Parse a wire id string.
///
/// # Errors
///
/// Returns [`ValidationError::InvalidId`] naming `field` if `raw` is not a UUID.
pub fn parse_id(raw: &str, field: &'static str) -> Result<Uuid, ValidationError> {
    Uuid::parse_str(raw.trim()).map_err(|_| ValidationError::InvalidId(field))
}

/// Trim free text; whitespace-only becomes `None`.
#[must_use]
pub fn non_blank(value: Option<String>) -> Option<String> {
    value.and_then(|v| {
        let trimmed = v.trim();
        if trimmed.is_empty() {
            None
        } else if trimmed.len() == v.len() {
            Some(v)
        } else {
            Some(trimmed.to_owned())
        }
    })
}

#[cfg(test)]
#[path = "validate_test.rs"]
mod tests;
