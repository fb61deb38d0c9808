//! Inline attachment validation.
//!
//! Attachments arrive as `data:` URIs inside the chat frame and are stored
//! verbatim. The decoded size is bounded by `MAX_ATTACHMENT_BYTES`.

use protocol::DataUri;

use super::validate::{ValidationError, non_blank};

/// Base64 padding makes the length estimate overshoot by at most this much.
const ESTIMATE_SLACK: usize = 2;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Attachment {
    pub file_name: String,
    pub data_uri: String,
}

/// Validate an optional attachment.
///
/// A file name without data is ignored. Data without a file name, a data
/// URI that is not base64, or a payload over `limit` decoded bytes is
/// rejected.
///
/// # Errors
///
/// Returns a [`ValidationError`] describing the first violated rule.
pub fn validate(
    file_name: Option<String>,
    file_data: Option<String>,
    limit: usize,
) -> Result<Option<Attachment>, ValidationError> {
    let Some(data_uri) = non_blank(file_data) else {
        return Ok(None);
    };
    let file_name = non_blank(file_name).ok_or(ValidationError::MissingFileName)?;

    let uri = DataUri::parse(&data_uri)?;

    // Cheap rejection before decoding a payload that is clearly too big.
    let estimate = uri.decoded_len_estimate();
    if estimate.saturating_sub(ESTIMATE_SLACK) > limit {
        return Err(ValidationError::AttachmentTooLarge { size: estimate, limit });
    }

    let size = uri.decode()?.len();
    if size > limit {
        return Err(ValidationError::AttachmentTooLarge { size, limit });
    }

    Ok(Some(Attachment { file_name, data_uri }))
}

#[cfg(test)]
#[path = "attachment_test.rs"]
mod tests;
