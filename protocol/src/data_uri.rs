//! Inline `data:` URI attachments (RFC 2397, base64 form only).
//!
//! Attachments ride inside the chat message as text. The server validates
//! the shape and the decoded size; the client builds the URI from raw bytes.

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;

const SCHEME: &str = "data:";
const BASE64_PARAM: &str = "base64";
const DEFAULT_MEDIA_TYPE: &str = "text/plain";

#[derive(Debug, thiserror::Error)]
pub enum DataUriError {
    #[error("attachment must be a data: URI")]
    MissingScheme,
    #[error("data URI has no payload separator")]
    MissingComma,
    #[error("data URI must be base64-encoded")]
    NotBase64,
    #[error("data URI payload is not valid base64: {0}")]
    InvalidPayload(#[from] base64::DecodeError),
}

/// Borrowed view of a parsed `data:` URI.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DataUri<'a> {
    media_type: &'a str,
    payload: &'a str,
}

impl<'a> DataUri<'a> {
    /// Split a `data:<media-type>[;param]*;base64,<payload>` URI.
    ///
    /// # Errors
    ///
    /// Returns an error if the scheme, separator, or base64 marker is missing.
    /// The payload itself is not decoded here; see [`DataUri::decode`].
    pub fn parse(uri: &'a str) -> Result<Self, DataUriError> {
        let rest = uri
            .get(..SCHEME.len())
            .filter(|scheme| scheme.eq_ignore_ascii_case(SCHEME))
            .map(|_| &uri[SCHEME.len()..])
            .ok_or(DataUriError::MissingScheme)?;
        let (header, payload) = rest.split_once(',').ok_or(DataUriError::MissingComma)?;

        let mut params = header.split(';');
        let media_type = params.next().unwrap_or_default();
        let is_base64 = params.any(|p| p.trim().eq_ignore_ascii_case(BASE64_PARAM));
        if !is_base64 {
            return Err(DataUriError::NotBase64);
        }

        let media_type = if media_type.is_empty() { DEFAULT_MEDIA_TYPE } else { media_type };
        Ok(Self { media_type, payload })
    }

    #[must_use]
    pub fn media_type(&self) -> &'a str {
        self.media_type
    }

    /// Upper bound on the decoded size, computed without decoding.
    #[must_use]
    pub fn decoded_len_estimate(&self) -> usize {
        base64::decoded_len_estimate(self.payload.len())
    }

    /// Decode the payload bytes.
    ///
    /// # Errors
    ///
    /// Returns [`DataUriError::InvalidPayload`] if the payload is not
    /// standard padded base64.
    pub fn decode(&self) -> Result<Vec<u8>, DataUriError> {
        Ok(STANDARD.decode(self.payload)?)
    }
}

/// Build a `data:` URI from raw bytes.
#[must_use]
pub fn encode(media_type: &str, bytes: &[u8]) -> String {
    let media_type = if media_type.is_empty() { DEFAULT_MEDIA_TYPE } else { media_type };
    format!("{SCHEME}{media_type};{BASE64_PARAM},{}", STANDARD.encode(bytes))
}

#[cfg(test)]
#[path = "data_uri_test.rs"]
mod tests;
