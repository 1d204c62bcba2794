use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64};
use std::fmt;
use thiserror::Error;
use tracing::{debug, trace};

pub mod mime;

pub use mime::mime_type_for_path;

/// MIME types accepted for captioning (exact, case-sensitive)
pub const ALLOWED_MIME_TYPES: [&str; 4] = ["image/jpeg", "image/png", "image/webp", "image/gif"];

/// Largest accepted decoded image, in bytes
pub const MAX_IMAGE_BYTES: usize = 10 * 1024 * 1024;

const DATA_PREFIX: &str = "data:";
const BASE64_SEPARATOR: &str = ";base64,";
const BYTES_PER_MB: f64 = 1024.0 * 1024.0;

/// Errors raised while decoding or validating an uploaded image.
///
/// The `Display` output is the user-facing message; both the client
/// pre-check and the server endpoint show it verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CodecError {
    #[error("Invalid image format. Please upload a valid image file")]
    MalformedInput { reason: &'static str },

    #[error("Unsupported image type. Allowed types: {}", .allowed.join(", "))]
    UnsupportedType { mime_type: String, allowed: Vec<String> },

    #[error("Image size exceeds {}MB limit. Please upload a smaller image", mb_label(.max_size_bytes))]
    TooLarge { size: usize, max_size_bytes: usize },

    #[error("The uploaded file appears to be empty")]
    EmptyPayload,
}

fn mb_label(bytes: &usize) -> String {
    // f64 Display drops the fraction for whole numbers, so 10 MiB prints as "10"
    format!("{}", *bytes as f64 / BYTES_PER_MB)
}

/// Limits applied by [`validate`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationRules {
    pub allowed_types: Vec<String>,
    pub max_size_bytes: usize,
}

impl Default for ValidationRules {
    fn default() -> Self {
        Self {
            allowed_types: ALLOWED_MIME_TYPES.iter().map(|s| s.to_string()).collect(),
            max_size_bytes: MAX_IMAGE_BYTES,
        }
    }
}

impl ValidationRules {
    pub fn allows(&self, mime_type: &str) -> bool {
        self.allowed_types.iter().any(|allowed| allowed == mime_type)
    }
}

/// An image in transportable form: a MIME type plus a base64 payload.
///
/// Renders as a data URI (`data:<mimeType>;base64,<payload>`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedImage {
    mime_type: String,
    payload: String,
}

impl EncodedImage {
    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }

    pub fn payload(&self) -> &str {
        &self.payload
    }

    /// Length of the raw bytes the payload decodes to, without decoding it
    pub fn decoded_len(&self) -> usize {
        let padding = self.payload.bytes().rev().take_while(|b| *b == b'=').count();
        ((self.payload.len() / 4) * 3).saturating_sub(padding.min(2))
    }

    pub fn to_data_uri(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for EncodedImage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}{}{}", DATA_PREFIX, self.mime_type, BASE64_SEPARATOR, self.payload)
    }
}

/// Encodes raw bytes into a data URI.
///
/// No validation happens here; callers validate at their own trust boundary.
pub fn encode(raw: &[u8], mime_type: &str) -> EncodedImage {
    trace!("Encoding {} bytes as {}", raw.len(), mime_type);
    EncodedImage {
        mime_type: mime_type.to_string(),
        payload: BASE64.encode(raw),
    }
}

/// Decodes a data URI into its MIME type and raw bytes.
///
/// # Arguments
/// * `data_uri` - A string of the form `data:<mimeType>;base64,<payload>`
///
/// # Returns
/// * `Result<(String, Vec<u8>), CodecError>` - MIME type and bytes, or
///   `MalformedInput` when the shape is wrong or the payload is not base64.
///   An empty payload is well-formed and yields zero bytes.
pub fn decode(data_uri: &str) -> Result<(String, Vec<u8>), CodecError> {
    let (header, payload) = data_uri
        .split_once(BASE64_SEPARATOR)
        .ok_or(CodecError::MalformedInput { reason: "missing ;base64, separator" })?;

    let mime_type = header
        .strip_prefix(DATA_PREFIX)
        .ok_or(CodecError::MalformedInput { reason: "header is not a data: scheme" })?;
    if mime_type.is_empty() {
        return Err(CodecError::MalformedInput { reason: "header has no MIME type" });
    }

    let raw = BASE64
        .decode(payload.trim())
        .map_err(|_| CodecError::MalformedInput { reason: "payload is not valid base64" })?;

    debug!("Decoded data URI: mime={}, bytes={}", mime_type, raw.len());
    Ok((mime_type.to_string(), raw))
}

/// Checks a decoded image against the given rules.
///
/// Type is checked first, then the size ceiling, then emptiness.
pub fn validate(mime_type: &str, raw: &[u8], rules: &ValidationRules) -> Result<(), CodecError> {
    if !rules.allows(mime_type) {
        return Err(CodecError::UnsupportedType {
            mime_type: mime_type.to_string(),
            allowed: rules.allowed_types.clone(),
        });
    }
    if raw.len() > rules.max_size_bytes {
        return Err(CodecError::TooLarge {
            size: raw.len(),
            max_size_bytes: rules.max_size_bytes,
        });
    }
    if raw.is_empty() {
        return Err(CodecError::EmptyPayload);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_builds_data_uri() {
        let encoded = encode(b"hello", "image/png");
        assert_eq!(encoded.to_data_uri(), "data:image/png;base64,aGVsbG8=");
        assert_eq!(encoded.mime_type(), "image/png");
        assert_eq!(encoded.decoded_len(), 5);
    }

    #[test]
    fn test_decode_reverses_encode() {
        let bytes: Vec<u8> = (0..=255u8).collect();
        for mime in ALLOWED_MIME_TYPES {
            let (decoded_mime, decoded) = decode(&encode(&bytes, mime).to_data_uri()).unwrap();
            assert_eq!(decoded_mime, mime);
            assert_eq!(decoded, bytes);
        }
    }

    #[test]
    fn test_decode_rejects_missing_separator() {
        let err = decode("data:image/png,aGVsbG8=").unwrap_err();
        assert!(matches!(err, CodecError::MalformedInput { .. }));
        assert_eq!(err.to_string(), "Invalid image format. Please upload a valid image file");
    }

    #[test]
    fn test_decode_rejects_header_without_mime() {
        assert!(matches!(decode("data:;base64,aGVsbG8="), Err(CodecError::MalformedInput { .. })));
        assert!(matches!(decode("image/png;base64,aGVsbG8="), Err(CodecError::MalformedInput { .. })));
    }

    #[test]
    fn test_decode_rejects_invalid_base64() {
        assert!(matches!(decode("data:image/png;base64,@@@"), Err(CodecError::MalformedInput { .. })));
    }

    #[test]
    fn test_decode_accepts_empty_payload() {
        let (mime, raw) = decode("data:image/webp;base64,").unwrap();
        assert_eq!(mime, "image/webp");
        assert!(raw.is_empty());
    }

    #[test]
    fn test_validate_size_boundary() {
        let rules = ValidationRules::default();
        let at_limit = vec![0u8; MAX_IMAGE_BYTES];
        assert!(validate("image/jpeg", &at_limit, &rules).is_ok());

        let over = vec![0u8; MAX_IMAGE_BYTES + 1];
        let err = validate("image/jpeg", &over, &rules).unwrap_err();
        assert_eq!(err, CodecError::TooLarge { size: MAX_IMAGE_BYTES + 1, max_size_bytes: MAX_IMAGE_BYTES });
        assert_eq!(err.to_string(), "Image size exceeds 10MB limit. Please upload a smaller image");

        assert!(validate("image/jpeg", &[1], &rules).is_ok());
    }

    #[test]
    fn test_validate_rejects_unlisted_type() {
        let err = validate("image/bmp", b"BM", &ValidationRules::default()).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Unsupported image type. Allowed types: image/jpeg, image/png, image/webp, image/gif"
        );
        // case-sensitive
        assert!(validate("IMAGE/PNG", b"x", &ValidationRules::default()).is_err());
    }

    #[test]
    fn test_validate_type_checked_before_size() {
        let err = validate("image/bmp", &[], &ValidationRules::default()).unwrap_err();
        assert!(matches!(err, CodecError::UnsupportedType { .. }));
    }

    #[test]
    fn test_validate_rejects_empty() {
        let err = validate("image/webp", &[], &ValidationRules::default()).unwrap_err();
        assert_eq!(err, CodecError::EmptyPayload);
    }

    #[test]
    fn test_custom_rules_report_fractional_limit() {
        let rules = ValidationRules {
            allowed_types: vec!["image/png".to_string()],
            max_size_bytes: 512 * 1024,
        };
        let err = validate("image/png", &vec![0u8; 512 * 1024 + 1], &rules).unwrap_err();
        assert_eq!(err.to_string(), "Image size exceeds 0.5MB limit. Please upload a smaller image");
    }
}
