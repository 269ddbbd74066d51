use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;

use crate::repository::StorageError;

const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

/// Raw bytes recovered from a base64 upload payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedPayload {
    pub content_type: String,
    pub bytes: Vec<u8>,
}

/// Decode either a `data:<mime>;base64,<data>` URL or bare base64.
///
/// # Errors
///
/// Returns `StorageError::Payload` for data URLs that are not base64 encoded
/// or for invalid base64.
pub fn decode_payload(raw: &str) -> Result<DecodedPayload, StorageError> {
    let raw = raw.trim();
    let (content_type, data) = match raw.strip_prefix("data:") {
        Some(rest) => {
            let (meta, data) = rest
                .split_once(',')
                .ok_or_else(|| StorageError::Payload("data URL without `,`".into()))?;
            let mime = meta
                .strip_suffix(";base64")
                .ok_or_else(|| StorageError::Payload("data URL is not base64".into()))?;
            let mime = if mime.is_empty() {
                DEFAULT_CONTENT_TYPE
            } else {
                mime
            };
            (mime.to_owned(), data)
        }
        None => (DEFAULT_CONTENT_TYPE.to_owned(), raw),
    };

    let bytes = STANDARD
        .decode(data)
        .map_err(|e| StorageError::Payload(e.to_string()))?;
    Ok(DecodedPayload {
        content_type,
        bytes,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_data_url_with_mime() {
        let decoded = decode_payload("data:audio/webm;base64,aGVsbG8=").unwrap();
        assert_eq!(decoded.content_type, "audio/webm");
        assert_eq!(decoded.bytes, b"hello");
    }

    #[test]
    fn decodes_codec_parameters_in_mime() {
        let decoded = decode_payload("data:audio/webm;codecs=opus;base64,aGk=").unwrap();
        assert_eq!(decoded.content_type, "audio/webm;codecs=opus");
        assert_eq!(decoded.bytes, b"hi");
    }

    #[test]
    fn decodes_bare_base64() {
        let decoded = decode_payload("aGk=").unwrap();
        assert_eq!(decoded.content_type, DEFAULT_CONTENT_TYPE);
        assert_eq!(decoded.bytes, b"hi");
    }

    #[test]
    fn rejects_non_base64_data_urls() {
        assert!(matches!(
            decode_payload("data:text/plain,hello"),
            Err(StorageError::Payload(_))
        ));
        assert!(matches!(
            decode_payload("not base64!"),
            Err(StorageError::Payload(_))
        ));
    }
}
