use std::fmt;
use std::sync::Arc;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use sha2::{Digest, Sha256};

/// An encoded image payload tagged with its MIME type.
///
/// Bytes are shared, so cloning an artifact never copies image data and the
/// payload cannot change once created.
#[derive(Clone, PartialEq, Eq)]
pub struct Artifact {
    bytes: Arc<[u8]>,
    mime_type: String,
}

impl Artifact {
    pub fn new(bytes: impl Into<Vec<u8>>, mime_type: impl Into<String>) -> Self {
        let mime_type = mime_type.into();
        let mime_type = if mime_type.trim().is_empty() {
            "application/octet-stream".to_string()
        } else {
            mime_type.trim().to_ascii_lowercase()
        };
        Self {
            bytes: Arc::from(bytes.into()),
            mime_type,
        }
    }

    pub fn from_data_url(raw: &str) -> Result<Self, String> {
        let trimmed = raw.trim();
        let Some(rest) = trimmed.strip_prefix("data:") else {
            return Err("Data URL must start with 'data:'.".to_string());
        };
        let Some((mime_type, payload)) = rest.split_once(";base64,") else {
            return Err("Data URL is not base64 encoded.".to_string());
        };
        if mime_type.trim().is_empty() {
            return Err("Data URL is missing a MIME type.".to_string());
        }
        let bytes = BASE64
            .decode(payload.trim().as_bytes())
            .map_err(|err| format!("Data URL payload is not valid base64: {err}"))?;
        Ok(Self::new(bytes, mime_type))
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn mime_type(&self) -> &str {
        self.mime_type.as_str()
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn to_base64(&self) -> String {
        BASE64.encode(&self.bytes)
    }

    pub fn to_data_url(&self) -> String {
        format!("data:{};base64,{}", self.mime_type, self.to_base64())
    }

    /// Short content hash used to name artifacts in logs and events.
    pub fn id(&self) -> String {
        let digest = Sha256::digest(&self.bytes);
        hex::encode(digest)[..16].to_string()
    }

    pub fn extension(&self) -> &'static str {
        match self.mime_type.as_str() {
            "image/png" => "png",
            "image/jpeg" | "image/jpg" => "jpg",
            "image/webp" => "webp",
            "image/gif" => "gif",
            _ => "bin",
        }
    }
}

impl fmt::Debug for Artifact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Artifact")
            .field("id", &self.id())
            .field("mime_type", &self.mime_type)
            .field("len", &self.bytes.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::Artifact;

    #[test]
    fn data_url_round_trip_keeps_mime_and_bytes() {
        let artifact = Artifact::new(vec![1u8, 2, 3, 250], "image/png");
        let url = artifact.to_data_url();
        assert!(url.starts_with("data:image/png;base64,"));

        let parsed = Artifact::from_data_url(&url).unwrap();
        assert_eq!(parsed, artifact);
        assert_eq!(parsed.extension(), "png");
    }

    #[test]
    fn data_url_rejects_malformed_input() {
        assert!(Artifact::from_data_url("image/png;base64,AAAA").is_err());
        assert!(Artifact::from_data_url("data:image/png,AAAA").is_err());
        assert!(Artifact::from_data_url("data:;base64,AAAA").is_err());
        assert!(Artifact::from_data_url("data:image/png;base64,@@@").is_err());
    }

    #[test]
    fn id_is_stable_and_content_addressed() {
        let a = Artifact::new(b"same".to_vec(), "image/jpeg");
        let b = Artifact::new(b"same".to_vec(), "image/png");
        let c = Artifact::new(b"other".to_vec(), "image/jpeg");
        assert_eq!(a.id(), b.id());
        assert_ne!(a.id(), c.id());
        assert_eq!(a.id().len(), 16);
    }

    #[test]
    fn mime_type_is_normalized() {
        let artifact = Artifact::new(Vec::new(), " IMAGE/JPEG ");
        assert_eq!(artifact.mime_type(), "image/jpeg");
        assert_eq!(artifact.extension(), "jpg");
        assert!(artifact.is_empty());

        let unknown = Artifact::new(vec![0u8], "");
        assert_eq!(unknown.mime_type(), "application/octet-stream");
        assert_eq!(unknown.extension(), "bin");
    }
}
