use std::fmt;

use crate::artifact::Artifact;
use crate::options::{ArtStyle, AspectRatio};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ActionKind {
    Generate,
    Edit,
    Upscale,
    StyleTransfer,
    ReplaceFace,
}

impl ActionKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ActionKind::Generate => "generate",
            ActionKind::Edit => "edit",
            ActionKind::Upscale => "upscale",
            ActionKind::StyleTransfer => "style_transfer",
            ActionKind::ReplaceFace => "replace_face",
        }
    }

    /// Message used when the service answers without an image.
    pub fn empty_result_message(self) -> &'static str {
        match self {
            ActionKind::Generate => "Image generation failed or returned no images.",
            ActionKind::Edit => "Image editing failed or returned no images.",
            ActionKind::Upscale => "Image upscaling failed or returned no images.",
            ActionKind::StyleTransfer => "Style transfer failed or returned no images.",
            ActionKind::ReplaceFace => "Face replacement failed or returned no image.",
        }
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Fully-resolved payload for one call to the image service.
#[derive(Debug, Clone, PartialEq)]
pub enum ServiceRequest {
    Generate {
        prompt: String,
        aspect_ratio: AspectRatio,
    },
    Edit {
        image: Artifact,
        instruction: String,
    },
    Upscale {
        image: Artifact,
    },
    StyleTransfer {
        image: Artifact,
        style: ArtStyle,
    },
    ReplaceFace {
        target: Artifact,
        source_face: Artifact,
    },
}

impl ServiceRequest {
    pub fn kind(&self) -> ActionKind {
        match self {
            ServiceRequest::Generate { .. } => ActionKind::Generate,
            ServiceRequest::Edit { .. } => ActionKind::Edit,
            ServiceRequest::Upscale { .. } => ActionKind::Upscale,
            ServiceRequest::StyleTransfer { .. } => ActionKind::StyleTransfer,
            ServiceRequest::ReplaceFace { .. } => ActionKind::ReplaceFace,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct ServiceError {
    message: String,
}

impl ServiceError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub fn message(&self) -> &str {
        self.message.as_str()
    }
}

impl From<anyhow::Error> for ServiceError {
    fn from(err: anyhow::Error) -> Self {
        Self::new(format!("{err:#}"))
    }
}

pub trait ImageService {
    fn name(&self) -> &str;
    fn run(&self, request: &ServiceRequest) -> Result<Artifact, ServiceError>;
}

#[cfg(test)]
mod tests {
    use crate::artifact::Artifact;
    use crate::options::ArtStyle;

    use super::{ActionKind, ServiceError, ServiceRequest};

    #[test]
    fn request_kind_matches_variant() {
        let image = Artifact::new(vec![1u8], "image/png");
        let request = ServiceRequest::StyleTransfer {
            image,
            style: ArtStyle::Anime,
        };
        assert_eq!(request.kind(), ActionKind::StyleTransfer);
        assert_eq!(request.kind().to_string(), "style_transfer");
    }

    #[test]
    fn service_error_keeps_context_chain() {
        let err = anyhow::anyhow!("socket closed").context("Gemini request failed");
        let converted = ServiceError::from(err);
        assert_eq!(converted.message(), "Gemini request failed: socket closed");
        assert_eq!(converted.to_string(), converted.message());
    }
}
