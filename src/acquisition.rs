use thiserror::Error;

use crate::models::{ArtifactPayload, GenerationRequest, IncomingArtifact};

const DEFAULT_NAME: &str = "untitled project";
const MAX_DERIVED_NAME: usize = 48;

#[derive(Debug, Error, PartialEq)]
pub enum AcquisitionError {
    #[error("unsupported file type: {media_type}. Please upload an image or PDF.")]
    UnsupportedMediaType { media_type: String },
    #[error("a prompt or a file is required")]
    EmptyRequest,
}

/// A file is accepted only if its declared media type begins with `image/`
/// or equals `application/pdf`.
pub fn accepts_media_type(media_type: &str) -> bool {
    media_type.starts_with("image/") || media_type == "application/pdf"
}

/// Validate and normalise a user submission into a generation request.
///
/// A bare non-empty prompt is always accepted; a file must pass the media
/// type gate. No side effects: on rejection, nothing is emitted downstream.
pub fn build_request(
    prompt: &str,
    artifact: Option<IncomingArtifact>,
) -> Result<GenerationRequest, AcquisitionError> {
    let prompt = prompt.trim();

    let artifact = match artifact {
        Some(incoming) => {
            if !accepts_media_type(&incoming.media_type) {
                return Err(AcquisitionError::UnsupportedMediaType {
                    media_type: incoming.media_type,
                });
            }
            Some(incoming)
        }
        None => {
            if prompt.is_empty() {
                return Err(AcquisitionError::EmptyRequest);
            }
            None
        }
    };

    let name = derive_name(prompt, artifact.as_ref().and_then(|a| a.name.as_deref()));
    Ok(GenerationRequest {
        name,
        prompt: prompt.to_string(),
        artifact: artifact.map(|a| ArtifactPayload { media_type: a.media_type, data: a.data }),
    })
}

/// Label for the eventual creation: the supplied file name (extension
/// stripped), else the prompt, else a default.
fn derive_name(prompt: &str, file_name: Option<&str>) -> String {
    if let Some(file_name) = file_name {
        let stem = file_name
            .rsplit_once('.')
            .map(|(stem, _)| stem)
            .unwrap_or(file_name)
            .trim();
        if !stem.is_empty() {
            return truncate(stem, MAX_DERIVED_NAME);
        }
    }
    if !prompt.is_empty() {
        return truncate(prompt, MAX_DERIVED_NAME);
    }
    DEFAULT_NAME.to_string()
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        format!("{}…", s.chars().take(max).collect::<String>())
    }
}
