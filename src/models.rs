use serde::{Serialize, Deserialize};
use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Inline-encoded binary artifact tagged with its media type.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct ArtifactPayload {
    pub media_type: String,
    /// Base64-encoded file contents.
    pub data: String,
}

impl ArtifactPayload {
    /// The PDF path is recognised by media type, not content sniffing.
    pub fn is_pdf(&self) -> bool {
        self.media_type == "application/pdf"
    }

    pub fn is_image(&self) -> bool {
        self.media_type.starts_with("image/")
    }
}

/// One completed generation: original input, produced output, metadata.
/// Never mutated after construction; edits produce a new record.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Creation {
    pub id: Uuid,
    pub name: String,
    pub html: String,
    #[serde(default)]
    pub original_image: Option<ArtifactPayload>,
    pub timestamp: DateTime<Utc>,
}

/// Artifact as submitted by the client, before validation.
#[derive(Debug, Deserialize, Clone)]
pub struct IncomingArtifact {
    pub media_type: String,
    pub data: String,
    #[serde(default)]
    pub name: Option<String>,
}

/// Validated request handed to the orchestrator. Transient, never stored.
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    pub name: String,
    pub prompt: String,
    pub artifact: Option<ArtifactPayload>,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum GenerationPhase {
    #[default]
    Idle,
    Submitting,
    AwaitingResult,
    Completed,
    Failed,
}

/// Simulated sub-phase of an in-flight generation. Purely cosmetic: it
/// advances on a fixed cadence and says nothing about real backend progress.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
#[serde(transparent)]
pub struct ProgressStage(u8);

impl ProgressStage {
    pub const FINAL: ProgressStage = ProgressStage(3);

    pub const LABELS: [&'static str; 4] = [
        "Extracting Geometry",
        "Mapping Components",
        "Injecting Intelligence",
        "Finalizing Structure",
    ];

    pub fn index(self) -> u8 {
        self.0
    }

    pub fn label(self) -> &'static str {
        Self::LABELS[self.0 as usize]
    }

    /// Next stage, saturating at the final one.
    pub fn advanced(self) -> ProgressStage {
        ProgressStage(self.0.saturating_add(1).min(Self::FINAL.0))
    }
}

/// Transient UI-facing state of what is currently shown.
#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq)]
pub struct PreviewSession {
    pub active: Option<Uuid>,
    pub loading: bool,
    pub focused: bool,
    pub split_view: bool,
    pub input_disabled: bool,
}

#[derive(Debug, Serialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    Pdf,
    Image,
    Prompt,
}

impl SourceKind {
    pub fn of(artifact: Option<&ArtifactPayload>) -> SourceKind {
        match artifact {
            Some(a) if a.is_pdf() => SourceKind::Pdf,
            Some(_) => SourceKind::Image,
            None => SourceKind::Prompt,
        }
    }
}

/// History card view of a creation, without the heavy payload fields.
#[derive(Debug, Serialize, Clone)]
pub struct CreationSummary {
    pub id: Uuid,
    pub name: String,
    pub timestamp: DateTime<Utc>,
    pub source: SourceKind,
}

impl From<&Creation> for CreationSummary {
    fn from(c: &Creation) -> Self {
        CreationSummary {
            id: c.id,
            name: c.name.clone(),
            timestamp: c.timestamp,
            source: SourceKind::of(c.original_image.as_ref()),
        }
    }
}
