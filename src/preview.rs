use parking_lot::RwLock;
use serde::Serialize;

use crate::models::{Creation, GenerationPhase, PreviewSession, ProgressStage};
use crate::store::CreationStore;

/// Sandbox policy for the generated document: scripts, forms, popups, modals
/// and same-origin access are allowed; navigating the hosting context is not.
pub const SANDBOX_POLICY: &str =
    "allow-scripts allow-forms allow-popups allow-modals allow-same-origin";

#[derive(Debug, Default)]
struct SessionInner {
    phase: GenerationPhase,
    stage: ProgressStage,
    notice: Option<String>,
    session: PreviewSession,
}

/// Shared preview-session state: what is currently shown, and the progress of
/// the generation in flight (if any). Mutated by the orchestrator on
/// completion and by user-driven selection, reset and layout toggles.
#[derive(Default)]
pub struct SessionState {
    inner: RwLock<SessionInner>,
}

impl SessionState {
    pub fn phase(&self) -> GenerationPhase {
        self.inner.read().phase
    }

    pub fn stage(&self) -> ProgressStage {
        self.inner.read().stage
    }

    pub fn notice(&self) -> Option<String> {
        self.inner.read().notice.clone()
    }

    pub fn preview(&self) -> PreviewSession {
        self.inner.read().session.clone()
    }

    /// Whether a new submission would currently be accepted.
    pub fn accepting_submissions(&self) -> bool {
        let inner = self.inner.read();
        inner.phase == GenerationPhase::Idle && !inner.session.input_disabled
    }

    /// Atomically claim the single in-flight slot. Returns false (no state
    /// change) when a generation is already running or input is disabled.
    pub fn begin_submission(&self) -> bool {
        let mut inner = self.inner.write();
        if inner.phase != GenerationPhase::Idle || inner.session.input_disabled {
            return false;
        }
        inner.phase = GenerationPhase::Submitting;
        inner.stage = ProgressStage::default();
        inner.notice = None;
        inner.session.loading = true;
        true
    }

    pub fn enter_awaiting(&self) {
        self.inner.write().phase = GenerationPhase::AwaitingResult;
    }

    /// One ticker step. Only advances while a result is awaited and the final
    /// stage has not been reached; returns false once there is nothing left
    /// to advance, which ends the ticker loop.
    pub fn advance_stage(&self) -> bool {
        let mut inner = self.inner.write();
        if inner.phase != GenerationPhase::AwaitingResult || inner.stage >= ProgressStage::FINAL {
            return false;
        }
        inner.stage = inner.stage.advanced();
        true
    }

    /// The generation resolved: the new creation becomes the active
    /// selection and the preview opens on it.
    pub fn complete(&self, creation: &Creation) {
        let mut inner = self.inner.write();
        inner.phase = GenerationPhase::Completed;
        apply_selection(&mut inner, creation);
        inner.session.focused = true;
        inner.phase = GenerationPhase::Idle;
    }

    /// The generation rejected: nothing was stored; the previously active
    /// creation (already in place) remains the display.
    pub fn fail(&self, notice: String) {
        let mut inner = self.inner.write();
        inner.phase = GenerationPhase::Failed;
        inner.notice = Some(notice);
        inner.session.loading = false;
        inner.phase = GenerationPhase::Idle;
    }

    /// History selection: takes precedence for display purposes even while a
    /// generation is in flight (which is not cancelled by this).
    pub fn select(&self, creation: &Creation) {
        let mut inner = self.inner.write();
        apply_selection(&mut inner, creation);
        inner.session.focused = true;
    }

    /// Back to the unfocused standby display; the store is untouched.
    pub fn reset(&self) {
        let mut inner = self.inner.write();
        inner.session.active = None;
        inner.session.focused = false;
        inner.session.split_view = false;
        inner.notice = None;
    }

    pub fn set_focused(&self, focused: bool) {
        self.inner.write().session.focused = focused;
    }

    /// Split view can only be toggled while the active creation actually has
    /// an original to show; otherwise the flag is forced off.
    pub fn set_split_view(&self, enabled: bool, store: &CreationStore) {
        let mut inner = self.inner.write();
        let has_original = inner
            .session
            .active
            .and_then(|id| store.select(id))
            .map(|c| c.original_image.is_some())
            .unwrap_or(false);
        inner.session.split_view = enabled && has_original;
    }

    pub fn set_input_disabled(&self, disabled: bool) {
        self.inner.write().session.input_disabled = disabled;
    }
}

/// Selecting a creation always exits the loading state, and split view
/// follows the presence of an original artifact (not preserved across
/// selection changes).
fn apply_selection(inner: &mut SessionInner, creation: &Creation) {
    inner.session.active = Some(creation.id);
    inner.session.loading = false;
    inner.session.split_view = creation.original_image.is_some();
}

#[derive(Debug, Serialize, Clone, PartialEq)]
pub struct LoadingStep {
    pub label: &'static str,
    pub active: bool,
    pub completed: bool,
}

/// Left/top pane of the split view, decided once at render time from the
/// artifact's media type.
#[derive(Debug, Serialize, Clone, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum OriginalPane {
    /// Raster image displayed directly.
    Bitmap { src: String },
    /// First page of the PDF, rasterized on demand; the client shows a busy
    /// indicator until the bitmap arrives.
    PdfPage { src: String },
}

impl OriginalPane {
    fn for_creation(creation: &Creation) -> Option<OriginalPane> {
        let artifact = creation.original_image.as_ref()?;
        Some(if artifact.is_pdf() {
            OriginalPane::PdfPage { src: format!("/api/creations/{}/original/page", creation.id) }
        } else {
            OriginalPane::Bitmap { src: format!("/api/creations/{}/original", creation.id) }
        })
    }
}

#[derive(Debug, Serialize, Clone, PartialEq)]
pub struct ResultPane {
    pub name: String,
    pub frame_url: String,
    pub sandbox: &'static str,
}

impl ResultPane {
    fn for_creation(creation: &Creation) -> ResultPane {
        ResultPane {
            name: creation.name.clone(),
            frame_url: format!("/api/creations/{}/frame", creation.id),
            sandbox: SANDBOX_POLICY,
        }
    }
}

/// What the preview should currently show.
#[derive(Debug, Serialize, Clone, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PreviewSurface {
    Standby,
    Loading { stage: u8, steps: Vec<LoadingStep> },
    Split { original: OriginalPane, result: ResultPane },
    Single { result: ResultPane },
}

/// Pure function of the session state: the loading display never shows
/// creation content, and split view requires an original artifact.
pub fn surface_for(
    session: &PreviewSession,
    stage: ProgressStage,
    store: &CreationStore,
) -> PreviewSurface {
    if session.loading {
        let steps = ProgressStage::LABELS
            .into_iter()
            .enumerate()
            .map(|(i, label)| LoadingStep {
                label,
                active: i as u8 == stage.index(),
                completed: (i as u8) < stage.index(),
            })
            .collect();
        return PreviewSurface::Loading { stage: stage.index(), steps };
    }

    let Some(creation) = session.active.and_then(|id| store.select(id)) else {
        return PreviewSurface::Standby;
    };

    let result = ResultPane::for_creation(&creation);
    match OriginalPane::for_creation(&creation) {
        Some(original) if session.split_view => PreviewSurface::Split { original, result },
        _ => PreviewSurface::Single { result },
    }
}

/// Host page embedding the generated document behind the sandbox boundary.
pub fn host_document(creation: &Creation) -> String {
    format!(
        r#"<!DOCTYPE html>
<html>
<head>
<meta charset="utf-8">
<title>{title}</title>
<style>html, body {{ margin: 0; height: 100%; }} iframe {{ width: 100%; height: 100%; border: 0; }}</style>
</head>
<body>
<iframe title="Live Preview" sandbox="{sandbox}" srcdoc="{srcdoc}"></iframe>
</body>
</html>"#,
        title = escape_html(&creation.name),
        sandbox = SANDBOX_POLICY,
        srcdoc = escape_html(&creation.html),
    )
}

fn escape_html(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}
