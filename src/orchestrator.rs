use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tracing::{debug, error, info};
use uuid::Uuid;

use crate::acquisition::{self, AcquisitionError};
use crate::models::{Creation, GenerationRequest, IncomingArtifact};
use crate::preview::SessionState;
use crate::store::CreationStore;
use crate::synthesis::Synthesizer;

/// Fixed cadence of the perceived-progress ticker.
pub const DEFAULT_STAGE_CADENCE: Duration = Duration::from_secs(2);

/// Drives a generation request from submission to completion or failure.
///
/// At most one request is in flight at a time; the in-flight slot is claimed
/// atomically on the shared session state. The store and session are
/// injected so the whole machine can be tested against fakes.
pub struct Orchestrator {
    store: Arc<CreationStore>,
    synthesizer: Arc<dyn Synthesizer>,
    session: Arc<SessionState>,
    stage_cadence: Duration,
}

impl Orchestrator {
    pub fn new(store: Arc<CreationStore>, synthesizer: Arc<dyn Synthesizer>) -> Self {
        Self {
            store,
            synthesizer,
            session: Arc::new(SessionState::default()),
            stage_cadence: DEFAULT_STAGE_CADENCE,
        }
    }

    pub fn with_stage_cadence(mut self, cadence: Duration) -> Self {
        self.stage_cadence = cadence;
        self
    }

    pub fn session(&self) -> &Arc<SessionState> {
        &self.session
    }

    pub fn store(&self) -> &Arc<CreationStore> {
        &self.store
    }

    /// Submit a generation request.
    ///
    /// Returns `Ok(false)` when the submission is ignored (a generation is
    /// already in flight, or input is disabled) - a silent no-op, matching
    /// the input surface being inert in those states. Validation errors are
    /// reported synchronously and nothing is submitted.
    pub fn submit(
        &self,
        prompt: &str,
        artifact: Option<IncomingArtifact>,
    ) -> Result<bool, AcquisitionError> {
        if !self.session.accepting_submissions() {
            debug!("submission ignored: generation in flight or input disabled");
            return Ok(false);
        }

        let request = acquisition::build_request(prompt, artifact)?;

        if !self.session.begin_submission() {
            debug!("submission ignored: in-flight slot claimed concurrently");
            return Ok(false);
        }

        info!(name = %request.name, "submitting generation request");
        let store = self.store.clone();
        let synthesizer = self.synthesizer.clone();
        let session = self.session.clone();
        let cadence = self.stage_cadence;
        tokio::spawn(async move {
            drive_generation(store, synthesizer, session, cadence, request).await;
        });
        Ok(true)
    }
}

/// One generation from `AwaitingResult` to settlement. Owns the ticker for
/// its own request and cancels it deterministically before settling, so a
/// stale ticker can never touch a later session.
async fn drive_generation(
    store: Arc<CreationStore>,
    synthesizer: Arc<dyn Synthesizer>,
    session: Arc<SessionState>,
    cadence: Duration,
    request: GenerationRequest,
) {
    session.enter_awaiting();

    let ticker = tokio::spawn({
        let session = session.clone();
        async move {
            loop {
                tokio::time::sleep(cadence).await;
                if !session.advance_stage() {
                    break;
                }
            }
        }
    });

    let result = synthesizer
        .generate(&request.prompt, request.artifact.as_ref())
        .await;

    ticker.abort();

    match result {
        Ok(html) => {
            let creation = Creation {
                id: Uuid::new_v4(),
                name: request.name,
                html,
                original_image: request.artifact,
                timestamp: Utc::now(),
            };
            info!(id = %creation.id, name = %creation.name, "generation completed");
            store.append(creation.clone());
            session.complete(&creation);
        }
        Err(e) => {
            error!("generation failed: {e}");
            session.fail(format!("Generation failed: {e}"));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ArtifactPayload, GenerationPhase, ProgressStage};
    use crate::synthesis::SynthesisError;
    use async_trait::async_trait;
    use pretty_assertions::assert_eq;
    use tokio::sync::Notify;

    /// Scripted synthesis capability: resolves with a canned outcome,
    /// waiting on `gate` first when one is set.
    struct FakeSynthesizer {
        outcome: Result<String, String>,
        gate: Option<Arc<Notify>>,
    }

    impl FakeSynthesizer {
        fn ok(html: &str) -> Arc<Self> {
            Arc::new(Self { outcome: Ok(html.into()), gate: None })
        }

        fn failing(message: &str) -> Arc<Self> {
            Arc::new(Self { outcome: Err(message.into()), gate: None })
        }

        fn gated(html: &str) -> (Arc<Self>, Arc<Notify>) {
            let gate = Arc::new(Notify::new());
            let fake = Arc::new(Self { outcome: Ok(html.into()), gate: Some(gate.clone()) });
            (fake, gate)
        }
    }

    #[async_trait]
    impl Synthesizer for FakeSynthesizer {
        async fn generate(
            &self,
            _prompt: &str,
            _artifact: Option<&ArtifactPayload>,
        ) -> Result<String, SynthesisError> {
            if let Some(gate) = &self.gate {
                gate.notified().await;
            }
            self.outcome.clone().map_err(SynthesisError::Other)
        }
    }

    fn orchestrator(synthesizer: Arc<dyn Synthesizer>) -> Orchestrator {
        Orchestrator::new(Arc::new(CreationStore::default()), synthesizer)
            .with_stage_cadence(Duration::from_millis(5))
    }

    /// Same store and session as `previous`, different synthesis backend.
    fn rewire(previous: &Orchestrator, synthesizer: Arc<dyn Synthesizer>) -> Orchestrator {
        Orchestrator {
            store: previous.store.clone(),
            synthesizer,
            session: previous.session.clone(),
            stage_cadence: previous.stage_cadence,
        }
    }

    async fn wait_idle(orchestrator: &Orchestrator) {
        tokio::time::timeout(Duration::from_secs(2), async {
            while orchestrator.session().phase() != GenerationPhase::Idle {
                tokio::time::sleep(Duration::from_millis(2)).await;
            }
        })
        .await
        .expect("generation did not settle");
    }

    fn pdf_artifact() -> IncomingArtifact {
        IncomingArtifact {
            media_type: "application/pdf".into(),
            data: "JVBERi0=".into(),
            name: Some("plan.pdf".into()),
        }
    }

    #[tokio::test]
    async fn successful_generation_appends_exactly_one_creation() {
        let orchestrator = orchestrator(FakeSynthesizer::ok("<h1>ok</h1>"));
        assert!(orchestrator.submit("", Some(pdf_artifact())).unwrap());
        wait_idle(&orchestrator).await;

        assert_eq!(orchestrator.store().len(), 1);
        let session = orchestrator.session().preview();
        let active = orchestrator.store().select(session.active.unwrap()).unwrap();
        assert_eq!(active.html, "<h1>ok</h1>");
        assert_eq!(active.name, "plan");
        assert_eq!(active.original_image.as_ref().unwrap().data, "JVBERi0=");
        assert!(session.split_view);
        assert!(!session.loading);
        assert_eq!(orchestrator.session().notice(), None);
    }

    #[tokio::test]
    async fn prompt_only_generation_has_no_original_and_no_split() {
        let orchestrator = orchestrator(FakeSynthesizer::ok("<main></main>"));
        assert!(orchestrator.submit("a UI wireframe", None).unwrap());
        wait_idle(&orchestrator).await;

        let active = orchestrator
            .store()
            .select(orchestrator.session().preview().active.unwrap())
            .unwrap();
        assert_eq!(active.original_image, None);
        assert!(!orchestrator.session().preview().split_view);
    }

    #[tokio::test]
    async fn failed_generation_leaves_store_untouched_and_restores_display() {
        let orchestrator = orchestrator(FakeSynthesizer::ok("<h1>first</h1>"));
        orchestrator.submit("first", None).unwrap();
        wait_idle(&orchestrator).await;
        let previous = orchestrator.session().preview().active.unwrap();

        let orchestrator = rewire(&orchestrator, FakeSynthesizer::failing("backend unavailable"));
        orchestrator.submit("second", None).unwrap();
        wait_idle(&orchestrator).await;

        assert_eq!(orchestrator.store().len(), 1);
        let session = orchestrator.session().preview();
        assert_eq!(session.active, Some(previous));
        assert!(!session.loading);
        assert!(orchestrator.session().notice().unwrap().contains("backend unavailable"));
    }

    #[tokio::test]
    async fn validation_error_reports_without_submitting() {
        let orchestrator = orchestrator(FakeSynthesizer::ok("<h1>ok</h1>"));
        let artifact = IncomingArtifact {
            media_type: "application/zip".into(),
            data: "AA==".into(),
            name: None,
        };
        let err = orchestrator.submit("", Some(artifact)).unwrap_err();
        assert!(matches!(err, AcquisitionError::UnsupportedMediaType { .. }));
        assert_eq!(orchestrator.store().len(), 0);
        assert_eq!(orchestrator.session().phase(), GenerationPhase::Idle);
    }

    #[tokio::test]
    async fn second_submission_while_in_flight_is_ignored() {
        let (fake, gate) = FakeSynthesizer::gated("<h1>ok</h1>");
        let orchestrator = orchestrator(fake);

        assert!(orchestrator.submit("first", None).unwrap());
        // drop into AwaitingResult before poking at it again
        tokio::time::timeout(Duration::from_secs(2), async {
            while orchestrator.session().phase() != GenerationPhase::AwaitingResult {
                tokio::time::sleep(Duration::from_millis(2)).await;
            }
        })
        .await
        .unwrap();

        assert!(!orchestrator.submit("second", None).unwrap());
        assert_eq!(orchestrator.session().phase(), GenerationPhase::AwaitingResult);

        gate.notify_one();
        wait_idle(&orchestrator).await;
        assert_eq!(orchestrator.store().len(), 1);
    }

    #[tokio::test]
    async fn submission_ignored_while_input_disabled() {
        let orchestrator = orchestrator(FakeSynthesizer::ok("<h1>ok</h1>"));
        orchestrator.session().set_input_disabled(true);
        assert!(!orchestrator.submit("a sketch", None).unwrap());
        assert_eq!(orchestrator.store().len(), 0);
        assert_eq!(orchestrator.session().phase(), GenerationPhase::Idle);
    }

    #[tokio::test]
    async fn stage_starts_at_zero_advances_monotonically_and_freezes_at_final() {
        let (fake, gate) = FakeSynthesizer::gated("<h1>ok</h1>");
        let orchestrator = orchestrator(fake);

        orchestrator.submit("slow one", None).unwrap();
        assert_eq!(orchestrator.session().stage(), ProgressStage::default());

        let mut last = orchestrator.session().stage();
        // 5ms cadence: well past 4 ticks, the stage must sit frozen at FINAL
        // even though the synthesis call has not resolved.
        for _ in 0..30 {
            tokio::time::sleep(Duration::from_millis(5)).await;
            let stage = orchestrator.session().stage();
            assert!(stage >= last, "stage went backwards: {:?} -> {:?}", last, stage);
            last = stage;
        }
        assert_eq!(last, ProgressStage::FINAL);
        assert!(orchestrator.session().preview().loading);

        gate.notify_one();
        wait_idle(&orchestrator).await;
        assert_eq!(orchestrator.store().len(), 1);
    }

    #[tokio::test]
    async fn stage_resets_when_a_new_generation_starts() {
        let orchestrator = orchestrator(FakeSynthesizer::ok("<h1>ok</h1>"));
        orchestrator.submit("first", None).unwrap();
        wait_idle(&orchestrator).await;

        let (fake, gate) = FakeSynthesizer::gated("<h1>ok</h1>");
        let orchestrator = rewire(&orchestrator, fake);
        orchestrator.submit("second", None).unwrap();
        assert_eq!(orchestrator.session().stage(), ProgressStage::default());
        gate.notify_one();
        wait_idle(&orchestrator).await;
    }

    #[tokio::test]
    async fn selecting_history_mid_flight_clears_loading_without_cancelling() {
        let (fake, gate) = FakeSynthesizer::gated("<h1>late</h1>");
        let orchestrator = orchestrator(FakeSynthesizer::ok("<h1>early</h1>"));
        orchestrator.submit("early", None).unwrap();
        wait_idle(&orchestrator).await;
        let early = orchestrator.session().preview().active.unwrap();

        let orchestrator = rewire(&orchestrator, fake);
        orchestrator.submit("late", None).unwrap();
        assert!(orchestrator.session().preview().loading);

        let past = orchestrator.store().select(early).unwrap();
        orchestrator.session().select(&past);
        assert!(!orchestrator.session().preview().loading);
        assert_eq!(orchestrator.session().preview().active, Some(early));

        // the in-flight generation still appends its own creation
        gate.notify_one();
        wait_idle(&orchestrator).await;
        assert_eq!(orchestrator.store().len(), 2);
    }
}
