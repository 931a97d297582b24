use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tracing::{debug, info, warn};

use super::classifier::MaterialityPolicy;
use super::context::{AssemblyError, ContextAssembler, NarrativeContext};
use super::dataset::{DatasetError, SnapshotStore};
use super::guardrail::{GuardrailValidator, Violation};
use super::prompt::NarrativePrompt;
use super::provider::{NarrativeProvider, ProviderError};
use super::resolver::{FacilityResolver, ResolutionError, ResolverConfig};

/// Generation attempts per request: the first try plus one regeneration.
pub const MAX_GENERATION_ATTEMPTS: u8 = 2;

#[derive(Debug, Clone, PartialEq)]
pub struct OrchestratorSettings {
    pub resolver: ResolverConfig,
    pub materiality: MaterialityPolicy,
    pub generation_timeout: Duration,
}

impl Default for OrchestratorSettings {
    fn default() -> Self {
        Self {
            resolver: ResolverConfig::default(),
            materiality: MaterialityPolicy::default(),
            generation_timeout: Duration::from_secs(30),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NarrativeStage {
    Resolving,
    Assembling,
    Generating,
    Validating,
    Done,
}

impl NarrativeStage {
    /// Forward edges plus the single `Validating -> Generating` regeneration edge.
    pub fn can_advance_to(self, next: NarrativeStage) -> bool {
        use NarrativeStage::*;
        matches!(
            (self, next),
            (Resolving, Assembling)
                | (Assembling, Generating)
                | (Generating, Validating)
                | (Validating, Generating)
                | (Validating, Done)
        )
    }
}

/// Validated narrative plus the facts it was written from.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NarrativeReport {
    pub narrative: String,
    pub context: NarrativeContext,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resolution_note: Option<String>,
    pub attempts: u8,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GuardrailFailure {
    pub attempts: u8,
    pub violations: Vec<Violation>,
}

impl fmt::Display for GuardrailFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "narrative failed grounding checks after {} attempt(s)",
            self.attempts
        )?;
        if let Some(first) = self.violations.first() {
            write!(f, ": {} ({})", first.message, first.token)?;
        }
        Ok(())
    }
}

/// Assembly-stage failures, including a snapshot that could not be read.
#[derive(Debug, thiserror::Error)]
pub enum AssemblyFailure {
    #[error(transparent)]
    Assembly(#[from] AssemblyError),
    #[error("context failed preflight: {}", summarize(.0))]
    Preflight(Vec<Violation>),
    #[error("could not build provider prompt: {0}")]
    Prompt(#[from] serde_json::Error),
    #[error(transparent)]
    Dataset(#[from] DatasetError),
}

fn summarize(violations: &[Violation]) -> String {
    violations
        .iter()
        .map(|violation| format!("{} {}", violation.token, violation.message))
        .collect::<Vec<_>>()
        .join("; ")
}

#[derive(Debug, thiserror::Error)]
pub enum GenerationFailure {
    #[error(transparent)]
    Provider(#[from] ProviderError),
    #[error("provider did not respond within {0:?}")]
    Timeout(Duration),
}

/// Terminal state of one `generate_summary` call.
#[derive(Debug)]
pub enum NarrativeOutcome {
    Done(Box<NarrativeReport>),
    ResolutionFailed(ResolutionError),
    AssemblyFailed(AssemblyFailure),
    GenerationFailed(GenerationFailure),
    GuardrailFailed(GuardrailFailure),
}

/// Error kinds reported to callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum FailureKind {
    NoMatch,
    AmbiguousMatch,
    MissingVintage,
    IncompleteCatalogCoverage,
    ProviderError,
    ProviderTimeout,
    GuardrailFailure,
}

/// Structured `{kind, message}` error object for the inbound interface.
#[derive(Debug, Clone, PartialEq, Serialize, thiserror::Error)]
#[error("{message}")]
pub struct NarrativeFailure {
    pub kind: FailureKind,
    pub message: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub violations: Vec<Violation>,
}

impl NarrativeOutcome {
    pub fn into_result(self) -> Result<NarrativeReport, NarrativeFailure> {
        let failure = |kind, message: String| NarrativeFailure {
            kind,
            message,
            violations: Vec::new(),
        };

        match self {
            NarrativeOutcome::Done(report) => Ok(*report),
            NarrativeOutcome::ResolutionFailed(error) => {
                let kind = match error {
                    ResolutionError::NoMatch { .. } => FailureKind::NoMatch,
                    ResolutionError::AmbiguousMatch { .. } => FailureKind::AmbiguousMatch,
                };
                Err(failure(kind, error.to_string()))
            }
            NarrativeOutcome::AssemblyFailed(error) => {
                let kind = match &error {
                    AssemblyFailure::Assembly(AssemblyError::MissingVintage) => {
                        FailureKind::MissingVintage
                    }
                    _ => FailureKind::IncompleteCatalogCoverage,
                };
                Err(failure(kind, error.to_string()))
            }
            NarrativeOutcome::GenerationFailed(error) => {
                let kind = match error {
                    GenerationFailure::Provider(_) => FailureKind::ProviderError,
                    GenerationFailure::Timeout(_) => FailureKind::ProviderTimeout,
                };
                Err(failure(kind, error.to_string()))
            }
            NarrativeOutcome::GuardrailFailed(error) => Err(NarrativeFailure {
                kind: FailureKind::GuardrailFailure,
                message: error.to_string(),
                violations: error.violations,
            }),
        }
    }
}

/// Resolve, assemble, generate, validate. Holds no per-request state.
pub struct NarrativeOrchestrator<P> {
    store: Arc<SnapshotStore>,
    provider: Arc<P>,
    validator: GuardrailValidator,
    settings: OrchestratorSettings,
}

impl<P> NarrativeOrchestrator<P>
where
    P: NarrativeProvider + 'static,
{
    pub fn new(
        store: Arc<SnapshotStore>,
        provider: Arc<P>,
        validator: GuardrailValidator,
        settings: OrchestratorSettings,
    ) -> Self {
        Self {
            store,
            provider,
            validator,
            settings,
        }
    }

    pub fn store(&self) -> &Arc<SnapshotStore> {
        &self.store
    }

    pub fn validator(&self) -> &GuardrailValidator {
        &self.validator
    }

    pub async fn generate_summary(&self, query: &str) -> NarrativeOutcome {
        let mut stage = StageTracker::new(query);

        // One snapshot for the whole request, whatever reloads happen meanwhile.
        let snapshot = match self.store.current() {
            Ok(snapshot) => snapshot,
            Err(error) => return NarrativeOutcome::AssemblyFailed(error.into()),
        };

        let resolver = FacilityResolver::new(&snapshot.registry, self.settings.resolver);
        let resolved = match resolver.resolve(query) {
            Ok(resolved) => resolved,
            Err(error) => {
                info!(query, %error, "facility resolution failed");
                return NarrativeOutcome::ResolutionFailed(error);
            }
        };
        debug!(
            facility_id = %resolved.record.facility_id,
            method = ?resolved.match_method,
            score = resolved.match_score,
            "facility resolved"
        );

        stage.advance(NarrativeStage::Assembling);
        let assembler = ContextAssembler::new(&snapshot, &self.settings.materiality);
        let context = match assembler.assemble(&resolved) {
            Ok(context) => context,
            Err(error) => return NarrativeOutcome::AssemblyFailed(error.into()),
        };
        let preflight = self.validator.preflight(&context, &snapshot.catalog);
        if !preflight.is_empty() {
            warn!(violations = preflight.len(), "context failed preflight");
            return NarrativeOutcome::AssemblyFailed(AssemblyFailure::Preflight(preflight));
        }
        let base_prompt =
            match NarrativePrompt::for_context(&context, self.validator.config().max_words) {
                Ok(prompt) => prompt,
                Err(error) => return NarrativeOutcome::AssemblyFailed(error.into()),
            };

        let mut prompt = base_prompt.clone();
        let mut attempts = 0u8;
        loop {
            stage.advance(NarrativeStage::Generating);
            attempts += 1;

            let narrative = match tokio::time::timeout(
                self.settings.generation_timeout,
                self.provider.generate(&prompt, &context),
            )
            .await
            {
                Ok(Ok(text)) => text,
                Ok(Err(error)) => {
                    warn!(%error, attempts, "narrative provider failed");
                    return NarrativeOutcome::GenerationFailed(error.into());
                }
                Err(_) => {
                    warn!(attempts, "narrative provider timed out");
                    return NarrativeOutcome::GenerationFailed(GenerationFailure::Timeout(
                        self.settings.generation_timeout,
                    ));
                }
            };

            stage.advance(NarrativeStage::Validating);
            let result = self.validator.postflight(&context, &narrative);
            if result.passed {
                stage.advance(NarrativeStage::Done);
                info!(
                    facility_id = %context.facility().facility_id,
                    attempts,
                    "narrative validated"
                );
                return NarrativeOutcome::Done(Box::new(NarrativeReport {
                    resolution_note: resolved.resolution_note(),
                    narrative,
                    context,
                    attempts,
                }));
            }

            warn!(
                attempts,
                violations = result.violations.len(),
                "narrative rejected by postflight"
            );
            if attempts >= MAX_GENERATION_ATTEMPTS {
                return NarrativeOutcome::GuardrailFailed(GuardrailFailure {
                    attempts,
                    violations: result.violations,
                });
            }
            prompt = base_prompt.with_correction(&result.violations);
        }
    }
}

/// Logs stage transitions and flags any edge the state machine does not allow.
struct StageTracker<'q> {
    query: &'q str,
    current: NarrativeStage,
}

impl<'q> StageTracker<'q> {
    fn new(query: &'q str) -> Self {
        debug!(query, stage = ?NarrativeStage::Resolving, "narrative request started");
        Self {
            query,
            current: NarrativeStage::Resolving,
        }
    }

    fn advance(&mut self, next: NarrativeStage) {
        debug_assert!(
            self.current.can_advance_to(next),
            "illegal narrative transition {:?} -> {:?}",
            self.current,
            next
        );
        debug!(query = self.query, from = ?self.current, to = ?next, "narrative stage");
        self.current = next;
    }
}
