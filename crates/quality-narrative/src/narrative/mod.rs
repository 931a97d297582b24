//! Grounded narrative generation for hospital quality metrics.
//!
//! A request flows resolver -> context assembler -> provider -> guardrail, all
//! against one captured [`dataset::DatasetSnapshot`].

pub mod catalog;
pub mod classifier;
pub mod context;
pub mod dataset;
pub mod guardrail;
pub mod normalizer;
pub mod orchestrator;
pub mod prompt;
pub mod provider;
pub mod resolver;

pub use catalog::{Direction, Domain, MetricCatalog, MetricDefinition, MetricUnit};
pub use classifier::{classify, DirectionLabel, Materiality, MaterialityPolicy, MetricAssessment};
pub use context::{ContextAssembler, NarrativeContext};
pub use dataset::{DatasetLoader, DatasetSnapshot, FacilityRecord, FacilityRegistry, SnapshotStore};
pub use guardrail::{GuardrailConfig, GuardrailValidator, ValidationResult, Violation, ViolationKind};
pub use orchestrator::{
    FailureKind, NarrativeFailure, NarrativeOrchestrator, NarrativeOutcome, NarrativeReport,
    OrchestratorSettings,
};
pub use provider::{AnthropicProvider, AnthropicSettings, NarrativeProvider, TemplateProvider};
pub use resolver::{FacilityResolver, MatchMethod, ResolutionError, ResolverConfig};
