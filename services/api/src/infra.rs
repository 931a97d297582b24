use async_trait::async_trait;
use metrics_exporter_prometheus::PrometheusHandle;
use quality_narrative::config::{AppConfig, ProviderKind};
use quality_narrative::error::AppError;
use quality_narrative::narrative::context::NarrativeContext;
use quality_narrative::narrative::prompt::NarrativePrompt;
use quality_narrative::narrative::provider::ProviderError;
use quality_narrative::narrative::{
    AnthropicProvider, GuardrailValidator, MaterialityPolicy, NarrativeOrchestrator,
    NarrativeProvider, OrchestratorSettings, SnapshotStore, TemplateProvider,
};
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

/// Provider picked at startup from `APP_NARRATIVE_PROVIDER` or `--offline`.
pub(crate) enum ConfiguredProvider {
    Anthropic(AnthropicProvider),
    Template(TemplateProvider),
}

#[async_trait]
impl NarrativeProvider for ConfiguredProvider {
    async fn generate(
        &self,
        prompt: &NarrativePrompt,
        context: &NarrativeContext,
    ) -> Result<String, ProviderError> {
        match self {
            ConfiguredProvider::Anthropic(provider) => provider.generate(prompt, context).await,
            ConfiguredProvider::Template(provider) => provider.generate(prompt, context).await,
        }
    }
}

impl ConfiguredProvider {
    pub(crate) fn from_config(config: &AppConfig, offline: bool) -> Result<Self, AppError> {
        if offline || config.generation.provider == ProviderKind::Template {
            return Ok(Self::Template(TemplateProvider));
        }

        let settings = config.generation.anthropic_settings()?;
        Ok(Self::Anthropic(AnthropicProvider::new(settings)?))
    }

    pub(crate) fn name(&self) -> &'static str {
        match self {
            ConfiguredProvider::Anthropic(_) => "anthropic",
            ConfiguredProvider::Template(_) => "template",
        }
    }
}

pub(crate) fn build_orchestrator<P>(
    config: &AppConfig,
    store: Arc<SnapshotStore>,
    provider: Arc<P>,
) -> Result<NarrativeOrchestrator<P>, AppError>
where
    P: NarrativeProvider + 'static,
{
    let validator = GuardrailValidator::new(config.guardrail)?;
    let settings = OrchestratorSettings {
        resolver: config.resolver,
        materiality: MaterialityPolicy::default(),
        generation_timeout: config.generation.generation_timeout,
    };
    Ok(NarrativeOrchestrator::new(store, provider, validator, settings))
}
