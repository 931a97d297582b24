#![allow(dead_code)]

use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use quality_narrative::narrative::context::NarrativeContext;
use quality_narrative::narrative::prompt::NarrativePrompt;
use quality_narrative::narrative::provider::ProviderError;
use quality_narrative::narrative::{
    DatasetLoader, DatasetSnapshot, GuardrailConfig, GuardrailValidator, NarrativeOrchestrator,
    NarrativeProvider, OrchestratorSettings, SnapshotStore, TemplateProvider,
};

pub fn data_dir() -> PathBuf {
    PathBuf::from(concat!(env!("CARGO_MANIFEST_DIR"), "/data"))
}

pub fn sample_snapshot() -> DatasetSnapshot {
    DatasetLoader::from_dir(data_dir()).expect("sample dataset loads")
}

pub fn orchestrator<P: NarrativeProvider + 'static>(
    store: Arc<SnapshotStore>,
    provider: Arc<P>,
) -> NarrativeOrchestrator<P> {
    let validator = GuardrailValidator::new(GuardrailConfig::default()).expect("lexicon compiles");
    NarrativeOrchestrator::new(store, provider, validator, OrchestratorSettings::default())
}

/// What a scripted provider does on each call.
#[derive(Clone)]
pub enum Reply {
    /// Text built from the context by the template provider.
    Grounded,
    Text(&'static str),
    Fail(ProviderError),
    Stall(Duration),
}

/// Replays `replies` in order (the last one repeats) and records every prompt it saw.
pub struct ScriptedProvider {
    replies: Vec<Reply>,
    prompts: Mutex<Vec<NarrativePrompt>>,
}

impl ScriptedProvider {
    pub fn new(replies: Vec<Reply>) -> Self {
        Self {
            replies,
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn prompts(&self) -> Vec<NarrativePrompt> {
        self.prompts.lock().expect("prompt log").clone()
    }

    pub fn calls(&self) -> usize {
        self.prompts.lock().expect("prompt log").len()
    }
}

#[async_trait]
impl NarrativeProvider for ScriptedProvider {
    async fn generate(
        &self,
        prompt: &NarrativePrompt,
        context: &NarrativeContext,
    ) -> Result<String, ProviderError> {
        let call = {
            let mut prompts = self.prompts.lock().expect("prompt log");
            prompts.push(prompt.clone());
            prompts.len() - 1
        };
        let reply = self
            .replies
            .get(call)
            .or_else(|| self.replies.last())
            .cloned()
            .unwrap_or(Reply::Grounded);

        match reply {
            Reply::Grounded => Ok(TemplateProvider::render(context)),
            Reply::Text(text) => Ok(text.to_string()),
            Reply::Fail(error) => Err(error),
            Reply::Stall(duration) => {
                tokio::time::sleep(duration).await;
                Ok(TemplateProvider::render(context))
            }
        }
    }
}
