use crate::infra::{build_orchestrator, ConfiguredProvider};
use clap::Args;
use quality_narrative::config::AppConfig;
use quality_narrative::error::AppError;
use quality_narrative::narrative::{
    DirectionLabel, NarrativeContext, NarrativeReport, SnapshotStore,
};
use quality_narrative::narrative::dataset::DatasetLoader;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Args, Debug)]
pub(crate) struct SummaryArgs {
    /// Facility name as a user would type it
    #[arg(long)]
    pub(crate) facility: String,
    /// Dataset directory (defaults to APP_DATASET_DIR)
    #[arg(long)]
    pub(crate) dataset: Option<PathBuf>,
    /// Use the deterministic template provider instead of the language model
    #[arg(long)]
    pub(crate) offline: bool,
    /// Print the full report as JSON
    #[arg(long)]
    pub(crate) json: bool,
}

pub(crate) async fn run_summary(args: SummaryArgs) -> Result<(), AppError> {
    let SummaryArgs {
        facility,
        dataset,
        offline,
        json,
    } = args;

    let mut config = AppConfig::load()?;
    if let Some(dir) = dataset {
        config.dataset.dir = dir;
    }

    let snapshot = DatasetLoader::from_dir(&config.dataset.dir)?;
    let store = Arc::new(SnapshotStore::new(snapshot));
    let provider = Arc::new(ConfiguredProvider::from_config(&config, offline)?);
    let provider_name = provider.name();
    let orchestrator = build_orchestrator(&config, store, provider)?;

    let report = orchestrator.generate_summary(&facility).await.into_result()?;

    if json {
        let rendered = serde_json::to_string_pretty(&report)
            .map_err(|err| AppError::Io(std::io::Error::new(std::io::ErrorKind::Other, err)))?;
        println!("{rendered}");
        return Ok(());
    }

    render_report(&report, provider_name);
    Ok(())
}

fn render_report(report: &NarrativeReport, provider_name: &str) {
    if let Some(note) = &report.resolution_note {
        println!("{note}\n");
    }
    println!("{}", report.narrative);

    println!("\nGrounding context ({provider_name}, {} attempt(s))", report.attempts);
    render_context(&report.context);
}

fn render_context(context: &NarrativeContext) {
    let facility = context.facility();
    println!(
        "- Facility: {} [{}] matched {:?} ({:.2})",
        facility.name, facility.facility_id, facility.match_method, facility.match_score
    );
    if let Some(vintage) = context.data_vintage() {
        println!("- Data vintage: {vintage}");
    }

    for section in context.domains() {
        println!("\n{}", section.domain);
        for assessment in &section.assessments {
            let marker = match assessment.label {
                DirectionLabel::Favorable => "+",
                DirectionLabel::Unfavorable => "-",
                DirectionLabel::Neutral => "=",
                DirectionLabel::InsufficientData => "?",
            };
            let value = assessment
                .facility_value
                .map(|value| format!("{value}"))
                .unwrap_or_else(|| "n/a".to_string());
            let benchmark = assessment
                .benchmark_value
                .map(|value| format!("{value}"))
                .unwrap_or_else(|| "n/a".to_string());
            println!(
                "  {marker} {} ({}): {value} vs national {benchmark} [{}]",
                assessment.display_name,
                assessment.metric_id,
                assessment.label.label()
            );
        }
    }
}
