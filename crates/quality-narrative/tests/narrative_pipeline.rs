mod support;

use std::io::Cursor;
use std::sync::Arc;
use std::time::Duration;

use chrono::NaiveDate;
use quality_narrative::narrative::catalog::{Direction, Domain, MetricCatalog, MetricDefinition, MetricUnit};
use quality_narrative::narrative::orchestrator::{AssemblyFailure, GenerationFailure};
use quality_narrative::narrative::provider::ProviderError;
use quality_narrative::narrative::{
    DatasetLoader, DirectionLabel, FailureKind, GuardrailConfig, GuardrailValidator, MatchMethod,
    NarrativeOrchestrator, NarrativeOutcome, OrchestratorSettings, SnapshotStore,
};
use support::{orchestrator, sample_snapshot, Reply, ScriptedProvider};

const UNGROUNDED: &str = "St. Mary's Medical Center reached 97% sepsis compliance because of new staffing.";

fn sample_store() -> Arc<SnapshotStore> {
    Arc::new(SnapshotStore::new(sample_snapshot()))
}

#[tokio::test]
async fn st_marys_query_produces_grounded_summary() {
    let provider = Arc::new(ScriptedProvider::new(vec![Reply::Grounded]));
    let orchestrator = orchestrator(sample_store(), provider.clone());

    let report = orchestrator
        .generate_summary("st marys")
        .await
        .into_result()
        .expect("summary generated");

    let facility = report.context.facility();
    assert_eq!(facility.name, "St. Mary's Medical Center");
    assert_eq!(facility.match_method, MatchMethod::Normalized);
    assert_eq!(report.attempts, 1);
    assert_eq!(provider.calls(), 1);
    assert_eq!(
        report.context.data_vintage(),
        NaiveDate::from_ymd_opt(2025, 10, 1)
    );

    let domains: Vec<Domain> = report.context.domains().iter().map(|s| s.domain).collect();
    assert_eq!(domains, Domain::ALL.to_vec());
    assert_eq!(report.context.assessments().count(), 25);

    let sepsis = report
        .context
        .assessments()
        .find(|a| a.metric_id == "SEP_1")
        .expect("sepsis bundle present");
    assert_eq!(sepsis.label, DirectionLabel::Favorable);

    let ed = report
        .context
        .assessments()
        .find(|a| a.metric_id == "OP_18b")
        .expect("ED throughput present");
    assert_eq!(ed.label, DirectionLabel::Unfavorable);

    let stroke = report
        .context
        .assessments()
        .find(|a| a.metric_id == "OP_23")
        .expect("stroke CT present");
    assert_eq!(stroke.label, DirectionLabel::InsufficientData);

    assert!(report.narrative.contains("St. Mary's Medical Center"));
    assert!(report.narrative.contains("Data as of October 1, 2025"));
}

#[tokio::test]
async fn one_regeneration_recovers_from_rejected_draft() {
    let provider = Arc::new(ScriptedProvider::new(vec![
        Reply::Text(UNGROUNDED),
        Reply::Grounded,
    ]));
    let orchestrator = orchestrator(sample_store(), provider.clone());

    let report = orchestrator
        .generate_summary("St. Mary's Medical Center")
        .await
        .into_result()
        .expect("second draft accepted");

    assert_eq!(report.attempts, 2);
    let prompts = provider.prompts();
    assert_eq!(prompts.len(), 2);
    assert!(prompts[0].correction.is_none());
    let correction = prompts[1].correction.as_deref().expect("correction sent");
    assert!(correction.contains("(97)"));
    assert_eq!(prompts[0].context_payload, prompts[1].context_payload);
}

#[tokio::test]
async fn second_rejection_is_a_guardrail_failure() {
    let provider = Arc::new(ScriptedProvider::new(vec![Reply::Text(UNGROUNDED)]));
    let orchestrator = orchestrator(sample_store(), provider.clone());

    let failure = orchestrator
        .generate_summary("St. Mary's Medical Center")
        .await
        .into_result()
        .expect_err("never grounded");

    assert_eq!(failure.kind, FailureKind::GuardrailFailure);
    assert_eq!(provider.calls(), 2);
    assert!(failure
        .violations
        .iter()
        .any(|violation| violation.token == "97"));
}

#[tokio::test]
async fn provider_errors_are_not_retried() {
    let provider = Arc::new(ScriptedProvider::new(vec![Reply::Fail(ProviderError::Api {
        status: 529,
        message: "overloaded".to_string(),
    })]));
    let orchestrator = orchestrator(sample_store(), provider.clone());

    let outcome = orchestrator.generate_summary("st marys").await;
    assert!(matches!(
        outcome,
        NarrativeOutcome::GenerationFailed(GenerationFailure::Provider(ProviderError::Api { status: 529, .. }))
    ));
    assert_eq!(provider.calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn slow_provider_times_out_without_retry() {
    let provider = Arc::new(ScriptedProvider::new(vec![Reply::Stall(Duration::from_secs(120))]));
    let validator = GuardrailValidator::new(GuardrailConfig::default()).expect("lexicon");
    let settings = OrchestratorSettings {
        generation_timeout: Duration::from_secs(5),
        ..OrchestratorSettings::default()
    };
    let orchestrator =
        NarrativeOrchestrator::new(sample_store(), provider.clone(), validator, settings);

    let failure = orchestrator
        .generate_summary("st marys")
        .await
        .into_result()
        .expect_err("timed out");

    assert_eq!(failure.kind, FailureKind::ProviderTimeout);
    assert_eq!(provider.calls(), 1);
}

#[tokio::test]
async fn missing_vintage_stops_before_generation() {
    let snapshot = sample_snapshot();
    let undated = quality_narrative::narrative::DatasetSnapshot {
        vintage: None,
        ..snapshot
    };
    let provider = Arc::new(ScriptedProvider::new(vec![Reply::Grounded]));
    let orchestrator = orchestrator(Arc::new(SnapshotStore::new(undated)), provider.clone());

    let outcome = orchestrator.generate_summary("st marys").await;
    assert!(matches!(outcome, NarrativeOutcome::AssemblyFailed(_)));
    let failure = outcome.into_result().expect_err("undated");
    assert_eq!(failure.kind, FailureKind::MissingVintage);
    assert_eq!(provider.calls(), 0);
}

#[tokio::test]
async fn catalog_missing_a_domain_is_rejected() {
    let catalog = MetricCatalog::new(vec![MetricDefinition::new(
        "SEP_1",
        "Sepsis bundle compliance",
        Domain::Sepsis,
        MetricUnit::Percent,
        Direction::HigherIsBetter,
    )])
    .expect("valid catalog");
    let snapshot = DatasetLoader::from_readers(
        catalog,
        Cursor::new("Facility ID,Facility Name,State,Aliases\n1,Alpha Hospital,IA,\n"),
        Cursor::new("Facility ID,Measure ID,Score,National Average\n1,SEP_1,70,61\n"),
        NaiveDate::from_ymd_opt(2025, 10, 1),
    )
    .expect("dataset loads");
    let provider = Arc::new(ScriptedProvider::new(vec![Reply::Grounded]));
    let orchestrator = orchestrator(Arc::new(SnapshotStore::new(snapshot)), provider.clone());

    let outcome = orchestrator.generate_summary("Alpha Hospital").await;
    match &outcome {
        NarrativeOutcome::AssemblyFailed(AssemblyFailure::Assembly(error)) => {
            assert!(error.to_string().contains("Emergency Department"));
        }
        other => panic!("unexpected outcome: {other:?}"),
    }
    assert_eq!(
        outcome.into_result().expect_err("incomplete").kind,
        FailureKind::IncompleteCatalogCoverage
    );
    assert_eq!(provider.calls(), 0);
}

#[tokio::test]
async fn unresolvable_query_never_reaches_provider() {
    let provider = Arc::new(ScriptedProvider::new(vec![Reply::Grounded]));
    let orchestrator = orchestrator(sample_store(), provider.clone());

    let failure = orchestrator
        .generate_summary("Oakwood Community Hospital Sorth")
        .await
        .into_result()
        .expect_err("ambiguous");
    assert_eq!(failure.kind, FailureKind::AmbiguousMatch);
    assert!(failure.message.contains("Oakwood Community Hospital North"));
    assert!(failure.message.contains("Oakwood Community Hospital South"));

    let failure = orchestrator
        .generate_summary("")
        .await
        .into_result()
        .expect_err("blank");
    assert_eq!(failure.kind, FailureKind::NoMatch);
    assert_eq!(provider.calls(), 0);
}

#[tokio::test]
async fn repeated_requests_build_identical_contexts() {
    let provider = Arc::new(ScriptedProvider::new(vec![Reply::Grounded]));
    let orchestrator = orchestrator(sample_store(), provider);

    let first = orchestrator
        .generate_summary("Riverside Regional Hospital")
        .await
        .into_result()
        .expect("first");
    let second = orchestrator
        .generate_summary("Riverside Regional Hospital")
        .await
        .into_result()
        .expect("second");

    assert_eq!(first.context, second.context);
    assert_eq!(first.narrative, second.narrative);
}
