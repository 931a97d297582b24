use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::catalog::Domain;
use super::classifier::{classify, DirectionLabel, MaterialityPolicy, MetricAssessment};
use super::dataset::DatasetSnapshot;
use super::resolver::{MatchMethod, ResolvedFacility};

/// Topics a grounded narrative must never cover.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DisallowedTopic {
    CausalExplanation,
    Prediction,
    ExternalComparison,
}

impl DisallowedTopic {
    pub const ALL: [DisallowedTopic; 3] = [
        DisallowedTopic::CausalExplanation,
        DisallowedTopic::Prediction,
        DisallowedTopic::ExternalComparison,
    ];

    pub fn describe(&self) -> &'static str {
        match self {
            DisallowedTopic::CausalExplanation => "causal explanations of why a metric moved",
            DisallowedTopic::Prediction => "predictions or forecasts of future performance",
            DisallowedTopic::ExternalComparison => {
                "comparisons to facilities other than the selected one"
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FacilityIdentity {
    pub facility_id: String,
    pub name: String,
    pub aliases: Vec<String>,
    pub state: String,
    pub match_method: MatchMethod,
    pub match_score: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DomainSection {
    pub domain: Domain,
    pub assessments: Vec<MetricAssessment>,
}

/// Fact-only grounding payload for one narrative request.
///
/// Fields are private: once assembled a context is only read. Build a new one
/// to get a different view.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NarrativeContext {
    facility: FacilityIdentity,
    domains: Vec<DomainSection>,
    data_vintage: Option<NaiveDate>,
    disallowed_topics: Vec<DisallowedTopic>,
}

impl NarrativeContext {
    pub fn facility(&self) -> &FacilityIdentity {
        &self.facility
    }

    pub fn domains(&self) -> &[DomainSection] {
        &self.domains
    }

    pub fn data_vintage(&self) -> Option<NaiveDate> {
        self.data_vintage
    }

    pub fn disallowed_topics(&self) -> &[DisallowedTopic] {
        &self.disallowed_topics
    }

    pub fn assessments(&self) -> impl Iterator<Item = &MetricAssessment> {
        self.domains
            .iter()
            .flat_map(|section| section.assessments.iter())
    }

    pub fn count_with_label(&self, label: DirectionLabel) -> usize {
        self.assessments()
            .filter(|assessment| assessment.label == label)
            .count()
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum AssemblyError {
    #[error("reference dataset has no vintage; narratives must be dateable")]
    MissingVintage,
    #[error("metric catalog does not cover: {}", .missing.join(", "))]
    IncompleteCatalogCoverage { missing: Vec<String> },
}

/// Builds a [`NarrativeContext`] from one snapshot's catalog and vintage.
pub struct ContextAssembler<'a> {
    snapshot: &'a DatasetSnapshot,
    materiality: &'a MaterialityPolicy,
}

impl<'a> ContextAssembler<'a> {
    pub fn new(snapshot: &'a DatasetSnapshot, materiality: &'a MaterialityPolicy) -> Self {
        Self {
            snapshot,
            materiality,
        }
    }

    pub fn assemble(&self, resolved: &ResolvedFacility<'_>) -> Result<NarrativeContext, AssemblyError> {
        let data_vintage = self.snapshot.vintage.ok_or(AssemblyError::MissingVintage)?;

        let catalog = &self.snapshot.catalog;
        let uncovered = catalog.uncovered_domains();
        if !uncovered.is_empty() {
            return Err(AssemblyError::IncompleteCatalogCoverage {
                missing: uncovered
                    .iter()
                    .map(|domain| domain.label().to_string())
                    .collect(),
            });
        }

        let record = resolved.record;
        let domains = Domain::ALL
            .into_iter()
            .map(|domain| DomainSection {
                domain,
                assessments: catalog
                    .in_domain(domain)
                    .map(|metric| {
                        classify(
                            metric,
                            record.observed_value(&metric.id),
                            record.benchmark_value(&metric.id),
                            self.materiality,
                        )
                    })
                    .collect(),
            })
            .collect();

        Ok(NarrativeContext {
            facility: FacilityIdentity {
                facility_id: record.facility_id.clone(),
                name: record.canonical_name.clone(),
                aliases: record.aliases.clone(),
                state: record.state.clone(),
                match_method: resolved.match_method,
                match_score: resolved.match_score,
            },
            domains,
            data_vintage: Some(data_vintage),
            disallowed_topics: DisallowedTopic::ALL.to_vec(),
        })
    }
}
