use std::collections::HashSet;
use std::fmt;
use std::io::Read;

use serde::{Deserialize, Serialize};

/// Dashboard domain a metric is reported under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Domain {
    EmergencyDept,
    Sepsis,
    Readmissions,
    Safety,
    PatientExperience,
}

impl Domain {
    /// Canonical ordering used when grouping metrics for a narrative.
    pub const ALL: [Domain; 5] = [
        Domain::EmergencyDept,
        Domain::Sepsis,
        Domain::Readmissions,
        Domain::Safety,
        Domain::PatientExperience,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            Domain::EmergencyDept => "Emergency Department",
            Domain::Sepsis => "Sepsis",
            Domain::Readmissions => "Readmissions",
            Domain::Safety => "Safety",
            Domain::PatientExperience => "Patient Experience",
        }
    }

    fn parse(raw: &str) -> Option<Self> {
        let key: String = raw
            .chars()
            .filter(|ch| ch.is_ascii_alphanumeric())
            .collect::<String>()
            .to_ascii_lowercase();
        match key.as_str() {
            "emergencydept" | "emergencydepartment" | "ed" | "edflow" => Some(Domain::EmergencyDept),
            "sepsis" => Some(Domain::Sepsis),
            "readmissions" | "readmission" => Some(Domain::Readmissions),
            "safety" => Some(Domain::Safety),
            "patientexperience" => Some(Domain::PatientExperience),
            _ => None,
        }
    }
}

impl fmt::Display for Domain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Improvement direction declared for a metric.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    LowerIsBetter,
    HigherIsBetter,
    Neutral,
}

impl Direction {
    fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "lower" | "lowerisbetter" | "lower_is_better" => Some(Direction::LowerIsBetter),
            "higher" | "higherisbetter" | "higher_is_better" => Some(Direction::HigherIsBetter),
            "neutral" | "context" => Some(Direction::Neutral),
            _ => None,
        }
    }
}

/// Unit a metric is reported in; materiality thresholds are keyed on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MetricUnit {
    Minutes,
    Percent,
    Ratio,
    Rate,
    Score,
    Count,
}

impl MetricUnit {
    pub fn label(&self) -> &'static str {
        match self {
            MetricUnit::Minutes => "minutes",
            MetricUnit::Percent => "percent",
            MetricUnit::Ratio => "ratio",
            MetricUnit::Rate => "rate",
            MetricUnit::Score => "score",
            MetricUnit::Count => "count",
        }
    }

    fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "minutes" | "min" => Some(MetricUnit::Minutes),
            "percent" | "%" => Some(MetricUnit::Percent),
            "ratio" | "sir" => Some(MetricUnit::Ratio),
            "rate" => Some(MetricUnit::Rate),
            "score" | "linear_mean" => Some(MetricUnit::Score),
            "count" | "visits" => Some(MetricUnit::Count),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricDefinition {
    pub id: String,
    pub display_name: String,
    pub domain: Domain,
    pub unit: MetricUnit,
    pub direction: Direction,
}

impl MetricDefinition {
    pub fn new(
        id: &str,
        display_name: &str,
        domain: Domain,
        unit: MetricUnit,
        direction: Direction,
    ) -> Self {
        Self {
            id: id.to_string(),
            display_name: display_name.to_string(),
            domain,
            unit,
            direction,
        }
    }
}

/// Raised when a catalog cannot be trusted to drive classification.
#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("metric catalog is empty")]
    Empty,
    #[error("metric id must not be blank")]
    BlankId,
    #[error("duplicate metric id `{0}` in catalog")]
    DuplicateMetric(String),
    #[error("metric `{id}` declares unknown {field} `{value}`")]
    UnknownValue {
        id: String,
        field: &'static str,
        value: String,
    },
    #[error("invalid catalog CSV: {0}")]
    Csv(#[from] csv::Error),
}

/// Read-only metric table in canonical (domain, declaration) order.
#[derive(Debug, Clone, PartialEq)]
pub struct MetricCatalog {
    metrics: Vec<MetricDefinition>,
}

impl MetricCatalog {
    pub fn new(definitions: Vec<MetricDefinition>) -> Result<Self, CatalogError> {
        if definitions.is_empty() {
            return Err(CatalogError::Empty);
        }

        let mut seen = HashSet::new();
        for definition in &definitions {
            if definition.id.trim().is_empty() {
                return Err(CatalogError::BlankId);
            }
            if !seen.insert(definition.id.as_str()) {
                return Err(CatalogError::DuplicateMetric(definition.id.clone()));
            }
        }

        let mut metrics = definitions;
        // Stable sort keeps declaration order within a domain.
        metrics.sort_by_key(|metric| metric.domain);
        Ok(Self { metrics })
    }

    /// Parse a `Measure ID,Name,Domain,Unit,Direction` CSV export.
    pub fn from_reader<R: Read>(reader: R) -> Result<Self, CatalogError> {
        let mut csv_reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_reader(reader);
        let mut definitions = Vec::new();

        for row in csv_reader.deserialize::<CatalogRow>() {
            let row = row?;
            definitions.push(row.into_definition()?);
        }

        Self::new(definitions)
    }

    /// Built-in catalog covering the dashboard's five domains.
    pub fn standard() -> Self {
        use Direction::*;
        use Domain::*;
        use MetricUnit::*;

        let definitions = vec![
            MetricDefinition::new("OP_18b", "ED throughput time (median)", EmergencyDept, Minutes, LowerIsBetter),
            MetricDefinition::new("OP_18c", "ED throughput time for psychiatric and mental health patients (median)", EmergencyDept, Minutes, LowerIsBetter),
            MetricDefinition::new("OP_22", "Patients who left the ED before being seen", EmergencyDept, Percent, LowerIsBetter),
            MetricDefinition::new("OP_23", "Stroke patients receiving head CT results within the target window", EmergencyDept, Percent, HigherIsBetter),
            MetricDefinition::new("EDV", "Emergency department annual visit volume", EmergencyDept, Count, Neutral),
            MetricDefinition::new("SEP_1", "Sepsis bundle compliance", Sepsis, Percent, HigherIsBetter),
            MetricDefinition::new("SEP_SH_3HR", "Septic shock care within 3 hours", Sepsis, Percent, HigherIsBetter),
            MetricDefinition::new("SEP_SH_6HR", "Septic shock care within 6 hours", Sepsis, Percent, HigherIsBetter),
            MetricDefinition::new("SEV_SEP_3HR", "Severe sepsis care within 3 hours", Sepsis, Percent, HigherIsBetter),
            MetricDefinition::new("SEV_SEP_6HR", "Severe sepsis care within 6 hours", Sepsis, Percent, HigherIsBetter),
            MetricDefinition::new("READM_30_AMI", "Heart attack readmission rate", Readmissions, Rate, LowerIsBetter),
            MetricDefinition::new("READM_30_HF", "Heart failure readmission rate", Readmissions, Rate, LowerIsBetter),
            MetricDefinition::new("READM_30_PN", "Pneumonia readmission rate", Readmissions, Rate, LowerIsBetter),
            MetricDefinition::new("READM_30_HIP_KNEE", "Hip and knee replacement readmission rate", Readmissions, Rate, LowerIsBetter),
            MetricDefinition::new("HAI_1_SIR", "Central line bloodstream infection ratio", Safety, Ratio, LowerIsBetter),
            MetricDefinition::new("HAI_2_SIR", "Catheter urinary tract infection ratio", Safety, Ratio, LowerIsBetter),
            MetricDefinition::new("HAI_6_SIR", "C. difficile infection ratio", Safety, Ratio, LowerIsBetter),
            MetricDefinition::new("MORT_30_HF", "Heart failure death rate", Safety, Rate, LowerIsBetter),
            MetricDefinition::new("PSI_90", "Serious complications composite", Safety, Ratio, LowerIsBetter),
            MetricDefinition::new("IMM_3", "Healthcare personnel influenza vaccination", Safety, Percent, HigherIsBetter),
            MetricDefinition::new("H_COMP_1_LINEAR_SCORE", "Nurse communication", PatientExperience, Score, HigherIsBetter),
            MetricDefinition::new("H_COMP_2_LINEAR_SCORE", "Doctor communication", PatientExperience, Score, HigherIsBetter),
            MetricDefinition::new("H_CLEAN_LINEAR_SCORE", "Cleanliness of hospital environment", PatientExperience, Score, HigherIsBetter),
            MetricDefinition::new("H_HSP_RATING_LINEAR_SCORE", "Overall hospital rating", PatientExperience, Score, HigherIsBetter),
            MetricDefinition::new("H_RECMND_LINEAR_SCORE", "Willingness to recommend the hospital", PatientExperience, Score, HigherIsBetter),
        ];

        // Already in domain order; uniqueness is covered by `standard_catalog_is_valid`.
        Self {
            metrics: definitions,
        }
    }

    pub fn metrics(&self) -> &[MetricDefinition] {
        &self.metrics
    }

    pub fn len(&self) -> usize {
        self.metrics.len()
    }

    pub fn is_empty(&self) -> bool {
        self.metrics.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&MetricDefinition> {
        self.metrics.iter().find(|metric| metric.id == id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.get(id).is_some()
    }

    pub fn in_domain(&self, domain: Domain) -> impl Iterator<Item = &MetricDefinition> {
        self.metrics
            .iter()
            .filter(move |metric| metric.domain == domain)
    }

    /// Domains from `Domain::ALL` with no cataloged metric.
    pub fn uncovered_domains(&self) -> Vec<Domain> {
        Domain::ALL
            .into_iter()
            .filter(|domain| self.in_domain(*domain).next().is_none())
            .collect()
    }
}

#[derive(Debug, Deserialize)]
struct CatalogRow {
    #[serde(rename = "Measure ID")]
    id: String,
    #[serde(rename = "Name")]
    name: String,
    #[serde(rename = "Domain")]
    domain: String,
    #[serde(rename = "Unit")]
    unit: String,
    #[serde(rename = "Direction")]
    direction: String,
}

impl CatalogRow {
    fn into_definition(self) -> Result<MetricDefinition, CatalogError> {
        let unknown = |field: &'static str, value: &str| CatalogError::UnknownValue {
            id: self.id.clone(),
            field,
            value: value.to_string(),
        };

        let domain = Domain::parse(&self.domain).ok_or_else(|| unknown("domain", &self.domain))?;
        let unit = MetricUnit::parse(&self.unit).ok_or_else(|| unknown("unit", &self.unit))?;
        let direction =
            Direction::parse(&self.direction).ok_or_else(|| unknown("direction", &self.direction))?;
        let display_name = if self.name.is_empty() {
            self.id.clone()
        } else {
            self.name.clone()
        };

        Ok(MetricDefinition {
            id: self.id,
            display_name,
            domain,
            unit,
            direction,
        })
    }
}
