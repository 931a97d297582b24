use chrono::NaiveDate;
use serde::{Deserialize, Deserializer};
use std::collections::BTreeMap;
use std::io::Read;
use tracing::warn;

const MISSING_MARKERS: &[&str] = &[
    "not applicable",
    "not available",
    "na",
    "n/a",
    "nan",
    "",
];

#[derive(Debug)]
pub(crate) struct FacilityRow {
    pub(crate) facility_id: String,
    pub(crate) name: String,
    pub(crate) state: String,
    pub(crate) aliases: Vec<String>,
}

#[derive(Debug)]
pub(crate) struct MeasureRow {
    pub(crate) facility_id: String,
    pub(crate) metric_id: String,
    pub(crate) score: Option<f64>,
    pub(crate) national: Option<f64>,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct Manifest {
    #[serde(default, deserialize_with = "optional_date")]
    pub(crate) vintage: Option<NaiveDate>,
    #[serde(default)]
    pub(crate) source: Option<String>,
}

pub(crate) fn parse_facilities<R: Read>(reader: R) -> Result<Vec<FacilityRow>, csv::Error> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(reader);
    let mut rows = Vec::new();

    for record in csv_reader.deserialize::<RawFacilityRow>() {
        let raw = record?;
        let aliases = raw
            .aliases
            .as_deref()
            .unwrap_or_default()
            .split('|')
            .map(str::trim)
            .filter(|alias| !alias.is_empty())
            .map(str::to_string)
            .collect();

        rows.push(FacilityRow {
            facility_id: raw.facility_id,
            name: raw.name,
            state: raw.state.unwrap_or_default(),
            aliases,
        });
    }

    Ok(rows)
}

pub(crate) fn parse_measures<R: Read>(reader: R) -> Result<Vec<MeasureRow>, csv::Error> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(reader);
    let mut rows = Vec::new();
    let mut unreadable: BTreeMap<String, (usize, String)> = BTreeMap::new();

    for record in csv_reader.deserialize::<RawMeasureRow>() {
        let raw = record?;
        let mut read = |cell: Option<&str>| match cell.map(read_cell) {
            Some(ScoreCell::Number(value)) => Some(value),
            Some(ScoreCell::Text(text)) => {
                let entry = unreadable
                    .entry(raw.metric_id.clone())
                    .or_insert_with(|| (0, text));
                entry.0 += 1;
                None
            }
            Some(ScoreCell::Missing) | None => None,
        };
        let score = read(raw.score.as_deref());
        let national = read(raw.national.as_deref());

        rows.push(MeasureRow {
            facility_id: raw.facility_id,
            metric_id: raw.metric_id,
            score,
            national,
        });
    }

    for (metric_id, (count, example)) in &unreadable {
        warn!(
            metric_id = %metric_id,
            count,
            example = %example,
            "non-numeric scores treated as missing"
        );
    }

    Ok(rows)
}

pub(crate) fn parse_manifest<R: Read>(reader: R) -> Result<Manifest, serde_json::Error> {
    serde_json::from_reader(reader)
}

#[derive(Debug, Deserialize)]
struct RawFacilityRow {
    #[serde(rename = "Facility ID")]
    facility_id: String,
    #[serde(rename = "Facility Name")]
    name: String,
    #[serde(rename = "State", default)]
    state: Option<String>,
    #[serde(rename = "Aliases", default)]
    aliases: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawMeasureRow {
    #[serde(rename = "Facility ID")]
    facility_id: String,
    #[serde(rename = "Measure ID")]
    metric_id: String,
    #[serde(rename = "Score", default)]
    score: Option<String>,
    #[serde(rename = "National Average", default)]
    national: Option<String>,
}

/// One score cell as exported.
#[derive(Debug, Clone, PartialEq)]
enum ScoreCell {
    /// One of the spellings exports use for "no value".
    Missing,
    Number(f64),
    /// Categorical or malformed text such as "high".
    Text(String),
}

fn read_cell(raw: &str) -> ScoreCell {
    let trimmed = raw.trim();
    if MISSING_MARKERS.contains(&trimmed.to_ascii_lowercase().as_str()) {
        return ScoreCell::Missing;
    }

    match trimmed.replace(',', "").parse::<f64>() {
        Ok(value) if value.is_finite() => ScoreCell::Number(value),
        _ => ScoreCell::Text(trimmed.to_string()),
    }
}

fn optional_date<'de, D>(deserializer: D) -> Result<Option<NaiveDate>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<String>::deserialize(deserializer)?;
    match raw.as_deref().map(str::trim) {
        None | Some("") => Ok(None),
        Some(value) => NaiveDate::parse_from_str(value, "%Y-%m-%d")
            .map(Some)
            .map_err(|err| serde::de::Error::custom(format!("invalid vintage '{value}': {err}"))),
    }
}
