use std::collections::{BTreeMap, HashMap};

use serde::Serialize;

use super::DatasetError;

/// One facility row of the reference dataset, read-only for a vintage.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FacilityRecord {
    pub facility_id: String,
    pub canonical_name: String,
    pub aliases: Vec<String>,
    pub state: String,
    pub observed: BTreeMap<String, Option<f64>>,
    pub benchmarks: BTreeMap<String, Option<f64>>,
}

impl FacilityRecord {
    pub fn new(facility_id: &str, canonical_name: &str, state: &str) -> Self {
        Self {
            facility_id: facility_id.to_string(),
            canonical_name: canonical_name.to_string(),
            aliases: Vec::new(),
            state: state.to_string(),
            observed: BTreeMap::new(),
            benchmarks: BTreeMap::new(),
        }
    }

    pub fn with_alias(mut self, alias: &str) -> Self {
        self.aliases.push(alias.to_string());
        self
    }

    pub fn with_measure(mut self, metric_id: &str, value: Option<f64>, benchmark: Option<f64>) -> Self {
        self.observed.insert(metric_id.to_string(), value);
        self.benchmarks.insert(metric_id.to_string(), benchmark);
        self
    }

    /// Canonical name followed by every alias.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.canonical_name.as_str()).chain(self.aliases.iter().map(String::as_str))
    }

    pub fn observed_value(&self, metric_id: &str) -> Option<f64> {
        self.observed.get(metric_id).copied().flatten()
    }

    pub fn benchmark_value(&self, metric_id: &str) -> Option<f64> {
        self.benchmarks.get(metric_id).copied().flatten()
    }
}

/// Facilities keyed by identifier, kept in load order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FacilityRegistry {
    facilities: Vec<FacilityRecord>,
    index: HashMap<String, usize>,
}

impl FacilityRegistry {
    pub fn new(records: Vec<FacilityRecord>) -> Result<Self, DatasetError> {
        let mut index = HashMap::with_capacity(records.len());
        for (position, record) in records.iter().enumerate() {
            if record.facility_id.trim().is_empty() {
                return Err(DatasetError::BlankFacilityId {
                    name: record.canonical_name.clone(),
                });
            }
            if index.insert(record.facility_id.clone(), position).is_some() {
                return Err(DatasetError::DuplicateFacility(record.facility_id.clone()));
            }
        }

        Ok(Self {
            facilities: records,
            index,
        })
    }

    pub fn get(&self, facility_id: &str) -> Option<&FacilityRecord> {
        self.index
            .get(facility_id)
            .and_then(|position| self.facilities.get(*position))
    }

    pub fn facilities(&self) -> &[FacilityRecord] {
        &self.facilities
    }

    pub fn len(&self) -> usize {
        self.facilities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.facilities.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registry_rejects_duplicate_ids() {
        let error = FacilityRegistry::new(vec![
            FacilityRecord::new("100", "Alpha Hospital", "IA"),
            FacilityRecord::new("100", "Beta Hospital", "IA"),
        ])
        .expect_err("duplicate ids");
        assert!(matches!(error, DatasetError::DuplicateFacility(id) if id == "100"));
    }

    #[test]
    fn record_lookups_flatten_missing_values() {
        let record = FacilityRecord::new("1", "Alpha", "IA")
            .with_alias("Alpha Med")
            .with_measure("SEP_1", None, Some(61.0));
        assert_eq!(record.observed_value("SEP_1"), None);
        assert_eq!(record.benchmark_value("SEP_1"), Some(61.0));
        assert_eq!(record.observed_value("OP_18b"), None);
        assert_eq!(record.names().collect::<Vec<_>>(), vec!["Alpha", "Alpha Med"]);
    }
}
