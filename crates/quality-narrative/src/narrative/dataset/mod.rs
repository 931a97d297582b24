//! Reference dataset snapshot: metric catalog, facility registry, and vintage.
//!
//! A snapshot is built completely before anyone can see it and is shared as
//! `Arc<DatasetSnapshot>`. [`SnapshotStore`] swaps whole snapshots, so a request
//! that captured one keeps reading that vintage until it finishes.

mod parser;
mod registry;

pub use registry::{FacilityRecord, FacilityRegistry};

use std::collections::BTreeMap;
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

use chrono::NaiveDate;
use tracing::{info, warn};

use super::catalog::{CatalogError, MetricCatalog};

const FACILITIES_FILE: &str = "facilities.csv";
const MEASURES_FILE: &str = "measures.csv";
const CATALOG_FILE: &str = "catalog.csv";
const MANIFEST_FILE: &str = "manifest.json";

#[derive(Debug, thiserror::Error)]
pub enum DatasetError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid dataset CSV: {0}")]
    Csv(#[from] csv::Error),
    #[error("invalid dataset manifest: {0}")]
    Manifest(#[from] serde_json::Error),
    #[error(transparent)]
    Catalog(#[from] CatalogError),
    #[error("duplicate facility id `{0}`")]
    DuplicateFacility(String),
    #[error("facility `{name}` has a blank id")]
    BlankFacilityId { name: String },
    #[error("measure `{metric_id}` references unknown facility `{facility_id}`")]
    UnknownFacility {
        facility_id: String,
        metric_id: String,
    },
    #[error("duplicate measure `{metric_id}` for facility `{facility_id}`")]
    DuplicateMeasure {
        facility_id: String,
        metric_id: String,
    },
    #[error("snapshot store lock poisoned")]
    Poisoned,
}

/// Everything a request reads, captured at one vintage.
#[derive(Debug, Clone, PartialEq)]
pub struct DatasetSnapshot {
    pub catalog: MetricCatalog,
    pub registry: FacilityRegistry,
    pub vintage: Option<NaiveDate>,
    pub source: Option<String>,
}

impl DatasetSnapshot {
    pub fn new(catalog: MetricCatalog, registry: FacilityRegistry, vintage: Option<NaiveDate>) -> Self {
        Self {
            catalog,
            registry,
            vintage,
            source: None,
        }
    }
}

/// Reads a dataset directory laid out as `facilities.csv`, `measures.csv`,
/// and the optional `catalog.csv` / `manifest.json`.
pub struct DatasetLoader;

impl DatasetLoader {
    pub fn from_dir<P: AsRef<Path>>(dir: P) -> Result<DatasetSnapshot, DatasetError> {
        let dir = dir.as_ref();

        let catalog = match open_optional(&dir.join(CATALOG_FILE))? {
            Some(file) => MetricCatalog::from_reader(file)?,
            None => MetricCatalog::standard(),
        };
        let manifest = match open_optional(&dir.join(MANIFEST_FILE))? {
            Some(file) => parser::parse_manifest(file)?,
            None => parser::Manifest::default(),
        };
        let facilities = open_required(&dir.join(FACILITIES_FILE))?;
        let measures = open_required(&dir.join(MEASURES_FILE))?;

        let mut snapshot = Self::from_readers(catalog, facilities, measures, manifest.vintage)?;
        snapshot.source = manifest.source;

        info!(
            dataset = %dir.display(),
            facilities = snapshot.registry.len(),
            metrics = snapshot.catalog.len(),
            vintage = ?snapshot.vintage,
            "reference dataset loaded"
        );
        Ok(snapshot)
    }

    pub fn from_readers<F: Read, M: Read>(
        catalog: MetricCatalog,
        facilities: F,
        measures: M,
        vintage: Option<NaiveDate>,
    ) -> Result<DatasetSnapshot, DatasetError> {
        let mut records: Vec<FacilityRecord> = parser::parse_facilities(facilities)?
            .into_iter()
            .map(|row| FacilityRecord {
                facility_id: row.facility_id,
                canonical_name: row.name,
                aliases: row.aliases,
                state: row.state,
                observed: BTreeMap::new(),
                benchmarks: BTreeMap::new(),
            })
            .collect();

        let positions: BTreeMap<String, usize> = records
            .iter()
            .enumerate()
            .map(|(position, record)| (record.facility_id.clone(), position))
            .collect();

        let mut skipped = 0usize;
        for row in parser::parse_measures(measures)? {
            if !catalog.contains(&row.metric_id) {
                skipped += 1;
                continue;
            }

            let position = *positions.get(&row.facility_id).ok_or_else(|| {
                DatasetError::UnknownFacility {
                    facility_id: row.facility_id.clone(),
                    metric_id: row.metric_id.clone(),
                }
            })?;
            let record = &mut records[position];
            if record.observed.contains_key(&row.metric_id) {
                return Err(DatasetError::DuplicateMeasure {
                    facility_id: row.facility_id,
                    metric_id: row.metric_id,
                });
            }
            record.observed.insert(row.metric_id.clone(), row.score);
            record.benchmarks.insert(row.metric_id, row.national);
        }

        if skipped > 0 {
            warn!(skipped, "ignored measure rows with ids outside the metric catalog");
        }

        let registry = FacilityRegistry::new(records)?;
        Ok(DatasetSnapshot::new(catalog, registry, vintage))
    }
}

fn open_required(path: &Path) -> Result<File, DatasetError> {
    File::open(path).map_err(|source| DatasetError::Io {
        path: path.to_path_buf(),
        source,
    })
}

fn open_optional(path: &Path) -> Result<Option<File>, DatasetError> {
    match File::open(path) {
        Ok(file) => Ok(Some(file)),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(source) => Err(DatasetError::Io {
            path: path.to_path_buf(),
            source,
        }),
    }
}

/// Holds the current snapshot; swaps are a single pointer replacement.
#[derive(Debug)]
pub struct SnapshotStore {
    current: RwLock<Arc<DatasetSnapshot>>,
}

impl SnapshotStore {
    pub fn new(snapshot: DatasetSnapshot) -> Self {
        Self {
            current: RwLock::new(Arc::new(snapshot)),
        }
    }

    /// Capture the snapshot a request will read for its whole lifetime.
    pub fn current(&self) -> Result<Arc<DatasetSnapshot>, DatasetError> {
        self.current
            .read()
            .map(|guard| Arc::clone(&guard))
            .map_err(|_| DatasetError::Poisoned)
    }

    /// Publish a fully built snapshot, returning the one it replaced.
    pub fn replace(&self, snapshot: DatasetSnapshot) -> Result<Arc<DatasetSnapshot>, DatasetError> {
        let next = Arc::new(snapshot);
        let mut guard = self.current.write().map_err(|_| DatasetError::Poisoned)?;
        Ok(std::mem::replace(&mut *guard, next))
    }

    /// Build a snapshot from `dir` and publish it. On error nothing is swapped.
    pub fn reload_from<P: AsRef<Path>>(&self, dir: P) -> Result<Arc<DatasetSnapshot>, DatasetError> {
        let snapshot = DatasetLoader::from_dir(dir)?;
        self.replace(snapshot)?;
        self.current()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    const FACILITIES: &str = "Facility ID,Facility Name,State,Aliases\n\
100,Alpha Hospital,IA,Alpha\n\
200,Beta Medical Center,IA,\n";

    fn vintage() -> Option<NaiveDate> {
        NaiveDate::from_ymd_opt(2025, 10, 1)
    }

    #[test]
    fn loader_attaches_measures_and_skips_unknown_metrics() {
        let measures = "Facility ID,Measure ID,Score,National Average\n\
100,SEP_1,64,61\n\
100,NOT_A_METRIC,1,1\n\
200,OP_18b,Not Available,160\n";
        let snapshot = DatasetLoader::from_readers(
            MetricCatalog::standard(),
            Cursor::new(FACILITIES),
            Cursor::new(measures),
            vintage(),
        )
        .expect("loads");

        let alpha = snapshot.registry.get("100").expect("alpha");
        assert_eq!(alpha.observed_value("SEP_1"), Some(64.0));
        assert!(!alpha.observed.contains_key("NOT_A_METRIC"));
        let beta = snapshot.registry.get("200").expect("beta");
        assert_eq!(beta.observed_value("OP_18b"), None);
        assert_eq!(beta.benchmark_value("OP_18b"), Some(160.0));
    }

    #[test]
    fn loader_rejects_measures_for_unknown_facilities() {
        let measures = "Facility ID,Measure ID,Score,National Average\n999,SEP_1,64,61\n";
        let error = DatasetLoader::from_readers(
            MetricCatalog::standard(),
            Cursor::new(FACILITIES),
            Cursor::new(measures),
            vintage(),
        )
        .expect_err("unknown facility");
        assert!(matches!(error, DatasetError::UnknownFacility { .. }));
    }

    #[test]
    fn loader_rejects_duplicate_measures() {
        let measures = "Facility ID,Measure ID,Score,National Average\n100,SEP_1,64,61\n100,SEP_1,65,61\n";
        let error = DatasetLoader::from_readers(
            MetricCatalog::standard(),
            Cursor::new(FACILITIES),
            Cursor::new(measures),
            vintage(),
        )
        .expect_err("duplicate measure");
        assert!(matches!(error, DatasetError::DuplicateMeasure { .. }));
    }

    #[test]
    fn store_replace_keeps_captured_snapshot_intact() {
        let first = DatasetSnapshot::new(
            MetricCatalog::standard(),
            FacilityRegistry::default(),
            vintage(),
        );
        let store = SnapshotStore::new(first);
        let captured = store.current().expect("current");

        let second = DatasetSnapshot::new(
            MetricCatalog::standard(),
            FacilityRegistry::default(),
            NaiveDate::from_ymd_opt(2026, 1, 1),
        );
        let previous = store.replace(second).expect("swap");

        assert_eq!(captured.vintage, vintage());
        assert!(Arc::ptr_eq(&captured, &previous));
        assert_eq!(
            store.current().expect("current").vintage,
            NaiveDate::from_ymd_opt(2026, 1, 1)
        );
    }

    #[test]
    fn failed_reload_leaves_store_untouched() {
        let store = SnapshotStore::new(DatasetSnapshot::new(
            MetricCatalog::standard(),
            FacilityRegistry::default(),
            vintage(),
        ));
        let error = store
            .reload_from("./does-not-exist")
            .expect_err("missing directory");
        assert!(matches!(error, DatasetError::Io { .. }));
        assert_eq!(store.current().expect("current").vintage, vintage());
    }
}
