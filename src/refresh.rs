//! Bulk snapshot refresh.
//!
//! Snapshot files are JSON arrays of system and station records. Records are
//! applied one at a time through the index's upsert operations, so applying
//! the same snapshot twice leaves the index unchanged the second time.

use std::collections::BTreeSet;
use std::path::Path;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Instant;

use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use crate::catalog::{Catalog, ModuleCategory, Outfitting, Ship};
use crate::config::SnapshotConfig;
use crate::error::{Result, StarportError};
use crate::index::{SpatialIndex, StationUpdate, StationUpsert, SystemUpsert};
use crate::metrics;
use crate::types::{HealthSignal, LooseText, StationId, SystemId};

/// Outcome of the most recent refresh run.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum TaskStatus {
    #[default]
    NeverRun,
    Executing,
    Succeeded(Option<String>),
    Failed(String),
}

impl TaskStatus {
    /// Healthy until a run fails.
    pub fn health(&self) -> HealthSignal {
        match self {
            TaskStatus::NeverRun => HealthSignal::healthy_with("never run"),
            TaskStatus::Executing => HealthSignal::healthy_with("executing"),
            TaskStatus::Succeeded(None) => HealthSignal::healthy(),
            TaskStatus::Succeeded(Some(msg)) => HealthSignal::healthy_with(msg.clone()),
            TaskStatus::Failed(msg) => HealthSignal::unhealthy(msg.clone()),
        }
    }
}

/// One system of a systems snapshot.
#[derive(Debug, Clone, Deserialize)]
pub struct SystemRecord {
    pub id: SystemId,
    pub name: String,
    pub x: f64,
    pub y: f64,
    pub z: f64,
    #[serde(default)]
    pub needs_permit: Option<bool>,
}

/// One station of a stations snapshot.
#[derive(Debug, Clone, Deserialize)]
pub struct StationRecord {
    pub id: StationId,
    pub system_id: SystemId,
    pub name: String,
    #[serde(default)]
    pub distance_to_star: Option<f64>,
    #[serde(default)]
    pub allegiance: Option<String>,
    #[serde(default)]
    pub max_landing_pad_size: Option<String>,
    #[serde(rename = "type", default)]
    pub station_type: Option<String>,
    #[serde(default)]
    pub has_shipyard: Option<bool>,
    #[serde(default)]
    pub has_outfitting: Option<bool>,
    #[serde(default)]
    pub selling_ships: Option<Vec<String>>,
    #[serde(default)]
    pub selling_modules: Option<Vec<LooseText>>,
}

/// A station record resolved against the catalog.
#[derive(Debug, Clone)]
pub struct DecodedStation {
    pub update: StationUpdate,
    pub unknown_ships: Vec<String>,
    pub unknown_modules: Vec<String>,
}

impl StationRecord {
    /// Resolve ship names by alias and module external ids across every
    /// numbering space. Anything unresolvable is reported, not fatal.
    pub fn decode(self, catalog: &Catalog) -> DecodedStation {
        let mut unknown_ships = Vec::new();
        let ships = self.selling_ships.map(|names| {
            let mut ships = BTreeSet::new();
            for name in names {
                match Ship::parse(&name) {
                    Ok(ship) => {
                        ships.insert(ship);
                    }
                    Err(_) => unknown_ships.push(name),
                }
            }
            ships
        });

        let mut unknown_modules = Vec::new();
        let outfitting = self.selling_modules.map(|external_ids| {
            let ids: Vec<&str> = external_ids.iter().map(LooseText::as_str).collect();
            for id in &ids {
                let known = ModuleCategory::ALL
                    .iter()
                    .any(|&c| catalog.space(c).index_by_external_id(id).is_some());
                if !known {
                    unknown_modules.push(id.to_string());
                }
            }
            let mut outfitting = Outfitting::default();
            for category in ModuleCategory::ALL {
                let set = catalog.space(category).set_from_external_ids(ids.as_slice());
                outfitting.set(category, Some(set));
            }
            outfitting
        });

        DecodedStation {
            update: StationUpdate {
                id: self.id,
                name: self.name,
                distance_to_star: self.distance_to_star,
                allegiance: self.allegiance,
                max_landing_pad_size: self.max_landing_pad_size,
                station_type: self.station_type,
                has_shipyard: self.has_shipyard.unwrap_or(false),
                has_outfitting: self.has_outfitting.unwrap_or(false),
                ships,
                outfitting,
            },
            unknown_ships,
            unknown_modules,
        }
    }
}

/// Counts from applying one snapshot.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RefreshSummary {
    pub created: u64,
    pub updated: u64,
    pub unchanged: u64,
    /// Systems outside the inhabited range.
    pub dropped: u64,
    /// Stations whose system is not in the index.
    pub unknown_system: u64,
    pub unknown_ships: u64,
    pub unknown_modules: u64,
}

impl RefreshSummary {
    pub fn changed(&self) -> u64 {
        self.created + self.updated
    }
}

/// Applies snapshot records to the index and tracks the last run's status.
pub struct BulkRefresh {
    index: Arc<SpatialIndex>,
    catalog: Arc<Catalog>,
    status: Mutex<TaskStatus>,
}

impl BulkRefresh {
    pub fn new(index: Arc<SpatialIndex>, catalog: Arc<Catalog>) -> Self {
        Self {
            index,
            catalog,
            status: Mutex::new(TaskStatus::NeverRun),
        }
    }

    pub fn status(&self) -> TaskStatus {
        self.status
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn health(&self) -> HealthSignal {
        self.status().health()
    }

    fn set_status(&self, status: TaskStatus) {
        *self.status.lock().unwrap_or_else(PoisonError::into_inner) = status;
    }

    pub fn apply_systems<I>(&self, records: I) -> RefreshSummary
    where
        I: IntoIterator<Item = SystemRecord>,
    {
        let mut summary = RefreshSummary::default();
        for r in records {
            let outcome = self.index.upsert_system(
                r.id,
                &r.name,
                r.x,
                r.y,
                r.z,
                r.needs_permit.unwrap_or(false),
            );
            match outcome {
                SystemUpsert::Created(_) => summary.created += 1,
                SystemUpsert::Updated(_) => summary.updated += 1,
                SystemUpsert::Unchanged => summary.unchanged += 1,
                SystemUpsert::OutOfRange => summary.dropped += 1,
            }
        }
        summary
    }

    pub fn apply_stations<I>(&self, records: I) -> RefreshSummary
    where
        I: IntoIterator<Item = StationRecord>,
    {
        let mut summary = RefreshSummary::default();
        for record in records {
            let system_id = record.system_id;
            let decoded = record.decode(&self.catalog);
            if !decoded.unknown_ships.is_empty() {
                debug!(station = %decoded.update.name, ships = ?decoded.unknown_ships, "unknown ships in snapshot");
            }
            summary.unknown_ships += decoded.unknown_ships.len() as u64;
            summary.unknown_modules += decoded.unknown_modules.len() as u64;

            match self.index.upsert_station(system_id, decoded.update) {
                StationUpsert::Created => summary.created += 1,
                StationUpsert::Updated => summary.updated += 1,
                StationUpsert::Unchanged => summary.unchanged += 1,
                StationUpsert::UnknownSystem => summary.unknown_system += 1,
            }
        }
        summary
    }

    /// Load and apply a systems snapshot file, recording the outcome.
    pub fn refresh_systems(&self, path: &Path) -> Result<RefreshSummary> {
        self.run("systems", || {
            let records: Vec<SystemRecord> = read_snapshot(path)?;
            Ok(self.apply_systems(records))
        })
    }

    /// Load and apply a stations snapshot file, recording the outcome.
    pub fn refresh_stations(&self, path: &Path) -> Result<RefreshSummary> {
        self.run("stations", || {
            let records: Vec<StationRecord> = read_snapshot(path)?;
            Ok(self.apply_stations(records))
        })
    }

    /// Apply whichever snapshot files are configured, systems first so that
    /// stations find their owners.
    pub fn refresh_configured(&self, snapshot: &SnapshotConfig) -> Result<()> {
        if let Some(path) = &snapshot.systems_path {
            self.refresh_systems(path)?;
        }
        if let Some(path) = &snapshot.stations_path {
            self.refresh_stations(path)?;
        }
        Ok(())
    }

    fn run<F>(&self, kind: &'static str, job: F) -> Result<RefreshSummary>
    where
        F: FnOnce() -> Result<RefreshSummary>,
    {
        self.set_status(TaskStatus::Executing);
        let start = Instant::now();
        match job() {
            Ok(summary) => {
                let message = format!("{} {} updated", summary.changed(), kind);
                info!(
                    kind,
                    created = summary.created,
                    updated = summary.updated,
                    unchanged = summary.unchanged,
                    dropped = summary.dropped,
                    unknown_system = summary.unknown_system,
                    elapsed_ms = start.elapsed().as_millis() as u64,
                    "snapshot applied"
                );
                if summary.unknown_modules > 0 {
                    warn!(kind, count = summary.unknown_modules, "snapshot referenced unknown modules");
                }
                metrics::REFRESH_RUNS_TOTAL
                    .with_label_values(&["succeeded"])
                    .inc();
                self.set_status(TaskStatus::Succeeded(Some(message)));
                Ok(summary)
            }
            Err(e) => {
                error!(kind, error = %e, "snapshot refresh failed");
                metrics::REFRESH_RUNS_TOTAL.with_label_values(&["failed"]).inc();
                self.set_status(TaskStatus::Failed(format!("{kind} refresh failed: {e}")));
                Err(e)
            }
        }
    }
}

fn read_snapshot<T: for<'de> Deserialize<'de>>(path: &Path) -> Result<Vec<T>> {
    let file = std::fs::File::open(path).map_err(|e| {
        StarportError::Validation(format!("cannot open snapshot {}: {}", path.display(), e))
    })?;
    let records = serde_json::from_reader(std::io::BufReader::new(file))?;
    Ok(records)
}
