//! Spatial index over star systems and their stations.
//!
//! All state lives behind one reader-writer lock. Queries take the read side
//! and vastly outnumber mutations; the feed worker and bulk refresh take the
//! write side for the duration of a single upsert.

pub mod search;
pub mod sector;

pub use search::{rank, BuildQuery, TopCandidates};

use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Instant;
use tracing::{debug, instrument, warn};

use crate::catalog::{Outfitting, Ship};
use crate::config::SearchConfig;
use crate::error::{Result, StarportError};
use crate::metrics;
use crate::types::{
    BuildCandidate, SectorCoord, StarSystem, Station, StationId, SystemId,
};

/// Which path a station mutation came from, for counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateSource {
    Bulk,
    Feed,
}

impl UpdateSource {
    fn label(self) -> &'static str {
        match self {
            UpdateSource::Bulk => "bulk",
            UpdateSource::Feed => "feed",
        }
    }
}

/// Result of `upsert_system`. Only `Created` and `Updated` carry the system.
#[derive(Debug, Clone)]
pub enum SystemUpsert {
    Created(StarSystem),
    Updated(StarSystem),
    Unchanged,
    /// Unknown id with coordinates outside the inhabited range; nothing stored.
    OutOfRange,
}

impl SystemUpsert {
    pub fn system(&self) -> Option<&StarSystem> {
        match self {
            SystemUpsert::Created(s) | SystemUpsert::Updated(s) => Some(s),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StationUpsert {
    Created,
    Updated,
    Unchanged,
    UnknownSystem,
}

/// Result of a streaming-path update keyed by names.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedApply {
    Applied,
    UnknownSystem,
    UnknownStation,
}

/// Full station record as delivered by a bulk snapshot.
#[derive(Debug, Clone, Default)]
pub struct StationUpdate {
    pub id: StationId,
    pub name: String,
    pub distance_to_star: Option<f64>,
    pub allegiance: Option<String>,
    pub max_landing_pad_size: Option<String>,
    pub station_type: Option<String>,
    pub has_shipyard: bool,
    pub has_outfitting: bool,
    /// Replaces the ship list when present and the station has a shipyard.
    pub ships: Option<BTreeSet<Ship>>,
    /// Replaces all four inventories when present and the station has outfitting.
    pub outfitting: Option<Outfitting>,
}

#[derive(Debug, Default)]
pub struct IndexStats {
    pub systems_dropped: AtomicU64,
    pub unknown_systems: AtomicU64,
    pub unknown_stations: AtomicU64,
    pub station_updates: AtomicU64,
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct IndexStatsSnapshot {
    pub systems: usize,
    pub stations: usize,
    pub systems_dropped: u64,
    pub unknown_systems: u64,
    pub unknown_stations: u64,
    pub station_updates: u64,
}

#[derive(Debug, Default)]
struct Galaxy {
    systems: HashMap<SystemId, StarSystem>,
    /// Lowercased display name to id.
    names: HashMap<String, SystemId>,
    sectors: HashMap<SectorCoord, Vec<SystemId>>,
    station_count: usize,
}

impl Galaxy {
    fn insert(&mut self, system: StarSystem) {
        self.names.insert(system.name.to_lowercase(), system.id);
        self.sectors.entry(system.sector).or_default().push(system.id);
        self.station_count += system.stations.len();
        self.systems.insert(system.id, system);
    }

    fn remove_from_sector(&mut self, sector: SectorCoord, id: SystemId) {
        if let Some(bucket) = self.sectors.get_mut(&sector) {
            bucket.retain(|&other| other != id);
            if bucket.is_empty() {
                self.sectors.remove(&sector);
            }
        }
    }

    fn id_by_name(&self, name: &str) -> Option<SystemId> {
        self.names.get(&name.to_lowercase()).copied()
    }

    fn by_name(&self, name: &str) -> Option<&StarSystem> {
        self.id_by_name(name).and_then(|id| self.systems.get(&id))
    }
}

fn same_text(a: &Option<String>, b: &Option<String>) -> bool {
    match (a, b) {
        (Some(a), Some(b)) => a.eq_ignore_ascii_case(b),
        (None, None) => true,
        _ => false,
    }
}

fn new_station(system_id: SystemId, update: StationUpdate) -> Station {
    let mut station = Station::new(update.id, system_id, update.name);
    station.distance_to_star = update.distance_to_star;
    station.allegiance = update.allegiance;
    station.max_landing_pad_size = update.max_landing_pad_size;
    station.station_type = update.station_type;
    station.has_shipyard = update.has_shipyard;
    station.has_outfitting = update.has_outfitting;
    if update.has_shipyard {
        station.ships = update.ships;
    }
    if update.has_outfitting {
        station.outfitting = update.outfitting.unwrap_or_default();
    }
    station
}

/// Field-by-field diff. Returns whether anything changed.
fn apply_station_update(station: &mut Station, update: StationUpdate) -> bool {
    let mut changed = false;

    if station.name != update.name {
        station.name = update.name;
        changed = true;
    }
    if station.distance_to_star != update.distance_to_star {
        station.distance_to_star = update.distance_to_star;
        changed = true;
    }
    if !same_text(&station.allegiance, &update.allegiance) {
        station.allegiance = update.allegiance;
        changed = true;
    }
    if !same_text(&station.max_landing_pad_size, &update.max_landing_pad_size) {
        station.max_landing_pad_size = update.max_landing_pad_size;
        changed = true;
    }
    if !same_text(&station.station_type, &update.station_type) {
        station.station_type = update.station_type;
        changed = true;
    }
    if station.has_shipyard != update.has_shipyard {
        station.has_shipyard = update.has_shipyard;
        if !update.has_shipyard {
            station.ships = None;
        }
        changed = true;
    }
    if station.has_outfitting != update.has_outfitting {
        station.has_outfitting = update.has_outfitting;
        if !update.has_outfitting {
            station.outfitting.clear();
        }
        changed = true;
    }
    if station.has_shipyard {
        if let Some(ships) = update.ships {
            if station.ships.as_ref() != Some(&ships) {
                station.ships = Some(ships);
                changed = true;
            }
        }
    }
    if station.has_outfitting {
        if let Some(outfitting) = update.outfitting {
            if station.outfitting != outfitting {
                station.outfitting = outfitting;
                changed = true;
            }
        }
    }

    if changed {
        station.updated_at = chrono::Utc::now();
    }
    changed
}

/// Systems and stations bucketed by sector, with name and id lookup.
pub struct SpatialIndex {
    galaxy: RwLock<Galaxy>,
    search: SearchConfig,
    stats: IndexStats,
}

impl SpatialIndex {
    pub fn new(search: SearchConfig) -> Self {
        Self {
            galaxy: RwLock::new(Galaxy::default()),
            search,
            stats: IndexStats::default(),
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, Galaxy> {
        self.galaxy.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Galaxy> {
        self.galaxy.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn publish_sizes(&self, galaxy: &Galaxy) {
        metrics::SYSTEMS_TRACKED.set(galaxy.systems.len() as i64);
        metrics::STATIONS_TRACKED.set(galaxy.station_count as i64);
    }

    /// Register a fully-formed system. Its sector is recomputed from its
    /// coordinates; out-of-range systems are dropped and `false` returned.
    pub fn load_system(&self, mut system: StarSystem) -> bool {
        let Some(sector) = sector::sector_of(system.x, system.y, system.z) else {
            self.stats.systems_dropped.fetch_add(1, Ordering::Relaxed);
            metrics::SYSTEMS_DROPPED_TOTAL.inc();
            return false;
        };
        system.sector = sector;
        let mut galaxy = self.write();
        if let Some(previous) = galaxy.systems.remove(&system.id) {
            galaxy.remove_from_sector(previous.sector, previous.id);
            galaxy.names.remove(&previous.name.to_lowercase());
            galaxy.station_count -= previous.stations.len();
        }
        galaxy.insert(system);
        self.publish_sizes(&galaxy);
        true
    }

    /// Create or update a system. Name, permit and coordinate deltas are
    /// detected independently; a coordinate change that crosses a sector
    /// boundary moves the system between buckets.
    pub fn upsert_system(
        &self,
        id: SystemId,
        name: &str,
        x: f64,
        y: f64,
        z: f64,
        needs_permit: bool,
    ) -> SystemUpsert {
        let target = sector::sector_of(x, y, z);
        let mut galaxy = self.write();

        if let Some(existing) = galaxy.systems.get(&id) {
            let old_name = existing.name.clone();
            let old_sector = existing.sector;
            let coords_changed = existing.x != x || existing.y != y || existing.z != z;
            let rename = existing.name != name;
            let permit_changed = existing.needs_permit != needs_permit;

            let new_sector = match (coords_changed, target) {
                (true, Some(sector)) => Some(sector),
                (true, None) => {
                    warn!(system = %old_name, id, x, y, z, "ignoring move outside inhabited range");
                    self.stats.systems_dropped.fetch_add(1, Ordering::Relaxed);
                    metrics::SYSTEMS_DROPPED_TOTAL.inc();
                    None
                }
                (false, _) => None,
            };

            if !rename && !permit_changed && new_sector.is_none() {
                return SystemUpsert::Unchanged;
            }

            if rename {
                let old_key = old_name.to_lowercase();
                if galaxy.names.get(&old_key) == Some(&id) {
                    galaxy.names.remove(&old_key);
                }
                galaxy.names.insert(name.to_lowercase(), id);
            }
            if let Some(sector) = new_sector {
                if sector != old_sector {
                    galaxy.remove_from_sector(old_sector, id);
                    galaxy.sectors.entry(sector).or_default().push(id);
                    debug!(system = %old_name, ?old_sector, ?sector, "system relocated");
                }
            }

            let Some(system) = galaxy.systems.get_mut(&id) else {
                return SystemUpsert::Unchanged;
            };
            if rename {
                system.name = name.to_string();
            }
            system.needs_permit = needs_permit;
            if let Some(sector) = new_sector {
                system.x = x;
                system.y = y;
                system.z = z;
                system.sector = sector;
            }
            return SystemUpsert::Updated(system.clone());
        }

        let Some(sector) = target else {
            self.stats.systems_dropped.fetch_add(1, Ordering::Relaxed);
            metrics::SYSTEMS_DROPPED_TOTAL.inc();
            return SystemUpsert::OutOfRange;
        };

        let system = StarSystem {
            id,
            name: name.to_string(),
            x,
            y,
            z,
            sector,
            needs_permit,
            stations: BTreeMap::new(),
        };
        galaxy.insert(system.clone());
        self.publish_sizes(&galaxy);
        SystemUpsert::Created(system)
    }

    /// Create or diff-update a station inside an already-known system.
    pub fn upsert_station(&self, system_id: SystemId, update: StationUpdate) -> StationUpsert {
        let mut galaxy = self.write();
        let Some(system) = galaxy.systems.get_mut(&system_id) else {
            drop(galaxy);
            self.stats.unknown_systems.fetch_add(1, Ordering::Relaxed);
            metrics::UNKNOWN_SYSTEM_TOTAL
                .with_label_values(&[UpdateSource::Bulk.label()])
                .inc();
            debug!(system_id, station = %update.name, "station for unknown system");
            return StationUpsert::UnknownSystem;
        };

        let outcome = match system.stations.get_mut(&update.id) {
            Some(station) => {
                if apply_station_update(station, update) {
                    StationUpsert::Updated
                } else {
                    StationUpsert::Unchanged
                }
            }
            None => {
                let station = new_station(system_id, update);
                system.stations.insert(station.id, station);
                galaxy.station_count += 1;
                self.publish_sizes(&galaxy);
                StationUpsert::Created
            }
        };

        if outcome == StationUpsert::Updated {
            self.record_update(UpdateSource::Bulk);
        }
        outcome
    }

    fn record_update(&self, source: UpdateSource) {
        self.stats.station_updates.fetch_add(1, Ordering::Relaxed);
        metrics::STATION_UPDATES_TOTAL
            .with_label_values(&[source.label()])
            .inc();
    }

    fn with_named_station<F>(&self, system_name: &str, station_name: &str, apply: F) -> FeedApply
    where
        F: FnOnce(&mut Station),
    {
        let mut galaxy = self.write();
        let Some(id) = galaxy.id_by_name(system_name) else {
            drop(galaxy);
            self.stats.unknown_systems.fetch_add(1, Ordering::Relaxed);
            metrics::UNKNOWN_SYSTEM_TOTAL
                .with_label_values(&[UpdateSource::Feed.label()])
                .inc();
            warn!(system = system_name, station = station_name, "unknown system");
            return FeedApply::UnknownSystem;
        };
        let station = galaxy
            .systems
            .get_mut(&id)
            .and_then(|system| system.station_by_name_mut(station_name));
        let Some(station) = station else {
            drop(galaxy);
            self.stats.unknown_stations.fetch_add(1, Ordering::Relaxed);
            metrics::UNKNOWN_STATION_TOTAL
                .with_label_values(&[UpdateSource::Feed.label()])
                .inc();
            warn!(system = system_name, station = station_name, "unknown station");
            return FeedApply::UnknownStation;
        };
        apply(station);
        station.updated_at = chrono::Utc::now();
        drop(galaxy);
        self.record_update(UpdateSource::Feed);
        FeedApply::Applied
    }

    /// Replace the ship list of a station named by the feed.
    pub fn update_station_ships(
        &self,
        system_name: &str,
        station_name: &str,
        ships: BTreeSet<Ship>,
    ) -> FeedApply {
        self.with_named_station(system_name, station_name, |station| {
            station.has_shipyard = true;
            station.ships = Some(ships);
        })
    }

    /// Replace the inventories present in `outfitting`; absent categories keep
    /// their previous value.
    pub fn update_station_outfitting(
        &self,
        system_name: &str,
        station_name: &str,
        outfitting: Outfitting,
    ) -> FeedApply {
        self.with_named_station(system_name, station_name, |station| {
            station.has_outfitting = true;
            station.outfitting.apply(outfitting);
        })
    }

    pub fn system(&self, name: &str) -> Option<StarSystem> {
        self.read().by_name(name).cloned()
    }

    pub fn system_by_id(&self, id: SystemId) -> Option<StarSystem> {
        self.read().systems.get(&id).cloned()
    }

    /// Look up a station by system and station name, both case-insensitive.
    pub fn station(&self, system_name: &str, station_name: &str) -> Result<(String, Station)> {
        let galaxy = self.read();
        let system = galaxy
            .by_name(system_name)
            .ok_or_else(|| StarportError::SystemNotFound {
                name: system_name.to_string(),
            })?;
        let station =
            system
                .station_by_name(station_name)
                .ok_or_else(|| StarportError::StationNotFound {
                    system: system.name.clone(),
                    station: station_name.to_string(),
                })?;
        Ok((system.name.clone(), station.clone()))
    }

    /// Display names of every system whose name contains `part`, case-insensitively.
    pub fn find_systems_with_name(&self, part: &str) -> Vec<String> {
        let needle = part.to_lowercase();
        let galaxy = self.read();
        let mut names: Vec<String> = galaxy
            .systems
            .values()
            .filter(|s| s.name.to_lowercase().contains(&needle))
            .map(|s| s.name.clone())
            .collect();
        names.sort();
        names
    }

    /// Nearest stations able to supply `query`, best first.
    #[instrument(skip(self, query), fields(ship = ?query.ship))]
    pub fn find_near(&self, origin: &str, query: &BuildQuery) -> Result<Vec<BuildCandidate>> {
        if query.is_empty() {
            return Err(StarportError::Validation(
                "a ship or at least one module is required".to_string(),
            ));
        }
        let start = Instant::now();
        let galaxy = self.read();
        let origin = galaxy
            .by_name(origin)
            .ok_or_else(|| StarportError::SystemNotFound {
                name: origin.to_string(),
            })?;

        let outcome = search::search(
            &galaxy.systems,
            &galaxy.sectors,
            origin,
            query,
            self.search.max_shell_radius,
            self.search.max_results,
        );
        drop(galaxy);

        metrics::SEARCH_DURATION.observe(start.elapsed().as_secs_f64());
        metrics::SEARCH_SHELLS_VISITED.observe(outcome.shells_visited as f64);
        debug!(
            results = outcome.candidates.len(),
            shells = outcome.shells_visited,
            "find-near complete"
        );
        Ok(outcome.candidates)
    }

    pub fn system_count(&self) -> usize {
        self.read().systems.len()
    }

    pub fn station_count(&self) -> usize {
        self.read().station_count
    }

    pub fn stats(&self) -> IndexStatsSnapshot {
        let galaxy = self.read();
        IndexStatsSnapshot {
            systems: galaxy.systems.len(),
            stations: galaxy.station_count,
            systems_dropped: self.stats.systems_dropped.load(Ordering::Relaxed),
            unknown_systems: self.stats.unknown_systems.load(Ordering::Relaxed),
            unknown_stations: self.stats.unknown_stations.load(Ordering::Relaxed),
            station_updates: self.stats.station_updates.load(Ordering::Relaxed),
        }
    }
}
