use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};

use crate::catalog::{Catalog, ModuleCategory, Outfitting, Ship};

/// Stable numeric identifier of a star system.
pub type SystemId = u32;

/// Stable numeric identifier of a station.
pub type StationId = u32;

/// Text field that source data writes either as a string or as a bare number.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(transparent)]
pub struct LooseText(String);

impl LooseText {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for LooseText {
    fn from(s: &str) -> Self {
        LooseText(s.to_string())
    }
}

impl<'de> Deserialize<'de> for LooseText {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Text(String),
            Int(i64),
            Float(f64),
        }
        Ok(match Raw::deserialize(deserializer)? {
            Raw::Text(s) => LooseText(s),
            Raw::Int(i) => LooseText(i.to_string()),
            Raw::Float(f) => LooseText(f.to_string()),
        })
    }
}

/// Integer sector coordinate of the 3D grid, one 100ly cube per cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SectorCoord {
    pub x: i32,
    pub y: i32,
    pub z: i32,
}

impl SectorCoord {
    pub fn new(x: i32, y: i32, z: i32) -> Self {
        Self { x, y, z }
    }

    pub fn offset(self, dx: i32, dy: i32, dz: i32) -> Self {
        Self::new(self.x + dx, self.y + dy, self.z + dz)
    }
}

/// A star system and the stations it owns.
#[derive(Debug, Clone)]
pub struct StarSystem {
    pub id: SystemId,
    /// Display name, case preserved.
    pub name: String,
    pub x: f64,
    pub y: f64,
    pub z: f64,
    /// Always derived from the current coordinates.
    pub sector: SectorCoord,
    pub needs_permit: bool,
    pub stations: BTreeMap<StationId, Station>,
}

impl StarSystem {
    pub fn distance_to(&self, other: &StarSystem) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        let dz = self.z - other.z;
        (dx * dx + dy * dy + dz * dz).sqrt()
    }

    pub fn station_by_name(&self, name: &str) -> Option<&Station> {
        self.stations
            .values()
            .find(|s| s.name.eq_ignore_ascii_case(name))
    }

    pub fn station_by_name_mut(&mut self, name: &str) -> Option<&mut Station> {
        self.stations
            .values_mut()
            .find(|s| s.name.eq_ignore_ascii_case(name))
    }
}

/// A dockable station and its known inventories.
#[derive(Debug, Clone, PartialEq)]
pub struct Station {
    pub id: StationId,
    pub system_id: SystemId,
    pub name: String,
    /// Distance from the arrival star, in light-seconds.
    pub distance_to_star: Option<f64>,
    pub allegiance: Option<String>,
    pub max_landing_pad_size: Option<String>,
    pub station_type: Option<String>,
    pub has_shipyard: bool,
    pub has_outfitting: bool,
    pub updated_at: DateTime<Utc>,
    pub outfitting: Outfitting,
    /// Ships sold here; `None` when unknown.
    pub ships: Option<BTreeSet<Ship>>,
}

impl Station {
    pub fn new(id: StationId, system_id: SystemId, name: impl Into<String>) -> Self {
        Self {
            id,
            system_id,
            name: name.into(),
            distance_to_star: None,
            allegiance: None,
            max_landing_pad_size: None,
            station_type: None,
            has_shipyard: false,
            has_outfitting: false,
            updated_at: Utc::now(),
            outfitting: Outfitting::default(),
            ships: None,
        }
    }

    pub fn sells_ship(&self, ship: Ship) -> bool {
        self.ships.as_ref().is_some_and(|ships| ships.contains(&ship))
    }
}

/// One ranked answer to a find-near query.
#[derive(Debug, Clone)]
pub struct BuildCandidate {
    pub system_name: String,
    pub station: Station,
    pub has_ship: bool,
    pub modules_found: u32,
    pub score: f64,
    /// Light-years from the origin system, rounded to 2 decimals.
    pub distance_ly: f64,
}

/// Serializable view of a station with module sets decoded to canonical ids.
#[derive(Debug, Clone, Serialize)]
pub struct StationView {
    pub id: StationId,
    pub system_id: SystemId,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub distance_to_star: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub allegiance: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_landing_pad_size: Option<String>,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub station_type: Option<String>,
    pub has_shipyard: bool,
    pub has_outfitting: bool,
    pub updated_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ships: Option<Vec<Ship>>,
    #[serde(skip_serializing_if = "HashMap::is_empty")]
    pub modules: HashMap<ModuleCategory, Vec<String>>,
}

impl StationView {
    pub fn new(station: &Station, catalog: &Catalog) -> Self {
        Self {
            id: station.id,
            system_id: station.system_id,
            name: station.name.clone(),
            distance_to_star: station.distance_to_star,
            allegiance: station.allegiance.clone(),
            max_landing_pad_size: station.max_landing_pad_size.clone(),
            station_type: station.station_type.clone(),
            has_shipyard: station.has_shipyard,
            has_outfitting: station.has_outfitting,
            updated_at: station.updated_at,
            ships: station
                .ships
                .as_ref()
                .map(|ships| ships.iter().copied().collect()),
            modules: catalog.describe(&station.outfitting),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SystemView {
    pub id: SystemId,
    pub name: String,
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub needs_permit: bool,
    pub stations: Vec<StationView>,
}

impl SystemView {
    pub fn new(system: &StarSystem, catalog: &Catalog) -> Self {
        Self {
            id: system.id,
            name: system.name.clone(),
            x: system.x,
            y: system.y,
            z: system.z,
            needs_permit: system.needs_permit,
            stations: system
                .stations
                .values()
                .map(|s| StationView::new(s, catalog))
                .collect(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CandidateView {
    pub system: String,
    pub station: StationView,
    pub has_ship: bool,
    pub modules_found: u32,
    pub score: f64,
    pub distance: f64,
}

impl CandidateView {
    pub fn new(candidate: &BuildCandidate, catalog: &Catalog) -> Self {
        Self {
            system: candidate.system_name.clone(),
            station: StationView::new(&candidate.station, catalog),
            has_ship: candidate.has_ship,
            modules_found: candidate.modules_found,
            score: candidate.score,
            distance: candidate.distance_ly,
        }
    }
}

/// Boolean health signal with an optional explanation, polled by readiness checks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HealthSignal {
    pub healthy: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl HealthSignal {
    pub fn healthy() -> Self {
        Self {
            healthy: true,
            message: None,
        }
    }

    pub fn healthy_with(message: impl Into<String>) -> Self {
        Self {
            healthy: true,
            message: Some(message.into()),
        }
    }

    pub fn unhealthy(message: impl Into<String>) -> Self {
        Self {
            healthy: false,
            message: Some(message.into()),
        }
    }
}
