use std::io::Write;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use flate2::write::ZlibEncoder;
use flate2::Compression;

use starport::catalog::{Catalog, ModuleCategory, Outfitting};
use starport::config::{FeedConfig, SearchConfig};
use starport::index::{SpatialIndex, StationUpdate, SystemUpsert};

/// Small catalog: two power plants and a bulkhead, a fuel scoop, a fixed
/// pulse laser and a shield booster.
pub const CATALOG_JSON: &str = r#"{
    "standard": [
        {"id": "pp1", "eddbID": 1001, "grp": "pp", "class": 2, "rating": "E"},
        {"id": "pp2", "eddbID": 1002, "grp": "pp", "class": 2, "rating": "D"}
    ],
    "bulkheads": {
        "Sidewinder": [{"id": "sw0", "name": "Lightweight Alloy", "class": 1, "rating": "I"}]
    },
    "internal": [
        {"id": "fs1", "eddbID": 2001, "grp": "fs", "class": 1, "rating": "E"}
    ],
    "hardpoints": [
        {"id": "pl1", "eddbID": 3001, "grp": "pl", "class": 1, "rating": "F", "mode": "F"},
        {"id": "sb1", "eddbID": 4001, "grp": "sb", "class": 0, "rating": "A"}
    ]
}"#;

pub const SHIPYARD_SCHEMA: &str = "http://schemas.elite-markets.net/eddn/shipyard/1";
pub const OUTFITTING_SCHEMA: &str = "http://schemas.elite-markets.net/eddn/outfitting/1";

pub fn catalog() -> Arc<Catalog> {
    Arc::new(Catalog::from_json(CATALOG_JSON).unwrap())
}

pub fn empty_index() -> Arc<SpatialIndex> {
    Arc::new(SpatialIndex::new(SearchConfig::default()))
}

/// Outfitting with the given categories present, encoded by canonical id.
pub fn outfitting(catalog: &Catalog, present: &[(ModuleCategory, &[&str])]) -> Outfitting {
    let mut outfitting = Outfitting::default();
    for &(category, ids) in present {
        let set = catalog
            .space(category)
            .set_from_ids(ids)
            .unwrap()
            .unwrap_or_else(|| catalog.space(category).empty_set());
        outfitting.set(category, Some(set));
    }
    outfitting
}

pub fn station(id: u32, name: &str) -> StationUpdate {
    StationUpdate {
        id,
        name: name.to_string(),
        ..Default::default()
    }
}

pub fn add_system(index: &SpatialIndex, id: u32, name: &str, x: f64, y: f64, z: f64) {
    let outcome = index.upsert_system(id, name, x, y, z, false);
    assert!(matches!(outcome, SystemUpsert::Created(_)), "{name} not created");
}

/// Sol with one outfitting-only station carrying standard {pp1}.
pub fn sol_index(catalog: &Catalog) -> Arc<SpatialIndex> {
    let index = empty_index();
    add_system(&index, 1, "Sol", 0.0, 0.0, 0.0);
    index.upsert_station(
        1,
        StationUpdate {
            has_outfitting: true,
            outfitting: Some(outfitting(catalog, &[(ModuleCategory::Standard, &["pp1"])])),
            ..station(10, "Abraham Lincoln")
        },
    );
    index
}

/// Sol plus a neighbour in the same sector selling a Sidewinder, and Lave one
/// shell out with a fuel scoop.
pub fn populated_index(catalog: &Catalog) -> Arc<SpatialIndex> {
    let index = sol_index(catalog);
    add_system(&index, 2, "Barnard's Star", -3.03, -0.09, 1.38);
    index.upsert_station(
        2,
        StationUpdate {
            has_shipyard: true,
            has_outfitting: true,
            ships: Some([starport::catalog::Ship::Sidewinder].into_iter().collect()),
            outfitting: Some(outfitting(
                catalog,
                &[(ModuleCategory::Standard, &["pp1", "pp2"])],
            )),
            ..station(20, "Miller Depot")
        },
    );
    add_system(&index, 3, "Lave", 75.75, 48.75, 70.75);
    index.upsert_station(
        3,
        StationUpdate {
            has_outfitting: true,
            outfitting: Some(outfitting(catalog, &[(ModuleCategory::Internal, &["fs1"])])),
            ..station(30, "Lave Station")
        },
    );
    index
}

pub fn compress(text: &str) -> Bytes {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(text.as_bytes()).unwrap();
    Bytes::from(encoder.finish().unwrap())
}

pub fn shipyard_message(system: &str, station: &str, ships: &[&str]) -> String {
    serde_json::json!({
        "$schemaRef": SHIPYARD_SCHEMA,
        "header": {"uploaderID": "test", "softwareName": "starport-tests"},
        "message": {
            "systemName": system,
            "stationName": station,
            "timestamp": "2015-10-20T12:00:00Z",
            "ships": ships,
        }
    })
    .to_string()
}

pub fn outfitting_message(system: &str, station: &str, modules: serde_json::Value) -> String {
    serde_json::json!({
        "$schemaRef": OUTFITTING_SCHEMA,
        "header": {"uploaderID": "test", "softwareName": "starport-tests"},
        "message": {
            "systemName": system,
            "stationName": station,
            "timestamp": "2015-10-20T12:00:00Z",
            "modules": modules,
        }
    })
    .to_string()
}

/// Feed settings with no backoff and a long receive timeout.
pub fn fast_feed_config() -> FeedConfig {
    FeedConfig {
        enabled: true,
        recv_timeout_secs: 300,
        backoff_base_secs: 0,
        ..Default::default()
    }
}

/// Poll `condition` until it holds or `timeout` elapses.
pub async fn wait_for<F: Fn() -> bool>(condition: F, timeout: Duration) -> bool {
    let deadline = tokio::time::Instant::now() + timeout;
    while tokio::time::Instant::now() < deadline {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    condition()
}
