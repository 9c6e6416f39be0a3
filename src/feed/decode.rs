//! Frame decoding: zlib inflate, schema classification, and translation of
//! feed payloads into index updates.

use flate2::read::ZlibDecoder;
use serde::Deserialize;
use std::collections::BTreeSet;
use std::io::Read;

use crate::catalog::{Catalog, ModuleCategory, ModuleDescriptor, ModuleSet, Outfitting, Ship};
use crate::error::{Result, StarportError};
use crate::types::LooseText;

pub const SHIPYARD_SCHEMA: &str = "http://schemas.elite-markets.net/eddn/shipyard/1";
pub const OUTFITTING_SCHEMA: &str = "http://schemas.elite-markets.net/eddn/outfitting/1";
const SCHEMA_REF: &str = "\"$schemaRef\":";

/// Schemas this consumer understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Schema {
    Shipyard,
    Outfitting,
}

impl Schema {
    pub fn label(self) -> &'static str {
        match self {
            Schema::Shipyard => "shipyard",
            Schema::Outfitting => "outfitting",
        }
    }
}

/// A decoded frame ready to be applied to the index.
#[derive(Debug, Clone)]
pub enum FeedUpdate {
    Shipyard {
        system: String,
        station: String,
        ships: BTreeSet<Ship>,
        unknown_ships: Vec<String>,
    },
    Outfitting {
        system: String,
        station: String,
        outfitting: Outfitting,
        unknown_modules: Vec<String>,
        unknown_categories: Vec<String>,
    },
    /// Missing or unrecognized schema reference; never parsed.
    Discarded,
}

#[derive(Deserialize)]
struct Envelope<T> {
    message: T,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ShipyardMessage {
    system_name: String,
    station_name: String,
    #[serde(default)]
    ships: Vec<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct OutfittingMessage {
    system_name: String,
    station_name: String,
    #[serde(default)]
    modules: Vec<FeedModule>,
}

#[derive(Deserialize)]
struct FeedModule {
    category: String,
    name: String,
    class: LooseText,
    rating: LooseText,
    #[serde(default)]
    ship: Option<String>,
    #[serde(default)]
    mount: Option<String>,
    #[serde(default)]
    guidance: Option<String>,
}

/// Inflate a zlib frame, refusing anything larger than `max_bytes` once inflated.
pub fn inflate(frame: &[u8], max_bytes: usize) -> Result<String> {
    let mut decoder = ZlibDecoder::new(frame).take(max_bytes as u64 + 1);
    let mut buf = Vec::new();
    decoder
        .read_to_end(&mut buf)
        .map_err(|e| StarportError::Decompression(e.to_string()))?;
    if buf.len() > max_bytes {
        return Err(StarportError::Decompression(format!(
            "frame exceeds {max_bytes} bytes once inflated"
        )));
    }
    String::from_utf8(buf).map_err(|e| StarportError::Decompression(e.to_string()))
}

/// Cheap classification on raw text: locate the schema reference and look for
/// one of the known schema URLs after it.
pub fn classify(text: &str) -> Option<Schema> {
    let start = text.find(SCHEMA_REF)? + SCHEMA_REF.len();
    let rest = &text[start..];
    if rest.contains(&format!("\"{SHIPYARD_SCHEMA}\"")) {
        Some(Schema::Shipyard)
    } else if rest.contains(&format!("\"{OUTFITTING_SCHEMA}\"")) {
        Some(Schema::Outfitting)
    } else {
        None
    }
}

/// Decode one compressed frame.
pub fn decode_frame(catalog: &Catalog, frame: &[u8], max_bytes: usize) -> Result<FeedUpdate> {
    let text = inflate(frame, max_bytes)?;
    decode_payload(catalog, &text)
}

/// Decode an already-inflated payload.
pub fn decode_payload(catalog: &Catalog, text: &str) -> Result<FeedUpdate> {
    match classify(text) {
        None => Ok(FeedUpdate::Discarded),
        Some(Schema::Shipyard) => {
            let envelope: Envelope<ShipyardMessage> = serde_json::from_str(text)?;
            Ok(shipyard_update(envelope.message))
        }
        Some(Schema::Outfitting) => {
            let envelope: Envelope<OutfittingMessage> = serde_json::from_str(text)?;
            Ok(outfitting_update(catalog, envelope.message))
        }
    }
}

fn shipyard_update(message: ShipyardMessage) -> FeedUpdate {
    let mut ships = BTreeSet::new();
    let mut unknown_ships = Vec::new();
    for raw in message.ships {
        match Ship::parse(&raw) {
            Ok(ship) => {
                ships.insert(ship);
            }
            Err(_) => unknown_ships.push(raw),
        }
    }
    FeedUpdate::Shipyard {
        system: message.system_name,
        station: message.station_name,
        ships,
        unknown_ships,
    }
}

fn resolve_module(catalog: &Catalog, category: ModuleCategory, module: &FeedModule) -> Result<u32> {
    let ship = match category {
        ModuleCategory::Standard => module.ship.as_deref().map(Ship::parse).transpose()?,
        _ => None,
    };
    let (mount, guidance) = match category {
        ModuleCategory::Hardpoint => (module.mount.as_deref(), module.guidance.as_deref()),
        _ => (None, None),
    };
    let descriptor = ModuleDescriptor {
        name: &module.name,
        class: module.class.as_str(),
        rating: module.rating.as_str(),
        ship,
        mount,
        guidance,
    };
    catalog.space(category).index_by_descriptor(&descriptor)
}

fn outfitting_update(catalog: &Catalog, message: OutfittingMessage) -> FeedUpdate {
    let mut sets: [Option<ModuleSet>; 4] = Default::default();
    let mut unknown_modules = Vec::new();
    let mut unknown_categories = Vec::new();

    for module in &message.modules {
        let Some(category) = ModuleCategory::from_feed(&module.category) else {
            unknown_categories.push(module.category.clone());
            continue;
        };
        // The category counts as present even if every module in it is unknown.
        let set = sets[category.index()].get_or_insert_with(|| catalog.space(category).empty_set());
        match resolve_module(catalog, category, module) {
            Ok(index) => set.add(index),
            Err(e) => unknown_modules.push(e.to_string()),
        }
    }

    let mut outfitting = Outfitting::default();
    for category in ModuleCategory::ALL {
        outfitting.set(category, sets[category.index()].take());
    }
    FeedUpdate::Outfitting {
        system: message.system_name,
        station: message.station_name,
        outfitting,
        unknown_modules,
        unknown_categories,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::write::ZlibEncoder;
    use flate2::Compression;
    use std::io::Write;

    const CATALOG: &str = r#"{
        "standard": [{"id": "pp2E", "eddbID": "1", "grp": "pp", "class": 2, "rating": "E"}],
        "bulkheads": {"Eagle": [{"id": "e0", "name": "Lightweight Alloy", "class": 1, "rating": "I"}]},
        "internal": [{"id": "fs1E", "eddbID": "2", "grp": "fs", "class": 1, "rating": "E"}],
        "hardpoints": [
            {"id": "pl1F", "eddbID": "3", "grp": "pl", "class": 1, "rating": "F", "mode": "F"},
            {"id": "sb0A", "eddbID": "4", "grp": "sb", "class": 0, "rating": "A"}
        ]
    }"#;

    fn compress(text: &str) -> Vec<u8> {
        let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(text.as_bytes()).unwrap();
        encoder.finish().unwrap()
    }

    fn catalog() -> Catalog {
        Catalog::from_json(CATALOG).unwrap()
    }

    #[test]
    fn test_inflate_round_trip() {
        let frame = compress("{\"hello\": 1}");
        assert_eq!(inflate(&frame, 1024).unwrap(), "{\"hello\": 1}");
    }

    #[test]
    fn test_inflate_rejects_garbage_and_oversize() {
        assert!(matches!(
            inflate(b"definitely not zlib", 1024),
            Err(StarportError::Decompression(_))
        ));
        let big = "x".repeat(2048);
        assert!(matches!(
            inflate(&compress(&big), 1024),
            Err(StarportError::Decompression(_))
        ));
    }

    #[test]
    fn test_classify() {
        let shipyard = format!(r#"{{"$schemaRef": "{SHIPYARD_SCHEMA}", "message": {{}}}}"#);
        let outfitting = format!(r#"{{"$schemaRef": "{OUTFITTING_SCHEMA}", "message": {{}}}}"#);
        assert_eq!(classify(&shipyard), Some(Schema::Shipyard));
        assert_eq!(classify(&outfitting), Some(Schema::Outfitting));
        assert_eq!(
            classify(r#"{"$schemaRef": "http://schemas.elite-markets.net/eddn/commodity/2"}"#),
            None
        );
        assert_eq!(classify(r#"{"message": {}}"#), None);
    }

    #[test]
    fn test_unknown_schema_is_not_parsed() {
        // Not valid JSON at all: discarded before any parse is attempted.
        let text = r#"{"$schemaRef": "http://schemas.elite-markets.net/eddn/commodity/2", garbage"#;
        assert!(matches!(
            decode_payload(&catalog(), text).unwrap(),
            FeedUpdate::Discarded
        ));
    }

    #[test]
    fn test_shipyard_decoding_skips_unknown_ships() {
        let text = format!(
            r#"{{"$schemaRef": "{SHIPYARD_SCHEMA}", "message": {{
                "systemName": "Lave", "stationName": "Lave Station",
                "ships": ["Cobra Mk. III", "Eagle", "Millennium Falcon"]}}}}"#
        );
        match decode_frame(&catalog(), &compress(&text), 1 << 19).unwrap() {
            FeedUpdate::Shipyard {
                system,
                station,
                ships,
                unknown_ships,
            } => {
                assert_eq!(system, "Lave");
                assert_eq!(station, "Lave Station");
                assert_eq!(ships.len(), 2);
                assert!(ships.contains(&Ship::CobraMkIii));
                assert_eq!(unknown_ships, vec!["Millennium Falcon"]);
            }
            other => panic!("expected shipyard update, got {:?}", other),
        }
    }

    #[test]
    fn test_outfitting_decoding() {
        let text = format!(
            r#"{{"$schemaRef": "{OUTFITTING_SCHEMA}", "message": {{
                "systemName": "Lave", "stationName": "Lave Station",
                "modules": [
                    {{"category": "standard", "name": "Power Plant", "class": "2", "rating": "E"}},
                    {{"category": "standard", "name": "Lightweight Alloy", "class": 1, "rating": "I", "ship": "Eagle"}},
                    {{"category": "hardpoint", "name": "Pulse Laser", "class": 1, "rating": "F", "mount": "Fixed"}},
                    {{"category": "hardpoint", "name": "Pulse Laser", "class": 1, "rating": "F", "mount": "Turreted"}},
                    {{"category": "cosmetic", "name": "Paint Job", "class": 0, "rating": "I"}}
                ]}}}}"#
        );
        let catalog = catalog();
        match decode_payload(&catalog, &text).unwrap() {
            FeedUpdate::Outfitting {
                outfitting,
                unknown_modules,
                unknown_categories,
                ..
            } => {
                let standard = outfitting.get(ModuleCategory::Standard).unwrap();
                assert_eq!(
                    catalog.space(ModuleCategory::Standard).ids_of(standard),
                    vec!["pp2E", "e0"]
                );
                let hardpoint = outfitting.get(ModuleCategory::Hardpoint).unwrap();
                assert_eq!(hardpoint.len(), 1);
                assert!(outfitting.get(ModuleCategory::Internal).is_none());
                assert!(outfitting.get(ModuleCategory::Utility).is_none());
                assert_eq!(unknown_modules.len(), 1);
                assert!(unknown_modules[0].contains("Turreted"));
                assert_eq!(unknown_categories, vec!["cosmetic"]);
            }
            other => panic!("expected outfitting update, got {:?}", other),
        }
    }

    #[test]
    fn test_malformed_known_schema_is_json_error() {
        let text = format!(r#"{{"$schemaRef": "{SHIPYARD_SCHEMA}", "message": {{"ships": 4}}}}"#);
        assert!(matches!(
            decode_payload(&catalog(), &text),
            Err(StarportError::Json(_))
        ));
    }
}
