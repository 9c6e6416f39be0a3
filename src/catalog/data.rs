//! Reference data records as they appear in the catalog JSON document.

use serde::Deserialize;
use std::collections::BTreeMap;

use crate::types::LooseText;

/// Top-level catalog document.
#[derive(Debug, Deserialize)]
pub struct CatalogDocument {
    #[serde(default)]
    pub standard: Vec<ModuleRecord>,
    #[serde(default)]
    pub internal: Vec<ModuleRecord>,
    /// Hardpoint and utility records; class 0 marks a utility mount.
    #[serde(default)]
    pub hardpoints: Vec<ModuleRecord>,
    /// Hull armour, keyed by ship name as written in the source data.
    #[serde(default)]
    pub bulkheads: BTreeMap<String, Vec<BulkheadRecord>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ModuleRecord {
    pub id: String,
    #[serde(rename = "eddbID", default)]
    pub eddb_id: Option<LooseText>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub grp: Option<String>,
    pub class: LooseText,
    pub rating: String,
    /// Mount for weapons: F(ixed), G(imballed), T(urreted).
    #[serde(default)]
    pub mode: Option<String>,
    /// Guidance for missile weapons: D(umbfire), S(eeker).
    #[serde(default)]
    pub missile: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BulkheadRecord {
    pub id: String,
    pub name: String,
    pub class: LooseText,
    pub rating: String,
}

/// Display name for a group code, used when a record carries no explicit name.
pub fn group_name(code: &str) -> Option<&'static str> {
    let name = match code {
        // standard
        "pp" => "power plant",
        "t" => "thrusters",
        "fd" => "frame shift drive",
        "ls" => "life support",
        "pd" => "power distributor",
        "s" => "sensors",
        "ft" => "fuel tank",
        // internal
        "fs" => "fuel scoop",
        "sc" => "scanner",
        "am" => "auto field-maintenance unit",
        "cr" => "cargo rack",
        "fi" => "frame shift drive interdictor",
        "hb" => "hatch breaker limpet controller",
        "hr" => "hull reinforcement package",
        "rf" => "refinery",
        "scb" => "shield cell bank",
        "sg" => "shield generator",
        "psg" => "prismatic shield generator",
        "dc" => "docking computer",
        "fx" => "fuel transfer limpet controller",
        "pc" => "prospector limpet controller",
        "cc" => "collector limpet controller",
        // hardpoints and utilities
        "bl" => "beam laser",
        "ul" => "burst laser",
        "c" => "cannon",
        "cs" => "cargo scanner",
        "cm" => "countermeasure",
        "fc" => "fragment cannon",
        "ws" => "frame shift wake scanner",
        "kw" => "kill warrant scanner",
        "nl" => "mine launcher",
        "ml" => "mining laser",
        "mr" => "missile rack",
        "pa" => "plasma accelerator",
        "mc" => "multi-cannon",
        "pl" => "pulse laser",
        "rg" => "rail gun",
        "sb" => "shield booster",
        "tp" => "torpedo pylon",
        _ => return None,
    };
    Some(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_group_names() {
        assert_eq!(group_name("pp"), Some("power plant"));
        assert_eq!(group_name("psg"), Some("prismatic shield generator"));
        assert_eq!(group_name("mc"), Some("multi-cannon"));
        assert_eq!(group_name("zz"), None);
    }

    #[test]
    fn test_record_accepts_numeric_fields() {
        let json = r#"{"id":"01","eddbID":1234,"grp":"pp","class":2,"rating":"E"}"#;
        let record: ModuleRecord = serde_json::from_str(json).unwrap();
        assert_eq!(record.class.as_str(), "2");
        assert_eq!(record.eddb_id.unwrap().as_str(), "1234");
        assert!(record.name.is_none());
    }
}
