//! Canonical ship hulls and the alias table used to parse untrusted ship names.

use serde::{Deserialize, Serialize, Serializer};
use std::str::FromStr;

use crate::error::StarportError;

/// A purchasable ship hull.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Ship {
    Adder,
    Anaconda,
    AspExplorer,
    CobraMkIii,
    DiamondbackExplorer,
    DiamondbackScout,
    Eagle,
    FederalAssaultShip,
    FederalDropship,
    FederalGunship,
    FerDeLance,
    Hauler,
    ImperialClipper,
    ImperialCourier,
    ImperialEagle,
    Orca,
    Python,
    Sidewinder,
    Type6Transporter,
    Type7Transporter,
    Type9Heavy,
    Viper,
    Vulture,
}

impl Ship {
    pub const ALL: [Ship; 23] = [
        Ship::Adder,
        Ship::Anaconda,
        Ship::AspExplorer,
        Ship::CobraMkIii,
        Ship::DiamondbackExplorer,
        Ship::DiamondbackScout,
        Ship::Eagle,
        Ship::FederalAssaultShip,
        Ship::FederalDropship,
        Ship::FederalGunship,
        Ship::FerDeLance,
        Ship::Hauler,
        Ship::ImperialClipper,
        Ship::ImperialCourier,
        Ship::ImperialEagle,
        Ship::Orca,
        Ship::Python,
        Ship::Sidewinder,
        Ship::Type6Transporter,
        Ship::Type7Transporter,
        Ship::Type9Heavy,
        Ship::Viper,
        Ship::Vulture,
    ];

    /// Display name, also the canonical key for hull-armour catalog entries.
    pub fn name(self) -> &'static str {
        match self {
            Ship::Adder => "Adder",
            Ship::Anaconda => "Anaconda",
            Ship::AspExplorer => "Asp Explorer",
            Ship::CobraMkIii => "Cobra Mk III",
            Ship::DiamondbackExplorer => "Diamondback Explorer",
            Ship::DiamondbackScout => "Diamondback Scout",
            Ship::Eagle => "Eagle",
            Ship::FederalAssaultShip => "Federal Assault Ship",
            Ship::FederalDropship => "Federal Dropship",
            Ship::FederalGunship => "Federal Gunship",
            Ship::FerDeLance => "Fer-de-Lance",
            Ship::Hauler => "Hauler",
            Ship::ImperialClipper => "Imperial Clipper",
            Ship::ImperialCourier => "Imperial Courier",
            Ship::ImperialEagle => "Imperial Eagle",
            Ship::Orca => "Orca",
            Ship::Python => "Python",
            Ship::Sidewinder => "Sidewinder",
            Ship::Type6Transporter => "Type-6 Transporter",
            Ship::Type7Transporter => "Type-7 Transporter",
            Ship::Type9Heavy => "Type-9 Heavy",
            Ship::Viper => "Viper",
            Ship::Vulture => "Vulture",
        }
    }

    /// Lowercase alternate spellings seen in feed and snapshot data.
    pub fn aliases(self) -> &'static [&'static str] {
        match self {
            Ship::AspExplorer => &["asp"],
            Ship::CobraMkIii => &["cobra_mk_iii"],
            Ship::DiamondbackExplorer => &["diamondback_explorer"],
            Ship::DiamondbackScout => &["diamondback", "diamondback_scout"],
            Ship::Eagle => &["eagle mk ii"],
            Ship::FederalAssaultShip => &["federal_assault_ship"],
            Ship::FederalDropship => &["federal_dropship"],
            Ship::FederalGunship => &["federal_gunship"],
            Ship::FerDeLance => &["fer_de_lance"],
            Ship::ImperialClipper => &["imperial_clipper"],
            Ship::ImperialCourier => &["imperial_courier"],
            Ship::ImperialEagle => &["imperial_eagle"],
            Ship::Sidewinder => &["sidewinder mk i"],
            Ship::Type6Transporter => &["type_6_transporter"],
            Ship::Type7Transporter => &["type_7_transporter", "type_7_transport"],
            Ship::Type9Heavy => &["type_9_heavy"],
            Ship::Viper => &["viper mk iii"],
            _ => &[],
        }
    }

    /// Resolve a ship from free text: trimmed, dots removed, display name
    /// compared case-insensitively, aliases compared lowercased.
    pub fn parse(raw: &str) -> Result<Ship, StarportError> {
        let normalized = raw.trim().replace('.', "");
        let lowered = normalized.to_lowercase();
        Ship::ALL
            .iter()
            .copied()
            .find(|ship| {
                ship.name().eq_ignore_ascii_case(&normalized)
                    || ship.aliases().contains(&lowered.as_str())
            })
            .ok_or(StarportError::UnknownShip { name: normalized })
    }
}

impl std::fmt::Display for Ship {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Ship {
    type Err = StarportError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ship::parse(s)
    }
}

impl Serialize for Ship {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.name())
    }
}

impl<'de> Deserialize<'de> for Ship {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ship::parse(&raw).map_err(serde::de::Error::custom)
    }
}
