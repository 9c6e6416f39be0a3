//! Module catalog: four dense numbering spaces built once from reference data.
//!
//! Every module id owns one bit index inside its space. Indexes are assigned
//! in document order (standard records first, then hull armour by ship name),
//! so the same document always produces the same bijection.

pub mod data;
pub mod module_set;
pub mod ship;

pub use module_set::{ModuleMatcher, ModuleSet, Outfitting};
pub use ship::Ship;

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::path::Path;
use tracing::{info, warn};

use crate::error::{Result, StarportError};
use data::{group_name, BulkheadRecord, CatalogDocument, ModuleRecord};

const BUNDLED_CATALOG: &str = include_str!("../../data/catalog.json");

/// One of the four independent numbering spaces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModuleCategory {
    Standard,
    Internal,
    Hardpoint,
    Utility,
}

impl ModuleCategory {
    pub const ALL: [ModuleCategory; 4] = [
        ModuleCategory::Standard,
        ModuleCategory::Internal,
        ModuleCategory::Hardpoint,
        ModuleCategory::Utility,
    ];

    pub fn index(self) -> usize {
        match self {
            ModuleCategory::Standard => 0,
            ModuleCategory::Internal => 1,
            ModuleCategory::Hardpoint => 2,
            ModuleCategory::Utility => 3,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ModuleCategory::Standard => "standard",
            ModuleCategory::Internal => "internal",
            ModuleCategory::Hardpoint => "hardpoint",
            ModuleCategory::Utility => "utility",
        }
    }

    /// Classify a feed category discriminator. Unrecognized values yield `None`.
    pub fn from_feed(raw: &str) -> Option<ModuleCategory> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "standard" | "bulkhead" | "bulkheads" => Some(ModuleCategory::Standard),
            "internal" => Some(ModuleCategory::Internal),
            "hardpoint" | "hardpoints" => Some(ModuleCategory::Hardpoint),
            "utility" | "utilities" => Some(ModuleCategory::Utility),
            _ => None,
        }
    }
}

impl fmt::Display for ModuleCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Composite lookup key for a module as described by free-form feed data.
#[derive(Debug, Clone, Default)]
pub struct ModuleDescriptor<'a> {
    pub name: &'a str,
    pub class: &'a str,
    pub rating: &'a str,
    /// Owning hull, only meaningful for hull armour.
    pub ship: Option<Ship>,
    /// Weapon mount; only the first letter is significant.
    pub mount: Option<&'a str>,
    /// Missile guidance; only the first letter is significant.
    pub guidance: Option<&'a str>,
}

impl ModuleDescriptor<'_> {
    fn key(&self) -> String {
        descriptor_key(
            self.ship,
            self.name,
            self.class,
            self.rating,
            self.mount,
            self.guidance,
        )
    }
}

impl fmt::Display for ModuleDescriptor<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(ship) = self.ship {
            write!(f, "{} ", ship)?;
        }
        write!(f, "{} {}{}", self.name, self.class, self.rating)?;
        if let Some(mount) = self.mount {
            write!(f, " mount={}", mount)?;
        }
        if let Some(guidance) = self.guidance {
            write!(f, " guidance={}", guidance)?;
        }
        Ok(())
    }
}

fn first_letter(qualifier: Option<&str>) -> String {
    qualifier
        .and_then(|q| q.trim().chars().next())
        .map(|c| c.to_ascii_uppercase().to_string())
        .unwrap_or_default()
}

fn descriptor_key(
    ship: Option<Ship>,
    name: &str,
    class: &str,
    rating: &str,
    mount: Option<&str>,
    guidance: Option<&str>,
) -> String {
    format!(
        "{}|{}|{}|{}|{}|{}",
        ship.map(Ship::name).unwrap_or(""),
        name.trim().to_lowercase(),
        class.trim(),
        rating.trim().to_ascii_uppercase(),
        first_letter(mount),
        first_letter(guidance),
    )
}

/// One numbering space: ordered ids (position = bit index) and its lookup maps.
#[derive(Debug, Clone)]
pub struct ModuleSpace {
    category: ModuleCategory,
    ids: Vec<String>,
    by_id: HashMap<String, u32>,
    by_external: HashMap<String, u32>,
    by_descriptor: HashMap<String, u32>,
}

impl ModuleSpace {
    fn new(category: ModuleCategory) -> Self {
        Self {
            category,
            ids: Vec::new(),
            by_id: HashMap::new(),
            by_external: HashMap::new(),
            by_descriptor: HashMap::new(),
        }
    }

    fn push(&mut self, id: &str, external_id: Option<&str>, descriptor: String) -> Result<()> {
        let index = self.ids.len() as u32;
        if self.by_id.contains_key(id) {
            return Err(StarportError::CatalogLoad(format!(
                "duplicate {} module id '{}'",
                self.category, id
            )));
        }
        if let Some(ext) = external_id.filter(|e| !e.is_empty()) {
            if self.by_external.contains_key(ext) {
                warn!(category = %self.category, external_id = ext, id, "duplicate external id, keeping first");
            } else {
                self.by_external.insert(ext.to_string(), index);
            }
        }
        if self.by_descriptor.contains_key(&descriptor) {
            warn!(category = %self.category, descriptor = %descriptor, id, "duplicate descriptor, keeping first");
        } else {
            self.by_descriptor.insert(descriptor, index);
        }
        self.by_id.insert(id.to_string(), index);
        self.ids.push(id.to_string());
        Ok(())
    }

    pub fn category(&self) -> ModuleCategory {
        self.category
    }

    /// Cardinality of the space; every set over it has this capacity.
    pub fn count(&self) -> u32 {
        self.ids.len() as u32
    }

    pub fn index_by_id(&self, id: &str) -> Result<u32> {
        self.by_id
            .get(id)
            .copied()
            .ok_or_else(|| StarportError::UnknownId { id: id.to_string() })
    }

    /// Best-effort lookup for partially-known external data.
    pub fn index_by_external_id(&self, external_id: &str) -> Option<u32> {
        self.by_external.get(external_id).copied()
    }

    pub fn index_by_descriptor(&self, descriptor: &ModuleDescriptor<'_>) -> Result<u32> {
        self.by_descriptor
            .get(&descriptor.key())
            .copied()
            .ok_or_else(|| StarportError::UnknownModule {
                descriptor: descriptor.to_string(),
            })
    }

    pub fn id_at(&self, index: u32) -> Option<&str> {
        self.ids.get(index as usize).map(String::as_str)
    }

    pub fn empty_set(&self) -> ModuleSet {
        ModuleSet::with_capacity(self.count())
    }

    /// Encode canonical ids. An empty list means "no constraint" and yields `None`.
    pub fn set_from_ids<S: AsRef<str>>(&self, ids: &[S]) -> Result<Option<ModuleSet>> {
        if ids.is_empty() {
            return Ok(None);
        }
        let mut set = self.empty_set();
        for id in ids {
            set.add(self.index_by_id(id.as_ref())?);
        }
        Ok(Some(set))
    }

    /// Encode external ids, skipping any the catalog does not know.
    pub fn set_from_external_ids<S: AsRef<str>>(&self, external_ids: &[S]) -> ModuleSet {
        let mut set = self.empty_set();
        for ext in external_ids {
            if let Some(index) = self.index_by_external_id(ext.as_ref()) {
                set.add(index);
            }
        }
        set
    }

    /// Decode a set back to canonical ids, in index order.
    pub fn ids_of(&self, set: &ModuleSet) -> Vec<String> {
        set.iter()
            .filter_map(|i| self.id_at(i).map(str::to_string))
            .collect()
    }
}

/// Immutable module catalog shared by the index, the feed, and the query path.
#[derive(Debug, Clone)]
pub struct Catalog {
    spaces: [ModuleSpace; 4],
}

impl Catalog {
    /// Build from the bundled reference data.
    pub fn bundled() -> Result<Self> {
        Self::from_json(BUNDLED_CATALOG)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            StarportError::CatalogLoad(format!("failed to read {}: {}", path.display(), e))
        })?;
        Self::from_json(&raw)
    }

    pub fn from_json(raw: &str) -> Result<Self> {
        let doc: CatalogDocument = serde_json::from_str(raw)
            .map_err(|e| StarportError::CatalogLoad(format!("malformed catalog document: {e}")))?;
        Self::from_document(doc)
    }

    fn from_document(doc: CatalogDocument) -> Result<Self> {
        let mut standard = ModuleSpace::new(ModuleCategory::Standard);
        let mut internal = ModuleSpace::new(ModuleCategory::Internal);
        let mut hardpoint = ModuleSpace::new(ModuleCategory::Hardpoint);
        let mut utility = ModuleSpace::new(ModuleCategory::Utility);

        for record in &doc.standard {
            add_record(&mut standard, record, false)?;
        }
        for (raw_ship, bulkheads) in &doc.bulkheads {
            let ship = Ship::parse(raw_ship)?;
            for bulkhead in bulkheads {
                add_bulkhead(&mut standard, ship, bulkhead)?;
            }
        }
        for record in &doc.internal {
            add_record(&mut internal, record, false)?;
        }
        for record in &doc.hardpoints {
            let class: u32 = parse_class(record)?;
            if class == 0 {
                add_record(&mut utility, record, false)?;
            } else {
                add_record(&mut hardpoint, record, true)?;
            }
        }

        info!(
            standard = standard.count(),
            internal = internal.count(),
            hardpoint = hardpoint.count(),
            utility = utility.count(),
            "Module catalog built"
        );

        Ok(Self {
            spaces: [standard, internal, hardpoint, utility],
        })
    }

    pub fn space(&self, category: ModuleCategory) -> &ModuleSpace {
        &self.spaces[category.index()]
    }

    /// Compile a matcher from canonical ids. An empty list means no matcher.
    pub fn matcher<S: AsRef<str>>(
        &self,
        category: ModuleCategory,
        ids: &[S],
    ) -> Result<Option<ModuleMatcher>> {
        Ok(self
            .space(category)
            .set_from_ids(ids)?
            .map(ModuleMatcher::new))
    }

    /// Canonical ids per present category of an outfitting.
    pub fn describe(&self, outfitting: &Outfitting) -> HashMap<ModuleCategory, Vec<String>> {
        outfitting
            .present()
            .map(|(category, set)| (category, self.space(category).ids_of(set)))
            .collect()
    }
}

fn parse_class(record: &ModuleRecord) -> Result<u32> {
    record.class.as_str().trim().parse().map_err(|_| {
        StarportError::CatalogLoad(format!(
            "module '{}' has non-numeric class '{}'",
            record.id,
            record.class.as_str()
        ))
    })
}

fn add_record(space: &mut ModuleSpace, record: &ModuleRecord, qualified: bool) -> Result<()> {
    parse_class(record)?;
    let name = match (&record.name, &record.grp) {
        (Some(name), _) => name.as_str(),
        (None, Some(grp)) => group_name(grp).ok_or_else(|| {
            StarportError::CatalogLoad(format!(
                "module '{}' has unknown group code '{}'",
                record.id, grp
            ))
        })?,
        (None, None) => {
            return Err(StarportError::CatalogLoad(format!(
                "module '{}' has neither name nor group",
                record.id
            )))
        }
    };
    let (mount, guidance) = if qualified {
        (record.mode.as_deref(), record.missile.as_deref())
    } else {
        (None, None)
    };
    let key = descriptor_key(
        None,
        name,
        record.class.as_str(),
        &record.rating,
        mount,
        guidance,
    );
    space.push(
        &record.id,
        record.eddb_id.as_ref().map(|e| e.as_str()),
        key,
    )
}

fn add_bulkhead(space: &mut ModuleSpace, ship: Ship, record: &BulkheadRecord) -> Result<()> {
    let key = descriptor_key(
        Some(ship),
        &record.name,
        record.class.as_str(),
        &record.rating,
        None,
        None,
    );
    space.push(&record.id, None, key)
}
