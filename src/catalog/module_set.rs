//! Per-category module inventories and the intersection matcher used by search.
//!
//! A `ModuleSet` is a bit vector over one numbering space: bit `i` is set when
//! the module with catalog index `i` is present. Sets are backed by roaring
//! bitmaps so intersection counts never allocate.

use roaring::RoaringBitmap;

use super::ModuleCategory;

/// Membership set over one numbering space, sized when the catalog is built.
#[derive(Debug, Clone, PartialEq)]
pub struct ModuleSet {
    bits: RoaringBitmap,
    capacity: u32,
}

impl ModuleSet {
    /// An empty set for a space with `capacity` modules.
    pub fn with_capacity(capacity: u32) -> Self {
        Self {
            bits: RoaringBitmap::new(),
            capacity,
        }
    }

    /// Set bit `index`. Indexes come from the catalog and must be < capacity.
    pub fn add(&mut self, index: u32) {
        debug_assert!(
            index < self.capacity,
            "module index {index} outside space of {}",
            self.capacity
        );
        self.bits.insert(index);
    }

    pub fn contains(&self, index: u32) -> bool {
        self.bits.contains(index)
    }

    pub fn len(&self) -> u64 {
        self.bits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bits.is_empty()
    }

    pub fn capacity(&self) -> u32 {
        self.capacity
    }

    /// Set indexes in ascending order.
    pub fn iter(&self) -> impl Iterator<Item = u32> + '_ {
        self.bits.iter()
    }
}

/// A compiled "wanted" set. Matching counts `|wanted ∩ candidate|` and never
/// touches the wanted set, so one matcher serves a whole search.
#[derive(Debug, Clone)]
pub struct ModuleMatcher {
    wanted: ModuleSet,
    count: u32,
}

impl ModuleMatcher {
    pub fn new(wanted: ModuleSet) -> Self {
        let count = wanted.len() as u32;
        Self { wanted, count }
    }

    /// Number of wanted modules, fixed at construction.
    pub fn count(&self) -> u32 {
        self.count
    }

    /// How many wanted modules the candidate carries. Unknown inventory matches nothing.
    pub fn match_count(&self, candidate: Option<&ModuleSet>) -> u32 {
        match candidate {
            Some(set) => self.wanted.bits.intersection_len(&set.bits) as u32,
            None => 0,
        }
    }
}

/// The four nullable inventories of a station, one per numbering space.
/// `None` means "unknown", not "empty".
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Outfitting {
    sets: [Option<ModuleSet>; 4],
}

impl Outfitting {
    pub fn get(&self, category: ModuleCategory) -> Option<&ModuleSet> {
        self.sets[category.index()].as_ref()
    }

    pub fn set(&mut self, category: ModuleCategory, set: Option<ModuleSet>) {
        self.sets[category.index()] = set;
    }

    /// True when every category has known inventory.
    pub fn is_complete(&self) -> bool {
        self.sets.iter().all(Option::is_some)
    }

    /// True when no category has known inventory.
    pub fn is_unknown(&self) -> bool {
        self.sets.iter().all(Option::is_none)
    }

    pub fn clear(&mut self) {
        self.sets = Default::default();
    }

    /// Categories with known inventory.
    pub fn present(&self) -> impl Iterator<Item = (ModuleCategory, &ModuleSet)> {
        ModuleCategory::ALL
            .into_iter()
            .filter_map(|c| self.get(c).map(|set| (c, set)))
    }

    /// Replace every category present in `update`, leaving the rest untouched.
    /// Returns whether anything changed.
    pub fn apply(&mut self, update: Outfitting) -> bool {
        let mut changed = false;
        for (slot, incoming) in self.sets.iter_mut().zip(update.sets) {
            if let Some(set) = incoming {
                if slot.as_ref() != Some(&set) {
                    *slot = Some(set);
                    changed = true;
                }
            }
        }
        changed
    }
}
