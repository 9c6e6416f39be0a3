//! Shell-expansion search for stations that can supply a ship and module loadout.
//!
//! Sectors are visited in cubic shells of increasing radius around the origin's
//! sector. Every station in a visited sector is scored, and the best candidates
//! are kept in a bounded heap whose top is always the worst kept candidate.

use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap};

use crate::catalog::{ModuleCategory, ModuleMatcher, Ship};
use crate::types::{BuildCandidate, SectorCoord, StarSystem, SystemId};

use super::sector::shell;

/// What a caller is trying to build: an optional hull plus up to one matcher
/// per numbering space.
#[derive(Debug, Clone, Default)]
pub struct BuildQuery {
    pub ship: Option<Ship>,
    matchers: [Option<ModuleMatcher>; 4],
}

impl BuildQuery {
    pub fn new(ship: Option<Ship>) -> Self {
        Self {
            ship,
            matchers: Default::default(),
        }
    }

    pub fn with_matcher(mut self, category: ModuleCategory, matcher: Option<ModuleMatcher>) -> Self {
        self.matchers[category.index()] = matcher;
        self
    }

    pub fn matcher(&self, category: ModuleCategory) -> Option<&ModuleMatcher> {
        self.matchers[category.index()].as_ref()
    }

    /// Total modules wanted across all categories.
    pub fn total_wanted(&self) -> u32 {
        self.matchers.iter().flatten().map(ModuleMatcher::count).sum()
    }

    /// True when the query asks for nothing and so can never score.
    pub fn is_empty(&self) -> bool {
        self.ship.is_none() && self.total_wanted() == 0
    }
}

/// Best-first ordering: `Less` means `a` ranks ahead of `b`.
///
/// When both candidates sell the wanted ship, more matched modules win and
/// distance breaks ties. Otherwise the score decides, with distance as the
/// final tie-break so results are deterministic.
pub fn rank(a: &BuildCandidate, b: &BuildCandidate) -> Ordering {
    if a.has_ship && b.has_ship {
        b.modules_found
            .cmp(&a.modules_found)
            .then_with(|| a.distance_ly.total_cmp(&b.distance_ly))
    } else {
        b.score
            .total_cmp(&a.score)
            .then_with(|| a.distance_ly.total_cmp(&b.distance_ly))
    }
}

/// Heap entry ordered so the worst-ranked candidate sits on top.
struct Ranked(BuildCandidate);

impl PartialEq for Ranked {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Ranked {}

impl PartialOrd for Ranked {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Ranked {
    fn cmp(&self, other: &Self) -> Ordering {
        rank(&self.0, &other.0)
    }
}

/// Bounded best-first collector. Insert and evict are O(log k).
pub struct TopCandidates {
    heap: BinaryHeap<Ranked>,
    capacity: usize,
}

impl TopCandidates {
    pub fn new(capacity: usize) -> Self {
        Self {
            heap: BinaryHeap::with_capacity(capacity.saturating_add(1)),
            capacity,
        }
    }

    pub fn offer(&mut self, candidate: BuildCandidate) {
        if self.capacity == 0 {
            return;
        }
        self.heap.push(Ranked(candidate));
        if self.heap.len() > self.capacity {
            self.heap.pop();
        }
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    /// Drain into a best-first vector.
    pub fn into_sorted(self) -> Vec<BuildCandidate> {
        // Ascending by `Ranked` order is best-first.
        self.heap.into_sorted_vec().into_iter().map(|r| r.0).collect()
    }
}

/// Outcome of one search, with the number of shells actually expanded.
pub struct SearchOutcome {
    pub candidates: Vec<BuildCandidate>,
    pub shells_visited: u32,
}

fn round_2dp(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

pub(crate) fn search(
    systems: &HashMap<SystemId, StarSystem>,
    sectors: &HashMap<SectorCoord, Vec<SystemId>>,
    origin: &StarSystem,
    query: &BuildQuery,
    max_shell_radius: i32,
    max_results: usize,
) -> SearchOutcome {
    let total_wanted = query.total_wanted();
    let mut top = TopCandidates::new(max_results);
    let mut found = false;
    let mut shells_visited = 0;

    for radius in 0..=max_shell_radius {
        if found {
            break;
        }
        shells_visited += 1;

        for cell in shell(origin.sector, radius) {
            let Some(bucket) = sectors.get(&cell) else {
                continue;
            };
            for system in bucket.iter().filter_map(|id| systems.get(id)) {
                let mut distance = None;
                for station in system.stations.values() {
                    let has_ship = query.ship.is_some_and(|s| station.sells_ship(s));

                    let mut modules_found = 0;
                    let mut score = 0.0;
                    if total_wanted > 0 {
                        for category in ModuleCategory::ALL {
                            if let Some(matcher) = query.matcher(category) {
                                modules_found +=
                                    matcher.match_count(station.outfitting.get(category));
                            }
                        }
                        score = modules_found as f64 / total_wanted as f64;
                    }
                    if has_ship {
                        score += 1.0;
                    }
                    if score <= 0.0 {
                        continue;
                    }

                    // Only ship plus every module is a full match; finish this
                    // shell, then stop expanding.
                    if has_ship && total_wanted > 0 && modules_found == total_wanted {
                        found = true;
                    }

                    let distance_ly =
                        *distance.get_or_insert_with(|| round_2dp(system.distance_to(origin)));
                    top.offer(BuildCandidate {
                        system_name: system.name.clone(),
                        station: station.clone(),
                        has_ship,
                        modules_found,
                        score,
                        distance_ly,
                    });
                }
            }
        }
    }

    SearchOutcome {
        candidates: top.into_sorted(),
        shells_visited,
    }
}
