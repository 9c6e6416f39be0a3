mod common;

use proptest::prelude::*;

use common::fixtures::catalog;

use starport::catalog::{ModuleCategory, ModuleMatcher, ModuleSet};
use starport::index::sector::{sector_of, SECTOR_MAX};

const STANDARD_IDS: [&str; 3] = ["pp1", "pp2", "sw0"];

fn bits(capacity: u32) -> impl Strategy<Value = Vec<u32>> {
    prop::collection::vec(0..capacity, 0..capacity as usize * 2)
}

fn set_of(capacity: u32, indexes: &[u32]) -> ModuleSet {
    let mut set = ModuleSet::with_capacity(capacity);
    for &i in indexes {
        set.add(i);
    }
    set
}

proptest! {
    #[test]
    fn sector_mapping_is_deterministic(
        x in -1049.0f64..1049.0,
        y in -1049.0f64..1049.0,
        z in -1049.0f64..1049.0,
    ) {
        let first = sector_of(x, y, z);
        prop_assert!(first.is_some());
        prop_assert_eq!(first, sector_of(x, y, z));
        let sector = first.unwrap();
        for axis in [sector.x, sector.y, sector.z] {
            prop_assert!(axis.abs() <= SECTOR_MAX);
        }
    }

    #[test]
    fn matcher_has_no_side_effects(
        wanted in bits(64),
        candidates in prop::collection::vec(bits(64), 1..8),
    ) {
        let shared = ModuleMatcher::new(set_of(64, &wanted));
        let count_before = shared.count();
        for candidate in &candidates {
            let set = set_of(64, candidate);
            let fresh = ModuleMatcher::new(set_of(64, &wanted));
            prop_assert_eq!(shared.match_count(Some(&set)), fresh.match_count(Some(&set)));
        }
        prop_assert_eq!(shared.count(), count_before);
        prop_assert_eq!(shared.match_count(None), 0);
    }

    #[test]
    fn module_ids_round_trip(picks in prop::collection::vec(0usize..3, 1..6)) {
        let catalog = catalog();
        let space = catalog.space(ModuleCategory::Standard);
        let ids: Vec<&str> = picks.iter().map(|&i| STANDARD_IDS[i]).collect();

        let set = space.set_from_ids(ids.as_slice()).unwrap().unwrap();
        let mut decoded = space.ids_of(&set);
        decoded.sort();
        let mut expected: Vec<String> = ids.iter().map(|s| s.to_string()).collect();
        expected.sort();
        expected.dedup();
        prop_assert_eq!(decoded, expected);
    }
}
