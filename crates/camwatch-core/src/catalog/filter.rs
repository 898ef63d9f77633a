// ── Catalog search ──
//
// Pure filter over a `CatalogTree`. Matching is a case-insensitive
// substring test, no trimming.
//
//   camera   matches on name or location
//   floor    matches on name, or when any camera matches
//   building matches on name, or when any floor matches
//
// A floor kept because its name matched keeps every camera. A building
// kept because its name matched keeps every floor, each pruned by the
// floor rule.

use std::borrow::Cow;

use crate::model::facility::contains_lower;
use crate::model::{Building, Floor};

use super::tree::CatalogTree;

/// Filter `tree` by `query`. The empty query borrows the input unchanged.
pub fn filter<'a>(tree: &'a CatalogTree, query: &str) -> Cow<'a, CatalogTree> {
    if query.is_empty() {
        return Cow::Borrowed(tree);
    }
    let needle = query.to_lowercase();
    let buildings = tree
        .buildings()
        .iter()
        .filter_map(|b| filter_building(b, &needle))
        .collect();
    Cow::Owned(CatalogTree::from_linked(buildings))
}

fn filter_building(building: &Building, needle: &str) -> Option<Building> {
    let name_hit = contains_lower(&building.name, needle);
    let floors: Vec<Floor> = building
        .floors
        .iter()
        .filter_map(|floor| {
            let (pruned, matched) = filter_floor(floor, needle);
            (matched || name_hit).then_some(pruned)
        })
        .collect();

    (name_hit || !floors.is_empty()).then(|| building.with_floors(floors))
}

/// The pruned floor and whether it matched in its own right.
fn filter_floor(floor: &Floor, needle: &str) -> (Floor, bool) {
    if contains_lower(&floor.name, needle) {
        return (floor.clone(), true);
    }
    let cameras: Vec<_> = floor
        .cameras
        .iter()
        .filter(|c| c.matches(needle))
        .cloned()
        .collect();
    let matched = !cameras.is_empty();
    (floor.with_cameras(cameras), matched)
}
