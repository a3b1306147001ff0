use std::collections::btree_map::Entry;
use std::collections::BTreeMap;

use confronta_core::Record;

use crate::config::Profile;

/// Rows of two tables paired by identity key.
#[derive(Debug)]
pub struct PairMatch<'a, R> {
    pub matched: Vec<(String, &'a R, &'a R)>,
    pub left_only: Vec<(String, &'a R)>,
    pub right_only: Vec<(String, &'a R)>,
}

/// Index rows by key. A repeated key keeps the first row and logs the rest.
pub fn index_by_key<'a, R: Record>(
    rows: &'a [R],
    profile: Profile,
    side: &str,
) -> BTreeMap<String, &'a R> {
    let mut map = BTreeMap::new();
    for row in rows {
        let key = profile.key(row.registration(), row.nss().as_str());
        match map.entry(key) {
            Entry::Vacant(slot) => {
                slot.insert(row);
            }
            Entry::Occupied(slot) => {
                log::warn!(
                    "{side}: duplicate worker {} ({}), keeping the first row",
                    slot.key(),
                    row.name()
                );
            }
        }
    }
    map
}

/// Match two tables by exact identity key.
pub fn match_exact_key<'a, R: Record>(left: &'a [R], right: &'a [R], profile: Profile) -> PairMatch<'a, R> {
    let left_map = index_by_key(left, profile, profile.left_label());
    let mut right_map = index_by_key(right, profile, profile.right_label());

    let mut matched = Vec::new();
    let mut left_only = Vec::new();

    for (key, left_row) in left_map {
        match right_map.remove(&key) {
            Some(right_row) => matched.push((key, left_row, right_row)),
            None => left_only.push((key, left_row)),
        }
    }
    let right_only = right_map.into_iter().collect();

    PairMatch { matched, left_only, right_only }
}
