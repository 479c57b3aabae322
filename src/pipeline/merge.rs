//! Coordinate-bucket merging.

use crate::geo::BucketKey;
use crate::models::Accommodation;
use std::collections::{HashMap, HashSet};

/// Running first-writer-wins view used for progress reporting
#[derive(Debug, Default)]
pub struct FirstWriterSet {
    buckets: HashSet<BucketKey>,
    items: Vec<Accommodation>,
}

impl FirstWriterSet {
    /// Adds `accommodation` unless its bucket is taken. Unplaceable entities are refused.
    pub fn insert(&mut self, accommodation: &Accommodation) -> bool {
        let Some(key) = BucketKey::of(accommodation) else {
            return false;
        };
        if !self.buckets.insert(key) {
            return false;
        }
        self.items.push(accommodation.clone());
        true
    }

    pub fn items(&self) -> &[Accommodation] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// Final pass: one entity per bucket, the most complete one winning.
///
/// On an equal completeness score the earlier entity stays. Unplaceable
/// entities are dropped, and so is any entity repeating an id already kept.
pub fn deduplicate(accumulated: &[Accommodation]) -> Vec<Accommodation> {
    let mut slots: HashMap<BucketKey, usize> = HashMap::new();
    let mut kept: Vec<Accommodation> = Vec::new();

    for accommodation in accumulated {
        let Some(key) = BucketKey::of(accommodation) else {
            continue;
        };
        match slots.get(&key) {
            Some(&slot) => {
                if accommodation.completeness_score() > kept[slot].completeness_score() {
                    kept[slot] = accommodation.clone();
                }
            }
            None => {
                slots.insert(key, kept.len());
                kept.push(accommodation.clone());
            }
        }
    }

    let mut ids = HashSet::new();
    kept.retain(|a| ids.insert(a.id.clone()));
    kept
}
