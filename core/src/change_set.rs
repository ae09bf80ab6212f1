//! Keyed diff between stored and desired entities.
//!
//! Both item and ticket reconciliation reduce to the same question: given the
//! rows we have and the rows we want, what must be inserted, updated and
//! removed? [`compute_change_set`] answers it using identity keys rather than
//! positions, so the result does not depend on the order either side was
//! fetched in.
//!
//! # Example
//!
//! ```
//! use ticket_sync_core::change_set::compute_change_set;
//!
//! #[derive(Debug, PartialEq)]
//! struct Row { key: &'static str, version: u32 }
//!
//! let existing = vec![Row { key: "A", version: 1 }, Row { key: "B", version: 1 }];
//! let desired = vec![Row { key: "A", version: 2 }, Row { key: "C", version: 1 }];
//!
//! let changes = compute_change_set(
//!     existing,
//!     desired,
//!     |row| row.key,
//!     |row| row.key,
//!     |old, new| old.version == new.version,
//! );
//!
//! assert_eq!(changes.to_insert, vec![Row { key: "C", version: 1 }]);
//! assert_eq!(changes.to_update.len(), 1);
//! assert_eq!(changes.to_delete, vec![Row { key: "B", version: 1 }]);
//! ```

use std::collections::{HashMap, HashSet};
use std::hash::Hash;

/// The inserts, updates and deletes needed to turn stored state into desired state.
///
/// # Type Parameters
///
/// - `E`: Stored entity type (carries the storage id)
/// - `D`: Desired entity type (freshly derived from the external system)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeSet<E, D> {
    /// Desired entities whose key is not stored yet
    pub to_insert: Vec<D>,
    /// Stored entities paired with their desired replacement
    pub to_update: Vec<(E, D)>,
    /// Stored entities whose key is no longer desired
    pub to_delete: Vec<E>,
}

impl<E, D> ChangeSet<E, D> {
    /// A change-set with nothing to do.
    #[must_use]
    pub const fn empty() -> Self {
        Self {
            to_insert: Vec::new(),
            to_update: Vec::new(),
            to_delete: Vec::new(),
        }
    }

    /// Whether applying this change-set would be a no-op.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.to_insert.is_empty() && self.to_update.is_empty() && self.to_delete.is_empty()
    }

    /// Total number of changes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.to_insert.len() + self.to_update.len() + self.to_delete.len()
    }
}

impl<E, D> Default for ChangeSet<E, D> {
    fn default() -> Self {
        Self::empty()
    }
}

/// Compute the change-set between `existing` and `desired`.
///
/// # Arguments
///
/// * `existing` - Stored entities
/// * `desired` - Entities that should exist after reconciliation
/// * `existing_key` - Identity key of a stored entity
/// * `desired_key` - Identity key of a desired entity
/// * `unchanged` - Returns `true` when a stored entity already matches its desired counterpart
///
/// # Semantics
///
/// - Inserts and updates follow the order of `desired`; deletes follow the order of `existing`.
/// - A key repeated in `desired` is taken from its first occurrence.
/// - A key repeated in `existing` keeps its first row; the extra rows are deleted.
///
/// The function is pure: it performs no I/O and only calls the supplied closures.
pub fn compute_change_set<E, D, K, KE, KD, U>(
    existing: impl IntoIterator<Item = E>,
    desired: impl IntoIterator<Item = D>,
    existing_key: KE,
    desired_key: KD,
    unchanged: U,
) -> ChangeSet<E, D>
where
    K: Eq + Hash,
    KE: Fn(&E) -> K,
    KD: Fn(&D) -> K,
    U: Fn(&E, &D) -> bool,
{
    let mut slots: Vec<Option<E>> = Vec::new();
    let mut index: HashMap<K, usize> = HashMap::new();
    let mut to_delete = Vec::new();

    for entity in existing {
        let key = existing_key(&entity);
        if index.contains_key(&key) {
            to_delete.push(entity);
        } else {
            index.insert(key, slots.len());
            slots.push(Some(entity));
        }
    }

    let mut seen: HashSet<K> = HashSet::new();
    let mut to_insert = Vec::new();
    let mut to_update = Vec::new();

    for entity in desired {
        let key = desired_key(&entity);
        let slot = index.get(&key).copied();
        if !seen.insert(key) {
            continue;
        }

        match slot.and_then(|i| slots[i].take()) {
            Some(current) if unchanged(&current, &entity) => {}
            Some(current) => to_update.push((current, entity)),
            None => to_insert.push(entity),
        }
    }

    // Rows that were never claimed by a desired key come first so the
    // output mirrors the stored order.
    let mut stale: Vec<E> = slots.into_iter().flatten().collect();
    stale.append(&mut to_delete);

    ChangeSet {
        to_insert,
        to_update,
        to_delete: stale,
    }
}
