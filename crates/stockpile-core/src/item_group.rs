//! Spawn tables: recursive weighted lists of items and nested groups.
//!
//! Groups are owned by the catalog and referenced by id. Expansion into
//! live instances happens in [`crate::catalog::Catalog::spawn_group`].

use crate::id::{GroupId, ItypeId};
use std::collections::HashSet;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum GroupKind {
    /// Pick exactly one entry, weighted by probability.
    #[default]
    Distribution,
    /// Roll each entry independently; probability is a percentage.
    Collection,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntryTarget {
    Item(ItypeId),
    Group(GroupId),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupEntry {
    pub target: EntryTarget,
    /// Weight in a distribution, percent chance in a collection.
    pub probability: i32,
    /// Inclusive count range.
    pub count: (i32, i32),
    /// Inclusive charge range, overriding the archetype default.
    pub charges: Option<(i32, i32)>,
    pub variant: Option<String>,
}

impl GroupEntry {
    pub fn item(id: impl Into<ItypeId>, probability: i32) -> Self {
        Self {
            target: EntryTarget::Item(id.into()),
            probability,
            count: (1, 1),
            charges: None,
            variant: None,
        }
    }

    pub fn group(id: impl Into<GroupId>, probability: i32) -> Self {
        Self {
            target: EntryTarget::Group(id.into()),
            probability,
            count: (1, 1),
            charges: None,
            variant: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemGroup {
    pub id: GroupId,
    pub kind: GroupKind,
    pub entries: Vec<GroupEntry>,
    /// Percent chance a spawned gun/tool comes loaded with ammo.
    pub with_ammo: i32,
    /// Percent chance a spawned gun/tool comes with its default magazine.
    pub with_magazine: i32,
}

impl ItemGroup {
    pub fn new(id: impl Into<GroupId>, kind: GroupKind) -> Self {
        Self {
            id: id.into(),
            kind,
            entries: Vec::new(),
            with_ammo: 0,
            with_magazine: 0,
        }
    }

    pub fn with_entry(mut self, entry: GroupEntry) -> Self {
        self.entries.push(entry);
        self
    }

    /// Drop every direct item entry in `deny`. Returns how many were removed.
    pub fn remove_items(&mut self, deny: &HashSet<ItypeId>) -> usize {
        let before = self.entries.len();
        self.entries.retain(|e| match &e.target {
            EntryTarget::Item(id) => !deny.contains(id),
            EntryTarget::Group(_) => true,
        });
        before - self.entries.len()
    }

    /// Point every direct reference to `from` at `to`. Returns the count.
    pub fn replace_item(&mut self, from: &ItypeId, to: &ItypeId) -> usize {
        let mut n = 0;
        for entry in &mut self.entries {
            if let EntryTarget::Item(id) = &mut entry.target {
                if id == from {
                    *id = to.clone();
                    n += 1;
                }
            }
        }
        n
    }

    pub fn item_refs(&self) -> impl Iterator<Item = &ItypeId> {
        self.entries.iter().filter_map(|e| match &e.target {
            EntryTarget::Item(id) => Some(id),
            EntryTarget::Group(_) => None,
        })
    }

    pub fn group_refs(&self) -> impl Iterator<Item = &GroupId> {
        self.entries.iter().filter_map(|e| match &e.target {
            EntryTarget::Group(id) => Some(id),
            EntryTarget::Item(_) => None,
        })
    }

    /// Sum of entry weights.
    pub fn total_weight(&self) -> i64 {
        self.entries.iter().map(|e| e.probability.max(0) as i64).sum()
    }
}
