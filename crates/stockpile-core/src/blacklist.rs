//! Item blacklists and whitelists.
//!
//! Declarations are collected in load order and resolved once every item
//! id is known:
//!
//! - all whitelist sets merge into one allow-set;
//! - all blacklist sets merge into one deny-set;
//! - allowed ids are removed from the deny-set;
//! - a non-empty allow-set replaces the deny-set with every known id not
//!   allowed. Whitelisting switches the whole catalog to default-deny.
//!
//! Denied archetypes stay in the store but disappear from every spawn group,
//! requirement list and vehicle spawn, and recipes producing them are
//! deleted.

use crate::dependents::{DependentPrune, Dependents};
use crate::id::{GroupId, ItypeId};
use crate::item_group::ItemGroup;
use std::collections::{BTreeMap, BTreeSet, HashSet};

/// One `ITEM_BLACKLIST` or `ITEM_WHITELIST` declaration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListDecl {
    pub whitelist: bool,
    pub items: BTreeSet<ItypeId>,
}

/// Compute the effective deny-set from declarations and the known ids.
pub fn resolve_deny_set<'a>(
    decls: &[ListDecl],
    known: impl IntoIterator<Item = &'a ItypeId>,
) -> HashSet<ItypeId> {
    let mut allow: HashSet<&ItypeId> = HashSet::new();
    let mut deny: HashSet<&ItypeId> = HashSet::new();
    for decl in decls {
        if decl.whitelist {
            allow.extend(decl.items.iter());
        } else {
            deny.extend(decl.items.iter());
        }
    }

    if !allow.is_empty() {
        return known
            .into_iter()
            .filter(|id| !allow.contains(id))
            .cloned()
            .collect();
    }
    deny.into_iter().cloned().collect()
}

/// Counts produced by [`Blacklist::apply`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BlacklistReport {
    pub denied: usize,
    pub group_entries_removed: usize,
    pub dependents: DependentPrune,
}

#[derive(Debug, Clone, Default)]
pub struct Blacklist {
    decls: Vec<ListDecl>,
    deny: HashSet<ItypeId>,
}

impl Blacklist {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_blacklist(&mut self, items: impl IntoIterator<Item = ItypeId>) {
        self.decls.push(ListDecl {
            whitelist: false,
            items: items.into_iter().collect(),
        });
    }

    pub fn add_whitelist(&mut self, items: impl IntoIterator<Item = ItypeId>) {
        self.decls.push(ListDecl {
            whitelist: true,
            items: items.into_iter().collect(),
        });
    }

    pub fn declarations(&self) -> &[ListDecl] {
        &self.decls
    }

    /// Resolve the deny-set against every known id.
    pub fn resolve<'a>(&mut self, known: impl IntoIterator<Item = &'a ItypeId>) -> &HashSet<ItypeId> {
        self.deny = resolve_deny_set(&self.decls, known);
        &self.deny
    }

    pub fn is_blacklisted(&self, id: &ItypeId) -> bool {
        self.deny.contains(id)
    }

    pub fn deny_set(&self) -> &HashSet<ItypeId> {
        &self.deny
    }

    /// Prune denied ids from spawn groups and dependent registries.
    pub fn apply(
        &self,
        groups: &mut BTreeMap<GroupId, ItemGroup>,
        dependents: &mut Dependents,
    ) -> BlacklistReport {
        if self.deny.is_empty() {
            return BlacklistReport::default();
        }
        let group_entries_removed = groups
            .values_mut()
            .map(|g| g.remove_items(&self.deny))
            .sum();
        let report = BlacklistReport {
            denied: self.deny.len(),
            group_entries_removed,
            dependents: dependents.remove_items(&self.deny),
        };
        log::info!(
            "blacklist denies {} ids: {} group entries, {} recipes removed",
            report.denied,
            report.group_entries_removed,
            report.dependents.recipes_deleted
        );
        report
    }

    pub fn clear(&mut self) {
        self.decls.clear();
        self.deny.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dependents::Recipe;
    use crate::item_group::{GroupEntry, GroupKind};

    fn ids(names: &[&str]) -> Vec<ItypeId> {
        names.iter().map(|s| ItypeId::new(*s)).collect()
    }

    #[test]
    fn blacklist_minus_whitelist_is_empty_when_whitelist_present() {
        let known = ids(&["a", "b", "c", "d"]);
        let mut bl = Blacklist::new();
        bl.add_blacklist(ids(&["a", "b"]));
        bl.add_whitelist(ids(&["b", "c"]));
        let deny = bl.resolve(&known);
        // Whitelisting is exclusive: everything but b and c is denied.
        let mut denied: Vec<&str> = deny.iter().map(|i| i.as_str()).collect();
        denied.sort();
        assert_eq!(denied, vec!["a", "d"]);
    }

    #[test]
    fn plain_blacklist() {
        let known = ids(&["a", "b", "c"]);
        let mut bl = Blacklist::new();
        bl.add_blacklist(ids(&["a"]));
        bl.add_blacklist(ids(&["c", "unknown"]));
        bl.resolve(&known);
        assert!(bl.is_blacklisted(&ItypeId::new("a")));
        assert!(bl.is_blacklisted(&ItypeId::new("c")));
        assert!(!bl.is_blacklisted(&ItypeId::new("b")));
    }

    #[test]
    fn empty_declarations_deny_nothing() {
        let known = ids(&["a"]);
        let mut bl = Blacklist::new();
        assert!(bl.resolve(&known).is_empty());
    }

    #[test]
    fn apply_prunes_groups_and_recipes() {
        let known = ids(&["gun", "knife"]);
        let mut bl = Blacklist::new();
        bl.add_blacklist(ids(&["gun"]));
        bl.resolve(&known);

        let mut groups = BTreeMap::new();
        let g = ItemGroup::new("weapons", GroupKind::Distribution)
            .with_entry(GroupEntry::item("gun", 10))
            .with_entry(GroupEntry::item("knife", 10));
        groups.insert(g.id.clone(), g);
        let mut deps = Dependents::default();
        deps.add_recipe(Recipe::new("make_gun", "gun"));

        let report = bl.apply(&mut groups, &mut deps);
        assert_eq!(report.denied, 1);
        assert_eq!(report.group_entries_removed, 1);
        assert_eq!(report.dependents.recipes_deleted, 1);
        assert!(deps.recipes.is_empty());
    }
}
