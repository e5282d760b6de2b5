//! Identifier migration.
//!
//! A migration record redirects an obsolete item id to its live replacement.
//! Records are collected while loading, then resolved once the catalog is
//! otherwise complete:
//!
//! 1. Each source id may have at most one unconditional record. Two or more
//!    is a configuration error; the id is reported and left unmigrated.
//! 2. Records whose target does not exist are reported and dropped.
//! 3. Surviving records propagate three ways: spawn-group and requirement
//!    references are rewritten, ammunition ids become ammo-type redirects,
//!    and magazine ids become magazine redirects. The last two must be
//!    computed before finalization.
//!
//! Variant-qualified records only apply to live instances carrying that
//! variant tag and never affect the bare-id mapping.

use crate::archetype::Archetype;
use crate::dependents::Dependents;
use crate::diagnostics::{DiagnosticKind, Diagnostics};
use crate::id::{AmmoTypeId, FlagId, GroupId, ItypeId};
use crate::instance::ItemInstance;
use crate::item_group::ItemGroup;
use crate::store::DefinitionStore;
use crate::vocab::Vocabulary;
use std::collections::{BTreeMap, BTreeSet};

// ===========================================================================
// Records
// ===========================================================================

/// An item placed inside a migrated instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationContent {
    pub id: ItypeId,
    pub count: i32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationRecord {
    pub from: ItypeId,
    pub to: ItypeId,
    /// Only instances carrying this variant tag are migrated.
    pub from_variant: Option<String>,
    /// Variant tag given to the migrated instance.
    pub variant: Option<String>,
    pub flags: BTreeSet<FlagId>,
    pub charges: Option<i32>,
    pub contents: Vec<MigrationContent>,
    pub reset_item_vars: bool,
}

impl MigrationRecord {
    pub fn new(from: impl Into<ItypeId>, to: impl Into<ItypeId>) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
            from_variant: None,
            variant: None,
            flags: BTreeSet::new(),
            charges: None,
            contents: Vec::new(),
            reset_item_vars: false,
        }
    }

    pub fn is_unconditional(&self) -> bool {
        self.from_variant.is_none()
    }

    /// Rewrite `inst` in place according to this record.
    fn apply(&self, inst: &mut ItemInstance) {
        let changed_type = inst.type_id != self.to;
        inst.type_id = self.to.clone();
        if self.variant.is_some() {
            inst.variant = self.variant.clone();
        } else if changed_type {
            inst.variant = None;
        }
        inst.flags.extend(self.flags.iter().cloned());
        if let Some(charges) = self.charges {
            inst.charges = charges;
        }
        if self.reset_item_vars {
            inst.vars.clear();
        }
        for content in &self.contents {
            for _ in 0..content.count.max(0) {
                inst.contents.push(ItemInstance::new(content.id.clone()));
            }
        }
    }
}

// ===========================================================================
// Table
// ===========================================================================

/// Counts produced by [`MigrationTable::resolve`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MigrationSummary {
    pub resolved: usize,
    pub variant_resolved: usize,
    pub rejected: usize,
    pub ammo_redirects: usize,
    pub magazine_redirects: usize,
}

/// Every migration record plus the mappings resolved from them.
#[derive(Debug, Clone, Default)]
pub struct MigrationTable {
    records: Vec<MigrationRecord>,
    resolved: BTreeMap<ItypeId, MigrationRecord>,
    variants: BTreeMap<(ItypeId, String), MigrationRecord>,
    ammo_redirects: BTreeMap<AmmoTypeId, AmmoTypeId>,
    magazine_redirects: BTreeMap<ItypeId, ItypeId>,
}

impl MigrationTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, record: MigrationRecord) {
        self.records.push(record);
    }

    pub fn records(&self) -> &[MigrationRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }

    /// Resolve raw records into the bare-id and variant mappings, then
    /// compute the ammo-type and magazine redirects.
    pub fn resolve(
        &mut self,
        store: &DefinitionStore,
        vocab: &Vocabulary,
        diags: &mut Diagnostics,
    ) -> MigrationSummary {
        self.resolved.clear();
        self.variants.clear();
        self.ammo_redirects.clear();
        self.magazine_redirects.clear();

        let mut summary = MigrationSummary::default();
        let mut unconditional: BTreeMap<&ItypeId, Vec<&MigrationRecord>> = BTreeMap::new();
        let mut by_variant: BTreeMap<(&ItypeId, &String), Vec<&MigrationRecord>> = BTreeMap::new();
        for record in &self.records {
            match &record.from_variant {
                None => unconditional.entry(&record.from).or_default().push(record),
                Some(v) => by_variant.entry((&record.from, v)).or_default().push(record),
            }
        }

        for (from, candidates) in unconditional {
            if candidates.len() > 1 {
                let targets: Vec<&str> = candidates.iter().map(|r| r.to.as_str()).collect();
                diags.push(
                    DiagnosticKind::Migration,
                    from.as_str(),
                    format!(
                        "{} unconditional migrations (to {}); migration ignored",
                        candidates.len(),
                        targets.join(", ")
                    ),
                );
                summary.rejected += candidates.len();
                continue;
            }
            let record = candidates[0];
            if !store.has(&record.to) {
                diags.push(
                    DiagnosticKind::Migration,
                    from.as_str(),
                    format!("migration target '{}' does not exist", record.to),
                );
                summary.rejected += 1;
                continue;
            }
            self.resolved.insert(from.clone(), record.clone());
            summary.resolved += 1;
        }

        for ((from, variant), candidates) in by_variant {
            if candidates.len() > 1 {
                diags.push(
                    DiagnosticKind::Migration,
                    from.as_str(),
                    format!(
                        "{} migrations for variant '{variant}'; migration ignored",
                        candidates.len()
                    ),
                );
                summary.rejected += candidates.len();
                continue;
            }
            let record = candidates[0];
            if !store.has(&record.to) {
                diags.push(
                    DiagnosticKind::Migration,
                    from.as_str(),
                    format!(
                        "variant '{variant}' migration target '{}' does not exist",
                        record.to
                    ),
                );
                summary.rejected += 1;
                continue;
            }
            self.variants
                .insert((from.clone(), variant.clone()), record.clone());
            summary.variant_resolved += 1;
        }

        self.compute_redirects(store, vocab);
        summary.ammo_redirects = self.ammo_redirects.len();
        summary.magazine_redirects = self.magazine_redirects.len();
        log::debug!(
            "resolved {} migrations ({} variant), {} ammo redirects, {} magazine redirects",
            summary.resolved,
            summary.variant_resolved,
            summary.ammo_redirects,
            summary.magazine_redirects
        );
        summary
    }

    fn compute_redirects(&mut self, store: &DefinitionStore, vocab: &Vocabulary) {
        for (from, record) in &self.resolved {
            let source = store.lookup(from).ok();
            let names_ammo_type = vocab.ammo_types.contains_key(from.as_str());
            if names_ammo_type || source.is_some_and(|a| a.ammo.is_some()) {
                self.ammo_redirects.insert(
                    AmmoTypeId::new(from.as_str()),
                    AmmoTypeId::new(record.to.as_str()),
                );
            }
            if source.is_some_and(|a| a.magazine.is_some()) {
                self.magazine_redirects
                    .insert(from.clone(), record.to.clone());
            }
        }
    }

    // -----------------------------------------------------------------------
    // Lookups
    // -----------------------------------------------------------------------

    /// The live replacement for `id`, if it has been migrated.
    pub fn migrate_id(&self, id: &ItypeId) -> Option<&ItypeId> {
        self.resolved.get(id).map(|r| &r.to)
    }

    /// The unconditional record for `id`.
    pub fn record_for(&self, id: &ItypeId) -> Option<&MigrationRecord> {
        self.resolved.get(id)
    }

    pub fn variant_record(&self, id: &ItypeId, variant: &str) -> Option<&MigrationRecord> {
        self.variants.get(&(id.clone(), variant.to_string()))
    }

    pub fn migrate_ammo_type<'a>(&'a self, ammo: &'a AmmoTypeId) -> &'a AmmoTypeId {
        self.ammo_redirects.get(ammo).unwrap_or(ammo)
    }

    pub fn migrate_magazine<'a>(&'a self, mag: &'a ItypeId) -> &'a ItypeId {
        self.magazine_redirects.get(mag).unwrap_or(mag)
    }

    pub fn ammo_redirects(&self) -> &BTreeMap<AmmoTypeId, AmmoTypeId> {
        &self.ammo_redirects
    }

    pub fn magazine_redirects(&self) -> &BTreeMap<ItypeId, ItypeId> {
        &self.magazine_redirects
    }

    pub fn resolved(&self) -> impl Iterator<Item = (&ItypeId, &ItypeId)> {
        self.resolved.iter().map(|(from, r)| (from, &r.to))
    }

    // -----------------------------------------------------------------------
    // Propagation
    // -----------------------------------------------------------------------

    /// Rewrite spawn-group, requirement and vehicle references to migrated
    /// ids. Returns the number of references rewritten.
    pub fn apply_to_dependents(
        &self,
        groups: &mut BTreeMap<GroupId, ItemGroup>,
        dependents: &mut Dependents,
    ) -> usize {
        let mut rewritten = 0;
        for (from, record) in &self.resolved {
            for group in groups.values_mut() {
                rewritten += group.replace_item(from, &record.to);
            }
            rewritten += dependents.replace_item(from, &record.to);
        }
        rewritten
    }

    /// Apply ammo-type and magazine redirects to one archetype's own ammo
    /// and magazine fields. Returns whether anything changed.
    pub fn apply_to_archetype(&self, a: &mut Archetype) -> bool {
        if self.ammo_redirects.is_empty() && self.magazine_redirects.is_empty() {
            return false;
        }
        let mut changed = false;

        if !self.ammo_redirects.is_empty() {
            if let Some(gun) = &mut a.gun {
                changed |= self.redirect_ammo_set(&mut gun.ammo);
            }
            if let Some(tool) = &mut a.tool {
                changed |= self.redirect_ammo_set(&mut tool.ammo);
            }
            if let Some(mag) = &mut a.magazine {
                changed |= self.redirect_ammo_set(&mut mag.ammo);
            }
            if let Some(m) = &mut a.mod_slot {
                changed |= self.redirect_ammo_set(&mut m.acceptable_ammo);
                changed |= self.redirect_ammo_set(&mut m.ammo_modifier);
                changed |= rekey_union(&mut m.magazine_adaptor, &self.ammo_redirects);
            }
            if let Some(gm) = &mut a.gunmod {
                changed |= self.redirect_ammo_set(&mut gm.ammo_modifier);
            }
            if let Some(ammo) = &mut a.ammo {
                if let Some(to) = self.ammo_redirects.get(&ammo.ammo_type) {
                    ammo.ammo_type = to.clone();
                    changed = true;
                }
            }
            for pocket in &mut a.pockets {
                changed |= rekey_max(&mut pocket.ammo_restriction, &self.ammo_redirects);
            }
            changed |= rekey_union(&mut a.magazines, &self.ammo_redirects);
            changed |= rekey_first(&mut a.magazine_default, &self.ammo_redirects);
        }

        if !self.magazine_redirects.is_empty() {
            for mags in a.magazines.values_mut() {
                changed |= redirect_set(mags, &self.magazine_redirects);
            }
            for mag in a.magazine_default.values_mut() {
                if let Some(to) = self.magazine_redirects.get(mag) {
                    *mag = to.clone();
                    changed = true;
                }
            }
            for pocket in &mut a.pockets {
                changed |= redirect_set(&mut pocket.item_restriction, &self.magazine_redirects);
                if let Some(mag) = &mut pocket.default_magazine {
                    if let Some(to) = self.magazine_redirects.get(mag) {
                        *mag = to.clone();
                        changed = true;
                    }
                }
            }
        }
        changed
    }

    fn redirect_ammo_set(&self, set: &mut BTreeSet<AmmoTypeId>) -> bool {
        redirect_set(set, &self.ammo_redirects)
    }

    /// Migrate a live instance and everything inside it. Returns the number
    /// of instances rewritten.
    ///
    /// A variant-qualified record matching the instance's variant tag takes
    /// precedence over the unconditional record for its type.
    pub fn migrate_instance(&self, inst: &mut ItemInstance) -> usize {
        let mut migrated = 0;
        let record = inst
            .variant
            .as_deref()
            .and_then(|v| self.variant_record(&inst.type_id, v))
            .or_else(|| self.resolved.get(&inst.type_id));
        if let Some(record) = record {
            record.apply(inst);
            migrated += 1;
        }
        for content in &mut inst.contents {
            migrated += self.migrate_instance(content);
        }
        migrated
    }
}

// ===========================================================================
// Re-keying helpers
// ===========================================================================

fn redirect_set<K: Ord + Clone>(set: &mut BTreeSet<K>, redirects: &BTreeMap<K, K>) -> bool {
    if !set.iter().any(|k| redirects.contains_key(k)) {
        return false;
    }
    *set = set
        .iter()
        .map(|k| redirects.get(k).unwrap_or(k).clone())
        .collect();
    true
}

/// Re-key a map of sets; colliding sets are merged.
fn rekey_union<K: Ord + Clone, V: Ord + Clone>(
    map: &mut BTreeMap<K, BTreeSet<V>>,
    redirects: &BTreeMap<K, K>,
) -> bool {
    if !map.keys().any(|k| redirects.contains_key(k)) {
        return false;
    }
    let old = std::mem::take(map);
    for (k, v) in old {
        let key = redirects.get(&k).cloned().unwrap_or(k);
        map.entry(key).or_default().extend(v);
    }
    true
}

/// Re-key a capacity map; colliding capacities keep the larger.
fn rekey_max<K: Ord + Clone>(map: &mut BTreeMap<K, i32>, redirects: &BTreeMap<K, K>) -> bool {
    if !map.keys().any(|k| redirects.contains_key(k)) {
        return false;
    }
    let old = std::mem::take(map);
    for (k, v) in old {
        let key = redirects.get(&k).cloned().unwrap_or(k);
        let slot = map.entry(key).or_insert(v);
        *slot = (*slot).max(v);
    }
    true
}

/// Re-key a map; an entry already under the new key wins.
fn rekey_first<K: Ord + Clone, V>(map: &mut BTreeMap<K, V>, redirects: &BTreeMap<K, K>) -> bool {
    if !map.keys().any(|k| redirects.contains_key(k)) {
        return false;
    }
    let old = std::mem::take(map);
    let (moved, kept): (Vec<_>, Vec<_>) = old
        .into_iter()
        .partition(|(k, _)| redirects.contains_key(k));
    map.extend(kept);
    for (k, v) in moved {
        if let Some(key) = redirects.get(&k) {
            map.entry(key.clone()).or_insert(v);
        }
    }
    true
}

// ===========================================================================
// Tests
// ===========================================================================
