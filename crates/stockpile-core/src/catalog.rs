//! The catalog context object.
//!
//! [`Catalog`] owns every registry the item pipeline touches. Content is
//! inserted while the catalog is open; [`Catalog::finalize`] then runs the
//! batch pipeline exactly once:
//!
//! 1. **Blacklist** -- resolve the deny-set and prune groups and dependents.
//! 2. **Migrate** -- resolve migrations, rewrite references, compute ammo
//!    and magazine redirects.
//! 3. **Finalize** -- pre-pass, repair cache, post-pass.
//! 4. **Link** -- record each recipe on the archetype it produces.
//! 5. **Freeze** -- the static tables become read-only.
//! 6. **Check** -- consistency report over the frozen catalog.
//!
//! After freeze the catalog is shared by reference. The only mutation left
//! is the runtime table behind [`Catalog::find`], which synthesizes a stub
//! for ids with no authored definition.

use crate::archetype::{Archetype, ItemName};
use crate::blacklist::{Blacklist, BlacklistReport};
use crate::dependents::Dependents;
use crate::diagnostics::Diagnostics;
use crate::finalize::{FinalizeContext, RepairCache, finalize_all, finalize_post, finalize_pre};
use crate::flag;
use crate::id::{GroupId, ItypeId};
use crate::instance::ItemInstance;
use crate::item_group::{EntryTarget, GroupEntry, GroupKind, ItemGroup};
use crate::migration::{MigrationSummary, MigrationTable};
use crate::options::CatalogOptions;
use crate::rng::SpawnRng;
use crate::store::{ArchetypeRef, DefinitionStore, StoreError};
use crate::units::Volume;
use crate::use_action::UseActionRegistry;
use crate::validation::ConsistencyChecker;
use crate::vocab::Vocabulary;
use std::collections::BTreeMap;

/// Nested groups deeper than this are cut off.
pub const MAX_GROUP_DEPTH: usize = 16;

/// Everything [`Catalog::finalize`] produced besides the frozen catalog.
#[derive(Debug, Clone, Default)]
pub struct BuildReport {
    pub diagnostics: Diagnostics,
    pub blacklist: BlacklistReport,
    pub migrations: MigrationSummary,
    /// Group, requirement and vehicle references rewritten by migration.
    pub references_rewritten: usize,
    pub recipes_linked: usize,
    pub archetypes: usize,
}

#[derive(Debug)]
pub struct Catalog {
    pub options: CatalogOptions,
    pub vocab: Vocabulary,
    pub actions: UseActionRegistry,
    pub groups: BTreeMap<GroupId, ItemGroup>,
    pub dependents: Dependents,
    pub migrations: MigrationTable,
    pub blacklist: Blacklist,
    store: DefinitionStore,
    repair_cache: RepairCache,
}

impl Default for Catalog {
    fn default() -> Self {
        Self::new(CatalogOptions::default(), UseActionRegistry::builtin())
    }
}

impl Catalog {
    pub fn new(options: CatalogOptions, actions: UseActionRegistry) -> Self {
        Self {
            options,
            vocab: Vocabulary::new(),
            actions,
            groups: BTreeMap::new(),
            dependents: Dependents::default(),
            migrations: MigrationTable::new(),
            blacklist: Blacklist::new(),
            store: DefinitionStore::new(),
            repair_cache: RepairCache::default(),
        }
    }

    // -----------------------------------------------------------------------
    // Building
    // -----------------------------------------------------------------------

    pub fn store(&self) -> &DefinitionStore {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut DefinitionStore {
        &mut self.store
    }

    /// Insert or replace an authored archetype.
    pub fn insert(&mut self, archetype: Archetype) -> Result<Option<Archetype>, StoreError> {
        self.store.insert(archetype)
    }

    pub fn add_group(&mut self, group: ItemGroup) {
        self.groups.insert(group.id.clone(), group);
    }

    pub fn repair_cache(&self) -> &RepairCache {
        &self.repair_cache
    }

    pub fn is_frozen(&self) -> bool {
        self.store.is_frozen()
    }

    fn finalize_context(&self) -> FinalizeContext<'_> {
        FinalizeContext {
            vocab: &self.vocab,
            options: &self.options,
            migrations: &self.migrations,
            actions: &self.actions,
        }
    }

    /// Run the batch pipeline and freeze the catalog.
    ///
    /// Only fails if the catalog was already finalized; every content
    /// problem is reported in the returned diagnostics instead.
    pub fn finalize(&mut self) -> Result<BuildReport, StoreError> {
        if self.store.is_frozen() {
            return Err(StoreError::AlreadyFrozen);
        }
        let mut diagnostics = Diagnostics::new();

        let migrations = self
            .migrations
            .resolve(&self.store, &self.vocab, &mut diagnostics);
        let references_rewritten = self
            .migrations
            .apply_to_dependents(&mut self.groups, &mut self.dependents);

        // Pruning sees the rewritten references.
        self.blacklist.resolve(self.store.ids());
        let blacklist = self.blacklist.apply(&mut self.groups, &mut self.dependents);

        let ctx = FinalizeContext {
            vocab: &self.vocab,
            options: &self.options,
            migrations: &self.migrations,
            actions: &self.actions,
        };
        let templates = self.store.templates_mut()?;
        self.repair_cache = finalize_all(templates, &ctx, &mut diagnostics);

        let mut recipes_linked = 0;
        for recipe in self.dependents.recipes.values() {
            if let Some(a) = templates.get_mut(&recipe.result) {
                if !a.recipes.contains(&recipe.id) {
                    a.recipes.push(recipe.id.clone());
                    recipes_linked += 1;
                }
            }
        }

        self.store.freeze();
        let checked =
            ConsistencyChecker::new(&self.store, &self.vocab, &self.groups, &self.dependents)
                .run()?;
        diagnostics.extend(checked);

        let report = BuildReport {
            diagnostics,
            blacklist,
            migrations,
            references_rewritten,
            recipes_linked,
            archetypes: self.store.len(),
        };
        log::info!(
            "catalog frozen: {} archetypes, {} groups, {} recipes, {} diagnostics",
            report.archetypes,
            self.groups.len(),
            self.dependents.recipes.len(),
            report.diagnostics.len()
        );
        Ok(report)
    }

    /// Return to the empty, unfrozen state. Options and the use-action
    /// registry are kept.
    pub fn reset(&mut self) {
        self.vocab = Vocabulary::new();
        self.groups.clear();
        self.dependents = Dependents::default();
        self.migrations.clear();
        self.blacklist.clear();
        self.store.reset();
        self.repair_cache = RepairCache::default();
    }

    // -----------------------------------------------------------------------
    // Reads
    // -----------------------------------------------------------------------

    /// Whether an authored archetype exists. Runtime stubs do not count.
    pub fn has(&self, id: &ItypeId) -> bool {
        self.store.has(id)
    }

    pub fn lookup(&self, id: &ItypeId) -> Result<&Archetype, StoreError> {
        self.store.lookup(id)
    }

    /// Every authored archetype, sorted by id. Only valid after finalize.
    pub fn all(&self) -> Result<Vec<&Archetype>, StoreError> {
        self.store.all()
    }

    /// Resolve an id, never failing.
    ///
    /// Authored archetypes come first, then previously synthesized ones.
    /// An unknown id naming a construction blueprint yields a pseudo-item
    /// placeholder; any other unknown id yields a stub flagged
    /// `MISSING_DEFINITION`. Synthesized archetypes are finalized, stored
    /// in the runtime table and reused by later calls.
    pub fn find(&self, id: &ItypeId) -> ArchetypeRef<'_> {
        if let Some(found) = self.store.lookup_any(id) {
            return found;
        }
        let stub = self.synthesize(id);
        match self.store.insert_runtime(stub) {
            Ok((entry, inserted)) => {
                if inserted {
                    if entry.has_flag(flag::MISSING_DEFINITION) {
                        log::warn!("no definition for item '{id}'; using a placeholder");
                    } else {
                        log::warn!("item '{id}' resolved to a blueprint placeholder");
                    }
                }
                ArchetypeRef::Runtime(entry)
            }
            Err(err) => {
                log::error!("runtime insert of '{id}' failed: {err}");
                ArchetypeRef::Runtime(std::sync::Arc::new(self.synthesize(id)))
            }
        }
    }

    fn synthesize(&self, id: &ItypeId) -> Archetype {
        let mut a = Archetype::new(id.clone());
        a.volume = Volume(1);
        a.set_flag(flag::PSEUDO);
        if self.vocab.blueprints.contains(id.as_str()) {
            let name = format!("{id} (blueprint)");
            a.name = ItemName::new(&name, &name);
            a.description = "Placeholder for a construction blueprint.".to_string();
        } else {
            let name = format!("{id} (missing)");
            a.name = ItemName::new(&name, &name);
            a.description = "This item has no definition.".to_string();
            a.set_flag(flag::MISSING_DEFINITION);
        }
        let ctx = self.finalize_context();
        let mut diags = Diagnostics::new();
        finalize_pre(&mut a, &ctx, &mut diags);
        finalize_post(&mut a, &ctx, &self.repair_cache, &mut diags);
        a
    }

    // -----------------------------------------------------------------------
    // Migration and blacklist queries
    // -----------------------------------------------------------------------

    /// The live replacement for `id`, or `id` itself.
    pub fn migrate_id<'a>(&'a self, id: &'a ItypeId) -> &'a ItypeId {
        self.migrations.migrate_id(id).unwrap_or(id)
    }

    /// Migrate a live instance and its contents in place.
    pub fn migrate_instance(&self, item: &mut ItemInstance) -> usize {
        self.migrations.migrate_instance(item)
    }

    pub fn is_blacklisted(&self, id: &ItypeId) -> bool {
        self.blacklist.is_blacklisted(id)
    }

    // -----------------------------------------------------------------------
    // Spawn tables
    // -----------------------------------------------------------------------

    /// A generator seeded from the catalog options.
    pub fn spawn_rng(&self) -> SpawnRng {
        SpawnRng::new(self.options.seed)
    }

    /// Expand a group into concrete item instances.
    ///
    /// Unknown groups and nesting beyond [`MAX_GROUP_DEPTH`] are logged and
    /// contribute nothing.
    pub fn spawn_group(&self, id: &GroupId, rng: &mut SpawnRng) -> Vec<ItemInstance> {
        let mut out = Vec::new();
        self.expand_group(id, rng, 0, &mut out);
        out
    }

    fn expand_group(
        &self,
        id: &GroupId,
        rng: &mut SpawnRng,
        depth: usize,
        out: &mut Vec<ItemInstance>,
    ) {
        if depth >= MAX_GROUP_DEPTH {
            log::warn!("item group '{id}' nests deeper than {MAX_GROUP_DEPTH}; expansion cut");
            return;
        }
        let Some(group) = self.groups.get(id) else {
            log::warn!("unknown item group '{id}'");
            return;
        };
        match group.kind {
            GroupKind::Distribution => {
                let total = group.total_weight();
                if total <= 0 {
                    return;
                }
                let mut roll = rng.below(total as u64) as i64;
                for entry in &group.entries {
                    let weight = entry.probability.max(0) as i64;
                    if roll < weight {
                        self.expand_entry(group, entry, rng, depth, out);
                        break;
                    }
                    roll -= weight;
                }
            }
            GroupKind::Collection => {
                for entry in &group.entries {
                    if rng.percent(entry.probability) {
                        self.expand_entry(group, entry, rng, depth, out);
                    }
                }
            }
        }
    }

    fn expand_entry(
        &self,
        group: &ItemGroup,
        entry: &GroupEntry,
        rng: &mut SpawnRng,
        depth: usize,
        out: &mut Vec<ItemInstance>,
    ) {
        let count = rng.range_inclusive(entry.count.0, entry.count.1);
        for _ in 0..count.max(0) {
            match &entry.target {
                EntryTarget::Group(nested) => self.expand_group(nested, rng, depth + 1, out),
                EntryTarget::Item(id) => {
                    if let Some(item) = self.spawn_item(group, entry, id, rng) {
                        out.push(item);
                    }
                }
            }
        }
    }

    fn spawn_item(
        &self,
        group: &ItemGroup,
        entry: &GroupEntry,
        id: &ItypeId,
        rng: &mut SpawnRng,
    ) -> Option<ItemInstance> {
        let mut item = ItemInstance::new(id.clone());
        item.variant = entry.variant.clone();
        self.migrations.migrate_instance(&mut item);
        if self.is_blacklisted(&item.type_id) {
            return None;
        }

        let archetype = self.find(&item.type_id);
        item.charges = match entry.charges {
            Some((lo, hi)) => rng.range_inclusive(lo, hi),
            None => archetype.charges_default(),
        };
        if archetype.gun.is_some() || archetype.tool.is_some() {
            self.fill_ammo(&archetype, group, &mut item, rng);
        }
        Some(item)
    }

    /// Give a spawned gun or tool its default magazine and ammunition,
    /// each with the group's percent chance.
    fn fill_ammo(
        &self,
        archetype: &Archetype,
        group: &ItemGroup,
        item: &mut ItemInstance,
        rng: &mut SpawnRng,
    ) {
        let with_magazine = group.with_magazine > 0 && rng.percent(group.with_magazine);
        let with_ammo = group.with_ammo > 0 && rng.percent(group.with_ammo);
        if !with_magazine && !with_ammo {
            return;
        }
        let Some(ammo_type) = archetype.ammo_types().into_iter().next() else {
            return;
        };
        let rounds = self.vocab.default_ammo(&ammo_type).filter(|_| with_ammo);

        if archetype.uses_magazine() {
            if !with_magazine {
                return;
            }
            let Some(mag_id) = archetype.magazine_default.get(&ammo_type) else {
                return;
            };
            let mag = self.find(mag_id);
            let mut magazine = ItemInstance::new(mag_id.clone());
            if let Some(rounds) = rounds {
                let capacity = match mag.ammo_capacity(&ammo_type) {
                    0 => mag.magazine.as_ref().map_or(0, |m| m.capacity),
                    n => n,
                };
                if capacity > 0 {
                    magazine
                        .contents
                        .push(ItemInstance::new(rounds.clone()).with_charges(capacity));
                }
            }
            item.contents.push(magazine);
        } else if let Some(rounds) = rounds {
            let capacity = match archetype.ammo_capacity(&ammo_type) {
                0 => archetype.tool.as_ref().map_or(0, |t| t.max_charges),
                n => n,
            };
            if capacity > 0 {
                item.contents
                    .push(ItemInstance::new(rounds.clone()).with_charges(capacity));
            }
        }
    }
}

// ===========================================================================
// Tests
// ===========================================================================
