//! Consistency checking over the frozen catalog.
//!
//! Reports, never fixes: every problem becomes a
//! [`DiagnosticKind::Consistency`] diagnostic and the catalog stays usable.
//! Per-archetype checks are independent and run on the rayon pool when the
//! `parallel` feature is enabled.

use crate::archetype::Archetype;
use crate::dependents::Dependents;
use crate::diagnostics::{Diagnostic, DiagnosticKind, Diagnostics};
use crate::id::{GroupId, ItypeId};
use crate::item_group::{GroupKind, ItemGroup};
use crate::store::{DefinitionStore, StoreError};
use crate::vocab::Vocabulary;
use std::collections::BTreeMap;

/// Upper bound on armor coverage, in percent.
const MAX_COVERAGE: i32 = 100;

// ---------------------------------------------------------------------------
// Report helper
// ---------------------------------------------------------------------------

struct Report<'s> {
    subject: &'s str,
    out: Vec<Diagnostic>,
}

impl<'s> Report<'s> {
    fn new(subject: &'s str) -> Self {
        Self {
            subject,
            out: Vec::new(),
        }
    }

    fn warn(&mut self, message: String) {
        self.out.push(Diagnostic {
            kind: DiagnosticKind::Consistency,
            subject: self.subject.to_string(),
            message,
        });
    }
}

// ---------------------------------------------------------------------------
// Checker
// ---------------------------------------------------------------------------

/// Read-only validation of the store and every registry that references it.
pub struct ConsistencyChecker<'a> {
    store: &'a DefinitionStore,
    vocab: &'a Vocabulary,
    groups: &'a BTreeMap<GroupId, ItemGroup>,
    dependents: &'a Dependents,
}

impl<'a> ConsistencyChecker<'a> {
    pub fn new(
        store: &'a DefinitionStore,
        vocab: &'a Vocabulary,
        groups: &'a BTreeMap<GroupId, ItemGroup>,
        dependents: &'a Dependents,
    ) -> Self {
        Self {
            store,
            vocab,
            groups,
            dependents,
        }
    }

    /// Check everything. Fails only if the store has not been frozen.
    pub fn run(&self) -> Result<Diagnostics, StoreError> {
        let all = self.store.all()?;

        #[cfg(feature = "parallel")]
        let per_item: Vec<Vec<Diagnostic>> = {
            use rayon::prelude::*;
            all.par_iter().map(|a| self.check_archetype(a)).collect()
        };
        #[cfg(not(feature = "parallel"))]
        let per_item: Vec<Vec<Diagnostic>> =
            all.iter().map(|a| self.check_archetype(a)).collect();

        let mut diags = Diagnostics::new();
        for diag in per_item.into_iter().flatten() {
            diags.record(diag);
        }
        for diag in self
            .check_materials()
            .into_iter()
            .chain(self.check_groups())
            .chain(self.check_dependents())
        {
            diags.record(diag);
        }
        log::info!(
            "consistency check: {} archetypes, {} problems",
            all.len(),
            diags.len()
        );
        Ok(diags)
    }

    fn known_item(&self, id: &ItypeId) -> bool {
        self.store.has(id)
    }

    /// Every check scoped to a single archetype.
    pub fn check_archetype(&self, a: &Archetype) -> Vec<Diagnostic> {
        let mut r = Report::new(a.id.as_str());
        let v = self.vocab;

        if a.damage_min > a.damage_max {
            r.warn(format!(
                "damage range {}..{} is inverted",
                a.damage_min, a.damage_max
            ));
        }
        if !v.categories.contains(&a.category) {
            r.warn(format!("unknown category '{}'", a.category));
        }
        for (material, portion) in &a.materials {
            if !v.materials.contains_key(material) {
                r.warn(format!("unknown material '{material}'"));
            }
            if *portion <= 0 {
                r.warn(format!("material '{material}' has non-positive portion {portion}"));
            }
        }
        for quality in a.qualities.keys().chain(a.charged_qualities.keys()) {
            if !v.qualities.contains_key(quality) {
                r.warn(format!("unknown quality '{quality}'"));
            }
        }
        for technique in &a.techniques {
            if !v.techniques.contains(technique) {
                r.warn(format!("unknown technique '{technique}'"));
            }
        }
        for fault in &a.faults {
            if !v.faults.contains(fault) {
                r.warn(format!("unknown fault '{fault}'"));
            }
        }
        for ammo in a.ammo_types() {
            if !v.ammo_types.contains_key(&ammo) {
                r.warn(format!("unknown ammo type '{ammo}'"));
            }
        }

        let mut item_refs: Vec<(&str, &ItypeId)> = Vec::new();
        if let Some(id) = &a.default_container {
            item_refs.push(("container", id));
        }
        for f in a.use_methods.values() {
            for id in f.actor.referenced_items() {
                item_refs.push((f.type_name(), id));
            }
        }
        if let Some(ammo) = &a.ammo {
            if ammo.ammo_type.is_empty() {
                r.warn("ammo has no ammo type".to_string());
            }
            item_refs.extend(ammo.casing.iter().map(|id| ("casing", id)));
            item_refs.extend(ammo.drop.iter().map(|id| ("drop", id)));
        }
        if let Some(gun) = &a.gun {
            if !gun.skill_used.is_empty() && !v.skills.contains(&gun.skill_used) {
                r.warn(format!("unknown skill '{}'", gun.skill_used));
            }
            item_refs.extend(gun.default_mods.iter().map(|id| ("default mod", id)));
        }
        if let Some(tool) = &a.tool {
            item_refs.extend(tool.revert_to.iter().map(|id| ("revert_to", id)));
        }
        if let Some(book) = &a.book {
            if let Some(skill) = &book.skill {
                if !v.skills.contains(skill) {
                    r.warn(format!("unknown skill '{skill}'"));
                }
            }
            if let Some(style) = &book.martial_art {
                if !v.martial_arts.contains(style) {
                    r.warn(format!("unknown martial art '{style}'"));
                }
            }
        }
        if let Some(com) = &a.comestible {
            for vitamin in com.vitamins.keys() {
                if !v.vitamins.contains_key(vitamin) {
                    r.warn(format!("unknown vitamin '{vitamin}'"));
                }
            }
            item_refs.extend(com.tool.iter().map(|id| ("comestible tool", id)));
        }
        if let Some(armor) = &a.armor {
            for portion in &armor.data {
                if portion.coverage > MAX_COVERAGE {
                    r.warn(format!("coverage {} exceeds {MAX_COVERAGE}", portion.coverage));
                }
                for pm in &portion.materials {
                    if !v.materials.contains_key(&pm.material) {
                        r.warn(format!("unknown armor material '{}'", pm.material));
                    }
                }
            }
        }
        for (what, id) in item_refs {
            if !self.known_item(id) {
                r.warn(format!("{what} references unknown item '{id}'"));
            }
        }

        self.check_magazines(a, &mut r);
        r.out
    }

    fn check_magazines(&self, a: &Archetype, r: &mut Report<'_>) {
        if let Some(mag) = &a.magazine {
            let pocket_capacity = a.total_ammo_capacity();
            if mag.capacity > 0 && pocket_capacity > 0 && mag.capacity != pocket_capacity {
                r.warn(format!(
                    "magazine capacity {} disagrees with pocket capacity {pocket_capacity}",
                    mag.capacity
                ));
            }
            if mag.capacity <= 0 && pocket_capacity <= 0 {
                r.warn("magazine holds no ammunition".to_string());
            }
            if let Some(ammo) = &mag.default_ammo {
                if !self.known_item(ammo) {
                    r.warn(format!("default ammo '{ammo}' is unknown"));
                }
            }
        }

        for (ammo, mags) in &a.magazines {
            for mag_id in mags {
                match self.store.lookup(mag_id) {
                    Err(_) => r.warn(format!("unknown magazine '{mag_id}'")),
                    Ok(mag) if mag.magazine.is_none() => {
                        r.warn(format!("'{mag_id}' is not a magazine"))
                    }
                    Ok(mag) if !mag.ammo_types().contains(ammo) => {
                        r.warn(format!("magazine '{mag_id}' cannot hold ammo type '{ammo}'"))
                    }
                    Ok(_) => {}
                }
            }
        }
        for (ammo, default) in &a.magazine_default {
            let listed = a.magazines.get(ammo).is_some_and(|m| m.contains(default));
            if !listed {
                r.warn(format!(
                    "default magazine '{default}' is not compatible for ammo type '{ammo}'"
                ));
            }
        }
    }

    fn check_materials(&self) -> Vec<Diagnostic> {
        let mut out = Vec::new();
        let mut ids: Vec<_> = self.vocab.materials.keys().collect();
        ids.sort();
        for id in ids {
            let mut r = Report::new(id.as_str());
            if let Some(material) = self.vocab.materials.get(id) {
                for vitamin in material.vitamins.keys() {
                    if !self.vocab.vitamins.contains_key(vitamin) {
                        r.warn(format!("material lists unknown vitamin '{vitamin}'"));
                    }
                }
                if let Some(item) = &material.repaired_with {
                    if !self.known_item(item) {
                        r.warn(format!("repaired with unknown item '{item}'"));
                    }
                }
            }
            out.extend(r.out);
        }
        out
    }

    fn check_groups(&self) -> Vec<Diagnostic> {
        let mut out = Vec::new();
        for group in self.groups.values() {
            let mut r = Report::new(group.id.as_str());
            for id in group.item_refs() {
                if !self.known_item(id) {
                    r.warn(format!("spawns unknown item '{id}'"));
                }
            }
            for id in group.group_refs() {
                if !self.groups.contains_key(id) {
                    r.warn(format!("references unknown group '{id}'"));
                }
            }
            if group.kind == GroupKind::Distribution
                && !group.entries.is_empty()
                && group.total_weight() == 0
            {
                r.warn("distribution has no positive weights".to_string());
            }
            out.extend(r.out);
        }
        out
    }

    fn check_dependents(&self) -> Vec<Diagnostic> {
        let mut out = Vec::new();
        for recipe in self.dependents.recipes.values() {
            let mut r = Report::new(recipe.id.as_str());
            if !self.known_item(&recipe.result) {
                r.warn(format!("result '{}' is unknown", recipe.result));
            }
            for id in recipe.requirements.item_refs() {
                if !self.known_item(id) {
                    r.warn(format!("requires unknown item '{id}'"));
                }
            }
            for q in &recipe.requirements.qualities {
                if !self.vocab.qualities.contains_key(&q.0) {
                    r.warn(format!("requires unknown quality '{}'", q.0));
                }
            }
            out.extend(r.out);
        }
        for vehicle in self.dependents.vehicles.values() {
            let mut r = Report::new(vehicle.id.as_str());
            for spawn in &vehicle.item_spawns {
                for id in &spawn.items {
                    if !self.known_item(id) {
                        r.warn(format!("spawns unknown item '{id}'"));
                    }
                }
                for id in &spawn.groups {
                    if !self.groups.contains_key(id) {
                        r.warn(format!("spawns unknown group '{id}'"));
                    }
                }
            }
            out.extend(r.out);
        }
        out
    }
}

// ===========================================================================
// Tests
// ===========================================================================
