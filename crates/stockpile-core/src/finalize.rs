//! Finalization: derive computed fields from raw ones.
//!
//! Two passes, each run over the *entire* template table before the next
//! begins, so post-pass steps can rely on every archetype's pre-pass result:
//!
//! 1. **Pre** -- defaults, categories, stack sizes, light emission, ammo
//!    derivations, migration redirects, fire modes, layers, diet and NPC
//!    flags, vitamins.
//! 2. **Post** -- flag validation, repair-tool linkage, armor encumbrance
//!    and thickness, contamination checks.
//!
//! Nothing here fails. Malformed data produces a [`Diagnostic`] and the
//! derivation falls back to a safe default, so one bad archetype never
//! blocks the rest of the batch.
//!
//! [`Diagnostic`]: crate::diagnostics::Diagnostic

use crate::archetype::Archetype;
use crate::diagnostics::{DiagnosticKind, Diagnostics};
use crate::flag;
use crate::id::{CategoryId, FlagId, ItypeId, MartialArtId, MaterialId, VitaminId};
use crate::migration::MigrationTable;
use crate::options::{CatalogOptions, MAX_STACK_SIZE};
use crate::pocket::PocketType;
use crate::slots::{
    AmmoSlot, ComestibleType, DamageInstance, GUN_MODE_DEFAULT, GUN_MODE_MELEE, GunMode, Layer,
};
use crate::units::{Length, Volume};
use crate::use_action::{RepairItemActor, UseActionRegistry};
use crate::vocab::{VitaminKind, Vocabulary, category};
use std::collections::{BTreeMap, BTreeSet, HashMap};

const GUNMOD_ATTACH: &str = "GUNMOD_ATTACH";
const TOOLMOD_ATTACH: &str = "TOOLMOD_ATTACH";
const DETACH_GUNMODS: &str = "detach_gunmods";
const GUN_REPAIR: &str = "GUN_REPAIR";
const REPAIR_ITEM: &str = "repair_item";
const EXPLOSION: &str = "explosion";

/// Materials that make ammunition burn rather than cook off.
const NON_COOKOFF_MATERIALS: &[&str] = &["hydrocarbons", "oil"];

/// Ammo effects that make a cook-off hazardous beyond a plain pop.
const SPECIAL_COOKOFF_EFFECTS: &[&str] = &[
    "NAPALM",
    "NAPALM_BIG",
    "EXPLOSIVE_SMALL",
    "EXPLOSIVE",
    "EXPLOSIVE_BIG",
    "EXPLOSIVE_HUGE",
    "TOXICGAS",
    "TEARGAS",
    "SMOKE",
    "SMOKE_BIG",
    "FRAG",
    "FLASHBANG",
];

/// Everything finalization reads besides the archetype itself.
#[derive(Debug, Clone, Copy)]
pub struct FinalizeContext<'a> {
    pub vocab: &'a Vocabulary,
    pub options: &'a CatalogOptions,
    pub migrations: &'a MigrationTable,
    pub actions: &'a UseActionRegistry,
}

// ===========================================================================
// Repair capability cache
// ===========================================================================

/// Repair capabilities registered after the pre-pass.
#[derive(Debug, Clone, Default)]
pub struct RepairCache {
    /// Tools able to repair firearms.
    pub gun_repair_tools: BTreeSet<ItypeId>,
    /// Tool → materials it can repair.
    pub repair_tools: BTreeMap<ItypeId, BTreeSet<MaterialId>>,
}

impl RepairCache {
    pub fn build<'a>(archetypes: impl IntoIterator<Item = &'a Archetype>) -> Self {
        let mut cache = Self::default();
        for a in archetypes {
            cache.register(a);
        }
        cache
    }

    pub fn register(&mut self, a: &Archetype) {
        if a.can_use(GUN_REPAIR) {
            self.gun_repair_tools.insert(a.id.clone());
        }
        let materials = a
            .use_methods
            .get(REPAIR_ITEM)
            .and_then(|f| f.actor_as::<RepairItemActor>())
            .map(|actor| &actor.materials);
        if let Some(materials) = materials {
            if !materials.is_empty() {
                self.repair_tools.insert(a.id.clone(), materials.clone());
            }
        }
    }
}

// ===========================================================================
// Driver
// ===========================================================================

/// Run the pre-pass over every template, then the post-pass. Templates are
/// visited in id order so diagnostics are reproducible.
pub fn finalize_all(
    templates: &mut HashMap<ItypeId, Archetype>,
    ctx: &FinalizeContext<'_>,
    diags: &mut Diagnostics,
) -> RepairCache {
    let mut ids: Vec<ItypeId> = templates.keys().cloned().collect();
    ids.sort();

    for id in &ids {
        if let Some(a) = templates.get_mut(id) {
            finalize_pre(a, ctx, diags);
        }
    }

    let cache = RepairCache::build(templates.values());

    for id in &ids {
        if let Some(a) = templates.get_mut(id) {
            finalize_post(a, ctx, &cache, diags);
        }
    }

    log::info!(
        "finalized {} archetypes ({} gun repair tools, {} material repair tools)",
        ids.len(),
        cache.gun_repair_tools.len(),
        cache.repair_tools.len()
    );
    cache
}

// ===========================================================================
// Pre-pass
// ===========================================================================

/// Derive every pre-pass field of one archetype. Safe to run twice.
pub fn finalize_pre(a: &mut Archetype, ctx: &FinalizeContext<'_>, diags: &mut Diagnostics) {
    if a.damage_min == a.damage_max {
        a.set_flag(flag::NO_REPAIR);
    }

    apply_quality_actions(a, ctx, diags);
    apply_mod_actions(a, ctx, diags);

    if ctx.options.no_faults {
        a.faults.clear();
    }

    a.category = match &a.category_force {
        Some(forced) => forced.clone(),
        None => CategoryId::new(derive_category(a)),
    };

    a.price_post.get_or_insert(a.price);
    a.integral_volume.get_or_insert(a.volume);
    a.integral_weight.get_or_insert(a.weight);

    finalize_stack_size(a, ctx.options, diags);
    ensure_volume(a, diags);
    if a.longest_side.is_none() {
        a.longest_side = Some(Length::default_from_volume(a.volume));
    }
    parse_light_flag(a);

    if a.thrown_damage.is_empty() {
        let bash = a.melee_damage("bash") + a.weight.kilograms() as f32;
        a.thrown_damage = DamageInstance::single("bash", bash);
    }

    let combustible = !NON_COOKOFF_MATERIALS.iter().any(|m| a.has_material(m));
    if let Some(ammo) = a.ammo.as_mut() {
        finalize_ammo(ammo, combustible);
    }

    derive_magazine_maps(a);
    ctx.migrations.apply_to_archetype(a);
    finalize_gun(a);
    finalize_magazine(a, ctx.vocab);

    let layer = layer_from_flags(a);
    if let Some(armor) = a.armor.as_mut() {
        armor.layer = layer;
    }

    migrate_human_flesh(a);
    apply_diet_flags(a);
    apply_npc_flags(a);
    derive_vitamins(a, ctx.vocab);
    link_martial_art(a);
}

fn apply_quality_actions(a: &mut Archetype, ctx: &FinalizeContext<'_>, diags: &mut Diagnostics) {
    let mut implied: Vec<String> = Vec::new();
    for (quality, level) in &a.qualities {
        let Some(qt) = ctx.vocab.qualities.get(quality) else {
            continue;
        };
        for (min_level, actions) in &qt.usages {
            if level >= min_level {
                implied.extend(actions.iter().cloned());
            }
        }
    }
    add_default_actions(a, &implied, ctx, diags);
}

fn apply_mod_actions(a: &mut Archetype, ctx: &FinalizeContext<'_>, diags: &mut Diagnostics) {
    let mut wanted = Vec::new();
    if a.gunmod.is_some() {
        wanted.push(GUNMOD_ATTACH.to_string());
    } else if a.mod_slot.is_some() {
        wanted.push(TOOLMOD_ATTACH.to_string());
    }
    if a.gun.is_some() {
        wanted.push(DETACH_GUNMODS.to_string());
    }
    add_default_actions(a, &wanted, ctx, diags);
}

/// Add default-parameter actions for every name not already present.
fn add_default_actions(
    a: &mut Archetype,
    names: &[String],
    ctx: &FinalizeContext<'_>,
    diags: &mut Diagnostics,
) {
    for name in names {
        if a.use_methods.contains_key(name) {
            continue;
        }
        match ctx.actions.create_default(name) {
            Ok(f) => {
                a.use_methods.insert(name.clone(), f);
            }
            Err(e) => diags.push(DiagnosticKind::Finalize, a.id.as_str(), e.to_string()),
        }
    }
}

/// Display category for an archetype with no forced category.
pub fn derive_category(a: &Archetype) -> &'static str {
    if a.gun.is_some() && a.gunmod.is_none() {
        category::GUNS
    } else if a.magazine.is_some() {
        category::MAGAZINES
    } else if a.ammo.is_some() {
        category::AMMO
    } else if a.tool.is_some() {
        category::TOOLS
    } else if a.armor.is_some() {
        category::CLOTHING
    } else if let Some(com) = &a.comestible {
        if com.comestible_type == ComestibleType::Med {
            category::DRUGS
        } else {
            category::FOOD
        }
    } else if a.book.is_some() {
        category::BOOKS
    } else if a.gunmod.is_some() || a.mod_slot.is_some() {
        category::MODS
    } else if a.bionic.is_some() {
        category::BIONICS
    } else if a.melee_damage("bash") > 7.0
        || a.melee_damage("cut") > 5.0
        || a.melee_damage("stab") > 5.0
    {
        category::WEAPONS
    } else {
        category::OTHER
    }
}

fn finalize_stack_size(a: &mut Archetype, options: &CatalogOptions, diags: &mut Diagnostics) {
    if !a.count_by_charges() {
        return;
    }
    let max = options.max_stack_size.clamp(1, MAX_STACK_SIZE);
    if a.stack_size == 0 {
        a.stack_size = a.charges_default();
    }
    if a.stack_size > max {
        diags.push(
            DiagnosticKind::Finalize,
            a.id.as_str(),
            format!("stack size {} exceeds {max}; truncated", a.stack_size),
        );
        a.stack_size = max;
    }
    if a.stack_size < 1 {
        a.stack_size = 1;
    }
}

fn ensure_volume(a: &mut Archetype, diags: &mut Diagnostics) {
    if a.volume > Volume::ZERO || flag::VOLUME_EXEMPT.iter().any(|f| a.has_flag(f)) {
        return;
    }
    diags.push(
        DiagnosticKind::Finalize,
        a.id.as_str(),
        format!("volume {} ml is not positive; using 1 ml", a.volume.millilitres()),
    );
    a.volume = Volume(1);
}

/// Move a `LIGHT_<n>` flag into `light_emission`. Non-numeric suffixes are
/// ordinary flags and stay.
fn parse_light_flag(a: &mut Archetype) {
    let found: Vec<(FlagId, u32)> = a
        .flags
        .iter()
        .filter_map(|f| {
            let n = f.as_str().strip_prefix(flag::LIGHT_PREFIX)?.parse::<u32>().ok()?;
            Some((f.clone(), n))
        })
        .collect();
    if let Some(max) = found.iter().map(|(_, n)| *n).max() {
        a.light_emission = max;
    }
    for (f, _) in found {
        a.flags.remove(&f);
    }
}

fn finalize_ammo(ammo: &mut AmmoSlot, combustible: bool) {
    if ammo.loudness.is_none() {
        let damage: f32 = ammo
            .damage
            .units
            .iter()
            .map(|u| (u.amount + u.armor_penetration) * 2.0)
            .sum();
        ammo.loudness = Some(ammo.range * 2 + damage.round() as i32);
    }

    if combustible {
        ammo.cookoff =
            ammo.effects.contains("INCENDIARY") || ammo.effects.contains("COOKOFF");
        ammo.special_cookoff = SPECIAL_COOKOFF_EFFECTS
            .iter()
            .any(|e| ammo.effects.contains(*e));
    } else {
        ammo.cookoff = false;
        ammo.special_cookoff = false;
    }

    rescale_shot(ammo);
}

/// Fold sub-unit per-pellet damage into fewer pellets of larger damage,
/// keeping the total constant.
fn rescale_shot(ammo: &mut AmmoSlot) {
    if ammo.projectile_count <= 1 {
        return;
    }
    let per_pellet = ammo.damage.total();
    if !(per_pellet > 0.0 && per_pellet < 1.0) {
        return;
    }
    let total = per_pellet * ammo.projectile_count as f32;
    let count = (total.round() as i32).max(1);
    if count == ammo.projectile_count {
        return;
    }
    ammo.damage.scale(total / count as f32 / per_pellet);
    ammo.projectile_count = count;
}

/// Fill the compatible-magazine map from magazine wells when content gave
/// none, and pick a default magazine per ammo type.
fn derive_magazine_maps(a: &mut Archetype) {
    let wells: Vec<_> = a
        .pockets
        .iter()
        .filter(|p| p.pocket_type == PocketType::MagazineWell)
        .collect();
    if wells.is_empty() {
        return;
    }

    if a.magazines.is_empty() {
        let all: BTreeSet<ItypeId> = wells
            .iter()
            .flat_map(|w| w.item_restriction.iter().cloned())
            .collect();
        if !all.is_empty() {
            let declared = a
                .gun
                .iter()
                .flat_map(|g| g.ammo.iter())
                .chain(a.tool.iter().flat_map(|t| t.ammo.iter()));
            for ammo in declared {
                a.magazines.insert(ammo.clone(), all.clone());
            }
        }
    }

    let well_default = wells.iter().find_map(|w| w.default_magazine.as_ref());
    for (ammo, mags) in &a.magazines {
        if a.magazine_default.contains_key(ammo) {
            continue;
        }
        let pick = well_default
            .filter(|d| mags.contains(*d))
            .or_else(|| mags.iter().next());
        if let Some(mag) = pick {
            a.magazine_default.insert(ammo.clone(), mag.clone());
        }
    }
}

fn finalize_gun(a: &mut Archetype) {
    let uses_magazine = a.uses_magazine();
    let capacity = a.total_ammo_capacity();
    let reload_one = a.has_flag(flag::RELOAD_ONE);
    let reach = a.has_flag(flag::REACH_ATTACK);
    let Some(gun) = a.gun.as_mut() else {
        return;
    };

    if !gun.modes.contains_key(GUN_MODE_DEFAULT) {
        let clip = gun.clip.unwrap_or(capacity);
        let name = if !uses_magazine && clip == 1 {
            "manual"
        } else if gun.skill_used.as_str() == "pistol" && reload_one {
            "revolver"
        } else {
            "semi-auto"
        };
        gun.modes
            .insert(GUN_MODE_DEFAULT.to_string(), GunMode::new(name, 1));
    }
    if reach && !gun.modes.contains_key(GUN_MODE_MELEE) {
        let mut mode = GunMode::new("melee", 1);
        mode.flags.insert(FlagId::new(flag::MELEE));
        gun.modes.insert(GUN_MODE_MELEE.to_string(), mode);
    }

    if gun.handling.is_none() {
        gun.handling = Some(match gun.skill_used.as_str() {
            "rifle" | "smg" | "shotgun" => 20,
            _ => 10,
        });
    }
}

fn finalize_magazine(a: &mut Archetype, vocab: &Vocabulary) {
    let Some(mag) = a.magazine.as_mut() else {
        return;
    };
    if mag.default_ammo.is_none() {
        mag.default_ammo = mag
            .ammo
            .iter()
            .find_map(|ammo| vocab.default_ammo(ammo))
            .cloned();
    }
}

/// Armor layer implied by layering flags.
pub fn layer_from_flags(a: &Archetype) -> Layer {
    if a.has_flag(flag::SKINTIGHT) {
        Layer::Underwear
    } else if a.has_flag(flag::WAIST) {
        Layer::Waist
    } else if a.has_flag(flag::OUTER) {
        Layer::Outer
    } else if a.has_flag(flag::BELTED) {
        Layer::Belted
    } else if a.has_flag(flag::PERSONAL) {
        Layer::Personal
    } else if a.has_flag(flag::AURA) {
        Layer::Aura
    } else {
        Layer::Regular
    }
}

fn migrate_human_flesh(a: &mut Archetype) {
    let Some(pos) = a.materials.iter().position(|(m, _)| m.as_str() == "hflesh") else {
        return;
    };
    let (_, portion) = a.materials.remove(pos);
    if let Some(entry) = a.materials.iter_mut().find(|(m, _)| m.as_str() == "flesh") {
        entry.1 += portion;
    } else {
        a.materials.insert(pos, (MaterialId::new("flesh"), portion));
    }
    a.set_flag(flag::CANNIBALISM);
}

fn apply_diet_flags(a: &mut Archetype) {
    for (material, diet_flag) in flag::MATERIAL_DIET_FLAGS {
        if a.has_material(material) {
            a.set_flag(diet_flag);
        }
    }
}

/// Each inferred flag can trigger the next, so order matters.
fn apply_npc_flags(a: &mut Archetype) {
    if a.can_use(EXPLOSION) {
        a.set_flag(flag::DANGEROUS);
    }
    if a.has_flag(flag::DANGEROUS) {
        a.set_flag(flag::NPC_THROW_NOW);
    }
    if a.has_flag(flag::BOMB) {
        a.set_flag(flag::NPC_ACTIVATE);
    }
    if a.has_flag(flag::NPC_THROW_NOW) {
        a.set_flag(flag::NPC_THROWN);
    }
    if a.has_flag(flag::NPC_ACTIVATE) || a.has_flag(flag::NPC_THROWN) {
        a.set_flag(flag::NPC_ALT_ATTACK);
    }
}

/// Default vitamins for a healthy comestible: the portion-weighted vitamin
/// density of its edible materials, scaled by healthiness.
fn derive_vitamins(a: &mut Archetype, vocab: &Vocabulary) {
    let Some(com) = &a.comestible else {
        return;
    };
    if com.healthy < 0 || !com.vitamins.is_empty() {
        return;
    }
    let factor = com.healthy.max(1) as f32 * 10.0;

    let mut edible_total = 0;
    let mut sums: BTreeMap<VitaminId, f32> = BTreeMap::new();
    for (material, portion) in &a.materials {
        let Some(mt) = vocab.material(material) else {
            continue;
        };
        if !mt.edible {
            continue;
        }
        edible_total += portion;
        for (vitamin, density) in &mt.vitamins {
            let counts = vocab
                .vitamins
                .get(vitamin)
                .is_none_or(|v| v.kind == VitaminKind::Vitamin);
            if counts {
                *sums.entry(vitamin.clone()).or_default() += density * *portion as f32;
            }
        }
    }
    if edible_total <= 0 {
        return;
    }

    let vitamins: BTreeMap<VitaminId, i32> = sums
        .into_iter()
        .map(|(v, sum)| {
            let avg = sum / edible_total as f32;
            (v, (factor * avg / 100.0).ceil() as i32)
        })
        .filter(|(_, n)| *n > 0)
        .collect();
    if let Some(com) = a.comestible.as_mut() {
        com.vitamins = vitamins;
    }
}

/// Legacy `manual_<style>` books teach `style_<style>`.
fn link_martial_art(a: &mut Archetype) {
    let Some(style) = a.id.as_str().strip_prefix("manual_") else {
        return;
    };
    let style = MartialArtId::new(format!("style_{style}"));
    if let Some(book) = a.book.as_mut() {
        if book.martial_art.is_none() {
            book.martial_art = Some(style);
        }
    }
}

// ===========================================================================
// Post-pass
// ===========================================================================

/// Derive every post-pass field of one archetype.
pub fn finalize_post(
    a: &mut Archetype,
    ctx: &FinalizeContext<'_>,
    cache: &RepairCache,
    diags: &mut Diagnostics,
) {
    drop_unknown_flags(a, ctx.vocab, diags);
    link_repair_tools(a, cache);
    finalize_armor(a);
    check_contamination(a, ctx.vocab, diags);
}

fn drop_unknown_flags(a: &mut Archetype, vocab: &Vocabulary, diags: &mut Diagnostics) {
    let unknown: Vec<FlagId> = a
        .flags
        .iter()
        .filter(|f| !vocab.is_flag(f))
        .cloned()
        .collect();
    for f in unknown {
        diags.push(
            DiagnosticKind::Finalize,
            a.id.as_str(),
            format!("unknown flag '{f}' dropped"),
        );
        a.flags.remove(&f);
    }
}

fn link_repair_tools(a: &mut Archetype, cache: &RepairCache) {
    if a.has_flag(flag::NO_REPAIR) {
        return;
    }
    if a.gun.is_some() && !a.has_flag(flag::PRIMITIVE_RANGED_WEAPON) {
        a.repair_tools
            .extend(cache.gun_repair_tools.iter().cloned());
        return;
    }
    let tools: Vec<ItypeId> = {
        let materials = a.material_set();
        cache
            .repair_tools
            .iter()
            .filter(|(_, repairs)| repairs.iter().any(|m| materials.contains(m)))
            .map(|(tool, _)| tool.clone())
            .collect()
    };
    a.repair_tools.extend(tools);
}

fn finalize_armor(a: &mut Archetype) {
    let pocket_ml: i64 = a
        .pockets
        .iter()
        .filter(|p| p.pocket_type == PocketType::Container && !p.rigid)
        .map(|p| p.max_contains_volume().millilitres())
        .sum();
    let Some(armor) = a.armor.as_mut() else {
        return;
    };
    for portion in &mut armor.data {
        if portion.max_encumbrance.is_none() {
            let extra = pocket_ml as f32 * portion.volume_encumber_modifier / 250.0;
            portion.max_encumbrance = Some(portion.encumbrance + extra as i32);
        }
        portion.avg_thickness = portion
            .materials
            .iter()
            .map(|m| m.thickness * m.cover as f32)
            .sum::<f32>()
            / 100.0;
    }
    armor.sub_coverage_used = armor.data.iter().any(|p| !p.sub_coverage.is_empty());
}

fn check_contamination(a: &Archetype, vocab: &Vocabulary, diags: &mut Diagnostics) {
    let Some(com) = &a.comestible else {
        return;
    };
    for disease in com.contamination.keys() {
        if !vocab.diseases.contains(disease) {
            diags.push(
                DiagnosticKind::Finalize,
                a.id.as_str(),
                format!("contamination references unknown disease '{disease}'"),
            );
        }
    }
}

// ===========================================================================
// Tests
// ===========================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::id::{AmmoTypeId, DiseaseId, QualityId, SkillId};
    use crate::pocket::PocketData;
    use crate::slots::*;
    use crate::units::Mass;
    use crate::use_action::TransformActor;
    use crate::use_action::UseFunction;
    use crate::vocab::{MaterialType, QualityType, VitaminType};

    // -----------------------------------------------------------------------
    // Helpers
    // -----------------------------------------------------------------------

    struct Env {
        vocab: Vocabulary,
        options: CatalogOptions,
        migrations: MigrationTable,
        actions: UseActionRegistry,
    }

    impl Env {
        fn new() -> Self {
            Self {
                vocab: Vocabulary::new(),
                options: CatalogOptions::default(),
                migrations: MigrationTable::new(),
                actions: UseActionRegistry::builtin(),
            }
        }

        fn ctx(&self) -> FinalizeContext<'_> {
            FinalizeContext {
                vocab: &self.vocab,
                options: &self.options,
                migrations: &self.migrations,
                actions: &self.actions,
            }
        }

        fn pre(&self, a: &mut Archetype) -> Diagnostics {
            let mut diags = Diagnostics::new();
            finalize_pre(a, &self.ctx(), &mut diags);
            diags
        }

        fn post(&self, a: &mut Archetype, cache: &RepairCache) -> Diagnostics {
            let mut diags = Diagnostics::new();
            finalize_post(a, &self.ctx(), cache, &mut diags);
            diags
        }
    }

    fn with_volume(id: &str) -> Archetype {
        let mut a = Archetype::new(id);
        a.volume = Volume(250);
        a
    }

    fn gun(id: &str, skill: &str, ammo: &str) -> Archetype {
        let mut a = with_volume(id);
        a.gun = Some(GunSlot {
            skill_used: SkillId::new(skill),
            ammo: [AmmoTypeId::new(ammo)].into_iter().collect(),
            ..GunSlot::default()
        });
        a
    }

    fn ammo_capacity(ammo: &str, n: i32) -> PocketData {
        let mut cap = BTreeMap::new();
        cap.insert(AmmoTypeId::new(ammo), n);
        PocketData::legacy_magazine(cap)
    }

    // -----------------------------------------------------------------------
    // Simple derivations
    // -----------------------------------------------------------------------

    #[test]
    fn zero_width_damage_sets_no_repair() {
        let env = Env::new();
        let mut a = with_volume("glass_shard");
        a.damage_min = 0;
        a.damage_max = 0;
        env.pre(&mut a);
        assert!(a.has_flag(flag::NO_REPAIR));
    }

    #[test]
    fn defaults_follow_base_values() {
        let env = Env::new();
        let mut a = with_volume("rock");
        a.price = 100;
        a.weight = Mass(2500);
        env.pre(&mut a);
        assert_eq!(a.price_post, Some(100));
        assert_eq!(a.integral_volume, Some(Volume(250)));
        assert_eq!(a.integral_weight, Some(Mass(2500)));
        assert_eq!(a.longest_side, Some(Length(60)));
        // Thrown bash = melee bash + weight in kg.
        assert_eq!(a.thrown_damage.total(), 2.5);
        assert_eq!(a.category.as_str(), category::OTHER);
    }

    #[test]
    fn forced_category_wins() {
        let env = Env::new();
        let mut a = with_volume("spear");
        a.category_force = Some(CategoryId::new(category::TOOLS));
        a.melee.insert("stab".to_string(), 20.0);
        env.pre(&mut a);
        assert_eq!(a.category.as_str(), category::TOOLS);

        let mut b = with_volume("spear2");
        b.melee.insert("stab".to_string(), 20.0);
        env.pre(&mut b);
        assert_eq!(b.category.as_str(), category::WEAPONS);
    }

    #[test]
    fn no_faults_option_clears_faults() {
        let mut env = Env::new();
        env.options.no_faults = true;
        let mut a = with_volume("engine");
        a.faults.insert(crate::id::FaultId::new("fault_engine_belt"));
        env.pre(&mut a);
        assert!(a.faults.is_empty());
    }

    #[test]
    fn zero_volume_gets_one_ml_unless_exempt() {
        let env = Env::new();
        let mut a = Archetype::new("feather");
        let diags = env.pre(&mut a);
        assert_eq!(a.volume, Volume(1));
        assert_eq!(diags.len(), 1);

        let mut b = Archetype::new("aura_thing");
        b.set_flag(flag::AURA);
        let diags = env.pre(&mut b);
        assert_eq!(b.volume, Volume::ZERO);
        assert!(diags.is_empty());
    }

    #[test]
    fn light_flag_is_parsed_and_stripped() {
        let env = Env::new();
        let mut a = with_volume("candle");
        a.set_flag("LIGHT_8");
        a.set_flag("LIGHT_BLUE");
        env.pre(&mut a);
        assert_eq!(a.light_emission, 8);
        assert!(!a.has_flag("LIGHT_8"));
        assert!(a.has_flag("LIGHT_BLUE"));

        env.pre(&mut a);
        assert_eq!(a.light_emission, 8);
    }

    // -----------------------------------------------------------------------
    // Stack size
    // -----------------------------------------------------------------------

    #[test]
    fn stack_size_defaults_to_charges() {
        let env = Env::new();
        let mut a = with_volume("9mm");
        a.ammo = Some(AmmoSlot {
            def_charges: 50,
            ..AmmoSlot::default()
        });
        env.pre(&mut a);
        assert_eq!(a.stack_size, 50);
    }

    #[test]
    fn stack_size_is_capped_with_warning() {
        let env = Env::new();
        let mut a = with_volume("bb");
        a.ammo = Some(AmmoSlot::default());
        a.stack_size = 500;
        let diags = env.pre(&mut a);
        assert_eq!(a.stack_size, 200);
        assert_eq!(diags.of_kind(DiagnosticKind::Finalize).count(), 1);
    }

    #[test]
    fn configured_cap_never_exceeds_hard_limit() {
        let mut env = Env::new();
        env.options.max_stack_size = 500;
        let mut a = with_volume("bb");
        a.ammo = Some(AmmoSlot::default());
        a.stack_size = 400;
        env.pre(&mut a);
        assert_eq!(a.stack_size, MAX_STACK_SIZE);
    }

    #[test]
    fn stack_size_is_at_least_one() {
        let env = Env::new();
        let mut a = with_volume("dust");
        a.ammo = Some(AmmoSlot {
            def_charges: 0,
            ..AmmoSlot::default()
        });
        env.pre(&mut a);
        assert_eq!(a.stack_size, 1);
    }

    // -----------------------------------------------------------------------
    // Actions
    // -----------------------------------------------------------------------

    #[test]
    fn quality_actions_fill_only_missing() {
        let mut env = Env::new();
        env.vocab.add_quality(QualityType {
            id: QualityId::new("HAMMER"),
            name: "hammering".to_string(),
            usages: vec![(1, vec!["HAMMER".to_string()]), (3, vec!["CROWBAR".to_string()])],
        });

        let mut a = with_volume("hammer");
        a.qualities.insert(QualityId::new("HAMMER"), 2);
        env.pre(&mut a);
        assert!(a.can_use("HAMMER"));
        assert!(!a.can_use("CROWBAR"));

        let mut b = with_volume("fancy_hammer");
        b.qualities.insert(QualityId::new("HAMMER"), 1);
        b.use_methods.insert(
            "HAMMER".to_string(),
            UseFunction::new(Box::new(TransformActor::default())),
        );
        env.pre(&mut b);
        assert_eq!(b.use_methods["HAMMER"].type_name(), "transform");
    }

    #[test]
    fn mod_actions_are_synthesized() {
        let env = Env::new();
        let mut gm = with_volume("suppressor");
        gm.gunmod = Some(GunModSlot::default());
        gm.mod_slot = Some(ModSlot::default());
        env.pre(&mut gm);
        assert!(gm.can_use(GUNMOD_ATTACH));
        assert!(!gm.can_use(TOOLMOD_ATTACH));
        assert_eq!(gm.category.as_str(), category::MODS);

        let mut tm = with_volume("battery_compartment");
        tm.mod_slot = Some(ModSlot::default());
        env.pre(&mut tm);
        assert!(tm.can_use(TOOLMOD_ATTACH));

        let mut g = gun("glock", "pistol", "9mm");
        env.pre(&mut g);
        assert!(g.can_use(DETACH_GUNMODS));
    }

    #[test]
    fn explosive_use_starts_npc_chain() {
        let env = Env::new();
        let mut a = with_volume("grenade_act");
        let f = env
            .actions
            .parse("explosion", serde_json::json!({"power": 10.0}))
            .unwrap();
        a.use_methods.insert("explosion".to_string(), f);
        env.pre(&mut a);
        for f in [
            flag::DANGEROUS,
            flag::NPC_THROW_NOW,
            flag::NPC_THROWN,
            flag::NPC_ALT_ATTACK,
        ] {
            assert!(a.has_flag(f), "missing {f}");
        }
        assert!(!a.has_flag(flag::NPC_ACTIVATE));

        let mut b = with_volume("pipebomb");
        b.set_flag(flag::BOMB);
        env.pre(&mut b);
        assert!(b.has_flag(flag::NPC_ACTIVATE));
        assert!(b.has_flag(flag::NPC_ALT_ATTACK));
        assert!(!b.has_flag(flag::NPC_THROWN));
    }

    // -----------------------------------------------------------------------
    // Ammo
    // -----------------------------------------------------------------------

    #[test]
    fn ammo_loudness_from_range_and_damage() {
        let env = Env::new();
        let mut a = with_volume("308");
        let mut damage = DamageInstance::default();
        damage.add("bullet", 20.0, 5.0);
        a.ammo = Some(AmmoSlot {
            range: 10,
            damage,
            ..AmmoSlot::default()
        });
        env.pre(&mut a);
        assert_eq!(a.ammo.as_ref().unwrap().loudness, Some(70));
        assert_eq!(a.category.as_str(), category::AMMO);
    }

    #[test]
    fn cookoff_from_effects_unless_fuel() {
        let env = Env::new();
        let mut a = with_volume("incendiary_round");
        a.ammo = Some(AmmoSlot {
            effects: ["INCENDIARY".to_string(), "FRAG".to_string()]
                .into_iter()
                .collect(),
            ..AmmoSlot::default()
        });
        env.pre(&mut a);
        let ammo = a.ammo.as_ref().unwrap();
        assert!(ammo.cookoff);
        assert!(ammo.special_cookoff);

        let mut b = with_volume("gasoline");
        b.set_materials(vec![(MaterialId::new("hydrocarbons"), 1)]);
        b.ammo = Some(AmmoSlot {
            effects: ["INCENDIARY".to_string()].into_iter().collect(),
            cookoff: true,
            ..AmmoSlot::default()
        });
        env.pre(&mut b);
        assert!(!b.ammo.as_ref().unwrap().cookoff);
    }

    #[test]
    fn shot_rescale_keeps_total_damage() {
        let env = Env::new();
        let mut a = with_volume("birdshot");
        a.ammo = Some(AmmoSlot {
            damage: DamageInstance::single("bullet", 0.5),
            projectile_count: 9,
            ..AmmoSlot::default()
        });
        env.pre(&mut a);
        let ammo = a.ammo.as_ref().unwrap();
        assert_eq!(ammo.projectile_count, 5);
        assert!((ammo.damage.total() - 0.9).abs() < 1e-5);

        env.pre(&mut a);
        assert_eq!(a.ammo.as_ref().unwrap().projectile_count, 5);
    }

    // -----------------------------------------------------------------------
    // Guns and magazines
    // -----------------------------------------------------------------------

    #[test]
    fn single_shot_gun_gets_manual_mode() {
        let env = Env::new();
        let mut a = gun("pipe_shotgun", "shotgun", "shotgun_shell");
        a.pockets.push(ammo_capacity("shotgun_shell", 1));
        env.pre(&mut a);
        let g = a.gun.as_ref().unwrap();
        assert_eq!(g.modes[GUN_MODE_DEFAULT].name, "manual");
        assert_eq!(g.handling, Some(20));
        assert_eq!(a.category.as_str(), category::GUNS);
    }

    #[test]
    fn revolver_and_semi_auto_modes() {
        let env = Env::new();
        let mut rev = gun("sw_619", "pistol", "38");
        rev.set_flag(flag::RELOAD_ONE);
        rev.pockets.push(ammo_capacity("38", 6));
        env.pre(&mut rev);
        assert_eq!(rev.gun.as_ref().unwrap().modes[GUN_MODE_DEFAULT].name, "revolver");
        assert_eq!(rev.gun.as_ref().unwrap().handling, Some(10));

        let mut glock = gun("glock", "pistol", "9mm");
        glock
            .pockets
            .push(PocketData::legacy_magazine_well(vec![ItypeId::new("glockmag")]));
        env.pre(&mut glock);
        assert_eq!(
            glock.gun.as_ref().unwrap().modes[GUN_MODE_DEFAULT].name,
            "semi-auto"
        );
    }

    #[test]
    fn reach_attack_adds_melee_mode() {
        let env = Env::new();
        let mut a = gun("bayonet_rifle", "rifle", "762");
        a.set_flag(flag::REACH_ATTACK);
        env.pre(&mut a);
        let mode = &a.gun.as_ref().unwrap().modes[GUN_MODE_MELEE];
        assert!(mode.flags.contains(flag::MELEE));
    }

    #[test]
    fn magazine_wells_fill_magazine_maps() {
        let env = Env::new();
        let mut a = gun("glock", "pistol", "9mm");
        a.pockets.push(PocketData::legacy_magazine_well(vec![
            ItypeId::new("glockmag"),
            ItypeId::new("glockbigmag"),
        ]));
        env.pre(&mut a);
        let mags = &a.magazines[&AmmoTypeId::new("9mm")];
        assert_eq!(mags.len(), 2);
        assert_eq!(
            a.magazine_default[&AmmoTypeId::new("9mm")],
            ItypeId::new("glockmag")
        );
    }

    #[test]
    fn magazine_default_ammo_from_vocabulary() {
        let mut env = Env::new();
        env.vocab.add_ammo_type(crate::vocab::AmmoType {
            id: AmmoTypeId::new("9mm"),
            name: "9mm".to_string(),
            default_ammo: Some(ItypeId::new("9mm_fmj")),
        });
        let mut a = with_volume("glockmag");
        a.magazine = Some(MagazineSlot {
            ammo: [AmmoTypeId::new("9mm")].into_iter().collect(),
            ..MagazineSlot::default()
        });
        env.pre(&mut a);
        assert_eq!(
            a.magazine.as_ref().unwrap().default_ammo,
            Some(ItypeId::new("9mm_fmj"))
        );
        assert_eq!(a.category.as_str(), category::MAGAZINES);
    }

    // -----------------------------------------------------------------------
    // Armor, diet, vitamins, books
    // -----------------------------------------------------------------------

    #[test]
    fn jacket_is_wool_clothing_on_regular_layer() {
        let env = Env::new();
        let mut a = with_volume("jacket");
        a.set_materials(vec![(MaterialId::new("wool"), 100)]);
        a.armor = Some(ArmorSlot::default());
        env.pre(&mut a);
        assert_eq!(a.category.as_str(), category::CLOTHING);
        assert!(a.has_flag(flag::ALLERGEN_WOOL));
        assert_eq!(a.armor.as_ref().unwrap().layer, Layer::Regular);
    }

    #[test]
    fn layering_flags_select_layer() {
        let env = Env::new();
        let mut a = with_volume("boxers");
        a.set_flag(flag::SKINTIGHT);
        a.armor = Some(ArmorSlot::default());
        env.pre(&mut a);
        assert_eq!(a.armor.as_ref().unwrap().layer, Layer::Underwear);

        let mut b = with_volume("duster");
        b.set_flag(flag::OUTER);
        b.armor = Some(ArmorSlot::default());
        env.pre(&mut b);
        assert_eq!(b.armor.as_ref().unwrap().layer, Layer::Outer);
    }

    #[test]
    fn human_flesh_merges_into_flesh() {
        let env = Env::new();
        let mut a = with_volume("mystery_meat");
        a.set_materials(vec![
            (MaterialId::new("flesh"), 1),
            (MaterialId::new("hflesh"), 2),
        ]);
        env.pre(&mut a);
        assert_eq!(a.materials, vec![(MaterialId::new("flesh"), 3)]);
        assert_eq!(a.mat_portion_total, 3);
        assert!(a.has_flag(flag::CANNIBALISM));
        assert!(a.has_flag(flag::CARNIVORE_OK));
    }

    #[test]
    fn vitamins_from_edible_materials() {
        let mut env = Env::new();
        let mut veggy = MaterialType {
            id: MaterialId::new("veggy"),
            edible: true,
            ..MaterialType::default()
        };
        veggy.vitamins.insert(VitaminId::new("vitC"), 30.0);
        veggy.vitamins.insert(VitaminId::new("mutagen"), 50.0);
        env.vocab.add_material(veggy);
        env.vocab.add_material(MaterialType {
            id: MaterialId::new("steel"),
            ..MaterialType::default()
        });
        env.vocab.add_vitamin(VitaminType {
            id: VitaminId::new("mutagen"),
            kind: VitaminKind::Toxin,
        });

        let mut a = with_volume("salad");
        a.set_materials(vec![
            (MaterialId::new("veggy"), 1),
            (MaterialId::new("steel"), 1),
        ]);
        a.comestible = Some(ComestibleSlot {
            healthy: 2,
            ..ComestibleSlot::default()
        });
        env.pre(&mut a);
        let vitamins = &a.comestible.as_ref().unwrap().vitamins;
        assert_eq!(vitamins.get(&VitaminId::new("vitC")), Some(&6));
        assert!(!vitamins.contains_key(&VitaminId::new("mutagen")));
        assert_eq!(a.category.as_str(), category::FOOD);
    }

    #[test]
    fn unhealthy_food_gets_no_vitamins() {
        let env = Env::new();
        let mut a = with_volume("candy");
        a.comestible = Some(ComestibleSlot {
            healthy: -1,
            ..ComestibleSlot::default()
        });
        env.pre(&mut a);
        assert!(a.comestible.as_ref().unwrap().vitamins.is_empty());
    }

    #[test]
    fn manual_books_learn_a_style() {
        let env = Env::new();
        let mut a = with_volume("manual_karate");
        a.book = Some(BookSlot::default());
        env.pre(&mut a);
        assert_eq!(
            a.book.as_ref().unwrap().martial_art,
            Some(MartialArtId::new("style_karate"))
        );
        assert_eq!(a.category.as_str(), category::BOOKS);
    }

    #[test]
    fn pre_pass_is_idempotent() {
        let env = Env::new();
        let mut a = with_volume("lantern");
        a.set_flag("LIGHT_20");
        a.set_flag(flag::BOMB);
        a.set_materials(vec![(MaterialId::new("wool"), 1), (MaterialId::new("hflesh"), 1)]);
        env.pre(&mut a);
        let flags = a.flags.clone();
        let light = a.light_emission;
        let materials = a.materials.clone();
        env.pre(&mut a);
        assert_eq!(a.flags, flags);
        assert_eq!(a.light_emission, light);
        assert_eq!(a.materials, materials);
    }

    // -----------------------------------------------------------------------
    // Post-pass
    // -----------------------------------------------------------------------

    #[test]
    fn unknown_flags_are_dropped() {
        let env = Env::new();
        let mut a = with_volume("rock");
        a.set_flag("SPARKLY");
        a.set_flag(flag::NO_UNLOAD);
        let diags = env.post(&mut a, &RepairCache::default());
        assert!(!a.has_flag("SPARKLY"));
        assert!(a.has_flag(flag::NO_UNLOAD));
        assert_eq!(diags.len(), 1);
    }

    #[test]
    fn repair_tools_by_material_and_gun_repair() {
        let env = Env::new();
        let mut kit = with_volume("gunsmith_kit");
        kit.use_methods.insert(
            GUN_REPAIR.to_string(),
            env.actions.create_default(GUN_REPAIR).unwrap(),
        );
        let mut sewing = with_volume("sewing_kit");
        sewing.use_methods.insert(
            REPAIR_ITEM.to_string(),
            env.actions
                .parse(REPAIR_ITEM, serde_json::json!({"materials": ["cotton", "wool"]}))
                .unwrap(),
        );
        let cache = RepairCache::build([&kit, &sewing]);

        let mut shirt = with_volume("shirt");
        shirt.set_materials(vec![(MaterialId::new("cotton"), 1)]);
        env.post(&mut shirt, &cache);
        assert!(shirt.repair_tools.contains(&ItypeId::new("sewing_kit")));
        assert!(!shirt.repair_tools.contains(&ItypeId::new("gunsmith_kit")));

        let mut rifle = gun("m4", "rifle", "223");
        rifle.set_materials(vec![(MaterialId::new("cotton"), 1)]);
        env.post(&mut rifle, &cache);
        assert_eq!(
            rifle.repair_tools.iter().map(|t| t.as_str()).collect::<Vec<_>>(),
            vec!["gunsmith_kit"]
        );

        let mut bow = gun("longbow", "archery", "arrow");
        bow.set_flag(flag::PRIMITIVE_RANGED_WEAPON);
        bow.set_materials(vec![(MaterialId::new("wool"), 1)]);
        env.post(&mut bow, &cache);
        assert!(bow.repair_tools.contains(&ItypeId::new("sewing_kit")));
    }

    #[test]
    fn armor_encumbrance_and_thickness() {
        let env = Env::new();
        let mut a = with_volume("cargo_pants");
        let mut pocket = PocketData::new(PocketType::Container);
        pocket.max_contains_volume = Some(Volume(500));
        a.pockets.push(pocket);
        a.armor = Some(ArmorSlot {
            data: vec![ArmorPortion {
                encumbrance: 10,
                sub_coverage: ["leg_hip_l".to_string()].into_iter().collect(),
                materials: vec![
                    PortionMaterial {
                        material: MaterialId::new("cotton"),
                        cover: 100,
                        thickness: 1.0,
                    },
                    PortionMaterial {
                        material: MaterialId::new("kevlar"),
                        cover: 50,
                        thickness: 2.0,
                    },
                ],
                ..ArmorPortion::default()
            }],
            ..ArmorSlot::default()
        });
        env.post(&mut a, &RepairCache::default());
        let armor = a.armor.as_ref().unwrap();
        assert_eq!(armor.data[0].max_encumbrance, Some(12));
        assert!((armor.data[0].avg_thickness - 2.0).abs() < 1e-6);
        assert!(armor.sub_coverage_used);
    }

    #[test]
    fn unknown_contamination_is_reported() {
        let mut env = Env::new();
        env.vocab.diseases.insert(DiseaseId::new("bad_food"));
        let mut a = with_volume("raw_meat");
        let mut com = ComestibleSlot::default();
        com.contamination.insert(DiseaseId::new("bad_food"), 5);
        com.contamination.insert(DiseaseId::new("zombie_flu"), 1);
        a.comestible = Some(com);
        let diags = env.post(&mut a, &RepairCache::default());
        assert_eq!(diags.len(), 1);
        assert!(diags.iter().any(|d| d.message.contains("zombie_flu")));
    }

    #[test]
    fn finalize_all_runs_both_passes() {
        let env = Env::new();
        let mut templates = HashMap::new();
        let mut kit = with_volume("gunsmith_kit");
        kit.use_methods.insert(
            GUN_REPAIR.to_string(),
            env.actions.create_default(GUN_REPAIR).unwrap(),
        );
        templates.insert(kit.id.clone(), kit);
        let g = gun("m4", "rifle", "223");
        templates.insert(g.id.clone(), g);

        let mut diags = Diagnostics::new();
        let cache = finalize_all(&mut templates, &env.ctx(), &mut diags);
        assert_eq!(cache.gun_repair_tools.len(), 1);
        assert!(templates[&ItypeId::new("m4")]
            .repair_tools
            .contains(&ItypeId::new("gunsmith_kit")));
    }
}
