//! Per-kind slot loaders.
//!
//! Each loader overwrites the fields its record declares and leaves the
//! rest alone, so an inherited slot keeps every value the child does not
//! mention. Legacy item types read these fields from the top level of the
//! record; `ITEM` records read them from a `*_data` sub-object.

use serde::Deserialize;
use std::collections::{BTreeMap, BTreeSet};
use stockpile_core::id::*;
use stockpile_core::slots::*;

use crate::reader::RecordReader;

// ===========================================================================
// Shared shapes
// ===========================================================================

#[derive(Deserialize)]
struct DamageUnitDef {
    damage_type: String,
    amount: f32,
    #[serde(default)]
    armor_penetration: f32,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum DamageDef {
    Flat(f32),
    One(DamageUnitDef),
    Many(Vec<DamageUnitDef>),
}

/// A damage member: a bare number of `default_type`, one unit object or a
/// list of unit objects.
pub(crate) fn damage(
    r: &mut RecordReader<'_>,
    key: &str,
    default_type: &str,
) -> Option<DamageInstance> {
    let units = match r.get::<DamageDef>(key)? {
        DamageDef::Flat(amount) => return Some(DamageInstance::single(default_type, amount)),
        DamageDef::One(unit) => vec![unit],
        DamageDef::Many(units) => units,
    };
    let mut out = DamageInstance::default();
    for u in units {
        out.add(&u.damage_type, u.amount, u.armor_penetration);
    }
    Some(out)
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ModeDef {
    Plain(String, String, i32),
    Flagged(String, String, i32, Vec<String>),
}

/// Fire modes as `[key, name, qty]` or `[key, name, qty, [flags]]`.
fn modes(r: &mut RecordReader<'_>, key: &str) -> Option<BTreeMap<String, GunMode>> {
    let defs: Vec<ModeDef> = r.get(key)?;
    let mut out = BTreeMap::new();
    for def in defs {
        let (mode_key, name, qty, flags) = match def {
            ModeDef::Plain(k, n, q) => (k, n, q, Vec::new()),
            ModeDef::Flagged(k, n, q, f) => (k, n, q, f),
        };
        let mut mode = GunMode::new(&name, qty);
        mode.flags = flags.into_iter().map(FlagId::new).collect();
        out.insert(mode_key, mode);
    }
    Some(out)
}

fn id_set<T: From<String> + Ord>(r: &mut RecordReader<'_>, key: &str) -> Option<BTreeSet<T>> {
    r.string_list(key)
        .map(|ids| ids.into_iter().map(T::from).collect())
}

/// `[[ammo_type, [magazine, ...]], ...]` in declared order.
pub(crate) fn declared_magazines(
    r: &mut RecordReader<'_>,
    key: &str,
) -> Option<Vec<(AmmoTypeId, Vec<ItypeId>)>> {
    let pairs: Vec<(String, Vec<String>)> = r.get(key)?;
    Some(
        pairs
            .into_iter()
            .map(|(ammo, mags)| {
                (
                    AmmoTypeId::new(ammo),
                    mags.into_iter().map(ItypeId::new).collect(),
                )
            })
            .collect(),
    )
}

pub(crate) fn magazine_map(
    r: &mut RecordReader<'_>,
    key: &str,
) -> Option<BTreeMap<AmmoTypeId, BTreeSet<ItypeId>>> {
    let declared = declared_magazines(r, key)?;
    Some(
        declared
            .into_iter()
            .map(|(ammo, mags)| (ammo, mags.into_iter().collect()))
            .collect(),
    )
}

// ===========================================================================
// Ammo
// ===========================================================================

pub fn load_ammo(r: &mut RecordReader<'_>, slot: &mut AmmoSlot) {
    r.read("ammo_type", &mut slot.ammo_type);
    r.read_opt("casing", &mut slot.casing);
    if let Some(d) = damage(r, "damage", "bullet") {
        slot.damage = d;
    }
    r.read("count", &mut slot.def_charges);
    r.read("projectile_count", &mut slot.projectile_count);
    r.read("range", &mut slot.range);
    r.read("dispersion", &mut slot.dispersion);
    r.read("recoil", &mut slot.recoil);
    r.read_opt("loudness", &mut slot.loudness);
    if let Some(effects) = r.string_list("effects") {
        slot.effects = effects.into_iter().collect();
    }
    r.read("cookoff", &mut slot.cookoff);
    r.read("special_cookoff", &mut slot.special_cookoff);
    r.read_opt("drop", &mut slot.drop);
    r.read("drop_chance", &mut slot.drop_chance);
}

// ===========================================================================
// Gun and mods
// ===========================================================================

pub fn load_gun(r: &mut RecordReader<'_>, slot: &mut GunSlot) {
    r.read("skill", &mut slot.skill_used);
    if let Some(ammo) = id_set(r, "ammo") {
        slot.ammo = ammo;
    }
    r.read_opt("clip_size", &mut slot.clip);
    r.read("range", &mut slot.range);
    if let Some(d) = damage(r, "ranged_damage", "bullet") {
        slot.damage = d;
    }
    r.read("dispersion", &mut slot.dispersion);
    r.read("recoil", &mut slot.recoil);
    r.read("durability", &mut slot.durability);
    r.read_opt("handling", &mut slot.handling);
    r.read("reload", &mut slot.reload_time);
    if let Some(v) = r.volume("barrel_volume") {
        slot.barrel_volume = v;
    }
    r.read("loudness", &mut slot.loudness);
    if let Some(m) = modes(r, "modes") {
        slot.modes = m;
    }
    if let Some(mods) = r.string_list("built_in_mods") {
        slot.default_mods = mods.into_iter().map(ItypeId::new).collect();
    }
    if let Some(mods) = r.string_list("default_mods") {
        slot.default_mods.extend(mods.into_iter().map(ItypeId::new));
    }
    if let Some(locations) = r.get::<Vec<(String, i32)>>("valid_mod_locations") {
        slot.valid_mod_locations = locations.into_iter().collect();
    }
}

pub fn load_gunmod(r: &mut RecordReader<'_>, slot: &mut GunModSlot) {
    r.read("location", &mut slot.location);
    if let Some(targets) = r.string_list("mod_targets") {
        slot.mod_targets = targets.into_iter().collect();
    }
    r.read("damage_modifier", &mut slot.damage_modifier);
    r.read("range_modifier", &mut slot.range_modifier);
    r.read("dispersion_modifier", &mut slot.dispersion_modifier);
    r.read("handling_modifier", &mut slot.handling_modifier);
    if let Some(ammo) = id_set(r, "ammo_modifier") {
        slot.ammo_modifier = ammo;
    }
    if let Some(m) = modes(r, "mode_modifier") {
        slot.mode_modifier = m;
    }
    r.read("install_time", &mut slot.install_time);
}

pub fn load_mod(r: &mut RecordReader<'_>, slot: &mut ModSlot) {
    if let Some(ammo) = id_set(r, "acceptable_ammo") {
        slot.acceptable_ammo = ammo;
    }
    if let Some(ammo) = id_set(r, "ammo_modifier") {
        slot.ammo_modifier = ammo;
    }
    if let Some(map) = magazine_map(r, "magazine_adaptor") {
        slot.magazine_adaptor = map;
    }
    r.read("capacity_multiplier", &mut slot.capacity_multiplier);
}

// ===========================================================================
// Armor
// ===========================================================================

#[derive(Deserialize)]
#[serde(untagged)]
enum EncumbranceDef {
    Fixed(i32),
    Range(i32, i32),
}

#[derive(Deserialize)]
struct PortionMaterialDef {
    #[serde(rename = "type")]
    material: String,
    #[serde(default = "full_cover")]
    covered_by_mat: i32,
    #[serde(default)]
    thickness: f32,
}

fn full_cover() -> i32 {
    100
}

#[derive(Deserialize)]
struct PortionDef {
    #[serde(default)]
    covers: Vec<String>,
    #[serde(default)]
    specifically_covering: Vec<String>,
    #[serde(default)]
    coverage: i32,
    encumbrance: Option<EncumbranceDef>,
    volume_encumber_modifier: Option<f32>,
    #[serde(default)]
    material: Vec<PortionMaterialDef>,
}

impl PortionDef {
    fn into_portion(self) -> ArmorPortion {
        let mut p = ArmorPortion {
            covers: self.covers.into_iter().collect(),
            sub_coverage: self.specifically_covering.into_iter().collect(),
            coverage: self.coverage,
            ..ArmorPortion::default()
        };
        match self.encumbrance {
            Some(EncumbranceDef::Fixed(e)) => p.encumbrance = e,
            Some(EncumbranceDef::Range(e, max)) => {
                p.encumbrance = e;
                p.max_encumbrance = Some(max);
            }
            None => {}
        }
        if let Some(m) = self.volume_encumber_modifier {
            p.volume_encumber_modifier = m;
        }
        p.materials = self
            .material
            .into_iter()
            .map(|m| PortionMaterial {
                material: MaterialId::new(m.material),
                cover: m.covered_by_mat,
                thickness: m.thickness,
            })
            .collect();
        p
    }
}

/// Armor data: either an `armor` list of portions or the legacy flat
/// `covers`/`coverage`/`encumbrance` fields describing a single portion.
/// `materials` seeds per-portion materials for the legacy form.
pub fn load_armor(r: &mut RecordReader<'_>, slot: &mut ArmorSlot, materials: &[(MaterialId, i32)]) {
    if let Some(defs) = r.get::<Vec<PortionDef>>("armor") {
        slot.data = defs.into_iter().map(PortionDef::into_portion).collect();
    } else if ["covers", "coverage", "encumbrance", "max_encumbrance", "material_thickness"]
        .iter()
        .any(|k| r.has(k))
    {
        let mut portion = slot.data.first().cloned().unwrap_or_default();
        if let Some(covers) = r.string_list("covers") {
            portion.covers = covers.into_iter().collect();
        }
        r.read("coverage", &mut portion.coverage);
        r.read("encumbrance", &mut portion.encumbrance);
        r.read_opt("max_encumbrance", &mut portion.max_encumbrance);
        if let Some(thickness) = r.get::<f32>("material_thickness") {
            portion.materials = materials
                .iter()
                .map(|(m, _)| PortionMaterial {
                    material: m.clone(),
                    cover: 100,
                    thickness,
                })
                .collect();
        }
        slot.data = vec![portion];
    }
    r.read("warmth", &mut slot.warmth);
    r.read("environmental_protection", &mut slot.environmental_protection);
    r.read("sided", &mut slot.sided);
    r.read("power_armor", &mut slot.power_armor);
}

// ===========================================================================
// Tool, comestible, magazine
// ===========================================================================

pub fn load_tool(r: &mut RecordReader<'_>, slot: &mut ToolSlot) {
    if let Some(ammo) = id_set(r, "ammo") {
        slot.ammo = ammo;
    }
    r.read("max_charges", &mut slot.max_charges);
    r.read("initial_charges", &mut slot.def_charges);
    r.read("charges_per_use", &mut slot.charges_per_use);
    r.read("turns_per_charge", &mut slot.turns_per_charge);
    r.read_opt("revert_to", &mut slot.revert_to);
    r.read("power_draw", &mut slot.power_draw);
    r.read("rand_charges", &mut slot.rand_charges);
}

#[derive(Deserialize)]
struct ContaminationDef {
    disease: String,
    probability: i32,
}

pub fn load_comestible(r: &mut RecordReader<'_>, slot: &mut ComestibleSlot) {
    if let Some(kind) = r.string("comestible_type") {
        match ComestibleType::from_str_opt(&kind) {
            Some(t) => slot.comestible_type = t,
            None => r.problem("comestible_type", format!("unknown comestible type '{kind}'")),
        }
    }
    r.read("calories", &mut slot.calories);
    r.read("quench", &mut slot.quench);
    r.read("healthy", &mut slot.healthy);
    r.read("fun", &mut slot.fun);
    r.read("charges", &mut slot.def_charges);
    r.read_opt("spoils_in", &mut slot.spoils_in);
    if let Some(vits) = r.get::<Vec<(String, i32)>>("vitamins") {
        slot.vitamins = vits
            .into_iter()
            .map(|(v, amount)| (VitaminId::new(v), amount))
            .collect();
    }
    if let Some(defs) = r.get::<Vec<ContaminationDef>>("contamination") {
        slot.contamination = defs
            .into_iter()
            .map(|c| (DiseaseId::new(c.disease), c.probability))
            .collect();
    }
    r.read_opt("tool", &mut slot.tool);
}

pub fn load_magazine(r: &mut RecordReader<'_>, slot: &mut MagazineSlot) {
    if let Some(ammo) = id_set(r, "ammo_type") {
        slot.ammo = ammo;
    }
    r.read("capacity", &mut slot.capacity);
    r.read("count", &mut slot.count);
    r.read_opt("default_ammo", &mut slot.default_ammo);
    r.read("reliability", &mut slot.reliability);
    r.read("reload_time", &mut slot.reload_time);
    r.read_opt("linkage", &mut slot.linkage);
}

// ===========================================================================
// Bionic, book
// ===========================================================================

pub fn load_bionic(r: &mut RecordReader<'_>, slot: &mut BionicSlot, item: &ItypeId) {
    r.read("bionic_id", &mut slot.bionic_id);
    if slot.bionic_id.is_empty() {
        slot.bionic_id = item.to_string();
    }
    r.read("difficulty", &mut slot.difficulty);
    r.read("is_upgrade", &mut slot.is_upgrade);
    r.read_opt("installation_data", &mut slot.installation_data);
}

pub fn load_book(r: &mut RecordReader<'_>, slot: &mut BookSlot) {
    r.read_opt("skill", &mut slot.skill);
    r.read("max_level", &mut slot.level);
    r.read("required_level", &mut slot.required_level);
    r.read("intelligence", &mut slot.intelligence);
    r.read("time", &mut slot.time);
    r.read("fun", &mut slot.fun);
    r.read("chapters", &mut slot.chapters);
    r.read_opt("martial_art", &mut slot.martial_art);
}

// ===========================================================================
// Tests
// ===========================================================================
