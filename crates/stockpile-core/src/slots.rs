//! Kind-specific sub-records of an archetype.
//!
//! A slot is present only when the archetype represents that kind of item.
//! Several slots may coexist (a tool that is also armor).

use crate::id::*;
use crate::units::Volume;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

// ===========================================================================
// Damage
// ===========================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DamageUnit {
    pub damage_type: String,
    pub amount: f32,
    pub armor_penetration: f32,
}

/// A bundle of typed damage.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DamageInstance {
    pub units: Vec<DamageUnit>,
}

impl DamageInstance {
    pub fn single(damage_type: &str, amount: f32) -> Self {
        let mut d = Self::default();
        d.add(damage_type, amount, 0.0);
        d
    }

    /// Add damage, merging with an existing unit of the same type.
    pub fn add(&mut self, damage_type: &str, amount: f32, armor_penetration: f32) {
        if let Some(unit) = self.units.iter_mut().find(|u| u.damage_type == damage_type) {
            unit.amount += amount;
            unit.armor_penetration += armor_penetration;
        } else {
            self.units.push(DamageUnit {
                damage_type: damage_type.to_string(),
                amount,
                armor_penetration,
            });
        }
    }

    pub fn total(&self) -> f32 {
        self.units.iter().map(|u| u.amount).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }

    pub fn scale(&mut self, factor: f32) {
        for unit in &mut self.units {
            unit.amount *= factor;
        }
    }
}

// ===========================================================================
// Ammo
// ===========================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AmmoSlot {
    pub ammo_type: AmmoTypeId,
    pub casing: Option<ItypeId>,
    /// Damage per projectile.
    pub damage: DamageInstance,
    /// Number of projectiles per round ("shot" when greater than one).
    pub projectile_count: i32,
    pub range: i32,
    pub dispersion: i32,
    pub recoil: i32,
    pub def_charges: i32,
    /// Derived from range and damage when unset.
    pub loudness: Option<i32>,
    pub effects: BTreeSet<String>,
    pub cookoff: bool,
    pub special_cookoff: bool,
    pub drop: Option<ItypeId>,
    pub drop_chance: f32,
}

impl Default for AmmoSlot {
    fn default() -> Self {
        Self {
            ammo_type: AmmoTypeId::default(),
            casing: None,
            damage: DamageInstance::default(),
            projectile_count: 1,
            range: 0,
            dispersion: 0,
            recoil: 0,
            def_charges: 1,
            loudness: None,
            effects: BTreeSet::new(),
            cookoff: false,
            special_cookoff: false,
            drop: None,
            drop_chance: 1.0,
        }
    }
}

// ===========================================================================
// Gun
// ===========================================================================

/// A fire mode: display name, rounds per trigger pull, extra flags.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GunMode {
    pub name: String,
    pub qty: i32,
    pub flags: BTreeSet<FlagId>,
}

impl GunMode {
    pub fn new(name: &str, qty: i32) -> Self {
        Self {
            name: name.to_string(),
            qty,
            flags: BTreeSet::new(),
        }
    }
}

pub const GUN_MODE_DEFAULT: &str = "DEFAULT";
pub const GUN_MODE_MELEE: &str = "MELEE";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GunSlot {
    pub skill_used: SkillId,
    pub ammo: BTreeSet<AmmoTypeId>,
    /// Legacy fixed magazine size; superseded by pockets.
    pub clip: Option<i32>,
    pub range: i32,
    pub damage: DamageInstance,
    pub dispersion: i32,
    pub recoil: i32,
    pub durability: i32,
    /// Defaulted from the skill family when unset.
    pub handling: Option<i32>,
    pub reload_time: i32,
    pub barrel_volume: Volume,
    pub loudness: i32,
    pub modes: BTreeMap<String, GunMode>,
    pub default_mods: Vec<ItypeId>,
    pub valid_mod_locations: BTreeMap<String, i32>,
}

impl Default for GunSlot {
    fn default() -> Self {
        Self {
            skill_used: SkillId::default(),
            ammo: BTreeSet::new(),
            clip: None,
            range: 0,
            damage: DamageInstance::default(),
            dispersion: 0,
            recoil: 0,
            durability: 0,
            handling: None,
            reload_time: 100,
            barrel_volume: Volume::ZERO,
            loudness: 0,
            modes: BTreeMap::new(),
            default_mods: Vec::new(),
            valid_mod_locations: BTreeMap::new(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GunModSlot {
    pub location: String,
    pub mod_targets: BTreeSet<String>,
    pub damage_modifier: i32,
    pub range_modifier: i32,
    pub dispersion_modifier: i32,
    pub handling_modifier: i32,
    pub ammo_modifier: BTreeSet<AmmoTypeId>,
    pub mode_modifier: BTreeMap<String, GunMode>,
    pub install_time: i32,
}

/// Generic mod data shared by gun mods and tool mods.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModSlot {
    pub acceptable_ammo: BTreeSet<AmmoTypeId>,
    pub ammo_modifier: BTreeSet<AmmoTypeId>,
    pub magazine_adaptor: BTreeMap<AmmoTypeId, BTreeSet<ItypeId>>,
    pub capacity_multiplier: f32,
}

// ===========================================================================
// Armor
// ===========================================================================

/// Clothing layer, outermost last.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Layer {
    Personal,
    Underwear,
    #[default]
    Regular,
    Waist,
    Outer,
    Belted,
    Aura,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PortionMaterial {
    pub material: MaterialId,
    /// Percent of the portion this material covers.
    pub cover: i32,
    pub thickness: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArmorPortion {
    pub covers: BTreeSet<String>,
    pub sub_coverage: BTreeSet<String>,
    pub coverage: i32,
    pub encumbrance: i32,
    /// Derived from non-rigid pocket volume when unset.
    pub max_encumbrance: Option<i32>,
    pub volume_encumber_modifier: f32,
    pub materials: Vec<PortionMaterial>,
    /// Derived: coverage-weighted thickness of `materials`.
    pub avg_thickness: f32,
}

impl Default for ArmorPortion {
    fn default() -> Self {
        Self {
            covers: BTreeSet::new(),
            sub_coverage: BTreeSet::new(),
            coverage: 0,
            encumbrance: 0,
            max_encumbrance: None,
            volume_encumber_modifier: 1.0,
            materials: Vec::new(),
            avg_thickness: 0.0,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ArmorSlot {
    pub data: Vec<ArmorPortion>,
    pub warmth: i32,
    pub environmental_protection: i32,
    pub sided: bool,
    pub power_armor: bool,
    /// Derived from layering flags.
    pub layer: Layer,
    /// Derived: any portion declares sub-coverage.
    pub sub_coverage_used: bool,
}

// ===========================================================================
// Tool
// ===========================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ToolSlot {
    pub ammo: BTreeSet<AmmoTypeId>,
    pub max_charges: i32,
    pub def_charges: i32,
    pub charges_per_use: i32,
    pub turns_per_charge: i32,
    pub revert_to: Option<ItypeId>,
    pub power_draw: i32,
    pub rand_charges: Vec<i32>,
}

// ===========================================================================
// Comestible
// ===========================================================================

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ComestibleType {
    #[default]
    Food,
    Drink,
    Med,
}

impl ComestibleType {
    pub fn from_str_opt(s: &str) -> Option<ComestibleType> {
        match s {
            "FOOD" => Some(ComestibleType::Food),
            "DRINK" => Some(ComestibleType::Drink),
            "MED" => Some(ComestibleType::Med),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComestibleSlot {
    pub comestible_type: ComestibleType,
    pub calories: i32,
    pub quench: i32,
    pub healthy: i32,
    pub fun: i32,
    pub def_charges: i32,
    pub spoils_in: Option<i64>,
    /// Vitamin → units per serving. Derived from materials when empty.
    pub vitamins: BTreeMap<VitaminId, i32>,
    /// Disease → percent chance of contamination.
    pub contamination: BTreeMap<DiseaseId, i32>,
    pub tool: Option<ItypeId>,
}

impl Default for ComestibleSlot {
    fn default() -> Self {
        Self {
            comestible_type: ComestibleType::Food,
            calories: 0,
            quench: 0,
            healthy: 0,
            fun: 0,
            def_charges: 1,
            spoils_in: None,
            vitamins: BTreeMap::new(),
            contamination: BTreeMap::new(),
            tool: None,
        }
    }
}

// ===========================================================================
// Magazine
// ===========================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MagazineSlot {
    pub ammo: BTreeSet<AmmoTypeId>,
    /// Legacy capacity; superseded by pockets.
    pub capacity: i32,
    pub count: i32,
    pub default_ammo: Option<ItypeId>,
    pub reliability: i32,
    pub reload_time: i32,
    pub linkage: Option<ItypeId>,
}

impl Default for MagazineSlot {
    fn default() -> Self {
        Self {
            ammo: BTreeSet::new(),
            capacity: 0,
            count: 0,
            default_ammo: None,
            reliability: 0,
            reload_time: 100,
            linkage: None,
        }
    }
}

// ===========================================================================
// Bionic, book
// ===========================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BionicSlot {
    pub bionic_id: String,
    pub difficulty: i32,
    pub is_upgrade: bool,
    pub installation_data: Option<ItypeId>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BookSlot {
    pub skill: Option<SkillId>,
    pub level: i32,
    pub required_level: i32,
    pub intelligence: i32,
    pub time: i32,
    pub fun: i32,
    pub chapters: i32,
    pub martial_art: Option<MartialArtId>,
}
