//! Containment capacity declarations ("pockets") on an archetype.

use crate::id::{AmmoTypeId, FlagId, ItypeId};
use crate::units::{Length, Mass, Volume};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// What a pocket holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PocketType {
    /// Ordinary storage.
    Container,
    /// Holds loose ammunition directly (fixed ammo types and capacities).
    Magazine,
    /// Accepts a detachable magazine.
    MagazineWell,
    /// Holds installed mods.
    Mod,
    /// Holds the contents of a corpse.
    Corpse,
    /// Temporary pocket used while migrating old contents.
    Migration,
}

impl PocketType {
    pub fn from_str_opt(s: &str) -> Option<PocketType> {
        match s {
            "CONTAINER" => Some(PocketType::Container),
            "MAGAZINE" => Some(PocketType::Magazine),
            "MAGAZINE_WELL" => Some(PocketType::MagazineWell),
            "MOD" => Some(PocketType::Mod),
            "CORPSE" => Some(PocketType::Corpse),
            "MIGRATION" => Some(PocketType::Migration),
            _ => None,
        }
    }
}

/// A typed capacity descriptor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PocketData {
    pub pocket_type: PocketType,
    /// Ammo type → round capacity. Non-empty only for ammo-holding pockets.
    pub ammo_restriction: BTreeMap<AmmoTypeId, i32>,
    /// Specific item ids allowed (e.g. compatible magazines for a well).
    pub item_restriction: BTreeSet<ItypeId>,
    /// First entry of the legacy magazine list; preferred when filling.
    pub default_magazine: Option<ItypeId>,
    pub flag_restriction: BTreeSet<FlagId>,
    pub max_contains_volume: Option<Volume>,
    pub max_contains_weight: Option<Mass>,
    pub max_item_length: Option<Length>,
    pub rigid: bool,
    pub watertight: bool,
    pub airtight: bool,
    pub spoil_multiplier: f32,
    pub moves: i32,
}

impl PocketData {
    pub fn new(pocket_type: PocketType) -> Self {
        Self {
            pocket_type,
            ammo_restriction: BTreeMap::new(),
            item_restriction: BTreeSet::new(),
            default_magazine: None,
            flag_restriction: BTreeSet::new(),
            max_contains_volume: None,
            max_contains_weight: None,
            max_item_length: None,
            rigid: false,
            watertight: false,
            airtight: false,
            spoil_multiplier: 1.0,
            moves: 100,
        }
    }

    /// A MAGAZINE pocket synthesized from legacy fixed-capacity ammo fields.
    pub fn legacy_magazine(ammo: BTreeMap<AmmoTypeId, i32>) -> Self {
        let mut pocket = Self::new(PocketType::Magazine);
        pocket.ammo_restriction = ammo;
        pocket.rigid = true;
        pocket
    }

    /// A MAGAZINE_WELL pocket synthesized from a legacy compatible-magazine
    /// list. The first magazine becomes the default.
    pub fn legacy_magazine_well(magazines: impl IntoIterator<Item = ItypeId>) -> Self {
        let mut pocket = Self::new(PocketType::MagazineWell);
        for mag in magazines {
            if pocket.default_magazine.is_none() {
                pocket.default_magazine = Some(mag.clone());
            }
            pocket.item_restriction.insert(mag);
        }
        pocket.rigid = true;
        pocket
    }

    pub fn holds_ammo(&self) -> bool {
        self.pocket_type == PocketType::Magazine && !self.ammo_restriction.is_empty()
    }

    /// Capacity for the given ammo type, 0 if not accepted.
    pub fn ammo_capacity(&self, ammo: &AmmoTypeId) -> i32 {
        self.ammo_restriction.get(ammo).copied().unwrap_or(0)
    }

    /// Volume this pocket can hold. Unbounded containers report zero.
    pub fn max_contains_volume(&self) -> Volume {
        self.max_contains_volume.unwrap_or(Volume::ZERO)
    }
}
