//! The item archetype: one item type definition, not a live instance.

use crate::id::*;
use crate::pocket::{PocketData, PocketType};
use crate::slots::*;
use crate::units::{Length, Mass, Volume};
use crate::use_action::UseFunction;
use std::collections::{BTreeMap, BTreeSet};

/// Display name with its plural form.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ItemName {
    pub singular: String,
    pub plural: String,
}

impl ItemName {
    pub fn new(singular: &str, plural: &str) -> Self {
        Self {
            singular: singular.to_string(),
            plural: plural.to_string(),
        }
    }
}

/// What a conditional name keys on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConditionKind {
    Flag,
    ComponentId,
    Var,
}

/// A name that applies when the instance satisfies `condition`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConditionalName {
    pub kind: ConditionKind,
    pub condition: String,
    /// For `Var` conditions, the value the variable must hold.
    pub value: Option<String>,
    pub name: ItemName,
}

pub const DEFAULT_DAMAGE_MIN: i32 = -1000;
pub const DEFAULT_DAMAGE_MAX: i32 = 4000;

/// An item type definition.
///
/// Created blank by the loader and filled in field by field. The finalizer
/// derives the computed fields exactly once; after that only identifier
/// migration touches it.
#[derive(Debug, Clone)]
pub struct Archetype {
    pub id: ItypeId,
    pub name: ItemName,
    pub description: String,
    pub looks_like: Option<ItypeId>,
    /// Content sources that defined or overrode this archetype, in order.
    pub src: Vec<ContentSource>,

    pub weight: Mass,
    pub volume: Volume,
    pub longest_side: Option<Length>,
    pub integral_volume: Option<Volume>,
    pub integral_weight: Option<Mass>,
    pub price: i64,
    pub price_post: Option<i64>,
    /// Zero means unset.
    pub stack_size: i32,

    /// Category set explicitly by content.
    pub category_force: Option<CategoryId>,
    /// Display category, derived unless forced.
    pub category: CategoryId,

    pub flags: BTreeSet<FlagId>,
    /// (material, relative portion) in declaration order.
    pub materials: Vec<(MaterialId, i32)>,
    pub mat_portion_total: i32,

    pub melee: BTreeMap<String, f32>,
    pub thrown_damage: DamageInstance,
    pub to_hit: i32,
    pub qualities: BTreeMap<QualityId, i32>,
    pub charged_qualities: BTreeMap<QualityId, i32>,
    pub techniques: BTreeSet<TechniqueId>,
    pub faults: BTreeSet<FaultId>,
    pub damage_min: i32,
    pub damage_max: i32,
    pub light_emission: u32,
    pub default_container: Option<ItypeId>,
    pub variants: Vec<String>,

    pub pockets: Vec<PocketData>,
    /// Compatible magazines per ammo type, derived from magazine wells.
    pub magazines: BTreeMap<AmmoTypeId, BTreeSet<ItypeId>>,
    pub magazine_default: BTreeMap<AmmoTypeId, ItypeId>,

    pub use_methods: BTreeMap<String, UseFunction>,
    pub conditional_names: Vec<ConditionalName>,
    /// Tools that can repair this archetype. Derived.
    pub repair_tools: BTreeSet<ItypeId>,
    /// Recipes producing this archetype. Populated after loading.
    pub recipes: Vec<RecipeId>,

    pub ammo: Option<AmmoSlot>,
    pub gun: Option<GunSlot>,
    pub gunmod: Option<GunModSlot>,
    pub mod_slot: Option<ModSlot>,
    pub armor: Option<ArmorSlot>,
    pub tool: Option<ToolSlot>,
    pub comestible: Option<ComestibleSlot>,
    pub magazine: Option<MagazineSlot>,
    pub bionic: Option<BionicSlot>,
    pub book: Option<BookSlot>,
}

impl Archetype {
    /// A blank archetype.
    pub fn new(id: impl Into<ItypeId>) -> Self {
        let id = id.into();
        Self {
            name: ItemName::new(id.as_str(), id.as_str()),
            id,
            description: String::new(),
            looks_like: None,
            src: Vec::new(),
            weight: Mass::ZERO,
            volume: Volume::ZERO,
            longest_side: None,
            integral_volume: None,
            integral_weight: None,
            price: 0,
            price_post: None,
            stack_size: 0,
            category_force: None,
            category: CategoryId::default(),
            flags: BTreeSet::new(),
            materials: Vec::new(),
            mat_portion_total: 0,
            melee: BTreeMap::new(),
            thrown_damage: DamageInstance::default(),
            to_hit: 0,
            qualities: BTreeMap::new(),
            charged_qualities: BTreeMap::new(),
            techniques: BTreeSet::new(),
            faults: BTreeSet::new(),
            damage_min: DEFAULT_DAMAGE_MIN,
            damage_max: DEFAULT_DAMAGE_MAX,
            light_emission: 0,
            default_container: None,
            variants: Vec::new(),
            pockets: Vec::new(),
            magazines: BTreeMap::new(),
            magazine_default: BTreeMap::new(),
            use_methods: BTreeMap::new(),
            conditional_names: Vec::new(),
            repair_tools: BTreeSet::new(),
            recipes: Vec::new(),
            ammo: None,
            gun: None,
            gunmod: None,
            mod_slot: None,
            armor: None,
            tool: None,
            comestible: None,
            magazine: None,
            bionic: None,
            book: None,
        }
    }

    pub fn has_flag(&self, flag: &str) -> bool {
        self.flags.contains(flag)
    }

    pub fn set_flag(&mut self, flag: &str) {
        self.flags.insert(FlagId::new(flag));
    }

    pub fn has_material(&self, material: &str) -> bool {
        self.materials.iter().any(|(m, _)| m.as_str() == material)
    }

    pub fn material_set(&self) -> BTreeSet<&MaterialId> {
        self.materials.iter().map(|(m, _)| m).collect()
    }

    /// Replace the material list, recomputing the portion total.
    pub fn set_materials(&mut self, materials: Vec<(MaterialId, i32)>) {
        self.mat_portion_total = materials.iter().map(|(_, p)| *p).sum();
        self.materials = materials;
    }

    pub fn can_use(&self, action: &str) -> bool {
        self.use_methods.contains_key(action)
    }

    pub fn melee_damage(&self, damage_type: &str) -> f32 {
        self.melee.get(damage_type).copied().unwrap_or(0.0)
    }

    /// Items counted by charges stack into a single entity with a count.
    pub fn count_by_charges(&self) -> bool {
        self.ammo.is_some() || self.comestible.as_ref().is_some_and(|c| c.def_charges > 1)
    }

    /// Default charge count of a freshly spawned stack.
    pub fn charges_default(&self) -> i32 {
        if let Some(ammo) = &self.ammo {
            ammo.def_charges
        } else if let Some(com) = &self.comestible {
            com.def_charges
        } else if let Some(tool) = &self.tool {
            tool.def_charges
        } else {
            0
        }
    }

    /// Every ammo type this archetype can be loaded with.
    pub fn ammo_types(&self) -> BTreeSet<AmmoTypeId> {
        let mut out = BTreeSet::new();
        if let Some(gun) = &self.gun {
            out.extend(gun.ammo.iter().cloned());
        }
        if let Some(tool) = &self.tool {
            out.extend(tool.ammo.iter().cloned());
        }
        if let Some(mag) = &self.magazine {
            out.extend(mag.ammo.iter().cloned());
        }
        for pocket in &self.pockets {
            out.extend(pocket.ammo_restriction.keys().cloned());
        }
        out
    }

    pub fn has_pocket_type(&self, pocket_type: PocketType) -> bool {
        self.pockets.iter().any(|p| p.pocket_type == pocket_type)
    }

    /// Rounds held directly by MAGAZINE pockets for the given ammo type.
    pub fn ammo_capacity(&self, ammo: &AmmoTypeId) -> i32 {
        self.pockets
            .iter()
            .filter(|p| p.pocket_type == PocketType::Magazine)
            .map(|p| p.ammo_capacity(ammo))
            .sum()
    }

    /// Total rounds held directly across all ammo types.
    pub fn total_ammo_capacity(&self) -> i32 {
        self.pockets
            .iter()
            .filter(|p| p.pocket_type == PocketType::Magazine)
            .flat_map(|p| p.ammo_restriction.values())
            .sum()
    }

    /// Whether this archetype accepts detachable magazines.
    pub fn uses_magazine(&self) -> bool {
        self.has_pocket_type(PocketType::MagazineWell)
    }
}
