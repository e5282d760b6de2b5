//! Vocabularies the item pipeline cross-references.
//!
//! These registries are owned elsewhere in a full simulation; here they hold
//! just enough for the finalizer to derive fields and for the checker to
//! report dangling references.

use crate::flag::BUILTIN_FLAGS;
use crate::id::*;
use std::collections::{BTreeMap, HashMap, HashSet};

/// Built-in display categories.
pub mod category {
    pub const GUNS: &str = "guns";
    pub const MAGAZINES: &str = "magazines";
    pub const AMMO: &str = "ammo";
    pub const TOOLS: &str = "tools";
    pub const CLOTHING: &str = "clothing";
    pub const FOOD: &str = "food";
    pub const DRUGS: &str = "drugs";
    pub const BOOKS: &str = "books";
    pub const MODS: &str = "mods";
    pub const BIONICS: &str = "bionics";
    pub const WEAPONS: &str = "weapons";
    pub const OTHER: &str = "other";

    pub const ALL: &[&str] = &[
        GUNS, MAGAZINES, AMMO, TOOLS, CLOTHING, FOOD, DRUGS, BOOKS, MODS, BIONICS, WEAPONS,
        OTHER,
    ];
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct MaterialType {
    pub id: MaterialId,
    pub name: String,
    pub edible: bool,
    /// Vitamin density: units per 100 portions of this material.
    pub vitamins: BTreeMap<VitaminId, f32>,
    /// Item consumed when repairing things made of this material.
    pub repaired_with: Option<ItypeId>,
    pub density: f32,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum VitaminKind {
    #[default]
    Vitamin,
    Toxin,
    Drug,
    Counter,
}

impl VitaminKind {
    pub fn from_str_opt(s: &str) -> Option<VitaminKind> {
        match s {
            "vitamin" => Some(VitaminKind::Vitamin),
            "toxin" => Some(VitaminKind::Toxin),
            "drug" => Some(VitaminKind::Drug),
            "counter" => Some(VitaminKind::Counter),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct VitaminType {
    pub id: VitaminId,
    pub kind: VitaminKind,
}

/// A tool quality and the use-actions it implies at each level.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QualityType {
    pub id: QualityId,
    pub name: String,
    /// (minimum level, implied action names).
    pub usages: Vec<(i32, Vec<String>)>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct AmmoType {
    pub id: AmmoTypeId,
    pub name: String,
    pub default_ammo: Option<ItypeId>,
}

/// Every external vocabulary consulted by the pipeline.
#[derive(Debug, Clone)]
pub struct Vocabulary {
    pub materials: HashMap<MaterialId, MaterialType>,
    pub flags: HashSet<FlagId>,
    pub qualities: HashMap<QualityId, QualityType>,
    pub ammo_types: HashMap<AmmoTypeId, AmmoType>,
    pub skills: HashSet<SkillId>,
    pub vitamins: HashMap<VitaminId, VitaminType>,
    pub diseases: HashSet<DiseaseId>,
    pub martial_arts: HashSet<MartialArtId>,
    pub techniques: HashSet<TechniqueId>,
    pub categories: HashSet<CategoryId>,
    pub faults: HashSet<FaultId>,
    /// Construction/blueprint ids that may be resolved as item placeholders.
    pub blueprints: HashSet<String>,
}

impl Default for Vocabulary {
    fn default() -> Self {
        Self::new()
    }
}

impl Vocabulary {
    /// A vocabulary holding only the built-in flags and categories.
    pub fn new() -> Self {
        Self {
            materials: HashMap::new(),
            flags: BUILTIN_FLAGS.iter().map(|f| FlagId::new(*f)).collect(),
            qualities: HashMap::new(),
            ammo_types: HashMap::new(),
            skills: HashSet::new(),
            vitamins: HashMap::new(),
            diseases: HashSet::new(),
            martial_arts: HashSet::new(),
            techniques: HashSet::new(),
            categories: category::ALL.iter().map(|c| CategoryId::new(*c)).collect(),
            faults: HashSet::new(),
            blueprints: HashSet::new(),
        }
    }

    pub fn add_material(&mut self, material: MaterialType) {
        self.materials.insert(material.id.clone(), material);
    }

    pub fn add_quality(&mut self, quality: QualityType) {
        self.qualities.insert(quality.id.clone(), quality);
    }

    pub fn add_ammo_type(&mut self, ammo: AmmoType) {
        self.ammo_types.insert(ammo.id.clone(), ammo);
    }

    pub fn add_vitamin(&mut self, vitamin: VitaminType) {
        self.vitamins.insert(vitamin.id.clone(), vitamin);
    }

    pub fn material(&self, id: &MaterialId) -> Option<&MaterialType> {
        self.materials.get(id)
    }

    pub fn is_flag(&self, flag: &FlagId) -> bool {
        self.flags.contains(flag)
    }

    pub fn default_ammo(&self, ammo: &AmmoTypeId) -> Option<&ItypeId> {
        self.ammo_types.get(ammo).and_then(|a| a.default_ammo.as_ref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flag;

    #[test]
    fn builtin_flags_are_known() {
        let v = Vocabulary::new();
        assert!(v.is_flag(&FlagId::new(flag::ALLERGEN_WOOL)));
        assert!(v.is_flag(&FlagId::new(flag::NPC_ALT_ATTACK)));
        assert!(!v.is_flag(&FlagId::new("SPARKLY")));
    }

    #[test]
    fn builtin_categories_are_known() {
        let v = Vocabulary::new();
        assert!(v.categories.contains(&CategoryId::new(category::CLOTHING)));
    }

    #[test]
    fn default_ammo_lookup() {
        let mut v = Vocabulary::new();
        v.add_ammo_type(AmmoType {
            id: AmmoTypeId::new("9mm"),
            name: "9x19mm".to_string(),
            default_ammo: Some(ItypeId::new("9mm_fmj")),
        });
        assert_eq!(
            v.default_ammo(&AmmoTypeId::new("9mm")),
            Some(&ItypeId::new("9mm_fmj"))
        );
        assert_eq!(v.default_ammo(&AmmoTypeId::new("45")), None);
    }
}
