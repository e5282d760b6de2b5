//! Shared test helpers for integration tests and benchmarks.
//!
//! Gated behind `#[cfg(any(test, feature = "test-utils"))]` so these helpers
//! are available in unit tests, integration tests, and benchmarks (via the
//! `test-utils` feature).

use crate::archetype::Archetype;
use crate::catalog::Catalog;
use crate::id::*;
use crate::options::CatalogOptions;
use crate::pocket::PocketData;
use crate::slots::*;
use crate::units::{Mass, Volume};
use crate::use_action::UseActionRegistry;
use crate::vocab::{AmmoType, MaterialType, QualityType, Vocabulary};
use std::collections::BTreeMap;

// ===========================================================================
// Vocabulary
// ===========================================================================

/// A vocabulary with a handful of common materials, calibers and skills.
pub fn test_vocab() -> Vocabulary {
    let mut v = Vocabulary::new();
    for (id, edible) in [
        ("steel", false),
        ("wood", false),
        ("cotton", false),
        ("wool", false),
        ("plastic", false),
        ("flesh", true),
        ("hflesh", true),
        ("veggy", true),
    ] {
        v.add_material(MaterialType {
            id: MaterialId::new(id),
            name: id.to_string(),
            edible,
            ..MaterialType::default()
        });
    }
    for (id, default) in [("9mm", "9mm_fmj"), ("shot", "shot_00"), ("battery", "battery")] {
        v.add_ammo_type(AmmoType {
            id: AmmoTypeId::new(id),
            name: id.to_string(),
            default_ammo: Some(ItypeId::new(default)),
        });
    }
    for skill in ["pistol", "rifle", "shotgun", "smg", "melee"] {
        v.skills.insert(SkillId::new(skill));
    }
    v.add_quality(QualityType {
        id: QualityId::new("CUT"),
        name: "cutting".to_string(),
        usages: Vec::new(),
    });
    v
}

/// An empty catalog using [`test_vocab`] and the built-in use-actions.
pub fn test_catalog() -> Catalog {
    let mut catalog = Catalog::new(CatalogOptions::default(), UseActionRegistry::builtin());
    catalog.vocab = test_vocab();
    catalog
}

// ===========================================================================
// Archetype constructors
// ===========================================================================

/// A generic item with the given volume and a 100 g weight.
pub fn generic(id: &str, volume_ml: i64) -> Archetype {
    let mut a = Archetype::new(id);
    a.volume = Volume(volume_ml);
    a.weight = Mass(100);
    a
}

/// A cartridge of `ammo_type`, spawned in stacks of `charges`.
pub fn ammo(id: &str, ammo_type: &str, charges: i32) -> Archetype {
    let mut a = generic(id, 1);
    a.weight = Mass(10);
    a.ammo = Some(AmmoSlot {
        ammo_type: AmmoTypeId::new(ammo_type),
        damage: DamageInstance::single("bullet", 20.0),
        range: 14,
        def_charges: charges,
        ..AmmoSlot::default()
    });
    a
}

/// A detachable box magazine holding `capacity` rounds of `ammo_type`.
pub fn magazine(id: &str, ammo_type: &str, capacity: i32) -> Archetype {
    let mut a = generic(id, 150);
    a.magazine = Some(MagazineSlot {
        ammo: [AmmoTypeId::new(ammo_type)].into_iter().collect(),
        ..MagazineSlot::default()
    });
    let mut rounds = BTreeMap::new();
    rounds.insert(AmmoTypeId::new(ammo_type), capacity);
    a.pockets.push(PocketData::legacy_magazine(rounds));
    a
}

/// A gun fed from a magazine well accepting `magazines`.
pub fn magazine_gun(id: &str, skill: &str, ammo_type: &str, magazines: &[&str]) -> Archetype {
    let mut a = generic(id, 500);
    a.weight = Mass(900);
    a.gun = Some(GunSlot {
        skill_used: SkillId::new(skill),
        ammo: [AmmoTypeId::new(ammo_type)].into_iter().collect(),
        ..GunSlot::default()
    });
    a.pockets.push(PocketData::legacy_magazine_well(
        magazines.iter().map(|m| ItypeId::new(*m)),
    ));
    a
}

/// A gun with an internal magazine of `capacity` rounds.
pub fn internal_gun(id: &str, skill: &str, ammo_type: &str, capacity: i32) -> Archetype {
    let mut a = generic(id, 1000);
    a.weight = Mass(2500);
    a.gun = Some(GunSlot {
        skill_used: SkillId::new(skill),
        ammo: [AmmoTypeId::new(ammo_type)].into_iter().collect(),
        ..GunSlot::default()
    });
    let mut rounds = BTreeMap::new();
    rounds.insert(AmmoTypeId::new(ammo_type), capacity);
    a.pockets.push(PocketData::legacy_magazine(rounds));
    a
}
