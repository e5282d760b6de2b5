//! Vocabulary records: materials, flags, qualities, ammo types and the
//! id-only registries the finalizer and checker consult.

use serde_json::Value;
use stockpile_core::id::*;
use stockpile_core::vocab::{AmmoType, MaterialType, QualityType, VitaminKind, VitaminType, Vocabulary};

use crate::reader::RecordReader;

pub const VOCAB_TYPES: &[&str] = &[
    "material",
    "json_flag",
    "tool_quality",
    "ammunition_type",
    "skill",
    "vitamin",
    "effect_type",
    "disease_type",
    "martial_art",
    "technique",
    "ITEM_CATEGORY",
    "fault",
    "construction",
    "blueprint",
];

pub fn is_vocab_type(kind: &str) -> bool {
    VOCAB_TYPES.contains(&kind)
}

/// A display name given as a string or `{"str": ..}`.
fn display_name(r: &mut RecordReader<'_>) -> String {
    match r.value("name") {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Object(obj)) => obj
            .get("str")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string(),
        Some(other) => {
            r.problem("name", format!("expected a string or name object, found {other}"));
            String::new()
        }
        None => String::new(),
    }
}

/// Add one vocabulary record of type `kind`.
pub fn load_vocab(vocab: &mut Vocabulary, kind: &str, r: &mut RecordReader<'_>) {
    let Some(id) = r.string("id") else {
        r.record_problem(format!("{kind} record has no 'id'"));
        return;
    };
    match kind {
        "material" => {
            let mut material = MaterialType {
                id: MaterialId::new(id.as_str()),
                name: display_name(r),
                density: 1.0,
                ..MaterialType::default()
            };
            r.read("edible", &mut material.edible);
            if let Some(vits) = r.get::<Vec<(VitaminId, f32)>>("vitamins") {
                material.vitamins = vits.into_iter().collect();
            }
            r.read_opt("repaired_with", &mut material.repaired_with);
            r.read("density", &mut material.density);
            vocab.add_material(material);
        }
        "json_flag" => {
            vocab.flags.insert(FlagId::new(id));
        }
        "tool_quality" => {
            let mut quality = QualityType {
                id: QualityId::new(id.as_str()),
                name: display_name(r),
                ..QualityType::default()
            };
            r.read("usages", &mut quality.usages);
            vocab.add_quality(quality);
        }
        "ammunition_type" => {
            let mut ammo = AmmoType {
                id: AmmoTypeId::new(id.as_str()),
                name: display_name(r),
                default_ammo: None,
            };
            r.read_opt("default", &mut ammo.default_ammo);
            vocab.add_ammo_type(ammo);
        }
        "vitamin" => {
            let kind = match r.string("vit_type") {
                None => VitaminKind::default(),
                Some(name) => VitaminKind::from_str_opt(&name).unwrap_or_else(|| {
                    r.problem("vit_type", format!("unknown vitamin type '{name}'"));
                    VitaminKind::default()
                }),
            };
            vocab.add_vitamin(VitaminType {
                id: VitaminId::new(id),
                kind,
            });
        }
        "skill" => {
            vocab.skills.insert(SkillId::new(id));
        }
        "effect_type" | "disease_type" => {
            vocab.diseases.insert(DiseaseId::new(id));
        }
        "martial_art" => {
            vocab.martial_arts.insert(MartialArtId::new(id));
        }
        "technique" => {
            vocab.techniques.insert(TechniqueId::new(id));
        }
        "ITEM_CATEGORY" => {
            vocab.categories.insert(CategoryId::new(id));
        }
        "fault" => {
            vocab.faults.insert(FaultId::new(id));
        }
        "construction" | "blueprint" => {
            vocab.blueprints.insert(id);
        }
        _ => log::debug!("'{id}': {kind} is not a vocabulary type"),
    }
}

// ===========================================================================
// Tests
// ===========================================================================
