//! Pocket declarations and the legacy ammo-field compatibility layer.

use serde_json::Value;
use std::collections::BTreeMap;
use stockpile_core::archetype::Archetype;
use stockpile_core::id::*;
use stockpile_core::pocket::{PocketData, PocketType};

use crate::reader::RecordReader;

/// Parse one `pocket_data` entry.
pub fn load_pocket(r: &mut RecordReader<'_>) -> PocketData {
    let pocket_type = match r.string("pocket_type") {
        Some(name) => PocketType::from_str_opt(&name).unwrap_or_else(|| {
            r.problem("pocket_type", format!("unknown pocket type '{name}'"));
            PocketType::Container
        }),
        None => PocketType::Container,
    };
    let mut pocket = PocketData::new(pocket_type);
    if let Some(ammo) = r.get::<BTreeMap<String, i32>>("ammo_restriction") {
        pocket.ammo_restriction = ammo
            .into_iter()
            .map(|(k, v)| (AmmoTypeId::new(k), v))
            .collect();
    }
    if let Some(items) = r.string_list("item_restriction") {
        if pocket_type == PocketType::MagazineWell {
            pocket.default_magazine = items.first().map(ItypeId::new);
        }
        pocket.item_restriction = items.into_iter().map(ItypeId::new).collect();
    }
    r.read_opt("default_magazine", &mut pocket.default_magazine);
    if let Some(flags) = r.string_list("flag_restriction") {
        pocket.flag_restriction = flags.into_iter().map(FlagId::new).collect();
    }
    pocket.max_contains_volume = r.volume("max_contains_volume");
    pocket.max_contains_weight = r.mass("max_contains_weight");
    pocket.max_item_length = r.length("max_item_length");
    r.read("rigid", &mut pocket.rigid);
    r.read("watertight", &mut pocket.watertight);
    r.read("airtight", &mut pocket.airtight);
    r.read("spoil_multiplier", &mut pocket.spoil_multiplier);
    r.read("moves", &mut pocket.moves);
    pocket
}

/// Parse a `pocket_data` list. Returns `None` if the member is absent.
pub fn load_pockets(r: &mut RecordReader<'_>) -> Option<Vec<PocketData>> {
    let items = match r.value("pocket_data")? {
        Value::Array(items) => items,
        other => {
            r.problem("pocket_data", format!("expected a list, found {other}"));
            return None;
        }
    };
    let mut out = Vec::with_capacity(items.len());
    for (i, item) in items.iter().enumerate() {
        let Value::Object(obj) = item else {
            r.problem("pocket_data", format!("entry {i} is not an object"));
            continue;
        };
        let mut child = r.child(obj, &format!("pocket_data[{i}]"));
        out.push(load_pocket(&mut child));
        r.absorb(child);
    }
    Some(out)
}

fn is_ammo_pocket(p: &PocketData) -> bool {
    matches!(p.pocket_type, PocketType::Magazine | PocketType::MagazineWell)
}

/// Synthesize MAGAZINE / MAGAZINE_WELL pockets from legacy ammo fields.
///
/// `declared_legacy` is whether this record itself set any legacy ammo
/// field; `declared_pockets` whether it set `pocket_data`. Inherited
/// ammo pockets are kept unless the record changed the legacy fields.
pub fn synthesize_legacy_pockets(a: &mut Archetype, declared_legacy: bool, declared_pockets: bool) {
    if declared_pockets {
        if declared_legacy && a.pockets.iter().any(is_ammo_pocket) {
            log::warn!(
                "'{}': legacy ammo fields are redundant with its declared pockets",
                a.id
            );
        }
        return;
    }
    if !declared_legacy && a.pockets.iter().any(is_ammo_pocket) {
        return;
    }
    a.pockets.retain(|p| !is_ammo_pocket(p));

    if !a.magazines.is_empty() {
        let mut mags: Vec<ItypeId> = Vec::new();
        let listed = a
            .magazine_default
            .values()
            .chain(a.magazines.values().flatten());
        for mag in listed {
            if !mags.contains(mag) {
                mags.push(mag.clone());
            }
        }
        a.pockets.push(PocketData::legacy_magazine_well(mags));
        return;
    }

    let (ammo, capacity) = if let Some(gun) = &a.gun {
        let capacity = gun.clip.unwrap_or(if gun.ammo.is_empty() { 0 } else { 1 });
        (gun.ammo.clone(), capacity)
    } else if let Some(tool) = a.tool.as_ref().filter(|t| t.max_charges > 0) {
        (tool.ammo.clone(), tool.max_charges)
    } else if let Some(mag) = &a.magazine {
        (mag.ammo.clone(), mag.capacity)
    } else {
        return;
    };
    if ammo.is_empty() || capacity <= 0 {
        return;
    }
    let restriction = ammo.into_iter().map(|t| (t, capacity)).collect();
    a.pockets.push(PocketData::legacy_magazine(restriction));
}

// ===========================================================================
// Tests
// ===========================================================================
