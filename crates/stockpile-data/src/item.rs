//! Item records.
//!
//! Loading one record:
//!
//! 1. Resolve `copy-from` against the template table, then the abstract
//!    table. A base that is not loaded yet defers the record.
//! 2. Read common fields, then the slots the record's type declares.
//! 3. Apply `relative`/`proportional` numeric patches and `extend`/`delete`
//!    list verbs on top of the inherited values.
//! 4. Synthesize ammo pockets from legacy fields when needed.
//! 5. Insert into the abstract or the template table.
//!
//! Every field problem in the record is collected and returned together.

use serde::Deserialize;
use serde_json::{Map, Value};
use stockpile_core::archetype::{Archetype, ConditionKind, ConditionalName, ItemName};
use stockpile_core::catalog::Catalog;
use stockpile_core::id::*;
use stockpile_core::store::DefinitionStore;
use stockpile_core::units::Length;
use stockpile_core::use_action::{UseActionRegistry, UseFunction};

use crate::loader::LoadError;
use crate::pockets::{load_pockets, synthesize_legacy_pockets};
use crate::reader::RecordReader;
use crate::slots::*;

/// Record types that define an item archetype.
pub const ITEM_TYPES: &[&str] = &[
    "GENERIC",
    "AMMO",
    "GUN",
    "GUNMOD",
    "TOOLMOD",
    "ARMOR",
    "TOOL",
    "TOOL_ARMOR",
    "COMESTIBLE",
    "MAGAZINE",
    "BIONIC_ITEM",
    "BOOK",
    "ITEM",
];

/// Presentation members with no counterpart in the archetype.
const COSMETIC_KEYS: &[&str] = &["symbol", "color", "ascii_picture", "snippet_category"];

pub fn is_item_type(kind: &str) -> bool {
    ITEM_TYPES.contains(&kind)
}

// ===========================================================================
// Entry point
// ===========================================================================

/// Load one item record of type `kind` into the catalog.
///
/// Returns [`LoadError::Deferred`] if the `copy-from` base is not loaded
/// yet; the caller queues the record and retries it later.
pub fn load_item(
    catalog: &mut Catalog,
    kind: &str,
    record: &Map<String, Value>,
    src: &ContentSource,
) -> Result<(), LoadError> {
    let (id, is_abstract) = match (record.get("abstract"), record.get("id")) {
        (Some(Value::String(name)), _) => (ItypeId::new(name.as_str()), true),
        (None, Some(Value::String(id))) => (ItypeId::new(id.as_str()), false),
        _ => {
            return Err(LoadError::record(
                "<unnamed>",
                src.as_str(),
                vec!["record needs a string 'id' or 'abstract'".to_string()],
            ));
        }
    };

    let base = match record.get("copy-from") {
        None => None,
        Some(Value::String(b)) => Some(ItypeId::new(b.as_str())),
        Some(other) => {
            return Err(LoadError::record(
                id.as_str(),
                src.as_str(),
                vec![format!("field 'copy-from': expected a string, found {other}")],
            ));
        }
    };

    let mut a = match &base {
        Some(base_id) => inherit(catalog.store(), base_id, &id).ok_or_else(|| {
            LoadError::Deferred {
                id: id.to_string(),
                base: base_id.to_string(),
            }
        })?,
        None => Archetype::new(id.clone()),
    };

    let mut r = RecordReader::new(record);
    r.mark("id");
    r.mark("abstract");
    r.mark("copy-from");
    for key in COSMETIC_KEYS {
        r.mark(key);
    }

    if catalog.options.strict && base.as_ref() != Some(&id) {
        let store = catalog.store();
        let existing = if is_abstract {
            store.lookup_abstract(&id)
        } else {
            store.lookup(&id).ok()
        };
        if existing.is_some_and(|e| e.src.last() == Some(src)) {
            r.record_problem(format!("'{id}' is already defined by '{src}'"));
        }
    }
    if a.src.last() != Some(src) {
        a.src.push(src.clone());
    }

    let charge_counted = matches!(kind, "AMMO" | "COMESTIBLE")
        || (kind == "ITEM" && (r.has("ammo_data") || r.has("comestible_data")));
    load_common(&mut r, &mut a, charge_counted, &catalog.actions);
    let mut declared_legacy = load_slots(&mut r, &mut a, kind);
    apply_relative(&mut r, &mut a);
    apply_proportional(&mut r, &mut a);
    declared_legacy |= apply_extend(&mut r, &mut a, &catalog.actions);
    declared_legacy |= apply_delete(&mut r, &mut a);

    let declared_pockets = match load_pockets(&mut r) {
        Some(pockets) => {
            a.pockets = pockets;
            true
        }
        None => false,
    };
    synthesize_legacy_pockets(&mut a, declared_legacy, declared_pockets);

    let problems = r.finish(id.as_str(), catalog.options.strict);
    if !problems.is_empty() {
        return Err(LoadError::record(id.as_str(), src.as_str(), problems));
    }

    if is_abstract {
        catalog.store_mut().insert_abstract(a)?;
    } else {
        catalog.insert(a)?;
    }
    Ok(())
}

/// Clone `base` as the starting point for `id`. A first-level child of an
/// abstract looks like its base unless told otherwise.
fn inherit(store: &DefinitionStore, base: &ItypeId, id: &ItypeId) -> Option<Archetype> {
    if let Ok(template) = store.lookup(base) {
        let mut a = template.clone();
        a.id = id.clone();
        return Some(a);
    }
    let abstract_base = store.lookup_abstract(base)?;
    let mut a = abstract_base.clone();
    a.id = id.clone();
    if a.looks_like.is_none() {
        a.looks_like = Some(base.clone());
    }
    Some(a)
}

// ===========================================================================
// Common fields
// ===========================================================================

fn default_name(singular: &str, charge_counted: bool) -> ItemName {
    if charge_counted {
        ItemName::new(singular, singular)
    } else {
        ItemName::new(singular, &format!("{singular}s"))
    }
}

/// `"name"`, `{"str": .., "str_pl": ..}` or `{"str_sp": ..}`.
fn name_from_value(v: &Value, charge_counted: bool) -> Result<ItemName, String> {
    match v {
        Value::String(s) => Ok(default_name(s, charge_counted)),
        Value::Object(obj) => {
            if let Some(same) = obj.get("str_sp").and_then(Value::as_str) {
                return Ok(ItemName::new(same, same));
            }
            let singular = obj
                .get("str")
                .and_then(Value::as_str)
                .ok_or("name object has no 'str'")?;
            Ok(match obj.get("str_pl").and_then(Value::as_str) {
                Some(plural) => ItemName::new(singular, plural),
                None => default_name(singular, charge_counted),
            })
        }
        other => Err(format!("expected a string or name object, found {other}")),
    }
}

/// `"steel"`, `["steel", "wood"]` or `[{"type": "steel", "portion": 3}]`.
fn materials(r: &mut RecordReader<'_>) -> Option<Vec<(MaterialId, i32)>> {
    let v = r.value("material")?;
    let items: Vec<&Value> = match v {
        Value::Array(items) => items.iter().collect(),
        single => vec![single],
    };
    let mut out = Vec::with_capacity(items.len());
    for item in items {
        match item {
            Value::String(m) => out.push((MaterialId::new(m.as_str()), 1)),
            Value::Object(obj) => {
                let Some(m) = obj.get("type").and_then(Value::as_str) else {
                    r.problem("material", "material entry has no 'type'");
                    continue;
                };
                let portion = match obj.get("portion") {
                    None => 1,
                    Some(p) => match p.as_i64().map(i32::try_from) {
                        Some(Ok(p)) => p,
                        Some(Err(_)) => {
                            r.problem("material", format!("portion of '{m}' is out of range"));
                            continue;
                        }
                        None => {
                            r.problem("material", format!("portion of '{m}' is not an integer"));
                            continue;
                        }
                    },
                };
                out.push((MaterialId::new(m), portion));
            }
            other => r.problem("material", format!("unexpected entry {other}")),
        }
    }
    Some(out)
}

#[derive(Deserialize)]
struct ConditionalNameDef {
    #[serde(rename = "type")]
    kind: String,
    condition: String,
    value: Option<String>,
    name: Value,
}

fn conditional_names(r: &mut RecordReader<'_>, charge_counted: bool) -> Option<Vec<ConditionalName>> {
    let defs: Vec<ConditionalNameDef> = r.get("conditional_names")?;
    let mut out = Vec::with_capacity(defs.len());
    for def in defs {
        let kind = match def.kind.as_str() {
            "FLAG" => ConditionKind::Flag,
            "COMPONENT_ID" => ConditionKind::ComponentId,
            "VAR" => ConditionKind::Var,
            other => {
                r.problem("conditional_names", format!("unknown condition type '{other}'"));
                continue;
            }
        };
        match name_from_value(&def.name, charge_counted) {
            Ok(name) => out.push(ConditionalName {
                kind,
                condition: def.condition,
                value: def.value,
                name,
            }),
            Err(e) => r.problem("conditional_names", e),
        }
    }
    Some(out)
}

fn parse_use_action(
    v: &Value,
    actions: &UseActionRegistry,
) -> Result<(String, UseFunction), String> {
    match v {
        Value::String(name) => actions
            .create_default(name)
            .map(|f| (name.clone(), f))
            .map_err(|e| e.to_string()),
        Value::Object(obj) => {
            let name = obj
                .get("type")
                .and_then(Value::as_str)
                .ok_or("use action object has no 'type'")?;
            let mut params = obj.clone();
            params.remove("type");
            let scale = match params.remove("ammo_scale") {
                None => None,
                Some(s) => Some(s.as_f64().ok_or("'ammo_scale' is not a number")? as f32),
            };
            let mut f = actions
                .parse(name, Value::Object(params))
                .map_err(|e| e.to_string())?;
            if let Some(scale) = scale {
                f.ammo_scale = scale;
            }
            Ok((name.to_string(), f))
        }
        other => Err(format!("expected a string or object, found {other}")),
    }
}

/// A single use action or a list of them.
fn use_actions(
    r: &mut RecordReader<'_>,
    actions: &UseActionRegistry,
) -> Option<Vec<(String, UseFunction)>> {
    let v = r.value("use_action")?;
    let entries: Vec<&Value> = match v {
        Value::Array(items) => items.iter().collect(),
        single => vec![single],
    };
    let mut out = Vec::with_capacity(entries.len());
    for entry in entries {
        match parse_use_action(entry, actions) {
            Ok(f) => out.push(f),
            Err(e) => r.problem("use_action", e),
        }
    }
    Some(out)
}

fn variants(r: &mut RecordReader<'_>) -> Option<Vec<String>> {
    let items: Vec<Value> = r.get("variants")?;
    let mut out = Vec::with_capacity(items.len());
    for item in items {
        match &item {
            Value::String(s) => out.push(s.clone()),
            Value::Object(obj) => match obj.get("id").and_then(Value::as_str) {
                Some(id) => out.push(id.to_string()),
                None => r.problem("variants", "variant has no 'id'"),
            },
            other => r.problem("variants", format!("unexpected entry {other}")),
        }
    }
    Some(out)
}

fn load_common(
    r: &mut RecordReader<'_>,
    a: &mut Archetype,
    charge_counted: bool,
    actions: &UseActionRegistry,
) {
    if let Some(v) = r.value("name") {
        match name_from_value(v, charge_counted) {
            Ok(name) => a.name = name,
            Err(e) => r.problem("name", e),
        }
    }
    r.read("description", &mut a.description);
    if let Some(m) = r.mass("weight") {
        a.weight = m;
    }
    if let Some(v) = r.volume("volume") {
        a.volume = v;
    }
    if let Some(l) = r.length("longest_side") {
        a.longest_side = Some(l);
    }
    if let Some(v) = r.volume("integral_volume") {
        a.integral_volume = Some(v);
    }
    if let Some(m) = r.mass("integral_weight") {
        a.integral_weight = Some(m);
    }
    r.read("price", &mut a.price);
    r.read_opt("price_postapoc", &mut a.price_post);
    r.read("stack_size", &mut a.stack_size);
    r.read_opt("category", &mut a.category_force);
    r.read_opt("looks_like", &mut a.looks_like);
    r.read("to_hit", &mut a.to_hit);
    if let Some((min, max)) = r.get::<(i32, i32)>("damage_states") {
        a.damage_min = min;
        a.damage_max = max;
    }
    if let Some(v) = variants(r) {
        a.variants = v;
    }
    if let Some(flags) = r.string_list("flags") {
        a.flags = flags.into_iter().map(FlagId::new).collect();
    }
    if let Some(m) = materials(r) {
        a.set_materials(m);
    }
    if let Some(bash) = r.get::<f32>("bashing") {
        a.melee.insert("bash".to_string(), bash);
    }
    if let Some(cut) = r.get::<f32>("cutting") {
        a.melee.insert("cut".to_string(), cut);
    }
    if let Some(melee) = r.get("melee_damage") {
        a.melee = melee;
    }
    if let Some(d) = damage(r, "thrown_damage", "bash") {
        a.thrown_damage = d;
    }
    if let Some(q) = r.get::<Vec<(QualityId, i32)>>("qualities") {
        a.qualities = q.into_iter().collect();
    }
    if let Some(q) = r.get::<Vec<(QualityId, i32)>>("charged_qualities") {
        a.charged_qualities = q.into_iter().collect();
    }
    if let Some(t) = r.string_list("techniques") {
        a.techniques = t.into_iter().map(TechniqueId::new).collect();
    }
    if let Some(f) = r.string_list("faults") {
        a.faults = f.into_iter().map(FaultId::new).collect();
    }
    r.read_opt("container", &mut a.default_container);
    if let Some(uses) = use_actions(r, actions) {
        a.use_methods = uses.into_iter().collect();
    }
    if let Some(names) = conditional_names(r, charge_counted) {
        a.conditional_names = names;
    }
}

// ===========================================================================
// Slots
// ===========================================================================

fn with_slot<T: Default>(slot: &mut Option<T>, load: impl FnOnce(&mut T)) {
    let mut s = slot.take().unwrap_or_default();
    load(&mut s);
    *slot = Some(s);
}

fn declares_any(r: &RecordReader<'_>, keys: &[&str]) -> bool {
    keys.iter().any(|k| r.has(k))
}

const GUN_LEGACY: &[&str] = &["ammo", "clip_size"];
const TOOL_LEGACY: &[&str] = &["ammo", "max_charges"];
const MAGAZINE_LEGACY: &[&str] = &["ammo_type", "capacity"];

/// Read the slots `kind` declares. Returns whether any legacy ammo field
/// was set, which decides pocket synthesis.
fn load_slots(r: &mut RecordReader<'_>, a: &mut Archetype, kind: &str) -> bool {
    let mut legacy = false;
    if r.has("magazines") {
        legacy = true;
        if let Some(declared) = declared_magazines(r, "magazines") {
            a.magazines.clear();
            a.magazine_default.clear();
            for (ammo, mags) in declared {
                if let Some(first) = mags.first() {
                    a.magazine_default.insert(ammo.clone(), first.clone());
                }
                a.magazines.insert(ammo, mags.into_iter().collect());
            }
        }
    }
    match kind {
        "ITEM" => legacy |= load_data_slots(r, a),
        "AMMO" => with_slot(&mut a.ammo, |s| load_ammo(r, s)),
        "GUN" => {
            legacy |= declares_any(r, GUN_LEGACY);
            with_slot(&mut a.gun, |s| load_gun(r, s));
        }
        "GUNMOD" => {
            with_slot(&mut a.gunmod, |s| load_gunmod(r, s));
            with_slot(&mut a.mod_slot, |s| load_mod(r, s));
        }
        "TOOLMOD" => with_slot(&mut a.mod_slot, |s| load_mod(r, s)),
        "ARMOR" => with_slot(&mut a.armor, |s| load_armor(r, s, &a.materials)),
        "TOOL" => {
            legacy |= declares_any(r, TOOL_LEGACY);
            with_slot(&mut a.tool, |s| load_tool(r, s));
        }
        "TOOL_ARMOR" => {
            legacy |= declares_any(r, TOOL_LEGACY);
            with_slot(&mut a.tool, |s| load_tool(r, s));
            with_slot(&mut a.armor, |s| load_armor(r, s, &a.materials));
        }
        "COMESTIBLE" => with_slot(&mut a.comestible, |s| load_comestible(r, s)),
        "MAGAZINE" => {
            legacy |= declares_any(r, MAGAZINE_LEGACY);
            with_slot(&mut a.magazine, |s| load_magazine(r, s));
        }
        "BIONIC_ITEM" => with_slot(&mut a.bionic, |s| load_bionic(r, s, &a.id)),
        "BOOK" => with_slot(&mut a.book, |s| load_book(r, s)),
        _ => {}
    }
    legacy
}

/// Slots of a unified `ITEM` record, one `*_data` object each.
fn load_data_slots(r: &mut RecordReader<'_>, a: &mut Archetype) -> bool {
    let mut legacy = false;
    if let Some(mut sub) = r.nested("ammo_data") {
        with_slot(&mut a.ammo, |s| load_ammo(&mut sub, s));
        r.absorb(sub);
    }
    if let Some(mut sub) = r.nested("gun_data") {
        legacy |= declares_any(&sub, GUN_LEGACY);
        with_slot(&mut a.gun, |s| load_gun(&mut sub, s));
        r.absorb(sub);
    }
    if let Some(mut sub) = r.nested("gunmod_data") {
        with_slot(&mut a.gunmod, |s| load_gunmod(&mut sub, s));
        a.mod_slot.get_or_insert_with(Default::default);
        r.absorb(sub);
    }
    if let Some(mut sub) = r.nested("mod_data") {
        with_slot(&mut a.mod_slot, |s| load_mod(&mut sub, s));
        r.absorb(sub);
    }
    if let Some(mut sub) = r.nested("armor_data") {
        with_slot(&mut a.armor, |s| load_armor(&mut sub, s, &a.materials));
        r.absorb(sub);
    }
    if let Some(mut sub) = r.nested("tool_data") {
        legacy |= declares_any(&sub, TOOL_LEGACY);
        with_slot(&mut a.tool, |s| load_tool(&mut sub, s));
        r.absorb(sub);
    }
    if let Some(mut sub) = r.nested("comestible_data") {
        with_slot(&mut a.comestible, |s| load_comestible(&mut sub, s));
        r.absorb(sub);
    }
    if let Some(mut sub) = r.nested("magazine_data") {
        legacy |= declares_any(&sub, MAGAZINE_LEGACY);
        with_slot(&mut a.magazine, |s| load_magazine(&mut sub, s));
        r.absorb(sub);
    }
    if let Some(mut sub) = r.nested("bionic_data") {
        with_slot(&mut a.bionic, |s| load_bionic(&mut sub, s, &a.id));
        r.absorb(sub);
    }
    if let Some(mut sub) = r.nested("book_data") {
        with_slot(&mut a.book, |s| load_book(&mut sub, s));
        r.absorb(sub);
    }
    legacy
}

// ===========================================================================
// Patch verbs
// ===========================================================================

fn round(v: f64) -> i32 {
    v.round() as i32
}

/// `relative`: add to inherited numeric values.
fn apply_relative(r: &mut RecordReader<'_>, a: &mut Archetype) {
    let Some(mut rel) = r.nested("relative") else {
        return;
    };
    if let Some(m) = rel.mass("weight") {
        a.weight += m;
    }
    if let Some(v) = rel.volume("volume") {
        a.volume += v;
    }
    if let Some(l) = rel.length("longest_side") {
        let current = a
            .longest_side
            .unwrap_or_else(|| Length::default_from_volume(a.volume));
        a.longest_side = Some(current + l);
    }
    if let Some(d) = rel.get::<i64>("price") {
        a.price += d;
    }
    if let Some(d) = rel.get::<i64>("price_postapoc") {
        a.price_post = Some(a.price_post.unwrap_or(a.price) + d);
    }
    if let Some(d) = rel.get::<i32>("stack_size") {
        a.stack_size += d;
    }
    if let Some(d) = rel.get::<i32>("to_hit") {
        a.to_hit += d;
    }
    for (key, damage_type) in [("bashing", "bash"), ("cutting", "cut")] {
        if let Some(d) = rel.get::<f32>(key) {
            *a.melee.entry(damage_type.to_string()).or_insert(0.0) += d;
        }
    }
    if let Some(gun) = a.gun.as_mut() {
        if let Some(d) = rel.get::<i32>("range") {
            gun.range += d;
        }
        if let Some(d) = rel.get::<i32>("dispersion") {
            gun.dispersion += d;
        }
    }
    if let Some(ammo) = a.ammo.as_mut() {
        if let Some(d) = rel.get::<f32>("damage") {
            match ammo.damage.units.first_mut() {
                Some(unit) => unit.amount += d,
                None => ammo.damage.add("bullet", d, 0.0),
            }
        }
        if let Some(d) = rel.get::<i32>("range") {
            ammo.range += d;
        }
    }
    if let Some(tool) = a.tool.as_mut() {
        if let Some(d) = rel.get::<i32>("max_charges") {
            tool.max_charges += d;
        }
    }
    r.absorb(rel);
}

/// `proportional`: multiply inherited numeric values.
fn apply_proportional(r: &mut RecordReader<'_>, a: &mut Archetype) {
    let Some(mut prop) = r.nested("proportional") else {
        return;
    };
    if let Some(f) = prop.get::<f64>("weight") {
        a.weight = a.weight.scaled(f);
    }
    if let Some(f) = prop.get::<f64>("volume") {
        a.volume = a.volume.scaled(f);
    }
    if let Some(f) = prop.get::<f64>("longest_side") {
        let current = a
            .longest_side
            .unwrap_or_else(|| Length::default_from_volume(a.volume));
        a.longest_side = Some(current.scaled(f));
    }
    if let Some(f) = prop.get::<f64>("price") {
        a.price = (a.price as f64 * f).round() as i64;
    }
    if let Some(f) = prop.get::<f64>("price_postapoc") {
        let base = a.price_post.unwrap_or(a.price);
        a.price_post = Some((base as f64 * f).round() as i64);
    }
    if let Some(f) = prop.get::<f64>("stack_size") {
        a.stack_size = round(a.stack_size as f64 * f);
    }
    for (key, damage_type) in [("bashing", "bash"), ("cutting", "cut")] {
        if let Some(f) = prop.get::<f32>(key) {
            if let Some(v) = a.melee.get_mut(damage_type) {
                *v *= f;
            }
        }
    }
    if let Some(gun) = a.gun.as_mut() {
        if let Some(f) = prop.get::<f64>("range") {
            gun.range = round(gun.range as f64 * f);
        }
        if let Some(f) = prop.get::<f64>("dispersion") {
            gun.dispersion = round(gun.dispersion as f64 * f);
        }
    }
    if let Some(ammo) = a.ammo.as_mut() {
        if let Some(f) = prop.get::<f32>("damage") {
            ammo.damage.scale(f);
        }
        if let Some(f) = prop.get::<f64>("range") {
            ammo.range = round(ammo.range as f64 * f);
        }
    }
    if let Some(tool) = a.tool.as_mut() {
        if let Some(f) = prop.get::<f64>("max_charges") {
            tool.max_charges = round(tool.max_charges as f64 * f);
        }
    }
    r.absorb(prop);
}

/// `extend`: add to inherited lists. Returns whether gun ammo changed.
fn apply_extend(r: &mut RecordReader<'_>, a: &mut Archetype, actions: &UseActionRegistry) -> bool {
    let Some(mut ext) = r.nested("extend") else {
        return false;
    };
    let mut ammo_changed = false;
    if let Some(flags) = ext.string_list("flags") {
        a.flags.extend(flags.into_iter().map(FlagId::new));
    }
    if let Some(q) = ext.get::<Vec<(QualityId, i32)>>("qualities") {
        a.qualities.extend(q);
    }
    if let Some(t) = ext.string_list("techniques") {
        a.techniques.extend(t.into_iter().map(TechniqueId::new));
    }
    if let Some(f) = ext.string_list("faults") {
        a.faults.extend(f.into_iter().map(FaultId::new));
    }
    if let Some(ammo) = ext.string_list("ammo") {
        match a.gun.as_mut() {
            Some(gun) => {
                gun.ammo.extend(ammo.into_iter().map(AmmoTypeId::new));
                ammo_changed = true;
            }
            None => ext.problem("ammo", "item has no gun data"),
        }
    }
    if let Some(uses) = use_actions(&mut ext, actions) {
        a.use_methods.extend(uses);
    }
    r.absorb(ext);
    ammo_changed
}

/// Quality ids given as `"CUT"` or `["CUT", 1]`.
fn quality_ids(r: &mut RecordReader<'_>, key: &str) -> Option<Vec<QualityId>> {
    let items: Vec<Value> = r.get(key)?;
    let mut out = Vec::with_capacity(items.len());
    for item in &items {
        let id = match item {
            Value::String(s) => Some(s.as_str()),
            Value::Array(pair) => pair.first().and_then(Value::as_str),
            _ => None,
        };
        match id {
            Some(id) => out.push(QualityId::new(id)),
            None => r.problem(key, format!("unexpected entry {item}")),
        }
    }
    Some(out)
}

/// `delete`: remove from inherited lists. Returns whether gun ammo changed.
fn apply_delete(r: &mut RecordReader<'_>, a: &mut Archetype) -> bool {
    let Some(mut del) = r.nested("delete") else {
        return false;
    };
    let mut ammo_changed = false;
    if let Some(flags) = del.string_list("flags") {
        for f in &flags {
            a.flags.remove(f.as_str());
        }
    }
    if let Some(ids) = quality_ids(&mut del, "qualities") {
        for q in &ids {
            a.qualities.remove(q);
        }
    }
    if let Some(t) = del.string_list("techniques") {
        for id in &t {
            a.techniques.remove(id.as_str());
        }
    }
    if let Some(f) = del.string_list("faults") {
        for id in &f {
            a.faults.remove(id.as_str());
        }
    }
    if let Some(ammo) = del.string_list("ammo") {
        match a.gun.as_mut() {
            Some(gun) => {
                for id in &ammo {
                    gun.ammo.remove(id.as_str());
                }
                ammo_changed = true;
            }
            None => del.problem("ammo", "item has no gun data"),
        }
    }
    if let Some(names) = del.string_list("use_action") {
        for name in &names {
            a.use_methods.remove(name);
        }
    }
    r.absorb(del);
    ammo_changed
}

// ===========================================================================
// Tests
// ===========================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use stockpile_core::pocket::PocketType;
    use stockpile_core::units::{Mass, Volume};

    fn obj(v: Value) -> Map<String, Value> {
        match v {
            Value::Object(m) => m,
            _ => panic!("not an object"),
        }
    }

    fn load(catalog: &mut Catalog, record: Value) -> Result<(), LoadError> {
        let record = obj(record);
        let kind = record["type"].as_str().unwrap().to_string();
        load_item(catalog, &kind, &record, &ContentSource::new("core"))
    }

    // -----------------------------------------------------------------------
    // Names and common fields
    // -----------------------------------------------------------------------

    #[test]
    fn plural_depends_on_kind() {
        let mut c = Catalog::default();
        load(&mut c, json!({"type": "GENERIC", "id": "rock", "name": "rock", "volume": "250 ml"})).unwrap();
        load(&mut c, json!({"type": "AMMO", "id": "9mm", "name": "9mm round", "ammo_type": "9mm"})).unwrap();
        load(&mut c, json!({"type": "GENERIC", "id": "mouse", "name": {"str": "mouse", "str_pl": "mice"}})).unwrap();
        load(&mut c, json!({"type": "GENERIC", "id": "sheep", "name": {"str_sp": "sheep"}})).unwrap();

        assert_eq!(c.lookup(&ItypeId::new("rock")).unwrap().name.plural, "rocks");
        assert_eq!(c.lookup(&ItypeId::new("rock")).unwrap().volume, Volume(250));
        assert_eq!(c.lookup(&ItypeId::new("9mm")).unwrap().name.plural, "9mm round");
        assert_eq!(c.lookup(&ItypeId::new("mouse")).unwrap().name.plural, "mice");
        assert_eq!(c.lookup(&ItypeId::new("sheep")).unwrap().name.plural, "sheep");
    }

    #[test]
    fn structured_materials_accumulate_portions() {
        let mut c = Catalog::default();
        load(
            &mut c,
            json!({"type": "GENERIC", "id": "axe", "material": [
                {"type": "steel", "portion": 3}, {"type": "wood"}
            ]}),
        )
        .unwrap();
        let axe = c.lookup(&ItypeId::new("axe")).unwrap();
        assert_eq!(axe.materials.len(), 2);
        assert_eq!(axe.mat_portion_total, 4);
    }

    #[test]
    fn oversized_material_portion_is_rejected() {
        let mut c = Catalog::default();
        let err = load(
            &mut c,
            json!({"type": "GENERIC", "id": "axe", "material": [
                {"type": "steel", "portion": 5_000_000_000_i64}
            ]}),
        )
        .unwrap_err();
        match err {
            LoadError::Record { problems, .. } => {
                assert!(problems.iter().any(|p| p.contains("out of range")), "{problems:?}");
            }
            other => panic!("unexpected error {other:?}"),
        }
        assert!(!c.has(&ItypeId::new("axe")));
    }

    #[test]
    fn use_actions_in_both_forms() {
        let mut c = Catalog::default();
        load(
            &mut c,
            json!({"type": "TOOL", "id": "flashlight", "use_action": [
                "CROWBAR",
                {"type": "transform", "target": "flashlight_on", "ammo_scale": 0.5}
            ]}),
        )
        .unwrap();
        let a = c.lookup(&ItypeId::new("flashlight")).unwrap();
        assert!(a.can_use("CROWBAR"));
        assert_eq!(a.use_methods["transform"].ammo_scale, 0.5);
    }

    #[test]
    fn every_problem_is_reported() {
        let mut c = Catalog::default();
        let err = load(
            &mut c,
            json!({
                "type": "GENERIC", "id": "bad",
                "weight": "heavy", "price": "lots", "use_action": "FLY"
            }),
        )
        .unwrap_err();
        match err {
            LoadError::Record { id, problems, .. } => {
                assert_eq!(id, "bad");
                assert_eq!(problems.len(), 3);
            }
            other => panic!("unexpected error {other}"),
        }
        assert!(!c.has(&ItypeId::new("bad")));
    }

    // -----------------------------------------------------------------------
    // Inheritance
    // -----------------------------------------------------------------------

    #[test]
    fn copy_from_template_inherits_fields() {
        let mut c = Catalog::default();
        load(&mut c, json!({"type": "GENERIC", "id": "base", "weight": 500, "flags": ["X"]})).unwrap();
        load(&mut c, json!({"type": "GENERIC", "id": "child", "copy-from": "base", "name": "child"})).unwrap();
        let child = c.lookup(&ItypeId::new("child")).unwrap();
        assert_eq!(child.weight, Mass(500));
        assert!(child.has_flag("X"));
        assert_eq!(child.id.as_str(), "child");
        assert_eq!(child.looks_like, None);
    }

    #[test]
    fn abstract_base_sets_looks_like() {
        let mut c = Catalog::default();
        load(&mut c, json!({"type": "GENERIC", "abstract": "tool_base", "weight": 100})).unwrap();
        load(&mut c, json!({"type": "GENERIC", "id": "wrench", "copy-from": "tool_base"})).unwrap();
        assert!(!c.has(&ItypeId::new("tool_base")));
        assert!(c.store().has_abstract(&ItypeId::new("tool_base")));
        let wrench = c.lookup(&ItypeId::new("wrench")).unwrap();
        assert_eq!(wrench.looks_like, Some(ItypeId::new("tool_base")));
        assert_eq!(wrench.weight, Mass(100));
    }

    #[test]
    fn missing_base_defers() {
        let mut c = Catalog::default();
        let err = load(&mut c, json!({"type": "GENERIC", "id": "late", "copy-from": "early"})).unwrap_err();
        assert!(matches!(err, LoadError::Deferred { ref base, .. } if base == "early"));
    }

    #[test]
    fn relative_and_proportional_patches() {
        let mut c = Catalog::default();
        load(
            &mut c,
            json!({"type": "GUN", "id": "rifle", "weight": "3 kg", "price": 1000, "range": 20, "skill": "rifle"}),
        )
        .unwrap();
        load(
            &mut c,
            json!({
                "type": "GUN", "id": "rifle_short", "copy-from": "rifle",
                "relative": {"weight": "-500 g", "range": -4},
                "proportional": {"price": 1.5}
            }),
        )
        .unwrap();
        let a = c.lookup(&ItypeId::new("rifle_short")).unwrap();
        assert_eq!(a.weight, Mass(2500));
        assert_eq!(a.gun.as_ref().unwrap().range, 16);
        assert_eq!(a.price, 1500);
    }

    #[test]
    fn extend_and_delete_lists() {
        let mut c = Catalog::default();
        load(
            &mut c,
            json!({"type": "GENERIC", "id": "knife", "flags": ["A", "B"], "qualities": [["CUT", 1], ["BUTCHER", 5]]}),
        )
        .unwrap();
        load(
            &mut c,
            json!({
                "type": "GENERIC", "id": "knife2", "copy-from": "knife",
                "extend": {"flags": ["C"], "qualities": [["SAW_W", 1]]},
                "delete": {"flags": ["A"], "qualities": ["BUTCHER"]}
            }),
        )
        .unwrap();
        let a = c.lookup(&ItypeId::new("knife2")).unwrap();
        assert!(!a.has_flag("A") && a.has_flag("B") && a.has_flag("C"));
        assert!(a.qualities.contains_key("CUT"));
        assert!(a.qualities.contains_key("SAW_W"));
        assert!(!a.qualities.contains_key("BUTCHER"));
    }

    #[test]
    fn provenance_chain_records_each_source() {
        let mut c = Catalog::default();
        load(&mut c, json!({"type": "GENERIC", "id": "rock"})).unwrap();
        let record = obj(json!({"type": "GENERIC", "id": "rock", "copy-from": "rock", "weight": 9}));
        load_item(&mut c, "GENERIC", &record, &ContentSource::new("mod_a")).unwrap();
        let rock = c.lookup(&ItypeId::new("rock")).unwrap();
        assert_eq!(rock.src, vec![ContentSource::new("core"), ContentSource::new("mod_a")]);
    }

    // -----------------------------------------------------------------------
    // Strict mode
    // -----------------------------------------------------------------------

    #[test]
    fn strict_rejects_same_source_redefinition() {
        let mut c = Catalog::default();
        c.options.strict = true;
        load(&mut c, json!({"type": "GENERIC", "id": "rock"})).unwrap();
        let err = load(&mut c, json!({"type": "GENERIC", "id": "rock"})).unwrap_err();
        assert!(err.to_string().contains("already defined"));
    }

    #[test]
    fn strict_rejects_unknown_members() {
        let mut c = Catalog::default();
        c.options.strict = true;
        let err = load(&mut c, json!({"type": "GENERIC", "id": "rock", "sparkle": 3})).unwrap_err();
        assert!(err.to_string().contains("sparkle"));

        c.options.strict = false;
        load(&mut c, json!({"type": "GENERIC", "id": "rock", "sparkle": 3})).unwrap();
    }

    // -----------------------------------------------------------------------
    // Slots and pockets
    // -----------------------------------------------------------------------

    #[test]
    fn unified_item_slots() {
        let mut c = Catalog::default();
        load(
            &mut c,
            json!({
                "type": "ITEM", "id": "suppressor",
                "gunmod_data": {"location": "muzzle", "mod_targets": ["pistol"], "loudness_modifier": -20},
                "comestible_data": {"calories": 1}
            }),
        )
        .unwrap();
        let a = c.lookup(&ItypeId::new("suppressor")).unwrap();
        assert_eq!(a.gunmod.as_ref().unwrap().location, "muzzle");
        assert!(a.mod_slot.is_some());
        assert!(a.comestible.is_some());
        assert_eq!(a.name.plural, "suppressor");
    }

    #[test]
    fn legacy_gun_gets_magazine_pocket() {
        let mut c = Catalog::default();
        load(
            &mut c,
            json!({"type": "GUN", "id": "pipe_shotgun", "skill": "shotgun", "ammo": ["shotgun_shell"]}),
        )
        .unwrap();
        let a = c.lookup(&ItypeId::new("pipe_shotgun")).unwrap();
        assert_eq!(a.pockets.len(), 1);
        assert_eq!(a.pockets[0].pocket_type, PocketType::Magazine);
        assert_eq!(a.ammo_capacity(&AmmoTypeId::new("shotgun_shell")), 1);
    }

    #[test]
    fn magazines_list_gets_magazine_well() {
        let mut c = Catalog::default();
        load(
            &mut c,
            json!({
                "type": "GUN", "id": "glock_19", "skill": "pistol", "ammo": ["9mm"],
                "magazines": [["9mm", ["glockmag"]]]
            }),
        )
        .unwrap();
        let a = c.lookup(&ItypeId::new("glock_19")).unwrap();
        assert!(a.uses_magazine());
        assert_eq!(a.pockets[0].default_magazine, Some(ItypeId::new("glockmag")));
    }

    #[test]
    fn first_listed_magazine_is_the_default() {
        let mut c = Catalog::default();
        load(
            &mut c,
            json!({
                "type": "GUN", "id": "glock_19", "skill": "pistol", "ammo": ["9mm"],
                "magazines": [["9mm", ["glockmag", "glockbigmag"]]]
            }),
        )
        .unwrap();
        load(
            &mut c,
            json!({
                "type": "GUN", "id": "glock_compact", "copy-from": "glock_19",
                "magazines": [["9mm", ["glocksmallmag", "glockmag"]]]
            }),
        )
        .unwrap();

        let nine = AmmoTypeId::new("9mm");
        let a = c.lookup(&ItypeId::new("glock_19")).unwrap();
        assert_eq!(a.magazine_default[&nine], ItypeId::new("glockmag"));
        assert_eq!(a.pockets[0].default_magazine, Some(ItypeId::new("glockmag")));

        let b = c.lookup(&ItypeId::new("glock_compact")).unwrap();
        assert_eq!(b.magazine_default[&nine], ItypeId::new("glocksmallmag"));
        assert_eq!(b.magazines[&nine].len(), 2);
    }
}
