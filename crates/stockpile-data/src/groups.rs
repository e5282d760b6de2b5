//! `item_group` records.

use serde::Deserialize;
use serde_json::Value;
use stockpile_core::item_group::{GroupEntry, GroupKind, ItemGroup};

use crate::reader::RecordReader;

/// Weight or percent used when an entry gives none.
pub const DEFAULT_PROBABILITY: i32 = 100;

#[derive(Deserialize)]
#[serde(untagged)]
enum RangeDef {
    One(i32),
    Two(i32, i32),
}

/// A count given as `n` or `[min, max]`.
fn range(r: &mut RecordReader<'_>, key: &str) -> Option<(i32, i32)> {
    Some(match r.get::<RangeDef>(key)? {
        RangeDef::One(n) => (n, n),
        RangeDef::Two(a, b) => (a.min(b), a.max(b)),
    })
}

/// `{"item": id}` or `{"group": id}` with optional prob, count, charges and
/// variant.
fn entry_object(r: &mut RecordReader<'_>) -> Option<GroupEntry> {
    let prob = r.get::<i32>("prob").unwrap_or(DEFAULT_PROBABILITY);
    let mut entry = if let Some(item) = r.string("item") {
        GroupEntry::item(item, prob)
    } else if let Some(group) = r.string("group") {
        GroupEntry::group(group, prob)
    } else {
        r.record_problem("group entry needs an 'item' or a 'group'");
        return None;
    };
    if let Some(count) = range(r, "count") {
        entry.count = count;
    }
    entry.charges = range(r, "charges");
    entry.variant = r.string("variant");
    Some(entry)
}

/// One element of `items`/`groups`/`entries`: an id, `[id, prob]` or an
/// entry object. `group_list` decides what a bare id refers to.
fn entry<'a>(
    r: &mut RecordReader<'a>,
    key: &str,
    index: usize,
    value: &'a Value,
    group_list: bool,
) -> Option<GroupEntry> {
    let bare = |id: &str, prob: i32| {
        if group_list {
            GroupEntry::group(id, prob)
        } else {
            GroupEntry::item(id, prob)
        }
    };
    match value {
        Value::String(id) => Some(bare(id, DEFAULT_PROBABILITY)),
        Value::Array(pair) => match (pair.first().and_then(Value::as_str), pair.get(1).and_then(Value::as_i64)) {
            (Some(id), Some(prob)) if pair.len() == 2 => match i32::try_from(prob) {
                Ok(prob) => Some(bare(id, prob)),
                Err(_) => {
                    r.problem(key, format!("entry {index} probability {prob} is out of range"));
                    None
                }
            },
            _ => {
                r.problem(key, format!("entry {index} is not [id, probability]"));
                None
            }
        },
        Value::Object(obj) => {
            let mut child = r.child(obj, &format!("{key}[{index}]"));
            let entry = entry_object(&mut child);
            r.absorb(child);
            entry
        }
        other => {
            r.problem(key, format!("entry {index} has unexpected shape {other}"));
            None
        }
    }
}

fn entries(r: &mut RecordReader<'_>, key: &str, group_list: bool, out: &mut Vec<GroupEntry>) {
    let Some(value) = r.value(key) else {
        return;
    };
    let Value::Array(items) = value else {
        r.problem(key, "expected a list");
        return;
    };
    for (i, item) in items.iter().enumerate() {
        if let Some(e) = entry(r, key, i, item, group_list) {
            out.push(e);
        }
    }
}

/// Read an item group. Returns `None` when the record has no id.
pub fn load_group(r: &mut RecordReader<'_>) -> Option<ItemGroup> {
    let Some(id) = r.string("id") else {
        r.record_problem("item group has no 'id'");
        return None;
    };
    let kind = match r.string("subtype").as_deref() {
        None | Some("distribution") | Some("old") => GroupKind::Distribution,
        Some("collection") => GroupKind::Collection,
        Some(other) => {
            r.problem("subtype", format!("unknown subtype '{other}'"));
            GroupKind::Distribution
        }
    };
    let mut group = ItemGroup::new(id, kind);
    entries(r, "items", false, &mut group.entries);
    entries(r, "entries", false, &mut group.entries);
    entries(r, "groups", true, &mut group.entries);
    r.read("ammo", &mut group.with_ammo);
    r.read("magazine", &mut group.with_magazine);
    Some(group)
}

// ===========================================================================
// Tests
// ===========================================================================
