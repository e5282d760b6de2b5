//! `MIGRATION` and `ITEM_BLACKLIST`/`ITEM_WHITELIST` records.

use serde::Deserialize;
use stockpile_core::id::{FlagId, ItypeId};
use stockpile_core::migration::{MigrationContent, MigrationRecord};

use crate::reader::RecordReader;

#[derive(Deserialize)]
struct ContentDef {
    id: ItypeId,
    #[serde(default = "one")]
    count: i32,
}

fn one() -> i32 {
    1
}

/// Read a migration record. `id` may list several obsolete ids sharing one
/// replacement; each becomes its own record.
pub fn load_migrations(r: &mut RecordReader<'_>) -> Vec<MigrationRecord> {
    let Some(ids) = r.string_list("id") else {
        r.record_problem("migration has no 'id'");
        return Vec::new();
    };
    let Some(replace) = r.string("replace") else {
        r.record_problem("migration has no 'replace'");
        return Vec::new();
    };
    let mut template = MigrationRecord::new(ItypeId::default(), replace.as_str());
    template.from_variant = r.string("from_variant");
    template.variant = r.string("variant");
    if let Some(flags) = r.string_list("flags") {
        template.flags = flags.into_iter().map(FlagId::new).collect();
    }
    template.charges = r.get("charges");
    if let Some(contents) = r.get::<Vec<ContentDef>>("contents") {
        template.contents = contents
            .into_iter()
            .map(|c| MigrationContent {
                id: c.id,
                count: c.count,
            })
            .collect();
    }
    r.read("reset_item_vars", &mut template.reset_item_vars);

    ids.into_iter()
        .map(|from| MigrationRecord {
            from: ItypeId::new(from),
            ..template.clone()
        })
        .collect()
}

/// The `items` of a blacklist or whitelist record.
pub fn load_list(r: &mut RecordReader<'_>) -> Vec<ItypeId> {
    match r.string_list("items") {
        Some(items) => items.into_iter().map(ItypeId::new).collect(),
        None => {
            r.record_problem("list has no 'items'");
            Vec::new()
        }
    }
}

// ===========================================================================
// Tests
// ===========================================================================
