//! Records that reference item ids from outside the item catalog: recipes
//! and vehicle prototypes. Only the members that name items are read.

use serde::Deserialize;
use stockpile_core::dependents::{ItemRequirement, Recipe, VehicleItemSpawn, VehiclePrototype};
use stockpile_core::id::*;

use crate::reader::RecordReader;

#[derive(Deserialize)]
#[serde(untagged)]
enum RequirementDef {
    Bare(String),
    Counted(String, i32),
    Tagged(String, i32, String),
}

impl From<RequirementDef> for ItemRequirement {
    fn from(def: RequirementDef) -> Self {
        match def {
            RequirementDef::Bare(id) => ItemRequirement::new(id, 1),
            RequirementDef::Counted(id, n) | RequirementDef::Tagged(id, n, _) => {
                ItemRequirement::new(id, n)
            }
        }
    }
}

/// `[[alternative, ...], ...]`: every inner list is one requirement that
/// any of its alternatives satisfies.
fn requirement_groups(r: &mut RecordReader<'_>, key: &str) -> Option<Vec<Vec<ItemRequirement>>> {
    let groups: Vec<Vec<RequirementDef>> = r.get(key)?;
    Some(
        groups
            .into_iter()
            .map(|alts| alts.into_iter().map(ItemRequirement::from).collect())
            .collect(),
    )
}

#[derive(Deserialize)]
struct QualityDef {
    id: QualityId,
    #[serde(default = "one")]
    level: i32,
}

fn one() -> i32 {
    1
}

/// Read a recipe. The id is `id` if given, otherwise the result id with an
/// optional `_<id_suffix>`.
pub fn load_recipe(r: &mut RecordReader<'_>) -> Option<Recipe> {
    let Some(result) = r.string("result") else {
        r.record_problem("recipe has no 'result'");
        return None;
    };
    let id = match (r.string("id"), r.string("id_suffix")) {
        (Some(id), _) => id,
        (None, Some(suffix)) => format!("{result}_{suffix}"),
        (None, None) => result.clone(),
    };
    let mut recipe = Recipe::new(id, result);
    r.read("result_mult", &mut recipe.result_count);
    if let Some(byproducts) = r.get::<Vec<RequirementDef>>("byproducts") {
        recipe.byproducts = byproducts.into_iter().map(ItemRequirement::from).collect();
    }
    if let Some(components) = requirement_groups(r, "components") {
        recipe.requirements.components = components;
    }
    if let Some(tools) = requirement_groups(r, "tools") {
        recipe.requirements.tools = tools;
    }
    if let Some(qualities) = r.get::<Vec<QualityDef>>("qualities") {
        recipe.requirements.qualities = qualities.into_iter().map(|q| (q.id, q.level)).collect();
    }
    Some(recipe)
}

#[derive(Deserialize)]
struct SpawnDef {
    #[serde(default = "certain")]
    chance: i32,
    #[serde(default)]
    items: OneOrMany,
    item: Option<String>,
    #[serde(default)]
    groups: OneOrMany,
    group: Option<String>,
}

fn certain() -> i32 {
    100
}

#[derive(Deserialize, Default)]
#[serde(untagged)]
enum OneOrMany {
    #[default]
    None,
    One(String),
    Many(Vec<String>),
}

impl OneOrMany {
    fn into_vec(self, extra: Option<String>) -> Vec<String> {
        let mut out = match self {
            OneOrMany::None => Vec::new(),
            OneOrMany::One(s) => vec![s],
            OneOrMany::Many(v) => v,
        };
        out.extend(extra);
        out
    }
}

/// Read the item spawns of a vehicle prototype.
pub fn load_vehicle(r: &mut RecordReader<'_>) -> Option<VehiclePrototype> {
    let Some(id) = r.string("id") else {
        r.record_problem("vehicle has no 'id'");
        return None;
    };
    let spawns = r.get::<Vec<SpawnDef>>("items").unwrap_or_default();
    Some(VehiclePrototype {
        id: VehicleId::new(id),
        item_spawns: spawns
            .into_iter()
            .map(|s| VehicleItemSpawn {
                chance: s.chance,
                items: s.items.into_vec(s.item).into_iter().map(ItypeId::new).collect(),
                groups: s.groups.into_vec(s.group).into_iter().map(GroupId::new).collect(),
            })
            .collect(),
    })
}

// ===========================================================================
// Tests
// ===========================================================================
