//! Registries outside the item catalog that reference item ids.
//!
//! Recipes and vehicle prototypes are owned by other subsystems in a full
//! simulation. The blacklist and migration overlay must still prune and
//! rewrite their item references, so minimal forms live here.

use crate::id::{GroupId, ItypeId, QualityId, RecipeId, VehicleId};
use std::collections::{BTreeMap, HashSet};

/// One acceptable item in a requirement alternative.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemRequirement {
    pub item: ItypeId,
    pub count: i32,
}

impl ItemRequirement {
    pub fn new(item: impl Into<ItypeId>, count: i32) -> Self {
        Self {
            item: item.into(),
            count,
        }
    }
}

/// Crafting requirements. Each inner list is a set of alternatives; one of
/// them must be satisfied.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Requirements {
    pub tools: Vec<Vec<ItemRequirement>>,
    pub components: Vec<Vec<ItemRequirement>>,
    pub qualities: Vec<(QualityId, i32)>,
}

impl Requirements {
    fn alternatives_mut(&mut self) -> impl Iterator<Item = &mut Vec<ItemRequirement>> {
        self.tools.iter_mut().chain(self.components.iter_mut())
    }

    /// Strip denied items from every alternative list. Returns how many
    /// entries were removed. A list left empty stays in place and makes the
    /// requirements unsatisfiable.
    pub fn remove_items(&mut self, deny: &HashSet<ItypeId>) -> usize {
        let mut removed = 0;
        for alts in self.alternatives_mut() {
            let before = alts.len();
            alts.retain(|r| !deny.contains(&r.item));
            removed += before - alts.len();
        }
        removed
    }

    /// Some requirement has no alternative left.
    pub fn is_unsatisfiable(&self) -> bool {
        self.tools
            .iter()
            .chain(self.components.iter())
            .any(Vec::is_empty)
    }

    pub fn replace_item(&mut self, from: &ItypeId, to: &ItypeId) -> usize {
        let mut n = 0;
        for alts in self.alternatives_mut() {
            for req in alts.iter_mut() {
                if &req.item == from {
                    req.item = to.clone();
                    n += 1;
                }
            }
        }
        n
    }

    pub fn item_refs(&self) -> impl Iterator<Item = &ItypeId> {
        self.tools
            .iter()
            .chain(self.components.iter())
            .flatten()
            .map(|r| &r.item)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Recipe {
    pub id: RecipeId,
    pub result: ItypeId,
    pub result_count: i32,
    pub byproducts: Vec<ItemRequirement>,
    pub requirements: Requirements,
}

impl Recipe {
    pub fn new(id: impl Into<RecipeId>, result: impl Into<ItypeId>) -> Self {
        Self {
            id: id.into(),
            result: result.into(),
            result_count: 1,
            byproducts: Vec::new(),
            requirements: Requirements::default(),
        }
    }
}

/// Items placed in a vehicle part when the prototype spawns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VehicleItemSpawn {
    pub chance: i32,
    pub items: Vec<ItypeId>,
    pub groups: Vec<GroupId>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VehiclePrototype {
    pub id: VehicleId,
    pub item_spawns: Vec<VehicleItemSpawn>,
}

/// Every dependent registry the overlay must keep in sync.
#[derive(Debug, Clone, Default)]
pub struct Dependents {
    pub recipes: BTreeMap<RecipeId, Recipe>,
    pub vehicles: BTreeMap<VehicleId, VehiclePrototype>,
}

impl Dependents {
    pub fn add_recipe(&mut self, recipe: Recipe) {
        self.recipes.insert(recipe.id.clone(), recipe);
    }

    pub fn add_vehicle(&mut self, vehicle: VehiclePrototype) {
        self.vehicles.insert(vehicle.id.clone(), vehicle);
    }

    /// Delete recipes producing a denied item, strip denied items from the
    /// remaining requirements and from vehicle item spawns. A recipe whose
    /// requirement loses every alternative is deleted too.
    pub fn remove_items(&mut self, deny: &HashSet<ItypeId>) -> DependentPrune {
        let before = self.recipes.len();
        self.recipes.retain(|_, r| !deny.contains(&r.result));

        let mut requirements_stripped = 0;
        for recipe in self.recipes.values_mut() {
            requirements_stripped += recipe.requirements.remove_items(deny);
            recipe.byproducts.retain(|b| !deny.contains(&b.item));
        }
        self.recipes.retain(|id, r| {
            let keep = !r.requirements.is_unsatisfiable();
            if !keep {
                log::debug!("recipe '{id}' lost every alternative of a requirement");
            }
            keep
        });
        let recipes_deleted = before - self.recipes.len();

        let mut vehicle_items_pruned = 0;
        for vehicle in self.vehicles.values_mut() {
            for spawn in &mut vehicle.item_spawns {
                let before = spawn.items.len();
                spawn.items.retain(|id| !deny.contains(id));
                vehicle_items_pruned += before - spawn.items.len();
            }
            vehicle
                .item_spawns
                .retain(|s| !s.items.is_empty() || !s.groups.is_empty());
        }

        DependentPrune {
            recipes_deleted,
            requirements_stripped,
            vehicle_items_pruned,
        }
    }

    /// Rewrite every reference to `from` so it names `to`.
    pub fn replace_item(&mut self, from: &ItypeId, to: &ItypeId) -> usize {
        let mut n = 0;
        for recipe in self.recipes.values_mut() {
            if &recipe.result == from {
                recipe.result = to.clone();
                n += 1;
            }
            n += recipe.requirements.replace_item(from, to);
            for b in &mut recipe.byproducts {
                if &b.item == from {
                    b.item = to.clone();
                    n += 1;
                }
            }
        }
        for vehicle in self.vehicles.values_mut() {
            for spawn in &mut vehicle.item_spawns {
                for id in &mut spawn.items {
                    if id == from {
                        *id = to.clone();
                        n += 1;
                    }
                }
            }
        }
        n
    }
}

/// Counts reported by [`Dependents::remove_items`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DependentPrune {
    pub recipes_deleted: usize,
    pub requirements_stripped: usize,
    pub vehicle_items_pruned: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn deny(ids: &[&str]) -> HashSet<ItypeId> {
        ids.iter().map(|s| ItypeId::new(*s)).collect()
    }

    fn sample() -> Dependents {
        let mut d = Dependents::default();
        let mut knife = Recipe::new("knife_recipe", "knife");
        knife.requirements.components = vec![
            vec![
                ItemRequirement::new("scrap", 2),
                ItemRequirement::new("steel_chunk", 1),
            ],
            vec![ItemRequirement::new("rag", 1)],
        ];
        d.add_recipe(knife);
        d.add_recipe(Recipe::new("laser_recipe", "laser_rifle"));
        d.add_vehicle(VehiclePrototype {
            id: VehicleId::new("car"),
            item_spawns: vec![VehicleItemSpawn {
                chance: 10,
                items: vec![ItypeId::new("laser_rifle")],
                groups: vec![],
            }],
        });
        d
    }

    #[test]
    fn deny_deletes_recipes_and_strips_requirements() {
        let mut d = sample();
        let prune = d.remove_items(&deny(&["laser_rifle", "scrap"]));
        assert_eq!(prune.recipes_deleted, 1);
        assert_eq!(prune.requirements_stripped, 1);
        assert_eq!(prune.vehicle_items_pruned, 1);

        let knife = &d.recipes[&RecipeId::new("knife_recipe")];
        assert_eq!(knife.requirements.components.len(), 2);
        assert_eq!(knife.requirements.components[0].len(), 1);
        assert!(d.vehicles[&VehicleId::new("car")].item_spawns.is_empty());
    }

    #[test]
    fn recipe_losing_every_alternative_is_deleted() {
        let mut d = sample();
        let prune = d.remove_items(&deny(&["rag"]));
        assert_eq!(prune.recipes_deleted, 1);
        assert_eq!(prune.requirements_stripped, 1);
        assert!(!d.recipes.contains_key(&RecipeId::new("knife_recipe")));
        assert!(d.recipes.contains_key(&RecipeId::new("laser_recipe")));
    }

    #[test]
    fn replace_rewrites_requirements_and_vehicles() {
        let mut d = sample();
        assert_eq!(
            d.replace_item(&ItypeId::new("laser_rifle"), &ItypeId::new("plasma_rifle")),
            1
        );
        assert_eq!(
            d.replace_item(&ItypeId::new("scrap"), &ItypeId::new("scrap_metal")),
            1
        );
        let knife = &d.recipes[&RecipeId::new("knife_recipe")];
        assert!(knife.requirements.item_refs().any(|i| i.as_str() == "scrap_metal"));
    }

    #[test]
    fn replace_rewrites_recipe_result() {
        let mut d = sample();
        assert_eq!(
            d.replace_item(&ItypeId::new("knife"), &ItypeId::new("combat_knife")),
            1
        );
        let knife = &d.recipes[&RecipeId::new("knife_recipe")];
        assert_eq!(knife.result, ItypeId::new("combat_knife"));
    }
}
