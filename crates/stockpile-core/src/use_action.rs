//! Invocable use-actions.
//!
//! Actions are looked up by name in a [`UseActionRegistry`] when content is
//! loaded. Each registered name pairs a parameter parser with a concrete
//! [`UseActor`]; after loading, every action is invoked the same way through
//! [`UseFunction::invoke`] regardless of its parameters.

use crate::id::{ItypeId, MaterialId, SkillId};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use std::any::Any;
use std::collections::{BTreeSet, HashMap};
use std::fmt;

// ===========================================================================
// Errors
// ===========================================================================

#[derive(Debug, thiserror::Error)]
pub enum UseActionError {
    #[error("unknown use action '{0}'")]
    UnknownAction(String),
    #[error("bad parameters for use action '{action}': {detail}")]
    BadParameters { action: String, detail: String },
}

// ===========================================================================
// Actor trait
// ===========================================================================

/// State visible to an action when it is invoked.
#[derive(Debug, Clone)]
pub struct UseContext<'a> {
    pub item: &'a ItypeId,
    /// Charges currently loaded in the item.
    pub charges: i32,
    /// Age of the item in turns (for delayed transforms).
    pub age_turns: i64,
}

/// What invoking an action did.
#[derive(Debug, Clone, PartialEq)]
pub enum UseEffect {
    /// The item turns into another archetype.
    Transform(ItypeId),
    /// The action refused; the item is unchanged.
    NotReady(String),
    /// The item was consumed.
    Consumed,
    /// The item repairs others made of the given materials.
    Repair(BTreeSet<MaterialId>),
    /// The item detonates.
    Explode { power: f32 },
    Heal { amount: i32 },
    /// A parameterless built-in behavior, identified by name.
    Builtin(String),
}

/// Result of [`UseFunction::invoke`].
#[derive(Debug, Clone, PartialEq)]
pub struct UseOutcome {
    pub charges_used: i32,
    pub effect: UseEffect,
}

/// Behavior of a named use-action with its parsed parameters.
pub trait UseActor: fmt::Debug + Send + Sync {
    /// The registered action name.
    fn type_name(&self) -> &str;

    fn clone_box(&self) -> Box<dyn UseActor>;

    fn invoke(&self, ctx: &UseContext<'_>) -> UseOutcome;

    /// Item ids this action refers to, for consistency checking.
    fn referenced_items(&self) -> Vec<&ItypeId> {
        Vec::new()
    }

    fn as_any(&self) -> &dyn Any;
}

/// An action attached to an archetype, plus the factor by which it scales
/// ammo consumption.
#[derive(Debug)]
pub struct UseFunction {
    pub actor: Box<dyn UseActor>,
    pub ammo_scale: f32,
}

impl UseFunction {
    pub fn new(actor: Box<dyn UseActor>) -> Self {
        Self {
            actor,
            ammo_scale: 1.0,
        }
    }

    pub fn type_name(&self) -> &str {
        self.actor.type_name()
    }

    pub fn invoke(&self, ctx: &UseContext<'_>) -> UseOutcome {
        let mut outcome = self.actor.invoke(ctx);
        outcome.charges_used = (outcome.charges_used as f32 * self.ammo_scale).round() as i32;
        outcome
    }

    /// Downcast the actor to a concrete type.
    pub fn actor_as<T: 'static>(&self) -> Option<&T> {
        self.actor.as_any().downcast_ref::<T>()
    }
}

impl Clone for UseFunction {
    fn clone(&self) -> Self {
        Self {
            actor: self.actor.clone_box(),
            ammo_scale: self.ammo_scale,
        }
    }
}

// ===========================================================================
// Actors
// ===========================================================================

/// A built-in behavior that takes no parameters.
#[derive(Debug, Clone)]
pub struct SimpleActor {
    pub name: String,
}

impl UseActor for SimpleActor {
    fn type_name(&self) -> &str {
        &self.name
    }

    fn clone_box(&self) -> Box<dyn UseActor> {
        Box::new(self.clone())
    }

    fn invoke(&self, _ctx: &UseContext<'_>) -> UseOutcome {
        UseOutcome {
            charges_used: 0,
            effect: UseEffect::Builtin(self.name.clone()),
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Turns the item into `target`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct TransformActor {
    pub target: ItypeId,
    pub msg: String,
    pub active: bool,
    pub need_charges: i32,
    pub container: Option<ItypeId>,
}

impl UseActor for TransformActor {
    fn type_name(&self) -> &str {
        "transform"
    }

    fn clone_box(&self) -> Box<dyn UseActor> {
        Box::new(self.clone())
    }

    fn invoke(&self, ctx: &UseContext<'_>) -> UseOutcome {
        if ctx.charges < self.need_charges {
            return UseOutcome {
                charges_used: 0,
                effect: UseEffect::NotReady(format!(
                    "needs {} charges, has {}",
                    self.need_charges, ctx.charges
                )),
            };
        }
        UseOutcome {
            charges_used: self.need_charges,
            effect: UseEffect::Transform(self.target.clone()),
        }
    }

    fn referenced_items(&self) -> Vec<&ItypeId> {
        std::iter::once(&self.target)
            .chain(self.container.iter())
            .collect()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// A transform that only fires once the item is old enough.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct DelayedTransformActor {
    #[serde(flatten)]
    pub transform: TransformActor,
    pub transform_age: i64,
    pub not_ready_msg: String,
}

impl UseActor for DelayedTransformActor {
    fn type_name(&self) -> &str {
        "delayed_transform"
    }

    fn clone_box(&self) -> Box<dyn UseActor> {
        Box::new(self.clone())
    }

    fn invoke(&self, ctx: &UseContext<'_>) -> UseOutcome {
        if ctx.age_turns < self.transform_age {
            return UseOutcome {
                charges_used: 0,
                effect: UseEffect::NotReady(self.not_ready_msg.clone()),
            };
        }
        self.transform.invoke(ctx)
    }

    fn referenced_items(&self) -> Vec<&ItypeId> {
        self.transform.referenced_items()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ConsumeDrugActor {
    pub activation_message: String,
    pub charges_needed: i32,
    pub effects: Vec<String>,
}

impl Default for ConsumeDrugActor {
    fn default() -> Self {
        Self {
            activation_message: String::new(),
            charges_needed: 1,
            effects: Vec::new(),
        }
    }
}

impl UseActor for ConsumeDrugActor {
    fn type_name(&self) -> &str {
        "consume_drug"
    }

    fn clone_box(&self) -> Box<dyn UseActor> {
        Box::new(self.clone())
    }

    fn invoke(&self, _ctx: &UseContext<'_>) -> UseOutcome {
        UseOutcome {
            charges_used: self.charges_needed,
            effect: UseEffect::Consumed,
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Lets the item repair others made of `materials`.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RepairItemActor {
    pub item_action_type: String,
    pub materials: BTreeSet<MaterialId>,
    pub skill: SkillId,
    pub tool_quality: i32,
    pub cost_scaling: f32,
    pub move_cost: i32,
}

impl Default for RepairItemActor {
    fn default() -> Self {
        Self {
            item_action_type: "repair_misc".to_string(),
            materials: BTreeSet::new(),
            skill: SkillId::new("fabrication"),
            tool_quality: 0,
            cost_scaling: 1.0,
            move_cost: 500,
        }
    }
}

impl UseActor for RepairItemActor {
    fn type_name(&self) -> &str {
        "repair_item"
    }

    fn clone_box(&self) -> Box<dyn UseActor> {
        Box::new(self.clone())
    }

    fn invoke(&self, _ctx: &UseContext<'_>) -> UseOutcome {
        UseOutcome {
            charges_used: 1,
            effect: UseEffect::Repair(self.materials.clone()),
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ExplosionActor {
    pub power: f32,
    pub shrapnel: i32,
    pub fire: bool,
}

impl UseActor for ExplosionActor {
    fn type_name(&self) -> &str {
        "explosion"
    }

    fn clone_box(&self) -> Box<dyn UseActor> {
        Box::new(self.clone())
    }

    fn invoke(&self, _ctx: &UseContext<'_>) -> UseOutcome {
        UseOutcome {
            charges_used: 1,
            effect: UseEffect::Explode { power: self.power },
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct HealActor {
    pub limb_power: i32,
    pub bleed: f32,
    pub move_cost: i32,
}

impl UseActor for HealActor {
    fn type_name(&self) -> &str {
        "heal"
    }

    fn clone_box(&self) -> Box<dyn UseActor> {
        Box::new(self.clone())
    }

    fn invoke(&self, _ctx: &UseContext<'_>) -> UseOutcome {
        UseOutcome {
            charges_used: 1,
            effect: UseEffect::Heal {
                amount: self.limb_power,
            },
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

// ===========================================================================
// Registry
// ===========================================================================

type ParseFn = fn(&str, serde_json::Value) -> Result<Box<dyn UseActor>, serde_json::Error>;

fn parse_with<T: UseActor + DeserializeOwned + 'static>(
    _name: &str,
    params: serde_json::Value,
) -> Result<Box<dyn UseActor>, serde_json::Error> {
    let actor: T = serde_json::from_value(params)?;
    Ok(Box::new(actor))
}

fn parse_simple(
    name: &str,
    _params: serde_json::Value,
) -> Result<Box<dyn UseActor>, serde_json::Error> {
    Ok(Box::new(SimpleActor {
        name: name.to_string(),
    }))
}

/// Parameterless built-ins known to the registry.
pub const SIMPLE_ACTIONS: &[&str] = &[
    "GUNMOD_ATTACH",
    "TOOLMOD_ATTACH",
    "detach_gunmods",
    "GUN_REPAIR",
    "LIGHTER",
    "CROWBAR",
    "HAMMER",
    "DIG",
    "FIRESTARTER",
    "SEW",
    "BUTCHER",
    "WATER_PURIFIER",
    "BOIL",
];

/// Name → parser table for every known use-action.
pub struct UseActionRegistry {
    parsers: HashMap<String, ParseFn>,
}

impl Default for UseActionRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

impl fmt::Debug for UseActionRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<&String> = self.parsers.keys().collect();
        names.sort();
        f.debug_struct("UseActionRegistry")
            .field("actions", &names)
            .finish()
    }
}

impl UseActionRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self {
            parsers: HashMap::new(),
        }
    }

    /// The registry with every built-in action.
    pub fn builtin() -> Self {
        let mut reg = Self::new();
        reg.register("transform", parse_with::<TransformActor>);
        reg.register("delayed_transform", parse_with::<DelayedTransformActor>);
        reg.register("consume_drug", parse_with::<ConsumeDrugActor>);
        reg.register("repair_item", parse_with::<RepairItemActor>);
        reg.register("explosion", parse_with::<ExplosionActor>);
        reg.register("heal", parse_with::<HealActor>);
        for name in SIMPLE_ACTIONS {
            reg.register(name, parse_simple);
        }
        reg
    }

    pub fn register(&mut self, name: &str, parse: ParseFn) {
        self.parsers.insert(name.to_string(), parse);
    }

    pub fn contains(&self, name: &str) -> bool {
        self.parsers.contains_key(name)
    }

    /// Build an action from its name and parameter object.
    pub fn parse(
        &self,
        name: &str,
        params: serde_json::Value,
    ) -> Result<UseFunction, UseActionError> {
        let parse = self
            .parsers
            .get(name)
            .ok_or_else(|| UseActionError::UnknownAction(name.to_string()))?;
        let actor = parse(name, params).map_err(|e| UseActionError::BadParameters {
            action: name.to_string(),
            detail: e.to_string(),
        })?;
        Ok(UseFunction::new(actor))
    }

    /// Build an action with default parameters (string shorthand form).
    pub fn create_default(&self, name: &str) -> Result<UseFunction, UseActionError> {
        self.parse(name, serde_json::Value::Object(serde_json::Map::new()))
    }
}
