//! Stockpile Core -- the item-type catalog of a survival simulation.
//!
//! This crate holds the item data model and the batch pipeline that turns
//! loaded definitions into a frozen, cross-referenced, read-only catalog.
//! Parsing content files lives in `stockpile-data`.
//!
//! # Build Pipeline
//!
//! [`catalog::Catalog::finalize`] runs once, after every content source has
//! been loaded:
//!
//! 1. **Blacklist** -- resolve the deny-set; prune spawn groups, recipes and
//!    vehicle spawns.
//! 2. **Migrate** -- resolve obsolete ids, rewrite references, compute ammo
//!    and magazine redirects.
//! 3. **Finalize** -- derive computed fields (pre-pass), register repair
//!    tools, then link repair tools and armor data (post-pass).
//! 4. **Freeze** -- static tables become read-only.
//! 5. **Check** -- report dangling or inconsistent references.
//!
//! Problems that do not invalidate the catalog are returned as
//! [`diagnostics::Diagnostics`] rather than errors.
//!
//! # Key Types
//!
//! - [`catalog::Catalog`] -- Owns every registry; lookup, spawn tables,
//!   migration queries.
//! - [`store::DefinitionStore`] -- Template, abstract and runtime tables.
//! - [`archetype::Archetype`] -- One item type with its optional slots.
//! - [`pocket::PocketData`] -- Typed containment declarations.
//! - [`use_action::UseFunction`] -- Polymorphic use-action behind a trait
//!   object.
//! - [`migration::MigrationTable`] -- Id, variant, ammo-type and magazine
//!   redirects.
//! - [`blacklist::Blacklist`] -- Allow/deny declarations.
//! - [`validation::ConsistencyChecker`] -- Post-freeze validation.

pub mod archetype;
pub mod blacklist;
pub mod catalog;
pub mod dependents;
pub mod diagnostics;
pub mod finalize;
pub mod flag;
pub mod id;
pub mod instance;
pub mod item_group;
pub mod migration;
pub mod options;
pub mod pocket;
pub mod rng;
pub mod slots;
pub mod store;
pub mod units;
pub mod use_action;
pub mod validation;
pub mod vocab;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
