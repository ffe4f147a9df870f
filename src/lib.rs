//! # towerstat - Memoized Stat Derivation for a Tower-Defense Unit Database
//!
//! Derives the displayed stats of every unit in a catalog:
//! - **Deterministic** integer percent arithmetic (100 = ×1.0, truncating)
//! - **Layered** pipeline from base values to damage per second
//! - **Memoized** per `Setting` reference: recomputed only when a new setting is published
//! - **Explained** results: every derived value carries its factor breakdown
//!
//! ## Core Concepts
//!
//! ### Stat Pipeline
//!
//! ```text
//! Base → Barrack → Deployment → In-Battle → Actual → DPS
//! ```
//!
//! 1. **Barrack**: potentials, weapon, affection bonus and subskills
//! 2. **Deployment**: formation, environment, beasts and type bonus
//! 3. **In-Battle**: skill, features, field element, subskills and panels, clamped
//! 4. **Actual**: damage factors or static damage
//!
//! A [`Unit`] resolves the first three stages. A [`Situation`] (a unit with a
//! chosen skill and feature subset) resolves the rest, and a token situation
//! reads the stats it does not define from a situation over its parent.
//!
//! ### Settings and caching
//!
//! Every stat is a node that remembers its last result together with the
//! `Rc<Setting>` it was computed for. Keep one `Rc` for a render pass and
//! publish changes with [`Setting::update`].
//!
//! ## Example
//!
//! ```rust
//! use std::rc::Rc;
//! use towerstat::*;
//!
//! let db = Database::from_json_str(r#"{ "units": [{
//!     "id": 1, "name": "Knight", "rarity": "gold", "attack": 1000,
//!     "features": [{ "name": "Rally", "attack_mul": 120 }],
//!     "situations": [{ "features": ["Rally"] }]
//! }] }"#).unwrap();
//!
//! let setting = Rc::new(Setting::default());
//! let rally = &db.situations_of(1)[0];
//! let attack = rally.column(StatKey::Attack).unwrap();
//! assert_eq!(attack.value(&setting), Some(Value::Int(1200)));
//! assert_eq!(attack.text(&setting).as_deref(), Some("1200"));
//!
//! // a new setting reference recomputes
//! let boosted = Setting::update(&setting, |s| s.panel_damage_factor = 150);
//! assert_eq!(attack.value(&boosted), Some(Value::Int(1800)));
//! ```
//!
//! ## Modules
//!
//! - [`percent`] - Integer percent arithmetic
//! - [`memo`] - Setting-keyed memo cell
//! - [`node`] - Stat nodes and calculators
//! - [`feature`] - Feature descriptors and aggregation
//! - [`catalog`] - Subskill, beast, formation, potential and weapon resolvers
//! - [`pipeline`] - Stage formulas and factor records
//! - [`unit`] - Unit-stage stats
//! - [`situation`] - In-battle stats, DPS and token delegation
//! - [`database`] - Building units and situations from game data
//! - [`graph`] - Dependency graph management
//! - [`error`] - Error types

pub mod catalog;
pub mod data;
pub mod database;
pub mod error;
pub mod feature;
pub mod graph;
pub mod memo;
pub mod node;
pub mod percent;
pub mod pipeline;
pub mod setting;
pub mod situation;
pub mod stat_key;
pub mod unit;
pub mod value;

// Re-export main types for convenience
pub use database::Database;
pub use error::EngineError;
pub use setting::{Mode, Setting};
pub use situation::Situation;
pub use stat_key::{Stage, StatKey, StatRef};
pub use unit::Unit;
pub use value::Value;

// Re-export node types
pub use node::{Color, Item, Styles};
