//! # sosi - selection and search core for SOSI group data
//!
//! This crate holds the query side of a SOSI dataset reader: the rule
//! language used to select groups and coordinates by their attributes, and
//! the engine that evaluates those rules against a group store.
//!
//! ## Key Features
//!
//! - **Rule language**: `GRUPPE-UTVALG`, `PUNKT-UTVALG` and `PINFO-UTVALG` blocks
//!   with nested `OG` / `VELG` / `ELLER` condition lines and 15 comparators
//! - **Priorities**: rule priorities packed into at most 127 buckets, with a
//!   128-bit mask per group telling which buckets matched
//! - **Sweeps**: mark every matching group in a set of layers, with cooperative
//!   cancellation and a combined polygon plus boundary query
//! - **Pluggable storage**: the engine reads through the [`store::GroupStore`]
//!   traits; [`store::MemoryGroupStore`] is a complete in-memory implementation
//!
//! ## Quick Start
//!
//! ```rust
//! use sosi::common::{LayerMask, NeverCancel};
//! use sosi::store::{MemoryGroupStore, StoredGroup};
//! use sosi::SelectionEngine;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let mut engine = SelectionEngine::builder()
//!     .rules_from_text(".GRUPPE-UTVALG Road\n..VELG ..OBJTYPE = Veg\n..BRUK-REGEL ROAD\n")
//!     .build()?;
//!
//! let mut store = MemoryGroupStore::new();
//! let road = store.add_group(1, StoredGroup::line().with_attribute("..OBJTYPE Veg"));
//! store.add_group(1, StoredGroup::line().with_attribute("..OBJTYPE Elv"));
//!
//! let outcome = engine.find_all_group_matches(&mut store, LayerMask::ALL, &mut NeverCancel)?;
//! assert_eq!(outcome.matches(), Some(1));
//! assert!(store.is_found(road));
//! # Ok(())
//! # }
//! ```
//!
//! ## Module Organization
//!
//! - [`common`] - Group references, layer masks, cancellation hooks
//! - [`errors`] - Error types and result definitions
//! - [`selection`] - Rule model, parser and selection engine
//! - [`store`] - Group store traits and the in-memory store

pub mod common;
pub mod errors;
pub mod selection;
pub mod store;

mod engine_builder;
mod engine_config;

pub use engine_builder::SelectionEngineBuilder;
pub use engine_config::{EngineConfig, DEFAULT_CANCEL_POLL_INTERVAL};
pub use selection::{
    CombinePolicy, ParseReport, PriorityFilter, PriorityMask, RuleKind, RuleMatch,
    SelectionEngine, SweepOutcome,
};
