//! Selection rules and the engine that evaluates them.
//!
//! Rules are written in the `GRUPPE-UTVALG` / `PUNKT-UTVALG` rule language,
//! parsed by [`RuleParser`] into a [`SelectionSet`] and evaluated by a
//! [`SelectionEngine`] against any [`GroupStore`](crate::store::GroupStore).

mod comparator;
mod condition;
mod engine;
mod evaluator;
mod layer;
mod parser;
mod priority;
mod rule;
mod selection_set;
mod tokenizer;
mod value;

pub use comparator::*;
pub use condition::*;
pub use engine::*;
pub use layer::*;
pub use parser::*;
pub use priority::*;
pub use rule::*;
pub use selection_set::*;
pub use value::{detect_value_type, leading_float, leading_int, LeadingInt, ValueType};
