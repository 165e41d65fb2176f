//! Selection integration tests.
//!
//! These run rule text against a populated group store, covering parsing,
//! evaluation and whole-store sweeps.

mod rule_evaluation_test;
mod sweep_test;
