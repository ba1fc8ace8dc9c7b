//! Stratloop - a bounded repair loop around language-model strategy synthesis
//!
//! A task request is validated into a spec, the requested tools are resolved,
//! and a language model writes a strategy module. Each candidate is checked
//! statically, executed over cached prices and sanity-checked on its metrics;
//! any failure becomes a repair hint for the next attempt until the budget is
//! spent.

pub mod config;
pub mod data;
pub mod error;
pub mod eval;
pub mod generator;
pub mod id;
pub mod llm;
pub mod orchestrator;
pub mod prompt;
pub mod repair;
pub mod runner;
pub mod storage;
pub mod task;
pub mod tools;
pub mod validation;

pub use error::{Result, StratloopError};
