//! # Pipeline Module
//!
//! High-level orchestration of the consensus workflow: the structured step
//! model, the conditional pipeline builder, and the sequential executor.

pub mod command;
pub mod executor;
pub mod minion;

pub use command::{Command, Step};
pub use executor::{execute, RunLog, ShellRunner, StepRunner};
pub use minion::{build_steps, MinionPipeline};
