//! The bootstrap state machine.
//!
//! A run is an ordered list of [`Step`]s executed by [`StepRunner`] against a
//! [`RunContext`]. Each step first checks whether its effect is already in
//! place and is skipped if so, which makes re-running the whole sequence
//! safe. [`Bootstrapper`] wires discovery, the default plan and the runner
//! together.

mod context;
mod event;
mod plan;
mod step;
mod step_runner;
pub mod steps;

pub use context::RunContext;
pub use event::StepEvent;
pub use plan::{bootstrap_plan, Bootstrapper, DISCOVER_PACKAGE_MANAGER};
pub use step::{ExecutionResult, Severity, Step, StepRecord};
pub use step_runner::{RunOutcome, RunReport, StepRunner};
