//! # llms-bootstrap
//!
//! Brings a developer machine from an unknown state to a known-good
//! `local-llms` toolchain: a recent Python, `pigz`, `llama.cpp`, a virtual
//! environment and the pinned `local-llms` package, all installed through
//! Homebrew.
//!
//! ## Features
//!
//! - `Bootstrapper` running the whole sequence with fail-fast error handling
//! - `StepRunner` and the `Step` trait for custom step lists
//! - `EnvironmentDetector` for architecture, prefix and interpreter selection
//! - `profile::ensure_path_entry` for append-only profile edits with backups
//! - `CommandRunner` with a real (`SystemRunner`) and a scripted
//!   (`ScriptedRunner`) implementation
//!
//! ## Example
//!
//! ```rust,no_run
//! use llms_bootstrap::{Bootstrapper, Settings, SystemRunner};
//! use std::sync::Arc;
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() {
//!     let settings = Settings {
//!         min_interpreter_version: "3.10".to_string(),
//!         ..Default::default()
//!     };
//!     let report = Bootstrapper::new(settings, Arc::new(SystemRunner))
//!         .with_observer(|event| println!("{}", event.description()))
//!         .run()
//!         .await;
//!     std::process::exit(report.exit_code());
//! }
//! ```

pub mod config;
pub mod detection;
mod detector;
mod facts;
pub mod install;
pub mod logger;
pub mod orchestrator;
pub mod profile;
mod runner;
mod tool;
pub mod version;

pub use config::{load_settings, ConfigError, ReinstallPolicy, Settings};
pub use detection::{CommandProbe, ProbeError, SearchPath};
pub use detector::EnvironmentDetector;
pub use facts::{
    ArchClass, EnvironmentFacts, Interpreter, InterpreterSelection, InterpreterSource,
    VirtualEnvironment,
};
pub use install::BootstrapError;
pub use logger::Logger;
pub use orchestrator::{
    bootstrap_plan, Bootstrapper, ExecutionResult, RunContext, RunOutcome, RunReport, Severity,
    Step, StepEvent, StepRecord, StepRunner,
};
pub use profile::MutationOutcome;
pub use runner::{CommandOutput, CommandRunner, CommandSpec, RunError, ScriptedRunner, SystemRunner};
pub use tool::Tool;
