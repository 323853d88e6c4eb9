//! SABATH Core Library
//!
//! Fetches surrogate models and their datasets into a local cache, runs each
//! model's one-time setup, executes its run commands and records the
//! execution in a report directory.
//!
//! ```text
//! Report ─► Fetcher (dataset) ─► SetupStage ─► Fetcher (model) ─► Executor (run)
//! ```

pub mod cache;
pub mod catalog;
pub mod config;
pub mod descriptor;
pub mod error;
pub mod exec;
pub mod fetch;
pub mod git;
pub mod obs;
pub mod report;
pub mod setup;
pub mod telemetry;
pub mod vars;

pub use cache::{CacheLocator, CacheState, SETUP_MARKER};
pub use catalog::Catalog;
pub use config::HarnessConfig;
pub use descriptor::{
    Acquisition, Commands, DatasetDescriptor, Entity, GitSource, ModelDescriptor, Source,
};
pub use error::{EntityKind, Result, SabathError};
pub use exec::{ExecContext, Executor, OutputCapture};
pub use fetch::{CleanupPolicy, Fetcher};
pub use report::{Report, ReportStage, ReportSummary};
pub use setup::SetupStage;
pub use telemetry::{init_tracing, LogSettings};
pub use vars::Vars;

/// SABATH version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
