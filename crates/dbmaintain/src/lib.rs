//! # dbmaintain
//!
//! Versioned SQL script maintenance for relational databases.
//!
//! This library keeps a database schema in step with a repository of SQL
//! scripts:
//!
//! - **Incremental updates** run each new script once, in version order
//! - **Repeatable and post-processing scripts** re-run when they change
//! - **Executed-script registry** stored in the target database itself
//! - **Dialect-aware statement splitting** for procedural blocks
//! - **Clear and clean** resets that honor a preserve list
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::path::Path;
//! use dbmaintain::{Config, DbMaintainer, UpdateOptions};
//!
//! #[tokio::main]
//! async fn main() -> dbmaintain::Result<()> {
//!     let config = Config::load("dbmaintain.yaml")?;
//!     let maintainer = DbMaintainer::connect(config, Path::new(".")).await?;
//!     let report = maintainer.update_database(UpdateOptions::default()).await?;
//!     println!("Executed {} scripts", report.scripts.len());
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod core;
pub mod dialect;
pub mod drivers;
pub mod error;
pub mod orchestrator;
pub mod parser;
pub mod plan;
pub mod reset;
pub mod source;
pub mod state;

// Re-exports for convenient access
pub use config::{Config, DatabaseConfig, ScriptsConfig};
pub use core::{Qualifier, Script, ScriptIndexes, ScriptKind};
pub use error::{MaintainError, Result};
pub use orchestrator::{DbMaintainer, ResetReport, UpdateOptions, UpdateReport};
pub use plan::{Action, ExecutionPlan, PlanEntry, Reason};
pub use state::ExecutedScript;
