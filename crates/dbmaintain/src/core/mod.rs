//! Core value types of the maintenance engine.
//!
//! - [`version`]: hierarchical script versions and their total order
//! - [`qualifier`]: script qualifiers and the include/exclude evaluator
//! - [`script`]: script records, identity keys and checksums
//! - [`identifier`]: database object identifiers and quoting
//! - [`preserve`]: the preserve list consulted by clear and clean
//! - [`catalog`]: dialect registry keyed by configuration name
//!
//! Everything here is synchronous and free of I/O; the boundary traits live in
//! [`state`](crate::state), [`drivers`](crate::drivers) and [`reset`](crate::reset).

pub mod catalog;
pub mod identifier;
pub mod preserve;
pub mod qualifier;
pub mod script;
pub mod version;

pub use catalog::DialectCatalog;
pub use identifier::{DbItemIdentifier, DbItemType, IdentifierCase};
pub use preserve::PreserveSet;
pub use qualifier::{Qualifier, QualifierEvaluator, UNQUALIFIED};
pub use script::{checksum, Script, ScriptKey, ScriptKind};
pub use version::ScriptIndexes;
