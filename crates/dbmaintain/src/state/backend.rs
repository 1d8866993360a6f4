//! Registry backend trait.
//!
//! The [`ExecutedScriptInfoSource`] trait defines how executed-script records
//! are persisted. Implementations:
//!
//! - **PostgreSQL**: `PostgresExecutedScriptInfoSource` in `db.rs`
//! - **In memory**: `InMemoryExecutedScriptInfoSource` in `memory.rs`
//!
//! The maintainer holds one `Arc<dyn ExecutedScriptInfoSource>` per run and
//! awaits its calls one at a time.

use async_trait::async_trait;

use super::ExecutedScript;
use crate::core::DbItemIdentifier;
use crate::error::Result;

/// Persistence for executed-script records.
///
/// Records are matched by [`ExecutedScript::identity`]. Each call is its own
/// unit of work; a record registered before a crash stays "not successful".
///
/// # Example
///
/// ```rust,ignore
/// let registry: Arc<dyn ExecutedScriptInfoSource> =
///     Arc::new(PostgresExecutedScriptInfoSource::new(pool, &config));
/// registry.init_schema().await?;
/// registry.register_executed_script(&ExecutedScript::pending(&script)).await?;
/// ```
#[async_trait]
pub trait ExecutedScriptInfoSource: Send + Sync {
    /// Create the backing storage if needed. Idempotent.
    async fn init_schema(&self) -> Result<()>;

    /// Persist a new record, replacing any record with the same identity.
    async fn register_executed_script(&self, script: &ExecutedScript) -> Result<()>;

    /// Store the outcome of a registered record.
    async fn update_executed_script(&self, script: &ExecutedScript) -> Result<()>;

    /// All records, in no particular order.
    async fn get_executed_scripts(&self) -> Result<Vec<ExecutedScript>>;

    async fn delete_executed_script(&self, script: &ExecutedScript) -> Result<()>;

    async fn clear_all_executed_scripts(&self) -> Result<()>;

    /// Flip every unsuccessful record to successful. Returns how many changed.
    async fn mark_failed_scripts_as_successful(&self) -> Result<usize>;

    /// Delete every unsuccessful record. Returns how many were removed.
    async fn remove_failed_scripts(&self) -> Result<usize>;

    /// The database object holding the records; clear and clean never touch it.
    fn registry_object(&self) -> DbItemIdentifier;

    /// Backend type name for logging.
    fn backend_type(&self) -> &'static str;
}
