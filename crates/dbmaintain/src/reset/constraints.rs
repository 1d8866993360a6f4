//! Constraint disabling around destructive resets.

use async_trait::async_trait;

use crate::error::Result;

/// Suspends constraints so clear and clean do not trip over them.
///
/// Referential and value constraints are separate operations. Primary keys are
/// never touched, and neither is the executed-script registry table.
#[async_trait]
pub trait ConstraintsDisabler: Send + Sync {
    /// Remove foreign keys in `schema`. Returns how many were removed.
    async fn disable_referential_constraints(&self, schema: &str) -> Result<usize>;

    /// Remove check constraints and non-key `NOT NULL` constraints in `schema`.
    async fn disable_value_constraints(&self, schema: &str) -> Result<usize>;
}
