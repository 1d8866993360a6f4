//! Destructive resets.
//!
//! - [`DbClearer`] drops structural objects outside the preserve list
//! - [`DbCleaner`] deletes table rows outside the preserve list
//! - [`ConstraintsDisabler`] suspends constraints beforehand
//!
//! Neither the clearer nor the cleaner disables constraints on its own. Callers
//! disable referential constraints first; otherwise live foreign keys surface as
//! [`MaintainError::DependencyViolation`](crate::error::MaintainError::DependencyViolation).

mod cleaner;
mod clearer;
mod constraints;

pub use cleaner::DbCleaner;
pub use clearer::DbClearer;
pub use constraints::ConstraintsDisabler;
