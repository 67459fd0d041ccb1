//! ddlguard core - safe schema changes for live PostgreSQL databases.
//!
//! Risky schema operations are rewritten into phase sequences that avoid
//! long-held locks:
//! - Indexes are built and dropped `CONCURRENTLY`
//! - Foreign keys and check constraints are added `NOT VALID`, then validated
//! - `NOT NULL` goes through a validated `IS NOT NULL` check constraint
//! - The enclosing migration transaction is committed once, when first needed
//!
//! A failed validation removes the unvalidated object again, so a failed
//! migration can simply be re-run.
//!
//! # Example
//!
//! ```ignore
//! use ddlguard_core::{Direction, OperationDescriptor, Options, SafeMigrator, SafetyConfig};
//!
//! let migrator = SafeMigrator::new(SafetyConfig::new().with_safe_by_default(true));
//! let mut run = migrator.begin(Direction::Up);
//!
//! let op = OperationDescriptor::add_check_constraint("users", "score > 0", Options::new())?;
//! run.run(&op, &mut connection)?;
//! ```

pub mod adapter;
pub mod config;
pub mod connection;
pub mod engine;
pub mod error;
pub mod executor;
pub mod naming;
pub mod operation;
pub mod plan;
pub mod render;
pub mod statement;
pub mod strategy;
pub mod transaction;

#[cfg(test)]
mod testing;

pub use adapter::{CapabilityAdapter, ConstraintMatch, DatabaseKind, NOT_NULL_FROM_CHECK_MIN_VERSION};
pub use config::SafetyConfig;
pub use connection::MigrationConnection;
pub use engine::{MigrationRun, Outcome, SafeMigrator};
pub use error::{SafetyError, StatementError};
pub use executor::{ExecutionStats, PhaseExecutor};
pub use operation::{OperationDescriptor, OperationKind, OptionValue, Options, Subject};
pub use plan::{Direction, Phase, PhasePlan};
pub use statement::Statement;
pub use strategy::{dispatch, Strategy};
pub use transaction::TransactionController;
