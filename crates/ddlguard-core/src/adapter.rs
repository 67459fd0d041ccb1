//! Capability probes answered by the database adapter.

use crate::error::StatementError;
use serde::{Deserialize, Serialize};

/// Database server family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DatabaseKind {
    /// PostgreSQL.
    Postgres,
    /// MySQL.
    MySql,
    /// MariaDB.
    MariaDb,
    /// SQLite.
    Sqlite,
    /// Anything else.
    Other,
}

/// How an existing constraint is identified.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConstraintMatch {
    /// By constraint name.
    Name(String),
    /// By constrained column (foreign keys).
    Column(String),
}

/// First server version whose `SET NOT NULL` can skip the table scan when a
/// validated `IS NOT NULL` check constraint exists.
pub const NOT_NULL_FROM_CHECK_MIN_VERSION: u32 = 120_000;

/// Existence and validity queries the engine needs to stay idempotent.
///
/// Implemented by the host's database adapter.
pub trait CapabilityAdapter {
    /// Server family.
    fn database_kind(&self) -> DatabaseKind;

    /// Numeric server version (`server_version_num`, e.g. `160002`).
    fn server_version_num(&self) -> Result<u32, StatementError>;

    /// Whether an index with this name exists and is marked invalid.
    fn index_is_invalid(&self, name: &str) -> Result<bool, StatementError>;

    /// Name of the constraint on `table` that matches `matching`, if any.
    ///
    /// With `include_invalid`, constraints added without validation count too.
    fn find_constraint(
        &self,
        table: &str,
        matching: &ConstraintMatch,
        include_invalid: bool,
    ) -> Result<Option<String>, StatementError>;

    /// Whether a constraint on `table` matches `matching`.
    fn constraint_exists(
        &self,
        table: &str,
        matching: &ConstraintMatch,
        include_invalid: bool,
    ) -> Result<bool, StatementError> {
        Ok(self.find_constraint(table, matching, include_invalid)?.is_some())
    }
}
