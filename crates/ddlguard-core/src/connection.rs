//! Host connection interface.

use crate::error::StatementError;
use crate::statement::Statement;

/// The migration host's connection, as seen by the engine.
///
/// Statement execution is synchronous; timeouts and cancellation are the
/// connection's business.
pub trait MigrationConnection {
    /// Execute one statement.
    fn execute(&mut self, statement: &Statement) -> Result<(), StatementError>;

    /// Depth of open transactions on the connection.
    fn open_transactions(&self) -> usize;

    /// Commit the enclosing transaction.
    fn commit_db_transaction(&mut self) -> Result<(), StatementError>;

    /// Whether statements are currently marked as deliberately unchecked.
    fn safety_assured(&self) -> bool;

    /// Mark (or unmark) subsequent statements as deliberately unchecked by
    /// the host's safety linting.
    fn set_safety_assured(&mut self, assured: bool);
}
