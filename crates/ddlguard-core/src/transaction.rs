//! Early commit of the enclosing migration transaction.
//!
//! Concurrent index builds and constraint validations must not run inside a
//! transaction. Rather than making every migration opt out of the host's
//! implicit transaction, the controller commits it the first time a phase
//! needs to run outside of it. Committing at the start is simpler than
//! finding the right moment when reverting.

use crate::connection::MigrationConnection;
use crate::error::StatementError;
use tracing::{debug, info};

/// Per-run transaction state.
///
/// `disabled` only ever goes from `false` to `true` within a run.
#[derive(Debug, Default)]
pub struct TransactionController {
    disabled: bool,
}

impl TransactionController {
    /// Fresh state for a new run.
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether the enclosing transaction has been committed in this run.
    pub fn is_disabled(&self) -> bool {
        self.disabled
    }

    /// Whether the connection currently has an open transaction.
    pub fn in_transaction<C: MigrationConnection + ?Sized>(conn: &C) -> bool {
        conn.open_transactions() > 0
    }

    /// Commit the enclosing transaction, at most once per run.
    pub fn disable_transaction<C: MigrationConnection + ?Sized>(
        &mut self,
        conn: &mut C,
    ) -> Result<(), StatementError> {
        if self.disabled {
            debug!("enclosing transaction already committed");
            return Ok(());
        }
        if !Self::in_transaction(conn) {
            debug!("no enclosing transaction to commit");
            return Ok(());
        }

        info!(
            open_transactions = conn.open_transactions(),
            "committing enclosing transaction early"
        );
        conn.commit_db_transaction()?;
        self.disabled = true;
        Ok(())
    }
}
