//! Phase executor.
//!
//! Runs the phases of a plan strictly in order. The only recovery action is
//! the compensating statement of a failed validation phase; every other
//! failure propagates as-is.

use crate::connection::MigrationConnection;
use crate::error::SafetyError;
use crate::plan::Phase;
use crate::transaction::TransactionController;
use tracing::{debug, warn};

/// Counters for one executor (one migration run).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExecutionStats {
    /// Statements executed, compensations included.
    pub statements_executed: usize,
    /// Validation phases that succeeded.
    pub validations_passed: usize,
    /// Compensating removals performed.
    pub compensations: usize,
}

/// Executes phases against a connection, sharing one transaction state.
#[derive(Debug, Default)]
pub struct PhaseExecutor {
    transaction: TransactionController,
    stats: ExecutionStats,
}

impl PhaseExecutor {
    /// Create an executor for a new run.
    pub fn new() -> Self {
        Self::default()
    }

    /// Transaction state of the run.
    pub fn transaction(&self) -> &TransactionController {
        &self.transaction
    }

    /// Counters so far.
    pub fn stats(&self) -> ExecutionStats {
        self.stats
    }

    /// Execute phases in order, stopping at the first failure.
    pub fn execute<C: MigrationConnection + ?Sized>(
        &mut self,
        phases: &[Phase],
        conn: &mut C,
    ) -> Result<(), SafetyError> {
        for phase in phases {
            self.execute_phase(phase, conn)?;
        }
        Ok(())
    }

    fn execute_phase<C: MigrationConnection + ?Sized>(
        &mut self,
        phase: &Phase,
        conn: &mut C,
    ) -> Result<(), SafetyError> {
        debug!(phase = %phase.description(), "executing phase");

        match phase {
            Phase::Run(statement) => {
                conn.execute(statement)?;
                self.stats.statements_executed += 1;
                Ok(())
            }
            Phase::DisableTransaction => {
                self.transaction.disable_transaction(conn)?;
                Ok(())
            }
            Phase::ValidateOrCompensate {
                object,
                validate,
                compensate,
            } => {
                let validation = match conn.execute(validate) {
                    Ok(()) => {
                        self.stats.statements_executed += 1;
                        self.stats.validations_passed += 1;
                        return Ok(());
                    }
                    Err(e) => e,
                };

                warn!(
                    object = %object,
                    error = %validation,
                    "validation failed, removing unvalidated object"
                );
                match conn.execute(compensate) {
                    Ok(()) => {
                        self.stats.statements_executed += 1;
                        self.stats.compensations += 1;
                        Err(SafetyError::ValidationFailed {
                            object: object.clone(),
                            source: validation,
                        })
                    }
                    Err(cleanup) => {
                        warn!(object = %object, error = %cleanup, "compensating removal failed");
                        Err(SafetyError::CompensationFailed {
                            object: object.clone(),
                            source: cleanup,
                            validation,
                        })
                    }
                }
            }
            Phase::SafetyAssured(phases) => {
                let previous = conn.safety_assured();
                conn.set_safety_assured(true);
                let result = self.execute(phases, conn);
                conn.set_safety_assured(previous);
                result
            }
        }
    }
}
