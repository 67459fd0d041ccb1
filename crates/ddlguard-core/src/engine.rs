//! Migration runs.
//!
//! A [`SafeMigrator`] holds the configuration; each direction of a migration
//! is executed by its own [`MigrationRun`], which owns the transaction state
//! for that pass.

use crate::adapter::{CapabilityAdapter, DatabaseKind};
use crate::config::SafetyConfig;
use crate::connection::MigrationConnection;
use crate::error::SafetyError;
use crate::executor::{ExecutionStats, PhaseExecutor};
use crate::operation::OperationDescriptor;
use crate::plan::{Direction, PhasePlan};
use crate::strategy::{dispatch, Strategy};
use tracing::{debug, info, instrument};

/// What happened to an operation handed to a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// The operation was rewritten and its phases executed.
    Rewritten(Strategy),
    /// Not rewritten. The host runs the original operation itself.
    Passthrough,
}

/// Entry point for hosts.
#[derive(Debug, Clone, Default)]
pub struct SafeMigrator {
    config: SafetyConfig,
}

impl SafeMigrator {
    /// Create a migrator.
    pub fn new(config: SafetyConfig) -> Self {
        Self { config }
    }

    /// The configuration.
    pub fn config(&self) -> &SafetyConfig {
        &self.config
    }

    /// Start one pass of a migration.
    pub fn begin(&self, direction: Direction) -> MigrationRun {
        MigrationRun {
            config: self.config.clone(),
            direction,
            executor: PhaseExecutor::new(),
        }
    }
}

/// One apply or reverse pass over the operations of a migration.
#[derive(Debug)]
pub struct MigrationRun {
    config: SafetyConfig,
    direction: Direction,
    executor: PhaseExecutor,
}

impl MigrationRun {
    /// Direction of this pass.
    pub fn direction(&self) -> Direction {
        self.direction
    }

    /// Whether the enclosing transaction has been committed.
    pub fn transaction_disabled(&self) -> bool {
        self.executor.transaction().is_disabled()
    }

    /// Counters for the pass so far.
    pub fn stats(&self) -> ExecutionStats {
        self.executor.stats()
    }

    /// Build the plan for `op` without executing it.
    ///
    /// Returns `None` when the operation is passed through.
    pub fn plan<A: CapabilityAdapter + ?Sized>(
        &self,
        op: &OperationDescriptor,
        adapter: &A,
    ) -> Result<Option<(Strategy, PhasePlan)>, SafetyError> {
        let Some(strategy) = dispatch(op.kind, self.config.safe_by_default) else {
            return Ok(None);
        };
        let kind = adapter.database_kind();
        if kind != DatabaseKind::Postgres {
            debug!(?kind, operation = %op.kind, "not rewriting for this database");
            return Ok(None);
        }
        let plan = strategy.plan(op, adapter, &self.config)?;
        Ok(Some((strategy, plan)))
    }

    /// Rewrite and execute `op` in this run's direction.
    #[instrument(skip_all, fields(operation = %op.kind, table = %op.table, direction = %self.direction))]
    pub fn run<D: MigrationConnection + CapabilityAdapter + ?Sized>(
        &mut self,
        op: &OperationDescriptor,
        db: &mut D,
    ) -> Result<Outcome, SafetyError> {
        let Some((strategy, plan)) = self.plan(op, &*db)? else {
            return Ok(Outcome::Passthrough);
        };

        plan.check(self.direction)?;
        let phases = plan.phases(self.direction);
        if self.direction == Direction::Down && phases.is_empty() {
            return Err(SafetyError::Irreversible(format!(
                "{} on {} cannot be reverted",
                op.kind, op.table
            )));
        }

        info!(strategy = %strategy, phases = phases.len(), "running safe operation");
        self.executor.execute(phases, db)?;
        Ok(Outcome::Rewritten(strategy))
    }
}
