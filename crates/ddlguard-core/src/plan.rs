//! Phase plans.
//!
//! A strategy turns one operation into a [`PhasePlan`]: the phases to run when
//! the migration is applied and the phases to run when it is reverted.

use crate::error::SafetyError;
use crate::statement::Statement;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Direction of a migration run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    /// Apply (`up`).
    Up,
    /// Revert (`down`).
    Down,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Up => write!(f, "up"),
            Direction::Down => write!(f, "down"),
        }
    }
}

/// A single phase of a plan.
#[derive(Debug, Clone, PartialEq)]
pub enum Phase {
    /// Execute a statement.
    Run(Statement),
    /// Commit the enclosing transaction if it is still open.
    DisableTransaction,
    /// Execute `validate`; if the database rejects it, execute `compensate`
    /// and fail with the validation error.
    ValidateOrCompensate {
        /// Human-readable name of the object being validated.
        object: String,
        /// The validation statement.
        validate: Statement,
        /// The removal run when validation fails.
        compensate: Statement,
    },
    /// Run the inner phases with the connection marked as safety-assured.
    SafetyAssured(Vec<Phase>),
}

impl Phase {
    /// Short human-readable description.
    pub fn description(&self) -> String {
        match self {
            Phase::Run(statement) => statement.description(),
            Phase::DisableTransaction => "Disable transaction".to_string(),
            Phase::ValidateOrCompensate { object, .. } => format!("Validate {object}"),
            Phase::SafetyAssured(phases) => format!("Safety assured ({} phases)", phases.len()),
        }
    }
}

/// Apply and reverse phases for one operation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PhasePlan {
    /// Phases run when applying.
    pub apply: Vec<Phase>,
    /// Phases run when reverting.
    pub reverse: Vec<Phase>,
    /// Why applying is refused, when only the reverse direction can run.
    pub apply_rejected: Option<String>,
}

impl PhasePlan {
    /// Create an empty plan.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an apply phase.
    pub fn apply(mut self, phase: Phase) -> Self {
        self.apply.push(phase);
        self
    }

    /// Append a reverse phase.
    pub fn reverse(mut self, phase: Phase) -> Self {
        self.reverse.push(phase);
        self
    }

    /// Refuse to apply, keeping the reverse phases usable.
    pub fn reject_apply(mut self, reason: impl Into<String>) -> Self {
        self.apply_rejected = Some(reason.into());
        self
    }

    /// Fail with a configuration error if `direction` is refused.
    pub fn check(&self, direction: Direction) -> Result<(), SafetyError> {
        match (direction, &self.apply_rejected) {
            (Direction::Up, Some(reason)) => Err(SafetyError::Configuration(reason.clone())),
            _ => Ok(()),
        }
    }

    /// Phases for a direction.
    pub fn phases(&self, direction: Direction) -> &[Phase] {
        match direction {
            Direction::Up => &self.apply,
            Direction::Down => &self.reverse,
        }
    }

    /// Whether the plan can be reverted.
    pub fn is_reversible(&self) -> bool {
        !self.reverse.is_empty()
    }

    /// Statements a direction would execute when every validation succeeds,
    /// in order. Compensating statements are not included.
    pub fn statements(&self, direction: Direction) -> Vec<&Statement> {
        fn collect<'a>(phases: &'a [Phase], out: &mut Vec<&'a Statement>) {
            for phase in phases {
                match phase {
                    Phase::Run(statement) => out.push(statement),
                    Phase::DisableTransaction => {}
                    Phase::ValidateOrCompensate { validate, .. } => out.push(validate),
                    Phase::SafetyAssured(inner) => collect(inner, out),
                }
            }
        }

        let mut out = Vec::new();
        collect(self.phases(direction), &mut out);
        out
    }
}
