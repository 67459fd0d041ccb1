//! Operation strategies.
//!
//! Each strategy knows how to turn one kind of risky operation into a
//! [`PhasePlan`] that avoids long exclusive locks. The dispatcher decides
//! which operations are rewritten at all.

mod check_constraint;
mod foreign_key;
mod index;
mod nullability;
mod reference;

use crate::adapter::CapabilityAdapter;
use crate::config::SafetyConfig;
use crate::error::SafetyError;
use crate::operation::{OperationDescriptor, OperationKind};
use crate::plan::PhasePlan;
use std::fmt;

/// The rewrite applied to an operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Strategy {
    /// Concurrent index builds and removals.
    Index,
    /// Reference columns with a concurrent index and optional foreign key.
    Reference,
    /// Foreign keys added unvalidated, then validated.
    ForeignKey,
    /// Check constraints added unvalidated, then validated.
    CheckConstraint,
    /// `NOT NULL` through a validated check constraint.
    Nullability,
}

/// Select the strategy for an operation kind.
///
/// Returns `None` when safe-by-default is off or the kind is not rewritten;
/// such operations run unchanged.
pub fn dispatch(kind: OperationKind, safe_by_default: bool) -> Option<Strategy> {
    if !safe_by_default {
        return None;
    }
    match kind {
        OperationKind::AddIndex | OperationKind::RemoveIndex => Some(Strategy::Index),
        OperationKind::AddReference | OperationKind::AddBelongsTo => Some(Strategy::Reference),
        OperationKind::AddForeignKey => Some(Strategy::ForeignKey),
        OperationKind::AddCheckConstraint => Some(Strategy::CheckConstraint),
        OperationKind::ChangeColumnNull => Some(Strategy::Nullability),
        _ => None,
    }
}

impl Strategy {
    /// Build the apply and reverse phases for `op`.
    ///
    /// Capability probes run here, before anything is executed.
    pub fn plan<A: CapabilityAdapter + ?Sized>(
        self,
        op: &OperationDescriptor,
        adapter: &A,
        config: &SafetyConfig,
    ) -> Result<PhasePlan, SafetyError> {
        if dispatch(op.kind, true) != Some(self) {
            return Err(SafetyError::Configuration(format!(
                "{} is not handled by the {} strategy",
                op.kind, self
            )));
        }
        match self {
            Strategy::Index => index::plan(op, adapter),
            Strategy::Reference => reference::plan(op, config),
            Strategy::ForeignKey => foreign_key::plan(op, adapter),
            Strategy::CheckConstraint => check_constraint::plan(op, adapter),
            Strategy::Nullability => nullability::plan(op, adapter),
        }
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Strategy::Index => "index",
            Strategy::Reference => "reference",
            Strategy::ForeignKey => "foreign key",
            Strategy::CheckConstraint => "check constraint",
            Strategy::Nullability => "nullability",
        };
        f.write_str(name)
    }
}
