//! `NOT NULL` without a full-table lock.
//!
//! Setting `NOT NULL` directly scans the table under an exclusive lock. An
//! `IS NOT NULL` check constraint can be added `NOT VALID` and validated
//! without blocking writes. From PostgreSQL 12 a validated constraint lets
//! `SET NOT NULL` skip the scan, after which the constraint is dropped.
//! Older servers keep the constraint in place of the column attribute.

use crate::adapter::{CapabilityAdapter, ConstraintMatch, NOT_NULL_FROM_CHECK_MIN_VERSION};
use crate::error::SafetyError;
use crate::naming;
use crate::operation::{OperationDescriptor, Options, Subject};
use crate::plan::{Phase, PhasePlan};
use crate::render::quote_identifier;
use crate::statement::Statement;
use tracing::debug;

pub(super) fn plan<A: CapabilityAdapter + ?Sized>(
    op: &OperationDescriptor,
    adapter: &A,
) -> Result<PhasePlan, SafetyError> {
    let Subject::Column { name: column, allow_null } = &op.subject else {
        return Err(SafetyError::Configuration(format!(
            "{} requires a column",
            op.kind
        )));
    };
    let default = op.options.get("default").filter(|d| !d.is_null()).cloned();

    let change = |allow_null: bool, default| Statement::ChangeColumnNull {
        table: op.table.clone(),
        column: column.clone(),
        allow_null,
        default,
    };

    if *allow_null {
        return Ok(PhasePlan::new()
            .apply(Phase::Run(change(true, default)))
            .reverse(Phase::Run(change(false, None))));
    }
    if default.is_some() {
        return Ok(PhasePlan::new()
            .reject_apply("default value not supported yet with safe_by_default")
            .reverse(Phase::Run(change(true, None))));
    }

    let constraint = naming::not_null_constraint_name(&op.table, column);
    let expression = format!("{} IS NOT NULL", quote_identifier(column));
    let identity = Options::new().with("name", constraint.as_str());
    let remove = Statement::RemoveCheckConstraint {
        table: op.table.clone(),
        expression: expression.clone(),
        options: identity.clone(),
    };

    let mut guarded = Vec::new();
    if !adapter.constraint_exists(&op.table, &ConstraintMatch::Name(constraint.clone()), true)? {
        guarded.push(Phase::Run(Statement::AddCheckConstraint {
            table: op.table.clone(),
            expression,
            options: identity.merged("validate", false),
        }));
    }
    guarded.push(Phase::DisableTransaction);
    guarded.push(Phase::ValidateOrCompensate {
        object: format!("check constraint {constraint}"),
        validate: Statement::ValidateCheckConstraint {
            table: op.table.clone(),
            options: identity,
        },
        compensate: remove.clone(),
    });

    let plan = PhasePlan::new().apply(Phase::SafetyAssured(guarded));

    let server_version = adapter.server_version_num()?;
    if server_version >= NOT_NULL_FROM_CHECK_MIN_VERSION {
        Ok(plan
            .apply(Phase::Run(change(false, None)))
            .apply(Phase::SafetyAssured(vec![Phase::Run(remove)]))
            .reverse(Phase::Run(change(true, None))))
    } else {
        debug!(server_version, constraint = %constraint, "keeping check constraint in place of NOT NULL");
        Ok(plan.reverse(Phase::SafetyAssured(vec![Phase::Run(remove)])))
    }
}
