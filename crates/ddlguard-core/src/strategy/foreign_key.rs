//! Foreign keys.
//!
//! The constraint is added `NOT VALID`, which only locks the tables briefly,
//! then validated outside the transaction. Validation scans the table without
//! blocking writes.

use crate::adapter::{CapabilityAdapter, ConstraintMatch};
use crate::error::SafetyError;
use crate::operation::{OperationDescriptor, Options, Subject};
use crate::plan::{Phase, PhasePlan};
use crate::statement::Statement;
use tracing::info;

pub(super) fn plan<A: CapabilityAdapter + ?Sized>(
    op: &OperationDescriptor,
    adapter: &A,
) -> Result<PhasePlan, SafetyError> {
    let Subject::Table(to_table) = &op.subject else {
        return Err(SafetyError::Configuration(format!(
            "{} requires a referenced table",
            op.kind
        )));
    };

    // Column and name identify the constraint for validation and removal.
    let identity = op.options.slice(&["column", "name"]);
    let remove = |options: Options| Statement::RemoveForeignKey {
        from_table: op.table.clone(),
        to_table: to_table.clone(),
        options,
    };

    if op.options.get_bool("validate") == Some(false) {
        return Ok(PhasePlan::new()
            .apply(Phase::Run(Statement::AddForeignKey {
                from_table: op.table.clone(),
                to_table: to_table.clone(),
                options: op.options.clone(),
            }))
            .reverse(Phase::Run(remove(identity))));
    }

    let add = Statement::AddForeignKey {
        from_table: op.table.clone(),
        to_table: to_table.clone(),
        options: op
            .options
            .without(&["if_not_exists"])
            .merged("validate", false),
    };

    let matching = match op.options.get_str("name") {
        Some(name) => ConstraintMatch::Name(name.to_string()),
        None => ConstraintMatch::Column(add.foreign_key_column().unwrap_or_default()),
    };

    // An existing constraint is validated and removed under its own name.
    let mut plan = PhasePlan::new();
    let (name, identity) = match adapter.find_constraint(&op.table, &matching, true)? {
        Some(existing) => {
            info!(constraint = %existing, table = %op.table, "foreign key already exists, validating only");
            let identity = identity.merged("name", existing.as_str());
            (existing, identity)
        }
        None => {
            let name = add.constraint_name().unwrap_or_default();
            plan = plan.apply(Phase::Run(add));
            (name, identity)
        }
    };

    let validate = Statement::ValidateForeignKey {
        from_table: op.table.clone(),
        to_table: to_table.clone(),
        options: identity.clone(),
    };

    Ok(plan
        .apply(Phase::DisableTransaction)
        .apply(Phase::ValidateOrCompensate {
            object: format!("foreign key {name}"),
            validate,
            compensate: remove(identity.clone()),
        })
        .reverse(Phase::Run(remove(identity))))
}
