//! Check constraints, added `NOT VALID` and validated after the commit.

use crate::adapter::{CapabilityAdapter, ConstraintMatch};
use crate::error::SafetyError;
use crate::naming;
use crate::operation::{OperationDescriptor, Options, Subject};
use crate::plan::{Phase, PhasePlan};
use crate::statement::Statement;
use tracing::info;

pub(super) fn plan<A: CapabilityAdapter + ?Sized>(
    op: &OperationDescriptor,
    adapter: &A,
) -> Result<PhasePlan, SafetyError> {
    let Subject::Expression(expression) = &op.subject else {
        return Err(SafetyError::Configuration(format!(
            "{} requires an expression",
            op.kind
        )));
    };

    if op.options.get_bool("validate") == Some(false) {
        return Ok(PhasePlan::new()
            .apply(Phase::Run(Statement::AddCheckConstraint {
                table: op.table.clone(),
                expression: expression.clone(),
                options: op.options.clone(),
            }))
            .reverse(Phase::Run(Statement::RemoveCheckConstraint {
                table: op.table.clone(),
                expression: expression.clone(),
                options: op.options.without(&["validate", "if_not_exists"]),
            })));
    }

    let name = op
        .options
        .get_str("name")
        .map(str::to_string)
        .unwrap_or_else(|| naming::check_constraint_name(&op.table, expression));
    let add_options = op
        .options
        .without(&["if_not_exists"])
        .merged("name", name.as_str())
        .merged("validate", false);

    let validate = Statement::ValidateCheckConstraint {
        table: op.table.clone(),
        options: Options::new().with("name", name.as_str()),
    };
    let remove = Statement::RemoveCheckConstraint {
        table: op.table.clone(),
        expression: expression.clone(),
        options: add_options.without(&["validate"]),
    };

    let mut plan = PhasePlan::new();
    if adapter.constraint_exists(&op.table, &ConstraintMatch::Name(name.clone()), true)? {
        info!(constraint = %name, table = %op.table, "check constraint already exists, validating only");
    } else {
        plan = plan.apply(Phase::Run(Statement::AddCheckConstraint {
            table: op.table.clone(),
            expression: expression.clone(),
            options: add_options,
        }));
    }

    Ok(plan
        .apply(Phase::DisableTransaction)
        .apply(Phase::ValidateOrCompensate {
            object: format!("check constraint {name}"),
            validate,
            compensate: remove.clone(),
        })
        .reverse(Phase::Run(remove)))
}
