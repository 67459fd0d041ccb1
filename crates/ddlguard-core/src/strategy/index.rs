//! Concurrent index builds and removals.

use crate::adapter::CapabilityAdapter;
use crate::error::SafetyError;
use crate::naming;
use crate::operation::{OperationDescriptor, OperationKind, OptionValue, Options};
use crate::plan::{Phase, PhasePlan};
use crate::statement::Statement;
use tracing::info;

pub(super) fn plan<A: CapabilityAdapter + ?Sized>(
    op: &OperationDescriptor,
    adapter: &A,
) -> Result<PhasePlan, SafetyError> {
    match op.kind {
        OperationKind::AddIndex => plan_add(op, adapter),
        _ => Ok(plan_remove(op)),
    }
}

fn concurrent_removal(table: &str, name: &str) -> Statement {
    Statement::RemoveIndex {
        table: table.to_string(),
        columns: Vec::new(),
        options: Options::new()
            .with("name", name)
            .with("algorithm", "concurrently"),
    }
}

fn plan_add<A: CapabilityAdapter + ?Sized>(
    op: &OperationDescriptor,
    adapter: &A,
) -> Result<PhasePlan, SafetyError> {
    let columns = op.columns().to_vec();
    let name = op
        .options
        .get_str("name")
        .map(str::to_string)
        .unwrap_or_else(|| naming::index_name(&op.table, &columns));

    let mut plan = PhasePlan::new();

    // A failed concurrent build leaves an invalid index behind under the same name.
    if adapter.index_is_invalid(&name)? {
        info!(index = %name, table = %op.table, "dropping invalid index left by an earlier build");
        plan = plan
            .apply(Phase::DisableTransaction)
            .apply(Phase::Run(concurrent_removal(&op.table, &name)));
    }

    let add = Statement::AddIndex {
        table: op.table.clone(),
        columns,
        options: op.options.merged("algorithm", "concurrently"),
    };

    Ok(plan
        .apply(Phase::DisableTransaction)
        .apply(Phase::Run(add))
        .reverse(Phase::DisableTransaction)
        .reverse(Phase::Run(concurrent_removal(&op.table, &name))))
}

fn plan_remove(op: &OperationDescriptor) -> PhasePlan {
    let remove = Statement::RemoveIndex {
        table: op.table.clone(),
        columns: op.columns().to_vec(),
        options: op.options.merged("algorithm", "concurrently"),
    };
    let plan = PhasePlan::new()
        .apply(Phase::DisableTransaction)
        .apply(Phase::Run(remove));

    let columns = if op.columns().is_empty() {
        op.options
            .get("column")
            .and_then(OptionValue::as_str_list)
            .unwrap_or_default()
    } else {
        op.columns().to_vec()
    };
    if columns.is_empty() {
        // Removal by name alone: nothing to rebuild the index from.
        return plan;
    }

    let restore = Statement::AddIndex {
        table: op.table.clone(),
        columns,
        options: op
            .options
            .without(&["column", "if_exists"])
            .merged("algorithm", "concurrently"),
    };
    plan.reverse(Phase::DisableTransaction)
        .reverse(Phase::Run(restore))
}
