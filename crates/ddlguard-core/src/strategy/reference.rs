//! Reference columns.
//!
//! The column is added after the transaction is committed so its index can
//! be built concurrently. A requested foreign key is added as its own
//! statement, which the host may in turn rewrite.

use crate::config::SafetyConfig;
use crate::error::SafetyError;
use crate::naming;
use crate::operation::{OperationDescriptor, OptionValue, Options, Subject};
use crate::plan::{Phase, PhasePlan};
use crate::statement::Statement;

pub(super) fn plan(op: &OperationDescriptor, config: &SafetyConfig) -> Result<PhasePlan, SafetyError> {
    let Subject::Reference(reference) = &op.subject else {
        return Err(SafetyError::Configuration(format!(
            "{} requires a reference name",
            op.kind
        )));
    };

    let polymorphic = op.options.get_bool("polymorphic") == Some(true);
    let foreign_key = op
        .options
        .get("foreign_key")
        .filter(|fk| fk.is_truthy())
        .cloned();
    if polymorphic && foreign_key.is_some() {
        return Err(SafetyError::Configuration(
            "cannot add a foreign key to a polymorphic reference".to_string(),
        ));
    }

    let mut options = op.options.without(&["foreign_key"]);
    match options.get("index").cloned().unwrap_or(OptionValue::Bool(true)) {
        OptionValue::Map(index) => {
            options.insert("index", index.merged("algorithm", "concurrently"));
        }
        index if index.is_truthy() => {
            options.insert("index", Options::new().with("algorithm", "concurrently"));
        }
        _ => {}
    }

    let mut plan = PhasePlan::new()
        .apply(Phase::DisableTransaction)
        .apply(Phase::Run(Statement::AddReference {
            table: op.table.clone(),
            reference: reference.clone(),
            options,
        }));

    if let Some(foreign_key) = foreign_key {
        let fk_options = foreign_key.as_map().cloned().unwrap_or_default();
        let to_table = match fk_options.get_str("to_table") {
            Some(to_table) => to_table.to_string(),
            None if config.pluralize_table_names => naming::pluralize(reference),
            None => reference.clone(),
        };
        plan = plan.apply(Phase::Run(Statement::AddForeignKey {
            from_table: op.table.clone(),
            to_table,
            options: fk_options
                .without(&["to_table"])
                .merged("column", naming::reference_column(reference)),
        }));
    }

    Ok(plan.reverse(Phase::Run(Statement::RemoveReference {
        table: op.table.clone(),
        reference: reference.clone(),
        options: op.options.slice(&["polymorphic"]),
    })))
}
