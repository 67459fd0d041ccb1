//! Typed DDL statements executed by the migration host.

use crate::naming;
use crate::operation::{OptionValue, Options};
use serde::{Deserialize, Serialize};

/// One schema statement the host connection executes.
///
/// Options are the (already stripped) options of the phase that emits the
/// statement; names that are not given explicitly are derived with
/// [`crate::naming`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "statement", rename_all = "snake_case")]
pub enum Statement {
    /// Create an index.
    AddIndex {
        table: String,
        columns: Vec<String>,
        options: Options,
    },
    /// Drop an index.
    RemoveIndex {
        table: String,
        columns: Vec<String>,
        options: Options,
    },
    /// Add a reference column (and its index). Foreign keys are separate statements.
    AddReference {
        table: String,
        reference: String,
        options: Options,
    },
    /// Drop a reference column, with its index and foreign key.
    RemoveReference {
        table: String,
        reference: String,
        options: Options,
    },
    /// Add a foreign key constraint.
    AddForeignKey {
        from_table: String,
        to_table: String,
        options: Options,
    },
    /// Validate a foreign key constraint.
    ValidateForeignKey {
        from_table: String,
        to_table: String,
        options: Options,
    },
    /// Drop a foreign key constraint.
    RemoveForeignKey {
        from_table: String,
        to_table: String,
        options: Options,
    },
    /// Add a check constraint.
    AddCheckConstraint {
        table: String,
        expression: String,
        options: Options,
    },
    /// Validate a check constraint.
    ValidateCheckConstraint { table: String, options: Options },
    /// Drop a check constraint.
    RemoveCheckConstraint {
        table: String,
        expression: String,
        options: Options,
    },
    /// Allow or disallow nulls in a column.
    ChangeColumnNull {
        table: String,
        column: String,
        allow_null: bool,
        default: Option<OptionValue>,
    },
}

impl Statement {
    /// Table the statement acts on.
    pub fn table(&self) -> &str {
        match self {
            Statement::AddIndex { table, .. }
            | Statement::RemoveIndex { table, .. }
            | Statement::AddReference { table, .. }
            | Statement::RemoveReference { table, .. }
            | Statement::AddCheckConstraint { table, .. }
            | Statement::ValidateCheckConstraint { table, .. }
            | Statement::RemoveCheckConstraint { table, .. }
            | Statement::ChangeColumnNull { table, .. } => table,
            Statement::AddForeignKey { from_table, .. }
            | Statement::ValidateForeignKey { from_table, .. }
            | Statement::RemoveForeignKey { from_table, .. } => from_table,
        }
    }

    /// Options carried by the statement.
    pub fn options(&self) -> Option<&Options> {
        match self {
            Statement::AddIndex { options, .. }
            | Statement::RemoveIndex { options, .. }
            | Statement::AddReference { options, .. }
            | Statement::RemoveReference { options, .. }
            | Statement::AddForeignKey { options, .. }
            | Statement::ValidateForeignKey { options, .. }
            | Statement::RemoveForeignKey { options, .. }
            | Statement::AddCheckConstraint { options, .. }
            | Statement::ValidateCheckConstraint { options, .. }
            | Statement::RemoveCheckConstraint { options, .. } => Some(options),
            Statement::ChangeColumnNull { .. } => None,
        }
    }

    /// Whether the statement requests a non-blocking (concurrent) build or drop.
    pub fn is_concurrent(&self) -> bool {
        self.options()
            .and_then(|options| options.get_str("algorithm"))
            .is_some_and(|algorithm| algorithm == "concurrently")
    }

    /// Index name for index statements: explicit `name`, else derived from the columns.
    pub fn index_name(&self) -> Option<String> {
        match self {
            Statement::AddIndex {
                table,
                columns,
                options,
            }
            | Statement::RemoveIndex {
                table,
                columns,
                options,
            } => {
                if let Some(name) = options.get_str("name") {
                    return Some(name.to_string());
                }
                let columns = match options.get("column").and_then(OptionValue::as_str_list) {
                    Some(columns) => columns,
                    None => columns.clone(),
                };
                (!columns.is_empty()).then(|| naming::index_name(table, &columns))
            }
            _ => None,
        }
    }

    /// Constrained column of a foreign key statement: explicit `column`, else derived.
    pub fn foreign_key_column(&self) -> Option<String> {
        match self {
            Statement::AddForeignKey {
                to_table, options, ..
            }
            | Statement::ValidateForeignKey {
                to_table, options, ..
            }
            | Statement::RemoveForeignKey {
                to_table, options, ..
            } => Some(
                options
                    .get("column")
                    .and_then(OptionValue::as_str_list)
                    .map(|columns| columns.join("_"))
                    .unwrap_or_else(|| naming::foreign_key_column(to_table)),
            ),
            _ => None,
        }
    }

    /// Constraint name for constraint statements: explicit `name`, else derived.
    ///
    /// A check constraint validated without an explicit name has no name.
    pub fn constraint_name(&self) -> Option<String> {
        match self {
            Statement::AddForeignKey {
                from_table, options, ..
            }
            | Statement::ValidateForeignKey {
                from_table, options, ..
            }
            | Statement::RemoveForeignKey {
                from_table, options, ..
            } => match options.get_str("name") {
                Some(name) => Some(name.to_string()),
                None => self
                    .foreign_key_column()
                    .map(|column| naming::foreign_key_name(from_table, &column)),
            },
            Statement::AddCheckConstraint {
                table,
                expression,
                options,
            }
            | Statement::RemoveCheckConstraint {
                table,
                expression,
                options,
            } => Some(
                options
                    .get_str("name")
                    .map(str::to_string)
                    .unwrap_or_else(|| naming::check_constraint_name(table, expression)),
            ),
            Statement::ValidateCheckConstraint { options, .. } => {
                options.get_str("name").map(str::to_string)
            }
            _ => None,
        }
    }

    /// Short human-readable description.
    pub fn description(&self) -> String {
        match self {
            Statement::AddIndex { table, .. } => format!(
                "Add index '{}' on '{}'",
                self.index_name().unwrap_or_default(),
                table
            ),
            Statement::RemoveIndex { table, .. } => format!(
                "Remove index '{}' from '{}'",
                self.index_name().unwrap_or_default(),
                table
            ),
            Statement::AddReference {
                table, reference, ..
            } => format!("Add reference '{}.{}'", table, reference),
            Statement::RemoveReference {
                table, reference, ..
            } => format!("Remove reference '{}.{}'", table, reference),
            Statement::AddForeignKey {
                from_table,
                to_table,
                ..
            } => format!(
                "Add foreign key '{}' from '{}' to '{}'",
                self.constraint_name().unwrap_or_default(),
                from_table,
                to_table
            ),
            Statement::ValidateForeignKey { from_table, .. } => format!(
                "Validate foreign key '{}' on '{}'",
                self.constraint_name().unwrap_or_default(),
                from_table
            ),
            Statement::RemoveForeignKey { from_table, .. } => format!(
                "Remove foreign key '{}' from '{}'",
                self.constraint_name().unwrap_or_default(),
                from_table
            ),
            Statement::AddCheckConstraint { table, .. } => format!(
                "Add check constraint '{}' on '{}'",
                self.constraint_name().unwrap_or_default(),
                table
            ),
            Statement::ValidateCheckConstraint { table, .. } => format!(
                "Validate check constraint '{}' on '{}'",
                self.constraint_name().unwrap_or_default(),
                table
            ),
            Statement::RemoveCheckConstraint { table, .. } => format!(
                "Remove check constraint '{}' from '{}'",
                self.constraint_name().unwrap_or_default(),
                table
            ),
            Statement::ChangeColumnNull {
                table,
                column,
                allow_null,
                ..
            } => {
                if *allow_null {
                    format!("Allow nulls in '{}.{}'", table, column)
                } else {
                    format!("Disallow nulls in '{}.{}'", table, column)
                }
            }
        }
    }
}
