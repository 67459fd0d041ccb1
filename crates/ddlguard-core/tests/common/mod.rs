//! In-memory PostgreSQL stand-in for integration tests.
//!
//! Executes typed statements against tables of integer rows and keeps the
//! catalog facts the engine probes for: index validity, constraint validity,
//! the enclosing transaction and the safety-assured marker.

#![allow(dead_code)]

use ddlguard_core::{
    CapabilityAdapter, ConstraintMatch, DatabaseKind, MigrationConnection, OptionValue, Statement,
    StatementError,
};
use std::collections::BTreeMap;
use tracing_subscriber::EnvFilter;

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

pub type Row = BTreeMap<String, Option<i64>>;

#[derive(Debug, Clone, Default)]
pub struct Table {
    /// Column name to nullability.
    pub columns: BTreeMap<String, bool>,
    pub rows: Vec<Row>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Index {
    pub table: String,
    pub columns: Vec<String>,
    pub unique: bool,
    pub valid: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ConstraintKind {
    Check {
        expression: String,
    },
    ForeignKey {
        columns: Vec<String>,
        to_table: String,
        primary_key: String,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Constraint {
    pub table: String,
    pub kind: ConstraintKind,
    pub valid: bool,
}

/// Observable schema state, for before/after comparisons.
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    pub columns: BTreeMap<String, BTreeMap<String, bool>>,
    pub indexes: BTreeMap<String, Index>,
    pub constraints: BTreeMap<String, Constraint>,
}

#[derive(Debug)]
pub struct MemoryDatabase {
    pub kind: DatabaseKind,
    pub server_version: u32,
    pub tables: BTreeMap<String, Table>,
    pub indexes: BTreeMap<String, Index>,
    pub constraints: BTreeMap<String, Constraint>,
    pub open_transactions: usize,
    pub commits: usize,
    /// Executed SQL; statements run while safety-assured are prefixed with `assured: `.
    pub log: Vec<String>,
    failing: Vec<String>,
    assured: bool,
}

fn error(statement: &Statement, code: &str, message: impl Into<String>) -> StatementError {
    StatementError::new(statement.to_sql().join("; "), message).with_code(code)
}

fn check_passes(expression: &str, row: &Row) -> bool {
    let expression = expression.replace('"', "");
    if let Some(column) = expression.strip_suffix(" IS NOT NULL") {
        return row.get(column.trim()).is_some_and(Option::is_some);
    }

    let parts: Vec<&str> = expression.split_whitespace().collect();
    let [column, op, literal] = parts.as_slice() else {
        panic!("unsupported check expression: {expression}");
    };
    let literal: i64 = literal.parse().expect("integer literal");
    let Some(Some(value)) = row.get(*column) else {
        // NULL satisfies a check constraint.
        return true;
    };
    match *op {
        ">" => *value > literal,
        ">=" => *value >= literal,
        "<" => *value < literal,
        "<=" => *value <= literal,
        "=" => *value == literal,
        other => panic!("unsupported operator: {other}"),
    }
}

impl MemoryDatabase {
    pub fn new() -> Self {
        Self {
            kind: DatabaseKind::Postgres,
            server_version: 160_002,
            tables: BTreeMap::new(),
            indexes: BTreeMap::new(),
            constraints: BTreeMap::new(),
            open_transactions: 1,
            commits: 0,
            log: Vec::new(),
            failing: Vec::new(),
            assured: false,
        }
    }

    pub fn with_table(mut self, name: &str, columns: &[&str]) -> Self {
        let table = Table {
            columns: columns.iter().map(|c| (c.to_string(), true)).collect(),
            rows: Vec::new(),
        };
        self.tables.insert(name.to_string(), table);
        self
    }

    pub fn with_row(mut self, table: &str, values: &[(&str, Option<i64>)]) -> Self {
        let row = values.iter().map(|(c, v)| (c.to_string(), *v)).collect();
        self.tables.get_mut(table).expect("table").rows.push(row);
        self
    }

    /// Fail every statement whose SQL contains `fragment`.
    pub fn fail_on(mut self, fragment: &str) -> Self {
        self.failing.push(fragment.to_string());
        self
    }

    /// Overwrite one cell of an existing row.
    pub fn update(&mut self, table: &str, row: usize, column: &str, value: Option<i64>) {
        let table = self.tables.get_mut(table).expect("table");
        table.rows[row].insert(column.to_string(), value);
    }

    pub fn insert(&mut self, table: &str, values: &[(&str, Option<i64>)]) {
        let row = values.iter().map(|(c, v)| (c.to_string(), *v)).collect();
        self.tables.get_mut(table).expect("table").rows.push(row);
    }

    pub fn clear_failures(&mut self) {
        self.failing.clear();
    }

    /// Start the implicit transaction of the next migration run.
    pub fn begin_transaction(&mut self) {
        self.open_transactions = 1;
    }

    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            columns: self
                .tables
                .iter()
                .map(|(name, table)| (name.clone(), table.columns.clone()))
                .collect(),
            indexes: self.indexes.clone(),
            constraints: self.constraints.clone(),
        }
    }

    pub fn sql(&self) -> Vec<&str> {
        self.log.iter().map(String::as_str).collect()
    }

    pub fn index(&self, name: &str) -> Option<&Index> {
        self.indexes.get(name)
    }

    pub fn constraint(&self, name: &str) -> Option<&Constraint> {
        self.constraints.get(name)
    }

    fn table(&self, statement: &Statement, name: &str) -> Result<&Table, StatementError> {
        self.tables
            .get(name)
            .ok_or_else(|| error(statement, "42P01", format!("relation \"{name}\" does not exist")))
    }

    fn table_mut(&mut self, statement: &Statement, name: &str) -> Result<&mut Table, StatementError> {
        self.tables
            .get_mut(name)
            .ok_or_else(|| error(statement, "42P01", format!("relation \"{name}\" does not exist")))
    }

    fn check_violation(&self, statement: &Statement, name: &str, constraint: &Constraint) -> Result<(), StatementError> {
        let table = self.table(statement, &constraint.table)?;
        match &constraint.kind {
            ConstraintKind::Check { expression } => {
                if table.rows.iter().any(|row| !check_passes(expression, row)) {
                    return Err(error(
                        statement,
                        "23514",
                        format!("check constraint \"{name}\" of relation \"{}\" is violated by some row", constraint.table),
                    ));
                }
            }
            ConstraintKind::ForeignKey {
                columns,
                to_table,
                primary_key,
            } => {
                let target = self.table(statement, to_table)?;
                let column = &columns[0];
                let dangling = table.rows.iter().any(|row| {
                    let Some(Some(value)) = row.get(column) else {
                        return false;
                    };
                    !target
                        .rows
                        .iter()
                        .any(|t| t.get(primary_key) == Some(&Some(*value)))
                });
                if dangling {
                    return Err(error(
                        statement,
                        "23503",
                        format!(
                            "insert or update on table \"{}\" violates foreign key constraint \"{name}\"",
                            constraint.table
                        ),
                    ));
                }
            }
        }
        Ok(())
    }

    fn build_index(&mut self, statement: &Statement, name: String, index: Index, concurrent: bool) -> Result<(), StatementError> {
        if concurrent && self.open_transactions > 0 {
            return Err(error(
                statement,
                "25001",
                "CREATE INDEX CONCURRENTLY cannot run inside a transaction block",
            ));
        }
        let table = self.table(statement, &index.table)?;
        let duplicate = index.unique && {
            let mut seen = Vec::new();
            table.rows.iter().any(|row| {
                let key: Vec<Option<i64>> = index.columns.iter().map(|c| row.get(c).copied().flatten()).collect();
                if key.iter().any(Option::is_none) {
                    return false;
                }
                if seen.contains(&key) {
                    return true;
                }
                seen.push(key);
                false
            })
        };
        if duplicate {
            if concurrent {
                self.indexes.insert(name.clone(), Index { valid: false, ..index });
            }
            return Err(error(
                statement,
                "23505",
                format!("could not create unique index \"{name}\""),
            ));
        }
        self.indexes.insert(name, index);
        Ok(())
    }

    fn apply(&mut self, statement: &Statement) -> Result<(), StatementError> {
        match statement {
            Statement::AddIndex { table, columns, options } => {
                let name = statement.index_name().unwrap_or_default();
                if self.indexes.contains_key(&name) {
                    if options.get_bool("if_not_exists") == Some(true) {
                        return Ok(());
                    }
                    return Err(error(statement, "42P07", format!("relation \"{name}\" already exists")));
                }
                let index = Index {
                    table: table.clone(),
                    columns: columns.clone(),
                    unique: options.get_bool("unique") == Some(true),
                    valid: true,
                };
                self.build_index(statement, name, index, statement.is_concurrent())
            }
            Statement::RemoveIndex { options, .. } => {
                if statement.is_concurrent() && self.open_transactions > 0 {
                    return Err(error(
                        statement,
                        "25001",
                        "DROP INDEX CONCURRENTLY cannot run inside a transaction block",
                    ));
                }
                let name = statement.index_name().unwrap_or_default();
                if self.indexes.remove(&name).is_none() && options.get_bool("if_exists") != Some(true) {
                    return Err(error(statement, "42704", format!("index \"{name}\" does not exist")));
                }
                Ok(())
            }
            Statement::AddReference { table, reference, options } => {
                let polymorphic = options.get_bool("polymorphic") == Some(true);
                let mut columns = Vec::new();
                if polymorphic {
                    columns.push(format!("{reference}_type"));
                }
                columns.push(format!("{reference}_id"));

                let nullable = options.get_bool("null") != Some(false);
                let default = match options.get("default") {
                    Some(OptionValue::Int(value)) => Some(*value),
                    _ => None,
                };
                let target = self.table_mut(statement, table)?;
                if !nullable && default.is_none() && !target.rows.is_empty() {
                    return Err(error(statement, "23502", format!("column \"{reference}_id\" contains null values")));
                }
                for column in &columns {
                    target.columns.insert(column.clone(), nullable);
                    for row in &mut target.rows {
                        row.insert(column.clone(), default);
                    }
                }

                let index = options.get("index").cloned().unwrap_or(OptionValue::Bool(true));
                if index.is_truthy() {
                    let index_options = index.as_map().cloned().unwrap_or_default();
                    let name = index_options
                        .get_str("name")
                        .map(str::to_string)
                        .unwrap_or_else(|| ddlguard_core::naming::index_name(table, &columns));
                    let concurrent = index_options.get_str("algorithm") == Some("concurrently");
                    let index = Index {
                        table: table.clone(),
                        columns,
                        unique: index_options.get_bool("unique") == Some(true),
                        valid: true,
                    };
                    self.build_index(statement, name, index, concurrent)?;
                }
                Ok(())
            }
            Statement::RemoveReference { table, reference, options } => {
                let mut columns = vec![format!("{reference}_id")];
                if options.get_bool("polymorphic") == Some(true) {
                    columns.push(format!("{reference}_type"));
                }
                let target = self.table_mut(statement, table)?;
                for column in &columns {
                    target.columns.remove(column);
                    for row in &mut target.rows {
                        row.remove(column);
                    }
                }
                self.indexes
                    .retain(|_, index| !(index.table == *table && index.columns.iter().any(|c| columns.contains(c))));
                self.constraints.retain(|_, constraint| match &constraint.kind {
                    ConstraintKind::ForeignKey { columns: fk, .. } => {
                        !(constraint.table == *table && fk.iter().any(|c| columns.contains(c)))
                    }
                    ConstraintKind::Check { .. } => true,
                });
                Ok(())
            }
            Statement::AddForeignKey { from_table, to_table, options } => {
                let name = statement.constraint_name().unwrap_or_default();
                if self.constraints.contains_key(&name) {
                    return Err(error(statement, "42710", format!("constraint \"{name}\" already exists")));
                }
                let columns = options
                    .get("column")
                    .and_then(OptionValue::as_str_list)
                    .unwrap_or_else(|| vec![statement.foreign_key_column().unwrap_or_default()]);
                let constraint = Constraint {
                    table: from_table.clone(),
                    kind: ConstraintKind::ForeignKey {
                        columns,
                        to_table: to_table.clone(),
                        primary_key: options.get_str("primary_key").unwrap_or("id").to_string(),
                    },
                    valid: options.get_bool("validate") != Some(false),
                };
                self.add_constraint(statement, name, constraint)
            }
            Statement::AddCheckConstraint { table, expression, options } => {
                let name = statement.constraint_name().unwrap_or_default();
                if self.constraints.contains_key(&name) {
                    return Err(error(statement, "42710", format!("constraint \"{name}\" already exists")));
                }
                let constraint = Constraint {
                    table: table.clone(),
                    kind: ConstraintKind::Check {
                        expression: expression.clone(),
                    },
                    valid: options.get_bool("validate") != Some(false),
                };
                self.add_constraint(statement, name, constraint)
            }
            Statement::ValidateForeignKey { .. } | Statement::ValidateCheckConstraint { .. } => {
                let name = statement.constraint_name().unwrap_or_default();
                let constraint = self
                    .constraints
                    .get(&name)
                    .cloned()
                    .ok_or_else(|| error(statement, "42704", format!("constraint \"{name}\" does not exist")))?;
                self.check_violation(statement, &name, &constraint)?;
                if let Some(constraint) = self.constraints.get_mut(&name) {
                    constraint.valid = true;
                }
                Ok(())
            }
            Statement::RemoveForeignKey { .. } | Statement::RemoveCheckConstraint { .. } => {
                let name = statement.constraint_name().unwrap_or_default();
                match self.constraints.remove(&name) {
                    Some(_) => Ok(()),
                    None => Err(error(statement, "42704", format!("constraint \"{name}\" does not exist"))),
                }
            }
            Statement::ChangeColumnNull { table, column, allow_null, default } => {
                let default = match default {
                    Some(OptionValue::Int(value)) => Some(*value),
                    _ => None,
                };
                let target = self.table_mut(statement, table)?;
                if !target.columns.contains_key(column) {
                    return Err(error(statement, "42703", format!("column \"{column}\" does not exist")));
                }
                if let Some(value) = default {
                    for row in &mut target.rows {
                        let cell = row.entry(column.clone()).or_insert(None);
                        if cell.is_none() {
                            *cell = Some(value);
                        }
                    }
                }
                if !allow_null && target.rows.iter().any(|row| row.get(column).copied().flatten().is_none()) {
                    return Err(error(statement, "23502", format!("column \"{column}\" contains null values")));
                }
                target.columns.insert(column.clone(), *allow_null);
                Ok(())
            }
        }
    }

    fn add_constraint(&mut self, statement: &Statement, name: String, constraint: Constraint) -> Result<(), StatementError> {
        self.table(statement, &constraint.table)?;
        if constraint.valid {
            self.check_violation(statement, &name, &constraint)?;
        }
        self.constraints.insert(name, constraint);
        Ok(())
    }
}

impl MigrationConnection for MemoryDatabase {
    fn execute(&mut self, statement: &Statement) -> Result<(), StatementError> {
        let sql = statement.to_sql().join("; ");
        if self.failing.iter().any(|fragment| sql.contains(fragment.as_str())) {
            return Err(StatementError::new(sql, "injected failure"));
        }
        self.apply(statement)?;
        if self.assured {
            self.log.push(format!("assured: {sql}"));
        } else {
            self.log.push(sql);
        }
        Ok(())
    }

    fn open_transactions(&self) -> usize {
        self.open_transactions
    }

    fn commit_db_transaction(&mut self) -> Result<(), StatementError> {
        self.open_transactions = 0;
        self.commits += 1;
        self.log.push("COMMIT".to_string());
        Ok(())
    }

    fn safety_assured(&self) -> bool {
        self.assured
    }

    fn set_safety_assured(&mut self, assured: bool) {
        self.assured = assured;
    }
}

impl CapabilityAdapter for MemoryDatabase {
    fn database_kind(&self) -> DatabaseKind {
        self.kind
    }

    fn server_version_num(&self) -> Result<u32, StatementError> {
        Ok(self.server_version)
    }

    fn index_is_invalid(&self, name: &str) -> Result<bool, StatementError> {
        Ok(self.indexes.get(name).is_some_and(|index| !index.valid))
    }

    fn find_constraint(
        &self,
        table: &str,
        matching: &ConstraintMatch,
        include_invalid: bool,
    ) -> Result<Option<String>, StatementError> {
        Ok(self
            .constraints
            .iter()
            .find(|(name, constraint)| {
                if constraint.table != table || !(include_invalid || constraint.valid) {
                    return false;
                }
                match (matching, &constraint.kind) {
                    (ConstraintMatch::Name(wanted), _) => *name == wanted,
                    (ConstraintMatch::Column(column), ConstraintKind::ForeignKey { columns, .. }) => {
                        columns.join("_") == *column
                    }
                    (ConstraintMatch::Column(_), ConstraintKind::Check { .. }) => false,
                }
            })
            .map(|(name, _)| name.clone()))
    }
}
