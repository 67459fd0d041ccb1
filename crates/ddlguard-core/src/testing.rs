//! Recording connection for unit tests.

use crate::adapter::{CapabilityAdapter, ConstraintMatch, DatabaseKind};
use crate::connection::MigrationConnection;
use crate::error::StatementError;
use crate::statement::Statement;
use std::collections::{HashMap, HashSet};

/// Records every statement and answers capability probes from fixed facts.
#[derive(Debug)]
pub(crate) struct RecordingConnection {
    /// SQL and commits in execution order; assured statements are prefixed with `assured: `.
    pub events: Vec<String>,
    pub statements: Vec<Statement>,
    pub open_transactions: usize,
    pub commits: usize,
    pub fail_commit: bool,
    pub kind: DatabaseKind,
    pub server_version: u32,
    pub invalid_indexes: HashSet<String>,
    /// Existing constraint names, keyed by name or by column.
    pub constraints: HashMap<String, String>,
    failing: Vec<String>,
    assured: bool,
}

impl RecordingConnection {
    pub fn new() -> Self {
        Self {
            events: Vec::new(),
            statements: Vec::new(),
            open_transactions: 1,
            commits: 0,
            fail_commit: false,
            kind: DatabaseKind::Postgres,
            server_version: 160_002,
            invalid_indexes: HashSet::new(),
            constraints: HashMap::new(),
            failing: Vec::new(),
            assured: false,
        }
    }

    pub fn without_transaction(mut self) -> Self {
        self.open_transactions = 0;
        self
    }

    /// Fail every statement whose SQL contains `fragment`.
    pub fn fail_on(mut self, fragment: &str) -> Self {
        self.failing.push(fragment.to_string());
        self
    }

    /// Register an existing constraint under its name.
    pub fn with_constraint(mut self, name: &str) -> Self {
        self.constraints.insert(name.to_string(), name.to_string());
        self
    }

    /// Register an existing foreign key on `column` named `name`.
    pub fn with_foreign_key(mut self, column: &str, name: &str) -> Self {
        self.constraints.insert(column.to_string(), name.to_string());
        self.constraints.insert(name.to_string(), name.to_string());
        self
    }

    pub fn sql(&self) -> Vec<&str> {
        self.events.iter().map(String::as_str).collect()
    }
}

impl MigrationConnection for RecordingConnection {
    fn execute(&mut self, statement: &Statement) -> Result<(), StatementError> {
        let sql = statement.to_sql().join("; ");
        if self.failing.iter().any(|fragment| sql.contains(fragment.as_str())) {
            return Err(StatementError::new(sql, "injected failure"));
        }
        self.statements.push(statement.clone());
        if self.assured {
            self.events.push(format!("assured: {sql}"));
        } else {
            self.events.push(sql);
        }
        Ok(())
    }

    fn open_transactions(&self) -> usize {
        self.open_transactions
    }

    fn commit_db_transaction(&mut self) -> Result<(), StatementError> {
        if self.fail_commit {
            return Err(StatementError::new("COMMIT", "connection lost"));
        }
        self.open_transactions = 0;
        self.commits += 1;
        self.events.push("COMMIT".to_string());
        Ok(())
    }

    fn safety_assured(&self) -> bool {
        self.assured
    }

    fn set_safety_assured(&mut self, assured: bool) {
        self.assured = assured;
    }
}

impl CapabilityAdapter for RecordingConnection {
    fn database_kind(&self) -> DatabaseKind {
        self.kind
    }

    fn server_version_num(&self) -> Result<u32, StatementError> {
        Ok(self.server_version)
    }

    fn index_is_invalid(&self, name: &str) -> Result<bool, StatementError> {
        Ok(self.invalid_indexes.contains(name))
    }

    fn find_constraint(
        &self,
        _table: &str,
        matching: &ConstraintMatch,
        _include_invalid: bool,
    ) -> Result<Option<String>, StatementError> {
        let key = match matching {
            ConstraintMatch::Name(name) => name,
            ConstraintMatch::Column(column) => column,
        };
        Ok(self.constraints.get(key).cloned())
    }
}
