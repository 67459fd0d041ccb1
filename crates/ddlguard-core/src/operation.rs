//! Operation descriptors.
//!
//! An [`OperationDescriptor`] is the immutable description of one requested
//! schema change: its kind, target table, subject and options. Options are an
//! explicit key/value mapping whose recognized keys depend on the operation
//! kind; they are checked once, when the descriptor is built.

use crate::error::SafetyError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Kind of schema change requested by a migration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationKind {
    /// Create an index.
    AddIndex,
    /// Drop an index.
    RemoveIndex,
    /// Add a reference column (and optionally its foreign key).
    AddReference,
    /// Alias of [`OperationKind::AddReference`].
    AddBelongsTo,
    /// Add a foreign key constraint.
    AddForeignKey,
    /// Add a check constraint.
    AddCheckConstraint,
    /// Allow or disallow nulls in a column.
    ChangeColumnNull,
    /// Add a column.
    AddColumn,
    /// Drop a column.
    RemoveColumn,
    /// Change a column definition.
    ChangeColumn,
    /// Rename a column.
    RenameColumn,
    /// Drop a reference column.
    RemoveReference,
    /// Drop a foreign key constraint.
    RemoveForeignKey,
    /// Drop a check constraint.
    RemoveCheckConstraint,
    /// Create a table.
    CreateTable,
    /// Drop a table.
    DropTable,
    /// Raw SQL.
    Execute,
}

impl OperationKind {
    /// The migration method name for this kind.
    pub fn as_str(self) -> &'static str {
        match self {
            OperationKind::AddIndex => "add_index",
            OperationKind::RemoveIndex => "remove_index",
            OperationKind::AddReference => "add_reference",
            OperationKind::AddBelongsTo => "add_belongs_to",
            OperationKind::AddForeignKey => "add_foreign_key",
            OperationKind::AddCheckConstraint => "add_check_constraint",
            OperationKind::ChangeColumnNull => "change_column_null",
            OperationKind::AddColumn => "add_column",
            OperationKind::RemoveColumn => "remove_column",
            OperationKind::ChangeColumn => "change_column",
            OperationKind::RenameColumn => "rename_column",
            OperationKind::RemoveReference => "remove_reference",
            OperationKind::RemoveForeignKey => "remove_foreign_key",
            OperationKind::RemoveCheckConstraint => "remove_check_constraint",
            OperationKind::CreateTable => "create_table",
            OperationKind::DropTable => "drop_table",
            OperationKind::Execute => "execute",
        }
    }

    /// Option keys this kind accepts. `None` means options are not checked.
    pub fn recognized_options(self) -> Option<&'static [&'static str]> {
        match self {
            OperationKind::AddIndex => Some(&[
                "name",
                "unique",
                "where",
                "using",
                "order",
                "length",
                "opclass",
                "include",
                "nulls_not_distinct",
                "if_not_exists",
                "algorithm",
                "type",
                "comment",
            ]),
            OperationKind::RemoveIndex => Some(&["name", "column", "if_exists", "algorithm"]),
            OperationKind::AddReference | OperationKind::AddBelongsTo => Some(&[
                "type",
                "index",
                "foreign_key",
                "polymorphic",
                "null",
                "default",
                "comment",
                "if_not_exists",
            ]),
            OperationKind::AddForeignKey => Some(&[
                "column",
                "primary_key",
                "name",
                "on_delete",
                "on_update",
                "deferrable",
                "validate",
                "if_not_exists",
            ]),
            OperationKind::AddCheckConstraint => Some(&["name", "validate", "if_not_exists"]),
            OperationKind::ChangeColumnNull => Some(&["default"]),
            _ => None,
        }
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OperationKind {
    type Err = SafetyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let kind = match s {
            "add_index" => OperationKind::AddIndex,
            "remove_index" => OperationKind::RemoveIndex,
            "add_reference" => OperationKind::AddReference,
            "add_belongs_to" => OperationKind::AddBelongsTo,
            "add_foreign_key" => OperationKind::AddForeignKey,
            "add_check_constraint" => OperationKind::AddCheckConstraint,
            "change_column_null" => OperationKind::ChangeColumnNull,
            "add_column" => OperationKind::AddColumn,
            "remove_column" => OperationKind::RemoveColumn,
            "change_column" => OperationKind::ChangeColumn,
            "rename_column" => OperationKind::RenameColumn,
            "remove_reference" | "remove_belongs_to" => OperationKind::RemoveReference,
            "remove_foreign_key" => OperationKind::RemoveForeignKey,
            "remove_check_constraint" => OperationKind::RemoveCheckConstraint,
            "create_table" => OperationKind::CreateTable,
            "drop_table" => OperationKind::DropTable,
            "execute" => OperationKind::Execute,
            other => {
                return Err(SafetyError::Configuration(format!(
                    "unknown migration method `{other}`"
                )))
            }
        };
        Ok(kind)
    }
}

/// A single option value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OptionValue {
    /// Explicit null (`nil`).
    Null,
    /// Boolean flag.
    Bool(bool),
    /// Integer value.
    Int(i64),
    /// String or symbol value.
    Str(String),
    /// List of values.
    List(Vec<OptionValue>),
    /// Nested options.
    Map(Options),
}

impl OptionValue {
    /// The value as a string, if it is one.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            OptionValue::Str(s) => Some(s),
            _ => None,
        }
    }

    /// The value as a bool, if it is one.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            OptionValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// The value as nested options, if it is a map.
    pub fn as_map(&self) -> Option<&Options> {
        match self {
            OptionValue::Map(m) => Some(m),
            _ => None,
        }
    }

    /// Whether the value is an explicit null.
    pub fn is_null(&self) -> bool {
        matches!(self, OptionValue::Null)
    }

    /// Truthiness as the migration host sees it: everything except null and `false`.
    pub fn is_truthy(&self) -> bool {
        !matches!(self, OptionValue::Null | OptionValue::Bool(false))
    }

    /// A string or a list of strings, flattened.
    pub fn as_str_list(&self) -> Option<Vec<String>> {
        match self {
            OptionValue::Str(s) => Some(vec![s.clone()]),
            OptionValue::List(items) => items
                .iter()
                .map(|item| item.as_str().map(str::to_string))
                .collect(),
            _ => None,
        }
    }
}

impl From<bool> for OptionValue {
    fn from(value: bool) -> Self {
        OptionValue::Bool(value)
    }
}

impl From<i64> for OptionValue {
    fn from(value: i64) -> Self {
        OptionValue::Int(value)
    }
}

impl From<&str> for OptionValue {
    fn from(value: &str) -> Self {
        OptionValue::Str(value.to_string())
    }
}

impl From<String> for OptionValue {
    fn from(value: String) -> Self {
        OptionValue::Str(value)
    }
}

impl From<Vec<&str>> for OptionValue {
    fn from(value: Vec<&str>) -> Self {
        OptionValue::List(value.into_iter().map(OptionValue::from).collect())
    }
}

impl From<Options> for OptionValue {
    fn from(value: Options) -> Self {
        OptionValue::Map(value)
    }
}

/// Ordered option mapping passed alongside an operation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Options(BTreeMap<String, OptionValue>);

impl Options {
    /// Create an empty option mapping.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an option.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<OptionValue>) -> Self {
        self.0.insert(key.into(), value.into());
        self
    }

    /// Insert an option, returning the previous value.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<OptionValue>) -> Option<OptionValue> {
        self.0.insert(key.into(), value.into())
    }

    /// Get an option value.
    pub fn get(&self, key: &str) -> Option<&OptionValue> {
        self.0.get(key)
    }

    /// Get a string option.
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(OptionValue::as_str)
    }

    /// Get a boolean option.
    pub fn get_bool(&self, key: &str) -> Option<bool> {
        self.get(key).and_then(OptionValue::as_bool)
    }

    /// Check whether an option is present.
    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    /// Copy of these options without the given keys.
    pub fn without(&self, keys: &[&str]) -> Options {
        Options(
            self.0
                .iter()
                .filter(|(k, _)| !keys.contains(&k.as_str()))
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
        )
    }

    /// Copy of these options restricted to the given keys.
    pub fn slice(&self, keys: &[&str]) -> Options {
        Options(
            self.0
                .iter()
                .filter(|(k, _)| keys.contains(&k.as_str()))
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
        )
    }

    /// Copy of these options with one key set (overriding any existing value).
    pub fn merged(&self, key: impl Into<String>, value: impl Into<OptionValue>) -> Options {
        self.clone().with(key, value)
    }

    /// Iterate over options in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &OptionValue)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Number of options.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether there are no options.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// What an operation acts on, beyond its table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Subject {
    /// Index columns (may be empty for `remove_index` by name).
    Columns(Vec<String>),
    /// Check constraint expression.
    Expression(String),
    /// Reference name (`user` for `user_id`).
    Reference(String),
    /// Referenced table of a foreign key.
    Table(String),
    /// Column whose nullability changes.
    Column {
        /// Column name.
        name: String,
        /// `true` to allow nulls, `false` to disallow them.
        allow_null: bool,
    },
    /// No subject.
    None,
}

/// An immutable, validated description of one requested schema change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperationDescriptor {
    /// Kind of change.
    pub kind: OperationKind,
    /// Target table.
    pub table: String,
    /// Subject of the change.
    pub subject: Subject,
    /// Options passed with the change.
    pub options: Options,
}

const REFERENTIAL_ACTIONS: &[&str] = &["cascade", "nullify", "restrict"];

const REFERENCE_FOREIGN_KEY_OPTIONS: &[&str] = &[
    "to_table",
    "primary_key",
    "name",
    "on_delete",
    "on_update",
    "deferrable",
    "validate",
];

impl OperationDescriptor {
    /// Build and validate a descriptor.
    pub fn new(
        kind: OperationKind,
        table: impl Into<String>,
        subject: Subject,
        options: Options,
    ) -> Result<Self, SafetyError> {
        let descriptor = Self {
            kind,
            table: table.into(),
            subject,
            options,
        };
        descriptor.validate()?;
        Ok(descriptor)
    }

    /// `add_index(table, columns, **options)`.
    pub fn add_index<I, S>(table: &str, columns: I, options: Options) -> Result<Self, SafetyError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let columns = columns.into_iter().map(Into::into).collect();
        Self::new(OperationKind::AddIndex, table, Subject::Columns(columns), options)
    }

    /// `remove_index(table, columns, **options)`; columns may be empty when `name` is given.
    pub fn remove_index<I, S>(table: &str, columns: I, options: Options) -> Result<Self, SafetyError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let columns = columns.into_iter().map(Into::into).collect();
        Self::new(OperationKind::RemoveIndex, table, Subject::Columns(columns), options)
    }

    /// `add_reference(table, reference, **options)`.
    pub fn add_reference(table: &str, reference: &str, options: Options) -> Result<Self, SafetyError> {
        Self::new(
            OperationKind::AddReference,
            table,
            Subject::Reference(reference.to_string()),
            options,
        )
    }

    /// `add_belongs_to(table, reference, **options)`, an alias of `add_reference`.
    pub fn add_belongs_to(table: &str, reference: &str, options: Options) -> Result<Self, SafetyError> {
        Self::new(
            OperationKind::AddBelongsTo,
            table,
            Subject::Reference(reference.to_string()),
            options,
        )
    }

    /// `add_foreign_key(from_table, to_table, **options)`.
    pub fn add_foreign_key(from_table: &str, to_table: &str, options: Options) -> Result<Self, SafetyError> {
        Self::new(
            OperationKind::AddForeignKey,
            from_table,
            Subject::Table(to_table.to_string()),
            options,
        )
    }

    /// `add_check_constraint(table, expression, **options)`.
    pub fn add_check_constraint(table: &str, expression: &str, options: Options) -> Result<Self, SafetyError> {
        Self::new(
            OperationKind::AddCheckConstraint,
            table,
            Subject::Expression(expression.to_string()),
            options,
        )
    }

    /// `change_column_null(table, column, allow_null, default)`.
    pub fn change_column_null(
        table: &str,
        column: &str,
        allow_null: bool,
        options: Options,
    ) -> Result<Self, SafetyError> {
        Self::new(
            OperationKind::ChangeColumnNull,
            table,
            Subject::Column {
                name: column.to_string(),
                allow_null,
            },
            options,
        )
    }

    /// Index columns, when the subject is a column list.
    pub fn columns(&self) -> &[String] {
        match &self.subject {
            Subject::Columns(columns) => columns,
            _ => &[],
        }
    }

    fn validate(&self) -> Result<(), SafetyError> {
        if self.table.is_empty() {
            return Err(SafetyError::Configuration(format!(
                "{} requires a table name",
                self.kind
            )));
        }
        self.validate_subject()?;

        let Some(recognized) = self.kind.recognized_options() else {
            return Ok(());
        };
        for (key, value) in self.options.iter() {
            if !recognized.contains(&key) {
                return Err(SafetyError::UnknownOption {
                    kind: self.kind,
                    key: key.to_string(),
                });
            }
            self.validate_value(key, value)?;
        }
        Ok(())
    }

    fn validate_subject(&self) -> Result<(), SafetyError> {
        let ok = match (self.kind, &self.subject) {
            (OperationKind::AddIndex, Subject::Columns(columns)) => !columns.is_empty(),
            (OperationKind::RemoveIndex, Subject::Columns(columns)) => {
                !columns.is_empty()
                    || self.options.contains_key("name")
                    || self.options.contains_key("column")
            }
            (OperationKind::AddReference | OperationKind::AddBelongsTo, Subject::Reference(r)) => {
                !r.is_empty()
            }
            (OperationKind::AddForeignKey, Subject::Table(t)) => !t.is_empty(),
            (OperationKind::AddCheckConstraint, Subject::Expression(e)) => !e.is_empty(),
            (OperationKind::ChangeColumnNull, Subject::Column { name, .. }) => !name.is_empty(),
            (kind, _) if kind.recognized_options().is_none() => true,
            _ => false,
        };

        if ok {
            Ok(())
        } else {
            Err(SafetyError::Configuration(format!(
                "invalid subject {:?} for {}",
                self.subject, self.kind
            )))
        }
    }

    fn validate_value(&self, key: &str, value: &OptionValue) -> Result<(), SafetyError> {
        let invalid = |reason: &str| SafetyError::InvalidOption {
            kind: self.kind,
            key: key.to_string(),
            reason: reason.to_string(),
        };

        match key {
            "name" | "to_table" | "primary_key" | "where" | "using" | "type" | "comment" => {
                if value.as_str().is_none() {
                    return Err(invalid("expected a string"));
                }
            }
            "unique" | "if_not_exists" | "if_exists" | "validate" | "polymorphic" | "null"
            | "nulls_not_distinct" => {
                if value.as_bool().is_none() {
                    return Err(invalid("expected a boolean"));
                }
            }
            "column" | "include" => {
                if value.as_str_list().is_none() {
                    return Err(invalid("expected a column name or a list of column names"));
                }
            }
            "algorithm" => match value.as_str() {
                Some("concurrently" | "default") => {}
                _ => return Err(invalid("expected `concurrently` or `default`")),
            },
            "on_delete" | "on_update" => match value {
                OptionValue::Null => {}
                OptionValue::Str(action) if REFERENTIAL_ACTIONS.contains(&action.as_str()) => {}
                _ => return Err(invalid("expected one of cascade, nullify, restrict")),
            },
            "deferrable" => match value {
                OptionValue::Bool(_) => {}
                OptionValue::Str(mode) if mode == "immediate" || mode == "deferred" => {}
                _ => return Err(invalid("expected a boolean, `immediate` or `deferred`")),
            },
            "index" => {
                if value.as_bool().is_none() && value.as_map().is_none() {
                    return Err(invalid("expected a boolean or index options"));
                }
            }
            "foreign_key" => match value {
                OptionValue::Bool(_) => {}
                OptionValue::Map(fk) => {
                    for (fk_key, fk_value) in fk.iter() {
                        if !REFERENCE_FOREIGN_KEY_OPTIONS.contains(&fk_key) {
                            return Err(SafetyError::UnknownOption {
                                kind: self.kind,
                                key: format!("foreign_key.{fk_key}"),
                            });
                        }
                        self.validate_value(fk_key, fk_value)?;
                    }
                }
                _ => return Err(invalid("expected a boolean or foreign key options")),
            },
            _ => {}
        }
        Ok(())
    }
}
