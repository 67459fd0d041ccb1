//! PostgreSQL rendering of [`Statement`]s.
//!
//! ```
//! use ddlguard_core::{Options, Statement};
//!
//! let validate = Statement::ValidateCheckConstraint {
//!     table: "users".into(),
//!     options: Options::new().with("name", "users_name_null"),
//! };
//! assert_eq!(
//!     validate.to_sql(),
//!     vec![r#"ALTER TABLE "users" VALIDATE CONSTRAINT "users_name_null""#.to_string()]
//! );
//! ```

use crate::naming;
use crate::operation::{OptionValue, Options};
use crate::statement::Statement;
use std::fmt::{self, Display};

/// A quoted PostgreSQL identifier.
struct Ident<'a>(&'a str);

impl Display for Ident<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "\"{}\"", self.0.replace('"', "\"\""))
    }
}

/// A comma separated list of quoted identifiers.
struct IdentList<'a>(&'a [String]);

impl Display for IdentList<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, name) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            Ident(name).fmt(f)?;
        }
        Ok(())
    }
}

/// A literal value.
struct Literal<'a>(&'a OptionValue);

impl Display for Literal<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            OptionValue::Null => f.write_str("NULL"),
            OptionValue::Bool(true) => f.write_str("TRUE"),
            OptionValue::Bool(false) => f.write_str("FALSE"),
            OptionValue::Int(i) => write!(f, "{i}"),
            OptionValue::Str(s) => write!(f, "'{}'", s.replace('\'', "''")),
            OptionValue::List(_) | OptionValue::Map(_) => f.write_str("NULL"),
        }
    }
}

/// Quote an identifier for use inside an expression.
pub fn quote_identifier(name: &str) -> String {
    Ident(name).to_string()
}

fn referential_action(action: &str) -> &'static str {
    match action {
        "cascade" => "CASCADE",
        "nullify" => "SET NULL",
        _ => "RESTRICT",
    }
}

struct CreateIndex<'a> {
    name: &'a str,
    table: &'a str,
    columns: &'a [String],
    options: &'a Options,
}

impl CreateIndex<'_> {
    fn column_suffix(&self, key: &str, column: &str) -> Option<String> {
        match self.options.get(key)? {
            OptionValue::Str(all) => Some(all.clone()),
            OptionValue::Map(per_column) => per_column.get_str(column).map(str::to_string),
            _ => None,
        }
    }
}

impl Display for CreateIndex<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("CREATE ")?;
        if self.options.get_bool("unique") == Some(true) {
            f.write_str("UNIQUE ")?;
        }
        f.write_str("INDEX ")?;
        if self.options.get_str("algorithm") == Some("concurrently") {
            f.write_str("CONCURRENTLY ")?;
        }
        if self.options.get_bool("if_not_exists") == Some(true) {
            f.write_str("IF NOT EXISTS ")?;
        }
        write!(f, "{} ON {}", Ident(self.name), Ident(self.table))?;
        if let Some(using) = self.options.get_str("using") {
            write!(f, " USING {using}")?;
        }

        f.write_str(" (")?;
        for (i, column) in self.columns.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            Ident(column).fmt(f)?;
            if let Some(opclass) = self.column_suffix("opclass", column) {
                write!(f, " {opclass}")?;
            }
            if let Some(order) = self.column_suffix("order", column) {
                write!(f, " {}", order.to_uppercase())?;
            }
        }
        f.write_str(")")?;

        if let Some(include) = self.options.get("include").and_then(OptionValue::as_str_list) {
            write!(f, " INCLUDE ({})", IdentList(&include))?;
        }
        if self.options.get_bool("nulls_not_distinct") == Some(true) {
            f.write_str(" NULLS NOT DISTINCT")?;
        }
        if let Some(predicate) = self.options.get_str("where") {
            write!(f, " WHERE {predicate}")?;
        }
        Ok(())
    }
}

struct DropIndex<'a> {
    name: &'a str,
    options: &'a Options,
}

impl Display for DropIndex<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("DROP INDEX ")?;
        if self.options.get_str("algorithm") == Some("concurrently") {
            f.write_str("CONCURRENTLY ")?;
        }
        if self.options.get_bool("if_exists") == Some(true) {
            f.write_str("IF EXISTS ")?;
        }
        Ident(self.name).fmt(f)
    }
}

struct ForeignKey<'a> {
    from_table: &'a str,
    to_table: &'a str,
    name: &'a str,
    columns: &'a [String],
    options: &'a Options,
}

impl Display for ForeignKey<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let primary_key = self.options.get_str("primary_key").unwrap_or("id");
        write!(
            f,
            "ALTER TABLE {} ADD CONSTRAINT {} FOREIGN KEY ({}) REFERENCES {} ({})",
            Ident(self.from_table),
            Ident(self.name),
            IdentList(self.columns),
            Ident(self.to_table),
            Ident(primary_key),
        )?;

        if let Some(action) = self.options.get_str("on_delete") {
            write!(f, " ON DELETE {}", referential_action(action))?;
        }
        if let Some(action) = self.options.get_str("on_update") {
            write!(f, " ON UPDATE {}", referential_action(action))?;
        }
        match self.options.get("deferrable") {
            Some(OptionValue::Bool(true)) => f.write_str(" DEFERRABLE")?,
            Some(OptionValue::Str(mode)) => {
                write!(f, " DEFERRABLE INITIALLY {}", mode.to_uppercase())?
            }
            _ => {}
        }
        if self.options.get_bool("validate") == Some(false) {
            f.write_str(" NOT VALID")?;
        }
        Ok(())
    }
}

fn alter_constraint(table: &str, verb: &str, name: &str) -> String {
    format!("ALTER TABLE {} {} CONSTRAINT {}", Ident(table), verb, Ident(name))
}

fn reference_columns(reference: &str, options: &Options) -> Vec<String> {
    let mut columns = Vec::new();
    if options.get_bool("polymorphic") == Some(true) {
        columns.push(format!("{reference}_type"));
    }
    columns.push(naming::reference_column(reference));
    columns
}

impl Statement {
    /// Render the statement as PostgreSQL DDL, one string per SQL statement.
    pub fn to_sql(&self) -> Vec<String> {
        match self {
            Statement::AddIndex {
                table,
                columns,
                options,
            } => {
                let name = self.index_name().unwrap_or_default();
                vec![CreateIndex {
                    name: &name,
                    table,
                    columns,
                    options,
                }
                .to_string()]
            }
            Statement::RemoveIndex { options, .. } => {
                let name = self.index_name().unwrap_or_default();
                vec![DropIndex {
                    name: &name,
                    options,
                }
                .to_string()]
            }
            Statement::AddReference {
                table,
                reference,
                options,
            } => {
                let mut sql = Vec::new();
                if options.get_bool("polymorphic") == Some(true) {
                    sql.push(format!(
                        "ALTER TABLE {} ADD {} character varying",
                        Ident(table),
                        Ident(&format!("{reference}_type"))
                    ));
                }

                let mut column = format!(
                    "ALTER TABLE {} ADD {} {}",
                    Ident(table),
                    Ident(&naming::reference_column(reference)),
                    options.get_str("type").unwrap_or("bigint")
                );
                if let Some(default) = options.get("default").filter(|d| !d.is_null()) {
                    column.push_str(&format!(" DEFAULT {}", Literal(default)));
                }
                if options.get_bool("null") == Some(false) {
                    column.push_str(" NOT NULL");
                }
                sql.push(column);

                let index = options.get("index").cloned().unwrap_or(OptionValue::Bool(true));
                if index.is_truthy() {
                    let columns = reference_columns(reference, options);
                    let index_options = index.as_map().cloned().unwrap_or_default();
                    let name = index_options
                        .get_str("name")
                        .map(str::to_string)
                        .unwrap_or_else(|| naming::index_name(table, &columns));
                    sql.push(
                        CreateIndex {
                            name: &name,
                            table,
                            columns: &columns,
                            options: &index_options,
                        }
                        .to_string(),
                    );
                }
                sql
            }
            Statement::RemoveReference {
                table,
                reference,
                options,
            } => reference_columns(reference, options)
                .iter()
                .rev()
                .map(|column| format!("ALTER TABLE {} DROP COLUMN {}", Ident(table), Ident(column)))
                .collect(),
            Statement::AddForeignKey {
                from_table,
                to_table,
                options,
            } => {
                let name = self.constraint_name().unwrap_or_default();
                let columns = options
                    .get("column")
                    .and_then(OptionValue::as_str_list)
                    .unwrap_or_else(|| vec![naming::foreign_key_column(to_table)]);
                vec![ForeignKey {
                    from_table,
                    to_table,
                    name: &name,
                    columns: &columns,
                    options,
                }
                .to_string()]
            }
            Statement::ValidateForeignKey { from_table, .. } => vec![alter_constraint(
                from_table,
                "VALIDATE",
                &self.constraint_name().unwrap_or_default(),
            )],
            Statement::RemoveForeignKey { from_table, .. } => vec![alter_constraint(
                from_table,
                "DROP",
                &self.constraint_name().unwrap_or_default(),
            )],
            Statement::AddCheckConstraint {
                table,
                expression,
                options,
            } => {
                let mut sql = format!(
                    "ALTER TABLE {} ADD CONSTRAINT {} CHECK ({})",
                    Ident(table),
                    Ident(&self.constraint_name().unwrap_or_default()),
                    expression
                );
                if options.get_bool("validate") == Some(false) {
                    sql.push_str(" NOT VALID");
                }
                vec![sql]
            }
            Statement::ValidateCheckConstraint { table, .. } => vec![alter_constraint(
                table,
                "VALIDATE",
                &self.constraint_name().unwrap_or_default(),
            )],
            Statement::RemoveCheckConstraint { table, .. } => vec![alter_constraint(
                table,
                "DROP",
                &self.constraint_name().unwrap_or_default(),
            )],
            Statement::ChangeColumnNull {
                table,
                column,
                allow_null,
                default,
            } => {
                let mut sql = Vec::new();
                if let Some(default) = default.as_ref().filter(|d| !d.is_null()) {
                    sql.push(format!(
                        "UPDATE {table} SET {column}={value} WHERE {column} IS NULL",
                        table = Ident(table),
                        column = Ident(column),
                        value = Literal(default)
                    ));
                }
                sql.push(format!(
                    "ALTER TABLE {} ALTER COLUMN {} {} NOT NULL",
                    Ident(table),
                    Ident(column),
                    if *allow_null { "DROP" } else { "SET" }
                ));
                sql
            }
        }
    }
}
