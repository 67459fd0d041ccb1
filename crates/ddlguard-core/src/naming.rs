//! Object naming conventions.
//!
//! Default index, constraint and column names follow the migration host's
//! conventions exactly, so that an object created by an earlier (possibly
//! failed) run is found again under the same name.

use once_cell::sync::Lazy;
use regex::Regex;
use sha2::{Digest, Sha256};

/// Default index name: `index_<table>_on_<col>_and_<col>`.
pub fn index_name<S: AsRef<str>>(table: &str, columns: &[S]) -> String {
    let columns: Vec<&str> = columns.iter().map(AsRef::as_ref).collect();
    format!("index_{}_on_{}", table, columns.join("_and_"))
}

/// Column holding a reference: `<reference>_id`.
pub fn reference_column(reference: &str) -> String {
    format!("{reference}_id")
}

/// Default foreign key column for a referenced table: `<singular table>_id`.
pub fn foreign_key_column(to_table: &str) -> String {
    format!("{}_id", singularize(to_table))
}

/// Default foreign key name: `fk_rails_<10 hex chars>`.
pub fn foreign_key_name(table: &str, column: &str) -> String {
    format!("fk_rails_{}", hashed_identifier(&format!("{table}_{column}_fk")))
}

/// Default check constraint name: `chk_rails_<10 hex chars>`.
pub fn check_constraint_name(table: &str, expression: &str) -> String {
    format!("chk_rails_{}", hashed_identifier(&format!("{table}_{expression}_chk")))
}

/// Name of the temporary check constraint backing a NOT NULL change.
pub fn not_null_constraint_name(table: &str, column: &str) -> String {
    format!("{table}_{column}_null")
}

fn hashed_identifier(identifier: &str) -> String {
    let digest = hex::encode(Sha256::digest(identifier.as_bytes()));
    digest[..10].to_string()
}

type Rules = Vec<(Regex, &'static str)>;

// Rule tables are static; a pattern that fails to compile is a bug.
fn compile(rules: &[(&str, &'static str)]) -> Rules {
    rules
        .iter()
        .map(|(pattern, replacement)| {
            let regex = Regex::new(&format!("(?i){pattern}"))
                .unwrap_or_else(|e| panic!("invalid inflection rule {pattern}: {e}"));
            (regex, *replacement)
        })
        .collect()
}

// Highest precedence first.
static PLURALS: Lazy<Rules> = Lazy::new(|| {
    compile(&[
        ("(quiz)$", "${1}zes"),
        ("^(oxen)$", "${1}"),
        ("^(ox)$", "${1}en"),
        ("^(m|l)ice$", "${1}ice"),
        ("^(m|l)ouse$", "${1}ice"),
        ("(matr|vert|ind)(?:ix|ex)$", "${1}ices"),
        ("(x|ch|ss|sh)$", "${1}es"),
        ("([^aeiouy]|qu)y$", "${1}ies"),
        ("(hive)$", "${1}s"),
        ("(?:([^f])fe|([lr])f)$", "${1}${2}ves"),
        ("sis$", "ses"),
        ("([ti])a$", "${1}a"),
        ("([ti])um$", "${1}a"),
        ("(buffal|tomat)o$", "${1}oes"),
        ("(bu)s$", "${1}ses"),
        ("(alias|status)(es)?$", "${1}es"),
        ("(octop|vir)(us|i)$", "${1}i"),
        ("(ax|test)is$", "${1}es"),
        ("s$", "s"),
        ("$", "s"),
    ])
});

static SINGULARS: Lazy<Rules> = Lazy::new(|| {
    compile(&[
        ("(database)s$", "${1}"),
        ("(quiz)zes$", "${1}"),
        ("(matr)ices$", "${1}ix"),
        ("(vert|ind)ices$", "${1}ex"),
        ("^(ox)en", "${1}"),
        ("(alias|status)(es)?$", "${1}"),
        ("(octop|vir)(us|i)$", "${1}us"),
        ("^(a)x[ie]s$", "${1}xis"),
        ("(cris|test)(is|es)$", "${1}is"),
        ("(shoe)s$", "${1}"),
        ("(o)es$", "${1}"),
        ("(bus)(es)?$", "${1}"),
        ("^(m|l)ice$", "${1}ouse"),
        ("(x|ch|ss|sh)es$", "${1}"),
        ("(m)ovies$", "${1}ovie"),
        ("(s)eries$", "${1}eries"),
        ("([^aeiouy]|qu)ies$", "${1}y"),
        ("([lr])ves$", "${1}f"),
        ("(tive)s$", "${1}"),
        ("(hive)s$", "${1}"),
        ("([^f])ves$", "${1}fe"),
        ("(^analy)(sis|ses)$", "${1}sis"),
        ("((a)naly|(b)a|(d)iagno|(p)arenthe|(p)rogno|(s)ynop|(t)he)(sis|ses)$", "${1}sis"),
        ("([ti])a$", "${1}um"),
        ("(n)ews$", "${1}ews"),
        ("(ss)$", "${1}"),
        ("s$", ""),
    ])
});

const IRREGULARS: &[(&str, &str)] = &[
    ("person", "people"),
    ("man", "men"),
    ("child", "children"),
    ("sex", "sexes"),
    ("move", "moves"),
    ("zombie", "zombies"),
];

const UNCOUNTABLES: &[&str] = &[
    "equipment",
    "information",
    "rice",
    "money",
    "species",
    "series",
    "fish",
    "sheep",
    "jeans",
    "police",
];

/// Pluralize the last word of a snake_case name.
pub fn pluralize(word: &str) -> String {
    inflect(word, &PLURALS, |(singular, plural)| (singular, plural))
}

/// Singularize the last word of a snake_case name.
pub fn singularize(word: &str) -> String {
    inflect(word, &SINGULARS, |(singular, plural)| (plural, singular))
}

fn inflect(
    word: &str,
    rules: &Rules,
    direction: impl Fn((&'static str, &'static str)) -> (&'static str, &'static str),
) -> String {
    let (prefix, last) = match word.rfind('_') {
        Some(at) => word.split_at(at + 1),
        None => ("", word),
    };
    let lower = last.to_lowercase();

    if last.is_empty() || UNCOUNTABLES.contains(&lower.as_str()) {
        return word.to_string();
    }

    for irregular in IRREGULARS {
        let (from, to) = direction(*irregular);
        if lower == from {
            return format!("{prefix}{to}");
        }
    }

    for (regex, replacement) in rules.iter() {
        if regex.is_match(last) {
            return format!("{prefix}{}", regex.replace(last, *replacement));
        }
    }
    word.to_string()
}
