//! Database engines and their SQL generators.
//!
//! Each engine module owns a [`SqlGenerator`] (quoting, placeholders,
//! literals) and a static interpreter table that the
//! [`registry::Registry`] assembles at startup.

pub mod common;
pub mod cockroach;
pub mod mysql;
pub mod postgres;
pub mod registry;
pub mod sqlite;

use std::fmt;
use std::str::FromStr;

use serde::Deserialize;

use crate::error::QuarryError;

pub use registry::{Interpreter, Node, NodeKind, Registry, Scope};

use cockroach::CockroachGenerator;
use mysql::MysqlGenerator;
use postgres::PostgresGenerator;
use sqlite::SqliteGenerator;

/// Supported database engines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Engine {
    #[serde(alias = "mariadb")]
    MySql,
    #[serde(alias = "postgresql")]
    Postgres,
    Sqlite,
    #[serde(rename = "cockroachdb", alias = "cockroach")]
    Cockroach,
}

impl Engine {
    pub const ALL: [Engine; 4] = [Engine::MySql, Engine::Postgres, Engine::Sqlite, Engine::Cockroach];

    pub fn generator(&self) -> &'static dyn SqlGenerator {
        match self {
            Engine::MySql => &MysqlGenerator,
            Engine::Postgres => &PostgresGenerator,
            Engine::Sqlite => &SqliteGenerator,
            Engine::Cockroach => &CockroachGenerator,
        }
    }

    /// URL scheme of the sqlx driver that serves this engine.
    pub fn url_scheme(&self) -> &'static str {
        match self {
            Engine::MySql => "mysql",
            Engine::Postgres | Engine::Cockroach => "postgres",
            Engine::Sqlite => "sqlite",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Engine::MySql => "mysql",
            Engine::Postgres => "postgres",
            Engine::Sqlite => "sqlite",
            Engine::Cockroach => "cockroachdb",
        }
    }
}

impl fmt::Display for Engine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Engine {
    type Err = QuarryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "mysql" | "mariadb" => Ok(Engine::MySql),
            "postgres" | "postgresql" => Ok(Engine::Postgres),
            "sqlite" => Ok(Engine::Sqlite),
            "cockroachdb" | "cockroach" => Ok(Engine::Cockroach),
            other => Err(QuarryError::Config(format!("unknown database type '{}'", other))),
        }
    }
}

/// SQL reserved words that must be quoted when used as identifiers.
const RESERVED_WORDS: &[&str] = &[
    "order", "group", "user", "table", "select", "from", "where", "join",
    "left", "right", "inner", "outer", "on", "and", "or", "not", "null",
    "true", "false", "limit", "offset", "as", "in", "is", "like", "between",
    "having", "union", "all", "distinct", "case", "when", "then", "else", "end",
    "create", "alter", "drop", "insert", "update", "delete", "index", "key",
    "primary", "foreign", "references", "default", "constraint", "check",
    "set", "values", "column", "to", "by", "desc", "asc", "cascade",
];

/// Trait for dialect-specific SQL generation.
pub trait SqlGenerator: Send + Sync {
    fn engine(&self) -> Engine;

    /// Quote an identifier unconditionally.
    fn quote_identifier(&self, name: &str) -> String;

    /// Generate the parameter placeholder (e.g., $1, ?) for a 1-based index.
    fn placeholder(&self, index: usize) -> String;

    /// Get the boolean literal (true/false vs 1/0).
    fn bool_literal(&self, val: bool) -> String {
        if val { "TRUE".to_string() } else { "FALSE".to_string() }
    }

    /// Escape an identifier if it's a reserved word or contains special
    /// chars. Dotted names are escaped part by part; `*` passes through.
    fn escape_identifier(&self, name: &str) -> String {
        name.split('.')
            .map(|part| {
                let lower = part.to_lowercase();
                let needs_escaping = RESERVED_WORDS.contains(&lower.as_str())
                    || part.chars().any(|c| !c.is_alphanumeric() && c != '_')
                    || part.chars().next().map(|c| c.is_numeric()).unwrap_or(false);
                if part == "*" || !needs_escaping {
                    part.to_string()
                } else {
                    self.quote_identifier(part)
                }
            })
            .collect::<Vec<_>>()
            .join(".")
    }

    /// Single-quoted string literal for DDL, where binding is unavailable.
    fn string_literal(&self, val: &str) -> String {
        format!("'{}'", val.replace('\'', "''"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape_only_when_needed() {
        let mysql = Engine::MySql.generator();
        assert_eq!(mysql.escape_identifier("users"), "users");
        assert_eq!(mysql.escape_identifier("order"), "`order`");
        assert_eq!(mysql.escape_identifier("users.id"), "users.id");
        assert_eq!(mysql.escape_identifier("users.*"), "users.*");

        let pg = Engine::Postgres.generator();
        assert_eq!(pg.escape_identifier("user"), "\"user\"");
        assert_eq!(pg.escape_identifier("first name"), "\"first name\"");
        assert_eq!(pg.escape_identifier("2fa"), "\"2fa\"");
    }

    #[test]
    fn test_placeholders() {
        assert_eq!(Engine::MySql.generator().placeholder(3), "?");
        assert_eq!(Engine::Sqlite.generator().placeholder(3), "?");
        assert_eq!(Engine::Postgres.generator().placeholder(3), "$3");
        assert_eq!(Engine::Cockroach.generator().placeholder(3), "$3");
    }

    #[test]
    fn test_engine_parse() {
        assert_eq!("MariaDB".parse::<Engine>().unwrap(), Engine::MySql);
        assert_eq!("postgresql".parse::<Engine>().unwrap(), Engine::Postgres);
        assert_eq!("cockroachdb".parse::<Engine>().unwrap(), Engine::Cockroach);
        assert!("oracle".parse::<Engine>().is_err());
    }

    #[test]
    fn test_string_literal_escapes_quotes() {
        assert_eq!(Engine::Sqlite.generator().string_literal("it's"), "'it''s'");
    }
}
