//! SQLite.

use super::common::{self, one};
use super::registry::{InterpreterTable, Node, NodeKind, expect_node};
use super::{Engine, SqlGenerator};
use crate::error::{QuarryError, QuarryResult};
use crate::migrate::schema::{Column, ColumnType};
use crate::sql::clauses;
use crate::sql::fragment::Fragment;

/// SQLite Generator.
pub struct SqliteGenerator;

impl SqlGenerator for SqliteGenerator {
    fn engine(&self) -> Engine {
        Engine::Sqlite
    }

    fn quote_identifier(&self, name: &str) -> String {
        format!("\"{}\"", name.replace('"', "\"\""))
    }

    fn placeholder(&self, _index: usize) -> String {
        "?".to_string()
    }

    fn bool_literal(&self, val: bool) -> String {
        if val { "1".to_string() } else { "0".to_string() }
    }
}

pub const INTERPRETERS: InterpreterTable = &[
    (NodeKind::Select, common::select),
    (NodeKind::Join, common::join),
    (NodeKind::Where, common::where_),
    (NodeKind::GroupBy, common::group_by),
    (NodeKind::OrderBy, common::order_by),
    (NodeKind::Pagination, pagination),
    (NodeKind::Lock, common::nothing),
    (NodeKind::Insert, common::insert),
    (NodeKind::Update, common::update),
    (NodeKind::Delete, common::delete),
    (NodeKind::Upsert, common::upsert_on_conflict),
    (NodeKind::Returning, common::returning_all),
    (NodeKind::CreateTable, create_table),
    (NodeKind::AlterTable, alter_table),
    (NodeKind::DropColumns, drop_columns),
    (NodeKind::DropTable, common::drop_table),
    (NodeKind::Truncate, truncate),
    (NodeKind::ForeignKeyChecks, foreign_key_checks),
    (NodeKind::Savepoint, common::savepoint),
    (NodeKind::RollbackToSavepoint, common::rollback_to_savepoint),
    (NodeKind::ReleaseSavepoint, common::release_savepoint),
];

fn pagination(g: &dyn SqlGenerator, node: Node<'_>) -> QuarryResult<Vec<Fragment>> {
    match node {
        Node::Pagination {
            limit: None,
            offset: Some(n),
        } => {
            let mut out = clauses::limit(-1);
            out.append(clauses::offset(n));
            one(out)
        }
        other => common::pagination(g, other),
    }
}

fn column_type(column: &Column) -> String {
    match column.column_type {
        ty if ty.is_integer() => "INTEGER".to_string(),
        ColumnType::Year => "INTEGER".to_string(),
        ColumnType::Decimal => "NUMERIC".to_string(),
        ColumnType::Float | ColumnType::Double => "REAL".to_string(),
        ColumnType::Char => format!("CHAR({})", column.length.unwrap_or(1)),
        ColumnType::Varchar => format!("VARCHAR({})", column.length.unwrap_or(255)),
        ColumnType::Boolean => "BOOLEAN".to_string(),
        ColumnType::Date => "DATE".to_string(),
        ColumnType::DateTime => "DATETIME".to_string(),
        ColumnType::Timestamp => "TIMESTAMP".to_string(),
        ColumnType::Time => "TIME".to_string(),
        _ => "TEXT".to_string(),
    }
}

/// `<name> <type> [NOT NULL] [PRIMARY KEY [AUTOINCREMENT]] [UNIQUE]
/// [DEFAULT x] [CHECK] [REFERENCES t(c)] [ON DELETE CASCADE]`
fn column_definition(g: &dyn SqlGenerator, column: &Column) -> QuarryResult<String> {
    let config = &column.config;
    if config.auto_increment && !(config.primary && column.column_type.is_integer()) {
        return Err(QuarryError::unsupported(
            Engine::Sqlite,
            format!("AUTOINCREMENT on '{}' outside an integer primary key", column.name),
        ));
    }
    let mut def = format!("{} {}", g.escape_identifier(&column.name), column_type(column));
    if !config.nullable {
        def.push_str(" NOT NULL");
    }
    if config.primary {
        def.push_str(" PRIMARY KEY");
        if config.auto_increment {
            def.push_str(" AUTOINCREMENT");
        }
    }
    if config.unique {
        def.push_str(" UNIQUE");
    }
    if let Some(default) = common::default_clause(g, column) {
        def.push_str(&default);
    }
    if column.column_type == ColumnType::Enum {
        def.push_str(&common::enum_check(g, column));
    }
    def.push_str(&common::inline_references(g, column));
    Ok(def)
}

fn create_table(g: &dyn SqlGenerator, node: Node<'_>) -> QuarryResult<Vec<Fragment>> {
    let table = expect_node!(node, Node::CreateTable);
    common::create_table_with(g, table, column_definition, &[])
}

/// SQLite takes one action per ALTER TABLE and cannot redefine a column.
fn alter_table(g: &dyn SqlGenerator, node: Node<'_>) -> QuarryResult<Vec<Fragment>> {
    let table = expect_node!(node, Node::AlterTable);
    let name = g.escape_identifier(&table.table_name);
    let mut statements = Vec::new();
    for column in &table.columns_to_alter {
        if column.alter {
            return Err(QuarryError::unsupported(
                Engine::Sqlite,
                format!("MODIFY COLUMN ({})", column.name),
            ));
        }
        let sql = match &column.old_name {
            Some(old) => format!(
                "ALTER TABLE {} RENAME COLUMN {} TO {};",
                name,
                g.escape_identifier(old),
                g.escape_identifier(&column.name)
            ),
            None => format!("ALTER TABLE {} ADD COLUMN {};", name, column_definition(g, column)?),
        };
        statements.push(Fragment::sql(sql));
    }
    Ok(statements)
}

fn drop_columns(g: &dyn SqlGenerator, node: Node<'_>) -> QuarryResult<Vec<Fragment>> {
    let table = expect_node!(node, Node::DropColumns);
    let name = g.escape_identifier(&table.table_name);
    table
        .columns_to_delete
        .iter()
        .map(|d| {
            if d.foreign_key {
                Err(QuarryError::unsupported(
                    Engine::Sqlite,
                    format!("DROP FOREIGN KEY ({})", d.name),
                ))
            } else {
                Ok(Fragment::sql(format!(
                    "ALTER TABLE {} DROP COLUMN {};",
                    name,
                    g.escape_identifier(&d.name)
                )))
            }
        })
        .collect()
}

/// SQLite has no TRUNCATE; an unqualified DELETE takes the truncate
/// optimisation.
fn truncate(g: &dyn SqlGenerator, node: Node<'_>) -> QuarryResult<Vec<Fragment>> {
    let Node::Truncate { table, .. } = node else {
        return Err(super::registry::misrouted(node));
    };
    one(Fragment::sql(format!("DELETE FROM {};", g.escape_identifier(table))))
}

fn foreign_key_checks(_g: &dyn SqlGenerator, node: Node<'_>) -> QuarryResult<Vec<Fragment>> {
    let Node::ForeignKeyChecks { enabled } = node else {
        return Err(super::registry::misrouted(node));
    };
    let state = if enabled { "ON" } else { "OFF" };
    one(Fragment::sql(format!("PRAGMA foreign_keys = {};", state)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dialect::Registry;
    use crate::migrate::Table;
    use pretty_assertions::assert_eq;

    fn render(node: Node<'_>) -> QuarryResult<Vec<String>> {
        Ok(Registry::global()
            .render(Engine::Sqlite, node)?
            .iter()
            .map(|f| f.inline())
            .collect())
    }

    #[test]
    fn test_integer_primary_key_autoincrement() {
        let mut t = Table::create("users");
        t.column("id").int().auto_increment().primary().commit();
        t.column("email").string(255).not_null().unique().commit();
        t.column("active").boolean().default_value(true).commit();
        assert_eq!(
            render(Node::CreateTable(&t)).unwrap(),
            vec![
                "CREATE TABLE IF NOT EXISTS users (\n\
                 id INTEGER PRIMARY KEY AUTOINCREMENT,\n\
                 email VARCHAR(255) NOT NULL UNIQUE,\n\
                 active BOOLEAN DEFAULT 1\n\
                 );"
            ]
        );
    }

    #[test]
    fn test_alter_one_statement_per_action() {
        let mut t = Table::alter("users");
        t.column("full_name").string(100).rename_from("name").commit();
        t.column("bio").text().commit();
        assert_eq!(
            render(Node::AlterTable(&t)).unwrap(),
            vec![
                "ALTER TABLE users RENAME COLUMN name TO full_name;",
                "ALTER TABLE users ADD COLUMN bio TEXT;",
            ]
        );
    }

    #[test]
    fn test_modify_is_unsupported() {
        let mut t = Table::alter("users");
        t.column("age").int().alter().commit();
        assert!(matches!(
            render(Node::AlterTable(&t)),
            Err(QuarryError::Unsupported {
                engine: Engine::Sqlite,
                ..
            })
        ));
    }

    #[test]
    fn test_truncate_and_pragmas() {
        assert_eq!(
            render(Node::Truncate {
                table: "users",
                force: true
            })
            .unwrap(),
            vec!["DELETE FROM users;"]
        );
        assert_eq!(
            render(Node::ForeignKeyChecks { enabled: true }).unwrap(),
            vec!["PRAGMA foreign_keys = ON;"]
        );
        assert!(render(Node::Lock).unwrap().is_empty());
    }
}
