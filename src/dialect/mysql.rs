//! MySQL / MariaDB.

use super::common::{self, one};
use super::registry::{InterpreterTable, Node, NodeKind, expect_node};
use super::{Engine, SqlGenerator};
use crate::error::{QuarryError, QuarryResult};
use crate::migrate::schema::{Column, ColumnType, Table};
use crate::sql::clauses;
use crate::sql::fragment::Fragment;

/// MySQL Generator.
pub struct MysqlGenerator;

impl SqlGenerator for MysqlGenerator {
    fn engine(&self) -> Engine {
        Engine::MySql
    }

    fn quote_identifier(&self, name: &str) -> String {
        format!("`{}`", name.replace('`', "``"))
    }

    fn placeholder(&self, _index: usize) -> String {
        "?".to_string()
    }

    fn bool_literal(&self, val: bool) -> String {
        if val { "1".to_string() } else { "0".to_string() }
    }
}

/// Largest row count MySQL accepts; stands in for "no limit" when only an
/// offset is given.
const NO_LIMIT: &str = "18446744073709551615";

pub const INTERPRETERS: InterpreterTable = &[
    (NodeKind::Select, common::select),
    (NodeKind::Join, common::join),
    (NodeKind::Where, common::where_),
    (NodeKind::GroupBy, common::group_by),
    (NodeKind::OrderBy, common::order_by),
    (NodeKind::Pagination, pagination),
    (NodeKind::Lock, common::for_update),
    (NodeKind::Insert, insert),
    (NodeKind::Update, common::update),
    (NodeKind::Delete, common::delete),
    (NodeKind::Upsert, upsert),
    (NodeKind::Returning, common::nothing),
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
            let mut out = clauses::limit(NO_LIMIT);
            out.append(clauses::offset(n));
            one(out)
        }
        other => common::pagination(g, other),
    }
}

fn insert(g: &dyn SqlGenerator, node: Node<'_>) -> QuarryResult<Vec<Fragment>> {
    let insert = expect_node!(node, Node::Insert);
    if insert.row.is_empty() {
        return one(Fragment::sql(format!(
            "INSERT INTO {} () VALUES () ",
            g.escape_identifier(&insert.table)
        )));
    }
    common::insert(g, node)
}

/// `INSERT ... ON DUPLICATE KEY UPDATE c = VALUES(c)`.
///
/// MySQL resolves the conflict against whichever unique key collides, so
/// the conflict columns only decide which columns are left untouched.
fn upsert(g: &dyn SqlGenerator, node: Node<'_>) -> QuarryResult<Vec<Fragment>> {
    let upsert = expect_node!(node, Node::Upsert);
    let table = g.escape_identifier(&upsert.table);
    let columns: Vec<String> = upsert.row.columns().map(|c| g.escape_identifier(c)).collect();
    let mut out = clauses::insert(&table, &columns, upsert.row.values().cloned().collect());

    let mut updates: Vec<String> = upsert
        .row
        .columns()
        .filter(|c| !upsert.conflict.iter().any(|k| k == c))
        .map(|c| {
            let quoted = g.escape_identifier(c);
            format!("{} = VALUES({})", quoted, quoted)
        })
        .collect();
    if updates.is_empty() {
        // No-op assignment keeps the statement valid when only keys were given.
        let key = columns.first().cloned().unwrap_or_else(|| "id".to_string());
        updates.push(format!("{} = {}", key, key));
    }
    out.push_sql(format!("ON DUPLICATE KEY UPDATE {}", updates.join(", ")));
    one(out)
}

fn column_type(column: &Column) -> String {
    let ty = column.column_type;
    let mut sql = match ty {
        ColumnType::Enum | ColumnType::Set => {
            let values = column
                .values
                .iter()
                .map(|v| format!("'{}'", v.replace('\'', "''")))
                .collect::<Vec<_>>()
                .join(", ");
            format!("{}({})", ty.name(), values)
        }
        ColumnType::Decimal => match (column.length, column.scale) {
            (Some(p), Some(s)) => format!("DECIMAL({},{})", p, s),
            (Some(p), None) => format!("DECIMAL({})", p),
            _ => "DECIMAL".to_string(),
        },
        ColumnType::Varchar => format!("VARCHAR({})", column.length.unwrap_or(255)),
        ColumnType::TinyText
        | ColumnType::Text
        | ColumnType::MediumText
        | ColumnType::LongText
        | ColumnType::Boolean => ty.name().to_string(),
        _ => match column.length {
            Some(len) => format!("{}({})", ty.name(), len),
            None => ty.name().to_string(),
        },
    };
    // UNSIGNED belongs to the data type in MySQL's grammar.
    let numeric = ty.is_integer()
        || matches!(ty, ColumnType::Decimal | ColumnType::Float | ColumnType::Double);
    if column.config.unsigned && numeric {
        sql.push_str(" UNSIGNED");
    }
    sql
}

/// `<name> <type> [AUTO_INCREMENT] [NOT NULL] [PRIMARY KEY] [UNIQUE]
/// [DEFAULT x] [ON UPDATE CURRENT_TIMESTAMP]`
pub(crate) fn column_definition(g: &dyn SqlGenerator, column: &Column) -> QuarryResult<String> {
    let config = &column.config;
    let mut def = format!("{} {}", g.escape_identifier(&column.name), column_type(column));
    if config.auto_increment {
        def.push_str(" AUTO_INCREMENT");
    }
    if !config.nullable {
        def.push_str(" NOT NULL");
    }
    if config.primary {
        def.push_str(" PRIMARY KEY");
    }
    if config.unique {
        def.push_str(" UNIQUE");
    }
    if let Some(default) = common::default_clause(g, column) {
        def.push_str(&default);
    }
    if config.auto_update {
        def.push_str(" ON UPDATE CURRENT_TIMESTAMP");
    }
    Ok(def)
}

/// InnoDB ignores inline REFERENCES, so foreign keys are named table
/// constraints: `<table>_<column>_foreign`.
fn foreign_key(g: &dyn SqlGenerator, table: &str, column: &Column) -> Option<String> {
    let refs = column.config.references.as_ref()?;
    let mut sql = format!(
        "CONSTRAINT {} FOREIGN KEY ({}) REFERENCES {}({})",
        g.escape_identifier(&format!("{}_{}_foreign", table, column.name)),
        g.escape_identifier(&column.name),
        g.escape_identifier(&refs.table),
        g.escape_identifier(&refs.column)
    );
    if column.config.cascade {
        sql.push_str(" ON DELETE CASCADE");
    }
    Some(sql)
}

fn create_table(g: &dyn SqlGenerator, node: Node<'_>) -> QuarryResult<Vec<Fragment>> {
    let table = expect_node!(node, Node::CreateTable);
    let constraints: Vec<String> = table
        .columns_to_add
        .iter()
        .filter_map(|c| foreign_key(g, &table.table_name, c))
        .collect();
    common::create_table_with(g, table, column_definition, &constraints)
}

/// One clause per column: CHANGE when renaming, MODIFY when altering,
/// ADD otherwise, each with an optional AFTER. Only added columns can
/// carry a foreign key.
fn alter_clauses(g: &dyn SqlGenerator, table: &Table) -> QuarryResult<Vec<String>> {
    let mut clauses = Vec::new();
    for column in &table.columns_to_alter {
        let redefines = column.old_name.is_some() || column.alter;
        if redefines && column.config.references.is_some() {
            return Err(QuarryError::unsupported(
                Engine::MySql,
                format!("REFERENCES on CHANGE/MODIFY COLUMN ({})", column.name),
            ));
        }
        let def = column_definition(g, column)?;
        let mut clause = match (&column.old_name, column.alter) {
            (Some(old), _) => format!("CHANGE COLUMN {} {}", g.escape_identifier(old), def),
            (None, true) => format!("MODIFY COLUMN {}", def),
            (None, false) => format!("ADD COLUMN {}", def),
        };
        if let Some(after) = &column.after {
            clause.push_str(&format!(" AFTER {}", g.escape_identifier(after)));
        }
        clauses.push(clause);
        if !redefines {
            if let Some(fk) = foreign_key(g, &table.table_name, column) {
                clauses.push(format!("ADD {}", fk));
            }
        }
    }
    Ok(clauses)
}

fn alter_table(g: &dyn SqlGenerator, node: Node<'_>) -> QuarryResult<Vec<Fragment>> {
    let table = expect_node!(node, Node::AlterTable);
    let clauses = alter_clauses(g, table)?;
    if clauses.is_empty() {
        return common::none();
    }
    one(Fragment::sql(format!(
        "ALTER TABLE {} {};",
        g.escape_identifier(&table.table_name),
        clauses.join(", ")
    )))
}

fn drop_columns(g: &dyn SqlGenerator, node: Node<'_>) -> QuarryResult<Vec<Fragment>> {
    let table = expect_node!(node, Node::DropColumns);
    if table.columns_to_delete.is_empty() {
        return common::none();
    }
    let clauses: Vec<String> = table
        .columns_to_delete
        .iter()
        .map(|d| {
            if d.foreign_key {
                format!("DROP FOREIGN KEY {}", g.escape_identifier(&d.name))
            } else {
                format!("DROP COLUMN {}", g.escape_identifier(&d.name))
            }
        })
        .collect();
    one(Fragment::sql(format!(
        "ALTER TABLE {} {};",
        g.escape_identifier(&table.table_name),
        clauses.join(", ")
    )))
}

/// Forced truncation relies on [`foreign_key_checks`] around it.
fn truncate(g: &dyn SqlGenerator, node: Node<'_>) -> QuarryResult<Vec<Fragment>> {
    let Node::Truncate { table, .. } = node else {
        return Err(super::registry::misrouted(node));
    };
    one(Fragment::sql(format!("TRUNCATE TABLE {};", g.escape_identifier(table))))
}

fn foreign_key_checks(_g: &dyn SqlGenerator, node: Node<'_>) -> QuarryResult<Vec<Fragment>> {
    let Node::ForeignKeyChecks { enabled } = node else {
        return Err(super::registry::misrouted(node));
    };
    one(Fragment::sql(format!("SET FOREIGN_KEY_CHECKS = {};", enabled as u8)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dialect::Registry;
    use crate::migrate::Table;
    use crate::record;
    use crate::sql::ast::UpsertNode;
    use pretty_assertions::assert_eq;

    fn render(node: Node<'_>) -> Vec<String> {
        Registry::global()
            .render(Engine::MySql, node)
            .unwrap()
            .iter()
            .map(|f| f.inline())
            .collect()
    }

    #[test]
    fn test_create_table_flag_order() {
        let mut t = Table::create("users");
        t.column("id").int().auto_increment().primary().commit();
        t.column("name").string(100).not_null().commit();
        assert_eq!(
            render(Node::CreateTable(&t)),
            vec!["CREATE TABLE IF NOT EXISTS users (\nid INT AUTO_INCREMENT PRIMARY KEY,\nname VARCHAR(100) NOT NULL\n);"]
        );
    }

    #[test]
    fn test_full_flag_sequence() {
        let mut t = Table::create("posts");
        t.column("views")
            .big_int()
            .unsigned()
            .not_null()
            .unique()
            .default_value(0)
            .commit();
        t.column("updated_at").timestamp().auto_create().auto_update().commit();
        t.column("author_id")
            .int()
            .references("users", "id")
            .cascade()
            .commit();
        t.column("state").enumeration(["draft", "live"]).default_value("draft").commit();
        assert_eq!(
            render(Node::CreateTable(&t))[0],
            "CREATE TABLE IF NOT EXISTS posts (\n\
             views BIGINT UNSIGNED NOT NULL UNIQUE DEFAULT 0,\n\
             updated_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP ON UPDATE CURRENT_TIMESTAMP,\n\
             author_id INT,\n\
             state ENUM('draft', 'live') DEFAULT 'draft',\n\
             CONSTRAINT posts_author_id_foreign FOREIGN KEY (author_id) REFERENCES users(id) ON DELETE CASCADE\n\
             );"
        );
    }

    #[test]
    fn test_alter_canonical_forms() {
        let mut t = Table::alter("users");
        t.column("full_name").string(150).rename_from("name").commit();
        t.column("age").small_int().not_null().alter().commit();
        t.column("nickname").string(50).after("full_name").commit();
        assert_eq!(
            render(Node::AlterTable(&t)),
            vec![
                "ALTER TABLE users CHANGE COLUMN name full_name VARCHAR(150), \
                 MODIFY COLUMN age SMALLINT NOT NULL, \
                 ADD COLUMN nickname VARCHAR(50) AFTER full_name;"
            ]
        );
    }

    #[test]
    fn test_drop_columns_and_foreign_keys() {
        let mut t = Table::dropping("posts");
        t.drop_column("legacy").drop_foreign_key("posts_author_id_foreign");
        assert_eq!(
            render(Node::DropColumns(&t)),
            vec!["ALTER TABLE posts DROP COLUMN legacy, DROP FOREIGN KEY posts_author_id_foreign;"]
        );
    }

    #[test]
    fn test_offset_without_limit() {
        let out = render(Node::Pagination {
            limit: None,
            offset: Some(20),
        });
        assert_eq!(out, vec!["\nLIMIT 18446744073709551615 \nOFFSET 20 "]);
    }

    #[test]
    fn test_upsert_on_duplicate_key() {
        let node = UpsertNode {
            table: "users".into(),
            row: record! { "email" => "a@x.com", "name" => "B" },
            conflict: vec!["email".into()],
        };
        let stmt = Registry::global()
            .render_one(Engine::MySql, Node::Upsert(&node))
            .unwrap()
            .to_statement(&MysqlGenerator);
        assert_eq!(
            stmt.sql,
            "INSERT INTO users (email, name) VALUES (?, ?) ON DUPLICATE KEY UPDATE name = VALUES(name)"
        );
    }

    #[test]
    fn test_foreign_key_checks() {
        assert_eq!(
            render(Node::ForeignKeyChecks { enabled: false }),
            vec!["SET FOREIGN_KEY_CHECKS = 0;"]
        );
    }

    #[test]
    fn test_redefined_column_cannot_add_foreign_key() {
        let mut t = Table::alter("posts");
        t.column("author_id").int().references("users", "id").alter().commit();
        let err = Registry::global()
            .render(Engine::MySql, Node::AlterTable(&t))
            .unwrap_err();
        assert!(matches!(err, QuarryError::Unsupported { engine: Engine::MySql, .. }));

        let mut t = Table::alter("posts");
        t.column("writer_id").int().references("users", "id").rename_from("author_id").commit();
        assert!(Registry::global().render(Engine::MySql, Node::AlterTable(&t)).is_err());
    }

    #[test]
    fn test_added_column_keeps_foreign_key() {
        let mut t = Table::alter("posts");
        t.column("editor_id").int().unsigned().references("users", "id").commit();
        assert_eq!(
            render(Node::AlterTable(&t)),
            vec![
                "ALTER TABLE posts ADD COLUMN editor_id INT UNSIGNED, \
                 ADD CONSTRAINT posts_editor_id_foreign FOREIGN KEY (editor_id) REFERENCES users(id);"
            ]
        );
    }

    #[test]
    fn test_unsigned_precedes_auto_increment() {
        let mut t = Table::create("counters");
        t.column("id").big_int().unsigned().auto_increment().primary().commit();
        assert_eq!(
            render(Node::CreateTable(&t)),
            vec!["CREATE TABLE IF NOT EXISTS counters (\nid BIGINT UNSIGNED AUTO_INCREMENT PRIMARY KEY\n);"]
        );
    }
}
