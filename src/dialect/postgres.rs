//! PostgreSQL. The DDL helpers here are shared with CockroachDB, which
//! speaks the same dialect with different type names.

use super::common::{self, one};
use super::registry::{InterpreterTable, Node, NodeKind, expect_node};
use super::{Engine, SqlGenerator};
use crate::error::{QuarryError, QuarryResult};
use crate::migrate::schema::{Column, ColumnType, DefaultValue, Table};
use crate::sql::fragment::Fragment;

/// PostgreSQL Generator.
pub struct PostgresGenerator;

impl SqlGenerator for PostgresGenerator {
    fn engine(&self) -> Engine {
        Engine::Postgres
    }

    fn quote_identifier(&self, name: &str) -> String {
        format!("\"{}\"", name.replace('"', "\"\""))
    }

    fn placeholder(&self, index: usize) -> String {
        format!("${}", index)
    }
}

pub const INTERPRETERS: InterpreterTable = &[
    (NodeKind::Select, common::select),
    (NodeKind::Join, common::join),
    (NodeKind::Where, common::where_),
    (NodeKind::GroupBy, common::group_by),
    (NodeKind::OrderBy, common::order_by),
    (NodeKind::Pagination, common::pagination),
    (NodeKind::Lock, common::for_update),
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
    (NodeKind::ForeignKeyChecks, common::nothing),
    (NodeKind::Savepoint, common::savepoint),
    (NodeKind::RollbackToSavepoint, common::rollback_to_savepoint),
    (NodeKind::ReleaseSavepoint, common::release_savepoint),
];

/// Maps a column to its type name and, for auto-increment keys, an
/// optional identity default.
pub(crate) type TypeMapper = fn(&Column) -> (String, Option<&'static str>);

fn sized(name: &str, length: Option<u32>) -> String {
    match length {
        Some(len) => format!("{}({})", name, len),
        None => name.to_string(),
    }
}

pub(crate) fn decimal(column: &Column) -> String {
    match (column.length, column.scale) {
        (Some(p), Some(s)) => format!("DECIMAL({},{})", p, s),
        (Some(p), None) => format!("DECIMAL({})", p),
        _ => "DECIMAL".to_string(),
    }
}

fn postgres_type(column: &Column) -> (String, Option<&'static str>) {
    let ty = column.column_type;
    if column.config.auto_increment && ty.is_integer() {
        let serial = match ty {
            ColumnType::TinyInt | ColumnType::SmallInt => "SMALLSERIAL",
            ColumnType::BigInt => "BIGSERIAL",
            _ => "SERIAL",
        };
        return (serial.to_string(), None);
    }
    let name = match ty {
        ColumnType::TinyInt | ColumnType::SmallInt | ColumnType::Year => "SMALLINT".to_string(),
        ColumnType::MediumInt | ColumnType::Int => "INT".to_string(),
        ColumnType::BigInt => "BIGINT".to_string(),
        ColumnType::Decimal => decimal(column),
        ColumnType::Float => "REAL".to_string(),
        ColumnType::Double => "DOUBLE PRECISION".to_string(),
        ColumnType::Char => sized("CHAR", column.length),
        ColumnType::Varchar => format!("VARCHAR({})", column.length.unwrap_or(255)),
        ColumnType::Enum => "VARCHAR(255)".to_string(),
        ColumnType::TinyText
        | ColumnType::Text
        | ColumnType::MediumText
        | ColumnType::LongText
        | ColumnType::Set => "TEXT".to_string(),
        ColumnType::Date => "DATE".to_string(),
        ColumnType::DateTime | ColumnType::Timestamp => "TIMESTAMP".to_string(),
        ColumnType::Time => "TIME".to_string(),
        ColumnType::Boolean => "BOOLEAN".to_string(),
    };
    (name, None)
}

/// `<name> <type> [NOT NULL] [PRIMARY KEY] [UNIQUE] [DEFAULT x] [CHECK]
/// [REFERENCES t(c)] [ON DELETE CASCADE]`. UNSIGNED, AFTER and
/// ON UPDATE have no equivalent and are skipped.
pub(crate) fn column_definition_with(
    g: &dyn SqlGenerator,
    column: &Column,
    types: TypeMapper,
) -> String {
    let config = &column.config;
    let (ty, identity) = types(column);
    let mut def = format!("{} {}", g.escape_identifier(&column.name), ty);
    if !config.nullable {
        def.push_str(" NOT NULL");
    }
    if config.primary {
        def.push_str(" PRIMARY KEY");
    }
    if config.unique {
        def.push_str(" UNIQUE");
    }
    match (common::default_clause(g, column), identity) {
        (Some(default), _) => def.push_str(&default),
        (None, Some(identity)) => def.push_str(&format!(" DEFAULT {}", identity)),
        (None, None) => {}
    }
    if column.column_type == ColumnType::Enum {
        def.push_str(&common::enum_check(g, column));
    }
    def.push_str(&common::inline_references(g, column));
    if config.auto_update {
        tracing::debug!(
            "{} has no ON UPDATE clause; auto_update on {} is ignored",
            g.engine(),
            column.name
        );
    }
    def
}

fn column_definition(g: &dyn SqlGenerator, column: &Column) -> QuarryResult<String> {
    Ok(column_definition_with(g, column, postgres_type))
}

fn create_table(g: &dyn SqlGenerator, node: Node<'_>) -> QuarryResult<Vec<Fragment>> {
    let table = expect_node!(node, Node::CreateTable);
    common::create_table_with(g, table, column_definition, &[])
}

/// Renames go first, each as its own statement since PostgreSQL cannot
/// combine RENAME with other actions. Everything else shares one
/// `ALTER TABLE`.
///
/// A modified column is re-typed, re-nulled and re-defaulted only;
/// constraints on it need their own migration.
pub(crate) fn alter_table_with(
    g: &dyn SqlGenerator,
    table: &Table,
    types: TypeMapper,
) -> QuarryResult<Vec<Fragment>> {
    let name = g.escape_identifier(&table.table_name);
    let mut statements = Vec::new();
    let mut actions = Vec::new();

    for column in &table.columns_to_alter {
        let col = g.escape_identifier(&column.name);
        if let Some(old) = &column.old_name {
            statements.push(Fragment::sql(format!(
                "ALTER TABLE {} RENAME COLUMN {} TO {};",
                name,
                g.escape_identifier(old),
                col
            )));
            if !column.alter {
                continue;
            }
        }
        if column.alter {
            let config = &column.config;
            let constraint = if config.primary {
                Some("PRIMARY KEY")
            } else if config.unique {
                Some("UNIQUE")
            } else if config.references.is_some() {
                Some("REFERENCES")
            } else {
                None
            };
            if let Some(constraint) = constraint {
                return Err(QuarryError::unsupported(
                    g.engine(),
                    format!("{} on MODIFY COLUMN ({})", constraint, column.name),
                ));
            }
            let mut plain = column.clone();
            plain.config.auto_increment = false;
            actions.push(format!("ALTER COLUMN {} TYPE {}", col, types(&plain).0));
            if column.config.nullable {
                actions.push(format!("ALTER COLUMN {} DROP NOT NULL", col));
            } else {
                actions.push(format!("ALTER COLUMN {} SET NOT NULL", col));
            }
            match &column.config.default_value {
                Some(DefaultValue::Literal(v)) => actions.push(format!(
                    "ALTER COLUMN {} SET DEFAULT {}",
                    col,
                    common::literal(g, v)
                )),
                Some(DefaultValue::Expression(e)) => {
                    actions.push(format!("ALTER COLUMN {} SET DEFAULT {}", col, e))
                }
                None => {}
            }
        } else {
            actions.push(format!("ADD COLUMN {}", column_definition_with(g, column, types)));
        }
    }

    if !actions.is_empty() {
        statements.push(Fragment::sql(format!("ALTER TABLE {} {};", name, actions.join(", "))));
    }
    Ok(statements)
}

fn alter_table(g: &dyn SqlGenerator, node: Node<'_>) -> QuarryResult<Vec<Fragment>> {
    let table = expect_node!(node, Node::AlterTable);
    alter_table_with(g, table, postgres_type)
}

pub(crate) fn drop_columns(g: &dyn SqlGenerator, node: Node<'_>) -> QuarryResult<Vec<Fragment>> {
    let table = expect_node!(node, Node::DropColumns);
    if table.columns_to_delete.is_empty() {
        return common::none();
    }
    let clauses: Vec<String> = table
        .columns_to_delete
        .iter()
        .map(|d| {
            if d.foreign_key {
                format!("DROP CONSTRAINT {}", g.escape_identifier(&d.name))
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

pub(crate) fn truncate(g: &dyn SqlGenerator, node: Node<'_>) -> QuarryResult<Vec<Fragment>> {
    let Node::Truncate { table, force } = node else {
        return Err(super::registry::misrouted(node));
    };
    let cascade = if force { " CASCADE" } else { "" };
    one(Fragment::sql(format!(
        "TRUNCATE TABLE {}{};",
        g.escape_identifier(table),
        cascade
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dialect::Registry;
    use crate::record;
    use crate::sql::ast::{InsertNode, UpsertNode};
    use pretty_assertions::assert_eq;

    fn render(node: Node<'_>) -> Vec<String> {
        Registry::global()
            .render(Engine::Postgres, node)
            .unwrap()
            .iter()
            .map(|f| f.inline())
            .collect()
    }

    #[test]
    fn test_create_table_uses_serial() {
        let mut t = Table::create("users");
        t.column("id").int().auto_increment().primary().commit();
        t.column("name").string(100).not_null().commit();
        t.column("role").enumeration(["admin", "member"]).default_value("member").commit();
        t.column("team_id").big_int().unsigned().references("teams", "id").cascade().commit();
        assert_eq!(
            render(Node::CreateTable(&t)),
            vec![
                "CREATE TABLE IF NOT EXISTS users (\n\
                 id SERIAL PRIMARY KEY,\n\
                 name VARCHAR(100) NOT NULL,\n\
                 role VARCHAR(255) DEFAULT 'member' CHECK (role IN ('admin', 'member')),\n\
                 team_id BIGINT REFERENCES teams(id) ON DELETE CASCADE\n\
                 );"
            ]
        );
    }

    #[test]
    fn test_alter_splits_renames() {
        let mut t = Table::alter("users");
        t.column("full_name").string(150).rename_from("name").commit();
        t.column("age").small_int().not_null().alter().default_value(0).commit();
        t.column("bio").text().commit();
        assert_eq!(
            render(Node::AlterTable(&t)),
            vec![
                "ALTER TABLE users RENAME COLUMN name TO full_name;",
                "ALTER TABLE users ALTER COLUMN age TYPE SMALLINT, \
                 ALTER COLUMN age SET NOT NULL, \
                 ALTER COLUMN age SET DEFAULT 0, \
                 ADD COLUMN bio TEXT;",
            ]
        );
    }

    #[test]
    fn test_truncate_force_cascades() {
        assert_eq!(
            render(Node::Truncate {
                table: "users",
                force: true
            }),
            vec!["TRUNCATE TABLE users CASCADE;"]
        );
        assert!(render(Node::ForeignKeyChecks { enabled: false }).is_empty());
    }

    #[test]
    fn test_upsert_on_conflict_numbering() {
        let node = UpsertNode {
            table: "users".into(),
            row: record! { "email" => "a@x.com", "name" => "B" },
            conflict: vec!["email".into()],
        };
        let stmt = Registry::global()
            .render_one(Engine::Postgres, Node::Upsert(&node))
            .unwrap()
            .to_statement(&PostgresGenerator);
        assert_eq!(
            stmt.sql,
            "INSERT INTO users (email, name) VALUES ($1, $2) ON CONFLICT (email) DO UPDATE SET name = EXCLUDED.name"
        );
    }

    #[test]
    fn test_insert_returning() {
        let node = InsertNode {
            table: "order".into(),
            row: record! { "total" => 10 },
        };
        let mut f = Registry::global()
            .render_one(Engine::Postgres, Node::Insert(&node))
            .unwrap();
        f.append(Registry::global().render_one(Engine::Postgres, Node::Returning).unwrap());
        assert_eq!(
            f.to_statement(&PostgresGenerator).sql,
            "INSERT INTO \"order\" (total) VALUES ($1) \nRETURNING *"
        );
    }

    #[test]
    fn test_modify_rejects_constraints() {
        let mut t = Table::alter("users");
        t.column("email").string(255).unique().alter().commit();
        let err = Registry::global()
            .render(Engine::Postgres, Node::AlterTable(&t))
            .unwrap_err();
        assert!(matches!(
            err,
            QuarryError::Unsupported {
                engine: Engine::Postgres,
                ..
            }
        ));
        assert_eq!(
            err.to_string(),
            "postgres does not support UNIQUE on MODIFY COLUMN (email)"
        );
    }
}
