//! CockroachDB: PostgreSQL syntax, `unique_rowid()` keys and STRING types.

use super::common;
use super::postgres::{self, decimal};
use super::registry::{InterpreterTable, Node, NodeKind, expect_node};
use super::{Engine, SqlGenerator};
use crate::error::QuarryResult;
use crate::migrate::schema::{Column, ColumnType};
use crate::sql::fragment::Fragment;

/// CockroachDB Generator.
pub struct CockroachGenerator;

impl SqlGenerator for CockroachGenerator {
    fn engine(&self) -> Engine {
        Engine::Cockroach
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
    (NodeKind::DropColumns, postgres::drop_columns),
    (NodeKind::DropTable, common::drop_table),
    (NodeKind::Truncate, postgres::truncate),
    (NodeKind::ForeignKeyChecks, common::nothing),
    (NodeKind::Savepoint, common::savepoint),
    (NodeKind::RollbackToSavepoint, common::rollback_to_savepoint),
    (NodeKind::ReleaseSavepoint, common::release_savepoint),
];

/// Integer widths map onto INT2/INT4/INT8; auto-increment keys become
/// INT8 with a `unique_rowid()` default.
fn cockroach_type(column: &Column) -> (String, Option<&'static str>) {
    let ty = column.column_type;
    if column.config.auto_increment && ty.is_integer() {
        return ("INT8".to_string(), Some("unique_rowid()"));
    }
    let name = match ty {
        ColumnType::TinyInt | ColumnType::SmallInt | ColumnType::Year => "INT2".to_string(),
        ColumnType::MediumInt | ColumnType::Int => "INT4".to_string(),
        ColumnType::BigInt => "INT8".to_string(),
        ColumnType::Decimal => decimal(column),
        ColumnType::Float => "FLOAT4".to_string(),
        ColumnType::Double => "FLOAT8".to_string(),
        ColumnType::Char | ColumnType::Varchar => match column.length {
            Some(len) => format!("STRING({})", len),
            None => "STRING".to_string(),
        },
        ColumnType::Enum
        | ColumnType::Set
        | ColumnType::TinyText
        | ColumnType::Text
        | ColumnType::MediumText
        | ColumnType::LongText => "STRING".to_string(),
        ColumnType::Date => "DATE".to_string(),
        ColumnType::DateTime | ColumnType::Timestamp => "TIMESTAMP".to_string(),
        ColumnType::Time => "TIME".to_string(),
        ColumnType::Boolean => "BOOL".to_string(),
    };
    (name, None)
}

fn column_definition(g: &dyn SqlGenerator, column: &Column) -> QuarryResult<String> {
    Ok(postgres::column_definition_with(g, column, cockroach_type))
}

fn create_table(g: &dyn SqlGenerator, node: Node<'_>) -> QuarryResult<Vec<Fragment>> {
    let table = expect_node!(node, Node::CreateTable);
    common::create_table_with(g, table, column_definition, &[])
}

fn alter_table(g: &dyn SqlGenerator, node: Node<'_>) -> QuarryResult<Vec<Fragment>> {
    let table = expect_node!(node, Node::AlterTable);
    postgres::alter_table_with(g, table, cockroach_type)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dialect::Registry;
    use crate::migrate::Table;
    use crate::sql::ast::SelectNode;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_create_table_unique_rowid() {
        let mut t = Table::create("events");
        t.column("id").big_int().auto_increment().primary().commit();
        t.column("kind").string(40).not_null().commit();
        t.column("seen").boolean().default_value(false).commit();
        let out = Registry::global()
            .render(Engine::Cockroach, Node::CreateTable(&t))
            .unwrap();
        assert_eq!(
            out[0].inline(),
            "CREATE TABLE IF NOT EXISTS events (\n\
             id INT8 PRIMARY KEY DEFAULT unique_rowid(),\n\
             kind STRING(40) NOT NULL,\n\
             seen BOOL DEFAULT FALSE\n\
             );"
        );
    }

    #[test]
    fn test_select_lock() {
        let select = SelectNode::new("accounts");
        let mut f = Registry::global()
            .render_one(Engine::Cockroach, Node::Select(&select))
            .unwrap();
        f.append(Registry::global().render_one(Engine::Cockroach, Node::Lock).unwrap());
        assert_eq!(f.inline(), "SELECT * FROM accounts \nFOR UPDATE");
    }

    #[test]
    fn test_modify_rejects_references() {
        let mut t = Table::alter("posts");
        t.column("author_id").big_int().references("users", "id").alter().commit();
        let err = Registry::global()
            .render(Engine::Cockroach, Node::AlterTable(&t))
            .unwrap_err();
        assert!(matches!(
            err,
            crate::error::QuarryError::Unsupported {
                engine: Engine::Cockroach,
                ..
            }
        ));
    }
}
