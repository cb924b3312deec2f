//! Interpreters shared by more than one engine.
//!
//! Everything here renders through the generator it is handed, so quoting
//! and placeholders still follow the calling engine.

use super::SqlGenerator;
use super::registry::{Node, expect_node};
use crate::error::{QuarryError, QuarryResult};
use crate::migrate::schema::{Column, DefaultValue, Table};
use crate::sql::ast::{Condition, Operator, Predicate};
use crate::sql::clauses;
use crate::sql::fragment::Fragment;
use crate::value::Value;

pub(crate) fn one(fragment: Fragment) -> QuarryResult<Vec<Fragment>> {
    Ok(vec![fragment])
}

pub(crate) fn none() -> QuarryResult<Vec<Fragment>> {
    Ok(Vec::new())
}

pub(crate) fn escape_all(g: &dyn SqlGenerator, names: &[String]) -> Vec<String> {
    names.iter().map(|n| g.escape_identifier(n)).collect()
}

pub fn select(g: &dyn SqlGenerator, node: Node<'_>) -> QuarryResult<Vec<Fragment>> {
    let select = expect_node!(node, Node::Select);
    let table = g.escape_identifier(&select.table);
    // Joined rows share column names; keep the root table's columns
    // unambiguous unless the caller picked columns explicitly.
    if select.columns.is_empty() && !select.joins.is_empty() {
        return one(clauses::select_columns(&table, &[format!("{}.*", table)]));
    }
    one(clauses::select_columns(&table, &escape_all(g, &select.columns)))
}

pub fn join(g: &dyn SqlGenerator, node: Node<'_>) -> QuarryResult<Vec<Fragment>> {
    let join = expect_node!(node, Node::Join);
    let left = format!("{}.{}", g.escape_identifier(&join.left.0), g.escape_identifier(&join.left.1));
    let right = format!("{}.{}", g.escape_identifier(&join.right.0), g.escape_identifier(&join.right.1));
    one(clauses::join(join.kind, &g.escape_identifier(&join.table), &left, &right))
}

pub fn where_(g: &dyn SqlGenerator, node: Node<'_>) -> QuarryResult<Vec<Fragment>> {
    let predicates = expect_node!(node, Node::Where);
    one(where_chain(g, predicates)?)
}

/// Render a predicate chain. The first predicate opens with WHERE whatever
/// its conjunction; an empty chain renders nothing.
pub fn where_chain(g: &dyn SqlGenerator, predicates: &[Predicate]) -> QuarryResult<Fragment> {
    let mut out = Fragment::new();
    for (i, predicate) in predicates.iter().enumerate() {
        let first = i == 0;
        let conj = predicate.conjunction;
        let fragment = match &predicate.condition {
            Condition::Compare { column, op, value } => {
                let column = g.escape_identifier(column);
                match (op, value) {
                    (Operator::Eq, Value::Null) => clauses::where_null(first, conj, &column, false),
                    (Operator::Ne, Value::Null) => clauses::where_null(first, conj, &column, true),
                    _ => clauses::compare(first, conj, &column, *op, value.clone()),
                }
            }
            Condition::Between {
                column,
                low,
                high,
                negated,
            } => clauses::where_between(
                first,
                conj,
                &g.escape_identifier(column),
                low.clone(),
                high.clone(),
                *negated,
            ),
            Condition::In {
                column,
                values,
                negated,
            } => clauses::where_in(first, conj, &g.escape_identifier(column), values.clone(), *negated),
            Condition::Null { column, negated } => {
                clauses::where_null(first, conj, &g.escape_identifier(column), *negated)
            }
            Condition::Raw { sql, params } => clauses::raw_where(first, conj, sql, params.clone())
                .ok_or_else(|| {
                    QuarryError::InvalidPayload(format!(
                        "raw predicate '{}' expects a value per '?' marker, got {}",
                        sql,
                        params.len()
                    ))
                })?,
        };
        out.append(fragment);
    }
    Ok(out)
}

pub fn group_by(g: &dyn SqlGenerator, node: Node<'_>) -> QuarryResult<Vec<Fragment>> {
    let columns = expect_node!(node, Node::GroupBy);
    if columns.is_empty() {
        return none();
    }
    one(clauses::group_by(&escape_all(g, columns)))
}

pub fn order_by(g: &dyn SqlGenerator, node: Node<'_>) -> QuarryResult<Vec<Fragment>> {
    let order = expect_node!(node, Node::OrderBy);
    if order.columns.is_empty() {
        return none();
    }
    one(clauses::order_by(&escape_all(g, &order.columns), order.direction))
}

/// LIMIT and OFFSET rendered independently.
pub fn pagination(_g: &dyn SqlGenerator, node: Node<'_>) -> QuarryResult<Vec<Fragment>> {
    let Node::Pagination { limit, offset } = node else {
        return Err(super::registry::misrouted(node));
    };
    let mut out = Fragment::new();
    if let Some(n) = limit {
        out.append(clauses::limit(n));
    }
    if let Some(n) = offset {
        out.append(clauses::offset(n));
    }
    one(out)
}

pub fn for_update(_g: &dyn SqlGenerator, node: Node<'_>) -> QuarryResult<Vec<Fragment>> {
    let Node::Lock = node else {
        return Err(super::registry::misrouted(node));
    };
    one(clauses::for_update())
}

pub fn insert(g: &dyn SqlGenerator, node: Node<'_>) -> QuarryResult<Vec<Fragment>> {
    let insert = expect_node!(node, Node::Insert);
    let table = g.escape_identifier(&insert.table);
    if insert.row.is_empty() {
        return one(Fragment::sql(format!("INSERT INTO {} DEFAULT VALUES ", table)));
    }
    let columns: Vec<String> = insert.row.columns().map(|c| g.escape_identifier(c)).collect();
    one(clauses::insert(&table, &columns, insert.row.values().cloned().collect()))
}

pub fn update(g: &dyn SqlGenerator, node: Node<'_>) -> QuarryResult<Vec<Fragment>> {
    let update = expect_node!(node, Node::Update);
    if update.set.is_empty() {
        return Err(QuarryError::InvalidPayload(format!(
            "update on '{}' has no columns to set",
            update.table
        )));
    }
    let mut out = clauses::update(&g.escape_identifier(&update.table));
    out.append(clauses::set_multi(
        update
            .set
            .iter()
            .map(|(c, v)| (g.escape_identifier(c), v.clone()))
            .collect(),
    ));
    out.append(where_chain(g, &update.predicates)?);
    one(out)
}

pub fn delete(g: &dyn SqlGenerator, node: Node<'_>) -> QuarryResult<Vec<Fragment>> {
    let delete = expect_node!(node, Node::Delete);
    let mut out = clauses::delete(&g.escape_identifier(&delete.table));
    out.append(where_chain(g, &delete.predicates)?);
    one(out)
}

/// `INSERT ... ON CONFLICT (<keys>) DO UPDATE SET c = EXCLUDED.c`.
pub fn upsert_on_conflict(g: &dyn SqlGenerator, node: Node<'_>) -> QuarryResult<Vec<Fragment>> {
    let upsert = expect_node!(node, Node::Upsert);
    if upsert.conflict.is_empty() {
        return Err(QuarryError::InvalidPayload(format!(
            "upsert on '{}' needs at least one conflict column",
            upsert.table
        )));
    }
    let table = g.escape_identifier(&upsert.table);
    let columns: Vec<String> = upsert.row.columns().map(|c| g.escape_identifier(c)).collect();
    let mut out = clauses::insert(&table, &columns, upsert.row.values().cloned().collect());

    let updates: Vec<String> = upsert
        .row
        .columns()
        .filter(|c| !upsert.conflict.iter().any(|k| k == c))
        .map(|c| {
            let quoted = g.escape_identifier(c);
            format!("{} = EXCLUDED.{}", quoted, quoted)
        })
        .collect();

    let target = escape_all(g, &upsert.conflict).join(", ");
    if updates.is_empty() {
        out.push_sql(format!("ON CONFLICT ({}) DO NOTHING", target));
    } else {
        out.push_sql(format!("ON CONFLICT ({}) DO UPDATE SET {}", target, updates.join(", ")));
    }
    one(out)
}

pub fn returning_all(_g: &dyn SqlGenerator, node: Node<'_>) -> QuarryResult<Vec<Fragment>> {
    let Node::Returning = node else {
        return Err(super::registry::misrouted(node));
    };
    one(clauses::returning_all())
}

/// For engines where a clause has no counterpart (`FOR UPDATE` on SQLite,
/// `RETURNING` on MySQL, ...).
pub fn nothing(_g: &dyn SqlGenerator, _node: Node<'_>) -> QuarryResult<Vec<Fragment>> {
    none()
}

/// `CREATE TABLE IF NOT EXISTS <t> (\n<defs>\n);`
pub fn create_table_with(
    g: &dyn SqlGenerator,
    table: &Table,
    definition: fn(&dyn SqlGenerator, &Column) -> QuarryResult<String>,
    trailing: &[String],
) -> QuarryResult<Vec<Fragment>> {
    let mut defs = table
        .columns_to_add
        .iter()
        .map(|c| definition(g, c))
        .collect::<QuarryResult<Vec<_>>>()?;
    defs.extend(trailing.iter().cloned());
    one(Fragment::sql(format!(
        "CREATE TABLE IF NOT EXISTS {} (\n{}\n);",
        g.escape_identifier(&table.table_name),
        defs.join(",\n")
    )))
}

pub fn drop_table(g: &dyn SqlGenerator, node: Node<'_>) -> QuarryResult<Vec<Fragment>> {
    let table = expect_node!(node, Node::DropTable);
    one(Fragment::sql(format!("DROP TABLE {};", g.escape_identifier(table))))
}

/// ` DEFAULT <literal>`, falling back to CURRENT_TIMESTAMP for
/// auto-create columns.
pub fn default_clause(g: &dyn SqlGenerator, column: &Column) -> Option<String> {
    match &column.config.default_value {
        Some(DefaultValue::Literal(value)) => Some(format!(" DEFAULT {}", literal(g, value))),
        Some(DefaultValue::Expression(expr)) => Some(format!(" DEFAULT {}", expr)),
        None if column.config.auto_create => Some(" DEFAULT CURRENT_TIMESTAMP".to_string()),
        None => None,
    }
}

/// Inline literal for DDL.
pub fn literal(g: &dyn SqlGenerator, value: &Value) -> String {
    match value {
        Value::Null => "NULL".to_string(),
        Value::Bool(b) => g.bool_literal(*b),
        Value::Int(n) => n.to_string(),
        Value::Float(f) => f.to_string(),
        Value::Decimal(d) => d.to_string(),
        Value::Text(s) => g.string_literal(s),
        Value::Date(_) | Value::Time(_) | Value::DateTime(_) => g.string_literal(&value.to_string()),
    }
}

/// ` REFERENCES <t>(<c>)[ ON DELETE CASCADE]`
pub fn inline_references(g: &dyn SqlGenerator, column: &Column) -> String {
    let Some(refs) = &column.config.references else {
        return String::new();
    };
    let mut sql = format!(
        " REFERENCES {}({})",
        g.escape_identifier(&refs.table),
        g.escape_identifier(&refs.column)
    );
    if column.config.cascade {
        sql.push_str(" ON DELETE CASCADE");
    }
    sql
}

/// ` CHECK (<col> IN ('a', 'b'))` for enum columns on engines without ENUM.
pub fn enum_check(g: &dyn SqlGenerator, column: &Column) -> String {
    if column.values.is_empty() {
        return String::new();
    }
    format!(
        " CHECK ({} IN ({}))",
        g.escape_identifier(&column.name),
        quoted_list(g, &column.values)
    )
}

pub fn quoted_list(g: &dyn SqlGenerator, values: &[String]) -> String {
    values
        .iter()
        .map(|v| g.string_literal(v))
        .collect::<Vec<_>>()
        .join(", ")
}

pub fn savepoint(g: &dyn SqlGenerator, node: Node<'_>) -> QuarryResult<Vec<Fragment>> {
    let name = expect_node!(node, Node::Savepoint);
    one(clauses::savepoint(&g.escape_identifier(name)))
}

pub fn rollback_to_savepoint(g: &dyn SqlGenerator, node: Node<'_>) -> QuarryResult<Vec<Fragment>> {
    let name = expect_node!(node, Node::RollbackToSavepoint);
    one(clauses::rollback_to_savepoint(&g.escape_identifier(name)))
}

pub fn release_savepoint(g: &dyn SqlGenerator, node: Node<'_>) -> QuarryResult<Vec<Fragment>> {
    let name = expect_node!(node, Node::ReleaseSavepoint);
    one(clauses::release_savepoint(&g.escape_identifier(name)))
}
