//! Clause templates.
//!
//! Pure functions producing SQL fragments from already-escaped table and
//! column names. Layout (leading newlines, trailing spaces) is part of the
//! output contract, so composed statements read the same on every engine:
//!
//! ```text
//! SELECT * FROM users
//! WHERE age = ?  AND status = ?
//! ORDER BY name ASC
//! LIMIT 10
//! ```

use crate::sql::ast::{Conjunction, Direction, JoinKind, Operator};
use crate::sql::fragment::Fragment;
use crate::value::Value;

/// `SELECT * FROM <table> `
pub fn select_all(table: &str) -> Fragment {
    Fragment::sql(format!("SELECT * FROM {} ", table))
}

/// `SELECT <c1>, <c2> FROM <table> `
pub fn select_columns(table: &str, columns: &[String]) -> Fragment {
    if columns.is_empty() {
        return select_all(table);
    }
    Fragment::sql(format!("SELECT {} FROM {} ", columns.join(", "), table))
}

/// Leading keyword of a predicate. Only the first one in a chain says WHERE.
fn lead(first: bool, conjunction: Conjunction) -> String {
    if first {
        format!("\n{} ", conjunction.keyword(true))
    } else {
        format!(" {} ", conjunction.keyword(false))
    }
}

/// `<lead> <col> <op> <val> `
pub fn compare(
    first: bool,
    conjunction: Conjunction,
    column: &str,
    op: Operator,
    value: Value,
) -> Fragment {
    let mut f = Fragment::sql(format!("{}{} {} ", lead(first, conjunction), column, op));
    f.push_param(value).push_sql(" ");
    f
}

/// `\nWHERE <col> = <val> `
pub fn where_clause(column: &str, value: impl Into<Value>) -> Fragment {
    compare(true, Conjunction::And, column, Operator::Eq, value.into())
}

/// ` AND <col> = <val> `
pub fn and_where(column: &str, value: impl Into<Value>) -> Fragment {
    compare(false, Conjunction::And, column, Operator::Eq, value.into())
}

/// ` OR <col> = <val> `
pub fn or_where(column: &str, value: impl Into<Value>) -> Fragment {
    compare(false, Conjunction::Or, column, Operator::Eq, value.into())
}

/// `<lead> <col> [NOT ]BETWEEN <low> AND <high> `
pub fn where_between(
    first: bool,
    conjunction: Conjunction,
    column: &str,
    low: Value,
    high: Value,
    negated: bool,
) -> Fragment {
    let not = if negated { "NOT " } else { "" };
    let mut f = Fragment::sql(format!("{}{} {}BETWEEN ", lead(first, conjunction), column, not));
    f.push_param(low).push_sql(" AND ").push_param(high).push_sql(" ");
    f
}

/// `<lead> <col> [NOT ]IN (<v1>, <v2>) `
///
/// An empty list matches nothing (or everything, when negated).
pub fn where_in(
    first: bool,
    conjunction: Conjunction,
    column: &str,
    values: Vec<Value>,
    negated: bool,
) -> Fragment {
    if values.is_empty() {
        let always = if negated { "1 = 1" } else { "1 = 0" };
        return Fragment::sql(format!("{}{} ", lead(first, conjunction), always));
    }
    let not = if negated { "NOT " } else { "" };
    let mut f = Fragment::sql(format!("{}{} {}IN (", lead(first, conjunction), column, not));
    f.push_params(values).push_sql(") ");
    f
}

/// `<lead> <col> IS [NOT ]NULL `
pub fn where_null(first: bool, conjunction: Conjunction, column: &str, negated: bool) -> Fragment {
    let not = if negated { "NOT " } else { "" };
    Fragment::sql(format!("{}{} IS {}NULL ", lead(first, conjunction), column, not))
}

/// `<lead> (<sql>) ` with each `?` in `sql` bound to the next value.
///
/// A `?` inside a single- or double-quoted literal is left as text.
/// PostgreSQL's bare `?` jsonb operators cannot be written here; use
/// `jsonb_exists` and friends instead.
///
/// Returns `None` when the marker count and value count differ.
pub fn raw_where(
    first: bool,
    conjunction: Conjunction,
    sql: &str,
    params: Vec<Value>,
) -> Option<Fragment> {
    let pieces = split_markers(sql);
    if pieces.len() != params.len() + 1 {
        return None;
    }
    let mut f = Fragment::sql(format!("{}(", lead(first, conjunction)));
    let mut params = params.into_iter();
    for (i, piece) in pieces.iter().enumerate() {
        if i > 0 {
            if let Some(v) = params.next() {
                f.push_param(v);
            }
        }
        f.push_sql(*piece);
    }
    f.push_sql(") ");
    Some(f)
}

/// Split on `?` outside quoted literals. A doubled quote inside a literal
/// is an escaped quote and keeps the literal open.
fn split_markers(sql: &str) -> Vec<&str> {
    let mut pieces = Vec::new();
    let mut quote: Option<char> = None;
    let mut start = 0;
    for (i, c) in sql.char_indices() {
        match (quote, c) {
            (None, '\'' | '"') => quote = Some(c),
            (Some(q), c) if c == q => quote = None,
            (None, '?') => {
                pieces.push(&sql[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    pieces.push(&sql[start..]);
    pieces
}

/// `\nGROUP BY <c1>, <c2> `
pub fn group_by(columns: &[String]) -> Fragment {
    Fragment::sql(format!("\nGROUP BY {} ", columns.join(", ")))
}

/// `\nORDER BY <c1>, <c2> <ASC|DESC>`
pub fn order_by(columns: &[String], direction: Direction) -> Fragment {
    Fragment::sql(format!("\nORDER BY {} {}", columns.join(", "), direction.as_sql()))
}

/// `\nLIMIT <n> `
pub fn limit(n: impl std::fmt::Display) -> Fragment {
    Fragment::sql(format!("\nLIMIT {} ", n))
}

/// `\nOFFSET <n> `
pub fn offset(n: u64) -> Fragment {
    Fragment::sql(format!("\nOFFSET {} ", n))
}

/// `\n<kind> <table> ON <l> = <r> `
pub fn join(kind: JoinKind, table: &str, left: &str, right: &str) -> Fragment {
    Fragment::sql(format!("\n{} {} ON {} = {} ", kind.as_sql(), table, left, right))
}

/// `\nFOR UPDATE`
pub fn for_update() -> Fragment {
    Fragment::sql("\nFOR UPDATE")
}

/// `INSERT INTO <table> (<cols>) VALUES (<vals>) `
pub fn insert(table: &str, columns: &[String], values: Vec<Value>) -> Fragment {
    let mut f = Fragment::sql(format!("INSERT INTO {} ({}) VALUES (", table, columns.join(", ")));
    f.push_params(values).push_sql(") ");
    f
}

/// `UPDATE <table> `
pub fn update(table: &str) -> Fragment {
    Fragment::sql(format!("UPDATE {} ", table))
}

/// `SET <c1> = <v1>, <c2> = <v2> `
pub fn set_multi(assignments: Vec<(String, Value)>) -> Fragment {
    let mut f = Fragment::sql("SET ");
    for (i, (column, value)) in assignments.into_iter().enumerate() {
        if i > 0 {
            f.push_sql(", ");
        }
        f.push_sql(format!("{} = ", column)).push_param(value);
    }
    f.push_sql(" ");
    f
}

/// `DELETE FROM <table> `
pub fn delete(table: &str) -> Fragment {
    Fragment::sql(format!("DELETE FROM {} ", table))
}

/// `\nRETURNING *`
pub fn returning_all() -> Fragment {
    Fragment::sql("\nRETURNING *")
}

pub fn savepoint(name: &str) -> Fragment {
    Fragment::sql(format!("SAVEPOINT {}", name))
}

pub fn rollback_to_savepoint(name: &str) -> Fragment {
    Fragment::sql(format!("ROLLBACK TO SAVEPOINT {}", name))
}

pub fn release_savepoint(name: &str) -> Fragment {
    Fragment::sql(format!("RELEASE SAVEPOINT {}", name))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_where_chain_wire_form() {
        let mut f = where_clause("age", 18);
        f.append(and_where("status", "active"));
        assert_eq!(f.inline(), "\nWHERE age = 18  AND status = active ");
    }

    #[test]
    fn test_select_templates() {
        assert_eq!(select_all("users").inline(), "SELECT * FROM users ");
        assert_eq!(
            select_columns("users", &["id".into(), "name".into()]).inline(),
            "SELECT id, name FROM users "
        );
    }

    #[test]
    fn test_order_limit_offset() {
        assert_eq!(
            order_by(&["a".into(), "b".into()], Direction::Desc).inline(),
            "\nORDER BY a, b DESC"
        );
        assert_eq!(limit(5).inline(), "\nLIMIT 5 ");
        assert_eq!(offset(10).inline(), "\nOFFSET 10 ");
    }

    #[test]
    fn test_insert_binds_values() {
        let f = insert("users", &["name".into(), "age".into()], vec!["A".into(), 3.into()]);
        assert_eq!(f.inline(), "INSERT INTO users (name, age) VALUES (A, 3) ");
        assert_eq!(f.params().count(), 2);
    }

    #[test]
    fn test_where_in_empty_list() {
        assert_eq!(
            where_in(true, Conjunction::And, "id", vec![], false).inline(),
            "\nWHERE 1 = 0 "
        );
        assert_eq!(
            where_in(false, Conjunction::Or, "id", vec![], true).inline(),
            " OR 1 = 1 "
        );
    }

    #[test]
    fn test_raw_where_marker_count() {
        let f = raw_where(true, Conjunction::And, "age > ? AND age < ?", vec![1.into(), 9.into()]).unwrap();
        assert_eq!(f.inline(), "\nWHERE (age > 1 AND age < 9) ");
        assert!(raw_where(true, Conjunction::And, "age > ?", vec![]).is_none());
    }

    #[test]
    fn test_raw_where_ignores_quoted_markers() {
        let f = raw_where(true, Conjunction::And, "note = '?' AND id = ?", vec![5.into()]).unwrap();
        assert_eq!(f.params().count(), 1);
        assert_eq!(f.inline(), "\nWHERE (note = '?' AND id = 5) ");

        let f = raw_where(
            false,
            Conjunction::Or,
            r#"title = 'it''s ?' OR "odd?col" = ?"#,
            vec!["x".into()],
        )
        .unwrap();
        assert_eq!(f.inline(), r#" OR (title = 'it''s ?' OR "odd?col" = x) "#);
    }
}
