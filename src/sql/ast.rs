//! Dialect-neutral descriptions of queries and mutations.

use std::fmt;
use std::str::FromStr;

use nom::{
    IResult,
    branch::alt,
    bytes::complete::{tag, tag_no_case, take_while, take_while1},
    character::complete::{multispace0, multispace1},
    combinator::{all_consuming, map, opt, recognize, value},
    sequence::{pair, preceded, tuple},
};

use crate::error::{QuarryError, QuarryResult};
use crate::value::{Record, Value};

/// Comparison operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    Eq,
    Ne,
    Gt,
    Gte,
    Lt,
    Lte,
    Like,
    NotLike,
}

impl Operator {
    pub fn as_sql(&self) -> &'static str {
        match self {
            Operator::Eq => "=",
            Operator::Ne => "!=",
            Operator::Gt => ">",
            Operator::Gte => ">=",
            Operator::Lt => "<",
            Operator::Lte => "<=",
            Operator::Like => "LIKE",
            Operator::NotLike => "NOT LIKE",
        }
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_sql())
    }
}

impl FromStr for Operator {
    type Err = QuarryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match all_consuming(preceded(multispace0, parse_operator))(s.trim_end()) {
            Ok((_, op)) => Ok(op),
            Err(_) => Err(QuarryError::InvalidOperator(s.to_string())),
        }
    }
}

impl TryFrom<&str> for Operator {
    type Error = QuarryError;

    fn try_from(s: &str) -> Result<Self, Self::Error> {
        s.parse()
    }
}

fn parse_operator(input: &str) -> IResult<&str, Operator> {
    alt((
        value(Operator::Gte, tag(">=")),
        value(Operator::Lte, tag("<=")),
        value(Operator::Ne, tag("!=")),
        value(Operator::Ne, tag("<>")),
        value(Operator::Gt, tag(">")),
        value(Operator::Lt, tag("<")),
        value(Operator::Eq, tag("=")),
        value(
            Operator::NotLike,
            tuple((tag_no_case("NOT"), multispace1, tag_no_case("LIKE"))),
        ),
        value(Operator::Like, tag_no_case("LIKE")),
    ))(input)
}

/// Parse an identifier, optionally table-qualified (`users.id`).
fn parse_column(input: &str) -> IResult<&str, &str> {
    recognize(pair(
        take_while1(|c: char| c.is_alphabetic() || c == '_'),
        take_while(|c: char| c.is_alphanumeric() || c == '_' || c == '.'),
    ))(input)
}

/// Split a `FindInput` where-key into column and operator.
///
/// `"age"` is an equality test; `"age >="`, `"name LIKE"` carry their own
/// operator.
pub fn parse_where_key(key: &str) -> QuarryResult<(String, Operator)> {
    let parsed: IResult<&str, (&str, Option<Operator>)> = all_consuming(tuple((
        preceded(multispace0, parse_column),
        map(
            tuple((opt(preceded(multispace0, parse_operator)), multispace0)),
            |(op, _)| op,
        ),
    )))(key);

    match parsed {
        Ok((_, (column, op))) => Ok((column.to_string(), op.unwrap_or(Operator::Eq))),
        Err(_) => Err(QuarryError::InvalidOperator(key.to_string())),
    }
}

/// How a predicate joins the chain before it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Conjunction {
    And,
    Or,
}

impl Conjunction {
    /// Keyword for this position in the chain: the first predicate always
    /// opens with WHERE.
    pub fn keyword(&self, first: bool) -> &'static str {
        match (first, self) {
            (true, _) => "WHERE",
            (false, Conjunction::And) => "AND",
            (false, Conjunction::Or) => "OR",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    Compare {
        column: String,
        op: Operator,
        value: Value,
    },
    Between {
        column: String,
        low: Value,
        high: Value,
        negated: bool,
    },
    In {
        column: String,
        values: Vec<Value>,
        negated: bool,
    },
    Null {
        column: String,
        negated: bool,
    },
    /// Caller-supplied SQL; each `?` is replaced by the next bound value.
    Raw { sql: String, params: Vec<Value> },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Predicate {
    pub conjunction: Conjunction,
    pub condition: Condition,
}

impl Predicate {
    pub fn and(condition: Condition) -> Self {
        Self {
            conjunction: Conjunction::And,
            condition,
        }
    }

    pub fn or(condition: Condition) -> Self {
        Self {
            conjunction: Conjunction::Or,
            condition,
        }
    }

    pub fn eq(column: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::and(Condition::Compare {
            column: column.into(),
            op: Operator::Eq,
            value: value.into(),
        })
    }
}

/// AND-chained equality predicates from a record, in record order.
pub fn equalities(record: &Record) -> Vec<Predicate> {
    record
        .iter()
        .map(|(column, value)| Predicate::eq(column, value.clone()))
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Direction {
    #[default]
    Asc,
    Desc,
}

impl Direction {
    pub fn as_sql(&self) -> &'static str {
        match self {
            Direction::Asc => "ASC",
            Direction::Desc => "DESC",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct OrderBy {
    pub columns: Vec<String>,
    pub direction: Direction,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinKind {
    Inner,
    Left,
}

impl JoinKind {
    pub fn as_sql(&self) -> &'static str {
        match self {
            JoinKind::Inner => "INNER JOIN",
            JoinKind::Left => "LEFT JOIN",
        }
    }
}

/// `<kind> <table> ON <left> = <right>`, where both sides are
/// `table.column` references.
#[derive(Debug, Clone, PartialEq)]
pub struct Join {
    pub kind: JoinKind,
    pub table: String,
    pub left: (String, String),
    pub right: (String, String),
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SelectNode {
    pub table: String,
    /// Empty means all columns.
    pub columns: Vec<String>,
    pub joins: Vec<Join>,
    pub predicates: Vec<Predicate>,
    pub group_by: Vec<String>,
    pub order_by: Option<OrderBy>,
    pub limit: Option<u64>,
    pub offset: Option<u64>,
    /// Lock selected rows for the rest of the transaction.
    pub for_update: bool,
}

impl SelectNode {
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct InsertNode {
    pub table: String,
    pub row: Record,
}

#[derive(Debug, Clone, PartialEq)]
pub struct UpdateNode {
    pub table: String,
    pub set: Record,
    pub predicates: Vec<Predicate>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DeleteNode {
    pub table: String,
    pub predicates: Vec<Predicate>,
}

/// Insert that falls back to updating the non-key columns when `conflict`
/// collides with an existing unique key.
#[derive(Debug, Clone, PartialEq)]
pub struct UpsertNode {
    pub table: String,
    pub row: Record,
    pub conflict: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_operator() {
        assert_eq!(">=".parse::<Operator>().unwrap(), Operator::Gte);
        assert_eq!("<>".parse::<Operator>().unwrap(), Operator::Ne);
        assert_eq!("not like".parse::<Operator>().unwrap(), Operator::NotLike);
        assert!("=>".parse::<Operator>().is_err());
    }

    #[test]
    fn test_parse_where_key() {
        assert_eq!(parse_where_key("age").unwrap(), ("age".into(), Operator::Eq));
        assert_eq!(parse_where_key("age >=").unwrap(), ("age".into(), Operator::Gte));
        assert_eq!(parse_where_key("age<").unwrap(), ("age".into(), Operator::Lt));
        assert_eq!(
            parse_where_key("users.name LIKE").unwrap(),
            ("users.name".into(), Operator::Like)
        );
        assert!(parse_where_key("age ~").is_err());
        assert!(parse_where_key("").is_err());
    }

    #[test]
    fn test_conjunction_keyword() {
        assert_eq!(Conjunction::Or.keyword(true), "WHERE");
        assert_eq!(Conjunction::Or.keyword(false), "OR");
        assert_eq!(Conjunction::And.keyword(false), "AND");
    }
}
