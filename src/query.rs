//! Fluent SELECT builder.
//!
//! Every step consumes the builder and hands it back, and rendering always
//! follows `SELECT → JOIN → WHERE → GROUP BY → ORDER BY → LIMIT/OFFSET →
//! lock` whatever order the steps were called in.

use std::marker::PhantomData;

use crate::dialect::{Engine, Node, Registry};
use crate::engine::{DataSource, Session};
use crate::error::{QuarryError, QuarryResult};
use crate::model::Model;
use crate::sql::ast::{Condition, Conjunction, Direction, Operator, OrderBy, Predicate, SelectNode};
use crate::sql::fragment::{Fragment, Statement};
use crate::transaction::Transaction;
use crate::value::Value;

pub struct QueryBuilder<M: Model> {
    engine: Engine,
    source: Option<DataSource>,
    query: SelectNode,
    unknown_relations: Vec<String>,
    _model: PhantomData<fn() -> M>,
}

impl<M: Model> Clone for QueryBuilder<M> {
    fn clone(&self) -> Self {
        Self {
            engine: self.engine,
            source: self.source.clone(),
            query: self.query.clone(),
            unknown_relations: self.unknown_relations.clone(),
            _model: PhantomData,
        }
    }
}

impl<M: Model> QueryBuilder<M> {
    /// A builder that can render but not execute.
    pub fn new(engine: Engine) -> Self {
        Self {
            engine,
            source: None,
            query: SelectNode::new(M::TABLE),
            unknown_relations: Vec::new(),
            _model: PhantomData,
        }
    }

    pub fn with_source(source: DataSource) -> Self {
        let mut builder = Self::new(source.engine());
        builder.source = Some(source);
        builder
    }

    pub fn select<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.query.columns.extend(columns.into_iter().map(Into::into));
        self
    }

    fn push(mut self, conjunction: Conjunction, condition: Condition) -> Self {
        self.query.predicates.push(Predicate {
            conjunction,
            condition,
        });
        self
    }

    fn compare(
        self,
        conjunction: Conjunction,
        column: impl Into<String>,
        op: Operator,
        value: impl Into<Value>,
    ) -> Self {
        self.push(
            conjunction,
            Condition::Compare {
                column: column.into(),
                op,
                value: value.into(),
            },
        )
    }

    /// `column = value`. Comparing with a null value renders `IS NULL`.
    pub fn where_(self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.compare(Conjunction::And, column, Operator::Eq, value)
    }

    pub fn and_where(self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.where_(column, value)
    }

    pub fn or_where(self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.compare(Conjunction::Or, column, Operator::Eq, value)
    }

    pub fn where_op(
        self,
        column: impl Into<String>,
        op: Operator,
        value: impl Into<Value>,
    ) -> Self {
        self.compare(Conjunction::And, column, op, value)
    }

    pub fn and_where_op(
        self,
        column: impl Into<String>,
        op: Operator,
        value: impl Into<Value>,
    ) -> Self {
        self.where_op(column, op, value)
    }

    pub fn or_where_op(
        self,
        column: impl Into<String>,
        op: Operator,
        value: impl Into<Value>,
    ) -> Self {
        self.compare(Conjunction::Or, column, op, value)
    }

    fn between(
        self,
        conjunction: Conjunction,
        column: impl Into<String>,
        low: impl Into<Value>,
        high: impl Into<Value>,
        negated: bool,
    ) -> Self {
        self.push(
            conjunction,
            Condition::Between {
                column: column.into(),
                low: low.into(),
                high: high.into(),
                negated,
            },
        )
    }

    pub fn where_between(
        self,
        column: impl Into<String>,
        low: impl Into<Value>,
        high: impl Into<Value>,
    ) -> Self {
        self.between(Conjunction::And, column, low, high, false)
    }

    pub fn and_where_between(
        self,
        column: impl Into<String>,
        low: impl Into<Value>,
        high: impl Into<Value>,
    ) -> Self {
        self.between(Conjunction::And, column, low, high, false)
    }

    pub fn or_where_between(
        self,
        column: impl Into<String>,
        low: impl Into<Value>,
        high: impl Into<Value>,
    ) -> Self {
        self.between(Conjunction::Or, column, low, high, false)
    }

    pub fn where_not_between(
        self,
        column: impl Into<String>,
        low: impl Into<Value>,
        high: impl Into<Value>,
    ) -> Self {
        self.between(Conjunction::And, column, low, high, true)
    }

    pub fn and_where_not_between(
        self,
        column: impl Into<String>,
        low: impl Into<Value>,
        high: impl Into<Value>,
    ) -> Self {
        self.between(Conjunction::And, column, low, high, true)
    }

    pub fn or_where_not_between(
        self,
        column: impl Into<String>,
        low: impl Into<Value>,
        high: impl Into<Value>,
    ) -> Self {
        self.between(Conjunction::Or, column, low, high, true)
    }

    fn within<I, V>(self, conjunction: Conjunction, column: impl Into<String>, values: I, negated: bool) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        self.push(
            conjunction,
            Condition::In {
                column: column.into(),
                values: values.into_iter().map(Into::into).collect(),
                negated,
            },
        )
    }

    pub fn where_in<I, V>(self, column: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        self.within(Conjunction::And, column, values, false)
    }

    pub fn and_where_in<I, V>(self, column: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        self.within(Conjunction::And, column, values, false)
    }

    pub fn or_where_in<I, V>(self, column: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        self.within(Conjunction::Or, column, values, false)
    }

    pub fn where_not_in<I, V>(self, column: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        self.within(Conjunction::And, column, values, true)
    }

    pub fn and_where_not_in<I, V>(self, column: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        self.within(Conjunction::And, column, values, true)
    }

    pub fn or_where_not_in<I, V>(self, column: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        self.within(Conjunction::Or, column, values, true)
    }

    fn null(self, conjunction: Conjunction, column: impl Into<String>, negated: bool) -> Self {
        self.push(
            conjunction,
            Condition::Null {
                column: column.into(),
                negated,
            },
        )
    }

    pub fn where_null(self, column: impl Into<String>) -> Self {
        self.null(Conjunction::And, column, false)
    }

    pub fn and_where_null(self, column: impl Into<String>) -> Self {
        self.null(Conjunction::And, column, false)
    }

    pub fn or_where_null(self, column: impl Into<String>) -> Self {
        self.null(Conjunction::Or, column, false)
    }

    pub fn where_not_null(self, column: impl Into<String>) -> Self {
        self.null(Conjunction::And, column, true)
    }

    pub fn and_where_not_null(self, column: impl Into<String>) -> Self {
        self.null(Conjunction::And, column, true)
    }

    pub fn or_where_not_null(self, column: impl Into<String>) -> Self {
        self.null(Conjunction::Or, column, true)
    }

    fn raw<I, V>(self, conjunction: Conjunction, sql: impl Into<String>, params: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        self.push(
            conjunction,
            Condition::Raw {
                sql: sql.into(),
                params: params.into_iter().map(Into::into).collect(),
            },
        )
    }

    /// Caller-written predicate, wrapped in parentheses. Each `?` takes the
    /// next value from `params`.
    pub fn raw_where<I, V>(self, sql: impl Into<String>, params: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        self.raw(Conjunction::And, sql, params)
    }

    pub fn and_raw_where<I, V>(self, sql: impl Into<String>, params: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        self.raw(Conjunction::And, sql, params)
    }

    pub fn or_raw_where<I, V>(self, sql: impl Into<String>, params: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        self.raw(Conjunction::Or, sql, params)
    }

    pub fn group_by<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.query.group_by.extend(columns.into_iter().map(Into::into));
        self
    }

    pub fn order_by<I, S>(mut self, columns: I, direction: Direction) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.query.order_by = Some(OrderBy {
            columns: columns.into_iter().map(Into::into).collect(),
            direction,
        });
        self
    }

    pub fn limit(mut self, n: u64) -> Self {
        self.query.limit = Some(n);
        self
    }

    pub fn offset(mut self, n: u64) -> Self {
        self.query.offset = Some(n);
        self
    }

    /// Lock matched rows until the surrounding transaction ends.
    pub fn for_update(mut self) -> Self {
        self.query.for_update = true;
        self
    }

    /// Join the named relations declared by `M::relations()`.
    pub fn add_relations<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for name in names {
            let name = name.as_ref();
            match M::relation(name) {
                Some(relation) => self.query.joins.push(relation.join(M::TABLE)),
                None => self.unknown_relations.push(name.to_string()),
            }
        }
        self
    }

    pub fn node(&self) -> &SelectNode {
        &self.query
    }

    pub fn to_fragment(&self) -> QuarryResult<Fragment> {
        if let Some(name) = self.unknown_relations.first() {
            return Err(QuarryError::InvalidPayload(format!(
                "'{}' has no relation named '{}'",
                M::TABLE,
                name
            )));
        }
        render_select(self.engine, &self.query)
    }

    pub fn to_statement(&self) -> QuarryResult<Statement> {
        Ok(self.to_fragment()?.to_statement(self.engine.generator()))
    }

    /// First matching row.
    pub async fn one(self) -> QuarryResult<Option<M>> {
        Ok(self.limit(1).many().await?.into_iter().next())
    }

    pub async fn many(self) -> QuarryResult<Vec<M>> {
        let source = self.source.as_ref().ok_or(QuarryError::NoDataSource)?;
        let mut conn = source.acquire().await?;
        let mut session = source.session(&mut conn);
        self.fetch(&mut session).await
    }

    /// Run on a transaction's connection.
    pub async fn many_in(self, trx: &mut Transaction) -> QuarryResult<Vec<M>> {
        let mut session = trx.session()?;
        self.fetch(&mut session).await
    }

    pub(crate) async fn fetch(&self, session: &mut Session<'_>) -> QuarryResult<Vec<M>> {
        let statement = self.to_statement()?;
        session
            .fetch_all(&statement, "find", M::TABLE)
            .await?
            .iter()
            .map(M::hydrate)
            .collect()
    }
}

/// Render a select node clause by clause through the registry.
pub(crate) fn render_select(engine: Engine, query: &SelectNode) -> QuarryResult<Fragment> {
    let registry = Registry::global();
    let mut out = registry.render_one(engine, Node::Select(query))?;
    for join in &query.joins {
        out.append(registry.render_one(engine, Node::Join(join))?);
    }
    if !query.predicates.is_empty() {
        out.append(registry.render_one(engine, Node::Where(&query.predicates))?);
    }
    if !query.group_by.is_empty() {
        out.append(registry.render_one(engine, Node::GroupBy(&query.group_by))?);
    }
    if let Some(order) = &query.order_by {
        out.append(registry.render_one(engine, Node::OrderBy(order))?);
    }
    if query.limit.is_some() || query.offset.is_some() {
        out.append(registry.render_one(
            engine,
            Node::Pagination {
                limit: query.limit,
                offset: query.offset,
            },
        )?);
    }
    if query.for_update {
        out.append(registry.render_one(engine, Node::Lock)?);
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field;
    use crate::model::{Field, Relation};
    use pretty_assertions::assert_eq;

    #[derive(Debug, Default)]
    struct User {
        id: Option<i64>,
        age: i32,
        status: String,
    }

    impl Model for User {
        const TABLE: &'static str = "users";
        const FIELDS: &'static [Field<Self>] =
            &[field!(User, id), field!(User, age), field!(User, status)];

        fn relations() -> Vec<Relation> {
            vec![Relation::has_many("posts", || "posts", "user_id")]
        }
    }

    fn users(engine: Engine) -> QueryBuilder<User> {
        QueryBuilder::new(engine)
    }

    #[test]
    fn test_where_chain_inlines() {
        let q = users(Engine::MySql).where_("age", 18).and_where("status", "active");
        assert_eq!(
            q.to_fragment().unwrap().inline(),
            "SELECT * FROM users \nWHERE age = 18  AND status = active "
        );
    }

    #[test]
    fn test_clause_order_is_fixed() {
        let q = users(Engine::Postgres)
            .limit(10)
            .order_by(["age"], Direction::Desc)
            .offset(20)
            .where_op("age", Operator::Gte, 18)
            .or_where("status", "vip")
            .group_by(["status"])
            .select(["status"]);
        let stmt = q.to_statement().unwrap();
        assert_eq!(
            stmt.sql,
            "SELECT status FROM users \nWHERE age >= $1  OR status = $2 \nGROUP BY status \nORDER BY age DESC\nLIMIT 10 \nOFFSET 20 "
        );
        assert_eq!(stmt.params, vec![Value::Int(18), Value::from("vip")]);
    }

    #[test]
    fn test_identical_sequences_render_identically() {
        let build = || {
            users(Engine::Cockroach)
                .where_in("id", [1, 2, 3])
                .or_where_null("status")
                .for_update()
        };
        assert_eq!(build().to_statement().unwrap(), build().to_statement().unwrap());
    }

    #[test]
    fn test_range_and_null_predicates() {
        let q = users(Engine::Sqlite)
            .where_between("age", 18, 30)
            .and_where_not_in("status", ["banned"])
            .or_where_not_null("id")
            .raw_where("age % ? = 0", [2]);
        assert_eq!(
            q.to_fragment().unwrap().inline(),
            "SELECT * FROM users \nWHERE age BETWEEN 18 AND 30  AND status NOT IN (banned)  OR id IS NOT NULL  AND (age % 2 = 0) "
        );
    }

    #[test]
    fn test_relations_join_root_columns() {
        let q = users(Engine::MySql).add_relations(["posts"]).where_("posts.title", "x");
        assert_eq!(
            q.to_fragment().unwrap().inline(),
            "SELECT users.* FROM users \nLEFT JOIN posts ON posts.user_id = users.id \nWHERE posts.title = x "
        );
    }

    #[test]
    fn test_unknown_relation_fails_on_render() {
        let err = users(Engine::MySql).add_relations(["friends"]).to_fragment().unwrap_err();
        assert!(matches!(err, QuarryError::InvalidPayload(_)));
    }

    #[tokio::test]
    async fn test_detached_builder_cannot_execute() {
        let err = users(Engine::Sqlite).many().await.unwrap_err();
        assert!(matches!(err, QuarryError::NoDataSource));
    }
}
