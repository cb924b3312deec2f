//! Model manager: CRUD, upsert and find-or-create for one model type.

use std::marker::PhantomData;

use tracing::{debug, warn};

use crate::dialect::{Node, Registry};
use crate::engine::{DataSource, PooledConnection, Session};
use crate::error::{QuarryError, QuarryResult};
use crate::model::Model;
use crate::query::{QueryBuilder, render_select};
use crate::sql::ast::{
    Condition, DeleteNode, Direction, InsertNode, OrderBy, Predicate, SelectNode, UpdateNode,
    UpsertNode, equalities, parse_where_key,
};
use crate::transaction::Transaction;
use crate::value::{Record, Value};

/// Criteria for `find` and friends. Unset fields add no clause.
#[derive(Debug, Clone, Default)]
pub struct FindInput {
    pub select: Vec<String>,
    /// Keys are column names, optionally followed by an operator:
    /// `"age"`, `"age >="`, `"name LIKE"`.
    pub where_: Record,
    pub relations: Vec<String>,
    pub order_by: Option<OrderBy>,
    pub group_by: Vec<String>,
    pub limit: Option<u64>,
    pub offset: Option<u64>,
}

impl FindInput {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn select<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.select.extend(columns.into_iter().map(Into::into));
        self
    }

    pub fn where_(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.where_.insert(key, value);
        self
    }

    pub fn relations<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.relations.extend(names.into_iter().map(Into::into));
        self
    }

    pub fn order_by<I, S>(mut self, columns: I, direction: Direction) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.order_by = Some(OrderBy {
            columns: columns.into_iter().map(Into::into).collect(),
            direction,
        });
        self
    }

    pub fn group_by<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.group_by.extend(columns.into_iter().map(Into::into));
        self
    }

    pub fn limit(mut self, n: u64) -> Self {
        self.limit = Some(n);
        self
    }

    pub fn offset(mut self, n: u64) -> Self {
        self.offset = Some(n);
        self
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct FirstOrCreateOptions {
    /// Report whether the row was created.
    pub with_created_flag: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum FirstOrCreate<M> {
    Model(M),
    Tracked { model: M, created: bool },
}

impl<M> FirstOrCreate<M> {
    pub fn into_model(self) -> M {
        match self {
            FirstOrCreate::Model(model) | FirstOrCreate::Tracked { model, .. } => model,
        }
    }

    /// `None` unless the created flag was requested.
    pub fn created(&self) -> Option<bool> {
        match self {
            FirstOrCreate::Model(_) => None,
            FirstOrCreate::Tracked { created, .. } => Some(*created),
        }
    }
}

pub struct ModelManager<M: Model> {
    source: DataSource,
    _model: PhantomData<fn() -> M>,
}

impl<M: Model> Clone for ModelManager<M> {
    fn clone(&self) -> Self {
        Self {
            source: self.source.clone(),
            _model: PhantomData,
        }
    }
}

impl<M: Model> ModelManager<M> {
    pub fn new(source: DataSource) -> Self {
        Self {
            source,
            _model: PhantomData,
        }
    }

    pub fn source(&self) -> &DataSource {
        &self.source
    }

    pub fn query_builder(&self) -> QueryBuilder<M> {
        QueryBuilder::with_source(self.source.clone())
    }

    pub fn create_transaction(&self) -> Transaction {
        Transaction::new(self.source.clone())
    }

    /// Builder for a `FindInput`. Where-keys are parsed here, so a bad
    /// operator fails before anything is sent.
    pub fn build_query(&self, input: FindInput) -> QuarryResult<QueryBuilder<M>> {
        let mut builder = self.query_builder().select(input.select);
        for (key, value) in input.where_ {
            let (column, op) = parse_where_key(&key)?;
            builder = builder.where_op(column, op, value);
        }
        builder = builder.add_relations(input.relations).group_by(input.group_by);
        if let Some(order) = input.order_by {
            builder = builder.order_by(order.columns, order.direction);
        }
        if let Some(n) = input.limit {
            builder = builder.limit(n);
        }
        if let Some(n) = input.offset {
            builder = builder.offset(n);
        }
        Ok(builder)
    }

    pub async fn find(&self, input: Option<FindInput>) -> QuarryResult<Vec<M>> {
        self.build_query(input.unwrap_or_default())?.many().await
    }

    pub async fn find_one(&self, input: FindInput) -> QuarryResult<Option<M>> {
        self.build_query(input)?.one().await
    }

    pub async fn find_one_by_id(&self, id: impl Into<Value>) -> QuarryResult<Option<M>> {
        self.query_builder().where_(M::PRIMARY_KEY, id).one().await
    }

    pub async fn find_one_or_fail(&self, input: FindInput) -> QuarryResult<M> {
        self.find_one(input).await?.ok_or_else(not_found::<M>)
    }

    /// Insert `model`. Null fields are left out so column defaults apply.
    /// Returns the stored row, or `None` if nothing was inserted.
    pub async fn save(&self, model: &M, trx: Option<&mut Transaction>) -> QuarryResult<Option<M>> {
        let mut held = None;
        let mut session = self.session(trx, &mut held).await?;
        insert_model(&mut session, model).await
    }

    /// Update the row matching `model`'s primary key with every field.
    pub async fn update(&self, model: &M, trx: Option<&mut Transaction>) -> QuarryResult<u64> {
        let mut held = None;
        let mut session = self.session(trx, &mut held).await?;
        update_model(&mut session, model).await
    }

    pub async fn delete(&self, model: &M, trx: Option<&mut Transaction>) -> QuarryResult<u64> {
        let mut held = None;
        let mut session = self.session(trx, &mut held).await?;
        delete_model(&mut session, model).await
    }

    pub async fn delete_by_column(
        &self,
        column: &str,
        value: impl Into<Value>,
        trx: Option<&mut Transaction>,
    ) -> QuarryResult<u64> {
        let mut held = None;
        let mut session = self.session(trx, &mut held).await?;
        delete_where::<M>(&mut session, vec![Predicate::eq(column, value)]).await
    }

    /// Update the first row matching `match_` with `payload`, or insert
    /// `match_` overlaid by `payload` if there is none.
    ///
    /// The lookup takes a row lock, which only covers rows that already
    /// exist. Two callers that both miss will both insert unless the
    /// `match_` columns carry a unique index; with one, the loser fails
    /// with [`QuarryError::QueryFailed`] and its transaction rolls back.
    /// SQLite has no row locks and serialises writers instead.
    pub async fn upsert(&self, match_: Record, payload: Record) -> QuarryResult<M> {
        let mut trx = self.create_transaction();
        trx.start().await?;
        let result = upsert_in::<M>(&mut trx, &match_, &payload).await;
        finish(trx, result).await
    }

    /// Insert-or-update each payload on `conflict` columns.
    ///
    /// Payloads sharing a conflict key collapse into one: the last payload
    /// for a key wins, and keys keep the position of their first
    /// appearance. Returns one model per distinct key.
    pub async fn upsert_many(&self, conflict: &[&str], payloads: Vec<Record>) -> QuarryResult<Vec<M>> {
        let batch = dedupe_by_key(conflict, payloads)?;
        if batch.is_empty() {
            return Ok(Vec::new());
        }
        let mut trx = self.create_transaction();
        trx.start().await?;
        let result = upsert_batch::<M>(&mut trx, conflict, batch).await;
        finish(trx, result).await
    }

    /// Return the first row matching `match_` untouched, or create one from
    /// `match_` overlaid by `payload`.
    ///
    /// Concurrent creation has the same exposure as [`upsert`](Self::upsert):
    /// give the `match_` columns a unique index.
    pub async fn first_or_create(
        &self,
        match_: Record,
        payload: Record,
        options: FirstOrCreateOptions,
    ) -> QuarryResult<FirstOrCreate<M>> {
        let mut trx = self.create_transaction();
        trx.start().await?;
        let result = first_or_create_in::<M>(&mut trx, &match_, &payload).await;
        let (model, created) = finish(trx, result).await?;
        if options.with_created_flag {
            Ok(FirstOrCreate::Tracked { model, created })
        } else {
            Ok(FirstOrCreate::Model(model))
        }
    }

    /// Remove every row. With `force`, foreign-key enforcement is switched
    /// off around the truncate and switched back on afterwards, even when
    /// the truncate fails.
    pub async fn truncate(&self, force: bool) -> QuarryResult<()> {
        let engine = self.source.engine();
        let registry = Registry::global();
        let generator = engine.generator();
        let render = |node| -> QuarryResult<Vec<_>> {
            Ok(registry
                .render(engine, node)?
                .iter()
                .map(|f| f.to_statement(generator))
                .collect())
        };
        let truncate = render(Node::Truncate {
            table: M::TABLE,
            force,
        })?;

        let mut conn = self.source.acquire().await?;
        let mut session = self.source.session(&mut conn);
        if !force {
            for statement in &truncate {
                session.execute(statement, "truncate", M::TABLE).await?;
            }
            return Ok(());
        }

        let disable = render(Node::ForeignKeyChecks { enabled: false })?;
        let enable = render(Node::ForeignKeyChecks { enabled: true })?;
        for statement in &disable {
            session.execute(statement, "truncate", M::TABLE).await?;
        }
        let mut result = Ok(());
        for statement in &truncate {
            if let Err(e) = session.execute(statement, "truncate", M::TABLE).await {
                result = Err(e);
                break;
            }
        }
        for statement in &enable {
            session.execute(statement, "truncate", M::TABLE).await?;
        }
        result
    }

    async fn session<'a>(
        &self,
        trx: Option<&'a mut Transaction>,
        held: &'a mut Option<PooledConnection>,
    ) -> QuarryResult<Session<'a>> {
        match trx {
            Some(trx) => trx.session(),
            None => {
                let conn = held.insert(self.source.acquire().await?);
                Ok(self.source.session(conn))
            }
        }
    }
}

fn not_found<M: Model>() -> QuarryError {
    QuarryError::NotFound {
        table: M::TABLE.to_string(),
    }
}

fn key_of<M: Model>(model: &M) -> QuarryResult<Value> {
    match model.primary_key() {
        Value::Null => Err(QuarryError::MissingPrimaryKey {
            table: M::TABLE.to_string(),
        }),
        key => Ok(key),
    }
}

/// Commit on success, roll back on failure.
async fn finish<T>(mut trx: Transaction, result: QuarryResult<T>) -> QuarryResult<T> {
    match result {
        Ok(value) => {
            trx.commit().await?;
            Ok(value)
        }
        Err(e) => {
            if let Err(rollback) = trx.rollback().await {
                warn!(error = %rollback, "rollback after failed operation also failed");
            }
            Err(e)
        }
    }
}

async fn select_where<M: Model>(
    session: &mut Session<'_>,
    predicates: Vec<Predicate>,
    limit: Option<u64>,
    lock: bool,
) -> QuarryResult<Vec<M>> {
    let mut query = SelectNode::new(M::TABLE);
    query.predicates = predicates;
    query.limit = limit;
    query.for_update = lock;
    let engine = session.engine();
    let statement = render_select(engine, &query)?.to_statement(engine.generator());
    session
        .fetch_all(&statement, "find", M::TABLE)
        .await?
        .iter()
        .map(M::hydrate)
        .collect()
}

async fn first_where<M: Model>(
    session: &mut Session<'_>,
    predicates: Vec<Predicate>,
    lock: bool,
) -> QuarryResult<Option<M>> {
    Ok(select_where::<M>(session, predicates, Some(1), lock)
        .await?
        .into_iter()
        .next())
}

async fn find_by_key<M: Model>(session: &mut Session<'_>, key: Value) -> QuarryResult<Option<M>> {
    first_where::<M>(session, vec![Predicate::eq(M::PRIMARY_KEY, key)], false).await
}

pub(crate) async fn insert_model<M: Model>(
    session: &mut Session<'_>,
    model: &M,
) -> QuarryResult<Option<M>> {
    let row: Record = model
        .to_record()
        .into_iter()
        .filter(|(_, value)| !value.is_null())
        .collect();
    insert_record::<M>(session, row).await
}

/// Insert `row` and read the stored row back: through `RETURNING *` where
/// the engine has it, otherwise by primary key or last insert id.
async fn insert_record<M: Model>(session: &mut Session<'_>, row: Record) -> QuarryResult<Option<M>> {
    let engine = session.engine();
    let generator = engine.generator();
    let registry = Registry::global();

    let node = InsertNode {
        table: M::TABLE.to_string(),
        row,
    };
    let mut fragment = registry.render_one(engine, Node::Insert(&node))?;
    let returning = registry.render_one(engine, Node::Returning)?;

    if !returning.is_empty() {
        fragment.append(returning);
        let rows = session
            .fetch_all(&fragment.to_statement(generator), "save", M::TABLE)
            .await?;
        return rows.first().map(M::hydrate).transpose();
    }

    let result = session
        .execute(&fragment.to_statement(generator), "save", M::TABLE)
        .await?;
    if result.rows_affected() == 0 {
        return Ok(None);
    }
    let key = match node.row.get(M::PRIMARY_KEY) {
        Some(key) => key.clone(),
        None => match result.last_insert_id() {
            Some(id) if id > 0 => Value::Int(id),
            _ => {
                debug!(table = M::TABLE, "no generated key; returning the inserted values");
                return M::hydrate(&node.row).map(Some);
            }
        },
    };
    find_by_key::<M>(session, key).await
}

pub(crate) async fn update_model<M: Model>(session: &mut Session<'_>, model: &M) -> QuarryResult<u64> {
    let key = key_of(model)?;
    let mut set = model.to_record();
    set.remove(M::PRIMARY_KEY);
    update_where::<M>(session, set, vec![Predicate::eq(M::PRIMARY_KEY, key)]).await
}

async fn update_where<M: Model>(
    session: &mut Session<'_>,
    set: Record,
    predicates: Vec<Predicate>,
) -> QuarryResult<u64> {
    let engine = session.engine();
    let node = UpdateNode {
        table: M::TABLE.to_string(),
        set,
        predicates,
    };
    let statement = Registry::global()
        .render_one(engine, Node::Update(&node))?
        .to_statement(engine.generator());
    Ok(session
        .execute(&statement, "update", M::TABLE)
        .await?
        .rows_affected())
}

pub(crate) async fn delete_model<M: Model>(session: &mut Session<'_>, model: &M) -> QuarryResult<u64> {
    let key = key_of(model)?;
    delete_where::<M>(session, vec![Predicate::eq(M::PRIMARY_KEY, key)]).await
}

async fn delete_where<M: Model>(session: &mut Session<'_>, predicates: Vec<Predicate>) -> QuarryResult<u64> {
    let engine = session.engine();
    let node = DeleteNode {
        table: M::TABLE.to_string(),
        predicates,
    };
    let statement = Registry::global()
        .render_one(engine, Node::Delete(&node))?
        .to_statement(engine.generator());
    Ok(session
        .execute(&statement, "delete", M::TABLE)
        .await?
        .rows_affected())
}

async fn upsert_in<M: Model>(trx: &mut Transaction, match_: &Record, payload: &Record) -> QuarryResult<M> {
    let mut session = trx.session()?;
    match first_where::<M>(&mut session, equalities(match_), true).await? {
        Some(existing) => {
            let key = key_of(&existing)?;
            let mut set = payload.clone();
            set.remove(M::PRIMARY_KEY);
            if !set.is_empty() {
                update_where::<M>(&mut session, set, vec![Predicate::eq(M::PRIMARY_KEY, key.clone())])
                    .await?;
            }
            find_by_key::<M>(&mut session, key).await?.ok_or_else(not_found::<M>)
        }
        None => insert_record::<M>(&mut session, match_.clone().merged(payload))
            .await?
            .ok_or_else(not_found::<M>),
    }
}

async fn first_or_create_in<M: Model>(
    trx: &mut Transaction,
    match_: &Record,
    payload: &Record,
) -> QuarryResult<(M, bool)> {
    let mut session = trx.session()?;
    if let Some(existing) = first_where::<M>(&mut session, equalities(match_), true).await? {
        return Ok((existing, false));
    }
    let created = insert_record::<M>(&mut session, match_.clone().merged(payload))
        .await?
        .ok_or_else(not_found::<M>)?;
    Ok((created, true))
}

/// Collapse payloads that share a conflict key. The last payload wins; the
/// key keeps its first position.
fn dedupe_by_key(conflict: &[&str], payloads: Vec<Record>) -> QuarryResult<Vec<(Record, Record)>> {
    if conflict.is_empty() {
        return Err(QuarryError::InvalidPayload(
            "upsert_many needs at least one conflict column".to_string(),
        ));
    }
    let mut batch: Vec<(Record, Record)> = Vec::new();
    for payload in payloads {
        let key = payload.project(conflict).ok_or_else(|| {
            QuarryError::InvalidPayload(format!(
                "payload is missing a conflict column ({})",
                conflict.join(", ")
            ))
        })?;
        match batch.iter_mut().find(|(k, _)| *k == key) {
            Some(entry) => entry.1 = payload,
            None => batch.push((key, payload)),
        }
    }
    Ok(batch)
}

async fn upsert_batch<M: Model>(
    trx: &mut Transaction,
    conflict: &[&str],
    batch: Vec<(Record, Record)>,
) -> QuarryResult<Vec<M>> {
    let mut session = trx.session()?;
    let engine = session.engine();
    let registry = Registry::global();
    let conflict: Vec<String> = conflict.iter().map(|c| c.to_string()).collect();

    let mut out = Vec::with_capacity(batch.len());
    for (key, row) in batch {
        let node = UpsertNode {
            table: M::TABLE.to_string(),
            row,
            conflict: conflict.clone(),
        };
        let statement = registry
            .render_one(engine, Node::Upsert(&node))?
            .to_statement(engine.generator());
        session.execute(&statement, "upsert", M::TABLE).await?;

        let predicates = key
            .iter()
            .map(|(column, value)| match value {
                Value::Null => Predicate::and(Condition::Null {
                    column: column.to_string(),
                    negated: false,
                }),
                value => Predicate::eq(column, value.clone()),
            })
            .collect();
        let stored = first_where::<M>(&mut session, predicates, false)
            .await?
            .ok_or_else(not_found::<M>)?;
        out.push(stored);
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record;

    #[test]
    fn test_dedupe_last_payload_wins_first_position_kept() {
        let batch = dedupe_by_key(
            &["email"],
            vec![
                record! { "email" => "a@x.com", "name" => "A" },
                record! { "email" => "b@x.com", "name" => "C" },
                record! { "email" => "a@x.com", "name" => "B" },
            ],
        )
        .unwrap();
        let names: Vec<_> = batch
            .iter()
            .map(|(_, p)| p.get("name").cloned().unwrap_or(Value::Null))
            .collect();
        assert_eq!(names, vec![Value::from("B"), Value::from("C")]);
        assert_eq!(batch[0].0, record! { "email" => "a@x.com" });
    }

    #[test]
    fn test_dedupe_requires_conflict_columns() {
        assert!(dedupe_by_key(&[], vec![record! { "a" => 1 }]).is_err());
        assert!(dedupe_by_key(&["email"], vec![record! { "name" => "A" }]).is_err());
    }

    #[test]
    fn test_first_or_create_accessors() {
        let tracked = FirstOrCreate::Tracked {
            model: 1,
            created: true,
        };
        assert_eq!(tracked.created(), Some(true));
        assert_eq!(FirstOrCreate::Model(2).created(), None);
        assert_eq!(tracked.into_model(), 1);
    }
}
