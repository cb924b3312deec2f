//! Typed models: a static field table per struct, plus relations.
//!
//! ```ignore
//! #[derive(Debug, Default, Clone)]
//! struct User {
//!     id: Option<i64>,
//!     email: String,
//!     name: String,
//! }
//!
//! impl Model for User {
//!     const TABLE: &'static str = "users";
//!     const FIELDS: &'static [Field<Self>] = &[
//!         field!(User, id),
//!         field!(User, email),
//!         field!(User, name),
//!     ];
//! }
//! ```

use crate::error::QuarryResult;
use crate::sql::ast::{Join, JoinKind};
use crate::value::{Record, Value};

/// One mapped column: how to read it from and write it into the model.
pub struct Field<M> {
    pub column: &'static str,
    pub get: fn(&M) -> Value,
    pub set: fn(&mut M, Value) -> QuarryResult<()>,
}

/// Declare a [`Field`] for a struct member. The column name defaults to the
/// member name.
#[macro_export]
macro_rules! field {
    ($model:ty, $member:ident) => {
        $crate::field!($model, $member, stringify!($member))
    };
    ($model:ty, $member:ident, $column:expr) => {
        $crate::model::Field::<$model> {
            column: $column,
            get: |m: &$model| $crate::value::Value::from(m.$member.clone()),
            set: |m: &mut $model, v: $crate::value::Value| {
                m.$member = $crate::value::FromValue::from_value(v, $column)?;
                Ok(())
            },
        }
    };
}

pub trait Model: Default + Send + Sync + Sized + 'static {
    const TABLE: &'static str;
    const PRIMARY_KEY: &'static str = "id";
    const FIELDS: &'static [Field<Self>];

    fn relations() -> Vec<Relation> {
        Vec::new()
    }

    /// Copy declared fields out of a row. Columns with no field are ignored;
    /// fields with no column keep their default.
    fn hydrate(record: &Record) -> QuarryResult<Self> {
        let mut model = Self::default();
        for field in Self::FIELDS {
            if let Some(value) = record.get(field.column) {
                (field.set)(&mut model, value.clone())?;
            }
        }
        Ok(model)
    }

    /// Every declared field, in declaration order.
    fn to_record(&self) -> Record {
        Self::FIELDS
            .iter()
            .map(|field| (field.column, (field.get)(self)))
            .collect()
    }

    /// Value of the primary-key field, `Null` when unset or undeclared.
    fn primary_key(&self) -> Value {
        Self::FIELDS
            .iter()
            .find(|field| field.column == Self::PRIMARY_KEY)
            .map(|field| (field.get)(self))
            .unwrap_or(Value::Null)
    }

    fn relation(name: &str) -> Option<Relation> {
        Self::relations().into_iter().find(|r| r.name == name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelationKind {
    HasOne,
    BelongsTo,
    HasMany,
}

/// Link to another model's table.
///
/// The related table is resolved through a function pointer when the join
/// is built, so two models may refer to each other.
#[derive(Debug, Clone, Copy)]
pub struct Relation {
    pub name: &'static str,
    pub kind: RelationKind,
    pub related: fn() -> &'static str,
    /// Column holding the link. On `BelongsTo` it lives on the root table,
    /// on `HasOne`/`HasMany` on the related one.
    pub foreign_key: Option<&'static str>,
    /// Key the foreign key points at: the related table's for `BelongsTo`,
    /// the root table's otherwise.
    pub references: &'static str,
}

impl Relation {
    /// Foreign key defaults to `<singular root table>_id` on the related
    /// table.
    pub fn has_one(name: &'static str, related: fn() -> &'static str) -> Self {
        Self {
            name,
            kind: RelationKind::HasOne,
            related,
            foreign_key: None,
            references: "id",
        }
    }

    pub fn belongs_to(
        name: &'static str,
        related: fn() -> &'static str,
        foreign_key: &'static str,
    ) -> Self {
        Self {
            name,
            kind: RelationKind::BelongsTo,
            related,
            foreign_key: Some(foreign_key),
            references: "id",
        }
    }

    pub fn has_many(
        name: &'static str,
        related: fn() -> &'static str,
        foreign_key: &'static str,
    ) -> Self {
        Self {
            name,
            kind: RelationKind::HasMany,
            related,
            foreign_key: Some(foreign_key),
            references: "id",
        }
    }

    pub fn foreign_key(mut self, column: &'static str) -> Self {
        self.foreign_key = Some(column);
        self
    }

    pub fn references(mut self, column: &'static str) -> Self {
        self.references = column;
        self
    }

    pub fn related_table(&self) -> &'static str {
        (self.related)()
    }

    /// `LEFT JOIN` from `root` to the related table.
    pub fn join(&self, root: &str) -> Join {
        let related = self.related_table().to_string();
        let (left, right) = match self.kind {
            RelationKind::HasOne => {
                let fk = self
                    .foreign_key
                    .map(str::to_string)
                    .unwrap_or_else(|| format!("{}_id", singular(root)));
                (
                    (related.clone(), fk),
                    (root.to_string(), self.references.to_string()),
                )
            }
            RelationKind::HasMany => (
                (related.clone(), self.foreign_key.unwrap_or("id").to_string()),
                (root.to_string(), self.references.to_string()),
            ),
            RelationKind::BelongsTo => (
                (related.clone(), self.references.to_string()),
                (root.to_string(), self.foreign_key.unwrap_or("id").to_string()),
            ),
        };
        Join {
            kind: JoinKind::Left,
            table: related,
            left,
            right,
        }
    }
}

/// Naive singular: strip one trailing `s`.
fn singular(table: &str) -> &str {
    table.strip_suffix('s').unwrap_or(table)
}
