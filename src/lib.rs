//! # quarry: cross-dialect SQL models and migrations
//!
//! One description of a query or a table, rendered into correct SQL for
//! MySQL, PostgreSQL, SQLite and CockroachDB.
//!
//! ## Quick Example
//!
//! ```rust,ignore
//! use quarry::prelude::*;
//!
//! let source = DataSource::connect(&DataSourceConfig::discover()?).await?;
//! let users = ModelManager::<User>::new(source);
//!
//! let adults = users
//!     .find(Some(FindInput::new().where_("age >=", 18).limit(10)))
//!     .await?;
//!
//! let sql = users.query_builder().where_("age", 18).and_where("status", "active").to_statement()?;
//! // MySQL: SELECT * FROM users \nWHERE age = ?  AND status = ?
//! ```
//!
//! ## Layers
//!
//! | Module      | Role                                               |
//! |-------------|----------------------------------------------------|
//! | `sql`       | Clause templates, fragments, predicate AST         |
//! | `dialect`   | Per-engine generators and the interpreter registry |
//! | `query`     | Fluent SELECT builder                              |
//! | `migrate`   | Table builder, DDL parser, migration controller    |
//! | `manager`   | CRUD, upsert, first-or-create                      |
//! | `engine`    | sqlx pool and statement execution                  |

pub mod cli;
pub mod config;
pub mod dialect;
pub mod engine;
pub mod error;
pub mod manager;
pub mod migrate;
pub mod model;
pub mod query;
pub mod sql;
pub mod transaction;
pub mod value;

pub use async_trait::async_trait;

pub mod prelude {
    pub use crate::async_trait;
    pub use crate::config::DataSourceConfig;
    pub use crate::dialect::Engine;
    pub use crate::engine::DataSource;
    pub use crate::error::*;
    pub use crate::manager::{FindInput, FirstOrCreate, FirstOrCreateOptions, ModelManager};
    pub use crate::migrate::{Migration, MigrationController, Table};
    pub use crate::model::{Field, Model, Relation};
    pub use crate::query::QueryBuilder;
    pub use crate::sql::{Direction, Operator};
    pub use crate::transaction::{Transaction, TransactionState};
    pub use crate::value::{Record, Value};
    pub use crate::{field, record};
}
