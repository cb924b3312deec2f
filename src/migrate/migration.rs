use async_trait::async_trait;

use crate::engine::DataSource;
use crate::error::QuarryResult;
use crate::migrate::schema::Table;

/// A reversible schema change.
///
/// ```ignore
/// struct CreateUsers;
///
/// #[async_trait]
/// impl Migration for CreateUsers {
///     fn name(&self) -> &str {
///         "20260101120000_create_users"
///     }
///
///     fn up(&self) -> QuarryResult<Table> {
///         let mut users = Table::create("users");
///         users.column("id").int().auto_increment().primary().commit();
///         users.column("name").string(100).not_null().commit();
///         Ok(users)
///     }
///
///     fn down(&self) -> QuarryResult<Table> {
///         Ok(Table::dropping("users").drop())
///     }
/// }
/// ```
#[async_trait]
pub trait Migration: Send + Sync {
    fn name(&self) -> &str;

    fn up(&self) -> QuarryResult<Table>;

    fn down(&self) -> QuarryResult<Table>;

    /// Runs after `up()` has been applied. Seed data goes here.
    async fn after_migration(&self, _source: &DataSource) -> QuarryResult<()> {
        Ok(())
    }
}
