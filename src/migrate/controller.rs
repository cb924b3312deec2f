use tracing::{debug, info};

use crate::engine::DataSource;
use crate::error::{QuarryError, QuarryResult};
use crate::migrate::Direction;
use crate::migrate::migration::Migration;
use crate::migrate::parser::MigrationParser;

/// Applies migrations one at a time against a data source.
///
/// The first failure stops the run. Migrations already applied stay
/// applied.
pub struct MigrationController {
    source: DataSource,
    migrations: Vec<Box<dyn Migration>>,
}

impl MigrationController {
    pub fn new(source: DataSource, migrations: Vec<Box<dyn Migration>>) -> Self {
        Self { source, migrations }
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.migrations.iter().map(|m| m.name())
    }

    pub fn len(&self) -> usize {
        self.migrations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.migrations.is_empty()
    }

    /// Apply every `up()` in list order. Returns the number applied.
    pub async fn run(&self) -> QuarryResult<usize> {
        for migration in &self.migrations {
            self.apply(migration.as_ref(), Direction::Up).await?;
        }
        Ok(self.migrations.len())
    }

    /// Apply every `down()`, last migration first.
    pub async fn rollback(&self) -> QuarryResult<usize> {
        for migration in self.migrations.iter().rev() {
            self.apply(migration.as_ref(), Direction::Down).await?;
        }
        Ok(self.migrations.len())
    }

    async fn apply(&self, migration: &dyn Migration, direction: Direction) -> QuarryResult<()> {
        let name = migration.name().to_string();
        info!(migration = %name, %direction, "applying migration");

        self.step(migration, direction)
            .await
            .map_err(|e| QuarryError::MigrationFailed {
                migration: name.clone(),
                direction,
                source: Box::new(e),
            })?;

        info!(migration = %name, %direction, "migration applied");
        Ok(())
    }

    async fn step(&self, migration: &dyn Migration, direction: Direction) -> QuarryResult<()> {
        let table = match direction {
            Direction::Up => migration.up()?,
            Direction::Down => migration.down()?,
        };
        let statements = MigrationParser::new(self.source.engine()).render(&table)?;
        debug!(table = %table.table_name, statements = statements.len(), "rendered migration");

        {
            let mut conn = self.source.acquire().await?;
            let mut session = self.source.session(&mut conn);
            for statement in &statements {
                session.execute(statement, "migrate", &table.table_name).await?;
            }
        }

        if direction == Direction::Up {
            migration.after_migration(&self.source).await?;
        }
        Ok(())
    }
}
