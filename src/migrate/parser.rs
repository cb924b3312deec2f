//! Renders a [`Table`] description into DDL statements.

use crate::dialect::{Engine, Node, Registry};
use crate::error::QuarryResult;
use crate::migrate::schema::{MigrationType, Table};
use crate::sql::fragment::{Fragment, Statement};

pub struct MigrationParser<'r> {
    engine: Engine,
    registry: &'r Registry,
}

impl MigrationParser<'static> {
    pub fn new(engine: Engine) -> Self {
        Self {
            engine,
            registry: Registry::global(),
        }
    }
}

impl<'r> MigrationParser<'r> {
    pub fn with_registry(engine: Engine, registry: &'r Registry) -> Self {
        Self { engine, registry }
    }

    /// Statements for one migration step, in execution order.
    ///
    /// - create: CREATE TABLE
    /// - alter: column changes, then dropped columns, then TRUNCATE if flagged
    /// - drop: DROP TABLE, else TRUNCATE, else dropped columns
    /// - raw query: the query as written
    pub fn render(&self, table: &Table) -> QuarryResult<Vec<Statement>> {
        let fragments = match table.migration_type {
            MigrationType::Create => self.registry.render(self.engine, Node::CreateTable(table))?,
            MigrationType::Alter => {
                let mut out = self.registry.render(self.engine, Node::AlterTable(table))?;
                out.extend(self.registry.render(self.engine, Node::DropColumns(table))?);
                if table.truncate_table {
                    out.extend(self.truncate(table)?);
                }
                out
            }
            MigrationType::Drop => {
                if table.drop_table {
                    self.registry.render(self.engine, Node::DropTable(&table.table_name))?
                } else if table.truncate_table {
                    self.truncate(table)?
                } else {
                    self.registry.render(self.engine, Node::DropColumns(table))?
                }
            }
            MigrationType::RawQuery => {
                return Ok(table
                    .raw_query
                    .iter()
                    .filter(|sql| !sql.trim().is_empty())
                    .map(|sql| Statement::raw(sql.clone()))
                    .collect());
            }
        };

        let generator = self.engine.generator();
        Ok(fragments.iter().map(|f| f.to_statement(generator)).collect())
    }

    fn truncate(&self, table: &Table) -> QuarryResult<Vec<Fragment>> {
        self.registry.render(
            self.engine,
            Node::Truncate {
                table: &table.table_name,
                force: false,
            },
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn sql(engine: Engine, table: &Table) -> Vec<String> {
        MigrationParser::new(engine)
            .render(table)
            .unwrap()
            .into_iter()
            .map(|s| s.sql)
            .collect()
    }

    #[test]
    fn test_create_users_table() {
        let mut users = Table::create("users");
        users.column("id").int().auto_increment().primary().commit();
        users.column("name").string(100).not_null().commit();
        assert_eq!(
            sql(Engine::MySql, &users),
            vec!["CREATE TABLE IF NOT EXISTS users (\nid INT AUTO_INCREMENT PRIMARY KEY,\nname VARCHAR(100) NOT NULL\n);"]
        );
    }

    #[test]
    fn test_declaration_order_is_preserved() {
        let mut t = Table::create("t");
        for name in ["c", "a", "b"] {
            t.column(name).int().commit();
        }
        assert_eq!(
            sql(Engine::Postgres, &t),
            vec!["CREATE TABLE IF NOT EXISTS t (\nc INT,\na INT,\nb INT\n);"]
        );
    }

    #[test]
    fn test_rendering_is_deterministic() {
        let mut t = Table::alter("users");
        t.column("age").int().default_value(18).commit();
        t.drop_column("legacy");
        let first = sql(Engine::MySql, &t);
        for _ in 0..5 {
            assert_eq!(sql(Engine::MySql, &t), first);
        }
    }

    #[test]
    fn test_alter_appends_drops() {
        let mut t = Table::alter("users");
        t.column("age").int().commit();
        t.drop_column("legacy");
        assert_eq!(
            sql(Engine::MySql, &t),
            vec![
                "ALTER TABLE users ADD COLUMN age INT;",
                "ALTER TABLE users DROP COLUMN legacy;",
            ]
        );
    }

    #[test]
    fn test_drop_variants() {
        assert_eq!(
            sql(Engine::Postgres, &Table::dropping("users").drop()),
            vec!["DROP TABLE users;"]
        );
        assert_eq!(
            sql(Engine::MySql, &Table::dropping("users").truncate()),
            vec!["TRUNCATE TABLE users;"]
        );
        let mut cols = Table::dropping("users");
        cols.drop_column("nickname");
        assert_eq!(sql(Engine::Sqlite, &cols), vec!["ALTER TABLE users DROP COLUMN nickname;"]);
    }

    #[test]
    fn test_raw_query_passthrough() {
        let t = Table::raw("users", "CREATE INDEX users_email ON users (email)");
        assert_eq!(
            sql(Engine::Cockroach, &t),
            vec!["CREATE INDEX users_email ON users (email)"]
        );
    }
}
