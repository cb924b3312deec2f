mod common;

use std::sync::{Arc, Mutex};

use common::sqlite_source;
use pretty_assertions::assert_eq;
use quarry::prelude::*;
use quarry::sql::Statement;

async fn tables(source: &DataSource) -> Vec<String> {
    source
        .fetch_all(&Statement::raw(
            "SELECT name FROM sqlite_master WHERE type = 'table' AND name NOT LIKE 'sqlite_%' ORDER BY name",
        ))
        .await
        .unwrap()
        .iter()
        .filter_map(|row| match row.get("name") {
            Some(Value::Text(name)) => Some(name.clone()),
            _ => None,
        })
        .collect()
}

/// Creates `table` on up, drops it on down, and records each down call.
struct CreateTable {
    name: &'static str,
    table: &'static str,
    fail_up: bool,
    downs: Arc<Mutex<Vec<String>>>,
}

impl CreateTable {
    fn new(name: &'static str, table: &'static str, downs: &Arc<Mutex<Vec<String>>>) -> Self {
        Self {
            name,
            table,
            fail_up: false,
            downs: downs.clone(),
        }
    }

    fn failing(mut self) -> Self {
        self.fail_up = true;
        self
    }
}

#[async_trait]
impl Migration for CreateTable {
    fn name(&self) -> &str {
        self.name
    }

    fn up(&self) -> QuarryResult<Table> {
        if self.fail_up {
            return Err(QuarryError::InvalidPayload(format!("{} is broken", self.name)));
        }
        let mut table = Table::create(self.table);
        table.column("id").int().auto_increment().primary().commit();
        table.column("label").string(50).not_null().commit();
        Ok(table)
    }

    fn down(&self) -> QuarryResult<Table> {
        self.downs
            .lock()
            .unwrap()
            .push(self.name.to_string());
        Ok(Table::dropping(self.table).drop())
    }
}

#[tokio::test]
async fn test_failed_migration_stops_the_run() {
    let source = sqlite_source().await;
    let downs = Arc::new(Mutex::new(Vec::new()));
    let migrations: Vec<Box<dyn Migration>> = vec![
        Box::new(CreateTable::new("001_create_roles", "roles", &downs)),
        Box::new(CreateTable::new("002_create_teams", "teams", &downs).failing()),
        Box::new(CreateTable::new("003_create_tags", "tags", &downs)),
    ];
    let controller = MigrationController::new(source.clone(), migrations);

    let err = controller.run().await.unwrap_err();
    match err {
        QuarryError::MigrationFailed {
            migration,
            direction,
            source,
        } => {
            assert_eq!(migration, "002_create_teams");
            assert_eq!(direction, quarry::migrate::Direction::Up);
            assert!(matches!(*source, QuarryError::InvalidPayload(_)));
        }
        other => panic!("unexpected error {other:?}"),
    }
    assert_eq!(tables(&source).await, vec!["roles"]);
}

#[tokio::test]
async fn test_rollback_runs_in_reverse() {
    let source = sqlite_source().await;
    let downs = Arc::new(Mutex::new(Vec::new()));
    let migrations: Vec<Box<dyn Migration>> = vec![
        Box::new(CreateTable::new("001_create_roles", "roles", &downs)),
        Box::new(CreateTable::new("002_create_teams", "teams", &downs)),
        Box::new(CreateTable::new("003_create_tags", "tags", &downs)),
    ];
    let controller = MigrationController::new(source.clone(), migrations);
    assert_eq!(
        controller.names().collect::<Vec<_>>(),
        vec!["001_create_roles", "002_create_teams", "003_create_tags"]
    );

    assert_eq!(controller.run().await.unwrap(), 3);
    assert_eq!(tables(&source).await, vec!["roles", "tags", "teams"]);

    assert_eq!(controller.rollback().await.unwrap(), 3);
    assert_eq!(
        *downs.lock().unwrap(),
        vec!["003_create_tags", "002_create_teams", "001_create_roles"]
    );
    assert!(tables(&source).await.is_empty());
}

#[derive(Debug, Default, Clone, PartialEq)]
struct Role {
    id: Option<i64>,
    label: String,
}

impl Model for Role {
    const TABLE: &'static str = "roles";
    const FIELDS: &'static [Field<Self>] = &[field!(Role, id), field!(Role, label)];
}

struct SeedRoles;

#[async_trait]
impl Migration for SeedRoles {
    fn name(&self) -> &str {
        "001_seed_roles"
    }

    fn up(&self) -> QuarryResult<Table> {
        let mut table = Table::create("roles");
        table.column("id").int().auto_increment().primary().commit();
        table.column("label").string(50).not_null().unique().commit();
        Ok(table)
    }

    fn down(&self) -> QuarryResult<Table> {
        Ok(Table::dropping("roles").drop())
    }

    async fn after_migration(&self, source: &DataSource) -> QuarryResult<()> {
        let roles = ModelManager::<Role>::new(source.clone());
        for label in ["admin", "member"] {
            roles
                .save(
                    &Role {
                        id: None,
                        label: label.to_string(),
                    },
                    None,
                )
                .await?;
        }
        Ok(())
    }
}

struct AddRoleRank;

#[async_trait]
impl Migration for AddRoleRank {
    fn name(&self) -> &str {
        "002_add_role_rank"
    }

    fn up(&self) -> QuarryResult<Table> {
        let mut table = Table::alter("roles");
        table.column("rank").int().default_value(0).commit();
        Ok(table)
    }

    fn down(&self) -> QuarryResult<Table> {
        let mut table = Table::dropping("roles");
        table.drop_column("rank");
        Ok(table)
    }
}

#[tokio::test]
async fn test_after_migration_seeds_and_alter_adds_column() {
    let source = sqlite_source().await;
    let migrations: Vec<Box<dyn Migration>> = vec![Box::new(SeedRoles), Box::new(AddRoleRank)];
    let controller = MigrationController::new(source.clone(), migrations);
    controller.run().await.unwrap();

    let roles = ModelManager::<Role>::new(source.clone())
        .find(Some(FindInput::new().order_by(["id"], Direction::Asc)))
        .await
        .unwrap();
    let labels: Vec<_> = roles.iter().map(|r| r.label.as_str()).collect();
    assert_eq!(labels, vec!["admin", "member"]);

    let rows = source
        .fetch_all(&Statement::raw("SELECT rank FROM roles WHERE label = 'admin'"))
        .await
        .unwrap();
    assert_eq!(rows[0].get("rank"), Some(&Value::Int(0)));
}
