#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};

use quarry::migrate::MigrationParser;
use quarry::prelude::*;

static NEXT_DB: AtomicUsize = AtomicUsize::new(0);

/// A fresh SQLite database file under the system temp directory.
pub async fn sqlite_source() -> DataSource {
    let path = std::env::temp_dir().join(format!(
        "quarry-test-{}-{}.db",
        std::process::id(),
        NEXT_DB.fetch_add(1, Ordering::SeqCst)
    ));
    let _ = std::fs::remove_file(&path);
    let config = DataSourceConfig::new(Engine::Sqlite, path.display().to_string());
    DataSource::connect(&config).await.expect("connect to sqlite")
}

pub async fn apply(source: &DataSource, table: &Table) {
    let statements = MigrationParser::new(source.engine())
        .render(table)
        .expect("render ddl");
    for statement in &statements {
        source.execute(statement).await.expect("apply ddl");
    }
}

pub fn users_table() -> Table {
    let mut users = Table::create("users");
    users.column("id").int().auto_increment().primary().commit();
    users.column("email").string(255).not_null().unique().commit();
    users.column("name").string(100).commit();
    users.column("age").int().default_value(18).commit();
    users.column("status").string(20).default_value("active").commit();
    users
}

pub fn posts_table() -> Table {
    let mut posts = Table::create("posts");
    posts.column("id").int().auto_increment().primary().commit();
    posts
        .column("user_id")
        .int()
        .not_null()
        .references("users", "id")
        .commit();
    posts.column("title").string(200).not_null().commit();
    posts
}

pub async fn schema() -> DataSource {
    let source = sqlite_source().await;
    apply(&source, &users_table()).await;
    apply(&source, &posts_table()).await;
    source
}

pub async fn count(source: &DataSource, table: &str) -> i64 {
    let rows = source
        .fetch_all(&quarry::sql::Statement::raw(format!(
            "SELECT COUNT(*) AS n FROM {}",
            table
        )))
        .await
        .expect("count rows");
    match rows[0].get("n") {
        Some(Value::Int(n)) => *n,
        other => panic!("unexpected count {:?}", other),
    }
}

#[derive(Debug, Default, Clone, PartialEq)]
pub struct User {
    pub id: Option<i64>,
    pub email: String,
    pub name: Option<String>,
    pub age: Option<i64>,
    pub status: Option<String>,
}

impl Model for User {
    const TABLE: &'static str = "users";
    const FIELDS: &'static [Field<Self>] = &[
        field!(User, id),
        field!(User, email),
        field!(User, name),
        field!(User, age),
        field!(User, status),
    ];

    fn relations() -> Vec<Relation> {
        vec![Relation::has_many("posts", || Post::TABLE, "user_id")]
    }
}

impl User {
    pub fn new(email: &str, name: &str) -> Self {
        Self {
            email: email.to_string(),
            name: Some(name.to_string()),
            ..Default::default()
        }
    }
}

#[derive(Debug, Default, Clone, PartialEq)]
pub struct Post {
    pub id: Option<i64>,
    pub user_id: i64,
    pub title: String,
}

impl Model for Post {
    const TABLE: &'static str = "posts";
    const FIELDS: &'static [Field<Self>] = &[
        field!(Post, id),
        field!(Post, user_id),
        field!(Post, title),
    ];

    fn relations() -> Vec<Relation> {
        vec![Relation::belongs_to("author", || User::TABLE, "user_id")]
    }
}
