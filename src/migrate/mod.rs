//! Hand-authored schema migrations.
//!
//! A [`Migration`] describes its change as a [`Table`]; the
//! [`MigrationParser`] renders that table into DDL for the connected engine
//! and the [`MigrationController`] applies a list of migrations in order
//! (or reverts them in reverse).

pub mod controller;
pub mod migration;
pub mod parser;
pub mod schema;

use std::fmt;

pub use controller::MigrationController;
pub use migration::Migration;
pub use parser::MigrationParser;
pub use schema::{
    Column, ColumnBuilder, ColumnConfig, ColumnType, ColumnTypeBuilder, DefaultValue, DropColumn,
    MigrationType, References, Table,
};

/// Which half of a migration is being applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Up,
    Down,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Up => write!(f, "up"),
            Direction::Down => write!(f, "down"),
        }
    }
}
