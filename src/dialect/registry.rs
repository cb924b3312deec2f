//! Interpreter registry: `(engine, scope, node kind) → renderer`.
//!
//! Every engine module exposes a static table of interpreters. The
//! process-wide registry is assembled from those tables on first use, and
//! [`Registry::validate`] checks that no engine is missing a node another
//! engine renders. Lookups never fall back to a different engine.

use std::collections::{BTreeSet, HashMap};
use std::fmt;

use once_cell::sync::Lazy;

use super::{Engine, SqlGenerator, cockroach, mysql, postgres, sqlite};
use crate::error::{QuarryError, QuarryResult};
use crate::migrate::Table;
use crate::sql::ast::{
    DeleteNode, InsertNode, Join, OrderBy, Predicate, SelectNode, UpdateNode, UpsertNode,
};
use crate::sql::fragment::Fragment;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Scope {
    Query,
    Mutation,
    Schema,
    Transaction,
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Scope::Query => "query",
            Scope::Mutation => "mutation",
            Scope::Schema => "schema",
            Scope::Transaction => "transaction",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum NodeKind {
    Select,
    Join,
    Where,
    GroupBy,
    OrderBy,
    Pagination,
    Lock,
    Insert,
    Update,
    Delete,
    Upsert,
    Returning,
    CreateTable,
    AlterTable,
    DropColumns,
    DropTable,
    Truncate,
    ForeignKeyChecks,
    Savepoint,
    RollbackToSavepoint,
    ReleaseSavepoint,
}

impl NodeKind {
    pub fn scope(&self) -> Scope {
        match self {
            NodeKind::Select
            | NodeKind::Join
            | NodeKind::Where
            | NodeKind::GroupBy
            | NodeKind::OrderBy
            | NodeKind::Pagination
            | NodeKind::Lock => Scope::Query,
            NodeKind::Insert
            | NodeKind::Update
            | NodeKind::Delete
            | NodeKind::Upsert
            | NodeKind::Returning => Scope::Mutation,
            NodeKind::CreateTable
            | NodeKind::AlterTable
            | NodeKind::DropColumns
            | NodeKind::DropTable
            | NodeKind::Truncate
            | NodeKind::ForeignKeyChecks => Scope::Schema,
            NodeKind::Savepoint | NodeKind::RollbackToSavepoint | NodeKind::ReleaseSavepoint => {
                Scope::Transaction
            }
        }
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            NodeKind::Select => "select",
            NodeKind::Join => "join",
            NodeKind::Where => "where",
            NodeKind::GroupBy => "group_by",
            NodeKind::OrderBy => "order_by",
            NodeKind::Pagination => "pagination",
            NodeKind::Lock => "lock",
            NodeKind::Insert => "insert",
            NodeKind::Update => "update",
            NodeKind::Delete => "delete",
            NodeKind::Upsert => "upsert",
            NodeKind::Returning => "returning",
            NodeKind::CreateTable => "create_table",
            NodeKind::AlterTable => "alter_table",
            NodeKind::DropColumns => "drop_columns",
            NodeKind::DropTable => "drop_table",
            NodeKind::Truncate => "truncate",
            NodeKind::ForeignKeyChecks => "foreign_key_checks",
            NodeKind::Savepoint => "savepoint",
            NodeKind::RollbackToSavepoint => "rollback_to_savepoint",
            NodeKind::ReleaseSavepoint => "release_savepoint",
        })
    }
}

/// An AST fragment handed to an interpreter.
#[derive(Debug, Clone, Copy)]
pub enum Node<'a> {
    /// `SELECT <columns> FROM <table>` only; the query builder renders the
    /// other clauses through their own nodes.
    Select(&'a SelectNode),
    Join(&'a Join),
    Where(&'a [Predicate]),
    GroupBy(&'a [String]),
    OrderBy(&'a OrderBy),
    Pagination {
        limit: Option<u64>,
        offset: Option<u64>,
    },
    Lock,
    Insert(&'a InsertNode),
    Update(&'a UpdateNode),
    Delete(&'a DeleteNode),
    Upsert(&'a UpsertNode),
    Returning,
    CreateTable(&'a Table),
    AlterTable(&'a Table),
    DropColumns(&'a Table),
    DropTable(&'a str),
    Truncate {
        table: &'a str,
        force: bool,
    },
    /// Session-level switch for foreign-key enforcement. Engines that
    /// cascade inside TRUNCATE render nothing.
    ForeignKeyChecks {
        enabled: bool,
    },
    Savepoint(&'a str),
    RollbackToSavepoint(&'a str),
    ReleaseSavepoint(&'a str),
}

impl Node<'_> {
    pub fn kind(&self) -> NodeKind {
        match self {
            Node::Select(_) => NodeKind::Select,
            Node::Join(_) => NodeKind::Join,
            Node::Where(_) => NodeKind::Where,
            Node::GroupBy(_) => NodeKind::GroupBy,
            Node::OrderBy(_) => NodeKind::OrderBy,
            Node::Pagination { .. } => NodeKind::Pagination,
            Node::Lock => NodeKind::Lock,
            Node::Insert(_) => NodeKind::Insert,
            Node::Update(_) => NodeKind::Update,
            Node::Delete(_) => NodeKind::Delete,
            Node::Upsert(_) => NodeKind::Upsert,
            Node::Returning => NodeKind::Returning,
            Node::CreateTable(_) => NodeKind::CreateTable,
            Node::AlterTable(_) => NodeKind::AlterTable,
            Node::DropColumns(_) => NodeKind::DropColumns,
            Node::DropTable(_) => NodeKind::DropTable,
            Node::Truncate { .. } => NodeKind::Truncate,
            Node::ForeignKeyChecks { .. } => NodeKind::ForeignKeyChecks,
            Node::Savepoint(_) => NodeKind::Savepoint,
            Node::RollbackToSavepoint(_) => NodeKind::RollbackToSavepoint,
            Node::ReleaseSavepoint(_) => NodeKind::ReleaseSavepoint,
        }
    }
}

/// Renders one node. Query and mutation nodes produce a single fragment;
/// schema nodes may produce several statements.
pub type Interpreter = fn(&dyn SqlGenerator, Node<'_>) -> QuarryResult<Vec<Fragment>>;

/// One engine's contribution to the registry.
pub type InterpreterTable = &'static [(NodeKind, Interpreter)];

/// Pull the payload out of a node, or fail if the registry routed the wrong
/// variant to this interpreter.
macro_rules! expect_node {
    ($node:expr, $variant:path) => {
        match $node {
            $variant(inner) => inner,
            other => return Err($crate::dialect::registry::misrouted(other)),
        }
    };
}
pub(crate) use expect_node;

pub(crate) fn misrouted(node: Node<'_>) -> QuarryError {
    QuarryError::InvalidPayload(format!("interpreter received a {} node", node.kind()))
}

static GLOBAL: Lazy<Registry> = Lazy::new(Registry::builtin);

pub struct Registry {
    entries: HashMap<(Engine, Scope, NodeKind), Interpreter>,
}

impl Registry {
    /// The process-wide registry with every built-in engine.
    pub fn global() -> &'static Registry {
        &GLOBAL
    }

    pub fn empty() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }

    pub fn builtin() -> Self {
        let mut registry = Self::empty();
        registry.register_table(Engine::MySql, mysql::INTERPRETERS);
        registry.register_table(Engine::Postgres, postgres::INTERPRETERS);
        registry.register_table(Engine::Sqlite, sqlite::INTERPRETERS);
        registry.register_table(Engine::Cockroach, cockroach::INTERPRETERS);
        registry
    }

    pub fn register(&mut self, engine: Engine, node: NodeKind, interpreter: Interpreter) {
        self.entries.insert((engine, node.scope(), node), interpreter);
    }

    pub fn register_table(&mut self, engine: Engine, table: InterpreterTable) {
        for (node, interpreter) in table {
            self.register(engine, *node, *interpreter);
        }
    }

    pub fn resolve(&self, engine: Engine, scope: Scope, node: NodeKind) -> QuarryResult<Interpreter> {
        self.entries
            .get(&(engine, scope, node))
            .copied()
            .ok_or(QuarryError::MissingInterpreter {
                engine,
                scope,
                node,
            })
    }

    /// Render `node` for `engine` into one or more statements.
    pub fn render(&self, engine: Engine, node: Node<'_>) -> QuarryResult<Vec<Fragment>> {
        let kind = node.kind();
        let interpreter = self.resolve(engine, kind.scope(), kind)?;
        interpreter(engine.generator(), node)
    }

    /// Render `node` and join the output into a single fragment.
    pub fn render_one(&self, engine: Engine, node: Node<'_>) -> QuarryResult<Fragment> {
        let mut out = Fragment::new();
        for fragment in self.render(engine, node)? {
            out.append(fragment);
        }
        Ok(out)
    }

    /// Every engine with any entry must cover every `(scope, node)` that
    /// any engine covers. Reports the first gap found.
    pub fn validate(&self) -> QuarryResult<()> {
        let engines: BTreeSet<Engine> = self.entries.keys().map(|(e, _, _)| *e).collect();
        let nodes: BTreeSet<(Scope, NodeKind)> =
            self.entries.keys().map(|(_, s, n)| (*s, *n)).collect();

        for engine in &engines {
            for (scope, node) in &nodes {
                if !self.entries.contains_key(&(*engine, *scope, *node)) {
                    return Err(QuarryError::MissingInterpreter {
                        engine: *engine,
                        scope: *scope,
                        node: *node,
                    });
                }
            }
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::builtin()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL_KINDS: [NodeKind; 21] = [
        NodeKind::Select,
        NodeKind::Join,
        NodeKind::Where,
        NodeKind::GroupBy,
        NodeKind::OrderBy,
        NodeKind::Pagination,
        NodeKind::Lock,
        NodeKind::Insert,
        NodeKind::Update,
        NodeKind::Delete,
        NodeKind::Upsert,
        NodeKind::Returning,
        NodeKind::CreateTable,
        NodeKind::AlterTable,
        NodeKind::DropColumns,
        NodeKind::DropTable,
        NodeKind::Truncate,
        NodeKind::ForeignKeyChecks,
        NodeKind::Savepoint,
        NodeKind::RollbackToSavepoint,
        NodeKind::ReleaseSavepoint,
    ];

    #[test]
    fn test_builtin_registry_is_complete() {
        let registry = Registry::builtin();
        registry.validate().unwrap();
        assert_eq!(registry.len(), ALL_KINDS.len() * Engine::ALL.len());
        for engine in Engine::ALL {
            for kind in ALL_KINDS {
                assert!(registry.resolve(engine, kind.scope(), kind).is_ok(), "{engine} {kind}");
            }
        }
    }

    #[test]
    fn test_missing_entry_is_reported() {
        let mut registry = Registry::empty();
        registry.register_table(Engine::MySql, mysql::INTERPRETERS);
        registry.register(Engine::Sqlite, NodeKind::Select, mysql::INTERPRETERS[0].1);

        let err = registry.validate().unwrap_err();
        assert!(matches!(
            err,
            QuarryError::MissingInterpreter {
                engine: Engine::Sqlite,
                ..
            }
        ));
    }

    #[test]
    fn test_resolve_does_not_fall_back() {
        let mut registry = Registry::empty();
        registry.register_table(Engine::MySql, mysql::INTERPRETERS);
        let err = registry
            .render(Engine::Postgres, Node::Lock)
            .unwrap_err();
        assert!(matches!(
            err,
            QuarryError::MissingInterpreter {
                engine: Engine::Postgres,
                scope: Scope::Query,
                node: NodeKind::Lock,
            }
        ));
    }
}
