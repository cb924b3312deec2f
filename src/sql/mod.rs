//! Dialect-neutral SQL building blocks.

pub mod ast;
pub mod clauses;
pub mod fragment;

pub use ast::{Condition, Conjunction, Direction, Join, JoinKind, Operator, OrderBy, Predicate};
pub use fragment::{Fragment, ParamContext, Statement};
