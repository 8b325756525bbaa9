//! SQL-subset interpreter.
//!
//! Statements are parsed into a [`Statement`] with every positional parameter
//! already bound, then run against the collection store. Only a narrow slice
//! of SQL is understood:
//!
//! ```text
//! SELECT ... FROM table [WHERE cond AND ...] [ORDER BY ...] [LIMIT n] [OFFSET n]
//! INSERT INTO table [(col, ...)] VALUES (value, ...)
//! UPDATE table SET col = value, ... WHERE id = ?
//! DELETE FROM table WHERE id = ?
//! ```
//!
//! Recognised WHERE conditions are `is_active = 1`, `id = ?`, `slug = ?`, and a
//! single generic `field = ?`. Recognised orderings are `created_at DESC` and
//! `sort_order`. Anything else in those clauses is ignored.

mod exec;
mod parser;

pub use exec::{ExecResult, ResultMeta};
pub use parser::parse;

use crate::registry::Table;
use serde_json::Value;

/// Fields filled, in order, by the parameters of an INSERT without a column list.
pub const LEGACY_INSERT_FIELDS: [&str; 4] = ["title", "slug", "content", "is_active"];

/// A parsed statement with its parameters bound.
#[derive(Debug, Clone, PartialEq)]
pub enum Statement {
    Select(Select),
    Insert {
        table: Table,
        values: Vec<Assignment>,
    },
    Update {
        table: Table,
        id: Value,
        set: Vec<Assignment>,
    },
    Delete {
        table: Table,
        id: Value,
    },
}

impl Statement {
    pub fn table(&self) -> Table {
        match self {
            Statement::Select(select) => select.table,
            Statement::Insert { table, .. }
            | Statement::Update { table, .. }
            | Statement::Delete { table, .. } => *table,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Select {
    pub table: Table,
    /// Applied in order; every filter must pass.
    pub filters: Vec<Filter>,
    pub order: Option<OrderBy>,
    pub limit: Option<usize>,
    pub offset: Option<usize>,
}

impl Select {
    /// `SELECT * FROM table` with no clauses.
    pub fn all(table: Table) -> Self {
        Select {
            table,
            filters: Vec::new(),
            order: None,
            limit: None,
            offset: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    /// `is_active = 1` / `is_active = TRUE`: keep records with a truthy `is_active`.
    IsActive,
    /// `id = ?`
    Id(Value),
    /// `slug = ?`
    Slug(Value),
    /// `<field> = ?`
    FieldEquals(String, Value),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderBy {
    /// `ORDER BY created_at DESC`, newest first by parsed timestamp.
    CreatedAtDesc,
    /// `ORDER BY sort_order`, ascending; missing values count as 0.
    SortOrderAsc,
}

/// A `field = value` pair from a SET list or an INSERT column list.
#[derive(Debug, Clone, PartialEq)]
pub struct Assignment {
    pub field: String,
    pub value: SetValue,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SetValue {
    Value(Value),
    /// `NOW()`, resolved to the current timestamp when the statement runs.
    Now,
}
