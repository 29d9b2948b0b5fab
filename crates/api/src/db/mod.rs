//! Shared database schema, migrations, and query builders.
//!
//! Every builder returns a [`Built`] pair of SQL text and bind values for
//! SQLite. SELECT builders document their column order; the server's row
//! mappers read columns in exactly that order.

pub mod campaigns;
pub mod companies;
pub mod courses;
pub mod dashboard;
pub mod groups;
pub mod learning;
pub mod migrations;
pub mod tables;
pub mod users;

// Re-export tables for convenience
pub use tables::*;

/// SQL text plus its positional bind values.
pub type Built = (String, sea_query::Values);

/// `datetime('now')` in SQLite's UTC text format.
pub(crate) fn now_expr() -> sea_query::SimpleExpr {
    sea_query::Expr::cust("datetime('now')")
}

/// Nullable text bind value.
pub(crate) fn opt_str(value: Option<&str>) -> sea_query::SimpleExpr {
    sea_query::Value::from(value.map(str::to_string)).into()
}
