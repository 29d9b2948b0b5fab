//! Canonical migration definitions.

/// A named migration: `(name, sql)`.
pub type Migration = (&'static str, &'static str);

/// Applied in order by the server on startup; each name runs once.
pub const MIGRATIONS: &[Migration] = &[(
    "0001_schema",
    include_str!("../../migrations/0001_schema.sql"),
)];
