//! Built-in schema migrations.
//!
//! Applied once each and tracked in `teamdesk_migrations`.

use super::runner::Migration;

/// The document table schema, embedded from the migrations directory.
const DOCUMENTS_SQL: &str = include_str!("../../migrations/0000_teamdesk_documents.sql");

/// Get all built-in migrations in application order.
pub fn get_builtin_migrations() -> Vec<Migration> {
    vec![Migration::new("0000_teamdesk_documents", DOCUMENTS_SQL)]
}
