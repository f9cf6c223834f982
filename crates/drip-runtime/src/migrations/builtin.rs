//! Built-in drip schema migrations, tracked in `drip_migrations`.

use super::runner::Migration;

const ENGINE_SQL: &str = include_str!("../../migrations/0001_drip_engine.sql");

/// All built-in migrations, in application order.
pub fn get_builtin_migrations() -> Vec<Migration> {
    vec![Migration::new("0001_drip_engine", ENGINE_SQL)]
}
