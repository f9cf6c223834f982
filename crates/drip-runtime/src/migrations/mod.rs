mod builtin;
mod runner;

pub use builtin::get_builtin_migrations;
pub use runner::{Migration, MigrationRunner};
