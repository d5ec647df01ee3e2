//! SQLite audit store for completed scans.

mod open;
mod models;
mod insert;
mod query;
mod schema;

pub use open::Db;
pub use models::*;
