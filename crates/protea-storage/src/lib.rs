//! Protea storage crate - SQLite persistence for the protein table.
//!
//! Provides a WAL-mode SQLite database with a bootstrap migration and the
//! protein repository used by the CRUD routes and the query agent.

pub mod db;
pub mod migrations;
pub mod repository;

pub use db::Database;
pub use repository::{ProteinRepository, QueryRows};
