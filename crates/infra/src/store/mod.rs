//! Store adapters for users, roles and permissions.

pub mod in_memory;
pub mod postgres;

pub use in_memory::InMemoryRbacStore;
pub use postgres::{PostgresRbacStore, SCHEMA};
