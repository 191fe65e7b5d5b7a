//! SQLite persistence (infrastructure).

pub mod database;
pub mod repository;
pub mod store;

pub use database::Database;
pub use repository::{CandidateRepository, MappingRepository};
pub use store::SqliteMappingStore;
