//! Application layer (use-cases, policies).
//!
//! Orchestrates domain logic behind the `MappingStore` contract without
//! depending on a concrete storage backend.

pub mod mapping;
