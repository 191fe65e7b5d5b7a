//! Infrastructure layer (adapters/implementations).
//!
//! This module contains IO-heavy integrations (SQLite, config files, seed data).

pub mod app_config;
pub mod db;
pub mod hash;
pub mod seed;
