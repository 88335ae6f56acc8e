//! CLI command modules.

pub mod config;
pub mod interrogate;
pub mod models;
