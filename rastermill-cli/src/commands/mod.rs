//! CLI subcommand implementations.

pub mod batch;
pub mod common;
pub mod config;
pub mod tiles;
