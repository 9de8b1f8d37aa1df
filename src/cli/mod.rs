//! CLI command handlers

pub mod commands;

pub use commands::{cells, find, inspect};
