//! Subcommand implementations.

pub mod check;
pub mod plan;
pub mod repair;
pub mod split;
