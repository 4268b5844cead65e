//! NaaS CLI
//!
//! Command implementations behind `naasctl`: each command loads its YAML
//! documents, runs one reconcile manager against the portal and returns the
//! report for rendering.

pub mod commands;
pub mod output;

#[cfg(test)]
mod tests;

pub use commands::CommandContext;
pub use output::{render, render_table, OutputFormat, QueryTable};
