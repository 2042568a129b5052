//! CLI module - argument parsing, command plumbing and dispatch

pub mod args;
pub mod commands;
pub mod context;
pub mod examples;
pub mod flags;
pub mod globalflags;
pub mod input;
pub mod output;
pub mod printer;
pub mod table;

#[cfg(test)]
pub(crate) mod test_support;

pub use args::{Cli, Commands, GlobalOpts, OutputFormat, Verbosity};
pub use context::CmdContext;
pub use printer::Printer;
