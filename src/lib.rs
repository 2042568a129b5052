//! STACKIT CLI
//!
//! Command-line client for STACKIT cloud services: a clap command tree on
//! top of a configuration store, a printer, and thin typed HTTP clients.

pub mod cli;
pub mod core;
pub mod services;
