//! Command tree: one module per top-level command group

pub mod auth;
pub mod beta;
pub mod completions;
pub mod config;
pub mod curl;
pub mod dns;
pub mod object_storage;
pub mod project;
pub mod security_group;
pub mod ske;
