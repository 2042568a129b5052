//! Core module - configuration, credentials and the error taxonomy

pub mod auth;
pub mod cancel;
pub mod config;
pub mod duration;
pub mod errors;

pub use auth::{CredentialStore, Credentials};
pub use cancel::CancelToken;
pub use config::ConfigStore;
pub use errors::CliError;
