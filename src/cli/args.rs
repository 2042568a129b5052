//! CLI argument definitions using clap derive

use clap::{Parser, Subcommand, ValueEnum};
use serde::Serialize;

use crate::cli::commands::{
    auth::AuthCommands, beta::BetaCommands, completions::CompletionsArgs, config::ConfigCommands,
    curl::CurlArgs, dns::DnsCommands, object_storage::ObjectStorageCommands,
    project::ProjectCommands, security_group::SecurityGroupCommands, ske::SkeCommands,
};
use crate::cli::flags;

#[derive(Parser)]
#[command(name = "stackit")]
#[command(version, about = "Manage STACKIT cloud services")]
#[command(long_about = "Manage STACKIT cloud services from the command line.")]
#[command(propagate_version = true)]
#[command(arg_required_else_help = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    #[command(flatten)]
    pub global: GlobalOpts,
}

#[derive(clap::Args, Clone, Debug, Default)]
pub struct GlobalOpts {
    /// Project ID
    #[arg(long, short = 'p', global = true, value_parser = flags::uuid)]
    pub project_id: Option<String>,

    /// Target region for region-specific requests
    #[arg(long, global = true)]
    pub region: Option<String>,

    /// Output format
    #[arg(long, short = 'o', global = true)]
    pub output_format: Option<OutputFormat>,

    /// If set, runs the command asynchronously
    #[arg(long = "async", global = true)]
    pub async_mode: bool,

    /// If set, skips all confirmation prompts
    #[arg(long, short = 'y', global = true)]
    pub assume_yes: bool,

    /// Verbosity of the CLI
    #[arg(long, global = true)]
    pub verbosity: Option<Verbosity>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Authenticates the STACKIT CLI
    #[command(subcommand)]
    Auth(AuthCommands),

    /// Contains beta STACKIT CLI commands
    #[command(subcommand)]
    Beta(BetaCommands),

    /// Provides functionality for CLI configuration options
    #[command(subcommand)]
    Config(ConfigCommands),

    /// Executes an authenticated HTTP request to an endpoint
    Curl(CurlArgs),

    /// Provides functionality for DNS
    #[command(subcommand)]
    Dns(DnsCommands),

    /// Provides functionality for Object Storage
    #[command(subcommand)]
    ObjectStorage(ObjectStorageCommands),

    /// Manages projects
    #[command(subcommand)]
    Project(ProjectCommands),

    /// Manage security groups
    #[command(subcommand)]
    SecurityGroup(SecurityGroupCommands),

    /// Provides functionality for SKE
    #[command(subcommand)]
    Ske(SkeCommands),

    /// Generate shell completion scripts
    Completions(CompletionsArgs),
}

#[derive(ValueEnum, Serialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Command-specific table or sentence
    #[default]
    #[value(skip)]
    Default,
    /// JSON document, two-space indent
    Json,
    /// YAML document
    Yaml,
    /// Human-readable table or sentence
    Pretty,
    /// No output on stdout
    None,
}

impl OutputFormat {
    /// Whether the renderer writes a machine-readable document
    pub fn is_structured(self) -> bool {
        matches!(self, OutputFormat::Json | OutputFormat::Yaml)
    }
}

/// Ordered from least to most verbose
#[derive(ValueEnum, Serialize, Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum Verbosity {
    Error,
    #[value(alias = "warn")]
    Warning,
    #[default]
    Info,
    Debug,
}
