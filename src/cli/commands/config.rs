//! `stackit config` command - CLI configuration management
//!
//! `set` and `unset` rewrite the configuration file; `list` shows the
//! effective values after the environment overlay.

use clap::builder::ArgAction;
use clap::{Arg, ArgMatches, Command, Subcommand, ValueEnum};
use miette::Result;
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;

use crate::cli::args::GlobalOpts;
use crate::cli::context::CmdContext;
use crate::cli::examples::{self, Example};
use crate::cli::flags;
use crate::cli::globalflags::GlobalFlagModel;
use crate::cli::input::{self, InputModel};
use crate::cli::output::output_result;
use crate::cli::table::Table;
use crate::core::config::{endpoint_key, keys, known_keys, ConfigStore, ValueSource, CUSTOM_ENDPOINTS};
use crate::core::errors::CliError;

#[derive(Subcommand, Debug)]
pub enum ConfigCommands {
    /// Sets CLI configuration options
    #[command(
        long_about = "Sets CLI configuration options.\n\
            All of the configuration options can be set using an environment variable, \
            which takes precedence over what is configured.\n\
            The environment variables are named \"STACKIT_\" followed by the option name \
            in uppercase with dashes replaced by underscores.",
        after_help = set_examples()
    )]
    Set(SetArgs),

    /// Unsets CLI configuration options
    #[command(after_help = unset_examples())]
    Unset(UnsetArgs),

    /// Lists the current CLI configuration values
    #[command(after_help = list_examples())]
    List(ListArgs),
}

fn set_examples() -> String {
    examples::build(&[
        Example::new(
            "Set a project ID in your active configuration",
            ["$ stackit config set --project-id xxx"],
        ),
        Example::new(
            "Set the session time limit to 1 hour",
            ["$ stackit config set --session-time-limit 1h"],
        ),
        Example::new(
            "Set the DNS custom endpoint",
            ["$ stackit config set --dns-custom-endpoint https://dns.example.com"],
        ),
    ])
}

fn unset_examples() -> String {
    examples::build(&[
        Example::new(
            "Unset the project ID stored in your configuration",
            ["$ stackit config unset project-id"],
        ),
        Example::new(
            "Unset the session time limit and the DNS custom endpoint",
            ["$ stackit config unset --session-time-limit --dns-custom-endpoint"],
        ),
    ])
}

fn list_examples() -> String {
    examples::build(&[
        Example::new("List your active configuration", ["$ stackit config list"]),
        Example::new(
            "List your active configuration including default values",
            ["$ stackit config list --all"],
        ),
    ])
}

/// One `--<service>-custom-endpoint URL` flag per known service
#[derive(Debug, Clone, Default)]
pub struct EndpointValues(pub BTreeMap<String, String>);

/// One `--<service>-custom-endpoint` switch per known service
#[derive(Debug, Clone, Default)]
pub struct EndpointSwitches(pub Vec<String>);

impl clap::FromArgMatches for EndpointValues {
    fn from_arg_matches(matches: &ArgMatches) -> std::result::Result<Self, clap::Error> {
        let values = CUSTOM_ENDPOINTS
            .iter()
            .map(|(svc, _)| endpoint_key(svc))
            .filter_map(|key| {
                matches
                    .get_one::<String>(&key)
                    .map(|value| (key.clone(), value.clone()))
            })
            .collect();
        Ok(Self(values))
    }

    fn update_from_arg_matches(&mut self, matches: &ArgMatches) -> std::result::Result<(), clap::Error> {
        *self = Self::from_arg_matches(matches)?;
        Ok(())
    }
}

impl clap::Args for EndpointValues {
    fn augment_args(cmd: Command) -> Command {
        CUSTOM_ENDPOINTS.iter().fold(cmd, |cmd, (svc, name)| {
            let key = endpoint_key(svc);
            cmd.arg(
                Arg::new(key.clone())
                    .long(key)
                    .value_name("URL")
                    .help(format!("{} API base URL, used in calls to this API", name)),
            )
        })
    }

    fn augment_args_for_update(cmd: Command) -> Command {
        Self::augment_args(cmd)
    }
}

impl clap::FromArgMatches for EndpointSwitches {
    fn from_arg_matches(matches: &ArgMatches) -> std::result::Result<Self, clap::Error> {
        let keys = CUSTOM_ENDPOINTS
            .iter()
            .map(|(svc, _)| endpoint_key(svc))
            .filter(|key| matches.get_flag(key))
            .collect();
        Ok(Self(keys))
    }

    fn update_from_arg_matches(&mut self, matches: &ArgMatches) -> std::result::Result<(), clap::Error> {
        *self = Self::from_arg_matches(matches)?;
        Ok(())
    }
}

impl clap::Args for EndpointSwitches {
    fn augment_args(cmd: Command) -> Command {
        CUSTOM_ENDPOINTS.iter().fold(cmd, |cmd, (svc, name)| {
            let key = endpoint_key(svc);
            cmd.arg(
                Arg::new(key.clone())
                    .long(key)
                    .action(ArgAction::SetTrue)
                    .help(format!("{} API base URL. If unset, uses the default base URL", name)),
            )
        })
    }

    fn augment_args_for_update(cmd: Command) -> Command {
        Self::augment_args(cmd)
    }
}

/// `--project-id`, `--region`, `--output-format`, `--async` and
/// `--verbosity` are the global flags themselves.
#[derive(clap::Args, Debug)]
pub struct SetArgs {
    /// Maximum time before authentication is required again (e.g. 2h, 30m, 1d)
    #[arg(long, value_parser = flags::session_time_limit)]
    pub session_time_limit: Option<String>,

    /// Identity provider well-known OpenID configuration URL
    #[arg(long)]
    pub identity_provider_custom_well_known_configuration: Option<String>,

    /// Identity provider client ID, used in user authentication
    #[arg(long)]
    pub identity_provider_custom_client_id: Option<String>,

    /// Domain name the curl command may call; an empty value allows any domain
    #[arg(long)]
    pub allowed_url_domain: Option<String>,

    #[command(flatten)]
    pub endpoints: EndpointValues,
}

#[derive(clap::Args, Debug)]
pub struct UnsetArgs {
    /// Configuration keys to unset, by name (e.g. project-id, region)
    #[arg(value_name = "KEY")]
    pub names: Vec<String>,

    /// Session time limit. If unset, defaults to 2h
    #[arg(long)]
    pub session_time_limit: bool,

    /// Identity provider well-known OpenID configuration URL
    #[arg(long)]
    pub identity_provider_custom_well_known_configuration: bool,

    /// Identity provider client ID
    #[arg(long)]
    pub identity_provider_custom_client_id: bool,

    /// Domain name the curl command may call. If unset, defaults to stackit.cloud
    #[arg(long)]
    pub allowed_url_domain: bool,

    #[command(flatten)]
    pub endpoints: EndpointSwitches,
}

#[derive(clap::Args, Debug)]
pub struct ListArgs {
    /// Also show options that are at their default value
    #[arg(long)]
    pub all: bool,
}

/// Run a config subcommand
pub fn run(cmd: ConfigCommands, opts: &GlobalOpts, ctx: &CmdContext) -> Result<()> {
    match cmd {
        ConfigCommands::Set(args) => run_set(args, opts, ctx),
        ConfigCommands::Unset(args) => run_unset(args, ctx),
        ConfigCommands::List(args) => run_list(args, ctx),
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SetInput {
    #[serde(flatten)]
    pub global: GlobalFlagModel,
    /// Values to write, by canonical key
    pub values: BTreeMap<String, Value>,
}

impl InputModel for SetInput {}

/// Collect explicitly passed options; global flags count only when given
pub fn parse_set_input(args: &SetArgs, opts: &GlobalOpts, global: &GlobalFlagModel) -> Result<SetInput, CliError> {
    let mut values = BTreeMap::new();
    let mut put = |key: &str, value: Value| {
        values.insert(key.to_string(), value);
    };

    if let Some(id) = &opts.project_id {
        put(keys::PROJECT_ID, Value::String(id.clone()));
    }
    if let Some(region) = &opts.region {
        put(keys::REGION, Value::String(region.clone()));
    }
    if let Some(format) = opts.output_format {
        if let Some(name) = format.to_possible_value() {
            put(keys::OUTPUT_FORMAT, Value::String(name.get_name().to_string()));
        }
    }
    if opts.async_mode {
        put(keys::ASYNC, Value::Bool(true));
    }
    if let Some(verbosity) = opts.verbosity {
        if let Some(name) = verbosity.to_possible_value() {
            put(keys::VERBOSITY, Value::String(name.get_name().to_string()));
        }
    }
    if let Some(limit) = &args.session_time_limit {
        put(keys::SESSION_TIME_LIMIT, Value::String(limit.clone()));
    }
    if let Some(url) = &args.identity_provider_custom_well_known_configuration {
        put(keys::IDENTITY_PROVIDER_WELL_KNOWN, Value::String(url.clone()));
    }
    if let Some(id) = &args.identity_provider_custom_client_id {
        put(keys::IDENTITY_PROVIDER_CLIENT_ID, Value::String(id.clone()));
    }
    if let Some(domain) = &args.allowed_url_domain {
        put(keys::ALLOWED_URL_DOMAIN, Value::String(domain.clone()));
    }
    for (key, url) in &args.endpoints.0 {
        put(key, Value::String(url.clone()));
    }

    input::ensure_any_set(&[!values.is_empty()])?;
    Ok(SetInput {
        global: global.clone(),
        values,
    })
}

fn run_set(args: SetArgs, opts: &GlobalOpts, ctx: &CmdContext) -> Result<()> {
    let p = &ctx.printer;
    let model = parse_set_input(&args, opts, &ctx.global)?.finish(p);

    let mut store = ctx.config.clone();
    for (key, value) in &model.values {
        store.set(key, value.clone());
    }
    store.save()?;

    if model.values.contains_key(keys::SESSION_TIME_LIMIT) {
        p.warn("Authenticate again to apply changes to session time limit");
    }
    if model
        .values
        .get(keys::ALLOWED_URL_DOMAIN)
        .is_some_and(|v| v.as_str() == Some(""))
    {
        p.warn("The allowed URL domain is empty: curl will accept requests to any domain");
    }
    Ok(())
}

#[derive(Debug, Serialize)]
pub struct UnsetInput {
    #[serde(flatten)]
    pub global: GlobalFlagModel,
    pub keys: Vec<String>,
}

impl InputModel for UnsetInput {}

pub fn parse_unset_input(args: &UnsetArgs, global: &GlobalFlagModel) -> Result<UnsetInput, CliError> {
    let known = known_keys();
    let mut selected = Vec::new();
    for name in &args.names {
        if !known.iter().any(|k| k == name) {
            return Err(CliError::arg(name, "unknown configuration option"));
        }
        selected.push(name.clone());
    }
    for (switch, key) in [
        (args.session_time_limit, keys::SESSION_TIME_LIMIT),
        (args.identity_provider_custom_well_known_configuration, keys::IDENTITY_PROVIDER_WELL_KNOWN),
        (args.identity_provider_custom_client_id, keys::IDENTITY_PROVIDER_CLIENT_ID),
        (args.allowed_url_domain, keys::ALLOWED_URL_DOMAIN),
    ] {
        if switch {
            selected.push(key.to_string());
        }
    }
    selected.extend(args.endpoints.0.iter().cloned());
    selected.sort();
    selected.dedup();

    if selected.is_empty() {
        return Err(CliError::Usage {
            message: "please specify at least one configuration option to unset".to_string(),
            help: None,
        });
    }
    Ok(UnsetInput {
        global: global.clone(),
        keys: selected,
    })
}

fn run_unset(args: UnsetArgs, ctx: &CmdContext) -> Result<()> {
    let model = parse_unset_input(&args, &ctx.global)?.finish(&ctx.printer);
    let mut store = ctx.config.clone();
    for key in &model.keys {
        store.unset(key);
    }
    store.save()?;
    Ok(())
}

#[derive(Debug, Serialize)]
struct ConfigEntry {
    name: String,
    value: String,
    source: String,
}

fn list_entries(store: &ConfigStore, all: bool) -> Vec<ConfigEntry> {
    store
        .entries(all)
        .into_iter()
        .map(|(name, value, source)| ConfigEntry {
            name,
            value,
            source: source.to_string(),
        })
        .collect()
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ListInput {
    #[serde(flatten)]
    pub global: GlobalFlagModel,
    pub all: bool,
}

impl InputModel for ListInput {}

pub fn parse_list_input(args: &ListArgs, global: &GlobalFlagModel) -> ListInput {
    ListInput {
        global: global.clone(),
        all: args.all,
    }
}

fn run_list(args: ListArgs, ctx: &CmdContext) -> Result<()> {
    let model = parse_list_input(&args, &ctx.global).finish(&ctx.printer);
    let entries = list_entries(&ctx.config, model.all);
    let as_map: BTreeMap<&str, &str> = entries
        .iter()
        .map(|e| (e.name.as_str(), e.value.as_str()))
        .collect();

    output_result(&ctx.printer, ctx.global.output_format, &as_map, |p| {
        let mut table = Table::new();
        table.set_header(["NAME", "VALUE"]);
        for entry in &entries {
            let value = if entry.source == ValueSource::Env.to_string() {
                format!("{} (env)", entry.value)
            } else {
                entry.value.clone()
            };
            table.add_row(vec![entry.name.clone(), value]);
        }
        table.display(p);
        Ok(())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::args::{OutputFormat, Verbosity};
    use crate::cli::test_support::{debug_context, test_context, RecordingTransport};
    use crate::core::config::CONFIG_FILE_NAME;
    use clap::Parser;
    use tempfile::tempdir;

    #[derive(Parser)]
    struct Harness {
        #[command(subcommand)]
        cmd: ConfigCommands,
        #[command(flatten)]
        global: GlobalOpts,
    }

    fn parse(argv: &[&str]) -> std::result::Result<Harness, clap::Error> {
        Harness::try_parse_from(std::iter::once("config").chain(argv.iter().copied()))
    }

    fn file_store(initial: &str) -> (tempfile::TempDir, std::path::PathBuf, ConfigStore) {
        let dir = tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);
        std::fs::write(&path, initial).unwrap();
        let store = ConfigStore::load_from(Some(path.clone()), |_| None).unwrap();
        (dir, path, store)
    }

    fn read(path: &std::path::Path) -> Value {
        serde_json::from_str(&std::fs::read_to_string(path).unwrap()).unwrap()
    }

    #[test]
    fn test_set_project_id_clears_cached_name() {
        let (_dir, path, store) = file_store(
            r#"{"project-id": "22222222-2222-2222-2222-222222222222", "project-name": "Old"}"#,
        );
        let (mut ctx, _) = test_context(RecordingTransport::new(), "");
        ctx.config = store;

        let h = parse(&["set", "--project-id", "11111111-1111-1111-1111-111111111111"]).unwrap();
        run(h.cmd, &h.global, &ctx).unwrap();

        let written = read(&path);
        assert_eq!(written["project-id"], "11111111-1111-1111-1111-111111111111");
        assert!(written.get("project-name").is_none());
    }

    #[test]
    fn test_session_time_limit_out_of_range_rejected_at_parse() {
        let err = parse(&["set", "--session-time-limit", "25h"]).err().unwrap();
        assert_eq!(err.kind(), clap::error::ErrorKind::ValueValidation);
    }

    #[test]
    fn test_session_time_limit_one_day_normalised_and_warned() {
        let (_dir, path, store) = file_store("{}");
        let (mut ctx, handles) = test_context(RecordingTransport::new(), "");
        ctx.config = store;

        let h = parse(&["set", "--session-time-limit", "1d"]).unwrap();
        run(h.cmd, &h.global, &ctx).unwrap();

        assert_eq!(read(&path)["session-time-limit"], "24h");
        assert!(handles
            .err
            .contents()
            .contains("Authenticate again to apply changes to session time limit"));
    }

    #[test]
    fn test_set_without_options_is_empty_update() {
        let h = parse(&["set"]).unwrap();
        let ConfigCommands::Set(args) = h.cmd else {
            panic!("expected set");
        };
        let err = parse_set_input(&args, &h.global, &GlobalFlagModel::default()).unwrap_err();
        assert!(matches!(err, CliError::EmptyUpdate));
    }

    #[test]
    fn test_set_collects_globals_and_endpoints() {
        let h = parse(&[
            "set",
            "--output-format",
            "json",
            "--verbosity",
            "debug",
            "--async",
            "--dns-custom-endpoint",
            "https://dns.example",
        ])
        .unwrap();
        let ConfigCommands::Set(args) = h.cmd else {
            panic!("expected set");
        };
        let model = parse_set_input(&args, &h.global, &GlobalFlagModel::default()).unwrap();
        assert_eq!(model.values["output-format"], "json");
        assert_eq!(model.values["verbosity"], "debug");
        assert_eq!(model.values["async"], true);
        assert_eq!(model.values["dns-custom-endpoint"], "https://dns.example");
        assert_eq!(h.global.output_format, Some(OutputFormat::Json));
        assert_eq!(h.global.verbosity, Some(Verbosity::Debug));
    }

    #[test]
    fn test_unset_by_name_and_switch() {
        let (_dir, path, store) = file_store(
            r#"{"project-id": "22222222-2222-2222-2222-222222222222", "project-name": "Old",
                "dns-custom-endpoint": "https://dns.example", "region": "eu02"}"#,
        );
        let (mut ctx, _) = test_context(RecordingTransport::new(), "");
        ctx.config = store;

        let h = parse(&["unset", "project-id", "--dns-custom-endpoint"]).unwrap();
        run(h.cmd, &h.global, &ctx).unwrap();

        let written = read(&path);
        assert!(written.get("project-id").is_none());
        assert!(written.get("project-name").is_none());
        assert!(written.get("dns-custom-endpoint").is_none());
        assert_eq!(written["region"], "eu02");
    }

    #[test]
    fn test_unset_unknown_key() {
        let h = parse(&["unset", "colour"]).unwrap();
        let ConfigCommands::Unset(args) = h.cmd else {
            panic!("expected unset");
        };
        let err = parse_unset_input(&args, &GlobalFlagModel::default()).unwrap_err();
        assert!(matches!(err, CliError::ArgValidation { .. }));
    }

    #[test]
    fn test_list_table_and_json() {
        let (_dir, _path, store) = file_store(r#"{"region": "eu02", "async": true}"#);
        let (mut ctx, handles) = test_context(RecordingTransport::new(), "");
        ctx.config = store;

        run_list(ListArgs { all: false }, &ctx).unwrap();
        let text = console::strip_ansi_codes(&handles.out.contents()).to_string();
        assert!(text.contains("NAME"));
        assert!(text.contains("eu02"));
        assert!(!text.contains("session-time-limit"));
        let async_at = text.find("async").unwrap();
        let region_at = text.find("region").unwrap();
        assert!(async_at < region_at);

        let (mut ctx, handles) = test_context(RecordingTransport::new(), "");
        ctx.config = ConfigStore::in_memory();
        ctx.global.output_format = OutputFormat::Json;
        run_list(ListArgs { all: true }, &ctx).unwrap();
        let value: Value = serde_json::from_str(&handles.out.contents()).unwrap();
        assert_eq!(value["session-time-limit"], "2h");
    }

    #[test]
    fn test_list_dumps_input_at_debug() {
        let (ctx, handles) = debug_context(RecordingTransport::new(), "");
        run_list(ListArgs { all: true }, &ctx).unwrap();
        let stderr = handles.err.contents();
        assert!(stderr.contains("parsed input values"));
        assert!(stderr.contains(r#""all":true"#));
    }
}
