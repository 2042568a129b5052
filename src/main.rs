use clap::error::{ContextKind, ContextValue, ErrorKind};
use clap::{CommandFactory, Parser};
use std::time::Duration;

use stackit::cli::commands;
use stackit::cli::globalflags::GlobalFlagModel;
use stackit::cli::{Cli, CmdContext, Commands, Printer, Verbosity};
use stackit::core::auth::{CredentialStore, ACCESS_TOKEN_ENV};
use stackit::core::{CancelToken, CliError, ConfigStore};
use stackit::services::UreqTransport;

const POLL_INTERVAL: Duration = Duration::from_secs(5);
const WAIT_TIMEOUT: Duration = Duration::from_secs(45 * 60);

fn main() {
    // Reset SIGPIPE so piping into `head` terminates quietly instead of panicking
    #[cfg(unix)]
    {
        unsafe {
            libc::signal(libc::SIGPIPE, libc::SIG_DFL);
        }
    }
    let _ = miette::set_hook(Box::new(|_| {
        Box::new(
            miette::MietteHandlerOpts::new()
                .terminal_links(true)
                .unicode(true)
                .context_lines(2)
                .tab_width(4)
                .build(),
        )
    }));

    std::process::exit(run());
}

fn run() -> i32 {
    let argv: Vec<String> = std::env::args().collect();
    let cli = match Cli::try_parse_from(&argv) {
        Ok(cli) => cli,
        Err(e) => return report_parse_error(e, &argv),
    };

    let startup = Printer::stdio(Verbosity::Info);
    let config = match ConfigStore::load() {
        Ok(config) => config,
        Err(e) => return report(&startup, e, &argv),
    };

    let global = match GlobalFlagModel::parse(&cli.global, &config) {
        Ok(global) => global,
        // `config` must stay usable to repair a broken configuration
        Err(e) if matches!(cli.command, Commands::Config(_)) => {
            startup.warn(&format!("ignoring invalid configuration: {}", e));
            match GlobalFlagModel::parse(&cli.global, &ConfigStore::in_memory()) {
                Ok(global) => global,
                Err(e) => return report(&startup, e, &argv),
            }
        }
        Err(e) => return report(&startup, e, &argv),
    };
    drop(startup);

    init_tracing(global.verbosity);

    let ctx = CmdContext {
        printer: Printer::stdio(global.verbosity),
        global,
        config,
        credentials: CredentialStore::default_location(),
        transport: Box::new(UreqTransport::default()),
        cancel: CancelToken::install(),
        env_token: std::env::var(ACCESS_TOKEN_ENV).ok(),
        poll_interval: POLL_INTERVAL,
        wait_timeout: WAIT_TIMEOUT,
    };

    let result = match cli.command {
        Commands::Auth(cmd) => commands::auth::run(cmd, &ctx),
        Commands::Beta(cmd) => commands::beta::run(cmd, &ctx),
        Commands::Config(cmd) => commands::config::run(cmd, &cli.global, &ctx),
        Commands::Curl(args) => commands::curl::run(args, &ctx),
        Commands::Dns(cmd) => commands::dns::run(cmd, &ctx),
        Commands::ObjectStorage(cmd) => commands::object_storage::run(cmd, &ctx),
        Commands::Project(cmd) => commands::project::run(cmd, &ctx),
        Commands::SecurityGroup(cmd) => commands::security_group::run(cmd, &ctx),
        Commands::Ske(cmd) => commands::ske::run(cmd, &ctx),
        Commands::Completions(args) => commands::completions::run(args, &ctx),
    };

    match result {
        Ok(()) => 0,
        Err(err) => match err.downcast::<CliError>() {
            Ok(e) => report(&ctx.printer, e, &argv),
            Err(other) => {
                eprintln!("{:?}", other);
                1
            }
        },
    }
}

fn init_tracing(verbosity: Verbosity) {
    use tracing_subscriber::EnvFilter;

    let default = if verbosity == Verbosity::Debug {
        "stackit=debug"
    } else {
        "warn"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .without_time()
        .try_init();
}

/// Print an error and pick the exit code for it
fn report(p: &Printer, err: CliError, argv: &[String]) -> i32 {
    if matches!(err, CliError::PromptDeclined) {
        p.info(&err.to_string());
        return err.exit_code();
    }
    p.error(&err.to_string());
    if err.wants_usage() {
        p.info(&format!("\n{}", CliError::usage_tip(&command_path(argv))));
    }
    err.exit_code()
}

fn report_parse_error(e: clap::Error, argv: &[String]) -> i32 {
    match e.kind() {
        ErrorKind::DisplayHelp
        | ErrorKind::DisplayVersion
        | ErrorKind::DisplayHelpOnMissingArgumentOrSubcommand => {
            let _ = e.print();
            return 0;
        }
        _ => {}
    }
    let printer = Printer::stdio(Verbosity::Info);
    report(&printer, map_clap_error(&e), argv)
}

/// Translate a clap failure into the shared error taxonomy
fn map_clap_error(e: &clap::Error) -> CliError {
    let message = clap_message(e);
    match e.kind() {
        ErrorKind::ValueValidation | ErrorKind::InvalidValue => {
            let details = std::error::Error::source(e)
                .map(|s| s.to_string())
                .unwrap_or_else(|| message.clone());
            match e.get(ContextKind::InvalidArg) {
                Some(ContextValue::String(arg)) if arg.starts_with('-') => {
                    CliError::flag(flag_name(arg), details)
                }
                Some(ContextValue::String(arg)) => {
                    CliError::arg(arg.trim_matches(|c| c == '<' || c == '>'), details)
                }
                _ => CliError::Usage {
                    message,
                    help: None,
                },
            }
        }
        ErrorKind::ArgumentConflict => CliError::Conflict(message),
        _ => CliError::Usage {
            message,
            help: None,
        },
    }
}

/// First line of clap's rendering, without the `error:` prefix
fn clap_message(e: &clap::Error) -> String {
    let rendered = e.render().to_string();
    let first = rendered.lines().next().unwrap_or_default();
    first.trim_start_matches("error:").trim().to_string()
}

/// `--ttl <TTL>` becomes `ttl`
fn flag_name(arg: &str) -> String {
    let name = arg.split([' ', '=']).next().unwrap_or(arg);
    name.trim_start_matches('-').to_string()
}

/// Leading subcommand names of the invocation, for the usage tip
fn command_path(argv: &[String]) -> String {
    let mut cmd = Cli::command();
    let mut path = vec![cmd.get_name().to_string()];
    for token in argv.iter().skip(1) {
        if token.starts_with('-') {
            continue;
        }
        let Some(sub) = cmd.find_subcommand(token).cloned() else {
            break;
        };
        path.push(sub.get_name().to_string());
        cmd = sub;
    }
    path.join(" ")
}
