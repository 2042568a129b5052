//! `stackit auth` command - service-account authentication

use chrono::Utc;
use clap::Subcommand;
use miette::Result;
use serde::Serialize;

use crate::cli::context::CmdContext;
use crate::cli::examples::{self, Example};
use crate::cli::globalflags::GlobalFlagModel;
use crate::cli::input::InputModel;
use crate::cli::output::output_result;
use crate::core::auth::Credentials;
use crate::core::duration::parse_duration;
use crate::core::errors::CliError;

#[derive(Subcommand, Debug)]
pub enum AuthCommands {
    /// Authenticates using a service account
    #[command(
        long_about = "Authenticates to the CLI using a service account access token.\n\
            The session lasts as long as the configured session time limit.",
        after_help = activate_examples()
    )]
    ActivateServiceAccount(ActivateArgs),

    /// Logs the user account out of the STACKIT CLI
    #[command(after_help = examples::build(&[Example::new(
        "Log out of the STACKIT CLI",
        ["$ stackit auth logout"],
    )]))]
    Logout,

    /// Prints a short-lived access token
    #[command(after_help = examples::build(&[Example::new(
        "Print a short-lived access token",
        ["$ stackit auth get-access-token"],
    )]))]
    GetAccessToken,
}

fn activate_examples() -> String {
    examples::build(&[
        Example::new(
            "Activate service account authentication using a service account token",
            ["$ stackit auth activate-service-account --service-account-token my-service-account-token"],
        ),
        Example::new(
            "Only print the token that would be used, without storing it",
            ["$ stackit auth activate-service-account --service-account-token my-token --only-print-access-token"],
        ),
    ])
}

#[derive(clap::Args, Debug)]
pub struct ActivateArgs {
    /// Service account long-lived access token
    #[arg(long, required = true)]
    pub service_account_token: String,

    /// If this is set to true the credentials are not stored. Only the access token is printed
    #[arg(long)]
    pub only_print_access_token: bool,
}

pub fn run(cmd: AuthCommands, ctx: &CmdContext) -> Result<()> {
    match cmd {
        AuthCommands::ActivateServiceAccount(args) => run_activate(args, ctx),
        AuthCommands::Logout => run_logout(ctx),
        AuthCommands::GetAccessToken => run_get_access_token(ctx),
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivateInput {
    #[serde(flatten)]
    pub global: GlobalFlagModel,
    pub service_account_token: String,
    pub only_print_access_token: bool,
}

impl InputModel for ActivateInput {}

pub fn parse_activate_input(args: &ActivateArgs, global: &GlobalFlagModel) -> Result<ActivateInput, CliError> {
    let token = args.service_account_token.trim();
    if token.is_empty() {
        return Err(CliError::flag("service-account-token", "must not be empty"));
    }
    Ok(ActivateInput {
        global: global.clone(),
        service_account_token: token.to_string(),
        only_print_access_token: args.only_print_access_token,
    })
}

fn run_activate(args: ActivateArgs, ctx: &CmdContext) -> Result<()> {
    let p = &ctx.printer;
    let model = parse_activate_input(&args, &ctx.global)?.finish(p);

    if model.only_print_access_token {
        p.outputln(&model.service_account_token);
        return Ok(());
    }

    let raw_limit = ctx.config.session_time_limit();
    let limit = parse_duration(&raw_limit)
        .map_err(|e| CliError::flag("session-time-limit", e.to_string()))?;
    let creds = Credentials::for_service_account_token(&model.service_account_token, limit, Utc::now());
    ctx.credentials.save(&creds)?;

    match &creds.service_account_email {
        Some(email) => p.info(&format!(
            "You have been successfully authenticated to the STACKIT CLI!\nService account email: {}",
            email
        )),
        None => p.info("You have been successfully authenticated to the STACKIT CLI!"),
    }
    Ok(())
}

/// Logout and get-access-token take nothing beyond the global flags
#[derive(Debug, Serialize)]
pub struct GlobalOnlyInput {
    #[serde(flatten)]
    pub global: GlobalFlagModel,
}

impl InputModel for GlobalOnlyInput {}

pub fn parse_global_only_input(global: &GlobalFlagModel) -> GlobalOnlyInput {
    GlobalOnlyInput {
        global: global.clone(),
    }
}

fn run_logout(ctx: &CmdContext) -> Result<()> {
    parse_global_only_input(&ctx.global).finish(&ctx.printer);
    if !ctx.credentials.delete()? {
        ctx.printer.debug("no stored credentials found");
    }
    ctx.printer.info("Successfully logged out of the STACKIT CLI.");
    Ok(())
}

#[derive(Serialize)]
struct AccessToken {
    access_token: String,
}

fn run_get_access_token(ctx: &CmdContext) -> Result<()> {
    let model = parse_global_only_input(&ctx.global).finish(&ctx.printer);
    let token = AccessToken {
        access_token: ctx.access_token()?,
    };
    output_result(&ctx.printer, model.global.output_format, &token, |p| {
        p.outputln(&token.access_token);
        Ok(())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::args::OutputFormat;
    use crate::cli::test_support::{debug_context, test_context, RecordingTransport};
    use crate::core::auth::{CredentialStore, AUTH_FILE_NAME};
    use tempfile::tempdir;

    #[test]
    fn test_activate_stores_token_with_session_limit() {
        let dir = tempdir().unwrap();
        let (mut ctx, handles) = test_context(RecordingTransport::new(), "");
        ctx.credentials = CredentialStore::new(Some(dir.path().join(AUTH_FILE_NAME)));
        ctx.config.set_string("session-time-limit", "1h");

        let before = Utc::now().timestamp();
        run_activate(
            ActivateArgs {
                service_account_token: "opaque-token".into(),
                only_print_access_token: false,
            },
            &ctx,
        )
        .unwrap();

        let stored = ctx.credentials.load().unwrap().unwrap();
        assert_eq!(stored.access_token.as_deref(), Some("opaque-token"));
        let expires = stored.session_expires_at_unix.unwrap();
        assert!(expires >= before + 3600 && expires <= before + 3601 + 5);
        assert!(handles.err.contents().contains("successfully authenticated"));
    }

    #[test]
    fn test_only_print_does_not_store() {
        let dir = tempdir().unwrap();
        let (mut ctx, handles) = test_context(RecordingTransport::new(), "");
        ctx.credentials = CredentialStore::new(Some(dir.path().join(AUTH_FILE_NAME)));

        run_activate(
            ActivateArgs {
                service_account_token: "tok".into(),
                only_print_access_token: true,
            },
            &ctx,
        )
        .unwrap();
        assert_eq!(handles.out.contents(), "tok\n");
        assert!(ctx.credentials.load().unwrap().is_none());
    }

    #[test]
    fn test_empty_token_rejected() {
        let args = ActivateArgs {
            service_account_token: "  ".into(),
            only_print_access_token: false,
        };
        assert!(matches!(
            parse_activate_input(&args, &GlobalFlagModel::default()),
            Err(CliError::FlagValidation { .. })
        ));
    }

    #[test]
    fn test_get_access_token_json() {
        let (mut ctx, handles) = test_context(RecordingTransport::new(), "");
        ctx.global.output_format = OutputFormat::Json;
        run_get_access_token(&ctx).unwrap();
        let value: serde_json::Value = serde_json::from_str(&handles.out.contents()).unwrap();
        assert_eq!(value["access_token"], "test-token");
    }

    #[test]
    fn test_logout_without_credentials_succeeds() {
        let dir = tempdir().unwrap();
        let (mut ctx, handles) = test_context(RecordingTransport::new(), "");
        ctx.credentials = CredentialStore::new(Some(dir.path().join(AUTH_FILE_NAME)));
        run_logout(&ctx).unwrap();
        assert!(handles.err.contents().contains("logged out"));
    }

    #[test]
    fn test_get_access_token_dumps_input_at_debug() {
        let (ctx, handles) = debug_context(RecordingTransport::new(), "");
        run_get_access_token(&ctx).unwrap();
        let stderr = handles.err.contents();
        assert!(stderr.contains("parsed input values"));
        assert!(stderr.contains(r#""verbosity":"debug""#));
        assert_eq!(handles.out.contents(), "test-token\n");
    }
}
