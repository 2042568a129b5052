//! Error taxonomy shared by every command
//!
//! Each variant is one error kind. The kind decides the process exit code;
//! the message is what the user sees on stderr.

use miette::Diagnostic;
use thiserror::Error;

/// Exit code used when the process is interrupted (128 + SIGINT)
pub const EXIT_CANCELLED: i32 = 130;

/// Exit code for `curl --fail` on an HTTP error status, as curl(1) does
pub const EXIT_HTTP_FAILURE: i32 = 22;

#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    /// Unknown flag, missing required flag, wrong argument count
    #[error("{message}")]
    #[diagnostic(code(stackit::usage))]
    Usage {
        message: String,
        #[help]
        help: Option<String>,
    },

    #[error("the provided flag --{flag} is invalid: {details}")]
    #[diagnostic(code(stackit::flag_validation))]
    FlagValidation {
        flag: String,
        details: String,
        #[help]
        help: Option<String>,
    },

    #[error("the provided argument \"{arg}\" is invalid: {details}")]
    #[diagnostic(code(stackit::arg_validation))]
    ArgValidation { arg: String, details: String },

    #[error(
        "the project ID is not currently set.\n\n\
         It can be set on the command level by re-running your command with the --project-id flag.\n\n\
         You can configure it for all commands by running:\n\n  \
         $ stackit config set --project-id xxx\n\n\
         or you can also set it through the environment variable [STACKIT_PROJECT_ID]"
    )]
    #[diagnostic(code(stackit::project_id_missing))]
    ProjectIdMissing,

    #[error(
        "please specify at least one field to update.\n\n\
         Get details on the available flags by re-running your command with the --help flag."
    )]
    #[diagnostic(code(stackit::empty_update))]
    EmptyUpdate,

    #[error("{0}")]
    #[diagnostic(code(stackit::conflict))]
    Conflict(String),

    #[error("operation aborted by the user, no action taken")]
    #[diagnostic(code(stackit::prompt_declined))]
    PromptDeclined,

    #[error(
        "you are not authenticated.\n\n\
         You can authenticate as a service account by running:\n  \
         $ stackit auth activate-service-account\n\n\
         or by setting the environment variable [STACKIT_ACCESS_TOKEN]"
    )]
    #[diagnostic(code(stackit::auth))]
    Auth,

    #[error("your session has expired, please authenticate again:\n  $ stackit auth activate-service-account")]
    #[diagnostic(code(stackit::session_expired))]
    SessionExpired,

    /// The remote API reported a failure: an error status, a failed
    /// terminal state, or an operation that never finished
    #[error("{operation}: {message}{}", http_suffix(.status))]
    #[diagnostic(code(stackit::remote))]
    Remote {
        operation: String,
        status: Option<u16>,
        message: String,
    },

    /// The remote API could not be reached at all
    #[error("{operation}: {message}")]
    #[diagnostic(code(stackit::http))]
    Http { operation: String, message: String },

    #[error("{context}: {source}")]
    #[diagnostic(code(stackit::io))]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{context}: {message}")]
    #[diagnostic(code(stackit::decode))]
    Decode { context: String, message: String },

    /// `curl --fail` saw an error status
    #[error("the server responded with HTTP {status}")]
    #[diagnostic(code(stackit::http_failure))]
    HttpFailure { status: u16 },

    #[error("operation cancelled")]
    #[diagnostic(code(stackit::cancelled))]
    Cancelled,
}

fn http_suffix(status: &Option<u16>) -> String {
    status.map(|s| format!(" (HTTP {})", s)).unwrap_or_default()
}

impl CliError {
    /// Process exit code for this error kind
    pub fn exit_code(&self) -> i32 {
        match self {
            CliError::Usage { .. } => 2,
            CliError::PromptDeclined => 0,
            CliError::Cancelled => EXIT_CANCELLED,
            CliError::HttpFailure { .. } => EXIT_HTTP_FAILURE,
            _ => 1,
        }
    }

    /// Whether the leaf usage string should follow the message
    pub fn wants_usage(&self) -> bool {
        matches!(
            self,
            CliError::Usage { .. } | CliError::FlagValidation { .. } | CliError::ArgValidation { .. }
        )
    }

    pub fn flag(flag: impl Into<String>, details: impl Into<String>) -> Self {
        CliError::FlagValidation {
            flag: flag.into(),
            details: details.into(),
            help: None,
        }
    }

    pub fn arg(arg: impl Into<String>, details: impl Into<String>) -> Self {
        CliError::ArgValidation {
            arg: arg.into(),
            details: details.into(),
        }
    }

    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        CliError::Io {
            context: context.into(),
            source,
        }
    }

    pub fn decode(context: impl Into<String>, message: impl std::fmt::Display) -> Self {
        CliError::Decode {
            context: context.into(),
            message: message.to_string(),
        }
    }

    /// Usage tip appended to validation errors
    pub fn usage_tip(command_path: &str) -> String {
        format!("For usage help, run:\n  $ {} --help", command_path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_codes() {
        assert_eq!(
            CliError::Usage {
                message: "unknown flag".into(),
                help: None
            }
            .exit_code(),
            2
        );
        assert_eq!(CliError::flag("ttl", "bad").exit_code(), 1);
        assert_eq!(CliError::ProjectIdMissing.exit_code(), 1);
        assert_eq!(CliError::EmptyUpdate.exit_code(), 1);
        assert_eq!(CliError::Conflict("x".into()).exit_code(), 1);
        assert_eq!(CliError::PromptDeclined.exit_code(), 0);
        assert_eq!(CliError::Auth.exit_code(), 1);
        assert_eq!(CliError::Cancelled.exit_code(), EXIT_CANCELLED);
        assert_ne!(CliError::Cancelled.exit_code(), 1);
        assert_eq!(CliError::HttpFailure { status: 404 }.exit_code(), EXIT_HTTP_FAILURE);
    }

    #[test]
    fn test_flag_validation_message() {
        let err = CliError::flag("session-time-limit", "out of range");
        assert_eq!(
            err.to_string(),
            "the provided flag --session-time-limit is invalid: out of range"
        );
        assert!(err.wants_usage());
    }

    #[test]
    fn test_arg_validation_message() {
        let err = CliError::arg("RECORD_SET_ID", "invalid UUID");
        assert_eq!(
            err.to_string(),
            "the provided argument \"RECORD_SET_ID\" is invalid: invalid UUID"
        );
    }

    #[test]
    fn test_prompt_declined_mentions_no_action() {
        assert!(CliError::PromptDeclined.to_string().contains("no action taken"));
    }

    #[test]
    fn test_usage_tip() {
        assert_eq!(
            CliError::usage_tip("stackit dns zone create"),
            "For usage help, run:\n  $ stackit dns zone create --help"
        );
    }
}
