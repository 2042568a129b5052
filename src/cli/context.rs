//! Per-invocation command context

use chrono::Utc;
use std::time::Duration;

use crate::cli::globalflags::GlobalFlagModel;
use crate::cli::printer::Printer;
use crate::core::auth::{self, CredentialStore};
use crate::core::cancel::CancelToken;
use crate::core::config::{keys, ConfigStore};
use crate::core::errors::CliError;
use crate::services::{ApiClient, HttpTransport, Service, Waiter};

/// Everything a leaf command needs besides its own arguments
pub struct CmdContext {
    pub printer: Printer,
    pub global: GlobalFlagModel,
    pub config: ConfigStore,
    pub credentials: CredentialStore,
    pub transport: Box<dyn HttpTransport>,
    pub cancel: CancelToken,
    /// Token from `STACKIT_ACCESS_TOKEN`, captured at startup
    pub env_token: Option<String>,
    pub poll_interval: Duration,
    pub wait_timeout: Duration,
}

impl CmdContext {
    /// Bearer token for outgoing requests
    pub fn access_token(&self) -> Result<String, CliError> {
        let token = auth::resolve_access_token(self.env_token.clone(), &self.credentials, Utc::now());
        if let Err(e) = &token {
            self.printer.debug(&format!("configure authentication: {}", e));
        }
        token
    }

    /// Base URL for a service, honouring `<service>-custom-endpoint`
    pub fn endpoint(&self, service: Service) -> String {
        match self.config.custom_endpoint(service.config_prefix()) {
            Some(custom) => {
                self.printer
                    .debug(&format!("using custom endpoint {} for {:?}", custom, service));
                custom
            }
            None => service.default_base_url().to_string(),
        }
    }

    /// Authenticated client for a service
    pub fn api_client(&self, service: Service) -> Result<ApiClient<'_>, CliError> {
        let token = self.access_token()?;
        Ok(
            ApiClient::new(self.transport.as_ref(), self.endpoint(service), token)
                .with_cancel(self.cancel.clone()),
        )
    }

    pub fn waiter(&self) -> Waiter {
        Waiter::new(self.cancel.clone(), self.poll_interval, self.wait_timeout)
    }

    /// Confirmation gate for destructive or mutating commands
    pub fn confirm(&self, prompt: &str) -> Result<(), CliError> {
        self.cancel.check()?;
        if self.global.assume_yes {
            return Ok(());
        }
        self.printer.prompt_for_confirmation(prompt)?;
        self.cancel.check()
    }

    /// Project display name when cached, otherwise the id itself
    pub fn project_label(&self, project_id: &str) -> String {
        let cached_for_same_project = self
            .config
            .get(keys::PROJECT_ID)
            .is_some_and(|id| id.eq_ignore_ascii_case(project_id));
        match self.config.project_name() {
            Some(name) if cached_for_same_project => name,
            _ => project_id.to_string(),
        }
    }

    /// "Created" or "Triggered creation of", depending on `--async`
    pub fn operation_state(&self, done: &'static str, triggered: &'static str) -> &'static str {
        if self.global.is_async {
            triggered
        } else {
            done
        }
    }
}
