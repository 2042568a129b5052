//! Global flag model: command line merged over the configuration store
//!
//! Precedence is flag, then `STACKIT_*` environment variable, then config
//! file, then built-in default.

use clap::ValueEnum;
use serde::Serialize;

use crate::cli::args::{GlobalOpts, OutputFormat, Verbosity};
use crate::cli::flags;
use crate::core::config::{keys, ConfigStore};
use crate::core::errors::CliError;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GlobalFlagModel {
    pub project_id: Option<String>,
    pub region: Option<String>,
    pub output_format: OutputFormat,
    #[serde(rename = "async")]
    pub is_async: bool,
    pub assume_yes: bool,
    pub verbosity: Verbosity,
}

impl GlobalFlagModel {
    pub fn parse(opts: &GlobalOpts, store: &ConfigStore) -> Result<Self, CliError> {
        let project_id = match &opts.project_id {
            Some(id) => Some(id.clone()),
            None => store
                .project_id()
                .map(|id| flags::uuid(&id).map_err(|e| CliError::flag(keys::PROJECT_ID, e.to_string())))
                .transpose()?,
        };

        let output_format = match opts.output_format {
            Some(format) => format,
            None => match store.get(keys::OUTPUT_FORMAT) {
                Some(raw) => parse_output_format(&raw)?,
                None => OutputFormat::Default,
            },
        };

        let verbosity = match opts.verbosity {
            Some(v) => v,
            None => match store.get(keys::VERBOSITY) {
                Some(raw) => Verbosity::from_str(&raw, true)
                    .map_err(|_| CliError::flag(keys::VERBOSITY, format!("unknown verbosity {:?}", raw)))?,
                None => Verbosity::Info,
            },
        };

        Ok(Self {
            project_id,
            region: opts.region.clone().or_else(|| store.region()),
            output_format,
            is_async: opts.async_mode || store.get_bool(keys::ASYNC),
            assume_yes: opts.assume_yes,
            verbosity,
        })
    }

    /// Project id for project-scoped commands
    pub fn require_project_id(&self) -> Result<&str, CliError> {
        self.project_id
            .as_deref()
            .filter(|id| !id.is_empty())
            .ok_or(CliError::ProjectIdMissing)
    }

    pub fn region_or_default(&self) -> &str {
        self.region.as_deref().unwrap_or("eu01")
    }
}

pub fn parse_output_format(raw: &str) -> Result<OutputFormat, CliError> {
    if raw.eq_ignore_ascii_case("default") {
        return Ok(OutputFormat::Default);
    }
    OutputFormat::from_str(raw, true).map_err(|_| {
        CliError::flag(
            keys::OUTPUT_FORMAT,
            format!("must be one of {{\"json\", \"yaml\", \"pretty\", \"none\"}}, got {:?}", raw),
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const FILE_PROJECT: &str = "11111111-1111-1111-1111-111111111111";
    const ENV_PROJECT: &str = "22222222-2222-2222-2222-222222222222";
    const FLAG_PROJECT: &str = "33333333-3333-3333-3333-333333333333";

    fn store_with(file: &str, env: &[(&str, &str)]) -> ConfigStore {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("cli-config.json");
        std::fs::write(&path, file).unwrap();
        let env: Vec<(String, String)> = env
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        ConfigStore::load_from(Some(path), move |name| {
            env.iter().find(|(k, _)| k == name).map(|(_, v)| v.clone())
        })
        .unwrap()
    }

    #[test]
    fn test_precedence_flag_env_file() {
        let file = format!(r#"{{"project-id": "{}"}}"#, FILE_PROJECT);

        let only_file = store_with(&file, &[]);
        let model = GlobalFlagModel::parse(&GlobalOpts::default(), &only_file).unwrap();
        assert_eq!(model.project_id.as_deref(), Some(FILE_PROJECT));

        let with_env = store_with(&file, &[("STACKIT_PROJECT_ID", ENV_PROJECT)]);
        let model = GlobalFlagModel::parse(&GlobalOpts::default(), &with_env).unwrap();
        assert_eq!(model.project_id.as_deref(), Some(ENV_PROJECT));

        let opts = GlobalOpts {
            project_id: Some(FLAG_PROJECT.to_string()),
            ..Default::default()
        };
        let model = GlobalFlagModel::parse(&opts, &with_env).unwrap();
        assert_eq!(model.project_id.as_deref(), Some(FLAG_PROJECT));
    }

    #[test]
    fn test_output_format_from_env() {
        let store = store_with("{}", &[("STACKIT_OUTPUT_FORMAT", "json")]);
        let model = GlobalFlagModel::parse(&GlobalOpts::default(), &store).unwrap();
        assert_eq!(model.output_format, OutputFormat::Json);
    }

    #[test]
    fn test_invalid_output_format_in_config() {
        let store = store_with(r#"{"output-format": "xml"}"#, &[]);
        let err = GlobalFlagModel::parse(&GlobalOpts::default(), &store).unwrap_err();
        assert!(matches!(err, CliError::FlagValidation { .. }));
    }

    #[test]
    fn test_invalid_project_id_in_env() {
        let store = store_with("{}", &[("STACKIT_PROJECT_ID", "not-a-uuid")]);
        let err = GlobalFlagModel::parse(&GlobalOpts::default(), &store).unwrap_err();
        assert_eq!(
            err.to_string(),
            "the provided flag --project-id is invalid: invalid UUID"
        );
    }

    #[test]
    fn test_async_from_config_or_flag() {
        let store = store_with(r#"{"async": true}"#, &[]);
        assert!(GlobalFlagModel::parse(&GlobalOpts::default(), &store).unwrap().is_async);

        let store = store_with("{}", &[]);
        let opts = GlobalOpts {
            async_mode: true,
            ..Default::default()
        };
        assert!(GlobalFlagModel::parse(&opts, &store).unwrap().is_async);
        assert!(!GlobalFlagModel::parse(&GlobalOpts::default(), &store).unwrap().is_async);
    }

    #[test]
    fn test_verbosity_and_region_defaults() {
        let store = store_with("{}", &[]);
        let model = GlobalFlagModel::parse(&GlobalOpts::default(), &store).unwrap();
        assert_eq!(model.verbosity, Verbosity::Info);
        assert_eq!(model.region.as_deref(), Some("eu01"));
        assert_eq!(model.output_format, OutputFormat::Default);
    }

    #[test]
    fn test_require_project_id() {
        let model = GlobalFlagModel::default();
        assert!(matches!(
            model.require_project_id(),
            Err(CliError::ProjectIdMissing)
        ));
    }
}
