//! Configuration store: config file overlaid with `STACKIT_*` environment variables
//!
//! The on-disk document is a flat JSON object keyed by canonical names such
//! as `project-id` or `dns-custom-endpoint`. Keys this crate does not know
//! are carried through rewrites untouched but never read.

use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::core::errors::CliError;

/// Prefix for environment variables that shadow config keys
pub const ENV_PREFIX: &str = "STACKIT_";

/// Overrides the directory holding the config and credential files
pub const CONFIG_DIR_ENV: &str = "STACKIT_CONFIG_DIR";

pub const CONFIG_FILE_NAME: &str = "cli-config.json";

pub mod keys {
    pub const PROJECT_ID: &str = "project-id";
    pub const PROJECT_NAME: &str = "project-name";
    pub const REGION: &str = "region";
    pub const OUTPUT_FORMAT: &str = "output-format";
    pub const ASYNC: &str = "async";
    pub const VERBOSITY: &str = "verbosity";
    pub const SESSION_TIME_LIMIT: &str = "session-time-limit";
    pub const IDENTITY_PROVIDER_WELL_KNOWN: &str = "identity-provider-custom-well-known-configuration";
    pub const IDENTITY_PROVIDER_CLIENT_ID: &str = "identity-provider-custom-client-id";
    pub const ALLOWED_URL_DOMAIN: &str = "allowed-url-domain";
}

/// Services with an overridable base URL: (key prefix, display name)
pub const CUSTOM_ENDPOINTS: &[(&str, &str)] = &[
    ("alb", "Application Load Balancer"),
    ("authorization", "Authorization"),
    ("dns", "DNS"),
    ("iaas", "IaaS"),
    ("intake", "Intake"),
    ("jwks", "JWKS"),
    ("kms", "KMS"),
    ("load-balancer", "Load Balancer"),
    ("logme", "LogMe"),
    ("logs", "Logs"),
    ("mariadb", "MariaDB"),
    ("mongodbflex", "MongoDB Flex"),
    ("object-storage", "Object Storage"),
    ("observability", "Observability"),
    ("opensearch", "OpenSearch"),
    ("postgresflex", "PostgreSQL Flex"),
    ("rabbitmq", "RabbitMQ"),
    ("redis", "Redis"),
    ("resource-manager", "Resource Manager"),
    ("runcommand", "Run Command"),
    ("secrets-manager", "Secrets Manager"),
    ("server-osupdate", "Server OS Update"),
    ("serverbackup", "Server Backup"),
    ("service-account", "Service Account"),
    ("service-enablement", "Service Enablement"),
    ("ske", "SKE"),
    ("sqlserverflex", "SQL Server Flex"),
    ("token", "Token"),
];

const DEFAULTS: &[(&str, &str)] = &[
    (keys::ALLOWED_URL_DOMAIN, "stackit.cloud"),
    (keys::REGION, "eu01"),
    (keys::SESSION_TIME_LIMIT, "2h"),
    (keys::VERBOSITY, "info"),
];

/// Config key holding the custom endpoint for a service prefix
pub fn endpoint_key(service: &str) -> String {
    format!("{}-custom-endpoint", service)
}

/// Every key the store reads, in canonical order
pub fn known_keys() -> Vec<String> {
    let mut all: Vec<String> = [
        keys::PROJECT_ID,
        keys::PROJECT_NAME,
        keys::REGION,
        keys::OUTPUT_FORMAT,
        keys::ASYNC,
        keys::VERBOSITY,
        keys::SESSION_TIME_LIMIT,
        keys::IDENTITY_PROVIDER_WELL_KNOWN,
        keys::IDENTITY_PROVIDER_CLIENT_ID,
        keys::ALLOWED_URL_DOMAIN,
    ]
    .iter()
    .map(|k| k.to_string())
    .collect();
    all.extend(CUSTOM_ENDPOINTS.iter().map(|(svc, _)| endpoint_key(svc)));
    all
}

fn is_known(key: &str) -> bool {
    known_keys().iter().any(|k| k == key)
}

/// Name of the environment variable shadowing `key`
pub fn env_var_name(key: &str) -> String {
    format!("{}{}", ENV_PREFIX, key.to_uppercase().replace('-', "_"))
}

/// Where a resolved value came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueSource {
    File,
    Env,
    Default,
}

impl std::fmt::Display for ValueSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ValueSource::File => write!(f, "file"),
            ValueSource::Env => write!(f, "env"),
            ValueSource::Default => write!(f, "default"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ConfigStore {
    path: Option<PathBuf>,
    file: Map<String, Value>,
    env: BTreeMap<String, String>,
}

impl ConfigStore {
    /// Load from the default location, overlaid with the process environment
    pub fn load() -> Result<Self, CliError> {
        Self::load_from(Self::default_path(), |name| std::env::var(name).ok())
    }

    /// Load from an explicit file, with a caller-provided environment lookup
    pub fn load_from(
        path: Option<PathBuf>,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, CliError> {
        let file = match &path {
            Some(p) if p.exists() => read_document(p)?,
            _ => Map::new(),
        };

        let env = known_keys()
            .into_iter()
            .filter_map(|key| env(&env_var_name(&key)).map(|value| (key, value)))
            .collect();

        Ok(Self { path, file, env })
    }

    /// Empty store that is never persisted
    pub fn in_memory() -> Self {
        Self {
            path: None,
            file: Map::new(),
            env: BTreeMap::new(),
        }
    }

    /// Directory holding the config and credential files
    pub fn config_dir() -> Option<PathBuf> {
        if let Ok(dir) = std::env::var(CONFIG_DIR_ENV) {
            if !dir.is_empty() {
                return Some(PathBuf::from(dir));
            }
        }
        directories::ProjectDirs::from("cloud", "stackit", "stackit")
            .map(|dirs| dirs.config_dir().to_path_buf())
    }

    pub fn default_path() -> Option<PathBuf> {
        Self::config_dir().map(|dir| dir.join(CONFIG_FILE_NAME))
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Resolved value and its origin, without defaults
    pub fn lookup(&self, key: &str) -> Option<(String, ValueSource)> {
        if !is_known(key) {
            return None;
        }
        if let Some(value) = self.env.get(key) {
            return Some((value.clone(), ValueSource::Env));
        }
        self.file
            .get(key)
            .and_then(value_to_string)
            .map(|v| (v, ValueSource::File))
    }

    /// Resolved value, falling back to the built-in default
    pub fn lookup_or_default(&self, key: &str) -> Option<(String, ValueSource)> {
        self.lookup(key).or_else(|| {
            DEFAULTS
                .iter()
                .find(|(k, _)| *k == key)
                .map(|(_, v)| (v.to_string(), ValueSource::Default))
        })
    }

    /// Non-empty resolved value (empty strings count as unset)
    pub fn get(&self, key: &str) -> Option<String> {
        self.lookup_or_default(key)
            .map(|(v, _)| v)
            .filter(|v| !v.is_empty())
    }

    pub fn get_bool(&self, key: &str) -> bool {
        self.get(key)
            .map(|v| matches!(v.to_ascii_lowercase().as_str(), "true" | "1" | "yes"))
            .unwrap_or(false)
    }

    pub fn project_id(&self) -> Option<String> {
        self.get(keys::PROJECT_ID)
    }

    pub fn project_name(&self) -> Option<String> {
        self.get(keys::PROJECT_NAME)
    }

    pub fn region(&self) -> Option<String> {
        self.get(keys::REGION)
    }

    pub fn session_time_limit(&self) -> String {
        self.get(keys::SESSION_TIME_LIMIT)
            .unwrap_or_else(|| "2h".to_string())
    }

    /// Allowed domain for `curl`; empty means any domain
    pub fn allowed_url_domain(&self) -> String {
        self.lookup_or_default(keys::ALLOWED_URL_DOMAIN)
            .map(|(v, _)| v)
            .unwrap_or_default()
    }

    /// Custom endpoint for a service prefix such as `dns`
    pub fn custom_endpoint(&self, service: &str) -> Option<String> {
        self.get(&endpoint_key(service))
    }

    /// All known keys that currently resolve, sorted by key
    pub fn entries(&self, include_defaults: bool) -> Vec<(String, String, ValueSource)> {
        let mut out: Vec<_> = known_keys()
            .into_iter()
            .filter_map(|key| {
                let resolved = if include_defaults {
                    self.lookup_or_default(&key)
                } else {
                    self.lookup(&key)
                };
                resolved.map(|(value, source)| (key, value, source))
            })
            .collect();
        out.sort_by(|a, b| a.0.cmp(&b.0));
        out
    }

    /// Stage a value for the next `save`
    ///
    /// Setting the project id drops the cached project name.
    pub fn set(&mut self, key: &str, value: Value) {
        if key == keys::PROJECT_ID {
            self.file.remove(keys::PROJECT_NAME);
        }
        self.file.insert(key.to_string(), value);
    }

    pub fn set_string(&mut self, key: &str, value: impl Into<String>) {
        self.set(key, Value::String(value.into()));
    }

    /// Stage a key removal for the next `save`
    pub fn unset(&mut self, key: &str) {
        if key == keys::PROJECT_ID {
            self.file.remove(keys::PROJECT_NAME);
        }
        self.file.remove(key);
    }

    /// Raw file document, unknown keys included
    pub fn document(&self) -> &Map<String, Value> {
        &self.file
    }

    /// Atomically write the file document back to disk
    pub fn save(&self) -> Result<(), CliError> {
        let path = self.path.as_ref().ok_or_else(|| {
            CliError::io(
                "write config file",
                std::io::Error::new(std::io::ErrorKind::NotFound, "no config directory"),
            )
        })?;
        write_document(path, &self.file)
    }
}

fn value_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn read_document(path: &Path) -> Result<Map<String, Value>, CliError> {
    let content =
        std::fs::read_to_string(path).map_err(|e| CliError::io("read config file", e))?;
    if content.trim().is_empty() {
        return Ok(Map::new());
    }
    match serde_json::from_str::<Value>(&content) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(Value::Null) => Ok(Map::new()),
        Ok(_) => Err(CliError::decode(
            format!("read config file {}", path.display()),
            "expected a JSON object",
        )),
        Err(e) => Err(CliError::decode(
            format!("read config file {}", path.display()),
            e,
        )),
    }
}

/// Serialize the document and swap it in with `replace_file`
fn write_document(path: &Path, document: &Map<String, Value>) -> Result<(), CliError> {
    let mut body = serde_json::to_string_pretty(document)
        .map_err(|e| CliError::decode("encode config file", e))?;
    body.push('\n');
    // never rename something we could not read back
    serde_json::from_str::<Value>(&body).map_err(|e| CliError::decode("encode config file", e))?;
    replace_file(path, |out| out.write_all(body.as_bytes()))
}

/// Write to a temp file next to `path`, then rename over it
///
/// On any failure the temp file is removed and `path` keeps its old bytes.
fn replace_file(
    path: &Path,
    write: impl FnOnce(&mut std::fs::File) -> std::io::Result<()>,
) -> Result<(), CliError> {
    let dir = path
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."));
    std::fs::create_dir_all(&dir).map_err(|e| CliError::io("create config directory", e))?;

    let mut tmp = tempfile::NamedTempFile::new_in(&dir)
        .map_err(|e| CliError::io("create temporary config file", e))?;
    write(tmp.as_file_mut()).map_err(|e| CliError::io("write temporary config file", e))?;
    tmp.as_file()
        .sync_all()
        .map_err(|e| CliError::io("flush temporary config file", e))?;
    tmp.persist(path)
        .map_err(|e| CliError::io("replace config file", e.error))?;
    Ok(())
}
