use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;
use thiserror::Error;
use uuid::Uuid;
use validator::Validate;

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Missing required setting: {0}")]
    Missing(&'static str),

    #[error("Parse error for {field}: {value} - {source}")]
    Parse {
        field: String,
        value: String,
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("Validation error: {0}")]
    Validation(#[from] validator::ValidationErrors),
}

/// Client configuration with validation
#[derive(Clone, Debug, Validate, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Base URL of the Deita API, including the version prefix (e.g. `http://localhost:8000/v1`)
    #[validate(url(message = "API URL must be an absolute URL"))]
    pub api_url: String,

    /// Workspace whose files and saved queries are used
    pub workspace_id: Uuid,

    /// Bearer token sent with every request, if any
    #[serde(default)]
    pub api_token: Option<String>,

    /// Directory that CSV exports are written to
    #[serde(default = "default_export_dir")]
    pub export_dir: PathBuf,

    /// Transport-level request timeout (1-3600 seconds)
    #[validate(range(
        min = 1,
        max = 3600,
        message = "Request timeout must be between 1 and 3600 seconds"
    ))]
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

fn default_export_dir() -> PathBuf {
    PathBuf::from(".")
}

fn default_request_timeout_secs() -> u64 {
    60
}

impl ClientConfig {
    pub fn new(api_url: impl Into<String>, workspace_id: Uuid) -> Self {
        Self {
            api_url: api_url.into(),
            workspace_id,
            api_token: None,
            export_dir: default_export_dir(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }

    /// Create configuration from environment variables with validation.
    ///
    /// `.env` in the working directory is loaded first when present.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let workspace = env::var("DEITA_WORKSPACE_ID")
            .map_err(|_| ConfigError::Missing("DEITA_WORKSPACE_ID"))?;

        let config = Self {
            api_url: env::var("DEITA_API_URL")
                .unwrap_or_else(|_| "http://localhost:8000/v1".to_string()),
            workspace_id: parse_value("DEITA_WORKSPACE_ID", &workspace)?,
            api_token: env::var("DEITA_API_TOKEN").ok().filter(|t| !t.is_empty()),
            export_dir: env::var("DEITA_EXPORT_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| default_export_dir()),
            request_timeout_secs: parse_env_var("DEITA_REQUEST_TIMEOUT_SECS", "60")?,
        };

        config.check()?;
        Ok(config)
    }

    /// Create configuration from CLI arguments with validation
    pub fn from_cli(cli: CliConfig) -> Result<Self, ConfigError> {
        let workspace = cli
            .workspace_id
            .ok_or(ConfigError::Missing("workspace id"))?;

        let config = Self {
            api_url: cli
                .api_url
                .unwrap_or_else(|| "http://localhost:8000/v1".to_string()),
            workspace_id: parse_value("workspace", &workspace)?,
            api_token: cli.api_token,
            export_dir: cli.export_dir.unwrap_or_else(default_export_dir),
            request_timeout_secs: cli
                .request_timeout_secs
                .unwrap_or_else(default_request_timeout_secs),
        };

        config.check()?;
        Ok(config)
    }

    /// Create configuration from YAML file
    pub fn from_yaml_file<P: AsRef<std::path::Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Parse {
            field: "yaml_file".to_string(),
            value: "file read failed".to_string(),
            source: Box::new(e),
        })?;

        let config: Self = serde_yaml::from_str(&content).map_err(|e| ConfigError::Parse {
            field: "yaml_content".to_string(),
            value: content,
            source: Box::new(e),
        })?;

        config.check()?;
        Ok(config)
    }

    /// Merge CLI-provided values over this configuration.
    pub fn merge(&mut self, cli: CliConfig) -> Result<(), ConfigError> {
        if let Some(api_url) = cli.api_url {
            self.api_url = api_url;
        }
        if let Some(workspace) = cli.workspace_id {
            self.workspace_id = parse_value("workspace", &workspace)?;
        }
        if cli.api_token.is_some() {
            self.api_token = cli.api_token;
        }
        if let Some(export_dir) = cli.export_dir {
            self.export_dir = export_dir;
        }
        if let Some(timeout) = cli.request_timeout_secs {
            self.request_timeout_secs = timeout;
        }
        self.check()
    }

    fn check(&self) -> Result<(), ConfigError> {
        self.validate()?;
        if self.export_dir.as_os_str().is_empty() {
            return Err(ConfigError::Parse {
                field: "export_dir".to_string(),
                value: String::new(),
                source: "export directory cannot be empty".into(),
            });
        }
        Ok(())
    }

    /// API URL without trailing slashes, ready for path joining
    pub fn api_base(&self) -> &str {
        self.api_url.trim_end_matches('/')
    }
}

/// CLI configuration (parsed from command line arguments). `None` means not given.
#[derive(Clone, Debug, Default)]
pub struct CliConfig {
    pub api_url: Option<String>,
    pub workspace_id: Option<String>,
    pub api_token: Option<String>,
    pub export_dir: Option<PathBuf>,
    pub request_timeout_secs: Option<u64>,
}

/// Parse an environment variable with a default value
fn parse_env_var<T: std::str::FromStr>(key: &str, default: &str) -> Result<T, ConfigError>
where
    T::Err: std::error::Error + Send + Sync + 'static,
{
    let value = env::var(key).unwrap_or_else(|_| default.to_string());
    parse_value(key, &value)
}

fn parse_value<T: std::str::FromStr>(field: &str, value: &str) -> Result<T, ConfigError>
where
    T::Err: std::error::Error + Send + Sync + 'static,
{
    value.trim().parse().map_err(|e| ConfigError::Parse {
        field: field.to_string(),
        value: value.to_string(),
        source: Box::new(e),
    })
}
