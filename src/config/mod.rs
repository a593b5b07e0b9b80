//! Configuration module
//!
//! `ime.yaml` maps `(project, environment)` pairs to a parameter store prefix
//! and a local env file:
//!
//! ```yaml
//! global_prefix: /acme
//! projects:
//!   billing:
//!     prefix: /billing
//!     environments:
//!       dev:
//!         prefix: /dev
//!         local_path: $HOME/billing/.env.dev
//! ```
//!
//! The store path for `billing`/`dev` is `/acme/billing/dev`.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::remote::{DEFAULT_TIMEOUT, MAX_PAGE_SIZE};

pub const CONFIG_FILE_NAME: &str = "ime.yaml";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("no ime.yaml found in the current directory or ~/.ime")]
    NotFound,

    #[error("failed to read {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("{owner} prefix {prefix:?} {reason}")]
    InvalidPrefix {
        owner: String,
        prefix: String,
        reason: &'static str,
    },

    #[error("aws.timeout_secs must be at least 1")]
    InvalidTimeout,

    #[error("project {0} not found")]
    ProjectNotFound(String),

    #[error("environment {environment} not found in project {project}")]
    EnvironmentNotFound {
        project: String,
        environment: String,
    },
}

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub global_prefix: String,

    #[serde(default)]
    pub aws: AwsConfig,

    #[serde(default)]
    pub projects: BTreeMap<String, Project>,

    /// File this config was read from
    #[serde(skip)]
    source: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Project {
    pub prefix: String,

    #[serde(default)]
    pub environments: BTreeMap<String, Environment>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Environment {
    pub prefix: String,
    pub local_path: String,
}

impl Environment {
    /// Local path with `$VAR` / `${VAR}` expanded from the process environment
    pub fn resolved_local_path(&self) -> PathBuf {
        PathBuf::from(expand_env(&self.local_path))
    }
}

/// Remote store settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AwsConfig {
    /// Region override (default: the SDK's own resolution)
    #[serde(default)]
    pub region: Option<String>,

    /// Named profile from ~/.aws/config
    #[serde(default)]
    pub profile: Option<String>,

    /// Endpoint override, e.g. a local emulator
    #[serde(default)]
    pub endpoint_url: Option<String>,

    /// Timeout for each remote call
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    #[serde(default = "default_page_size")]
    pub page_size: usize,
}

impl Default for AwsConfig {
    fn default() -> Self {
        Self {
            region: None,
            profile: None,
            endpoint_url: None,
            timeout_secs: default_timeout_secs(),
            page_size: default_page_size(),
        }
    }
}

impl AwsConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

fn default_timeout_secs() -> u64 {
    DEFAULT_TIMEOUT.as_secs()
}

fn default_page_size() -> usize {
    MAX_PAGE_SIZE
}

/// Everything a command needs to address one environment
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedEnvironment {
    pub project: String,
    pub environment: String,
    pub prefix: String,
    pub local_path: PathBuf,
}

impl Config {
    /// Load config from `explicit`, or from the default locations
    pub fn load(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        if let Some(path) = explicit {
            return Self::load_from(path);
        }

        let local = PathBuf::from(CONFIG_FILE_NAME);
        if local.is_file() {
            return Self::load_from(&local);
        }

        if let Some(global) = Self::global_config_path() {
            if global.is_file() {
                return Self::load_from(&global);
            }
        }

        Err(ConfigError::NotFound)
    }

    /// Load and validate config from a specific file
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        let mut config: Config =
            serde_yaml::from_str(&content).map_err(|source| ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            })?;
        config.source = Some(path.to_path_buf());
        config.validate()?;

        Ok(config)
    }

    /// Global config path (~/.ime/ime.yaml)
    pub fn global_config_path() -> Option<PathBuf> {
        directories::UserDirs::new().map(|u| u.home_dir().join(".ime").join(CONFIG_FILE_NAME))
    }

    /// File this config was loaded from, if any
    pub fn source(&self) -> Option<&Path> {
        self.source.as_deref()
    }

    /// Check every prefix is a well-formed path segment run and the remote
    /// timeout is usable
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.aws.timeout_secs == 0 {
            return Err(ConfigError::InvalidTimeout);
        }

        check_prefix("global", &self.global_prefix)?;

        for (project_name, project) in &self.projects {
            check_prefix(&format!("project {}", project_name), &project.prefix)?;

            for (env_name, env) in &project.environments {
                check_prefix(
                    &format!("environment {} in project {}", env_name, project_name),
                    &env.prefix,
                )?;
            }
        }

        Ok(())
    }

    pub fn project(&self, project: &str) -> Result<&Project, ConfigError> {
        self.projects
            .get(project)
            .ok_or_else(|| ConfigError::ProjectNotFound(project.to_string()))
    }

    pub fn environment(&self, project: &str, environment: &str) -> Result<&Environment, ConfigError> {
        self.project(project)?
            .environments
            .get(environment)
            .ok_or_else(|| ConfigError::EnvironmentNotFound {
                project: project.to_string(),
                environment: environment.to_string(),
            })
    }

    /// Parameter store path for an environment
    pub fn parameter_path(&self, project: &str, environment: &str) -> Result<String, ConfigError> {
        let env = self.environment(project, environment)?;
        let prj = self.project(project)?;

        Ok(format!("{}{}{}", self.global_prefix, prj.prefix, env.prefix))
    }

    pub fn resolve(&self, project: &str, environment: &str) -> Result<ResolvedEnvironment, ConfigError> {
        let env = self.environment(project, environment)?;

        Ok(ResolvedEnvironment {
            project: project.to_string(),
            environment: environment.to_string(),
            prefix: self.parameter_path(project, environment)?,
            local_path: env.resolved_local_path(),
        })
    }
}

fn check_prefix(owner: &str, prefix: &str) -> Result<(), ConfigError> {
    let reason = if !prefix.starts_with('/') {
        "must start with '/'"
    } else if prefix.ends_with('/') {
        "must not end with '/'"
    } else {
        return Ok(());
    };

    Err(ConfigError::InvalidPrefix {
        owner: owner.to_string(),
        prefix: prefix.to_string(),
        reason,
    })
}

/// Expand `$VAR` and `${VAR}`; unset variables expand to nothing
pub fn expand_env(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut rest = input;

    while let Some(pos) = rest.find('$') {
        out.push_str(&rest[..pos]);
        let after = &rest[pos + 1..];

        if let Some(braced) = after.strip_prefix('{') {
            if let Some(end) = braced.find('}') {
                out.push_str(&std::env::var(&braced[..end]).unwrap_or_default());
                rest = &braced[end + 1..];
                continue;
            }
        }

        let len = after
            .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
            .unwrap_or(after.len());
        if len == 0 {
            out.push('$');
        } else {
            out.push_str(&std::env::var(&after[..len]).unwrap_or_default());
        }
        rest = &after[len..];
    }

    out.push_str(rest);
    out
}
