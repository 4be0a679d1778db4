//! Configuration loaded from the environment.
//!
//! `.env` files are honored through `dotenvy` by the binary before
//! [`Config::from_env`] runs. CLI flags override what is read here.

use std::path::PathBuf;
use std::str::FromStr;

use crate::error::ConfigError;
use crate::runner::DEFAULT_BUNDLE_NAME;

const DEFAULT_SIMULATIONS_ROOT: &str = "./simulation_files";
const DEFAULT_HOST: &str = "0.0.0.0";
const DEFAULT_PORT: u16 = 8000;

/// Top-level configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Directory holding one working directory per simulation.
    pub simulations_root: PathBuf,
    pub runner: RunnerConfig,
    pub http: HttpConfig,
}

/// External runner settings.
#[derive(Debug, Clone)]
pub struct RunnerConfig {
    /// Program launched for each run. Required to serve.
    pub program: Option<PathBuf>,
    pub args: Vec<String>,
    pub bundle_name: String,
}

/// HTTP listener settings.
#[derive(Debug, Clone)]
pub struct HttpConfig {
    pub host: String,
    pub port: u16,
}

impl HttpConfig {
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            simulations_root: PathBuf::from(DEFAULT_SIMULATIONS_ROOT),
            runner: RunnerConfig {
                program: None,
                args: Vec::new(),
                bundle_name: DEFAULT_BUNDLE_NAME.to_string(),
            },
            http: HttpConfig {
                host: DEFAULT_HOST.to_string(),
                port: DEFAULT_PORT,
            },
        }
    }
}

impl Config {
    /// Load configuration from `SIMFORGE_*` environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let defaults = Self::default();

        let bundle_name = get("SIMFORGE_BUNDLE_NAME").unwrap_or(defaults.runner.bundle_name);
        if bundle_name.contains(['/', '\\']) {
            return Err(ConfigError::InvalidValue {
                key: "SIMFORGE_BUNDLE_NAME".to_string(),
                message: "must be a plain file name".to_string(),
            });
        }

        Ok(Self {
            simulations_root: get("SIMFORGE_SIMULATIONS_ROOT")
                .map(PathBuf::from)
                .unwrap_or(defaults.simulations_root),
            runner: RunnerConfig {
                program: get("SIMFORGE_RUNNER_PROGRAM").map(PathBuf::from),
                args: get("SIMFORGE_RUNNER_ARGS")
                    .map(|s| s.split_whitespace().map(String::from).collect())
                    .unwrap_or_default(),
                bundle_name,
            },
            http: HttpConfig {
                host: get("SIMFORGE_HOST").unwrap_or(defaults.http.host),
                port: parse_optional(&get, "SIMFORGE_PORT")?.unwrap_or(defaults.http.port),
            },
        })
    }

    /// The runner program, or an error naming the missing variable.
    pub fn require_runner_program(&self) -> Result<&PathBuf, ConfigError> {
        self.runner
            .program
            .as_ref()
            .ok_or_else(|| ConfigError::MissingRequired {
                key: "SIMFORGE_RUNNER_PROGRAM".to_string(),
            })
    }
}

fn parse_optional<T, F>(get: &F, key: &str) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    F: Fn(&str) -> Option<String>,
{
    get(key)
        .map(|raw| {
            raw.trim().parse::<T>().map_err(|e| ConfigError::InvalidValue {
                key: key.to_string(),
                message: e.to_string(),
            })
        })
        .transpose()
}
