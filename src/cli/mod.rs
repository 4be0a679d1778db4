//! Command-line interface.

mod config;

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

use crate::config::Config;

pub use config::{ConfigCommand, run_config_command};

#[derive(Parser, Debug)]
#[command(name = "simforge")]
#[command(version, about = "Create, run, monitor, and delete external simulation jobs")]
pub struct Cli {
    /// Log output format
    #[arg(long, global = true, env = "SIMFORGE_LOG_FORMAT", value_enum, default_value_t = LogFormat::Pretty)]
    pub log_format: LogFormat,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Serve the simulation API
    Serve(ServeArgs),

    /// Inspect the resolved configuration
    #[command(subcommand)]
    Config(ConfigCommand),
}

/// Flags overriding the environment for `serve`.
#[derive(Args, Debug, Clone, Default)]
pub struct ServeArgs {
    /// Address to bind
    #[arg(long)]
    pub host: Option<String>,

    /// Port to bind
    #[arg(long)]
    pub port: Option<u16>,

    /// Directory holding the simulation working directories
    #[arg(long)]
    pub root: Option<PathBuf>,

    /// External program launched for each run
    #[arg(long)]
    pub runner: Option<PathBuf>,

    /// Argument passed to the runner program (repeatable)
    #[arg(long = "runner-arg", allow_hyphen_values = true)]
    pub runner_args: Vec<String>,
}

impl ServeArgs {
    pub fn apply(&self, config: &mut Config) {
        if let Some(host) = &self.host {
            config.http.host = host.clone();
        }
        if let Some(port) = self.port {
            config.http.port = port;
        }
        if let Some(root) = &self.root {
            config.simulations_root = root.clone();
        }
        if let Some(runner) = &self.runner {
            config.runner.program = Some(runner.clone());
        }
        if !self.runner_args.is_empty() {
            config.runner.args = self.runner_args.clone();
        }
    }
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}
