//! Configuration inspection commands.

use clap::Subcommand;

use crate::config::Config;

#[derive(Subcommand, Debug, Clone)]
pub enum ConfigCommand {
    /// List the resolved configuration
    List {
        /// Show only keys matching this prefix (e.g., "runner", "http")
        #[arg(short, long)]
        filter: Option<String>,
    },

    /// Get a single resolved value
    Get {
        /// Key (e.g., "runner.program")
        key: String,
    },
}

/// Run a config command against the resolved configuration.
pub fn run_config_command(cmd: ConfigCommand, config: &Config) -> anyhow::Result<()> {
    match cmd {
        ConfigCommand::List { filter } => list_config(config, filter),
        ConfigCommand::Get { key } => get_config(config, &key),
    }
}

fn list_config(config: &Config, filter: Option<String>) -> anyhow::Result<()> {
    let all = entries(config);
    let max_key_len = all.iter().map(|(k, _)| k.len()).max().unwrap_or(0);

    println!("Configuration:");
    println!();

    for (key, value) in all {
        if let Some(ref f) = filter
            && !key.starts_with(f.as_str())
        {
            continue;
        }
        println!("  {:width$}  {}", key, value, width = max_key_len);
    }

    Ok(())
}

fn get_config(config: &Config, key: &str) -> anyhow::Result<()> {
    match lookup(config, key) {
        Some(value) => {
            println!("{}", value);
            Ok(())
        }
        None => anyhow::bail!("Unknown configuration key: {}", key),
    }
}

fn lookup(config: &Config, key: &str) -> Option<String> {
    entries(config)
        .into_iter()
        .find(|(k, _)| *k == key)
        .map(|(_, v)| v)
}

fn entries(config: &Config) -> Vec<(&'static str, String)> {
    vec![
        (
            "simulations_root",
            config.simulations_root.display().to_string(),
        ),
        (
            "runner.program",
            config
                .runner
                .program
                .as_ref()
                .map(|p| p.display().to_string())
                .unwrap_or_else(|| "(unset)".to_string()),
        ),
        ("runner.args", config.runner.args.join(" ")),
        ("runner.bundle_name", config.runner.bundle_name.clone()),
        ("http.host", config.http.host.clone()),
        ("http.port", config.http.port.to_string()),
    ]
}
