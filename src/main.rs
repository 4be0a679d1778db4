use std::sync::Arc;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use simforge::api::SimulationApi;
use simforge::cli::{Cli, Command, LogFormat, run_config_command};
use simforge::config::Config;
use simforge::runner::ProcessRunner;
use simforge::simulation::SimulationManager;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();

    init_tracing(cli.log_format);

    let mut config = Config::from_env()?;

    match cli.command {
        Command::Serve(args) => {
            args.apply(&mut config);
            serve(config).await
        }
        Command::Config(cmd) => run_config_command(cmd, &config),
    }
}

fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("simforge=info,tower_http=info"));

    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    match format {
        LogFormat::Pretty => builder.init(),
        LogFormat::Json => builder.json().init(),
    }
}

async fn serve(config: Config) -> anyhow::Result<()> {
    let program = config.require_runner_program()?.clone();

    tokio::fs::create_dir_all(&config.simulations_root).await?;
    let simulations_root = tokio::fs::canonicalize(&config.simulations_root).await?;

    let runner = ProcessRunner::new(program)
        .with_args(config.runner.args.clone())
        .with_bundle_name(config.runner.bundle_name.clone());

    tracing::info!(
        root = %simulations_root.display(),
        program = %runner.program().display(),
        "Starting simforge"
    );

    let manager = Arc::new(SimulationManager::new(simulations_root, Arc::new(runner)));

    SimulationApi::serve(manager, &config.http.addr(), async {
        let _ = tokio::signal::ctrl_c().await;
        tracing::info!("Shutdown requested");
    })
    .await
    .map_err(|e| anyhow::anyhow!("{}", e))?;

    Ok(())
}
