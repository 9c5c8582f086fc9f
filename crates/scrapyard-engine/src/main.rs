use anyhow::Context;
use clap::Parser;
use tracing::{error, info};

use scrapyard_container::ContainerManager;
use scrapyard_engine::{config, logging, Cli, TargetEngine, WebController};
use scrapyard_proxy::ProxyPool;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let run_config = config::load_config(&cli.config_path(), cli.config_format)
        .with_context(|| format!("failed to load config for target type '{}'", cli.target_type))?;

    config::run_preflight_checks(&run_config)
        .await
        .context("preflight checks failed")?;

    let _logging_guard = logging::init(&run_config.logging.log_dir, cli.debug)
        .context("failed to initialize logging")?;

    if cli.profiling {
        info!("profiling requested, emitting a single startup profile marker");
    }

    info!(target_type = %cli.target_type, "scrapyard starting");

    let result = run(run_config).await;

    match &result {
        Ok(()) => info!("scrapyard finished"),
        Err(e) => error!(error = %e, "scrapyard exited with an error"),
    }

    result
}

async fn run(run_config: scrapyard_engine::RunConfig) -> anyhow::Result<()> {
    let proxy_pool = ProxyPool::init(run_config.proxy).await.context("failed to initialize proxy pool")?;
    let container_manager = ContainerManager::connect().context("failed to connect to docker daemon")?;

    let controller = WebController::new(
        proxy_pool,
        container_manager,
        run_config.docker,
        run_config.driver,
    );

    let targets = run_config.target;
    let engine = TargetEngine::new(targets.clone());

    controller
        .run(&targets, |controller| async move {
            engine.execute(&controller).await;
            (controller, ())
        })
        .await;

    Ok(())
}
