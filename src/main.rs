// src/main.rs

use axum::serve;
use clap::Parser;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::signal;
use tracing::{error, info};
use tracing_appender::rolling;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::{fmt, EnvFilter, Registry};

use ads_mediation::api::{router, AppState};
use ads_mediation::bootstrap::build_orchestrator;
use ads_mediation::config::ConfigManager;
use ads_mediation::logging::ActionJournal;
use ads_mediation::model::adapters::{ConfigAdapter, FileConfigAdapter};
use ads_mediation::service::AdsService;
use ads_mediation::AdsResult;

#[derive(Parser, Debug)]
#[command(version = "0.1", about = "Ad placement mediation server")]
struct CliArgs {
    #[arg(short, long, default_value = "static/ads_config.json")]
    config: String,
    #[arg(short, long, default_value_t = 8080)]
    port: u16,
    #[arg(long, default_value = "logs")]
    log_dir: String,
    /// 逗号分隔的广告平台顺序，覆盖 `default_provider`
    #[arg(long)]
    providers: Option<String>,
}

#[tokio::main]
async fn main() {
    let args = CliArgs::parse();

    // 初始化全局 tracing 日志
    let log_file = rolling::hourly(&args.log_dir, "ads_mediation.json");
    let (non_blocking, _guard) = tracing_appender::non_blocking(log_file);
    let subscriber = Registry::default()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer().json().with_writer(non_blocking));
    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Unable to set global tracing subscriber: {}", e);
        return;
    }

    if let Err(e) = run(args).await {
        error!(error = %e, "ads mediation server failed");
        eprintln!("ads mediation server failed: {}", e);
        std::process::exit(1);
    }
}

async fn run(args: CliArgs) -> AdsResult<()> {
    info!(config = %args.config, port = args.port, "ads mediation server starting");

    // 使用 FileConfigAdapter 读取广告配置
    let configuration = FileConfigAdapter::new(&args.config).load()?;
    let mut config = ConfigManager::new(configuration)?;
    if let Some(order) = &args.providers {
        config = config.with_provider_order(order)?;
    }
    info!(placements = config.registry().len(), "placements registered");

    // 构建广告编排器，并把行为流接入日志
    let orchestrator = Arc::new(build_orchestrator(&config)?);
    let journal = ActionJournal::new(&args.log_dir, "ads", 1000, 100, 1000);
    journal.attach(orchestrator.actions());

    orchestrator.validate_integration();
    tokio::spawn({
        let orchestrator = orchestrator.clone();
        async move { orchestrator.load_ads().await }
    });

    let app = router(AppState {
        orchestrator: orchestrator.clone(),
    });
    let addr = format!("0.0.0.0:{}", args.port);
    let listener = TcpListener::bind(&addr).await?;
    info!(%addr, "ads mediation server listening");

    serve(listener, app)
        .with_graceful_shutdown(async {
            if let Err(e) = signal::ctrl_c().await {
                error!(error = %e, "failed to listen for shutdown signal");
            }
        })
        .await?;

    info!("shutting down gracefully");
    orchestrator.dispose();
    journal.shutdown().await;
    info!("ads mediation server shut down");
    Ok(())
}
