use actix_web::{
    App, HttpServer,
    web::{self, Data},
};
use anyhow::{Context, Result};
use env_logger::{Builder, Env, Target};
use log::{debug, error, info};
use printbeam_agent::{
    api::Api, cloud_client::PrintBeamCloudClient, config::AppConfig, context::AgentContext,
    error_stats::ErrorStats, reporter::LogReporter, settings::Settings,
};
use std::{io::Write, sync::Arc};
use tokio::signal::unix::{SignalKind, signal};

type AgentApi = Api<PrintBeamCloudClient>;

#[actix_web::main]
async fn main() {
    if let Err(e) = run().await {
        error!("application error: {e:#}");
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    initialize();

    let config = AppConfig::get();

    let settings =
        Settings::load(&config.paths.settings_file).context("failed to load settings store")?;
    let error_stats = ErrorStats::default();
    let cloud =
        PrintBeamCloudClient::new(&config.cloud.base_url, settings.clone(), error_stats.clone())
            .context("failed to create cloud client")?;

    let ctx = Arc::new(AgentContext::new(
        settings,
        Some(cloud),
        Arc::new(LogReporter),
        error_stats,
    ));
    let api = Data::new(Api { ctx });

    info!("listening on port {}", config.server.port);

    let server = HttpServer::new(move || {
        App::new()
            .app_data(api.clone())
            .route("/api/command", web::post().to(AgentApi::command))
            .route("/api/commands", web::get().to(AgentApi::commands))
            .route("/version", web::get().to(AgentApi::version))
    })
    .bind(("0.0.0.0", config.server.port))
    .context("failed to bind server port")?
    .disable_signals()
    .run();

    let server_handle = server.handle();
    let server_task = tokio::spawn(server);

    let mut sigterm =
        signal(SignalKind::terminate()).context("failed to install SIGTERM handler")?;

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            debug!("ctrl-c");
            server_handle.stop(true).await;
        },
        _ = sigterm.recv() => {
            debug!("sigterm");
            server_handle.stop(true).await;
        },
        _ = server_task => {
            debug!("server stopped");
        },
    }

    debug!("good bye");
    Ok(())
}

fn initialize() {
    log_panics::init();

    let mut builder = if cfg!(debug_assertions) {
        Builder::from_env(Env::default().default_filter_or("debug"))
    } else {
        Builder::from_env(Env::default().default_filter_or("info"))
    };

    builder.format(|f, record| match record.level() {
        log::Level::Error => {
            eprintln!("{}", record.args());
            Ok(())
        }
        _ => {
            writeln!(f, "{}", record.args())
        }
    });

    builder.target(Target::Stdout).init();

    info!("agent version: {}", env!("CARGO_PKG_VERSION"));
}
