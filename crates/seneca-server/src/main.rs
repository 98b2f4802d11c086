use anyhow::{Context, Result};
use clap::{value_parser, Arg, ArgAction, ArgMatches, Command};
use seneca_buffer::FsBufferStore;
use seneca_core::{
    Analysis, AnalysisController, PatchBus, RoutineSupervisor, SenecaConfig, StatusLog,
};
use seneca_server::{create_router, inspect, logging, AppState};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Command::new("seneca")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Live analysis panel: routine results streamed to the browser")
        .subcommand_required(true)
        .arg_required_else_help(true)
        .subcommand(
            Command::new("serve")
                .about("Run the analysis server")
                .arg(
                    Arg::new("config")
                        .long("config")
                        .short('c')
                        .value_parser(value_parser!(PathBuf))
                        .help("TOML configuration file"),
                )
                .arg(
                    Arg::new("bind")
                        .long("bind")
                        .help("Listen address, overrides the configuration"),
                )
                .arg(
                    Arg::new("period")
                        .long("period")
                        .value_parser(value_parser!(f64))
                        .help("Seconds between analysis ticks"),
                )
                .arg(
                    Arg::new("plot-data")
                        .long("plot-data")
                        .value_parser(value_parser!(PathBuf))
                        .help("Directory holding routine buffers"),
                )
                .arg(
                    Arg::new("routines")
                        .long("routines")
                        .value_parser(value_parser!(PathBuf))
                        .help("Directory holding routine scripts"),
                )
                .arg(
                    Arg::new("json")
                        .long("json")
                        .action(ArgAction::SetTrue)
                        .help("Log as JSON lines"),
                ),
        )
        .subcommand(
            Command::new("inspect")
                .about("Summarize buffers without consuming them")
                .arg(
                    Arg::new("dir")
                        .required(true)
                        .value_parser(value_parser!(PathBuf))
                        .help("Buffer directory"),
                )
                .arg(
                    Arg::new("json")
                        .long("json")
                        .action(ArgAction::SetTrue)
                        .help("Output as JSON"),
                ),
        );

    let matches = cli.get_matches();

    match matches.subcommand() {
        Some(("serve", sub)) => {
            logging::init(sub.get_flag("json"));
            serve(load_config(sub)?).await
        }
        Some(("inspect", sub)) => {
            let dir = sub
                .get_one::<PathBuf>("dir")
                .context("missing buffer directory")?;
            let summaries = inspect::inspect_dir(dir)
                .with_context(|| format!("inspecting {}", dir.display()))?;
            if sub.get_flag("json") {
                println!("{}", serde_json::to_string_pretty(&summaries)?);
            } else {
                print!("{}", inspect::render_text(&summaries));
            }
            Ok(())
        }
        _ => unreachable!("subcommand_required"),
    }
}

fn load_config(matches: &ArgMatches) -> Result<SenecaConfig> {
    let mut config = match matches.get_one::<PathBuf>("config") {
        Some(path) => SenecaConfig::load(path)
            .with_context(|| format!("loading configuration from {}", path.display()))?,
        None => SenecaConfig::default(),
    };
    if let Some(bind) = matches.get_one::<String>("bind") {
        config = config.with_bind(bind.clone());
    }
    if let Some(period) = matches.get_one::<f64>("period") {
        config = config.with_period_secs(*period);
    }
    if let Some(dir) = matches.get_one::<PathBuf>("plot-data") {
        config = config.with_plot_data_dir(dir.clone());
    }
    if let Some(dir) = matches.get_one::<PathBuf>("routines") {
        config = config.with_upload_dir(dir.clone());
    }
    config.validate()?;
    Ok(config)
}

async fn serve(config: SenecaConfig) -> Result<()> {
    std::fs::create_dir_all(&config.upload_dir)
        .with_context(|| format!("creating {}", config.upload_dir.display()))?;
    let store = FsBufferStore::open(&config.plot_data_dir)
        .with_context(|| format!("opening {}", config.plot_data_dir.display()))?;

    let log = match &config.status_log {
        Some(path) => StatusLog::new(path)?,
        None => StatusLog::disabled(),
    };
    let bus = PatchBus::new(Arc::new(log));
    let controller = Arc::new(AnalysisController::new(
        Arc::new(Analysis::new(store)),
        bus.clone(),
        config.period()?,
    ));
    let routines = RoutineSupervisor::local(&config, bus.clone());
    let app = create_router(Arc::new(AppState {
        controller,
        routines,
        bus,
    }));

    let listener = tokio::net::TcpListener::bind(&config.bind)
        .await
        .with_context(|| format!("binding {}", config.bind))?;
    info!(
        bind = %config.bind,
        plot_data = %config.plot_data_dir.display(),
        routines = %config.upload_dir.display(),
        period_secs = config.period_secs,
        "listening"
    );
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "ctrl-c handler unavailable");
        std::future::pending::<()>().await;
    }
    info!("shutting down");
}
