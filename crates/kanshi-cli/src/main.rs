mod args;

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tokio::net::TcpListener;
use tokio::sync::RwLock;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use kanshi_api::douban::DoubanClient;
use kanshi_api::traits::MediaServer;
use kanshi_api::{DownloaderClient, MediaServerClient};
use kanshi_core::config::AppConfig;
use kanshi_core::rank::history::delete_history_entry;
use kanshi_runtime::server::{self, AppState};
use kanshi_runtime::{
    run_limiter_loop, run_rank_loop, run_rank_refresh, DbHandle, LocalChain, NotifierClient,
    RankSubscriber, RuntimeError, SpeedLimiter,
};

use args::{Cli, Commands, ConfigCmd, HistoryCmd, LimiterCmd, RankCmd};

type Limiter = SpeedLimiter<MediaServerClient, DownloaderClient, NotifierClient>;
type Subscriber = RankSubscriber<DoubanClient, LocalChain>;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let config_path = cli.config.clone().unwrap_or_else(AppConfig::config_path);

    let config = match AppConfig::load_from(&config_path) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load {}: {e}", config_path.display());
            std::process::exit(2);
        }
    };
    let _guard = init_logging(config.general.log_dir.as_deref());

    if let Err(e) = run(cli.command, config, config_path).await {
        tracing::error!("{e}");
        std::process::exit(1);
    }
}

/// Console logging, plus a daily-rolling file when `log_dir` is set.
/// `RUST_LOG` overrides the default `kanshi=info` filter.
fn init_logging(log_dir: Option<&str>) -> Option<WorkerGuard> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("kanshi=info"));
    let registry = tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer());

    match log_dir.filter(|d| !d.is_empty()) {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, "kanshi.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            registry
                .with(
                    tracing_subscriber::fmt::layer()
                        .with_ansi(false)
                        .with_writer(writer),
                )
                .init();
            Some(guard)
        }
        None => {
            registry.init();
            None
        }
    }
}

async fn run(command: Commands, config: AppConfig, config_path: PathBuf) -> Result<(), RuntimeError> {
    match command {
        Commands::Serve {
            no_rank,
            no_limiter,
        } => serve(config, config_path, !no_rank, !no_limiter).await,
        Commands::Limiter(LimiterCmd::Tick { force }) => {
            let mut config = config;
            config.limiter.enabled |= force;
            let limiter = build_limiter(&config)?;
            print_json(&limiter.tick().await)
        }
        Commands::Limiter(LimiterCmd::Sessions) => {
            for server in build_servers(&config)? {
                match server.sessions().await {
                    Ok(sessions) => print_json(&sessions)?,
                    Err(e) => tracing::warn!(server = server.name(), "failed to query sessions: {e}"),
                }
            }
            Ok(())
        }
        Commands::Rank(RankCmd::Preview) => {
            let subscriber = build_subscriber(&config, open_db()?)?;
            for (feed, entries) in subscriber.preview(&config.rank).await? {
                println!("{} ({}): {} accepted", feed.title, feed.value, entries.len());
                for entry in entries {
                    println!(
                        "  {} ({}) {:.1} [{}] https://movie.douban.com/subject/{}",
                        entry.title, entry.year, entry.rating, entry.genres_text, entry.douban_id
                    );
                }
            }
            Ok(())
        }
        Commands::Rank(RankCmd::Refresh) => {
            let subscriber = build_subscriber(&config, open_db()?)?;
            let config = RwLock::new(config);
            let report = run_rank_refresh(&subscriber, &config, Some(&config_path)).await?;
            print_json(&report)
        }
        Commands::History(HistoryCmd::List) => {
            let history = open_db()?
                .history()
                .await
                .map_err(|e| RuntimeError::Database(e.to_string()))?
                .unwrap_or_default();
            print_json(&history)
        }
        Commands::History(HistoryCmd::Delete { key }) => {
            let db = open_db()?;
            let mut history = db
                .history()
                .await
                .map_err(|e| RuntimeError::Database(e.to_string()))?
                .unwrap_or_default();
            let removed = delete_history_entry(&mut history, &key);
            db.save_history(history)
                .await
                .map_err(|e| RuntimeError::Database(e.to_string()))?;
            println!("removed {removed} record(s)");
            Ok(())
        }
        Commands::Config(ConfigCmd::Path) => {
            println!("{}", config_path.display());
            Ok(())
        }
        Commands::Config(ConfigCmd::Show) => {
            let text =
                toml::to_string_pretty(&config).map_err(|e| RuntimeError::Config(e.to_string()))?;
            print!("{text}");
            Ok(())
        }
    }
}

async fn serve(
    config: AppConfig,
    config_path: PathBuf,
    with_rank: bool,
    with_limiter: bool,
) -> Result<(), RuntimeError> {
    let db = open_db()?;
    let limiter = Arc::new(build_limiter(&config)?);
    let mut tasks = Vec::new();

    if with_limiter && config.limiter.enabled {
        if !config.limiter.limit_enabled() {
            tracing::warn!("no play caps or bandwidth configured, downloaders stay unlimited while playing");
        }
        tasks.push(tokio::spawn(run_limiter_loop(
            Arc::clone(&limiter),
            config.limiter.interval,
        )));
    }

    if with_rank && config.rank.enabled {
        let subscriber = Arc::new(build_subscriber(&config, db.clone())?);
        let shared = Arc::new(RwLock::new(config.clone()));
        tasks.push(tokio::spawn(run_rank_loop(
            subscriber,
            shared,
            Some(config_path),
        )));
    }

    let listener = TcpListener::bind(&config.general.listen)
        .await
        .map_err(|e| RuntimeError::Server(format!("bind {}: {e}", config.general.listen)))?;
    let app = server::router(Arc::new(AppState {
        limiter: Arc::clone(&limiter),
        db,
        api_token: config.general.api_token.clone(),
    }));

    let result = server::serve(listener, app, shutdown_signal()).await;
    for task in tasks {
        task.abort();
    }
    limiter.shutdown().await;
    tracing::info!("stopped");
    result
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("failed to listen for shutdown signal: {e}");
        std::future::pending::<()>().await;
    }
}

fn open_db() -> Result<DbHandle, RuntimeError> {
    let path = AppConfig::ensure_db_path().map_err(|e| RuntimeError::Config(e.to_string()))?;
    DbHandle::open(&path).ok_or_else(|| RuntimeError::Database("failed to open database".into()))
}

fn build_servers(config: &AppConfig) -> Result<Vec<MediaServerClient>, RuntimeError> {
    config
        .media_servers
        .iter()
        .map(MediaServerClient::from_config)
        .collect::<Result<_, _>>()
        .map_err(|e| RuntimeError::Config(e.to_string()))
}

fn build_limiter(config: &AppConfig) -> Result<Limiter, RuntimeError> {
    let downloaders = config
        .limiter
        .downloaders
        .iter()
        .filter_map(|name| config.downloader(name))
        .map(DownloaderClient::from_config)
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| RuntimeError::Config(e.to_string()))?;
    let notifier = NotifierClient::from_url(config.notify.webhook_url.as_deref());
    Ok(SpeedLimiter::new(
        config.limiter.clone(),
        build_servers(config)?,
        downloaders,
        notifier,
    ))
}

fn build_subscriber(config: &AppConfig, db: DbHandle) -> Result<Subscriber, RuntimeError> {
    let source = DoubanClient::new(config.rank.proxy.as_deref())
        .map_err(|e| RuntimeError::Config(e.to_string()))?;
    Ok(RankSubscriber::new(source, LocalChain::new(db.clone()), db))
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<(), RuntimeError> {
    let text =
        serde_json::to_string_pretty(value).map_err(|e| RuntimeError::Api(e.to_string()))?;
    println!("{text}");
    Ok(())
}
