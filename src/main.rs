use clap::{Parser, Subcommand};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use path_explorer::{
    root_paths_from_args, ConsoleNotifier, EntrySource, ExplorerConfig, ExplorerServer,
    HttpEntrySource, LocalEntrySource, Result, Workspace,
};

#[derive(Parser)]
#[command(name = "path-explorer")]
#[command(about = "Browse directories as a lazily loaded, self-refreshing tree")]
struct Cli {
    /// TOML config file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Serve `/paths` and `/path-entries` for the given root paths
    Serve {
        /// Listen address
        #[arg(short, long)]
        bind: Option<String>,

        /// Root paths to expose
        paths: Vec<String>,
    },
    /// Print the tree and re-print it on every refresh
    Browse {
        /// Base URL of a running server; browses PATHS in-process when omitted
        #[arg(short, long)]
        url: Option<String>,

        /// Folder to expand after loading (repeatable, applied in order)
        #[arg(short, long)]
        expand: Vec<String>,

        /// Auto-refresh period in milliseconds
        #[arg(long)]
        refresh_ms: Option<u64>,

        /// Print the tree once and exit
        #[arg(long)]
        once: bool,

        /// Root paths to browse
        paths: Vec<String>,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    if let Err(err) = run(Cli::parse()).await {
        error!("{err}");
        return ExitCode::FAILURE;
    }
    ExitCode::SUCCESS
}

async fn run(cli: Cli) -> Result<()> {
    let mut config = match &cli.config {
        Some(path) => ExplorerConfig::load(path)?,
        None => ExplorerConfig::default(),
    };

    match cli.command {
        Command::Serve { bind, paths } => {
            if let Some(bind) = bind {
                config.bind = bind;
            }
            config.validate()?;
            serve(config.bind_addr()?, root_paths_from_args(paths)?).await
        }
        Command::Browse {
            url,
            expand,
            refresh_ms,
            once,
            paths,
        } => {
            if url.is_some() {
                config.url = url;
            }
            if let Some(refresh_ms) = refresh_ms {
                config.refresh_interval_ms = refresh_ms;
            }
            config.validate()?;
            browse(&config, paths, expand, once).await
        }
    }
}

async fn serve(addr: SocketAddr, roots: Vec<String>) -> Result<()> {
    let server = Arc::new(ExplorerServer::bind(addr, roots)?);
    info!(addr = ?server.local_addr(), roots = ?server.roots(), "Serving path entries");

    let worker = tokio::task::spawn_blocking({
        let server = server.clone();
        move || server.run()
    });

    tokio::signal::ctrl_c().await?;
    info!("Shutting down");
    server.shutdown();
    worker.await?;
    Ok(())
}

async fn browse(
    config: &ExplorerConfig,
    paths: Vec<String>,
    expand: Vec<String>,
    once: bool,
) -> Result<()> {
    let source: Arc<dyn EntrySource> = match &config.url {
        Some(url) => {
            if !paths.is_empty() {
                warn!(?paths, "Ignoring paths: roots come from the server");
            }
            Arc::new(HttpEntrySource::new(url.clone()))
        }
        None => Arc::new(LocalEntrySource::new(root_paths_from_args(paths)?)),
    };

    let workspace =
        Workspace::open(source, Arc::new(ConsoleNotifier), config.refresh_interval()).await?;

    for path in &expand {
        let path = std::path::absolute(path)?.to_string_lossy().into_owned();
        let outcome = workspace.expand(&path).await?;
        info!(path = %path, ?outcome, "Expanded");
    }

    print!("{}", workspace.render().await);
    if once {
        workspace.close().await;
        return Ok(());
    }

    let mut ticker = tokio::time::interval(config.refresh_interval());
    ticker.tick().await;

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                println!();
                print!("{}", workspace.render().await);
            }
            signal = tokio::signal::ctrl_c() => {
                signal?;
                break;
            }
        }
    }

    workspace.close().await;
    Ok(())
}
