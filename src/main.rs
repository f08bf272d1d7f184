use anyhow::Context;
use clap::{ArgAction, Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{error, info, warn};

use comment_dispatch::config::Settings;
use comment_dispatch::logging::{init_logging, LogLevel, LoggingConfig};
use comment_dispatch::webhook::{create_webhook_router, AppState, GitHubDispatcher};

#[derive(Parser, Debug)]
#[command(name = "comment-dispatch")]
#[command(version)]
#[command(about = "Instagram comment webhook that triggers GitHub repository dispatch")]
struct Cli {
    /// Path to a TOML settings file
    #[arg(long, short, global = true)]
    config: Option<PathBuf>,

    /// Log less (-q warnings, -qq errors only)
    #[arg(long, short, action = ArgAction::Count, global = true)]
    quiet: u8,

    /// Increase verbosity (-v, -vv)
    #[arg(long, short, action = ArgAction::Count, global = true, conflicts_with = "quiet")]
    verbose: u8,

    /// Disable colored log output
    #[arg(long, global = true)]
    no_color: bool,

    /// Omit timestamps from log lines (for hosts that add their own)
    #[arg(long, global = true)]
    no_timestamps: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the webhook server (default)
    Serve {
        /// Port to listen on, overrides PORT
        #[arg(long, short)]
        port: Option<u16>,

        /// Address to bind to
        #[arg(long)]
        bind: Option<String>,
    },
    /// Print the effective settings with secrets redacted
    ShowConfig,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    init_logging(
        LoggingConfig::new()
            .with_level(LogLevel::from_flags(cli.verbose, cli.quiet))
            .with_timestamps(!cli.no_timestamps)
            .with_target(cli.verbose > 0)
            .with_ansi(!cli.no_color && std::env::var_os("NO_COLOR").is_none()),
    );

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let mut settings =
        Settings::load(cli.config.as_deref()).context("failed to load settings")?;

    match cli.command.unwrap_or(Commands::Serve {
        port: None,
        bind: None,
    }) {
        Commands::Serve { port, bind } => {
            if let Some(port) = port {
                settings.port = port;
            }
            if let Some(bind) = bind {
                settings.bind_address = bind;
            }
            serve(settings).await
        }
        Commands::ShowConfig => {
            println!("{:#?}", settings);
            Ok(())
        }
    }
}

async fn serve(settings: Settings) -> anyhow::Result<()> {
    if settings.uses_default_verify_token() {
        warn!("WEBHOOK_VERIFY_TOKEN is not set, using the built-in verification token");
    }
    if settings.github.token.is_empty() {
        warn!("GITHUB_TOKEN is not set, repository dispatch requests will be rejected");
    }

    let dispatcher =
        GitHubDispatcher::new(&settings.github).context("failed to create HTTP client")?;
    let addr = settings.socket_addr();
    let webhook_path = settings.webhook_path.clone();
    info!(dispatch_url = %dispatcher.url(), "Repository dispatch target");

    let app = create_webhook_router(AppState::new(settings, Arc::new(dispatcher)));

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;
    info!(address = %addr, path = %webhook_path, "Webhook server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    info!("Server shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "Failed to install CTRL+C handler");
        std::future::pending::<()>().await;
    }
    info!("Received shutdown signal");
}
