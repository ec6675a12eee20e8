//! guildmaster MCP server binary.

use anyhow::{Context, Result, anyhow};
use clap::{Parser, ValueEnum};
use guildmaster_discord::{
    DiscordClient, GatewayHandler, HttpRest, SongbirdDriver, VoiceManager, gateway_intents,
};
use guildmaster_mcp::{Dispatcher, Gate, McpServer, Settings, registry, transport};
use guildmaster_rate_limit::{RateLimitTable, RetryPolicy};
use songbird::{SerenityInit, Songbird};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

/// Log line format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

/// Discord administration over the Model Context Protocol.
#[derive(Debug, Parser)]
#[command(name = "guildmaster", version, about)]
struct Cli {
    /// Configuration file, instead of ./guildmaster.toml
    #[arg(long, env = "GUILDMASTER_CONFIG")]
    config: Option<PathBuf>,

    /// Serve HTTP (JSON-RPC, SSE, health) instead of stdio
    #[arg(long)]
    http: bool,

    /// HTTP port; implies --http
    #[arg(long)]
    port: Option<u16>,

    /// Log line format on stderr
    #[arg(long, value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,
}

#[tokio::main]
async fn main() -> ExitCode {
    // Load environment variables from .env file
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();

    let mut settings = match Settings::load(cli.config.as_deref()) {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("{}", e.user_message());
            return ExitCode::FAILURE;
        }
    };
    if cli.http || cli.port.is_some() {
        settings.server_mut().serve_http(cli.port);
    }

    init_tracing(&settings, cli.log_format);
    info!(version = env!("CARGO_PKG_VERSION"), "Starting Discord MCP server");

    match run(settings).await {
        Ok(()) => {
            info!("Discord MCP server stopped");
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("Discord MCP server failed: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

/// Logs go to stderr; stdout carries the stdio transport.
fn init_tracing(settings: &Settings, format: LogFormat) {
    let default_level = settings.logging().level().to_string().to_lowercase();
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_file(true)
        .with_line_number(true);
    match format {
        LogFormat::Text => builder.init(),
        LogFormat::Json => builder.json().init(),
    }
}

async fn run(settings: Settings) -> Result<()> {
    let discord = settings.discord();
    let token = discord.require_token()?.to_string();

    let limits = RateLimitTable::new();
    let rest = HttpRest::new(token.as_str(), discord.timeout())?
        .with_api_base(discord.api_base())
        .with_rate_limits(limits.clone())
        .with_retry(RetryPolicy::new(
            *discord.max_retries(),
            *discord.retry_delay_ms(),
        ));

    let songbird = Songbird::serenity();
    let voice = VoiceManager::new(Arc::new(SongbirdDriver::new(songbird.clone())));
    let client = Arc::new(
        DiscordClient::new(Arc::new(rest), discord.guild_id().clone()).with_voice(voice),
    );

    let mut gateway = serenity::Client::builder(&token, gateway_intents())
        .event_handler(GatewayHandler::new(client.clone()))
        .register_songbird_with(songbird)
        .await
        .context("Failed to create gateway client")?;
    let shards = gateway.shard_manager.clone();
    let mut gateway_task = tokio::spawn(async move { gateway.start().await });

    let gate_settings = settings.gate();
    let gate = Gate::new(
        gate_settings.allowed_actions().clone(),
        gate_settings.denied_actions().clone(),
        limits,
    )
    .with_protection(*gate_settings.rate_limit_protection())
    .with_operation_logging(*settings.logging().enabled());
    let tools = registry(Dispatcher::new(client.clone()), Arc::new(gate));
    let server = Arc::new(McpServer::builder().tools(tools).build());

    let server_settings = settings.server();
    let http = *server_settings.http();
    let serving = async {
        if http {
            let addr: SocketAddr = format!("{}:{}", server_settings.host(), server_settings.port())
                .parse()
                .with_context(|| format!("Invalid listen address {}", server_settings.host()))?;
            transport::serve_http(server, addr, shutdown_signal()).await?;
        } else {
            transport::serve_stdio(server).await?;
            info!("stdin closed");
        }
        Ok::<_, anyhow::Error>(())
    };

    let outcome = tokio::select! {
        result = serving => result,
        _ = shutdown_signal(), if !http => Ok(()),
        joined = &mut gateway_task => match joined {
            Ok(Ok(())) => Err(anyhow!("Gateway connection closed")),
            Ok(Err(e)) => Err(anyhow!("Gateway connection failed: {}", e)),
            Err(e) => Err(e.into()),
        },
    };

    client.voice().shutdown().await;
    shards.shutdown_all().await;
    outcome
}

/// Resolves on SIGINT or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Cannot listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Cannot listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("Received shutdown signal");
}
