//! Guildbot CLI entry point.

use anyhow::Context as _;
use clap::Parser;
use guildbot::messaging::DiscordGateway;
use guildbot::orchestrator::Orchestrator;
use serenity::all::GatewayIntents;
use std::sync::Arc;
use tokio::sync::watch;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "guildbot")]
#[command(about = "A Discord assistant backed by a chat-completion endpoint")]
struct Cli {
    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = if cli.debug {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    tracing::info!("starting guildbot");

    // missing DISCORD_BOT_TOKEN fails here, exiting non-zero
    let config = Arc::new(
        guildbot::config::Config::load().with_context(|| "failed to load configuration")?,
    );

    let completion = Arc::new(
        guildbot::llm::CompletionClient::new(config.completion.clone())
            .with_context(|| "failed to build completion client")?,
    );
    if config.completion.api_key.is_none() {
        tracing::warn!("OPENROUTER_API_KEY not set; model replies are disabled until it is");
    }

    let orchestrator = Arc::new(Orchestrator::new(
        &config.bot_name,
        config.history.max_turns,
        completion,
    ));

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let health = guildbot::health::start_health_server(config.health.port, shutdown_rx)
        .await
        .with_context(|| "failed to start health server")?;

    let keepalive = config
        .health
        .keepalive_url
        .clone()
        .map(|url| guildbot::health::spawn_keepalive(url, config.health.keepalive_interval_secs));

    let intents = GatewayIntents::GUILDS
        | GatewayIntents::GUILD_MESSAGES
        | GatewayIntents::MESSAGE_CONTENT
        | GatewayIntents::GUILD_MEMBERS
        | GatewayIntents::GUILD_MESSAGE_REACTIONS
        | GatewayIntents::DIRECT_MESSAGES;

    let gateway = DiscordGateway::new(orchestrator, config.clone());
    let mut client = serenity::Client::builder(&config.discord_token, intents)
        .event_handler(gateway)
        .await
        .with_context(|| "failed to build Discord client")?;

    tokio::select! {
        result = client.start() => {
            result.with_context(|| "discord client exited")?;
        }
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("shutdown signal received");
        }
    }

    let _ = shutdown_tx.send(true);
    if let Some(task) = keepalive {
        task.abort();
    }
    let _ = health.await;

    tracing::info!("guildbot stopped");
    Ok(())
}
