use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use teloxide::prelude::*;
use tracing::{error, info};

use geminigram::chatbot::{GeminiClient, InboundMessage, Relay, TelegramClient};
use geminigram::config::{Args, Config};
use geminigram::logging;
use geminigram::transport::KeyedProxyTransport;

#[tokio::main]
async fn main() -> ExitCode {
    let config = match Config::load(Args::parse()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("geminigram: {e}");
            return ExitCode::FAILURE;
        }
    };

    let _guard = match logging::init(config.env, config.log_dir.as_deref()) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("geminigram: {e}");
            return ExitCode::FAILURE;
        }
    };

    info!("🚀 Starting geminigram ({:?})...", config.env);

    match run(config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("fatal: {e:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(config: Config) -> anyhow::Result<()> {
    tokio::fs::create_dir_all(&config.static_path)
        .await
        .with_context(|| format!("couldn't create static dir {}", config.static_path.display()))?;

    let transport =
        KeyedProxyTransport::new(config.transport(), None).context("couldn't build gemini transport")?;
    let proxied = transport.is_proxied();
    let gemini =
        GeminiClient::new(config.gemini(), Arc::new(transport)).context("couldn't connect to gemini api")?;
    info!(model = %config.model, proxied, "Gemini client ready");

    let bot = match &config.telegram_api_url {
        Some(url) => Bot::new(&config.tg_token).set_api_url(url.clone()),
        None => Bot::new(&config.tg_token),
    };
    let me = bot
        .get_me()
        .await
        .context("couldn't create telegram bot instance")?;
    info!("Bot user ID: {}, username: @{}", me.id, me.username());

    let telegram = Arc::new(TelegramClient::new(bot.clone()));
    let relay = Arc::new(Relay::new(Arc::new(gemini), telegram, config.relay()));

    info!("initialized bot");

    let handler = Update::filter_message().endpoint(handle_message);

    Dispatcher::builder(bot, handler)
        .dependencies(dptree::deps![relay])
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;

    info!("Stopped");
    Ok(())
}

async fn handle_message(msg: Message, relay: Arc<Relay>) -> ResponseResult<()> {
    relay.handle(&InboundMessage::from(&msg)).await;
    Ok(())
}
