mod apis;
mod cogs;
mod config;
mod database;
mod errors;
mod state;
mod util;
mod wheel;

use config::Config;
use poise::{builtins, serenity_prelude as serenity, Framework, FrameworkOptions};
use state::Data;
use tracing::{error, info};

// Common types
pub type Error = anyhow::Error;
pub type Context<'a> = poise::Context<'a, Data, Error>;
pub type Result<T> = std::result::Result<T, Error>;
pub type Commands = Vec<poise::Command<Data, Error>>;

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::from_env()?;

    tracing_subscriber::fmt().compact().init();

    if config.dev {
        info!("Starting bot in development configuration")
    } else {
        info!("Starting bot using main configuration")
    }

    let intents =
        serenity::GatewayIntents::non_privileged() | serenity::GatewayIntents::MESSAGE_CONTENT;
    let token = config.secrets.bot_token.clone();

    let framework = Framework::builder()
        .options(FrameworkOptions {
            commands: cogs::commands(),
            prefix_options: poise::PrefixFrameworkOptions {
                prefix: Some(config.command_prefix.clone()),
                ..Default::default()
            },
            on_error: |e| Box::pin(errors::global_error_handler(e)),
            ..Default::default()
        })
        .setup(move |ctx, ready, framework| {
            info!("Logged in as {} (ID: {})", ready.user.name, ready.user.id);
            Box::pin(async move {
                builtins::register_globally(ctx, &framework.options().commands).await?;
                Data::from_config(config)
            })
        })
        .build();

    let mut client = serenity::ClientBuilder::new(token, intents)
        .framework(framework)
        .await?;

    let shard_manager = client.shard_manager.clone();
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to register ctrl-c handler: {e}");
            return;
        }
        info!("Received ctrl-c, shutting down");
        shard_manager.shutdown_all().await;
    });

    client.start().await?;
    Ok(())
}
