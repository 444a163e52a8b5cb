//! Ping-pong bot.
//!
//! Answers `/ping` with `pong` and echoes `/echo <text>`. Configuration comes
//! from `herald.toml` in the working directory and `HERALD_*` variables;
//! command-line flags override both.
//!
//! # Usage
//!
//! ```bash
//! HERALD_BOT__TOKEN=123:abc cargo run --package pingpong
//! cargo run --package pingpong -- --token 123:abc --profile development
//! ```

use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use herald::prelude::*;
use tracing::{info, warn};

#[derive(Debug, Parser)]
#[command(name = "pingpong", about = "Answers /ping with pong")]
struct Args {
    /// Configuration file, instead of searching the working directory.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Profile overlay (`herald.<profile>.toml`).
    #[arg(short, long)]
    profile: Option<String>,

    /// Bot token, overriding `bot.token`.
    #[arg(long)]
    token: Option<String>,

    /// Base log level.
    #[arg(long)]
    log_level: Option<String>,
}

/// Replies to the chat `cmd` came from.
async fn reply(ctx: &Context, cmd: &CommandEvent, text: &str) -> Result<(), BoxError> {
    let Some(handle) = BotHandle::from_context(ctx) else {
        warn!("No bot handle in context, dropping reply");
        return Ok(());
    };
    let Some(api) = handle.api() else {
        warn!("Bot has no API client, dropping reply");
        return Ok(());
    };
    api.send_message(ctx, cmd.message.chat.id, text).await?;
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut builder = HeraldRuntime::builder();
    if let Some(path) = &args.config {
        builder = builder.config_file(path);
    }
    if let Some(profile) = args.profile {
        builder = builder.profile(profile);
    }
    if let Some(token) = args.token {
        builder = builder.set("bot.token", token);
    }
    if let Some(level) = args.log_level {
        builder = builder.set("logging.level", level);
    }
    let runtime = builder.build().await?;

    let handlers = runtime.handlers();
    handlers.on_command_named("ping", |ctx, cmd| async move {
        reply(&ctx, &cmd, "pong").await
    });
    handlers.on_command_named("echo", |ctx, cmd| async move {
        if cmd.args.is_empty() {
            return reply(&ctx, &cmd, "usage: /echo <text>").await;
        }
        reply(&ctx, &cmd, &cmd.args).await
    });
    handlers.on_message_kind([MessageKind::Text], |_ctx, event| async move {
        info!(
            chat = event.message.chat.id,
            text = event.message.text.as_deref().unwrap_or_default(),
            "Message received"
        );
        Ok(())
    });

    runtime.run().await?;
    Ok(())
}
