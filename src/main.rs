use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, fmt};

use custos::bot::Bot;
use custos::channels::{ChannelManager, CliChannel, TelegramChannel};
use custos::config::{BotConfig, TelegramConfig};
use custos::conversation::{ConversationManager, SessionStore};
use custos::llm::{LlmConfig, create_provider};
use custos::store::{Database, LibSqlBackend};

/// Log to stderr and to a daily-rolling file. The guard flushes the file
/// writer and must live until exit.
fn init_tracing(log_dir: &Path) -> anyhow::Result<WorkerGuard> {
    let file_appender = RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .filename_prefix("custos")
        .filename_suffix("log")
        .build(log_dir)
        .with_context(|| format!("failed to open log directory {}", log_dir.display()))?;
    let (file_writer, guard) = tracing_appender::non_blocking(file_appender);

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .with(fmt::layer().with_ansi(false).with_writer(file_writer))
        .init();

    Ok(guard)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let config = BotConfig::from_env()?;
    let _log_guard = init_tracing(&config.log_dir)?;

    let llm_config = LlmConfig::from_env().context(
        "OPENROUTER_API_KEY must be set (export it or add it to .env)",
    )?;

    eprintln!("🤖 Custos v{}", env!("CARGO_PKG_VERSION"));
    eprintln!("   Model: {}", llm_config.model);
    eprintln!("   Endpoint: {}", llm_config.endpoint_url());

    let llm = create_provider(&llm_config)?;

    // ── Database ─────────────────────────────────────────────────────────
    let db: Arc<dyn Database> = Arc::new(
        LibSqlBackend::new_local(&config.db_path)
            .await
            .with_context(|| format!("failed to open database at {}", config.db_path.display()))?,
    );
    eprintln!("   Database: {}", config.db_path.display());

    // ── Channels ─────────────────────────────────────────────────────────
    let mut channels = ChannelManager::new();
    channels.add(Box::new(CliChannel::new()));

    if let Some(telegram) = TelegramConfig::from_env() {
        eprintln!("   Telegram: enabled (allowed: {})", telegram.allowed_display());
        channels.add(Box::new(TelegramChannel::new(
            telegram.bot_token,
            telegram.allowed_users,
        )));
    }

    eprintln!("   Channels: {}", channels.names().join(", "));
    eprintln!("   Type /start to begin, Ctrl+C to exit.\n");

    let conversations = ConversationManager::new(
        Arc::new(SessionStore::new()),
        db,
        llm,
        config.retry,
    );

    Bot::new(config, channels, conversations).run().await?;

    Ok(())
}
