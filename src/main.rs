use std::sync::Arc;

use tracing::{error, info};
use tracing_subscriber::prelude::*;

use bancheck::bot::{Database, Dispatcher, Notifier, RateLimiter, StatusClient, TelegramNotifier};
use bancheck::config::Config;
use bancheck::server::{self, AppState};
use bancheck::telegram_log::TelegramLogLayer;

#[tokio::main]
async fn main() {
    let config = match Config::from_env() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("{e}");
            std::process::exit(1);
        }
    };

    let notifier: Arc<dyn Notifier> = match TelegramNotifier::new(&config.bot_token, config.telegram_api_url.clone()) {
        Ok(n) => Arc::new(n),
        Err(e) => {
            eprintln!("Failed to build Telegram client: {e}");
            std::process::exit(1);
        }
    };

    // Setup logging
    let log_dir = config.data_dir.join("logs");
    std::fs::create_dir_all(&log_dir).ok();
    let log_file = match std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_dir.join("bancheck.log"))
    {
        Ok(f) => f,
        Err(e) => {
            eprintln!("Failed to open log file: {e}");
            std::process::exit(1);
        }
    };
    let (non_blocking, _guard) = tracing_appender::non_blocking(log_file);

    let tg_layer = config
        .log_chat_id
        .map(|chat_id| TelegramLogLayer::new(notifier.clone(), chat_id));

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stdout)
                .with_filter(
                    tracing_subscriber::EnvFilter::from_default_env()
                        .add_directive(tracing::Level::INFO.into()),
                ),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(non_blocking)
                .with_ansi(false)
                .with_filter(
                    tracing_subscriber::EnvFilter::from_default_env()
                        .add_directive(tracing::Level::INFO.into()),
                ),
        )
        .with(tg_layer)
        .init();

    info!("🚀 Starting bancheck...");
    info!("Owner: @{}, cooldown {:?}", config.owner_username, config.cooldown);

    let database = Database::new(config.database_path());
    if let Err(e) = database.init() {
        error!("Failed to initialize database: {e}");
        std::process::exit(1);
    }

    let status = match StatusClient::new(config.status_api_url.clone(), config.status_api_key.clone()) {
        Ok(s) => s,
        Err(e) => {
            error!("Failed to build lookup client: {e}");
            std::process::exit(1);
        }
    };
    if !status.is_configured() {
        info!("No WHATSAPP_API_URL set, lookups will report 'unknown'");
    }

    let dispatcher = Dispatcher::new(
        config.owner_username.clone(),
        RateLimiter::new(config.cooldown),
        status,
        notifier,
    );

    let state = Arc::new(AppState { database, dispatcher });

    if let Err(e) = server::run(&config.listen_addr(), state).await {
        error!("Server error: {e}");
        std::process::exit(1);
    }
}
