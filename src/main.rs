//! docchat server entry point.

use mimalloc::MiMalloc;

/// Global allocator for improved performance (M-MIMALLOC-APPS).
#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

use std::sync::Arc;

use dotenvy::dotenv;
use tracing::info;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use docchat::AppState;
use docchat::config::AppConfig;
use docchat::extract::ExtractorFactory;
use docchat::llm::{ChatCompletionsClient, load_llm_settings};
use docchat::server::start_server;
use docchat::session::SessionRegistry;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing (M-LOG-STRUCTURED)
    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true))
        .with(EnvFilter::from_default_env().add_directive("info".parse().unwrap()))
        .init();

    // Load .env (if present)
    let _ = dotenv();

    let config = match AppConfig::load() {
        Ok(c) => Arc::new(c),
        Err(e) => {
            eprintln!("Configuration error: {e}");
            std::process::exit(1);
        }
    };

    let settings = match load_llm_settings(config.llm.request_timeout_secs) {
        Ok(s) => s,
        Err(msg) => {
            eprintln!("Configuration error: {msg}");
            std::process::exit(1);
        }
    };

    info!(
        name: "llm.config.loaded",
        base_url = %settings.base_url,
        model = %settings.model,
        "LLM configuration loaded"
    );

    let extractor = ExtractorFactory::create(&config.extraction)?;
    let generator = Arc::new(ChatCompletionsClient::new(settings));
    let sessions = SessionRegistry::new();

    let state = AppState {
        extractor,
        generator,
        sessions,
        config,
    };

    start_server(state).await
}
