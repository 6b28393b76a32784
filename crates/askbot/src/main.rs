use std::sync::Arc;

use askbot_core::{
    access::{AccessStore, FileAccessStore},
    config::Config,
    ports::Assistant,
};
use askbot_gemini::{GeminiClient, GeminiConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    askbot_core::logging::init("askbot")?;

    let cfg = Arc::new(Config::load()?);

    let store = FileAccessStore::open(&cfg.auth_file, cfg.owner_id, cfg.group_policy)?;
    tracing::info!(auth_file = %store.path().display(), "access list loaded");
    let access: Arc<dyn AccessStore> = Arc::new(store);
    let assistant: Arc<dyn Assistant> = Arc::new(GeminiClient::new(GeminiConfig::from(&*cfg))?);

    askbot_telegram::router::run(cfg, access, assistant)
        .await
        .map_err(|e| anyhow::anyhow!("telegram bot failed: {e}"))?;

    Ok(())
}
