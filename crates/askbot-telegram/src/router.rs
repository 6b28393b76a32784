use std::sync::Arc;

use teloxide::{
    dispatching::Dispatcher,
    dptree,
    error_handlers::LoggingErrorHandler,
    prelude::*,
    update_listeners::webhooks,
};

use askbot_core::{
    access::AccessStore,
    config::{BotMode, Config},
    ports::Assistant,
};

use crate::{handlers, health};

#[derive(Clone)]
pub struct AppState {
    pub cfg: Arc<Config>,
    pub access: Arc<dyn AccessStore>,
    pub assistant: Arc<dyn Assistant>,
    /// Our own `@username`, when `get_me` succeeded.
    pub bot_username: Option<String>,
}

impl AppState {
    /// `/cmd@name` is ours when `name` is this bot. Without a known username
    /// every command is accepted.
    pub(crate) fn is_addressed_to_me(&self, target: &str) -> bool {
        self.bot_username
            .as_deref()
            .map_or(true, |me| me.eq_ignore_ascii_case(target))
    }
}

pub async fn run(
    cfg: Arc<Config>,
    access: Arc<dyn AccessStore>,
    assistant: Arc<dyn Assistant>,
) -> anyhow::Result<()> {
    let bot = Bot::new(cfg.telegram_bot_token.clone());

    // Basic startup info.
    let bot_username = match bot.get_me().await {
        Ok(me) => {
            tracing::info!(username = %me.username(), mode = ?cfg.mode, "askbot started");
            Some(me.username().to_string())
        }
        Err(e) => {
            tracing::warn!("get_me failed: {e}");
            None
        }
    };
    tracing::info!(
        policy = ?cfg.group_policy,
        model = %cfg.gemini_model,
        "access control and model configured"
    );

    let state = Arc::new(AppState {
        cfg: cfg.clone(),
        access,
        assistant,
        bot_username,
    });

    match cfg.mode {
        BotMode::Polling => run_polling(bot, state).await,
        BotMode::Webhook => run_webhook(bot, state).await,
    }
}

async fn run_polling(bot: Bot, state: Arc<AppState>) -> anyhow::Result<()> {
    // The health listener shares no state with the dispatcher.
    health::spawn(
        state.cfg.listen_addr(),
        health::router(),
        std::future::pending(),
    )?;

    let handler =
        dptree::entry().branch(Update::filter_message().endpoint(handlers::handle_message));

    Dispatcher::builder(bot, handler)
        .dependencies(dptree::deps![state])
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;

    Ok(())
}

async fn run_webhook(bot: Bot, state: Arc<AppState>) -> anyhow::Result<()> {
    let raw_url = state
        .cfg
        .webhook_url
        .as_deref()
        .ok_or_else(|| anyhow::anyhow!("webhook mode requires WEBHOOK_URL or KOYEB_APP_NAME"))?;
    let url: url::Url = raw_url.parse()?;
    if matches!(url.path(), "" | "/" | "/health") {
        anyhow::bail!("webhook path {:?} collides with the health routes", url.path());
    }

    let addr = state.cfg.listen_addr();
    let mut options = webhooks::Options::new(addr, url.clone());
    if let Some(secret) = &state.cfg.webhook_secret {
        options = options.secret_token(secret.clone());
    }

    // Registers the webhook with Telegram and hands back the route serving it.
    let (listener, stop_flag, webhook_routes) =
        webhooks::axum_to_router(bot.clone(), options).await?;
    let app = health::router().merge(webhook_routes);
    health::spawn(addr, app, stop_flag)?;
    tracing::info!(%addr, webhook = %url, "webhook listening");

    let handler =
        dptree::entry().branch(Update::filter_message().endpoint(handlers::handle_message));

    Dispatcher::builder(bot, handler)
        .dependencies(dptree::deps![state])
        .enable_ctrlc_handler()
        .build()
        .dispatch_with_listener(
            listener,
            LoggingErrorHandler::with_custom_text("an error from the webhook listener"),
        )
        .await;

    Ok(())
}
