//! Telegram adapter (teloxide).
//!
//! Receives updates by long-polling or webhook, gates them through the
//! `AccessStore`, and relays answers from the `Assistant` port.

use teloxide::{
    prelude::*,
    types::{ChatId, MessageId},
};

use tokio::time::sleep;

use askbot_core::{errors::Error, Result};

pub mod handlers;
pub mod health;
pub mod router;

fn map_err(e: teloxide::RequestError) -> Error {
    Error::Upstream(format!("telegram error: {e}"))
}

async fn with_retry<T, Fut>(mut op: impl FnMut() -> Fut) -> Result<T>
where
    Fut: std::future::IntoFuture<Output = std::result::Result<T, teloxide::RequestError>>,
    Fut::IntoFuture: Send,
{
    const MAX_RETRIES: usize = 1;
    let mut attempts = 0usize;
    loop {
        match op().await {
            Ok(v) => return Ok(v),
            Err(e) => match e {
                teloxide::RequestError::RetryAfter(d) if attempts < MAX_RETRIES => {
                    attempts += 1;
                    sleep(d).await;
                    continue;
                }
                other => return Err(map_err(other)),
            },
        }
    }
}

/// Send `text` as a reply to `to`, retrying once when Telegram asks us to back off.
pub(crate) async fn reply_text(bot: &Bot, chat: ChatId, to: MessageId, text: &str) -> Result<()> {
    with_retry(|| {
        bot.send_message(chat, text.to_string())
            .reply_to_message_id(to)
            .allow_sending_without_reply(true)
    })
    .await?;
    Ok(())
}
