//! Telegram update handlers.
//!
//! Every inbound message goes through the same steps:
//! - extract an `Inbound` (user, chat, command/text/photo)
//! - `plan` an `Action` against the access store (no I/O)
//! - execute it, calling the assistant when needed
//! - reply to the originating message

use std::sync::Arc;

use teloxide::{
    prelude::*,
    types::{ChatAction, PhotoSize},
};

use askbot_core::{
    access::{AccessEdit, AccessStore},
    domain::{ChatId, UserId},
};

use crate::{reply_text, router::AppState};

mod commands;
mod photo;
mod prompt;

use prompt::Query;

pub(crate) const NOT_AUTHORIZED: &str = "🚫 Not authorized.";

#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct Inbound {
    pub user: UserId,
    pub chat: ChatId,
    pub content: Content,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) enum Content {
    Command {
        name: String,
        args: String,
        /// `@botname` suffix, if the command names a bot.
        target: Option<String>,
        /// Largest size of the photo this command replies to, if any.
        replied_photo: Option<String>,
    },
    Text(String),
    Photo {
        file_id: String,
        caption: Option<String>,
    },
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) enum Action {
    Ignore,
    Reply(String),
    Solve(Query),
    Admin(AccessEdit),
    List,
}

impl Inbound {
    fn from_message(msg: &Message) -> Option<Self> {
        let user = UserId(msg.from()?.id.0 as i64);
        let chat = ChatId(msg.chat.id.0);

        let content = if let Some(text) = msg.text() {
            if text.starts_with('/') {
                let (name, args) = commands::parse_command(text);
                let target = commands::command_target(text);
                let replied_photo = msg
                    .reply_to_message()
                    .and_then(|m| m.photo())
                    .and_then(largest_photo);
                Content::Command {
                    name,
                    args,
                    target,
                    replied_photo,
                }
            } else {
                Content::Text(text.to_string())
            }
        } else if let Some(photos) = msg.photo() {
            Content::Photo {
                file_id: largest_photo(photos)?,
                caption: msg.caption().map(photo_caption),
            }
        } else {
            return None;
        };

        Some(Self {
            user,
            chat,
            content,
        })
    }
}

/// Telegram lists sizes smallest first.
fn largest_photo(photos: &[PhotoSize]) -> Option<String> {
    photos.last().map(|p| p.file.id.clone())
}

/// A `/image ...` caption carries its arguments as the caption.
fn photo_caption(caption: &str) -> String {
    if caption.starts_with('/') {
        let (name, args) = commands::parse_command(caption);
        if name == "image" {
            return args;
        }
    }
    caption.to_string()
}

pub(crate) fn plan(state: &AppState, inbound: &Inbound) -> Action {
    match &inbound.content {
        // In groups with several bots, `/cmd@otherbot` belongs to that bot.
        Content::Command {
            target: Some(target),
            ..
        } if !state.is_addressed_to_me(target) => Action::Ignore,
        Content::Command {
            name,
            args,
            replied_photo,
            ..
        } => commands::plan_command(state, inbound, name, args, replied_photo.as_deref()),
        _ if !state.access.is_allowed(inbound.user, inbound.chat) => {
            tracing::info!(user = %inbound.user, chat = %inbound.chat, "unauthorized message");
            Action::Reply(NOT_AUTHORIZED.to_string())
        }
        Content::Text(text) if text.trim().is_empty() => Action::Ignore,
        Content::Text(text) => Action::Solve(Query::text(text.clone())),
        Content::Photo { file_id, caption } => Action::Solve(Query::photo(
            file_id.clone(),
            prompt::photo_prompt(caption.as_deref(), &state.cfg.image_prompt),
        )),
    }
}

pub async fn handle_message(bot: Bot, msg: Message, state: Arc<AppState>) -> ResponseResult<()> {
    let Some(inbound) = Inbound::from_message(&msg) else {
        return Ok(());
    };

    let reply = match plan(&state, &inbound) {
        Action::Ignore => return Ok(()),
        Action::Reply(text) => text,
        Action::Admin(edit) => commands::admin_reply(state.access.as_ref(), inbound.user, edit),
        Action::List => commands::list_reply(state.access.as_ref(), inbound.user),
        Action::Solve(query) => {
            let stop_typing = start_typing(bot.clone(), msg.chat.id);
            let bot_for_download = bot.clone();
            let out = prompt::solve(state.assistant.as_ref(), query, |file_id| async move {
                photo::download_photo(&bot_for_download, file_id).await
            })
            .await;
            let _ = stop_typing.send(());
            out
        }
    };

    if let Err(e) = reply_text(&bot, msg.chat.id, msg.id, &reply).await {
        tracing::warn!(chat = %inbound.chat, "failed to deliver reply: {e}");
    }

    Ok(())
}

/// Typing indicator, refreshed until the returned sender fires or is dropped.
fn start_typing(bot: Bot, chat: teloxide::types::ChatId) -> tokio::sync::oneshot::Sender<()> {
    let (stop_tx, mut stop_rx) = tokio::sync::oneshot::channel::<()>();
    tokio::spawn(async move {
        let mut tick = tokio::time::interval(std::time::Duration::from_secs(4));
        loop {
            tokio::select! {
              _ = tick.tick() => {
                let _ = bot.send_chat_action(chat, ChatAction::Typing).await;
              }
              _ = &mut stop_rx => break,
            }
        }
    });
    stop_tx
}
