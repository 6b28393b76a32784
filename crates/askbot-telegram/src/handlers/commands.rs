use std::collections::BTreeSet;

use askbot_core::{
    access::{AccessEdit, AccessStore, Mutation},
    domain::{ChatId, UserId},
    errors::Error,
    Result,
};

use crate::router::AppState;

use super::{
    prompt::{describe_error, photo_prompt, Query},
    Action, Inbound, NOT_AUTHORIZED,
};

pub(crate) const OWNER_ONLY: &str = "🚫 Only owner can use this.";
const GREETING: &str = "🤖 Hello! Send a question or image to solve.";
const IMAGE_HINT: &str =
    "📷 Send a photo (optionally with a caption), or reply /image to a photo you already sent.";

pub(crate) fn parse_command(text: &str) -> (String, String) {
    // Telegram may send `/cmd@botname arg1 ...`
    let mut parts = text.trim().splitn(2, char::is_whitespace);
    let first = parts.next().unwrap_or("").trim();
    let rest = parts.next().unwrap_or("").trim().to_string();

    let cmd = first
        .trim_start_matches('/')
        .split('@')
        .next()
        .unwrap_or("")
        .to_lowercase();

    (cmd, rest)
}

/// The bot a command names with `/cmd@botname`, if any.
pub(crate) fn command_target(text: &str) -> Option<String> {
    let first = text.split_whitespace().next()?;
    let (_, target) = first.split_once('@')?;
    (!target.is_empty()).then(|| target.to_string())
}

fn is_admin_command(name: &str) -> bool {
    matches!(
        name,
        "addauth"
            | "adduser"
            | "removeauth"
            | "removeuser"
            | "addgroup"
            | "removegroup"
            | "listauth"
    )
}

pub(crate) fn plan_command(
    state: &AppState,
    inbound: &Inbound,
    name: &str,
    args: &str,
    replied_photo: Option<&str>,
) -> Action {
    if is_admin_command(name) {
        if !state.access.is_owner(inbound.user) {
            tracing::info!(user = %inbound.user, command = name, "non-owner admin command");
            return Action::Reply(OWNER_ONLY.to_string());
        }
        if name == "listauth" {
            return Action::List;
        }
        return match admin_edit(name, args, inbound.chat) {
            Ok(edit) => Action::Admin(edit),
            Err(e) => Action::Reply(describe_error(&e)),
        };
    }

    if !state.access.is_allowed(inbound.user, inbound.chat) {
        tracing::info!(user = %inbound.user, chat = %inbound.chat, command = name, "unauthorized command");
        return Action::Reply(NOT_AUTHORIZED.to_string());
    }

    match name {
        "start" => Action::Reply(GREETING.to_string()),
        "help" => Action::Reply(help_text(state.access.is_owner(inbound.user))),
        "ask" if args.is_empty() => {
            Action::Reply(describe_error(&Error::Input("Usage: /ask <question>".to_string())))
        }
        "ask" => Action::Solve(Query::text(args)),
        "image" => match replied_photo {
            Some(file_id) => Action::Solve(Query::photo(
                file_id,
                photo_prompt(Some(args), &state.cfg.image_prompt),
            )),
            None => Action::Reply(IMAGE_HINT.to_string()),
        },
        _ => Action::Reply("❓ Unknown command. Try /help".to_string()),
    }
}

/// Group commands default to the chat they were sent in.
fn admin_edit(name: &str, args: &str, chat: ChatId) -> Result<AccessEdit> {
    let arg = args.split_whitespace().next();
    let parsed = arg.map(|a| a.parse::<i64>());

    let usage = |what: &str| Error::Input(format!("Usage: /{name} <{what}>"));

    match (name, parsed) {
        ("addauth" | "adduser", Some(Ok(id))) => Ok(AccessEdit::AddUser(UserId(id))),
        ("removeauth" | "removeuser", Some(Ok(id))) => Ok(AccessEdit::RemoveUser(UserId(id))),
        ("addgroup", Some(Ok(id))) => Ok(AccessEdit::AddGroup(ChatId(id))),
        ("addgroup", None) => Ok(AccessEdit::AddGroup(chat)),
        ("removegroup", Some(Ok(id))) => Ok(AccessEdit::RemoveGroup(ChatId(id))),
        ("removegroup", None) => Ok(AccessEdit::RemoveGroup(chat)),
        ("addgroup" | "removegroup", Some(Err(_))) => Err(usage("group_id")),
        _ => Err(usage("user_id")),
    }
}

pub(crate) fn admin_reply(access: &dyn AccessStore, requester: UserId, edit: AccessEdit) -> String {
    match access.edit(requester, edit) {
        Ok(outcome) => {
            if outcome.changed() {
                tracing::info!(requester = %requester, ?edit, ?outcome, "access list updated");
            }
            render_mutation(edit, outcome)
        }
        Err(e) => {
            tracing::warn!(requester = %requester, ?edit, "access edit failed: {e}");
            describe_error(&e)
        }
    }
}

fn render_mutation(edit: AccessEdit, outcome: Mutation) -> String {
    let id = edit.target();
    let kind = if edit.is_group() { "Group" } else { "User" };
    match outcome {
        Mutation::Added => format!(
            "✅ Added {} {id} to authorized list.",
            kind.to_lowercase()
        ),
        Mutation::AlreadyPresent => format!("⚠️ {kind} {id} already authorized."),
        Mutation::Removed => format!("❌ Removed {} {id}.", kind.to_lowercase()),
        Mutation::NotFound => format!("⚠️ {kind} {id} not found in list."),
    }
}

pub(crate) fn list_reply(access: &dyn AccessStore, requester: UserId) -> String {
    match access.list(requester) {
        Ok(list) => format!(
            "🔐 Access list\n\n👑 Owners: {}\n👤 Allowed users: {}\n👥 Allowed groups: {}",
            join_ids(&list.owners),
            join_ids(&list.allowed_users),
            join_ids(&list.allowed_groups),
        ),
        Err(e) => describe_error(&e),
    }
}

fn join_ids(ids: &BTreeSet<i64>) -> String {
    if ids.is_empty() {
        return "(none)".to_string();
    }
    ids.iter()
        .map(|id| id.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

fn help_text(is_owner: bool) -> String {
    let mut out = String::from(
        "🤖 Send a question as text, or a photo of the problem.\n\n\
/ask <question> - ask a question\n\
/image - reply to a photo to solve it\n\
/help - this message",
    );
    if is_owner {
        out.push_str(
            "\n\nOwner commands:\n\
/addauth <user_id> - allow a user\n\
/removeauth <user_id> - revoke a user\n\
/addgroup [chat_id] - allow a group (defaults to this chat)\n\
/removegroup [chat_id] - revoke a group (defaults to this chat)\n\
/listauth - show the access list",
        );
    }
    out
}
