use std::{
    env, fs,
    net::{Ipv4Addr, SocketAddr},
    path::{Path, PathBuf},
    str::FromStr,
    time::Duration,
};

use crate::{access::GroupPolicy, domain::UserId, errors::Error, Result};

pub const DEFAULT_GEMINI_API_BASE: &str = "https://generativelanguage.googleapis.com";
pub const DEFAULT_GEMINI_MODEL: &str = "gemini-1.5-flash";
pub const DEFAULT_IMAGE_PROMPT: &str = "Solve this NEET/JEE question step-by-step:";

/// How updates reach the bot.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BotMode {
    Polling,
    Webhook,
}

impl FromStr for BotMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "polling" | "poll" => Ok(Self::Polling),
            "webhook" => Ok(Self::Webhook),
            other => Err(Error::Config(format!(
                "unknown BOT_MODE {other:?} (expected \"polling\" or \"webhook\")"
            ))),
        }
    }
}

/// Typed configuration, read from the environment (and `.env`).
#[derive(Clone, Debug)]
pub struct Config {
    // Credentials
    pub telegram_bot_token: String,
    pub gemini_api_key: String,

    // Access control
    pub owner_id: Option<UserId>,
    pub auth_file: PathBuf,
    pub group_policy: GroupPolicy,

    // Gemini
    pub gemini_api_base: String,
    pub gemini_model: String,
    pub gemini_timeout: Duration,
    pub image_prompt: String,

    // Telegram limits
    pub reply_limit: usize,

    // Transport
    pub mode: BotMode,
    pub port: u16,
    pub webhook_url: Option<String>,
    pub webhook_secret: Option<String>,
}

impl Config {
    pub fn load() -> Result<Self> {
        load_dotenv_if_present(Path::new(".env"));
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build the config from an arbitrary variable source.
    pub fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let var = |key: &str| get(key).and_then(non_empty);

        // Required
        let telegram_bot_token = var("BOT_TOKEN")
            .or_else(|| var("TELEGRAM_BOT_TOKEN"))
            .ok_or_else(|| {
                Error::Config("BOT_TOKEN environment variable is required".to_string())
            })?;
        let gemini_api_key = var("GEMINI_API_KEY").ok_or_else(|| {
            Error::Config("GEMINI_API_KEY environment variable is required".to_string())
        })?;

        let owner_id = parse_var::<i64>("OWNER_ID", var("OWNER_ID"))?.map(UserId);
        let auth_file = PathBuf::from(var("AUTH_FILE").unwrap_or_else(|| "auth.json".to_string()));
        let group_policy = match var("GROUP_POLICY") {
            Some(s) => s.parse()?,
            None => GroupPolicy::default(),
        };

        let gemini_api_base = var("GEMINI_API_BASE")
            .unwrap_or_else(|| DEFAULT_GEMINI_API_BASE.to_string())
            .trim_end_matches('/')
            .to_string();
        let gemini_model = var("GEMINI_MODEL").unwrap_or_else(|| DEFAULT_GEMINI_MODEL.to_string());
        let gemini_timeout = Duration::from_secs(
            parse_var::<u64>("GEMINI_TIMEOUT_SECS", var("GEMINI_TIMEOUT_SECS"))?.unwrap_or(60),
        );
        let image_prompt = var("IMAGE_PROMPT").unwrap_or_else(|| DEFAULT_IMAGE_PROMPT.to_string());

        // Telegram caps messages at 4096; keep headroom for the truncation marker.
        let reply_limit = parse_var::<usize>("REPLY_LIMIT", var("REPLY_LIMIT"))?
            .unwrap_or(4000)
            .clamp(1, 4096);

        let port = parse_var::<u16>("PORT", var("PORT"))?.unwrap_or(8000);
        let webhook_url = var("WEBHOOK_URL").or_else(|| {
            var("KOYEB_APP_NAME").map(|app| format!("https://{app}.koyeb.app/webhook"))
        });
        let webhook_secret = var("WEBHOOK_SECRET");
        if let Some(secret) = &webhook_secret {
            // Telegram accepts 1-256 characters of A-Z, a-z, 0-9, `_` and `-`.
            let valid = secret.len() <= 256
                && secret
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
            if !valid {
                return Err(Error::Config(
                    "WEBHOOK_SECRET may only contain A-Z, a-z, 0-9, _ and - (max 256)"
                        .to_string(),
                ));
            }
        }

        let mode = match var("BOT_MODE") {
            Some(s) => s.parse()?,
            None if webhook_url.is_some() => BotMode::Webhook,
            None => BotMode::Polling,
        };
        if mode == BotMode::Webhook && webhook_url.is_none() {
            return Err(Error::Config(
                "BOT_MODE=webhook needs WEBHOOK_URL or KOYEB_APP_NAME".to_string(),
            ));
        }

        Ok(Self {
            telegram_bot_token,
            gemini_api_key,
            owner_id,
            auth_file,
            group_policy,
            gemini_api_base,
            gemini_model,
            gemini_timeout,
            image_prompt,
            reply_limit,
            mode,
            port,
            webhook_url,
            webhook_secret,
        })
    }

    pub fn listen_addr(&self) -> SocketAddr {
        SocketAddr::from((Ipv4Addr::UNSPECIFIED, self.port))
    }
}

fn load_dotenv_if_present(path: &Path) {
    let Ok(contents) = fs::read_to_string(path) else {
        return;
    };

    for raw in contents.lines() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let Some((k, v)) = line.split_once('=') else {
            continue;
        };

        let key = k.trim();
        if key.is_empty() {
            continue;
        }
        if env::var_os(key).is_some() {
            continue; // do not override existing env
        }

        env::set_var(key, unquote(v.trim()));
    }
}

fn unquote(val: &str) -> &str {
    if val.len() >= 2
        && ((val.starts_with('"') && val.ends_with('"'))
            || (val.starts_with('\'') && val.ends_with('\'')))
    {
        return &val[1..val.len() - 1];
    }
    val
}

fn parse_var<T: FromStr>(key: &str, raw: Option<String>) -> Result<Option<T>> {
    let Some(raw) = raw else {
        return Ok(None);
    };
    raw.trim()
        .parse::<T>()
        .map(Some)
        .map_err(|_| Error::Config(format!("{key} has an invalid value: {raw:?}")))
}

fn non_empty(s: String) -> Option<String> {
    if s.trim().is_empty() {
        None
    } else {
        Some(s)
    }
}
