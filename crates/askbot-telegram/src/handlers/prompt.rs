use std::future::Future;

use askbot_core::{
    errors::Error,
    ports::{Assistant, AssistantRequest},
    utils::snippet,
    Result,
};

use super::commands::OWNER_ONLY;

/// What to ask the assistant: the prompt and, for image questions, the
/// Telegram file id to fetch first.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct Query {
    pub prompt: String,
    pub photo: Option<String>,
}

impl Query {
    pub(crate) fn text(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            photo: None,
        }
    }

    pub(crate) fn photo(file_id: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            photo: Some(file_id.into()),
        }
    }
}

/// A non-empty caption replaces the default image instruction.
pub(crate) fn photo_prompt(caption: Option<&str>, default: &str) -> String {
    match caption.map(str::trim) {
        Some(c) if !c.is_empty() => c.to_string(),
        _ => default.to_string(),
    }
}

/// Short user-facing text for a failure, chosen by kind.
pub(crate) fn describe_error(err: &Error) -> String {
    match err {
        Error::PermissionDenied(_) => OWNER_ONLY.to_string(),
        Error::Input(msg) => format!("⚠️ {msg}"),
        Error::Upstream(msg) => format!("❌ Gemini Error: {}", snippet(msg, 300)),
        other => format!("❌ Error: {}", snippet(&other.to_string(), 200)),
    }
}

/// Run one query to completion and return the reply text. Never fails:
/// errors become messages so the next update is unaffected.
pub(crate) async fn solve<F, Fut>(assistant: &dyn Assistant, query: Query, fetch_photo: F) -> String
where
    F: FnOnce(String) -> Fut,
    Fut: Future<Output = Result<Vec<u8>>>,
{
    let req = match query.photo {
        None => AssistantRequest::text(query.prompt),
        Some(file_id) => match fetch_photo(file_id).await {
            Ok(bytes) => AssistantRequest::with_image(query.prompt, bytes),
            Err(e) => {
                tracing::warn!("photo download failed: {e}");
                return format!("❌ Failed to download photo: {}", snippet(&e.to_string(), 100));
            }
        },
    };

    match assistant.solve(req).await {
        Ok(text) => text,
        Err(e) => {
            tracing::warn!("assistant request failed: {e}");
            describe_error(&e)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handlers::tests::EchoAssistant;

    struct FailingAssistant;

    #[async_trait::async_trait]
    impl Assistant for FailingAssistant {
        async fn solve(&self, _req: AssistantRequest) -> Result<String> {
            Err(Error::Upstream("gemini request failed: 500 Internal Server Error".into()))
        }
    }

    async fn no_photo(_: String) -> Result<Vec<u8>> {
        panic!("text queries must not fetch photos");
    }

    #[tokio::test]
    async fn text_query_returns_answer() {
        let out = solve(&EchoAssistant, Query::text("2+2?"), no_photo).await;
        assert_eq!(out, "2+2?");
    }

    #[tokio::test]
    async fn photo_query_fetches_and_attaches_image() {
        let out = solve(&EchoAssistant, Query::photo("f1", "solve"), |id| async move {
            assert_eq!(id, "f1");
            Ok::<_, Error>(vec![0u8; 3])
        })
        .await;
        assert_eq!(out, "image(3): solve");
    }

    #[tokio::test]
    async fn download_failure_is_reported() {
        let out = solve(&EchoAssistant, Query::photo("f1", "solve"), |_| async {
            Err::<Vec<u8>, _>(Error::Upstream("telegram download failed".into()))
        })
        .await;
        assert!(out.starts_with("❌ Failed to download photo"), "{out}");
    }

    #[tokio::test]
    async fn upstream_failure_becomes_message() {
        let out = solve(&FailingAssistant, Query::text("2+2?"), no_photo).await;
        assert!(out.starts_with("❌ Gemini Error"), "{out}");
        assert!(out.contains("500"), "{out}");
    }

    #[test]
    fn caption_overrides_default_prompt() {
        assert_eq!(photo_prompt(Some(" find x "), "default"), "find x");
        assert_eq!(photo_prompt(Some("  "), "default"), "default");
        assert_eq!(photo_prompt(None, "default"), "default");
    }

    #[test]
    fn errors_are_described_by_kind() {
        assert_eq!(
            describe_error(&Error::PermissionDenied("x".into())),
            OWNER_ONLY
        );
        assert_eq!(
            describe_error(&Error::Input("Usage: /ask <question>".into())),
            "⚠️ Usage: /ask <question>"
        );
        assert!(describe_error(&Error::Config("bad".into())).starts_with("❌ Error"));
    }
}
