use async_trait::async_trait;

use crate::Result;

/// One question for the assistant: prompt text plus at most one JPEG image.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AssistantRequest {
    pub prompt: String,
    pub image: Option<Vec<u8>>,
}

impl AssistantRequest {
    pub fn text(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            image: None,
        }
    }

    pub fn with_image(prompt: impl Into<String>, image: Vec<u8>) -> Self {
        Self {
            prompt: prompt.into(),
            image: Some(image),
        }
    }
}

/// Hexagonal port for the generative-AI backend.
///
/// Implementations never panic or retry: every failure comes back as
/// `Error::Upstream` and the returned text is already cut to a transport-safe length.
#[async_trait]
pub trait Assistant: Send + Sync {
    async fn solve(&self, req: AssistantRequest) -> Result<String>;
}
