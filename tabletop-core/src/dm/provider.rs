//! The seam between the engine and whatever answers completion requests.

use super::response::RawResponse;
use async_trait::async_trait;
use claude::{Claude, Request, Usage};

/// A finished completion: the raw response and what it cost.
#[derive(Debug, Clone)]
pub struct Completion {
    pub response: RawResponse,
    pub usage: Usage,
}

/// Something that can answer a completion request.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Send a completion request.
    async fn complete(&self, request: Request) -> Result<Completion, claude::Error>;

    /// Get the provider name.
    fn name(&self) -> &str;
}

#[async_trait]
impl LlmProvider for Claude {
    async fn complete(&self, request: Request) -> Result<Completion, claude::Error> {
        let response = Claude::complete(self, request).await?;
        Ok(Completion {
            usage: response.usage,
            response: RawResponse::Blocks(response.content),
        })
    }

    fn name(&self) -> &str {
        "anthropic"
    }
}
