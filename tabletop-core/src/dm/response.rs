//! Raw completion shapes and how each one yields a JSON payload.

use claude::ContentBlock;
use serde_json::Value;
use thiserror::Error;

/// Errors from extracting a payload out of a raw response.
#[derive(Debug, Error)]
pub enum ResponseError {
    #[error("response payload is not a JSON object")]
    NotAnObject,

    #[error("response text is not valid JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),

    #[error("response contains no tool call or JSON text")]
    NoPayload,
}

/// A completion as returned by a provider, before decoding.
#[derive(Debug, Clone, PartialEq)]
pub enum RawResponse {
    /// An already-structured payload.
    Json(Value),
    /// A string holding a JSON document.
    Text(String),
    /// A Claude message; the payload is carried by a `tool_use` block.
    Blocks(Vec<ContentBlock>),
}

impl RawResponse {
    /// Extract the JSON object this response carries.
    pub fn into_payload(self) -> Result<Value, ResponseError> {
        match self {
            RawResponse::Json(value) => object(value),
            RawResponse::Text(text) => parse_text(&text),
            RawResponse::Blocks(blocks) => from_blocks(blocks),
        }
    }
}

fn object(value: Value) -> Result<Value, ResponseError> {
    if value.is_object() {
        Ok(value)
    } else {
        Err(ResponseError::NotAnObject)
    }
}

fn parse_text(text: &str) -> Result<Value, ResponseError> {
    object(serde_json::from_str(text.trim())?)
}

fn from_blocks(blocks: Vec<ContentBlock>) -> Result<Value, ResponseError> {
    let mut text_blocks = Vec::new();
    for block in blocks {
        match block {
            ContentBlock::ToolUse { input, .. } => return object(input),
            ContentBlock::Text { text } => text_blocks.push(text),
            ContentBlock::Thinking { .. } => {}
        }
    }

    // Without a tool call, accept the first text block that is a JSON object.
    text_blocks
        .iter()
        .find_map(|text| parse_text(text).ok())
        .ok_or(ResponseError::NoPayload)
}
