//! AI Dungeon Master module.
//!
//! Contains the engine that drives state transitions, the prompts it
//! sends, the provider seam and response decoding.

mod engine;
pub mod prompts;
mod provider;
pub mod response;

pub use engine::{Engine, EngineConfig, EngineError, Telemetry, Transition, DEFAULT_TIMEOUT};
pub use provider::{Completion, LlmProvider};
pub use response::{RawResponse, ResponseError};
