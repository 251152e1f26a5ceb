//! Emoji tabletop engine with an AI Dungeon Master.
//!
//! This crate provides:
//! - A 6x6 emoji battlemap with a strict `"(x, y)"` coordinate codec
//! - Forced-tool response schemas for Claude
//! - A state transition engine that validates and repairs model output
//! - Adventure generation, a bounded history store and per-player sessions
//!
//! # Quick Start
//!
//! ```ignore
//! use tabletop_core::{Engine, SharedSession};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let engine = Engine::from_env()?;
//!     let session = SharedSession::default();
//!
//!     session.act(&engine, "move north").await?;
//!     let session = session.lock().await;
//!     println!("{}", session.current().battlemap.render_text(session.current().player_pos));
//!     Ok(())
//! }
//! ```

pub mod battlemap;
pub mod coords;
pub mod dm;
pub mod history;
pub mod schema;
pub mod session;
pub mod state;
pub mod testing;

// Primary public API
pub use battlemap::Battlemap;
pub use coords::{Coord, CoordError};
pub use dm::{Engine, EngineConfig, EngineError, Telemetry, Transition};
pub use history::History;
pub use session::{Session, SessionConfig, SessionError, SharedSession, Turn};
pub use state::{Adventure, ChangeType, Exchange, GameState, Npc};
pub use testing::ScriptedProvider;
