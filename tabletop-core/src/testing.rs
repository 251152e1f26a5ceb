//! Testing utilities for the battlemap engine.
//!
//! This module provides tools for integration testing:
//! - `ScriptedProvider` for deterministic testing without API calls
//! - `fixtures` with well-formed payloads
//! - Assertion helpers for verifying game state

use crate::battlemap::{Battlemap, RESERVED_MARKERS};
use crate::dm::{Completion, LlmProvider, RawResponse};
use crate::state::GameState;
use async_trait::async_trait;
use claude::{Request, Usage};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// A provider that returns scripted completions in order.
///
/// Clones share the same script and request log, so a test can hand one
/// clone to an engine and inspect the other afterwards.
#[derive(Clone, Default)]
pub struct ScriptedProvider {
    /// Queued completions, popped front first.
    script: Arc<Mutex<VecDeque<Result<Completion, claude::Error>>>>,
    /// Every request received, oldest first.
    requests: Arc<Mutex<Vec<Request>>>,
    /// Artificial latency applied before each answer.
    delay: Option<Duration>,
}

impl ScriptedProvider {
    /// Create a provider with an empty script.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a forced tool call carrying `input`.
    pub fn with_tool_call(self, input: serde_json::Value) -> Self {
        self.with_response(RawResponse::Blocks(vec![claude::ContentBlock::ToolUse {
            id: "toolu_scripted".to_string(),
            name: "scripted".to_string(),
            input,
        }]))
    }

    /// Queue a plain-text answer.
    pub fn with_text(self, text: impl Into<String>) -> Self {
        self.with_response(RawResponse::Text(text.into()))
    }

    /// Queue any raw response, billed at [`fixtures::USAGE`].
    pub fn with_response(self, response: RawResponse) -> Self {
        self.push(Ok(Completion {
            response,
            usage: fixtures::USAGE,
        }));
        self
    }

    /// Queue a transport failure.
    pub fn with_error(self, error: claude::Error) -> Self {
        self.push(Err(error));
        self
    }

    /// Wait this long before every answer.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Add a completion to the end of the script.
    pub fn push(&self, completion: Result<Completion, claude::Error>) {
        lock(&self.script).push_back(completion);
    }

    /// Number of completions not yet consumed.
    pub fn remaining(&self) -> usize {
        lock(&self.script).len()
    }

    /// All requests received so far.
    pub fn requests(&self) -> Vec<Request> {
        lock(&self.requests).clone()
    }

    /// The most recent request, if any.
    pub fn last_request(&self) -> Option<Request> {
        lock(&self.requests).last().cloned()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[async_trait]
impl LlmProvider for ScriptedProvider {
    async fn complete(&self, request: Request) -> Result<Completion, claude::Error> {
        lock(&self.requests).push(request);

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        lock(&self.script).pop_front().unwrap_or_else(|| {
            Err(claude::Error::Api {
                status: 500,
                message: "no scripted response left".to_string(),
            })
        })
    }

    fn name(&self) -> &str {
        "scripted"
    }
}

/// Well-formed payloads for tests.
pub mod fixtures {
    use super::*;
    use crate::coords::Coord;
    use crate::state::{Adventure, Npc};
    use serde_json::{json, Map, Value};

    /// Usage reported by every scripted completion.
    pub const USAGE: Usage = Usage {
        input_tokens: 1200,
        output_tokens: 180,
        cache_creation_input_tokens: 0,
        cache_read_input_tokens: 0,
    };

    /// A battlemap in wire form, keyed by `"(x, y)"` strings.
    pub fn wire_battlemap(map: &Battlemap) -> Value {
        let cells: Map<String, Value> = map
            .iter()
            .map(|(coord, symbol)| (coord.encode(), Value::String(symbol.to_string())))
            .collect();
        Value::Object(cells)
    }

    /// A transition payload with an explicit map and position.
    pub fn transition(map: &Battlemap, pos: Coord, change_type: &str, description: &str) -> Value {
        json!({
            "change_type": change_type,
            "battlemap": wire_battlemap(map),
            "player_pos": [pos.x(), pos.y()],
            "description": description,
        })
    }

    /// The player steps north from the castle village's starting square.
    pub fn move_north() -> Value {
        json!({
            "change_type": "same_map",
            "battlemap": wire_battlemap(&Battlemap::castle()),
            "player_pos": [2, 1],
            "description": "You move north, the grass brushing your boots.",
        })
    }

    /// The player walks through a door into a tavern.
    pub fn enter_tavern() -> Value {
        let rows = [
            ["🧱", "🧱", "🚪", "🧱", "🧱", "🧱"],
            ["🧱", "🪑", "🍺", "🪑", "🔥", "🧱"],
            ["🧱", "🪑", "🍺", "🪑", "🌾", "🧱"],
            ["🧱", "🌾", "🌾", "🌾", "🧙", "🧱"],
            ["🧱", "🌾", "🌾", "🌾", "🌾", "🧱"],
            ["🧱", "🧱", "🧱", "🧱", "🧱", "🧱"],
        ];
        let map: Battlemap = Coord::all()
            .map(|c| (c, rows[c.y() as usize][c.x() as usize]))
            .collect();
        json!({
            "change_type": "new_map",
            "battlemap": wire_battlemap(&map),
            "player_pos": [2, 4],
            "description": "You push open the door and step into a warm, noisy tavern.",
        })
    }

    /// The opening scene of [`space_pirates`].
    pub fn initial_state() -> Value {
        let rows = [
            ["🌌", "🌌", "⭐", "🌌", "🌌", "🌌"],
            ["🌌", "🚀", "🌌", "🌌", "⭐", "🌌"],
            ["🌌", "🌌", "🌾", "🌾", "🌌", "🌌"],
            ["⭐", "🌌", "🌾", "🤺", "🌌", "🏴‍☠️"],
            ["🌌", "🌌", "🌌", "🌌", "🌌", "🌌"],
            ["🌌", "🪐", "🌌", "🌌", "⭐", "🌌"],
        ];
        let map: Battlemap = Coord::all()
            .map(|c| (c, rows[c.y() as usize][c.x() as usize]))
            .collect();
        json!({
            "battlemap": wire_battlemap(&map),
            "player_pos": [2, 2],
            "initial_description": "You wake aboard a drifting cargo shuttle. A black flag glows on the scanner.",
        })
    }

    /// An adventure generated from the theme "space pirates".
    pub fn space_pirates() -> Adventure {
        Adventure {
            title: "The Nebula Heist".to_string(),
            setting: "A lawless asteroid belt at the edge of charted space".to_string(),
            objective: "Recover the stolen star chart from Captain Vex".to_string(),
            challenges: vec![
                "Evade the pirate patrols".to_string(),
                "Repair the shuttle's failing engine".to_string(),
            ],
            key_locations: vec!["Rustport Station".to_string(), "The Black Comet".to_string()],
            npcs: vec![
                Npc {
                    name: "Captain Vex".to_string(),
                    description: "A ruthless pirate with a cybernetic eye".to_string(),
                },
                Npc {
                    name: "Pip".to_string(),
                    description: "A nervous mechanic who owes Vex money".to_string(),
                },
            ],
        }
    }
}

// ============================================================================
// Assertion Helpers
// ============================================================================

/// Assert that no reserved player marker appears anywhere on the map.
#[track_caller]
pub fn assert_no_player_markers(map: &Battlemap) {
    for (coord, symbol) in map.iter() {
        assert!(
            !RESERVED_MARKERS.contains(&symbol),
            "Expected no player marker on the battlemap, found '{symbol}' at {coord}"
        );
    }
}

/// Assert that `next`'s log and conversation history extend `prior`'s by
/// exactly one entry each.
#[track_caller]
pub fn assert_log_extends(prior: &GameState, next: &GameState) {
    assert_eq!(
        next.log.len(),
        prior.log.len() + 1,
        "Expected the log to grow by one entry"
    );
    assert_eq!(
        &next.log[..prior.log.len()],
        &prior.log[..],
        "Expected earlier log entries to be unchanged"
    );
    assert_eq!(
        next.conversation_history.len(),
        prior.conversation_history.len() + 1,
        "Expected the conversation history to grow by one exchange"
    );
    assert_eq!(
        &next.conversation_history[..prior.conversation_history.len()],
        &prior.conversation_history[..],
        "Expected earlier exchanges to be unchanged"
    );
}
