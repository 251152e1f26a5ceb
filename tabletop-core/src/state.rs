//! Game state snapshots and the adventure premise.

use crate::battlemap::Battlemap;
use crate::coords::{Coord, PLAYER_START};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Whether a transition kept the current scene or moved to a new one.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeType {
    #[default]
    SameMap,
    NewMap,
}

impl ChangeType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChangeType::SameMap => "same_map",
            ChangeType::NewMap => "new_map",
        }
    }
}

impl fmt::Display for ChangeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One player action and the narration it produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Exchange {
    pub action: String,
    pub response: String,
}

/// A non-player character in the adventure premise.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Npc {
    pub name: String,
    pub description: String,
}

/// The premise a session is seeded from. Immutable once generated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Adventure {
    pub title: String,
    pub setting: String,
    pub objective: String,
    pub challenges: Vec<String>,
    pub key_locations: Vec<String>,
    pub npcs: Vec<Npc>,
}

/// An immutable snapshot of the game.
///
/// Each player action produces a new `GameState` derived from the previous
/// one; `log` and `conversation_history` only ever grow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameState {
    pub battlemap: Battlemap,
    pub player_pos: Coord,
    pub last_action: String,
    pub log: Vec<String>,
    pub conversation_history: Vec<Exchange>,
    pub change_type: ChangeType,
    pub adventure: Option<Arc<Adventure>>,
}

impl Default for GameState {
    /// The castle village with the player standing at `(2, 2)`.
    fn default() -> Self {
        Self::new(Battlemap::castle(), PLAYER_START)
    }
}

impl GameState {
    /// A fresh state with empty history.
    pub fn new(battlemap: Battlemap, player_pos: Coord) -> Self {
        Self {
            battlemap,
            player_pos,
            last_action: String::new(),
            log: Vec::new(),
            conversation_history: Vec::new(),
            change_type: ChangeType::SameMap,
            adventure: None,
        }
    }

    /// The opening state of an adventure.
    pub fn opening(
        battlemap: Battlemap,
        player_pos: Coord,
        description: String,
        adventure: Arc<Adventure>,
    ) -> Self {
        Self {
            log: vec![description],
            adventure: Some(adventure),
            ..Self::new(battlemap, player_pos)
        }
    }

    /// Derive the state that follows `action`.
    ///
    /// The log and conversation history are extended; the adventure is
    /// carried over unchanged.
    pub fn advanced(
        &self,
        action: &str,
        battlemap: Battlemap,
        player_pos: Coord,
        change_type: ChangeType,
        description: String,
    ) -> Self {
        let mut log = self.log.clone();
        log.push(description.clone());

        let mut conversation_history = self.conversation_history.clone();
        conversation_history.push(Exchange {
            action: action.to_string(),
            response: description,
        });

        Self {
            battlemap,
            player_pos,
            last_action: action.to_string(),
            log,
            conversation_history,
            change_type,
            adventure: self.adventure.clone(),
        }
    }

    /// The most recent `window` exchanges, oldest first.
    pub fn recent_exchanges(&self, window: usize) -> &[Exchange] {
        let start = self.conversation_history.len().saturating_sub(window);
        &self.conversation_history[start..]
    }

    /// The newest narration, if any.
    pub fn latest_description(&self) -> Option<&str> {
        self.log.last().map(String::as_str)
    }
}
