//! Response schemas shared with the model.
//!
//! Each schema is offered to Claude as a tool that the model is forced to
//! call, so the tool's `input_schema` doubles as the response contract.
//! Payloads coming back are checked for every required field before they
//! are decoded into typed values; a missing field is never defaulted.

use crate::battlemap::Battlemap;
use crate::coords::{Coord, CoordError, KEY_PATTERN};
use crate::state::{Adventure, ChangeType};
use claude::Tool;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Map, Value};
use std::collections::BTreeMap;
use thiserror::Error;

pub const STATE_TRANSITION_TOOL: &str = "update_game_state";
pub const INITIAL_STATE_TOOL: &str = "create_initial_state";
pub const ADVENTURE_TOOL: &str = "create_adventure";

pub const STATE_TRANSITION_REQUIRED: &[&str] =
    &["change_type", "battlemap", "player_pos", "description"];
pub const INITIAL_STATE_REQUIRED: &[&str] = &["battlemap", "player_pos", "initial_description"];
pub const ADVENTURE_REQUIRED: &[&str] = &[
    "title",
    "setting",
    "objective",
    "challenges",
    "key_locations",
    "npcs",
];

/// Errors from validating a payload against a schema.
#[derive(Debug, Error)]
pub enum SchemaError {
    #[error("payload is not a JSON object")]
    NotAnObject,

    #[error("missing required field `{0}`")]
    MissingField(String),

    #[error("invalid field `{field}`: {source}")]
    InvalidField {
        field: &'static str,
        #[source]
        source: CoordError,
    },

    #[error("payload does not match schema: {0}")]
    Type(#[from] serde_json::Error),
}

/// Check that `payload` is an object carrying every field in `required`.
pub fn require_fields<'a>(
    payload: &'a Value,
    required: &[&str],
) -> Result<&'a Map<String, Value>, SchemaError> {
    let object = payload.as_object().ok_or(SchemaError::NotAnObject)?;
    for field in required {
        if !object.contains_key(*field) {
            return Err(SchemaError::MissingField(field.to_string()));
        }
    }
    Ok(object)
}

fn decode<T: DeserializeOwned>(payload: Value, required: &[&str]) -> Result<T, SchemaError> {
    require_fields(&payload, required)?;
    Ok(serde_json::from_value(payload)?)
}

fn decode_battlemap(wire: BTreeMap<String, String>) -> Result<Battlemap, SchemaError> {
    Battlemap::from_wire(wire).map_err(|source| SchemaError::InvalidField {
        field: "battlemap",
        source,
    })
}

fn decode_position(pair: &[i64]) -> Result<Coord, SchemaError> {
    Coord::from_pair(pair).map_err(|source| SchemaError::InvalidField {
        field: "player_pos",
        source,
    })
}

#[derive(Debug, Deserialize)]
struct TransitionPayload {
    change_type: ChangeType,
    battlemap: BTreeMap<String, String>,
    player_pos: Vec<i64>,
    description: String,
}

#[derive(Debug, Deserialize)]
struct InitialStatePayload {
    battlemap: BTreeMap<String, String>,
    player_pos: Vec<i64>,
    initial_description: String,
}

/// A state-transition payload that passed validation.
///
/// The battlemap keys are decoded, but the map has not been sanitized yet.
#[derive(Debug, Clone, PartialEq)]
pub struct StateUpdate {
    pub change_type: ChangeType,
    pub battlemap: Battlemap,
    pub player_pos: Coord,
    pub description: String,
}

/// An initial-state payload that passed validation.
#[derive(Debug, Clone, PartialEq)]
pub struct InitialState {
    pub battlemap: Battlemap,
    pub player_pos: Coord,
    pub description: String,
}

/// Validate and decode a state-transition payload.
pub fn decode_transition(payload: Value) -> Result<StateUpdate, SchemaError> {
    let raw: TransitionPayload = decode(payload, STATE_TRANSITION_REQUIRED)?;
    Ok(StateUpdate {
        change_type: raw.change_type,
        battlemap: decode_battlemap(raw.battlemap)?,
        player_pos: decode_position(&raw.player_pos)?,
        description: raw.description,
    })
}

/// Validate and decode an initial-state payload.
pub fn decode_initial_state(payload: Value) -> Result<InitialState, SchemaError> {
    let raw: InitialStatePayload = decode(payload, INITIAL_STATE_REQUIRED)?;
    Ok(InitialState {
        battlemap: decode_battlemap(raw.battlemap)?,
        player_pos: decode_position(&raw.player_pos)?,
        description: raw.initial_description,
    })
}

/// Validate and decode an adventure payload.
pub fn decode_adventure(payload: Value) -> Result<Adventure, SchemaError> {
    decode(payload, ADVENTURE_REQUIRED)
}

fn battlemap_schema(description: &str) -> Value {
    json!({
        "type": "object",
        "description": description,
        "patternProperties": {
            KEY_PATTERN: {
                "type": "string",
                "description": "An emoji representing the terrain or object at this coordinate. Must be one of the emojis defined in the legend (e.g., 🏰, 🌳, 🌾, 🏠, etc.). Never use player emojis (🤺, 🚶, 🤴) here."
            }
        },
        "additionalProperties": false
    })
}

fn player_pos_schema(description: &str) -> Value {
    json!({
        "type": "array",
        "description": description,
        "items": {"type": "integer", "minimum": 0, "maximum": 5},
        "minItems": 2,
        "maxItems": 2
    })
}

/// The tool the model calls to answer a player action.
pub fn state_transition_tool() -> Tool {
    Tool {
        name: STATE_TRANSITION_TOOL.to_string(),
        description: "Update the game state after the player's action: the battlemap, the player's position and a narrative description of what happened.".to_string(),
        input_schema: json!({
            "type": "object",
            "properties": {
                "change_type": {
                    "type": "string",
                    "enum": ["same_map", "new_map"],
                    "description": "Use 'same_map' for actions that don't significantly change the environment, and 'new_map' for actions that lead to a new area or drastically alter the current one."
                },
                "battlemap": battlemap_schema(
                    "Represents the 6x6 game grid. Each key is a coordinate tuple '(x, y)' where x and y range from 0 to 5. The value is an emoji representing the terrain or object at that location. This should reflect all changes made by the player's action, including environmental changes, item pickups, or NPC movements. Never include player emojis in this map."
                ),
                "player_pos": player_pos_schema(
                    "The player's new position after the action as [x, y]. Updated if the player moves, unchanged otherwise."
                ),
                "description": {
                    "type": "string",
                    "description": "A brief, engaging narrative of what happened as a result of the player's action, written in second person ('You...'), 2-3 sentences long."
                }
            },
            "required": STATE_TRANSITION_REQUIRED
        }),
    }
}

/// The tool the model calls to lay out the opening scene of an adventure.
pub fn initial_state_tool() -> Tool {
    Tool {
        name: INITIAL_STATE_TOOL.to_string(),
        description: "Create the opening game state for an adventure: a 6x6 battlemap, the player's starting position and an initial description.".to_string(),
        input_schema: json!({
            "type": "object",
            "properties": {
                "battlemap": battlemap_schema(
                    "A 6x6 grid representing the initial game map. Keys are coordinate tuples '(x, y)', values are emoji representations."
                ),
                "player_pos": player_pos_schema("The initial player position as [x, y] coordinates."),
                "initial_description": {
                    "type": "string",
                    "description": "A brief description of the initial game state and the player's surroundings."
                }
            },
            "required": INITIAL_STATE_REQUIRED
        }),
    }
}

/// The tool the model calls to invent an adventure premise.
pub fn adventure_tool() -> Tool {
    Tool {
        name: ADVENTURE_TOOL.to_string(),
        description: "Create an adventure premise from the player's theme.".to_string(),
        input_schema: json!({
            "type": "object",
            "properties": {
                "title": {"type": "string", "description": "The title of the adventure"},
                "setting": {"type": "string", "description": "A brief description of the adventure's setting"},
                "objective": {"type": "string", "description": "The main objective or goal of the adventure"},
                "challenges": {
                    "type": "array",
                    "items": {"type": "string"},
                    "description": "A list of challenges or obstacles the player might face"
                },
                "key_locations": {
                    "type": "array",
                    "items": {"type": "string"},
                    "description": "A list of important locations in the adventure"
                },
                "npcs": {
                    "type": "array",
                    "items": {
                        "type": "object",
                        "properties": {
                            "name": {"type": "string"},
                            "description": {"type": "string"}
                        },
                        "required": ["name", "description"]
                    },
                    "description": "A list of important NPCs in the adventure"
                }
            },
            "required": ADVENTURE_REQUIRED
        }),
    }
}
