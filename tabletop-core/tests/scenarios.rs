//! Scripted game scenarios that run without API calls.
//!
//! Run with: `cargo test -p tabletop-core --test scenarios`

use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tabletop_core::battlemap::NEUTRAL_TERRAIN;
use tabletop_core::dm::{EngineError, Telemetry};
use tabletop_core::schema::SchemaError;
use tabletop_core::testing::{assert_log_extends, assert_no_player_markers, fixtures};
use tabletop_core::{
    Battlemap, ChangeType, Coord, Engine, EngineConfig, GameState, ScriptedProvider,
    SessionError, SharedSession,
};

fn at(x: i64, y: i64) -> Coord {
    Coord::new(x, y).unwrap()
}

fn engine(provider: &ScriptedProvider) -> Engine {
    Engine::new(Arc::new(provider.clone()))
}

// =============================================================================
// STATE TRANSITIONS
// =============================================================================

#[tokio::test]
async fn test_move_north_from_default_map() {
    let provider = ScriptedProvider::new().with_tool_call(fixtures::move_north());
    let prior = GameState::default();

    let next = engine(&provider)
        .advance(&prior, "move north")
        .await
        .unwrap()
        .state;

    assert_eq!(next.change_type, ChangeType::SameMap);
    assert_eq!(next.player_pos, at(2, 1));
    assert_eq!(next.battlemap, prior.battlemap);
    assert_log_extends(&prior, &next);
    assert_eq!(next.conversation_history[0].action, "move north");
}

#[tokio::test]
async fn test_entering_a_building_changes_map() {
    let provider = ScriptedProvider::new().with_tool_call(fixtures::enter_tavern());

    let next = engine(&provider)
        .advance(&GameState::default(), "enter the tavern")
        .await
        .unwrap()
        .state;

    assert_eq!(next.change_type, ChangeType::NewMap);
    assert_eq!(next.battlemap.get(at(2, 0)), Some("🚪"));
}

#[tokio::test]
async fn test_every_reserved_marker_is_replaced() {
    let mut payload = fixtures::move_north();
    payload["battlemap"]["(0, 0)"] = json!("🤺");
    payload["battlemap"]["(5, 0)"] = json!("🚶");
    payload["battlemap"]["(0, 5)"] = json!("🤴");
    let provider = ScriptedProvider::new().with_tool_call(payload);

    let next = engine(&provider)
        .advance(&GameState::default(), "look around")
        .await
        .unwrap()
        .state;

    assert_no_player_markers(&next.battlemap);
    for cell in [at(0, 0), at(5, 0), at(0, 5)] {
        assert_eq!(next.battlemap.get(cell), Some(NEUTRAL_TERRAIN));
    }
}

#[tokio::test]
async fn test_log_is_append_only_over_many_turns() {
    let mut provider = ScriptedProvider::new();
    let map = Battlemap::castle();
    for i in 0..12 {
        provider = provider.with_tool_call(fixtures::transition(
            &map,
            at(i % 6, 3),
            "same_map",
            &format!("Step {i}."),
        ));
    }
    let engine = engine(&provider);

    let mut state = GameState::default();
    for i in 0..12 {
        let next = engine
            .advance(&state, &format!("step {i}"))
            .await
            .unwrap()
            .state;
        assert_log_extends(&state, &next);
        state = next;
    }

    assert_eq!(state.log.len(), 12);
    assert_eq!(state.conversation_history.len(), 12);

    // Only the last five exchanges are replayed into the prompt.
    let last = provider.last_request().unwrap();
    let prompt = last.messages[0].content[0].as_text().unwrap().to_string();
    assert!(prompt.contains("User action: step 6\nAI response: Step 6."));
    assert!(!prompt.contains("User action: step 5\n"));
}

#[tokio::test]
async fn test_missing_player_pos_leaves_prior_intact() {
    let mut payload = fixtures::move_north();
    payload.as_object_mut().unwrap().remove("player_pos");
    let provider = ScriptedProvider::new().with_tool_call(payload);
    let prior = GameState::default();
    let snapshot = prior.clone();

    let err = engine(&provider)
        .advance(&prior, "move north")
        .await
        .unwrap_err();

    assert!(matches!(err, EngineError::Schema(SchemaError::MissingField(_))));
    assert_eq!(prior, snapshot);
}

#[tokio::test]
async fn test_out_of_grid_keys_are_rejected() {
    for key in ["(6, 0)", "(0, -1)", "(1,1)", "__import__('os')", "(2, 2, 2)"] {
        let mut payload = fixtures::move_north();
        payload["battlemap"][key] = json!("🌳");
        let provider = ScriptedProvider::new().with_tool_call(payload);

        let err = engine(&provider)
            .advance(&GameState::default(), "look")
            .await
            .unwrap_err();

        assert!(
            matches!(err, EngineError::Schema(SchemaError::InvalidField { field: "battlemap", .. })),
            "key {key} should be rejected, got {err:?}"
        );
    }
}

#[tokio::test]
async fn test_out_of_grid_position_is_rejected() {
    for pos in [json!([6, 0]), json!([0, -1]), json!([1]), json!([1, 2, 3])] {
        let mut payload = fixtures::move_north();
        payload["player_pos"] = pos.clone();
        let provider = ScriptedProvider::new().with_tool_call(payload);

        let err = engine(&provider)
            .advance(&GameState::default(), "run")
            .await
            .unwrap_err();

        assert!(
            matches!(err, EngineError::Schema(SchemaError::InvalidField { field: "player_pos", .. })),
            "position {pos} should be rejected, got {err:?}"
        );
    }
}

// =============================================================================
// ADVENTURES
// =============================================================================

#[tokio::test]
async fn test_space_pirates_adventure() {
    let provider = ScriptedProvider::new()
        .with_tool_call(serde_json::to_value(fixtures::space_pirates()).unwrap());

    let (adventure, telemetry) = engine(&provider)
        .generate_adventure("space pirates")
        .await
        .unwrap();

    assert!(!adventure.title.is_empty());
    assert!(!adventure.setting.is_empty());
    assert!(!adventure.objective.is_empty());
    assert!(!adventure.challenges.is_empty());
    assert!(!adventure.key_locations.is_empty());
    assert!(!adventure.npcs.is_empty());
    assert!(telemetry.input_tokens > 0);

    let request = provider.last_request().unwrap();
    let prompt = request.messages[0].content[0].as_text().unwrap().to_string();
    assert!(prompt.contains("space pirates"));
}

#[tokio::test]
async fn test_adventure_threads_into_later_prompts() {
    let provider = ScriptedProvider::new()
        .with_tool_call(serde_json::to_value(fixtures::space_pirates()).unwrap())
        .with_tool_call(fixtures::initial_state())
        .with_tool_call(fixtures::move_north());
    let engine = engine(&provider);
    let session = SharedSession::default();

    session.generate_adventure(&engine, "space pirates").await.unwrap();
    session.start_adventure(&engine).await.unwrap();
    session.act(&engine, "move north").await.unwrap();

    let system = provider.last_request().unwrap().system.unwrap();
    assert!(system.contains("## Current Adventure: The Nebula Heist"));
    assert!(system.contains("Captain Vex"));

    let session = session.lock().await;
    assert_no_player_markers(&session.current().battlemap);
    assert_eq!(session.current().log.len(), 2);
}

// =============================================================================
// FAILURES
// =============================================================================

#[tokio::test]
async fn test_timeout_reports_zero_telemetry_and_keeps_history() {
    let provider = ScriptedProvider::new()
        .with_tool_call(fixtures::move_north())
        .with_delay(Duration::from_millis(500));
    let engine = engine(&provider)
        .with_config(EngineConfig::default().with_timeout(Duration::from_millis(25)));
    let session = SharedSession::default();

    let err = session.act(&engine, "move north").await.unwrap_err();

    let err = match err {
        SessionError::Engine(err) => err,
        other => panic!("expected an engine error, got {other:?}"),
    };
    assert!(matches!(err, EngineError::Timeout(_)));
    assert_eq!(err.telemetry(), Telemetry::default());

    let session = session.lock().await;
    assert_eq!(session.history().len(), 1);
    assert_eq!(*session.current(), GameState::default());
}

#[tokio::test]
async fn test_failed_turn_can_be_retried() {
    let provider = ScriptedProvider::new()
        .with_text("Sorry, I got lost.")
        .with_tool_call(fixtures::move_north());
    let engine = engine(&provider);
    let session = SharedSession::default();

    assert!(session.act(&engine, "move north").await.is_err());
    session.act(&engine, "move north").await.unwrap();

    let session = session.lock().await;
    assert_eq!(session.history().len(), 2);
    assert_eq!(session.current().player_pos, at(2, 1));
}
