//! Integration tests that call the real Claude API.
//!
//! These tests require ANTHROPIC_API_KEY to be set (via .env file or environment).
//! Run with: `cargo test -p tabletop-core --test api_integration -- --ignored`
//!
//! These are marked #[ignore] by default to avoid:
//! - API costs in CI
//! - Test failures when no API key is available
//! - Slow test runs (API calls take seconds)

use std::sync::Arc;
use tabletop_core::testing::assert_no_player_markers;
use tabletop_core::{Engine, EngineConfig, GameState};

/// Load environment variables from .env file
fn setup() {
    let _ = dotenvy::dotenv();
}

/// Check if API key is available
fn has_api_key() -> bool {
    std::env::var("ANTHROPIC_API_KEY").is_ok()
}

fn engine() -> Engine {
    Engine::from_env()
        .expect("Failed to create engine")
        .with_config(EngineConfig::default().with_max_tokens(2048))
}

#[tokio::test]
#[ignore] // Run with: cargo test -p tabletop-core --test api_integration -- --ignored
async fn test_move_north_with_real_api() {
    setup();
    if !has_api_key() {
        eprintln!("Skipping test: ANTHROPIC_API_KEY not set");
        return;
    }

    let prior = GameState::default();
    let transition = engine()
        .advance(&prior, "move north")
        .await
        .expect("engine should respond");

    println!("Description: {}", transition.state.log.last().unwrap());
    println!("Telemetry: {:?}", transition.telemetry);
    println!(
        "{}",
        transition.state.battlemap.render_text(transition.state.player_pos)
    );

    assert_no_player_markers(&transition.state.battlemap);
    assert_eq!(transition.state.log.len(), 1);
    assert!(transition.telemetry.input_tokens > 0);
}

#[tokio::test]
#[ignore]
async fn test_adventure_and_opening_with_real_api() {
    setup();
    if !has_api_key() {
        eprintln!("Skipping test: ANTHROPIC_API_KEY not set");
        return;
    }

    let engine = engine();
    let (adventure, _) = engine
        .generate_adventure("space pirates")
        .await
        .expect("adventure should be generated");

    println!("Adventure: {adventure:#?}");
    assert!(!adventure.title.is_empty());
    assert!(!adventure.npcs.is_empty());

    let opening = engine
        .begin(Arc::new(adventure))
        .await
        .expect("opening scene should be generated");

    assert_no_player_markers(&opening.state.battlemap);
    assert_eq!(opening.state.log.len(), 1);
}
