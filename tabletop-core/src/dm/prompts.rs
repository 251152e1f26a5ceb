//! Prompt construction for the three kinds of completion.

use crate::battlemap::LEGEND;
use crate::state::{Adventure, GameState};

/// System prompt for turn-by-turn state transitions.
pub fn transition_system_prompt(adventure: Option<&Adventure>) -> String {
    let mut prompt = String::new();

    prompt.push_str(include_str!("prompts/world_rules.txt"));

    prompt.push_str("\n\n");
    prompt.push_str(&legend());

    prompt.push_str("\n\n");
    prompt.push_str(include_str!("prompts/examples.txt"));

    prompt.push_str("\n\n");
    prompt.push_str(include_str!("prompts/reminders.txt"));

    if let Some(adventure) = adventure {
        prompt.push('\n');
        prompt.push_str(&adventure_context(adventure));
        prompt.push_str(
            "\nUse this adventure to inform your responses and guide the player through it. \
             Weave its locations, challenges and characters into the world and the narrative.\n",
        );
    }

    prompt
}

/// User message for one player action against the prior state.
pub fn transition_user_message(prior: &GameState, action: &str, history_window: usize) -> String {
    let recent: Vec<String> = prior
        .recent_exchanges(history_window)
        .iter()
        .map(|e| format!("User action: {}\nAI response: {}", e.action, e.response))
        .collect();
    let recent = if recent.is_empty() {
        "(none yet)".to_string()
    } else {
        recent.join("\n")
    };

    format!(
        "Current battlemap:\n{}\nPlayer position: {}\nRecent conversation:\n{}\nUser action: {}\n\n\
         Update the battlemap and provide a brief description of what happened.",
        prior.battlemap.to_prompt_lines(),
        prior.player_pos,
        recent,
        action
    )
}

/// System prompt for laying out the opening scene.
pub fn initial_state_system_prompt() -> String {
    let mut prompt = String::from(
        "You are an AI dungeon master tasked with creating an initial game state based on an adventure setup.\n\n",
    );
    prompt.push_str(include_str!("prompts/world_rules.txt"));
    prompt.push_str("\n\n");
    prompt.push_str(&legend());
    prompt
}

/// User message asking for the opening scene of `adventure`.
pub fn initial_state_user_message(adventure: &Adventure) -> String {
    format!(
        "Generate an initial game state for this adventure:\n{}\n\
         Provide a 6x6 battlemap, player position, and initial description.",
        adventure_context(adventure)
    )
}

/// System prompt for inventing an adventure.
pub fn adventure_system_prompt() -> &'static str {
    "You are a creative storyteller tasked with generating a random adventure based on user input."
}

/// User message carrying the player's theme.
pub fn adventure_user_message(theme: &str) -> String {
    let theme = theme.trim();
    if theme.is_empty() {
        "Generate a random adventure. Pick any theme you like.".to_string()
    } else {
        format!("Generate a random adventure based on this input: {theme}")
    }
}

fn legend() -> String {
    let mut out = String::from("## Legend\n");
    for (symbol, meaning) in LEGEND {
        out.push_str(&format!("{symbol} - {meaning}\n"));
    }
    out.push_str("The player (🤺) is not included in the battlemap.\n");
    out
}

fn adventure_context(adventure: &Adventure) -> String {
    let mut out = String::new();
    out.push_str(&format!("## Current Adventure: {}\n", adventure.title));
    out.push_str(&format!("**Setting:** {}\n", adventure.setting));
    out.push_str(&format!("**Objective:** {}\n", adventure.objective));

    if !adventure.challenges.is_empty() {
        out.push_str("\n### Challenges\n");
        for challenge in &adventure.challenges {
            out.push_str(&format!("- {challenge}\n"));
        }
    }

    if !adventure.key_locations.is_empty() {
        out.push_str("\n### Key Locations\n");
        for location in &adventure.key_locations {
            out.push_str(&format!("- {location}\n"));
        }
    }

    if !adventure.npcs.is_empty() {
        out.push_str("\n### NPCs\n");
        for npc in &adventure.npcs {
            out.push_str(&format!("- **{}**: {}\n", npc.name, npc.description));
        }
    }

    out
}
