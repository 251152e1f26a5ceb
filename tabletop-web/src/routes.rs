//! Route handlers.
//!
//! Full pages are returned for `/`, `/game`, `/start` and `/restart`; the
//! remaining POST routes return the fragment htmx swaps into the page.
//! Model failures are rendered as a retryable notice with status 200 so
//! htmx still swaps them in; misuse of the session is a 409.

use crate::render::AreaOptions;
use crate::AppState;
use axum::extract::{Form, State};
use axum::http::StatusCode;
use axum::response::Html;
use axum::routing::{get, post};
use axum::Router;
use serde::Deserialize;
use tabletop_core::SessionError;
use tracing::{error, warn};

type HandlerResult = Result<Html<String>, (StatusCode, String)>;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(index))
        .route("/health", get(health))
        .route("/adventure", post(adventure))
        .route("/start", post(start))
        .route("/game", get(game))
        .route("/action", post(action))
        .route("/highlight_diff", post(highlight_diff))
        .route("/go_back", post(go_back))
        .route("/go_forward", post(go_forward))
        .route("/restart", post(restart))
}

#[derive(Debug, Deserialize)]
pub struct ThemeForm {
    #[serde(default)]
    pub theme: String,
}

#[derive(Debug, Deserialize)]
pub struct ActionForm {
    #[serde(default)]
    pub action: String,
}

async fn health() -> &'static str {
    "ok"
}

async fn index(State(state): State<AppState>) -> HandlerResult {
    let session = state.session.lock().await;
    let adventure = session.adventure().map(|a| a.as_ref());
    state
        .templates
        .index(adventure)
        .map(Html)
        .map_err(internal_error("render index"))
}

async fn adventure(State(state): State<AppState>, Form(form): Form<ThemeForm>) -> HandlerResult {
    let templates = &state.templates;
    let rendered = match state
        .session
        .generate_adventure(&state.engine, &form.theme)
        .await
    {
        Ok(adventure) => templates.premise(Some(adventure.as_ref()), None),
        Err(SessionError::Engine(e)) => templates.premise(None, Some(&retry_notice(&e))),
        Err(e) => return Err(conflict(e)),
    };
    rendered.map(Html).map_err(internal_error("render premise"))
}

async fn start(State(state): State<AppState>) -> HandlerResult {
    let options = match state.session.start_adventure(&state.engine).await {
        Ok(_) => AreaOptions::after_turn(),
        Err(SessionError::Engine(e)) => AreaOptions::default().with_notice(retry_notice(&e)),
        Err(e) => return Err(conflict(e)),
    };
    let session = state.session.lock().await;
    state
        .templates
        .game(&session, options)
        .map(Html)
        .map_err(internal_error("render game"))
}

async fn game(State(state): State<AppState>) -> HandlerResult {
    let session = state.session.lock().await;
    state
        .templates
        .game(&session, AreaOptions::default())
        .map(Html)
        .map_err(internal_error("render game"))
}

async fn action(State(state): State<AppState>, Form(form): Form<ActionForm>) -> HandlerResult {
    let options = match state.session.act(&state.engine, &form.action).await {
        Ok(_) => AreaOptions::after_turn(),
        Err(SessionError::Engine(e)) => AreaOptions::default().with_notice(retry_notice(&e)),
        Err(e @ SessionError::EmptyAction) => AreaOptions::default().with_notice(e.to_string()),
        Err(e) => return Err(conflict(e)),
    };
    render_area(&state, options).await
}

async fn highlight_diff(State(state): State<AppState>) -> HandlerResult {
    render_area(&state, AreaOptions::highlighted()).await
}

async fn go_back(State(state): State<AppState>) -> HandlerResult {
    state.session.lock().await.go_back().map_err(conflict)?;
    render_area(&state, AreaOptions::default()).await
}

async fn go_forward(State(state): State<AppState>) -> HandlerResult {
    state.session.lock().await.go_forward().map_err(conflict)?;
    render_area(&state, AreaOptions::default()).await
}

async fn restart(State(state): State<AppState>) -> HandlerResult {
    let mut session = state.session.lock().await;
    session.restart();
    state
        .templates
        .game(&session, AreaOptions::default())
        .map(Html)
        .map_err(internal_error("render game"))
}

async fn render_area(state: &AppState, options: AreaOptions) -> HandlerResult {
    let session = state.session.lock().await;
    state
        .templates
        .game_area(&session, options)
        .map(Html)
        .map_err(internal_error("render game area"))
}

fn retry_notice(e: &tabletop_core::EngineError) -> String {
    warn!(error = %e, "model call failed");
    format!("The Dungeon Master lost the thread ({e}). Please try again.")
}

fn conflict(e: SessionError) -> (StatusCode, String) {
    (StatusCode::CONFLICT, e.to_string())
}

fn internal_error(ctx: &'static str) -> impl FnOnce(minijinja::Error) -> (StatusCode, String) {
    move |e| {
        error!(error = %e, "{ctx}");
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("{ctx}: {e}"),
        )
    }
}
