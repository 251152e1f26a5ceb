//! Web front-end for the emoji tabletop.
//!
//! Serves the landing page, the game room and the htmx fragments that
//! drive play. All game state lives in one [`SharedSession`]; the server
//! holds no other mutable state.

pub mod render;
pub mod routes;

use axum::Router;
use render::Templates;
use std::net::SocketAddr;
use std::sync::Arc;
use tabletop_core::{Engine, Session, SessionConfig, SharedSession};
use tower_http::trace::TraceLayer;
use tracing::info;

#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<Engine>,
    pub session: SharedSession,
    pub templates: Arc<Templates>,
}

impl AppState {
    pub fn new(engine: Engine, config: SessionConfig) -> anyhow::Result<Self> {
        Ok(Self {
            engine: Arc::new(engine),
            session: SharedSession::new(Session::new(config)),
            templates: Arc::new(Templates::new()?),
        })
    }
}

pub fn build_router(state: AppState) -> Router {
    routes::router()
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub async fn serve(addr: SocketAddr, state: AppState) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    serve_listener(listener, state, async {
        let _ = tokio::signal::ctrl_c().await;
    })
    .await?;
    Ok(())
}

pub async fn serve_listener(
    listener: tokio::net::TcpListener,
    state: AppState,
    shutdown: impl std::future::Future<Output = ()> + Send + 'static,
) -> anyhow::Result<SocketAddr> {
    let app = build_router(state);
    let addr = listener.local_addr()?;
    info!(%addr, "listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await?;
    Ok(addr)
}
