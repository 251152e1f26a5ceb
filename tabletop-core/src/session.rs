//! Session - the per-player game context.
//!
//! A `Session` owns the history of game states, the current adventure and
//! the in-flight flag. It never talks to the model itself: callers take a
//! [`Turn`] ticket, run the engine against the ticket's snapshot, and then
//! commit or abandon the ticket. [`SharedSession`] packages that dance for
//! async callers.

use crate::battlemap::Battlemap;
use crate::coords::Coord;
use crate::dm::{Engine, EngineError, Telemetry, Transition};
use crate::history::{History, DEFAULT_CAPACITY};
use crate::state::{Adventure, GameState};
use std::collections::BTreeSet;
use std::future::Future;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{Mutex, MutexGuard};
use tracing::{debug, info, warn};

/// Errors from session operations.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("A turn is already in progress")]
    Busy,

    #[error("No adventure has been generated yet")]
    NoAdventure,

    #[error("No action given and no previous action to repeat")]
    EmptyAction,

    #[error("The game was restarted while the turn was in progress")]
    Restarted,

    #[error("Engine error: {0}")]
    Engine(#[from] EngineError),
}

/// Configuration for a session.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Number of states kept for back/forward navigation.
    pub history_capacity: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            history_capacity: DEFAULT_CAPACITY,
        }
    }
}

impl SessionConfig {
    pub fn with_history_capacity(mut self, capacity: usize) -> Self {
        self.history_capacity = capacity;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TurnKind {
    Action,
    Opening,
    Adventure,
}

/// A ticket for one in-flight model call.
///
/// Holds a snapshot of the state the call is based on. Hand it back to
/// [`Session::commit`] or [`Session::abandon`] when the call finishes.
#[derive(Debug)]
#[must_use = "a turn must be committed or abandoned"]
pub struct Turn {
    epoch: u64,
    kind: TurnKind,
    action: String,
    prior: GameState,
}

impl Turn {
    /// The normalized action text (empty for non-action turns).
    pub fn action(&self) -> &str {
        &self.action
    }

    /// The state this turn is based on.
    pub fn prior(&self) -> &GameState {
        &self.prior
    }
}

/// Lowercase and trim a raw player action.
pub fn normalize_action(raw: &str) -> String {
    raw.trim().to_lowercase()
}

/// The game context for one player.
#[derive(Debug)]
pub struct Session {
    history: History,
    adventure: Option<Arc<Adventure>>,
    in_flight: bool,
    epoch: u64,
    last_telemetry: Telemetry,
}

impl Default for Session {
    fn default() -> Self {
        Self::new(SessionConfig::default())
    }
}

impl Session {
    /// A session on the default castle map.
    pub fn new(config: SessionConfig) -> Self {
        Self {
            history: History::new(config.history_capacity, GameState::default()),
            adventure: None,
            in_flight: false,
            epoch: 0,
            last_telemetry: Telemetry::default(),
        }
    }

    fn ticket(&mut self, kind: TurnKind, action: String) -> Result<Turn, SessionError> {
        if self.in_flight {
            return Err(SessionError::Busy);
        }
        self.in_flight = true;
        Ok(Turn {
            epoch: self.epoch,
            kind,
            action,
            prior: self.history.current().clone(),
        })
    }

    /// Start a player action.
    ///
    /// The action is lowercased and trimmed; an empty action repeats the
    /// last one.
    pub fn begin_turn(&mut self, raw_action: &str) -> Result<Turn, SessionError> {
        if self.in_flight {
            return Err(SessionError::Busy);
        }

        let mut action = normalize_action(raw_action);
        if action.is_empty() {
            action = self.current().last_action.clone();
        }
        if action.is_empty() {
            return Err(SessionError::EmptyAction);
        }

        self.ticket(TurnKind::Action, action)
    }

    /// Start laying out the opening scene of the current adventure.
    pub fn begin_opening(&mut self) -> Result<(Turn, Arc<Adventure>), SessionError> {
        if self.in_flight {
            return Err(SessionError::Busy);
        }
        let adventure = self.adventure.clone().ok_or(SessionError::NoAdventure)?;
        let turn = self.ticket(TurnKind::Opening, String::new())?;
        Ok((turn, adventure))
    }

    /// Start generating a new adventure.
    pub fn begin_adventure(&mut self) -> Result<Turn, SessionError> {
        self.ticket(TurnKind::Adventure, String::new())
    }

    /// Record a finished transition.
    ///
    /// An action appends to the history; an opening scene starts a fresh
    /// history. Returns false if the session was restarted after the turn
    /// began, in which case nothing changes. An adventure ticket carries no
    /// transition: it is abandoned here and false is returned.
    pub fn commit(&mut self, turn: Turn, transition: Transition) -> bool {
        let opening = match turn.kind {
            TurnKind::Action => false,
            TurnKind::Opening => true,
            TurnKind::Adventure => {
                warn!("adventure turn handed to commit; abandoning it");
                self.abandon(turn);
                return false;
            }
        };
        if !self.settle(&turn) {
            return false;
        }
        if opening {
            self.history.reset(transition.state);
        } else {
            self.history.push(transition.state);
        }
        self.last_telemetry = transition.telemetry;
        debug!(
            position = self.history.position(),
            len = self.history.len(),
            "committed turn"
        );
        true
    }

    /// Record a freshly generated adventure.
    pub fn commit_adventure(&mut self, turn: Turn, adventure: Adventure, telemetry: Telemetry) -> bool {
        if !self.settle(&turn) {
            return false;
        }
        self.adventure = Some(Arc::new(adventure));
        self.last_telemetry = telemetry;
        true
    }

    /// Give up on a turn. The history is untouched.
    ///
    /// A turn from before a restart changes nothing.
    pub fn abandon(&mut self, turn: Turn) {
        if self.settle(&turn) {
            self.last_telemetry = Telemetry::default();
        }
    }

    fn settle(&mut self, turn: &Turn) -> bool {
        if turn.epoch != self.epoch {
            return false;
        }
        self.in_flight = false;
        true
    }

    /// Throw everything away and return to the castle map.
    ///
    /// Turns that began before the restart can no longer be committed.
    pub fn restart(&mut self) {
        info!("restarting session");
        self.epoch += 1;
        self.in_flight = false;
        self.history.reset(GameState::default());
        self.adventure = None;
        self.last_telemetry = Telemetry::default();
    }

    /// Step back through the history.
    pub fn go_back(&mut self) -> Result<bool, SessionError> {
        if self.in_flight {
            return Err(SessionError::Busy);
        }
        Ok(self.history.back())
    }

    /// Step forward through the history.
    pub fn go_forward(&mut self) -> Result<bool, SessionError> {
        if self.in_flight {
            return Err(SessionError::Busy);
        }
        Ok(self.history.forward())
    }

    /// The state being viewed.
    pub fn current(&self) -> &GameState {
        self.history.current()
    }

    /// The state before the one being viewed.
    pub fn previous(&self) -> Option<&GameState> {
        self.history.previous()
    }

    /// Cells that differ between the previous and current maps.
    pub fn changed_cells(&self) -> BTreeSet<Coord> {
        let current = &self.current().battlemap;
        match self.previous() {
            Some(previous) => previous.battlemap.diff(current),
            None => BTreeSet::new(),
        }
    }

    /// The previous map, or an empty one at the start of the history.
    pub fn previous_battlemap(&self) -> Battlemap {
        self.previous()
            .map(|s| s.battlemap.clone())
            .unwrap_or_default()
    }

    pub fn history(&self) -> &History {
        &self.history
    }

    pub fn adventure(&self) -> Option<&Arc<Adventure>> {
        self.adventure.as_ref()
    }

    pub fn is_busy(&self) -> bool {
        self.in_flight
    }

    /// Telemetry of the most recent model call (zero after a failure).
    pub fn last_telemetry(&self) -> Telemetry {
        self.last_telemetry
    }
}

/// A session shared between request handlers.
///
/// The lock is never held across a model call. Each model call and the
/// commit that follows it run on their own task, so a caller that stops
/// waiting (a dropped request) still leaves the turn settled.
#[derive(Debug, Clone, Default)]
pub struct SharedSession {
    inner: Arc<Mutex<Session>>,
}

impl SharedSession {
    pub fn new(session: Session) -> Self {
        Self {
            inner: Arc::new(Mutex::new(session)),
        }
    }

    /// Lock the session for reading or navigation.
    pub async fn lock(&self) -> MutexGuard<'_, Session> {
        self.inner.lock().await
    }

    /// Run one player action through the engine and commit the result.
    pub async fn act(&self, engine: &Engine, raw_action: &str) -> Result<Telemetry, SessionError> {
        let turn = self.inner.lock().await.begin_turn(raw_action)?;
        let engine = engine.clone();
        let shared = self.clone();
        settle_detached(async move {
            let result = engine.advance(turn.prior(), turn.action()).await;
            shared.finish(turn, result).await
        })
        .await
    }

    /// Lay out the opening scene of the session's adventure.
    pub async fn start_adventure(&self, engine: &Engine) -> Result<Telemetry, SessionError> {
        let (turn, adventure) = self.inner.lock().await.begin_opening()?;
        let engine = engine.clone();
        let shared = self.clone();
        settle_detached(async move {
            let result = engine.begin(adventure).await;
            shared.finish(turn, result).await
        })
        .await
    }

    /// Generate a new adventure from `theme` and store it in the session.
    pub async fn generate_adventure(
        &self,
        engine: &Engine,
        theme: &str,
    ) -> Result<Arc<Adventure>, SessionError> {
        let turn = self.inner.lock().await.begin_adventure()?;
        let engine = engine.clone();
        let shared = self.clone();
        let theme = theme.to_string();
        settle_detached(async move {
            let result = engine.generate_adventure(&theme).await;

            let mut session = shared.inner.lock().await;
            match result {
                Ok((adventure, telemetry)) => {
                    if !session.commit_adventure(turn, adventure, telemetry) {
                        return Err(SessionError::Restarted);
                    }
                    session.adventure().cloned().ok_or(SessionError::NoAdventure)
                }
                Err(e) => {
                    session.abandon(turn);
                    Err(e.into())
                }
            }
        })
        .await
    }

    async fn finish(
        &self,
        turn: Turn,
        result: Result<Transition, EngineError>,
    ) -> Result<Telemetry, SessionError> {
        let mut session = self.inner.lock().await;
        match result {
            Ok(transition) => {
                let telemetry = transition.telemetry;
                if session.commit(turn, transition) {
                    Ok(telemetry)
                } else {
                    Err(SessionError::Restarted)
                }
            }
            Err(e) => {
                session.abandon(turn);
                Err(e.into())
            }
        }
    }
}

/// Run a turn to completion on its own task and wait for it.
async fn settle_detached<T, F>(turn: F) -> Result<T, SessionError>
where
    T: Send + 'static,
    F: Future<Output = Result<T, SessionError>> + Send + 'static,
{
    tokio::spawn(turn)
        .await
        .map_err(|e| SessionError::Engine(EngineError::Worker(e.to_string())))?
}
