//! The AI Dungeon Master engine.
//!
//! The engine turns a prior [`GameState`] and a player action into the
//! next state by asking the model for a structured update, then
//! validating and repairing what comes back. It never mutates the prior
//! state: callers decide whether to commit the returned state.

use super::prompts;
use super::provider::{Completion, LlmProvider};
use super::response::ResponseError;
use crate::schema::{self, SchemaError};
use crate::state::{Adventure, GameState};
use claude::{Claude, Message, Request, Tool, Usage};
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};

/// Upper bound on a single completion, including time spent queued.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// Errors from the engine. Every variant means "the transition failed";
/// the variant itself is only for diagnostics.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Claude API error: {0}")]
    Transport(#[from] claude::Error),

    #[error("Completion timed out after {0:?}")]
    Timeout(Duration),

    #[error("Unparsable response: {0}")]
    Parse(#[from] ResponseError),

    #[error("Schema violation: {0}")]
    Schema(#[from] SchemaError),

    #[error("Worker task failed: {0}")]
    Worker(String),
}

impl EngineError {
    /// Telemetry reported alongside a failure. Always zero.
    pub fn telemetry(&self) -> Telemetry {
        Telemetry::default()
    }
}

/// Configuration for the engine.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// The model to use (defaults to the client's model).
    pub model: Option<String>,

    /// Maximum tokens for responses.
    pub max_tokens: usize,

    /// Temperature for generation.
    pub temperature: Option<f32>,

    /// Number of recent exchanges replayed into each prompt.
    pub history_window: usize,

    /// Upper bound on each completion.
    pub timeout: Duration,

    /// Maximum completions in flight at once.
    pub max_in_flight: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            model: None,
            max_tokens: 4096,
            temperature: Some(0.8),
            history_window: 5,
            timeout: DEFAULT_TIMEOUT,
            max_in_flight: 4,
        }
    }
}

impl EngineConfig {
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: usize) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn with_history_window(mut self, window: usize) -> Self {
        self.history_window = window;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_max_in_flight(mut self, max_in_flight: usize) -> Self {
        self.max_in_flight = max_in_flight.max(1);
        self
    }
}

/// Token counts and wall-clock latency of one completion.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Telemetry {
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub cache_creation_input_tokens: u64,
    pub cache_read_input_tokens: u64,
    pub latency: Duration,
}

impl Telemetry {
    fn new(usage: Usage, latency: Duration) -> Self {
        Self {
            input_tokens: usage.input_tokens,
            output_tokens: usage.output_tokens,
            cache_creation_input_tokens: usage.cache_creation_input_tokens,
            cache_read_input_tokens: usage.cache_read_input_tokens,
            latency,
        }
    }

    pub fn total_tokens(&self) -> u64 {
        self.input_tokens + self.output_tokens
    }
}

/// A successful transition: the new state and what it cost.
#[derive(Debug, Clone)]
pub struct Transition {
    pub state: GameState,
    pub telemetry: Telemetry,
}

/// The AI Dungeon Master.
///
/// Clones share the provider and the in-flight limit.
#[derive(Clone)]
pub struct Engine {
    provider: Arc<dyn LlmProvider>,
    config: EngineConfig,
    permits: Arc<Semaphore>,
}

impl Engine {
    /// Create an engine backed by any provider.
    pub fn new(provider: Arc<dyn LlmProvider>) -> Self {
        Self::with_provider(provider, EngineConfig::default())
    }

    /// Create an engine backed by Claude, reading ANTHROPIC_API_KEY.
    pub fn from_env() -> Result<Self, EngineError> {
        let client = Claude::from_env()?;
        Ok(Self::new(Arc::new(client)))
    }

    fn with_provider(provider: Arc<dyn LlmProvider>, config: EngineConfig) -> Self {
        let permits = Arc::new(Semaphore::new(config.max_in_flight.max(1)));
        Self {
            provider,
            config,
            permits,
        }
    }

    /// Configure the engine.
    pub fn with_config(self, config: EngineConfig) -> Self {
        Self::with_provider(self.provider, config)
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn provider_name(&self) -> &str {
        self.provider.name()
    }

    /// Advance the game by one player action.
    ///
    /// On success the returned state extends `prior`'s log and
    /// conversation history by one entry each. On failure nothing is
    /// produced and `prior` is untouched.
    pub async fn advance(&self, prior: &GameState, action: &str) -> Result<Transition, EngineError> {
        info!(action, "advancing game state");
        self.try_advance(prior, action)
            .await
            .inspect_err(|e| warn!(action, error = %e, "state transition failed"))
    }

    async fn try_advance(&self, prior: &GameState, action: &str) -> Result<Transition, EngineError> {
        let request = self.request(
            prompts::transition_system_prompt(prior.adventure.as_deref()),
            prompts::transition_user_message(prior, action, self.config.history_window),
            schema::state_transition_tool(),
        );

        let started = Instant::now();
        let completion = self.dispatch(request).await?;
        let payload = completion.response.into_payload()?;
        debug!(%payload, "state transition payload");

        let mut update = schema::decode_transition(payload)?;
        let repaired = update.battlemap.sanitize();
        if !repaired.is_empty() {
            warn!(cells = ?repaired, "replaced player markers on the battlemap");
        }

        let state = prior.advanced(
            action,
            update.battlemap,
            update.player_pos,
            update.change_type,
            update.description,
        );
        let telemetry = Telemetry::new(completion.usage, started.elapsed());
        log_success("state transition", &telemetry);

        Ok(Transition { state, telemetry })
    }

    /// Lay out the opening scene of an adventure.
    pub async fn begin(&self, adventure: Arc<Adventure>) -> Result<Transition, EngineError> {
        info!(title = %adventure.title, "generating initial game state");
        self.try_begin(adventure)
            .await
            .inspect_err(|e| warn!(error = %e, "initial state generation failed"))
    }

    async fn try_begin(&self, adventure: Arc<Adventure>) -> Result<Transition, EngineError> {
        let request = self.request(
            prompts::initial_state_system_prompt(),
            prompts::initial_state_user_message(&adventure),
            schema::initial_state_tool(),
        );

        let started = Instant::now();
        let completion = self.dispatch(request).await?;
        let payload = completion.response.into_payload()?;
        debug!(%payload, "initial state payload");

        let mut initial = schema::decode_initial_state(payload)?;
        let repaired = initial.battlemap.sanitize();
        if !repaired.is_empty() {
            warn!(cells = ?repaired, "replaced player markers on the battlemap");
        }

        let state = GameState::opening(
            initial.battlemap,
            initial.player_pos,
            initial.description,
            adventure,
        );
        let telemetry = Telemetry::new(completion.usage, started.elapsed());
        log_success("initial state", &telemetry);

        Ok(Transition { state, telemetry })
    }

    /// Invent an adventure premise from a free-text theme.
    pub async fn generate_adventure(&self, theme: &str) -> Result<(Adventure, Telemetry), EngineError> {
        info!(theme, "generating adventure");
        self.try_generate_adventure(theme)
            .await
            .inspect_err(|e| warn!(theme, error = %e, "adventure generation failed"))
    }

    async fn try_generate_adventure(&self, theme: &str) -> Result<(Adventure, Telemetry), EngineError> {
        let request = self.request(
            prompts::adventure_system_prompt().to_string(),
            prompts::adventure_user_message(theme),
            schema::adventure_tool(),
        );

        let started = Instant::now();
        let completion = self.dispatch(request).await?;
        let payload = completion.response.into_payload()?;
        debug!(%payload, "adventure payload");

        let adventure = schema::decode_adventure(payload)?;
        let telemetry = Telemetry::new(completion.usage, started.elapsed());
        log_success("adventure", &telemetry);

        Ok((adventure, telemetry))
    }

    fn request(&self, system: String, user: String, tool: Tool) -> Request {
        let mut request = Request::new(vec![Message::user(user)])
            .with_system(system)
            .with_max_tokens(self.config.max_tokens)
            .with_structured_output(tool);

        if let Some(ref model) = self.config.model {
            request = request.with_model(model);
        }

        if let Some(temp) = self.config.temperature {
            request = request.with_temperature(temp);
        }

        request
    }

    /// Run one completion on a worker task, bounded by the in-flight limit
    /// and the configured timeout.
    async fn dispatch(&self, request: Request) -> Result<Completion, EngineError> {
        let timeout = self.config.timeout;
        let provider = Arc::clone(&self.provider);
        let permits = Arc::clone(&self.permits);

        let mut task = tokio::spawn(async move {
            let _permit = permits
                .acquire_owned()
                .await
                .map_err(|e| EngineError::Worker(e.to_string()))?;
            provider.complete(request).await.map_err(EngineError::from)
        });

        match tokio::time::timeout(timeout, &mut task).await {
            Ok(Ok(result)) => result,
            Ok(Err(join_error)) => Err(EngineError::Worker(join_error.to_string())),
            Err(_) => {
                task.abort();
                Err(EngineError::Timeout(timeout))
            }
        }
    }
}

fn log_success(kind: &str, telemetry: &Telemetry) {
    info!(
        kind,
        input_tokens = telemetry.input_tokens,
        output_tokens = telemetry.output_tokens,
        cache_creation_input_tokens = telemetry.cache_creation_input_tokens,
        cache_read_input_tokens = telemetry.cache_read_input_tokens,
        latency_ms = telemetry.latency.as_millis() as u64,
        "completion succeeded"
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::battlemap::{NEUTRAL_TERRAIN, RESERVED_MARKERS};
    use crate::coords::Coord;
    use crate::state::ChangeType;
    use crate::testing::{fixtures, ScriptedProvider};
    use serde_json::json;

    fn engine(provider: ScriptedProvider) -> Engine {
        Engine::new(Arc::new(provider))
    }

    #[tokio::test]
    async fn test_advance_move_north() {
        let provider = ScriptedProvider::new().with_tool_call(fixtures::move_north());
        let engine = engine(provider.clone());
        let prior = GameState::default();

        let transition = engine.advance(&prior, "move north").await.unwrap();
        let state = transition.state;

        assert_eq!(state.change_type, ChangeType::SameMap);
        assert_eq!(state.player_pos, Coord::new(2, 1).unwrap());
        assert_eq!(
            state.battlemap.iter().map(|(c, _)| c).collect::<Vec<_>>(),
            prior.battlemap.iter().map(|(c, _)| c).collect::<Vec<_>>()
        );
        assert_eq!(state.log.len(), prior.log.len() + 1);
        assert!(state.log.last().unwrap().contains("You move north"));
        assert_eq!(state.last_action, "move north");
        assert_eq!(transition.telemetry.input_tokens, fixtures::USAGE.input_tokens);
        assert_eq!(transition.telemetry.output_tokens, fixtures::USAGE.output_tokens);

        let request = provider.last_request().unwrap();
        assert!(matches!(
            request.tool_choice,
            Some(claude::ToolChoice::Tool { ref name }) if name == schema::STATE_TRANSITION_TOOL
        ));
        assert_eq!(request.temperature, Some(0.8));
    }

    #[tokio::test]
    async fn test_advance_sanitizes_player_markers() {
        let mut payload = fixtures::move_north();
        payload["battlemap"]["(1, 1)"] = json!("🤺");
        payload["battlemap"]["(4, 4)"] = json!("🚶");
        let engine = engine(ScriptedProvider::new().with_tool_call(payload));

        let state = engine
            .advance(&GameState::default(), "move north")
            .await
            .unwrap()
            .state;

        for marker in RESERVED_MARKERS {
            assert!(!state.battlemap.contains_symbol(marker));
        }
        assert_eq!(state.battlemap.get(Coord::new(1, 1).unwrap()), Some(NEUTRAL_TERRAIN));
        assert_eq!(state.battlemap.get(Coord::new(4, 4).unwrap()), Some(NEUTRAL_TERRAIN));
    }

    #[tokio::test]
    async fn test_advance_rejects_missing_player_pos() {
        let mut payload = fixtures::move_north();
        payload.as_object_mut().unwrap().remove("player_pos");
        let engine = engine(ScriptedProvider::new().with_tool_call(payload));
        let prior = GameState::default();

        let err = engine.advance(&prior, "move north").await.unwrap_err();

        assert!(matches!(err, EngineError::Schema(SchemaError::MissingField(ref f)) if f == "player_pos"));
        assert_eq!(err.telemetry(), Telemetry::default());
        assert_eq!(prior, GameState::default());
    }

    #[tokio::test]
    async fn test_advance_rejects_out_of_range_position() {
        let mut payload = fixtures::move_north();
        payload["player_pos"] = json!([6, 1]);
        let engine = engine(ScriptedProvider::new().with_tool_call(payload));

        let err = engine.advance(&GameState::default(), "run").await.unwrap_err();
        assert!(matches!(err, EngineError::Schema(SchemaError::InvalidField { field: "player_pos", .. })));
    }

    #[tokio::test]
    async fn test_advance_rejects_unparsable_text() {
        let engine = engine(ScriptedProvider::new().with_text("The dragon eats the map."));
        let err = engine.advance(&GameState::default(), "look").await.unwrap_err();
        assert!(matches!(err, EngineError::Parse(_)));
    }

    #[tokio::test]
    async fn test_transport_error_is_reported() {
        let engine = engine(ScriptedProvider::new().with_error(claude::Error::Network("reset".into())));
        let err = engine.advance(&GameState::default(), "look").await.unwrap_err();
        assert!(matches!(err, EngineError::Transport(_)));
        assert_eq!(err.telemetry(), Telemetry::default());
    }

    #[tokio::test]
    async fn test_timeout() {
        let provider = ScriptedProvider::new()
            .with_tool_call(fixtures::move_north())
            .with_delay(Duration::from_millis(500));
        let engine = engine(provider)
            .with_config(EngineConfig::default().with_timeout(Duration::from_millis(20)));

        let err = engine.advance(&GameState::default(), "wait").await.unwrap_err();
        assert!(matches!(err, EngineError::Timeout(_)));
        assert_eq!(err.telemetry(), Telemetry::default());
    }

    #[tokio::test]
    async fn test_begin_seeds_state_from_adventure() {
        let adventure = Arc::new(fixtures::space_pirates());
        let engine = engine(ScriptedProvider::new().with_tool_call(fixtures::initial_state()));

        let state = engine.begin(Arc::clone(&adventure)).await.unwrap().state;

        assert_eq!(state.log.len(), 1);
        assert!(state.conversation_history.is_empty());
        assert!(state.last_action.is_empty());
        assert!(Arc::ptr_eq(state.adventure.as_ref().unwrap(), &adventure));
        assert!(!state.battlemap.contains_symbol("🤺"));
    }

    #[tokio::test]
    async fn test_generate_adventure() {
        let provider = ScriptedProvider::new().with_tool_call(serde_json::to_value(fixtures::space_pirates()).unwrap());
        let engine = engine(provider.clone());

        let (adventure, telemetry) = engine.generate_adventure("space pirates").await.unwrap();

        assert!(!adventure.title.is_empty());
        assert!(!adventure.challenges.is_empty());
        assert!(telemetry.total_tokens() > 0);
        let request = provider.last_request().unwrap();
        assert_eq!(request.tools.as_ref().unwrap()[0].name, schema::ADVENTURE_TOOL);
    }

    #[tokio::test]
    async fn test_adventure_missing_field_fails() {
        let mut payload = serde_json::to_value(fixtures::space_pirates()).unwrap();
        payload.as_object_mut().unwrap().remove("npcs");
        let engine = engine(ScriptedProvider::new().with_tool_call(payload));

        let err = engine.generate_adventure("space pirates").await.unwrap_err();
        assert!(matches!(err, EngineError::Schema(SchemaError::MissingField(ref f)) if f == "npcs"));
    }

    #[test]
    fn test_config_builder() {
        let config = EngineConfig::default()
            .with_model("claude-3-5-haiku-20241022")
            .with_history_window(3)
            .with_max_in_flight(0)
            .with_timeout(Duration::from_secs(5));
        assert_eq!(config.model.as_deref(), Some("claude-3-5-haiku-20241022"));
        assert_eq!(config.history_window, 3);
        assert_eq!(config.max_in_flight, 1);
        assert_eq!(config.timeout, Duration::from_secs(5));
    }
}
