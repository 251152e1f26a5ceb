//! HTML rendering with minijinja templates.

use minijinja::{context, Environment, Error};
use serde::Serialize;
use std::collections::BTreeSet;
use tabletop_core::battlemap::PLAYER_MARKER;
use tabletop_core::coords::GRID_SIZE;
use tabletop_core::{Adventure, Battlemap, ChangeType, Coord, Session, Telemetry};

const TEMPLATES: &[(&str, &str)] = &[
    ("base.html", include_str!("../templates/base.html")),
    ("map.html", include_str!("../templates/map.html")),
    ("index.html", include_str!("../templates/index.html")),
    ("premise.html", include_str!("../templates/premise.html")),
    ("game.html", include_str!("../templates/game.html")),
    ("game_area.html", include_str!("../templates/game_area.html")),
];

/// One rendered cell of a battlemap.
#[derive(Debug, Clone, PartialEq, Serialize)]
struct CellView {
    symbol: String,
    player: bool,
    highlight: bool,
}

#[derive(Debug, Serialize)]
struct UsageView {
    input_tokens: u64,
    output_tokens: u64,
    total_tokens: u64,
    response_time: String,
}

impl UsageView {
    fn from_telemetry(telemetry: Telemetry) -> Option<Self> {
        if telemetry.total_tokens() == 0 {
            return None;
        }
        Some(Self {
            input_tokens: telemetry.input_tokens,
            output_tokens: telemetry.output_tokens,
            total_tokens: telemetry.total_tokens(),
            response_time: format!("{:.2}", telemetry.latency.as_secs_f64()),
        })
    }
}

#[derive(Debug, Serialize)]
struct GameAreaView<'a> {
    current: Vec<Vec<CellView>>,
    previous: Option<Vec<Vec<CellView>>>,
    log: &'a [String],
    last_action: &'a str,
    change_type: &'static str,
    change_color: &'static str,
    usage: Option<UsageView>,
    notice: Option<String>,
    position: usize,
    len: usize,
    can_go_back: bool,
    can_go_forward: bool,
}

/// Extra knobs for rendering the game area.
#[derive(Debug, Clone, Default)]
pub struct AreaOptions {
    /// Mark cells that changed since the previous state.
    pub highlight_diff: bool,
    /// Show token usage of the last model call.
    pub show_usage: bool,
    /// A message shown above the maps, e.g. a retryable failure.
    pub notice: Option<String>,
}

impl AreaOptions {
    pub fn highlighted() -> Self {
        Self {
            highlight_diff: true,
            ..Self::default()
        }
    }

    pub fn after_turn() -> Self {
        Self {
            show_usage: true,
            ..Self::default()
        }
    }

    pub fn with_notice(mut self, notice: impl Into<String>) -> Self {
        self.notice = Some(notice.into());
        self
    }
}

/// Lay out a battlemap as rows of cells, drawing the player marker at
/// `player` and leaving missing cells blank.
fn grid(map: &Battlemap, player: Option<Coord>, highlight: &BTreeSet<Coord>) -> Vec<Vec<CellView>> {
    let mut rows = Vec::with_capacity(GRID_SIZE as usize);
    for y in 0..GRID_SIZE {
        let mut row = Vec::with_capacity(GRID_SIZE as usize);
        for x in 0..GRID_SIZE {
            let Ok(coord) = Coord::new(x.into(), y.into()) else {
                continue;
            };
            let is_player = player == Some(coord);
            let symbol = if is_player {
                PLAYER_MARKER
            } else {
                map.get(coord).unwrap_or(" ")
            };
            row.push(CellView {
                symbol: symbol.to_string(),
                player: is_player,
                highlight: !is_player && highlight.contains(&coord),
            });
        }
        rows.push(row);
    }
    rows
}

fn change_color(change_type: ChangeType) -> &'static str {
    match change_type {
        ChangeType::SameMap => "blue",
        ChangeType::NewMap => "green",
    }
}

/// The compiled template set.
pub struct Templates {
    env: Environment<'static>,
}

impl Templates {
    pub fn new() -> Result<Self, Error> {
        let mut env = Environment::new();
        for &(name, source) in TEMPLATES {
            env.add_template(name, source)?;
        }
        Ok(Self { env })
    }

    fn render<S: Serialize>(&self, name: &str, ctx: S) -> Result<String, Error> {
        self.env.get_template(name)?.render(ctx)
    }

    /// The landing page with the adventure-theme form.
    pub fn index(&self, adventure: Option<&Adventure>) -> Result<String, Error> {
        self.render("index.html", context! { adventure => adventure })
    }

    /// The adventure premise fragment, or a retryable error in its place.
    pub fn premise(&self, adventure: Option<&Adventure>, notice: Option<&str>) -> Result<String, Error> {
        self.render(
            "premise.html",
            context! { adventure => adventure, notice => notice },
        )
    }

    /// The full game room.
    pub fn game(&self, session: &Session, options: AreaOptions) -> Result<String, Error> {
        let area = game_area_view(session, options);
        let adventure = session.adventure().map(|a| a.as_ref());
        self.render("game.html", context! { area => area, adventure => adventure })
    }

    /// Only the game-area fragment swapped in by htmx.
    pub fn game_area(&self, session: &Session, options: AreaOptions) -> Result<String, Error> {
        let area = game_area_view(session, options);
        self.render("game_area.html", context! { area => area })
    }
}

fn game_area_view(session: &Session, options: AreaOptions) -> GameAreaView<'_> {
    let current = session.current();
    let highlight = if options.highlight_diff {
        session.changed_cells()
    } else {
        BTreeSet::new()
    };
    let history = session.history();
    let usage = if options.show_usage {
        UsageView::from_telemetry(session.last_telemetry())
    } else {
        None
    };

    GameAreaView {
        current: grid(&current.battlemap, Some(current.player_pos), &highlight),
        previous: session
            .previous()
            .map(|p| grid(&p.battlemap, Some(p.player_pos), &BTreeSet::new())),
        log: &current.log,
        last_action: &current.last_action,
        change_type: current.change_type.as_str(),
        change_color: change_color(current.change_type),
        usage,
        notice: options.notice,
        position: history.position() + 1,
        len: history.len(),
        can_go_back: history.can_go_back(),
        can_go_forward: history.can_go_forward(),
    }
}
