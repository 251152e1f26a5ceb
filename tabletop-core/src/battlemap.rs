//! The 6x6 emoji battlemap.
//!
//! A battlemap maps grid cells to single legend symbols. The player is
//! never part of the map: their position is tracked on the game state and
//! drawn over whatever lies beneath.

use crate::coords::{Coord, CoordError};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Marker drawn at the player's position.
pub const PLAYER_MARKER: &str = "🤺";

/// Symbols that represent the player and must never appear in the map.
pub const RESERVED_MARKERS: &[&str] = &["🤺", "🚶", "🤴"];

/// Terrain substituted for any reserved marker found in the map.
pub const NEUTRAL_TERRAIN: &str = "🌾";

/// Symbols the model may place on the map, with their meaning.
pub const LEGEND: &[(&str, &str)] = &[
    ("🏰", "Castle"),
    ("🌳", "Tree"),
    ("🗻", "Mountain"),
    ("🌊", "Water"),
    ("🏠", "House"),
    ("🏛️", "Temple"),
    ("🏜️", "Desert"),
    ("🌾", "Grass"),
    ("🔥", "Fire"),
    ("💎", "Gem"),
    ("🗝️", "Key"),
    ("🗡️", "Sword"),
    ("🛡️", "Shield"),
    ("🧪", "Potion"),
    ("📜", "Scroll"),
    ("🧙", "Wizard (NPC)"),
    ("🐉", "Dragon (Enemy)"),
    ("🐺", "Wolf (Enemy)"),
    ("🦇", "Bat (Enemy)"),
    ("🕷️", "Spider (Enemy)"),
    ("🧟", "Zombie (Enemy)"),
    ("🧛", "Vampire (Enemy)"),
    ("🧚", "Fairy (NPC)"),
    ("🍄", "Mushroom"),
    ("🌿", "Herb"),
    ("⛏️", "Pickaxe"),
    ("🪓", "Axe"),
    ("🏹", "Bow"),
    ("🎣", "Fishing Rod"),
];

/// Whether a symbol is one of the reserved player markers.
pub fn is_player_marker(symbol: &str) -> bool {
    RESERVED_MARKERS.contains(&symbol.trim())
}

/// A mapping from grid cells to symbols. Missing cells are blank.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Battlemap {
    cells: BTreeMap<Coord, String>,
}

impl Battlemap {
    /// An empty map.
    pub fn new() -> Self {
        Self::default()
    }

    /// The starting village: castles in two corners, a ring of trees,
    /// grass inside, a house and a temple.
    pub fn castle() -> Self {
        const ROWS: [[&str; 6]; 6] = [
            ["🏰", "🌳", "🌳", "🌳", "🌳", "🏠"],
            ["🌳", "🌾", "🌾", "🌾", "🌾", "🌳"],
            ["🌳", "🌾", "🏠", "🌾", "🌾", "🌳"],
            ["🌳", "🌾", "🌾", "🏛️", "🌾", "🌳"],
            ["🌳", "🌾", "🌾", "🌾", "🌾", "🌳"],
            ["🏠", "🌳", "🌳", "🌳", "🌳", "🏰"],
        ];
        Coord::all()
            .map(|c| (c, ROWS[c.y() as usize][c.x() as usize]))
            .collect()
    }

    /// Decode a wire battlemap whose keys are `"(x, y)"` strings.
    ///
    /// Blank values are dropped so the cell renders empty.
    pub fn from_wire(wire: BTreeMap<String, String>) -> Result<Self, CoordError> {
        let mut cells = BTreeMap::new();
        for (key, symbol) in wire {
            let coord = Coord::decode(&key)?;
            let symbol = symbol.trim();
            if !symbol.is_empty() {
                cells.insert(coord, symbol.to_string());
            }
        }
        Ok(Self { cells })
    }

    pub fn get(&self, coord: Coord) -> Option<&str> {
        self.cells.get(&coord).map(String::as_str)
    }

    pub fn set(&mut self, coord: Coord, symbol: impl Into<String>) {
        self.cells.insert(coord, symbol.into());
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Cells in row-major order.
    pub fn iter(&self) -> impl Iterator<Item = (Coord, &str)> {
        self.cells.iter().map(|(c, s)| (*c, s.as_str()))
    }

    pub fn contains_symbol(&self, symbol: &str) -> bool {
        self.cells.values().any(|s| s == symbol)
    }

    /// Replace every reserved player marker with neutral terrain.
    ///
    /// Returns the cells that were repaired.
    pub fn sanitize(&mut self) -> Vec<Coord> {
        let mut repaired = Vec::new();
        for (coord, symbol) in self.cells.iter_mut() {
            if is_player_marker(symbol) {
                *symbol = NEUTRAL_TERRAIN.to_string();
                repaired.push(*coord);
            }
        }
        repaired
    }

    /// Cells whose symbol differs from `other`, blanks included.
    pub fn diff(&self, other: &Battlemap) -> BTreeSet<Coord> {
        Coord::all()
            .filter(|c| self.get(*c) != other.get(*c))
            .collect()
    }

    /// One `(x, y): symbol` line per cell, as shown to the model.
    pub fn to_prompt_lines(&self) -> String {
        self.iter()
            .map(|(c, s)| format!("{c}: {s}"))
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Plain-text rendering with the player drawn at `player_pos`.
    pub fn render_text(&self, player_pos: Coord) -> String {
        let mut out = String::new();
        for coord in Coord::all() {
            if coord == player_pos {
                out.push_str(PLAYER_MARKER);
            } else {
                out.push_str(self.get(coord).unwrap_or(" "));
            }
            if coord.x() == crate::coords::GRID_SIZE - 1 {
                out.push('\n');
            }
        }
        out
    }
}

impl<S: Into<String>> FromIterator<(Coord, S)> for Battlemap {
    fn from_iter<I: IntoIterator<Item = (Coord, S)>>(iter: I) -> Self {
        Self {
            cells: iter.into_iter().map(|(c, s)| (c, s.into())).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(x: i64, y: i64) -> Coord {
        Coord::new(x, y).unwrap()
    }

    #[test]
    fn test_castle_covers_grid() {
        let map = Battlemap::castle();
        assert_eq!(map.len(), 36);
        assert_eq!(map.get(at(0, 0)), Some("🏰"));
        assert_eq!(map.get(at(2, 2)), Some("🏠"));
        assert_eq!(map.get(at(3, 3)), Some("🏛️"));
        assert_eq!(map.get(at(5, 5)), Some("🏰"));
        assert!(!RESERVED_MARKERS.iter().any(|m| map.contains_symbol(m)));
    }

    #[test]
    fn test_sanitize_replaces_markers() {
        let mut map = Battlemap::castle();
        map.set(at(1, 1), "🤺");
        map.set(at(4, 4), "🤴");
        map.set(at(0, 3), "🚶");

        let repaired = map.sanitize();

        assert_eq!(repaired, vec![at(1, 1), at(0, 3), at(4, 4)]);
        for marker in RESERVED_MARKERS {
            assert!(!map.contains_symbol(marker));
        }
        assert_eq!(map.get(at(1, 1)), Some(NEUTRAL_TERRAIN));
        assert_eq!(map.get(at(4, 4)), Some(NEUTRAL_TERRAIN));
        assert_eq!(map.get(at(0, 3)), Some(NEUTRAL_TERRAIN));
    }

    #[test]
    fn test_sanitize_leaves_clean_map_alone() {
        let mut map = Battlemap::castle();
        assert!(map.sanitize().is_empty());
        assert_eq!(map, Battlemap::castle());
    }

    #[test]
    fn test_from_wire() {
        let mut wire = BTreeMap::new();
        wire.insert("(0, 0)".to_string(), "🌊".to_string());
        wire.insert("(5, 5)".to_string(), "  ".to_string());
        let map = Battlemap::from_wire(wire).unwrap();
        assert_eq!(map.len(), 1);
        assert_eq!(map.get(at(0, 0)), Some("🌊"));
        assert_eq!(map.get(at(5, 5)), None);

        let mut wire = BTreeMap::new();
        wire.insert("(6, 0)".to_string(), "🌊".to_string());
        assert!(Battlemap::from_wire(wire).is_err());
    }

    #[test]
    fn test_diff() {
        let before = Battlemap::castle();
        let mut after = before.clone();
        after.set(at(2, 3), "🔥");
        assert_eq!(before.diff(&after).into_iter().collect::<Vec<_>>(), vec![at(2, 3)]);
        assert!(before.diff(&before).is_empty());
        assert_eq!(Battlemap::new().diff(&before).len(), 36);
    }

    #[test]
    fn test_render_text_draws_player_over_terrain() {
        let map = Battlemap::castle();
        let text = map.render_text(at(2, 2));
        let rows: Vec<&str> = text.lines().collect();
        assert_eq!(rows.len(), 6);
        assert!(rows[2].contains(PLAYER_MARKER));
        assert!(!rows[2].contains("🏠"));
        assert!(rows[0].starts_with("🏰"));
    }

    #[test]
    fn test_prompt_lines() {
        let map = Battlemap::castle();
        let lines = map.to_prompt_lines();
        assert!(lines.starts_with("(0, 0): 🏰\n(1, 0): 🌳"));
        assert_eq!(lines.lines().count(), 36);
    }

    #[test]
    fn test_serializes_with_wire_keys() {
        let map: Battlemap = [(at(1, 2), "🌳")].into_iter().collect();
        let json = serde_json::to_value(&map).unwrap();
        assert_eq!(json["(1, 2)"], "🌳");
    }
}
