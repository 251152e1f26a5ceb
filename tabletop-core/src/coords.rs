//! Grid coordinates and their wire encoding.
//!
//! The battlemap travels over the wire as a JSON object whose keys are
//! coordinate strings of the exact form `"(x, y)"`. Keys are parsed
//! structurally; anything that doesn't match the pattern is rejected.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Width and height of the battlemap.
pub const GRID_SIZE: u8 = 6;

/// JSON-schema pattern for coordinate keys.
pub const KEY_PATTERN: &str = r"^\([0-5], [0-5]\)$";

static KEY_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\(([0-5]), ([0-5])\)$").expect("coordinate key regex is valid"));

/// Errors from coordinate construction and decoding.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CoordError {
    #[error("malformed coordinate key: {0:?}")]
    Malformed(String),

    #[error("coordinate ({x}, {y}) is outside the {size}x{size} grid", size = GRID_SIZE)]
    OutOfBounds { x: i64, y: i64 },

    #[error("expected 2 coordinates, got {0}")]
    Arity(usize),
}

/// A cell on the 6x6 grid. Always in bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Coord {
    x: u8,
    y: u8,
}

/// Where the player stands on the default map.
pub const PLAYER_START: Coord = Coord { x: 2, y: 2 };

impl Coord {
    /// Create a coordinate, checking that it lies on the grid.
    pub fn new(x: i64, y: i64) -> Result<Self, CoordError> {
        let size = i64::from(GRID_SIZE);
        if !(0..size).contains(&x) || !(0..size).contains(&y) {
            return Err(CoordError::OutOfBounds { x, y });
        }
        Ok(Self {
            x: x as u8,
            y: y as u8,
        })
    }

    /// Build a coordinate from an `[x, y]` array as returned by the model.
    pub fn from_pair(pair: &[i64]) -> Result<Self, CoordError> {
        match pair {
            [x, y] => Self::new(*x, *y),
            _ => Err(CoordError::Arity(pair.len())),
        }
    }

    pub fn x(&self) -> u8 {
        self.x
    }

    pub fn y(&self) -> u8 {
        self.y
    }

    /// Every cell of the grid in row-major order.
    pub fn all() -> impl Iterator<Item = Coord> {
        (0..GRID_SIZE).flat_map(|y| (0..GRID_SIZE).map(move |x| Coord { x, y }))
    }

    /// Encode as a wire key.
    pub fn encode(&self) -> String {
        self.to_string()
    }

    /// Decode a wire key. Only the exact `"(x, y)"` form with digits 0-5 is accepted.
    pub fn decode(key: &str) -> Result<Self, CoordError> {
        let caps = KEY_REGEX
            .captures(key)
            .ok_or_else(|| CoordError::Malformed(key.to_string()))?;
        let x = caps[1]
            .parse::<i64>()
            .map_err(|_| CoordError::Malformed(key.to_string()))?;
        let y = caps[2]
            .parse::<i64>()
            .map_err(|_| CoordError::Malformed(key.to_string()))?;
        Self::new(x, y)
    }
}

/// Row-major: rows top to bottom, then cells left to right.
impl Ord for Coord {
    fn cmp(&self, other: &Self) -> Ordering {
        (self.y, self.x).cmp(&(other.y, other.x))
    }
}

impl PartialOrd for Coord {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for Coord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

impl FromStr for Coord {
    type Err = CoordError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::decode(s)
    }
}

impl TryFrom<[i64; 2]> for Coord {
    type Error = CoordError;

    fn try_from([x, y]: [i64; 2]) -> Result<Self, Self::Error> {
        Self::new(x, y)
    }
}

impl Serialize for Coord {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Coord {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct CoordVisitor;

        impl Visitor<'_> for CoordVisitor {
            type Value = Coord;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a coordinate key like \"(2, 3)\"")
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<Coord, E> {
                Coord::decode(v).map_err(E::custom)
            }
        }

        deserializer.deserialize_str(CoordVisitor)
    }
}
