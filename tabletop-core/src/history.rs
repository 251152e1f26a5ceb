//! Bounded history of game states with a navigation cursor.

use crate::state::GameState;
use std::collections::VecDeque;

/// Default number of states kept for back/forward navigation.
pub const DEFAULT_CAPACITY: usize = 10;

/// An ordered, bounded window of recent game states.
///
/// The cursor marks the state being viewed. Pushing while the cursor sits
/// on an older entry discards everything after it, so play always
/// continues from what the player is looking at.
#[derive(Debug, Clone)]
pub struct History {
    entries: VecDeque<GameState>,
    cursor: usize,
    capacity: usize,
}

impl History {
    /// Create a history holding just `initial`.
    pub fn new(capacity: usize, initial: GameState) -> Self {
        let capacity = capacity.max(1);
        let mut entries = VecDeque::with_capacity(capacity);
        entries.push_back(initial);
        Self {
            entries,
            cursor: 0,
            capacity,
        }
    }

    /// The state under the cursor.
    pub fn current(&self) -> &GameState {
        &self.entries[self.cursor]
    }

    /// The state just before the cursor, if any.
    pub fn previous(&self) -> Option<&GameState> {
        self.cursor.checked_sub(1).map(|i| &self.entries[i])
    }

    /// Append `state` after the cursor and move onto it.
    pub fn push(&mut self, state: GameState) {
        self.entries.truncate(self.cursor + 1);
        self.entries.push_back(state);
        while self.entries.len() > self.capacity {
            self.entries.pop_front();
        }
        self.cursor = self.entries.len() - 1;
    }

    /// Step back one entry. Returns false at the oldest entry.
    pub fn back(&mut self) -> bool {
        if self.cursor == 0 {
            return false;
        }
        self.cursor -= 1;
        true
    }

    /// Step forward one entry. Returns false at the newest entry.
    pub fn forward(&mut self) -> bool {
        if self.cursor + 1 >= self.entries.len() {
            return false;
        }
        self.cursor += 1;
        true
    }

    /// Drop everything and start over from `initial`.
    pub fn reset(&mut self, initial: GameState) {
        self.entries.clear();
        self.entries.push_back(initial);
        self.cursor = 0;
    }

    pub fn can_go_back(&self) -> bool {
        self.cursor > 0
    }

    pub fn can_go_forward(&self) -> bool {
        self.cursor + 1 < self.entries.len()
    }

    /// Zero-based index of the cursor.
    pub fn position(&self) -> usize {
        self.cursor
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Always false; a history holds at least one state.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state(action: &str) -> GameState {
        GameState {
            last_action: action.to_string(),
            ..GameState::default()
        }
    }

    fn actions(history: &History) -> Vec<String> {
        history.entries.iter().map(|s| s.last_action.clone()).collect()
    }

    #[test]
    fn test_push_moves_cursor() {
        let mut history = History::new(10, state("start"));
        assert!(history.previous().is_none());

        history.push(state("a"));
        history.push(state("b"));

        assert_eq!(history.len(), 3);
        assert_eq!(history.current().last_action, "b");
        assert_eq!(history.previous().unwrap().last_action, "a");
        assert!(!history.can_go_forward());
    }

    #[test]
    fn test_capacity_drops_oldest() {
        let mut history = History::new(3, state("0"));
        for i in 1..6 {
            history.push(state(&i.to_string()));
        }
        assert_eq!(actions(&history), vec!["3", "4", "5"]);
        assert_eq!(history.position(), 2);
    }

    #[test]
    fn test_back_and_forward() {
        let mut history = History::new(10, state("0"));
        history.push(state("1"));
        history.push(state("2"));

        assert!(history.back());
        assert!(history.back());
        assert!(!history.back());
        assert_eq!(history.current().last_action, "0");

        assert!(history.forward());
        assert_eq!(history.current().last_action, "1");
        assert!(history.forward());
        assert!(!history.forward());
    }

    #[test]
    fn test_push_after_back_truncates() {
        let mut history = History::new(10, state("0"));
        history.push(state("1"));
        history.push(state("2"));
        history.back();
        history.back();

        history.push(state("branch"));

        assert_eq!(actions(&history), vec!["0", "branch"]);
        assert!(!history.can_go_forward());
    }

    #[test]
    fn test_reset() {
        let mut history = History::new(10, state("0"));
        history.push(state("1"));
        history.reset(state("fresh"));
        assert_eq!(history.len(), 1);
        assert_eq!(history.current().last_action, "fresh");
        assert!(!history.can_go_back());
    }

    #[test]
    fn test_zero_capacity_keeps_one() {
        let mut history = History::new(0, state("0"));
        history.push(state("1"));
        assert_eq!(history.capacity(), 1);
        assert_eq!(actions(&history), vec!["1"]);
    }
}
