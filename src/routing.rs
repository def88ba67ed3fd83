//! Deck routing policies.
//!
//! Decides which decks a vehicle class may use and in which order the planner
//! tries them. Routing is pure: it only looks at the class and the deck count.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::model::Golongan;

/// Rule mapping a vehicle class to an ordered list of candidate decks.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(tag = "policy", rename_all = "snake_case")]
pub enum DeckRouting {
    /// Every class may use every deck, lowest first.
    AllDecks,
    /// Light classes try decks from the lowest upward; classes at or above
    /// `heavy_from` stay on deck 0.
    LowestFirst { heavy_from: Golongan },
    /// Light classes fill upper decks top-down and fall back to deck 0 only
    /// when those are full; classes at or above `heavy_from` stay on deck 0.
    UpperFirst { heavy_from: Golongan },
}

impl Default for DeckRouting {
    fn default() -> Self {
        DeckRouting::UpperFirst {
            heavy_from: Golongan::VI,
        }
    }
}

impl DeckRouting {
    /// Ordered deck indices to try for `class` on a ship with `deck_count` decks.
    ///
    /// ```
    /// use deck_loader::model::Golongan;
    /// use deck_loader::routing::DeckRouting;
    ///
    /// let routing = DeckRouting::UpperFirst { heavy_from: Golongan::VI };
    /// assert_eq!(routing.allowed_decks(Golongan::IV, 3), vec![2, 1, 0]);
    /// assert_eq!(routing.allowed_decks(Golongan::IX, 3), vec![0]);
    /// ```
    pub fn allowed_decks(&self, class: Golongan, deck_count: usize) -> Vec<usize> {
        if deck_count == 0 {
            return Vec::new();
        }
        match *self {
            DeckRouting::AllDecks => (0..deck_count).collect(),
            DeckRouting::LowestFirst { heavy_from } => {
                if class >= heavy_from {
                    vec![0]
                } else {
                    (0..deck_count).collect()
                }
            }
            DeckRouting::UpperFirst { heavy_from } => {
                if class >= heavy_from {
                    vec![0]
                } else {
                    (0..deck_count).rev().collect()
                }
            }
        }
    }

    /// Short name used in configuration and logs.
    pub fn name(&self) -> &'static str {
        match self {
            DeckRouting::AllDecks => "all_decks",
            DeckRouting::LowestFirst { .. } => "lowest_first",
            DeckRouting::UpperFirst { .. } => "upper_first",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn all_decks_is_bottom_up() {
        assert_eq!(
            DeckRouting::AllDecks.allowed_decks(Golongan::IX, 3),
            vec![0, 1, 2]
        );
    }

    #[test]
    fn lowest_first_confines_heavy_classes() {
        let routing = DeckRouting::LowestFirst {
            heavy_from: Golongan::VI,
        };
        assert_eq!(routing.allowed_decks(Golongan::V, 2), vec![0, 1]);
        assert_eq!(routing.allowed_decks(Golongan::VI, 2), vec![0]);
        assert_eq!(routing.allowed_decks(Golongan::IX, 2), vec![0]);
    }

    #[test]
    fn upper_first_falls_back_to_lowest_deck() {
        let routing = DeckRouting::default();
        assert_eq!(routing.allowed_decks(Golongan::IV, 3), vec![2, 1, 0]);
        assert_eq!(routing.allowed_decks(Golongan::VII, 3), vec![0]);
        assert_eq!(routing.allowed_decks(Golongan::IV, 1), vec![0]);
    }

    #[test]
    fn no_decks_means_no_candidates() {
        assert!(DeckRouting::default().allowed_decks(Golongan::IV, 0).is_empty());
    }
}
