//! Elo rating store.
//!
//! Ratings only change as a side effect of a comparison outcome. An id with no
//! entry is rated [`DEFAULT_RATING`]; entries are created on first comparison.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

pub use arena_common::{DEFAULT_RATING, K_FACTOR};

/// Before/after ratings for one applied comparison.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RatingUpdate {
    pub winner_before: f64,
    pub winner_after: f64,
    pub loser_before: f64,
    pub loser_after: f64,
}

impl RatingUpdate {
    pub fn winner_delta(&self) -> f64 {
        self.winner_after - self.winner_before
    }

    pub fn loser_delta(&self) -> f64 {
        self.loser_after - self.loser_before
    }
}

/// Probability that a player rated `rating` beats one rated `opponent`.
pub fn expected_score(rating: f64, opponent: f64) -> f64 {
    1.0 / (1.0 + 10f64.powf((opponent - rating) / 400.0))
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RatingStore {
    ratings: HashMap<String, f64>,
}

impl RatingStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: &str) -> f64 {
        self.ratings.get(id).copied().unwrap_or(DEFAULT_RATING)
    }

    /// Whether `id` has taken part in at least one comparison.
    pub fn is_rated(&self, id: &str) -> bool {
        self.ratings.contains_key(id)
    }

    /// Apply one comparison outcome.
    ///
    /// The winner gains exactly what the loser gives up, so the total rating
    /// mass is unchanged. Takes `&mut self`, so concurrent callers must funnel
    /// results through a single owner.
    pub fn update(&mut self, winner_id: &str, loser_id: &str) -> RatingUpdate {
        let winner_before = self.get(winner_id);
        let loser_before = self.get(loser_id);

        let expected_winner = expected_score(winner_before, loser_before);
        let delta = K_FACTOR * (1.0 - expected_winner);

        let update = RatingUpdate {
            winner_before,
            winner_after: winner_before + delta,
            loser_before,
            loser_after: loser_before - delta,
        };

        self.ratings.insert(winner_id.to_string(), update.winner_after);
        self.ratings.insert(loser_id.to_string(), update.loser_after);
        update
    }

    /// Rated ids, best first. Equal ratings fall back to id order.
    pub fn standings(&self) -> Vec<(String, f64)> {
        let mut out: Vec<(String, f64)> = self
            .ratings
            .iter()
            .map(|(id, rating)| (id.clone(), *rating))
            .collect();
        out.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        out
    }

    pub fn len(&self) -> usize {
        self.ratings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ratings.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f64 = 1e-9;

    #[test]
    fn unseen_id_has_default_rating() {
        let store = RatingStore::new();
        assert_eq!(store.get("unseen"), 1200.0);
        assert!(!store.is_rated("unseen"));
        assert!(store.is_empty());
    }

    #[test]
    fn equal_ratings_move_by_half_k() {
        let mut store = RatingStore::new();
        let update = store.update("a", "b");
        assert!((update.winner_after - 1216.0).abs() < EPS);
        assert!((update.loser_after - 1184.0).abs() < EPS);
        assert!((store.get("a") - 1216.0).abs() < EPS);
        assert!((store.get("b") - 1184.0).abs() < EPS);
    }

    #[test]
    fn updates_are_zero_sum() {
        let mut store = RatingStore::new();
        let pairs = [("a", "b"), ("b", "c"), ("c", "a"), ("a", "c"), ("d", "a"), ("b", "d")];
        for (w, l) in pairs {
            let update = store.update(w, l);
            assert!((update.winner_delta() + update.loser_delta()).abs() < EPS);
            assert!(update.winner_delta() > 0.0);
        }
        let total: f64 = ["a", "b", "c", "d"].iter().map(|id| store.get(id)).sum();
        assert!((total - 4.0 * DEFAULT_RATING).abs() < 1e-6);
    }

    #[test]
    fn upset_moves_more_than_expected_win() {
        let mut store = RatingStore::new();
        store.update("strong", "weak");
        store.update("strong", "weak");

        let mut expected = store.clone();
        let favourite_win = expected.update("strong", "weak");
        let upset = store.update("weak", "strong");
        assert!(upset.winner_delta() > favourite_win.winner_delta());
    }

    #[test]
    fn expected_scores_sum_to_one() {
        let e_a = expected_score(1300.0, 1150.0);
        let e_b = expected_score(1150.0, 1300.0);
        assert!((e_a + e_b - 1.0).abs() < EPS);
        assert!(e_a > 0.5);
    }

    #[test]
    fn standings_sort_by_rating_then_id() {
        let mut store = RatingStore::new();
        store.update("b", "c");
        store.update("a", "d");
        let standings = store.standings();
        let ids: Vec<&str> = standings.iter().map(|(id, _)| id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b", "c", "d"]);
    }
}
