//! Candidate pool: every candidate created during a run, across generations.
//!
//! The pool only grows. Evolved candidates sit beside their parents and both
//! keep competing.

use std::cmp::Ordering;
use std::collections::HashMap;

use thiserror::Error;

use arena_common::Candidate;

use crate::rating::RatingStore;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum PoolError {
    #[error("candidate id already in pool: {0}")]
    DuplicateId(String),
}

#[derive(Debug, Clone, Default)]
pub struct CandidatePool {
    candidates: Vec<Candidate>,
    index: HashMap<String, usize>,
}

impl CandidatePool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild a pool from stored candidates (snapshots). Rejects duplicates.
    pub fn from_candidates(candidates: Vec<Candidate>) -> Result<Self, PoolError> {
        let mut pool = Self::new();
        for candidate in candidates {
            pool.insert(candidate)?;
        }
        Ok(pool)
    }

    pub fn insert(&mut self, candidate: Candidate) -> Result<(), PoolError> {
        if self.index.contains_key(&candidate.id) {
            return Err(PoolError::DuplicateId(candidate.id));
        }
        self.index.insert(candidate.id.clone(), self.candidates.len());
        self.candidates.push(candidate);
        Ok(())
    }

    pub fn get(&self, id: &str) -> Option<&Candidate> {
        self.index.get(id).map(|&i| &self.candidates[i])
    }

    pub fn contains(&self, id: &str) -> bool {
        self.index.contains_key(id)
    }

    /// Ids in insertion order.
    pub fn ids(&self) -> Vec<String> {
        self.candidates.iter().map(|c| c.id.clone()).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Candidate> {
        self.candidates.iter()
    }

    pub fn by_generation(&self, generation: u32) -> Vec<&Candidate> {
        self.candidates
            .iter()
            .filter(|c| c.generation == generation)
            .collect()
    }

    /// The candidate followed by its ancestors, nearest first. Stops at the
    /// first parent id that is not in the pool.
    pub fn lineage(&self, id: &str) -> Vec<&Candidate> {
        let mut chain = Vec::new();
        let mut next = self.get(id);
        while let Some(candidate) = next {
            chain.push(candidate);
            next = candidate.parent_id.as_deref().and_then(|p| self.get(p));
            // Snapshots are hand-editable; a parent cycle must not spin forever.
            if chain.len() > self.candidates.len() {
                break;
            }
        }
        chain
    }

    /// Every candidate with its current rating, best first.
    ///
    /// Ties on rating go to the older generation, then to the smaller id, so
    /// the order is total and stable across runs.
    pub fn ranked(&self, ratings: &RatingStore) -> Vec<(&Candidate, f64)> {
        let mut ranked: Vec<(&Candidate, f64)> = self
            .candidates
            .iter()
            .map(|c| (c, ratings.get(&c.id)))
            .collect();
        ranked.sort_by(|(a, ra), (b, rb)| {
            rb.partial_cmp(ra)
                .unwrap_or(Ordering::Equal)
                .then_with(|| a.generation.cmp(&b.generation))
                .then_with(|| a.id.cmp(&b.id))
        });
        ranked
    }

    pub fn len(&self) -> usize {
        self.candidates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use arena_common::{CandidateDraft, EvolvedDraft};

    use super::*;

    fn seed(id: &str) -> Candidate {
        Candidate::seed(id, CandidateDraft::new(id, "desc", "why"))
    }

    fn child(parent: &Candidate, from_generation: u32) -> Candidate {
        parent.evolve(
            from_generation,
            EvolvedDraft {
                draft: CandidateDraft::new("better", "desc", "why"),
                improvement_note: "tightened".into(),
            },
        )
    }

    #[test]
    fn rejects_duplicate_ids() {
        let mut pool = CandidatePool::new();
        pool.insert(seed("a")).unwrap();
        assert_eq!(
            pool.insert(seed("a")),
            Err(PoolError::DuplicateId("a".into()))
        );
        assert_eq!(pool.len(), 1);
    }

    #[test]
    fn keeps_insertion_order() {
        let pool = CandidatePool::from_candidates(vec![seed("b"), seed("a"), seed("c")]).unwrap();
        assert_eq!(pool.ids(), vec!["b", "a", "c"]);
        assert!(pool.contains("a"));
        assert!(pool.get("z").is_none());
    }

    #[test]
    fn lineage_walks_back_to_seed() {
        let mut pool = CandidatePool::new();
        let a = seed("a");
        let a1 = child(&a, 0);
        let a2 = child(&a1, 1);
        pool.insert(a).unwrap();
        pool.insert(a1).unwrap();
        pool.insert(a2.clone()).unwrap();

        let ids: Vec<&str> = pool.lineage(&a2.id).iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec!["a_evolved_1_evolved_2", "a_evolved_1", "a"]);
        assert_eq!(pool.by_generation(1).len(), 1);
        assert_eq!(pool.by_generation(0)[0].id, "a");
    }

    #[test]
    fn ranked_breaks_ties_by_generation_then_id() {
        let a = seed("a");
        let a1 = child(&a, 0);
        let pool = CandidatePool::from_candidates(vec![a1.clone(), seed("c"), a, seed("b")]).unwrap();

        let mut ratings = RatingStore::new();
        ratings.update("c", "b");

        let order: Vec<&str> = pool.ranked(&ratings).iter().map(|(c, _)| c.id.as_str()).collect();
        // c won; a, a_evolved_1 untouched at 1200; b lost.
        assert_eq!(order, vec!["c", "a", "a_evolved_1", "b"]);
    }
}
