//! Evolution step: the top-rated candidates each get one improved successor.
//!
//! Selection runs over the whole pool, not just the latest generation. Parents
//! stay in the pool; successors join it with the next generation number and a
//! derived id. A failed evolution only costs that one successor.

use std::fmt::Write as _;

use futures::stream::{self, StreamExt};
use tracing::{info, warn};

use arena_common::{ArenaEvent, Candidate, ComparisonRecord, EvolvedDraft, OracleError};

use crate::context::CallContext;
use crate::observe::EventId;
use crate::oracle::{validate_evolved, EvolutionOracle};
use crate::pool::CandidatePool;
use crate::rating::RatingStore;
use crate::retry::Exhausted;

/// Standings lines included in evolution feedback.
const FEEDBACK_STANDINGS: usize = 10;

#[derive(Debug, Clone, Default)]
pub struct EvolutionReport {
    pub selected: Vec<String>,
    pub succeeded: u32,
    pub failed: u32,
    /// Ids of the successors added to the pool, in selection order.
    pub new_ids: Vec<String>,
}

pub struct EvolutionSelector {
    top_k: usize,
    max_concurrency: usize,
}

impl EvolutionSelector {
    pub fn new(top_k: usize, max_concurrency: usize) -> Self {
        Self {
            top_k,
            max_concurrency: max_concurrency.max(1),
        }
    }

    /// The `top_k` best candidates in the pool, best first.
    pub fn select<'a>(
        &self,
        pool: &'a CandidatePool,
        ratings: &RatingStore,
    ) -> Vec<(&'a Candidate, f64)> {
        pool.ranked(ratings).into_iter().take(self.top_k).collect()
    }

    /// Evolve the selected candidates and add their successors to `pool`.
    ///
    /// `generation` is the generation whose tournament just finished; the
    /// successors belong to `generation + 1`.
    #[allow(clippy::too_many_arguments)]
    pub async fn run(
        &self,
        generation: u32,
        pool: &mut CandidatePool,
        ratings: &RatingStore,
        oracle: &dyn EvolutionOracle,
        feedback: &str,
        ctx: CallContext<'_>,
        parent: Option<EventId>,
    ) -> EvolutionReport {
        let selected: Vec<(Candidate, f64)> = self
            .select(pool, ratings)
            .into_iter()
            .map(|(c, rating)| (c.clone(), rating))
            .collect();

        let mut report = EvolutionReport {
            selected: selected.iter().map(|(c, _)| c.id.clone()).collect(),
            ..Default::default()
        };

        let started = ctx.observer.emit(
            parent,
            ArenaEvent::EvolutionStarted {
                generation,
                selected_ids: report.selected.clone(),
            },
        );
        info!(generation, selected = ?report.selected, "Evolving top candidates");

        // `buffered` keeps results in selection order so the pool's insertion
        // order does not depend on which call finished first.
        let calls = selected.iter().map(move |(candidate, rating)| async move {
            let attempted = ctx.observer.emit(
                Some(started),
                ArenaEvent::EvolutionAttempted {
                    generation,
                    parent_id: candidate.id.clone(),
                    parent_rating: *rating,
                },
            );
            let result = evolve_one(candidate, feedback, oracle, ctx).await;
            (attempted, candidate, result)
        });
        let mut results = stream::iter(calls).buffered(self.max_concurrency);

        while let Some((attempted, candidate, result)) = results.next().await {
            let failure = match result {
                Ok((evolved, attempts)) => {
                    let child = candidate.evolve(generation, evolved);
                    let child_id = child.id.clone();
                    let note = child.improvement_note.clone();
                    match pool.insert(child) {
                        Ok(()) => {
                            report.succeeded += 1;
                            report.new_ids.push(child_id.clone());
                            ctx.observer.emit(
                                Some(attempted),
                                ArenaEvent::EvolutionSucceeded {
                                    generation,
                                    parent_id: candidate.id.clone(),
                                    candidate_id: child_id,
                                    improvement_note: note,
                                    attempts,
                                },
                            );
                            None
                        }
                        Err(e) => Some(Exhausted {
                            attempts,
                            error: OracleError::Validation(e.to_string()),
                        }),
                    }
                }
                Err(exhausted) => Some(exhausted),
            };

            if let Some(exhausted) = failure {
                report.failed += 1;
                warn!(
                    generation,
                    parent_id = candidate.id.as_str(),
                    error = %exhausted,
                    "Evolution failed, parent keeps competing unchanged"
                );
                ctx.observer.emit(
                    Some(attempted),
                    ArenaEvent::EvolutionFailed {
                        generation,
                        parent_id: candidate.id.clone(),
                        error: exhausted.error.to_string(),
                        attempts: exhausted.attempts,
                    },
                );
            }
        }

        report
    }
}

async fn evolve_one(
    candidate: &Candidate,
    feedback: &str,
    oracle: &dyn EvolutionOracle,
    ctx: CallContext<'_>,
) -> Result<(EvolvedDraft, u32), Exhausted> {
    ctx.retry
        .run("evolve", ctx.cancel, move || async move {
            let evolved = oracle.evolve(candidate, feedback).await?;
            validate_evolved(&evolved)?;
            Ok(evolved)
        })
        .await
}

/// Aggregate feedback handed to every evolution call: current standings plus
/// the judge's most recent reasoning.
pub fn build_feedback(
    pool: &CandidatePool,
    ratings: &RatingStore,
    history: &[ComparisonRecord],
    max_reasons: usize,
) -> String {
    let mut out = String::new();

    let ranked = pool.ranked(ratings);
    if !ranked.is_empty() {
        out.push_str("Current standings (best first):\n");
        for (i, (candidate, rating)) in ranked.iter().take(FEEDBACK_STANDINGS).enumerate() {
            let _ = writeln!(
                out,
                "{}. {} [{}] rating {:.1} (generation {})",
                i + 1,
                candidate.title,
                candidate.id,
                rating,
                candidate.generation
            );
        }
    }

    let reasons: Vec<&ComparisonRecord> = history
        .iter()
        .rev()
        .filter(|r| !r.reasoning.trim().is_empty())
        .take(max_reasons)
        .collect();
    if !reasons.is_empty() {
        if !out.is_empty() {
            out.push('\n');
        }
        out.push_str("Recent judge reasoning:\n");
        for record in reasons {
            let _ = writeln!(
                out,
                "- {} over {}: {}",
                record.winner_id,
                record.loser_id,
                record.reasoning.trim()
            );
        }
    }

    out
}
