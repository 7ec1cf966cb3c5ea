//! Tournament scheduler: random pairings, judged comparisons, Elo updates.
//!
//! Each round shuffles the ids and walks them in consecutive pairs; with an
//! odd count the last id sits the round out. Pairs within a round are judged
//! concurrently (bounded), but rating updates are applied one at a time by the
//! single consumer of the result stream. A round fully settles before the next
//! one is paired.

use futures::stream::{self, StreamExt};
use rand::seq::SliceRandom;
use rand::Rng;
use tracing::{info, warn};

use arena_common::{ArenaEvent, ComparisonOutcome, ComparisonRecord, OracleError};

use crate::context::CallContext;
use crate::observe::EventId;
use crate::oracle::{validate_outcome, ComparisonOracle};
use crate::pool::CandidatePool;
use crate::rating::RatingStore;
use crate::retry::Exhausted;

/// Shuffle `ids` and pair them off. Returns the pairs and the id left over
/// when the count is odd.
pub fn pair_round<R: Rng + ?Sized>(
    ids: &[String],
    rng: &mut R,
) -> (Vec<(String, String)>, Option<String>) {
    let mut shuffled = ids.to_vec();
    shuffled.shuffle(rng);

    let pairs = shuffled
        .chunks_exact(2)
        .map(|pair| (pair[0].clone(), pair[1].clone()))
        .collect();
    let sitting_out = if shuffled.len() % 2 == 1 {
        shuffled.last().cloned()
    } else {
        None
    };
    (pairs, sitting_out)
}

/// Counts and outcomes for one round or one whole tournament.
#[derive(Debug, Clone, Default)]
pub struct TournamentReport {
    pub rounds_played: u32,
    pub attempted: u32,
    pub succeeded: u32,
    pub failed: u32,
    pub comparisons: Vec<ComparisonRecord>,
}

impl TournamentReport {
    fn absorb(&mut self, round: TournamentReport) {
        self.attempted += round.attempted;
        self.succeeded += round.succeeded;
        self.failed += round.failed;
        self.comparisons.extend(round.comparisons);
    }
}

pub struct TournamentScheduler {
    rounds: u32,
    max_concurrency: usize,
}

impl TournamentScheduler {
    pub fn new(rounds: u32, max_concurrency: usize) -> Self {
        Self {
            rounds,
            max_concurrency: max_concurrency.max(1),
        }
    }

    /// Run every round over `ids`. Pools of fewer than two candidates play no
    /// rounds at all.
    #[allow(clippy::too_many_arguments)]
    pub async fn run<R: Rng + ?Sized>(
        &self,
        generation: u32,
        ids: &[String],
        pool: &CandidatePool,
        ratings: &mut RatingStore,
        oracle: &dyn ComparisonOracle,
        rng: &mut R,
        ctx: CallContext<'_>,
        parent: Option<EventId>,
    ) -> TournamentReport {
        let tournament_event = ctx.observer.emit(
            parent,
            ArenaEvent::TournamentStarted {
                generation,
                pool_size: ids.len(),
                rounds: self.rounds,
            },
        );

        let mut report = TournamentReport::default();

        if ids.len() < 2 {
            info!(generation, pool_size = ids.len(), "Pool too small for a tournament, skipping");
        } else {
            for round in 1..=self.rounds {
                let (pairs, sitting_out) = pair_round(ids, rng);
                let round_event = ctx.observer.emit(
                    Some(tournament_event),
                    ArenaEvent::RoundStarted {
                        generation,
                        round,
                        pairs: pairs.len(),
                        sitting_out,
                    },
                );

                let played = self
                    .play_round(
                        generation,
                        round,
                        &pairs,
                        pool,
                        ratings,
                        oracle,
                        ctx,
                        Some(round_event),
                    )
                    .await;
                report.absorb(played);
                report.rounds_played += 1;
            }
        }

        ctx.observer.emit(
            Some(tournament_event),
            ArenaEvent::TournamentCompleted {
                generation,
                comparisons_succeeded: report.succeeded,
                comparisons_failed: report.failed,
            },
        );

        info!(
            generation,
            rounds = report.rounds_played,
            succeeded = report.succeeded,
            failed = report.failed,
            "Tournament complete"
        );
        report
    }

    /// Judge a fixed set of pairs and apply the results.
    ///
    /// A pair whose oracle call fails (after retries) leaves both ratings
    /// untouched and is reported as a failed comparison.
    #[allow(clippy::too_many_arguments)]
    pub async fn play_round(
        &self,
        generation: u32,
        round: u32,
        pairs: &[(String, String)],
        pool: &CandidatePool,
        ratings: &mut RatingStore,
        oracle: &dyn ComparisonOracle,
        ctx: CallContext<'_>,
        parent: Option<EventId>,
    ) -> TournamentReport {
        let calls = pairs.iter().map(move |(a_id, b_id)| async move {
            let attempted = ctx.observer.emit(
                parent,
                ArenaEvent::ComparisonAttempted {
                    generation,
                    round,
                    candidate_a: a_id.clone(),
                    candidate_b: b_id.clone(),
                },
            );
            let result = judge_pair(a_id, b_id, pool, oracle, ctx).await;
            (attempted, a_id, b_id, result)
        });

        let mut results = stream::iter(calls).buffer_unordered(self.max_concurrency);
        let mut report = TournamentReport::default();

        while let Some((attempted, a_id, b_id, result)) = results.next().await {
            report.attempted += 1;
            match result {
                Ok((outcome, attempts)) => {
                    report.succeeded += 1;
                    let succeeded = ctx.observer.emit(
                        Some(attempted),
                        ArenaEvent::ComparisonSucceeded {
                            generation,
                            round,
                            winner_id: outcome.winner_id.clone(),
                            loser_id: outcome.loser_id.clone(),
                            reasoning: outcome.reasoning.clone(),
                            attempts,
                        },
                    );

                    let update = ratings.update(&outcome.winner_id, &outcome.loser_id);
                    ctx.observer.emit(
                        Some(succeeded),
                        ArenaEvent::RatingUpdated {
                            winner_id: outcome.winner_id.clone(),
                            loser_id: outcome.loser_id.clone(),
                            winner_before: update.winner_before,
                            winner_after: update.winner_after,
                            loser_before: update.loser_before,
                            loser_after: update.loser_after,
                        },
                    );

                    report.comparisons.push(ComparisonRecord {
                        generation,
                        round,
                        winner_id: outcome.winner_id,
                        loser_id: outcome.loser_id,
                        reasoning: outcome.reasoning,
                    });
                }
                Err(exhausted) => {
                    report.failed += 1;
                    warn!(
                        generation,
                        round,
                        candidate_a = a_id.as_str(),
                        candidate_b = b_id.as_str(),
                        error = %exhausted,
                        "Comparison failed, skipping pair"
                    );
                    ctx.observer.emit(
                        Some(attempted),
                        ArenaEvent::ComparisonFailed {
                            generation,
                            round,
                            candidate_a: a_id.clone(),
                            candidate_b: b_id.clone(),
                            error: exhausted.error.to_string(),
                            attempts: exhausted.attempts,
                        },
                    );
                }
            }
        }

        report
    }
}

async fn judge_pair(
    a_id: &str,
    b_id: &str,
    pool: &CandidatePool,
    oracle: &dyn ComparisonOracle,
    ctx: CallContext<'_>,
) -> Result<(ComparisonOutcome, u32), Exhausted> {
    let (a, b) = match (pool.get(a_id), pool.get(b_id)) {
        (Some(a), Some(b)) => (a, b),
        _ => {
            return Err(Exhausted {
                attempts: 0,
                error: OracleError::Validation(format!(
                    "pair ('{a_id}', '{b_id}') names a candidate outside the pool"
                )),
            })
        }
    };

    ctx.retry
        .run("compare", ctx.cancel, move || async move {
            let outcome = oracle.compare(a, b).await?;
            validate_outcome(&outcome, a, b)?;
            Ok(outcome)
        })
        .await
}
