//! Generation controller: drives seeding, tournaments, evolution and final
//! selection for one problem.
//!
//! Only seeding can fail a run. Every later oracle failure is logged, emitted
//! as an event and absorbed: a skipped comparison, a parent without a
//! successor, a run without a report.

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};
use uuid::Uuid;

use arena_common::{
    ArenaEvent, Candidate, CandidateDraft, ComparisonRecord, EngineConfig, EngineError, Problem,
    RankedCandidate, Report,
};

use crate::cancel::CancelSignal;
use crate::context::CallContext;
use crate::evolution::{build_feedback, EvolutionSelector};
use crate::observe::{EventId, ObservabilityHook, Observer, TracingHook};
use crate::oracle::{
    validate_seed_batch, ComparisonOracle, EvolutionOracle, GenerationOracle, ReportOracle,
};
use crate::pool::CandidatePool;
use crate::rating::RatingStore;
use crate::report::{assemble_report, DerivedSummaries};
use crate::retry::RetryPolicy;
use crate::tournament::TournamentScheduler;

/// The four external collaborators a run needs.
#[derive(Clone)]
pub struct Oracles {
    pub generation: Arc<dyn GenerationOracle>,
    pub comparison: Arc<dyn ComparisonOracle>,
    pub evolution: Arc<dyn EvolutionOracle>,
    pub report: Arc<dyn ReportOracle>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Seeding,
    Tournament { generation: u32 },
    Evolving { generation: u32 },
    Finalizing,
}

impl Phase {
    /// The phase that follows `self` in a run of `generations` generations.
    /// The last generation's tournament goes straight to finalizing.
    pub fn next(self, generations: u32) -> Phase {
        match self {
            Phase::Seeding => Phase::Tournament { generation: 0 },
            Phase::Tournament { generation } if generation + 1 < generations => {
                Phase::Evolving { generation }
            }
            Phase::Tournament { .. } => Phase::Finalizing,
            Phase::Evolving { generation } => Phase::Tournament {
                generation: generation + 1,
            },
            Phase::Finalizing => Phase::Finalizing,
        }
    }
}

/// Counters for one run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunStats {
    pub generations_completed: u32,
    pub seed_attempts: u32,
    pub seeded: usize,
    pub comparisons_attempted: u32,
    pub comparisons_succeeded: u32,
    pub comparisons_failed: u32,
    pub evolutions_attempted: u32,
    pub evolutions_succeeded: u32,
    pub evolutions_failed: u32,
    pub final_pool_size: usize,
    pub report_built: bool,
}

impl fmt::Display for RunStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "=== Arena Run Complete ===")?;
        writeln!(f, "Generations:        {}", self.generations_completed)?;
        writeln!(f, "Seeded candidates:  {} ({} attempt(s))", self.seeded, self.seed_attempts)?;
        writeln!(f, "Final pool size:    {}", self.final_pool_size)?;
        writeln!(
            f,
            "Comparisons:        {} ok / {} failed / {} attempted",
            self.comparisons_succeeded, self.comparisons_failed, self.comparisons_attempted
        )?;
        writeln!(
            f,
            "Evolutions:         {} ok / {} failed / {} attempted",
            self.evolutions_succeeded, self.evolutions_failed, self.evolutions_attempted
        )?;
        write!(
            f,
            "Report:             {}",
            if self.report_built { "built" } else { "not built" }
        )
    }
}

/// Everything a finished run produced.
#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub run_id: String,
    pub problem: Problem,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    /// Best first, at most `final_top_n`.
    pub finalists: Vec<RankedCandidate>,
    pub pool: CandidatePool,
    pub ratings: RatingStore,
    pub comparisons: Vec<ComparisonRecord>,
    pub derived: DerivedSummaries,
    pub report: Option<Report>,
    pub report_error: Option<String>,
    pub stats: RunStats,
}

/// Runs the generation loop. Built once, reusable across problems.
pub struct Arena {
    config: EngineConfig,
    oracles: Oracles,
    hook: Arc<dyn ObservabilityHook>,
    cancel: CancelSignal,
}

impl Arena {
    pub fn new(config: EngineConfig, oracles: Oracles) -> Result<Self, EngineError> {
        config.validate()?;
        Ok(Self {
            config,
            oracles,
            hook: Arc::new(TracingHook),
            cancel: CancelSignal::never(),
        })
    }

    pub fn with_hook(mut self, hook: Arc<dyn ObservabilityHook>) -> Self {
        self.hook = hook;
        self
    }

    pub fn with_cancel(mut self, cancel: CancelSignal) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub async fn run(&self, problem: &Problem) -> Result<RunOutcome, EngineError> {
        let run_id = Uuid::new_v4().to_string();
        let started_at = Utc::now();
        let observer = Observer::new(run_id.clone(), self.hook.clone());
        let retry = RetryPolicy::from(&self.config.retry);
        let ctx = CallContext {
            observer: &observer,
            retry: &retry,
            cancel: &self.cancel,
        };
        let mut rng = match self.config.rng_seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };

        let generations = self.config.generations;
        let run_event = observer.emit(
            None,
            ArenaEvent::RunStarted {
                problem_statement: problem.statement.clone(),
                generations,
                rounds_per_tournament: self.config.rounds_per_tournament,
            },
        );
        info!(run_id = run_id.as_str(), generations, "Arena run started");

        let scheduler = TournamentScheduler::new(
            self.config.rounds_per_tournament,
            self.config.max_concurrent_calls,
        );
        let selector =
            EvolutionSelector::new(self.config.evolve_top_k, self.config.max_concurrent_calls);

        let mut pool = CandidatePool::new();
        let mut ratings = RatingStore::new();
        let mut comparisons: Vec<ComparisonRecord> = Vec::new();
        let mut stats = RunStats::default();
        let mut phase = Phase::Seeding;

        loop {
            match phase {
                Phase::Seeding => {
                    let (seeded, attempts) = self.seed(problem, ctx, run_event).await?;
                    stats.seed_attempts = attempts;
                    stats.seeded = seeded.len();
                    pool = seeded;
                }
                Phase::Tournament { generation } => {
                    if self.cancel.is_cancelled() {
                        warn!(generation, "Run cancelled, oracle calls will be skipped");
                    }
                    let ids = pool.ids();
                    let report = scheduler
                        .run(
                            generation,
                            &ids,
                            &pool,
                            &mut ratings,
                            self.oracles.comparison.as_ref(),
                            &mut rng,
                            ctx,
                            Some(run_event),
                        )
                        .await;
                    stats.comparisons_attempted += report.attempted;
                    stats.comparisons_succeeded += report.succeeded;
                    stats.comparisons_failed += report.failed;
                    comparisons.extend(report.comparisons);

                    if generation + 1 == generations {
                        self.complete_generation(&observer, run_event, generation, &pool, 0, &mut stats);
                    }
                }
                Phase::Evolving { generation } => {
                    let feedback =
                        build_feedback(&pool, &ratings, &comparisons, self.config.feedback_reasons);
                    let report = selector
                        .run(
                            generation,
                            &mut pool,
                            &ratings,
                            self.oracles.evolution.as_ref(),
                            &feedback,
                            ctx,
                            Some(run_event),
                        )
                        .await;
                    stats.evolutions_attempted += report.selected.len() as u32;
                    stats.evolutions_succeeded += report.succeeded;
                    stats.evolutions_failed += report.failed;
                    self.complete_generation(
                        &observer,
                        run_event,
                        generation,
                        &pool,
                        report.succeeded as usize,
                        &mut stats,
                    );
                }
                Phase::Finalizing => break,
            }
            phase = phase.next(generations);
        }

        let finalists = rank_candidates(&pool, &ratings, self.config.final_top_n);
        observer.emit(
            Some(run_event),
            ArenaEvent::FinalSelectionMade {
                candidate_ids: finalists.iter().map(|f| f.candidate.id.clone()).collect(),
                ratings: finalists.iter().map(|f| f.rating).collect(),
            },
        );

        let reported = assemble_report(
            problem,
            &finalists,
            self.oracles.report.as_ref(),
            ctx,
            Some(run_event),
        )
        .await;

        stats.final_pool_size = pool.len();
        stats.report_built = reported.report.is_some();

        observer.emit(
            Some(run_event),
            ArenaEvent::RunCompleted {
                pool_size: pool.len(),
                comparisons_succeeded: stats.comparisons_succeeded,
                comparisons_failed: stats.comparisons_failed,
                evolutions_succeeded: stats.evolutions_succeeded,
                evolutions_failed: stats.evolutions_failed,
            },
        );
        info!(
            run_id = run_id.as_str(),
            pool_size = pool.len(),
            finalists = finalists.len(),
            "Arena run complete"
        );

        Ok(RunOutcome {
            run_id,
            problem: problem.clone(),
            started_at,
            finished_at: Utc::now(),
            finalists,
            pool,
            ratings,
            comparisons,
            derived: reported.derived,
            report: reported.report,
            report_error: reported.error,
            stats,
        })
    }

    async fn seed(
        &self,
        problem: &Problem,
        ctx: CallContext<'_>,
        run_event: EventId,
    ) -> Result<(CandidatePool, u32), EngineError> {
        let oracle = self.oracles.generation.as_ref();
        let result = ctx
            .retry
            .run("generate", ctx.cancel, move || async move {
                let drafts = oracle.generate(problem).await?;
                validate_seed_batch(&drafts)?;
                Ok(drafts)
            })
            .await;

        let (drafts, attempts) = match result {
            Ok(ok) => ok,
            Err(exhausted) => {
                error!(error = %exhausted, "Seeding failed, aborting run");
                ctx.observer.emit(
                    Some(run_event),
                    ArenaEvent::SeedingFailed {
                        error: exhausted.error.to_string(),
                        attempts: exhausted.attempts,
                    },
                );
                return Err(EngineError::Seeding {
                    problem_statement: problem.statement.clone(),
                    attempts: exhausted.attempts,
                    source: exhausted.error,
                });
            }
        };

        let pool = CandidatePool::from_candidates(seed_candidates(drafts)).map_err(|e| {
            EngineError::Seeding {
                problem_statement: problem.statement.clone(),
                attempts,
                source: arena_common::OracleError::Validation(e.to_string()),
            }
        })?;

        ctx.observer.emit(
            Some(run_event),
            ArenaEvent::GenerationSeeded {
                generation: 0,
                candidate_ids: pool.ids(),
                attempts,
            },
        );
        info!(seeded = pool.len(), attempts, "Seed population ready");
        Ok((pool, attempts))
    }

    fn complete_generation(
        &self,
        observer: &Observer,
        run_event: EventId,
        generation: u32,
        pool: &CandidatePool,
        evolved: usize,
        stats: &mut RunStats,
    ) {
        stats.generations_completed = generation + 1;
        observer.emit(
            Some(run_event),
            ArenaEvent::GenerationCompleted {
                generation,
                pool_size: pool.len(),
                evolved,
            },
        );
        info!(generation, pool_size = pool.len(), evolved, "Generation complete");
    }
}

/// Turn a validated seed batch into generation-0 candidates. Drafts without a
/// suggested id get `proposal_N`, skipping any N a suggested id already uses.
fn seed_candidates(drafts: Vec<CandidateDraft>) -> Vec<Candidate> {
    let mut taken: HashSet<String> = drafts
        .iter()
        .filter_map(|d| d.id.as_deref().map(|id| id.trim().to_string()))
        .collect();
    let mut next = 1usize;

    drafts
        .into_iter()
        .map(|draft| {
            let id = match draft.id.as_deref().map(str::trim) {
                Some(id) => id.to_string(),
                None => loop {
                    let candidate = format!("proposal_{next}");
                    next += 1;
                    if taken.insert(candidate.clone()) {
                        break candidate;
                    }
                },
            };
            Candidate::seed(id, draft)
        })
        .collect()
}

/// The `n` best candidates with 1-based ranks, using the pool's ranking order.
pub fn rank_candidates(pool: &CandidatePool, ratings: &RatingStore, n: usize) -> Vec<RankedCandidate> {
    pool.ranked(ratings)
        .into_iter()
        .take(n)
        .enumerate()
        .map(|(i, (candidate, rating))| RankedCandidate {
            rank: i + 1,
            rating,
            candidate: candidate.clone(),
        })
        .collect()
}
