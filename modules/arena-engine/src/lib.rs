pub mod cancel;
pub mod context;
pub mod controller;
pub mod evolution;
pub mod observe;
pub mod oracle;
pub mod pool;
pub mod rating;
pub mod report;
pub mod retry;
pub mod snapshot;
pub mod tournament;

#[cfg(any(test, feature = "test-support"))]
pub mod testing;

pub use cancel::{CancelHandle, CancelSignal};
pub use context::CallContext;
pub use controller::{rank_candidates, Arena, Oracles, Phase, RunOutcome, RunStats};
pub use evolution::{build_feedback, EvolutionReport, EvolutionSelector};
pub use observe::{
    EventId, EventRecord, EventTree, FanoutHook, ObservabilityHook, Observer, TracingHook,
};
pub use oracle::{ComparisonOracle, EvolutionOracle, GenerationOracle, ReportOracle};
pub use pool::{CandidatePool, PoolError};
pub use rating::{expected_score, RatingStore, RatingUpdate};
pub use report::{DerivedSummaries, ImpactMatrix, StakeholderRollup};
pub use retry::{Exhausted, RetryPolicy};
pub use snapshot::RunSnapshot;
pub use tournament::{pair_round, TournamentReport, TournamentScheduler};
