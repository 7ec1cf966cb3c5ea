//! Tournament scheduler behaviour against scripted judges.

use std::sync::Arc;
use std::time::Duration;

use arena_common::ArenaEvent;
use arena_engine::testing::{fast_retry, seeded_pool, RuleJudge};
use arena_engine::{
    CallContext, CancelSignal, EventTree, Observer, RatingStore, RetryPolicy, TournamentScheduler,
};
use rand::rngs::StdRng;
use rand::SeedableRng;

struct Fixture {
    tree: Arc<EventTree>,
    observer: Observer,
    retry: RetryPolicy,
    cancel: CancelSignal,
}

impl Fixture {
    fn new() -> Self {
        let tree = Arc::new(EventTree::new());
        Self {
            observer: Observer::new("test-run", tree.clone()),
            tree,
            retry: fast_retry(),
            cancel: CancelSignal::never(),
        }
    }

    fn ctx(&self) -> CallContext<'_> {
        CallContext {
            observer: &self.observer,
            retry: &self.retry,
            cancel: &self.cancel,
        }
    }
}

fn pair(a: &str, b: &str) -> (String, String) {
    (a.to_string(), b.to_string())
}

fn ids(raw: &[&str]) -> Vec<String> {
    raw.iter().map(|s| s.to_string()).collect()
}

#[tokio::test]
async fn transitive_wins_order_the_ratings() {
    let fx = Fixture::new();
    let pool = seeded_pool(&["A", "B", "C"]);
    let judge = RuleJudge::new().prefer(&["A", "B", "C"]);
    let mut ratings = RatingStore::new();

    let report = TournamentScheduler::new(1, 4)
        .play_round(
            0,
            1,
            &[pair("A", "B"), pair("B", "C")],
            &pool,
            &mut ratings,
            &judge,
            fx.ctx(),
            None,
        )
        .await;

    assert_eq!(report.succeeded, 2);
    assert_eq!(report.failed, 0);
    assert!(ratings.get("A") > ratings.get("B"));
    assert!(ratings.get("B") > ratings.get("C"));
    assert!(ratings.get("A") > 1200.0);
    assert!(ratings.get("C") < 1200.0);
    assert_eq!(fx.tree.count("comparison_succeeded"), 2);
    assert_eq!(fx.tree.count("rating_updated"), 2);
}

#[tokio::test]
async fn failed_pair_leaves_other_pairs_untouched() {
    let fx = Fixture::new();
    let pool = seeded_pool(&["a", "b", "c", "d", "e", "f"]);
    let judge = RuleJudge::new().fail_involving("c");
    let mut ratings = RatingStore::new();

    let report = TournamentScheduler::new(1, 3)
        .play_round(
            0,
            1,
            &[pair("a", "b"), pair("c", "d"), pair("e", "f")],
            &pool,
            &mut ratings,
            &judge,
            fx.ctx(),
            None,
        )
        .await;

    assert_eq!(report.attempted, 3);
    assert_eq!(report.succeeded, 2);
    assert_eq!(report.failed, 1);
    assert_eq!(ratings.get("c"), 1200.0);
    assert_eq!(ratings.get("d"), 1200.0);
    assert!(!ratings.is_rated("c"));
    assert!(ratings.get("a") > 1200.0);
    assert!(ratings.get("e") > 1200.0);

    // Two successful calls plus both attempts on the failing pair.
    assert_eq!(judge.calls(), 4);
    let failed = fx.tree.of_type("comparison_failed");
    assert_eq!(failed.len(), 1);
    match &failed[0].event {
        ArenaEvent::ComparisonFailed { attempts, candidate_a, .. } => {
            assert_eq!(*attempts, 2);
            assert_eq!(candidate_a, "c");
        }
        other => panic!("unexpected event {other:?}"),
    }
    assert_eq!(fx.tree.count("rating_updated"), 2);
}

#[tokio::test]
async fn foreign_winner_is_treated_as_failure() {
    let fx = Fixture::new();
    let pool = seeded_pool(&["a", "b"]);
    let judge = RuleJudge::new().malformed_involving("a");
    let mut ratings = RatingStore::new();

    let report = TournamentScheduler::new(1, 1)
        .play_round(0, 1, &[pair("a", "b")], &pool, &mut ratings, &judge, fx.ctx(), None)
        .await;

    assert_eq!(report.failed, 1);
    assert_eq!(judge.calls(), 2);
    assert!(ratings.is_empty());
}

#[tokio::test]
async fn pair_outside_pool_fails_without_calling_judge() {
    let fx = Fixture::new();
    let pool = seeded_pool(&["a"]);
    let judge = RuleJudge::new();
    let mut ratings = RatingStore::new();

    let report = TournamentScheduler::new(1, 1)
        .play_round(0, 1, &[pair("a", "zz")], &pool, &mut ratings, &judge, fx.ctx(), None)
        .await;

    assert_eq!(report.failed, 1);
    assert_eq!(judge.calls(), 0);
}

#[tokio::test]
async fn tiny_pools_play_no_rounds() {
    for raw in [&[][..], &["solo"][..]] {
        let fx = Fixture::new();
        let pool = seeded_pool(raw);
        let judge = RuleJudge::new();
        let mut ratings = RatingStore::new();
        let mut rng = StdRng::seed_from_u64(1);

        let report = TournamentScheduler::new(5, 2)
            .run(0, &ids(raw), &pool, &mut ratings, &judge, &mut rng, fx.ctx(), None)
            .await;

        assert_eq!(report.rounds_played, 0);
        assert_eq!(judge.calls(), 0);
        assert_eq!(fx.tree.count("round_started"), 0);
        assert_eq!(fx.tree.count("tournament_started"), 1);
        assert_eq!(fx.tree.count("tournament_completed"), 1);
    }
}

#[tokio::test]
async fn two_candidates_meet_every_round() {
    let fx = Fixture::new();
    let pool = seeded_pool(&["x", "y"]);
    let judge = RuleJudge::new().prefer(&["x"]);
    let mut ratings = RatingStore::new();
    let mut rng = StdRng::seed_from_u64(9);

    let report = TournamentScheduler::new(5, 2)
        .run(0, &ids(&["x", "y"]), &pool, &mut ratings, &judge, &mut rng, fx.ctx(), None)
        .await;

    assert_eq!(report.rounds_played, 5);
    assert_eq!(report.succeeded, 5);
    assert_eq!(judge.calls(), 5);
    assert!(report.comparisons.iter().all(|c| c.winner_id == "x"));
    // Zero-sum: what x gained, y lost.
    assert!((ratings.get("x") + ratings.get("y") - 2400.0).abs() < 1e-9);
}

#[tokio::test]
async fn odd_pool_sits_one_out_each_round() {
    let fx = Fixture::new();
    let raw = ["a", "b", "c", "d", "e"];
    let pool = seeded_pool(&raw);
    let judge = RuleJudge::new();
    let mut ratings = RatingStore::new();
    let mut rng = StdRng::seed_from_u64(5);

    let report = TournamentScheduler::new(3, 4)
        .run(2, &ids(&raw), &pool, &mut ratings, &judge, &mut rng, fx.ctx(), None)
        .await;

    assert_eq!(report.succeeded, 6);
    let rounds = fx.tree.of_type("round_started");
    assert_eq!(rounds.len(), 3);
    for record in rounds {
        match record.event {
            ArenaEvent::RoundStarted { generation, pairs, sitting_out, .. } => {
                assert_eq!(generation, 2);
                assert_eq!(pairs, 2);
                assert!(sitting_out.is_some());
            }
            other => panic!("unexpected event {other:?}"),
        }
    }
    assert!(report.comparisons.iter().all(|c| c.generation == 2));
}

#[tokio::test]
async fn concurrency_stays_within_bound() {
    let fx = Fixture::new();
    let raw = ["a", "b", "c", "d", "e", "f", "g", "h"];
    let pool = seeded_pool(&raw);
    let judge = RuleJudge::new().with_delay(Duration::from_millis(20));
    let mut ratings = RatingStore::new();

    let pairs = [pair("a", "b"), pair("c", "d"), pair("e", "f"), pair("g", "h")];
    let report = TournamentScheduler::new(1, 2)
        .play_round(0, 1, &pairs, &pool, &mut ratings, &judge, fx.ctx(), None)
        .await;

    assert_eq!(report.succeeded, 4);
    assert!(judge.max_in_flight() <= 2);
    assert!(judge.max_in_flight() >= 1);
}

#[tokio::test]
async fn events_nest_under_round_and_attempt() {
    let fx = Fixture::new();
    let pool = seeded_pool(&["a", "b"]);
    let judge = RuleJudge::new();
    let mut ratings = RatingStore::new();
    let mut rng = StdRng::seed_from_u64(2);

    TournamentScheduler::new(1, 1)
        .run(0, &ids(&["a", "b"]), &pool, &mut ratings, &judge, &mut rng, fx.ctx(), None)
        .await;

    assert!(fx.tree.is_well_formed());
    let parent_type = |event_type: &str| {
        let record = fx.tree.of_type(event_type).remove(0);
        fx.tree
            .get(record.parent_id.unwrap())
            .unwrap()
            .event_type()
    };
    assert_eq!(parent_type("round_started"), "tournament_started");
    assert_eq!(parent_type("comparison_attempted"), "round_started");
    assert_eq!(parent_type("comparison_succeeded"), "comparison_attempted");
    assert_eq!(parent_type("rating_updated"), "comparison_succeeded");
}
