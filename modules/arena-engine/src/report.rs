//! Finalist summaries and report assembly.
//!
//! The engine derives two tables from the finalists before asking the report
//! oracle for prose: an impact matrix (finalist x stakeholder) and a rollup of
//! who is affected by which finalist. Both are plain data; the oracle decides
//! how to present them. A failed report never fails the run.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt::Write as _;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use arena_common::{ArenaEvent, Problem, RankedCandidate, Report};

use crate::context::CallContext;
use crate::observe::EventId;
use crate::oracle::ReportOracle;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ImpactRow {
    pub rank: usize,
    pub candidate_id: String,
    pub title: String,
    pub rating: f64,
    pub generation: u32,
    pub challenge_count: usize,
    /// One cell per entry in [`ImpactMatrix::stakeholders`].
    pub impacts: Vec<Option<String>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ImpactMatrix {
    /// Union of stakeholders named by any finalist, alphabetical.
    pub stakeholders: Vec<String>,
    pub rows: Vec<ImpactRow>,
}

impl ImpactMatrix {
    pub fn from_finalists(finalists: &[RankedCandidate]) -> Self {
        let stakeholders: Vec<String> = finalists
            .iter()
            .flat_map(|f| f.candidate.stakeholder_impacts.keys().cloned())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();

        let rows = finalists
            .iter()
            .map(|f| ImpactRow {
                rank: f.rank,
                candidate_id: f.candidate.id.clone(),
                title: f.candidate.title.clone(),
                rating: f.rating,
                generation: f.candidate.generation,
                challenge_count: f.candidate.implementation_challenges.len(),
                impacts: stakeholders
                    .iter()
                    .map(|s| f.candidate.stakeholder_impacts.get(s).cloned())
                    .collect(),
            })
            .collect();

        Self { stakeholders, rows }
    }

    /// Markdown table, one row per finalist. Missing cells render as "-".
    pub fn to_markdown(&self) -> String {
        let mut out = String::from("| # | Proposal | Rating | Gen | Challenges |");
        for s in &self.stakeholders {
            let _ = write!(out, " {} |", cell(s));
        }
        out.push_str("\n|---|---|---|---|---|");
        for _ in &self.stakeholders {
            out.push_str("---|");
        }
        out.push('\n');

        for row in &self.rows {
            let _ = write!(
                out,
                "| {} | {} | {:.1} | {} | {} |",
                row.rank,
                cell(&row.title),
                row.rating,
                row.generation,
                row.challenge_count
            );
            for impact in &row.impacts {
                let _ = write!(out, " {} |", impact.as_deref().map(cell).unwrap_or_else(|| "-".into()));
            }
            out.push('\n');
        }
        out
    }
}

fn cell(text: &str) -> String {
    text.replace('|', "\\|").replace('\n', " ")
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateNote {
    pub candidate_id: String,
    pub note: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StakeholderRollup {
    /// Stakeholder -> the finalists that name them, in rank order.
    pub stakeholders: BTreeMap<String, Vec<CandidateNote>>,
    pub equity_notes: Vec<CandidateNote>,
    pub economic_notes: Vec<CandidateNote>,
}

impl StakeholderRollup {
    pub fn from_finalists(finalists: &[RankedCandidate]) -> Self {
        let mut rollup = Self::default();
        for f in finalists {
            let id = &f.candidate.id;
            for (stakeholder, impact) in &f.candidate.stakeholder_impacts {
                rollup
                    .stakeholders
                    .entry(stakeholder.clone())
                    .or_default()
                    .push(note(id, impact));
            }
            if let Some(n) = &f.candidate.equity_note {
                rollup.equity_notes.push(note(id, n));
            }
            if let Some(n) = &f.candidate.economic_note {
                rollup.economic_notes.push(note(id, n));
            }
        }
        rollup
    }
}

fn note(candidate_id: &str, text: &str) -> CandidateNote {
    CandidateNote {
        candidate_id: candidate_id.to_string(),
        note: text.to_string(),
    }
}

/// Everything the engine computes about the finalists on its own.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DerivedSummaries {
    pub impact_matrix: ImpactMatrix,
    pub stakeholder_rollup: StakeholderRollup,
}

impl DerivedSummaries {
    pub fn from_finalists(finalists: &[RankedCandidate]) -> Self {
        Self {
            impact_matrix: ImpactMatrix::from_finalists(finalists),
            stakeholder_rollup: StakeholderRollup::from_finalists(finalists),
        }
    }
}

/// Result of the report step. `report` is `None` when the oracle gave up.
#[derive(Debug, Clone)]
pub struct ReportOutcome {
    pub derived: DerivedSummaries,
    pub report: Option<Report>,
    pub error: Option<String>,
}

pub async fn assemble_report(
    problem: &Problem,
    finalists: &[RankedCandidate],
    oracle: &dyn ReportOracle,
    ctx: CallContext<'_>,
    parent: Option<EventId>,
) -> ReportOutcome {
    let derived = DerivedSummaries::from_finalists(finalists);

    let result = {
        let derived = &derived;
        ctx.retry
            .run("report", ctx.cancel, move || async move {
                oracle.build_report(problem, finalists, derived).await
            })
            .await
    };

    match result {
        Ok((report, _attempts)) => {
            info!(title = report.title.as_str(), "Report built");
            ctx.observer.emit(
                parent,
                ArenaEvent::ReportBuilt {
                    title: report.title.clone(),
                },
            );
            ReportOutcome {
                derived,
                report: Some(report),
                error: None,
            }
        }
        Err(exhausted) => {
            warn!(error = %exhausted, "Report oracle failed, returning finalists without a report");
            let error = exhausted.to_string();
            ctx.observer.emit(parent, ArenaEvent::ReportFailed { error: error.clone() });
            ReportOutcome {
                derived,
                report: None,
                error: Some(error),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use arena_common::{Candidate, CandidateDraft};

    use super::*;

    fn finalist(rank: usize, id: &str, draft: CandidateDraft) -> RankedCandidate {
        RankedCandidate {
            rank,
            rating: 1200.0 + (10 - rank) as f64,
            candidate: Candidate::seed(id, draft),
        }
    }

    fn finalists() -> Vec<RankedCandidate> {
        let mut transit = CandidateDraft::new("Free buses", "d", "r")
            .with_stakeholder("riders", "save fares")
            .with_stakeholder("city budget", "loses fare revenue");
        transit.equity_note = Some("helps low-income riders".into());
        transit.implementation_challenges = vec!["funding".into(), "fleet size".into()];

        let mut pricing = CandidateDraft::new("Congestion | pricing", "d", "r")
            .with_stakeholder("drivers", "pay to enter")
            .with_stakeholder("riders", "faster buses");
        pricing.economic_note = Some("raises revenue".into());

        vec![finalist(1, "transit", transit), finalist(2, "pricing", pricing)]
    }

    #[test]
    fn matrix_aligns_cells_with_stakeholders() {
        let matrix = ImpactMatrix::from_finalists(&finalists());
        assert_eq!(matrix.stakeholders, vec!["city budget", "drivers", "riders"]);
        assert_eq!(matrix.rows[0].challenge_count, 2);
        assert_eq!(
            matrix.rows[0].impacts,
            vec![Some("loses fare revenue".into()), None, Some("save fares".into())]
        );
        assert_eq!(matrix.rows[1].impacts[0], None);
    }

    #[test]
    fn markdown_escapes_pipes_and_fills_gaps() {
        let md = ImpactMatrix::from_finalists(&finalists()).to_markdown();
        assert!(md.contains("Congestion \\| pricing"));
        assert!(md.lines().nth(2).unwrap().contains(" - |"));
        assert_eq!(md.lines().count(), 4);
    }

    #[test]
    fn rollup_groups_by_stakeholder_in_rank_order() {
        let rollup = StakeholderRollup::from_finalists(&finalists());
        let riders = &rollup.stakeholders["riders"];
        assert_eq!(riders.len(), 2);
        assert_eq!(riders[0].candidate_id, "transit");
        assert_eq!(riders[1].note, "faster buses");
        assert_eq!(rollup.equity_notes.len(), 1);
        assert_eq!(rollup.economic_notes[0].candidate_id, "pricing");
    }

    #[test]
    fn empty_finalists_give_empty_summaries() {
        let derived = DerivedSummaries::from_finalists(&[]);
        assert!(derived.impact_matrix.rows.is_empty());
        assert!(derived.stakeholder_rollup.stakeholders.is_empty());
    }
}
