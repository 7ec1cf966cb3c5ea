//! Candidate data model shared by the engine and the oracles.
//!
//! Candidates are immutable once created. Evolution never edits a candidate in
//! place; it builds a successor with a derived id and a parent link.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Rating assumed for any candidate that has not been compared yet.
pub const DEFAULT_RATING: f64 = 1200.0;

/// Maximum rating movement from a single comparison.
pub const K_FACTOR: f64 = 32.0;

/// The open-ended problem the run is trying to solve.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Problem {
    pub statement: String,
    /// Free-form background handed to the generation oracle (local data,
    /// prior research). Empty when the caller has none.
    #[serde(default)]
    pub context: String,
}

impl Problem {
    pub fn new(statement: impl Into<String>) -> Self {
        Self {
            statement: statement.into(),
            context: String::new(),
        }
    }

    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = context.into();
        self
    }
}

/// A proposal body as returned by an oracle, before the engine assigns
/// identity, generation and lineage.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CandidateDraft {
    /// Identifier suggested by the generation oracle. Ignored for evolved drafts.
    #[serde(default)]
    pub id: Option<String>,
    pub title: String,
    pub description: String,
    pub rationale: String,
    #[serde(default)]
    pub stakeholder_impacts: BTreeMap<String, String>,
    #[serde(default)]
    pub implementation_challenges: Vec<String>,
    #[serde(default)]
    pub equity_note: Option<String>,
    #[serde(default)]
    pub economic_note: Option<String>,
}

impl CandidateDraft {
    pub fn new(
        title: impl Into<String>,
        description: impl Into<String>,
        rationale: impl Into<String>,
    ) -> Self {
        Self {
            title: title.into(),
            description: description.into(),
            rationale: rationale.into(),
            ..Default::default()
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_stakeholder(mut self, stakeholder: impl Into<String>, impact: impl Into<String>) -> Self {
        self.stakeholder_impacts.insert(stakeholder.into(), impact.into());
        self
    }

    /// Names of required fields that are blank.
    pub fn missing_fields(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.title.trim().is_empty() {
            missing.push("title");
        }
        if self.description.trim().is_empty() {
            missing.push("description");
        }
        if self.rationale.trim().is_empty() {
            missing.push("rationale");
        }
        missing
    }
}

/// What the evolution oracle hands back for one parent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvolvedDraft {
    pub draft: CandidateDraft,
    pub improvement_note: String,
}

/// A single tracked proposal.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Candidate {
    pub id: String,
    pub title: String,
    pub description: String,
    pub rationale: String,
    pub generation: u32,
    #[serde(default)]
    pub stakeholder_impacts: BTreeMap<String, String>,
    #[serde(default)]
    pub implementation_challenges: Vec<String>,
    #[serde(default)]
    pub equity_note: Option<String>,
    #[serde(default)]
    pub economic_note: Option<String>,
    #[serde(default)]
    pub parent_id: Option<String>,
    /// Why the evolution oracle thinks this version is better than its parent.
    #[serde(default)]
    pub improvement_note: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Candidate {
    /// Build a generation-0 candidate from a seeding draft.
    pub fn seed(id: impl Into<String>, draft: CandidateDraft) -> Self {
        Self::from_draft(id.into(), draft, 0, None, None)
    }

    /// Derived identifier for the successor of `parent_id` born in `generation`.
    pub fn evolved_id(parent_id: &str, generation: u32) -> String {
        format!("{parent_id}_evolved_{generation}")
    }

    /// Build the successor of `self` for the generation after `from_generation`.
    ///
    /// `from_generation` is the generation whose tournament selected the parent,
    /// which may be later than the parent's own generation.
    pub fn evolve(&self, from_generation: u32, evolved: EvolvedDraft) -> Self {
        let generation = from_generation + 1;
        let note = evolved.improvement_note.trim();
        let note = (!note.is_empty()).then(|| note.to_string());
        Self::from_draft(
            Self::evolved_id(&self.id, generation),
            evolved.draft,
            generation,
            Some(self.id.clone()),
            note,
        )
    }

    fn from_draft(
        id: String,
        draft: CandidateDraft,
        generation: u32,
        parent_id: Option<String>,
        improvement_note: Option<String>,
    ) -> Self {
        Self {
            id,
            title: draft.title.trim().to_string(),
            description: draft.description.trim().to_string(),
            rationale: draft.rationale.trim().to_string(),
            generation,
            stakeholder_impacts: draft.stakeholder_impacts,
            implementation_challenges: draft.implementation_challenges,
            equity_note: draft.equity_note,
            economic_note: draft.economic_note,
            parent_id,
            improvement_note,
            created_at: Utc::now(),
        }
    }

    /// Full text handed to the judge and evolution oracles.
    pub fn render(&self) -> String {
        let mut out = format!(
            "ID: {}\nTitle: {}\n\nDescription:\n{}\n\nRationale:\n{}\n",
            self.id, self.title, self.description, self.rationale
        );
        if !self.stakeholder_impacts.is_empty() {
            out.push_str("\nStakeholder impacts:\n");
            for (stakeholder, impact) in &self.stakeholder_impacts {
                out.push_str(&format!("- {stakeholder}: {impact}\n"));
            }
        }
        if !self.implementation_challenges.is_empty() {
            out.push_str("\nImplementation challenges:\n");
            for challenge in &self.implementation_challenges {
                out.push_str(&format!("- {challenge}\n"));
            }
        }
        if let Some(note) = &self.equity_note {
            out.push_str(&format!("\nEquity: {note}\n"));
        }
        if let Some(note) = &self.economic_note {
            out.push_str(&format!("\nEconomics: {note}\n"));
        }
        out
    }
}

/// Judge verdict for one pairing. `reasoning` is opaque to the engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComparisonOutcome {
    pub winner_id: String,
    pub loser_id: String,
    #[serde(default)]
    pub reasoning: String,
}

/// A successful comparison, kept for reporting and evolution feedback.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComparisonRecord {
    pub generation: u32,
    pub round: u32,
    pub winner_id: String,
    pub loser_id: String,
    pub reasoning: String,
}

/// A finalist with its position in the final ordering.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RankedCandidate {
    /// 1-based.
    pub rank: usize,
    pub rating: f64,
    pub candidate: Candidate,
}

/// Output of the reporting oracle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Report {
    pub title: String,
    pub body: String,
}
