//! Prompt text for the four oracles.

use arena_common::{Candidate, Problem, RankedCandidate};
use arena_engine::DerivedSummaries;

const PROPOSAL_SHAPE: &str = r#"{
  "title": "short name for the proposal",
  "description": "what would actually be done, concretely",
  "rationale": "why this would work",
  "stakeholder_impacts": { "stakeholder group": "how they are affected" },
  "implementation_challenges": ["challenge"],
  "equity_note": "who gains or loses, or null",
  "economic_note": "costs, funding, economic effects, or null"
}"#;

pub fn proposer_system() -> String {
    format!(
        r#"You are a policy analyst generating distinct, concrete proposals for an open-ended public problem.

Each proposal must be a genuinely different approach, not a variation of another. Prefer specific,
actionable measures over general principles. Name the stakeholder groups each proposal affects.

Return JSON only:
{{
  "proposals": [
    {{ "id": "short_snake_case_id", ...proposal fields... }}
  ]
}}

Each proposal has this shape (plus the "id"):
{PROPOSAL_SHAPE}"#
    )
}

pub fn proposer_user(problem: &Problem, count: usize) -> String {
    let mut out = format!("## PROBLEM\n\n{}\n", problem.statement.trim());
    if !problem.context.trim().is_empty() {
        out.push_str(&format!("\n## CONTEXT\n\n{}\n", problem.context.trim()));
    }
    out.push_str(&format!("\nGenerate {count} distinct proposals."));
    out
}

pub fn judge_system() -> &'static str {
    r#"You are an impartial judge comparing two proposals for the same public problem.

Weigh, in order:
1. Likely effectiveness at solving the stated problem
2. Feasibility: cost, political and practical obstacles
3. Fairness: who bears the costs and who gets the benefits
4. Clarity and specificity of the proposal itself

Do not favour a proposal for being longer or listed first. You must pick exactly one winner.

Return JSON only:
{
  "winner_id": "the ID of the better proposal, exactly as given",
  "reasoning": "2-3 sentences on the deciding differences"
}"#
}

pub fn judge_user(a: &Candidate, b: &Candidate) -> String {
    format!(
        "## PROPOSAL 1\n\n{}\n## PROPOSAL 2\n\n{}\nWhich proposal is better? Answer with its ID.",
        a.render(),
        b.render()
    )
}

pub fn refiner_system() -> String {
    format!(
        r#"You improve a policy proposal that did well in head-to-head comparisons.

Keep what made it strong. Address the weaknesses the judges pointed out and the gaps relative to
the other leading proposals. The result must still be recognisably the same approach, made
better: more specific, more feasible, fairer.

Return JSON only, with the full improved proposal plus a note on what changed:
{PROPOSAL_SHAPE}
plus
  "improvement_note": "one or two sentences on what changed and why""#
    )
}

pub fn refiner_user(candidate: &Candidate, feedback: &str) -> String {
    let mut out = format!("## PROPOSAL TO IMPROVE\n\n{}", candidate.render());
    if !feedback.trim().is_empty() {
        out.push_str(&format!("\n## TOURNAMENT FEEDBACK\n\n{}\n", feedback.trim()));
    }
    out
}

pub fn reporter_system() -> &'static str {
    r#"You write a briefing for decision makers summarising the strongest proposals for a public problem.

Structure:
- A top-level markdown heading with the report title
- A one-paragraph summary of the recommended direction
- One section per finalist, in rank order: what it does, why it ranked where it did, key risks
- A section on stakeholder trade-offs across the finalists
- A short closing recommendation

Write plain markdown. Do not wrap the report in a code fence."#
}

pub fn reporter_user(
    problem: &Problem,
    finalists: &[RankedCandidate],
    derived: &DerivedSummaries,
) -> String {
    let mut out = format!("## PROBLEM\n\n{}\n\n## FINALISTS\n", problem.statement.trim());
    for f in finalists {
        out.push_str(&format!(
            "\n### Rank {} (rating {:.1}, generation {})\n\n{}",
            f.rank,
            f.rating,
            f.candidate.generation,
            f.candidate.render()
        ));
    }

    if !derived.impact_matrix.rows.is_empty() {
        out.push_str("\n## IMPACT MATRIX\n\n");
        out.push_str(&derived.impact_matrix.to_markdown());
    }

    let rollup = &derived.stakeholder_rollup;
    if !rollup.stakeholders.is_empty() {
        out.push_str("\n## STAKEHOLDERS\n");
        for (stakeholder, notes) in &rollup.stakeholders {
            out.push_str(&format!("\n{stakeholder}:\n"));
            for n in notes {
                out.push_str(&format!("- [{}] {}\n", n.candidate_id, n.note));
            }
        }
    }
    for (heading, notes) in [("EQUITY", &rollup.equity_notes), ("ECONOMICS", &rollup.economic_notes)] {
        if notes.is_empty() {
            continue;
        }
        out.push_str(&format!("\n## {heading}\n\n"));
        for n in notes {
            out.push_str(&format!("- [{}] {}\n", n.candidate_id, n.note));
        }
    }
    out
}
