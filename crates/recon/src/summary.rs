use std::collections::BTreeMap;
use std::fmt::Write as _;

use serde::Serialize;

use crate::matcher::{Confidence, MatchResult};
use crate::model::{RejectedField, RowKind, SkipEntry, SkipReason};
use crate::reader::ReadOutput;
use crate::rows::RowOutcome;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub source_rows: usize,
    pub target_rows: usize,
    pub matched_exact: usize,
    pub matched_probable: usize,
    pub updated: usize,
    pub created: usize,
    pub unchanged: usize,
    /// Source rows outside the run's department filter.
    pub filtered: usize,
    pub skipped_by_reason: BTreeMap<SkipReason, usize>,
    /// Read skips (source, then target), then per-record skips in source order.
    pub skipped: Vec<SkipEntry>,
    pub rejected_fields: Vec<RejectedField>,
}

impl RunSummary {
    pub fn skipped_total(&self) -> usize {
        self.skipped.len()
    }
}

/// Compute run counts from the read outputs, matcher decisions and per-record outcomes.
pub fn compute_summary(
    source: &ReadOutput,
    target: &ReadOutput,
    matches: &[MatchResult],
    outcomes: &[RowOutcome],
    rejected_fields: Vec<RejectedField>,
) -> RunSummary {
    let mut summary = RunSummary {
        source_rows: source.records.len() + source.skipped.len(),
        target_rows: target.records.len() + target.skipped.len(),
        filtered: source.filtered,
        rejected_fields,
        ..RunSummary::default()
    };

    for m in matches {
        match m.confidence() {
            Confidence::Exact => summary.matched_exact += 1,
            Confidence::Probable => summary.matched_probable += 1,
            Confidence::None => {}
        }
    }

    summary.skipped.extend(source.skipped.iter().cloned());
    summary.skipped.extend(target.skipped.iter().cloned());
    for outcome in outcomes {
        match outcome {
            RowOutcome::Row(row) => match row.kind {
                RowKind::Update => summary.updated += 1,
                RowKind::Create => summary.created += 1,
            },
            RowOutcome::Unchanged => summary.unchanged += 1,
            RowOutcome::Skip(skip) => summary.skipped.push(skip.clone()),
        }
    }

    for skip in &summary.skipped {
        *summary.skipped_by_reason.entry(skip.reason).or_insert(0) += 1;
    }
    summary
}

/// Human-readable summary, one fact per line.
pub fn render_text(summary: &RunSummary) -> String {
    let mut out = String::new();
    let s = summary;
    let _ = writeln!(out, "read: {} source rows, {} target rows", s.source_rows, s.target_rows);
    if s.filtered > 0 {
        let _ = writeln!(out, "filtered: {} source rows outside the department filter", s.filtered);
    }
    let _ = writeln!(out, "matched: {} exact, {} probable", s.matched_exact, s.matched_probable);
    let _ = writeln!(out, "rows: {} updated, {} created, {} unchanged", s.updated, s.created, s.unchanged);

    if s.skipped.is_empty() {
        let _ = writeln!(out, "skipped: none");
    } else {
        let by_reason: Vec<String> =
            s.skipped_by_reason.iter().map(|(reason, n)| format!("{n} {reason}")).collect();
        let _ = writeln!(out, "skipped: {} ({})", s.skipped.len(), by_reason.join(", "));
        for skip in &s.skipped {
            let name = if skip.name.is_empty() { "-" } else { skip.name.as_str() };
            let page = skip.page.map(|p| format!(" page {p}")).unwrap_or_default();
            let _ = writeln!(
                out,
                "  [{}] {} line {}{}: {} ({})",
                skip.reason, skip.side, skip.line, page, name, skip.detail
            );
        }
    }

    if !s.rejected_fields.is_empty() {
        let _ = writeln!(out, "rejected fields: {}", s.rejected_fields.len());
        for r in &s.rejected_fields {
            let _ = writeln!(out, "  {} line {}: {}: {}", r.side, r.line, r.name, r.error);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matcher::{MatchOutcome, MatchTier};
    use crate::model::{ImportRow, Side};

    fn skip(reason: SkipReason, line: usize) -> SkipEntry {
        SkipEntry {
            side: Side::Source,
            name: "Muster, Hans".into(),
            personal_nr: String::new(),
            line,
            page: None,
            reason,
            detail: "detail".into(),
        }
    }

    fn row(kind: RowKind) -> RowOutcome {
        RowOutcome::Row(ImportRow {
            kind,
            source_index: 0,
            name: String::new(),
            pers_nr: String::new(),
            diffs: Vec::new(),
            entries: Vec::new(),
        })
    }

    #[test]
    fn summary_counts() {
        let source = ReadOutput { filtered: 4, skipped: vec![skip(SkipReason::Format, 2)], ..ReadOutput::default() };
        let target = ReadOutput::default();
        let matches = vec![
            MatchResult {
                source: 0,
                outcome: MatchOutcome::Matched { target: 0, confidence: Confidence::Exact, tier: MatchTier::NameBirthDate },
            },
            MatchResult {
                source: 1,
                outcome: MatchOutcome::Matched { target: 1, confidence: Confidence::Probable, tier: MatchTier::NameOnly },
            },
            MatchResult { source: 2, outcome: MatchOutcome::Unmatched },
        ];
        let outcomes = vec![
            row(RowKind::Update),
            RowOutcome::Unchanged,
            RowOutcome::Skip(skip(SkipReason::NoMatch, 5)),
            row(RowKind::Create),
        ];
        let summary = compute_summary(&source, &target, &matches, &outcomes, Vec::new());
        assert_eq!(summary.source_rows, 1);
        assert_eq!(summary.filtered, 4);
        assert_eq!(summary.matched_exact, 1);
        assert_eq!(summary.matched_probable, 1);
        assert_eq!(summary.updated, 1);
        assert_eq!(summary.created, 1);
        assert_eq!(summary.unchanged, 1);
        assert_eq!(summary.skipped_total(), 2);
        assert_eq!(summary.skipped_by_reason[&SkipReason::Format], 1);
        assert_eq!(summary.skipped_by_reason[&SkipReason::NoMatch], 1);
        assert_eq!(summary.skipped[0].line, 2);
    }

    #[test]
    fn summary_json_keys_reasons_by_name() {
        let mut summary = RunSummary::default();
        summary.skipped_by_reason.insert(SkipReason::AlreadyPresent, 3);
        let json = serde_json::to_value(&summary).unwrap();
        assert_eq!(json["skipped_by_reason"]["already_present"], 3);
    }

    #[test]
    fn text_lists_every_skip() {
        let summary = RunSummary {
            skipped: vec![skip(SkipReason::Ambiguous, 7)],
            skipped_by_reason: [(SkipReason::Ambiguous, 1)].into_iter().collect(),
            ..RunSummary::default()
        };
        let text = render_text(&summary);
        assert!(text.contains("skipped: 1 (1 ambiguous)"));
        assert!(text.contains("[ambiguous] source line 7: Muster, Hans (detail)"));
    }
}
