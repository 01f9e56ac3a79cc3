use serde::Serialize;
use tracing::{debug, warn};

use crate::config::{MigrationConfig, MigrationMode, ReportKind};
use crate::error::MigrateError;
use crate::exclusion::ExclusionSet;
use crate::matcher::{match_records, MatchOutcome, MatchResult};
use crate::model::{ImportRow, PersonRecord, RejectedField, SkipEntry, SkipReason};
use crate::normalize::{normalize_record, NormalizedRecord};
use crate::reader::{read_records, Grid, ReadOutput};
use crate::rows::{PersNrAllocator, RowBuilder, RowOutcome};
use crate::schema::{source_descriptor, target_descriptor};
use crate::summary::{compute_summary, RunSummary};

/// Pre-read inputs of one run.
#[derive(Debug, Clone, Default)]
pub struct MigrationInput {
    pub source: ReadOutput,
    pub target: ReadOutput,
    pub exclusions: Option<ExclusionSet>,
}

impl MigrationInput {
    /// Read both exports with the descriptors the config selects.
    pub fn from_grids(
        config: &MigrationConfig,
        source: &Grid,
        target: &Grid,
        exclusions: Option<ExclusionSet>,
    ) -> Result<Self, MigrateError> {
        Ok(Self {
            source: read_records(source, &source_descriptor(config))?,
            target: read_records(target, &target_descriptor(config))?,
            exclusions,
        })
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct MigrationMeta {
    pub config_name: String,
    pub report: ReportKind,
    pub mode: MigrationMode,
    pub complete_payload: bool,
    pub engine_version: String,
    pub run_at: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct MigrationResult {
    pub meta: MigrationMeta,
    pub summary: RunSummary,
    pub matches: Vec<MatchResult>,
    /// Import rows in source order.
    pub rows: Vec<ImportRow>,
}

impl MigrationResult {
    /// Rows with and without a `PV_BEITRAG` block, each in source order.
    pub fn split_by_fee(&self) -> (Vec<&ImportRow>, Vec<&ImportRow>) {
        self.rows.iter().partition(|r| r.has_fee())
    }
}

/// Run the migration per config. Returns import rows + summary.
pub fn run(config: &MigrationConfig, input: &MigrationInput) -> Result<MigrationResult, MigrateError> {
    if config.report == ReportKind::Passive && input.exclusions.is_none() {
        return Err(MigrateError::ConfigValidation(
            "report 'passive' cannot run without an exclusion set".into(),
        ));
    }

    let source_records = &input.source.records;
    let target_records = &input.target.records;
    let sources: Vec<NormalizedRecord> =
        source_records.iter().enumerate().map(|(i, r)| normalize_record(i, r)).collect();
    let targets: Vec<NormalizedRecord> =
        target_records.iter().enumerate().map(|(i, r)| normalize_record(i, r)).collect();

    let rejected_fields: Vec<RejectedField> = source_records
        .iter()
        .zip(&sources)
        .flat_map(|(record, norm)| {
            norm.rejected.iter().map(move |error| RejectedField {
                side: record.side,
                name: record.display_name(),
                line: record.origin.line,
                error: error.clone(),
            })
        })
        .collect();

    let matches = match_records(&sources, &targets);

    let existing = source_records
        .iter()
        .chain(target_records.iter())
        .map(|r| r.personal_nr.as_str());
    let allocator = PersNrAllocator::new(
        &config.passive.personal_nr_prefix,
        config.passive.personal_nr_width,
        existing,
    );
    let mut builder = RowBuilder::new(config, allocator);
    let mode = config.mode();

    let mut outcomes = Vec::with_capacity(sources.len());
    for ((m, record), src) in matches.iter().zip(source_records).zip(&sources) {
        let outcome = decide(
            &mut builder,
            mode,
            input.exclusions.as_ref(),
            m,
            record,
            src,
            target_records,
            &targets,
        );
        if let RowOutcome::Skip(skip) = &outcome {
            warn!("Skipping {} (line {}): {}: {}", skip.name, skip.line, skip.reason, skip.detail);
        }
        outcomes.push(outcome);
    }

    let rows: Vec<ImportRow> = outcomes
        .iter()
        .filter_map(|o| match o {
            RowOutcome::Row(row) => Some(row.clone()),
            _ => None,
        })
        .collect();
    let summary = compute_summary(&input.source, &input.target, &matches, &outcomes, rejected_fields);

    Ok(MigrationResult {
        meta: MigrationMeta {
            config_name: config.name.clone(),
            report: config.report,
            mode,
            complete_payload: config.complete_payload(),
            engine_version: env!("CARGO_PKG_VERSION").to_string(),
            run_at: chrono::Utc::now().to_rfc3339(),
        },
        summary,
        matches,
        rows,
    })
}

#[allow(clippy::too_many_arguments)]
fn decide(
    builder: &mut RowBuilder<'_>,
    mode: MigrationMode,
    exclusions: Option<&ExclusionSet>,
    m: &MatchResult,
    record: &PersonRecord,
    src: &NormalizedRecord,
    target_records: &[PersonRecord],
    targets: &[NormalizedRecord],
) -> RowOutcome {
    // Exclusion wins over any match or create decision
    if let Some(reason) = exclusions.and_then(|set| set.lookup(&src.key)) {
        return RowOutcome::Skip(SkipEntry::for_record(record, SkipReason::Excluded, reason));
    }

    match &m.outcome {
        MatchOutcome::Ambiguous { tier, candidates, reason } => {
            let lines: Vec<String> =
                candidates.iter().map(|&ti| target_records[ti].origin.line.to_string()).collect();
            RowOutcome::Skip(SkipEntry::for_record(
                record,
                SkipReason::Ambiguous,
                format!("{reason} by {tier} (FeuerON lines {})", lines.join(", ")),
            ))
        }
        MatchOutcome::Matched { target, confidence, tier } => {
            let target_record = &target_records[*target];
            debug!(
                "{} matched FeuerON line {} by {tier} ({confidence:?})",
                record.display_name(),
                target_record.origin.line
            );
            if mode.updates() {
                builder.update(record, src, target_record, &targets[*target])
            } else {
                RowOutcome::Skip(SkipEntry::for_record(
                    record,
                    SkipReason::AlreadyPresent,
                    format!(
                        "already in FeuerON as {} (line {})",
                        display_pers_nr(target_record),
                        target_record.origin.line
                    ),
                ))
            }
        }
        MatchOutcome::Unmatched => {
            if mode.creates() {
                builder.create(record, src)
            } else {
                RowOutcome::Skip(SkipEntry::for_record(record, SkipReason::NoMatch, "no FeuerON record"))
            }
        }
    }
}

fn display_pers_nr(record: &PersonRecord) -> &str {
    let nr = record.personal_nr.trim();
    if nr.is_empty() {
        "(no personnel number)"
    } else {
        nr
    }
}
