use std::collections::HashMap;
use std::fmt;

use serde::Serialize;

use crate::normalize::NormalizedRecord;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Confidence {
    Exact,
    Probable,
    None,
}

/// Matching heuristic, tried in this order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchTier {
    /// Name and birth date, both sides carrying a birth date.
    NameBirthDate,
    /// Name and normalized street address, a birth date missing on either side.
    NameAddress,
    /// Name alone, when exactly one target carries it.
    NameOnly,
}

impl fmt::Display for MatchTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NameBirthDate => write!(f, "name + birth date"),
            Self::NameAddress => write!(f, "name + address"),
            Self::NameOnly => write!(f, "name"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AmbiguityReason {
    /// Several unclaimed targets qualify.
    MultipleCandidates,
    /// Every qualifying target was claimed by an earlier source.
    AlreadyClaimed,
    /// Name-only tier with more than one target carrying the name.
    NameCollision,
}

impl fmt::Display for AmbiguityReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MultipleCandidates => write!(f, "multiple candidates"),
            Self::AlreadyClaimed => write!(f, "target already claimed"),
            Self::NameCollision => write!(f, "name collision"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum MatchOutcome {
    Matched { target: usize, confidence: Confidence, tier: MatchTier },
    Unmatched,
    Ambiguous { tier: MatchTier, candidates: Vec<usize>, reason: AmbiguityReason },
}

/// Decision for one source record. Indices refer to the input slices.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MatchResult {
    pub source: usize,
    #[serde(flatten)]
    pub outcome: MatchOutcome,
}

impl MatchResult {
    pub fn target(&self) -> Option<usize> {
        match self.outcome {
            MatchOutcome::Matched { target, .. } => Some(target),
            _ => None,
        }
    }

    pub fn confidence(&self) -> Confidence {
        match self.outcome {
            MatchOutcome::Matched { confidence, .. } => confidence,
            _ => Confidence::None,
        }
    }
}

/// Pair every source record with at most one target record.
///
/// Each tier is a pass over all still-undecided sources in input order, so a
/// strong match later in the file wins over a weak match earlier. A claimed
/// target leaves the pool: a source whose exact candidates are all claimed
/// falls through to the next tier. Two or more unclaimed candidates decide the
/// source as ambiguous.
pub fn match_records(sources: &[NormalizedRecord], targets: &[NormalizedRecord]) -> Vec<MatchResult> {
    let mut by_name: HashMap<&str, Vec<usize>> = HashMap::new();
    for (ti, t) in targets.iter().enumerate() {
        by_name.entry(t.key.name.as_str()).or_default().push(ti);
    }

    let mut target_used = vec![false; targets.len()];
    let mut decided: Vec<Option<MatchOutcome>> = vec![None; sources.len()];

    // Two known, different birth dates are two different people
    let birth_conflicts = |s: &NormalizedRecord, t: &NormalizedRecord| {
        matches!((s.key.birth, t.key.birth), (Some(a), Some(b)) if a != b)
    };

    // Tiers 1 and 2: exact keys
    for tier in [MatchTier::NameBirthDate, MatchTier::NameAddress] {
        for (si, s) in sources.iter().enumerate() {
            if decided[si].is_some() {
                continue;
            }
            let free: Vec<usize> = by_name
                .get(s.key.name.as_str())
                .into_iter()
                .flatten()
                .copied()
                .filter(|&ti| !target_used[ti] && !birth_conflicts(s, &targets[ti]))
                .filter(|&ti| {
                    let t = &targets[ti];
                    match tier {
                        MatchTier::NameBirthDate => s.key.birth.is_some() && t.key.birth.is_some(),
                        _ => {
                            (s.key.birth.is_none() || t.key.birth.is_none())
                                && !s.street_key.is_empty()
                                && s.street_key == t.street_key
                        }
                    }
                })
                .collect();
            decided[si] = match free.len() {
                0 => continue,
                1 => {
                    let ti = free[0];
                    target_used[ti] = true;
                    Some(MatchOutcome::Matched { target: ti, confidence: Confidence::Exact, tier })
                }
                _ => Some(MatchOutcome::Ambiguous { tier, candidates: free, reason: AmbiguityReason::MultipleCandidates }),
            };
        }
    }

    // Tier 3: name alone, judged against the whole target set
    let tier = MatchTier::NameOnly;
    for (si, s) in sources.iter().enumerate() {
        if decided[si].is_some() {
            continue;
        }
        let candidates = by_name.get(s.key.name.as_str()).cloned().unwrap_or_default();
        decided[si] = Some(match candidates.len() {
            0 => MatchOutcome::Unmatched,
            1 if birth_conflicts(s, &targets[candidates[0]]) => MatchOutcome::Unmatched,
            1 if target_used[candidates[0]] => MatchOutcome::Ambiguous {
                tier,
                candidates,
                reason: AmbiguityReason::AlreadyClaimed,
            },
            1 => {
                let ti = candidates[0];
                target_used[ti] = true;
                MatchOutcome::Matched { target: ti, confidence: Confidence::Probable, tier }
            }
            _ => MatchOutcome::Ambiguous { tier, candidates, reason: AmbiguityReason::NameCollision },
        });
    }

    decided
        .into_iter()
        .enumerate()
        .map(|(source, outcome)| MatchResult { source, outcome: outcome.unwrap_or(MatchOutcome::Unmatched) })
        .collect()
}
