//! Contraction operators over a list of statements.
//!
//! Each operator returns the indices of the statements that survive, in
//! ascending order. Only statements relevant to the belief (see
//! [`Support::relevant`]) take part in the subset search; the rest survive
//! unconditionally.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::argumentation::{Argument, ArgumentationFramework, Semantics};
use crate::error::{RevisionError, RevisionResult};
use crate::term::Term;
use crate::unify::Unifier;

use super::entailment::Support;

/// Scores closer than this are treated as tied.
const SCORE_EPSILON: f64 = 1e-9;

/// How a belief is given up.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ContractionStrategy {
    /// Keep the best maximal non-entailing subset.
    #[default]
    PartialMeet,
    /// Cut the least entrenched member of every minimal entailing subset.
    Kernel,
    /// Keep what the argumentation framework skeptically accepts.
    Argumentation,
}

impl ContractionStrategy {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::PartialMeet => "partial-meet",
            Self::Kernel => "kernel",
            Self::Argumentation => "argumentation",
        }
    }
}

impl fmt::Display for ContractionStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ContractionStrategy {
    type Err = RevisionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "partial-meet" | "partial_meet" | "partialmeet" => Ok(Self::PartialMeet),
            "kernel" => Ok(Self::Kernel),
            "argumentation" | "dung" => Ok(Self::Argumentation),
            other => Err(RevisionError::UnsupportedStrategy { tag: other.into() }),
        }
    }
}

/// Inputs shared by all operators.
pub(crate) struct ContractionInput<'a> {
    pub unifier: &'a Unifier<'a>,
    pub statements: &'a [Term],
    /// Entrenchment per statement, parallel to `statements`.
    pub scores: &'a [f64],
    /// Whether any score came from an explicit value rather than the default.
    pub entrenchment_known: bool,
    pub max_relevant: usize,
}

impl ContractionInput<'_> {
    fn relevant(&self, support: &Support) -> RevisionResult<Vec<usize>> {
        let relevant = support.relevant();
        if relevant.len() > self.max_relevant.min(63) {
            return Err(RevisionError::SearchLimitExceeded {
                relevant: relevant.len(),
                limit: self.max_relevant.min(63),
            });
        }
        Ok(relevant)
    }

    /// Indices not in `relevant`, plus those of `relevant` selected by `mask`.
    fn keep(&self, relevant: &[usize], mask: u64) -> Vec<usize> {
        let chosen: BTreeSet<usize> = relevant
            .iter()
            .enumerate()
            .filter(|(bit, _)| mask & (1 << bit) != 0)
            .map(|(_, &i)| i)
            .collect();
        (0..self.statements.len())
            .filter(|i| chosen.contains(i) || !relevant.contains(i))
            .collect()
    }

    fn entailed_by_mask(support: &Support, relevant: &[usize], mask: u64) -> bool {
        support.entailed_by(|i| {
            relevant
                .iter()
                .position(|&r| r == i)
                .is_some_and(|bit| mask & (1 << bit) != 0)
        })
    }
}

/// Partial meet contraction.
///
/// Remainders are the maximal subsets of the relevant statements that do not
/// entail the belief. The one with the highest summed entrenchment is kept (the
/// largest one when no entrenchment is known); ties go to the lowest mask,
/// i.e. the remainder whose statements come earliest in context order.
///
/// Masks are visited largest first, so a non-entailing mask is maximal iff it
/// is not contained in a remainder already found. For `n` relevant statements
/// and `r` remainders this costs `O(2^n · r)` subset tests.
pub(crate) fn partial_meet(input: &ContractionInput<'_>, belief: &Term) -> RevisionResult<Vec<usize>> {
    let support = Support::analyse(input.unifier, input.statements, belief);
    if !support.entailed() {
        return Ok((0..input.statements.len()).collect());
    }
    let relevant = input.relevant(&support)?;
    let full: u64 = (1u64 << relevant.len()) - 1;

    let mut masks: Vec<u64> = (0..=full).collect();
    masks.sort_by_key(|m| (std::cmp::Reverse(m.count_ones()), *m));
    let mut remainders: Vec<u64> = Vec::new();
    for m in masks {
        if remainders.iter().any(|&r| r & m == m) {
            continue;
        }
        if !ContractionInput::entailed_by_mask(&support, &relevant, m) {
            remainders.push(m);
        }
    }

    let score = |mask: u64| -> f64 {
        relevant
            .iter()
            .enumerate()
            .filter(|(bit, _)| mask & (1 << bit) != 0)
            .map(|(_, &i)| {
                if input.entrenchment_known {
                    input.scores[i]
                } else {
                    1.0
                }
            })
            .sum()
    };
    let best = remainders
        .iter()
        .map(|&m| score(m))
        .fold(f64::NEG_INFINITY, f64::max);
    let selected = remainders
        .iter()
        .copied()
        .filter(|&m| (score(m) - best).abs() < SCORE_EPSILON)
        .min()
        .unwrap_or(0);

    tracing::debug!(
        relevant = relevant.len(),
        remainders = remainders.len(),
        "partial meet selection"
    );
    Ok(input.keep(&relevant, selected))
}

/// Kernel contraction with a least-entrenched incision.
pub(crate) fn kernel(input: &ContractionInput<'_>, belief: &Term) -> RevisionResult<Vec<usize>> {
    let support = Support::analyse(input.unifier, input.statements, belief);
    if !support.entailed() {
        return Ok((0..input.statements.len()).collect());
    }
    let relevant = input.relevant(&support)?;
    let full: u64 = (1u64 << relevant.len()) - 1;

    let mut masks: Vec<u64> = (1..=full).collect();
    masks.sort_by_key(|m| (m.count_ones(), *m));
    let mut kernels: Vec<u64> = Vec::new();
    for m in masks {
        if kernels.iter().any(|&k| k & m == k) {
            continue;
        }
        if ContractionInput::entailed_by_mask(&support, &relevant, m) {
            kernels.push(m);
        }
    }

    let mut cut: u64 = 0;
    for &k in &kernels {
        if k & cut != 0 {
            continue;
        }
        let weakest = (0..relevant.len())
            .filter(|bit| k & (1 << bit) != 0)
            .min_by(|&a, &b| {
                input.scores[relevant[a]]
                    .partial_cmp(&input.scores[relevant[b]])
                    .unwrap_or(std::cmp::Ordering::Equal)
                    .then(a.cmp(&b))
            });
        if let Some(bit) = weakest {
            cut |= 1 << bit;
        }
    }

    tracing::debug!(
        relevant = relevant.len(),
        kernels = kernels.len(),
        cut = cut.count_ones(),
        "kernel incision"
    );
    Ok(input.keep(&relevant, full & !cut))
}

/// Argumentation-based contraction.
///
/// Statements that are the belief become defeasible arguments, everything
/// else strict. Survivors are the skeptically accepted arguments minus the
/// belief itself.
pub(crate) fn argumentation(
    input: &ContractionInput<'_>,
    belief: &Term,
    semantics: Semantics,
    max_framework_size: usize,
) -> Vec<usize> {
    let is_target: Vec<bool> = input
        .statements
        .iter()
        .map(|s| input.unifier.is_variant(s, belief))
        .collect();
    let arguments = input
        .statements
        .iter()
        .zip(&is_target)
        .map(|(s, &target)| {
            if target {
                Argument::defeasible(s.clone())
            } else {
                Argument::strict(s.clone())
            }
        })
        .collect();
    let framework = ArgumentationFramework::with_negation_attacks(arguments);
    let accepted = framework.skeptically_accepted(semantics, max_framework_size);

    tracing::debug!(
        arguments = framework.len(),
        attacks = framework.attack_count(),
        accepted = accepted.len(),
        %semantics,
        "argumentation contraction"
    );
    accepted.into_iter().filter(|&i| !is_target[i]).collect()
}
