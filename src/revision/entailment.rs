//! Syntactic entailment used by contraction and revision.
//!
//! A set of statements entails a belief when one of them is the belief (up to
//! renaming of bound variables) or when a single modus ponens step derives
//! it: some implication `a ⇒ c` whose consequent unifies with the belief, and
//! some statement unifying with the antecedent under the same bindings. This
//! is an approximation of logical consequence, not a theorem prover.

use crate::term::{Substitution, Term};
use crate::unify::Unifier;

/// What in a statement list supports a belief.
///
/// Entailment by any subset is then a membership test: the subset entails the
/// belief iff it contains a `direct` statement or both halves of a `pair`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Support {
    /// Statements that are the belief itself.
    pub direct: Vec<usize>,
    /// `(implication, antecedent match)` pairs deriving the belief.
    pub pairs: Vec<(usize, usize)>,
}

impl Support {
    /// Analyse `statements` with respect to `belief`.
    pub fn analyse(unifier: &Unifier<'_>, statements: &[Term], belief: &Term) -> Self {
        let mut support = Support::default();
        for (i, s) in statements.iter().enumerate() {
            if unifier.is_variant(s, belief) {
                support.direct.push(i);
            }
            let Some((antecedent, consequent)) = s.as_implication() else {
                continue;
            };
            let Ok(sigma) = unifier.unify(consequent, belief, &Substitution::new()) else {
                continue;
            };
            for (j, q) in statements.iter().enumerate() {
                if unifier.unify(antecedent, q, &sigma).is_ok() {
                    support.pairs.push((i, j));
                }
            }
        }
        support
    }

    /// Whether the full list entails the belief.
    pub fn entailed(&self) -> bool {
        !self.direct.is_empty() || !self.pairs.is_empty()
    }

    /// Indices that take part in some derivation of the belief, ascending.
    pub fn relevant(&self) -> Vec<usize> {
        let mut out: Vec<usize> = self
            .direct
            .iter()
            .copied()
            .chain(self.pairs.iter().flat_map(|&(i, j)| [i, j]))
            .collect();
        out.sort_unstable();
        out.dedup();
        out
    }

    /// Whether the statements selected by `member` entail the belief.
    pub fn entailed_by(&self, member: impl Fn(usize) -> bool) -> bool {
        self.direct.iter().any(|&i| member(i))
            || self.pairs.iter().any(|&(i, j)| member(i) && member(j))
    }
}

/// Whether `premises` entail `belief`.
pub fn entails(unifier: &Unifier<'_>, premises: &[Term], belief: &Term) -> bool {
    Support::analyse(unifier, premises, belief).entailed()
}

/// Whether `statements` entail the negation of none of their members.
///
/// Uses the same entailment as [`entails`], so a set holding `P`, `P ⇒ ¬Q`
/// and `Q` is inconsistent.
pub fn is_consistent(unifier: &Unifier<'_>, statements: &[Term]) -> bool {
    statements
        .iter()
        .all(|s| !Support::analyse(unifier, statements, &s.negate()).entailed())
}
