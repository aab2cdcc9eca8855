//! Abstract argumentation frameworks with Dung semantics.
//!
//! An [`ArgumentationFramework`] is a directed attack graph (`petgraph`) over
//! [`Argument`]s. Grounded semantics is the least fixpoint of the
//! characteristic function and is always computed directly. Preferred, stable
//! and complete semantics are computed by enumerating candidate sets, which is
//! exponential; frameworks larger than the caller's bound fall back to
//! grounded semantics with a warning.
//!
//! Frameworks are transient: built per revision call and discarded.

use std::collections::BTreeSet;
use std::fmt;

use petgraph::Direction;
use petgraph::graph::{DiGraph, NodeIndex};
use serde::{Deserialize, Serialize};

use crate::term::Term;

// ---------------------------------------------------------------------------
// Semantics
// ---------------------------------------------------------------------------

/// Acceptance semantics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Semantics {
    /// The unique least complete extension.
    #[default]
    Grounded,
    /// Maximal admissible sets.
    Preferred,
    /// Conflict-free sets attacking every outsider.
    Stable,
    /// Admissible sets containing everything they defend.
    Complete,
}

impl fmt::Display for Semantics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Grounded => write!(f, "grounded"),
            Self::Preferred => write!(f, "preferred"),
            Self::Stable => write!(f, "stable"),
            Self::Complete => write!(f, "complete"),
        }
    }
}

impl Semantics {
    /// Parse semantics from a string label.
    pub fn from_label(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "grounded" => Some(Self::Grounded),
            "preferred" => Some(Self::Preferred),
            "stable" => Some(Self::Stable),
            "complete" => Some(Self::Complete),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Arguments
// ---------------------------------------------------------------------------

/// A single argument.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Argument {
    pub conclusion: Term,
    pub premises: Vec<Term>,
    /// Name of the inference rule that produced the conclusion.
    pub rule: String,
    /// Strict arguments cannot be attacked by defeasible ones.
    pub strict: bool,
}

impl Argument {
    /// A strict argument for a premise-free assertion.
    pub fn strict(conclusion: Term) -> Self {
        Self {
            conclusion,
            premises: Vec::new(),
            rule: "assertion".into(),
            strict: true,
        }
    }

    /// A defeasible argument for a premise-free assertion.
    pub fn defeasible(conclusion: Term) -> Self {
        Self {
            strict: false,
            ..Self::strict(conclusion)
        }
    }
}

/// Argument id within one framework.
pub type ArgId = usize;

// ---------------------------------------------------------------------------
// Framework
// ---------------------------------------------------------------------------

/// Arguments and the attack relation between them.
#[derive(Debug, Clone, Default)]
pub struct ArgumentationFramework {
    graph: DiGraph<Argument, ()>,
}

impl ArgumentationFramework {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a framework from `arguments`, adding attacks between every pair of
    /// arguments whose conclusions are syntactic negations of each other.
    /// A defeasible argument never attacks a strict one.
    pub fn with_negation_attacks(arguments: Vec<Argument>) -> Self {
        let mut af = Self::new();
        let ids: Vec<ArgId> = arguments.into_iter().map(|a| af.add_argument(a)).collect();
        for (i, &a) in ids.iter().enumerate() {
            for &b in &ids[i + 1..] {
                let (arg_a, arg_b) = (&af.graph[NodeIndex::new(a)], &af.graph[NodeIndex::new(b)]);
                if !arg_a.conclusion.is_negation_of(&arg_b.conclusion) {
                    continue;
                }
                let a_attacks = arg_a.strict || !arg_b.strict;
                let b_attacks = arg_b.strict || !arg_a.strict;
                if a_attacks {
                    af.add_attack(a, b);
                }
                if b_attacks {
                    af.add_attack(b, a);
                }
            }
        }
        af
    }

    pub fn add_argument(&mut self, argument: Argument) -> ArgId {
        self.graph.add_node(argument).index()
    }

    /// Record that `attacker` attacks `target`. Repeated attacks are ignored.
    pub fn add_attack(&mut self, attacker: ArgId, target: ArgId) {
        let (a, t) = (NodeIndex::new(attacker), NodeIndex::new(target));
        if self.graph.find_edge(a, t).is_none() {
            self.graph.add_edge(a, t, ());
        }
    }

    pub fn argument(&self, id: ArgId) -> Option<&Argument> {
        self.graph.node_weight(NodeIndex::new(id))
    }

    pub fn len(&self) -> usize {
        self.graph.node_count()
    }

    pub fn is_empty(&self) -> bool {
        self.graph.node_count() == 0
    }

    pub fn attack_count(&self) -> usize {
        self.graph.edge_count()
    }

    /// Arguments attacking `id`.
    pub fn attackers(&self, id: ArgId) -> Vec<ArgId> {
        self.graph
            .neighbors_directed(NodeIndex::new(id), Direction::Incoming)
            .map(|n| n.index())
            .collect()
    }

    /// Arguments attacked by `id`.
    pub fn attacked_by(&self, id: ArgId) -> Vec<ArgId> {
        self.graph
            .neighbors_directed(NodeIndex::new(id), Direction::Outgoing)
            .map(|n| n.index())
            .collect()
    }

    /// The grounded extension: repeatedly accept every argument all of whose
    /// attackers are already defeated, and defeat everything an accepted
    /// argument attacks, until nothing changes.
    pub fn grounded_extension(&self) -> BTreeSet<ArgId> {
        let mut accepted = BTreeSet::new();
        let mut defeated = BTreeSet::new();
        loop {
            let mut changed = false;
            for id in 0..self.len() {
                if accepted.contains(&id) || defeated.contains(&id) {
                    continue;
                }
                if self.attackers(id).iter().all(|a| defeated.contains(a)) {
                    accepted.insert(id);
                    changed = true;
                    for target in self.attacked_by(id) {
                        changed |= defeated.insert(target);
                    }
                }
            }
            if !changed {
                break;
            }
        }
        accepted
    }

    pub fn is_conflict_free(&self, set: &BTreeSet<ArgId>) -> bool {
        set.iter()
            .all(|&a| self.attacked_by(a).iter().all(|t| !set.contains(t)))
    }

    /// Whether `set` attacks every attacker of `id`.
    pub fn defends(&self, set: &BTreeSet<ArgId>, id: ArgId) -> bool {
        self.attackers(id).iter().all(|attacker| {
            set.iter()
                .any(|&d| self.attacked_by(d).contains(attacker))
        })
    }

    pub fn is_admissible(&self, set: &BTreeSet<ArgId>) -> bool {
        self.is_conflict_free(set) && set.iter().all(|&a| self.defends(set, a))
    }

    pub fn is_complete(&self, set: &BTreeSet<ArgId>) -> bool {
        self.is_admissible(set)
            && (0..self.len()).all(|a| set.contains(&a) || !self.defends(set, a))
    }

    pub fn is_stable(&self, set: &BTreeSet<ArgId>) -> bool {
        self.is_conflict_free(set)
            && (0..self.len()).all(|a| {
                set.contains(&a) || set.iter().any(|&s| self.attacked_by(s).contains(&a))
            })
    }

    fn subsets(&self) -> impl Iterator<Item = BTreeSet<ArgId>> + '_ {
        let n = self.len();
        (0..(1u64 << n)).map(move |mask| (0..n).filter(|i| (mask >> i) & 1 == 1).collect())
    }

    /// All complete extensions, by enumeration.
    pub fn complete_extensions(&self) -> Vec<BTreeSet<ArgId>> {
        self.subsets().filter(|s| self.is_complete(s)).collect()
    }

    /// All preferred extensions: the maximal complete extensions.
    pub fn preferred_extensions(&self) -> Vec<BTreeSet<ArgId>> {
        let complete = self.complete_extensions();
        complete
            .iter()
            .filter(|s| !complete.iter().any(|o| o != *s && s.is_subset(o)))
            .cloned()
            .collect()
    }

    /// All stable extensions, by enumeration. May be empty.
    pub fn stable_extensions(&self) -> Vec<BTreeSet<ArgId>> {
        self.subsets().filter(|s| self.is_stable(s)).collect()
    }

    /// Skeptically accepted arguments: those in every extension under
    /// `semantics`.
    ///
    /// Enumeration only runs for frameworks of at most `max_size` arguments
    /// (and never above 63); larger frameworks, and frameworks with no
    /// extension at all, use the grounded extension.
    pub fn skeptically_accepted(&self, semantics: Semantics, max_size: usize) -> BTreeSet<ArgId> {
        if semantics == Semantics::Grounded {
            return self.grounded_extension();
        }
        if self.len() > max_size.min(63) {
            tracing::warn!(
                arguments = self.len(),
                max_size,
                %semantics,
                "framework too large to enumerate, using grounded semantics"
            );
            return self.grounded_extension();
        }
        let extensions = match semantics {
            Semantics::Grounded => vec![self.grounded_extension()],
            Semantics::Preferred => self.preferred_extensions(),
            Semantics::Stable => self.stable_extensions(),
            Semantics::Complete => self.complete_extensions(),
        };
        let mut iter = extensions.into_iter();
        let Some(first) = iter.next() else {
            tracing::warn!(%semantics, "no extension exists, using grounded semantics");
            return self.grounded_extension();
        };
        iter.fold(first, |acc, ext| acc.intersection(&ext).copied().collect())
    }
}
