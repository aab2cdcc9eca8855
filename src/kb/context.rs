//! Contexts: named, optionally-parented statement sets.
//!
//! A context's parent is a provenance link only. Its statements are never the
//! implicit union of its ancestors'; [`super::KnowledgeStore::query_with_ancestors`]
//! is the explicit opt-in for searching up the chain.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

use crate::provenance::StatementMeta;
use crate::term::Term;

/// What a context holds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ContextKind {
    /// Ground observations.
    Facts,
    /// Implications and other rules.
    Rules,
    /// A belief set under revision.
    Beliefs,
    /// Conclusions produced by inference.
    Inferred,
    /// What-if scenarios.
    Hypothetical,
    /// Anything else.
    #[default]
    General,
}

impl std::fmt::Display for ContextKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Facts => write!(f, "facts"),
            Self::Rules => write!(f, "rules"),
            Self::Beliefs => write!(f, "beliefs"),
            Self::Inferred => write!(f, "inferred"),
            Self::Hypothetical => write!(f, "hypothetical"),
            Self::General => write!(f, "general"),
        }
    }
}

impl ContextKind {
    /// Parse a context kind from a string label.
    pub fn from_label(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "facts" => Some(Self::Facts),
            "rules" => Some(Self::Rules),
            "beliefs" => Some(Self::Beliefs),
            "inferred" => Some(Self::Inferred),
            "hypothetical" => Some(Self::Hypothetical),
            "general" => Some(Self::General),
            _ => None,
        }
    }
}

/// A stored statement: a Boolean-typed term plus its metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Statement {
    pub term: Term,
    #[serde(default)]
    pub meta: StatementMeta,
}

impl Statement {
    pub fn new(term: Term, meta: StatementMeta) -> Self {
        Self { term, meta }
    }
}

/// Summary of a context, without its statements.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContextInfo {
    pub id: String,
    pub parent: Option<String>,
    pub kind: ContextKind,
    pub statement_count: usize,
}

/// A context and its statements in insertion order.
#[derive(Debug, Clone)]
pub(crate) struct Context {
    pub id: String,
    pub parent: Option<String>,
    pub kind: ContextKind,
    statements: BTreeMap<u64, Statement>,
    positions: HashMap<Term, u64>,
    next_seq: u64,
}

impl Context {
    pub fn new(id: String, parent: Option<String>, kind: ContextKind) -> Self {
        Self {
            id,
            parent,
            kind,
            statements: BTreeMap::new(),
            positions: HashMap::new(),
            next_seq: 0,
        }
    }

    pub fn info(&self) -> ContextInfo {
        ContextInfo {
            id: self.id.clone(),
            parent: self.parent.clone(),
            kind: self.kind,
            statement_count: self.len(),
        }
    }

    pub fn len(&self) -> usize {
        self.statements.len()
    }

    /// Append a statement. Returns false if this exact term is already stored.
    pub fn push(&mut self, statement: Statement) -> bool {
        if self.positions.contains_key(&statement.term) {
            return false;
        }
        let seq = self.next_seq;
        self.next_seq += 1;
        self.positions.insert(statement.term.clone(), seq);
        self.statements.insert(seq, statement);
        true
    }

    /// Remove a statement by its exact term.
    pub fn remove(&mut self, term: &Term) -> Option<Statement> {
        let seq = self.positions.remove(term)?;
        self.statements.remove(&seq)
    }

    pub fn get(&self, term: &Term) -> Option<&Statement> {
        self.positions
            .get(term)
            .and_then(|seq| self.statements.get(seq))
    }

    /// Insertion position of a term, for ordering index candidates.
    pub fn position(&self, term: &Term) -> Option<u64> {
        self.positions.get(term).copied()
    }

    /// Statements in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &Statement> {
        self.statements.values()
    }
}
