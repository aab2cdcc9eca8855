//! Provenance: how a statement came to be in a context.
//!
//! Every stored statement carries a [`StatementMeta`] naming the operation that
//! put it there, the context it was copied from (if any) and its entrenchment.
//! Revision derivations are additionally logged as [`RevisionRecord`]s.

use serde::{Deserialize, Serialize};

use crate::term::Term;

/// How a statement entered its context.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DerivationKind {
    /// Added directly by a caller.
    #[default]
    Asserted,
    /// Added or carried forward by an expansion.
    Expansion,
    /// Carried forward by a contraction.
    Contraction,
    /// Carried forward by a revision.
    Revision,
    /// Produced by an inference step outside the store.
    Inferred,
}

impl std::fmt::Display for DerivationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Asserted => write!(f, "asserted"),
            Self::Expansion => write!(f, "expansion"),
            Self::Contraction => write!(f, "contraction"),
            Self::Revision => write!(f, "revision"),
            Self::Inferred => write!(f, "inferred"),
        }
    }
}

impl DerivationKind {
    /// Parse a derivation kind from a string label.
    pub fn from_label(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "asserted" => Some(Self::Asserted),
            "expansion" => Some(Self::Expansion),
            "contraction" => Some(Self::Contraction),
            "revision" => Some(Self::Revision),
            "inferred" => Some(Self::Inferred),
            _ => None,
        }
    }
}

/// Metadata attached to a stored statement.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StatementMeta {
    pub provenance: DerivationKind,
    /// Context this statement was copied from, for derived contexts.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_context: Option<String>,
    /// Priority in `[0, 1]`; higher values are given up last.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entrenchment: Option<f64>,
}

impl StatementMeta {
    /// Metadata for a directly asserted statement.
    pub fn asserted() -> Self {
        Self::default()
    }

    /// Metadata for a statement derived from `source`.
    pub fn derived(kind: DerivationKind, source: impl Into<String>) -> Self {
        Self {
            provenance: kind,
            source_context: Some(source.into()),
            entrenchment: None,
        }
    }

    /// Set the entrenchment value.
    pub fn with_entrenchment(mut self, value: f64) -> Self {
        self.entrenchment = Some(value);
        self
    }
}

/// Whether `value` is a valid entrenchment.
pub fn valid_entrenchment(value: f64) -> bool {
    (0.0..=1.0).contains(&value)
}

/// One revision-engine derivation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RevisionRecord {
    /// The context created by this derivation.
    pub result_context: String,
    /// The context it was derived from.
    pub base_context: String,
    pub kind: DerivationKind,
    /// The belief added, contracted, or revised by.
    pub belief: Term,
    /// Contraction strategy label, when one was used.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub strategy: Option<String>,
    /// Statements of the base that did not survive.
    #[serde(default)]
    pub removed: Vec<Term>,
    /// Timestamp (seconds since UNIX epoch).
    pub timestamp: u64,
}

pub(crate) fn now_secs() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derivation_kind_labels_round_trip() {
        for kind in [
            DerivationKind::Asserted,
            DerivationKind::Expansion,
            DerivationKind::Contraction,
            DerivationKind::Revision,
            DerivationKind::Inferred,
        ] {
            assert_eq!(DerivationKind::from_label(&kind.to_string()), Some(kind));
        }
        assert_eq!(DerivationKind::from_label("guessed"), None);
    }

    #[test]
    fn entrenchment_bounds() {
        assert!(valid_entrenchment(0.0));
        assert!(valid_entrenchment(1.0));
        assert!(!valid_entrenchment(1.01));
        assert!(!valid_entrenchment(-0.1));
        assert!(!valid_entrenchment(f64::NAN));
    }

    #[test]
    fn derived_meta_names_its_source() {
        let meta = StatementMeta::derived(DerivationKind::Expansion, "beliefs").with_entrenchment(0.8);
        assert_eq!(meta.source_context.as_deref(), Some("beliefs"));
        assert_eq!(meta.entrenchment, Some(0.8));
    }
}
