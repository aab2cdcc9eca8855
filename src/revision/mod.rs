//! AGM-style belief revision over knowledge-store contexts.
//!
//! Every operation reads a base context and writes a brand-new derived
//! context named `{base}/{op}-{n}`; the base is never touched. Entrenchment
//! values travel with the statements into derived contexts.
//!
//! - **Expansion** adds a belief.
//! - **Contraction** removes one with a [`ContractionStrategy`].
//! - **Revision** follows the Levi identity: contract by the negation, then
//!   expand.

pub mod contraction;
pub mod entailment;

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

use serde::{Deserialize, Serialize};

use crate::argumentation::Semantics;
use crate::config::EngineConfig;
use crate::error::{RevisionError, RevisionResult};
use crate::kb::{ContextKind, KnowledgeStore, Statement};
use crate::provenance::{DerivationKind, RevisionRecord, StatementMeta, now_secs, valid_entrenchment};
use crate::term::Term;

pub use contraction::ContractionStrategy;
use contraction::ContractionInput;

/// Explicit entrenchment per statement, overriding stored values.
pub type EntrenchmentMap = HashMap<Term, f64>;

/// A context's believed statements with their entrenchment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BeliefSet {
    pub context: String,
    pub statements: Vec<Statement>,
}

impl BeliefSet {
    pub fn beliefs(&self) -> impl Iterator<Item = &Term> {
        self.statements.iter().map(|s| &s.term)
    }

    /// Stored entrenchment of `term`, if it is believed and has one.
    pub fn entrenchment_of(&self, term: &Term) -> Option<f64> {
        self.statements
            .iter()
            .find(|s| &s.term == term)
            .and_then(|s| s.meta.entrenchment)
    }

    pub fn len(&self) -> usize {
        self.statements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.statements.is_empty()
    }
}

/// Derives revised contexts inside a shared [`KnowledgeStore`].
pub struct BeliefRevisionEngine {
    store: Arc<KnowledgeStore>,
    default_entrenchment: f64,
    max_relevant_statements: usize,
    max_framework_size: usize,
    semantics: Semantics,
    history: RwLock<Vec<RevisionRecord>>,
    counter: AtomicU64,
}

impl std::fmt::Debug for BeliefRevisionEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BeliefRevisionEngine")
            .field("semantics", &self.semantics)
            .field("derivations", &self.counter.load(Ordering::Relaxed))
            .finish()
    }
}

impl BeliefRevisionEngine {
    pub fn new(store: Arc<KnowledgeStore>, config: &EngineConfig) -> Self {
        Self {
            store,
            default_entrenchment: config.default_entrenchment,
            max_relevant_statements: config.max_relevant_statements,
            max_framework_size: config.max_framework_size,
            semantics: config.semantics,
            history: RwLock::new(Vec::new()),
            counter: AtomicU64::new(0),
        }
    }

    pub fn store(&self) -> &Arc<KnowledgeStore> {
        &self.store
    }

    // -----------------------------------------------------------------------
    // Operations
    // -----------------------------------------------------------------------

    /// Add `belief` to a copy of `base`. Returns the new context id.
    ///
    /// A belief already present is not duplicated; its entrenchment is
    /// updated to `entrenchment`.
    pub fn expand(&self, base: &str, belief: Term, entrenchment: f64) -> RevisionResult<String> {
        check_entrenchment(entrenchment)?;
        self.store.check_proposition(&belief)?;
        let statements = self.store.statements_in(base)?;
        let id = self.next_id(base, "expand");
        self.expand_into(base, &id, base, statements, belief.clone(), entrenchment, DerivationKind::Expansion)?;

        tracing::info!(base, result = %id, %belief, entrenchment, "expansion");
        self.record(RevisionRecord {
            result_context: id.clone(),
            base_context: base.to_string(),
            kind: DerivationKind::Expansion,
            belief,
            strategy: None,
            removed: Vec::new(),
            timestamp: now_secs(),
        });
        Ok(id)
    }

    /// Remove `belief` from a copy of `base` using `strategy`.
    ///
    /// `entrenchment` overrides stored values for the statements it names.
    pub fn contract(
        &self,
        base: &str,
        belief: &Term,
        strategy: ContractionStrategy,
        entrenchment: Option<&EntrenchmentMap>,
    ) -> RevisionResult<String> {
        if let Some(map) = entrenchment {
            map.values().copied().try_for_each(check_entrenchment)?;
        }
        self.store.check_proposition(belief)?;
        let statements = self.store.statements_in(base)?;
        let kept = self.contraction_survivors(&statements, belief, strategy, entrenchment)?;

        let id = self.next_id(base, "contract");
        let (survivors, removed) = split_survivors(statements, &kept);
        let carried = survivors
            .into_iter()
            .map(|s| carry(s, DerivationKind::Contraction, base))
            .collect();
        self.store
            .create_context_with_statements(&id, Some(base), self.kind_of(base)?, carried)?;

        tracing::info!(
            base,
            result = %id,
            %belief,
            %strategy,
            removed = removed.len(),
            "contraction"
        );
        self.record(RevisionRecord {
            result_context: id.clone(),
            base_context: base.to_string(),
            kind: DerivationKind::Contraction,
            belief: belief.clone(),
            strategy: Some(strategy.to_string()),
            removed,
            timestamp: now_secs(),
        });
        Ok(id)
    }

    /// Revise `base` by `belief`.
    ///
    /// If the belief is already present the base is copied. Otherwise the
    /// base is contracted by `¬belief` (kept as its own derived context) and
    /// the result expanded with `belief`. On error the store and history are
    /// left as they were.
    pub fn revise(
        &self,
        base: &str,
        belief: Term,
        strategy: ContractionStrategy,
        entrenchment: f64,
        map: Option<&EntrenchmentMap>,
    ) -> RevisionResult<String> {
        check_entrenchment(entrenchment)?;
        if let Some(map) = map {
            map.values().copied().try_for_each(check_entrenchment)?;
        }
        self.store.check_proposition(&belief)?;
        let statements = self.store.statements_in(base)?;
        let unifier = self.store.unifier();
        let present = statements.iter().any(|s| unifier.is_variant(&s.term, &belief));

        let (source, source_statements) = if present {
            (base.to_string(), statements.clone())
        } else {
            let contracted = self.contract(base, &belief.negate(), strategy, map)?;
            match self.store.statements_in(&contracted) {
                Ok(kept) => (contracted, kept),
                Err(e) => {
                    self.discard(&contracted);
                    return Err(e.into());
                }
            }
        };

        let id = self.next_id(base, "revise");
        if let Err(e) = self.expand_into(
            &source,
            &id,
            base,
            source_statements.clone(),
            belief.clone(),
            entrenchment,
            DerivationKind::Revision,
        ) {
            if !present {
                self.discard(&source);
            }
            return Err(e);
        }

        let removed: Vec<Term> = statements
            .into_iter()
            .filter(|s| !source_statements.iter().any(|k| k.term == s.term))
            .map(|s| s.term)
            .collect();
        tracing::info!(
            base,
            result = %id,
            %belief,
            %strategy,
            copied = present,
            removed = removed.len(),
            "revision"
        );
        self.record(RevisionRecord {
            result_context: id.clone(),
            base_context: base.to_string(),
            kind: DerivationKind::Revision,
            belief,
            strategy: (!present).then(|| strategy.to_string()),
            removed,
            timestamp: now_secs(),
        });
        Ok(id)
    }

    // -----------------------------------------------------------------------
    // Queries
    // -----------------------------------------------------------------------

    /// Whether `context` entails `belief` by membership or one modus ponens step.
    pub fn entails(&self, context: &str, belief: &Term) -> RevisionResult<bool> {
        let terms = self.terms_in(context)?;
        Ok(entailment::entails(&self.store.unifier(), &terms, belief))
    }

    /// Whether `context` entails the negation of none of its own statements.
    pub fn is_consistent(&self, context: &str) -> RevisionResult<bool> {
        let terms = self.terms_in(context)?;
        Ok(entailment::is_consistent(&self.store.unifier(), &terms))
    }

    pub fn belief_set(&self, context: &str) -> RevisionResult<BeliefSet> {
        Ok(BeliefSet {
            context: context.to_string(),
            statements: self.store.statements_in(context)?,
        })
    }

    /// Every derivation so far, oldest first.
    pub fn history(&self) -> Vec<RevisionRecord> {
        self.history.read().expect("revision history lock poisoned").clone()
    }

    // -----------------------------------------------------------------------
    // Internals
    // -----------------------------------------------------------------------

    fn contraction_survivors(
        &self,
        statements: &[Statement],
        belief: &Term,
        strategy: ContractionStrategy,
        map: Option<&EntrenchmentMap>,
    ) -> RevisionResult<Vec<usize>> {
        let terms: Vec<Term> = statements.iter().map(|s| s.term.clone()).collect();
        let scores: Vec<f64> = statements
            .iter()
            .map(|s| {
                map.and_then(|m| m.get(&s.term).copied())
                    .or(s.meta.entrenchment)
                    .unwrap_or(self.default_entrenchment)
            })
            .collect();
        let entrenchment_known = map.is_some_and(|m| !m.is_empty())
            || statements.iter().any(|s| s.meta.entrenchment.is_some());

        let unifier = self.store.unifier();
        let input = ContractionInput {
            unifier: &unifier,
            statements: &terms,
            scores: &scores,
            entrenchment_known,
            max_relevant: self.max_relevant_statements,
        };
        match strategy {
            ContractionStrategy::PartialMeet => contraction::partial_meet(&input, belief),
            ContractionStrategy::Kernel => contraction::kernel(&input, belief),
            ContractionStrategy::Argumentation => Ok(contraction::argumentation(
                &input,
                belief,
                self.semantics,
                self.max_framework_size,
            )),
        }
    }

    /// Create `id` under `parent` holding `statements` plus `belief`.
    #[allow(clippy::too_many_arguments)]
    fn expand_into(
        &self,
        parent: &str,
        id: &str,
        origin: &str,
        statements: Vec<Statement>,
        belief: Term,
        entrenchment: f64,
        kind: DerivationKind,
    ) -> RevisionResult<()> {
        let unifier = self.store.unifier();
        let mut present = false;
        let mut carried: Vec<Statement> = statements
            .into_iter()
            .map(|s| {
                let mut s = carry(s, kind, origin);
                if unifier.is_variant(&s.term, &belief) {
                    s.meta.entrenchment = Some(entrenchment);
                    present = true;
                }
                s
            })
            .collect();
        if !present {
            let meta = StatementMeta::derived(kind, origin).with_entrenchment(entrenchment);
            carried.push(Statement::new(belief, meta));
        }
        self.store
            .create_context_with_statements(id, Some(parent), self.kind_of(origin)?, carried)?;
        Ok(())
    }

    fn terms_in(&self, context: &str) -> RevisionResult<Vec<Term>> {
        Ok(self
            .store
            .statements_in(context)?
            .into_iter()
            .map(|s| s.term)
            .collect())
    }

    fn kind_of(&self, context: &str) -> RevisionResult<ContextKind> {
        Ok(self.store.context_info(context)?.kind)
    }

    fn next_id(&self, base: &str, op: &str) -> String {
        loop {
            let n = self.counter.fetch_add(1, Ordering::Relaxed) + 1;
            let id = format!("{base}/{op}-{n}");
            if !self.store.has_context(&id) {
                return id;
            }
        }
    }

    fn record(&self, record: RevisionRecord) {
        self.history
            .write()
            .expect("revision history lock poisoned")
            .push(record);
    }

    /// Undo a derivation: delete its context and forget its record.
    fn discard(&self, context: &str) {
        if let Err(e) = self.store.delete_context(context) {
            tracing::warn!(context, error = %e, "failed to discard derived context");
        }
        self.history
            .write()
            .expect("revision history lock poisoned")
            .retain(|r| r.result_context != context);
    }
}

fn check_entrenchment(value: f64) -> RevisionResult<()> {
    if valid_entrenchment(value) {
        Ok(())
    } else {
        Err(RevisionError::InvalidEntrenchment { value })
    }
}

/// Re-tag a statement copied from `source`, keeping its entrenchment.
fn carry(statement: Statement, kind: DerivationKind, source: &str) -> Statement {
    let mut meta = StatementMeta::derived(kind, source);
    meta.entrenchment = statement.meta.entrenchment;
    Statement::new(statement.term, meta)
}

/// Split into (kept, removed terms) by the ascending survivor indices.
fn split_survivors(statements: Vec<Statement>, kept: &[usize]) -> (Vec<Statement>, Vec<Term>) {
    let mut survivors = Vec::with_capacity(kept.len());
    let mut removed = Vec::new();
    for (i, s) in statements.into_iter().enumerate() {
        if kept.binary_search(&i).is_ok() {
            survivors.push(s);
        } else {
            removed.push(s.term);
        }
    }
    (survivors, removed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::term::fixtures::*;

    fn engine() -> (BeliefRevisionEngine, crate::types::TypeRegistry) {
        let reg = registry();
        let config = EngineConfig::default();
        let store = Arc::new(KnowledgeStore::new(Arc::new(registry()), &config));
        (BeliefRevisionEngine::new(store, &config), reg)
    }

    fn seed(engine: &BeliefRevisionEngine, ctx: &str, terms: &[Term]) {
        let store = engine.store();
        store.create_context(ctx, None, ContextKind::Beliefs).unwrap();
        for t in terms {
            store.add_statement(t.clone(), ctx, None).unwrap();
        }
    }

    fn terms(engine: &BeliefRevisionEngine, ctx: &str) -> Vec<Term> {
        engine.belief_set(ctx).unwrap().beliefs().cloned().collect()
    }

    #[test]
    fn expansion_derives_a_new_context() {
        let (engine, reg) = engine();
        let father = rel(&reg, "Father", person("john"), person("bob"));
        let mother = rel(&reg, "Mother", person("mary"), person("bob"));
        seed(&engine, "b", &[father.clone()]);

        let id = engine.expand("b", mother.clone(), 0.7).unwrap();
        assert_eq!(id, "b/expand-1");
        assert_eq!(terms(&engine, &id), vec![father.clone(), mother.clone()]);
        assert_eq!(terms(&engine, "b"), vec![father]);

        let set = engine.belief_set(&id).unwrap();
        assert_eq!(set.entrenchment_of(&mother), Some(0.7));
        let info = engine.store().context_info(&id).unwrap();
        assert_eq!(info.parent.as_deref(), Some("b"));
        assert_eq!(info.kind, ContextKind::Beliefs);
    }

    #[test]
    fn expansion_of_present_belief_updates_entrenchment() {
        let (engine, reg) = engine();
        let father = rel(&reg, "Father", person("john"), person("bob"));
        seed(&engine, "b", &[father.clone()]);
        let id = engine.expand("b", father.clone(), 0.9).unwrap();
        let set = engine.belief_set(&id).unwrap();
        assert_eq!(set.len(), 1);
        assert_eq!(set.entrenchment_of(&father), Some(0.9));
    }

    #[test]
    fn bad_entrenchment_is_rejected_before_anything_is_created() {
        let (engine, reg) = engine();
        seed(&engine, "b", &[]);
        let before = engine.store().list_contexts().len();
        let err = engine
            .expand("b", pred(&reg, "Happy", person("bob")), 1.5)
            .unwrap_err();
        assert!(matches!(err, RevisionError::InvalidEntrenchment { .. }));
        assert_eq!(engine.store().list_contexts().len(), before);
        assert!(engine.history().is_empty());
    }

    #[test]
    fn non_proposition_revision_changes_nothing() {
        let (engine, reg) = engine();
        seed(&engine, "b", &[rel(&reg, "Father", person("john"), person("bob"))]);
        let before = engine.store().list_contexts();
        let err = engine
            .revise("b", person("bob"), ContractionStrategy::PartialMeet, 0.5, None)
            .unwrap_err();
        assert!(matches!(
            err,
            RevisionError::Kb(crate::error::KbError::NotAProposition { .. })
        ));
        assert!(engine.expand("b", person("bob"), 0.5).is_err());
        assert_eq!(engine.store().list_contexts(), before);
        assert!(engine.history().is_empty());
    }

    #[test]
    fn missing_base_is_a_kb_error() {
        let (engine, reg) = engine();
        let err = engine
            .expand("nowhere", pred(&reg, "Happy", person("bob")), 0.5)
            .unwrap_err();
        assert!(matches!(err, RevisionError::Kb(_)));
    }

    #[test]
    fn contraction_excludes_the_belief() {
        let (engine, reg) = engine();
        let father = rel(&reg, "Father", person("john"), person("bob"));
        let mother = rel(&reg, "Mother", person("mary"), person("bob"));
        seed(&engine, "b", &[father.clone(), mother.clone()]);

        for strategy in [
            ContractionStrategy::PartialMeet,
            ContractionStrategy::Kernel,
            ContractionStrategy::Argumentation,
        ] {
            let id = engine.contract("b", &father, strategy, None).unwrap();
            assert_eq!(terms(&engine, &id), vec![mother.clone()], "{strategy}");
            assert!(!engine.entails(&id, &father).unwrap());
        }
        assert_eq!(engine.history().len(), 3);
        assert_eq!(engine.history()[0].removed, vec![father]);
    }

    #[test]
    fn contraction_honours_entrenchment_map() {
        let (engine, reg) = engine();
        let father = rel(&reg, "Father", person("john"), person("bob"));
        let rule = Term::implies(
            rel(&reg, "Father", v(1, "x"), v(2, "y")),
            rel(&reg, "Parent", v(1, "x"), v(2, "y")),
        );
        let parent = rel(&reg, "Parent", person("john"), person("bob"));
        seed(&engine, "b", &[father.clone(), rule.clone()]);
        assert!(engine.entails("b", &parent).unwrap());

        let mut map = EntrenchmentMap::new();
        map.insert(father.clone(), 0.9);
        map.insert(rule.clone(), 0.1);
        let id = engine
            .contract("b", &parent, ContractionStrategy::Kernel, Some(&map))
            .unwrap();
        assert_eq!(terms(&engine, &id), vec![father]);
        assert!(!engine.entails(&id, &parent).unwrap());
    }

    #[test]
    fn revision_by_negation_follows_levi_identity() {
        let (engine, reg) = engine();
        let father = rel(&reg, "Father", person("john"), person("bob"));
        let mother = rel(&reg, "Mother", person("mary"), person("bob"));
        seed(&engine, "b", &[father.clone(), mother.clone()]);

        let id = engine
            .revise("b", father.negate(), ContractionStrategy::PartialMeet, 0.8, None)
            .unwrap();
        let result = terms(&engine, &id);
        assert!(!result.contains(&father));
        assert!(result.contains(&father.negate()));
        assert!(result.contains(&mother));
        assert!(engine.is_consistent(&id).unwrap());

        let history = engine.history();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].kind, DerivationKind::Contraction);
        assert_eq!(history[1].kind, DerivationKind::Revision);
        assert_eq!(history[1].removed, vec![father]);
        let parent = engine.store().context_info(&id).unwrap().parent;
        assert_eq!(parent.as_deref(), Some(history[0].result_context.as_str()));
    }

    #[test]
    fn revision_with_present_belief_copies() {
        let (engine, reg) = engine();
        let father = rel(&reg, "Father", person("john"), person("bob"));
        seed(&engine, "b", &[father.clone()]);
        let id = engine
            .revise("b", father.clone(), ContractionStrategy::Kernel, 0.5, None)
            .unwrap();
        assert_eq!(terms(&engine, &id), vec![father]);
        assert_eq!(engine.history().len(), 1);
        assert!(engine.history()[0].strategy.is_none());
    }

    #[test]
    fn inconsistent_context_is_detected() {
        let (engine, reg) = engine();
        let happy = pred(&reg, "Happy", person("bob"));
        seed(&engine, "b", &[happy.clone(), happy.negate()]);
        assert!(!engine.is_consistent("b").unwrap());
    }
}
