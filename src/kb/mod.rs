//! The knowledge store: contexts of statements, indexed and queryable by
//! unification.
//!
//! One `RwLock` guards the context table and the indices together, so every
//! public call is atomic with respect to every other. The query cache sits
//! behind its own `Mutex` and is cleared from inside the write lock of each
//! mutating call; lookups and insertions happen under the read lock, so no
//! reader can cache a result computed against state a writer is changing.
//!
//! Stored statements are renamed apart (fresh ids for their free variables)
//! before being unified with a pattern, and bindings are reported only for
//! the pattern's variables.

pub mod cache;
pub mod context;
pub mod index;

use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::config::EngineConfig;
use crate::error::{KbError, KbResult};
use crate::provenance::{StatementMeta, valid_entrenchment};
use crate::symbol::{VarAllocator, VarId};
use crate::term::{Substitution, Term};
use crate::types::{Ty, TypeRegistry};
use crate::unify::{Unifier, UnifyMode};

use cache::{QueryCache, QueryKey};
use context::Context;
pub use context::{ContextInfo, ContextKind, Statement};
use index::StatementIndex;

/// One successful match of a pattern against a stored statement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryMatch {
    pub context_id: String,
    /// The stored statement, as stored.
    pub statement: Term,
    /// Bindings for the requested (or all of the pattern's) variables.
    pub bindings: Substitution,
}

/// Store-wide counters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreStats {
    pub contexts: usize,
    pub statements: usize,
    pub cache_entries: usize,
    pub cache_hits: u64,
    pub cache_misses: u64,
}

#[derive(Debug, Default)]
struct StoreState {
    contexts: HashMap<String, Context>,
    index: StatementIndex,
}

impl StoreState {
    fn context(&self, id: &str) -> KbResult<&Context> {
        self.contexts
            .get(id)
            .ok_or_else(|| KbError::ContextNotFound { id: id.into() })
    }
}

/// Indexed, context-scoped statement store.
pub struct KnowledgeStore {
    registry: Arc<TypeRegistry>,
    vars: Arc<VarAllocator>,
    mode: UnifyMode,
    parallel_threshold: usize,
    state: RwLock<StoreState>,
    cache: Mutex<QueryCache>,
}

impl std::fmt::Debug for KnowledgeStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let count = self.state.read().map(|s| s.contexts.len()).unwrap_or(0);
        f.debug_struct("KnowledgeStore")
            .field("mode", &self.mode)
            .field("context_count", &count)
            .finish()
    }
}

impl KnowledgeStore {
    /// Create an empty store over `registry`.
    pub fn new(registry: Arc<TypeRegistry>, config: &EngineConfig) -> Self {
        Self {
            registry,
            vars: Arc::new(VarAllocator::starting_from(config.fresh_var_base)),
            mode: config.unify_mode,
            parallel_threshold: config.parallel_query_threshold.max(1),
            state: RwLock::new(StoreState::default()),
            cache: Mutex::new(QueryCache::new(config.query_cache_capacity)),
        }
    }

    pub fn registry(&self) -> &Arc<TypeRegistry> {
        &self.registry
    }

    /// The allocator used for alpha conversion and renaming apart.
    pub fn vars(&self) -> &Arc<VarAllocator> {
        &self.vars
    }

    pub fn mode(&self) -> UnifyMode {
        self.mode
    }

    /// A unifier sharing this store's registry, allocator and mode.
    pub fn unifier(&self) -> Unifier<'_> {
        Unifier::new(&self.registry, &self.vars, self.mode)
    }

    fn clear_cache(&self) {
        self.cache.lock().expect("query cache lock poisoned").clear();
    }

    // -----------------------------------------------------------------------
    // Contexts
    // -----------------------------------------------------------------------

    /// Create an empty context.
    pub fn create_context(&self, id: &str, parent: Option<&str>, kind: ContextKind) -> KbResult<()> {
        let mut state = self.state.write().expect("store lock poisoned");
        if state.contexts.contains_key(id) {
            return Err(KbError::DuplicateContext { id: id.into() });
        }
        if let Some(p) = parent {
            state.context(p)?;
        }
        state.contexts.insert(
            id.to_string(),
            Context::new(id.to_string(), parent.map(str::to_string), kind),
        );
        self.clear_cache();
        tracing::debug!(context = id, parent = ?parent, %kind, "context created");
        Ok(())
    }

    /// Create a context already holding `statements`, atomically.
    ///
    /// Every statement is validated before anything is created. Exact
    /// duplicates among `statements` are skipped. Returns the number stored.
    pub fn create_context_with_statements(
        &self,
        id: &str,
        parent: Option<&str>,
        kind: ContextKind,
        statements: Vec<Statement>,
    ) -> KbResult<usize> {
        for s in &statements {
            self.validate(&s.term, &s.meta)?;
        }
        let mut state = self.state.write().expect("store lock poisoned");
        if state.contexts.contains_key(id) {
            return Err(KbError::DuplicateContext { id: id.into() });
        }
        if let Some(p) = parent {
            state.context(p)?;
        }

        let unifier = self.unifier();
        let mut ctx = Context::new(id.to_string(), parent.map(str::to_string), kind);
        let mut stored = 0;
        for s in statements {
            if ctx.iter().any(|existing| unifier.is_variant(&existing.term, &s.term)) {
                continue;
            }
            let term = s.term.clone();
            if ctx.push(s) {
                state.index.insert(id, &term);
                stored += 1;
            }
        }
        state.contexts.insert(id.to_string(), ctx);
        self.clear_cache();
        tracing::debug!(context = id, parent = ?parent, statements = stored, "derived context created");
        Ok(stored)
    }

    /// Delete a context that no other context names as its parent.
    pub fn delete_context(&self, id: &str) -> KbResult<()> {
        let mut state = self.state.write().expect("store lock poisoned");
        state.context(id)?;
        if let Some(child) = state
            .contexts
            .values()
            .find(|c| c.parent.as_deref() == Some(id))
        {
            return Err(KbError::ContextHasChildren {
                id: id.into(),
                child: child.id.clone(),
            });
        }
        state.contexts.remove(id);
        state.index.remove_context(id);
        self.clear_cache();
        tracing::debug!(context = id, "context deleted");
        Ok(())
    }

    pub fn has_context(&self, id: &str) -> bool {
        self.state
            .read()
            .expect("store lock poisoned")
            .contexts
            .contains_key(id)
    }

    /// Summaries of every context, sorted by id.
    pub fn list_contexts(&self) -> Vec<ContextInfo> {
        let state = self.state.read().expect("store lock poisoned");
        let mut out: Vec<ContextInfo> = state.contexts.values().map(Context::info).collect();
        out.sort_by(|a, b| a.id.cmp(&b.id));
        out
    }

    pub fn context_info(&self, id: &str) -> KbResult<ContextInfo> {
        let state = self.state.read().expect("store lock poisoned");
        Ok(state.context(id)?.info())
    }

    /// The parent chain of `id`, nearest first, excluding `id` itself.
    pub fn ancestors(&self, id: &str) -> KbResult<Vec<String>> {
        let state = self.state.read().expect("store lock poisoned");
        let mut current = state.context(id)?;
        let mut chain = Vec::new();
        while let Some(parent) = current.parent.as_deref() {
            if parent == id || chain.iter().any(|c| c == parent) {
                break;
            }
            match state.contexts.get(parent) {
                Some(ctx) => {
                    chain.push(parent.to_string());
                    current = ctx;
                }
                None => break,
            }
        }
        Ok(chain)
    }

    // -----------------------------------------------------------------------
    // Statements
    // -----------------------------------------------------------------------

    /// Fails with `NotAProposition` unless `term` is Boolean-typed.
    pub fn check_proposition(&self, term: &Term) -> KbResult<()> {
        if self.registry.is_subtype(term.ty(), &Ty::boolean()) {
            Ok(())
        } else {
            Err(KbError::NotAProposition {
                term: term.to_string(),
                ty: term.ty().to_string(),
            })
        }
    }

    fn validate(&self, term: &Term, meta: &StatementMeta) -> KbResult<()> {
        self.check_proposition(term)?;
        if let Some(e) = meta.entrenchment.filter(|e| !valid_entrenchment(*e)) {
            return Err(KbError::InvalidEntrenchment { value: e });
        }
        Ok(())
    }

    /// Add a statement. Returns `false`, changing nothing, if an exact
    /// duplicate (unifies with no bindings) is already in the context.
    pub fn add_statement(&self, term: Term, context: &str, meta: Option<StatementMeta>) -> KbResult<bool> {
        let meta = meta.unwrap_or_default();
        self.validate(&term, &meta)?;

        let mut state = self.state.write().expect("store lock poisoned");
        let unifier = self.unifier();
        let ctx = state.context(context)?;
        let duplicate = match state.index.candidates(&term, context, &self.registry).1 {
            Some(cands) => cands.iter().any(|c| unifier.is_variant(c, &term)),
            None => ctx.iter().any(|s| unifier.is_variant(&s.term, &term)),
        };
        if duplicate {
            return Ok(false);
        }

        let StoreState { contexts, index } = &mut *state;
        let Some(ctx) = contexts.get_mut(context) else {
            return Err(KbError::ContextNotFound { id: context.into() });
        };
        if !ctx.push(Statement::new(term.clone(), meta)) {
            return Ok(false);
        }
        index.insert(context, &term);
        self.clear_cache();
        tracing::debug!(context, statement = %term, "statement added");
        Ok(true)
    }

    /// Remove every statement in `context` that unifies with `pattern`.
    pub fn retract_statement(&self, pattern: &Term, context: &str) -> KbResult<bool> {
        let mut state = self.state.write().expect("store lock poisoned");
        let victims: Vec<Term> = {
            let ctx = state.context(context)?;
            let unifier = self.unifier();
            self.candidates_in(&state, ctx, pattern)
                .into_iter()
                .filter(|t| self.match_one(&unifier, pattern, &[], context, t).is_some())
                .cloned()
                .collect()
        };
        if victims.is_empty() {
            return Ok(false);
        }

        let StoreState { contexts, index } = &mut *state;
        if let Some(ctx) = contexts.get_mut(context) {
            for t in &victims {
                ctx.remove(t);
                index.remove(context, t);
            }
        }
        self.clear_cache();
        tracing::debug!(context, pattern = %pattern, removed = victims.len(), "statements retracted");
        Ok(true)
    }

    /// Index-narrowed candidates for `pattern` in `ctx`, in insertion order.
    fn candidates_in<'s>(&self, state: &'s StoreState, ctx: &'s Context, pattern: &Term) -> Vec<&'s Term> {
        match state.index.candidates(pattern, &ctx.id, &self.registry).1 {
            Some(set) => {
                let mut ordered: Vec<(u64, &Term)> = set
                    .iter()
                    .filter_map(|t| ctx.get(t).map(|s| (ctx.position(t).unwrap_or(u64::MAX), &s.term)))
                    .collect();
                ordered.sort_by_key(|(pos, _)| *pos);
                ordered.into_iter().map(|(_, t)| t).collect()
            }
            None => ctx.iter().map(|s| &s.term).collect(),
        }
    }

    /// Give the free variables of a stored statement fresh ids.
    fn rename_apart(&self, term: &Term) -> Term {
        let free = term.free_variables();
        if free.is_empty() {
            return term.clone();
        }
        let mut mapping = Substitution::new();
        for v in free {
            let fresh = v.renamed(self.vars.fresh());
            mapping.insert(v, Term::var(fresh));
        }
        mapping.apply(term)
    }

    fn match_one(
        &self,
        unifier: &Unifier<'_>,
        pattern: &Term,
        keep: &[VarId],
        context: &str,
        stored: &Term,
    ) -> Option<QueryMatch> {
        let renamed = self.rename_apart(stored);
        let subst = unifier.unify(pattern, &renamed, &Substitution::new()).ok()?;
        Some(QueryMatch {
            context_id: context.to_string(),
            statement: stored.clone(),
            bindings: subst.restrict(keep),
        })
    }

    /// Match `pattern` against the statements of `contexts`, in the order given.
    ///
    /// Bindings are restricted to `vars_to_bind`, or to the pattern's free
    /// variables when `None`.
    pub fn query_statements_match_pattern(
        &self,
        pattern: &Term,
        contexts: &[&str],
        vars_to_bind: Option<&[VarId]>,
    ) -> KbResult<Vec<QueryMatch>> {
        let state = self.state.read().expect("store lock poisoned");
        for c in contexts {
            state.context(c)?;
        }

        let key = QueryKey::new(pattern, contexts, vars_to_bind);
        if let Some(hit) = self.cache.lock().expect("query cache lock poisoned").get(&key) {
            return Ok(hit);
        }

        let keep: Vec<VarId> = match vars_to_bind {
            Some(v) => v.to_vec(),
            None => pattern.free_vars().into_iter().collect(),
        };
        let unifier = self.unifier();
        let mut results = Vec::new();
        for c in &key.contexts {
            let ctx = state.context(c)?;
            let candidates = self.candidates_in(&state, ctx, pattern);
            let matched: Vec<QueryMatch> = if candidates.len() >= self.parallel_threshold {
                candidates
                    .par_iter()
                    .filter_map(|t| self.match_one(&unifier, pattern, &keep, c, t))
                    .collect()
            } else {
                candidates
                    .iter()
                    .filter_map(|t| self.match_one(&unifier, pattern, &keep, c, t))
                    .collect()
            };
            results.extend(matched);
        }

        self.cache
            .lock()
            .expect("query cache lock poisoned")
            .put(key, results.clone());
        Ok(results)
    }

    /// Query `context` and then each of its ancestors, nearest first.
    pub fn query_with_ancestors(
        &self,
        pattern: &Term,
        context: &str,
        vars_to_bind: Option<&[VarId]>,
    ) -> KbResult<Vec<QueryMatch>> {
        let chain = self.ancestors(context)?;
        let mut ids: Vec<&str> = vec![context];
        ids.extend(chain.iter().map(String::as_str));
        self.query_statements_match_pattern(pattern, &ids, vars_to_bind)
    }

    /// Whether some statement in `contexts` unifies with `term`.
    pub fn statement_exists(&self, term: &Term, contexts: &[&str]) -> KbResult<bool> {
        Ok(!self
            .query_statements_match_pattern(term, contexts, Some(&[]))?
            .is_empty())
    }

    /// The statements of `context`, in insertion order.
    pub fn statements_in(&self, context: &str) -> KbResult<Vec<Statement>> {
        let state = self.state.read().expect("store lock poisoned");
        Ok(state.context(context)?.iter().cloned().collect())
    }

    /// Metadata of the statement stored as exactly `term`, if any.
    pub fn statement_metadata(&self, term: &Term, context: &str) -> KbResult<Option<StatementMeta>> {
        let state = self.state.read().expect("store lock poisoned");
        Ok(state.context(context)?.get(term).map(|s| s.meta.clone()))
    }

    /// Statements mentioning the constant `name`, per context, in insertion order.
    pub fn statements_mentioning(&self, name: &str, contexts: &[&str]) -> KbResult<Vec<(String, Term)>> {
        let state = self.state.read().expect("store lock poisoned");
        let mut out = Vec::new();
        for c in contexts {
            let ctx = state.context(c)?;
            let hits = state.index.mentioning(name, c);
            let mut ordered: Vec<(u64, Term)> = hits
                .into_iter()
                .filter_map(|t| ctx.position(&t).map(|p| (p, t)))
                .collect();
            ordered.sort_by_key(|(p, _)| *p);
            out.extend(ordered.into_iter().map(|(_, t)| (c.to_string(), t)));
        }
        Ok(out)
    }

    pub fn stats(&self) -> StoreStats {
        let state = self.state.read().expect("store lock poisoned");
        let cache = self.cache.lock().expect("query cache lock poisoned");
        StoreStats {
            contexts: state.contexts.len(),
            statements: state.contexts.values().map(Context::len).sum(),
            cache_entries: cache.len(),
            cache_hits: cache.hits(),
            cache_misses: cache.misses(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::term::fixtures::*;

    fn store() -> KnowledgeStore {
        KnowledgeStore::new(Arc::new(registry()), &EngineConfig::default())
    }

    #[test]
    fn context_lifecycle() {
        let kb = store();
        kb.create_context("facts", None, ContextKind::Facts).unwrap();
        kb.create_context("derived", Some("facts"), ContextKind::Inferred)
            .unwrap();

        assert!(matches!(
            kb.create_context("facts", None, ContextKind::Facts),
            Err(KbError::DuplicateContext { .. })
        ));
        assert!(matches!(
            kb.create_context("orphan", Some("ghost"), ContextKind::General),
            Err(KbError::ContextNotFound { .. })
        ));
        assert!(matches!(
            kb.delete_context("facts"),
            Err(KbError::ContextHasChildren { .. })
        ));

        assert_eq!(kb.ancestors("derived").unwrap(), vec!["facts".to_string()]);
        kb.delete_context("derived").unwrap();
        kb.delete_context("facts").unwrap();
        assert!(kb.list_contexts().is_empty());
    }

    #[test]
    fn add_rejects_bad_input_before_mutation() {
        let reg = registry();
        let kb = store();
        kb.create_context("facts", None, ContextKind::Facts).unwrap();

        assert!(matches!(
            kb.add_statement(person("john"), "facts", None),
            Err(KbError::NotAProposition { .. })
        ));
        let fact = rel(&reg, "Father", person("john"), person("bob"));
        assert!(matches!(
            kb.add_statement(
                fact.clone(),
                "facts",
                Some(StatementMeta::asserted().with_entrenchment(1.5))
            ),
            Err(KbError::InvalidEntrenchment { .. })
        ));
        assert!(matches!(
            kb.add_statement(fact, "nowhere", None),
            Err(KbError::ContextNotFound { .. })
        ));
        assert_eq!(kb.context_info("facts").unwrap().statement_count, 0);
    }

    #[test]
    fn duplicates_are_not_added_twice() {
        let reg = registry();
        let kb = store();
        kb.create_context("facts", None, ContextKind::Facts).unwrap();
        let fact = rel(&reg, "Father", person("john"), person("bob"));
        assert!(kb.add_statement(fact.clone(), "facts", None).unwrap());
        assert!(!kb.add_statement(fact, "facts", None).unwrap());

        // Alpha-equivalent formulas are duplicates too.
        let a = Term::forall(vec![var(1, "x")], pred(&reg, "Happy", v(1, "x"))).unwrap();
        let b = Term::forall(vec![var(2, "y")], pred(&reg, "Happy", v(2, "y"))).unwrap();
        assert!(kb.add_statement(a, "facts", None).unwrap());
        assert!(!kb.add_statement(b, "facts", None).unwrap());
        assert_eq!(kb.stats().statements, 2);
    }

    #[test]
    fn query_reports_pattern_bindings_in_insertion_order() {
        let reg = registry();
        let kb = store();
        kb.create_context("facts", None, ContextKind::Facts).unwrap();
        for child in ["bob", "ann", "cid"] {
            kb.add_statement(rel(&reg, "Father", person("john"), person(child)), "facts", None)
                .unwrap();
        }
        kb.add_statement(rel(&reg, "Mother", person("mary"), person("bob")), "facts", None)
            .unwrap();

        let pattern = rel(&reg, "Father", person("john"), v(1, "c"));
        let found = kb
            .query_statements_match_pattern(&pattern, &["facts"], None)
            .unwrap();
        let children: Vec<Term> = found
            .iter()
            .map(|m| m.bindings.get_by_name("c").cloned().unwrap())
            .collect();
        assert_eq!(children, vec![person("bob"), person("ann"), person("cid")]);
    }

    #[test]
    fn stored_variables_are_renamed_apart() {
        let reg = registry();
        let kb = store();
        kb.create_context("rules", None, ContextKind::Rules).unwrap();
        // Same id as the pattern's variable, different meaning.
        kb.add_statement(rel(&reg, "Loves", v(1, "x"), person("mary")), "rules", None)
            .unwrap();

        let pattern = rel(&reg, "Loves", person("john"), v(1, "x"));
        let found = kb
            .query_statements_match_pattern(&pattern, &["rules"], None)
            .unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].bindings.get_by_name("x"), Some(&person("mary")));
    }

    #[test]
    fn cache_is_cleared_by_mutation() {
        let reg = registry();
        let kb = store();
        kb.create_context("facts", None, ContextKind::Facts).unwrap();
        let pattern = rel(&reg, "Father", v(1, "x"), v(2, "y"));

        assert!(kb.query_statements_match_pattern(&pattern, &["facts"], None).unwrap().is_empty());
        assert!(kb.query_statements_match_pattern(&pattern, &["facts"], None).unwrap().is_empty());
        assert_eq!(kb.stats().cache_hits, 1);

        kb.add_statement(rel(&reg, "Father", person("john"), person("bob")), "facts", None)
            .unwrap();
        assert_eq!(kb.stats().cache_entries, 0);
        assert_eq!(
            kb.query_statements_match_pattern(&pattern, &["facts"], None).unwrap().len(),
            1
        );
    }

    #[test]
    fn ancestors_are_opt_in() {
        let reg = registry();
        let kb = store();
        kb.create_context("base", None, ContextKind::Facts).unwrap();
        kb.create_context("child", Some("base"), ContextKind::Hypothetical)
            .unwrap();
        let fact = pred(&reg, "Happy", person("ann"));
        kb.add_statement(fact.clone(), "base", None).unwrap();

        assert!(!kb.statement_exists(&fact, &["child"]).unwrap());
        let found = kb.query_with_ancestors(&fact, "child", None).unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].context_id, "base");
    }

    #[test]
    fn retract_removes_every_unifying_statement() {
        let reg = registry();
        let kb = store();
        kb.create_context("facts", None, ContextKind::Facts).unwrap();
        kb.add_statement(rel(&reg, "Father", person("john"), person("bob")), "facts", None)
            .unwrap();
        kb.add_statement(rel(&reg, "Father", person("john"), person("ann")), "facts", None)
            .unwrap();
        kb.add_statement(rel(&reg, "Mother", person("mary"), person("ann")), "facts", None)
            .unwrap();

        let pattern = rel(&reg, "Father", person("john"), v(1, "c"));
        assert!(kb.retract_statement(&pattern, "facts").unwrap());
        assert!(!kb.retract_statement(&pattern, "facts").unwrap());
        assert_eq!(kb.context_info("facts").unwrap().statement_count, 1);
        assert_eq!(kb.statements_mentioning("ann", &["facts"]).unwrap().len(), 1);
    }

    #[test]
    fn atomic_derived_context_validates_first() {
        let reg = registry();
        let kb = store();
        kb.create_context("base", None, ContextKind::Beliefs).unwrap();
        let good = Statement::new(pred(&reg, "Happy", person("a")), StatementMeta::asserted());
        let bad = Statement::new(person("a"), StatementMeta::asserted());
        assert!(
            kb.create_context_with_statements("d", Some("base"), ContextKind::Beliefs, vec![good.clone(), bad])
                .is_err()
        );
        assert!(!kb.has_context("d"));

        let stored = kb
            .create_context_with_statements("d", Some("base"), ContextKind::Beliefs, vec![good.clone(), good])
            .unwrap();
        assert_eq!(stored, 1);
    }

    #[test]
    fn parallel_matching_agrees_with_sequential() {
        let reg = registry();
        let config = EngineConfig {
            parallel_query_threshold: 2,
            ..Default::default()
        };
        let kb = KnowledgeStore::new(Arc::new(registry()), &config);
        kb.create_context("facts", None, ContextKind::Facts).unwrap();
        let names: Vec<String> = (0..20).map(|i| format!("p{i}")).collect();
        for n in &names {
            kb.add_statement(pred(&reg, "Happy", person(n)), "facts", None)
                .unwrap();
        }
        let found = kb
            .query_statements_match_pattern(&pred(&reg, "Happy", v(1, "x")), &["facts"], None)
            .unwrap();
        let got: Vec<Term> = found
            .iter()
            .map(|m| m.bindings.get_by_name("x").cloned().unwrap())
            .collect();
        let expected: Vec<Term> = names.iter().map(|n| person(n)).collect();
        assert_eq!(got, expected);
    }
}
