//! Engine facade: top-level API for the akh-maat reasoning core.
//!
//! The `Engine` owns the type registry, the knowledge store and the belief
//! revision engine, wired to one [`EngineConfig`], and exposes the common
//! operations with a single [`MaatResult`] error type.

use std::sync::Arc;

use crate::config::EngineConfig;
use crate::error::MaatResult;
use crate::kb::{ContextInfo, ContextKind, KnowledgeStore, QueryMatch, StoreStats};
use crate::provenance::{RevisionRecord, StatementMeta};
use crate::revision::{BeliefRevisionEngine, BeliefSet, ContractionStrategy, EntrenchmentMap};
use crate::symbol::VarId;
use crate::term::{Substitution, Term};
use crate::types::{Ty, TypeRegistry};

/// The akh-maat reasoning engine.
pub struct Engine {
    config: EngineConfig,
    registry: Arc<TypeRegistry>,
    store: Arc<KnowledgeStore>,
    revision: BeliefRevisionEngine,
}

impl Engine {
    /// Create an engine with a fresh registry holding the built-in types.
    pub fn new(config: EngineConfig) -> MaatResult<Self> {
        Self::with_registry(Arc::new(TypeRegistry::new()), config)
    }

    /// Create an engine over an existing registry.
    pub fn with_registry(registry: Arc<TypeRegistry>, config: EngineConfig) -> MaatResult<Self> {
        config.validate()?;
        tracing::info!(
            unify_mode = %config.unify_mode,
            semantics = %config.semantics,
            types = registry.len(),
            "initializing akh-maat engine"
        );
        let store = Arc::new(KnowledgeStore::new(Arc::clone(&registry), &config));
        let revision = BeliefRevisionEngine::new(Arc::clone(&store), &config);
        Ok(Self {
            config,
            registry,
            store,
            revision,
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn registry(&self) -> &Arc<TypeRegistry> {
        &self.registry
    }

    pub fn store(&self) -> &Arc<KnowledgeStore> {
        &self.store
    }

    pub fn revision(&self) -> &BeliefRevisionEngine {
        &self.revision
    }

    // -----------------------------------------------------------------------
    // Types and terms
    // -----------------------------------------------------------------------

    /// Declare an atomic type.
    pub fn define_type(&self, name: &str, supertypes: &[&str]) -> MaatResult<Ty> {
        Ok(self.registry.define_atomic_type(name, supertypes)?)
    }

    /// Declare a function signature type.
    pub fn define_signature(&self, name: &str, params: &[&str], returns: &str) -> MaatResult<Ty> {
        Ok(self.registry.define_function_signature(name, params, returns)?)
    }

    /// Build `op(args...)`, checking arity and argument types.
    pub fn apply(&self, op: Term, args: Vec<Term>) -> MaatResult<Term> {
        Ok(Term::apply(&self.registry, op, args)?)
    }

    /// Most general unifier of `a` and `b` in the configured mode.
    pub fn unify(&self, a: &Term, b: &Term) -> MaatResult<Substitution> {
        Ok(self.store.unifier().unify(a, b, &Substitution::new())?)
    }

    // -----------------------------------------------------------------------
    // Knowledge store
    // -----------------------------------------------------------------------

    pub fn create_context(&self, id: &str, parent: Option<&str>, kind: ContextKind) -> MaatResult<()> {
        Ok(self.store.create_context(id, parent, kind)?)
    }

    /// Assert `term` in `context` with optional entrenchment.
    pub fn assert(&self, term: Term, context: &str, entrenchment: Option<f64>) -> MaatResult<bool> {
        let meta = entrenchment.map(|e| StatementMeta::asserted().with_entrenchment(e));
        Ok(self.store.add_statement(term, context, meta)?)
    }

    pub fn retract(&self, pattern: &Term, context: &str) -> MaatResult<bool> {
        Ok(self.store.retract_statement(pattern, context)?)
    }

    pub fn query(
        &self,
        pattern: &Term,
        contexts: &[&str],
        vars_to_bind: Option<&[VarId]>,
    ) -> MaatResult<Vec<QueryMatch>> {
        Ok(self
            .store
            .query_statements_match_pattern(pattern, contexts, vars_to_bind)?)
    }

    pub fn contexts(&self) -> Vec<ContextInfo> {
        self.store.list_contexts()
    }

    // -----------------------------------------------------------------------
    // Belief revision
    // -----------------------------------------------------------------------

    pub fn expand(&self, base: &str, belief: Term, entrenchment: f64) -> MaatResult<String> {
        Ok(self.revision.expand(base, belief, entrenchment)?)
    }

    pub fn contract(
        &self,
        base: &str,
        belief: &Term,
        strategy: ContractionStrategy,
        entrenchment: Option<&EntrenchmentMap>,
    ) -> MaatResult<String> {
        Ok(self.revision.contract(base, belief, strategy, entrenchment)?)
    }

    /// Revise with the configured default entrenchment for the new belief.
    pub fn revise(
        &self,
        base: &str,
        belief: Term,
        strategy: ContractionStrategy,
        entrenchment: Option<&EntrenchmentMap>,
    ) -> MaatResult<String> {
        Ok(self.revision.revise(
            base,
            belief,
            strategy,
            self.config.default_entrenchment,
            entrenchment,
        )?)
    }

    pub fn belief_set(&self, context: &str) -> MaatResult<BeliefSet> {
        Ok(self.revision.belief_set(context)?)
    }

    pub fn history(&self) -> Vec<RevisionRecord> {
        self.revision.history()
    }

    /// Summary counters.
    pub fn info(&self) -> EngineInfo {
        let stats = self.store.stats();
        EngineInfo {
            types: self.registry.len(),
            unify_mode: self.config.unify_mode.to_string(),
            derivations: self.revision.history().len(),
            stats,
        }
    }
}

/// Summary information about the engine state.
#[derive(Debug, Clone)]
pub struct EngineInfo {
    pub types: usize,
    pub unify_mode: String,
    pub derivations: usize,
    pub stats: StoreStats,
}

impl std::fmt::Display for EngineInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "akh-maat engine info")?;
        writeln!(f, "  types:        {}", self.types)?;
        writeln!(f, "  unify mode:   {}", self.unify_mode)?;
        writeln!(f, "  contexts:     {}", self.stats.contexts)?;
        writeln!(f, "  statements:   {}", self.stats.statements)?;
        writeln!(
            f,
            "  query cache:  {} entries, {} hits, {} misses",
            self.stats.cache_entries, self.stats.cache_hits, self.stats.cache_misses
        )?;
        writeln!(f, "  derivations:  {}", self.derivations)?;
        Ok(())
    }
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("config", &self.config)
            .field("store", &self.store)
            .field("revision", &self.revision)
            .finish()
    }
}
