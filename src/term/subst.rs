//! Substitutions: finite maps from variable ids to terms.
//!
//! Application is simultaneous and single-pass; chained bindings are followed
//! explicitly with [`Substitution::walk`]. Substitutions built by the unifier are
//! kept idempotent (no bound variable occurs in any bound value), so a single
//! pass is always a full application for them.

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::{Term, Var};
use crate::symbol::VarId;

/// One `variable ↦ value` entry. The variable is kept whole so results can be
/// reported by name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Binding {
    pub var: Var,
    pub value: Term,
}

/// A finite mapping from variable ids to terms.
///
/// Serialized as a list of bindings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<Binding>", into = "Vec<Binding>")]
pub struct Substitution {
    bindings: BTreeMap<VarId, Binding>,
}

impl Substitution {
    /// The identity substitution.
    pub fn new() -> Self {
        Self::default()
    }

    /// A substitution with a single binding.
    pub fn singleton(var: Var, value: Term) -> Self {
        let mut s = Self::new();
        s.insert(var, value);
        s
    }

    /// Number of bindings.
    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    /// Whether this is the identity substitution.
    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    /// The value bound to `id`, without following chains.
    pub fn get(&self, id: VarId) -> Option<&Term> {
        self.bindings.get(&id).map(|b| &b.value)
    }

    /// The value bound to the first variable named `name`.
    pub fn get_by_name(&self, name: &str) -> Option<&Term> {
        self.bindings
            .values()
            .find(|b| &*b.var.name == name)
            .map(|b| &b.value)
    }

    /// Whether `id` is bound.
    pub fn contains(&self, id: VarId) -> bool {
        self.bindings.contains_key(&id)
    }

    /// Iterate bindings in variable-id order.
    pub fn iter(&self) -> impl Iterator<Item = &Binding> {
        self.bindings.values()
    }

    /// Bound variable ids.
    pub fn domain(&self) -> impl Iterator<Item = VarId> + '_ {
        self.bindings.keys().copied()
    }

    /// Insert a raw binding, replacing any previous one. No propagation.
    pub fn insert(&mut self, var: Var, value: Term) {
        self.bindings.insert(var.id, Binding { var, value });
    }

    /// Remove the binding for `id`.
    pub fn remove(&mut self, id: VarId) -> Option<Term> {
        self.bindings.remove(&id).map(|b| b.value)
    }

    /// Bind `var` to `value`, keeping the substitution idempotent: the current
    /// bindings are applied to `value`, and the new binding is propagated into
    /// every existing value that mentions `var`.
    pub fn bind(&mut self, var: Var, value: Term) {
        let value = self.apply(&value);
        let single = Substitution::singleton(var.clone(), value.clone());
        for binding in self.bindings.values_mut() {
            if binding.value.occurs_free(var.id) {
                binding.value = single.apply(&binding.value);
            }
        }
        self.insert(var, value);
    }

    /// Follow a chain of variable bindings to its final value.
    ///
    /// Non-variable terms and unbound variables are returned unchanged. A cyclic
    /// chain stops at the first repeated variable.
    pub fn walk(&self, term: &Term) -> Term {
        let mut current = term.clone();
        let mut seen = HashSet::new();
        while let Term::Variable(v) = &current {
            if !seen.insert(v.id) {
                break;
            }
            match self.get(v.id) {
                Some(next) => current = next.clone(),
                None => break,
            }
        }
        current
    }

    /// Whether variable `id` is reachable from `term` through the current
    /// bindings: the occurs check.
    pub fn occurs(&self, id: VarId, term: &Term) -> bool {
        let mut visited = HashSet::new();
        self.occurs_inner(id, term, &mut visited)
    }

    fn occurs_inner(&self, id: VarId, term: &Term, visited: &mut HashSet<VarId>) -> bool {
        term.free_vars().into_iter().any(|free| {
            if free == id {
                return true;
            }
            if !visited.insert(free) {
                return false;
            }
            match self.get(free) {
                Some(value) => self.occurs_inner(id, value, visited),
                None => false,
            }
        })
    }

    /// Apply this substitution to `term` (single pass, capture-respecting).
    pub fn apply(&self, term: &Term) -> Term {
        substitute(term, self)
    }

    /// Composition: `self.compose(other).apply(t) == other.apply(&self.apply(t))`.
    pub fn compose(&self, other: &Substitution) -> Substitution {
        let mut out = Substitution::new();
        for binding in self.bindings.values() {
            out.insert(binding.var.clone(), other.apply(&binding.value));
        }
        for binding in other.bindings.values() {
            if !self.bindings.contains_key(&binding.var.id) {
                out.insert(binding.var.clone(), binding.value.clone());
            }
        }
        // Identity bindings x ↦ x carry no information.
        out.bindings.retain(|id, b| b.value.as_var().is_none_or(|v| v.id != *id));
        out
    }

    /// Keep only the bindings for `ids`.
    pub fn restrict(&self, ids: &[VarId]) -> Substitution {
        Substitution {
            bindings: self
                .bindings
                .iter()
                .filter(|(id, _)| ids.contains(id))
                .map(|(id, b)| (*id, b.clone()))
                .collect(),
        }
    }

    /// Drop the bindings for `ids`.
    pub fn without(&self, ids: &HashSet<VarId>) -> Substitution {
        Substitution {
            bindings: self
                .bindings
                .iter()
                .filter(|(id, _)| !ids.contains(id))
                .map(|(id, b)| (*id, b.clone()))
                .collect(),
        }
    }
}

impl From<Vec<Binding>> for Substitution {
    fn from(list: Vec<Binding>) -> Self {
        let mut s = Substitution::new();
        for b in list {
            s.insert(b.var, b.value);
        }
        s
    }
}

impl From<Substitution> for Vec<Binding> {
    fn from(s: Substitution) -> Self {
        s.bindings.into_values().collect()
    }
}

/// Replace every free occurrence of a mapped variable in `term`.
///
/// Under a quantifier or lambda whose bound variables shadow a mapping key, the
/// shadowed id is left untouched in that subtree.
pub fn substitute(term: &Term, mapping: &Substitution) -> Term {
    if mapping.is_empty() {
        return term.clone();
    }
    let mut shadowed = Vec::new();
    substitute_inner(term, mapping, &mut shadowed)
}

fn substitute_inner(term: &Term, mapping: &Substitution, shadowed: &mut Vec<VarId>) -> Term {
    match term {
        Term::Constant(_) => term.clone(),
        Term::Variable(v) => {
            if shadowed.contains(&v.id) {
                return term.clone();
            }
            mapping.get(v.id).cloned().unwrap_or_else(|| term.clone())
        }
        Term::Application { op, args, ty } => Term::Application {
            op: Arc::new(substitute_inner(op, mapping, shadowed)),
            args: args
                .iter()
                .map(|a| substitute_inner(a, mapping, shadowed))
                .collect(),
            ty: ty.clone(),
        },
        Term::Connective { kind, operands, ty } => Term::Connective {
            kind: *kind,
            operands: operands
                .iter()
                .map(|o| substitute_inner(o, mapping, shadowed))
                .collect(),
            ty: ty.clone(),
        },
        Term::Quantifier {
            kind,
            bound,
            scope,
            ty,
        } => {
            let depth = shadowed.len();
            shadowed.extend(bound.iter().map(|v| v.id));
            let scope = substitute_inner(scope, mapping, shadowed);
            shadowed.truncate(depth);
            Term::Quantifier {
                kind: *kind,
                bound: bound.clone(),
                scope: Arc::new(scope),
                ty: ty.clone(),
            }
        }
        Term::Lambda { bound, body, ty } => {
            let depth = shadowed.len();
            shadowed.extend(bound.iter().map(|v| v.id));
            let body = substitute_inner(body, mapping, shadowed);
            shadowed.truncate(depth);
            Term::Lambda {
                bound: bound.clone(),
                body: Arc::new(body),
                ty: ty.clone(),
            }
        }
        Term::Modal {
            op,
            agent,
            proposition,
            ty,
        } => Term::Modal {
            op: *op,
            agent: agent
                .as_ref()
                .map(|a| Arc::new(substitute_inner(a, mapping, shadowed))),
            proposition: Arc::new(substitute_inner(proposition, mapping, shadowed)),
            ty: ty.clone(),
        },
        Term::Definition {
            symbol,
            symbol_ty,
            body,
        } => Term::Definition {
            symbol: symbol.clone(),
            symbol_ty: symbol_ty.clone(),
            body: Arc::new(substitute_inner(body, mapping, shadowed)),
        },
    }
}
