//! Secondary indices over stored statements.
//!
//! Three maps, each keyed further by context id: head predicate name, every
//! occurring constant name, and the declared type of the head operator.
//! Statements whose head is not an application of a named constant go into a
//! per-context unindexed bucket, which every narrowed lookup also returns.
//! That keeps narrowing sound: a statement headed by a variable, a lambda, or
//! a bare proposition can still unify with a predicate pattern.

use std::collections::{HashMap, HashSet};

use crate::term::Term;
use crate::types::{Ty, TypeRegistry};

type Bucket = HashMap<String, HashSet<Term>>;

/// How a pattern's candidates were selected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Narrowing {
    /// Statements with the same head predicate.
    Predicate,
    /// Statements whose head operator type is compatible with the pattern's.
    Type,
    /// Statements not headed by a named constant.
    Unindexed,
    /// Every statement in the context.
    FullScan,
}

/// Predicate, constant and type indices.
#[derive(Debug, Default, Clone)]
pub struct StatementIndex {
    by_predicate: HashMap<String, Bucket>,
    by_constant: HashMap<String, Bucket>,
    by_type: HashMap<Ty, Bucket>,
    unindexed: Bucket,
}

/// The head predicate and its declared type, for constant-headed applications.
fn head(term: &Term) -> Option<(&str, &Ty)> {
    match term {
        Term::Application { op, .. } => match op.as_ref() {
            Term::Constant(c) => Some((&*c.name, &c.ty)),
            _ => None,
        },
        _ => None,
    }
}

fn bucket_insert(bucket: &mut Bucket, context: &str, term: &Term) {
    bucket
        .entry(context.to_string())
        .or_default()
        .insert(term.clone());
}

fn bucket_remove(bucket: &mut Bucket, context: &str, term: &Term) {
    if let Some(set) = bucket.get_mut(context) {
        set.remove(term);
        if set.is_empty() {
            bucket.remove(context);
        }
    }
}

impl StatementIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `term` as stored in `context`.
    pub fn insert(&mut self, context: &str, term: &Term) {
        match head(term) {
            Some((name, ty)) => {
                bucket_insert(
                    self.by_predicate.entry(name.to_string()).or_default(),
                    context,
                    term,
                );
                bucket_insert(self.by_type.entry(ty.clone()).or_default(), context, term);
            }
            None => bucket_insert(&mut self.unindexed, context, term),
        }
        for name in term.constants() {
            bucket_insert(
                self.by_constant.entry(name.to_string()).or_default(),
                context,
                term,
            );
        }
    }

    /// Forget `term` in `context`.
    pub fn remove(&mut self, context: &str, term: &Term) {
        match head(term) {
            Some((name, ty)) => {
                if let Some(bucket) = self.by_predicate.get_mut(name) {
                    bucket_remove(bucket, context, term);
                }
                if let Some(bucket) = self.by_type.get_mut(ty) {
                    bucket_remove(bucket, context, term);
                }
            }
            None => bucket_remove(&mut self.unindexed, context, term),
        }
        for name in term.constants() {
            if let Some(bucket) = self.by_constant.get_mut(&*name) {
                bucket_remove(bucket, context, term);
            }
        }
        self.by_predicate.retain(|_, b| !b.is_empty());
        self.by_constant.retain(|_, b| !b.is_empty());
        self.by_type.retain(|_, b| !b.is_empty());
    }

    /// Purge every entry for `context`.
    pub fn remove_context(&mut self, context: &str) {
        for bucket in self
            .by_predicate
            .values_mut()
            .chain(self.by_constant.values_mut())
            .chain(self.by_type.values_mut())
        {
            bucket.remove(context);
        }
        self.unindexed.remove(context);
        self.by_predicate.retain(|_, b| !b.is_empty());
        self.by_constant.retain(|_, b| !b.is_empty());
        self.by_type.retain(|_, b| !b.is_empty());
    }

    /// Candidate statements in `context` that might unify with `pattern`.
    ///
    /// Returns `None` when no index applies and the caller must scan the whole
    /// context.
    pub fn candidates(
        &self,
        pattern: &Term,
        context: &str,
        registry: &TypeRegistry,
    ) -> (Narrowing, Option<HashSet<Term>>) {
        let mut out: HashSet<Term> = self.unindexed.get(context).cloned().unwrap_or_default();
        match pattern {
            Term::Variable(_) => (Narrowing::FullScan, None),
            Term::Application { op, .. } => match op.as_ref() {
                Term::Constant(c) => {
                    if let Some(set) = self.by_predicate.get(&*c.name).and_then(|b| b.get(context)) {
                        out.extend(set.iter().cloned());
                    }
                    (Narrowing::Predicate, Some(out))
                }
                Term::Variable(v) => {
                    for (ty, bucket) in &self.by_type {
                        if !registry.are_compatible(ty, &v.ty) {
                            continue;
                        }
                        if let Some(set) = bucket.get(context) {
                            out.extend(set.iter().cloned());
                        }
                    }
                    (Narrowing::Type, Some(out))
                }
                // A lambda operator may beta-reduce to anything.
                _ => (Narrowing::FullScan, None),
            },
            // Only non-application statements can unify with these.
            _ => (Narrowing::Unindexed, Some(out)),
        }
    }

    /// Statements in `context` mentioning the constant `name`.
    pub fn mentioning(&self, name: &str, context: &str) -> HashSet<Term> {
        self.by_constant
            .get(name)
            .and_then(|b| b.get(context))
            .cloned()
            .unwrap_or_default()
    }

    /// Every indexed term in `context`, across all buckets.
    #[cfg(test)]
    pub fn all_in(&self, context: &str) -> HashSet<Term> {
        let mut out: HashSet<Term> = self.unindexed.get(context).cloned().unwrap_or_default();
        for bucket in self.by_predicate.values() {
            if let Some(set) = bucket.get(context) {
                out.extend(set.iter().cloned());
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::symbol::VarId;
    use crate::term::Var;
    use crate::term::fixtures::*;

    #[test]
    fn predicate_narrowing_includes_unindexed_bucket() {
        let reg = registry();
        let mut idx = StatementIndex::new();
        let father = rel(&reg, "Father", person("john"), person("bob"));
        let mother = rel(&reg, "Mother", person("mary"), person("bob"));
        let rule = Term::implies(father.clone(), rel(&reg, "Parent", person("john"), person("bob")));
        for t in [&father, &mother, &rule] {
            idx.insert("facts", t);
        }

        let pattern = rel(&reg, "Father", v(1, "x"), v(2, "y"));
        let (how, cands) = idx.candidates(&pattern, "facts", &reg);
        let cands = cands.unwrap();
        assert_eq!(how, Narrowing::Predicate);
        assert!(cands.contains(&father));
        assert!(cands.contains(&rule));
        assert!(!cands.contains(&mother));
    }

    #[test]
    fn variable_operator_uses_type_index() {
        let reg = registry();
        let mut idx = StatementIndex::new();
        let father = rel(&reg, "Father", person("john"), person("bob"));
        let happy = pred(&reg, "Happy", person("john"));
        idx.insert("facts", &father);
        idx.insert("facts", &happy);

        let r = Var::new(VarId::new(3).unwrap(), "R", Ty::new("Rel2"));
        let pattern = Term::Application {
            op: std::sync::Arc::new(Term::var(r)),
            args: std::sync::Arc::from(vec![v(1, "x"), v(2, "y")]),
            ty: Ty::boolean(),
        };
        let (how, cands) = idx.candidates(&pattern, "facts", &reg);
        assert_eq!(how, Narrowing::Type);
        let cands = cands.unwrap();
        assert!(cands.contains(&father));
        assert!(!cands.contains(&happy));
    }

    #[test]
    fn variable_pattern_needs_full_scan() {
        let reg = registry();
        let idx = StatementIndex::new();
        let (how, cands) = idx.candidates(&v(1, "p"), "facts", &reg);
        assert_eq!(how, Narrowing::FullScan);
        assert!(cands.is_none());
    }

    #[test]
    fn removal_and_context_purge() {
        let reg = registry();
        let mut idx = StatementIndex::new();
        let father = rel(&reg, "Father", person("john"), person("bob"));
        idx.insert("a", &father);
        idx.insert("b", &father);
        assert_eq!(idx.mentioning("john", "a").len(), 1);

        idx.remove("a", &father);
        assert!(idx.mentioning("john", "a").is_empty());
        assert_eq!(idx.mentioning("bob", "b").len(), 1);

        idx.remove_context("b");
        assert!(idx.all_in("b").is_empty());
        assert!(idx.by_predicate.is_empty());
    }
}
