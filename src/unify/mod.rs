//! Most-general unification over typed terms.
//!
//! A [`Unifier`] is a short-lived session borrowing the type registry and a
//! variable allocator. It computes the most general substitution making two
//! terms identical, or a non-empty list of [`FailureReason`]s whose first entry
//! is the discriminating mismatch and whose tail names the enclosing positions.
//!
//! Quantifier and lambda scopes are compared by alpha conversion: both sides'
//! bound variables are replaced by shared fresh variables, which are *rigid*
//! for the rest of that comparison. A rigid variable can never be bound, and a
//! free variable can never be bound to a term mentioning one, so bound
//! variables never escape their scope. Fresh variables are stripped from the
//! result.
//!
//! In [`UnifyMode::HigherOrder`], redexes are beta-reduced and eta-redexes
//! contracted before structural comparison, and the occurs check is skipped.

pub mod higher_order;

use std::collections::HashSet;
use std::fmt;

use miette::Diagnostic;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::symbol::{DEFAULT_FRESH_BASE, VarAllocator, VarId};
use crate::term::{Substitution, Term, TermKind, Var, substitute};
use crate::types::{Ty, TypeRegistry};

// ---------------------------------------------------------------------------
// Mode
// ---------------------------------------------------------------------------

/// Unification regime.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum UnifyMode {
    /// Syntactic first-order unification with a mandatory occurs check.
    #[default]
    FirstOrder,
    /// Beta/eta normalization before comparison; no occurs check.
    HigherOrder,
}

impl fmt::Display for UnifyMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::FirstOrder => write!(f, "first-order"),
            Self::HigherOrder => write!(f, "higher-order"),
        }
    }
}

// ---------------------------------------------------------------------------
// Failure reporting
// ---------------------------------------------------------------------------

/// One entry of a unification failure report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureReason {
    /// Neither type is a subtype of the other.
    TypeMismatch { left: Ty, right: Ty },
    /// Same node kind, different shape: names, arities, operators, or an
    /// attempt to bind a variable that must stay rigid.
    StructuralMismatch {
        left: Term,
        right: Term,
        detail: String,
    },
    /// Binding `var` to `term` would create an infinite term.
    OccursCheck { var: Var, term: Term },
    /// The two terms are different node kinds.
    NodeKindMismatch { left: TermKind, right: TermKind },
    /// The failure above occurred at child `position` of a `kind` node.
    Within { kind: TermKind, position: usize },
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TypeMismatch { left, right } => {
                write!(f, "type mismatch: {left} is incompatible with {right}")
            }
            Self::StructuralMismatch {
                left,
                right,
                detail,
            } => write!(f, "cannot unify {left} with {right}: {detail}"),
            Self::OccursCheck { var, term } => write!(f, "{var} occurs in {term}"),
            Self::NodeKindMismatch { left, right } => {
                write!(f, "node kind mismatch: {left} vs {right}")
            }
            Self::Within { kind, position } => write!(f, "within {kind} at position {position}"),
        }
    }
}

fn render_reasons(reasons: &[FailureReason]) -> String {
    reasons
        .iter()
        .map(|r| r.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

/// A unification failure: a recoverable value, not an exceptional condition.
#[derive(Debug, Clone, PartialEq, Eq, Error, Diagnostic)]
#[error("unification failed: {}", render_reasons(.reasons))]
#[diagnostic(
    code(maat::unify::failed),
    help("The first reason is the discriminating mismatch; the rest locate it inside the terms.")
)]
pub struct UnifyError {
    pub reasons: Vec<FailureReason>,
}

impl UnifyError {
    fn new(reason: FailureReason) -> Self {
        Self {
            reasons: vec![reason],
        }
    }

    fn structural(left: &Term, right: &Term, detail: impl Into<String>) -> Self {
        Self::new(FailureReason::StructuralMismatch {
            left: left.clone(),
            right: right.clone(),
            detail: detail.into(),
        })
    }

    fn within(mut self, kind: TermKind, position: usize) -> Self {
        self.reasons.push(FailureReason::Within { kind, position });
        self
    }

    /// The discriminating mismatch.
    pub fn primary(&self) -> Option<&FailureReason> {
        self.reasons.first()
    }
}

/// Result type for unification.
pub type UnifyResult<T> = std::result::Result<T, UnifyError>;

// ---------------------------------------------------------------------------
// Unifier
// ---------------------------------------------------------------------------

/// A unification session.
pub struct Unifier<'a> {
    registry: &'a TypeRegistry,
    vars: &'a VarAllocator,
    mode: UnifyMode,
}

impl<'a> Unifier<'a> {
    /// Create a session drawing fresh variables from `vars`.
    pub fn new(registry: &'a TypeRegistry, vars: &'a VarAllocator, mode: UnifyMode) -> Self {
        Self {
            registry,
            vars,
            mode,
        }
    }

    /// The unification regime of this session.
    pub fn mode(&self) -> UnifyMode {
        self.mode
    }

    /// Unify `a` with `b`, extending `bindings`.
    pub fn unify(&self, a: &Term, b: &Term, bindings: &Substitution) -> UnifyResult<Substitution> {
        let mut session = Session {
            unifier: self,
            subst: bindings.clone(),
            rigid: HashSet::new(),
        };
        session.unify(a, b)?;
        let Session { subst, rigid, .. } = session;
        Ok(subst.without(&rigid))
    }

    /// Whether `a` and `b` unify without binding anything: identical up to
    /// renaming of bound variables.
    pub fn is_variant(&self, a: &Term, b: &Term) -> bool {
        self.unify(a, b, &Substitution::new())
            .is_ok_and(|s| s.is_empty())
    }
}

/// Unify two terms with a throwaway allocator.
///
/// Fresh variables start at [`DEFAULT_FRESH_BASE`]; callers numbering their own
/// variables above that should use a [`Unifier`] with a shared allocator.
pub fn unify_terms(
    registry: &TypeRegistry,
    a: &Term,
    b: &Term,
    mode: UnifyMode,
) -> UnifyResult<Substitution> {
    let vars = VarAllocator::starting_from(DEFAULT_FRESH_BASE);
    Unifier::new(registry, &vars, mode).unify(a, b, &Substitution::new())
}

struct Session<'u, 'a> {
    unifier: &'u Unifier<'a>,
    subst: Substitution,
    rigid: HashSet<VarId>,
}

impl Session<'_, '_> {
    fn resolve(&self, term: &Term) -> Term {
        let term = match term {
            Term::Variable(_) => self.subst.walk(term),
            _ => term.clone(),
        };
        match self.unifier.mode {
            UnifyMode::FirstOrder => term,
            UnifyMode::HigherOrder => higher_order::head_normalize(&term, &self.subst),
        }
    }

    fn unify(&mut self, a: &Term, b: &Term) -> UnifyResult<()> {
        let a = self.resolve(a);
        let b = self.resolve(b);

        if a == b {
            return Ok(());
        }
        if !self.unifier.registry.are_compatible(a.ty(), b.ty()) {
            return Err(UnifyError::new(FailureReason::TypeMismatch {
                left: a.ty().clone(),
                right: b.ty().clone(),
            }));
        }

        match (&a, &b) {
            (Term::Variable(x), _) => self.bind(x, &b),
            (_, Term::Variable(y)) => self.bind(y, &a),

            (Term::Constant(c1), Term::Constant(c2)) => {
                if c1.name == c2.name {
                    Ok(())
                } else {
                    Err(UnifyError::structural(&a, &b, "different constants"))
                }
            }

            (
                Term::Application {
                    op: op1, args: args1, ..
                },
                Term::Application {
                    op: op2, args: args2, ..
                },
            ) => {
                if args1.len() != args2.len() {
                    return Err(UnifyError::structural(
                        &a,
                        &b,
                        format!("arity {} vs {}", args1.len(), args2.len()),
                    ));
                }
                self.unify(op1, op2)
                    .map_err(|e| e.within(TermKind::Application, 0))?;
                self.unify_seq(TermKind::Application, 1, args1, args2)
            }

            (
                Term::Connective {
                    kind: k1,
                    operands: o1,
                    ..
                },
                Term::Connective {
                    kind: k2,
                    operands: o2,
                    ..
                },
            ) => {
                if k1 != k2 {
                    return Err(UnifyError::structural(
                        &a,
                        &b,
                        format!("connective {k1} vs {k2}"),
                    ));
                }
                if o1.len() != o2.len() {
                    return Err(UnifyError::structural(
                        &a,
                        &b,
                        format!("{} vs {} operands", o1.len(), o2.len()),
                    ));
                }
                self.unify_seq(TermKind::Connective, 0, o1, o2)
            }

            (
                Term::Quantifier {
                    kind: k1,
                    bound: b1,
                    scope: s1,
                    ..
                },
                Term::Quantifier {
                    kind: k2,
                    bound: b2,
                    scope: s2,
                    ..
                },
            ) => {
                if k1 != k2 {
                    return Err(UnifyError::structural(
                        &a,
                        &b,
                        format!("quantifier {k1} vs {k2}"),
                    ));
                }
                self.unify_binders(&a, &b, b1, s1, b2, s2)
                    .map_err(|e| e.within(TermKind::Quantifier, 0))
            }

            (
                Term::Lambda {
                    bound: b1, body: s1, ..
                },
                Term::Lambda {
                    bound: b2, body: s2, ..
                },
            ) => self
                .unify_binders(&a, &b, b1, s1, b2, s2)
                .map_err(|e| e.within(TermKind::Lambda, 0)),

            (
                Term::Modal {
                    op: m1,
                    agent: ag1,
                    proposition: p1,
                    ..
                },
                Term::Modal {
                    op: m2,
                    agent: ag2,
                    proposition: p2,
                    ..
                },
            ) => {
                if m1 != m2 {
                    return Err(UnifyError::structural(
                        &a,
                        &b,
                        format!("modal {m1} vs {m2}"),
                    ));
                }
                match (ag1, ag2) {
                    (Some(x), Some(y)) => self
                        .unify(x, y)
                        .map_err(|e| e.within(TermKind::Modal, 0))?,
                    (None, None) => {}
                    _ => {
                        return Err(UnifyError::structural(
                            &a,
                            &b,
                            "agent present on one side only",
                        ));
                    }
                }
                self.unify(p1, p2)
                    .map_err(|e| e.within(TermKind::Modal, 1))
            }

            (
                Term::Definition {
                    symbol: n1,
                    body: d1,
                    ..
                },
                Term::Definition {
                    symbol: n2,
                    body: d2,
                    ..
                },
            ) => {
                if n1 != n2 {
                    return Err(UnifyError::structural(&a, &b, "different defined symbols"));
                }
                self.unify(d1, d2)
                    .map_err(|e| e.within(TermKind::Definition, 0))
            }

            _ => Err(UnifyError::new(FailureReason::NodeKindMismatch {
                left: a.kind(),
                right: b.kind(),
            })),
        }
    }

    fn unify_seq(
        &mut self,
        kind: TermKind,
        offset: usize,
        left: &[Term],
        right: &[Term],
    ) -> UnifyResult<()> {
        for (i, (l, r)) in left.iter().zip(right).enumerate() {
            self.unify(l, r).map_err(|e| e.within(kind, offset + i))?;
        }
        Ok(())
    }

    /// Alpha-convert both binders to shared rigid fresh variables and unify
    /// the bodies.
    fn unify_binders(
        &mut self,
        a: &Term,
        b: &Term,
        left_bound: &[Var],
        left_body: &Term,
        right_bound: &[Var],
        right_body: &Term,
    ) -> UnifyResult<()> {
        if left_bound.len() != right_bound.len() {
            return Err(UnifyError::structural(
                a,
                b,
                format!(
                    "{} vs {} bound variables",
                    left_bound.len(),
                    right_bound.len()
                ),
            ));
        }

        let mut left_map = Substitution::new();
        let mut right_map = Substitution::new();
        for (lv, rv) in left_bound.iter().zip(right_bound) {
            if !self.unifier.registry.are_compatible(&lv.ty, &rv.ty) {
                return Err(UnifyError::new(FailureReason::TypeMismatch {
                    left: lv.ty.clone(),
                    right: rv.ty.clone(),
                }));
            }
            let fresh = lv.renamed(self.unifier.vars.fresh());
            self.rigid.insert(fresh.id);
            left_map.insert(lv.clone(), Term::var(fresh.clone()));
            right_map.insert(rv.clone(), Term::var(fresh));
        }

        let left_body = substitute(left_body, &left_map);
        let right_body = substitute(right_body, &right_map);
        self.unify(&left_body, &right_body)
    }

    fn bind(&mut self, var: &Var, value: &Term) -> UnifyResult<()> {
        let var_term = Term::var(var.clone());
        if self.rigid.contains(&var.id) {
            return Err(UnifyError::structural(
                &var_term,
                value,
                "bound variable cannot be instantiated",
            ));
        }
        let value = self.subst.apply(value);
        if value.free_vars().iter().any(|id| self.rigid.contains(id)) {
            return Err(UnifyError::structural(
                &var_term,
                &value,
                "bound variable would escape its scope",
            ));
        }
        if self.unifier.mode == UnifyMode::FirstOrder && self.subst.occurs(var.id, &value) {
            return Err(UnifyError::new(FailureReason::OccursCheck {
                var: var.clone(),
                term: value,
            }));
        }
        self.subst.bind(var.clone(), value);
        Ok(())
    }
}
