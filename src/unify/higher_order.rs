//! Beta and eta normalization for higher-order unification.
//!
//! Only the head of a term is normalized here; the unifier recurses into
//! children itself and normalizes each one as it gets there.

use std::sync::Arc;

use crate::term::{Substitution, Term, substitute};

/// Upper bound on successive head reductions, so self-applicative terms
/// cannot loop forever.
const MAX_HEAD_STEPS: usize = 64;

/// One beta step: `(λx₁..xₙ. body)(a₁..aₙ)` becomes `body[xᵢ ↦ aᵢ]`.
///
/// Returns `None` unless `term` is a redex with a lambda operator whose bound
/// variable count equals the argument count.
pub fn beta_reduce(term: &Term) -> Option<Term> {
    let Term::Application { op, args, .. } = term else {
        return None;
    };
    let Term::Lambda { bound, body, .. } = op.as_ref() else {
        return None;
    };
    if bound.len() != args.len() {
        return None;
    }
    let mut mapping = Substitution::new();
    for (v, a) in bound.iter().zip(args.iter()) {
        mapping.insert(v.clone(), a.clone());
    }
    Some(substitute(body, &mapping))
}

/// One eta step: `λx₁..xₙ. f(x₁..xₙ)` becomes `f` when no `xᵢ` is free in `f`.
pub fn eta_reduce(term: &Term) -> Option<Term> {
    let Term::Lambda { bound, body, .. } = term else {
        return None;
    };
    let Term::Application { op, args, .. } = body.as_ref() else {
        return None;
    };
    if args.len() != bound.len() {
        return None;
    }
    let args_are_bound = bound
        .iter()
        .zip(args.iter())
        .all(|(v, a)| a.as_var().is_some_and(|av| av.id == v.id));
    if !args_are_bound || bound.iter().any(|v| op.occurs_free(v.id)) {
        return None;
    }
    Some(Term::clone(op))
}

/// Reduce the head of `term` until it is neither a beta- nor an eta-redex.
///
/// A variable in operator position is looked up in `bindings` first, so a
/// variable bound to a lambda exposes the redex.
pub fn head_normalize(term: &Term, bindings: &Substitution) -> Term {
    let mut current = term.clone();
    for _ in 0..MAX_HEAD_STEPS {
        let exposed = expose_operator(&current, bindings);
        let next = beta_reduce(&exposed).or_else(|| eta_reduce(&exposed));
        match next {
            Some(reduced) => current = bindings.walk(&reduced),
            None => return exposed,
        }
    }
    current
}

fn expose_operator(term: &Term, bindings: &Substitution) -> Term {
    match term {
        Term::Application { op, args, ty } if op.as_var().is_some() => {
            let resolved = bindings.walk(op);
            if matches!(resolved, Term::Lambda { .. }) {
                Term::Application {
                    op: Arc::new(resolved),
                    args: args.clone(),
                    ty: ty.clone(),
                }
            } else {
                term.clone()
            }
        }
        _ => term.clone(),
    }
}
