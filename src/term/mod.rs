//! Typed, immutable syntax trees for logical formulas.
//!
//! A [`Term`] is a closed sum type: every traversal (substitution, occurs check,
//! unification, indexing) matches on it exhaustively, so adding a node kind
//! forces every traversal to be updated. Children are `Arc`-shared, which makes
//! cloning a term cheap and lets any number of contexts hold the same statement
//! without copying it.
//!
//! Constructors validate structural well-formedness (arity against the operator's
//! signature, connective operand counts, non-empty binders) but perform no type
//! inference; that is the caller's job.

pub mod display;
pub mod subst;

use std::collections::{BTreeSet, HashSet};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::{TypeError, TypeResult};
use crate::symbol::VarId;
use crate::types::{Ty, TypeRegistry};

pub use subst::{Substitution, substitute};

// ---------------------------------------------------------------------------
// Leaves
// ---------------------------------------------------------------------------

/// A literal value carried by a constant.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Literal {
    Integer(i64),
    Boolean(bool),
    String(String),
}

/// A named constant symbol, possibly carrying a literal value.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Constant {
    pub name: Arc<str>,
    pub ty: Ty,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Literal>,
}

/// A logic variable.
///
/// Identity is the numeric id alone: equality and hashing ignore the display
/// name and the type.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Var {
    pub id: VarId,
    pub name: Arc<str>,
    pub ty: Ty,
}

impl Var {
    /// Create a variable.
    pub fn new(id: VarId, name: impl AsRef<str>, ty: Ty) -> Self {
        Self {
            id,
            name: Arc::from(name.as_ref()),
            ty,
        }
    }

    /// A copy of this variable with a different id (same name and type).
    pub fn renamed(&self, id: VarId) -> Self {
        Self {
            id,
            name: self.name.clone(),
            ty: self.ty.clone(),
        }
    }
}

impl PartialEq for Var {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Var {}

impl std::hash::Hash for Var {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

// ---------------------------------------------------------------------------
// Node tags
// ---------------------------------------------------------------------------

/// Propositional connectives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectiveKind {
    And,
    Or,
    Not,
    Implies,
    Equiv,
}

impl ConnectiveKind {
    pub(crate) fn check_operands(self, count: usize) -> TypeResult<()> {
        let (ok, expected) = match self {
            Self::Not => (count == 1, "1"),
            Self::Implies | Self::Equiv => (count == 2, "2"),
            Self::And | Self::Or => (count >= 2, "at least 2"),
        };
        if ok {
            Ok(())
        } else {
            Err(TypeError::OperandCount {
                connective: self.to_string(),
                expected: expected.into(),
                actual: count,
            })
        }
    }
}

impl std::fmt::Display for ConnectiveKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::And => write!(f, "and"),
            Self::Or => write!(f, "or"),
            Self::Not => write!(f, "not"),
            Self::Implies => write!(f, "implies"),
            Self::Equiv => write!(f, "equiv"),
        }
    }
}

/// Quantifier kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuantifierKind {
    ForAll,
    Exists,
}

impl std::fmt::Display for QuantifierKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ForAll => write!(f, "forall"),
            Self::Exists => write!(f, "exists"),
        }
    }
}

/// Modal operators. Epistemic operators normally carry an agent term,
/// alethic and deontic ones a world term or nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModalKind {
    Knows,
    Believes,
    Possible,
    Necessary,
    Obligatory,
    Permitted,
}

impl std::fmt::Display for ModalKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Knows => write!(f, "knows"),
            Self::Believes => write!(f, "believes"),
            Self::Possible => write!(f, "possible"),
            Self::Necessary => write!(f, "necessary"),
            Self::Obligatory => write!(f, "obligatory"),
            Self::Permitted => write!(f, "permitted"),
        }
    }
}

/// Payload-free discriminant of a [`Term`], used in failure reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TermKind {
    Constant,
    Variable,
    Application,
    Connective,
    Quantifier,
    Modal,
    Lambda,
    Definition,
}

impl std::fmt::Display for TermKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Constant => "constant",
            Self::Variable => "variable",
            Self::Application => "application",
            Self::Connective => "connective",
            Self::Quantifier => "quantifier",
            Self::Modal => "modal",
            Self::Lambda => "lambda",
            Self::Definition => "definition",
        };
        f.write_str(s)
    }
}

// ---------------------------------------------------------------------------
// Term
// ---------------------------------------------------------------------------

/// A typed logical term.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Term {
    Constant(Constant),
    Variable(Var),
    Application {
        op: Arc<Term>,
        args: Arc<[Term]>,
        ty: Ty,
    },
    Connective {
        kind: ConnectiveKind,
        operands: Arc<[Term]>,
        ty: Ty,
    },
    Quantifier {
        kind: QuantifierKind,
        bound: Arc<[Var]>,
        scope: Arc<Term>,
        ty: Ty,
    },
    Modal {
        op: ModalKind,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        agent: Option<Arc<Term>>,
        proposition: Arc<Term>,
        ty: Ty,
    },
    Lambda {
        bound: Arc<[Var]>,
        body: Arc<Term>,
        ty: Ty,
    },
    Definition {
        symbol: Arc<str>,
        symbol_ty: Ty,
        body: Arc<Term>,
    },
}

impl Term {
    // -- constructors -------------------------------------------------------

    /// A constant without a literal value.
    pub fn constant(name: impl AsRef<str>, ty: Ty) -> Self {
        Term::Constant(Constant {
            name: Arc::from(name.as_ref()),
            ty,
            value: None,
        })
    }

    /// A constant carrying a literal value.
    pub fn literal(name: impl AsRef<str>, ty: Ty, value: Literal) -> Self {
        Term::Constant(Constant {
            name: Arc::from(name.as_ref()),
            ty,
            value: Some(value),
        })
    }

    /// A variable term.
    pub fn var(var: Var) -> Self {
        Term::Variable(var)
    }

    /// Apply `op` to `args`.
    ///
    /// The operator's type must carry a signature whose arity matches; the
    /// application's type is the signature's return type.
    pub fn apply(registry: &TypeRegistry, op: Term, args: Vec<Term>) -> TypeResult<Self> {
        let op_ty = op.ty().clone();
        let Some(sig) = registry.signature_of(&op_ty) else {
            if registry.contains(&op_ty) {
                return Err(TypeError::NotAFunction {
                    operator: op.to_string(),
                    ty: op_ty.to_string(),
                });
            }
            return Err(TypeError::UnknownType {
                name: op_ty.to_string(),
            });
        };
        if sig.arity() != args.len() {
            return Err(TypeError::ArityMismatch {
                operator: op.to_string(),
                expected: sig.arity(),
                actual: args.len(),
            });
        }
        Ok(Term::Application {
            op: Arc::new(op),
            args: args.into(),
            ty: sig.returns,
        })
    }

    /// A connective over `operands`, checking the operand count.
    pub fn connective(kind: ConnectiveKind, operands: Vec<Term>) -> TypeResult<Self> {
        kind.check_operands(operands.len())?;
        Ok(Term::Connective {
            kind,
            operands: operands.into(),
            ty: Ty::boolean(),
        })
    }

    /// `¬p`.
    pub fn not(p: Term) -> Self {
        Term::Connective {
            kind: ConnectiveKind::Not,
            operands: Arc::from(vec![p]),
            ty: Ty::boolean(),
        }
    }

    /// `p ⇒ q`.
    pub fn implies(p: Term, q: Term) -> Self {
        Term::Connective {
            kind: ConnectiveKind::Implies,
            operands: Arc::from(vec![p, q]),
            ty: Ty::boolean(),
        }
    }

    /// `p ⇔ q`.
    pub fn equiv(p: Term, q: Term) -> Self {
        Term::Connective {
            kind: ConnectiveKind::Equiv,
            operands: Arc::from(vec![p, q]),
            ty: Ty::boolean(),
        }
    }

    /// A quantified formula.
    pub fn quantifier(kind: QuantifierKind, bound: Vec<Var>, scope: Term) -> TypeResult<Self> {
        if bound.is_empty() {
            return Err(TypeError::EmptyBinder);
        }
        Ok(Term::Quantifier {
            kind,
            bound: bound.into(),
            scope: Arc::new(scope),
            ty: Ty::boolean(),
        })
    }

    /// `∀ bound. scope`.
    pub fn forall(bound: Vec<Var>, scope: Term) -> TypeResult<Self> {
        Self::quantifier(QuantifierKind::ForAll, bound, scope)
    }

    /// `∃ bound. scope`.
    pub fn exists(bound: Vec<Var>, scope: Term) -> TypeResult<Self> {
        Self::quantifier(QuantifierKind::Exists, bound, scope)
    }

    /// A modal formula with an optional agent or world term.
    pub fn modal(op: ModalKind, agent: Option<Term>, proposition: Term) -> Self {
        Term::Modal {
            op,
            agent: agent.map(Arc::new),
            proposition: Arc::new(proposition),
            ty: Ty::boolean(),
        }
    }

    /// `λ bound. body` with a caller-supplied function type.
    pub fn lambda(bound: Vec<Var>, body: Term, ty: Ty) -> TypeResult<Self> {
        if bound.is_empty() {
            return Err(TypeError::EmptyBinder);
        }
        Ok(Term::Lambda {
            bound: bound.into(),
            body: Arc::new(body),
            ty,
        })
    }

    /// A definition of `symbol : symbol_ty` by `body`.
    pub fn definition(symbol: impl AsRef<str>, symbol_ty: Ty, body: Term) -> Self {
        Term::Definition {
            symbol: Arc::from(symbol.as_ref()),
            symbol_ty,
            body: Arc::new(body),
        }
    }

    // -- accessors ----------------------------------------------------------

    /// The declared type of this term.
    pub fn ty(&self) -> &Ty {
        match self {
            Term::Constant(c) => &c.ty,
            Term::Variable(v) => &v.ty,
            Term::Application { ty, .. }
            | Term::Connective { ty, .. }
            | Term::Quantifier { ty, .. }
            | Term::Modal { ty, .. }
            | Term::Lambda { ty, .. } => ty,
            Term::Definition { symbol_ty, .. } => symbol_ty,
        }
    }

    /// The node kind.
    pub fn kind(&self) -> TermKind {
        match self {
            Term::Constant(_) => TermKind::Constant,
            Term::Variable(_) => TermKind::Variable,
            Term::Application { .. } => TermKind::Application,
            Term::Connective { .. } => TermKind::Connective,
            Term::Quantifier { .. } => TermKind::Quantifier,
            Term::Modal { .. } => TermKind::Modal,
            Term::Lambda { .. } => TermKind::Lambda,
            Term::Definition { .. } => TermKind::Definition,
        }
    }

    /// The variable, if this term is one.
    pub fn as_var(&self) -> Option<&Var> {
        match self {
            Term::Variable(v) => Some(v),
            _ => None,
        }
    }

    /// Name of the head predicate, if this is an application of a named constant.
    pub fn predicate_name(&self) -> Option<&str> {
        match self {
            Term::Application { op, .. } => match op.as_ref() {
                Term::Constant(c) => Some(&c.name),
                _ => None,
            },
            _ => None,
        }
    }

    /// `(antecedent, consequent)` if this is an implication.
    pub fn as_implication(&self) -> Option<(&Term, &Term)> {
        match self {
            Term::Connective {
                kind: ConnectiveKind::Implies,
                operands,
                ..
            } => Some((&operands[0], &operands[1])),
            _ => None,
        }
    }

    /// The negated operand, if this is a negation.
    pub fn negated(&self) -> Option<&Term> {
        match self {
            Term::Connective {
                kind: ConnectiveKind::Not,
                operands,
                ..
            } => Some(&operands[0]),
            _ => None,
        }
    }

    /// The logical negation: strips a leading `¬`, otherwise wraps in one.
    pub fn negate(&self) -> Term {
        match self.negated() {
            Some(inner) => inner.clone(),
            None => Term::not(self.clone()),
        }
    }

    /// Whether one of `self`, `other` is syntactically the negation of the other.
    pub fn is_negation_of(&self, other: &Term) -> bool {
        self.negated() == Some(other) || other.negated() == Some(self)
    }

    // -- traversals ---------------------------------------------------------

    /// Ids of the variables occurring free in this term.
    pub fn free_vars(&self) -> HashSet<VarId> {
        self.free_variables().into_iter().map(|v| v.id).collect()
    }

    /// The variables occurring free in this term, in first-occurrence order.
    pub fn free_variables(&self) -> Vec<Var> {
        let mut out = Vec::new();
        let mut bound = Vec::new();
        self.collect_free(&mut bound, &mut out);
        out
    }

    fn collect_free(&self, bound: &mut Vec<VarId>, out: &mut Vec<Var>) {
        match self {
            Term::Constant(_) => {}
            Term::Variable(v) => {
                if !bound.contains(&v.id) && !out.contains(v) {
                    out.push(v.clone());
                }
            }
            Term::Application { op, args, .. } => {
                op.collect_free(bound, out);
                for a in args.iter() {
                    a.collect_free(bound, out);
                }
            }
            Term::Connective { operands, .. } => {
                for o in operands.iter() {
                    o.collect_free(bound, out);
                }
            }
            Term::Quantifier {
                bound: vars, scope, ..
            } => {
                let depth = bound.len();
                bound.extend(vars.iter().map(|v| v.id));
                scope.collect_free(bound, out);
                bound.truncate(depth);
            }
            Term::Lambda {
                bound: vars, body, ..
            } => {
                let depth = bound.len();
                bound.extend(vars.iter().map(|v| v.id));
                body.collect_free(bound, out);
                bound.truncate(depth);
            }
            Term::Modal {
                agent, proposition, ..
            } => {
                if let Some(a) = agent {
                    a.collect_free(bound, out);
                }
                proposition.collect_free(bound, out);
            }
            Term::Definition { body, .. } => body.collect_free(bound, out),
        }
    }

    /// Whether the variable `id` occurs free in this term.
    pub fn occurs_free(&self, id: VarId) -> bool {
        self.free_vars().contains(&id)
    }

    /// Whether the term has no free variables.
    pub fn is_ground(&self) -> bool {
        self.free_vars().is_empty()
    }

    /// Names of every constant occurring anywhere in the term, including
    /// operator constants and defined symbols.
    pub fn constants(&self) -> BTreeSet<Arc<str>> {
        let mut out = BTreeSet::new();
        self.collect_constants(&mut out);
        out
    }

    fn collect_constants(&self, out: &mut BTreeSet<Arc<str>>) {
        match self {
            Term::Constant(c) => {
                out.insert(c.name.clone());
            }
            Term::Variable(_) => {}
            Term::Application { op, args, .. } => {
                op.collect_constants(out);
                for a in args.iter() {
                    a.collect_constants(out);
                }
            }
            Term::Connective { operands, .. } => {
                for o in operands.iter() {
                    o.collect_constants(out);
                }
            }
            Term::Quantifier { scope, .. } => scope.collect_constants(out),
            Term::Lambda { body, .. } => body.collect_constants(out),
            Term::Modal {
                agent, proposition, ..
            } => {
                if let Some(a) = agent {
                    a.collect_constants(out);
                }
                proposition.collect_constants(out);
            }
            Term::Definition { symbol, body, .. } => {
                out.insert(symbol.clone());
                body.collect_constants(out);
            }
        }
    }

    /// Number of nodes in the tree.
    pub fn size(&self) -> usize {
        match self {
            Term::Constant(_) | Term::Variable(_) => 1,
            Term::Application { op, args, .. } => {
                1 + op.size() + args.iter().map(Term::size).sum::<usize>()
            }
            Term::Connective { operands, .. } => {
                1 + operands.iter().map(Term::size).sum::<usize>()
            }
            Term::Quantifier { bound, scope, .. } => 1 + bound.len() + scope.size(),
            Term::Lambda { bound, body, .. } => 1 + bound.len() + body.size(),
            Term::Modal {
                agent, proposition, ..
            } => 1 + agent.as_ref().map_or(0, |a| a.size()) + proposition.size(),
            Term::Definition { body, .. } => 1 + body.size(),
        }
    }
}


#[cfg(test)]
mod tests {
    use super::fixtures::*;
    use super::*;

    #[test]
    fn application_takes_signature_return_type() {
        let reg = registry();
        let t = rel(&reg, "Father", person("john"), person("bob"));
        assert_eq!(t.ty(), &Ty::boolean());
        assert_eq!(t.predicate_name(), Some("Father"));
        assert_eq!(t.kind(), TermKind::Application);
    }

    #[test]
    fn application_checks_arity_and_signature() {
        let reg = registry();
        let father = Term::constant("Father", Ty::new("Rel2"));
        let err = Term::apply(&reg, father, vec![person("john")]).unwrap_err();
        assert!(matches!(
            err,
            TypeError::ArityMismatch {
                expected: 2,
                actual: 1,
                ..
            }
        ));

        let err = Term::apply(&reg, person("john"), vec![]).unwrap_err();
        assert!(matches!(err, TypeError::NotAFunction { .. }));

        let ghost = Term::constant("f", Ty::new("Ghost"));
        let err = Term::apply(&reg, ghost, vec![]).unwrap_err();
        assert!(matches!(err, TypeError::UnknownType { .. }));
    }

    #[test]
    fn connective_operand_counts() {
        assert!(Term::connective(ConnectiveKind::And, vec![person("a")]).is_err());
        assert!(
            Term::connective(ConnectiveKind::Not, vec![person("a"), person("b")]).is_err()
        );
        assert!(Term::connective(ConnectiveKind::Or, vec![person("a"), person("b")]).is_ok());
        assert!(Term::forall(vec![], person("a")).is_err());
    }

    #[test]
    fn variable_identity_is_the_id() {
        let a = Var::new(VarId::new(1).unwrap(), "x", Ty::entity());
        let b = Var::new(VarId::new(1).unwrap(), "y", Ty::new("Person"));
        let c = Var::new(VarId::new(2).unwrap(), "x", Ty::entity());
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(Term::var(a), Term::var(b));
    }

    #[test]
    fn free_vars_respect_binders() {
        let reg = registry();
        let x = var(1, "x");
        let body = rel(&reg, "Loves", Term::var(x.clone()), v(2, "y"));
        let q = Term::forall(vec![x], body).unwrap();
        let free = q.free_vars();
        assert_eq!(free.len(), 1);
        assert!(free.contains(&VarId::new(2).unwrap()));
        assert!(!q.is_ground());
    }

    #[test]
    fn negation_helpers() {
        let reg = registry();
        let p = rel(&reg, "Father", person("john"), person("bob"));
        let np = p.negate();
        assert_eq!(np.negated(), Some(&p));
        assert_eq!(np.negate(), p);
        assert!(np.is_negation_of(&p));
        assert!(p.is_negation_of(&np));
        assert!(!p.is_negation_of(&p));
    }

    #[test]
    fn constants_include_operators() {
        let reg = registry();
        let t = rel(&reg, "Father", person("john"), v(1, "y"));
        let names: Vec<String> = t.constants().iter().map(|c| c.to_string()).collect();
        assert_eq!(names, vec!["Father", "john"]);
        assert_eq!(t.size(), 4);
    }

    #[test]
    fn terms_round_trip_through_json() {
        let reg = registry();
        let t = Term::forall(
            vec![var(1, "x")],
            Term::implies(
                rel(&reg, "Father", v(1, "x"), person("bob")),
                rel(&reg, "Parent", v(1, "x"), person("bob")),
            ),
        )
        .unwrap();
        let json = serde_json::to_string(&t).unwrap();
        let back: Term = serde_json::from_str(&json).unwrap();
        assert_eq!(back, t);
    }
}
