//! Human-readable rendering of terms and substitutions.
//!
//! Variables print as `?name`, applications as `Op(a, b)`, connectives with
//! their logical symbols. The output is for logs, diagnostics and the CLI; it
//! is not a parseable concrete syntax.

use std::fmt;

use super::{ConnectiveKind, Constant, Literal, ModalKind, QuantifierKind, Substitution, Term, Var};

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Literal::Integer(n) => write!(f, "{n}"),
            Literal::Boolean(b) => write!(f, "{b}"),
            Literal::String(s) => write!(f, "{s:?}"),
        }
    }
}

impl fmt::Display for Constant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

impl fmt::Display for Var {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "?{}", self.name)
    }
}

fn connective_symbol(kind: ConnectiveKind) -> &'static str {
    match kind {
        ConnectiveKind::And => "∧",
        ConnectiveKind::Or => "∨",
        ConnectiveKind::Not => "¬",
        ConnectiveKind::Implies => "⇒",
        ConnectiveKind::Equiv => "⇔",
    }
}

fn modal_symbol(kind: ModalKind) -> &'static str {
    match kind {
        ModalKind::Knows => "K",
        ModalKind::Believes => "B",
        ModalKind::Possible => "◇",
        ModalKind::Necessary => "□",
        ModalKind::Obligatory => "O",
        ModalKind::Permitted => "P",
    }
}

fn write_binder(f: &mut fmt::Formatter<'_>, symbol: &str, bound: &[Var], body: &Term) -> fmt::Result {
    f.write_str(symbol)?;
    for (i, v) in bound.iter().enumerate() {
        if i > 0 {
            f.write_str(" ")?;
        }
        write!(f, "{v}")?;
    }
    write!(f, ". {body}")
}

impl fmt::Display for Term {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Term::Constant(c) => write!(f, "{c}"),
            Term::Variable(v) => write!(f, "{v}"),
            Term::Application { op, args, .. } => {
                // Non-constant operators are parenthesized so `(λ?x. ..)(a)` reads right.
                match op.as_ref() {
                    Term::Constant(_) | Term::Variable(_) => write!(f, "{op}(")?,
                    _ => write!(f, "({op})(")?,
                }
                for (i, a) in args.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{a}")?;
                }
                f.write_str(")")
            }
            Term::Connective { kind, operands, .. } => {
                let sym = connective_symbol(*kind);
                if *kind == ConnectiveKind::Not {
                    return write!(f, "{sym}{}", operands[0]);
                }
                f.write_str("(")?;
                for (i, o) in operands.iter().enumerate() {
                    if i > 0 {
                        write!(f, " {sym} ")?;
                    }
                    write!(f, "{o}")?;
                }
                f.write_str(")")
            }
            Term::Quantifier {
                kind, bound, scope, ..
            } => {
                let sym = match kind {
                    QuantifierKind::ForAll => "∀",
                    QuantifierKind::Exists => "∃",
                };
                write_binder(f, sym, bound, scope)
            }
            Term::Lambda { bound, body, .. } => write_binder(f, "λ", bound, body),
            Term::Modal {
                op,
                agent,
                proposition,
                ..
            } => {
                let sym = modal_symbol(*op);
                match agent {
                    Some(a) => write!(f, "{sym}[{a}] {proposition}"),
                    None => write!(f, "{sym} {proposition}"),
                }
            }
            Term::Definition {
                symbol,
                symbol_ty,
                body,
            } => write!(f, "{symbol} : {symbol_ty} := {body}"),
        }
    }
}

impl fmt::Display for Substitution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("{")?;
        for (i, b) in self.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{} ↦ {}", b.var, b.value)?;
        }
        f.write_str("}")
    }
}
