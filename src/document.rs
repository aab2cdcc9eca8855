//! JSON knowledge documents: type declarations plus contexts of statements.
//!
//! A document is the only way knowledge enters or leaves the engine through
//! I/O. Loading installs types first (in dependency order), then creates each
//! context atomically with its statements. Contexts must be listed after
//! their parents. Deserialized terms are re-checked against the registry
//! before anything is stored.

use std::path::Path;

use miette::Diagnostic;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::engine::Engine;
use crate::error::{KbError, TypeError, TypeResult};
use crate::kb::{ContextKind, Statement};
use crate::term::Term;
use crate::types::{BOOLEAN, ENTITY, INTEGER, STRING, TypeRegistry};

/// Errors from reading, writing or installing a document.
#[derive(Debug, Error, Diagnostic)]
pub enum DocumentError {
    #[error("failed to read document: {path}")]
    #[diagnostic(
        code(maat::document::read),
        help("Ensure the file exists and is readable.")
    )]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse document: {path}: {message}")]
    #[diagnostic(
        code(maat::document::parse),
        help("Documents are JSON objects with optional `types`, `signatures` and `contexts` arrays.")
    )]
    Parse { path: String, message: String },

    #[error("failed to write document: {path}")]
    #[diagnostic(
        code(maat::document::write),
        help("Ensure you have write permissions to the target directory.")
    )]
    Write {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("ill-typed statement in context {context}: {term}")]
    #[diagnostic(
        code(maat::document::ill_typed),
        help("Every operator must have a declared signature whose arity matches its arguments.")
    )]
    IllTyped {
        context: String,
        term: String,
        #[source]
        source: TypeError,
    },

    #[error(transparent)]
    #[diagnostic(transparent)]
    Type(#[from] TypeError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Kb(#[from] KbError),
}

pub type DocumentResult<T> = std::result::Result<T, DocumentError>;

/// An atomic type declaration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeDecl {
    pub name: String,
    #[serde(default)]
    pub supertypes: Vec<String>,
}

/// A function signature declaration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignatureDecl {
    pub name: String,
    #[serde(default)]
    pub params: Vec<String>,
    pub returns: String,
}

/// One context and its statements.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContextDoc {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<String>,
    #[serde(default)]
    pub kind: ContextKind,
    #[serde(default)]
    pub statements: Vec<Statement>,
}

/// A complete knowledge document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct KbDocument {
    #[serde(default)]
    pub types: Vec<TypeDecl>,
    #[serde(default)]
    pub signatures: Vec<SignatureDecl>,
    #[serde(default)]
    pub contexts: Vec<ContextDoc>,
}

/// What [`KbDocument::install`] added.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoadSummary {
    pub types: usize,
    pub contexts: usize,
    pub statements: usize,
}

impl KbDocument {
    pub fn from_json(json: &str) -> DocumentResult<Self> {
        serde_json::from_str(json).map_err(|e| DocumentError::Parse {
            path: "<inline>".into(),
            message: e.to_string(),
        })
    }

    pub fn to_json(&self) -> DocumentResult<String> {
        serde_json::to_string_pretty(self).map_err(|e| DocumentError::Parse {
            path: "<inline>".into(),
            message: e.to_string(),
        })
    }

    /// Read a document from a JSON file.
    pub fn load(path: &Path) -> DocumentResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| DocumentError::Read {
            path: path.display().to_string(),
            source: e,
        })?;
        serde_json::from_str(&content).map_err(|e| DocumentError::Parse {
            path: path.display().to_string(),
            message: e.to_string(),
        })
    }

    /// Write as pretty JSON, creating parent directories.
    pub fn save(&self, path: &Path) -> DocumentResult<()> {
        let content = self.to_json()?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| DocumentError::Write {
                path: parent.display().to_string(),
                source: e,
            })?;
        }
        std::fs::write(path, content).map_err(|e| DocumentError::Write {
            path: path.display().to_string(),
            source: e,
        })
    }

    /// Install into `engine`. Types already declared are left as they are.
    pub fn install(&self, engine: &Engine) -> DocumentResult<LoadSummary> {
        let registry = engine.registry();
        let mut summary = LoadSummary::default();

        let atomics: Vec<&TypeDecl> = self
            .types
            .iter()
            .filter(|d| registry.get_type(&d.name).is_none())
            .collect();
        summary.types += define_in_order(atomics, |d| {
            let supers: Vec<&str> = d.supertypes.iter().map(String::as_str).collect();
            registry.define_atomic_type(&d.name, &supers).map(|_| ())
        })?;
        let signatures: Vec<&SignatureDecl> = self
            .signatures
            .iter()
            .filter(|d| registry.get_type(&d.name).is_none())
            .collect();
        summary.types += define_in_order(signatures, |d| {
            let params: Vec<&str> = d.params.iter().map(String::as_str).collect();
            registry
                .define_function_signature(&d.name, &params, &d.returns)
                .map(|_| ())
        })?;

        for ctx in &self.contexts {
            for s in &ctx.statements {
                check_term(registry, &s.term).map_err(|source| DocumentError::IllTyped {
                    context: ctx.id.clone(),
                    term: s.term.to_string(),
                    source,
                })?;
            }
        }
        for ctx in &self.contexts {
            let stored = engine.store().create_context_with_statements(
                &ctx.id,
                ctx.parent.as_deref(),
                ctx.kind,
                ctx.statements.clone(),
            )?;
            summary.contexts += 1;
            summary.statements += stored;
        }

        tracing::info!(
            types = summary.types,
            contexts = summary.contexts,
            statements = summary.statements,
            "document installed"
        );
        Ok(summary)
    }

    /// Snapshot the declared types and every context of `engine`.
    ///
    /// Contexts are ordered so that each follows its parent.
    pub fn capture(engine: &Engine) -> DocumentResult<Self> {
        let mut doc = Self::default();
        for def in engine.registry().all() {
            if [ENTITY, BOOLEAN, INTEGER, STRING].contains(&def.name.name()) {
                continue;
            }
            match def.signature {
                Some(sig) => doc.signatures.push(SignatureDecl {
                    name: def.name.to_string(),
                    params: sig.params.iter().map(|p| p.to_string()).collect(),
                    returns: sig.returns.to_string(),
                }),
                None => doc.types.push(TypeDecl {
                    name: def.name.to_string(),
                    supertypes: def.supertypes.iter().map(|s| s.to_string()).collect(),
                }),
            }
        }

        let mut pending = engine.contexts();
        let mut emitted: Vec<String> = Vec::new();
        while !pending.is_empty() {
            let (ready, rest): (Vec<_>, Vec<_>) = pending.into_iter().partition(|c| {
                c.parent
                    .as_ref()
                    .is_none_or(|p| emitted.iter().any(|e| e == p))
            });
            if ready.is_empty() {
                // Parent outside the store; emit the rest as they are.
                emitted.extend(rest.iter().map(|c| c.id.clone()));
                for info in rest {
                    doc.contexts.push(capture_context(engine, info)?);
                }
                break;
            }
            for info in ready {
                emitted.push(info.id.clone());
                doc.contexts.push(capture_context(engine, info)?);
            }
            pending = rest;
        }
        Ok(doc)
    }
}

fn capture_context(engine: &Engine, info: crate::kb::ContextInfo) -> DocumentResult<ContextDoc> {
    Ok(ContextDoc {
        statements: engine.store().statements_in(&info.id)?,
        id: info.id,
        parent: info.parent,
        kind: info.kind,
    })
}

/// Define `items` in an order satisfying their references to each other.
///
/// Items whose references are unknown are retried after each pass that made
/// progress; the first error of a pass without progress is returned.
fn define_in_order<T>(mut items: Vec<T>, define: impl Fn(&T) -> TypeResult<()>) -> TypeResult<usize> {
    let mut defined = 0;
    while !items.is_empty() {
        let before = defined;
        let mut failed = Vec::new();
        let mut first_error = None;
        for item in items {
            match define(&item) {
                Ok(()) => defined += 1,
                Err(e @ TypeError::UnknownType { .. }) => {
                    first_error.get_or_insert(e);
                    failed.push(item);
                }
                Err(e) => return Err(e),
            }
        }
        match first_error {
            Some(err) if defined == before => return Err(err),
            _ => items = failed,
        }
    }
    Ok(defined)
}

/// Re-check every application in `term` against `registry`.
pub fn check_term(registry: &TypeRegistry, term: &Term) -> TypeResult<()> {
    match term {
        Term::Constant(_) | Term::Variable(_) => Ok(()),
        Term::Application { op, args, ty } => {
            check_term(registry, op)?;
            for a in args.iter() {
                check_term(registry, a)?;
            }
            let rebuilt = Term::apply(registry, (**op).clone(), args.to_vec())?;
            if rebuilt.ty() != ty {
                return Err(TypeError::ReturnTypeMismatch {
                    operator: op.to_string(),
                    expected: rebuilt.ty().to_string(),
                    actual: ty.to_string(),
                });
            }
            Ok(())
        }
        Term::Connective { kind, operands, .. } => {
            kind.check_operands(operands.len())?;
            operands.iter().try_for_each(|o| check_term(registry, o))
        }
        Term::Quantifier { scope, .. } => check_term(registry, scope),
        Term::Modal {
            agent, proposition, ..
        } => {
            if let Some(a) = agent {
                check_term(registry, a)?;
            }
            check_term(registry, proposition)
        }
        Term::Lambda { body, .. } => check_term(registry, body),
        Term::Definition { body, .. } => check_term(registry, body),
    }
}
