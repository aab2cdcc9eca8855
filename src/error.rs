//! Rich diagnostic error types for the akh-maat reasoning core.
//!
//! Each subsystem defines its own error type with miette `#[diagnostic]` derives,
//! providing error codes, help text, and source chains. Unification failures are
//! ordinary values ([`UnifyError`]) that callers inspect and recover from; the
//! store and revision errors are raised at the call boundary before any mutation.

use miette::Diagnostic;
use thiserror::Error;

use crate::document::DocumentError;
use crate::unify::UnifyError;

/// Top-level error type for the akh-maat engine.
///
/// Each variant wraps a subsystem-specific error, preserving the full diagnostic
/// chain (error codes, help text) through to the user.
#[derive(Debug, Error, Diagnostic)]
pub enum MaatError {
    #[error(transparent)]
    #[diagnostic(transparent)]
    Type(#[from] TypeError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Unify(#[from] UnifyError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Kb(#[from] KbError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Revision(#[from] RevisionError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Document(#[from] DocumentError),
}

// ---------------------------------------------------------------------------
// Type errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum TypeError {
    #[error("unknown type: {name}")]
    #[diagnostic(
        code(maat::types::unknown),
        help(
            "The type has not been declared in this registry. \
             Declare it with `define_atomic_type()` or `define_function_signature()` first."
        )
    )]
    UnknownType { name: String },

    #[error("duplicate type: {name}")]
    #[diagnostic(
        code(maat::types::duplicate),
        help("Type names are unique within a registry. Pick a different name.")
    )]
    DuplicateType { name: String },

    #[error("arity mismatch for {operator}: signature takes {expected} argument(s), got {actual}")]
    #[diagnostic(
        code(maat::types::arity_mismatch),
        help("An application must supply exactly as many arguments as its operator's signature declares.")
    )]
    ArityMismatch {
        operator: String,
        expected: usize,
        actual: usize,
    },

    #[error("{operator} has type {ty}, which has no function signature")]
    #[diagnostic(
        code(maat::types::not_a_function),
        help(
            "Only terms whose type carries a signature can be applied. \
             Register one with `define_function_signature()`."
        )
    )]
    NotAFunction { operator: String, ty: String },

    #[error("connective {connective} takes {expected} operand(s), got {actual}")]
    #[diagnostic(
        code(maat::types::operand_count),
        help("`not` is unary, `implies` and `equiv` are binary, `and` and `or` need at least two operands.")
    )]
    OperandCount {
        connective: String,
        expected: String,
        actual: usize,
    },

    #[error("{operator} returns {expected}, but the term is annotated {actual}")]
    #[diagnostic(
        code(maat::types::return_type_mismatch),
        help("An application's type must be the return type of its operator's signature.")
    )]
    ReturnTypeMismatch {
        operator: String,
        expected: String,
        actual: String,
    },

    #[error("binder needs at least one bound variable")]
    #[diagnostic(
        code(maat::types::empty_binder),
        help("Quantifiers and lambdas must bind one or more variables.")
    )]
    EmptyBinder,
}

// ---------------------------------------------------------------------------
// Knowledge store errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum KbError {
    #[error("context not found: {id}")]
    #[diagnostic(
        code(maat::kb::context_not_found),
        help("No context with this id exists. Create it with `create_context()` first.")
    )]
    ContextNotFound { id: String },

    #[error("duplicate context: {id}")]
    #[diagnostic(
        code(maat::kb::duplicate_context),
        help("A context with this id already exists. Context ids are unique within a store.")
    )]
    DuplicateContext { id: String },

    #[error("context {id} is the parent of {child}")]
    #[diagnostic(
        code(maat::kb::context_has_children),
        help("Delete the child contexts first; provenance links may not dangle.")
    )]
    ContextHasChildren { id: String, child: String },

    #[error("statement {term} has type {ty}, not Boolean")]
    #[diagnostic(
        code(maat::kb::not_a_proposition),
        help("Only Boolean-typed terms can be stored as statements.")
    )]
    NotAProposition { term: String, ty: String },

    #[error("entrenchment {value} is outside [0, 1]")]
    #[diagnostic(
        code(maat::kb::invalid_entrenchment),
        help("Entrenchment values are priorities in the closed interval [0.0, 1.0].")
    )]
    InvalidEntrenchment { value: f64 },
}

// ---------------------------------------------------------------------------
// Belief revision errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum RevisionError {
    #[error("entrenchment {value} is outside [0, 1]")]
    #[diagnostic(
        code(maat::revision::invalid_entrenchment),
        help("Entrenchment values are priorities in the closed interval [0.0, 1.0].")
    )]
    InvalidEntrenchment { value: f64 },

    #[error("unsupported strategy: {tag}")]
    #[diagnostic(
        code(maat::revision::unsupported_strategy),
        help("Valid strategies are: partial-meet, kernel, argumentation.")
    )]
    UnsupportedStrategy { tag: String },

    #[error("{relevant} statements are relevant to the contraction, limit is {limit}")]
    #[diagnostic(
        code(maat::revision::search_limit),
        help(
            "Remainder and kernel enumeration is exponential in the number of relevant \
             statements. Raise `max_relevant_statements` in EngineConfig, or split the \
             belief set into smaller contexts."
        )
    )]
    SearchLimitExceeded { relevant: usize, limit: usize },

    #[error(transparent)]
    #[diagnostic(transparent)]
    Kb(#[from] KbError),
}

// ---------------------------------------------------------------------------
// Configuration errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum ConfigError {
    #[error("failed to read config: {path}")]
    #[diagnostic(
        code(maat::config::read),
        help("Ensure the config file exists and is readable.")
    )]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {path}: {message}")]
    #[diagnostic(
        code(maat::config::parse),
        help("Check the TOML syntax and field names in the config file.")
    )]
    Parse { path: String, message: String },

    #[error("failed to write config: {path}")]
    #[diagnostic(
        code(maat::config::write),
        help("Ensure you have write permissions to the target directory.")
    )]
    Write {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid configuration: {message}")]
    #[diagnostic(code(maat::config::invalid), help("Check the EngineConfig fields. {message}"))]
    Invalid { message: String },
}

/// Convenience alias for functions returning akh-maat results.
pub type MaatResult<T> = std::result::Result<T, MaatError>;

/// Result type for type-registry and term-construction operations.
pub type TypeResult<T> = std::result::Result<T, TypeError>;

/// Result type for knowledge store operations.
pub type KbResult<T> = std::result::Result<T, KbError>;

/// Result type for belief revision operations.
pub type RevisionResult<T> = std::result::Result<T, RevisionError>;
