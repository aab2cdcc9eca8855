// thiserror's #[error("...{field}...")] format strings reference struct fields,
// but the compiler doesn't see through the derive macro and reports false positives.
#![allow(unused_assignments)]

//! # akh-maat
//!
//! A symbolic reasoning core: typed logical terms, most-general-unifier
//! computation, an indexed store of contextually scoped statements, and
//! AGM-style belief revision over that store.
//!
//! ## Architecture
//!
//! - **Types** (`types`): a shared registry of atomic types and function signatures
//! - **Terms** (`term`): immutable, `Arc`-shared syntax trees and substitutions
//! - **Unification** (`unify`): first-order and higher-order pattern unification
//! - **Knowledge store** (`kb`): contexts, indices, query cache
//! - **Belief revision** (`revision`, `argumentation`): expansion, contraction, Levi revision, Dung semantics
//!
//! ## Library usage
//!
//! ```no_run
//! use akh_maat::config::EngineConfig;
//! use akh_maat::engine::Engine;
//! use akh_maat::kb::ContextKind;
//! use akh_maat::revision::ContractionStrategy;
//! use akh_maat::term::Term;
//! use akh_maat::types::{Ty, BOOLEAN, ENTITY};
//!
//! let engine = Engine::new(EngineConfig::default()).unwrap();
//! engine.define_type("Person", &[ENTITY]).unwrap();
//! engine.define_signature("Rel2", &["Person", "Person"], BOOLEAN).unwrap();
//!
//! let person = |n: &str| Term::constant(n, Ty::new("Person"));
//! let father = engine
//!     .apply(Term::constant("Father", Ty::new("Rel2")), vec![person("john"), person("bob")])
//!     .unwrap();
//!
//! engine.create_context("beliefs", None, ContextKind::Beliefs).unwrap();
//! engine.assert(father.clone(), "beliefs", None).unwrap();
//! let revised = engine
//!     .revise("beliefs", father.negate(), ContractionStrategy::PartialMeet, None)
//!     .unwrap();
//! println!("{:?}", engine.belief_set(&revised).unwrap());
//! ```

pub mod argumentation;
pub mod config;
pub mod document;
pub mod engine;
pub mod error;
pub mod kb;
pub mod provenance;
pub mod revision;
pub mod symbol;
pub mod term;
pub mod types;
pub mod unify;
