//! Document and configuration round trips through the filesystem.
//!
//! Knowledge captured from one engine, written to disk, and installed into a
//! fresh engine must come back with the same types, contexts, statements and
//! entrenchment.

use akh_maat::config::EngineConfig;
use akh_maat::document::{DocumentError, KbDocument};
use akh_maat::engine::Engine;
use akh_maat::error::MaatError;
use akh_maat::kb::ContextKind;
use akh_maat::revision::ContractionStrategy;
use akh_maat::symbol::VarId;
use akh_maat::term::{Term, Var};
use akh_maat::types::{BOOLEAN, ENTITY, Ty};

fn populated_engine() -> Engine {
    let engine = Engine::new(EngineConfig::default()).unwrap();
    engine.define_type("Person", &[ENTITY]).unwrap();
    engine.define_type("Parent", &["Person"]).unwrap();
    engine
        .define_signature("Rel2", &["Person", "Person"], BOOLEAN)
        .unwrap();

    let person = |n: &str| Term::constant(n, Ty::new("Person"));
    let rel = |name: &str, a: Term, b: Term| {
        engine
            .apply(Term::constant(name, Ty::new("Rel2")), vec![a, b])
            .unwrap()
    };
    let x = Term::var(Var::new(VarId::new(1).unwrap(), "x", Ty::new("Person")));
    let y = Term::var(Var::new(VarId::new(2).unwrap(), "y", Ty::new("Person")));

    engine.create_context("world", None, ContextKind::Rules).unwrap();
    engine
        .assert(
            Term::implies(
                rel("Father", x.clone(), y.clone()),
                rel("Parent", x, y),
            ),
            "world",
            Some(0.9),
        )
        .unwrap();
    engine
        .create_context("world/family", Some("world"), ContextKind::Beliefs)
        .unwrap();
    engine
        .assert(rel("Father", person("john"), person("bob")), "world/family", Some(0.4))
        .unwrap();
    engine
        .assert(rel("Mother", person("mary"), person("bob")), "world/family", None)
        .unwrap();
    engine
}

#[test]
fn document_round_trip_through_file() {
    let dir = tempfile::TempDir::new().unwrap();
    let path = dir.path().join("kb").join("family.json");

    let source = populated_engine();
    let father = source.belief_set("world/family").unwrap().statements[0]
        .term
        .clone();
    let revised = source
        .revise("world/family", father.negate(), ContractionStrategy::Kernel, None)
        .unwrap();

    let doc = KbDocument::capture(&source).unwrap();
    doc.save(&path).unwrap();

    let loaded = KbDocument::load(&path).unwrap();
    assert_eq!(loaded, doc);

    let target = Engine::new(EngineConfig::default()).unwrap();
    let summary = loaded.install(&target).unwrap();
    assert_eq!(summary.types, 3);
    assert_eq!(summary.contexts, source.contexts().len());

    for info in source.contexts() {
        assert_eq!(
            target.belief_set(&info.id).unwrap(),
            source.belief_set(&info.id).unwrap(),
            "context {}",
            info.id
        );
        assert_eq!(target.store().context_info(&info.id).unwrap(), info);
    }
    assert_eq!(
        target
            .belief_set("world/family")
            .unwrap()
            .entrenchment_of(&father),
        Some(0.4)
    );
    assert!(target.belief_set(&revised).unwrap().beliefs().any(|t| *t == father.negate()));
    assert!(
        target
            .registry()
            .is_subtype(&Ty::new("Parent"), &Ty::new(ENTITY))
    );
}

#[test]
fn installing_twice_reports_duplicate_context() {
    let doc = KbDocument::capture(&populated_engine()).unwrap();
    let target = Engine::new(EngineConfig::default()).unwrap();
    doc.install(&target).unwrap();
    assert!(matches!(doc.install(&target), Err(DocumentError::Kb(_))));
}

#[test]
fn document_json_is_hand_writable() {
    let json = r#"{
        "types": [{ "name": "Person", "supertypes": ["Entity"] }],
        "signatures": [{ "name": "Pred1", "params": ["Person"], "returns": "Boolean" }],
        "contexts": [{
            "id": "facts",
            "kind": "facts",
            "statements": [{
                "term": { "application": {
                    "op": { "constant": { "name": "Happy", "ty": "Pred1" } },
                    "args": [{ "constant": { "name": "ann", "ty": "Person" } }],
                    "ty": "Boolean"
                } },
                "meta": { "provenance": "asserted", "entrenchment": 0.75 }
            }]
        }]
    }"#;
    let doc = KbDocument::from_json(json).unwrap();
    let engine = Engine::new(EngineConfig::default()).unwrap();
    let summary = doc.install(&engine).unwrap();
    assert_eq!(summary.statements, 1);

    let set = engine.belief_set("facts").unwrap();
    assert_eq!(set.statements[0].term.to_string(), "Happy(ann)");
    assert_eq!(set.statements[0].meta.entrenchment, Some(0.75));
}

#[test]
fn config_round_trip_drives_engine() {
    let dir = tempfile::TempDir::new().unwrap();
    let path = dir.path().join("maat.toml");
    let config = EngineConfig {
        query_cache_capacity: 0,
        max_relevant_statements: 8,
        ..Default::default()
    };
    config.save(&path).unwrap();

    let engine = Engine::new(EngineConfig::load(&path).unwrap()).unwrap();
    assert_eq!(engine.config(), &config);
}

#[test]
fn missing_document_surfaces_read_error() {
    let dir = tempfile::TempDir::new().unwrap();
    let err: MaatError = KbDocument::load(&dir.path().join("absent.json"))
        .unwrap_err()
        .into();
    assert!(matches!(err, MaatError::Document(DocumentError::Read { .. })));
}
