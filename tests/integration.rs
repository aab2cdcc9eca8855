//! End-to-end integration tests for the akh-maat engine.
//!
//! These exercise the full path from type declarations through the store,
//! the unifier and the revision engine, using only the public API.

use akh_maat::config::EngineConfig;
use akh_maat::engine::Engine;
use akh_maat::error::{KbError, MaatError, RevisionError};
use akh_maat::kb::ContextKind;
use akh_maat::revision::{ContractionStrategy, EntrenchmentMap};
use akh_maat::symbol::VarId;
use akh_maat::term::{Substitution, Term, Var};
use akh_maat::types::{BOOLEAN, ENTITY, Ty};
use akh_maat::unify::UnifyMode;

fn family_engine(config: EngineConfig) -> Engine {
    let engine = Engine::new(config).unwrap();
    engine.define_type("Person", &[ENTITY]).unwrap();
    engine
        .define_signature("Rel2", &["Person", "Person"], BOOLEAN)
        .unwrap();
    engine
        .define_signature("Pred1", &["Person"], BOOLEAN)
        .unwrap();
    engine
}

fn person(name: &str) -> Term {
    Term::constant(name, Ty::new("Person"))
}

fn var(id: u64, name: &str) -> Var {
    Var::new(VarId::new(id).unwrap(), name, Ty::new("Person"))
}

fn rel(engine: &Engine, name: &str, a: Term, b: Term) -> Term {
    engine
        .apply(Term::constant(name, Ty::new("Rel2")), vec![a, b])
        .unwrap()
}

fn pred(engine: &Engine, name: &str, a: Term) -> Term {
    engine
        .apply(Term::constant(name, Ty::new("Pred1")), vec![a])
        .unwrap()
}

fn beliefs(engine: &Engine, ctx: &str) -> Vec<Term> {
    engine.belief_set(ctx).unwrap().beliefs().cloned().collect()
}

#[test]
fn father_parent_scenario() {
    let engine = family_engine(EngineConfig::default());
    let (x, y) = (var(1, "x"), var(2, "y"));
    let father = rel(&engine, "Father", person("john"), person("bob"));
    let pattern = rel(&engine, "Father", Term::var(x.clone()), Term::var(y.clone()));
    let rule = Term::implies(
        pattern.clone(),
        rel(&engine, "Parent", Term::var(x.clone()), Term::var(y.clone())),
    );

    engine.create_context("facts", None, ContextKind::Facts).unwrap();
    engine.assert(father.clone(), "facts", None).unwrap();
    engine.assert(rule.clone(), "facts", None).unwrap();

    let mgu = engine.unify(&pattern, &father).unwrap();
    assert_eq!(mgu.len(), 2);
    assert_eq!(mgu.get(x.id), Some(&person("john")));
    assert_eq!(mgu.get(y.id), Some(&person("bob")));

    let (_, consequent) = rule.as_implication().unwrap();
    let parent = mgu.apply(consequent);
    assert_eq!(parent, rel(&engine, "Parent", person("john"), person("bob")));
    assert_eq!(parent.to_string(), "Parent(john, bob)");

    engine.assert(parent.clone(), "facts", None).unwrap();
    let hits = engine.query(&parent, &["facts"], None).unwrap();
    assert_eq!(hits.len(), 1);
    assert!(hits[0].bindings.is_empty());

    // The variable pattern binds both arguments, and ignores the rule.
    let hits = engine.query(&pattern, &["facts"], None).unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].bindings.to_string(), "{?x ↦ john, ?y ↦ bob}");
}

#[test]
fn store_round_trip() {
    let engine = family_engine(EngineConfig::default());
    engine.create_context("c", None, ContextKind::General).unwrap();
    let statements = [
        rel(&engine, "Father", person("john"), person("bob")),
        pred(&engine, "Happy", person("ann")),
        Term::not(pred(&engine, "Tall", person("bob"))),
        Term::implies(
            pred(&engine, "Tall", Term::var(var(3, "z"))),
            pred(&engine, "Happy", Term::var(var(3, "z"))),
        ),
    ];
    for s in &statements {
        engine.assert(s.clone(), "c", None).unwrap();
        assert!(engine.store().statement_exists(s, &["c"]).unwrap(), "{s}");
    }
    for s in &statements {
        assert!(engine.retract(s, "c").unwrap(), "{s}");
        assert!(!engine.store().statement_exists(s, &["c"]).unwrap(), "{s}");
    }
    assert_eq!(engine.store().stats().statements, 0);
}

#[test]
fn index_narrowing_matches_full_scan() {
    let engine = family_engine(EngineConfig {
        // Force the parallel path for half the queries.
        parallel_query_threshold: 3,
        ..Default::default()
    });
    engine.create_context("c", None, ContextKind::General).unwrap();
    let names = ["ann", "bob", "cid", "dee"];
    for a in names {
        for b in names {
            engine
                .assert(rel(&engine, "Knows", person(a), person(b)), "c", None)
                .unwrap();
        }
        engine.assert(pred(&engine, "Happy", person(a)), "c", None).unwrap();
    }
    engine
        .assert(
            Term::implies(
                pred(&engine, "Happy", Term::var(var(1, "p"))),
                rel(&engine, "Knows", Term::var(var(1, "p")), person("ann")),
            ),
            "c",
            None,
        )
        .unwrap();

    let patterns = [
        rel(&engine, "Knows", person("bob"), Term::var(var(100, "w"))),
        rel(&engine, "Knows", Term::var(var(100, "w")), Term::var(var(100, "w"))),
        pred(&engine, "Happy", Term::var(var(101, "h"))),
        Term::var(Var::new(VarId::new(102).unwrap(), "any", Ty::boolean())),
        Term::implies(
            pred(&engine, "Happy", Term::var(var(103, "q"))),
            Term::var(Var::new(VarId::new(104).unwrap(), "r", Ty::boolean())),
        ),
    ];

    let unifier = engine.store().unifier();
    let all = engine.store().statements_in("c").unwrap();
    for pattern in &patterns {
        let indexed: Vec<Term> = engine
            .query(pattern, &["c"], None)
            .unwrap()
            .into_iter()
            .map(|m| m.statement)
            .collect();
        let scanned: Vec<Term> = all
            .iter()
            .filter(|s| unifier.unify(pattern, &s.term, &Substitution::new()).is_ok())
            .map(|s| s.term.clone())
            .collect();
        assert_eq!(indexed, scanned, "pattern {pattern}");
    }
}

#[test]
fn agm_success() {
    let engine = family_engine(EngineConfig::default());
    let father = rel(&engine, "Father", person("john"), person("bob"));
    let happy = pred(&engine, "Happy", person("bob"));
    engine.create_context("b", None, ContextKind::Beliefs).unwrap();
    engine.assert(father.clone(), "b", None).unwrap();
    engine.assert(happy.clone(), "b", None).unwrap();

    let inputs = [
        father.clone(),
        father.negate(),
        happy.negate(),
        pred(&engine, "Tall", person("ann")),
    ];
    for strategy in [
        ContractionStrategy::PartialMeet,
        ContractionStrategy::Kernel,
        ContractionStrategy::Argumentation,
    ] {
        for phi in &inputs {
            let id = engine.revise("b", phi.clone(), strategy, None).unwrap();
            assert!(
                beliefs(&engine, &id).contains(phi),
                "{phi} missing after {strategy} revision"
            );
            assert!(engine.revision().is_consistent(&id).unwrap());
        }
    }
}

#[test]
fn agm_vacuity() {
    let engine = family_engine(EngineConfig::default());
    engine.create_context("b", None, ContextKind::Beliefs).unwrap();
    engine
        .assert(rel(&engine, "Father", person("john"), person("bob")), "b", None)
        .unwrap();
    engine
        .assert(pred(&engine, "Happy", person("bob")), "b", None)
        .unwrap();

    let phi = pred(&engine, "Tall", person("ann"));
    let revised = engine
        .revise("b", phi.clone(), ContractionStrategy::PartialMeet, None)
        .unwrap();
    let expanded = engine
        .expand("b", phi, engine.config().default_entrenchment)
        .unwrap();
    assert_eq!(beliefs(&engine, &revised), beliefs(&engine, &expanded));
}

#[test]
fn agm_vacuity_with_rule_bearing_base() {
    let engine = family_engine(EngineConfig::default());
    let p = Term::var(var(1, "p"));
    let tall_ann = pred(&engine, "Tall", person("ann"));
    let rule = Term::implies(
        pred(&engine, "Tall", p.clone()),
        Term::not(pred(&engine, "Happy", p)),
    );
    engine.create_context("b", None, ContextKind::Beliefs).unwrap();
    engine.assert(tall_ann.clone(), "b", None).unwrap();
    engine.assert(rule.clone(), "b", None).unwrap();
    let default = engine.config().default_entrenchment;

    // ¬Happy(bob) does not follow, so revision is plain expansion.
    let happy_bob = pred(&engine, "Happy", person("bob"));
    let revised = engine
        .revise("b", happy_bob.clone(), ContractionStrategy::PartialMeet, None)
        .unwrap();
    let expanded = engine.expand("b", happy_bob, default).unwrap();
    assert_eq!(beliefs(&engine, &revised), beliefs(&engine, &expanded));
    assert!(engine.revision().is_consistent(&revised).unwrap());

    // ¬Happy(ann) follows through the rule: expansion is inconsistent and
    // revision gives up exactly one premise.
    let happy_ann = pred(&engine, "Happy", person("ann"));
    let expanded = engine.expand("b", happy_ann.clone(), default).unwrap();
    assert!(!engine.revision().is_consistent(&expanded).unwrap());

    let revised = engine
        .revise("b", happy_ann.clone(), ContractionStrategy::PartialMeet, None)
        .unwrap();
    assert!(engine.revision().is_consistent(&revised).unwrap());
    assert_eq!(beliefs(&engine, &revised), vec![tall_ann, happy_ann]);
}

#[test]
fn partial_meet_keeps_a_single_remainder() {
    let engine = family_engine(EngineConfig::default());
    let father = rel(&engine, "Father", person("john"), person("bob"));
    let rule = Term::implies(
        rel(&engine, "Father", Term::var(var(1, "x")), Term::var(var(2, "y"))),
        rel(&engine, "Parent", Term::var(var(1, "x")), Term::var(var(2, "y"))),
    );
    let parent = rel(&engine, "Parent", person("john"), person("bob"));
    engine.create_context("b", None, ContextKind::Beliefs).unwrap();
    engine.assert(father.clone(), "b", None).unwrap();
    engine.assert(rule.clone(), "b", None).unwrap();

    // {father} and {rule} tie; the one earlier in the context is kept.
    let id = engine
        .contract("b", &parent, ContractionStrategy::PartialMeet, None)
        .unwrap();
    assert_eq!(beliefs(&engine, &id), vec![father.clone()]);

    let mut map = EntrenchmentMap::new();
    map.insert(father.clone(), 0.2);
    map.insert(rule.clone(), 0.9);
    let id = engine
        .contract("b", &parent, ContractionStrategy::PartialMeet, Some(&map))
        .unwrap();
    assert_eq!(beliefs(&engine, &id), vec![rule]);
    assert!(!engine.revision().entails(&id, &parent).unwrap());
}

#[test]
fn failed_revision_leaves_store_untouched() {
    let engine = family_engine(EngineConfig {
        max_relevant_statements: 1,
        ..Default::default()
    });
    let p = Term::var(var(1, "p"));
    engine.create_context("b", None, ContextKind::Beliefs).unwrap();
    engine
        .assert(pred(&engine, "Tall", person("ann")), "b", None)
        .unwrap();
    engine
        .assert(
            Term::implies(
                pred(&engine, "Tall", p.clone()),
                Term::not(pred(&engine, "Happy", p)),
            ),
            "b",
            None,
        )
        .unwrap();
    let contexts = engine.contexts();

    // Not a proposition: rejected before the Levi contraction runs.
    let err = engine
        .revise("b", person("bob"), ContractionStrategy::PartialMeet, None)
        .unwrap_err();
    assert!(matches!(
        err,
        MaatError::Revision(RevisionError::Kb(KbError::NotAProposition { .. }))
    ));
    let err = engine
        .contract("b", &person("bob"), ContractionStrategy::Kernel, None)
        .unwrap_err();
    assert!(matches!(
        err,
        MaatError::Revision(RevisionError::Kb(KbError::NotAProposition { .. }))
    ));

    // Two statements are relevant to ¬Happy(ann), over the limit of one.
    let err = engine
        .revise(
            "b",
            pred(&engine, "Happy", person("ann")),
            ContractionStrategy::PartialMeet,
            None,
        )
        .unwrap_err();
    assert!(matches!(
        err,
        MaatError::Revision(RevisionError::SearchLimitExceeded { relevant: 2, limit: 1 })
    ));

    assert_eq!(engine.contexts(), contexts);
    assert!(engine.history().is_empty());
}

#[test]
fn contraction_exclusion() {
    let engine = family_engine(EngineConfig::default());
    let father = rel(&engine, "Father", person("john"), person("bob"));
    let mother = rel(&engine, "Mother", person("mary"), person("bob"));
    let rule = Term::implies(
        pred(&engine, "Happy", Term::var(var(1, "p"))),
        rel(&engine, "Father", Term::var(var(1, "p")), person("bob")),
    );
    let happy = pred(&engine, "Happy", person("john"));
    engine.create_context("b", None, ContextKind::Beliefs).unwrap();
    for t in [&father, &mother, &rule, &happy] {
        engine.assert(t.clone(), "b", None).unwrap();
    }

    for strategy in [
        ContractionStrategy::PartialMeet,
        ContractionStrategy::Kernel,
        ContractionStrategy::Argumentation,
    ] {
        let id = engine.contract("b", &father, strategy, None).unwrap();
        let result = beliefs(&engine, &id);
        assert!(!result.contains(&father), "{strategy}");
        assert!(result.contains(&mother), "{strategy}");
    }

    // Partial meet and kernel also cut the modus ponens derivation.
    for strategy in [ContractionStrategy::PartialMeet, ContractionStrategy::Kernel] {
        let id = engine.contract("b", &father, strategy, None).unwrap();
        assert!(!engine.revision().entails(&id, &father).unwrap(), "{strategy}");
    }
    // The source context is never touched.
    assert_eq!(beliefs(&engine, "b").len(), 4);
}

#[test]
fn partial_meet_revision_scenario() {
    let engine = family_engine(EngineConfig::default());
    let father = rel(&engine, "Father", person("john"), person("bob"));
    let mother = rel(&engine, "Mother", person("mary"), person("bob"));
    engine.create_context("family", None, ContextKind::Beliefs).unwrap();
    engine.assert(father.clone(), "family", None).unwrap();
    engine.assert(mother.clone(), "family", None).unwrap();

    let id = engine
        .revise("family", father.negate(), ContractionStrategy::PartialMeet, None)
        .unwrap();
    let result = beliefs(&engine, &id);
    assert!(!result.contains(&father));
    assert!(result.contains(&father.negate()));
    assert!(result.contains(&mother));

    let history = engine.history();
    let last = history.last().unwrap();
    assert_eq!(last.result_context, id);
    assert_eq!(last.removed, vec![father]);
}

#[test]
fn higher_order_mode_is_configurable() {
    let engine = family_engine(EngineConfig {
        unify_mode: UnifyMode::HigherOrder,
        ..Default::default()
    });
    assert_eq!(engine.store().mode(), UnifyMode::HigherOrder);
    let a = rel(&engine, "Father", person("john"), person("bob"));
    assert!(engine.unify(&a, &a).unwrap().is_empty());
}
