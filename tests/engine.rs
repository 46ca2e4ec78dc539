//! Integration tests for the matching engine and intent store.

mod common;

use std::sync::Arc;

use common::*;
use tripmatch::{IntentId, IntentStore, MatchingEngine, TripMatchError, UserId};

fn engine() -> MatchingEngine {
    MatchingEngine::new(Arc::new(cantal_catalogue()), Arc::new(GraphOracle::new()))
}

#[test]
fn test_store_rejects_duplicate_intent() {
    let mut store = IntentStore::new();
    store.add(intent("i1", "u1", "arpajon", "vic", "09:00")).unwrap();

    let err = store
        .add(intent("i1", "u2", "aurillac", "vic", "10:00"))
        .unwrap_err();
    assert_eq!(
        err,
        TripMatchError::DuplicateIntent {
            id: IntentId::from("i1")
        }
    );
    assert_eq!(store.len(), 1);
    assert_eq!(store.get(&"i1".into()).unwrap().user.as_str(), "u1");
}

#[test]
fn test_store_by_user_and_remove() {
    let mut store = IntentStore::new();
    store.add(intent("i1", "u1", "arpajon", "vic", "09:00")).unwrap();
    store.add(intent("i2", "u1", "vic", "arpajon", "17:00")).unwrap();
    store.add(intent("i3", "u2", "arpajon", "vic", "09:00")).unwrap();

    let user = UserId::from("u1");
    assert_eq!(store.by_user(&user).count(), 2);

    assert!(store.remove(&"i3".into()).is_some());
    assert!(store.remove(&"i3".into()).is_none());
    assert_eq!(store.remove_user(&user), 2);
    assert!(store.is_empty());
}

#[test]
fn test_empty_engine_has_no_groups() {
    let mut engine = engine();
    assert!(engine.groups().unwrap().is_empty());
    assert!(engine.matches_for(&"u1".into()).unwrap().is_empty());
}

#[test]
fn test_groups_recomputed_after_pool_change() {
    let mut engine = engine();
    engine
        .add_intents([
            intent("i1", "u1", "arpajon", "vic", "09:00"),
            intent("i2", "u2", "arpajon", "vic", "09:00"),
        ])
        .unwrap();
    assert!(engine.is_dirty());

    assert_eq!(engine.groups().unwrap().len(), 1);
    assert!(!engine.is_dirty());

    engine
        .add_intent(intent("i3", "u3", "arpajon", "vic", "09:15"))
        .unwrap();
    assert!(engine.is_dirty());
    let groups = engine.groups().unwrap();
    assert_eq!(groups.len(), 1);
    assert_eq!(groups[0].len(), 3);

    engine.remove_intent(&"i3".into());
    engine.remove_intent(&"i2".into());
    assert!(engine.groups().unwrap().is_empty());
}

#[test]
fn test_remove_unknown_intent_keeps_cache() {
    let mut engine = engine();
    engine
        .add_intents([
            intent("i1", "u1", "arpajon", "vic", "09:00"),
            intent("i2", "u2", "arpajon", "vic", "09:00"),
        ])
        .unwrap();
    engine.groups().unwrap();

    assert!(engine.remove_intent(&"missing".into()).is_none());
    assert!(!engine.is_dirty());
}

#[test]
fn test_engine_matches_for_user() {
    let mut engine = engine();
    engine
        .add_intents([
            intent("blanc1", "augustin", "laroquebrou", "arpajon", "09:00"),
            intent("vert2", "beatrice", "saintpaul", "aurillac", "09:00"),
            intent("rouge5", "jean-baptiste", "reilhac", "vic", "09:00"),
        ])
        .unwrap();

    let matches = engine.matches_for(&"augustin".into()).unwrap();
    assert_eq!(matches.len(), 2);
    assert!(matches
        .iter()
        .all(|m| m.kind.others().iter().all(|o| o.user.as_str() != "augustin")));
}

#[test]
fn test_engine_reports_skipped_intents() {
    let mut engine = MatchingEngine::new(
        Arc::new(cantal_catalogue()),
        Arc::new(GraphOracle::new().with_unreachable("mauriac")),
    );
    engine
        .add_intents([
            intent("i1", "u1", "arpajon", "vic", "09:00"),
            intent("i2", "u2", "mauriac", "vic", "09:00"),
        ])
        .unwrap();

    assert!(engine.groups().unwrap().is_empty());
    assert_eq!(engine.skipped().len(), 1);
    assert_eq!(engine.skipped()[0].intent.as_str(), "i2");
}
