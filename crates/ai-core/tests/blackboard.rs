use std::rc::Rc;

use ai_core::{BbKey, Blackboard, BlackboardError, Effects};

const HEALTH: BbKey<u32> = BbKey::new("health");
const NAME: BbKey<String> = BbKey::new("name");

#[test]
fn blackboard_set_get_remove_roundtrip() {
    let mut bb = Blackboard::new();
    assert!(!bb.contains(HEALTH));

    bb.set(HEALTH, 123).unwrap();
    bb.set(NAME, "hello".to_string()).unwrap();

    assert_eq!(bb.get(HEALTH).copied(), Some(123));
    assert_eq!(bb.get(NAME).map(|s| s.as_str()), Some("hello"));
    assert!(bb.contains_name("name"));

    assert!(bb.remove(HEALTH).unwrap().is_some());
    assert_eq!(bb.get(HEALTH), None);
}

#[test]
#[should_panic(expected = "blackboard type mismatch")]
fn blackboard_type_mismatch_panics() {
    let mut bb = Blackboard::new();
    bb.set(BbKey::<u32>::new("x"), 1u32).unwrap();
    let _ = bb.get(BbKey::<i32>::new("x"));
}

#[test]
fn try_get_reports_type_mismatch() {
    let mut bb = Blackboard::new();
    bb.set(BbKey::<u32>::new("x"), 1u32).unwrap();
    assert_eq!(
        bb.try_get(BbKey::<f32>::new("x")).err(),
        Some(BlackboardError::TypeMismatch { key: "x".into() })
    );
}

#[test]
fn read_only_blackboard_rejects_writes() {
    let mut bb = Blackboard::new();
    bb.set(HEALTH, 5).unwrap();
    bb.set_read_only(true);

    assert_eq!(
        bb.set(HEALTH, 6),
        Err(BlackboardError::ReadOnly {
            key: "health".into()
        })
    );
    assert!(bb.remove(HEALTH).is_err());
    assert_eq!(bb.get(HEALTH).copied(), Some(5));

    bb.set_read_only(false);
    bb.set(HEALTH, 6).unwrap();
    assert_eq!(bb.get(HEALTH).copied(), Some(6));
}

#[test]
fn clone_is_shallow_and_independent() {
    let mut original = Blackboard::new();
    original.set(NAME, "scout".to_string()).unwrap();
    original.set(HEALTH, 10).unwrap();
    original.set_read_only(true);

    let mut copy = original.clone();
    assert!(!copy.is_read_only());
    copy.set(HEALTH, 1).unwrap();
    copy.set(BbKey::<bool>::new("extra"), true).unwrap();

    assert_eq!(original.get(HEALTH).copied(), Some(10));
    assert!(!original.contains_name("extra"));

    // Values are shared, not copied.
    let a = original.get_value("name").unwrap();
    let b = copy.get_value("name").unwrap();
    assert!(Rc::ptr_eq(a, b));
}

#[test]
fn apply_writes_all_effects() {
    let mut effects = Effects::new();
    effects.insert("health".into(), Rc::new(42u32));
    effects.insert("name".into(), Rc::new("guard".to_string()));

    let mut bb = Blackboard::new();
    bb.apply(&effects).unwrap();
    assert_eq!(bb.get(HEALTH).copied(), Some(42));
    assert_eq!(bb.len(), 2);

    bb.set_read_only(true);
    assert!(bb.apply(&effects).is_err());
}
