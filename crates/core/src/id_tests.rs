// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::collections::HashMap;

crate::define_id! {
    /// Test ID type for macro verification.
    pub struct TestId("tst-");
}

#[test]
fn generated_ids_carry_prefix_and_are_unique() {
    let a = TestId::new();
    let b = TestId::new();
    assert!(a.as_str().starts_with("tst-"));
    assert_eq!(a.as_str().len(), 4 + 19);
    assert_ne!(a, b);
}

#[test]
fn hash_map_lookup_by_str() {
    let mut map = HashMap::new();
    map.insert(TestId::from_string("tst-k"), 42);
    assert_eq!(map.get("tst-k"), Some(&42));
}

#[test]
fn foreign_ids_are_kept_verbatim() {
    let id = TestId::from("3f2a9c1e-0000-4000-8000-000000000000");
    assert_eq!(id.to_string(), "3f2a9c1e-0000-4000-8000-000000000000");
}

#[test]
fn blank_ids_are_empty() {
    assert!(TestId::from_string("   ").is_empty());
    assert!(!TestId::new().is_empty());
}

#[test]
fn serde_is_transparent() {
    let id = TestId::from_string("tst-1");
    assert_eq!(serde_json::to_string(&id).unwrap(), "\"tst-1\"");
    let back: TestId = serde_json::from_str("\"tst-1\"").unwrap();
    assert_eq!(back, id);
}
