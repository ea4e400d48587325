//! Property tests for access path canonicalization
//!
//! Field chains over distinct classes never fold, so only the length limit
//! shapes the result.

use pretty_assertions::assert_eq;
use proptest::prelude::*;
use std::sync::Arc;
use taintflow_core::config::InfoflowConfig;
use taintflow_core::features::access_path::{AccessPathFactory, AccessPathFragment, AccessPathRequest};
use taintflow_core::shared::ir::{ClassHierarchy, Field, Local, LocalId, Type, Value};

fn chain(len: usize) -> Vec<AccessPathFragment> {
    (0..len)
        .map(|i| {
            let owner = format!("app.C{}", i);
            let target = Type::class(&format!("app.C{}", i + 1));
            AccessPathFragment::new(Field::instance(&owner, &format!("f{}", i), target))
        })
        .collect()
}

fn factory(limit: usize) -> AccessPathFactory {
    let config = InfoflowConfig::default().with_access_path_length(limit);
    AccessPathFactory::new(&config, Arc::new(ClassHierarchy::default()))
}

proptest! {
    #[test]
    fn prop_truncation_respects_limit(limit in 1usize..6, len in 0usize..9, sub in any::<bool>()) {
        let f = factory(limit);
        let base = Local::new(LocalId(0), "o", Type::class("app.C0"));
        let ap = f
            .create_with(AccessPathRequest::of(&Value::local(&base)).fragments(chain(len)).taint_sub_fields(sub))
            .expect("reference base");

        prop_assert!(ap.fragment_count() <= limit);
        prop_assert_eq!(ap.fragment_count(), len.min(limit));
        if len > limit {
            prop_assert!(ap.taint_sub_fields());
            prop_assert!(ap.is_cut_off_approximation());
        } else {
            prop_assert_eq!(ap.taint_sub_fields(), sub);
        }
    }

    #[test]
    fn prop_canonicalization_is_idempotent(limit in 1usize..6, len in 0usize..9, sub in any::<bool>()) {
        let f = factory(limit);
        let base = Local::new(LocalId(0), "o", Type::class("app.C0"));
        let first = f
            .create_with(AccessPathRequest::of(&Value::local(&base)).fragments(chain(len)).taint_sub_fields(sub))
            .expect("reference base");
        let again = f
            .create_with(
                AccessPathRequest::of(&Value::local(&base))
                    .fragments(first.fragments().to_vec())
                    .taint_sub_fields(first.taint_sub_fields()),
            )
            .expect("reference base");

        prop_assert_eq!(again.fragments(), first.fragments());
        prop_assert_eq!(again.taint_sub_fields(), first.taint_sub_fields());
        prop_assert_eq!(again.plain_value(), first.plain_value());
    }

    #[test]
    fn prop_longer_path_is_entailed_by_prefix(len in 1usize..5) {
        let f = factory(5);
        let base = Local::new(LocalId(0), "o", Type::class("app.C0"));
        let fields = chain(len);
        let prefix = f
            .create_with(AccessPathRequest::of(&Value::local(&base)).fragments(fields[..len - 1].to_vec()))
            .expect("reference base");
        let full = f
            .create_with(AccessPathRequest::of(&Value::local(&base)).fragments(fields).taint_sub_fields(false))
            .expect("reference base");

        prop_assert!(prefix.entails(&full));
        prop_assert!(!full.entails(&prefix));
    }
}

#[test]
fn test_same_request_is_interned_once() {
    let f = factory(5);
    let base = Local::new(LocalId(0), "o", Type::class("app.C0"));
    let a = f
        .create_with(AccessPathRequest::of(&Value::local(&base)).fragments(chain(2)))
        .expect("reference base");
    let b = f
        .create_with(AccessPathRequest::of(&Value::local(&base)).fragments(chain(2)))
        .expect("reference base");
    assert!(Arc::ptr_eq(&a, &b));
    assert_eq!(a.fragment_count(), 2);
}
