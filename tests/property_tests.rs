//! Property-based tests for recall
//!
//! These tests verify invariants that must hold for all inputs:
//! - Input bounding stays bounded and never panics
//! - The lifecycle state machine only walks legal edges
//! - Accessibility filtering only ever narrows
//!
//! Run with: cargo test --test property_tests

use proptest::prelude::*;

// ============================================================================
// INPUT BOUNDING
// ============================================================================

mod input_tests {
    use super::*;
    use recall::service::{bound_input, truncate_text, TRUNCATION_MARKER};
    use recall::types::ServiceConfig;

    proptest! {
        /// Invariant: truncation never panics, on any string (multi-byte included)
        #[test]
        fn never_panics(s in "\\PC*", max in 0usize..500) {
            let _ = truncate_text(&s, max);
        }

        /// Invariant: output stays within the head+tail budget plus the marker
        #[test]
        fn output_bounded(s in "\\PC{0,2000}", max in 10usize..500) {
            let out = truncate_text(&s, max);
            let budget = max * 7 / 10 + max * 2 / 10 + TRUNCATION_MARKER.chars().count();
            prop_assert!(out.chars().count() <= budget.max(s.chars().count().min(max)));
        }

        /// Invariant: short input passes through byte-identical
        #[test]
        fn short_input_unchanged(s in "\\PC{0,100}") {
            let len = s.chars().count();
            prop_assert_eq!(truncate_text(&s, len), s);
        }

        /// Invariant: truncated output preserves the head and tail of the input
        #[test]
        fn head_and_tail_preserved(s in "\\PC{500,1000}", max in 100usize..400) {
            let out = truncate_text(&s, max);
            if out.contains(TRUNCATION_MARKER) {
                let head: String = s.chars().take(max * 7 / 10).collect();
                let tail: String = s.chars().skip(s.chars().count() - max * 2 / 10).collect();
                prop_assert!(out.starts_with(&head));
                prop_assert!(out.ends_with(&tail));
            }
        }

        /// Invariant: reject mode never returns truncated text
        #[test]
        fn reject_mode_is_all_or_nothing(s in "\\PC{0,300}") {
            let config = ServiceConfig {
                max_input_len: 100,
                truncate_long_input: false,
                ..Default::default()
            };
            match bound_input(&s, &config) {
                Ok(bounded) => {
                    prop_assert!(!bounded.truncated);
                    prop_assert_eq!(bounded.text, s);
                }
                Err(_) => prop_assert!(s.chars().count() > 100),
            }
        }
    }
}

// ============================================================================
// LIFECYCLE STATE MACHINE
// ============================================================================

mod lifecycle_tests {
    use super::*;
    use recall::backend::{MemoryEvent, UpsertOutcome};
    use recall::storage::{identity, ledger, Storage};
    use recall::types::MemoryState;
    use uuid::Uuid;

    fn arb_event() -> impl Strategy<Value = MemoryEvent> {
        prop_oneof![
            Just(MemoryEvent::Add),
            Just(MemoryEvent::Update),
            Just(MemoryEvent::Delete),
            Just(MemoryEvent::Noop),
        ]
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(64))]

        /// Invariant: any interleaving of backend outcomes and explicit deletes
        /// leaves a well-formed history chain (genesis first, legal edges,
        /// each old_state equal to the previous new_state)
        #[test]
        fn history_chain_holds_under_any_interleaving(
            events in prop::collection::vec(arb_event(), 1..20),
            explicit_deletes in prop::collection::vec(any::<bool>(), 1..20),
        ) {
            let storage = Storage::open_in_memory().unwrap();
            let (user, app) = storage
                .with_connection(|conn| identity::resolve(conn, "alice", "claude"))
                .unwrap();
            let id = Uuid::new_v4();

            for (event, delete_after) in events.iter().zip(explicit_deletes.iter().cycle()) {
                let outcome = UpsertOutcome {
                    id,
                    event: *event,
                    content: "fact".to_string(),
                };
                storage
                    .with_transaction(|conn| ledger::apply_outcome(conn, &outcome, user.id, app.id))
                    .unwrap();
                if *delete_after {
                    storage
                        .with_transaction(|conn| ledger::mark_deleted(conn, id, user.id))
                        .unwrap();
                }
            }

            let memory = storage
                .with_connection(|conn| ledger::get_memory(conn, id))
                .unwrap();
            let history = storage
                .with_connection(|conn| ledger::history_for_memory(conn, id))
                .unwrap();

            if let Some(memory) = memory {
                prop_assert!(ledger::verify_history_chain(&history));
                // terminal state of the chain matches the memory row
                prop_assert_eq!(history.last().unwrap().new_state, memory.state);
                // deleted_at is set exactly when the state is deleted
                prop_assert_eq!(
                    memory.deleted_at.is_some(),
                    memory.state == MemoryState::Deleted
                );
            } else {
                prop_assert!(history.is_empty());
            }
        }

        /// Invariant: the transition table admits genesis only into `active`
        #[test]
        fn genesis_only_into_active(to in prop_oneof![
            Just(MemoryState::Active),
            Just(MemoryState::Paused),
            Just(MemoryState::Archived),
            Just(MemoryState::Deleted),
        ]) {
            prop_assert_eq!(
                ledger::transition_allowed(None, to),
                to == MemoryState::Active
            );
        }
    }
}

// ============================================================================
// ACCESSIBILITY FILTERING
// ============================================================================

mod acl_tests {
    use super::*;
    use recall::acl::{accessible_ids, GrantDecision, OpenPolicy, StaticPolicy};
    use recall::types::{App, Memory, MemoryState, UserId};
    use std::collections::HashMap;
    use uuid::Uuid;

    fn memory_with_state(user_id: UserId, state: MemoryState) -> Memory {
        Memory {
            id: Uuid::new_v4(),
            user_id,
            app_id: Uuid::new_v4(),
            content: "fact".to_string(),
            state,
            metadata: HashMap::new(),
            created_at: chrono::Utc::now(),
            updated_at: chrono::Utc::now(),
            deleted_at: None,
        }
    }

    fn app_of(owner_id: UserId) -> App {
        App {
            id: Uuid::new_v4(),
            owner_id,
            external_id: "claude".to_string(),
            name: "claude".to_string(),
            is_active: true,
            created_at: chrono::Utc::now(),
            updated_at: chrono::Utc::now(),
        }
    }

    fn arb_state() -> impl Strategy<Value = MemoryState> {
        prop_oneof![
            Just(MemoryState::Active),
            Just(MemoryState::Paused),
            Just(MemoryState::Archived),
            Just(MemoryState::Deleted),
        ]
    }

    proptest! {
        /// Invariant: the accessible set is a subset of the input, and under
        /// the open policy it is exactly the owner's active subset
        #[test]
        fn open_policy_yields_active_subset(states in prop::collection::vec(arb_state(), 0..30)) {
            let user = Uuid::new_v4();
            let memories: Vec<Memory> = states.iter().map(|s| memory_with_state(user, *s)).collect();
            let app = app_of(user);

            let ids = accessible_ids(&memories, &app, &OpenPolicy);

            let expected: Vec<_> = memories
                .iter()
                .filter(|m| m.state == MemoryState::Active)
                .map(|m| m.id)
                .collect();
            prop_assert_eq!(ids, expected);
        }

        /// Invariant: another user's app never sees anything, whatever the states
        #[test]
        fn foreign_app_sees_nothing(states in prop::collection::vec(arb_state(), 0..30)) {
            let user = Uuid::new_v4();
            let memories: Vec<Memory> = states.iter().map(|s| memory_with_state(user, *s)).collect();
            let foreign_app = app_of(Uuid::new_v4());

            prop_assert!(accessible_ids(&memories, &foreign_app, &OpenPolicy).is_empty());
        }

        /// Invariant: an explicit deny always removes a memory, an explicit
        /// allow never adds a non-active one
        #[test]
        fn deny_narrows_allow_never_widens(states in prop::collection::vec(arb_state(), 1..30)) {
            let user = Uuid::new_v4();
            let memories: Vec<Memory> = states.iter().map(|s| memory_with_state(user, *s)).collect();
            let app = app_of(user);

            let mut policy = StaticPolicy::new();
            for (i, m) in memories.iter().enumerate() {
                let decision = if i % 2 == 0 { GrantDecision::Deny } else { GrantDecision::Allow };
                policy = policy.with_grant(m.id, app.id, decision);
            }

            let ids = accessible_ids(&memories, &app, &policy);
            for (i, m) in memories.iter().enumerate() {
                let accessible = ids.contains(&m.id);
                if i % 2 == 0 {
                    prop_assert!(!accessible);
                } else {
                    prop_assert_eq!(accessible, m.state == MemoryState::Active);
                }
            }
        }
    }
}

// ============================================================================
// CONTENT HASHING
// ============================================================================

mod hash_tests {
    use super::*;
    use recall::types::content_hash;

    proptest! {
        /// Invariant: hashing is insensitive to case and whitespace runs
        #[test]
        fn case_and_whitespace_insensitive(s in "[a-zA-Z ]{1,100}") {
            let upper = s.to_uppercase();
            let spaced = s.split_whitespace().collect::<Vec<_>>().join("   ");
            prop_assert_eq!(content_hash(&s), content_hash(&upper));
            if !spaced.is_empty() {
                prop_assert_eq!(content_hash(&s), content_hash(&spaced));
            }
        }

        /// Invariant: output is always a prefixed 64-hex-digit digest
        #[test]
        fn output_format(s in "\\PC*") {
            let h = content_hash(&s);
            prop_assert!(h.starts_with("sha256:"));
            prop_assert_eq!(h.len(), "sha256:".len() + 64);
        }
    }
}
