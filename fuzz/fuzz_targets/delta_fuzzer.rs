//! Fuzz target for [`ShadowEngine`] delta handling
//!
//! Deltas come straight off the network; no payload may wedge the engine.
//!
//! # Strategy
//!
//! - Raw payloads: arbitrary bytes fed to the parser and the engine
//! - Shaped payloads: well-formed JSON with fuzzed version and state fields
//! - Report interleaving: the report pass overwrites the state between deltas
//!
//! # Invariants
//!
//! - Accepted version never decreases
//! - A rejected parse never changes the lock state
//! - `TriggerActuator` only accompanies a change to `Open`
//! - The pending flag is set after any state-changing delta
//! - NEVER panic on any payload

#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use lockshadow_core::{ShadowAction, ShadowEngine};
use lockshadow_proto::{DeltaDocument, LockState};

#[derive(Debug, Clone, Arbitrary)]
enum DeltaEvent {
    Raw(Vec<u8>),
    Shaped { version: Option<u64>, lock_state: Option<u64>, noise: bool },
    Report { open: bool },
    TakePending,
}

fn shaped(version: Option<u64>, lock_state: Option<u64>, noise: bool) -> Vec<u8> {
    let mut fields = Vec::new();
    if let Some(version) = version {
        fields.push(format!(r#""version":{version}"#));
    }
    if let Some(lock_state) = lock_state {
        fields.push(format!(r#""state":{{"lockState":{lock_state}}}"#));
    }
    if noise {
        fields.push(r#""metadata":{"lockState":{"timestamp":1}}"#.to_string());
    }
    format!("{{{}}}", fields.join(",")).into_bytes()
}

fuzz_target!(|events: Vec<DeltaEvent>| {
    let mut engine = ShadowEngine::new();

    for event in events {
        let payload = match event {
            DeltaEvent::Raw(bytes) => bytes,
            DeltaEvent::Shaped { version, lock_state, noise } => shaped(version, lock_state, noise),
            DeltaEvent::Report { open } => {
                let state = if open { LockState::Open } else { LockState::Closed };
                engine.set_lock_state(state);
                assert_eq!(engine.lock_state(), state);
                continue;
            },
            DeltaEvent::TakePending => {
                engine.take_pending_change();
                assert!(!engine.snapshot().pending_change);
                continue;
            },
        };

        let before = engine.snapshot();
        let parsed = DeltaDocument::parse(&payload);

        match engine.on_delta(&payload) {
            Ok(actions) => {
                let after = engine.snapshot();
                assert!(after.version >= before.version, "version went backwards");

                let changed = actions.iter().any(|a| matches!(a, ShadowAction::StateChanged { .. }));
                let triggered = actions.iter().any(|a| matches!(a, ShadowAction::TriggerActuator));
                if changed {
                    assert_ne!(after.lock_state, before.lock_state);
                    assert!(after.pending_change);
                } else {
                    assert_eq!(after.lock_state, before.lock_state);
                }
                if triggered {
                    assert!(changed);
                    assert_eq!(after.lock_state, LockState::Open);
                }
            },
            Err(_) => {
                let after = engine.snapshot();
                assert_eq!(after.lock_state, before.lock_state);
                assert!(after.version >= before.version, "version went backwards");
                if parsed.is_err() {
                    assert_eq!(after.version, before.version);
                }
            },
        }
    }
});
