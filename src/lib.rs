//! Workspace root for the lockshadow crates.
//!
//! Holds the shared git hooks; the device itself lives under `crates/`.
