//! # sync-core
//!
//! Pure logic for roomsync (no I/O, instant tests).
//!
//! This crate implements the decoding, room state and engine state machine
//! without any network or disk I/O, enabling fast unit tests.
//!
//! ## Design Philosophy
//!
//! All modules in this crate are **pure** - they take input and produce output
//! without side effects. This enables:
//! - Instant unit tests (no mocks, no async)
//! - Deterministic behavior (same input → same output, jitter aside)
//! - Easy reasoning about state transitions
//!
//! The actual I/O (fetching, persisting, emitting) is performed by
//! `sync-client`, which interprets the actions produced here.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod backoff;
pub mod parser;
pub mod room;
pub mod state;

pub use backoff::{exponential_backoff, BACKOFF_JITTER_MAX, DEFAULT_BACKOFF};
pub use parser::{parse_event, ParseFailure};
pub use room::{Room, RoomState, RoomStates, StateKey};
pub use state::{Action, PhaseEvent, SyncPhase};
