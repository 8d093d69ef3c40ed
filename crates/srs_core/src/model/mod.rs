//! Domain model for spaced-repetition items.
//!
//! # Responsibility
//! - Define canonical data structures shared by stores, sets and services.
//!
//! # Invariants
//! - Every item is identified by a positive `ItemId`.
//! - An id lives in at most one of the active store and the archive.

pub mod item;
