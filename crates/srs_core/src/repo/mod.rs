//! Repository layer abstractions and persistence implementations.
//!
//! # Responsibility
//! - Define the item store contract shared by the active table and archive.
//! - Isolate SQLite query details from lifecycle orchestration.
//!
//! # Invariants
//! - Store writes enforce `Item::validate()` before persistence.
//! - Nothing here spans two tables atomically; cross-store consistency is
//!   owned by `service::lifecycle_service`.

pub mod item_repo;
