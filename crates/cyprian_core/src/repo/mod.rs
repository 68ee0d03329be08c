//! Repository layer abstractions and persistence implementations.
//!
//! # Responsibility
//! - Define the concordance store contract used by builders and services.
//! - Isolate SQLite query details from conversion orchestration.
//!
//! # Invariants
//! - Point lookups succeed only when exactly one row matches; anything else
//!   is reported as a lookup integrity error, never masked.
//! - The whole cached span is replaced atomically; there are no partial
//!   writes or merges.

pub mod concordance_repo;
