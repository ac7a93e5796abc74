//! Repository layer for documents and node sequences.
//!
//! # Responsibility
//! - Own every SQL statement touching `documents`/`nodes`.
//! - Wrap each structural change in one transaction.
//!
//! # Invariants
//! - Multi-row position changes go through `renumber::renumber` only.
//! - Repository APIs return semantic errors (`NodeNotFound`,
//!   `DocumentNotFound`) in addition to DB transport errors.

pub mod node_repo;
pub mod renumber;
