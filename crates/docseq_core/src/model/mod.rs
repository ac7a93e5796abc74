//! Domain model for documents and their ordered nodes.
//!
//! # Responsibility
//! - Define the records the sequencing engine reads and writes.
//! - Keep derived fields (`character_count`) computable in one place.
//!
//! # Invariants
//! - A document owns its nodes; node positions are dense per document.
//! - At most one `NodeKind::Toc` node per document, always at position 0.

pub mod document;
pub mod node;
