//! Document domain model.
//!
//! # Responsibility
//! - Describe the container that owns an ordered node sequence.
//! - Carry the structured outline produced by TOC generation.
//!
//! # Invariants
//! - `outline` is `Some` only while the document carries a TOC node, or
//!   until the next resegmentation clears it.

use crate::outline::Outline;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Stable identifier of one document.
pub type DocumentId = Uuid;

/// Owner used when a service runs without an acting owner.
pub const LOCAL_OWNER: &str = "local";

/// Document read model as stored in the `documents` table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    pub document_uuid: DocumentId,
    pub title: String,
    /// Original unprocessed text; input to resegmentation.
    pub raw_content: String,
    /// Opaque owner reference checked by the executor.
    pub owner: String,
    pub is_public: bool,
    /// Structured outline behind the current TOC node.
    pub outline: Option<Outline>,
    /// Epoch ms creation timestamp.
    pub created_at: i64,
    /// Epoch ms update timestamp.
    pub updated_at: i64,
}

impl Document {
    pub fn is_owned_by(&self, owner: &str) -> bool {
        self.owner == owner
    }

    /// Number of outline sections, zero when no outline is stored.
    pub fn outline_section_count(&self) -> usize {
        self.outline
            .as_ref()
            .map_or(0, |outline| outline.sections.len())
    }
}
