//! Node domain model.
//!
//! # Responsibility
//! - Describe one positioned unit of text inside a document.
//! - Own the character-count derivation used on every content write.
//!
//! # Invariants
//! - `position` is zero-based and unique inside `document_uuid` at rest.
//! - `character_count == content.chars().count()`.
//! - `kind == NodeKind::Toc` implies `position == 0`.

use crate::model::document::DocumentId;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Stable identifier of one node.
pub type NodeId = Uuid;

/// What a node holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    /// Author text.
    Content,
    /// Generated table of contents rendered as markdown.
    Toc,
}

impl NodeKind {
    pub(crate) fn as_db(self) -> &'static str {
        match self {
            Self::Content => "content",
            Self::Toc => "toc",
        }
    }

    pub(crate) fn from_db(value: &str) -> Option<Self> {
        match value {
            "content" => Some(Self::Content),
            "toc" => Some(Self::Toc),
            _ => None,
        }
    }
}

/// Node read model as stored in the `nodes` table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Node {
    pub node_uuid: NodeId,
    pub document_uuid: DocumentId,
    pub content: String,
    /// Dense zero-based rank inside the owning document.
    pub position: i64,
    /// Unicode scalar count of `content`.
    pub character_count: i64,
    pub kind: NodeKind,
    /// Reader annotation; has no effect on ordering.
    pub is_illuminated: bool,
    /// Epoch ms creation timestamp.
    pub created_at: i64,
}

impl Node {
    pub fn is_toc(&self) -> bool {
        self.kind == NodeKind::Toc
    }
}

/// Character count stored alongside `content`.
pub fn character_count(content: &str) -> i64 {
    content.chars().count() as i64
}

#[cfg(test)]
mod tests {
    use super::{character_count, NodeKind};

    #[test]
    fn character_count_counts_scalars_not_bytes() {
        assert_eq!(character_count("abc"), 3);
        assert_eq!(character_count("héllo"), 5);
        assert_eq!(character_count(""), 0);
    }

    #[test]
    fn node_kind_db_names_round_trip() {
        for kind in [NodeKind::Content, NodeKind::Toc] {
            assert_eq!(NodeKind::from_db(kind.as_db()), Some(kind));
        }
        assert_eq!(NodeKind::from_db("heading"), None);
    }
}
