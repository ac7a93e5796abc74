//! Outline and segmentation data shapes.
//!
//! Drafts are what collaborators return and may be malformed; `Outline` is
//! the validated form stored on the document.

use crate::outline::service::ExternalServiceError;
use serde::{Deserialize, Serialize};

/// Weight of an outline section.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Importance {
    Primary,
    Secondary,
    Supporting,
}

impl Importance {
    /// Parses a collaborator label; unknown labels yield `None`.
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "primary" => Some(Self::Primary),
            "secondary" => Some(Self::Secondary),
            "supporting" => Some(Self::Supporting),
            _ => None,
        }
    }

    /// Markdown heading marker used when rendering the TOC node.
    pub fn heading_marker(self) -> &'static str {
        match self {
            Self::Primary => "##",
            Self::Secondary => "###",
            Self::Supporting => "####",
        }
    }
}

/// One validated outline section.
///
/// `start_node`/`end_node` are 1-based inclusive ordinals over the content
/// nodes, which equal node positions once the TOC node sits at position 0.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Section {
    pub title: String,
    pub start_node: usize,
    pub end_node: usize,
    pub importance: Importance,
}

impl Section {
    pub fn node_range_label(&self) -> String {
        node_range_label(self.start_node, self.end_node)
    }
}

/// Validated outline persisted on the document record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Outline {
    pub title: String,
    pub sections: Vec<Section>,
}

impl Outline {
    /// Whether sections cover `1..=total` exactly once, in order.
    pub fn covers_exactly(&self, total: usize) -> bool {
        let mut next = 1;
        for section in &self.sections {
            if section.start_node != next || section.end_node < section.start_node {
                return false;
            }
            next = section.end_node + 1;
        }
        next == total + 1
    }
}

/// Preview of one content node sent to the outline collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NodePreview {
    /// 1-based ordinal among content nodes.
    pub position: usize,
    pub content_preview: String,
}

/// Outline as proposed by a collaborator, before validation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct OutlineDraft {
    #[serde(default)]
    pub title: Option<String>,
    /// Required: a payload without `sections` is not an outline at all.
    pub sections: Vec<SectionDraft>,
}

/// Section as proposed by a collaborator, before validation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct SectionDraft {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub start_node: Option<i64>,
    #[serde(default)]
    pub end_node: Option<i64>,
    #[serde(default)]
    pub importance: Option<String>,
}

impl OutlineDraft {
    /// Decodes the collaborator's JSON payload.
    pub fn from_json(payload: &str) -> Result<Self, ExternalServiceError> {
        serde_json::from_str(payload)
            .map_err(|err| ExternalServiceError::InvalidResponse(format!("outline json: {err}")))
    }
}

/// Character range proposed by the segmentation collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Segment {
    /// Inclusive start, counted in characters of the raw text.
    pub start_offset: usize,
    /// Exclusive end, counted in characters of the raw text.
    pub end_offset: usize,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub importance_level: Option<String>,
}

#[derive(Deserialize)]
struct SegmentEnvelope {
    segments: Vec<Segment>,
}

impl Segment {
    /// Decodes a `{"segments": [...]}` payload.
    pub fn list_from_json(payload: &str) -> Result<Vec<Self>, ExternalServiceError> {
        serde_json::from_str::<SegmentEnvelope>(payload)
            .map(|envelope| envelope.segments)
            .map_err(|err| ExternalServiceError::InvalidResponse(format!("segment json: {err}")))
    }
}

pub(crate) fn node_range_label(start: usize, end: usize) -> String {
    if start == end {
        format!("Node {start}")
    } else {
        format!("Nodes {start}-{end}")
    }
}

#[cfg(test)]
mod tests {
    use super::{Importance, Outline, OutlineDraft, Section, Segment};

    fn section(start_node: usize, end_node: usize) -> Section {
        Section {
            title: format!("s{start_node}"),
            start_node,
            end_node,
            importance: Importance::Secondary,
        }
    }

    #[test]
    fn importance_parse_is_case_insensitive() {
        assert_eq!(Importance::parse(" Primary "), Some(Importance::Primary));
        assert_eq!(Importance::parse("minor"), None);
    }

    #[test]
    fn covers_exactly_detects_gaps_and_overlaps() {
        let full = Outline {
            title: "t".to_string(),
            sections: vec![section(1, 2), section(3, 5)],
        };
        assert!(full.covers_exactly(5));
        assert!(!full.covers_exactly(6));

        let gap = Outline {
            title: "t".to_string(),
            sections: vec![section(1, 2), section(4, 5)],
        };
        assert!(!gap.covers_exactly(5));
    }

    #[test]
    fn draft_tolerates_missing_fields() {
        let draft = OutlineDraft::from_json(
            r#"{"sections":[{"title":"Intro","start_node":1,"end_node":2},{"description":"x"}]}"#,
        )
        .unwrap();
        assert_eq!(draft.title, None);
        assert_eq!(draft.sections.len(), 2);
        assert_eq!(draft.sections[1].start_node, None);
    }

    #[test]
    fn malformed_json_is_an_invalid_response() {
        assert!(OutlineDraft::from_json("not json").is_err());
        assert!(OutlineDraft::from_json(r#"{"title":"No sections"}"#).is_err());
        assert!(Segment::list_from_json(r#"{"items":[]}"#).is_err());
    }

    #[test]
    fn segments_decode_from_envelope() {
        let segments = Segment::list_from_json(
            r#"{"segments":[{"start_offset":0,"end_offset":4,"title":"A","importance_level":"primary"}]}"#,
        )
        .unwrap();
        assert_eq!(segments.len(), 1);
        assert_eq!(segments[0].end_offset, 4);
    }
}
