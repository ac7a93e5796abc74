//! Resegmentation of a document from its raw text.
//!
//! # Responsibility
//! - Ask the segmentation collaborator for boundaries, outside any transaction.
//! - Fall back to the paragraph partitioner on any collaborator failure.
//! - Replace every node of the document in one transaction.
//!
//! # Invariants
//! - Accepted segments are sorted, in range, and do not overlap.
//! - A resegmented document has no TOC node and no stored outline.

use crate::model::document::DocumentId;
use crate::outline::{ExternalServiceError, Segment, SegmentationService};
use crate::repo::node_repo::NodeRepository;
use crate::service::sequence_service::{SequenceError, SequenceService};
use crate::text::heading::{HeadingDetector, HeuristicHeadingDetector};
use crate::text::partition::partition_with;
use log::{info, warn};
use std::time::Instant;

/// Outcome of one `resegment` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResegmentResult {
    pub nodes_created: usize,
    /// Whether the paragraph partitioner produced the nodes.
    pub used_fallback: bool,
}

pub struct SegmentService<R: NodeRepository, S: SegmentationService> {
    sequence: SequenceService<R>,
    segmenter: S,
    detector: Box<dyn HeadingDetector>,
}

impl<R: NodeRepository, S: SegmentationService> SegmentService<R, S> {
    pub fn new(sequence: SequenceService<R>, segmenter: S) -> Self {
        Self {
            sequence,
            segmenter,
            detector: Box::new(HeuristicHeadingDetector),
        }
    }

    pub fn with_detector(mut self, detector: Box<dyn HeadingDetector>) -> Self {
        self.detector = detector;
        self
    }

    /// Rebuilds all nodes of a document from its raw content.
    pub fn resegment(&self, document_uuid: DocumentId) -> Result<ResegmentResult, SequenceError> {
        let started = Instant::now();
        let document = self.sequence.load_owned_document(document_uuid)?;
        let raw = document.raw_content.as_str();
        if raw.trim().is_empty() {
            return Err(SequenceError::Validation(
                "document has no raw content to segment".to_string(),
            ));
        }

        let segmented = self
            .segmenter
            .segment(raw)
            .and_then(|segments| slice_segments(raw, segments));
        let (contents, used_fallback) = match segmented {
            Ok(contents) if !contents.is_empty() => (contents, false),
            Ok(_) => {
                warn!(
                    "event=resegment module=service status=fallback document={document_uuid} reason=no_segments"
                );
                (self.fallback_contents(raw), true)
            }
            Err(err) => {
                warn!(
                    "event=resegment module=service status=fallback document={document_uuid} reason={}",
                    err.code()
                );
                (self.fallback_contents(raw), true)
            }
        };

        let nodes = self.sequence.replace_nodes(document_uuid, &contents)?;
        info!(
            "event=resegment module=service status=ok document={document_uuid} nodes={} fallback={used_fallback} duration_ms={}",
            nodes.len(),
            started.elapsed().as_millis()
        );
        Ok(ResegmentResult {
            nodes_created: nodes.len(),
            used_fallback,
        })
    }

    fn fallback_contents(&self, raw: &str) -> Vec<String> {
        let paragraphs = partition_with(raw, self.detector.as_ref());
        if paragraphs.is_empty() {
            vec![raw.trim().to_string()]
        } else {
            paragraphs
        }
    }
}

/// Cuts `raw` along character-offset segments, trimming each piece.
pub(crate) fn slice_segments(
    raw: &str,
    mut segments: Vec<Segment>,
) -> Result<Vec<String>, ExternalServiceError> {
    let mut byte_offsets: Vec<usize> = raw.char_indices().map(|(offset, _)| offset).collect();
    byte_offsets.push(raw.len());
    let char_len = byte_offsets.len() - 1;

    segments.sort_by_key(|segment| segment.start_offset);
    let mut previous_end = 0;
    let mut contents = Vec::with_capacity(segments.len());
    for segment in &segments {
        if segment.start_offset >= segment.end_offset
            || segment.end_offset > char_len
            || segment.start_offset < previous_end
        {
            return Err(ExternalServiceError::InvalidResponse(format!(
                "segment {}..{} is empty, overlapping, or beyond {char_len} chars",
                segment.start_offset, segment.end_offset
            )));
        }
        previous_end = segment.end_offset;

        let text = raw[byte_offsets[segment.start_offset]..byte_offsets[segment.end_offset]].trim();
        if !text.is_empty() {
            contents.push(text.to_string());
        }
    }
    Ok(contents)
}
