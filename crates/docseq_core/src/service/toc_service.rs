//! Table-of-contents insertion coordinator.
//!
//! # Responsibility
//! - Ask the outline collaborator for sections, outside any transaction.
//! - Fall back to a heuristic outline when the collaborator fails.
//! - Insert the rendered TOC node at position 0 together with its outline.
//!
//! # Invariants
//! - At most one TOC node per document; repeated calls without
//!   `regenerate` never call the collaborator and change nothing.
//! - Stored outlines cover every content node exactly once.

use crate::model::document::DocumentId;
use crate::model::node::{Node, NodeId};
use crate::outline::{
    fallback_outline, render_markdown, validate_outline, NodePreview, Outline, OutlineService,
};
use crate::repo::node_repo::NodeRepository;
use crate::service::sequence_service::{SequenceError, SequenceService};
use crate::text::heading::{HeadingDetector, HeuristicHeadingDetector};
use log::{info, warn};
use std::time::Instant;

const DEFAULT_PREVIEW_CHARS: usize = 500;
const MIN_TOC_NODES: usize = 2;

/// Coordinator settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TocConfig {
    /// Characters of each content node sent to the collaborator.
    pub preview_chars: usize,
}

impl Default for TocConfig {
    fn default() -> Self {
        Self {
            preview_chars: DEFAULT_PREVIEW_CHARS,
        }
    }
}

/// Outcome of one `generate_table_of_contents` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TocResult {
    pub toc_node_id: NodeId,
    pub sections_created: usize,
    /// Zero when an existing TOC was returned as-is.
    pub processing_time_ms: u64,
    pub already_existed: bool,
}

pub struct TocService<R: NodeRepository, O: OutlineService> {
    sequence: SequenceService<R>,
    outline_service: O,
    detector: Box<dyn HeadingDetector>,
    config: TocConfig,
}

impl<R: NodeRepository, O: OutlineService> TocService<R, O> {
    pub fn new(sequence: SequenceService<R>, outline_service: O) -> Self {
        Self {
            sequence,
            outline_service,
            detector: Box::new(HeuristicHeadingDetector),
            config: TocConfig::default(),
        }
    }

    /// Replaces the heading strategy used for fallback and gap titles.
    pub fn with_detector(mut self, detector: Box<dyn HeadingDetector>) -> Self {
        self.detector = detector;
        self
    }

    pub fn with_config(mut self, config: TocConfig) -> Self {
        self.config = config;
        self
    }

    /// Prepends a TOC node built from the document's content nodes.
    ///
    /// With `regenerate == false` an existing TOC is returned untouched.
    /// With `regenerate == true` the old TOC is deleted first and a new one
    /// is generated.
    pub fn generate_table_of_contents(
        &self,
        document_uuid: DocumentId,
        regenerate: bool,
    ) -> Result<TocResult, SequenceError> {
        let started = Instant::now();
        let document = self.sequence.load_owned_document(document_uuid)?;
        let nodes = self.sequence.list_nodes(document_uuid)?;
        let content_count = nodes.iter().filter(|node| !node.is_toc()).count();
        if content_count < MIN_TOC_NODES {
            return Err(SequenceError::Validation(format!(
                "a table of contents needs at least {MIN_TOC_NODES} content nodes, found {content_count}"
            )));
        }

        if let Some(existing) = nodes.iter().find(|node| node.is_toc()) {
            if !regenerate {
                info!(
                    "event=toc_generate module=service status=ok document={document_uuid} already_existed=true"
                );
                return Ok(TocResult {
                    toc_node_id: existing.node_uuid,
                    sections_created: document.outline_section_count(),
                    processing_time_ms: 0,
                    already_existed: true,
                });
            }
            self.sequence.delete_node(existing.node_uuid)?;
        }

        let previews: Vec<NodePreview> = nodes
            .iter()
            .filter(|node| !node.is_toc())
            .enumerate()
            .map(|(index, node)| NodePreview {
                position: index + 1,
                content_preview: node.content.chars().take(self.config.preview_chars).collect(),
            })
            .collect();
        let outline = self.build_outline(document_uuid, &previews);
        let rendered = render_markdown(&outline);
        let toc = self
            .sequence
            .install_toc(document_uuid, &rendered, &outline)?;

        let processing_time_ms = started.elapsed().as_millis() as u64;
        info!(
            "event=toc_generate module=service status=ok document={document_uuid} sections={} regenerate={regenerate} duration_ms={processing_time_ms}",
            outline.sections.len()
        );
        Ok(TocResult {
            toc_node_id: toc.node_uuid,
            sections_created: outline.sections.len(),
            processing_time_ms,
            already_existed: false,
        })
    }

    pub fn get_toc_node(&self, document_uuid: DocumentId) -> Result<Option<Node>, SequenceError> {
        self.sequence.find_toc(document_uuid)
    }

    pub fn has_toc(&self, document_uuid: DocumentId) -> Result<bool, SequenceError> {
        Ok(self.get_toc_node(document_uuid)?.is_some())
    }

    /// Replaces the rendered TOC text; the stored outline is kept.
    pub fn update_toc_content(
        &self,
        document_uuid: DocumentId,
        content: &str,
    ) -> Result<Node, SequenceError> {
        let toc = self.get_toc_node(document_uuid)?.ok_or_else(|| {
            SequenceError::Validation(format!("document {document_uuid} has no TOC node"))
        })?;
        self.sequence.update_node_content(toc.node_uuid, content)
    }

    fn build_outline(&self, document_uuid: DocumentId, previews: &[NodePreview]) -> Outline {
        let detector = self.detector.as_ref();
        match self.outline_service.outline(previews) {
            Ok(draft) => validate_outline(draft, previews, detector),
            Err(err) => {
                warn!(
                    "event=toc_outline module=service status=fallback document={document_uuid} reason={}",
                    err.code()
                );
                fallback_outline(previews, detector)
            }
        }
    }
}
