//! Table-of-contents outline model and collaborator seams.
//!
//! # Responsibility
//! - Define outline/segment shapes exchanged with external services.
//! - Validate collaborator output and build the heuristic fallback.
//! - Render the markdown body of the TOC node.
//! - Provide a configured JSON collaborator over a pluggable transport.
//!
//! # Invariants
//! - A stored `Outline` covers every content node exactly once.

pub mod build;
pub mod client;
pub mod model;
pub mod service;

pub use build::{fallback_outline, render_markdown, validate_outline, DEFAULT_OUTLINE_TITLE};
pub use client::{JsonServiceClient, JsonTransport, TransportFailure};
pub use model::{
    Importance, NodePreview, Outline, OutlineDraft, Section, SectionDraft, Segment,
};
pub use service::{
    ExternalServiceError, OutlineService, SegmentationService, ServiceConfig, UnavailableService,
};
