//! Node-sequencing engine for documents made of ordered text nodes.
//! Every structural change keeps node positions dense and unique.

pub mod db;
pub mod logging;
pub mod model;
pub mod outline;
pub mod repo;
pub mod service;
pub mod text;

pub use db::{open_db, open_db_in_memory, DbError, DbResult};
pub use logging::{default_log_level, init_logging, logging_status, LogLevel, LoggingError};
pub use model::document::{Document, DocumentId, LOCAL_OWNER};
pub use model::node::{Node, NodeId, NodeKind};
pub use outline::{
    ExternalServiceError, Importance, JsonServiceClient, JsonTransport, NodePreview, Outline,
    OutlineDraft, OutlineService, Section, Segment, SegmentationService, ServiceConfig,
    TransportFailure, UnavailableService,
};
pub use repo::node_repo::{NodeRepoError, NodeRepoResult, NodeRepository, SqliteNodeRepository};
pub use repo::renumber::{RenumberReport, RenumberStrategy};
pub use service::segment_service::{ResegmentResult, SegmentService};
pub use service::sequence_service::{SequenceError, SequenceService, MAX_BULK_CREATE};
pub use service::toc_service::{TocConfig, TocResult, TocService};
pub use text::heading::{HeadingDetector, HeuristicHeadingDetector};
pub use text::partition::{partition, partition_with};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
