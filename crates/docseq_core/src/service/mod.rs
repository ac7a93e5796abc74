//! Use-case services over the node repository.
//!
//! # Responsibility
//! - Validate requests and enforce ownership before any write.
//! - Coordinate collaborators with structural operations.

pub mod segment_service;
pub mod sequence_service;
pub mod toc_service;
