//! Pure text heuristics: heading detection and fallback paragraph splitting.

pub mod heading;
pub mod partition;
