//! Session narrative: per-session append-only logs and the canonical digest.

pub mod digest;
pub mod format;
pub mod writer;
