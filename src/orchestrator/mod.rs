//! Session orchestration modules.
//!
//! Covers identity resolution, the session lifecycle, quicksave
//! checkpoints with compliance checks, and read-side queries.

pub mod checkpoint_manager;
pub mod compliance;
pub mod memory;
pub mod registry;
pub mod resolution;
pub mod session_manager;
