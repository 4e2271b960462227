//! Domain model module declarations.

pub mod artifact;
pub mod node;
pub mod outcome;
pub mod session;
