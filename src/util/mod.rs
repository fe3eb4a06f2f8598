// ============================================================================
// src/util/mod.rs – re-exports for utility modules
// ============================================================================

pub mod atomic;
pub mod audit;
pub mod deadline;
pub mod digest;
pub mod flock;
