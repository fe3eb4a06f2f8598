// ============================================================================
// src/cmd/mod.rs – command subsystem root
// ============================================================================
pub mod base; // store wiring + secret input
pub mod enroll; // sqlock enroll
pub mod login; // sqlock login
pub mod scan; // sqlock scan
pub mod status; // sqlock status | reset | unlock

pub use base::Gate;
