// ============================================================================
// src/lib.rs – SQLock authentication gate
// ============================================================================
//! Injection-aware authentication with progressive lockout.
//!
//! [`scoring::score`] rates untrusted strings for SQL-injection likelihood,
//! [`lockout::LockoutEngine`] keeps per-identity lock state, and
//! [`auth::Authenticator`] ties both to a credential store and an audit sink.

pub mod auth;
pub mod clock;
pub mod config;
pub mod error;
pub mod lockout;
pub mod model;
pub mod scoring;
pub mod store;
pub mod util;

pub use auth::Authenticator;
pub use error::{AuthFailure, StoreError, StoreResult};
pub use lockout::{LockoutEngine, LockoutInfo, LockoutPolicy};
pub use model::{Credential, LockoutReason, PublicUser, SecurityRecord};
pub use scoring::{score, ScoreResult};
pub use util::deadline::Deadline;
