// ============================================================================
// src/cmd/scan.rs – Score a raw string, optionally locking an identity
// ============================================================================

use anyhow::Result;
use serde::Serialize;

use crate::cmd::base::Gate;
use crate::ui::UX;

/// JSON shape consumed by callers that shell out to `sqlock scan`.
#[derive(Debug, Serialize)]
pub struct ScanReport {
    pub success: bool,
    pub malicious: bool,
    pub pattern: Option<&'static str>,
    pub score: u8,
    pub lockout_applied: bool,
}

pub fn run_scan(
    ui: &UX,
    gate: &Gate,
    query: &str,
    username: Option<&str>,
    apply_lockout: bool,
) -> Result<bool> {
    let lock_identity = username.filter(|_| apply_lockout);
    let (verdict, applied) = gate.auth.screen(query, lock_identity);

    let (success, lockout_applied) = match applied {
        Ok(applied) => (true, applied),
        Err(e) => {
            ui.error(&format!("Lockout could not be applied: {e}"));
            (false, false)
        }
    };

    if verdict.is_malicious {
        ui.warn(&format!(
            "Blocked (score {}): {}",
            verdict.score,
            verdict.primary_reason.unwrap_or("suspicious input")
        ));
    } else {
        ui.info(&format!("Allowed (score {}).", verdict.score));
    }

    ui.emit_json(&ScanReport {
        success,
        malicious: verdict.is_malicious,
        pattern: verdict.primary_reason,
        score: verdict.score,
        lockout_applied,
    })?;
    Ok(success)
}
