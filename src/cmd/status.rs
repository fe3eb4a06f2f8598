// ============================================================================
// src/cmd/status.rs – Lockout inspection and administrative resets
// ============================================================================

use anyhow::{Context, Result};

use crate::cmd::base::Gate;
use crate::ui::UX;

pub fn run_status(ui: &UX, gate: &Gate, identity: &str) -> Result<bool> {
    let info = gate
        .auth
        .lockout()
        .lockout_info(identity)
        .context("read lockout state")?;

    if info.locked {
        ui.warn(&format!(
            "{identity} is locked for another {}s ({}).",
            info.seconds_remaining,
            info.detail.as_deref().unwrap_or("no detail")
        ));
    } else {
        ui.info(&format!(
            "{identity} is not locked ({} consecutive failures).",
            info.failures
        ));
    }
    ui.emit_json(&info)?;
    Ok(true)
}

/// Clears progressive state; injection flags are left in place.
pub fn run_reset(ui: &UX, gate: &Gate, identity: &str) -> Result<bool> {
    let info = gate
        .auth
        .lockout()
        .reset(identity)
        .context("reset lockout state")?;
    if info.is_injection_reason {
        ui.warn("Injection lockouts are not cleared by a reset; use `sqlock unlock`.");
    } else {
        ui.success(&format!("Failure counter cleared for {identity}."));
    }
    ui.emit_json(&info)?;
    Ok(true)
}

pub fn run_unlock(ui: &UX, gate: &Gate, identity: &str) -> Result<bool> {
    let info = gate
        .auth
        .lockout()
        .admin_override(identity)
        .context("override lockout state")?;
    ui.success(&format!("All lockout state cleared for {identity}."));
    ui.emit_json(&info)?;
    Ok(true)
}
