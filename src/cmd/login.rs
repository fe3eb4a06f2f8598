// ============================================================================
// src/cmd/login.rs – Interactive authentication through the gate
// ============================================================================

use anyhow::Result;

use crate::cmd::base::{read_secret, Gate};
use crate::ui::UX;

pub fn run_login(ui: &UX, gate: &Gate, identity: &str, secret_stdin: bool) -> Result<bool> {
    let secret = read_secret(secret_stdin, &format!("Secret for {identity}"), false)?;

    match gate.auth.authenticate(identity, &secret) {
        Some(user) => {
            ui.success(&format!("Welcome, {}.", user.display_name));
            ui.emit_json(&user)?;
            Ok(true)
        }
        None => {
            // Deliberately uninformative; `sqlock status` has the detail.
            ui.error("Access denied.");
            Ok(false)
        }
    }
}
