// ============================================================================
// src/cmd/enroll.rs – Add or replace an account in the credential file
// ============================================================================

use anyhow::{bail, Context, Result};

use crate::cmd::base::{read_secret, Gate};
use crate::ui::UX;

pub struct EnrollArgs<'a> {
    pub id: Option<u64>,
    pub identity: &'a str,
    pub display_name: &'a str,
    pub contact: &'a str,
    pub secret_stdin: bool,
}

pub fn run_enroll(ui: &UX, gate: &Gate, args: EnrollArgs<'_>) -> Result<bool> {
    if args.identity.is_empty() {
        bail!("identity must not be empty");
    }
    let verdict = sqlock::score(args.identity);
    if verdict.is_malicious {
        bail!(
            "identity rejected by the injection scorer ({})",
            verdict.primary_reason.unwrap_or("suspicious input")
        );
    }

    let secret = read_secret(
        args.secret_stdin,
        &format!("New secret for {}", args.identity),
        !args.secret_stdin,
    )?;
    if secret.is_empty() {
        bail!("secret must not be empty");
    }

    let credential = gate
        .credentials
        .enroll(
            args.id,
            args.identity,
            args.display_name,
            args.contact,
            &secret,
            gate.auth.lockout().deadline(),
        )
        .context("write credential store")?;

    ui.success(&format!(
        "Enrolled {} with id {}.",
        credential.identity, credential.id
    ));
    ui.emit_json(&credential.public())?;
    Ok(true)
}
