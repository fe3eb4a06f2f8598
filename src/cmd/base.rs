// ============================================================================
// src/cmd/base.rs – Wiring shared by every subcommand
// ============================================================================

use anyhow::{Context, Result};
use dialoguer::Password;
use std::io::{self, BufRead};
use std::sync::Arc;
use zeroize::Zeroizing;

use sqlock::config::Config;
use sqlock::store::{FileCredentialStore, FileSecurityStore};
use sqlock::util::audit::{AuditSink, FileAuditSink, NullAuditSink};
use sqlock::{Authenticator, LockoutEngine};

/// Fully wired gate over the configured file stores.
pub struct Gate {
    pub auth: Authenticator,
    pub credentials: Arc<FileCredentialStore>,
}

impl Gate {
    pub fn open(cfg: &Config) -> Result<Self> {
        let state = FileSecurityStore::open(&cfg.store.state_path)
            .with_context(|| format!("open security state {}", cfg.store.state_path))?;
        let credentials = Arc::new(FileCredentialStore::open(&cfg.store.credentials_path));
        let audit: Arc<dyn AuditSink> = if cfg.audit.enabled {
            Arc::new(FileAuditSink::new(&cfg.audit.log_path, cfg.audit.timeout())?)
        } else {
            Arc::new(NullAuditSink)
        };

        let lockout = LockoutEngine::new(Arc::new(state)).with_timeout(cfg.store.timeout());
        let auth = Authenticator::new(credentials.clone(), lockout, audit);
        Ok(Self { auth, credentials })
    }
}

/// Read a secret from the first line of stdin, or prompt without echo.
pub fn read_secret(from_stdin: bool, prompt: &str, confirm: bool) -> Result<Zeroizing<String>> {
    if from_stdin {
        let mut line = Zeroizing::new(String::new());
        io::stdin()
            .lock()
            .read_line(&mut line)
            .context("read secret from stdin")?;
        let trimmed = Zeroizing::new(line.trim_end_matches(['\r', '\n']).to_string());
        return Ok(trimmed);
    }

    let mut prompt = Password::new().with_prompt(prompt).allow_empty_password(false);
    if confirm {
        prompt = prompt.with_confirmation("Repeat secret", "Secrets do not match");
    }
    let secret = prompt.interact().context("read secret input")?;
    Ok(Zeroizing::new(secret))
}
