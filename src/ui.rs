// ============================================================================
// src/ui.rs – Console feedback for the sqlock CLI
// ============================================================================

use colored::Colorize;
use serde::Serialize;

/// Human-facing status lines go to stderr; stdout carries only JSON so the
/// CLI can be shelled out to and parsed.
#[derive(Debug, Clone, Copy, Default)]
pub struct UX {
    pub quiet: bool,
}

impl UX {
    pub fn new(quiet: bool) -> Self {
        Self { quiet }
    }

    pub fn info(&self, msg: &str) {
        if !self.quiet {
            eprintln!("{} {}", "[*]".cyan().bold(), msg);
        }
    }

    pub fn success(&self, msg: &str) {
        if !self.quiet {
            eprintln!("{} {}", "[+]".green().bold(), msg);
        }
    }

    pub fn warn(&self, msg: &str) {
        if !self.quiet {
            eprintln!("{} {}", "[!]".yellow().bold(), msg.yellow());
        }
    }

    /// Errors are shown even in quiet mode.
    pub fn error(&self, msg: &str) {
        eprintln!("{} {}", "[x]".red().bold(), msg.red());
    }

    pub fn emit_json<T: Serialize>(&self, value: &T) -> anyhow::Result<()> {
        println!("{}", serde_json::to_string(value)?);
        Ok(())
    }
}
