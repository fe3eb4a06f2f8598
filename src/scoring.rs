// ============================================================================
// src/scoring.rs – Weighted SQL-injection suspicion scorer
// ============================================================================
//! Heuristic classifier for untrusted strings.
//!
//! Each signal is an entry in a fixed, ordered table. Signals are independent
//! and additive: every match adds its weight to one running total, and the
//! first matching signal names the verdict. The total is clamped to 0–100 and
//! anything at or above [`BLOCK_THRESHOLD`] is treated as malicious.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;

/// Scores at or above this value are blocked.
pub const BLOCK_THRESHOLD: u8 = 80;

const MAX_SCORE: u32 = 100;

const QUOTE_CONTEXT_WEIGHT: u32 = 50;
const BARE_QUOTE_WEIGHT: u32 = 5;
const DICTIONARY_WEIGHT: u32 = 100;
const DENSITY_WEIGHT: u32 = 20;
const DENSITY_LIMIT: usize = 3;
const DENSITY_CHARS: [char; 4] = ['\'', ';', '"', '-'];

/// Outcome of scoring one input.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScoreResult {
    pub is_malicious: bool,
    pub primary_reason: Option<&'static str>,
    pub score: u8,
}

impl ScoreResult {
    fn benign() -> Self {
        Self {
            is_malicious: false,
            primary_reason: None,
            score: 0,
        }
    }
}

enum Matcher {
    Pattern(Regex),
    Literal(&'static str),
}

impl Matcher {
    fn matches(&self, lowered: &str) -> bool {
        match self {
            Self::Pattern(re) => re.is_match(lowered),
            Self::Literal(needle) => lowered.contains(needle),
        }
    }
}

struct Signal {
    matcher: Matcher,
    weight: u32,
    reason: String,
}

/// A quote directly followed (modulo whitespace) by a boolean keyword,
/// terminator or comment opener.
static QUOTE_CONTEXT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"'\s*(or|and|;|--|#|/\*)").expect("Invalid regex: quote context pattern")
});

/// Structural patterns, in evaluation order.
const PATTERNS: &[(&str, u32, &str)] = &[
    (
        r"\b(union\s+select|union\s+all\s+select)\b",
        100,
        "UNION-based injection",
    ),
    (r"\b(select\s+.*\s+from)\b", 80, "Direct data extraction"),
    (
        r"\b(insert\s+into|update\s+.*set|delete\s+from)\b",
        90,
        "Data modification attempt",
    ),
    (
        r"\b(drop\s+table|alter\s+table|truncate\s+table)\b",
        100,
        "Destructive command",
    ),
    (r"\b(exec|execute)\s*\(", 90, "Code execution"),
    (
        r"(\b(or|and)\b\s*[\w']+\s*=\s*[\w']+)",
        80,
        "Tautology (OR 1=1)",
    ),
    (r"(--|#|/\*)", 30, "SQL Comment"),
    (r";", 30, "Statement stacking"),
];

/// Known signatures. Matched against the lower-cased input, so every entry
/// here is lower case.
const DICTIONARY: &[(&str, &str)] = &[
    ("1=1", "Tautology injection"),
    ("1'='1", "Quote tautology"),
    ("admin'--", "Admin bypass attempt"),
    ("' or '1'='1", "Classic OR injection"),
    ("' or 1=1--", "Numeric OR injection"),
    ("'; drop table", "Table drop attempt"),
    ("'; delete from", "Delete injection"),
    ("xp_", "Extended procedure"),
    ("sp_", "System procedure"),
    ("%27", "URL encoded single quote"),
    ("%22", "URL encoded double quote"),
    ("%3b", "URL encoded semicolon"),
    ("&#39;", "HTML encoded single quote"),
    ("&#34;", "HTML encoded double quote"),
    (" union ", "UNION injection"),
    (" select ", "SELECT injection"),
    (" insert ", "INSERT injection"),
    (" delete ", "DELETE injection"),
    (" update ", "UPDATE injection"),
    (" drop ", "DROP injection"),
    (" create ", "CREATE injection"),
    (" alter ", "ALTER injection"),
    (" truncate ", "TRUNCATE injection"),
    (" exec ", "EXEC injection"),
    (" execute ", "EXECUTE injection"),
];

static SIGNALS: Lazy<Vec<Signal>> = Lazy::new(|| {
    let structural = PATTERNS.iter().map(|(pattern, weight, reason)| Signal {
        matcher: Matcher::Pattern(
            Regex::new(pattern).expect("Invalid regex: structural signal pattern"),
        ),
        weight: *weight,
        reason: (*reason).to_string(),
    });
    let dictionary = DICTIONARY.iter().map(|(needle, description)| Signal {
        matcher: Matcher::Literal(*needle),
        weight: DICTIONARY_WEIGHT,
        reason: format!("{description} (Dictionary Match)"),
    });
    structural.chain(dictionary).collect()
});

const QUOTE_CONTEXT_REASON: &str = "Suspicious single quote usage";
const DENSITY_REASON: &str = "Multiple suspicious characters";

/// Score `input` for SQL-injection likelihood.
///
/// Never fails. Empty input scores 0.
pub fn score(input: &str) -> ScoreResult {
    if input.is_empty() {
        return ScoreResult::benign();
    }

    let lowered = input.to_lowercase();
    let mut total: u32 = 0;
    let mut primary: Option<&'static str> = None;
    let mut hit = |weight: u32, reason: Option<&'static str>| {
        total += weight;
        if primary.is_none() {
            primary = reason;
        }
    };

    // A lone apostrophe (O'Reilly) is weighted but never names the verdict.
    if QUOTE_CONTEXT.is_match(&lowered) {
        hit(QUOTE_CONTEXT_WEIGHT, Some(QUOTE_CONTEXT_REASON));
    } else if input.contains('\'') {
        hit(BARE_QUOTE_WEIGHT, None);
    }

    for signal in SIGNALS.iter() {
        if signal.matcher.matches(&lowered) {
            hit(signal.weight, Some(signal.reason.as_str()));
        }
    }

    let density = input.chars().filter(|c| DENSITY_CHARS.contains(c)).count();
    if density > DENSITY_LIMIT {
        hit(DENSITY_WEIGHT, Some(DENSITY_REASON));
    }

    let score = total.min(MAX_SCORE) as u8;
    ScoreResult {
        is_malicious: score >= BLOCK_THRESHOLD,
        primary_reason: primary,
        score,
    }
}
