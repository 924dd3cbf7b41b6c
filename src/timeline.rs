//! Date timeline parsing.
//!
//! Input rows carry free-text date expressions such as `"c. 1923-1939"`,
//! `"early 20th century"`, or `"Not dated"`. Each expression contributes
//! zero or more four-digit year tokens to a candidate's timeline; the
//! timeline stays sorted so its first and last entries are the live-span
//! bounds used for the external source filters.

use std::sync::LazyLock;

use regex::Regex;

use crate::models::Candidate;

/// A year, optionally preceded by a qualifier and followed by further
/// dates of two to four digits behind non-digit separators; of those
/// only the last one is captured.
static DATE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\D*(\d{4})(?:(?:\D\d{2,4})*(\D\d{2,4}))?").unwrap());

/// A two-digit century number with an optional qualifier prefix.
static CENTURY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\D+)?(\d{2}).*century").unwrap());

/// Parse one date expression into year tokens.
///
/// Unparseable expressions ("Not dated", empty strings, garbage) yield an
/// empty vector rather than an error; they simply contribute nothing.
///
/// A second date shorter than four digits is stored as captured — it is
/// not expanded with century digits borrowed from the first year. The
/// original data never disambiguates `"1923-39"`, so neither do we.
pub fn year_tokens(expr: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    if let Some(caps) = DATE.captures(expr) {
        tokens.push(caps[1].to_string());
        if let Some(second) = caps.get(2) {
            let digits = second
                .as_str()
                .trim_start_matches(|c: char| !c.is_ascii_digit());
            tokens.push(digits.to_string());
        }
    } else if let Some(caps) = CENTURY.captures(expr) {
        let century: u32 = caps[2].parse().unwrap_or(0);
        let base = century.saturating_sub(1) * 100;
        let qualifier = caps.get(1).map(|m| m.as_str()).unwrap_or("");
        let offset = if starts_with_ci(qualifier, "early") {
            25
        } else if starts_with_ci(qualifier, "late") {
            75
        } else {
            50
        };
        tokens.push((base + offset).to_string());
    }
    tokens
}

fn starts_with_ci(text: &str, prefix: &str) -> bool {
    text.to_ascii_lowercase().starts_with(prefix)
}

impl Candidate {
    /// Add one date expression to the timeline and keep it sorted.
    /// Duplicates are kept; only the bounds matter downstream.
    pub fn add_date(&mut self, expr: &str) {
        self.dates.extend(year_tokens(expr));
        self.dates.sort();
    }
}
