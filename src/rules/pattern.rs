//! Rule string parsing
//!
//! A rule is either a bare regex body (`youtube.com/shorts/*`) or a
//! delimited regex with trailing flags (`/tiktok\.com\/@.+/i`).

use once_cell::sync::Lazy;
use regex::{Regex, RegexBuilder};
use thiserror::Error;

/// Flags accepted after the closing delimiter
pub const FLAG_ALPHABET: &str = "gimsuy";

/// `/body/flags` form. The body is greedy, so the last `/` followed only by
/// flag characters closes the pattern.
static DELIMITED: Lazy<Regex> = Lazy::new(|| Regex::new(r"^/(.+)/([gimsuy]*)$").unwrap());

/// Why a rule string failed to compile
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RuleError {
    /// The regex body is not valid for the matcher engine
    #[error("invalid regular expression: {0}")]
    InvalidRegex(String),

    /// A flag appears more than once (`/x/ii`)
    #[error("duplicate flag '{0}'")]
    DuplicateFlag(char),
}

/// Regex modifiers extracted from the flag suffix
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Flags {
    pub case_insensitive: bool,
    pub multi_line: bool,
    pub dot_all: bool,
    pub unicode: bool,
    pub global: bool,
    pub sticky: bool,
}

impl Flags {
    /// Parse a flag suffix; every character must come from [`FLAG_ALPHABET`]
    pub fn parse(flags: &str) -> Result<Self, RuleError> {
        let mut parsed = Flags::default();

        for c in flags.chars() {
            let slot = match c {
                'i' => &mut parsed.case_insensitive,
                'm' => &mut parsed.multi_line,
                's' => &mut parsed.dot_all,
                'u' => &mut parsed.unicode,
                'g' => &mut parsed.global,
                'y' => &mut parsed.sticky,
                other => {
                    return Err(RuleError::InvalidRegex(format!("unknown flag '{}'", other)))
                }
            };
            if *slot {
                return Err(RuleError::DuplicateFlag(c));
            }
            *slot = true;
        }

        Ok(parsed)
    }
}

/// A rule split into regex body and flags
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RulePattern<'a> {
    pub body: &'a str,
    pub flags: &'a str,
}

impl<'a> RulePattern<'a> {
    /// Split a rule string. Strings not in `/body/flags` form are taken whole
    /// as the body with no flags.
    pub fn parse(rule: &'a str) -> Self {
        match DELIMITED.captures(rule) {
            Some(caps) => {
                let body = caps.get(1).map_or(rule, |m| m.as_str());
                let flags = caps.get(2).map_or("", |m| m.as_str());
                RulePattern { body, flags }
            }
            None => RulePattern { body: rule, flags: "" },
        }
    }

    /// Build the matcher for this pattern
    pub fn build(&self) -> Result<Regex, RuleError> {
        let flags = Flags::parse(self.flags)?;

        // `g` has no effect on a yes/no test; `u` is always on.
        let body = if flags.sticky {
            format!(r"\A(?:{})", self.body)
        } else {
            self.body.to_string()
        };

        RegexBuilder::new(&body)
            .case_insensitive(flags.case_insensitive)
            .multi_line(flags.multi_line)
            .dot_matches_new_line(flags.dot_all)
            .unicode(true)
            .build()
            .map_err(|e| RuleError::InvalidRegex(e.to_string()))
    }
}

/// Compile one rule string into a matcher
pub fn build_matcher(rule: &str) -> Result<Regex, RuleError> {
    RulePattern::parse(rule).build()
}
