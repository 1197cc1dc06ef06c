//! Regex admission filter over file paths and symbol names

use capi_core::{Error, Result};
use regex::Regex;

/// Include/exclude regex gate
///
/// Patterns are unanchored searches. An exclusion wins unless an include
/// pattern also matches.
#[derive(Debug, Clone, Default)]
pub struct PatternFilter {
    include: Vec<Regex>,
    exclude: Vec<Regex>,
}

impl PatternFilter {
    /// Compile both pattern lists. A malformed pattern is an error.
    pub fn new<S: AsRef<str>>(include: &[S], exclude: &[S]) -> Result<Self> {
        Ok(Self {
            include: compile(include)?,
            exclude: compile(exclude)?,
        })
    }

    /// A filter that admits everything
    pub fn allow_all() -> Self {
        Self::default()
    }

    pub fn admits(&self, candidate: &str) -> bool {
        let included = || self.include.iter().any(|re| re.is_match(candidate));

        if self.exclude.is_empty() {
            return self.include.is_empty() || included();
        }

        if !self.exclude.iter().any(|re| re.is_match(candidate)) {
            return true;
        }

        !self.include.is_empty() && included()
    }
}

fn compile<S: AsRef<str>>(patterns: &[S]) -> Result<Vec<Regex>> {
    patterns
        .iter()
        .map(|p| {
            let pattern = p.as_ref();
            Regex::new(pattern).map_err(|source| Error::InvalidPattern {
                pattern: pattern.to_string(),
                source,
            })
        })
        .collect()
}
