//! Pattern matchers for claim filters.
//!
//! A filter pattern may start with a dialect tag followed by `:`:
//!
//! | Tag | Meaning |
//! |---|---|
//! | `regex`, `re` | regular expression, case as written |
//! | `regexi` | regular expression, case-insensitive |
//! | `str`, `string` | whole-value comparison, case-insensitive |
//! | `exact` | whole-value comparison, case-sensitive |
//!
//! Anything else, including an unrecognized tag, is compiled whole as a
//! case-insensitive regular expression.

use regex::Regex;

/// Builds a matcher from the pattern text following a dialect tag.
type MatcherCtor = fn(&str) -> Result<Matcher, regex::Error>;

/// Dialect tag lookup table. Read-only for the life of the process.
static REGISTRY: [(&str, MatcherCtor); 6] = [
    ("regex", |p| Matcher::regex(p, false)),
    ("re", |p| Matcher::regex(p, false)),
    ("regexi", |p| Matcher::regex(p, true)),
    ("str", |p| Ok(Matcher::text(p, true))),
    ("string", |p| Ok(Matcher::text(p, true))),
    ("exact", |p| Ok(Matcher::text(p, false))),
];

fn lookup(tag: &str) -> Option<MatcherCtor> {
    REGISTRY
        .iter()
        .find(|(name, _)| *name == tag)
        .map(|(_, ctor)| *ctor)
}

/// A compiled filter pattern.
#[derive(Debug, Clone)]
pub enum Matcher {
    /// Unanchored regular expression search.
    Regex(Regex),
    /// Whole-value string comparison.
    Text {
        pattern: String,
        case_insensitive: bool,
    },
}

impl Matcher {
    /// Compiles a filter pattern, honoring an optional dialect tag.
    ///
    /// # Errors
    ///
    /// Returns the regex compile error for an invalid regular expression.
    pub fn parse(pattern: &str) -> Result<Self, regex::Error> {
        if let Some((tag, rest)) = pattern.split_once(':') {
            let tag = tag.trim().to_ascii_lowercase();
            if let Some(ctor) = lookup(&tag) {
                return ctor(rest.trim());
            }
        }
        Self::regex(pattern, true)
    }

    fn regex(pattern: &str, force_case_insensitive: bool) -> Result<Self, regex::Error> {
        let compiled = if force_case_insensitive && !declares_case_flag(pattern) {
            Regex::new(&format!("(?i){pattern}"))?
        } else {
            Regex::new(pattern)?
        };
        Ok(Self::Regex(compiled))
    }

    fn text(pattern: &str, case_insensitive: bool) -> Self {
        let pattern = if case_insensitive {
            pattern.to_lowercase()
        } else {
            pattern.to_string()
        };
        Self::Text {
            pattern,
            case_insensitive,
        }
    }

    /// Returns true if the value satisfies this matcher.
    #[must_use]
    pub fn is_match(&self, value: &str) -> bool {
        match self {
            Self::Regex(re) => re.is_match(value),
            Self::Text {
                pattern,
                case_insensitive: true,
            } => value.to_lowercase() == *pattern,
            Self::Text {
                pattern,
                case_insensitive: false,
            } => value == pattern,
        }
    }
}

/// True if the pattern opens with an inline flag group that sets or clears `i`,
/// e.g. `(?i)`, `(?-i)`, `(?im)` or `(?i:...)`.
fn declares_case_flag(pattern: &str) -> bool {
    let Some(rest) = pattern.strip_prefix("(?") else {
        return false;
    };
    let flags: String = rest
        .chars()
        .take_while(|c| *c != ')' && *c != ':')
        .collect();
    flags.contains('i') && flags.chars().all(|c| "imsUux-".contains(c))
}
