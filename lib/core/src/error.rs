//! Shared `Result` alias.
//!
//! Crates define their own error enums (`ConfigError`, `ProviderError`, ...)
//! and carry them in a rootcause [`Report`] so callers can log the full
//! chain of context.

use rootcause::Report;

/// `Result` carrying a rootcause report with context type `C`.
pub type Result<T, C = ()> = std::result::Result<T, Report<C>>;

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    struct LookupFailed;

    impl std::fmt::Display for LookupFailed {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            write!(f, "lookup failed")
        }
    }

    impl std::error::Error for LookupFailed {}

    fn lookup(found: bool) -> Result<&'static str, LookupFailed> {
        if found {
            Ok("subject")
        } else {
            Err(LookupFailed.into())
        }
    }

    #[test]
    fn result_alias_carries_value_or_report() {
        assert_eq!(lookup(true).expect("should be ok"), "subject");
        let report = lookup(false).unwrap_err();
        assert!(report.to_string().contains("lookup failed"));
    }
}
