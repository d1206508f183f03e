//! Query parameter helpers for the login entry point.

use url::{ParseError, Position, Url};

/// Base used to resolve relative paths. Never leaves this module.
const PLACEHOLDER_BASE: &str = "http://redirect.invalid/";

/// Reduces a caller-supplied return path to a same-origin path.
///
/// Anything that is not a plain absolute path (`/...`) becomes `/`. The
/// result keeps the path, query and fragment of the input.
#[must_use]
pub fn sanitize_redirect_path(dest: &str) -> String {
    let dest = dest.trim();
    if !dest.starts_with('/') || dest.starts_with("//") || dest.starts_with("/\\") {
        return "/".to_string();
    }

    // A path must not parse as a URL on its own.
    match Url::parse(dest) {
        Err(ParseError::RelativeUrlWithoutBase) => {}
        _ => return "/".to_string(),
    }

    let Ok(base) = Url::parse(PLACEHOLDER_BASE) else {
        return "/".to_string();
    };
    let Ok(resolved) = base.join(dest) else {
        return "/".to_string();
    };
    if resolved.host_str() != base.host_str()
        || resolved.scheme() != base.scheme()
        || resolved.port() != base.port()
        || !resolved.username().is_empty()
    {
        return "/".to_string();
    }

    let path = &resolved[Position::BeforePath..];
    if path.starts_with("//") {
        return "/".to_string();
    }
    path.to_string()
}

/// Parses a boolean query flag. `1`, `t` and `true` in any case are true.
#[must_use]
pub fn parse_bool_query(value: &str) -> bool {
    let value = value.trim();
    value == "1" || value.eq_ignore_ascii_case("t") || value.eq_ignore_ascii_case("true")
}
