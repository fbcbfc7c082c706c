//! Display hygiene for user-supplied text. Queries are always parameterized; nothing
//! here is an injection defense.

/// Trims and drops control characters, keeping newlines and tabs.
pub fn clean_text(raw: &str) -> String {
    let kept: String = raw
        .chars()
        .filter(|c| !c.is_control() || matches!(c, '\n' | '\t'))
        .collect();
    kept.trim().to_string()
}

/// Single-line variant for titles and search terms.
pub fn clean_line(raw: &str) -> String {
    clean_text(raw)
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Escapes `%`, `_` and `\` so the term matches literally inside `LIKE ... ESCAPE '\'`.
pub fn escape_like(term: &str) -> String {
    let mut out = String::with_capacity(term.len());
    for c in term.chars() {
        if matches!(c, '%' | '_' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}
