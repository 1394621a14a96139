//! Response cleanup applied to every reply before it reaches a caller

const QUOTES: [char; 2] = ['"', '\''];

/// Trim a reply and strip one layer of wrapping quotes
///
/// The outer pair is only stripped when it wraps the whole reply as a single
/// quoted span: the same straight quote at both ends and none in between.
/// Quotes anywhere else are left alone. A pair is also kept when stripping it
/// would expose another wrapped span, so applying this twice never changes
/// the result.
pub fn sanitize(text: &str) -> String {
    let trimmed = text.trim();

    match quoted_span(trimmed) {
        Some(inner) if quoted_span(inner.trim()).is_none() => inner.trim().to_string(),
        _ => trimmed.to_string(),
    }
}

/// Inner text of `s` when all of `s` is one quoted span
///
/// Inside a single-quoted span, apostrophes between two alphanumerics
/// (`don't`, `Maya's`) do not close the span.
fn quoted_span(s: &str) -> Option<&str> {
    let quote = s.chars().next().filter(|c| QUOTES.contains(c))?;
    let inner = s.strip_prefix(quote)?.strip_suffix(quote)?;

    let chars: Vec<char> = inner.chars().collect();
    let closes_early = chars
        .iter()
        .enumerate()
        .any(|(i, &c)| c == quote && !(quote == '\'' && is_apostrophe(&chars, i)));
    (!closes_early).then_some(inner)
}

fn is_apostrophe(chars: &[char], i: usize) -> bool {
    i > 0
        && chars[i - 1].is_alphanumeric()
        && chars.get(i + 1).is_some_and(|c| c.is_alphanumeric())
}
