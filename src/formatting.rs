use unicode_width::{UnicodeWidthChar, UnicodeWidthStr};

/// Placeholder for control characters stripped from untrusted text
const REPLACEMENT: char = '\u{FFFD}';

/// Make externally sourced text safe to put on the terminal surface
///
/// Control characters (ESC, BEL, CR, ...) are replaced so a provider cannot inject
/// escape sequences. Tabs become a single space.
pub fn sanitize(s: &str) -> String {
    s.chars()
        .map(|c| match c {
            '\t' => ' ',
            c if c.is_control() => REPLACEMENT,
            c => c,
        })
        .collect()
}

/// Truncate a string to at most `max_width` terminal columns, adding an ellipsis when cut
pub fn truncate_to_width(s: &str, max_width: usize) -> String {
    if s.width() <= max_width {
        return s.to_string();
    }
    if max_width == 0 {
        return String::new();
    }

    let mut out = String::new();
    let mut width = 0;
    for c in s.chars() {
        let w = c.width().unwrap_or(0);
        if width + w + 1 > max_width {
            break;
        }
        out.push(c);
        width += w;
    }
    out.push('…');
    out
}

/// Pluralize a count: `plural(1, "breach", "breaches")` -> "1 breach"
pub fn plural(count: usize, one: &str, many: &str) -> String {
    if count == 1 {
        format!("{} {}", count, one)
    } else {
        format!("{} {}", count, many)
    }
}
