use std::borrow::Cow;

/// UTF-8 punctuation that was decoded as Windows-1252 somewhere upstream,
/// paired with what it was meant to be. Longest sequences first.
const MOJIBAKE: [(&str, &str); 8] = [
    ("\u{e2}\u{20ac}\u{2122}", "'"),
    ("\u{e2}\u{20ac}\u{2dc}", "'"),
    ("\u{e2}\u{20ac}\u{153}", "\""),
    ("\u{e2}\u{20ac}\u{9d}", "\""),
    ("\u{e2}\u{20ac}\u{201c}", "-"),
    ("\u{e2}\u{20ac}\u{201d}", "-"),
    ("\u{e2}\u{20ac}\u{a6}", "..."),
    ("\u{c2}\u{a0}", " "),
];

/// Normalizes a plain-text description for display in feed readers.
///
/// - Strips control characters and ANSI sequences ([`strip_control_chars`])
/// - Repairs common UTF-8-as-Windows-1252 punctuation mojibake
/// - Folds typographic quotes, dashes and ellipses to ASCII
/// - Collapses whitespace runs (including NBSP) to one space and drops
///   zero-width spaces
/// - Trims both ends
///
/// Returns `Cow::Borrowed` when nothing needed changing.
///
/// # Examples
///
/// ```
/// use feedmerge::util::sanitize_text;
///
/// assert_eq!(sanitize_text("  It\u{2019}s   here\u{2026} "), "It's here...");
/// assert_eq!(sanitize_text("clean"), "clean");
/// ```
pub fn sanitize_text(s: &str) -> Cow<'_, str> {
    let stripped = strip_control_chars(s);

    let needs_work = stripped.trim().len() != stripped.len()
        || stripped.chars().any(|c| needs_fold(c) || (c.is_whitespace() && c != ' '))
        || stripped.contains("  ");
    if !needs_work {
        return stripped;
    }

    let mut repaired = stripped.into_owned();
    for (broken, fixed) in MOJIBAKE {
        if repaired.contains(broken) {
            repaired = repaired.replace(broken, fixed);
        }
    }

    let mut out = String::with_capacity(repaired.len());
    let mut pending_space = false;
    for c in repaired.chars() {
        if c == '\u{200b}' {
            continue;
        }
        if c.is_whitespace() {
            pending_space = !out.is_empty();
            continue;
        }
        if pending_space {
            out.push(' ');
            pending_space = false;
        }
        match c {
            '\u{2018}' | '\u{2019}' | '\u{201a}' | '\u{2032}' => out.push('\''),
            '\u{201c}' | '\u{201d}' | '\u{201e}' | '\u{2033}' => out.push('"'),
            '\u{2013}' | '\u{2014}' | '\u{2212}' => out.push('-'),
            '\u{2026}' => out.push_str("..."),
            _ => out.push(c),
        }
    }

    Cow::Owned(out)
}

fn needs_fold(c: char) -> bool {
    matches!(
        c,
        '\u{2018}'
            | '\u{2019}'
            | '\u{201a}'
            | '\u{2032}'
            | '\u{201c}'
            | '\u{201d}'
            | '\u{201e}'
            | '\u{2033}'
            | '\u{2013}'
            | '\u{2014}'
            | '\u{2212}'
            | '\u{2026}'
            | '\u{200b}'
            | '\u{e2}'
            | '\u{c2}'
    )
}

/// Strip control characters and ANSI escape sequences from text.
///
/// Removes characters that are invalid in XML 1.0 documents or that could
/// manipulate terminals when feed text ends up in logs or CLI output.
///
/// Strips:
/// - ASCII control chars: 0x00-0x08, 0x0B-0x0C, 0x0E-0x1F, 0x7F
/// - ANSI CSI sequences: `\x1b[` ... (terminal byte 0x40-0x7E)
/// - ANSI OSC sequences: `\x1b]` ... (until BEL 0x07 or ST `\x1b\\`)
/// - Bare ESC (0x1b) not followed by `[` or `]`
///
/// Preserves: tab (0x09), newline (0x0A), carriage return (0x0D).
///
/// Returns `Cow::Borrowed` when the input contains no control characters (common case).
pub fn strip_control_chars(s: &str) -> Cow<'_, str> {
    let bytes = s.as_bytes();
    let len = bytes.len();

    let needs_strip = bytes.iter().any(|&b| is_stripped_byte(b));

    if !needs_strip {
        return Cow::Borrowed(s);
    }

    let mut out = String::with_capacity(len);
    let mut i = 0;

    while i < len {
        let b = bytes[i];

        if b == 0x1b {
            if i + 1 < len && bytes[i + 1] == b'[' {
                // CSI: skip parameter/intermediate bytes through the final byte
                i += 2;
                while i < len {
                    let c = bytes[i];
                    i += 1;
                    if (0x40..=0x7e).contains(&c) {
                        break;
                    }
                }
            } else if i + 1 < len && bytes[i + 1] == b']' {
                // OSC: skip through BEL or ST (\x1b\\)
                i += 2;
                while i < len {
                    if bytes[i] == 0x07 {
                        i += 1;
                        break;
                    }
                    if bytes[i] == 0x1b && i + 1 < len && bytes[i + 1] == b'\\' {
                        i += 2;
                        break;
                    }
                    i += 1;
                }
            } else {
                i += 1;
            }
        } else if is_stripped_byte(b) {
            i += 1;
        } else {
            let start = i;
            i += 1;
            while i < len && !is_stripped_byte(bytes[i]) {
                i += 1;
            }
            // SAFETY: we only break on ASCII control bytes, which cannot appear
            // mid-codepoint in valid UTF-8, so s[start..i] is valid UTF-8.
            out.push_str(&s[start..i]);
        }
    }

    Cow::Owned(out)
}

fn is_stripped_byte(b: u8) -> bool {
    b == 0x1b || b == 0x7f || (b < 0x20 && b != 0x09 && b != 0x0a && b != 0x0d)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_clean_text_is_borrowed() {
        let result = sanitize_text("Nothing to see here.");
        assert!(matches!(result, Cow::Borrowed(_)));
        assert_eq!(result, "Nothing to see here.");
    }

    #[test]
    fn test_sanitize_collapses_whitespace() {
        assert_eq!(sanitize_text("  a \n\n b\t\tc  "), "a b c");
        assert_eq!(sanitize_text("a\u{a0}\u{a0}b"), "a b");
        assert_eq!(sanitize_text("zero\u{200b}width"), "zerowidth");
    }

    #[test]
    fn test_sanitize_folds_typographic_punctuation() {
        assert_eq!(
            sanitize_text("\u{201c}Quoted\u{201d} \u{2014} it\u{2019}s fine\u{2026}"),
            "\"Quoted\" - it's fine..."
        );
    }

    #[test]
    fn test_sanitize_repairs_mojibake() {
        assert_eq!(sanitize_text("It\u{e2}\u{20ac}\u{2122}s"), "It's");
        assert_eq!(
            sanitize_text("\u{e2}\u{20ac}\u{153}hi\u{e2}\u{20ac}\u{9d}"),
            "\"hi\""
        );
    }

    #[test]
    fn test_sanitize_keeps_other_unicode() {
        assert_eq!(sanitize_text("caf\u{e9} \u{65e5}\u{672c}"), "caf\u{e9} \u{65e5}\u{672c}");
    }

    #[test]
    fn test_sanitize_strips_controls() {
        assert_eq!(sanitize_text("bell\x07 and \x1b[31mred\x1b[0m"), "bell and red");
    }

    #[test]
    fn test_strip_clean_text_returns_borrowed() {
        let input = "Hello, world! This is clean text.";
        let result = strip_control_chars(input);
        assert!(matches!(result, Cow::Borrowed(_)));
        assert_eq!(result, input);
    }

    #[test]
    fn test_strip_preserves_tabs_newlines_cr() {
        let input = "line1\nline2\ttabbed\r\nwindows";
        assert_eq!(strip_control_chars(input), input);
    }

    #[test]
    fn test_strip_removes_controls_and_del() {
        assert_eq!(strip_control_chars("he\x00ll\x07o\x08 w\x0bor\x0cld\x01!"), "hello world!");
        assert_eq!(strip_control_chars("delete\x7fme"), "deleteme");
    }

    #[test]
    fn test_strip_osc_sequences() {
        assert_eq!(
            strip_control_chars("\x1b]0;malicious title\x07safe text"),
            "safe text"
        );
        assert_eq!(
            strip_control_chars("\x1b]0;malicious title\x1b\\safe text"),
            "safe text"
        );
    }
}
