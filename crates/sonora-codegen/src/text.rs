//! Small text-layout helpers shared by the renderers

use std::fmt::Write;

/// Append `n` levels of four-space indentation to `out`
pub fn tab(out: &mut String, n: usize) {
    for _ in 0..n {
        out.push_str("    ");
    }
}

/// Append an indented line followed by a newline
pub fn line(out: &mut String, n: usize, text: &str) -> std::fmt::Result {
    tab(out, n);
    writeln!(out, "{}", text)
}

/// Escape a string for a WebAssembly text-format data segment
///
/// Quotes and backslashes get a backslash prefix; every non-printing or
/// non-ASCII byte is emitted as a two-digit hex escape.
pub fn escape_wast_string(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for byte in text.bytes() {
        match byte {
            b'"' => out.push_str("\\\""),
            b'\\' => out.push_str("\\\\"),
            0x20..=0x7e => out.push(byte as char),
            _ => {
                out.push('\\');
                out.push_str(&format!("{:02x}", byte));
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tab_width() {
        let mut out = String::new();
        tab(&mut out, 2);
        assert_eq!(out, "        ");
    }

    #[test]
    fn test_line_indents_and_terminates() {
        let mut out = String::new();
        line(&mut out, 1, "(return)").unwrap();
        assert_eq!(out, "    (return)\n");
    }

    #[test]
    fn test_escape_quotes_and_backslashes() {
        assert_eq!(
            escape_wast_string(r#"{"name":"gain\osc"}"#),
            r#"{\"name\":\"gain\\osc\"}"#
        );
    }

    #[test]
    fn test_escape_non_ascii_bytes() {
        assert_eq!(escape_wast_string("a\nb"), "a\\0ab");
        assert_eq!(escape_wast_string("é"), "\\c3\\a9");
    }
}
