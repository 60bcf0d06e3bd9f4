// src/utils/scan.rs
//! Byte-level scanning helpers shared by every pipeline stage.
//!
//! All offsets are byte offsets into a `&str`. Only ASCII delimiters are ever
//! used as slice boundaries, so slicing at returned offsets is always valid.

use std::ops::Range;

/// Reads the control word starting at the backslash at `at`.
///
/// Returns the name (ASCII letters only) and the offset just past it, or
/// `None` when `at` is not a backslash followed by at least one letter.
pub fn read_control_word(text: &str, at: usize) -> Option<(&str, usize)> {
    let bytes = text.as_bytes();
    if bytes.get(at) != Some(&b'\\') {
        return None;
    }
    let start = at + 1;
    let mut end = start;
    while end < bytes.len() && bytes[end].is_ascii_alphabetic() {
        end += 1;
    }
    if end == start {
        None
    } else {
        Some((&text[start..end], end))
    }
}

/// True when `text[at..]` is the control word `\name` not followed by a letter.
pub fn is_control_word(text: &str, at: usize, name: &str) -> bool {
    matches!(read_control_word(text, at), Some((found, _)) if found == name)
}

/// Offset just past the control symbol (`\%`, `\\`, `\{`, ...) at `at`.
pub fn skip_control_symbol(text: &str, at: usize) -> usize {
    let next = text[at + 1..].chars().next().map_or(0, char::len_utf8);
    at + 1 + next
}

/// True when the byte at `at` is preceded by an odd run of backslashes.
pub fn is_escaped(text: &str, at: usize) -> bool {
    let run = text.as_bytes()[..at]
        .iter()
        .rev()
        .take_while(|&&b| b == b'\\')
        .count();
    run % 2 == 1
}

/// Skips spaces, tabs and newlines.
pub fn skip_whitespace(text: &str, mut at: usize) -> usize {
    let bytes = text.as_bytes();
    while at < bytes.len() && bytes[at].is_ascii_whitespace() {
        at += 1;
    }
    at
}

/// Skips spaces and tabs only.
pub fn skip_blanks(text: &str, mut at: usize) -> usize {
    let bytes = text.as_bytes();
    while at < bytes.len() && (bytes[at] == b' ' || bytes[at] == b'\t') {
        at += 1;
    }
    at
}

/// Finds the balanced group opening at `at` (`{...}` or `[...]`).
///
/// Returns the inner range and the offset just past the closing delimiter.
/// Escaped delimiters (`\{`, `\]`) are ignored. Inside a bracket group, braces
/// still nest, so `[{a]b}]` is one group. `None` when unbalanced.
pub fn balanced_group(text: &str, at: usize) -> Option<(Range<usize>, usize)> {
    let bytes = text.as_bytes();
    let (open, close) = match bytes.get(at) {
        Some(b'{') => (b'{', b'}'),
        Some(b'[') => (b'[', b']'),
        _ => return None,
    };
    let mut depth = 0usize;
    let mut braces = 0usize;
    let mut i = at;
    while i < bytes.len() {
        let b = bytes[i];
        if b == b'\\' {
            i += 2;
            continue;
        }
        if open == b'[' {
            match b {
                b'{' => braces += 1,
                b'}' => braces = braces.saturating_sub(1),
                _ => {}
            }
        }
        if braces == 0 || open == b'{' {
            if b == open {
                depth += 1;
            } else if b == close {
                depth -= 1;
                if depth == 0 {
                    return Some((at + 1..i, i + 1));
                }
            }
        }
        i += 1;
    }
    None
}

/// The range containing `offset`, if any. `ranges` must be sorted and disjoint.
pub fn range_containing(ranges: &[Range<usize>], offset: usize) -> Option<&Range<usize>> {
    let idx = ranges.partition_point(|r| r.end <= offset);
    ranges.get(idx).filter(|r| r.start <= offset)
}

/// Membership test over sorted, non-overlapping ranges.
pub fn in_ranges(ranges: &[Range<usize>], offset: usize) -> bool {
    range_containing(ranges, offset).is_some()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_control_word() {
        let text = r"\section*{Intro}";
        assert_eq!(read_control_word(text, 0), Some(("section", 8)));
        assert_eq!(read_control_word(r"\%", 0), None);
        assert!(is_control_word(r"\X y", 0, "X"));
        assert!(!is_control_word(r"\Xylophone", 0, "X"));
    }

    #[test]
    fn test_balanced_group_nesting_and_escapes() {
        let text = r"{a{b}\}c}rest";
        let (inner, end) = balanced_group(text, 0).unwrap();
        assert_eq!(&text[inner], r"a{b}\}c");
        assert_eq!(&text[end..], "rest");

        let text = "[{a]b}]x";
        let (inner, end) = balanced_group(text, 0).unwrap();
        assert_eq!(&text[inner], "{a]b}");
        assert_eq!(&text[end..], "x");

        assert!(balanced_group("{unclosed", 0).is_none());
    }

    #[test]
    fn test_escapes() {
        assert!(is_escaped(r"a\%", 2));
        assert!(!is_escaped(r"a\\%", 3));
        assert_eq!(skip_control_symbol(r"\%x", 0), 2);
        assert_eq!(skip_control_symbol("\\é", 0), 3);
    }

    #[test]
    fn test_in_ranges() {
        let ranges = vec![2..4, 10..12];
        assert!(!in_ranges(&ranges, 1));
        assert!(in_ranges(&ranges, 2));
        assert!(in_ranges(&ranges, 3));
        assert!(!in_ranges(&ranges, 4));
        assert!(in_ranges(&ranges, 11));
        assert!(!in_ranges(&ranges, 12));
    }
}
