// src/transform/comments.rs
//! Line comments and `\iffalse` blocks.
//!
//! [`dead_regions`] is the lightweight scan every other stage uses to decide
//! whether an offset is live text. [`strip_comments`] removes those regions.
//! Verbatim-like environments are not special-cased: a `%` inside
//! `\verb|...|` or a `lstlisting` is treated as a comment.

use std::ops::Range;

use crate::utils::scan::{read_control_word, skip_blanks, skip_control_symbol};
use crate::utils::Warning;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegionKind {
    /// `%` up to (not including) the end of line.
    Comment,
    /// A false conditional branch, or the `\fi` that closes a live `\else`.
    Conditional,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Region {
    pub range: Range<usize>,
    pub kind: RegionKind,
}

/// Dead code found in one text buffer, in document order.
#[derive(Debug, Clone, Default)]
pub struct DeadRegions {
    pub regions: Vec<Region>,
    /// Offsets of `\iffalse` tokens that never met their `\fi`.
    pub unterminated: Vec<usize>,
}

impl DeadRegions {
    /// Sorted, disjoint ranges, ready for [`crate::utils::scan::in_ranges`].
    pub fn ranges(&self) -> Vec<Range<usize>> {
        self.regions.iter().map(|r| r.range.clone()).collect()
    }

    pub fn contains(&self, offset: usize) -> bool {
        let idx = self.regions.partition_point(|r| r.range.end <= offset);
        self.regions
            .get(idx)
            .is_some_and(|r| r.range.start <= offset)
    }
}

/// Conditional primitives that open a block closed by `\fi`.
/// `\iff` is a math arrow and `\ifthenelse` a macro, neither nests.
fn opens_conditional(name: &str) -> bool {
    name.starts_with("if") && name != "iff" && name != "ifthenelse"
}

fn end_of_line(text: &str, from: usize) -> usize {
    text[from..].find('\n').map_or(text.len(), |rel| from + rel)
}

/// Scans `text` for comments and `\iffalse ... [\else ...] \fi` blocks.
pub fn dead_regions(text: &str) -> DeadRegions {
    let bytes = text.as_bytes();
    let mut found = DeadRegions::default();

    // (start, nesting depth) of the false branch being skipped
    let mut dead: Option<(usize, usize)> = None;
    // One entry per open conditional inside a live `\else` branch;
    // `true` marks the `\iffalse` whose `\fi` must be removed.
    let mut live: Vec<bool> = Vec::new();

    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'%' => {
                let eol = end_of_line(text, i);
                if dead.is_none() {
                    found.regions.push(Region {
                        range: i..eol,
                        kind: RegionKind::Comment,
                    });
                }
                i = eol;
            }
            b'\\' => {
                let Some((name, end)) = read_control_word(text, i) else {
                    i = skip_control_symbol(text, i);
                    continue;
                };
                match dead {
                    Some((start, depth)) => {
                        if opens_conditional(name) {
                            dead = Some((start, depth + 1));
                        } else if name == "else" && depth == 1 {
                            found.regions.push(Region {
                                range: start..skip_blanks(text, end),
                                kind: RegionKind::Conditional,
                            });
                            dead = None;
                            live.push(true);
                        } else if name == "fi" {
                            if depth == 1 {
                                found.regions.push(Region {
                                    range: start..skip_blanks(text, end),
                                    kind: RegionKind::Conditional,
                                });
                                dead = None;
                            } else {
                                dead = Some((start, depth - 1));
                            }
                        }
                    }
                    None => {
                        if name == "iffalse" {
                            dead = Some((i, 1));
                        } else if !live.is_empty() && opens_conditional(name) {
                            live.push(false);
                        } else if name == "fi" && live.pop() == Some(true) {
                            found.regions.push(Region {
                                range: i..skip_blanks(text, end),
                                kind: RegionKind::Conditional,
                            });
                        }
                    }
                }
                i = end;
            }
            _ => i += 1,
        }
    }

    if let Some((start, _)) = dead {
        tracing::debug!("Unterminated \\iffalse at byte {}", start);
        found.unterminated.push(start);
        // Comments inside the unterminated block were skipped while it was
        // considered dead; rescan the tail as live text.
        let tail = dead_regions_live_tail(text, start);
        found.regions.extend(tail);
    }

    found
}

/// Comment regions after `from`, ignoring conditionals entirely.
fn dead_regions_live_tail(text: &str, from: usize) -> Vec<Region> {
    let bytes = text.as_bytes();
    let mut regions = Vec::new();
    let mut i = from;
    while i < bytes.len() {
        match bytes[i] {
            b'%' => {
                let eol = end_of_line(text, i);
                regions.push(Region {
                    range: i..eol,
                    kind: RegionKind::Comment,
                });
                i = eol;
            }
            b'\\' => i = skip_control_symbol(text, i),
            _ => i += 1,
        }
    }
    regions
}

/// Comment-free text plus anything worth reporting.
#[derive(Debug, Clone)]
pub struct Stripped {
    pub text: String,
    pub warnings: Vec<Warning>,
}

/// Removes line comments and `\iffalse` blocks.
///
/// A line that held nothing but a comment disappears together with its
/// newline; a trailing comment takes the whitespace before it along. Running
/// this on its own output changes nothing.
pub fn strip_comments(text: &str) -> Stripped {
    let found = dead_regions(text);
    let mut out = String::with_capacity(text.len());
    let mut cursor = 0;

    for region in &found.regions {
        let (mut start, mut end) = (region.range.start, region.range.end);
        if region.kind == RegionKind::Comment {
            let line_start = text[..start].rfind('\n').map_or(0, |p| p + 1);
            let before = &text[line_start..start];
            if line_start >= cursor && before.trim().is_empty() {
                start = line_start;
                if end < text.len() {
                    end += 1; // the newline
                }
            } else {
                start = line_start.max(start - (before.len() - before.trim_end().len()));
            }
        }
        let start = start.max(cursor);
        out.push_str(&text[cursor..start]);
        cursor = end.max(cursor);
    }
    out.push_str(&text[cursor..]);

    let warnings: Vec<Warning> = found
        .unterminated
        .iter()
        .map(|&at| {
            tracing::warn!("\\iffalse at byte {} has no matching \\fi; keeping it", at);
            Warning::UnterminatedConditional(at)
        })
        .collect();

    tracing::debug!(
        "Stripped {} dead regions ({} -> {} bytes)",
        found.regions.len(),
        text.len(),
        out.len()
    );
    Stripped { text: out, warnings }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strip(text: &str) -> String {
        strip_comments(text).text
    }

    #[test]
    fn test_remove_comments_from_lines() {
        let cases = [
            ("No comments", "No comments"),
            ("Line with % comment", "Line with"),
            ("% Full comment line", ""),
            ("Command \\% not comment", "Command \\% not comment"),
            ("Multiple % comments % here", "Multiple"),
            ("Line with both \\% and % real comment", "Line with both \\% and"),
        ];
        for (input, expected) in cases {
            assert_eq!(strip(input), expected, "input: {:?}", input);
        }
    }

    #[test]
    fn test_full_comment_lines_vanish_with_newline() {
        let text = "first\n% gone\n  % also gone\nsecond\n";
        assert_eq!(strip(text), "first\nsecond\n");
    }

    #[test]
    fn test_double_backslash_before_percent_is_a_comment() {
        assert_eq!(strip("a\\\\% comment\nb"), "a\\\\\nb");
    }

    #[test]
    fn test_nested_iffalse_fully_removed() {
        assert_eq!(strip(r"\iffalse A \iffalse B \fi C \fi D"), "D");
    }

    #[test]
    fn test_other_conditionals_nest_inside_iffalse() {
        let text = "keep \\iffalse \\ifdefined\\x a \\fi b \\fi end";
        assert_eq!(strip(text), "keep end");
    }

    #[test]
    fn test_fi_inside_comment_does_not_close() {
        let text = "\\iffalse\nhidden % \\fi\nstill hidden\n\\fi\nshown";
        assert_eq!(strip(text), "\nshown");
    }

    #[test]
    fn test_else_branch_is_kept() {
        let text = r"\iffalse draft \else final \ifx\a\b x\fi\fi!";
        assert_eq!(strip(text), r"final \ifx\a\b x\fi!");
    }

    #[test]
    fn test_unterminated_iffalse_is_left_in_place() {
        let result = strip_comments("a \\iffalse b % c\nd");
        assert_eq!(result.text, "a \\iffalse b\nd");
        assert_eq!(result.warnings, vec![Warning::UnterminatedConditional(2)]);
    }

    #[test]
    fn test_stripping_is_idempotent() {
        let text = "\\documentclass{article} % cls\n% line\n\\iffalse x \\fi y\n50\\% done % note\n\n\\iffalse a\\else b\\fi\n";
        let once = strip(text);
        let twice = strip(&once);
        assert_eq!(once, twice);
        assert_eq!(once, "\\documentclass{article}\ny\n50\\% done\n\nb\n");
    }

    #[test]
    fn test_dead_regions_contains() {
        let text = "live % dead\nlive";
        let found = dead_regions(text);
        assert!(!found.contains(0));
        assert!(found.contains(5));
        assert!(found.contains(10));
        assert!(!found.contains(12));
    }
}
