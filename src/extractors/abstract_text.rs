// src/extractors/abstract_text.rs
use once_cell::sync::Lazy;
use regex::Regex;

use crate::transform::comments::strip_comments;
use crate::utils::scan::{balanced_group, is_control_word, skip_whitespace};

static ABSTRACT_ENV_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)\\begin\{abstract\}(.*?)\\end\{abstract\}").expect("Failed to compile ABSTRACT_ENV_RE")
});

fn without_delimiting_newlines(inner: &str) -> &str {
    let inner = inner
        .strip_prefix("\r\n")
        .or_else(|| inner.strip_prefix('\n'))
        .unwrap_or(inner);
    inner
        .strip_suffix("\r\n")
        .or_else(|| inner.strip_suffix('\n'))
        .unwrap_or(inner)
}

/// The first abstract in `text`, verbatim apart from the line breaks right
/// after `\begin{abstract}` and right before `\end{abstract}`.
///
/// Comments are always stripped first, whatever the caller asked for, so a
/// commented-out abstract is never returned. Falls back to the
/// `\abstract{...}` command some document classes use.
pub fn extract_abstract(text: &str) -> Option<String> {
    let stripped = strip_comments(text).text;

    if let Some(caps) = ABSTRACT_ENV_RE.captures(&stripped) {
        let inner = without_delimiting_newlines(caps.get(1)?.as_str());
        tracing::info!("Found abstract environment ({} bytes)", inner.len());
        return Some(inner.to_string());
    }

    let mut from = 0;
    while let Some(rel) = stripped[from..].find("\\abstract") {
        let at = from + rel;
        from = at + 1;
        if !is_control_word(&stripped, at, "abstract") {
            continue;
        }
        let open = skip_whitespace(&stripped, at + "\\abstract".len());
        if let Some((inner, _)) = balanced_group(&stripped, open) {
            let inner = &stripped[inner];
            tracing::info!("Found \\abstract command ({} bytes)", inner.len());
            return Some(inner.to_string());
        }
    }

    tracing::debug!("No abstract found");
    None
}
