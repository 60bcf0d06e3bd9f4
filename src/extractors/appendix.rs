// src/extractors/appendix.rs
use crate::transform::comments::dead_regions;
use crate::utils::scan::{is_control_word, read_control_word, skip_control_symbol};

const APPENDICES_ENV: &str = "\\begin{appendices}";

/// Offset of the first live `\appendix` or `\begin{appendices}`.
pub fn find_appendix_marker(text: &str) -> Option<usize> {
    let dead = dead_regions(text);
    let mut i = 0;
    while let Some(rel) = text[i..].find('\\') {
        let at = i + rel;
        let live = !dead.contains(at);
        if live && (is_control_word(text, at, "appendix") || text[at..].starts_with(APPENDICES_ENV)) {
            return Some(at);
        }
        i = match read_control_word(text, at) {
            Some((_, end)) => end,
            None => skip_control_symbol(text, at),
        };
    }
    None
}

/// Everything before the appendix marker, or the whole text when there is none.
pub fn remove_appendix(text: &str) -> &str {
    match find_appendix_marker(text) {
        Some(at) => {
            tracing::debug!("Eliding appendix from byte {} ({} bytes)", at, text.len() - at);
            &text[..at]
        }
        None => text,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_remove_appendix_keeps_prefix_unchanged() {
        let text = "\\section{Intro}\nbody\n\\appendix\n\\section{Proofs}\n";
        assert_eq!(remove_appendix(text), "\\section{Intro}\nbody\n");
    }

    #[test]
    fn test_commented_marker_and_longer_names_are_ignored() {
        let text = "% \\appendix\n\\appendixname\nreal\n\\appendix tail";
        assert_eq!(find_appendix_marker(text), Some(text.find("\\appendix tail").unwrap()));
    }

    #[test]
    fn test_appendices_environment() {
        let text = "main\n\\begin{appendices}\nA\n\\end{appendices}";
        assert_eq!(remove_appendix(text), "main\n");
    }

    #[test]
    fn test_no_marker_returns_everything() {
        assert_eq!(remove_appendix("just text"), "just text");
    }
}
