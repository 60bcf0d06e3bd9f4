// src/extractors/figures.rs
use std::path::{Path, PathBuf};

use crate::extractors::appendix::find_appendix_marker;
use crate::transform::comments::{dead_regions, DeadRegions};
use crate::utils::scan::{balanced_group, read_control_word, skip_control_symbol, skip_whitespace};
use crate::utils::Warning;

/// Extensions tried, in order, when `\includegraphics` names none.
const GRAPHICS_EXTENSIONS: &[&str] = &["pdf", "png", "jpg", "jpeg", "eps", "svg"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FigureReference {
    /// The argument as written.
    pub raw: String,
    pub resolved: PathBuf,
    pub exists: bool,
    pub offset: usize,
    pub in_comment: bool,
    pub in_appendix: bool,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct FigureFilter {
    pub exclude_comments: bool,
    pub exclude_appendix: bool,
}

impl FigureFilter {
    fn keeps(&self, figure: &FigureReference) -> bool {
        !(self.exclude_comments && figure.in_comment) && !(self.exclude_appendix && figure.in_appendix)
    }
}

/// Reads the argument of every `\<command>[...]{arg}`, optional brackets
/// skipped. Yields (offset of the backslash, trimmed argument).
fn command_arguments<'t>(text: &'t str, command: &str) -> Vec<(usize, &'t str)> {
    let mut found = Vec::new();
    let mut i = 0;
    while let Some(rel) = text[i..].find('\\') {
        let at = i + rel;
        let Some((name, end)) = read_control_word(text, at) else {
            i = skip_control_symbol(text, at);
            continue;
        };
        i = end;
        if name != command {
            continue;
        }
        let mut j = end;
        if text.as_bytes().get(j) == Some(&b'*') {
            j += 1;
        }
        j = skip_whitespace(text, j);
        while text.as_bytes().get(j) == Some(&b'[') {
            match balanced_group(text, j) {
                Some((_, after)) => j = skip_whitespace(text, after),
                None => break,
            }
        }
        if let Some((inner, after)) = balanced_group(text, j) {
            let arg = text[inner].trim();
            if !arg.is_empty() {
                found.push((at, arg));
            }
            i = after;
        }
    }
    found
}

/// `\graphicspath{{figs/}{img/}}` entries from live text.
fn graphics_paths(text: &str, dead: &DeadRegions) -> Vec<String> {
    let mut dirs = Vec::new();
    for (at, arg) in command_arguments(text, "graphicspath") {
        if dead.contains(at) {
            continue;
        }
        let mut j = 0;
        while let Some(rel) = arg[j..].find('{') {
            let open = j + rel;
            match balanced_group(arg, open) {
                Some((inner, after)) => {
                    let dir = arg[inner].trim();
                    if !dir.is_empty() {
                        dirs.push(dir.to_string());
                    }
                    j = after;
                }
                None => break,
            }
        }
    }
    dirs
}

/// Tries `raw` under the source directory and each graphics path, with and
/// without the usual extensions. Returns the path and whether it exists.
fn resolve_graphic(raw: &str, source_dir: &Path, search_dirs: &[String]) -> (PathBuf, bool) {
    let bases = std::iter::once(source_dir.to_path_buf()).chain(search_dirs.iter().map(|d| source_dir.join(d)));
    for base in bases {
        let literal = base.join(raw);
        if literal.extension().is_some() && literal.is_file() {
            return (literal, true);
        }
        for ext in GRAPHICS_EXTENSIONS {
            let candidate = base.join(format!("{}.{}", raw, ext));
            if candidate.is_file() {
                return (candidate, true);
            }
        }
        if literal.is_file() {
            return (literal, true);
        }
    }
    (source_dir.join(raw), false)
}

/// Every `\includegraphics` in `text`, in document order, with its flags.
pub fn scan_figures(text: &str, source_dir: &Path) -> Vec<FigureReference> {
    let dead = dead_regions(text);
    let appendix = find_appendix_marker(text);
    let search_dirs = graphics_paths(text, &dead);

    command_arguments(text, "includegraphics")
        .into_iter()
        .map(|(offset, raw)| {
            let (resolved, exists) = resolve_graphic(raw, source_dir, &search_dirs);
            FigureReference {
                raw: raw.to_string(),
                resolved,
                exists,
                offset,
                in_comment: dead.contains(offset),
                in_appendix: appendix.is_some_and(|a| offset >= a),
            }
        })
        .collect()
}

/// Resolved figure paths surviving `filter`, each listed once.
pub fn figure_paths(text: &str, source_dir: &Path, filter: FigureFilter) -> (Vec<PathBuf>, Vec<Warning>) {
    let mut paths: Vec<PathBuf> = Vec::new();
    let mut warnings = Vec::new();

    for figure in scan_figures(text, source_dir) {
        if !filter.keeps(&figure) {
            tracing::trace!("Filtered out figure {} at byte {}", figure.raw, figure.offset);
            continue;
        }
        if !figure.exists {
            tracing::warn!("Could not resolve figure path: {}", figure.raw);
            warnings.push(Warning::UnresolvedFigure(figure.raw.clone()));
        }
        if !paths.contains(&figure.resolved) {
            paths.push(figure.resolved);
        }
    }

    tracing::info!("Collected {} figure paths", paths.len());
    (paths, warnings)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::{create_dir_all, write};
    use tempfile::tempdir;

    #[test]
    fn test_scan_flags_comments_and_appendix() {
        let tmp = tempdir().unwrap();
        let text = "\\includegraphics[width=\\linewidth]{a.png}\n% \\includegraphics{b}\n\\appendix\n\\includegraphics*{c}";
        let figures = scan_figures(text, tmp.path());

        assert_eq!(figures.len(), 3);
        assert_eq!(figures[0].raw, "a.png");
        assert!(!figures[0].in_comment && !figures[0].in_appendix);
        assert!(figures[1].in_comment);
        assert!(figures[2].in_appendix && !figures[2].in_comment);
    }

    #[test]
    fn test_resolution_tries_extensions_and_graphicspath() {
        let tmp = tempdir().unwrap();
        create_dir_all(tmp.path().join("figs")).unwrap();
        write(tmp.path().join("plot.pdf"), b"%PDF").unwrap();
        write(tmp.path().join("figs/diagram.png"), b"png").unwrap();
        write(tmp.path().join("photo.v2.jpg"), b"jpg").unwrap();

        let text = "\\graphicspath{{figs/}}\n\\includegraphics{plot}\\includegraphics{diagram}\\includegraphics{photo.v2}\\includegraphics{missing}";
        let (paths, warnings) = figure_paths(text, tmp.path(), FigureFilter::default());

        assert_eq!(
            paths,
            vec![
                tmp.path().join("plot.pdf"),
                tmp.path().join("figs").join("diagram.png"),
                tmp.path().join("photo.v2.jpg"),
                tmp.path().join("missing"),
            ]
        );
        assert_eq!(warnings, vec![Warning::UnresolvedFigure("missing".to_string())]);
    }

    #[test]
    fn test_filters_and_duplicates() {
        let tmp = tempdir().unwrap();
        for name in ["main.png", "old.png", "extra.png"] {
            write(tmp.path().join(name), b"png").unwrap();
        }
        let text = "\\includegraphics{main.png}\\includegraphics{main.png}\n% \\includegraphics{old.png}\n\\appendix\\includegraphics{extra.png}";

        let all = figure_paths(text, tmp.path(), FigureFilter::default()).0;
        assert_eq!(all.len(), 3);

        let filter = FigureFilter {
            exclude_comments: true,
            exclude_appendix: true,
        };
        assert_eq!(figure_paths(text, tmp.path(), filter).0, vec![tmp.path().join("main.png")]);
    }
}
