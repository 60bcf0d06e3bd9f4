// src/transform/include.rs
//! Recursive `\input` / `\include` resolution.

use std::fs;
use std::path::{Path, PathBuf};

use once_cell::sync::Lazy;
use regex::Regex;

use crate::transform::comments::dead_regions;
use crate::utils::error::StructuralError;
use crate::utils::scan::is_escaped;
use crate::utils::Warning;

// \input{x}, \include{x}, and the brace-less TeX form \input x
static INCLUDE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\\(?:(?:input|include)[ \t]*\{([^{}]*)\}|input[ \t]+([A-Za-z0-9_./\-]+))")
        .expect("Failed to compile INCLUDE_RE")
});

/// Result of flattening one document tree.
#[derive(Debug, Clone)]
pub struct Flattened {
    pub text: String,
    /// Every file whose contents were spliced in, in inclusion order.
    pub included: Vec<PathBuf>,
    pub warnings: Vec<Warning>,
}

/// Depth-first resolver. The chain of files currently being expanded is the
/// visited set; it is pushed on entry and popped on exit, so a file may be
/// included several times but never from within itself.
pub struct IncludeResolver<'a> {
    root_dir: &'a Path,
    max_depth: usize,
    chain: Vec<PathBuf>,
    included: Vec<PathBuf>,
    warnings: Vec<Warning>,
    tree_files: Option<Vec<PathBuf>>,
}

impl<'a> IncludeResolver<'a> {
    pub fn new(root_dir: &'a Path, max_depth: usize) -> Self {
        Self {
            root_dir,
            max_depth,
            chain: Vec::new(),
            included: Vec::new(),
            warnings: Vec::new(),
            tree_files: None,
        }
    }

    /// Reads `main_file` and splices in every live inclusion, recursively.
    pub fn flatten(mut self, main_file: &Path) -> Result<Flattened, StructuralError> {
        let content = fs::read_to_string(main_file).map_err(|source| StructuralError::UnreadableRoot {
            path: main_file.to_path_buf(),
            source,
        })?;
        tracing::debug!("Flattening from root file {}", main_file.display());

        self.chain.push(canonical(main_file));
        let text = self.resolve_text(&content, main_file);
        self.chain.pop();

        tracing::info!(
            "Flattened {} with {} included files ({} bytes)",
            main_file.display(),
            self.included.len(),
            text.len()
        );
        Ok(Flattened {
            text,
            included: self.included,
            warnings: self.warnings,
        })
    }

    /// Substitutes live inclusions in `text`, which was read from `current`.
    /// Everything outside the matched commands is copied unchanged.
    fn resolve_text(&mut self, text: &str, current: &Path) -> String {
        let dead = dead_regions(text);
        let mut out = String::with_capacity(text.len());
        let mut cursor = 0;

        for caps in INCLUDE_RE.captures_iter(text) {
            let Some(whole) = caps.get(0) else { continue };
            if dead.contains(whole.start()) || is_escaped(text, whole.start()) {
                tracing::trace!("Ignoring inclusion in dead code: {}", whole.as_str());
                continue;
            }
            let target = caps
                .get(1)
                .or_else(|| caps.get(2))
                .map_or("", |m| m.as_str().trim());
            if target.is_empty() {
                continue;
            }

            out.push_str(&text[cursor..whole.start()]);
            match self.include(target, current) {
                Some(resolved) => out.push_str(&resolved),
                None => out.push_str(whole.as_str()),
            }
            cursor = whole.end();
        }

        out.push_str(&text[cursor..]);
        out
    }

    fn include(&mut self, target: &str, current: &Path) -> Option<String> {
        let Some(path) = self.locate(target, current) else {
            tracing::warn!("Included file not found: {} (from {})", target, current.display());
            self.warnings.push(Warning::MissingInclude {
                from: current.to_path_buf(),
                target: target.to_string(),
            });
            return None;
        };

        let key = canonical(&path);
        if self.chain.contains(&key) {
            tracing::warn!("Skipping cyclic inclusion of {} from {}", path.display(), current.display());
            self.warnings.push(Warning::CyclicInclude {
                from: current.to_path_buf(),
                target: path,
            });
            return None;
        }
        if self.chain.len() > self.max_depth {
            tracing::warn!("Inclusion depth limit {} reached at {}", self.max_depth, path.display());
            self.warnings.push(Warning::IncludeDepthExceeded {
                target: path,
                limit: self.max_depth,
            });
            return None;
        }

        let content = match fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) => {
                tracing::warn!("Could not read included file {}: {}", path.display(), e);
                self.warnings.push(Warning::MissingInclude {
                    from: current.to_path_buf(),
                    target: target.to_string(),
                });
                return None;
            }
        };

        tracing::debug!("Including {} ({} bytes)", path.display(), content.len());
        self.chain.push(key);
        let resolved = self.resolve_text(&content, &path);
        self.chain.pop();
        self.included.push(path);
        Some(resolved)
    }

    /// Current file's directory first, then the root, then a unique match
    /// anywhere below the root.
    fn locate(&mut self, target: &str, current: &Path) -> Option<PathBuf> {
        let names = candidate_names(target);
        let current_dir = current.parent().unwrap_or(self.root_dir);

        for dir in [current_dir, self.root_dir] {
            for name in &names {
                let path = dir.join(name);
                if path.is_file() {
                    return Some(path);
                }
            }
        }

        self.search_tree(&names)
    }

    fn search_tree(&mut self, names: &[String]) -> Option<PathBuf> {
        let root_dir = self.root_dir;
        let files = self.tree_files.get_or_insert_with(|| {
            let mut files = Vec::new();
            collect_files(root_dir, &mut files);
            files
        });

        for name in names {
            let wanted = Path::new(name.trim_start_matches("./"));
            // A relative path suffix first, then the bare file name.
            let by_suffix: Vec<&PathBuf> = files.iter().filter(|f| f.ends_with(wanted)).collect();
            if by_suffix.len() == 1 {
                return Some(by_suffix[0].clone());
            }
            let Some(file_name) = wanted.file_name() else { continue };
            let by_name: Vec<&PathBuf> = files
                .iter()
                .filter(|f| f.file_name() == Some(file_name))
                .collect();
            match by_name.len() {
                1 => return Some(by_name[0].clone()),
                0 => {}
                n => tracing::debug!("{} files named {:?} below the root; not guessing", n, file_name),
            }
        }
        None
    }
}

/// True when the final path component ends in an alphabetic extension.
/// `sections/3.5_dataset` has none: `5_dataset` is not an extension.
fn has_extension(target: &str) -> bool {
    let base = target.rsplit(['/', '\\']).next().unwrap_or(target);
    match base.rsplit_once('.') {
        Some((stem, ext)) => !stem.is_empty() && !ext.is_empty() && ext.chars().all(|c| c.is_ascii_alphabetic()),
        None => false,
    }
}

/// File names to try for `target`, most likely first.
fn candidate_names(target: &str) -> Vec<String> {
    let with_tex = format!("{}.tex", target);
    if has_extension(target) {
        vec![target.to_string(), with_tex]
    } else {
        vec![with_tex, target.to_string()]
    }
}

fn collect_files(dir: &Path, files: &mut Vec<PathBuf>) {
    let Ok(entries) = fs::read_dir(dir) else {
        tracing::debug!("Skipping unreadable directory {}", dir.display());
        return;
    };
    for entry in entries.flatten() {
        let path = entry.path();
        let hidden = path
            .file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|n| n.starts_with('.'));
        if hidden {
            continue;
        }
        if path.is_dir() {
            collect_files(&path, files);
        } else {
            files.push(path);
        }
    }
}

fn canonical(path: &Path) -> PathBuf {
    fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf())
}
