// src/source.rs
//! Locating the extracted source tree and its main file.

use std::fs;
use std::path::{Path, PathBuf};

use crate::utils::error::StructuralError;

/// An extracted LaTeX source directory and the file compilation starts from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceTree {
    pub dir: PathBuf,
    pub main_file: PathBuf,
}

impl SourceTree {
    /// A `.tex` path is taken as the main file; a directory is searched.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StructuralError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(StructuralError::SourceNotFound(path.to_path_buf()));
        }
        if path.is_file() {
            let dir = path
                .parent()
                .filter(|p| !p.as_os_str().is_empty())
                .map_or_else(|| PathBuf::from("."), Path::to_path_buf);
            return Ok(Self {
                dir,
                main_file: path.to_path_buf(),
            });
        }
        let main_file = find_main_tex(path)?;
        tracing::info!("Using main file {}", main_file.display());
        Ok(Self {
            dir: path.to_path_buf(),
            main_file,
        })
    }

    /// Short label for output files: the directory name.
    pub fn name(&self) -> String {
        self.dir
            .canonicalize()
            .ok()
            .as_deref()
            .and_then(Path::file_name)
            .map_or_else(|| "document".to_string(), |n| n.to_string_lossy().into_owned())
    }
}

/// Line count when `content` declares `\documentclass` outside a comment.
fn main_file_score(content: &str) -> Option<usize> {
    let declares = content.lines().any(|line| {
        let code = line.split('%').next().unwrap_or("");
        code.contains("\\documentclass")
    });
    declares.then(|| content.lines().count())
}

/// Picks the longest `.tex` file declaring `\documentclass`, preferring the
/// shallowest directory that has one. Shorter candidates are usually
/// templates or supplementary material.
pub fn find_main_tex(dir: &Path) -> Result<PathBuf, StructuralError> {
    let mut level = vec![dir.to_path_buf()];
    while !level.is_empty() {
        let mut best: Option<(usize, PathBuf)> = None;
        let mut next_level = Vec::new();

        for current in &level {
            let entries = fs::read_dir(current).map_err(|source| StructuralError::UnreadableDirectory {
                path: current.clone(),
                source,
            })?;
            let mut paths: Vec<PathBuf> = entries.flatten().map(|e| e.path()).collect();
            paths.sort();

            for path in paths {
                if path.is_dir() {
                    next_level.push(path);
                    continue;
                }
                if path.extension().and_then(|e| e.to_str()) != Some("tex") {
                    continue;
                }
                let content = match fs::read_to_string(&path) {
                    Ok(content) => content,
                    Err(e) => {
                        tracing::warn!("Could not read file {}: {}", path.display(), e);
                        continue;
                    }
                };
                if let Some(score) = main_file_score(&content) {
                    tracing::debug!("Main file candidate {} ({} lines)", path.display(), score);
                    if best.as_ref().map_or(true, |(s, _)| score > *s) {
                        best = Some((score, path));
                    }
                }
            }
        }

        if let Some((_, path)) = best {
            return Ok(path);
        }
        level = next_level;
    }
    Err(StructuralError::MainFileNotFound(dir.to_path_buf()))
}
