// src/pipeline.rs
//! Flatten -> strip -> expand -> extract, over one source tree at a time.

use std::path::{Path, PathBuf};

use crate::config::{OutputMode, PipelineOptions};
use crate::extractors::{extract_abstract, figure_paths, remove_appendix, FigureFilter, SectionTree};
use crate::source::SourceTree;
use crate::transform::{expand_macros, strip_comments, IncludeResolver};
use crate::utils::error::{AppError, ConfigError};
use crate::utils::Warning;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Merged,
    Stripped,
    Expanded,
}

impl Stage {
    pub fn file_stem(self) -> &'static str {
        match self {
            Self::Merged => "01_merged",
            Self::Stripped => "02_stripped",
            Self::Expanded => "03_expanded",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PipelineOutput {
    Document(String),
    Sections(String),
    SectionList(String),
    Abstract(Option<String>),
    FigurePaths(Vec<PathBuf>),
}

impl PipelineOutput {
    /// Text as printed: figure paths one per line, a missing abstract empty.
    pub fn render(&self) -> String {
        match self {
            Self::Document(text) | Self::Sections(text) | Self::SectionList(text) => text.clone(),
            Self::Abstract(text) => text.clone().unwrap_or_default(),
            Self::FigurePaths(paths) => paths
                .iter()
                .map(|p| p.display().to_string())
                .collect::<Vec<_>>()
                .join("\n"),
        }
    }

    /// File extension used when the output is saved.
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Document(_) | Self::Sections(_) => "tex",
            _ => "txt",
        }
    }
}

/// Everything one run produced.
#[derive(Debug, Clone)]
pub struct RunReport {
    pub source: SourceTree,
    pub mode: OutputMode,
    pub output: PipelineOutput,
    pub warnings: Vec<Warning>,
    /// Intermediate texts, only when stage capture is on.
    pub stages: Vec<(Stage, String)>,
}

/// A validated configuration, reusable across any number of sources.
#[derive(Debug, Clone)]
pub struct Pipeline {
    options: PipelineOptions,
    mode: OutputMode,
    capture_stages: bool,
}

impl Pipeline {
    /// Validates `options`; conflicting flags never reach the text.
    pub fn new(options: PipelineOptions) -> Result<Self, ConfigError> {
        let mode = options.validate()?;
        tracing::debug!("Pipeline mode: {}", mode.name());
        Ok(Self {
            options,
            mode,
            capture_stages: false,
        })
    }

    pub fn capture_stages(mut self, capture: bool) -> Self {
        self.capture_stages = capture;
        self
    }

    pub fn mode(&self) -> &OutputMode {
        &self.mode
    }

    pub fn run_path<P: AsRef<Path>>(&self, path: P) -> Result<RunReport, AppError> {
        let source = SourceTree::open(path)?;
        self.run(&source)
    }

    pub fn run(&self, source: &SourceTree) -> Result<RunReport, AppError> {
        let options = &self.options;
        let mut warnings = Vec::new();
        let mut stages = Vec::new();
        tracing::info!("Processing {} ({})", source.main_file.display(), self.mode.name());

        let flattened = IncludeResolver::new(&source.dir, options.limits.max_include_depth).flatten(&source.main_file)?;
        warnings.extend(flattened.warnings);
        let mut text = flattened.text;
        if self.capture_stages {
            stages.push((Stage::Merged, text.clone()));
        }

        // Abstracts are always read from comment-free text.
        if options.strip_comments || self.mode == OutputMode::Abstract {
            let stripped = strip_comments(&text);
            warnings.extend(stripped.warnings);
            text = stripped.text;
            if self.capture_stages {
                stages.push((Stage::Stripped, text.clone()));
            }
        }

        if options.expand_macros {
            let expanded = expand_macros(&text, options.limits.expansion());
            warnings.extend(expanded.warnings);
            text = expanded.text;
            if self.capture_stages {
                stages.push((Stage::Expanded, text.clone()));
            }
        }

        let body = if options.remove_appendix { remove_appendix(&text) } else { text.as_str() };

        let output = match &self.mode {
            OutputMode::Document => PipelineOutput::Document(body.to_string()),
            OutputMode::Sections(queries) => {
                let tree = SectionTree::build(body);
                let parts = queries
                    .iter()
                    .map(|query| tree.section_text(body, query))
                    .collect::<Result<Vec<_>, _>>()?;
                PipelineOutput::Sections(parts.join("\n"))
            }
            OutputMode::SectionList => PipelineOutput::SectionList(SectionTree::build(body).render_listing()),
            OutputMode::Abstract => PipelineOutput::Abstract(extract_abstract(&text)),
            OutputMode::FigurePaths => {
                let filter = FigureFilter {
                    exclude_comments: options.strip_comments,
                    exclude_appendix: options.remove_appendix,
                };
                // Offsets are checked against the appendix marker, so scan the
                // full text and let the filter decide.
                let (paths, figure_warnings) = figure_paths(&text, &source.dir, filter);
                warnings.extend(figure_warnings);
                PipelineOutput::FigurePaths(paths)
            }
        };

        if !warnings.is_empty() {
            tracing::info!("Finished {} with {} warnings", source.main_file.display(), warnings.len());
        }
        Ok(RunReport {
            source: source.clone(),
            mode: self.mode.clone(),
            output,
            warnings,
            stages,
        })
    }
}
