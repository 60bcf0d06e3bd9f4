// src/config.rs
//! The closed set of pipeline settings, validated once before any work.

use crate::transform::ExpansionLimits;
use crate::utils::error::ConfigError;

pub const DEFAULT_MAX_EXPANSION_DEPTH: usize = 32;
pub const DEFAULT_MAX_EXPANSIONS: usize = 100_000;
pub const DEFAULT_MAX_INCLUDE_DEPTH: usize = 16;

pub const MAX_EXPANSION_DEPTH_ENV: &str = "TEXPROMPT_MAX_EXPANSION_DEPTH";
pub const MAX_INCLUDE_DEPTH_ENV: &str = "TEXPROMPT_MAX_INCLUDE_DEPTH";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Limits {
    pub max_expansion_depth: usize,
    pub max_expansions: usize,
    pub max_include_depth: usize,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_expansion_depth: DEFAULT_MAX_EXPANSION_DEPTH,
            max_expansions: DEFAULT_MAX_EXPANSIONS,
            max_include_depth: DEFAULT_MAX_INCLUDE_DEPTH,
        }
    }
}

fn parse_limit(name: &'static str, value: &str) -> Result<usize, ConfigError> {
    value
        .trim()
        .parse::<usize>()
        .ok()
        .filter(|n| *n > 0)
        .ok_or_else(|| ConfigError::InvalidValue {
            name,
            value: value.to_string(),
        })
}

impl Limits {
    /// Defaults, overridden by the environment where set.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut limits = Self::default();
        if let Ok(value) = std::env::var(MAX_EXPANSION_DEPTH_ENV) {
            limits.max_expansion_depth = parse_limit(MAX_EXPANSION_DEPTH_ENV, &value)?;
            tracing::debug!("Using {}={}", MAX_EXPANSION_DEPTH_ENV, limits.max_expansion_depth);
        }
        if let Ok(value) = std::env::var(MAX_INCLUDE_DEPTH_ENV) {
            limits.max_include_depth = parse_limit(MAX_INCLUDE_DEPTH_ENV, &value)?;
            tracing::debug!("Using {}={}", MAX_INCLUDE_DEPTH_ENV, limits.max_include_depth);
        }
        Ok(limits)
    }

    pub fn expansion(&self) -> ExpansionLimits {
        ExpansionLimits {
            max_depth: self.max_expansion_depth,
            max_expansions: self.max_expansions,
        }
    }
}

/// Flags that pick what the pipeline emits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModeFlag {
    Abstract,
    FigurePaths,
    Section,
    ListSections,
}

impl ModeFlag {
    pub fn flag_name(self) -> &'static str {
        match self {
            Self::Abstract => "abstract",
            Self::FigurePaths => "figure-paths",
            Self::Section => "section",
            Self::ListSections => "list-sections",
        }
    }
}

/// Output-mode flags that cannot be combined.
pub const INCOMPATIBLE_PAIRS: &[(ModeFlag, ModeFlag)] = &[
    (ModeFlag::Abstract, ModeFlag::FigurePaths),
    (ModeFlag::FigurePaths, ModeFlag::Section),
    (ModeFlag::Abstract, ModeFlag::Section),
    (ModeFlag::ListSections, ModeFlag::Abstract),
    (ModeFlag::ListSections, ModeFlag::FigurePaths),
    (ModeFlag::ListSections, ModeFlag::Section),
];

#[derive(Debug, Clone, Default)]
pub struct PipelineOptions {
    pub strip_comments: bool,
    pub remove_appendix: bool,
    pub expand_macros: bool,
    pub figure_paths: bool,
    pub abstract_only: bool,
    pub list_sections: bool,
    /// Names or `A > B` paths, output in this order.
    pub sections: Vec<String>,
    pub limits: Limits,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputMode {
    Document,
    Sections(Vec<String>),
    SectionList,
    Abstract,
    FigurePaths,
}

impl OutputMode {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Document => "document",
            Self::Sections(_) => "sections",
            Self::SectionList => "section-list",
            Self::Abstract => "abstract",
            Self::FigurePaths => "figure-paths",
        }
    }
}

impl PipelineOptions {
    fn is_set(&self, flag: ModeFlag) -> bool {
        match flag {
            ModeFlag::Abstract => self.abstract_only,
            ModeFlag::FigurePaths => self.figure_paths,
            ModeFlag::Section => !self.sections.is_empty(),
            ModeFlag::ListSections => self.list_sections,
        }
    }

    /// Rejects incompatible flags, then names the single output mode.
    pub fn validate(&self) -> Result<OutputMode, ConfigError> {
        for &(first, second) in INCOMPATIBLE_PAIRS {
            if self.is_set(first) && self.is_set(second) {
                return Err(ConfigError::FlagConflict {
                    first: first.flag_name(),
                    second: second.flag_name(),
                });
            }
        }
        if self.limits.max_expansion_depth == 0 {
            return Err(ConfigError::InvalidValue {
                name: "max-expansion-depth",
                value: "0".to_string(),
            });
        }
        if self.limits.max_include_depth == 0 {
            return Err(ConfigError::InvalidValue {
                name: "max-include-depth",
                value: "0".to_string(),
            });
        }

        let mode = if self.abstract_only {
            OutputMode::Abstract
        } else if self.figure_paths {
            OutputMode::FigurePaths
        } else if self.list_sections {
            OutputMode::SectionList
        } else if !self.sections.is_empty() {
            OutputMode::Sections(self.sections.clone())
        } else {
            OutputMode::Document
        };
        Ok(mode)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_abstract_with_figure_paths_is_rejected() {
        let options = PipelineOptions {
            abstract_only: true,
            figure_paths: true,
            ..Default::default()
        };
        assert_eq!(
            options.validate(),
            Err(ConfigError::FlagConflict {
                first: "abstract",
                second: "figure-paths"
            })
        );
    }

    #[test]
    fn test_figure_paths_with_section_is_rejected() {
        let options = PipelineOptions {
            figure_paths: true,
            sections: vec!["Intro".to_string()],
            ..Default::default()
        };
        assert!(matches!(
            options.validate(),
            Err(ConfigError::FlagConflict {
                first: "figure-paths",
                second: "section"
            })
        ));
    }

    #[test]
    fn test_modes() {
        assert_eq!(PipelineOptions::default().validate(), Ok(OutputMode::Document));

        let options = PipelineOptions {
            sections: vec!["A".to_string(), "B > C".to_string()],
            strip_comments: true,
            remove_appendix: true,
            ..Default::default()
        };
        assert_eq!(
            options.validate(),
            Ok(OutputMode::Sections(vec!["A".to_string(), "B > C".to_string()]))
        );

        let options = PipelineOptions {
            figure_paths: true,
            strip_comments: true,
            remove_appendix: true,
            ..Default::default()
        };
        assert_eq!(options.validate(), Ok(OutputMode::FigurePaths));
    }

    #[test]
    fn test_zero_depth_limits_are_rejected() {
        let options = PipelineOptions {
            limits: Limits {
                max_include_depth: 0,
                ..Limits::default()
            },
            ..Default::default()
        };
        assert_eq!(
            options.validate(),
            Err(ConfigError::InvalidValue {
                name: "max-include-depth",
                value: "0".to_string()
            })
        );

        let options = PipelineOptions {
            limits: Limits {
                max_expansion_depth: 0,
                ..Limits::default()
            },
            ..Default::default()
        };
        assert!(matches!(
            options.validate(),
            Err(ConfigError::InvalidValue {
                name: "max-expansion-depth",
                ..
            })
        ));
    }

    #[test]
    fn test_parse_limit() {
        assert_eq!(parse_limit("x", " 8 "), Ok(8));
        assert!(parse_limit("x", "0").is_err());
        assert!(parse_limit("x", "many").is_err());
    }
}
