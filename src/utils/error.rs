// src/utils/error.rs
use std::path::PathBuf;
use thiserror::Error;

// Fatal conditions about the source tree itself
#[derive(Error, Debug)]
pub enum StructuralError {
    #[error("Source path does not exist: {0}")]
    SourceNotFound(PathBuf),

    #[error("Could not read source directory {path}: {source}")]
    UnreadableDirectory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("No .tex file containing \\documentclass found under {0}")]
    MainFileNotFound(PathBuf),

    #[error("Could not read root file {path}: {source}")]
    UnreadableRoot {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Flags --{first} and --{second} cannot be used together")]
    FlagConflict {
        first: &'static str,
        second: &'static str,
    },

    #[error("Invalid value for {name}: {value}")]
    InvalidValue { name: &'static str, value: String },
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SectionError {
    #[error("Section '{query}' is ambiguous; candidates:\n  {}", paths.join("\n  "))]
    Ambiguous { query: String, paths: Vec<String> },

    #[error("Section not found: {0}")]
    NotFound(String),
}

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(String),
}

/// Recoverable conditions surfaced to the caller next to the output.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Warning {
    #[error("Included file not found: {target} (from {from})")]
    MissingInclude { from: PathBuf, target: String },

    #[error("Skipping cyclic inclusion of {target} (from {from})")]
    CyclicInclude { from: PathBuf, target: PathBuf },

    #[error("Inclusion depth limit {limit} reached at {target}")]
    IncludeDepthExceeded { target: PathBuf, limit: usize },

    #[error("Malformed declaration of \\{name}: {reason}")]
    MalformedMacro { name: String, reason: String },

    #[error("Unsupported \\def parameter pattern for \\{0}; left unexpanded")]
    UnsupportedDefPattern(String),

    #[error("Expansion depth limit {limit} reached for \\{name}; left unexpanded")]
    ExpansionDepthExceeded { name: String, limit: usize },

    #[error("Expansion budget of {0} substitutions exhausted; remaining invocations left unexpanded")]
    ExpansionBudgetExhausted(usize),

    #[error("\\iffalse at byte {0} has no matching \\fi; left in place")]
    UnterminatedConditional(usize),

    #[error("Could not resolve figure path: {0}")]
    UnresolvedFigure(String),
}

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error), // Automatically convert IO errors

    #[error("Source tree error: {0}")]
    Structural(#[from] StructuralError),

    #[error("{0}")]
    Section(#[from] SectionError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Processing failed: {0}")]
    Processing(String),
}
