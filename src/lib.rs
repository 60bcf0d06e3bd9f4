// src/lib.rs
//! Flattens a multi-file LaTeX source tree into one prompt-ready document.
//!
//! The pipeline resolves `\input`/`\include`, optionally strips comments and
//! `\iffalse` blocks, optionally expands user macros, and then emits the
//! whole document, selected sections, a section listing, the abstract, or the
//! figure paths.

pub mod batch;
pub mod config;
pub mod extractors;
pub mod pipeline;
pub mod source;
pub mod storage;
pub mod transform;
pub mod utils;

pub use config::{Limits, OutputMode, PipelineOptions};
pub use pipeline::{Pipeline, PipelineOutput, RunReport};
pub use source::SourceTree;
pub use utils::{AppError, Warning};
