// src/storage/mod.rs
use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::pipeline::RunReport;
use crate::utils::error::StorageError;

/// Metadata written next to each saved output.
#[derive(Debug, Serialize)]
struct OutputMetadata<'a> {
    source_dir: String,
    main_file: String,
    mode: &'a str,
    content_length: usize,
    warnings: Vec<String>,
    extraction_timestamp: String,
}

pub struct StorageManager {
    base_dir: PathBuf,
}

impl StorageManager {
    /// Creates a new StorageManager with the specified base directory
    pub fn new<P: AsRef<Path>>(base_dir: P) -> Result<Self, StorageError> {
        let base_path = base_dir.as_ref().to_path_buf();

        // Create the base directory if it doesn't exist
        if !base_path.exists() {
            fs::create_dir_all(&base_path)?;
        }

        Ok(Self { base_dir: base_path })
    }

    /// `/base_dir/<name>/`, created on demand
    fn target_dir(&self, name: &str) -> Result<PathBuf, StorageError> {
        let target_dir = self.base_dir.join(name);
        if !target_dir.exists() {
            fs::create_dir_all(&target_dir)?;
        }
        Ok(target_dir)
    }

    /// Saves the rendered output as `<name>/<name>.<ext>`
    pub fn save_output(&self, report: &RunReport) -> Result<PathBuf, StorageError> {
        let name = report.source.name();
        let file_path = self
            .target_dir(&name)?
            .join(format!("{}.{}", name, report.output.extension()));

        fs::write(&file_path, report.output.render())?;
        tracing::info!("Saved output to {}", file_path.display());
        Ok(file_path)
    }

    /// Saves metadata about the run in JSON format
    pub fn save_metadata(&self, report: &RunReport) -> Result<PathBuf, StorageError> {
        let name = report.source.name();
        let file_path = self.target_dir(&name)?.join(format!("{}_meta.json", name));

        let metadata = OutputMetadata {
            source_dir: report.source.dir.display().to_string(),
            main_file: report.source.main_file.display().to_string(),
            mode: report.mode.name(),
            content_length: report.output.render().len(),
            warnings: report.warnings.iter().map(|w| w.to_string()).collect(),
            extraction_timestamp: chrono::Utc::now().to_rfc3339(),
        };
        let metadata_str =
            serde_json::to_string_pretty(&metadata).map_err(|e| StorageError::SerializationError(e.to_string()))?;

        fs::write(&file_path, metadata_str)?;
        tracing::info!("Saved metadata to {}", file_path.display());
        Ok(file_path)
    }

    /// Saves every captured intermediate stage under `<name>/debug/`
    pub fn save_stages(&self, report: &RunReport) -> Result<Vec<PathBuf>, StorageError> {
        let debug_dir = self.target_dir(&report.source.name())?.join("debug");
        fs::create_dir_all(&debug_dir)?;

        let mut saved = Vec::with_capacity(report.stages.len());
        for (stage, text) in &report.stages {
            let path = debug_dir.join(format!("{}.tex", stage.file_stem()));
            fs::write(&path, text)?;
            tracing::debug!("Saved {:?} stage to {}", stage, path.display());
            saved.push(path);
        }
        Ok(saved)
    }
}
