// src/batch.rs
use std::path::PathBuf;
use std::sync::Arc;

use crate::pipeline::{Pipeline, RunReport};
use crate::utils::AppError;

/// Runs one independent pipeline per source on the blocking pool.
/// Results come back in the order the sources were given.
pub async fn run_batch(pipeline: Arc<Pipeline>, sources: Vec<PathBuf>) -> Vec<(PathBuf, Result<RunReport, AppError>)> {
    let handles: Vec<_> = sources
        .into_iter()
        .map(|source| {
            let pipeline = Arc::clone(&pipeline);
            let path = source.clone();
            (source, tokio::task::spawn_blocking(move || pipeline.run_path(&path)))
        })
        .collect();

    let mut results = Vec::with_capacity(handles.len());
    for (source, handle) in handles {
        let result = match handle.await {
            Ok(result) => result,
            Err(e) => Err(AppError::Processing(format!("Worker for {} failed: {}", source.display(), e))),
        };
        results.push((source, result));
    }
    results
}
