// src/main.rs
use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use texprompt::batch::run_batch;
use texprompt::config::{Limits, PipelineOptions};
use texprompt::storage::StorageManager;
use texprompt::utils::{self, AppError};
use texprompt::{Pipeline, PipelineOutput, RunReport};

/// Flatten a LaTeX source tree into a single prompt-ready document
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Extracted source directories (or main .tex files) to process
    #[arg(required = true)]
    sources: Vec<PathBuf>,

    /// Remove LaTeX comments and \iffalse blocks from the output
    #[arg(long)]
    no_comments: bool,

    /// Drop everything from \appendix onward
    #[arg(long)]
    no_appendix: bool,

    /// Expand \newcommand, \def and \DeclareMathOperator macros
    #[arg(long)]
    expand_macros: bool,

    /// Print resolved \includegraphics paths instead of the document
    #[arg(long)]
    figure_paths: bool,

    /// Print only the abstract
    #[arg(long = "abstract")]
    abstract_only: bool,

    /// Print only this section; a name or an "Outer > Inner" path (repeatable)
    #[arg(long = "section", value_name = "NAME")]
    sections: Vec<String>,

    /// Print the section tree
    #[arg(long)]
    list_sections: bool,

    /// Also save output and metadata under this directory
    #[arg(short, long)]
    output_dir: Option<PathBuf>,

    /// Debug mode - save each intermediate stage (requires --output-dir)
    #[arg(short, long)]
    debug: bool,

    /// Nesting limit for one macro occurrence
    #[arg(long)]
    max_expansion_depth: Option<usize>,

    /// Nesting limit for \input/\include chains
    #[arg(long)]
    max_include_depth: Option<usize>,
}

impl Args {
    fn pipeline_options(&self) -> Result<PipelineOptions, AppError> {
        let mut limits = Limits::from_env()?;
        if let Some(depth) = self.max_expansion_depth {
            tracing::debug!("Setting max expansion depth to {} from command-line argument", depth);
            limits.max_expansion_depth = depth;
        }
        if let Some(depth) = self.max_include_depth {
            tracing::debug!("Setting max include depth to {} from command-line argument", depth);
            limits.max_include_depth = depth;
        }

        Ok(PipelineOptions {
            strip_comments: self.no_comments,
            remove_appendix: self.no_appendix,
            expand_macros: self.expand_macros,
            figure_paths: self.figure_paths,
            abstract_only: self.abstract_only,
            list_sections: self.list_sections,
            sections: self.sections.clone(),
            limits,
        })
    }
}

fn persist(storage: &StorageManager, report: &RunReport) {
    if let Err(e) = storage.save_output(report) {
        tracing::error!("Failed to save output: {}", e);
    }
    if let Err(e) = storage.save_metadata(report) {
        tracing::error!("Failed to save metadata: {}", e);
    }
    if !report.stages.is_empty() {
        if let Err(e) = storage.save_stages(report) {
            tracing::error!("Failed to save debug stages: {}", e);
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), AppError> {
    // 1. Setup Logging (reads RUST_LOG env var)
    utils::logging::setup_logging();

    // 2. Parse CLI Arguments
    let args = Args::parse();
    tracing::info!("Starting processing for args: {:?}", args);

    // 3. Validate the flag combination before touching any source
    let pipeline = Pipeline::new(args.pipeline_options()?)?.capture_stages(args.debug);
    if args.debug && args.output_dir.is_none() {
        tracing::warn!("--debug has no effect without --output-dir");
    }

    // 4. Initialize storage
    let storage = args.output_dir.as_ref().map(StorageManager::new).transpose()?;

    // 5. Process every source
    let results = run_batch(Arc::new(pipeline), args.sources.clone()).await;

    let mut success_count = 0;
    let mut failure_count = 0;
    for (source, result) in results {
        match result {
            Ok(report) => {
                if success_count > 0 {
                    println!();
                }
                println!("{}", report.output.render());
                success_count += 1;

                if report.output == PipelineOutput::Abstract(None) {
                    tracing::warn!("No abstract found in {}", source.display());
                }
                for warning in &report.warnings {
                    tracing::debug!("{}: {}", source.display(), warning);
                }
                if let Some(storage) = &storage {
                    persist(storage, &report);
                }
            }
            Err(e) => {
                tracing::error!("Failed to process {}: {}", source.display(), e);
                eprintln!("{}: {}", source.display(), e);
                failure_count += 1;
            }
        }
    }

    tracing::info!("Processing finished. Success: {}, Failures: {}", success_count, failure_count);

    if failure_count > 0 {
        return Err(AppError::Processing(format!("{} of {} sources failed", failure_count, success_count + failure_count)));
    }

    Ok(())
}
