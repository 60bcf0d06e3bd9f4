// tests/pipeline.rs
use std::fs::{create_dir_all, write};
use std::path::Path;

use tempfile::tempdir;
use texprompt::utils::error::{ConfigError, SectionError};
use texprompt::{AppError, Pipeline, PipelineOptions, PipelineOutput, Warning};

fn paper(dir: &Path) {
    create_dir_all(dir.join("sections")).unwrap();
    write(
        dir.join("main.tex"),
        "\\documentclass{article}
\\newcommand{\\model}{TinyNet}
\\begin{document}
\\begin{abstract}
We present \\model.
\\end{abstract}
\\input{sections/intro}
\\section{Method}
\\subsection{Setup}
We train \\model. % on one GPU
\\section{Baselines}
\\subsection{Setup}
Defaults.
\\end{document}
",
    )
    .unwrap();
    write(dir.join("sections/intro.tex"), "\\section{Introduction}\n\\model is small.\n").unwrap();
}

fn run(dir: &Path, options: PipelineOptions) -> Result<PipelineOutput, AppError> {
    Pipeline::new(options)?.run_path(dir).map(|report| report.output)
}

#[test]
fn test_section_from_included_file_with_expansion() {
    let tmp = tempdir().unwrap();
    paper(tmp.path());

    let output = run(
        tmp.path(),
        PipelineOptions {
            strip_comments: true,
            expand_macros: true,
            sections: vec!["Introduction".to_string()],
            ..Default::default()
        },
    )
    .unwrap();

    let PipelineOutput::Sections(text) = output else {
        panic!("expected section text, got {:?}", output);
    };
    assert!(text.starts_with("\\section{Introduction}\nTinyNet is small."));
    assert!(!text.contains("Method"));
}

#[test]
fn test_whole_document_is_flattened_and_stripped() {
    let tmp = tempdir().unwrap();
    paper(tmp.path());

    let text = run(
        tmp.path(),
        PipelineOptions {
            strip_comments: true,
            ..Default::default()
        },
    )
    .unwrap()
    .render();

    assert!(text.contains("\\section{Introduction}"));
    assert!(!text.contains("\\input"));
    assert!(!text.contains("one GPU"));
    // Declarations stay untouched without expansion.
    assert!(text.contains("\\newcommand{\\model}{TinyNet}"));
}

#[test]
fn test_ambiguous_section_lists_candidates() {
    let tmp = tempdir().unwrap();
    paper(tmp.path());

    let err = run(
        tmp.path(),
        PipelineOptions {
            sections: vec!["Setup".to_string()],
            ..Default::default()
        },
    )
    .unwrap_err();

    match err {
        AppError::Section(SectionError::Ambiguous { paths, .. }) => {
            assert_eq!(paths, vec!["Method > Setup", "Baselines > Setup"]);
        }
        other => panic!("expected an ambiguity error, got {:?}", other),
    }

    let output = run(
        tmp.path(),
        PipelineOptions {
            sections: vec!["Baselines > Setup".to_string()],
            ..Default::default()
        },
    )
    .unwrap();
    assert_eq!(output.render(), "\\subsection{Setup}\nDefaults.\n");
}

#[test]
fn test_list_sections() {
    let tmp = tempdir().unwrap();
    paper(tmp.path());

    let output = run(
        tmp.path(),
        PipelineOptions {
            list_sections: true,
            ..Default::default()
        },
    )
    .unwrap();

    assert_eq!(output.render(), "Introduction\nMethod\n  Setup\nBaselines\n  Setup\n");
}

#[test]
fn test_abstract_with_expanded_macros() {
    let tmp = tempdir().unwrap();
    paper(tmp.path());

    let output = run(
        tmp.path(),
        PipelineOptions {
            abstract_only: true,
            expand_macros: true,
            ..Default::default()
        },
    )
    .unwrap();

    assert_eq!(output, PipelineOutput::Abstract(Some("We present TinyNet.".to_string())));
}

#[test]
fn test_figure_paths_respect_comment_and_appendix_filters() {
    let tmp = tempdir().unwrap();
    let dir = tmp.path();
    for name in ["live.png", "hidden.png", "extra.png"] {
        write(dir.join(name), b"png").unwrap();
    }
    write(
        dir.join("main.tex"),
        "\\documentclass{article}
\\begin{document}
\\includegraphics{live}
% \\includegraphics{hidden}
\\appendix
\\includegraphics{extra}
\\end{document}
",
    )
    .unwrap();

    let everything = run(
        dir,
        PipelineOptions {
            figure_paths: true,
            ..Default::default()
        },
    )
    .unwrap();
    assert_eq!(
        everything,
        PipelineOutput::FigurePaths(vec![dir.join("live.png"), dir.join("hidden.png"), dir.join("extra.png")])
    );

    let filtered = run(
        dir,
        PipelineOptions {
            figure_paths: true,
            strip_comments: true,
            remove_appendix: true,
            ..Default::default()
        },
    )
    .unwrap();
    assert_eq!(filtered, PipelineOutput::FigurePaths(vec![dir.join("live.png")]));
}

#[test]
fn test_self_inclusion_terminates_with_warning() {
    let tmp = tempdir().unwrap();
    write(tmp.path().join("main.tex"), "\\documentclass{article}\n\\input{main}\nbody\n").unwrap();

    let report = Pipeline::new(PipelineOptions::default()).unwrap().run_path(tmp.path()).unwrap();

    assert_eq!(report.output.render(), "\\documentclass{article}\n\\input{main}\nbody\n");
    assert!(matches!(&report.warnings[..], [Warning::CyclicInclude { .. }]));
}

#[test]
fn test_conflicting_modes_are_rejected() {
    let options = PipelineOptions {
        list_sections: true,
        sections: vec!["Method".to_string()],
        ..Default::default()
    };
    assert!(matches!(Pipeline::new(options), Err(ConfigError::FlagConflict { .. })));
}

#[test]
fn test_missing_source_is_structural_error() {
    let tmp = tempdir().unwrap();
    let result = Pipeline::new(PipelineOptions::default())
        .unwrap()
        .run_path(tmp.path().join("nowhere"));
    assert!(matches!(result, Err(AppError::Structural(_))));
}
