// src/extractors/mod.rs
pub mod abstract_text;
pub mod appendix;
pub mod figures;
pub mod section;

// Re-export key extraction types for convenience
pub use abstract_text::extract_abstract;
pub use appendix::{find_appendix_marker, remove_appendix};
pub use figures::{figure_paths, scan_figures, FigureFilter, FigureReference};
pub use section::{SectionLevel, SectionNode, SectionTree};
