// src/transform/mod.rs
pub mod comments;
pub mod include;
pub mod macros;

// Re-export the stage entry points for convenience
pub use comments::{dead_regions, strip_comments, DeadRegions, Stripped};
pub use include::{Flattened, IncludeResolver};
pub use macros::{expand_macros, Expanded, ExpansionLimits, MacroDefinition, MacroTable};
