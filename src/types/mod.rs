//! Core types shared across the pipeline.

mod config;
mod source;

pub use config::DocwalkConfig;
pub use source::{Location, PackageInfo, SourceFile};
