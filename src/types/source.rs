//! Source file and location types.

use std::fmt;

use serde::{Deserialize, Serialize};

/// A position in a source file.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Location {
    /// Line number (1-indexed).
    pub line: usize,
    /// Column (0-indexed, in bytes).
    pub column: usize,
    /// Absolute byte offset.
    pub position: usize,
}

impl Location {
    pub fn new(line: usize, column: usize, position: usize) -> Self {
        Self {
            line,
            column,
            position,
        }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

/// Package metadata found next to a source file (`package.json`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageInfo {
    /// Package name.
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Entry module, relative to the package directory.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub main: Option<String>,
}

impl PackageInfo {
    /// Check whether `file_name` (relative to the package directory) is the
    /// package entry point. Packages without `main` default to `index.js`.
    pub fn is_main(&self, file_name: &str) -> bool {
        let main = self.main.as_deref().unwrap_or("index.js");
        let main = main.trim_start_matches("./");
        file_name == main || (!main.contains('.') && file_name == format!("{}.js", main))
    }
}

/// A source file loaded for processing.
#[derive(Debug, Clone)]
pub struct SourceFile {
    /// Path relative to the project root, with `/` separators.
    pub path: String,
    /// File content.
    pub content: String,
    /// Grammar selected for this file.
    pub grammar: String,
    /// Package metadata, when this file's directory has a `package.json`.
    pub package: Option<PackageInfo>,
}

impl SourceFile {
    pub fn new(path: impl Into<String>, content: impl Into<String>, grammar: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            content: content.into(),
            grammar: grammar.into(),
            package: None,
        }
    }

    /// Attach package metadata.
    pub fn with_package(mut self, package: PackageInfo) -> Self {
        self.package = Some(package);
        self
    }

    /// File name without directories.
    pub fn file_name(&self) -> &str {
        self.path.rsplit('/').next().unwrap_or(&self.path)
    }

    /// Check if this file is the entry module of its package.
    pub fn is_package_main(&self) -> bool {
        self.package
            .as_ref()
            .map_or(false, |pkg| pkg.is_main(self.file_name()))
    }
}
