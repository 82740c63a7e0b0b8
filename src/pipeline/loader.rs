//! Reading source files and their package metadata.

use std::collections::HashMap;
use std::path::PathBuf;

use async_trait::async_trait;
use futures::stream::{self, StreamExt, TryStreamExt};
use tracing::{debug, warn};

use crate::ast_engine::{grammar_for_path, resolve_selector};
use crate::error::{Error, Result, RuleLoadError};
use crate::types::{PackageInfo, SourceFile};

/// Package manifest looked up next to every source file.
pub const PACKAGE_MANIFEST: &str = "package.json";

/// Source of file contents, addressed by project-relative `/` paths.
#[async_trait]
pub trait SourceLoader: Send + Sync {
    async fn read(&self, path: &str) -> Result<String>;

    async fn exists(&self, path: &str) -> bool;
}

/// Reads files under a project root.
#[derive(Debug, Clone)]
pub struct FsLoader {
    root: PathBuf,
}

impl FsLoader {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

#[async_trait]
impl SourceLoader for FsLoader {
    async fn read(&self, path: &str) -> Result<String> {
        let full = self.root.join(path);
        tokio::fs::read_to_string(&full).await.map_err(|e| Error::io(full, e))
    }

    async fn exists(&self, path: &str) -> bool {
        tokio::fs::try_exists(self.root.join(path)).await.unwrap_or(false)
    }
}

/// In-memory files, for tests and embedding.
#[derive(Debug, Clone, Default)]
pub struct MemoryLoader {
    files: HashMap<String, String>,
}

impl MemoryLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_file(mut self, path: &str, content: &str) -> Self {
        self.files.insert(path.to_string(), content.to_string());
        self
    }
}

#[async_trait]
impl SourceLoader for MemoryLoader {
    async fn read(&self, path: &str) -> Result<String> {
        self.files.get(path).cloned().ok_or_else(|| {
            Error::io(
                path,
                std::io::Error::new(std::io::ErrorKind::NotFound, "no such in-memory file"),
            )
        })
    }

    async fn exists(&self, path: &str) -> bool {
        self.files.contains_key(path)
    }
}

/// Grammar name for a file: the configured selector, else by extension.
pub fn select_grammar(path: &str, selector: Option<&str>) -> std::result::Result<&'static str, RuleLoadError> {
    let spec = match selector {
        Some(selector) => resolve_selector(selector).ok_or_else(|| RuleLoadError::UnknownGrammar(selector.to_string()))?,
        None => grammar_for_path(path).ok_or_else(|| RuleLoadError::UnknownGrammar(path.to_string()))?,
    };
    Ok(spec.name)
}

/// Read every input, at most `max_concurrent` at a time. Output order
/// follows `inputs`.
pub async fn load_sources(
    loader: &dyn SourceLoader,
    inputs: &[String],
    selector: Option<&str>,
    max_concurrent: usize,
) -> Result<Vec<SourceFile>> {
    stream::iter(inputs.iter())
        .map(|path| load_one(loader, path, selector))
        .buffered(max_concurrent.max(1))
        .try_collect()
        .await
}

async fn load_one(loader: &dyn SourceLoader, path: &str, selector: Option<&str>) -> Result<SourceFile> {
    let path = path.trim_start_matches("./");
    let grammar = select_grammar(path, selector)?;
    let content = loader.read(path).await?;
    debug!(path, grammar, bytes = content.len(), "Loaded source");

    let mut file = SourceFile::new(path, content, grammar);
    if let Some(package) = find_package(loader, path).await {
        file = file.with_package(package);
    }
    Ok(file)
}

/// Package metadata from the file's own directory, if any. An unreadable
/// manifest is logged and ignored.
async fn find_package(loader: &dyn SourceLoader, path: &str) -> Option<PackageInfo> {
    let manifest = match path.rsplit_once('/') {
        Some((dir, _)) => format!("{}/{}", dir, PACKAGE_MANIFEST),
        None => PACKAGE_MANIFEST.to_string(),
    };
    if !loader.exists(&manifest).await {
        return None;
    }

    let parsed = match loader.read(&manifest).await {
        Ok(text) => serde_json::from_str::<PackageInfo>(&text).map_err(|e| e.to_string()),
        Err(e) => Err(e.to_string()),
    };
    match parsed {
        Ok(package) => Some(package),
        Err(error) => {
            warn!(manifest = %manifest, error = %error, "Ignoring unreadable package manifest");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn loader() -> MemoryLoader {
        MemoryLoader::new()
            .with_file("lib/index.js", "module.exports = 1;")
            .with_file("lib/package.json", r#"{"name": "lib", "main": "index.js"}"#)
            .with_file("src/app.ts", "let a: number = 1;")
            .with_file("src/package.json", "{ not json")
            .with_file("top.js", "let top;")
    }

    #[test]
    fn test_select_grammar() {
        assert_eq!(select_grammar("a/b.mjs", None), Ok("javascript"));
        assert_eq!(select_grammar("a/b.tsx", None), Ok("tsx"));
        assert_eq!(select_grammar("a/b.txt", Some("javascript")), Ok("javascript"));
        assert_eq!(
            select_grammar("a/b.txt", None),
            Err(RuleLoadError::UnknownGrammar("a/b.txt".to_string()))
        );
    }

    #[tokio::test]
    async fn test_load_sources_in_input_order() {
        let inputs = vec!["./lib/index.js".to_string(), "src/app.ts".to_string(), "top.js".to_string()];
        let files = load_sources(&loader(), &inputs, None, 2).await.unwrap();

        let paths: Vec<_> = files.iter().map(|f| f.path.as_str()).collect();
        assert_eq!(paths, vec!["lib/index.js", "src/app.ts", "top.js"]);
        assert_eq!(files[0].package.as_ref().map(|p| p.name.as_str()), Some("lib"));
        assert!(files[0].is_package_main());
        assert_eq!(files[1].grammar, "typescript");
        assert!(files[1].package.is_none());
        assert!(files[2].package.is_none());
    }

    #[tokio::test]
    async fn test_missing_file_fails() {
        let inputs = vec!["missing.js".to_string()];
        let err = load_sources(&loader(), &inputs, None, 4).await.unwrap_err();
        assert!(matches!(err, Error::Io { .. }));
    }

    #[test]
    fn test_fs_loader() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.js"), "let a;").unwrap();
        let loader = FsLoader::new(dir.path());

        tokio_test::block_on(async {
            assert_eq!(loader.read("a.js").await.unwrap(), "let a;");
            assert!(loader.exists("a.js").await);
            assert!(!loader.exists(PACKAGE_MANIFEST).await);
        });
    }
}
