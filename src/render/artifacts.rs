//! Named output artifacts and writing them to disk.

use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::debug;

use crate::error::{Error, Result, SerializationError};

/// How an artifact's content was produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtifactKind {
    Text,
    Json,
}

/// A rendered artifact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    pub name: String,
    pub kind: ArtifactKind,
    pub content: String,
}

/// Ordered mapping from artifact name to content.
///
/// Inserting an existing name replaces its content in place.
#[derive(Debug, Clone, Default)]
pub struct Artifacts {
    entries: Vec<Artifact>,
}

impl Artifacts {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add text content as-is.
    pub fn insert_text(&mut self, name: &str, content: impl Into<String>) {
        self.insert(Artifact {
            name: name.to_string(),
            kind: ArtifactKind::Text,
            content: content.into(),
        });
    }

    /// Serialize `value` as pretty-printed JSON.
    pub fn insert_json<T: Serialize + ?Sized>(&mut self, name: &str, value: &T) -> std::result::Result<(), SerializationError> {
        let content = serde_json::to_string_pretty(value).map_err(|source| SerializationError {
            artifact: name.to_string(),
            source,
        })?;
        self.insert(Artifact {
            name: name.to_string(),
            kind: ArtifactKind::Json,
            content,
        });
        Ok(())
    }

    fn insert(&mut self, artifact: Artifact) {
        match self.entries.iter_mut().find(|a| a.name == artifact.name) {
            Some(existing) => *existing = artifact,
            None => self.entries.push(artifact),
        }
    }

    pub fn get(&self, name: &str) -> Option<&Artifact> {
        self.entries.iter().find(|a| a.name == name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|a| a.name.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = &Artifact> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Write every artifact under `dir`, creating directories as needed.
    /// Artifact names may contain `/`.
    pub async fn write_to(&self, dir: &Path) -> Result<Vec<PathBuf>> {
        let mut written = Vec::with_capacity(self.entries.len());
        for artifact in &self.entries {
            let path = dir.join(&artifact.name);
            if let Some(parent) = path.parent() {
                tokio::fs::create_dir_all(parent)
                    .await
                    .map_err(|e| Error::io(parent, e))?;
            }
            tokio::fs::write(&path, &artifact.content)
                .await
                .map_err(|e| Error::io(&path, e))?;
            debug!(artifact = %artifact.name, bytes = artifact.content.len(), "Wrote artifact");
            written.push(path);
        }
        Ok(written)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_insert_keeps_order_and_replaces() {
        let mut artifacts = Artifacts::new();
        artifacts.insert_text("b.txt", "one");
        artifacts.insert_json("a.json", &json!({"x": 1})).unwrap();
        artifacts.insert_text("b.txt", "two");

        assert_eq!(artifacts.names().collect::<Vec<_>>(), vec!["b.txt", "a.json"]);
        assert_eq!(artifacts.get("b.txt").unwrap().content, "two");
        assert_eq!(artifacts.get("a.json").unwrap().content, "{\n  \"x\": 1\n}");
        assert_eq!(artifacts.get("a.json").unwrap().kind, ArtifactKind::Json);
    }

    #[test]
    fn test_unserializable_content_is_an_error() {
        use std::collections::HashMap;

        // Non-string map keys cannot be represented in JSON
        let mut value = HashMap::new();
        value.insert((1, 2), "pair");

        let err = Artifacts::new().insert_json("bad.json", &value).unwrap_err();
        assert_eq!(err.artifact, "bad.json");
    }

    #[tokio::test]
    async fn test_write_to_creates_directories() {
        let dir = tempfile::tempdir().unwrap();
        let mut artifacts = Artifacts::new();
        artifacts.insert_text("sources/lib/a.js", "let a;\n");
        artifacts.insert_json("report.json", &json!({"items": {}})).unwrap();

        let written = artifacts.write_to(dir.path()).await.unwrap();

        assert_eq!(written.len(), 2);
        let source = std::fs::read_to_string(dir.path().join("sources/lib/a.js")).unwrap();
        assert_eq!(source, "let a;\n");
        assert!(dir.path().join("report.json").exists());
    }
}
