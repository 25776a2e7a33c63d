//! Environment Catalog
//!
//! Answers which execution environments exist. The filesystem implementation
//! treats every sub-directory of the environments root as an environment and
//! considers it buildable when it carries an `execution-environment.yml`
//! (or `.yaml`).

use async_trait::async_trait;
use eebuilder_core::domain::environment::Environment;
use std::path::{Path, PathBuf};

/// File names accepted as an environment definition
pub const DEFINITION_FILES: [&str; 2] = ["execution-environment.yml", "execution-environment.yaml"];

/// Lookup of known environments
#[async_trait]
pub trait EnvironmentCatalog: Send + Sync {
    /// Returns `true` if the environment exists and can be built
    async fn environment_exists(&self, name: &str) -> bool;

    /// Lists every environment directory, sorted by name
    async fn list_environments(&self) -> std::io::Result<Vec<Environment>>;
}

/// Catalog backed by a directory of environment definitions
pub struct FsEnvironmentCatalog {
    root: PathBuf,
}

impl FsEnvironmentCatalog {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

}

/// Name of the definition file present in `dir`, `.yml` first
pub async fn find_definition(dir: &Path) -> Option<&'static str> {
    for file in DEFINITION_FILES {
        if let Ok(meta) = tokio::fs::metadata(dir.join(file)).await {
            if meta.is_file() {
                return Some(file);
            }
        }
    }
    None
}

#[async_trait]
impl EnvironmentCatalog for FsEnvironmentCatalog {
    async fn environment_exists(&self, name: &str) -> bool {
        if !is_valid_environment_name(name) {
            return false;
        }

        find_definition(&self.root.join(name)).await.is_some()
    }

    async fn list_environments(&self) -> std::io::Result<Vec<Environment>> {
        let mut environments = Vec::new();
        let mut dir = tokio::fs::read_dir(&self.root).await?;

        while let Some(entry) = dir.next_entry().await? {
            if !entry.file_type().await?.is_dir() {
                continue;
            }

            let name = entry.file_name().to_string_lossy().to_string();
            if name.starts_with('.') {
                continue;
            }

            let path = entry.path();
            environments.push(Environment {
                has_execution_environment: find_definition(&path).await.is_some(),
                path: path.to_string_lossy().to_string(),
                name,
            });
        }

        environments.sort_by(|a, b| a.name.cmp(&b.name));

        tracing::debug!(
            "Found {} environment(s) under {}",
            environments.len(),
            self.root.display()
        );

        Ok(environments)
    }
}

/// Environment names are plain directory names
pub fn is_valid_environment_name(name: &str) -> bool {
    !name.is_empty()
        && name != "."
        && name != ".."
        && !name.contains('/')
        && !name.contains('\\')
        && !name.contains('\0')
}
