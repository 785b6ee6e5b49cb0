//! Survey loader
//!
//! - A single survey JSON file, or a directory of `*.json` files
//! - Files in a directory load in file-name order
//! - Malformed files are FATAL; nothing partial is registered from them

use std::fs;
use std::path::{Path, PathBuf};

use super::errors::{SchemaError, SchemaResult};
use super::registry::SchemaRegistry;
use super::types::Survey;

/// Loads survey definitions from disk into a registry
pub struct SchemaLoader {
    source: PathBuf,
}

impl SchemaLoader {
    /// Creates a loader for a file or directory path
    pub fn new(source: impl AsRef<Path>) -> Self {
        Self {
            source: source.as_ref().to_path_buf(),
        }
    }

    pub fn source(&self) -> &Path {
        &self.source
    }

    /// Loads every survey under the source into `registry`.
    ///
    /// Returns the ids of the surveys loaded, in load order.
    pub fn load_into(&self, registry: &mut SchemaRegistry) -> SchemaResult<Vec<String>> {
        let mut loaded = Vec::new();
        for path in self.survey_files()? {
            let survey = Self::read_survey(&path)?;
            let id = survey.survey_id.clone();
            registry.register(survey)?;
            loaded.push(id);
        }
        Ok(loaded)
    }

    /// Convenience: a fresh registry holding everything under the source
    pub fn load(&self) -> SchemaResult<SchemaRegistry> {
        let mut registry = SchemaRegistry::new();
        self.load_into(&mut registry)?;
        Ok(registry)
    }

    fn survey_files(&self) -> SchemaResult<Vec<PathBuf>> {
        let display = self.source.display().to_string();

        if self.source.is_file() {
            return Ok(vec![self.source.clone()]);
        }

        let entries =
            fs::read_dir(&self.source).map_err(|e| SchemaError::io_failed(&display, e))?;

        let mut files = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| SchemaError::io_failed(&display, e))?;
            let path = entry.path();

            // Skip non-JSON files
            if path.extension().map_or(true, |ext| ext != "json") {
                continue;
            }
            files.push(path);
        }
        files.sort();
        Ok(files)
    }

    /// Parses a single survey file
    pub fn read_survey(path: &Path) -> SchemaResult<Survey> {
        let display = path.display().to_string();
        let content = fs::read_to_string(path).map_err(|e| SchemaError::io_failed(&display, e))?;

        serde_json::from_str(&content)
            .map_err(|e| SchemaError::malformed_file(&display, format!("Invalid JSON: {}", e)))
    }
}
