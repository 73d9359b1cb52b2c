//! `compile_commands.json` recording.

use super::compile::CompileJob;
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompilationEntry {
    pub directory: PathBuf,
    pub arguments: Vec<String>,
    pub file: PathBuf,
    pub output: PathBuf,
}

/// Entries appended concurrently by compile workers, saved once at the end.
#[derive(Debug)]
pub struct CompilationDatabase {
    file: PathBuf,
    entries: Mutex<Vec<CompilationEntry>>,
}

impl CompilationDatabase {
    pub fn new(file: impl Into<PathBuf>) -> Self {
        Self {
            file: file.into(),
            entries: Mutex::new(Vec::new()),
        }
    }

    pub fn file(&self) -> &Path {
        &self.file
    }

    pub fn add(&self, job: &CompileJob) {
        let entry = CompilationEntry {
            directory: job.directory.clone(),
            arguments: job.arguments.clone(),
            file: job.source.clone(),
            output: job.object.clone(),
        };
        self.entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(entry);
    }

    /// Recorded entries sorted by source file.
    pub fn entries(&self) -> Vec<CompilationEntry> {
        let mut entries = self
            .entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone();
        entries.sort_by(|a, b| a.file.cmp(&b.file));
        entries
    }

    pub fn len(&self) -> usize {
        self.entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn save(&self) -> Result<()> {
        let json = serde_json::to_string_pretty(&self.entries())?;
        if let Some(parent) = self.file.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| Error::io("creating", parent, e))?;
        }
        fs::write(&self.file, json).map_err(|e| Error::io("writing", &self.file, e))
    }
}
