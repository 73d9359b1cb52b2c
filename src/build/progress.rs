//! Progress notifications emitted by compile workers.

use colored::*;
use indicatif::{ProgressBar, ProgressStyle};
use log::warn;
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgressKind {
    Compiled,
    /// Object newer than its source and dependencies; not recompiled.
    UpToDate,
    /// Only recorded in the compilation database.
    Recorded,
}

#[derive(Debug, Clone)]
pub struct ProgressEvent<'a> {
    pub file: &'a Path,
    pub kind: ProgressKind,
    pub completed: usize,
    pub total: usize,
}

/// Receives events from several workers at once.
pub trait ProgressSink: Send + Sync {
    fn on_progress(&self, event: &ProgressEvent<'_>);

    /// Compiler diagnostics of a file that compiled successfully.
    fn on_warning(&self, file: &Path, message: &str) {
        warn!("{}:\n{}", file.display(), message);
    }
}

pub struct NoProgress;

impl ProgressSink for NoProgress {
    fn on_progress(&self, _event: &ProgressEvent<'_>) {}
}

/// Terminal progress bar.
pub struct BarProgress {
    pb: ProgressBar,
}

impl BarProgress {
    pub fn new() -> Self {
        let style = ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("#>-");
        let pb = ProgressBar::new(0);
        pb.set_style(style);
        pb.set_message("Compiling...");
        Self { pb }
    }

    pub fn finish(&self) {
        self.pb.finish_with_message("Compilation complete");
    }
}

impl Default for BarProgress {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressSink for BarProgress {
    fn on_progress(&self, event: &ProgressEvent<'_>) {
        self.pb.set_length(event.total as u64);
        self.pb.set_position(event.completed as u64);
        let name = event
            .file
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let verb = match event.kind {
            ProgressKind::Compiled => "Compiled",
            ProgressKind::UpToDate => "Up to date",
            ProgressKind::Recorded => "Recorded",
        };
        self.pb.set_message(format!("{verb} {name}"));
    }

    fn on_warning(&self, file: &Path, message: &str) {
        self.pb.println(format!(
            "{} Warning in {}:\n{}",
            "!".yellow(),
            file.display(),
            message
        ));
    }
}
