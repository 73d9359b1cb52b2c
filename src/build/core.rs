use super::compile::{CompileOptions, compile_files, compile_files_recursive};
use super::merge::{SourceOverrides, merge_sources};
use super::prepare::{copy_additional_files, write_merged_unit};
use crate::error::{Error, Result};
use crate::sketch::Sketch;
use log::{debug, info};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

/// Nested source directory compiled recursively after the top level.
pub const NESTED_SOURCE_DIR: &str = "src";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildStage {
    Start,
    DirectoryPrepared,
    SourcesMerged,
    SourcesWritten,
    Compiling,
    Done,
    Failed,
}

impl fmt::Display for BuildStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            BuildStage::Start => "start",
            BuildStage::DirectoryPrepared => "directory prepared",
            BuildStage::SourcesMerged => "sources merged",
            BuildStage::SourcesWritten => "sources written",
            BuildStage::Compiling => "compiling",
            BuildStage::Done => "done",
            BuildStage::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// One build of one sketch into one build directory.
pub struct SketchBuild<'a> {
    sketch: &'a Sketch,
    build_path: PathBuf,
    stage: BuildStage,
    line_offset: usize,
}

impl<'a> SketchBuild<'a> {
    pub fn new(sketch: &'a Sketch, build_path: impl Into<PathBuf>) -> Self {
        Self {
            sketch,
            build_path: build_path.into(),
            stage: BuildStage::Start,
            line_offset: 0,
        }
    }

    pub fn stage(&self) -> BuildStage {
        self.stage
    }

    pub fn build_path(&self) -> &Path {
        &self.build_path
    }

    /// Line offset of the merged unit; zero before [`prepare`](Self::prepare).
    pub fn line_offset(&self) -> usize {
        self.line_offset
    }

    fn advance(&mut self, stage: BuildStage) {
        debug!("{}: {} -> {}", self.sketch.name, self.stage, stage);
        self.stage = stage;
    }

    /// Create the build directory, merge the sketch and write its sources.
    pub fn prepare(&mut self, overrides: &SourceOverrides) -> Result<usize> {
        self.expect_stage(BuildStage::Start)?;

        fs::create_dir_all(&self.build_path)
            .map_err(|e| Error::io("creating", &self.build_path, e))?;
        self.advance(BuildStage::DirectoryPrepared);

        let unit = merge_sources(self.sketch, overrides)?;
        self.line_offset = unit.line_offset;
        self.advance(BuildStage::SourcesMerged);

        let merged = write_merged_unit(self.sketch, &unit, &self.build_path)?;
        let copied = copy_additional_files(self.sketch, &self.build_path, overrides)?;
        info!(
            "wrote {} and {} changed additional files",
            merged.display(),
            copied
        );
        self.advance(BuildStage::SourcesWritten);
        Ok(self.line_offset)
    }

    /// Compile the prepared build directory. Returns the object files.
    pub fn compile(&mut self, options: &CompileOptions<'_>) -> Result<Vec<PathBuf>> {
        self.expect_stage(BuildStage::SourcesWritten)?;
        self.advance(BuildStage::Compiling);

        match sketch_builder(&self.build_path, options) {
            Ok(objects) => {
                self.advance(BuildStage::Done);
                Ok(objects)
            }
            Err(e) => {
                self.advance(BuildStage::Failed);
                Err(e)
            }
        }
    }

    /// [`prepare`](Self::prepare) then [`compile`](Self::compile).
    pub fn run(
        &mut self,
        overrides: &SourceOverrides,
        options: &CompileOptions<'_>,
    ) -> Result<Vec<PathBuf>> {
        self.prepare(overrides)?;
        self.compile(options)
    }

    fn expect_stage(&self, expected: BuildStage) -> Result<()> {
        if self.stage == expected {
            Ok(())
        } else {
            Err(Error::Configuration(format!(
                "sketch build of {} is at stage '{}', expected '{}'",
                self.sketch.name, self.stage, expected
            )))
        }
    }
}

/// Materialize `sketch` in `build_path`. Returns the merged unit's line offset.
pub fn prepare_sketch_build_path(
    sketch: &Sketch,
    overrides: &SourceOverrides,
    build_path: &Path,
) -> Result<usize> {
    SketchBuild::new(sketch, build_path).prepare(overrides)
}

// --- Compile the build directory, then its nested src/ tree ---
pub fn sketch_builder(build_path: &Path, options: &CompileOptions<'_>) -> Result<Vec<PathBuf>> {
    let mut objects = compile_files(build_path, build_path, options)?;

    let nested = build_path.join(NESTED_SOURCE_DIR);
    if nested.is_dir() {
        objects.extend(compile_files_recursive(&nested, &nested, options)?);
    }
    Ok(objects)
}
