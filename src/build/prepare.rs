//! Materialization of sketch sources in the build directory.
//!
//! The merged unit is rewritten every build. Additional files go through
//! [`write_if_different`] so their modification time only moves when their
//! content does, which keeps the object up-to-date check meaningful.

use super::merge::{MergedUnit, SourceOverrides, line_marker, read_source};
use crate::error::{Error, Result};
use crate::sketch::Sketch;
use log::debug;
use std::fs;
use std::path::{Path, PathBuf};

/// `<build_path>/<main file name>.cpp`
pub fn merged_unit_path(sketch: &Sketch, build_path: &Path) -> PathBuf {
    let base = sketch
        .main_file
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| format!("{}.ino", sketch.name));
    build_path.join(format!("{base}.cpp"))
}

/// Write the merged unit to [`merged_unit_path`]. Always rewritten.
pub fn write_merged_unit(sketch: &Sketch, unit: &MergedUnit, build_path: &Path) -> Result<PathBuf> {
    let dest = merged_unit_path(sketch, build_path);
    fs::write(&dest, &unit.source).map_err(|e| Error::io("writing", &dest, e))?;
    Ok(dest)
}

/// Copy each additional file to the same relative path under `build_path`,
/// tagged with a `#line` marker. Returns how many files were written.
pub fn copy_additional_files(
    sketch: &Sketch,
    build_path: &Path,
    overrides: &SourceOverrides,
) -> Result<usize> {
    let mut written = 0;
    for file in &sketch.additional_files {
        let relative = sketch.relative_path(file)?;
        let target = build_path.join(&relative);
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent).map_err(|e| Error::io("creating", parent, e))?;
        }

        let source = read_source(sketch, file, overrides)?;
        let mut content = line_marker(file).into_bytes();
        content.extend_from_slice(source.as_bytes());

        if write_if_different(&content, &target)? {
            written += 1;
        } else {
            debug!("{} unchanged", target.display());
        }
    }
    Ok(written)
}

/// Write `content` to `dest` unless `dest` already holds exactly that.
/// Returns `true` when the file was written.
pub fn write_if_different(content: &[u8], dest: &Path) -> Result<bool> {
    if dest.exists() {
        let existing = fs::read(dest).map_err(|e| Error::io("reading", dest, e))?;
        if existing == content {
            return Ok(false);
        }
    }
    fs::write(dest, content).map_err(|e| Error::io("writing", dest, e))?;
    Ok(true)
}
