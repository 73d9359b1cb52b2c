//! Merging of a sketch's `.ino` files into one translation unit.

use crate::error::{Error, Result};
use crate::sketch::Sketch;
use regex::Regex;
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::sync::LazyLock;

/// Header every sketch implicitly includes.
pub const UMBRELLA_HEADER: &str = "Arduino.h";

static INCLUDES_UMBRELLA: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?m)^\s*#\s*include\s*[<"]Arduino\.h[>"]"#).expect("include pattern is valid")
});

/// Sketch sources overridden in memory, keyed by sketch-relative path.
pub type SourceOverrides = HashMap<String, String>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergedUnit {
    pub source: String,
    /// Lines inserted before the first line of the main file.
    pub line_offset: usize,
}

/// Whether `source` already includes the umbrella header.
pub fn includes_umbrella_header(source: &str) -> bool {
    INCLUDES_UMBRELLA.is_match(source)
}

/// Quote `s` as a C string literal.
pub fn quote_cpp_string(s: &str) -> String {
    format!("\"{}\"", s.replace('\\', "\\\\").replace('"', "\\\""))
}

/// `#line 1 "<file>"` followed by a newline.
pub fn line_marker(file: &Path) -> String {
    format!("#line 1 {}\n", quote_cpp_string(&file.to_string_lossy()))
}

/// Key under which an override for `file` is looked up.
pub fn override_key(sketch: &Sketch, file: &Path) -> Result<String> {
    Ok(sketch.relative_path(file)?.to_string_lossy().into_owned())
}

pub(crate) fn read_source(
    sketch: &Sketch,
    file: &Path,
    overrides: &SourceOverrides,
) -> Result<String> {
    if let Some(source) = overrides.get(&override_key(sketch, file)?) {
        return Ok(source.clone());
    }
    fs::read_to_string(file).map_err(|e| Error::io("reading", file, e))
}

/// Concatenate the main file and the other sketch files.
///
/// The umbrella include is prepended when the main file lacks it. The
/// returned offset counts only lines inserted before the main file's
/// first line.
pub fn merge_sources(sketch: &Sketch, overrides: &SourceOverrides) -> Result<MergedUnit> {
    let mut line_offset = 0;
    let mut merged = String::new();

    let main_source = read_source(sketch, &sketch.main_file, overrides)?;
    if !includes_umbrella_header(&main_source) {
        merged.push_str(&format!("#include <{UMBRELLA_HEADER}>\n"));
        line_offset += 1;
    }

    merged.push_str(&line_marker(&sketch.main_file));
    merged.push_str(&main_source);
    merged.push('\n');
    line_offset += 1;

    for file in &sketch.other_sketch_files {
        let source = read_source(sketch, file, overrides)?;
        merged.push_str(&line_marker(file));
        merged.push_str(&source);
        merged.push('\n');
    }

    Ok(MergedUnit {
        source: merged,
        line_offset,
    })
}
