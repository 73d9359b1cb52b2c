//! Sketch discovery.
//!
//! A sketch is a directory `Foo/` whose main file is `Foo/Foo.ino`. Other
//! top-level `.ino`/`.pde` files are merged after the main file. Every other
//! regular file in the tree, hidden entries and project files aside, is an
//! additional file that gets copied into the build directory.

use crate::error::{Error, Result};
use serde::Deserialize;
use sha2::{Digest, Sha256};
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

pub const MAIN_EXTENSIONS: [&str; 2] = ["ino", "pde"];

/// Files at the sketch root that describe the project and are never copied.
pub const PROJECT_FILES: [&str; 2] = ["sketch.json", "inox.toml"];

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SketchMetadata {
    pub cpu: Option<BoardMetadata>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct BoardMetadata {
    #[serde(default)]
    pub fqbn: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub port: String,
}

#[derive(Debug, Clone)]
pub struct Sketch {
    pub name: String,
    /// Sketch root directory.
    pub full_path: PathBuf,
    pub main_file: PathBuf,
    /// Secondary `.ino`/`.pde` files, in merge order.
    pub other_sketch_files: Vec<PathBuf>,
    pub additional_files: Vec<PathBuf>,
    pub metadata: Option<SketchMetadata>,
}

impl Sketch {
    /// Load the sketch at `path` (the sketch directory or its main file).
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let path = std::path::absolute(path).map_err(|e| Error::io("resolving", path, e))?;
        let full_path = if path.is_file() {
            path.parent().map(Path::to_path_buf).unwrap_or_default()
        } else {
            path.to_path_buf()
        };
        if !full_path.is_dir() {
            return Err(Error::Resolution(format!(
                "sketch directory {} does not exist",
                full_path.display()
            )));
        }

        let name = full_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        let main_file = MAIN_EXTENSIONS
            .iter()
            .map(|ext| full_path.join(format!("{name}.{ext}")))
            .find(|candidate| candidate.is_file())
            .ok_or_else(|| {
                Error::Resolution(format!(
                    "no main sketch file {name}.ino found in {}",
                    full_path.display()
                ))
            })?;

        let mut other_sketch_files = Vec::new();
        let mut additional_files = Vec::new();
        let walker = WalkDir::new(&full_path)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|e| e.depth() == 0 || !e.file_name().to_string_lossy().starts_with('.'));
        for entry in walker {
            let entry = entry.map_err(|e| {
                let path = e.path().map(Path::to_path_buf).unwrap_or_else(|| full_path.clone());
                Error::io("scanning", path, std::io::Error::other(e.to_string()))
            })?;
            if !entry.file_type().is_file() || entry.path() == main_file {
                continue;
            }
            let is_sketch_file = entry
                .path()
                .extension()
                .is_some_and(|ext| MAIN_EXTENSIONS.iter().any(|m| ext == *m));
            if is_sketch_file {
                // Nested .ino/.pde files are neither merged nor copied
                if entry.depth() == 1 {
                    other_sketch_files.push(entry.into_path());
                }
                continue;
            }
            let is_project_file =
                entry.depth() == 1 && PROJECT_FILES.iter().any(|f| entry.file_name() == *f);
            if !is_project_file {
                additional_files.push(entry.into_path());
            }
        }

        let metadata_path = full_path.join("sketch.json");
        let metadata = if metadata_path.is_file() {
            let text = fs::read_to_string(&metadata_path)
                .map_err(|e| Error::io("reading", &metadata_path, e))?;
            Some(serde_json::from_str(&text)?)
        } else {
            None
        };

        Ok(Self {
            name,
            full_path,
            main_file,
            other_sketch_files,
            additional_files,
            metadata,
        })
    }

    /// Board recorded in `sketch.json`, if any.
    pub fn default_fqbn(&self) -> Option<&str> {
        self.metadata
            .as_ref()
            .and_then(|m| m.cpu.as_ref())
            .map(|cpu| cpu.fqbn.as_str())
            .filter(|fqbn| !fqbn.is_empty())
    }

    /// `file` relative to the sketch root.
    pub fn relative_path(&self, file: &Path) -> Result<PathBuf> {
        file.strip_prefix(&self.full_path)
            .map(Path::to_path_buf)
            .map_err(|_| Error::PathComputation {
                path: file.to_path_buf(),
                root: self.full_path.clone(),
            })
    }

    /// Forget additional files below `dir`, such as a build directory kept
    /// inside the sketch.
    pub fn exclude_dir(&mut self, dir: &Path) {
        self.additional_files.retain(|f| !f.starts_with(dir));
    }

    /// Stable per-sketch build directory under the system temp dir.
    pub fn default_build_path(&self) -> PathBuf {
        let mut hasher = Sha256::new();
        hasher.update(self.full_path.to_string_lossy().as_bytes());
        let digest = format!("{:X}", hasher.finalize());
        std::env::temp_dir().join(format!("inox-sketch-{}", &digest[..32]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn sketch_dir() -> TempDir {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path().join("Blink");
        fs::create_dir_all(root.join("src/util")).unwrap();
        fs::create_dir_all(root.join(".git")).unwrap();
        fs::write(root.join("Blink.ino"), "void setup(){}\n").unwrap();
        fs::write(root.join("b_tab.ino"), "void b(){}\n").unwrap();
        fs::write(root.join("a_tab.ino"), "void a(){}\n").unwrap();
        fs::write(root.join("helper.h"), "#pragma once\n").unwrap();
        fs::write(root.join("src/util/led.cpp"), "int led;\n").unwrap();
        fs::write(root.join("src/util/nested.ino"), "// not merged\n").unwrap();
        fs::write(root.join(".git/config.h"), "hidden\n").unwrap();
        fs::write(root.join("README.md"), "docs\n").unwrap();
        fs::write(root.join("inox.toml"), "[board]\n").unwrap();
        fs::write(root.join("sketch.json"), r#"{"cpu":{"fqbn":"acme:avr:uno","port":"COM3"}}"#)
            .unwrap();
        tmp
    }

    #[test]
    fn test_load_classifies_files() {
        let tmp = sketch_dir();
        let sketch = Sketch::load(tmp.path().join("Blink")).unwrap();
        assert_eq!(sketch.name, "Blink");
        assert!(sketch.main_file.ends_with("Blink.ino"));

        let others: Vec<_> = sketch
            .other_sketch_files
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(others, vec!["a_tab.ino", "b_tab.ino"]);

        let additional: Vec<PathBuf> = sketch
            .additional_files
            .iter()
            .map(|p| sketch.relative_path(p).unwrap())
            .collect();
        assert_eq!(
            additional,
            vec![
                PathBuf::from("README.md"),
                PathBuf::from("helper.h"),
                Path::new("src").join("util").join("led.cpp"),
            ]
        );
        assert_eq!(sketch.default_fqbn(), Some("acme:avr:uno"));
    }

    #[test]
    fn test_load_from_main_file_path() {
        let tmp = sketch_dir();
        let sketch = Sketch::load(tmp.path().join("Blink").join("Blink.ino")).unwrap();
        assert_eq!(sketch.full_path, tmp.path().join("Blink"));
    }

    #[test]
    fn test_missing_main_file() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path().join("Empty");
        fs::create_dir_all(&root).unwrap();
        let err = Sketch::load(&root).unwrap_err();
        assert!(err.to_string().contains("Empty.ino"));
    }

    #[test]
    fn test_relative_path_outside_sketch() {
        let tmp = sketch_dir();
        let sketch = Sketch::load(tmp.path().join("Blink")).unwrap();
        let err = sketch.relative_path(Path::new("/elsewhere/x.h")).unwrap_err();
        assert!(matches!(err, Error::PathComputation { .. }));
    }

    #[test]
    fn test_exclude_build_dir_inside_sketch() {
        let tmp = sketch_dir();
        let root = tmp.path().join("Blink");
        fs::create_dir_all(root.join("build")).unwrap();
        fs::write(root.join("build").join("Blink.ino.cpp"), "// generated\n").unwrap();

        let mut sketch = Sketch::load(&root).unwrap();
        assert!(sketch.additional_files.contains(&root.join("build").join("Blink.ino.cpp")));
        sketch.exclude_dir(&root.join("build"));
        assert!(sketch.additional_files.iter().all(|f| !f.starts_with(root.join("build"))));
        assert!(sketch.additional_files.contains(&root.join("helper.h")));
    }

    #[test]
    fn test_default_build_path_is_stable() {
        let tmp = sketch_dir();
        let a = Sketch::load(tmp.path().join("Blink")).unwrap();
        let b = Sketch::load(tmp.path().join("Blink")).unwrap();
        assert_eq!(a.default_build_path(), b.default_build_path());
        let name = a.default_build_path().file_name().unwrap().to_string_lossy().into_owned();
        assert_eq!(name.len(), "inox-sketch-".len() + 32);
    }
}
