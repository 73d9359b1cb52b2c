//! CLI command handlers
//!
//! Each handler loads the sketch and its `inox.toml`, resolves the board, and
//! drives the library. Errors are reported through `anyhow` with context.

pub mod compile;
pub mod debug;
pub mod programmers;

use crate::config::{InoxConfig, load_config};
use crate::platform::{Fqbn, HardwareIndex};
use crate::sketch::Sketch;
use anyhow::{Context, Result, bail};
use log::debug;
use std::path::{Path, PathBuf};

/// A loaded sketch with its project configuration.
pub struct SketchContext {
    pub sketch: Sketch,
    pub config: InoxConfig,
}

impl SketchContext {
    /// Load the sketch at `path`, or in the current directory.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = match path {
            Some(p) => p.to_path_buf(),
            None => std::env::current_dir().context("Failed to read current directory")?,
        };
        let sketch = Sketch::load(&path)
            .with_context(|| format!("Failed to load sketch at {}", path.display()))?;
        let config = load_config(&sketch.full_path).context("Failed to read inox.toml")?;
        Ok(Self { sketch, config })
    }

    /// Board from the command line, then `inox.toml`, then `sketch.json`.
    pub fn select_fqbn(&self, cli: Option<&str>) -> Result<Fqbn> {
        let chosen = cli
            .map(str::to_string)
            .or_else(|| self.config.board.fqbn.clone())
            .or_else(|| self.sketch.default_fqbn().map(str::to_string));
        let Some(fqbn) = chosen else {
            bail!(
                "No board selected for sketch '{}'.\n\n\
                Tip: pass --fqbn, or set [board] fqbn in inox.toml.",
                self.sketch.name
            );
        };
        debug!("selected board {fqbn}");
        Ok(fqbn.parse::<Fqbn>()?)
    }

    /// `p` resolved against the sketch directory when relative.
    pub fn sketch_relative(&self, p: &Path) -> PathBuf {
        if p.is_absolute() {
            p.to_path_buf()
        } else {
            self.sketch.full_path.join(p)
        }
    }

    /// Configured hardware roots followed by the default one.
    pub fn hardware_index(&self) -> HardwareIndex {
        hardware_index(&self.config, Some(&self.sketch.full_path))
    }
}

/// Hardware roots from `config` (relative entries taken against `base`),
/// followed by `~/.inox/packages`.
pub fn hardware_index(config: &InoxConfig, base: Option<&Path>) -> HardwareIndex {
    let mut roots: Vec<PathBuf> = config
        .hardware
        .dirs
        .iter()
        .map(|d| match base {
            Some(base) if d.is_relative() => base.join(d),
            _ => d.clone(),
        })
        .collect();
    let default_root = HardwareIndex::default_root();
    if !roots.contains(&default_root) {
        roots.push(default_root);
    }
    HardwareIndex::new(roots)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn context(tmp: &TempDir, toml: Option<&str>, sketch_json: Option<&str>) -> SketchContext {
        let root = tmp.path().join("Blink");
        fs::create_dir_all(&root).unwrap();
        fs::write(root.join("Blink.ino"), "void setup(){}").unwrap();
        if let Some(toml) = toml {
            fs::write(root.join("inox.toml"), toml).unwrap();
        }
        if let Some(json) = sketch_json {
            fs::write(root.join("sketch.json"), json).unwrap();
        }
        SketchContext::load(Some(&root)).unwrap()
    }

    #[test]
    fn test_fqbn_precedence() {
        let tmp = TempDir::new().unwrap();
        let ctx = context(
            &tmp,
            Some("[board]\nfqbn = \"acme:avr:uno\"\n"),
            Some(r#"{"cpu": {"fqbn": "acme:avr:nano"}}"#),
        );
        assert_eq!(
            ctx.select_fqbn(Some("acme:samd:zero")).unwrap().to_string(),
            "acme:samd:zero"
        );
        assert_eq!(ctx.select_fqbn(None).unwrap().to_string(), "acme:avr:uno");
    }

    #[test]
    fn test_fqbn_from_sketch_metadata() {
        let tmp = TempDir::new().unwrap();
        let ctx = context(&tmp, None, Some(r#"{"cpu": {"fqbn": "acme:avr:nano"}}"#));
        assert_eq!(ctx.select_fqbn(None).unwrap().to_string(), "acme:avr:nano");
    }

    #[test]
    fn test_no_board_is_an_error() {
        let tmp = TempDir::new().unwrap();
        let ctx = context(&tmp, None, None);
        assert!(ctx.select_fqbn(None).is_err());
    }

    #[test]
    fn test_hardware_roots_relative_to_sketch() {
        let tmp = TempDir::new().unwrap();
        let ctx = context(&tmp, Some("[hardware]\ndirs = [\"hw\", \"/opt/hw\"]\n"), None);
        let index = ctx.hardware_index();
        assert_eq!(index.roots()[0], ctx.sketch.full_path.join("hw"));
        assert_eq!(index.roots()[1], PathBuf::from("/opt/hw"));
        assert_eq!(index.roots().last(), Some(&HardwareIndex::default_root()));
    }
}
