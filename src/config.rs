use crate::error::{Error, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

pub const CONFIG_FILE: &str = "inox.toml";

/// Optional per-sketch `inox.toml`.
#[derive(Deserialize, Debug, Default, Clone)]
#[serde(deny_unknown_fields)]
pub struct InoxConfig {
    #[serde(default)]
    pub board: BoardConfig,
    #[serde(default)]
    pub build: BuildConfig,
    #[serde(default)]
    pub hardware: HardwareConfig,
}

#[derive(Deserialize, Debug, Default, Clone)]
pub struct BoardConfig {
    pub fqbn: Option<String>,
    pub programmer: Option<String>,
    pub port: Option<String>,
}

#[derive(Deserialize, Debug, Default, Clone)]
pub struct BuildConfig {
    pub jobs: Option<i32>,
    pub build_path: Option<PathBuf>,
    #[serde(default)]
    pub compile_commands: bool,
    #[serde(default)]
    pub include_dirs: Vec<PathBuf>,
}

#[derive(Deserialize, Debug, Default, Clone)]
pub struct HardwareConfig {
    #[serde(default)]
    pub dirs: Vec<PathBuf>,
}

impl InoxConfig {
    pub fn parse(text: &str) -> Result<Self> {
        Ok(toml::from_str(text)?)
    }
}

/// Load `<sketch_dir>/inox.toml`, or defaults when there is none.
pub fn load_config(sketch_dir: &Path) -> Result<InoxConfig> {
    let path = sketch_dir.join(CONFIG_FILE);
    if !path.is_file() {
        return Ok(InoxConfig::default());
    }
    let text = fs::read_to_string(&path).map_err(|e| Error::io("reading", &path, e))?;
    InoxConfig::parse(&text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_missing_file_gives_defaults() {
        let tmp = TempDir::new().unwrap();
        let config = load_config(tmp.path()).unwrap();
        assert!(config.board.fqbn.is_none());
        assert!(!config.build.compile_commands);
        assert!(config.hardware.dirs.is_empty());
    }

    #[test]
    fn test_parse_all_sections() {
        let config = InoxConfig::parse(
            r#"
[board]
fqbn = "acme:avr:uno"
programmer = "isp"
port = "/dev/ttyACM0"

[build]
jobs = 4
build_path = "out"
compile_commands = true
include_dirs = ["lib/include"]

[hardware]
dirs = ["/opt/hw"]
"#,
        )
        .unwrap();
        assert_eq!(config.board.fqbn.as_deref(), Some("acme:avr:uno"));
        assert_eq!(config.board.programmer.as_deref(), Some("isp"));
        assert_eq!(config.build.jobs, Some(4));
        assert!(config.build.compile_commands);
        assert_eq!(config.build.include_dirs, vec![PathBuf::from("lib/include")]);
        assert_eq!(config.hardware.dirs, vec![PathBuf::from("/opt/hw")]);
    }

    #[test]
    fn test_syntax_error_is_toml_error() {
        let err = InoxConfig::parse("[board\nfqbn = 1").unwrap_err();
        assert!(matches!(err, Error::Toml(_)));
    }
}
