//! `inox programmers`

use super::{SketchContext, hardware_index};
use crate::config::InoxConfig;
use crate::platform::{BoardResolver, Fqbn, HardwareIndex, ResolvedBoard};
use anyhow::{Context, Result};
use clap_complete::CompletionCandidate;
use colored::*;
use std::path::{Path, PathBuf};

/// Programmer ids offered by `board`'s platform and its referenced platform.
pub fn board_programmers(board: &ResolvedBoard) -> Vec<String> {
    let mut ids: Vec<String> = board.platform.programmers.keys().cloned().collect();
    if let Some(referenced) = &board.referenced_platform {
        ids.extend(referenced.programmers.keys().cloned());
    }
    ids.sort();
    ids.dedup();
    ids
}

/// Ids available for `fqbn`, or across every installed platform.
pub fn list_programmers(index: &HardwareIndex, fqbn: Option<&str>) -> Result<Vec<String>> {
    match fqbn {
        Some(fqbn) => {
            let fqbn: Fqbn = fqbn.parse()?;
            let board = index
                .resolve(&fqbn)
                .with_context(|| format!("Failed to resolve board {fqbn}"))?;
            Ok(board_programmers(&board))
        }
        None => Ok(index.installed_programmers()?),
    }
}

/// Ids offered when completing `--programmer` from `dir`.
///
/// Inside a sketch with a selected board only that board's programmers are
/// listed. Otherwise every installed id is.
pub fn completion_programmers(dir: &Path) -> Vec<String> {
    let Ok(ctx) = SketchContext::load(Some(dir)) else {
        let index = hardware_index(&InoxConfig::default(), None);
        return index.installed_programmers().unwrap_or_default();
    };
    let index = ctx.hardware_index();
    if let Ok(fqbn) = ctx.select_fqbn(None)
        && let Ok(board) = index.resolve(&fqbn)
    {
        return board_programmers(&board);
    }
    index.installed_programmers().unwrap_or_default()
}

/// Value candidates for the `--programmer` flag.
pub fn programmer_candidates() -> Vec<CompletionCandidate> {
    let dir = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
    completion_programmers(&dir)
        .into_iter()
        .map(CompletionCandidate::new)
        .collect()
}

/// Print one id per line, the shape shell completion scripts consume.
pub fn run_programmers(fqbn: Option<&str>) -> Result<()> {
    let index = hardware_index(&InoxConfig::default(), None);
    let ids = list_programmers(&index, fqbn)?;
    if ids.is_empty() {
        eprintln!("{} No programmers installed", "!".yellow());
    }
    for id in ids {
        println!("{id}");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn write(path: &Path, content: &str) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    /// Two platforms, each with its own programmers, and a sketch using them.
    fn sketch_with_hardware(tmp: &TempDir, board: &str) -> PathBuf {
        let hardware = tmp.path().join("hardware");
        let avr = hardware.join("acme/hardware/avr/1.0.0");
        write(&avr.join("platform.txt"), "name=Acme AVR\n");
        write(&avr.join("boards.txt"), "uno.name=Acme Uno\nuno.build.core=arduino\n");
        write(&avr.join("programmers.txt"), "isp.name=AVR ISP\nice.name=AVR ICE\n");
        let samd = hardware.join("acme/hardware/samd/1.0.0");
        write(&samd.join("platform.txt"), "name=Acme SAMD\n");
        write(&samd.join("boards.txt"), "zero.name=Acme Zero\nzero.build.core=arduino\n");
        write(&samd.join("programmers.txt"), "jlink.name=J-Link\n");

        let sketch = tmp.path().join("Blink");
        write(&sketch.join("Blink.ino"), "void setup(){}\n");
        write(
            &sketch.join("inox.toml"),
            &format!(
                "[board]\n{board}\n\n[hardware]\ndirs = [{:?}]\n",
                hardware.to_string_lossy()
            ),
        );
        sketch
    }

    #[test]
    fn test_completion_uses_selected_board() {
        let tmp = TempDir::new().unwrap();
        let sketch = sketch_with_hardware(&tmp, "fqbn = \"acme:avr:uno\"");
        assert_eq!(completion_programmers(&sketch), vec!["ice", "isp"]);
    }

    #[test]
    fn test_completion_without_board_lists_installed() {
        let tmp = TempDir::new().unwrap();
        let sketch = sketch_with_hardware(&tmp, "");
        let ids = completion_programmers(&sketch);
        for id in ["ice", "isp", "jlink"] {
            assert!(ids.iter().any(|i| i == id), "missing {id}");
        }
    }
}
