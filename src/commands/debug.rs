//! `inox debug-config`

use super::SketchContext;
use super::programmers::board_programmers;
use crate::error::Error;
use crate::platform::BoardResolver;
use crate::resolver::{ConfigurationResolver, DebugConfig, DebugRequest};
use anyhow::{Context, Result, bail};
use colored::*;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Default)]
pub struct DebugArgs {
    pub sketch: Option<PathBuf>,
    pub fqbn: Option<String>,
    pub programmer: Option<String>,
    pub port: Option<String>,
    /// Directory holding an already compiled sketch.
    pub input_dir: Option<PathBuf>,
    pub json: bool,
}

pub fn run_debug_config(args: &DebugArgs) -> Result<()> {
    let ctx = SketchContext::load(args.sketch.as_deref())?;
    let fqbn = ctx.select_fqbn(args.fqbn.as_deref())?;

    let build_path = args
        .input_dir
        .clone()
        .or_else(|| ctx.config.build.build_path.as_deref().map(|p| ctx.sketch_relative(p)))
        .unwrap_or_else(|| ctx.sketch.default_build_path());
    check_compiled_sketch_dir(&build_path)?;

    let index = ctx.hardware_index();
    let board = index
        .resolve(&fqbn)
        .with_context(|| format!("Failed to resolve board {fqbn}"))?;
    let resolver = ConfigurationResolver::with_resolver(&index, &board)?;

    let programmer = args
        .programmer
        .clone()
        .or_else(|| ctx.config.board.programmer.clone());
    let request = DebugRequest {
        build_path,
        sketch_name: ctx.sketch.name.clone(),
        programmer,
        port: args.port.clone().or_else(|| ctx.config.board.port.clone()),
    };

    let config = match resolver.debug_config(&request) {
        Ok(config) => config,
        Err(Error::ProgrammerNotFound(id)) => {
            let available = board_programmers(&board);
            bail!(
                "programmer '{id}' not found\n\nAvailable programmers for {fqbn}: {}",
                if available.is_empty() {
                    "(none)".to_string()
                } else {
                    available.join(", ")
                }
            );
        }
        Err(e) => return Err(e.into()),
    };

    if args.json {
        println!("{}", serde_json::to_string_pretty(&config)?);
    } else {
        print_debug_config(&config);
    }
    Ok(())
}

/// The directory a debug session reads the compiled sketch from must exist.
pub fn check_compiled_sketch_dir(path: &Path) -> Result<()> {
    if !path.exists() {
        bail!("compiled sketch not found in {}", path.display());
    }
    if !path.is_dir() {
        bail!(
            "expected compiled sketch in directory {}, but is a file instead",
            path.display()
        );
    }
    Ok(())
}

fn print_debug_config(config: &DebugConfig) {
    let row = |label: &str, value: &str| {
        if !value.is_empty() {
            println!("{:<18} {}", label.dimmed(), value);
        }
    };
    row("Executable", &config.executable);
    row("Toolchain", &config.toolchain);
    row("Toolchain path", &config.toolchain_path);
    row("Toolchain prefix", &config.toolchain_prefix);
    for (key, value) in &config.toolchain_configuration {
        row(&format!("  {key}"), value);
    }
    row("Server", &config.server);
    row("Server path", &config.server_path);
    for (key, value) in &config.server_configuration {
        row(&format!("  {key}"), value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_missing_build_dir_is_rejected() {
        let tmp = TempDir::new().unwrap();
        let err = check_compiled_sketch_dir(&tmp.path().join("build")).unwrap_err();
        assert!(err.to_string().starts_with("compiled sketch not found in"));
    }

    #[test]
    fn test_build_path_that_is_a_file_is_rejected() {
        let tmp = TempDir::new().unwrap();
        let file = tmp.path().join("build");
        std::fs::write(&file, "").unwrap();
        let err = check_compiled_sketch_dir(&file).unwrap_err();
        assert!(err.to_string().contains("but is a file instead"));
    }

    #[test]
    fn test_existing_build_dir_is_accepted() {
        let tmp = TempDir::new().unwrap();
        assert!(check_compiled_sketch_dir(tmp.path()).is_ok());
    }
}
