//! `inox compile`

use super::SketchContext;
use crate::build::{
    BarProgress, CommandCompiler, CompilationDatabase, CompileOptions, SketchBuild,
    SourceOverrides,
};
use crate::platform::BoardResolver;
use crate::resolver::{BuildRequest, ConfigurationResolver};
use anyhow::{Context, Result};
use colored::*;
use std::path::PathBuf;
use std::time::Instant;

pub const COMPILATION_DATABASE_FILE: &str = "compile_commands.json";

#[derive(Debug, Clone, Default)]
pub struct CompileArgs {
    pub sketch: Option<PathBuf>,
    pub fqbn: Option<String>,
    pub build_path: Option<PathBuf>,
    pub jobs: Option<i32>,
    pub include: Vec<PathBuf>,
    pub only_compilation_database: bool,
    pub compile_commands: bool,
}

pub fn run_compile(args: &CompileArgs) -> Result<()> {
    let start_time = Instant::now();
    let mut ctx = SketchContext::load(args.sketch.as_deref())?;
    let fqbn = ctx.select_fqbn(args.fqbn.as_deref())?;

    let index = ctx.hardware_index();
    let board = index
        .resolve(&fqbn)
        .with_context(|| format!("Failed to resolve board {fqbn}"))?;
    let resolver = ConfigurationResolver::with_resolver(&index, &board)?;

    let build_path = args
        .build_path
        .clone()
        .or_else(|| ctx.config.build.build_path.as_deref().map(|p| ctx.sketch_relative(p)))
        .unwrap_or_else(|| ctx.sketch.default_build_path());
    let build_path = std::path::absolute(&build_path)
        .with_context(|| format!("Invalid build path {}", build_path.display()))?;
    ctx.sketch.exclude_dir(&build_path);

    let configuration = resolver.build_properties(&BuildRequest {
        build_path: build_path.clone(),
        sketch_name: ctx.sketch.name.clone(),
        programmer: ctx.config.board.programmer.clone(),
    })?;

    let mut include_folders = Vec::new();
    for key in ["build.core.path", "build.variant.path"] {
        let folder = configuration.get_expanded(key)?;
        if !folder.is_empty() {
            include_folders.push(PathBuf::from(folder));
        }
    }
    include_folders.extend(ctx.config.build.include_dirs.iter().map(|d| ctx.sketch_relative(d)));
    include_folders.extend(args.include.iter().cloned());

    let wants_database = args.compile_commands
        || args.only_compilation_database
        || ctx.config.build.compile_commands;
    let database = wants_database
        .then(|| CompilationDatabase::new(build_path.join(COMPILATION_DATABASE_FILE)));

    println!(
        "{} Compiling sketch {} for {}",
        "→".dimmed(),
        ctx.sketch.name.bold(),
        fqbn.to_string().cyan()
    );

    let progress = BarProgress::new();
    let options = CompileOptions {
        build_properties: configuration.properties(),
        include_folders: &include_folders,
        only_update_compilation_database: args.only_compilation_database,
        compilation_database: database.as_ref(),
        jobs: args.jobs.or(ctx.config.build.jobs).unwrap_or(0),
        compiler: &CommandCompiler,
        progress: &progress,
    };

    let mut build = SketchBuild::new(&ctx.sketch, &build_path);
    let result = build.run(&SourceOverrides::new(), &options);
    progress.finish();

    if let Some(db) = &database {
        db.save()
            .with_context(|| format!("Failed to write {}", db.file().display()))?;
        println!(
            "{} Wrote {} ({} entries)",
            "✓".green(),
            db.file().display(),
            db.len()
        );
    }

    match result {
        Ok(objects) => {
            let verb = if args.only_compilation_database {
                "Recorded"
            } else {
                "Compiled"
            };
            println!(
                "{} {} {} objects in {:.2}s",
                "✓".green(),
                verb,
                objects.len(),
                start_time.elapsed().as_secs_f64()
            );
            println!("   {} {}", "Build path:".dimmed(), build_path.display());
            Ok(())
        }
        Err(e) => {
            println!("{} Build failed at stage '{}'", "x".red(), build.stage());
            Err(e.into())
        }
    }
}
