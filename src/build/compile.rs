//! Parallel, incremental compilation of a directory of sources.
//!
//! Each source `<dir>/<rel>` becomes `<build>/<rel>.o`. The command line comes
//! from the `recipe.<ext>.o.pattern` build property, expanded with
//! `source_file`, `object_file` and `includes` bound for that file.
//!
//! Workers run on a rayon pool of `jobs` threads. After the first failure no
//! new file is started; files already running finish, then the first error
//! (in discovery order) is returned.

use super::compdb::CompilationDatabase;
use super::progress::{ProgressEvent, ProgressKind, ProgressSink};
use crate::error::{Error, Result};
use crate::properties::PropertyStore;
use log::debug;
use rayon::prelude::*;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::SystemTime;
use walkdir::WalkDir;

/// Source extension -> recipe property.
pub const RECIPES: [(&str, &str); 3] = [
    ("c", "recipe.c.o.pattern"),
    ("cpp", "recipe.cpp.o.pattern"),
    ("S", "recipe.S.o.pattern"),
];

/// One fully expanded compiler invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompileJob {
    pub source: PathBuf,
    pub object: PathBuf,
    pub arguments: Vec<String>,
    /// Working directory of the invocation.
    pub directory: PathBuf,
}

/// Runs a single [`CompileJob`].
pub trait Compiler: Send + Sync {
    /// `Ok` carries diagnostics printed by a successful compile (possibly
    /// empty); `Err` carries the failure output.
    fn compile(&self, job: &CompileJob) -> std::result::Result<String, String>;
}

/// Spawns `arguments[0]` as a subprocess.
pub struct CommandCompiler;

impl Compiler for CommandCompiler {
    fn compile(&self, job: &CompileJob) -> std::result::Result<String, String> {
        let Some((program, args)) = job.arguments.split_first() else {
            return Err("empty compiler command line".to_string());
        };
        let output = Command::new(program)
            .args(args)
            .current_dir(&job.directory)
            .output()
            .map_err(|e| format!("failed to execute {program}: {e}"))?;
        let stderr = String::from_utf8_lossy(&output.stderr).into_owned();
        if output.status.success() {
            Ok(stderr)
        } else {
            Err(stderr)
        }
    }
}

/// Everything a compile pass needs besides the file set.
pub struct CompileOptions<'a> {
    pub build_properties: &'a PropertyStore,
    pub include_folders: &'a [PathBuf],
    /// Record into the compilation database without compiling.
    pub only_update_compilation_database: bool,
    pub compilation_database: Option<&'a CompilationDatabase>,
    /// Worker count; zero or negative means one per available CPU.
    pub jobs: i32,
    pub compiler: &'a dyn Compiler,
    pub progress: &'a dyn ProgressSink,
}

/// Map a caller-supplied job count onto a worker count.
pub fn normalize_jobs(jobs: i32) -> usize {
    if jobs > 0 {
        jobs as usize
    } else {
        std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1)
    }
}

/// `-I"<folder>"` for each include folder.
pub fn include_flags(folders: &[PathBuf]) -> Vec<String> {
    folders
        .iter()
        .map(|f| format!("-I\"{}\"", f.display()))
        .collect()
}

/// Split a command line on whitespace, keeping quoted runs together.
pub fn split_command_line(line: &str) -> Result<Vec<String>> {
    let mut args = Vec::new();
    let mut current = String::new();
    let mut in_arg = false;
    let mut quote: Option<char> = None;

    for c in line.chars() {
        match quote {
            Some(q) if c == q => quote = None,
            Some(_) => current.push(c),
            None if c == '"' || c == '\'' => {
                quote = Some(c);
                in_arg = true;
            }
            None if c.is_whitespace() => {
                if in_arg {
                    args.push(std::mem::take(&mut current));
                    in_arg = false;
                }
            }
            None => {
                current.push(c);
                in_arg = true;
            }
        }
    }
    if quote.is_some() {
        return Err(Error::Configuration(format!(
            "unterminated quote in command line: {line}"
        )));
    }
    if in_arg {
        args.push(current);
    }
    Ok(args)
}

/// Compile the sources directly inside `source_dir`.
pub fn compile_files(
    source_dir: &Path,
    build_path: &Path,
    options: &CompileOptions<'_>,
) -> Result<Vec<PathBuf>> {
    let sources = find_sources(source_dir, false)?;
    compile_sources(&sources, source_dir, build_path, options)
}

/// Compile every source below `source_dir`.
pub fn compile_files_recursive(
    source_dir: &Path,
    build_path: &Path,
    options: &CompileOptions<'_>,
) -> Result<Vec<PathBuf>> {
    let sources = find_sources(source_dir, true)?;
    compile_sources(&sources, source_dir, build_path, options)
}

fn find_sources(dir: &Path, recursive: bool) -> Result<Vec<PathBuf>> {
    let max_depth = if recursive { usize::MAX } else { 1 };
    let mut sources = Vec::new();
    for entry in WalkDir::new(dir).max_depth(max_depth).sort_by_file_name() {
        let entry = entry.map_err(|e| {
            let path = e.path().map(Path::to_path_buf).unwrap_or_else(|| dir.to_path_buf());
            Error::io("scanning", path, std::io::Error::other(e.to_string()))
        })?;
        if entry.file_type().is_file() && recipe_key(entry.path()).is_some() {
            sources.push(entry.into_path());
        }
    }
    Ok(sources)
}

fn recipe_key(source: &Path) -> Option<&'static str> {
    let ext = source.extension()?.to_str()?;
    RECIPES
        .iter()
        .find(|(e, _)| *e == ext)
        .map(|(_, recipe)| *recipe)
}

fn object_path(source: &Path, source_dir: &Path, build_path: &Path) -> Result<PathBuf> {
    let relative = source
        .strip_prefix(source_dir)
        .map_err(|_| Error::PathComputation {
            path: source.to_path_buf(),
            root: source_dir.to_path_buf(),
        })?;
    let mut object = build_path.join(relative).into_os_string();
    object.push(".o");
    Ok(PathBuf::from(object))
}

/// Build the compiler invocation for `source`.
pub fn compile_job(
    source: &Path,
    source_dir: &Path,
    build_path: &Path,
    options: &CompileOptions<'_>,
) -> Result<CompileJob> {
    let recipe_key = recipe_key(source).ok_or_else(|| Error::Compile {
        file: source.to_path_buf(),
        message: "no compile recipe for this file type".to_string(),
    })?;
    let recipe = options.build_properties.get(recipe_key);
    if recipe.is_empty() {
        return Err(Error::Configuration(format!(
            "missing '{recipe_key}' to compile {}",
            source.display()
        )));
    }

    let object = object_path(source, source_dir, build_path)?;
    let mut props = options.build_properties.clone();
    props.set_path("source_file", source);
    props.set_path("object_file", &object);
    props.set("includes", include_flags(options.include_folders).join(" "));

    let command_line = props.expand_props_in_string(recipe)?;
    Ok(CompileJob {
        source: source.to_path_buf(),
        object,
        arguments: split_command_line(&command_line)?,
        directory: build_path.to_path_buf(),
    })
}

fn compile_sources(
    sources: &[PathBuf],
    source_dir: &Path,
    build_path: &Path,
    options: &CompileOptions<'_>,
) -> Result<Vec<PathBuf>> {
    if sources.is_empty() {
        return Ok(Vec::new());
    }

    let workers = normalize_jobs(options.jobs);
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(workers)
        .build()
        .map_err(|e| Error::io("starting compile workers for", build_path, std::io::Error::other(e)))?;
    debug!(
        "compiling {} files from {} with {} workers",
        sources.len(),
        source_dir.display(),
        workers
    );

    let failed = AtomicBool::new(false);
    let completed = AtomicUsize::new(0);
    let total = sources.len();

    let results: Vec<Result<Option<PathBuf>>> = pool.install(|| {
        sources
            .par_iter()
            .map(|source| {
                if failed.load(Ordering::SeqCst) {
                    return Ok(None);
                }
                let result = compile_one(source, source_dir, build_path, options);
                match &result {
                    Ok((_, kind)) => {
                        let done = completed.fetch_add(1, Ordering::SeqCst) + 1;
                        options.progress.on_progress(&ProgressEvent {
                            file: source,
                            kind: *kind,
                            completed: done,
                            total,
                        });
                    }
                    Err(_) => failed.store(true, Ordering::SeqCst),
                }
                result.map(|(object, _)| Some(object))
            })
            .collect()
    });

    let mut objects = Vec::with_capacity(total);
    for result in results {
        if let Some(object) = result? {
            objects.push(object);
        }
    }
    Ok(objects)
}

fn compile_one(
    source: &Path,
    source_dir: &Path,
    build_path: &Path,
    options: &CompileOptions<'_>,
) -> Result<(PathBuf, ProgressKind)> {
    let job = compile_job(source, source_dir, build_path, options)?;
    if let Some(db) = options.compilation_database {
        db.add(&job);
    }
    if options.only_update_compilation_database {
        return Ok((job.object, ProgressKind::Recorded));
    }

    if let Some(parent) = job.object.parent() {
        fs::create_dir_all(parent).map_err(|e| Error::io("creating", parent, e))?;
    }
    if object_is_up_to_date(source, &job.object) {
        debug!("{} is up to date", job.object.display());
        return Ok((job.object, ProgressKind::UpToDate));
    }

    match options.compiler.compile(&job) {
        Ok(diagnostics) => {
            if !diagnostics.trim().is_empty() {
                options.progress.on_warning(source, &diagnostics);
            }
            Ok((job.object, ProgressKind::Compiled))
        }
        Err(message) => Err(Error::Compile {
            file: source.to_path_buf(),
            message,
        }),
    }
}

fn modified(path: &Path) -> Option<SystemTime> {
    fs::metadata(path).and_then(|m| m.modified()).ok()
}

/// The object exists, is newer than the source, and no dependency listed in
/// its `.d` file is missing or newer.
pub fn object_is_up_to_date(source: &Path, object: &Path) -> bool {
    let (Some(object_time), Some(source_time)) = (modified(object), modified(source)) else {
        return false;
    };
    if source_time > object_time {
        return false;
    }

    let Ok(dep_content) = fs::read_to_string(object.with_extension("d")) else {
        return false;
    };
    // Handle line continuations
    let flat = dep_content.replace("\\\r\n", " ").replace("\\\n", " ");
    let Some((_, deps)) = flat.split_once(": ") else {
        return false;
    };

    deps.split_whitespace().all(|dep| match modified(Path::new(dep)) {
        Some(dep_time) => dep_time <= object_time,
        None => false,
    })
}
