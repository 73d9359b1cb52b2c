mod compdb;
mod compile;
mod core;
mod merge;
mod prepare;
mod progress;

pub use compdb::{CompilationDatabase, CompilationEntry};
pub use compile::{
    CommandCompiler, CompileJob, CompileOptions, Compiler, RECIPES, compile_files,
    compile_files_recursive, compile_job, include_flags, normalize_jobs, object_is_up_to_date,
    split_command_line,
};
pub use core::{
    BuildStage, NESTED_SOURCE_DIR, SketchBuild, prepare_sketch_build_path, sketch_builder,
};
pub use merge::{
    MergedUnit, SourceOverrides, UMBRELLA_HEADER, includes_umbrella_header, line_marker,
    merge_sources, override_key, quote_cpp_string,
};
pub use prepare::{copy_additional_files, merged_unit_path, write_if_different, write_merged_unit};
pub use progress::{BarProgress, NoProgress, ProgressEvent, ProgressKind, ProgressSink};
