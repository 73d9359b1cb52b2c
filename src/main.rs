//! # inox CLI Entry Point
//!
//! This is the main executable for the `inox` command-line tool.
//! It parses CLI arguments using clap and routes commands to the handlers in
//! [`inox::commands`].
//!
//! ## Command Structure
//!
//! - **Build**: `compile`
//! - **Debug**: `debug-config`, `programmers`
//! - **Shell**: `completion`, plus `COMPLETE=<shell> inox` for completions
//!   that list installed programmer ids

use anyhow::Result;
use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::{ArgValueCandidates, CompleteEnv, Shell, generate};
use colored::*;
use std::path::PathBuf;

use inox::commands::compile::{CompileArgs, run_compile};
use inox::commands::debug::{DebugArgs, run_debug_config};
use inox::commands::programmers::{programmer_candidates, run_programmers};

#[derive(Parser)]
#[command(name = "inox")]
#[command(about = "Build and debug sketches for embedded boards", version = env!("CARGO_PKG_VERSION"))]
#[command(long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Show resolution and build decisions (same as RUST_LOG=debug)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compile a sketch
    Compile {
        /// Sketch directory or main file [default: current directory]
        sketch: Option<PathBuf>,
        /// Fully qualified board name, e.g. arduino:avr:uno
        #[arg(short = 'b', long)]
        fqbn: Option<String>,
        /// Directory for merged sources and objects
        #[arg(long)]
        build_path: Option<PathBuf>,
        /// Parallel compile jobs (0 = one per CPU)
        #[arg(short, long, allow_negative_numbers = true)]
        jobs: Option<i32>,
        /// Extra include directory (repeatable)
        #[arg(short = 'I', long = "include")]
        include: Vec<PathBuf>,
        /// Only write compile_commands.json, do not compile
        #[arg(long)]
        only_compilation_database: bool,
        /// Also write compile_commands.json into the build path
        #[arg(long)]
        compile_commands: bool,
    },
    /// Print the debugger configuration of a sketch
    DebugConfig {
        /// Sketch directory or main file [default: current directory]
        sketch: Option<PathBuf>,
        /// Fully qualified board name
        #[arg(short = 'b', long)]
        fqbn: Option<String>,
        /// Programmer id (see `inox programmers`)
        #[arg(short = 'P', long, add = ArgValueCandidates::new(programmer_candidates))]
        programmer: Option<String>,
        /// Debug port address
        #[arg(short, long)]
        port: Option<String>,
        /// Directory holding the compiled sketch
        #[arg(long)]
        input_dir: Option<PathBuf>,
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },
    /// List installed programmer ids
    Programmers {
        /// Only programmers usable with this board
        #[arg(short = 'b', long)]
        fqbn: Option<String>,
    },
    /// Generate shell completions
    Completion {
        #[arg(value_enum)]
        shell: Shell,
    },
}

fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .format_timestamp(None)
        .init();
}

fn main() {
    CompleteEnv::with_factory(Cli::command).complete();

    let cli = Cli::parse();
    init_logging(cli.verbose);

    if let Err(e) = run(cli) {
        eprintln!("{} {:#}", "x".red(), e);
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Compile {
            sketch,
            fqbn,
            build_path,
            jobs,
            include,
            only_compilation_database,
            compile_commands,
        } => run_compile(&CompileArgs {
            sketch,
            fqbn,
            build_path,
            jobs,
            include,
            only_compilation_database,
            compile_commands,
        }),
        Commands::DebugConfig {
            sketch,
            fqbn,
            programmer,
            port,
            input_dir,
            json,
        } => run_debug_config(&DebugArgs {
            sketch,
            fqbn,
            programmer,
            port,
            input_dir,
            json,
        }),
        Commands::Programmers { fqbn } => run_programmers(fqbn.as_deref()),
        Commands::Completion { shell } => {
            let mut cmd = Cli::command();
            let bin_name = cmd.get_name().to_string();
            generate(shell, &mut cmd, bin_name, &mut std::io::stdout());
            Ok(())
        }
    }
}
