//! # inox - Sketch build core for embedded boards
//!
//! inox turns a sketch (a directory of `.ino` files plus C/C++ sources) into
//! object files for a board described by installed hardware platforms.
//!
//! ## Features
//!
//! - **Layered Configuration**: platform, board, tool and programmer
//!   properties merged in a fixed order, with `{placeholder}` expansion
//! - **Debugger Setup**: resolves the `debug.*` configuration of a board
//! - **Sketch Merging**: `.ino` files concatenated into one translation unit
//!   with `#line` markers
//! - **Incremental Builds**: write-if-different copies and `.d` file checks
//! - **Parallel Compilation**: a bounded worker pool with fail-fast errors
//!
//! ## Quick Start
//!
//! ```bash
//! # Compile the sketch in the current directory
//! inox compile --fqbn arduino:avr:uno
//!
//! # Show how to debug it
//! inox debug-config --fqbn arduino:samd:mkr1000 --programmer atmel_ice
//! ```
//!
//! ## Module Organization
//!
//! - [`properties`] - The key/value store every layer is expressed in
//! - [`platform`] - Boards, platforms, tools and programmers on disk
//! - [`resolver`] - Layer merging and build/debug configuration
//! - [`sketch`] - Sketch discovery
//! - [`build`] - Source merging and the compile pipeline
//! - [`commands`] - CLI command handlers

/// Core build pipeline with parallel compilation.
pub mod build;

/// CLI command handlers.
pub mod commands;

/// Legacy platform compatibility tables.
pub mod compat;

/// Project configuration (`inox.toml`).
pub mod config;

pub mod error;

/// Installed hardware platforms, boards and tools.
pub mod platform;

/// Property store with placeholder expansion.
pub mod properties;

/// Configuration layer merging.
pub mod resolver;

/// Sketch discovery.
pub mod sketch;

pub use error::{Error, Result};
pub use properties::PropertyStore;
