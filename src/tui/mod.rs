//! TUI debugger for Intcode programs.
//!
//! Provides an interactive terminal-based debugger with:
//! - Register, state and input queue view
//! - Scrollable memory view
//! - Step/run/breakpoint controls
//! - An input line for feeding a blocked machine
//! - Disassembly and output views

mod app;
mod ui;

pub use app::{DebuggerApp, run_debugger};
