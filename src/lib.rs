//! # Intcode VM
//!
//! A resumable virtual machine for the Intcode instruction set.
//!
//! A machine executes a flat, self-modifying integer program with three
//! parameter addressing modes and a relocatable relative base. Input and
//! output go through FIFO queues: when the program asks for input that has
//! not arrived yet, the machine suspends in place and resumes on the next
//! [`Machine::run`] call. That makes it easy to wire several machines into
//! a pipeline, each one's drained output feeding the next one's input.

pub mod machine;
pub mod program;

#[cfg(feature = "tui")]
pub mod tui;

#[cfg(feature = "wasm")]
pub mod wasm;

// Re-export commonly used types
pub use machine::{Machine, MachineConfig, MachineError, MachineState, MemoryPolicy, Step, TraceEntry};
pub use program::{parse, load_program, disassemble, ParseError, LoadError};

#[cfg(feature = "tui")]
pub use tui::run_debugger;
