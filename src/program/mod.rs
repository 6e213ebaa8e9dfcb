//! Program loading and inspection.
//!
//! This module provides:
//! - The comma-separated text format (text ↔ program, file ↔ program)
//! - A disassembler (program → readable listing)

pub mod parse;
pub mod disasm;

pub use parse::{parse, format_program, load_program, save_program, ParseError, LoadError};
pub use disasm::{disassemble, disassemble_at, disassemble_lines};
