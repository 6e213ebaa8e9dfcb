//! The Intcode virtual machine.
//!
//! This module implements the complete machine:
//! - a flat, zero-padded memory of signed 64-bit cells
//! - 2 registers: pc and relative base
//! - 10 instructions with positional, immediate and relative parameters
//! - FIFO input/output queues with resumable blocking input

pub mod memory;
pub mod registers;
pub mod decode;
pub mod execute;
pub mod trace;

pub use memory::{Memory, MemoryError, MemoryPolicy};
pub use registers::{Registers, Operand};
pub use decode::{Instruction, Opcode, ParamMode, DecodeError};
pub use execute::{Machine, MachineConfig, MachineError, MachineState, Step};
pub use trace::{TraceEntry, ParamTrace};
