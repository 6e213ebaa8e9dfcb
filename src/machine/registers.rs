//! Intcode registers.
//!
//! The machine has two registers:
//! - pc: index of the next instruction word
//! - rb: relative base, added to relative-mode parameters

use serde::{Serialize, Deserialize};
use crate::machine::decode::ParamMode;
use crate::machine::memory::MemoryError;

/// A resolved parameter: either a memory address or an immediate value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Operand {
    Address(usize),
    Immediate(i64),
}

/// The Intcode register file.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Registers {
    /// Program counter. Kept signed so a jump to a negative target is
    /// reported at the next fetch instead of wrapping.
    pub pc: i64,

    /// Relative base for mode-2 parameters.
    pub relative_base: i64,
}

impl Registers {
    /// Create a new register file with all values zeroed.
    pub fn new() -> Self {
        Self::default()
    }

    /// Reset all registers to zero.
    pub fn reset(&mut self) {
        self.pc = 0;
        self.relative_base = 0;
    }

    /// Advance the program counter past an instruction of `width` cells.
    pub fn advance(&mut self, width: usize) {
        self.pc = self.pc.saturating_add(width as i64);
    }

    /// Set the program counter to an absolute address.
    pub fn jump(&mut self, target: i64) {
        self.pc = target;
    }

    /// Add to the relative base.
    pub fn adjust_relative_base(&mut self, delta: i64) {
        self.relative_base = self.relative_base.wrapping_add(delta);
    }

    /// Compute the effective operand of a parameter.
    ///
    /// - Position: `raw` is the address
    /// - Immediate: `raw` is the value
    /// - Relative: `relative_base + raw` is the address
    pub fn resolve(&self, raw: i64, mode: ParamMode) -> Result<Operand, MemoryError> {
        match mode {
            ParamMode::Position => to_address(raw).map(Operand::Address),
            ParamMode::Immediate => Ok(Operand::Immediate(raw)),
            ParamMode::Relative => {
                let addr = self.relative_base
                    .checked_add(raw)
                    .ok_or(MemoryError::AddressOverflow { base: self.relative_base, offset: raw })?;
                to_address(addr).map(Operand::Address)
            }
        }
    }
}

fn to_address(addr: i64) -> Result<usize, MemoryError> {
    usize::try_from(addr).map_err(|_| MemoryError::NegativeAddress(addr))
}
