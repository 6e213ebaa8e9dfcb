//! Instruction decoder for Intcode.
//!
//! An instruction word holds a two-digit opcode in its low decimal digits.
//! Each higher digit is the addressing mode of one parameter: parameter
//! `k` (0-based) uses digit `word / 10^(k + 2) % 10`.

use serde::{Serialize, Deserialize};
use thiserror::Error;

/// Largest number of parameters any instruction takes.
pub const MAX_PARAMS: usize = 3;

/// Parameter addressing mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ParamMode {
    /// The parameter is an address (mode 0).
    #[default]
    Position,
    /// The parameter is the operand itself (mode 1). Read-only.
    Immediate,
    /// The parameter is an offset from the relative base (mode 2).
    Relative,
}

impl ParamMode {
    /// Create from a mode digit.
    pub fn from_digit(digit: i64) -> Option<Self> {
        match digit {
            0 => Some(ParamMode::Position),
            1 => Some(ParamMode::Immediate),
            2 => Some(ParamMode::Relative),
            _ => None,
        }
    }

    /// Convert to a mode digit.
    pub fn digit(self) -> i64 {
        match self {
            ParamMode::Position => 0,
            ParamMode::Immediate => 1,
            ParamMode::Relative => 2,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            ParamMode::Position => "positional",
            ParamMode::Immediate => "immediate",
            ParamMode::Relative => "relative",
        }
    }
}

/// Whether a parameter is read from or written to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Access {
    Read,
    Write,
}

impl std::fmt::Display for Access {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Access::Read => write!(f, "read"),
            Access::Write => write!(f, "write"),
        }
    }
}

/// The Intcode instruction set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Opcode {
    /// c = a + b
    Add,
    /// c = a * b
    Multiply,
    /// a = next input (blocks when the queue is empty)
    Input,
    /// emit a
    Output,
    /// if a != 0 then pc = b
    JumpIfTrue,
    /// if a == 0 then pc = b
    JumpIfFalse,
    /// c = (a < b) as 1/0
    LessThan,
    /// c = (a == b) as 1/0
    Equals,
    /// relative base += a
    AdjustRelativeBase,
    /// Stop execution
    Halt,
}

impl Opcode {
    /// Look up an opcode by its two-digit code.
    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            1 => Some(Opcode::Add),
            2 => Some(Opcode::Multiply),
            3 => Some(Opcode::Input),
            4 => Some(Opcode::Output),
            5 => Some(Opcode::JumpIfTrue),
            6 => Some(Opcode::JumpIfFalse),
            7 => Some(Opcode::LessThan),
            8 => Some(Opcode::Equals),
            9 => Some(Opcode::AdjustRelativeBase),
            99 => Some(Opcode::Halt),
            _ => None,
        }
    }

    pub fn code(self) -> i64 {
        match self {
            Opcode::Add => 1,
            Opcode::Multiply => 2,
            Opcode::Input => 3,
            Opcode::Output => 4,
            Opcode::JumpIfTrue => 5,
            Opcode::JumpIfFalse => 6,
            Opcode::LessThan => 7,
            Opcode::Equals => 8,
            Opcode::AdjustRelativeBase => 9,
            Opcode::Halt => 99,
        }
    }

    /// Number of parameters following the opcode word.
    pub fn arity(self) -> usize {
        match self {
            Opcode::Add | Opcode::Multiply | Opcode::LessThan | Opcode::Equals => 3,
            Opcode::JumpIfTrue | Opcode::JumpIfFalse => 2,
            Opcode::Input | Opcode::Output | Opcode::AdjustRelativeBase => 1,
            Opcode::Halt => 0,
        }
    }

    /// Instruction length in cells, opcode word included.
    pub fn width(self) -> usize {
        self.arity() + 1
    }

    /// Index of the parameter this instruction writes, if any.
    pub fn write_param(self) -> Option<usize> {
        match self {
            Opcode::Add | Opcode::Multiply | Opcode::LessThan | Opcode::Equals => Some(2),
            Opcode::Input => Some(0),
            _ => None,
        }
    }

    pub fn access(self, param: usize) -> Access {
        if self.write_param() == Some(param) {
            Access::Write
        } else {
            Access::Read
        }
    }

    pub fn mnemonic(self) -> &'static str {
        match self {
            Opcode::Add => "ADD",
            Opcode::Multiply => "MUL",
            Opcode::Input => "INP",
            Opcode::Output => "OUT",
            Opcode::JumpIfTrue => "JNZ",
            Opcode::JumpIfFalse => "JZ",
            Opcode::LessThan => "LESS",
            Opcode::Equals => "EQ",
            Opcode::AdjustRelativeBase => "ARB",
            Opcode::Halt => "HALT",
        }
    }
}

impl std::fmt::Display for Opcode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.pad(self.mnemonic())
    }
}

/// Decoded instruction word.
///
/// Modes past the opcode's arity are always `Position` and never consulted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Instruction {
    pub opcode: Opcode,
    pub modes: [ParamMode; MAX_PARAMS],
}

impl Instruction {
    /// Mode of parameter `param`, refusing indices beyond the opcode's arity.
    pub fn mode(&self, param: usize) -> Result<ParamMode, DecodeError> {
        if param >= self.opcode.arity() {
            return Err(DecodeError::ParameterOutOfRange { param, arity: self.opcode.arity() });
        }
        Ok(self.modes[param])
    }

    /// Modes of the parameters this instruction actually takes.
    pub fn param_modes(&self) -> &[ParamMode] {
        &self.modes[..self.opcode.arity()]
    }

    pub fn width(&self) -> usize {
        self.opcode.width()
    }
}

/// Raw mode digit of parameter `param` in `word`.
pub fn mode_digit(word: i64, param: usize) -> i64 {
    let divisor = 10i64.saturating_pow(param as u32 + 2);
    word / divisor % 10
}

/// Decode an instruction word.
///
/// Fails on an unknown opcode, on a mode digit that is not 0, 1 or 2, and
/// on an immediate-mode write target.
pub fn decode(word: i64) -> Result<Instruction, DecodeError> {
    let opcode = Opcode::from_code(word % 100)
        .ok_or(DecodeError::InvalidOpcode(word))?;

    let mut modes = [ParamMode::Position; MAX_PARAMS];
    for (param, slot) in modes.iter_mut().enumerate().take(opcode.arity()) {
        let digit = mode_digit(word, param);
        let access = opcode.access(param);
        let mode = ParamMode::from_digit(digit)
            .ok_or(DecodeError::IllegalAddressingMode { param, mode: digit, access })?;
        if mode == ParamMode::Immediate && access == Access::Write {
            return Err(DecodeError::IllegalAddressingMode { param, mode: digit, access });
        }
        *slot = mode;
    }

    Ok(Instruction { opcode, modes })
}

/// Encode an opcode and parameter modes back to an instruction word.
pub fn encode(opcode: Opcode, modes: &[ParamMode]) -> i64 {
    modes
        .iter()
        .take(opcode.arity())
        .enumerate()
        .fold(opcode.code(), |word, (param, mode)| {
            word + mode.digit() * 10i64.pow(param as u32 + 2)
        })
}

/// Errors that can occur during instruction decoding.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("invalid opcode in instruction word {0}")]
    InvalidOpcode(i64),

    #[error("illegal {access} addressing mode {mode} for parameter {param}")]
    IllegalAddressingMode { param: usize, mode: i64, access: Access },

    #[error("parameter {param} out of range for instruction with {arity} parameters")]
    ParameterOutOfRange { param: usize, arity: usize },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_halt() {
        let instr = decode(99).unwrap();
        assert_eq!(instr.opcode, Opcode::Halt);
        assert!(instr.param_modes().is_empty());
    }

    #[test]
    fn test_decode_modes() {
        // 1002: multiply, param 0 positional, param 1 immediate, param 2 positional
        let instr = decode(1002).unwrap();
        assert_eq!(instr.opcode, Opcode::Multiply);
        assert_eq!(
            instr.param_modes(),
            &[ParamMode::Position, ParamMode::Immediate, ParamMode::Position]
        );

        let instr = decode(21201).unwrap();
        assert_eq!(
            instr.param_modes(),
            &[ParamMode::Relative, ParamMode::Immediate, ParamMode::Relative]
        );
    }

    #[test]
    fn test_mode_digit() {
        assert_eq!(mode_digit(21201, 0), 2);
        assert_eq!(mode_digit(21201, 1), 1);
        assert_eq!(mode_digit(21201, 2), 2);
        assert_eq!(mode_digit(3, 0), 0);
    }

    #[test]
    fn test_invalid_opcode() {
        assert_eq!(decode(42), Err(DecodeError::InvalidOpcode(42)));
        assert_eq!(decode(0), Err(DecodeError::InvalidOpcode(0)));
        assert_eq!(decode(-1), Err(DecodeError::InvalidOpcode(-1)));
    }

    #[test]
    fn test_illegal_mode_digit() {
        assert_eq!(
            decode(301),
            Err(DecodeError::IllegalAddressingMode { param: 0, mode: 3, access: Access::Read })
        );
    }

    #[test]
    fn test_immediate_write_rejected() {
        assert_eq!(
            decode(10001),
            Err(DecodeError::IllegalAddressingMode { param: 2, mode: 1, access: Access::Write })
        );
        assert_eq!(
            decode(103),
            Err(DecodeError::IllegalAddressingMode { param: 0, mode: 1, access: Access::Write })
        );
        // Relative writes are fine
        assert!(decode(203).is_ok());
    }

    #[test]
    fn test_unused_mode_digits_ignored() {
        // Output takes one parameter; the digit for a second one is junk
        let instr = decode(90104).unwrap();
        assert_eq!(instr.opcode, Opcode::Output);
        assert_eq!(instr.param_modes(), &[ParamMode::Immediate]);
    }

    #[test]
    fn test_parameter_out_of_range() {
        let instr = decode(4).unwrap();
        assert!(instr.mode(0).is_ok());
        assert_eq!(
            instr.mode(1),
            Err(DecodeError::ParameterOutOfRange { param: 1, arity: 1 })
        );
    }

    #[test]
    fn test_encode_matches_digits() {
        let word = encode(
            Opcode::Add,
            &[ParamMode::Immediate, ParamMode::Relative, ParamMode::Relative],
        );
        assert_eq!(word, 22101);
        assert_eq!(encode(Opcode::Halt, &[]), 99);
        assert_eq!(decode(word).unwrap().param_modes()[1], ParamMode::Relative);
    }

    #[test]
    fn test_opcode_codes_agree() {
        let known: Vec<i64> = (0..100)
            .filter_map(Opcode::from_code)
            .map(Opcode::code)
            .collect();
        assert_eq!(known, vec![1, 2, 3, 4, 5, 6, 7, 8, 9, 99]);
    }
}
