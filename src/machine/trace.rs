//! Per-instruction execution trace.

use serde::{Serialize, Deserialize};
use crate::machine::decode::{Access, Opcode, ParamMode};

/// One parameter as seen by a traced instruction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParamTrace {
    pub mode: ParamMode,
    pub access: Access,
    /// Literal cell following the opcode word.
    pub raw: i64,
    /// Effective address, for non-immediate parameters.
    pub address: Option<usize>,
    /// Value read, for read parameters. `None` on a write, or when the
    /// read itself failed.
    pub value: Option<i64>,
}

/// One executed instruction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TraceEntry {
    pub step: u64,
    pub pc: i64,
    pub word: i64,
    pub opcode: Opcode,
    pub relative_base: i64,
    pub params: Vec<ParamTrace>,
}

impl std::fmt::Display for TraceEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:05} @{:04} {:<4} ({}) rb={}", self.step, self.pc, self.opcode, self.word, self.relative_base)?;
        for (i, param) in self.params.iter().enumerate() {
            write!(f, " | p{} {}", i, param.mode.name())?;
            if let Some(addr) = param.address {
                write!(f, " [{}]", addr)?;
            }
            match (param.access, param.value) {
                (Access::Write, _) => write!(f, " <- out")?,
                (Access::Read, Some(value)) => write!(f, " = {}", value)?,
                (Access::Read, None) => write!(f, " = ?")?,
            }
        }
        Ok(())
    }
}
