//! Intcode execution engine.
//!
//! Implements the fetch-decode-execute cycle, the blocking input protocol
//! and the input/output queues exchanged with the caller.

use std::collections::VecDeque;
use serde::{Serialize, Deserialize};
use thiserror::Error;
use crate::machine::{Memory, Registers};
use crate::machine::decode::{self, Access, DecodeError, Instruction, Opcode};
use crate::machine::memory::{MemoryError, MemoryPolicy, DEFAULT_MEMORY_LIMIT, MIN_MEMORY_SIZE};
use crate::machine::registers::Operand;
use crate::machine::trace::{ParamTrace, TraceEntry};

/// Machine execution state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MachineState {
    /// Constructed or reset, nothing executed yet.
    Ready,
    /// Executing, or paused by a step budget.
    Running,
    /// Waiting on an input instruction with an empty queue.
    Blocked,
    /// Executed a halt instruction.
    Halted,
    /// Stopped by an error.
    Errored,
}

impl MachineState {
    /// Halted and Errored accept no further execution.
    pub fn is_terminal(self) -> bool {
        matches!(self, MachineState::Halted | MachineState::Errored)
    }
}

/// Construction-time machine settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MachineConfig {
    /// Minimum number of memory cells.
    pub min_memory: usize,
    /// Behavior for addresses beyond the current memory length.
    pub memory_policy: MemoryPolicy,
    /// Growth ceiling for `MemoryPolicy::Grow`.
    pub max_memory: usize,
    /// Record a trace entry for every executed instruction.
    pub trace: bool,
}

impl Default for MachineConfig {
    fn default() -> Self {
        Self {
            min_memory: MIN_MEMORY_SIZE,
            memory_policy: MemoryPolicy::Grow,
            max_memory: DEFAULT_MEMORY_LIMIT,
            trace: false,
        }
    }
}

/// Outcome of a single step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// An instruction ran and the machine can continue.
    Executed(Instruction),
    /// Input was needed but none was queued. Nothing changed.
    Blocked,
    /// The halt instruction ran.
    Halted,
}

/// An Intcode machine.
#[derive(Clone, Serialize, Deserialize)]
pub struct Machine {
    /// pc and relative base.
    pub regs: Registers,
    mem: Memory,
    state: MachineState,
    /// Instructions executed since construction or restart.
    steps: u64,
    input: VecDeque<i64>,
    output: Vec<i64>,
    /// Program image captured at construction, used by `restart`.
    program: Vec<i64>,
    tracing: bool,
    trace: Vec<TraceEntry>,
}

impl Machine {
    /// Create a machine with the default configuration.
    pub fn new(program: &[i64], input: &[i64]) -> Self {
        Self::with_memory(program, input, Memory::with_program(program))
    }

    /// Create a machine with an explicit configuration.
    ///
    /// `min_memory` is raised to [`MIN_MEMORY_SIZE`] and must not exceed
    /// `max_memory`.
    pub fn with_config(program: &[i64], input: &[i64], config: MachineConfig) -> Result<Self, MachineError> {
        let min_memory = config.min_memory.max(MIN_MEMORY_SIZE);
        if min_memory > config.max_memory {
            return Err(MachineError::InvalidConfig { min_memory, max_memory: config.max_memory });
        }

        let mem = Memory::new(program, min_memory, config.memory_policy, config.max_memory)?;
        let mut machine = Self::with_memory(program, input, mem);
        machine.tracing = config.trace;
        Ok(machine)
    }

    fn with_memory(program: &[i64], input: &[i64], mem: Memory) -> Self {
        Self {
            regs: Registers::new(),
            mem,
            state: MachineState::Ready,
            steps: 0,
            input: input.iter().copied().collect(),
            output: Vec::new(),
            program: program.to_vec(),
            tracing: false,
            trace: Vec::new(),
        }
    }

    /// Queue `input` and execute until the machine halts, blocks on input,
    /// or fails.
    ///
    /// Blocking is not an error: the machine keeps its position and the
    /// next call resumes the same input instruction.
    pub fn run(&mut self, input: &[i64]) -> Result<MachineState, MachineError> {
        self.run_until(input, None)
    }

    /// Like [`Machine::run`], but execute at most `max_steps` instructions.
    ///
    /// Returns `Running` if the budget ran out first.
    pub fn run_limited(&mut self, input: &[i64], max_steps: u64) -> Result<MachineState, MachineError> {
        self.run_until(input, Some(max_steps))
    }

    fn run_until(&mut self, input: &[i64], limit: Option<u64>) -> Result<MachineState, MachineError> {
        if self.state.is_terminal() {
            return Err(MachineError::NotRunning(self.state));
        }
        self.push_input(input);

        let mut executed = 0u64;
        loop {
            if limit.is_some_and(|max| executed >= max) {
                return Ok(self.state);
            }
            match self.step()? {
                Step::Executed(_) => executed += 1,
                Step::Blocked => return Ok(MachineState::Blocked),
                Step::Halted => return Ok(MachineState::Halted),
            }
        }
    }

    /// Execute a single instruction.
    ///
    /// Any error leaves the machine in `Errored`.
    pub fn step(&mut self) -> Result<Step, MachineError> {
        if self.state.is_terminal() {
            return Err(MachineError::NotRunning(self.state));
        }

        match self.execute_next() {
            Ok(step) => {
                self.state = match step {
                    Step::Executed(_) => MachineState::Running,
                    Step::Blocked => MachineState::Blocked,
                    Step::Halted => MachineState::Halted,
                };
                Ok(step)
            }
            Err(e) => {
                self.state = MachineState::Errored;
                Err(e)
            }
        }
    }

    fn execute_next(&mut self) -> Result<Step, MachineError> {
        // Fetch
        let pc = self.fetch_pc()?;
        let word = self.mem.read(pc)?;

        // Decode
        let instr = decode::decode(word)
            .map_err(|source| MachineError::Decode { pc, source })?;

        // Starved input suspends before anything is touched
        if instr.opcode == Opcode::Input && self.input.is_empty() {
            return Ok(Step::Blocked);
        }

        let entry = if self.tracing {
            Some(self.trace_entry(pc, word, &instr))
        } else {
            None
        };

        // Execute
        let step = self.execute(pc, instr)?;

        self.steps += 1;
        if let Some(entry) = entry {
            self.trace.push(entry);
        }

        Ok(step)
    }

    fn execute(&mut self, pc: usize, instr: Instruction) -> Result<Step, MachineError> {
        match instr.opcode {
            Opcode::Add => {
                let a = self.read_param(pc, &instr, 0)?;
                let b = self.read_param(pc, &instr, 1)?;
                self.write_param(pc, &instr, 2, a.wrapping_add(b))?;
            }

            Opcode::Multiply => {
                let a = self.read_param(pc, &instr, 0)?;
                let b = self.read_param(pc, &instr, 1)?;
                self.write_param(pc, &instr, 2, a.wrapping_mul(b))?;
            }

            Opcode::Input => {
                if let Some(&value) = self.input.front() {
                    self.write_param(pc, &instr, 0, value)?;
                    self.input.pop_front();
                }
            }

            Opcode::Output => {
                let a = self.read_param(pc, &instr, 0)?;
                self.output.push(a);
            }

            Opcode::JumpIfTrue => {
                let a = self.read_param(pc, &instr, 0)?;
                let target = self.read_param(pc, &instr, 1)?;
                if a != 0 {
                    self.regs.jump(target);
                    return Ok(Step::Executed(instr));
                }
            }

            Opcode::JumpIfFalse => {
                let a = self.read_param(pc, &instr, 0)?;
                let target = self.read_param(pc, &instr, 1)?;
                if a == 0 {
                    self.regs.jump(target);
                    return Ok(Step::Executed(instr));
                }
            }

            Opcode::LessThan => {
                let a = self.read_param(pc, &instr, 0)?;
                let b = self.read_param(pc, &instr, 1)?;
                self.write_param(pc, &instr, 2, i64::from(a < b))?;
            }

            Opcode::Equals => {
                let a = self.read_param(pc, &instr, 0)?;
                let b = self.read_param(pc, &instr, 1)?;
                self.write_param(pc, &instr, 2, i64::from(a == b))?;
            }

            Opcode::AdjustRelativeBase => {
                let a = self.read_param(pc, &instr, 0)?;
                self.regs.adjust_relative_base(a);
            }

            Opcode::Halt => {
                return Ok(Step::Halted);
            }
        }

        self.regs.advance(instr.width());
        Ok(Step::Executed(instr))
    }

    /// The program counter as a memory index, checked against memory bounds.
    fn fetch_pc(&self) -> Result<usize, MachineError> {
        usize::try_from(self.regs.pc)
            .ok()
            .filter(|&pc| pc < self.mem.len())
            .ok_or(MachineError::ProgramCounterOverrun { pc: self.regs.pc, size: self.mem.len() })
    }

    /// Resolve parameter `param` of the instruction at `pc`.
    fn operand(&self, pc: usize, instr: &Instruction, param: usize) -> Result<Operand, MachineError> {
        let mode = instr.mode(param)
            .map_err(|source| MachineError::Decode { pc, source })?;
        let raw = self.mem.read(pc + 1 + param)?;
        Ok(self.regs.resolve(raw, mode)?)
    }

    fn read_param(&self, pc: usize, instr: &Instruction, param: usize) -> Result<i64, MachineError> {
        match self.operand(pc, instr, param)? {
            Operand::Address(addr) => Ok(self.mem.read(addr)?),
            Operand::Immediate(value) => Ok(value),
        }
    }

    fn write_param(&mut self, pc: usize, instr: &Instruction, param: usize, value: i64) -> Result<(), MachineError> {
        match self.operand(pc, instr, param)? {
            Operand::Address(addr) => Ok(self.mem.write(addr, value)?),
            Operand::Immediate(_) => Err(MachineError::Decode {
                pc,
                source: DecodeError::IllegalAddressingMode {
                    param,
                    mode: decode::mode_digit(self.mem.read(pc)?, param),
                    access: Access::Write,
                },
            }),
        }
    }

    /// Snapshot an instruction's parameters before it executes.
    fn trace_entry(&self, pc: usize, word: i64, instr: &Instruction) -> TraceEntry {
        let params = instr
            .param_modes()
            .iter()
            .enumerate()
            .map(|(param, &mode)| {
                let raw = self.mem.read(pc + 1 + param).unwrap_or_default();
                let operand = self.regs.resolve(raw, mode).ok();
                let address = match operand {
                    Some(Operand::Address(addr)) => Some(addr),
                    _ => None,
                };
                let access = instr.opcode.access(param);
                let value = match (access, operand) {
                    (Access::Write, _) | (_, None) => None,
                    (Access::Read, Some(Operand::Immediate(value))) => Some(value),
                    (Access::Read, Some(Operand::Address(addr))) => self.mem.read(addr).ok(),
                };
                ParamTrace { mode, access, raw, address, value }
            })
            .collect();

        TraceEntry {
            step: self.steps,
            pc: pc as i64,
            word,
            opcode: instr.opcode,
            relative_base: self.regs.relative_base,
            params,
        }
    }

    /// Append values to the input queue without running.
    pub fn push_input(&mut self, input: &[i64]) {
        self.input.extend(input.iter().copied());
    }

    /// Input not yet consumed.
    pub fn pending_input(&self) -> &VecDeque<i64> {
        &self.input
    }

    /// Output produced since the last drain, without clearing it.
    pub fn output(&self) -> &[i64] {
        &self.output
    }

    /// Take all output produced since the last drain.
    pub fn drain_output(&mut self) -> Vec<i64> {
        std::mem::take(&mut self.output)
    }

    /// Rewind the program counter and clear both queues.
    ///
    /// Memory and the relative base are left as they are, so a program that
    /// modified itself will not start over from its original image. Use
    /// [`Machine::restart`] for that.
    pub fn reset(&mut self) {
        self.regs.pc = 0;
        self.input.clear();
        self.output.clear();
        self.state = MachineState::Ready;
    }

    /// Reload the program captured at construction and zero all state.
    pub fn restart(&mut self) {
        self.mem.restore(&self.program);
        self.regs.reset();
        self.input.clear();
        self.output.clear();
        self.trace.clear();
        self.steps = 0;
        self.state = MachineState::Ready;
    }

    /// Enable or disable per-instruction tracing.
    pub fn set_trace(&mut self, enabled: bool) {
        self.tracing = enabled;
    }

    /// Take all trace entries recorded since the last drain.
    pub fn drain_trace(&mut self) -> Vec<TraceEntry> {
        std::mem::take(&mut self.trace)
    }

    pub fn state(&self) -> MachineState {
        self.state
    }

    pub fn pc(&self) -> i64 {
        self.regs.pc
    }

    pub fn relative_base(&self) -> i64 {
        self.regs.relative_base
    }

    pub fn steps(&self) -> u64 {
        self.steps
    }

    /// Read-only view of memory at its current length.
    pub fn memory(&self) -> &[i64] {
        self.mem.as_slice()
    }

    /// The program image the machine was built from.
    pub fn program(&self) -> &[i64] {
        &self.program
    }

    /// Check if the machine has halted.
    pub fn is_halted(&self) -> bool {
        self.state == MachineState::Halted
    }

    /// Check if the machine is waiting for input.
    pub fn is_blocked(&self) -> bool {
        self.state == MachineState::Blocked
    }
}

impl Default for Machine {
    fn default() -> Self {
        Self::new(&[], &[])
    }
}

impl std::fmt::Debug for Machine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Machine")
            .field("state", &self.state)
            .field("steps", &self.steps)
            .field("regs", &self.regs)
            .field("input", &self.input.len())
            .field("output", &self.output.len())
            .finish()
    }
}

/// Errors that can occur during execution.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MachineError {
    #[error("machine not runnable: {0:?}")]
    NotRunning(MachineState),

    #[error("min_memory {min_memory} exceeds max_memory {max_memory}")]
    InvalidConfig { min_memory: usize, max_memory: usize },

    #[error("program counter {pc} outside memory (size {size})")]
    ProgramCounterOverrun { pc: i64, size: usize },

    #[error("at address {pc}: {source}")]
    Decode { pc: usize, source: DecodeError },

    #[error("memory error: {0}")]
    Memory(#[from] MemoryError),
}

impl MachineError {
    pub fn is_invalid_opcode(&self) -> bool {
        matches!(self, MachineError::Decode { source: DecodeError::InvalidOpcode(_), .. })
    }

    pub fn is_illegal_addressing_mode(&self) -> bool {
        matches!(self, MachineError::Decode { source: DecodeError::IllegalAddressingMode { .. }, .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::machine::decode::ParamMode;
    use proptest::prelude::*;

    const QUINE: [i64; 16] = [109, 1, 204, -1, 1001, 100, 1, 100, 1008, 100, 16, 101, 1006, 101, 0, 99];

    // Reads a value into cell 100, echoes it, loops forever
    const ECHO: [i64; 7] = [3, 100, 4, 100, 1105, 1, 0];

    fn run_to_halt(program: &[i64], input: &[i64]) -> Machine {
        let mut machine = Machine::new(program, input);
        assert_eq!(machine.run(&[]).unwrap(), MachineState::Halted);
        machine
    }

    #[test]
    fn test_add_positional() {
        let machine = run_to_halt(&[1, 0, 0, 0, 99], &[]);
        assert_eq!(machine.mem.read(0).unwrap(), 2);
        assert!(machine.is_halted());
    }

    #[test]
    fn test_multiply_positional() {
        let machine = run_to_halt(&[2, 4, 4, 5, 99, 0], &[]);
        assert_eq!(machine.mem.read(5).unwrap(), 9801);

        let machine = run_to_halt(&[1, 1, 1, 4, 99, 5, 6, 0, 99], &[]);
        assert_eq!(&machine.mem.as_slice()[..9], &[30, 1, 1, 4, 2, 5, 6, 0, 99]);
    }

    #[test]
    fn test_halt_ignores_mode_digits() {
        let machine = run_to_halt(&[1199], &[]);
        assert_eq!(machine.steps(), 1);
    }

    #[test]
    fn test_comparisons() {
        // Equal to 8, position mode
        let eq8 = [3, 9, 8, 9, 10, 9, 4, 9, 99, -1, 8];
        assert_eq!(run_to_halt(&eq8, &[8]).drain_output(), vec![1]);
        assert_eq!(run_to_halt(&eq8, &[7]).drain_output(), vec![0]);

        // Less than 8, immediate mode
        let lt8 = [3, 3, 1107, -1, 8, 3, 4, 3, 99];
        assert_eq!(run_to_halt(&lt8, &[5]).drain_output(), vec![1]);
        assert_eq!(run_to_halt(&lt8, &[9]).drain_output(), vec![0]);
    }

    #[test]
    fn test_jumps() {
        let program = [
            3, 21, 1008, 21, 8, 20, 1005, 20, 22, 107, 8, 21, 20, 1006, 20, 31,
            1106, 0, 36, 98, 0, 0, 1002, 21, 125, 20, 4, 20, 1105, 1, 46, 104,
            999, 1105, 1, 46, 1101, 1000, 1, 20, 4, 20, 1105, 1, 46, 98, 99,
        ];
        assert_eq!(run_to_halt(&program, &[7]).drain_output(), vec![999]);
        assert_eq!(run_to_halt(&program, &[8]).drain_output(), vec![1000]);
        assert_eq!(run_to_halt(&program, &[9]).drain_output(), vec![1001]);
    }

    #[test]
    fn test_quine() {
        let mut machine = run_to_halt(&QUINE, &[]);
        assert_eq!(machine.drain_output(), QUINE.to_vec());
    }

    #[test]
    fn test_large_numbers() {
        let mut machine = run_to_halt(&[1102, 34915192, 34915192, 7, 4, 7, 99, 0], &[]);
        assert_eq!(machine.drain_output(), vec![1219070632396864]);

        let mut machine = run_to_halt(&[104, 1125899906842624, 99], &[]);
        assert_eq!(machine.drain_output(), vec![1125899906842624]);
    }

    #[test]
    fn test_relative_addressing() {
        let program = [
            109, 2000,          // rb += 2000
            109, 19,            // rb += 19
            21101, 7, 8, -4,    // [rb-4] = 7 + 8
            204, -4,            // out [rb-4]
            99,
        ];
        let mut machine = run_to_halt(&program, &[]);

        assert_eq!(machine.relative_base(), 2019);
        assert_eq!(machine.mem.read(2015).unwrap(), 15);
        assert_eq!(machine.drain_output(), vec![15]);
    }

    #[test]
    fn test_blocking_and_resume() {
        // in -> [9]; [9] += 10; out [9]
        let program = [3, 9, 1001, 9, 10, 9, 4, 9, 99, 0];
        let mut machine = Machine::new(&program, &[]);

        assert_eq!(machine.run(&[]).unwrap(), MachineState::Blocked);
        assert!(!machine.is_halted());
        assert!(machine.is_blocked());
        assert_eq!(machine.pc(), 0);
        assert_eq!(machine.steps(), 0);
        assert!(machine.output().is_empty());

        // Starving again changes nothing
        assert_eq!(machine.run(&[]).unwrap(), MachineState::Blocked);
        assert_eq!(machine.pc(), 0);

        assert_eq!(machine.run(&[5]).unwrap(), MachineState::Halted);

        let upfront = run_to_halt(&program, &[5]);
        assert_eq!(machine.mem.as_slice(), upfront.mem.as_slice());
        assert_eq!(machine.pc(), upfront.pc());
        assert_eq!(machine.drain_output(), vec![15]);
    }

    #[test]
    fn test_initial_input_consumed_in_order() {
        let program = [3, 20, 3, 21, 4, 21, 4, 20, 99];
        let mut machine = Machine::new(&program, &[1]);

        assert_eq!(machine.run(&[2]).unwrap(), MachineState::Halted);
        assert_eq!(machine.drain_output(), vec![2, 1]);
        assert!(machine.pending_input().is_empty());
    }

    #[test]
    fn test_drain_is_destructive() {
        let mut machine = Machine::new(&ECHO, &[]);

        machine.run(&[1, 2, 3]).unwrap();
        assert_eq!(machine.drain_output(), vec![1, 2, 3]);
        assert!(machine.drain_output().is_empty());

        machine.run(&[4]).unwrap();
        assert_eq!(machine.drain_output(), vec![4]);
    }

    #[test]
    fn test_feedback_loop() {
        let program = [
            3, 26, 1001, 26, -4, 26, 3, 27, 1002, 27, 2, 27, 1, 27, 26, 27, 4, 27,
            1001, 28, -1, 28, 1005, 28, 6, 99, 0, 0, 5,
        ];
        let mut amps: Vec<Machine> = [9, 8, 7, 6, 5]
            .iter()
            .map(|&phase| Machine::new(&program, &[phase]))
            .collect();

        let mut signal = vec![0];
        while !amps.iter().all(Machine::is_halted) {
            for amp in amps.iter_mut() {
                amp.run(&signal).unwrap();
                signal = amp.drain_output();
            }
        }

        assert_eq!(signal, vec![139629729]);
    }

    #[test]
    fn test_invalid_opcode() {
        let mut machine = Machine::new(&[42], &[]);
        let err = machine.run(&[]).unwrap_err();

        assert!(err.is_invalid_opcode());
        assert_eq!(err, MachineError::Decode { pc: 0, source: DecodeError::InvalidOpcode(42) });
        assert_eq!(machine.state(), MachineState::Errored);
    }

    #[test]
    fn test_illegal_mode_is_an_error() {
        let mut machine = Machine::new(&[304, 0, 99], &[]);
        assert!(machine.run(&[]).unwrap_err().is_illegal_addressing_mode());

        let mut machine = Machine::new(&[11101, 1, 1, 0, 99], &[]);
        assert!(machine.run(&[]).unwrap_err().is_illegal_addressing_mode());
    }

    #[test]
    fn test_pc_overrun() {
        // Fills memory exactly, so the pc runs off the end
        let program: Vec<i64> = [1101, 1, 1, 0].repeat(MIN_MEMORY_SIZE / 4);
        let mut machine = Machine::new(&program, &[]);

        assert_eq!(
            machine.run(&[]),
            Err(MachineError::ProgramCounterOverrun { pc: MIN_MEMORY_SIZE as i64, size: MIN_MEMORY_SIZE })
        );
        assert_eq!(machine.memory()[0], 2);

        let mut machine = Machine::new(&[1105, 1, 9000], &[]);
        assert!(matches!(
            machine.run(&[]),
            Err(MachineError::ProgramCounterOverrun { pc: 9000, .. })
        ));

        let mut machine = Machine::new(&[1105, 1, -5], &[]);
        assert!(matches!(
            machine.run(&[]),
            Err(MachineError::ProgramCounterOverrun { pc: -5, .. })
        ));
    }

    #[test]
    fn test_memory_growth_policy() {
        let program = [1101, 1, 1, 9000, 99];

        let machine = run_to_halt(&program, &[]);
        assert_eq!(machine.mem.read(9000).unwrap(), 2);
        assert_eq!(machine.mem.len(), 9001);

        let config = MachineConfig { memory_policy: MemoryPolicy::Strict, ..MachineConfig::default() };
        let mut machine = Machine::with_config(&program, &[], config).unwrap();
        assert!(matches!(
            machine.run(&[]),
            Err(MachineError::Memory(MemoryError::OutOfRange { address: 9000, .. }))
        ));
    }

    #[test]
    fn test_config_raises_small_min_memory() {
        let config = MachineConfig { min_memory: 4, ..MachineConfig::default() };
        let machine = Machine::with_config(&[99], &[], config).unwrap();
        assert_eq!(machine.memory().len(), MIN_MEMORY_SIZE);
    }

    #[test]
    fn test_config_min_above_max_rejected() {
        let config = MachineConfig { min_memory: usize::MAX, ..MachineConfig::default() };
        assert_eq!(
            Machine::with_config(&[99], &[], config).unwrap_err(),
            MachineError::InvalidConfig { min_memory: usize::MAX, max_memory: DEFAULT_MEMORY_LIMIT }
        );

        let config = MachineConfig { max_memory: 100, ..MachineConfig::default() };
        assert!(matches!(
            Machine::with_config(&[99], &[], config),
            Err(MachineError::InvalidConfig { min_memory: MIN_MEMORY_SIZE, max_memory: 100 })
        ));
    }

    #[test]
    fn test_config_unallocatable_memory_is_an_error() {
        let config = MachineConfig {
            min_memory: usize::MAX,
            max_memory: usize::MAX,
            ..MachineConfig::default()
        };
        assert_eq!(
            Machine::with_config(&[99], &[], config).unwrap_err(),
            MachineError::Memory(MemoryError::AllocationFailed { cells: usize::MAX })
        );
    }

    #[test]
    fn test_wild_write_with_unbounded_growth() {
        let config = MachineConfig { max_memory: usize::MAX, ..MachineConfig::default() };
        let mut machine = Machine::with_config(&[1101, 1, 1, i64::MAX, 99], &[], config).unwrap();

        assert_eq!(
            machine.run(&[]),
            Err(MachineError::Memory(MemoryError::AllocationFailed { cells: i64::MAX as usize + 1 }))
        );
        assert_eq!(machine.state(), MachineState::Errored);
        assert_eq!(machine.memory().len(), MIN_MEMORY_SIZE);
    }

    #[test]
    fn test_negative_address() {
        let mut machine = Machine::new(&[4, -1, 99], &[]);
        assert_eq!(
            machine.run(&[]),
            Err(MachineError::Memory(MemoryError::NegativeAddress(-1)))
        );
    }

    #[test]
    fn test_terminal_states_refuse_to_run() {
        let mut machine = run_to_halt(&[99], &[]);
        assert_eq!(machine.run(&[1]), Err(MachineError::NotRunning(MachineState::Halted)));
        assert!(machine.pending_input().is_empty());

        let mut machine = Machine::new(&[0], &[]);
        assert!(machine.run(&[]).is_err());
        assert_eq!(machine.step(), Err(MachineError::NotRunning(MachineState::Errored)));
    }

    #[test]
    fn test_overflow_wraps() {
        let machine = run_to_halt(&[1101, i64::MAX, 1, 5, 99, 0], &[]);
        assert_eq!(machine.mem.read(5).unwrap(), i64::MIN);
    }

    #[test]
    fn test_reset_keeps_memory() {
        let mut machine = run_to_halt(&[1, 0, 0, 0, 99], &[]);
        assert_eq!(machine.mem.read(0).unwrap(), 2);

        machine.push_input(&[7]);
        machine.reset();
        assert_eq!(machine.state(), MachineState::Ready);
        assert_eq!(machine.pc(), 0);
        assert!(machine.pending_input().is_empty());

        // Cell 0 is now 2: the rerun multiplies instead of adding
        assert_eq!(machine.run(&[]).unwrap(), MachineState::Halted);
        assert_eq!(machine.mem.read(0).unwrap(), 4);
    }

    #[test]
    fn test_restart_restores_program() {
        let mut machine = run_to_halt(&[1, 0, 0, 0, 99], &[]);
        machine.restart();

        assert_eq!(machine.mem.read(0).unwrap(), 1);
        assert_eq!(machine.steps(), 0);
        assert_eq!(machine.run(&[]).unwrap(), MachineState::Halted);
        assert_eq!(machine.mem.read(0).unwrap(), 2);
    }

    #[test]
    fn test_run_limited() {
        let mut machine = Machine::new(&ECHO, &[1, 2]);

        assert_eq!(machine.run_limited(&[], 3).unwrap(), MachineState::Running);
        assert_eq!(machine.steps(), 3);
        assert_eq!(machine.output(), &[1]);

        assert_eq!(machine.run(&[]).unwrap(), MachineState::Blocked);
        assert_eq!(machine.drain_output(), vec![1, 2]);
    }

    #[test]
    fn test_step_outcomes() {
        let mut machine = Machine::new(&[3, 5, 99], &[]);

        assert_eq!(machine.step().unwrap(), Step::Blocked);
        machine.push_input(&[1]);
        assert!(matches!(machine.step().unwrap(), Step::Executed(i) if i.opcode == Opcode::Input));
        assert_eq!(machine.state(), MachineState::Running);
        assert_eq!(machine.step().unwrap(), Step::Halted);
    }

    #[test]
    fn test_trace_records_instructions() {
        let mut machine = Machine::new(&[1, 0, 0, 0, 99], &[]);
        machine.set_trace(true);
        machine.run(&[]).unwrap();

        let trace = machine.drain_trace();
        assert_eq!(trace.len(), 2);
        assert_eq!(trace[0].opcode, Opcode::Add);
        assert_eq!(trace[0].params[0].value, Some(1));
        assert_eq!(trace[0].params[2].address, Some(0));
        assert_eq!(trace[0].params[2].value, None);
        assert_eq!(trace[0].params[2].access, Access::Write);
        assert_eq!(trace[1].opcode, Opcode::Halt);
        assert!(machine.drain_trace().is_empty());
    }

    #[test]
    fn test_trace_from_config() {
        let config = MachineConfig { trace: true, ..MachineConfig::default() };
        let mut machine = Machine::with_config(&[4, 9000000, 99], &[], config).unwrap();
        machine.run(&[]).unwrap();

        let trace = machine.drain_trace();
        assert_eq!(trace[0].params[0].access, Access::Read);
        assert_eq!(trace[0].params[0].value, Some(0));
    }

    #[test]
    fn test_trace_off_by_default() {
        let mut machine = run_to_halt(&QUINE, &[]);
        assert!(machine.drain_trace().is_empty());
    }

    #[test]
    fn test_snapshot_resumes() {
        let mut machine = Machine::new(&ECHO, &[]);
        machine.run(&[1]).unwrap();

        let json = serde_json::to_string(&machine).unwrap();
        let mut restored: Machine = serde_json::from_str(&json).unwrap();

        assert_eq!(restored.state(), MachineState::Blocked);
        assert_eq!(restored.drain_output(), vec![1]);
        restored.run(&[42]).unwrap();
        assert_eq!(restored.drain_output(), vec![42]);
    }

    fn add_program(a: i64, b: i64, modes: [ParamMode; 2]) -> Vec<i64> {
        let word = decode::encode(Opcode::Add, &[modes[0], modes[1], ParamMode::Position]);
        let operand = |mode: ParamMode, value: i64, cell: i64| match mode {
            ParamMode::Immediate => value,
            _ => cell,
        };
        vec![word, operand(modes[0], a, 5), operand(modes[1], b, 6), 7, 99, a, b, 0]
    }

    proptest! {
        #[test]
        fn prop_immediate_matches_positional(a in -1_000_000i64..1_000_000, b in -1_000_000i64..1_000_000) {
            let positional = run_to_halt(&add_program(a, b, [ParamMode::Position; 2]), &[]);
            for modes in [
                [ParamMode::Immediate, ParamMode::Position],
                [ParamMode::Position, ParamMode::Immediate],
                [ParamMode::Immediate; 2],
            ] {
                let machine = run_to_halt(&add_program(a, b, modes), &[]);
                prop_assert_eq!(machine.mem.read(7).unwrap(), positional.mem.read(7).unwrap());
            }
            prop_assert_eq!(positional.mem.read(7).unwrap(), a + b);
        }

        #[test]
        fn prop_incremental_input_matches_upfront(
            values in proptest::collection::vec(any::<i64>(), 0..32),
            chunk in 1usize..8,
        ) {
            let mut incremental = Machine::new(&ECHO, &[]);
            let mut seen = Vec::new();
            for piece in values.chunks(chunk) {
                prop_assert_eq!(incremental.run(piece).unwrap(), MachineState::Blocked);
                seen.extend(incremental.drain_output());
            }

            let mut upfront = Machine::new(&ECHO, &values);
            upfront.run(&[]).unwrap();

            prop_assert_eq!(&seen, &values);
            prop_assert_eq!(upfront.drain_output(), values);
            prop_assert_eq!(incremental.pc(), upfront.pc());
        }

        #[test]
        fn prop_relative_base_composes(
            adjustments in proptest::collection::vec(100i64..500, 1..6),
            offset in 0i64..100,
        ) {
            let mut program: Vec<i64> = adjustments.iter().flat_map(|&d| [109, d]).collect();
            program.extend([21101, 3, 4, offset, 99]);
            let machine = run_to_halt(&program, &[]);

            let base: i64 = adjustments.iter().sum();
            prop_assert_eq!(machine.relative_base(), base);
            prop_assert_eq!(machine.mem.read((base + offset) as usize).unwrap(), 7);
        }
    }
}
