//! Intcode memory subsystem.
//!
//! Memory is a flat sequence of signed 64-bit cells. It is pre-sized to
//! `max(program length, min_memory)` with the program copied into the low
//! addresses and every other cell zero.

use serde::{Serialize, Deserialize};

/// Minimum number of cells a machine starts with.
pub const MIN_MEMORY_SIZE: usize = 8192;

/// Hard ceiling on how far a growable memory may extend.
pub const DEFAULT_MEMORY_LIMIT: usize = 1 << 24;

/// How memory reacts to an address beyond its current length.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MemoryPolicy {
    /// Writes extend memory (zero-filled) up to the limit; reads of
    /// untouched cells yield zero.
    #[default]
    Grow,
    /// Any access at or beyond the current length is an error.
    Strict,
}

/// Intcode memory.
#[derive(Clone, Serialize, Deserialize)]
pub struct Memory {
    cells: Vec<i64>,
    policy: MemoryPolicy,
    limit: usize,
}

impl Memory {
    /// Create a memory holding `program`, padded with zeros to at least
    /// `min_size` cells.
    ///
    /// Fails instead of aborting when the allocator cannot supply the cells.
    pub fn new(program: &[i64], min_size: usize, policy: MemoryPolicy, limit: usize) -> Result<Self, MemoryError> {
        let size = program.len().max(min_size);
        let mut cells = Vec::new();
        cells
            .try_reserve_exact(size)
            .map_err(|_| MemoryError::AllocationFailed { cells: size })?;
        cells.extend_from_slice(program);
        cells.resize(size, 0);
        Ok(Self { cells, policy, limit: limit.max(program.len()) })
    }

    /// Create a memory with the default size and policy.
    pub fn with_program(program: &[i64]) -> Self {
        let mut cells = vec![0; program.len().max(MIN_MEMORY_SIZE)];
        cells[..program.len()].copy_from_slice(program);
        Self { cells, policy: MemoryPolicy::Grow, limit: DEFAULT_MEMORY_LIMIT.max(program.len()) }
    }

    /// Current number of addressable cells.
    #[inline]
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Read a cell.
    pub fn read(&self, addr: usize) -> Result<i64, MemoryError> {
        match self.cells.get(addr) {
            Some(&value) => Ok(value),
            None => match self.policy {
                MemoryPolicy::Grow if addr < self.limit => Ok(0),
                MemoryPolicy::Grow => Err(MemoryError::LimitExceeded { address: addr, limit: self.limit }),
                MemoryPolicy::Strict => Err(MemoryError::OutOfRange { address: addr, size: self.cells.len() }),
            },
        }
    }

    /// Write a cell, growing memory first if the policy allows it.
    pub fn write(&mut self, addr: usize, value: i64) -> Result<(), MemoryError> {
        if addr >= self.cells.len() {
            match self.policy {
                MemoryPolicy::Grow if addr < self.limit => {
                    self.cells
                        .try_reserve_exact(addr + 1 - self.cells.len())
                        .map_err(|_| MemoryError::AllocationFailed { cells: addr + 1 })?;
                    self.cells.resize(addr + 1, 0);
                }
                MemoryPolicy::Grow => {
                    return Err(MemoryError::LimitExceeded { address: addr, limit: self.limit });
                }
                MemoryPolicy::Strict => {
                    return Err(MemoryError::OutOfRange { address: addr, size: self.cells.len() });
                }
            }
        }
        self.cells[addr] = value;
        Ok(())
    }

    /// Replace the contents with `program`, keeping the current length.
    pub fn restore(&mut self, program: &[i64]) {
        self.cells.iter_mut().for_each(|cell| *cell = 0);
        if program.len() > self.cells.len() {
            self.cells.resize(program.len(), 0);
        }
        self.cells[..program.len()].copy_from_slice(program);
    }

    /// Read-only view of every cell.
    pub fn as_slice(&self) -> &[i64] {
        &self.cells
    }
}

impl std::fmt::Debug for Memory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Only count non-zero cells
        let non_zero = self.cells.iter().filter(|&&cell| cell != 0).count();

        f.debug_struct("Memory")
            .field("non_zero_cells", &non_zero)
            .field("total_cells", &self.cells.len())
            .field("policy", &self.policy)
            .finish()
    }
}

/// Errors that can occur during memory operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MemoryError {
    /// An effective address resolved below zero.
    NegativeAddress(i64),
    /// Relative base plus offset does not fit in 64 bits.
    AddressOverflow { base: i64, offset: i64 },
    /// Address is beyond a fixed-size memory.
    OutOfRange { address: usize, size: usize },
    /// Address is beyond the growth limit.
    LimitExceeded { address: usize, limit: usize },
    /// The allocator refused to provide this many cells.
    AllocationFailed { cells: usize },
}

impl std::fmt::Display for MemoryError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MemoryError::NegativeAddress(addr) => {
                write!(f, "negative memory address {}", addr)
            }
            MemoryError::AddressOverflow { base, offset } => {
                write!(f, "relative address overflow (base {}, offset {})", base, offset)
            }
            MemoryError::OutOfRange { address, size } => {
                write!(f, "memory address {} out of range (0-{})", address, size.saturating_sub(1))
            }
            MemoryError::LimitExceeded { address, limit } => {
                write!(f, "memory address {} exceeds growth limit {}", address, limit)
            }
            MemoryError::AllocationFailed { cells } => {
                write!(f, "cannot allocate {} memory cells", cells)
            }
        }
    }
}

impl std::error::Error for MemoryError {}
