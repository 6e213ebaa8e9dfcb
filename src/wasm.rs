//! WebAssembly bindings for the Intcode VM.
//!
//! This module provides JavaScript-friendly wrappers around the core machine.

use wasm_bindgen::prelude::*;
use crate::Machine;
use crate::program::{parse, disassemble};

/// Initialize panic hook for better error messages in console.
#[wasm_bindgen(start)]
pub fn init() {
    #[cfg(feature = "console_error_panic_hook")]
    console_error_panic_hook::set_once();
}

/// WebAssembly-friendly machine wrapper.
#[wasm_bindgen]
pub struct WasmMachine {
    machine: Machine,
}

#[wasm_bindgen]
impl WasmMachine {
    /// Create a machine with an empty program.
    #[wasm_bindgen(constructor)]
    pub fn new() -> Self {
        Self {
            machine: Machine::default(),
        }
    }

    /// Load a program from its comma-separated text. Returns its length.
    #[wasm_bindgen]
    pub fn load(&mut self, source: &str) -> Result<usize, JsError> {
        let program = parse(source)
            .map_err(|e| JsError::new(&format!("{}", e)))?;

        let len = program.len();
        self.machine = Machine::new(&program, &[]);
        Ok(len)
    }

    /// Queue input and run until halt or block. Returns the resulting state.
    #[wasm_bindgen]
    pub fn run(&mut self, input: Vec<i64>) -> Result<String, JsError> {
        let state = self.machine.run(&input)
            .map_err(|e| JsError::new(&format!("{}", e)))?;
        Ok(format!("{:?}", state))
    }

    /// Step one instruction. Returns the resulting state.
    #[wasm_bindgen]
    pub fn step(&mut self) -> Result<String, JsError> {
        self.machine.step()
            .map_err(|e| JsError::new(&format!("{}", e)))?;
        Ok(format!("{:?}", self.machine.state()))
    }

    /// Take all output produced since the last drain.
    #[wasm_bindgen]
    pub fn drain_output(&mut self) -> Vec<i64> {
        self.machine.drain_output()
    }

    /// Rewind to address 0 and clear the queues, keeping memory.
    #[wasm_bindgen]
    pub fn reset(&mut self) {
        self.machine.reset();
    }

    /// Reload the original program.
    #[wasm_bindgen]
    pub fn restart(&mut self) {
        self.machine.restart();
    }

    #[wasm_bindgen]
    pub fn is_halted(&self) -> bool {
        self.machine.is_halted()
    }

    #[wasm_bindgen]
    pub fn is_blocked(&self) -> bool {
        self.machine.is_blocked()
    }

    #[wasm_bindgen]
    pub fn pc(&self) -> i64 {
        self.machine.pc()
    }

    #[wasm_bindgen]
    pub fn relative_base(&self) -> i64 {
        self.machine.relative_base()
    }

    #[wasm_bindgen]
    pub fn steps(&self) -> u64 {
        self.machine.steps()
    }

    /// Get state as string.
    #[wasm_bindgen]
    pub fn state(&self) -> String {
        format!("{:?}", self.machine.state())
    }

    /// Get memory cell value, zero beyond the current length.
    #[wasm_bindgen]
    pub fn memory_at(&self, index: usize) -> i64 {
        self.machine.memory().get(index).copied().unwrap_or_default()
    }

    /// Serialize the whole machine as JSON.
    #[wasm_bindgen]
    pub fn snapshot_json(&self) -> Result<String, JsError> {
        serde_json::to_string(&self.machine)
            .map_err(|e| JsError::new(&format!("{}", e)))
    }
}

impl Default for WasmMachine {
    fn default() -> Self {
        Self::new()
    }
}

/// Disassemble program text.
#[wasm_bindgen]
pub fn wasm_disassemble(source: &str) -> Result<String, JsError> {
    let program = parse(source)
        .map_err(|e| JsError::new(&format!("{}", e)))?;
    Ok(disassemble(&program))
}
