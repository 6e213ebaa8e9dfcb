//! Debugger application state and logic.

use crate::{Machine, Step};
use crate::program::{disassemble_at, disassemble_lines, parse};
use std::collections::HashSet;

/// Debugger application state.
pub struct DebuggerApp {
    /// The machine being debugged.
    pub machine: Machine,
    /// Breakpoints (by address).
    pub breakpoints: HashSet<i64>,
    /// Is the debugger running continuously?
    pub running: bool,
    /// Should we quit?
    pub should_quit: bool,
    /// Status message to display.
    pub status: String,
    /// Memory view scroll offset.
    pub mem_scroll: usize,
    /// Typing into the input line?
    pub input_mode: bool,
    /// Text typed so far.
    pub input_buffer: String,
    /// Every value the machine has output.
    pub output_log: Vec<i64>,
}

impl DebuggerApp {
    /// Create a new debugger for a program.
    pub fn new(program: Vec<i64>) -> Self {
        Self {
            machine: Machine::new(&program, &[]),
            breakpoints: HashSet::new(),
            running: false,
            should_quit: false,
            status: "Ready. Press 's' to step, 'r' to run, 'i' to enter input, 'q' to quit.".into(),
            mem_scroll: 0,
            input_mode: false,
            input_buffer: String::new(),
            output_log: Vec::new(),
        }
    }

    /// Step one instruction.
    pub fn step(&mut self) {
        if self.machine.state().is_terminal() {
            self.status = format!("Machine stopped: {:?}", self.machine.state());
            self.running = false;
            return;
        }

        let pc = self.machine.pc();
        let text = usize::try_from(pc)
            .map(|addr| disassemble_at(self.machine.memory(), addr).text)
            .unwrap_or_default();

        match self.machine.step() {
            Ok(Step::Executed(_)) => {
                self.status = format!("PC={:04}: {}", pc, text);
            }
            Ok(Step::Blocked) => {
                self.status = "Blocked on input. Press 'i' to enter values.".into();
                self.running = false;
            }
            Ok(Step::Halted) => {
                self.status = format!("Halted after {} steps", self.machine.steps());
                self.running = false;
            }
            Err(e) => {
                self.status = format!("Error: {}", e);
                self.running = false;
            }
        }

        self.output_log.extend(self.machine.drain_output());
    }

    /// Run until halt, block, breakpoint, or error.
    pub fn run(&mut self) {
        self.running = true;
        self.status = "Running...".into();
        // Leave a breakpoint we are sitting on
        if self.breakpoints.contains(&self.machine.pc()) {
            self.step();
        }
    }

    /// Run one iteration of continuous execution.
    pub fn tick(&mut self) {
        if !self.running {
            return;
        }

        if self.machine.state().is_terminal() {
            self.running = false;
            self.status = format!("Stopped after {} steps", self.machine.steps());
            return;
        }

        // Check for breakpoint
        let pc = self.machine.pc();
        if self.breakpoints.contains(&pc) {
            self.running = false;
            self.status = format!("Breakpoint at PC={}", pc);
            return;
        }

        self.step();
    }

    /// Toggle breakpoint at the current PC.
    pub fn toggle_breakpoint(&mut self) {
        let pc = self.machine.pc();
        if self.breakpoints.remove(&pc) {
            self.status = format!("Removed breakpoint at PC={}", pc);
        } else {
            self.breakpoints.insert(pc);
            self.status = format!("Set breakpoint at PC={}", pc);
        }
    }

    /// Queue the typed values as machine input.
    pub fn submit_input(&mut self) {
        match parse(&self.input_buffer) {
            Ok(values) => {
                self.machine.push_input(&values);
                self.status = format!("Queued {} value(s)", values.len());
                self.input_buffer.clear();
                self.input_mode = false;
            }
            Err(e) => {
                self.status = format!("Bad input: {}", e);
            }
        }
    }

    /// Reload the original program.
    pub fn reset(&mut self) {
        self.machine.restart();
        self.output_log.clear();
        self.running = false;
        self.status = "Reset. Ready.".into();
    }

    /// Get disassembly around the current PC.
    pub fn get_disassembly(&self, lines: usize) -> Vec<(usize, String, bool)> {
        let cells = self.machine.memory();
        let pc = self.machine.pc();
        let span = usize::try_from(pc)
            .map(|pc| pc + 4)
            .unwrap_or(0)
            .max(self.machine.program().len())
            .min(cells.len());

        let listing = disassemble_lines(&cells[..span]);
        let current = listing
            .iter()
            .position(|line| line.address as i64 + line.width as i64 > pc)
            .unwrap_or(0);
        let start = current.saturating_sub(lines / 2);

        listing
            .into_iter()
            .skip(start)
            .take(lines)
            .map(|line| {
                let is_current = line.address as i64 == pc;
                (line.address, line.text, is_current)
            })
            .collect()
    }
}

/// Run the debugger with a program.
pub fn run_debugger(program: Vec<i64>) -> std::io::Result<()> {
    use crossterm::{
        event::{self, Event, KeyCode, KeyEventKind},
        terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
        ExecutableCommand,
    };
    use ratatui::prelude::*;
    use std::io::stdout;
    use std::time::Duration;

    // Setup terminal
    enable_raw_mode()?;
    stdout().execute(EnterAlternateScreen)?;
    let mut terminal = Terminal::new(CrosstermBackend::new(stdout()))?;

    let mut app = DebuggerApp::new(program);

    loop {
        terminal.draw(|frame| {
            super::ui::draw(frame, &app);
        })?;

        if event::poll(Duration::from_millis(50))? {
            if let Event::Key(key) = event::read()? {
                if key.kind == KeyEventKind::Press {
                    if app.input_mode {
                        match key.code {
                            KeyCode::Enter => app.submit_input(),
                            KeyCode::Esc => {
                                app.input_mode = false;
                                app.input_buffer.clear();
                                app.status = "Input cancelled.".into();
                            }
                            KeyCode::Backspace => {
                                app.input_buffer.pop();
                            }
                            KeyCode::Char(c) => app.input_buffer.push(c),
                            _ => {}
                        }
                    } else {
                        match key.code {
                            KeyCode::Char('q') => app.should_quit = true,
                            KeyCode::Char('s') => {
                                app.running = false;
                                app.step();
                            }
                            KeyCode::Char('r') => app.run(),
                            KeyCode::Char('p') => {
                                app.running = false;
                                app.status = "Paused.".into();
                            }
                            KeyCode::Char('b') => app.toggle_breakpoint(),
                            KeyCode::Char('i') => {
                                app.running = false;
                                app.input_mode = true;
                                app.status = "Enter comma-separated values, Enter to queue, Esc to cancel.".into();
                            }
                            KeyCode::Char('x') => app.reset(),
                            KeyCode::Up => {
                                app.mem_scroll = app.mem_scroll.saturating_sub(1);
                            }
                            KeyCode::Down => {
                                if app.mem_scroll + 1 < app.machine.memory().len() {
                                    app.mem_scroll += 1;
                                }
                            }
                            KeyCode::PageDown => {
                                app.mem_scroll = (app.mem_scroll + 16).min(app.machine.memory().len().saturating_sub(1));
                            }
                            KeyCode::PageUp => {
                                app.mem_scroll = app.mem_scroll.saturating_sub(16);
                            }
                            _ => {}
                        }
                    }
                }
            }
        }

        // Tick for continuous running
        if app.running {
            app.tick();
        }

        if app.should_quit {
            break;
        }
    }

    // Restore terminal
    disable_raw_mode()?;
    stdout().execute(LeaveAlternateScreen)?;

    Ok(())
}
