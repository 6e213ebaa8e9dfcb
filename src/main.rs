//! Intcode VM - CLI Entry Point
//!
//! Commands:
//! - `intcode-vm run <program>` - Run a program, optionally feeding stdin
//! - `intcode-vm debug <program>` - Interactive debugger
//! - `intcode-vm disasm <program>` - Disassemble a program
//! - `intcode-vm selftest` - Run the built-in self-test

use clap::{Args, Parser, Subcommand};
use intcode::{Machine, MachineConfig, MachineState, MemoryPolicy};

#[derive(Parser)]
#[command(name = "intcode-vm")]
#[command(author = "Yigit")]
#[command(version = "0.1.0")]
#[command(about = "A resumable Intcode virtual machine")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a program until it halts or runs out of input
    Run(RunArgs),
    /// Interactive debugger
    Debug {
        /// Path to the program file
        program: String,
    },
    /// Disassemble a program to readable text
    Disasm {
        /// Path to the program file
        program: String,
    },
    /// Run the built-in self-test
    Selftest,
}

#[derive(Args)]
struct RunArgs {
    /// Path to the program file (comma-separated integers)
    program: String,
    /// Initial input, comma-separated (or raw text with --ascii)
    #[arg(short, long)]
    input: Option<String>,
    /// Treat input and output as ASCII text
    #[arg(short, long)]
    ascii: bool,
    /// Read more input from stdin whenever the program blocks
    #[arg(long)]
    interactive: bool,
    /// Stop after this many instructions
    #[arg(short, long)]
    max_steps: Option<u64>,
    /// Print a trace line for every instruction to stderr
    #[arg(short, long)]
    trace: bool,
    /// Emit trace lines as JSON
    #[arg(long)]
    json: bool,
    /// Fail on any access beyond the initial memory instead of growing
    #[arg(long)]
    strict_memory: bool,
    /// Machine configuration file (JSON)
    #[arg(short, long)]
    config: Option<String>,
    /// Write the final machine state to this file (JSON)
    #[arg(long)]
    snapshot: Option<String>,
}

fn main() {
    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Run(args)) => {
            run_program(args);
        }
        Some(Commands::Debug { program }) => {
            debug_program(&program);
        }
        Some(Commands::Disasm { program }) => {
            disassemble_file(&program);
        }
        Some(Commands::Selftest) => {
            run_self_test();
        }
        None => {
            println!("Intcode VM v0.1.0");
            println!("A resumable Intcode virtual machine");
            println!();
            println!("Use --help for available commands");
        }
    }
}

fn load_or_exit(path: &str) -> Vec<i64> {
    match intcode::load_program(path) {
        Ok(program) => program,
        Err(e) => {
            eprintln!("❌ Failed to load {}: {}", path, e);
            std::process::exit(1);
        }
    }
}

fn load_config(path: Option<&str>) -> MachineConfig {
    let Some(path) = path else {
        return MachineConfig::default();
    };

    let text = match std::fs::read_to_string(path) {
        Ok(text) => text,
        Err(e) => {
            eprintln!("❌ Failed to read config {}: {}", path, e);
            std::process::exit(1);
        }
    };

    match serde_json::from_str(&text) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("❌ Invalid config {}: {}", path, e);
            std::process::exit(1);
        }
    }
}

/// Turn user text into input values.
fn encode_input(text: &str, ascii: bool) -> Result<Vec<i64>, intcode::ParseError> {
    if ascii {
        let mut values: Vec<i64> = text.chars().map(|c| c as i64).collect();
        values.push('\n' as i64);
        Ok(values)
    } else {
        intcode::parse(text)
    }
}

fn print_output(values: &[i64], ascii: bool) {
    if ascii {
        let mut text = String::new();
        for &value in values {
            match u8::try_from(value) {
                Ok(byte) if byte.is_ascii() => text.push(byte as char),
                _ => text.push_str(&format!("\n{}\n", value)),
            }
        }
        print!("{}", text);
    } else {
        for value in values {
            println!("{}", value);
        }
    }
}

fn flush_trace(machine: &mut Machine, json: bool) {
    for entry in machine.drain_trace() {
        if json {
            match serde_json::to_string(&entry) {
                Ok(line) => eprintln!("{}", line),
                Err(e) => eprintln!("⚠️  Trace encode failed: {}", e),
            }
        } else {
            eprintln!("{}", entry);
        }
    }
}

fn run_program(args: RunArgs) {
    let program = load_or_exit(&args.program);

    let mut config = load_config(args.config.as_deref());
    if args.strict_memory {
        config.memory_policy = MemoryPolicy::Strict;
    }
    if args.trace {
        config.trace = true;
    }

    let initial = match args.input.as_deref().map(|text| encode_input(text, args.ascii)) {
        Some(Ok(values)) => values,
        Some(Err(e)) => {
            eprintln!("❌ Bad input: {}", e);
            std::process::exit(1);
        }
        None => Vec::new(),
    };

    let mut machine = match Machine::with_config(&program, &initial, config) {
        Ok(machine) => machine,
        Err(e) => {
            eprintln!("❌ Invalid machine configuration: {}", e);
            std::process::exit(1);
        }
    };
    let stdin = std::io::stdin();
    let mut failed = false;

    loop {
        if args.max_steps.is_some_and(|max| machine.steps() >= max) {
            eprintln!("⚠️  Reached max steps limit. Use --max-steps to increase.");
            break;
        }

        let result = match args.max_steps {
            Some(max) => machine.run_limited(&[], max.saturating_sub(machine.steps())),
            None => machine.run(&[]),
        };

        flush_trace(&mut machine, args.json);
        print_output(&machine.drain_output(), args.ascii);

        match result {
            Ok(MachineState::Blocked) if args.interactive => {
                let mut line = String::new();
                match stdin.read_line(&mut line) {
                    Ok(0) => break,
                    Ok(_) => match encode_input(line.trim_end_matches(&['\r', '\n'][..]), args.ascii) {
                        Ok(values) => machine.push_input(&values),
                        Err(e) => eprintln!("⚠️  Ignoring bad input: {}", e),
                    },
                    Err(e) => {
                        eprintln!("❌ Failed to read stdin: {}", e);
                        break;
                    }
                }
            }
            Ok(MachineState::Halted) | Ok(MachineState::Blocked) => break,
            Ok(_) => {
                eprintln!("⚠️  Reached max steps limit. Use --max-steps to increase.");
                break;
            }
            Err(e) => {
                eprintln!("❌ Machine error at PC={}: {}", machine.pc(), e);
                failed = true;
                break;
            }
        }
    }

    eprintln!();
    eprintln!("━━━ Result ━━━");
    eprintln!("Steps: {}", machine.steps());
    eprintln!("State: {:?}", machine.state());
    eprintln!("PC:    {}", machine.pc());
    eprintln!("RB:    {}", machine.relative_base());
    if machine.is_blocked() {
        eprintln!("Waiting for input (use --input or --interactive)");
    }

    if let Some(path) = args.snapshot {
        let written = serde_json::to_string(&machine)
            .map_err(|e| e.to_string())
            .and_then(|json| std::fs::write(&path, json).map_err(|e| e.to_string()));
        match written {
            Ok(()) => eprintln!("✓ Snapshot saved to {}", path),
            Err(e) => {
                eprintln!("❌ Failed to save snapshot: {}", e);
                failed = true;
            }
        }
    }

    if failed {
        std::process::exit(1);
    }
}

#[cfg(feature = "tui")]
fn debug_program(path: &str) {
    use intcode::tui::run_debugger;

    let program = load_or_exit(path);
    println!("🔍 Loaded {} cells", program.len());
    println!("🚀 Launching debugger...");

    if let Err(e) = run_debugger(program) {
        eprintln!("❌ Debugger error: {}", e);
        std::process::exit(1);
    }
}

#[cfg(not(feature = "tui"))]
fn debug_program(_path: &str) {
    eprintln!("❌ Built without the `tui` feature");
    std::process::exit(1);
}

fn disassemble_file(path: &str) {
    let program = load_or_exit(path);
    println!("{}", intcode::disassemble(&program));
}

fn run_self_test() {
    use intcode::MachineError;

    println!("━━━ Intcode VM Self-Test ━━━");
    println!();

    let mut passed = 0;
    let mut failed = 0;
    let mut check = |name: &str, ok: bool| {
        if ok {
            println!("{}... ✓", name);
            passed += 1;
        } else {
            println!("{}... ✗", name);
            failed += 1;
        }
    };

    // Test 1: Positional add writes back into the program
    let mut machine = Machine::new(&[1, 0, 0, 0, 99], &[]);
    let ok = machine.run(&[]).is_ok() && machine.memory().first() == Some(&2);
    check("Positional add", ok);

    // Test 2: Quine
    let quine = [109, 1, 204, -1, 1001, 100, 1, 100, 1008, 100, 16, 101, 1006, 101, 0, 99];
    let mut machine = Machine::new(&quine, &[]);
    let ok = machine.run(&[]).is_ok() && machine.drain_output() == quine;
    check("Self-reproducing program", ok);

    // Test 3: Large multiply
    let mut machine = Machine::new(&[1102, 34915192, 34915192, 7, 4, 7, 99, 0], &[]);
    let ok = machine.run(&[]).is_ok() && machine.drain_output() == [1219070632396864];
    check("64-bit multiply", ok);

    // Test 4: Block, then resume
    let mut machine = Machine::new(&[3, 9, 1001, 9, 10, 9, 4, 9, 99, 0], &[]);
    let blocked = machine.run(&[]) == Ok(MachineState::Blocked) && machine.pc() == 0;
    let resumed = machine.run(&[5]) == Ok(MachineState::Halted) && machine.drain_output() == [15];
    check("Blocking input resumes", blocked && resumed);

    // Test 5: Bad opcode is a value, not a crash
    let mut machine = Machine::new(&[42], &[]);
    let ok = machine.run(&[]).as_ref().is_err_and(MachineError::is_invalid_opcode);
    check("Invalid opcode reported", ok);

    println!();
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    println!("Results: {} passed, {} failed", passed, failed);

    if failed == 0 {
        println!("✓ All tests passed!");
    } else {
        std::process::exit(1);
    }
}
