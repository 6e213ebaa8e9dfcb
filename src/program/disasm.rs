//! Disassembler for Intcode programs.
//!
//! Intcode does not separate code from data, so the listing is a linear
//! sweep from address 0: anything that does not decode is shown as data.

use crate::machine::decode::{decode, Instruction, ParamMode};

/// One line of a disassembly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Line {
    pub address: usize,
    pub text: String,
    /// Number of cells the line covers.
    pub width: usize,
}

/// Disassemble the instruction at `address`.
///
/// Returns `DATA` for undecodable words and for instructions whose
/// parameters run past the end of `program`.
pub fn disassemble_at(program: &[i64], address: usize) -> Line {
    let word = program.get(address).copied().unwrap_or_default();
    match decode(word) {
        Ok(instr) if address + instr.width() <= program.len() => Line {
            address,
            text: format_instruction(&instr, &program[address + 1..address + instr.width()]),
            width: instr.width(),
        },
        _ => Line {
            address,
            text: format!("DATA {}", word),
            width: 1,
        },
    }
}

/// Disassemble a whole program into lines.
pub fn disassemble_lines(program: &[i64]) -> Vec<Line> {
    let mut lines = Vec::new();
    let mut address = 0;
    while address < program.len() {
        let line = disassemble_at(program, address);
        address += line.width;
        lines.push(line);
    }
    lines
}

/// Disassemble a program to text.
pub fn disassemble(program: &[i64]) -> String {
    let mut output = String::new();
    output.push_str("; Intcode Disassembly\n");
    output.push_str("; -------------------\n\n");

    for line in disassemble_lines(program) {
        let cells = &program[line.address..line.address + line.width];
        let raw = cells.iter().map(i64::to_string).collect::<Vec<_>>().join(",");
        output.push_str(&format!("{:04}: {:<28} ; {}\n", line.address, line.text, raw));
    }

    output
}

/// Format a decoded instruction as assembly text.
fn format_instruction(instr: &Instruction, params: &[i64]) -> String {
    let operands: Vec<String> = instr
        .param_modes()
        .iter()
        .zip(params)
        .map(|(&mode, &raw)| format_operand(raw, mode))
        .collect();

    if operands.is_empty() {
        instr.opcode.mnemonic().to_string()
    } else {
        format!("{} {}", instr.opcode.mnemonic(), operands.join(", "))
    }
}

/// Format a parameter with its addressing mode.
fn format_operand(raw: i64, mode: ParamMode) -> String {
    match mode {
        ParamMode::Position => format!("[{}]", raw),
        ParamMode::Immediate => format!("{}", raw),
        ParamMode::Relative if raw < 0 => format!("[rb{}]", raw),
        ParamMode::Relative => format!("[rb+{}]", raw),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_disassemble_add() {
        let line = disassemble_at(&[1001, 4, 3, 4, 33], 0);
        assert_eq!(line.text, "ADD [4], 3, [4]");
        assert_eq!(line.width, 4);
    }

    #[test]
    fn test_disassemble_relative() {
        let line = disassemble_at(&[204, -1], 0);
        assert_eq!(line.text, "OUT [rb-1]");

        let line = disassemble_at(&[22201, 1, 2, 3], 0);
        assert_eq!(line.text, "ADD [rb+1], [rb+2], [rb+3]");
    }

    #[test]
    fn test_data_words() {
        // 33 is not an opcode; a truncated ADD is not an instruction either
        let lines = disassemble_lines(&[99, 33, 1, 0]);
        let texts: Vec<_> = lines.iter().map(|l| l.text.as_str()).collect();
        assert_eq!(texts, vec!["HALT", "DATA 33", "DATA 1", "DATA 0"]);
    }

    #[test]
    fn test_listing_covers_program() {
        let program = [109, 1, 204, -1, 1001, 100, 1, 100, 1008, 100, 16, 101, 1006, 101, 0, 99];
        let lines = disassemble_lines(&program);

        assert_eq!(lines.iter().map(|l| l.width).sum::<usize>(), program.len());
        assert_eq!(lines[0].text, "ARB 1");
        assert_eq!(lines.last().map(|l| l.text.as_str()), Some("HALT"));

        let listing = disassemble(&program);
        assert!(listing.contains("0002: OUT [rb-1]"));
        assert!(listing.contains("JZ [101], 0"));
    }
}
