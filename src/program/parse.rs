//! Intcode program text format.
//!
//! A program is a list of integers separated by commas:
//! - whitespace around each integer is ignored
//! - any token that is not an integer is an error, including the empty
//!   token of a blank source

use std::num::ParseIntError;
use std::path::Path;
use thiserror::Error;

/// Parse program text into memory cells.
pub fn parse(source: &str) -> Result<Vec<i64>, ParseError> {
    source
        .split(',')
        .enumerate()
        .map(|(index, token)| {
            let token = token.trim();
            token.parse::<i64>().map_err(|source| ParseError {
                index,
                token: token.to_string(),
                source,
            })
        })
        .collect()
}

/// Render a program in its canonical text form.
pub fn format_program(program: &[i64]) -> String {
    program
        .iter()
        .map(i64::to_string)
        .collect::<Vec<_>>()
        .join(",")
}

/// Load and parse a program file.
pub fn load_program<P: AsRef<Path>>(path: P) -> Result<Vec<i64>, LoadError> {
    let source = std::fs::read_to_string(path.as_ref())
        .map_err(|e| LoadError::Io(e.to_string()))?;
    Ok(parse(&source)?)
}

/// Write a program file in canonical form.
pub fn save_program<P: AsRef<Path>>(path: P, program: &[i64]) -> Result<(), LoadError> {
    let mut text = format_program(program);
    text.push('\n');
    std::fs::write(path.as_ref(), text).map_err(|e| LoadError::Io(e.to_string()))
}

/// A token that is not an integer.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("token {index} ({token:?}) is not an integer: {source}")]
pub struct ParseError {
    pub index: usize,
    pub token: String,
    pub source: ParseIntError,
}

/// Errors that can occur while loading a program.
#[derive(Debug, Clone, Error)]
pub enum LoadError {
    #[error("I/O error: {0}")]
    Io(String),

    #[error("parse error: {0}")]
    Parse(#[from] ParseError),
}
