//! Two-pass assembler.
//!
//! Pass 1 walks the source and assigns every label the byte address of the
//! next instruction. Pass 2 parses each instruction against the operand
//! grammar of its format, resolves label targets into `target - pc` offsets
//! and hands the result to the codec. Errors are collected per line; a
//! source with any error yields no program.

use std::collections::HashMap;
use std::fmt;

use serde::Serialize;
use tracing::debug;

use crate::codec::{self, EncodeError, Operand};
use crate::decoder::Op;
use crate::instructions::{self, Format, InstrDesc};
use crate::loader;

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum AsmError {
    #[error("unknown mnemonic '{0}'")]
    UnknownMnemonic(String),
    #[error("invalid register '{0}'")]
    InvalidRegister(String),
    #[error("undefined label '{0}'")]
    UnresolvedLabel(String),
    #[error("label '{name}' already defined at {addr:#010x}")]
    DuplicateLabel { name: String, addr: u32 },
    #[error("malformed operands for '{mnemonic}', expected `{expected}`")]
    BadOperands {
        mnemonic: &'static str,
        expected: &'static str,
    },
    #[error("invalid immediate '{0}'")]
    BadImmediate(String),
    #[error(transparent)]
    Encode(#[from] EncodeError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineError {
    /// 1-based source line.
    pub line: usize,
    pub error: AsmError,
}

impl fmt::Display for LineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "line {}: {}", self.line, self.error)
    }
}

/// Every error found in one assembly run, in source order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AsmErrors(pub Vec<LineError>);

impl AsmErrors {
    pub fn lines(&self) -> impl Iterator<Item = usize> + '_ {
        self.0.iter().map(|e| e.line)
    }
}

impl fmt::Display for AsmErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, e) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str("\n")?;
            }
            write!(f, "{e}")?;
        }
        Ok(())
    }
}

impl std::error::Error for AsmErrors {}

/// Label name to absolute byte address. Names compare case-insensitively.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SymbolTable {
    map: HashMap<String, u32>,
}

impl SymbolTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the existing address if `name` is already defined.
    pub fn insert(&mut self, name: &str, addr: u32) -> Result<(), u32> {
        let key = name.to_ascii_lowercase();
        if let Some(&prev) = self.map.get(&key) {
            return Err(prev);
        }
        self.map.insert(key, addr);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<u32> {
        self.map.get(&name.to_ascii_lowercase()).copied()
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// Entries sorted by address, then name.
    pub fn sorted(&self) -> Vec<(&str, u32)> {
        let mut v: Vec<_> = self.map.iter().map(|(k, &a)| (k.as_str(), a)).collect();
        v.sort_by(|a, b| a.1.cmp(&b.1).then(a.0.cmp(b.0)));
        v
    }
}

/// Assembled output: one word per instruction line.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Program {
    pub words: Vec<u32>,
    /// `line_map[i]` is the 1-based source line that produced `words[i]`.
    pub line_map: Vec<usize>,
    pub symbols: SymbolTable,
}

impl Program {
    /// 32-character `0`/`1` strings, MSB first.
    pub fn to_bin_strings(&self) -> Vec<String> {
        self.words.iter().map(|&w| loader::to_bin_string(w)).collect()
    }

    pub fn to_le_bytes(&self) -> Vec<u8> {
        self.words.iter().flat_map(|w| w.to_le_bytes()).collect()
    }
}

/// One non-blank source line after comment stripping.
struct SourceLine<'a> {
    line: usize,
    label: Option<&'a str>,
    instr: Option<&'a str>,
}

fn strip_comment(line: &str) -> &str {
    let cut = [line.find('#'), line.find("//")].into_iter().flatten().min();
    match cut {
        Some(p) => &line[..p],
        None => line,
    }
}

fn is_ident(s: &str) -> bool {
    let mut chars = s.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

fn split_line(line: usize, raw: &str) -> Option<SourceLine<'_>> {
    let s = strip_comment(raw).trim();
    if s.is_empty() {
        return None;
    }
    let (label, rest) = match s.split_once(':') {
        Some((head, tail)) if is_ident(head.trim()) => (Some(head.trim()), tail.trim()),
        _ => (None, s),
    };
    let instr = (!rest.is_empty()).then_some(rest);
    Some(SourceLine { line, label, instr })
}

/// Decimal or `0x` hex, with an optional sign.
pub fn parse_imm(s: &str) -> Option<i64> {
    let t = s.trim();
    let (neg, t) = match t.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, t.strip_prefix('+').unwrap_or(t)),
    };
    let v = if let Some(hex) = t.strip_prefix("0x").or_else(|| t.strip_prefix("0X")) {
        i64::from_str_radix(hex, 16).ok()?
    } else if !t.is_empty() && t.bytes().all(|b| b.is_ascii_digit()) {
        t.parse::<i64>().ok()?
    } else {
        return None;
    };
    Some(if neg { -v } else { v })
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Assembler {
    /// Address of the first instruction.
    pub origin: u32,
}

impl Assembler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_origin(origin: u32) -> Self {
        Self { origin }
    }

    /// Pass 1: label addresses, plus duplicate-label errors.
    pub fn collect_symbols(&self, source: &str) -> (SymbolTable, Vec<LineError>) {
        let mut symbols = SymbolTable::new();
        let mut errors = Vec::new();
        let mut addr = self.origin;
        for sl in source.lines().enumerate().filter_map(|(i, l)| split_line(i + 1, l)) {
            if let Some(name) = sl.label {
                if let Err(prev) = symbols.insert(name, addr) {
                    errors.push(LineError {
                        line: sl.line,
                        error: AsmError::DuplicateLabel { name: name.to_string(), addr: prev },
                    });
                }
            }
            if sl.instr.is_some() {
                addr = addr.wrapping_add(4);
            }
        }
        debug!(labels = symbols.len(), end = addr, "asm pass 1");
        (symbols, errors)
    }

    pub fn assemble(&self, source: &str) -> Result<Program, AsmErrors> {
        let (symbols, mut errors) = self.collect_symbols(source);

        let mut words = Vec::new();
        let mut line_map = Vec::new();
        let mut addr = self.origin;
        for sl in source.lines().enumerate().filter_map(|(i, l)| split_line(i + 1, l)) {
            let Some(text) = sl.instr else { continue };
            match encode_line(text, addr, &symbols) {
                Ok(word) => {
                    words.push(word);
                    line_map.push(sl.line);
                }
                Err(error) => errors.push(LineError { line: sl.line, error }),
            }
            addr = addr.wrapping_add(4);
        }
        debug!(words = words.len(), errors = errors.len(), "asm pass 2");

        if errors.is_empty() {
            Ok(Program { words, line_map, symbols })
        } else {
            errors.sort_by_key(|e| e.line);
            Err(AsmErrors(errors))
        }
    }
}

/// Assemble `source` at origin 0.
pub fn assemble(source: &str) -> Result<Program, AsmErrors> {
    Assembler::new().assemble(source)
}

fn encode_line(text: &str, pc: u32, symbols: &SymbolTable) -> Result<u32, AsmError> {
    let (mnemonic, rest) = match text.split_once(char::is_whitespace) {
        Some((m, r)) => (m, r.trim()),
        None => (text, ""),
    };
    let desc = instructions::by_mnemonic(mnemonic)
        .ok_or_else(|| AsmError::UnknownMnemonic(mnemonic.to_string()))?;
    let ops = parse_operands(desc, rest, pc, symbols)?;
    Ok(codec::encode_desc(desc, &ops)?)
}

fn parse_operands(
    desc: &'static InstrDesc,
    rest: &str,
    pc: u32,
    symbols: &SymbolTable,
) -> Result<Vec<Operand>, AsmError> {
    let bad = || AsmError::BadOperands {
        mnemonic: desc.mnemonic,
        expected: codec::syntax(desc.format),
    };
    let parts: Vec<&str> = if rest.is_empty() {
        Vec::new()
    } else {
        rest.split(',').map(str::trim).collect()
    };

    let ops = match (desc.format, parts.as_slice()) {
        (Format::R, &[rd, rs1, rs2]) => vec![reg(rd)?, reg(rs1)?, reg(rs2)?],
        (Format::I | Format::IShift, &[rd, rs1, i]) => vec![reg(rd)?, reg(rs1)?, imm(i)?],
        // jalr rd, imm(rs1)
        (Format::I, &[rd, m]) if desc.op == Op::Jalr => {
            let (i, rs1) = mem(m).ok_or_else(bad)?;
            vec![reg(rd)?, reg(rs1)?, imm(i)?]
        }
        (Format::ILoad | Format::S, &[r, m]) => {
            let (i, base) = mem(m).ok_or_else(bad)?;
            vec![reg(r)?, imm(i)?, reg(base)?]
        }
        (Format::B, &[rs1, rs2, t]) => vec![reg(rs1)?, reg(rs2)?, target(t, pc, symbols)?],
        (Format::U, &[rd, i]) => vec![reg(rd)?, imm(i)?],
        (Format::J, &[rd, t]) => vec![reg(rd)?, target(t, pc, symbols)?],
        _ => return Err(bad()),
    };
    Ok(ops)
}

fn reg(s: &str) -> Result<Operand, AsmError> {
    instructions::parse_register(s)
        .map(Operand::Reg)
        .ok_or_else(|| AsmError::InvalidRegister(s.to_string()))
}

fn imm(s: &str) -> Result<Operand, AsmError> {
    parse_imm(s)
        .and_then(|v| i32::try_from(v).ok())
        .map(Operand::Imm)
        .ok_or_else(|| AsmError::BadImmediate(s.to_string()))
}

/// `imm(reg)` split into its two halves.
fn mem(s: &str) -> Option<(&str, &str)> {
    let (i, tail) = s.split_once('(')?;
    let base = tail.strip_suffix(')')?;
    // `(rs1)` means a zero displacement
    let i = match i.trim() {
        "" => "0",
        i => i,
    };
    Some((i, base.trim()))
}

/// A numeric target is already a relative offset; a label becomes
/// `label_address - pc`.
fn target(s: &str, pc: u32, symbols: &SymbolTable) -> Result<Operand, AsmError> {
    if parse_imm(s).is_some() {
        return imm(s);
    }
    if !is_ident(s) {
        return Err(AsmError::BadImmediate(s.to_string()));
    }
    let addr = symbols
        .get(s)
        .ok_or_else(|| AsmError::UnresolvedLabel(s.to_string()))?;
    let off = addr as i64 - pc as i64;
    i32::try_from(off)
        .map(Operand::Imm)
        .map_err(|_| AsmError::BadImmediate(s.to_string()))
}
