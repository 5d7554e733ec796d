//! Bit-exact encoder/decoder for the seven RV32 instruction formats.
//!
//! Operands are kept in a canonical order per format:
//!
//! | format  | operands             |
//! |---------|----------------------|
//! | R       | rd, rs1, rs2         |
//! | I       | rd, rs1, imm         |
//! | IShift  | rd, rs1, shamt       |
//! | ILoad   | rd, imm, rs1         |
//! | S       | rs2, imm, rs1        |
//! | B       | rs1, rs2, offset     |
//! | U       | rd, imm20            |
//! | J       | rd, offset           |

use std::fmt;

use serde::Serialize;

use crate::decoder::{DecodeError, Decoded, Decoder};
use crate::instructions::{self, Format, InstrDesc};
use crate::isa::rv32im::Rv32Decoder;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Operand {
    Reg(u8),
    Imm(i32),
}

impl fmt::Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operand::Reg(r) => f.write_str(instructions::reg_name(*r)),
            Operand::Imm(v) => write!(f, "{v}"),
        }
    }
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum EncodeError {
    #[error("unknown mnemonic '{0}'")]
    UnknownMnemonic(String),
    #[error("invalid register x{0}")]
    InvalidRegister(u8),
    #[error("'{mnemonic}' expects operands {expected}")]
    OperandMismatch {
        mnemonic: &'static str,
        expected: &'static str,
    },
    #[error("immediate {value} out of range {min}..={max}")]
    ImmediateOutOfRange { value: i64, min: i64, max: i64 },
    #[error("branch/jump offset {0} is not a multiple of 2")]
    MisalignedOffset(i64),
}

/// A decoded instruction: its table row plus operands in canonical order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Instruction {
    pub desc: &'static InstrDesc,
    pub operands: Vec<Operand>,
}

impl Instruction {
    pub fn mnemonic(&self) -> &'static str {
        self.desc.mnemonic
    }

    /// Re-encode; a decoded instruction always gives back its own word.
    pub fn encode(&self) -> Result<u32, EncodeError> {
        encode_desc(self.desc, &self.operands)
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let ops = &self.operands;
        let mn = self.desc.mnemonic;
        match (self.desc.format, ops.as_slice()) {
            // jalr reads best in the load-style form
            (Format::I, [rd, rs1, imm]) if mn == "jalr" => write!(f, "{mn} {rd}, {imm}({rs1})"),
            (Format::ILoad | Format::S, [r, imm, base]) => write!(f, "{mn} {r}, {imm}({base})"),
            _ => {
                f.write_str(mn)?;
                for (i, op) in ops.iter().enumerate() {
                    f.write_str(if i == 0 { " " } else { ", " })?;
                    write!(f, "{op}")?;
                }
                Ok(())
            }
        }
    }
}

/// Inclusive immediate range accepted by a format, or `None` when it has no
/// immediate.
pub fn imm_range(format: Format) -> Option<(i64, i64)> {
    match format {
        Format::R => None,
        Format::I | Format::ILoad | Format::S => Some((-2048, 2047)),
        Format::IShift => Some((0, 31)),
        Format::B => Some((-4096, 4094)),
        // negative values are the same 20-bit field written signed
        Format::U => Some((-0x8_0000, 0xF_FFFF)),
        Format::J => Some((-1_048_576, 1_048_574)),
    }
}

/// Operand syntax of a format, as written in assembly source.
pub fn syntax(format: Format) -> &'static str {
    match format {
        Format::R => "rd, rs1, rs2",
        Format::I => "rd, rs1, imm",
        Format::IShift => "rd, rs1, shamt",
        Format::ILoad => "rd, imm(rs1)",
        Format::S => "rs2, imm(rs1)",
        Format::B => "rs1, rs2, offset",
        Format::U => "rd, imm20",
        Format::J => "rd, offset",
    }
}

fn reg(op: Operand) -> Result<u32, Option<EncodeError>> {
    match op {
        Operand::Reg(r) if r < 32 => Ok(r as u32),
        Operand::Reg(r) => Err(Some(EncodeError::InvalidRegister(r))),
        Operand::Imm(_) => Err(None),
    }
}

fn imm(op: Operand, format: Format) -> Result<i32, Option<EncodeError>> {
    let Operand::Imm(v) = op else {
        return Err(None);
    };
    if let Some((min, max)) = imm_range(format) {
        let wide = v as i64;
        if matches!(format, Format::B | Format::J) && wide % 2 != 0 {
            return Err(Some(EncodeError::MisalignedOffset(wide)));
        }
        if wide < min || wide > max {
            return Err(Some(EncodeError::ImmediateOutOfRange { value: wide, min, max }));
        }
    }
    Ok(v)
}

/// Encode `mnemonic` with operands in canonical order.
pub fn encode(mnemonic: &str, operands: &[Operand]) -> Result<u32, EncodeError> {
    let desc = instructions::by_mnemonic(mnemonic)
        .ok_or_else(|| EncodeError::UnknownMnemonic(mnemonic.to_string()))?;
    encode_desc(desc, operands)
}

pub fn encode_desc(desc: &InstrDesc, operands: &[Operand]) -> Result<u32, EncodeError> {
    let mismatch = || EncodeError::OperandMismatch {
        mnemonic: desc.mnemonic,
        expected: syntax(desc.format),
    };
    let lift = |e: Option<EncodeError>| e.unwrap_or_else(mismatch);

    let opcode = desc.opcode as u32;
    let f3 = desc.funct3.unwrap_or(0) as u32;
    let f7 = desc.funct7.unwrap_or(0) as u32;
    let fmt = desc.format;

    let word = match (fmt, operands) {
        (Format::R, &[rd, rs1, rs2]) => {
            let (rd, rs1, rs2) = (reg(rd).map_err(lift)?, reg(rs1).map_err(lift)?, reg(rs2).map_err(lift)?);
            (f7 << 25) | (rs2 << 20) | (rs1 << 15) | (f3 << 12) | (rd << 7) | opcode
        }
        (Format::I, &[rd, rs1, i]) | (Format::ILoad, &[rd, i, rs1]) => {
            let (rd, rs1, i) = (reg(rd).map_err(lift)?, reg(rs1).map_err(lift)?, imm(i, fmt).map_err(lift)?);
            (((i as u32) & 0xFFF) << 20) | (rs1 << 15) | (f3 << 12) | (rd << 7) | opcode
        }
        (Format::IShift, &[rd, rs1, sh]) => {
            let (rd, rs1, sh) = (reg(rd).map_err(lift)?, reg(rs1).map_err(lift)?, imm(sh, fmt).map_err(lift)?);
            (f7 << 25) | ((sh as u32) << 20) | (rs1 << 15) | (f3 << 12) | (rd << 7) | opcode
        }
        (Format::S, &[rs2, i, rs1]) => {
            let (rs2, rs1, i) = (reg(rs2).map_err(lift)?, reg(rs1).map_err(lift)?, imm(i, fmt).map_err(lift)?);
            let i = i as u32;
            (((i >> 5) & 0x7F) << 25) | (rs2 << 20) | (rs1 << 15) | (f3 << 12) | ((i & 0x1F) << 7) | opcode
        }
        (Format::B, &[rs1, rs2, off]) => {
            let (rs1, rs2, off) = (reg(rs1).map_err(lift)?, reg(rs2).map_err(lift)?, imm(off, fmt).map_err(lift)?);
            let o = off as u32;
            (((o >> 12) & 0x1) << 31)
                | (((o >> 5) & 0x3F) << 25)
                | (rs2 << 20)
                | (rs1 << 15)
                | (f3 << 12)
                | (((o >> 1) & 0xF) << 8)
                | (((o >> 11) & 0x1) << 7)
                | opcode
        }
        (Format::U, &[rd, i]) => {
            let (rd, i) = (reg(rd).map_err(lift)?, imm(i, fmt).map_err(lift)?);
            (((i as u32) & 0xF_FFFF) << 12) | (rd << 7) | opcode
        }
        (Format::J, &[rd, off]) => {
            let (rd, off) = (reg(rd).map_err(lift)?, imm(off, fmt).map_err(lift)?);
            let o = off as u32;
            (((o >> 20) & 0x1) << 31)
                | (((o >> 1) & 0x3FF) << 21)
                | (((o >> 11) & 0x1) << 20)
                | (((o >> 12) & 0xFF) << 12)
                | (rd << 7)
                | opcode
        }
        _ => return Err(mismatch()),
    };
    Ok(word)
}

/// Decode a machine word into its mnemonic and canonical operand list.
pub fn decode(word: u32) -> Result<Instruction, DecodeError> {
    let d = Rv32Decoder::new().decode(word)?;
    from_decoded(&d).ok_or(DecodeError::Unimplemented {
        opcode: (word & 0x7F) as u8,
        funct3: ((word >> 12) & 0x7) as u8,
        funct7: (word >> 25) as u8,
    })
}

/// Rebuild the canonical operand list from engine-side fields.
pub fn from_decoded(d: &Decoded) -> Option<Instruction> {
    use Operand::{Imm, Reg};
    let desc = instructions::by_op(d.op)?;
    let operands = match desc.format {
        Format::R => vec![Reg(d.rd), Reg(d.rs1), Reg(d.rs2)],
        Format::I | Format::IShift => vec![Reg(d.rd), Reg(d.rs1), Imm(d.imm)],
        Format::ILoad => vec![Reg(d.rd), Imm(d.imm), Reg(d.rs1)],
        Format::S => vec![Reg(d.rs2), Imm(d.imm), Reg(d.rs1)],
        Format::B => vec![Reg(d.rs1), Reg(d.rs2), Imm(d.imm)],
        Format::U | Format::J => vec![Reg(d.rd), Imm(d.imm)],
    };
    Some(Instruction { desc, operands })
}
