use crate::decoder::{DecodeError, Decoded, Decoder};
use crate::instructions::{self, Format};

#[inline]
pub fn sign_ext(v: u32, bits: u32) -> i32 {
    let s = 32 - bits;
    ((v << s) as i32) >> s
}

#[inline]
pub fn opcode(raw: u32) -> u8 {
    (raw & 0x7F) as u8
}
#[inline]
pub fn rd(raw: u32) -> u8 {
    ((raw >> 7) & 0x1F) as u8
}
#[inline]
pub fn funct3(raw: u32) -> u8 {
    ((raw >> 12) & 0x7) as u8
}
#[inline]
pub fn rs1(raw: u32) -> u8 {
    ((raw >> 15) & 0x1F) as u8
}
#[inline]
pub fn rs2(raw: u32) -> u8 {
    ((raw >> 20) & 0x1F) as u8
}
#[inline]
pub fn funct7(raw: u32) -> u8 {
    ((raw >> 25) & 0x7F) as u8
}

/// imm[11:0] at bits 31..20
pub fn imm_i(raw: u32) -> i32 {
    sign_ext(raw >> 20, 12)
}

/// imm[11:5] at 31..25, imm[4:0] at 11..7
pub fn imm_s(raw: u32) -> i32 {
    let hi = (raw >> 25) & 0x7F;
    let lo = (raw >> 7) & 0x1F;
    sign_ext((hi << 5) | lo, 12)
}

/// imm[12|10:5] at 31..25, imm[4:1|11] at 11..7
pub fn imm_b(raw: u32) -> i32 {
    let b12 = (raw >> 31) & 0x1;
    let b10_5 = (raw >> 25) & 0x3F;
    let b4_1 = (raw >> 8) & 0xF;
    let b11 = (raw >> 7) & 0x1;
    sign_ext((b12 << 12) | (b11 << 11) | (b10_5 << 5) | (b4_1 << 1), 13)
}

/// The 20-bit field at 31..12, unshifted.
pub fn imm_u(raw: u32) -> i32 {
    (raw >> 12) as i32
}

/// imm[20|10:1|11|19:12] at 31..12
pub fn imm_j(raw: u32) -> i32 {
    let b20 = (raw >> 31) & 0x1;
    let b10_1 = (raw >> 21) & 0x3FF;
    let b11 = (raw >> 20) & 0x1;
    let b19_12 = (raw >> 12) & 0xFF;
    sign_ext((b20 << 20) | (b19_12 << 12) | (b11 << 11) | (b10_1 << 1), 21)
}

/// RV32IM decoder backed by the shared instruction table.
#[derive(Debug, Default, Clone, Copy)]
pub struct Rv32Decoder;

impl Rv32Decoder {
    pub fn new() -> Self {
        Self
    }
}

impl Decoder for Rv32Decoder {
    fn decode(&self, raw32: u32) -> Result<Decoded, DecodeError> {
        let (op7, f3, f7) = (opcode(raw32), funct3(raw32), funct7(raw32));
        let Some(desc) = instructions::lookup(op7, f3, f7) else {
            return Err(if instructions::is_known_opcode(op7) {
                DecodeError::Unimplemented { opcode: op7, funct3: f3, funct7: f7 }
            } else {
                DecodeError::UnknownOpcode { opcode: op7, funct3: f3, funct7: f7 }
            });
        };

        let mut d = Decoded { op: desc.op, raw: raw32, rd: 0, rs1: 0, rs2: 0, imm: 0 };
        match desc.format {
            Format::R => {
                d.rd = rd(raw32);
                d.rs1 = rs1(raw32);
                d.rs2 = rs2(raw32);
            }
            Format::I | Format::ILoad => {
                d.rd = rd(raw32);
                d.rs1 = rs1(raw32);
                d.imm = imm_i(raw32);
            }
            Format::IShift => {
                d.rd = rd(raw32);
                d.rs1 = rs1(raw32);
                d.imm = rs2(raw32) as i32; // shamt
            }
            Format::S => {
                d.rs1 = rs1(raw32);
                d.rs2 = rs2(raw32);
                d.imm = imm_s(raw32);
            }
            Format::B => {
                d.rs1 = rs1(raw32);
                d.rs2 = rs2(raw32);
                d.imm = imm_b(raw32);
            }
            Format::U => {
                d.rd = rd(raw32);
                d.imm = imm_u(raw32);
            }
            Format::J => {
                d.rd = rd(raw32);
                d.imm = imm_j(raw32);
            }
        }
        Ok(d)
    }
}
