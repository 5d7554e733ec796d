use crate::codec;
use crate::decoder::Decoded;
use crate::isa::rv32im::{funct3, funct7, opcode};

/// Readable stand-in for a word that does not decode.
pub fn unknown(word: u32) -> String {
    format!(
        "unknown instruction (opcode:{:07b}, funct3:{:03b}, funct7:{:07b})",
        opcode(word),
        funct3(word),
        funct7(word)
    )
}

/// Disassemble one word. Never fails.
pub fn disassemble(word: u32) -> String {
    match codec::decode(word) {
        Ok(ins) => ins.to_string(),
        Err(_) => unknown(word),
    }
}

pub fn fmt_decoded(d: &Decoded) -> String {
    codec::from_decoded(d)
        .map(|ins| ins.to_string())
        .unwrap_or_else(|| unknown(d.raw))
}
