use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Op {
    // RV32I register-register
    Add,
    Sub,
    Sll,
    Slt,
    Sltu,
    Xor,
    Srl,
    Sra,
    Or,
    And,
    // RV32M
    Mul,
    Mulh,
    Mulhsu,
    Mulhu,
    Div,
    Divu,
    Rem,
    Remu,
    // register-immediate
    Addi,
    Slti,
    Sltiu,
    Xori,
    Ori,
    Andi,
    Slli,
    Srli,
    Srai,
    // loads / stores
    Lb,
    Lh,
    Lw,
    Lbu,
    Lhu,
    Sb,
    Sh,
    Sw,
    // control flow
    Beq,
    Bne,
    Blt,
    Bge,
    Bltu,
    Bgeu,
    Jal,
    Jalr,
    // upper immediates
    Lui,
    Auipc,
}

/// Coarse grouping used for statistics and for gating the M extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OpClass {
    Alu,
    Mul,
    Div,
    Load,
    Store,
    Branch,
    Jump,
    Upper,
}

impl Op {
    pub fn class(self) -> OpClass {
        use Op::*;
        match self {
            Mul | Mulh | Mulhsu | Mulhu => OpClass::Mul,
            Div | Divu | Rem | Remu => OpClass::Div,
            Lb | Lh | Lw | Lbu | Lhu => OpClass::Load,
            Sb | Sh | Sw => OpClass::Store,
            Beq | Bne | Blt | Bge | Bltu | Bgeu => OpClass::Branch,
            Jal | Jalr => OpClass::Jump,
            Lui | Auipc => OpClass::Upper,
            _ => OpClass::Alu,
        }
    }

    pub fn is_m_extension(self) -> bool {
        matches!(self.class(), OpClass::Mul | OpClass::Div)
    }
}

/// A machine word split into its fields, with the immediate already
/// reassembled and sign-extended for the instruction's format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Decoded {
    pub op: Op,
    pub raw: u32,
    pub rd: u8,
    pub rs1: u8,
    pub rs2: u8,
    pub imm: i32,
}

#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeError {
    #[error("unknown instruction (opcode:{opcode:07b}, funct3:{funct3:03b}, funct7:{funct7:07b})")]
    UnknownOpcode { opcode: u8, funct3: u8, funct7: u8 },
    #[error("unimplemented instruction (opcode:{opcode:07b}, funct3:{funct3:03b}, funct7:{funct7:07b})")]
    Unimplemented { opcode: u8, funct3: u8, funct7: u8 },
}

pub trait Decoder {
    fn decode(&self, raw32: u32) -> Result<Decoded, DecodeError>;
}
