//! Static description of the supported RV32I/M instructions and registers.
//!
//! This is the single table consumed by the assembler, the disassembler and
//! the simulator's decoder.

use crate::decoder::Op;

/// Bit layout / operand grammar class of an instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    /// `rd, rs1, rs2`
    R,
    /// `rd, rs1, imm` (arithmetic immediates and `jalr`)
    I,
    /// `rd, rs1, shamt`
    IShift,
    /// `rd, imm(rs1)`
    ILoad,
    /// `rs2, imm(rs1)`
    S,
    /// `rs1, rs2, offset|label`
    B,
    /// `rd, imm20`
    U,
    /// `rd, offset|label`
    J,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InstrDesc {
    pub op: Op,
    pub mnemonic: &'static str,
    pub format: Format,
    pub opcode: u8,
    pub funct3: Option<u8>,
    pub funct7: Option<u8>,
}

pub const OPC_LOAD: u8 = 0b000_0011;
pub const OPC_OP_IMM: u8 = 0b001_0011;
pub const OPC_AUIPC: u8 = 0b001_0111;
pub const OPC_STORE: u8 = 0b010_0011;
pub const OPC_OP: u8 = 0b011_0011;
pub const OPC_LUI: u8 = 0b011_0111;
pub const OPC_BRANCH: u8 = 0b110_0011;
pub const OPC_JALR: u8 = 0b110_0111;
pub const OPC_JAL: u8 = 0b110_1111;

const fn desc(
    op: Op,
    mnemonic: &'static str,
    format: Format,
    opcode: u8,
    funct3: Option<u8>,
    funct7: Option<u8>,
) -> InstrDesc {
    InstrDesc { op, mnemonic, format, opcode, funct3, funct7 }
}

const fn r(op: Op, mn: &'static str, f3: u8, f7: u8) -> InstrDesc {
    desc(op, mn, Format::R, OPC_OP, Some(f3), Some(f7))
}

const fn i(op: Op, mn: &'static str, opcode: u8, f3: u8) -> InstrDesc {
    desc(op, mn, Format::I, opcode, Some(f3), None)
}

const fn shift(op: Op, mn: &'static str, f3: u8, f7: u8) -> InstrDesc {
    desc(op, mn, Format::IShift, OPC_OP_IMM, Some(f3), Some(f7))
}

const fn load(op: Op, mn: &'static str, f3: u8) -> InstrDesc {
    desc(op, mn, Format::ILoad, OPC_LOAD, Some(f3), None)
}

const fn store(op: Op, mn: &'static str, f3: u8) -> InstrDesc {
    desc(op, mn, Format::S, OPC_STORE, Some(f3), None)
}

const fn branch(op: Op, mn: &'static str, f3: u8) -> InstrDesc {
    desc(op, mn, Format::B, OPC_BRANCH, Some(f3), None)
}

pub const TABLE: &[InstrDesc] = &[
    r(Op::Add, "add", 0b000, 0b000_0000),
    r(Op::Sub, "sub", 0b000, 0b010_0000),
    r(Op::Sll, "sll", 0b001, 0b000_0000),
    r(Op::Slt, "slt", 0b010, 0b000_0000),
    r(Op::Sltu, "sltu", 0b011, 0b000_0000),
    r(Op::Xor, "xor", 0b100, 0b000_0000),
    r(Op::Srl, "srl", 0b101, 0b000_0000),
    r(Op::Sra, "sra", 0b101, 0b010_0000),
    r(Op::Or, "or", 0b110, 0b000_0000),
    r(Op::And, "and", 0b111, 0b000_0000),
    r(Op::Mul, "mul", 0b000, 0b000_0001),
    r(Op::Mulh, "mulh", 0b001, 0b000_0001),
    r(Op::Mulhsu, "mulhsu", 0b010, 0b000_0001),
    r(Op::Mulhu, "mulhu", 0b011, 0b000_0001),
    r(Op::Div, "div", 0b100, 0b000_0001),
    r(Op::Divu, "divu", 0b101, 0b000_0001),
    r(Op::Rem, "rem", 0b110, 0b000_0001),
    r(Op::Remu, "remu", 0b111, 0b000_0001),
    i(Op::Addi, "addi", OPC_OP_IMM, 0b000),
    i(Op::Slti, "slti", OPC_OP_IMM, 0b010),
    i(Op::Sltiu, "sltiu", OPC_OP_IMM, 0b011),
    i(Op::Xori, "xori", OPC_OP_IMM, 0b100),
    i(Op::Ori, "ori", OPC_OP_IMM, 0b110),
    i(Op::Andi, "andi", OPC_OP_IMM, 0b111),
    shift(Op::Slli, "slli", 0b001, 0b000_0000),
    shift(Op::Srli, "srli", 0b101, 0b000_0000),
    shift(Op::Srai, "srai", 0b101, 0b010_0000),
    load(Op::Lb, "lb", 0b000),
    load(Op::Lh, "lh", 0b001),
    load(Op::Lw, "lw", 0b010),
    load(Op::Lbu, "lbu", 0b100),
    load(Op::Lhu, "lhu", 0b101),
    i(Op::Jalr, "jalr", OPC_JALR, 0b000),
    store(Op::Sb, "sb", 0b000),
    store(Op::Sh, "sh", 0b001),
    store(Op::Sw, "sw", 0b010),
    branch(Op::Beq, "beq", 0b000),
    branch(Op::Bne, "bne", 0b001),
    branch(Op::Blt, "blt", 0b100),
    branch(Op::Bge, "bge", 0b101),
    branch(Op::Bltu, "bltu", 0b110),
    branch(Op::Bgeu, "bgeu", 0b111),
    desc(Op::Lui, "lui", Format::U, OPC_LUI, None, None),
    desc(Op::Auipc, "auipc", Format::U, OPC_AUIPC, None, None),
    desc(Op::Jal, "jal", Format::J, OPC_JAL, None, None),
];

/// Case-insensitive mnemonic lookup.
pub fn by_mnemonic(mnemonic: &str) -> Option<&'static InstrDesc> {
    TABLE.iter().find(|d| d.mnemonic.eq_ignore_ascii_case(mnemonic))
}

pub fn by_op(op: Op) -> Option<&'static InstrDesc> {
    TABLE.iter().find(|d| d.op == op)
}

/// Reverse lookup: the exact (opcode, funct3, funct7) triple first, then
/// with funct7 wildcarded, then with both funct fields wildcarded.
pub fn lookup(opcode: u8, funct3: u8, funct7: u8) -> Option<&'static InstrDesc> {
    TABLE
        .iter()
        .find(|d| d.opcode == opcode && d.funct3 == Some(funct3) && d.funct7 == Some(funct7))
        .or_else(|| {
            TABLE
                .iter()
                .find(|d| d.opcode == opcode && d.funct3 == Some(funct3) && d.funct7.is_none())
        })
        .or_else(|| {
            TABLE
                .iter()
                .find(|d| d.opcode == opcode && d.funct3.is_none() && d.funct7.is_none())
        })
}

pub fn is_known_opcode(opcode: u8) -> bool {
    TABLE.iter().any(|d| d.opcode == opcode)
}

/// Canonical ABI names, indexed by register number.
pub const ABI_NAMES: [&str; 32] = [
    "zero", "ra", "sp", "gp", "tp", "t0", "t1", "t2", "s0", "s1", "a0", "a1", "a2", "a3", "a4",
    "a5", "a6", "a7", "s2", "s3", "s4", "s5", "s6", "s7", "s8", "s9", "s10", "s11", "t3", "t4",
    "t5", "t6",
];

pub const REG_SP: u8 = 2;

/// Resolve `x0..x31`, ABI names and `fp` (case-insensitive).
pub fn parse_register(name: &str) -> Option<u8> {
    let name = name.trim();
    if let Some(num) = name.strip_prefix('x').or_else(|| name.strip_prefix('X')) {
        if !num.is_empty() && num.bytes().all(|b| b.is_ascii_digit()) {
            return num.parse::<u8>().ok().filter(|&n| n < 32);
        }
    }
    if name.eq_ignore_ascii_case("fp") {
        return Some(8);
    }
    ABI_NAMES
        .iter()
        .position(|abi| abi.eq_ignore_ascii_case(name))
        .map(|idx| idx as u8)
}

pub fn reg_name(idx: u8) -> &'static str {
    ABI_NAMES[(idx & 0x1F) as usize]
}
