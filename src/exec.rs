use crate::cpu::{Cpu, Trap};
use crate::decoder::{Decoded, Op};
use crate::memory::{Bus, Width};

pub trait Executor {
    /// Execute `d`, fetched from `pc`. Returns the new PC for a taken
    /// branch or jump, `None` to fall through. Must not touch any register
    /// when it fails.
    fn exec<B: Bus>(&self, cpu: &mut Cpu, bus: &mut B, pc: u32, d: &Decoded) -> Result<Option<u32>, Trap>;
}

fn div(a: u32, b: u32) -> u32 {
    let (a, b) = (a as i32, b as i32);
    if b == 0 {
        u32::MAX
    } else {
        // i32::MIN / -1 wraps back to i32::MIN
        a.wrapping_div(b) as u32
    }
}

fn divu(a: u32, b: u32) -> u32 {
    a.checked_div(b).unwrap_or(u32::MAX)
}

fn rem(a: u32, b: u32) -> u32 {
    let (sa, sb) = (a as i32, b as i32);
    if sb == 0 {
        a
    } else {
        // i32::MIN % -1 wraps to 0
        sa.wrapping_rem(sb) as u32
    }
}

fn remu(a: u32, b: u32) -> u32 {
    a.checked_rem(b).unwrap_or(a)
}

fn mulh(a: u32, b: u32) -> u32 {
    ((a as i32 as i64 * b as i32 as i64) >> 32) as u32
}

fn mulhsu(a: u32, b: u32) -> u32 {
    ((a as i32 as i64 * b as i64) >> 32) as u32
}

fn mulhu(a: u32, b: u32) -> u32 {
    ((a as u64 * b as u64) >> 32) as u32
}

/// Register-register and register-immediate ALU ops, with `b` already chosen.
fn alu(op: Op, a: u32, b: u32) -> Option<u32> {
    let shamt = b & 0x1F;
    let v = match op {
        Op::Add | Op::Addi => a.wrapping_add(b),
        Op::Sub => a.wrapping_sub(b),
        Op::Sll | Op::Slli => a << shamt,
        Op::Slt | Op::Slti => ((a as i32) < (b as i32)) as u32,
        Op::Sltu | Op::Sltiu => (a < b) as u32,
        Op::Xor | Op::Xori => a ^ b,
        Op::Srl | Op::Srli => a >> shamt,
        Op::Sra | Op::Srai => ((a as i32) >> shamt) as u32,
        Op::Or | Op::Ori => a | b,
        Op::And | Op::Andi => a & b,
        Op::Mul => a.wrapping_mul(b),
        Op::Mulh => mulh(a, b),
        Op::Mulhsu => mulhsu(a, b),
        Op::Mulhu => mulhu(a, b),
        Op::Div => div(a, b),
        Op::Divu => divu(a, b),
        Op::Rem => rem(a, b),
        Op::Remu => remu(a, b),
        _ => return None,
    };
    Some(v)
}

fn branch_taken(op: Op, a: u32, b: u32) -> bool {
    match op {
        Op::Beq => a == b,
        Op::Bne => a != b,
        Op::Blt => (a as i32) < (b as i32),
        Op::Bge => (a as i32) >= (b as i32),
        Op::Bltu => a < b,
        Op::Bgeu => a >= b,
        _ => false,
    }
}

/// Control transfers must land on a word boundary.
fn jump(pc: u32, target: u32) -> Result<Option<u32>, Trap> {
    if target % 4 != 0 {
        return Err(Trap::MisalignedJump { pc, target });
    }
    Ok(Some(target))
}

fn load_width(op: Op) -> (Width, bool) {
    match op {
        Op::Lb => (Width::Byte, true),
        Op::Lh => (Width::Half, true),
        Op::Lbu => (Width::Byte, false),
        Op::Lhu => (Width::Half, false),
        _ => (Width::Word, false),
    }
}

fn store_width(op: Op) -> Width {
    match op {
        Op::Sb => Width::Byte,
        Op::Sh => Width::Half,
        _ => Width::Word,
    }
}

/// RV32I base integer set plus the M extension.
#[derive(Debug, Clone, Copy, Default)]
pub struct IntExecutor;

impl Executor for IntExecutor {
    fn exec<B: Bus>(&self, cpu: &mut Cpu, bus: &mut B, pc: u32, d: &Decoded) -> Result<Option<u32>, Trap> {
        let rs1 = cpu.reg(d.rs1);
        let rs2 = cpu.reg(d.rs2);
        let imm = d.imm as u32;

        match d.op {
            Op::Lb | Op::Lh | Op::Lw | Op::Lbu | Op::Lhu => {
                let addr = rs1.wrapping_add(imm);
                let (width, signed) = load_width(d.op);
                let v = bus
                    .read(addr, width, signed)
                    .map_err(|source| Trap::Bus { pc, addr, source })?;
                cpu.set_reg(d.rd, v);
            }
            Op::Sb | Op::Sh | Op::Sw => {
                let addr = rs1.wrapping_add(imm);
                let width = store_width(d.op);
                bus.write(addr, rs2 & width.mask(), width)
                    .map_err(|source| Trap::Bus { pc, addr, source })?;
            }
            Op::Beq | Op::Bne | Op::Blt | Op::Bge | Op::Bltu | Op::Bgeu => {
                if branch_taken(d.op, rs1, rs2) {
                    return jump(pc, pc.wrapping_add(imm));
                }
            }
            Op::Jal => {
                let target = jump(pc, pc.wrapping_add(imm))?;
                cpu.set_reg(d.rd, pc.wrapping_add(4));
                return Ok(target);
            }
            Op::Jalr => {
                // rs1 is read before rd is written, so `jalr ra, 0(ra)` works
                let target = jump(pc, rs1.wrapping_add(imm) & !1)?;
                cpu.set_reg(d.rd, pc.wrapping_add(4));
                return Ok(target);
            }
            Op::Lui => cpu.set_reg(d.rd, imm << 12),
            Op::Auipc => cpu.set_reg(d.rd, pc.wrapping_add(imm << 12)),
            op => {
                let b = match op {
                    Op::Addi | Op::Slti | Op::Sltiu | Op::Xori | Op::Ori | Op::Andi | Op::Slli | Op::Srli | Op::Srai => imm,
                    _ => rs2,
                };
                let v = alu(op, rs1, b).ok_or(Trap::Unimplemented { pc, raw: d.raw })?;
                cpu.set_reg(d.rd, v);
            }
        }
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn division_corner_cases() {
        let min = i32::MIN as u32;
        let neg1 = -1i32 as u32;
        assert_eq!(div(42, 5), 8);
        assert_eq!(div(-7i32 as u32, 2) as i32, -3);
        assert_eq!(div(7, 0), u32::MAX);
        assert_eq!(div(min, neg1), min);
        assert_eq!(divu(7, 0), u32::MAX);
        assert_eq!(divu(neg1, 2), 0x7FFF_FFFF);
        assert_eq!(rem(42, 5), 2);
        assert_eq!(rem(-7i32 as u32, 2) as i32, -1);
        assert_eq!(rem(7, 0), 7);
        assert_eq!(rem(min, neg1), 0);
        assert_eq!(remu(7, 0), 7);
    }

    #[test]
    fn high_multiplies() {
        let neg1 = -1i32 as u32;
        assert_eq!(mulh(neg1, neg1), 0);
        assert_eq!(mulhu(neg1, neg1), 0xFFFF_FFFE);
        assert_eq!(mulhsu(neg1, neg1), 0xFFFF_FFFF);
        assert_eq!(mulh(0x4000_0000, 4), 1);
    }

    #[test]
    fn shifts_use_low_five_bits() {
        assert_eq!(alu(Op::Sll, 1, 33), Some(2));
        assert_eq!(alu(Op::Sra, 0x8000_0000, 31), Some(0xFFFF_FFFF));
        assert_eq!(alu(Op::Srl, 0x8000_0000, 31), Some(1));
        assert_eq!(alu(Op::Sltu, 1, neg(1)), Some(1));
        assert_eq!(alu(Op::Slt, 1, neg(1)), Some(0));
        assert_eq!(alu(Op::Lw, 1, 1), None);
    }

    #[test]
    fn jump_targets_must_be_word_aligned() {
        assert_eq!(jump(8, 16), Ok(Some(16)));
        assert_eq!(jump(8, 10), Err(Trap::MisalignedJump { pc: 8, target: 10 }));
    }

    fn neg(v: i32) -> u32 {
        (-v) as u32
    }
}
