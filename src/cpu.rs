use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::decoder::{DecodeError, Decoder, Op, OpClass};
use crate::disasm;
use crate::exec::Executor;
use crate::instructions::REG_SP;
use crate::memory::{Bus, BusFault};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CpuConfig {
    /// Execute mul/div/rem; when off they fault as unimplemented.
    pub m_extension: bool,
    /// Treat an all-zero word as the end of the program.
    pub halt_on_zero: bool,
}

impl Default for CpuConfig {
    fn default() -> Self {
        Self {
            m_extension: true,
            halt_on_zero: true,
        }
    }
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum Trap {
    #[error("instruction fetch at {pc:#010x} failed: {source}")]
    Fetch {
        pc: u32,
        #[source]
        source: BusFault,
    },
    #[error("instruction fetch at misaligned pc {pc:#010x}")]
    MisalignedFetch { pc: u32 },
    #[error("jump at {pc:#010x} to misaligned target {target:#010x}")]
    MisalignedJump { pc: u32, target: u32 },
    #[error("unknown instruction {raw:#010x} at {pc:#010x}")]
    UnknownOpcode { pc: u32, raw: u32 },
    #[error("unimplemented instruction {raw:#010x} at {pc:#010x}")]
    Unimplemented { pc: u32, raw: u32 },
    #[error("bus error at {pc:#010x} accessing {addr:#010x}: {source}")]
    Bus {
        pc: u32,
        addr: u32,
        #[source]
        source: BusFault,
    },
}

impl Trap {
    pub fn pc(&self) -> u32 {
        match *self {
            Trap::Fetch { pc, .. }
            | Trap::MisalignedFetch { pc }
            | Trap::MisalignedJump { pc, .. }
            | Trap::UnknownOpcode { pc, .. }
            | Trap::Unimplemented { pc, .. }
            | Trap::Bus { pc, .. } => pc,
        }
    }
}

/// Retired-instruction counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stats {
    pub instructions: u64,
    /// Conditional branches plus jumps.
    pub branches: u64,
    pub taken: u64,
    pub loads: u64,
    pub stores: u64,
    pub muls: u64,
    pub divs: u64,
    pub other: u64,
}

impl Stats {
    pub fn record(&mut self, op: Op, taken: bool) {
        self.instructions += 1;
        match op.class() {
            OpClass::Branch | OpClass::Jump => {
                self.branches += 1;
                if taken {
                    self.taken += 1;
                }
            }
            OpClass::Load => self.loads += 1,
            OpClass::Store => self.stores += 1,
            OpClass::Mul => self.muls += 1,
            OpClass::Div => self.divs += 1,
            OpClass::Alu | OpClass::Upper => self.other += 1,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    Executed,
    /// Fetched the all-zero terminator; PC is left on it.
    Halt,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Cpu {
    pub pc: u32,
    regs: [u32; 32],
    pub cfg: CpuConfig,
    pub stats: Stats,
}

impl Cpu {
    pub fn new(cfg: CpuConfig) -> Self {
        Self {
            pc: 0,
            regs: [0; 32],
            cfg,
            stats: Stats::default(),
        }
    }

    /// Zero every register except sp, which gets `sp`; PC back to 0.
    pub fn reset(&mut self, sp: u32) {
        self.regs = [0; 32];
        self.regs[REG_SP as usize] = sp;
        self.pc = 0;
        self.stats = Stats::default();
    }

    #[inline]
    pub fn reg(&self, idx: u8) -> u32 {
        self.regs[(idx & 0x1F) as usize]
    }

    /// Writes to x0 are dropped.
    #[inline]
    pub fn set_reg(&mut self, idx: u8, val: u32) {
        let idx = (idx & 0x1F) as usize;
        if idx != 0 {
            self.regs[idx] = val;
        }
    }

    pub fn regs(&self) -> &[u32; 32] {
        &self.regs
    }

    /// One fetch-decode-execute cycle. On error PC and registers are exactly
    /// as before the call.
    pub fn step<B: Bus, D: Decoder, X: Executor>(
        &mut self,
        bus: &mut B,
        dec: &D,
        exec: &X,
    ) -> Result<StepOutcome, Trap> {
        let pc = self.pc;
        if pc % 4 != 0 {
            return Err(Trap::MisalignedFetch { pc });
        }
        let raw = bus
            .read_u32(pc)
            .map_err(|source| Trap::Fetch { pc, source })?;
        if raw == 0 && self.cfg.halt_on_zero {
            return Ok(StepOutcome::Halt);
        }
        let d = dec.decode(raw).map_err(|e| match e {
            DecodeError::UnknownOpcode { .. } => Trap::UnknownOpcode { pc, raw },
            DecodeError::Unimplemented { .. } => Trap::Unimplemented { pc, raw },
        })?;
        if d.op.is_m_extension() && !self.cfg.m_extension {
            return Err(Trap::Unimplemented { pc, raw });
        }
        trace!("{pc:08x}: {raw:08x}  {}", disasm::fmt_decoded(&d));

        let target = exec.exec(self, bus, pc, &d)?;
        self.pc = target.unwrap_or(pc.wrapping_add(4));
        self.stats.record(d.op, target.is_some());
        Ok(StepOutcome::Executed)
    }
}
