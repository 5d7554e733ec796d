//! Simulator facade tying the CPU, decoder and SoC bus together.
//!
//! This is the surface a debugger front end drives: `step`, `reset`,
//! `load_program`, register and PC accessors, and the word-index to
//! source-line map. Continuous execution and breakpoints belong to the
//! caller; `run` is a bounded convenience loop for batch use.

use std::fmt::Write as _;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::cpu::{Cpu, CpuConfig, Stats, StepOutcome, Trap};
use crate::exec::IntExecutor;
use crate::isa::rv32im::Rv32Decoder;
use crate::loader::LoadError;
use crate::soc::{BusEvent, SocBus, SocConfig};

pub const DEFAULT_MAX_STEPS: u64 = 1_000_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    pub cpu: CpuConfig,
    pub soc: SocConfig,
    /// Step cap used by batch runs.
    pub max_steps: u64,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            cpu: CpuConfig::default(),
            soc: SocConfig::default(),
            max_steps: DEFAULT_MAX_STEPS,
        }
    }
}

/// Why `run` returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RunExit {
    /// Reached the all-zero terminator (or was already halted cleanly).
    Halted,
    /// Stopped on a fault.
    Faulted,
    /// Executed the requested number of steps and is still runnable.
    StepLimit,
}

#[derive(Debug)]
pub struct Simulator {
    cpu: Cpu,
    bus: SocBus,
    dec: Rv32Decoder,
    exec: IntExecutor,
    halted: bool,
    fault: Option<Trap>,
    line_map: Vec<usize>,
}

impl Default for Simulator {
    fn default() -> Self {
        Self::new(SimConfig::default())
    }
}

impl Simulator {
    pub fn new(cfg: SimConfig) -> Self {
        let mut sim = Self {
            cpu: Cpu::new(cfg.cpu),
            bus: SocBus::new(cfg.soc),
            dec: Rv32Decoder::new(),
            exec: IntExecutor,
            halted: false,
            fault: None,
            line_map: Vec::new(),
        };
        sim.reset();
        sim
    }

    /// Registers cleared (sp = top of RAM), PC 0, fault cleared, RAM and
    /// peripherals reinitialised. ROM keeps its contents.
    pub fn reset(&mut self) {
        self.bus.reset();
        self.cpu.reset(self.bus.ram_top());
        self.halted = false;
        self.fault = None;
        debug!(sp = self.cpu.reg(2), "simulator reset");
    }

    /// Reset, then place `words` in ROM from address 0.
    pub fn load_program(&mut self, words: &[u32], line_map: Vec<usize>) -> Result<(), LoadError> {
        self.reset();
        self.bus
            .load_rom(words)
            .map_err(|capacity| LoadError::TooLarge { words: words.len(), capacity })?;
        self.line_map = line_map;
        debug!(words = words.len(), "program loaded");
        Ok(())
    }

    /// Execute one instruction. Returns whether the engine is still runnable;
    /// once halted this does nothing until `reset`.
    pub fn step(&mut self) -> bool {
        if self.halted {
            return false;
        }
        match self.cpu.step(&mut self.bus, &self.dec, &self.exec) {
            Ok(StepOutcome::Executed) => true,
            Ok(StepOutcome::Halt) => {
                debug!(pc = self.cpu.pc, "halt");
                self.halted = true;
                false
            }
            Err(trap) => {
                warn!("{trap}");
                self.fault = Some(trap);
                self.halted = true;
                false
            }
        }
    }

    /// Step until halted or `max_steps` instructions have run.
    pub fn run(&mut self, max_steps: u64) -> RunExit {
        for _ in 0..max_steps {
            if !self.step() {
                break;
            }
        }
        match (self.halted, self.fault.is_some()) {
            (_, true) => RunExit::Faulted,
            (true, false) => RunExit::Halted,
            (false, false) => RunExit::StepLimit,
        }
    }

    pub fn reg(&self, idx: u8) -> u32 {
        self.cpu.reg(idx)
    }

    pub fn set_reg(&mut self, idx: u8, val: u32) {
        self.cpu.set_reg(idx, val);
    }

    pub fn regs(&self) -> &[u32; 32] {
        self.cpu.regs()
    }

    pub fn pc(&self) -> u32 {
        self.cpu.pc
    }

    pub fn is_halted(&self) -> bool {
        self.halted
    }

    pub fn fault(&self) -> Option<&Trap> {
        self.fault.as_ref()
    }

    pub fn fault_message(&self) -> Option<String> {
        self.fault.as_ref().map(|t| t.to_string())
    }

    pub fn stats(&self) -> &Stats {
        &self.cpu.stats
    }

    pub fn line_map(&self) -> &[usize] {
        &self.line_map
    }

    /// Source line of the instruction at `pc`, if it came from assembly.
    pub fn line_for_pc(&self, pc: u32) -> Option<usize> {
        if pc % 4 != 0 {
            return None;
        }
        self.line_map.get((pc / 4) as usize).copied()
    }

    pub fn bus(&self) -> &SocBus {
        &self.bus
    }

    pub fn bus_mut(&mut self) -> &mut SocBus {
        &mut self.bus
    }

    pub fn drain_events(&mut self) -> Vec<BusEvent> {
        self.bus.drain_events()
    }

    /// `x{i}={:08x}` for every register, then `PC={:08x}`.
    pub fn dump_regs(&self) -> String {
        let mut out = String::new();
        for (i, v) in self.cpu.regs().iter().enumerate() {
            let _ = writeln!(out, "x{i}={v:08x}");
        }
        let _ = writeln!(out, "PC={:08x}", self.cpu.pc);
        out
    }

    pub fn dump_memory(&self, addr: u32, len: u32) -> String {
        self.bus.hexdump(addr, len)
    }
}
