pub mod asm;
pub mod codec;
pub mod cpu;
pub mod decoder;
pub mod devices;
pub mod disasm;
pub mod exec;
pub mod instructions;
pub mod loader;
pub mod memory;
pub mod sim;
pub mod soc;

pub mod isa {
    pub mod rv32im; // RV32I base set + M extension
}

pub use asm::{assemble, Assembler, AsmErrors, Program};
pub use cpu::{Cpu, CpuConfig, Stats, Trap};
pub use memory::{Bus, BusFault, LinearMemory, Width};
pub use sim::{RunExit, SimConfig, Simulator};
pub use soc::{BusEvent, SocBus, SocConfig};
