//! Address-mapped system bus: ROM, RAM and three peripherals at fixed bases.

use std::collections::VecDeque;
use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::devices::{Gpio, Timer, Uart};
use crate::memory::{extend, Bus, BusFault, LinearMemory, Width};

pub const ROM_BASE: u32 = 0x0000_0000;
pub const RAM_BASE: u32 = 0x1000_0000;
pub const TIMER_BASE: u32 = 0x2000_0000;
pub const UART_BASE: u32 = 0x3000_0000;
pub const GPIO_BASE: u32 = 0x4000_0000;

pub const DEFAULT_ROM_SIZE: usize = 64 * 1024;
pub const DEFAULT_RAM_SIZE: usize = 64 * 1024;

/// Largest ROM/RAM that still ends below the next device's base.
pub const MAX_ROM_SIZE: usize = (RAM_BASE - ROM_BASE) as usize;
pub const MAX_RAM_SIZE: usize = (TIMER_BASE - RAM_BASE) as usize;

/// Pending events kept for `drain_events`; older ones are dropped first.
pub const EVENT_CAPACITY: usize = 4096;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SocConfig {
    pub rom_size: usize,
    pub ram_size: usize,
    /// Allow stores into ROM at run time. Program loading ignores this.
    pub rom_writable: bool,
}

impl Default for SocConfig {
    fn default() -> Self {
        Self {
            rom_size: DEFAULT_ROM_SIZE,
            ram_size: DEFAULT_RAM_SIZE,
            rom_writable: true,
        }
    }
}

impl SocConfig {
    /// Shrink ROM and RAM so neither runs into the next device's base.
    pub fn clamped(self) -> Self {
        let out = Self {
            rom_size: self.rom_size.min(MAX_ROM_SIZE),
            ram_size: self.ram_size.min(MAX_RAM_SIZE),
            ..self
        };
        if out != self {
            warn!(rom = out.rom_size, ram = out.ram_size, "memory sizes clamped to the address map");
        }
        out
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Region {
    Rom,
    Ram,
    Timer,
    Uart,
    Gpio,
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Region::Rom => "ROM",
            Region::Ram => "RAM",
            Region::Timer => "TIMER",
            Region::Uart => "UART",
            Region::Gpio => "GPIO",
        })
    }
}

/// Observable peripheral side effect, one per write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BusEvent {
    UartTx(u8),
    Led(u8),
    Segment { index: u8, value: u8 },
}

impl fmt::Display for BusEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            BusEvent::UartTx(b) if b.is_ascii_graphic() || b == b' ' => {
                write!(f, "UART TX: {b:#04x} '{}'", b as char)
            }
            BusEvent::UartTx(b) => write!(f, "UART TX: {b:#04x}"),
            BusEvent::Led(v) => write!(f, "LED: {v:#04x} ({v:08b})"),
            BusEvent::Segment { index, value } => write!(f, "SEG{index}: {value:#04x}"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct SocBus {
    pub rom: LinearMemory,
    pub ram: LinearMemory,
    pub timer: Timer,
    pub uart: Uart,
    pub gpio: Gpio,
    cfg: SocConfig,
    events: VecDeque<BusEvent>,
    dropped: u64,
}

impl SocBus {
    pub fn new(cfg: SocConfig) -> Self {
        let cfg = cfg.clamped();
        Self {
            rom: LinearMemory::with_base(ROM_BASE, cfg.rom_size),
            ram: LinearMemory::with_base(RAM_BASE, cfg.ram_size),
            timer: Timer::default(),
            uart: Uart::default(),
            gpio: Gpio::default(),
            cfg,
            events: VecDeque::new(),
            dropped: 0,
        }
    }

    /// Effective configuration, after clamping.
    pub fn config(&self) -> &SocConfig {
        &self.cfg
    }

    /// Initial stack pointer: one past the last RAM byte.
    pub fn ram_top(&self) -> u32 {
        RAM_BASE.wrapping_add(self.ram.len() as u32)
    }

    /// Clear RAM, peripheral registers and pending events. ROM is kept.
    pub fn reset(&mut self) {
        self.ram.clear();
        self.timer.reset();
        self.uart.reset();
        self.gpio.reset();
        self.events.clear();
        self.dropped = 0;
        debug!("bus reset");
    }

    /// Zero ROM and write `words` from address 0. Bypasses `rom_writable`.
    pub fn load_rom(&mut self, words: &[u32]) -> Result<(), usize> {
        let capacity = self.rom.len();
        if words.len() * 4 > capacity {
            return Err(capacity);
        }
        self.rom.clear();
        for (chunk, w) in self.rom.mem.chunks_exact_mut(4).zip(words) {
            chunk.copy_from_slice(&w.to_le_bytes());
        }
        debug!(words = words.len(), "rom loaded");
        Ok(())
    }

    /// Region owning `addr`, with the offset into it.
    pub fn decode(&self, addr: u32) -> Option<(Region, u32)> {
        let within = |base: u32, size: u64| {
            let off = addr.wrapping_sub(base);
            (addr >= base && (off as u64) < size).then_some(off)
        };
        let table = [
            (Region::Rom, ROM_BASE, self.rom.len() as u64),
            (Region::Ram, RAM_BASE, self.ram.len() as u64),
            (Region::Timer, TIMER_BASE, Timer::SIZE as u64),
            (Region::Uart, UART_BASE, Uart::SIZE as u64),
            (Region::Gpio, GPIO_BASE, Gpio::SIZE as u64),
        ];
        table
            .into_iter()
            .find_map(|(r, base, size)| within(base, size).map(|off| (r, off)))
    }

    /// Resolve an access and check it stays inside one device, and inside one
    /// register for peripherals.
    fn route(&self, addr: u32, width: Width) -> Result<(Region, u32), BusFault> {
        let (region, off) = self.decode(addr).ok_or(BusFault::Unmapped { addr })?;
        let n = width.bytes();
        let last = addr.checked_add(n - 1).ok_or(BusFault::Straddle { addr, width: n })?;
        if self.decode(last).map(|(r, _)| r) != Some(region) {
            return Err(BusFault::Straddle { addr, width: n });
        }
        let peripheral = !matches!(region, Region::Rom | Region::Ram);
        if peripheral && (off % 4) + n > 4 {
            return Err(BusFault::Misaligned { addr, width: n });
        }
        Ok((region, off))
    }

    fn emit(&mut self, ev: BusEvent) {
        info!("{ev}");
        if self.events.len() == EVENT_CAPACITY {
            self.events.pop_front();
            if self.dropped == 0 {
                warn!(capacity = EVENT_CAPACITY, "event queue full, dropping oldest");
            }
            self.dropped += 1;
        }
        self.events.push_back(ev);
    }

    pub fn pending_events(&self) -> usize {
        self.events.len()
    }

    /// Events lost to the queue cap since the last reset.
    pub fn dropped_events(&self) -> u64 {
        self.dropped
    }

    pub fn drain_events(&mut self) -> Vec<BusEvent> {
        self.events.drain(..).collect()
    }

    /// Read without side effects; `None` for unmapped bytes.
    pub fn peek_u8(&self, addr: u32) -> Option<u8> {
        let (region, off) = self.decode(addr)?;
        let v = match region {
            Region::Rom => self.rom.mem[off as usize] as u32,
            Region::Ram => self.ram.mem[off as usize] as u32,
            Region::Timer => self.timer.read(off, Width::Byte),
            Region::Uart => self.uart.read(off, Width::Byte),
            Region::Gpio => self.gpio.read(off, Width::Byte),
        };
        Some(v as u8)
    }

    /// `{addr:08x}: bb bb ...`, 16 bytes per line, `--` for unmapped bytes.
    pub fn hexdump(&self, addr: u32, len: u32) -> String {
        let mut out = String::new();
        let mut row = addr;
        let end = addr as u64 + len as u64;
        while (row as u64) < end {
            let n = (end - row as u64).min(16) as u32;
            out.push_str(&format!("{row:08x}:"));
            for i in 0..n {
                match self.peek_u8(row.wrapping_add(i)) {
                    Some(b) => out.push_str(&format!(" {b:02x}")),
                    None => out.push_str(" --"),
                }
            }
            out.push('\n');
            match row.checked_add(16) {
                Some(next) => row = next,
                None => break,
            }
        }
        out
    }
}

impl Bus for SocBus {
    fn read(&mut self, addr: u32, width: Width, signed: bool) -> Result<u32, BusFault> {
        let (region, off) = self.route(addr, width)?;
        let raw = match region {
            Region::Rom => self.rom.read(addr, width, false)?,
            Region::Ram => self.ram.read(addr, width, false)?,
            Region::Timer => self.timer.read(off, width),
            Region::Uart => self.uart.read(off, width),
            Region::Gpio => self.gpio.read(off, width),
        };
        Ok(extend(raw, width, signed))
    }

    fn write(&mut self, addr: u32, val: u32, width: Width) -> Result<(), BusFault> {
        let (region, off) = self.route(addr, width)?;
        match region {
            Region::Rom if !self.cfg.rom_writable => return Err(BusFault::ReadOnly { addr }),
            Region::Rom => self.rom.write(addr, val, width)?,
            Region::Ram => self.ram.write(addr, val, width)?,
            Region::Timer => return Err(BusFault::ReadOnly { addr }),
            Region::Uart if !Uart::writable(off) => return Err(BusFault::ReadOnly { addr }),
            Region::Uart => {
                if let Some(ev) = self.uart.write(off, val, width) {
                    self.emit(ev);
                }
            }
            Region::Gpio => {
                for ev in self.gpio.write(off, val, width) {
                    self.emit(ev);
                }
            }
        }
        Ok(())
    }
}
