//! Memory-mapped peripherals. Offsets are relative to each device's base;
//! the bus has already checked that an access stays inside one 32-bit
//! register.

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

use crate::memory::Width;
use crate::soc::BusEvent;

fn extract(reg: u32, byte_off: u32, width: Width) -> u32 {
    (reg >> (byte_off * 8)) & width.mask()
}

fn merge(reg: u32, byte_off: u32, val: u32, width: Width) -> u32 {
    let shift = byte_off * 8;
    let mask = width.mask() << shift;
    (reg & !mask) | ((val << shift) & mask)
}

/// Free-running counter owned by the host; software can only read it.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Timer {
    ticks: u32,
}

impl Timer {
    pub const SIZE: u32 = 4;

    pub fn ticks(&self) -> u32 {
        self.ticks
    }

    pub fn set(&mut self, ticks: u32) {
        self.ticks = ticks;
    }

    pub fn advance(&mut self, delta: u32) {
        self.ticks = self.ticks.wrapping_add(delta);
    }

    pub fn reset(&mut self) {
        self.ticks = 0;
    }

    pub fn read(&self, off: u32, width: Width) -> u32 {
        extract(self.ticks, off, width)
    }
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
    pub struct UartStatus: u32 {
        const TX_READY = 1 << 0;
        const RX_DONE = 1 << 1;
    }
}

pub const UART_CTRL: u32 = 0x00;
pub const UART_STATUS: u32 = 0x04;
pub const UART_BAUD: u32 = 0x08;
pub const UART_TX: u32 = 0x0C;
pub const UART_RX: u32 = 0x10;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Uart {
    pub ctrl: u32,
    pub status: UartStatus,
    pub baud: u32,
    pub tx: u32,
    pub rx: u32,
}

impl Default for Uart {
    fn default() -> Self {
        Self {
            ctrl: 0,
            status: UartStatus::empty(),
            baud: 0,
            tx: 0,
            rx: 0,
        }
    }
}

impl Uart {
    pub const SIZE: u32 = 20;

    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Latch a received word and raise RX_DONE.
    pub fn receive(&mut self, word: u32) {
        self.rx = word;
        self.status.insert(UartStatus::RX_DONE);
    }

    /// Transmit never stalls, so TX_READY always reads back set.
    pub fn status(&self) -> UartStatus {
        self.status | UartStatus::TX_READY
    }

    pub fn read(&self, off: u32, width: Width) -> u32 {
        let reg = match off & !3 {
            UART_CTRL => self.ctrl,
            UART_STATUS => self.status().bits(),
            UART_BAUD => self.baud,
            UART_TX => self.tx,
            _ => self.rx,
        };
        extract(reg, off & 3, width)
    }

    /// rx-data is the only register software cannot write.
    pub fn writable(off: u32) -> bool {
        off & !3 != UART_RX
    }

    /// Writes to a read-only register are ignored here; the bus rejects
    /// them first via [`Uart::writable`].
    pub fn write(&mut self, off: u32, val: u32, width: Width) -> Option<BusEvent> {
        let lane = off & 3;
        match off & !3 {
            UART_CTRL => self.ctrl = merge(self.ctrl, lane, val, width),
            UART_STATUS => {
                let bits = merge(self.status.bits(), lane, val, width);
                self.status = UartStatus::from_bits_truncate(bits);
            }
            UART_BAUD => self.baud = merge(self.baud, lane, val, width),
            UART_TX => {
                self.tx = merge(self.tx, lane, val, width);
                return Some(BusEvent::UartTx((self.tx & 0xFF) as u8));
            }
            _ => {}
        }
        None
    }
}

/// LED byte at offset 0, seven-segment digits at offsets 1..=7.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Gpio {
    pub bytes: [u8; 8],
}

impl Gpio {
    pub const SIZE: u32 = 8;

    pub fn reset(&mut self) {
        self.bytes = [0; 8];
    }

    pub fn led(&self) -> u8 {
        self.bytes[0]
    }

    /// Segment digit `index` in 1..=7.
    pub fn segment(&self, index: usize) -> Option<u8> {
        (1..8).contains(&index).then(|| self.bytes[index])
    }

    pub fn read(&self, off: u32, width: Width) -> u32 {
        let word_base = (off & !3) as usize;
        let word = u32::from_le_bytes([
            self.bytes[word_base],
            self.bytes[word_base + 1],
            self.bytes[word_base + 2],
            self.bytes[word_base + 3],
        ]);
        extract(word, off & 3, width)
    }

    /// Returns one event per byte written.
    pub fn write(&mut self, off: u32, val: u32, width: Width) -> Vec<BusEvent> {
        (0..width.bytes())
            .map(|i| {
                let idx = (off + i) as usize;
                let v = (val >> (i * 8)) as u8;
                self.bytes[idx] = v;
                if idx == 0 {
                    BusEvent::Led(v)
                } else {
                    BusEvent::Segment { index: idx as u8, value: v }
                }
            })
            .collect()
    }
}
