use serde::{Deserialize, Serialize};

/// Access width in bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Width {
    Byte = 1,
    Half = 2,
    Word = 4,
}

impl Width {
    pub fn bytes(self) -> u32 {
        self as u32
    }

    pub fn mask(self) -> u32 {
        match self {
            Width::Byte => 0xFF,
            Width::Half => 0xFFFF,
            Width::Word => 0xFFFF_FFFF,
        }
    }
}

/// Sign- or zero-extend the low `width` bytes of `raw` to 32 bits.
pub fn extend(raw: u32, width: Width, signed: bool) -> u32 {
    match (width, signed) {
        (Width::Byte, true) => raw as u8 as i8 as i32 as u32,
        (Width::Half, true) => raw as u16 as i16 as i32 as u32,
        _ => raw & width.mask(),
    }
}

#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum BusFault {
    #[error("unmapped address {addr:#010x}")]
    Unmapped { addr: u32 },
    #[error("{width}-byte access at {addr:#010x} straddles a device boundary")]
    Straddle { addr: u32, width: u32 },
    #[error("{width}-byte access at {addr:#010x} crosses a register boundary")]
    Misaligned { addr: u32, width: u32 },
    #[error("write to read-only location {addr:#010x}")]
    ReadOnly { addr: u32 },
}

pub trait Bus {
    /// Little-endian read of `width` bytes, extended to 32 bits.
    fn read(&mut self, addr: u32, width: Width, signed: bool) -> Result<u32, BusFault>;
    /// Little-endian write of the low `width` bytes of `val`.
    fn write(&mut self, addr: u32, val: u32, width: Width) -> Result<(), BusFault>;

    fn read_u8(&mut self, addr: u32) -> Result<u8, BusFault> {
        self.read(addr, Width::Byte, false).map(|v| v as u8)
    }
    fn read_u16(&mut self, addr: u32) -> Result<u16, BusFault> {
        self.read(addr, Width::Half, false).map(|v| v as u16)
    }
    fn read_u32(&mut self, addr: u32) -> Result<u32, BusFault> {
        self.read(addr, Width::Word, false)
    }
    fn write_u8(&mut self, addr: u32, val: u8) -> Result<(), BusFault> {
        self.write(addr, val as u32, Width::Byte)
    }
    fn write_u16(&mut self, addr: u32, val: u16) -> Result<(), BusFault> {
        self.write(addr, val as u32, Width::Half)
    }
    fn write_u32(&mut self, addr: u32, val: u32) -> Result<(), BusFault> {
        self.write(addr, val, Width::Word)
    }
}

/// Flat little-endian byte store mapped at `base`.
#[derive(Clone, Serialize, Deserialize)]
pub struct LinearMemory {
    pub mem: Vec<u8>,
    pub base: u32,
}

impl std::fmt::Debug for LinearMemory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LinearMemory")
            .field("base", &format_args!("{:#010x}", self.base))
            .field("len", &self.mem.len())
            .finish()
    }
}

impl LinearMemory {
    pub fn new(size: usize) -> Self {
        Self::with_base(0, size)
    }

    pub fn with_base(base: u32, size: usize) -> Self {
        Self {
            mem: vec![0; size],
            base,
        }
    }

    pub fn len(&self) -> usize {
        self.mem.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mem.is_empty()
    }

    pub fn clear(&mut self) {
        self.mem.fill(0);
    }

    /// One past the last mapped address, as a 64-bit value so a store ending
    /// at 4 GiB is representable.
    pub fn end(&self) -> u64 {
        self.base as u64 + self.mem.len() as u64
    }

    pub fn contains(&self, addr: u32) -> bool {
        addr >= self.base && (addr as u64) < self.end()
    }

    /// Offset of an access of `width` at `addr`, which must lie entirely inside.
    fn offset(&self, addr: u32, width: Width) -> Result<usize, BusFault> {
        if !self.contains(addr) {
            return Err(BusFault::Unmapped { addr });
        }
        if addr as u64 + width.bytes() as u64 > self.end() {
            return Err(BusFault::Straddle { addr, width: width.bytes() });
        }
        Ok((addr - self.base) as usize)
    }

    fn load_le(&self, off: usize, width: Width) -> u32 {
        match width {
            Width::Byte => self.mem[off] as u32,
            Width::Half => u16::from_le_bytes([self.mem[off], self.mem[off + 1]]) as u32,
            Width::Word => u32::from_le_bytes([
                self.mem[off],
                self.mem[off + 1],
                self.mem[off + 2],
                self.mem[off + 3],
            ]),
        }
    }

    fn store_le(&mut self, off: usize, v: u32, width: Width) {
        let n = width.bytes() as usize;
        self.mem[off..off + n].copy_from_slice(&v.to_le_bytes()[..n]);
    }
}

impl Bus for LinearMemory {
    fn read(&mut self, addr: u32, width: Width, signed: bool) -> Result<u32, BusFault> {
        let off = self.offset(addr, width)?;
        Ok(extend(self.load_le(off, width), width, signed))
    }

    fn write(&mut self, addr: u32, val: u32, width: Width) -> Result<(), BusFault> {
        let off = self.offset(addr, width)?;
        self.store_le(off, val, width);
        Ok(())
    }
}
