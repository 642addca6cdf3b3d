//! Register interface of the ASCON accelerator.
//!
//! Every access to the device goes through [`RegisterInterface`]. The
//! [`Mmio`] backend performs volatile loads and stores on the memory-mapped
//! registers, `mock::MockDevice` models the device in memory.

use {
    core::cell::RefCell,
    croc_csr::{utra::ascon, Register, CSR, HW_ASCON_BASE},
};

/// The registers of the accelerator.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum Reg {
    Magic,
    /// Write: source address of a read-path DMA. Read: result word 0.
    DmaRead,
    Rdata1,
    Rdata2,
    /// Destination address of a write-path DMA.
    DmaWrite,
    DataIn,
    Len,
    Cmd,
    Status,
    KeyAddr,
    NonceAddr,
    AdAddr,
    MsgAddr,
    OutAddr,
    /// Output FIFO, every read pops one word.
    Bdo,
}

impl Reg {
    pub const ALL: [Reg; ascon::ASCON_NUMREGS] = [
        Reg::Magic,
        Reg::DmaRead,
        Reg::Rdata1,
        Reg::Rdata2,
        Reg::DmaWrite,
        Reg::DataIn,
        Reg::Len,
        Reg::Cmd,
        Reg::Status,
        Reg::KeyAddr,
        Reg::NonceAddr,
        Reg::AdAddr,
        Reg::MsgAddr,
        Reg::OutAddr,
        Reg::Bdo,
    ];

    /// Result words of a read-path DMA, lowest first.
    pub const RDATA: [Reg; 3] = [Reg::DmaRead, Reg::Rdata1, Reg::Rdata2];

    pub const fn register(self) -> Register {
        match self {
            Reg::Magic => ascon::MAGIC,
            Reg::DmaRead => ascon::DMA_RD,
            Reg::Rdata1 => ascon::RDATA1,
            Reg::Rdata2 => ascon::RDATA2,
            Reg::DmaWrite => ascon::DMA_WR,
            Reg::DataIn => ascon::DATA_IN,
            Reg::Len => ascon::LEN,
            Reg::Cmd => ascon::CMD,
            Reg::Status => ascon::STATUS,
            Reg::KeyAddr => ascon::KEY_ADDR,
            Reg::NonceAddr => ascon::NONCE_ADDR,
            Reg::AdAddr => ascon::AD_ADDR,
            Reg::MsgAddr => ascon::MSG_ADDR,
            Reg::OutAddr => ascon::OUT_ADDR,
            Reg::Bdo => ascon::BDO,
        }
    }

    pub const fn name(self) -> &'static str {
        match self {
            Reg::Magic => "MAGIC",
            Reg::DmaRead => "DMA_RD",
            Reg::Rdata1 => "RDATA1",
            Reg::Rdata2 => "RDATA2",
            Reg::DmaWrite => "DMA_WR",
            Reg::DataIn => "DATA_IN",
            Reg::Len => "LEN",
            Reg::Cmd => "CMD",
            Reg::Status => "STATUS",
            Reg::KeyAddr => "KEY_ADDR",
            Reg::NonceAddr => "NONCE_ADDR",
            Reg::AdAddr => "AD_ADDR",
            Reg::MsgAddr => "MSG_ADDR",
            Reg::OutAddr => "OUT_ADDR",
            Reg::Bdo => "BDO",
        }
    }

    /// Byte offset from the device base.
    pub const fn byte_offset(self) -> usize {
        self.register().offset() * 4
    }
}

pub trait RegisterInterface {
    /// Reads a register. Reads can have side effects on the device (BDO pops
    /// a word), so they are never cached or merged.
    fn read(&mut self, reg: Reg) -> u32;

    fn write(&mut self, reg: Reg, value: u32);

    /// Address the device's DMA master uses to reach `len` bytes at `ptr`.
    fn bus_address(&mut self, ptr: *const u8, len: usize) -> u32;
}

impl<R: RegisterInterface + ?Sized> RegisterInterface for &mut R {
    fn read(&mut self, reg: Reg) -> u32 {
        (**self).read(reg)
    }

    fn write(&mut self, reg: Reg, value: u32) {
        (**self).write(reg, value)
    }

    fn bus_address(&mut self, ptr: *const u8, len: usize) -> u32 {
        (**self).bus_address(ptr, len)
    }
}

/// Memory-mapped accelerator registers.
pub struct Mmio {
    base_addr: usize,
}

impl Default for Mmio {
    fn default() -> Self {
        Mmio::new()
    }
}

impl Mmio {
    pub fn new() -> Self {
        Self {
            base_addr: HW_ASCON_BASE,
        }
    }

    /// Creates `Mmio` instance with a different base address. Used with remapped windows
    pub fn with_alt_base_addr(base_addr: usize) -> Self {
        Self { base_addr }
    }

    fn csr(&self) -> CSR<u32> {
        CSR::new(self.base_addr as *mut u32)
    }
}

impl RegisterInterface for Mmio {
    fn read(&mut self, reg: Reg) -> u32 {
        self.csr().r(reg.register())
    }

    fn write(&mut self, reg: Reg, value: u32) {
        self.csr().wo(reg.register(), value);
    }

    fn bus_address(&mut self, ptr: *const u8, _len: usize) -> u32 {
        // The SoC has no MMU and a 32-bit bus.
        ptr as usize as u32
    }
}

/// Exclusive ownership of one device for hosts with more than one
/// execution context.
///
/// Each call to [`SharedDevice::with`] runs inside a single critical
/// section, so a whole handshake is never interleaved with another.
pub struct SharedDevice<R> {
    inner: critical_section::Mutex<RefCell<R>>,
}

impl<R: RegisterInterface> SharedDevice<R> {
    pub const fn new(regs: R) -> Self {
        Self {
            inner: critical_section::Mutex::new(RefCell::new(regs)),
        }
    }

    pub fn with<T>(&self, f: impl FnOnce(&mut R) -> T) -> T {
        critical_section::with(|cs| f(&mut self.inner.borrow(cs).borrow_mut()))
    }

    pub fn into_inner(self) -> R {
        self.inner.into_inner().into_inner()
    }
}
