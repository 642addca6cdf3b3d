//! Behavioral model of the accelerator.
//!
//! [`MockDevice`] implements [`RegisterInterface`] on top of plain memory so
//! the status poller, the DMA tester and the cipher sequencer can be run on
//! a host. It hands out synthetic bus addresses for caller buffers and
//! performs the device's DMA accesses on them, completes status bits after a
//! configurable number of polls, and counts every protocol violation it
//! observes. No heap is used.
//!
//! Only built for unit tests and with the `mock` feature.

use crate::{
    command::{Command, DataType, Mode},
    regs::{Reg, RegisterInterface},
    status::Status,
};

/// Value of `MAGIC` after [`MockDevice::new`].
pub const MOCK_MAGIC: u32 = 0xa5c0_0001;

/// Number of accesses kept by the trace.
pub const TRACE_CAPACITY: usize = 512;

/// Longest AD or message segment the model buffers.
pub const MAX_SEGMENT: usize = 64;

/// Filler stored past the transfer length by [`Fault::WriteWholeWords`].
pub const SPILL_BYTE: u8 = 0xee;

const BUS_BASE: u32 = 0x1000_0000;
const MAX_REGIONS: usize = 16;
const TAG_WORDS: usize = 4;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum AccessKind {
    Read,
    Write,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Access {
    pub kind: AccessKind,
    pub reg: Reg,
    pub value: u32,
}

impl Access {
    const EMPTY: Access = Access {
        kind: AccessKind::Read,
        reg: Reg::Magic,
        value: 0,
    };
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Fault {
    /// Corrupt the lowest result byte of the read-path transfer with this
    /// length and start offset.
    FlipReadByte { len: usize, offset: usize },
    /// Store whole `DATA_IN` words, spilling [`SPILL_BYTE`] past the
    /// transfer length.
    WriteWholeWords,
    /// Move at most `max` bytes per transfer in either direction. The rest
    /// of the read result is zero and the rest of the write is dropped.
    Truncate { max: usize },
}

/// Inputs of one cipher run as seen by the model.
pub struct CipherInput<'a> {
    pub mode: Mode,
    pub key: &'a [u8; 16],
    pub nonce: &'a [u8; 16],
    pub ad: &'a [u8],
    pub input: &'a [u8],
}

/// Transforms `input` into `output` and returns the tag.
pub type CipherModel = fn(&CipherInput<'_>, &mut [u8]) -> [u8; 16];

/// Keyed XOR stream with a tag folded over key, nonce, AD and ciphertext.
///
/// Decrypting the output of an encryption with the same inputs restores the
/// plaintext and reproduces the tag.
pub fn xor_model(job: &CipherInput<'_>, output: &mut [u8]) -> [u8; 16] {
    for (i, (o, b)) in output.iter_mut().zip(job.input).enumerate() {
        *o = b ^ job.key[i % 16] ^ job.nonce[i % 16];
    }
    let ciphertext: &[u8] = match job.mode {
        Mode::Encrypt => &output[..job.input.len()],
        Mode::Decrypt => job.input,
    };

    let mut tag = [0u8; 16];
    for (i, t) in tag.iter_mut().enumerate() {
        *t = job.key[i] ^ job.nonce[i].rotate_left(1);
    }
    for (i, b) in job.ad.iter().enumerate() {
        tag[i % 16] = tag[i % 16].wrapping_add(*b) ^ 0x5a;
    }
    for (i, b) in ciphertext.iter().enumerate() {
        tag[(i + 7) % 16] ^= b.wrapping_mul(3).wrapping_add(i as u8);
    }
    tag[14] ^= ciphertext.len() as u8;
    tag[15] ^= job.ad.len() as u8;
    tag
}

#[derive(Debug, Copy, Clone)]
struct Region {
    bus: u32,
    host: usize,
    len: usize,
}

pub struct MockDevice {
    magic: u32,
    status: u32,
    pending: [u32; 32],
    latency: u32,
    stall: u32,
    status_reads: u32,

    len: u32,
    cmd: u32,
    cmd_written: bool,
    rdata: [u32; 3],

    wr_addr: u32,
    wr_remaining: usize,
    wr_written: usize,
    wr_active: bool,

    key: [u8; 16],
    nonce: [u8; 16],
    ad: [u8; MAX_SEGMENT],
    ad_len: usize,
    out_addr: Option<u32>,
    tag: [u8; 16],
    bdo: [u32; TAG_WORDS],
    bdo_head: usize,
    bdo_len: usize,
    cipher: CipherModel,

    fault: Option<Fault>,

    regions: [Option<Region>; MAX_REGIONS],
    next_region: usize,
    next_bus: u32,

    trace: [Access; TRACE_CAPACITY],
    trace_len: usize,
    tracing: bool,
    trace_overflow: bool,

    violations: u32,
    bus_errors: u32,
}

/// Device for unit tests. They only start transfers on buffers they still
/// hold.
#[cfg(test)]
pub(crate) fn device() -> MockDevice {
    unsafe { MockDevice::new() }
}

impl MockDevice {
    /// # Safety
    ///
    /// The model keeps the host address of every buffer passed to
    /// [`RegisterInterface::bus_address`] and later reads and writes through
    /// it. Callers must not write a register that starts a transfer (`DMA_READ`,
    /// `DMA_WRITE`, `DATA_IN`, the cipher address ports) on a bus address
    /// whose buffer has been moved or freed since it was registered. The
    /// drivers in this crate keep their buffers borrowed for the whole
    /// transfer.
    pub unsafe fn new() -> Self {
        Self {
            magic: MOCK_MAGIC,
            status: 0,
            pending: [0; 32],
            latency: 1,
            stall: 0,
            status_reads: 0,
            len: 0,
            cmd: 0,
            cmd_written: false,
            rdata: [0; 3],
            wr_addr: 0,
            wr_remaining: 0,
            wr_written: 0,
            wr_active: false,
            key: [0; 16],
            nonce: [0; 16],
            ad: [0; MAX_SEGMENT],
            ad_len: 0,
            out_addr: None,
            tag: [0; 16],
            bdo: [0; TAG_WORDS],
            bdo_head: 0,
            bdo_len: 0,
            cipher: xor_model,
            fault: None,
            regions: [None; MAX_REGIONS],
            next_region: 0,
            next_bus: BUS_BASE,
            trace: [Access::EMPTY; TRACE_CAPACITY],
            trace_len: 0,
            tracing: false,
            trace_overflow: false,
            violations: 0,
            bus_errors: 0,
        }
    }

    pub fn set_magic(&mut self, magic: u32) {
        self.magic = magic;
    }

    /// Number of `STATUS` reads before a scheduled bit becomes visible. Zero
    /// completes immediately.
    pub fn set_latency(&mut self, polls: u32) {
        self.latency = polls;
    }

    /// Bits in `flags` are never set, simulating a hung device.
    pub fn stall(&mut self, flags: Status) {
        self.stall |= flags.bits();
    }

    pub fn set_fault(&mut self, fault: Option<Fault>) {
        self.fault = fault;
    }

    pub fn set_cipher(&mut self, cipher: CipherModel) {
        self.cipher = cipher;
    }

    pub fn set_tracing(&mut self, tracing: bool) {
        self.tracing = tracing;
    }

    pub fn trace(&self) -> &[Access] {
        &self.trace[..self.trace_len]
    }

    pub fn trace_overflowed(&self) -> bool {
        self.trace_overflow
    }

    pub fn clear_trace(&mut self) {
        self.trace_len = 0;
        self.trace_overflow = false;
    }

    pub fn status(&self) -> Status {
        Status::from_bits_truncate(self.status)
    }

    pub fn status_reads(&self) -> u32 {
        self.status_reads
    }

    pub fn violations(&self) -> u32 {
        self.violations
    }

    pub fn bus_errors(&self) -> u32 {
        self.bus_errors
    }

    pub fn last_command(&self) -> u32 {
        self.cmd
    }

    /// Sets `flags` once the configured latency has elapsed.
    pub fn schedule(&mut self, flags: Status) {
        for bit in 0..32 {
            let mask = 1u32 << bit;
            if flags.bits() & mask == 0 || self.stall & mask != 0 {
                continue;
            }
            if self.latency == 0 {
                self.status |= mask;
            } else {
                self.pending[bit] = self.latency;
            }
        }
    }

    fn clear(&mut self, flags: Status) {
        self.status &= !flags.bits();
        for bit in 0..32 {
            if flags.bits() & (1 << bit) != 0 {
                self.pending[bit] = 0;
            }
        }
    }

    fn sample_status(&mut self) -> u32 {
        self.status_reads += 1;
        for bit in 0..32 {
            if self.pending[bit] > 0 {
                self.pending[bit] -= 1;
                if self.pending[bit] == 0 {
                    self.status |= 1 << bit;
                }
            }
        }
        self.status
    }

    fn record(&mut self, kind: AccessKind, reg: Reg, value: u32) {
        if !self.tracing {
            return;
        }
        if self.trace_len == TRACE_CAPACITY {
            self.trace_overflow = true;
            return;
        }
        self.trace[self.trace_len] = Access { kind, reg, value };
        self.trace_len += 1;
    }

    fn violation(&mut self, what: &str) {
        log::warn!("mock: protocol violation: {}", what);
        self.violations += 1;
    }

    fn host_ptr(&mut self, addr: u32, len: usize) -> Option<*mut u8> {
        let found = self.regions.iter().flatten().find(|r| {
            addr >= r.bus && (addr - r.bus) as usize + len <= r.len
        });
        match found {
            Some(r) => Some((r.host + (addr - r.bus) as usize) as *mut u8),
            None => {
                self.bus_errors += 1;
                None
            }
        }
    }

    fn read_bus(&mut self, addr: u32, dst: &mut [u8]) {
        match self.host_ptr(addr, dst.len()) {
            // The region was handed out by `bus_address` for a buffer the
            // driver keeps borrowed for the whole transfer.
            Some(src) => unsafe {
                core::ptr::copy_nonoverlapping(src as *const u8, dst.as_mut_ptr(), dst.len())
            },
            None => dst.fill(0),
        }
    }

    fn write_bus(&mut self, addr: u32, src: &[u8]) {
        if let Some(dst) = self.host_ptr(addr, src.len()) {
            unsafe { core::ptr::copy_nonoverlapping(src.as_ptr(), dst, src.len()) }
        }
    }

    /// Bytes of a `len` byte transfer that actually reach the bus.
    fn moved(&self, len: usize) -> usize {
        match self.fault {
            Some(Fault::Truncate { max }) => len.min(max),
            _ => len,
        }
    }

    fn start_dma_read(&mut self, addr: u32) {
        self.clear(Status::DMA_RD_DONE);
        let len = self.len as usize;
        if !(1..=12).contains(&len) {
            self.violation("read-path DMA length out of range");
            return;
        }

        let mut bytes = [0u8; 12];
        let moved = self.moved(len);
        self.read_bus(addr, &mut bytes[..moved]);
        if let Some(Fault::FlipReadByte { len: l, offset }) = self.fault {
            if l == len && offset == (addr & 3) as usize {
                bytes[0] ^= 0xff;
            }
        }
        for (word, chunk) in self.rdata.iter_mut().zip(bytes.chunks_exact(4)) {
            *word = u32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
        }
        self.schedule(Status::DMA_RD_DONE);
    }

    fn start_dma_write(&mut self, addr: u32) {
        self.clear(Status::DMA_WR_READY | Status::DMA_WR_DONE);
        if self.len == 0 {
            self.violation("write-path DMA armed with zero length");
            return;
        }
        self.wr_addr = addr;
        self.wr_remaining = self.len as usize;
        self.wr_written = 0;
        self.wr_active = true;
        self.schedule(Status::DMA_WR_READY);
    }

    fn feed_dma_write(&mut self, word: u32) {
        if !self.wr_active || self.status & Status::DMA_WR_READY.bits() == 0 {
            self.violation("DATA_IN written while not ready");
            return;
        }
        self.clear(Status::DMA_WR_READY);

        let take = self.wr_remaining.min(4);
        let mut bytes = word.to_le_bytes();
        let store = match self.fault {
            Some(Fault::WriteWholeWords) => {
                bytes[take..].fill(SPILL_BYTE);
                4
            }
            Some(Fault::Truncate { max }) => take.min(max.saturating_sub(self.wr_written)),
            _ => take,
        };
        if store > 0 {
            self.write_bus(self.wr_addr, &bytes[..store]);
        }
        self.wr_addr = self.wr_addr.wrapping_add(4);
        self.wr_remaining -= take;
        self.wr_written += take;

        if self.wr_remaining > 0 {
            self.schedule(Status::DMA_WR_READY);
        } else {
            self.wr_active = false;
            self.schedule(Status::DMA_WR_DONE);
        }
    }

    /// Checks that the last command announces `ty` and that `after` is done.
    fn expect_phase(&mut self, ty: DataType, after: Status, what: &str) -> Option<Command> {
        let cmd = match Command::decode(self.cmd) {
            Ok(cmd) if self.cmd_written && cmd.ty == ty => cmd,
            _ => {
                self.violation(what);
                return None;
            }
        };
        if !self.status().contains(after) {
            self.violation(what);
            return None;
        }
        self.cmd_written = false;
        Some(cmd)
    }

    fn load_key(&mut self, addr: u32) {
        // A key write returns the core to idle.
        self.clear(
            Status::KEY_DONE
                | Status::NONCE_DONE
                | Status::AD_DONE
                | Status::MSG_DONE
                | Status::BDO_VALID,
        );
        self.bdo_len = 0;
        self.out_addr = None;
        if self
            .expect_phase(DataType::Nonce, Status::empty(), "key without header")
            .is_none()
        {
            return;
        }
        let mut key = [0u8; 16];
        self.read_bus(addr, &mut key);
        self.key = key;
        self.schedule(Status::KEY_DONE);
    }

    fn load_nonce(&mut self, addr: u32) {
        if self
            .expect_phase(DataType::Nonce, Status::KEY_DONE, "nonce out of order")
            .is_none()
        {
            return;
        }
        let mut nonce = [0u8; 16];
        self.read_bus(addr, &mut nonce);
        self.nonce = nonce;
        self.schedule(Status::NONCE_DONE);
    }

    fn load_ad(&mut self, addr: u32) {
        if self
            .expect_phase(DataType::Ad, Status::NONCE_DONE, "AD out of order")
            .is_none()
        {
            return;
        }
        let len = self.len as usize;
        if len > MAX_SEGMENT {
            self.violation("AD segment too long");
            return;
        }
        let mut ad = [0u8; MAX_SEGMENT];
        self.read_bus(addr, &mut ad[..len]);
        self.ad = ad;
        self.ad_len = len;
        self.schedule(Status::AD_DONE);
    }

    fn stream_message(&mut self, addr: u32) {
        let cmd = match self.expect_phase(DataType::Msg, Status::AD_DONE, "message out of order") {
            Some(cmd) => cmd,
            None => return,
        };
        if !(cmd.eot && cmd.eoi) {
            self.violation("message without EOT/EOI");
        }
        let out_addr = match self.out_addr {
            Some(out_addr) => out_addr,
            None => {
                self.violation("message before OUT_ADDR");
                return;
            }
        };
        let len = self.len as usize;
        if len > MAX_SEGMENT {
            self.violation("message segment too long");
            return;
        }

        let mut input = [0u8; MAX_SEGMENT];
        let mut output = [0u8; MAX_SEGMENT];
        self.read_bus(addr, &mut input[..len]);
        let job = CipherInput {
            mode: cmd.mode,
            key: &self.key,
            nonce: &self.nonce,
            ad: &self.ad[..self.ad_len],
            input: &input[..len],
        };
        self.tag = (self.cipher)(&job, &mut output[..len]);
        self.write_bus(out_addr, &output[..len]);
        self.schedule(Status::MSG_DONE);
    }

    fn emit_tag(&mut self) {
        if !self.status().contains(Status::MSG_DONE) {
            self.violation("tag requested before message");
            return;
        }
        for (word, chunk) in self.bdo.iter_mut().zip(self.tag.chunks_exact(4)) {
            *word = u32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
        }
        self.bdo_head = 0;
        self.bdo_len = TAG_WORDS;
        self.schedule(Status::BDO_VALID);
    }

    fn pop_bdo(&mut self) -> u32 {
        if self.bdo_len == 0 || self.status & Status::BDO_VALID.bits() == 0 {
            self.violation("BDO read while empty");
            return 0;
        }
        let word = self.bdo[self.bdo_head];
        self.bdo_head += 1;
        self.bdo_len -= 1;
        self.clear(Status::BDO_VALID);
        if self.bdo_len > 0 {
            self.schedule(Status::BDO_VALID);
        }
        word
    }

    fn command(&mut self, value: u32) {
        self.cmd = value;
        self.cmd_written = true;
        if let Ok(cmd) = Command::decode(value) {
            if cmd.ty == DataType::Tag && cmd.eoo {
                self.cmd_written = false;
                self.emit_tag();
            }
        }
    }
}

impl RegisterInterface for MockDevice {
    fn read(&mut self, reg: Reg) -> u32 {
        let value = match reg {
            Reg::Magic => self.magic,
            Reg::DmaRead => self.rdata[0],
            Reg::Rdata1 => self.rdata[1],
            Reg::Rdata2 => self.rdata[2],
            Reg::Len => self.len,
            Reg::Cmd => self.cmd,
            Reg::Status => self.sample_status(),
            Reg::Bdo => self.pop_bdo(),
            Reg::DmaWrite
            | Reg::DataIn
            | Reg::KeyAddr
            | Reg::NonceAddr
            | Reg::AdAddr
            | Reg::MsgAddr
            | Reg::OutAddr => 0,
        };
        self.record(AccessKind::Read, reg, value);
        value
    }

    fn write(&mut self, reg: Reg, value: u32) {
        self.record(AccessKind::Write, reg, value);
        match reg {
            Reg::DmaRead => self.start_dma_read(value),
            Reg::DmaWrite => self.start_dma_write(value),
            Reg::DataIn => self.feed_dma_write(value),
            Reg::Len => self.len = value & croc_csr::utra::ascon::LEN.mask() as u32,
            Reg::Cmd => self.command(value),
            Reg::KeyAddr => self.load_key(value),
            Reg::NonceAddr => self.load_nonce(value),
            Reg::AdAddr => self.load_ad(value),
            Reg::MsgAddr => self.stream_message(value),
            Reg::OutAddr => self.out_addr = Some(value),
            Reg::Magic | Reg::Rdata1 | Reg::Rdata2 | Reg::Status | Reg::Bdo => {
                self.violation("write to read-only register")
            }
        }
    }

    fn bus_address(&mut self, ptr: *const u8, len: usize) -> u32 {
        let host = ptr as usize;
        let known = self
            .regions
            .iter()
            .flatten()
            .find(|r| host >= r.host && host - r.host + len <= r.len);
        if let Some(r) = known {
            return r.bus + (host - r.host) as u32;
        }

        // Each region gets its own 256-byte aligned window. Running off the
        // top of the bus wraps back to the base.
        let step = (len as u64 + 0x10 + 0xff) & !0xff;
        if u64::from(self.next_bus) + step > u64::from(u32::MAX) {
            self.next_bus = BUS_BASE;
        }
        // Keep the low address bits so alignment is visible to the device.
        let bus = self.next_bus | (host & 0xf) as u32;
        self.next_bus = u32::try_from(u64::from(self.next_bus) + step).unwrap_or(BUS_BASE);
        self.regions[self.next_region % MAX_REGIONS] = Some(Region { bus, host, len });
        self.next_region += 1;
        bus
    }
}
