//! DMA engine self-test.
//!
//! The accelerator's DMA engine moves between one and [`MAX_DMA_LEN`] bytes
//! starting at any byte of a word. Both directions are checked for every
//! length and all four start offsets; every combination is verified byte by
//! byte and reported as soon as it finishes.

use {
    crate::{
        error::{Error, Result},
        regs::{Reg, RegisterInterface},
        status::{Poller, Status},
    },
    core::{
        fmt::{self, Write},
        sync::atomic::{compiler_fence, Ordering::SeqCst},
    },
};

/// Longest transfer, three result words.
pub const MAX_DMA_LEN: usize = 12;

/// Start offsets within a word.
pub const OFFSETS: usize = 4;

/// Bytes cleared in the destination before every write-path combination.
const MIN_CLEAR_LEN: usize = 12;

/// Every memory buffer used for DMA must be aligned to 4 bytes.
#[derive(Debug, Clone, Copy)]
#[repr(C)]
#[repr(align(4))]
pub struct Buffer<const N: usize>(pub [u8; N]);

impl<const N: usize> Buffer<N> {
    pub const fn zeroed() -> Self {
        Buffer([0; N])
    }

    /// Copies `bytes` to the start of a zeroed buffer.
    pub fn with_prefix(bytes: &[u8]) -> Self {
        let mut buf = Self::zeroed();
        let n = bytes.len().min(N);
        buf.0[..n].copy_from_slice(&bytes[..n]);
        buf
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Direction {
    /// Device reads memory, result comes back through `RDATA`.
    Read,
    /// CPU feeds `DATA_IN`, device writes memory.
    Write,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Read => f.write_str("read"),
            Direction::Write => f.write_str("write"),
        }
    }
}

/// One DMA transfer: `len` bytes starting `offset` bytes into the word at
/// bus address `addr`.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Transfer {
    pub direction: Direction,
    pub addr: u32,
    pub len: usize,
    pub offset: usize,
}

impl Transfer {
    pub fn new(direction: Direction, addr: u32, len: usize, offset: usize) -> Result<Self> {
        check_len(len)?;
        if offset >= OFFSETS {
            return Err(Error::InvalidLength {
                len: offset,
                max: OFFSETS - 1,
            });
        }
        Ok(Self {
            direction,
            addr,
            len,
            offset,
        })
    }

    /// Bus address of the first byte.
    pub fn start(&self) -> u32 {
        self.addr.wrapping_add(self.offset as u32)
    }
}

/// Number of `RDATA` words holding a read-path result of `len` bytes.
pub const fn result_words(len: usize) -> usize {
    if len <= 4 {
        1
    } else if len <= 8 {
        2
    } else {
        3
    }
}

/// Outcome of one (length, offset) combination.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Verification {
    pub direction: Direction,
    pub len: usize,
    pub offset: usize,
    /// Bytes that differ from the expected memory image.
    pub mismatches: u32,
}

impl Verification {
    pub fn passed(&self) -> bool {
        self.mismatches == 0
    }
}

impl fmt::Display for Verification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "DMA {} len {:2} offset {}: ",
            self.direction, self.len, self.offset
        )?;
        if self.passed() {
            f.write_str("passed")
        } else {
            write!(f, "FAILED ({} bytes mismatched)", self.mismatches)
        }
    }
}

/// Totals of one test matrix.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct MatrixReport {
    pub direction: Direction,
    pub combinations: u32,
    pub failures: u32,
    mismatched_bytes: u32,
}

impl MatrixReport {
    fn new(direction: Direction) -> Self {
        Self {
            direction,
            combinations: 0,
            failures: 0,
            mismatched_bytes: 0,
        }
    }

    /// Mismatched bytes over all combinations.
    pub fn mismatches(&self) -> u32 {
        self.mismatched_bytes
    }

    pub fn passed(&self) -> bool {
        self.failures == 0
    }

    fn record<W: Write>(&mut self, out: &mut W, v: Verification) {
        writeln!(out, "{v}").ok();
        if v.passed() {
            log::debug!("{}", v);
        } else {
            log::warn!("{}", v);
            self.failures += 1;
        }
        self.combinations += 1;
        self.mismatched_bytes += v.mismatches;
    }
}

impl fmt::Display for MatrixReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "DMA {}: {} of {} combinations failed, {} bytes mismatched",
            self.direction, self.failures, self.combinations, self.mismatched_bytes
        )
    }
}

fn check_len(len: usize) -> Result<()> {
    if !(1..=MAX_DMA_LEN).contains(&len) {
        return Err(Error::InvalidLength {
            len,
            max: MAX_DMA_LEN,
        });
    }
    Ok(())
}

fn check_size(actual: usize, needed: usize) -> Result<()> {
    if actual < needed {
        return Err(Error::BufferTooSmall { needed, actual });
    }
    Ok(())
}

/// Destination bytes cleared and verified for a write-path matrix.
pub const fn write_window(max_len: usize) -> usize {
    let span = if max_len + OFFSETS - 1 > MIN_CLEAR_LEN {
        max_len + OFFSETS - 1
    } else {
        MIN_CLEAR_LEN
    };
    (span + 3) & !3
}

fn report_abort<W: Write>(out: &mut W, t: &Transfer, err: Error) -> Error {
    writeln!(
        out,
        "DMA {} len {:2} offset {}: aborted: {}",
        t.direction, t.len, t.offset, err
    )
    .ok();
    err
}

/// Runs one read-path transfer and returns the result bytes. Only the first
/// `transfer.len` bytes are meaningful.
pub fn read_transfer<R: RegisterInterface>(
    regs: &mut R,
    poller: &Poller,
    transfer: &Transfer,
) -> Result<[u8; MAX_DMA_LEN]> {
    // Writing the source address starts the transfer.
    regs.write(Reg::DmaRead, transfer.start());
    poller.wait_status(regs, Status::DMA_RD_DONE)?;

    let mut bytes = [0u8; MAX_DMA_LEN];
    for (reg, word) in Reg::RDATA
        .iter()
        .zip(bytes.chunks_exact_mut(4))
        .take(result_words(transfer.len))
    {
        word.copy_from_slice(&regs.read(*reg).to_le_bytes());
    }
    Ok(bytes)
}

/// Runs one write-path transfer, feeding `data` one word at a time.
pub fn write_transfer<R: RegisterInterface>(
    regs: &mut R,
    poller: &Poller,
    transfer: &Transfer,
    data: &[u8],
) -> Result<()> {
    check_size(data.len(), transfer.len)?;

    regs.write(Reg::DmaWrite, transfer.start());
    for chunk in data[..transfer.len].chunks(4) {
        poller.wait_status(regs, Status::DMA_WR_READY)?;
        let mut word = [0u8; 4];
        word[..chunk.len()].copy_from_slice(chunk);
        regs.write(Reg::DataIn, u32::from_le_bytes(word));
    }
    poller.wait_status(regs, Status::DMA_WR_DONE)?;
    Ok(())
}

/// Read-path matrix: for every length up to `max_len` and every offset, the
/// device reads `source[offset..offset + len]` and the result words must
/// match it exactly.
///
/// `source` must hold `max_len + 3` bytes. Mismatches are reported and
/// counted; a timeout aborts the matrix.
pub fn test_dma_read<R, W, const N: usize>(
    regs: &mut R,
    out: &mut W,
    poller: &Poller,
    source: &Buffer<N>,
    max_len: usize,
) -> Result<MatrixReport>
where
    R: RegisterInterface,
    W: Write,
{
    check_len(max_len)?;
    check_size(N, max_len + OFFSETS - 1)?;

    let base = regs.bus_address(source.0.as_ptr(), N);
    let mut report = MatrixReport::new(Direction::Read);

    for len in 1..=max_len {
        regs.write(Reg::Len, len as u32);

        for offset in 0..OFFSETS {
            let transfer = Transfer::new(Direction::Read, base, len, offset)?;
            let result = read_transfer(regs, poller, &transfer)
                .map_err(|e| report_abort(out, &transfer, e))?;

            let expected = &source.0[offset..offset + len];
            let mismatches = result[..len]
                .iter()
                .zip(expected)
                .filter(|(got, want)| got != want)
                .count() as u32;

            report.record(
                out,
                Verification {
                    direction: Direction::Read,
                    len,
                    offset,
                    mismatches,
                },
            );
        }
    }

    Ok(report)
}

/// Write-path matrix: for every length up to `max_len` and every offset, the
/// device writes `test_data[..len]` to `dest` starting at `offset`.
///
/// The destination is cleared before each combination, since the device only
/// writes `len` bytes and residue from the previous combination would hide a
/// short write. Bytes outside `[offset, offset + len)` must stay zero.
pub fn test_dma_write<R, W, const N: usize>(
    regs: &mut R,
    out: &mut W,
    poller: &Poller,
    test_data: &[u8],
    max_len: usize,
    dest: &mut Buffer<N>,
) -> Result<MatrixReport>
where
    R: RegisterInterface,
    W: Write,
{
    check_len(max_len)?;
    check_size(test_data.len(), max_len)?;
    let window = write_window(max_len);
    check_size(N, window)?;

    let mut report = MatrixReport::new(Direction::Write);

    for len in 1..=max_len {
        regs.write(Reg::Len, len as u32);

        for offset in 0..OFFSETS {
            dest.0[..window].fill(0);
            compiler_fence(SeqCst);

            let base = regs.bus_address(dest.0.as_mut_ptr() as *const u8, N);
            let transfer = Transfer::new(Direction::Write, base, len, offset)?;
            write_transfer(regs, poller, &transfer, test_data)
                .map_err(|e| report_abort(out, &transfer, e))?;
            compiler_fence(SeqCst);

            let mismatches = verify_write(&dest.0[..window], &test_data[..len], offset);
            report.record(
                out,
                Verification {
                    direction: Direction::Write,
                    len,
                    offset,
                    mismatches,
                },
            );
        }
    }

    Ok(report)
}

/// Compares the cleared destination window against `data` placed at
/// `offset` with zeros everywhere else.
fn verify_write(window: &[u8], data: &[u8], offset: usize) -> u32 {
    let mut mismatches = 0;
    for i in 0..window.len() {
        let expected = if i >= offset && i < offset + data.len() {
            data[i - offset]
        } else {
            0
        };
        // Written by the DMA engine behind the compiler's back.
        let got = unsafe { window.as_ptr().add(i).read_volatile() };
        if got != expected {
            mismatches += 1;
        }
    }
    mismatches
}

#[cfg(test)]
mod tests {
    extern crate std;

    use {
        super::*,
        crate::mock::{device, Access, AccessKind, Fault},
        std::string::String,
    };

    const PT: [u8; 9] = [0x32, 0x3B, 0x41, 0xEE, 0x00, 0xAE, 0x8A, 0x14, 0xAA];

    fn source() -> Buffer<16> {
        let mut buf = Buffer::with_prefix(&PT);
        buf.0[9..].copy_from_slice(&[0x5c, 0x71, 0x03, 0xd9, 0x60, 0x2f, 0xe4]);
        buf
    }

    #[test]
    fn result_word_count() {
        assert_eq!(result_words(1), 1);
        assert_eq!(result_words(4), 1);
        assert_eq!(result_words(5), 2);
        assert_eq!(result_words(8), 2);
        assert_eq!(result_words(9), 3);
        assert_eq!(result_words(12), 3);
    }

    #[test]
    fn write_window_covers_every_offset() {
        assert_eq!(write_window(1), 12);
        assert_eq!(write_window(9), 12);
        assert_eq!(write_window(10), 16);
        assert_eq!(write_window(MAX_DMA_LEN), 16);
    }

    #[test]
    fn transfer_descriptor_limits() {
        assert!(Transfer::new(Direction::Read, 0, 0, 0).is_err());
        assert!(Transfer::new(Direction::Read, 0, 13, 0).is_err());
        assert!(Transfer::new(Direction::Write, 0, 4, 4).is_err());
        let t = Transfer::new(Direction::Write, 0x1000, 12, 3).unwrap();
        assert_eq!(t.start(), 0x1003);
        let top = Transfer::new(Direction::Read, u32::MAX - 1, 4, 3).unwrap();
        assert_eq!(top.start(), 1);
    }

    #[test]
    fn nine_bytes_at_offset_two_fetch_three_words() {
        let mut dev = device();
        let src = source();
        let base = dev.bus_address(src.0.as_ptr(), 16);
        dev.write(Reg::Len, 9);
        dev.set_tracing(true);

        let t = Transfer::new(Direction::Read, base, 9, 2).unwrap();
        let bytes = read_transfer(&mut dev, &Poller::bounded(100), &t).unwrap();

        assert_eq!(&bytes[..9], &src.0[2..11]);
        let rdata_reads = dev
            .trace()
            .iter()
            .filter(|a| a.kind == AccessKind::Read && Reg::RDATA.contains(&a.reg))
            .count();
        assert_eq!(rdata_reads, 3);
        assert_eq!(
            dev.trace()[0],
            Access {
                kind: AccessKind::Write,
                reg: Reg::DmaRead,
                value: base + 2,
            }
        );
    }

    #[test]
    fn read_matrix_passes_on_a_healthy_device() {
        let mut dev = device();
        let mut out = String::new();

        let report =
            test_dma_read(&mut dev, &mut out, &Poller::bounded(100), &source(), MAX_DMA_LEN)
                .unwrap();

        assert!(report.passed());
        assert_eq!(report.combinations, 48);
        assert_eq!(report.mismatches(), 0);
        assert_eq!(out.lines().count(), 48);
        assert!(out.lines().all(|l| l.ends_with("passed")));
        assert_eq!(dev.violations(), 0);
    }

    #[test]
    fn read_mismatch_is_reported_and_matrix_continues() {
        let mut dev = device();
        dev.set_fault(Some(Fault::FlipReadByte { len: 5, offset: 1 }));
        let mut out = String::new();

        let report = test_dma_read(&mut dev, &mut out, &Poller::bounded(100), &source(), 8).unwrap();

        assert_eq!(report.combinations, 32);
        assert_eq!(report.failures, 1);
        assert_eq!(report.mismatches(), 1);
        let failed: std::vec::Vec<_> = out.lines().filter(|l| l.contains("FAILED")).collect();
        assert_eq!(failed, ["DMA read len  5 offset 1: FAILED (1 bytes mismatched)"]);
    }

    #[test]
    fn write_matrix_leaves_outside_bytes_zero() {
        let mut dev = device();
        let mut dest = Buffer::<16>::zeroed();
        let data = [0xa1, 0xb2, 0xc3, 0xd4, 0xe5, 0xf6, 0x07, 0x18, 0x29, 0x3a, 0x4b, 0x5c];
        let mut out = String::new();

        let report = test_dma_write(
            &mut dev,
            &mut out,
            &Poller::bounded(100),
            &data,
            MAX_DMA_LEN,
            &mut dest,
        )
        .unwrap();

        assert!(report.passed(), "{out}");
        assert_eq!(report.combinations, 48);
        // Last combination: 12 bytes at offset 3.
        assert_eq!(dest.0[0..3], [0, 0, 0]);
        assert_eq!(dest.0[3..15], data);
        assert_eq!(dest.0[15], 0);
        assert_eq!(dev.violations(), 0);
    }

    #[test]
    fn spilled_write_counts_outside_bytes() {
        let mut dev = device();
        dev.set_fault(Some(Fault::WriteWholeWords));
        let mut dest = Buffer::<12>::zeroed();
        let data = [0x11u8, 0x22, 0x33, 0x44];
        let mut out = String::new();

        let report =
            test_dma_write(&mut dev, &mut out, &Poller::bounded(100), &data, 4, &mut dest).unwrap();

        // A transfer of len < 4 spills 4 - len bytes past its window.
        assert_eq!(report.combinations, 16);
        assert_eq!(report.failures, 12);
        assert_eq!(report.mismatches(), 4 * (3 + 2 + 1));
        assert!(out.contains("DMA write len  1 offset 3: FAILED (3 bytes mismatched)"));
        assert!(out.contains("DMA write len  4 offset 2: passed"));
        assert_eq!(dev.violations(), 0);
    }

    #[test]
    fn short_buffers_are_rejected() {
        let mut dev = device();
        let mut out = String::new();
        let poller = Poller::bounded(10);

        assert_eq!(
            test_dma_read(&mut dev, &mut out, &poller, &Buffer::<12>::zeroed(), 12),
            Err(Error::BufferTooSmall {
                needed: 15,
                actual: 12
            })
        );
        assert!(matches!(
            test_dma_read(&mut dev, &mut out, &poller, &source(), 13),
            Err(Error::InvalidLength { len: 13, .. })
        ));
        assert!(matches!(
            test_dma_write(&mut dev, &mut out, &poller, &[0; 3], 4, &mut Buffer::<16>::zeroed()),
            Err(Error::BufferTooSmall { needed: 4, actual: 3 })
        ));
        assert!(out.is_empty());
    }

    #[test]
    fn timeout_aborts_and_is_reported() {
        let mut dev = device();
        dev.stall(Status::DMA_WR_DONE);
        let mut dest = Buffer::<16>::zeroed();
        let mut out = String::new();

        let err = test_dma_write(&mut dev, &mut out, &Poller::bounded(20), &[1, 2, 3, 4], 4, &mut dest)
            .unwrap_err();

        assert!(matches!(err, Error::DeviceTimeout { reg: Reg::Status, .. }));
        assert_eq!(out.lines().count(), 1);
        assert!(out.starts_with("DMA write len  1 offset 0: aborted"));
    }
}
