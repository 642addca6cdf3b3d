//! Power-on self-test of the accelerator.
//!
//! Prints the identification word, runs the DMA matrices in both directions
//! and checks one ASCON-128 known-answer vector. Every step streams its
//! results to the console as it goes.

use {
    crate::{
        ascon::{Ascon, Tag, TAG_LEN},
        dma::{self, Buffer, MatrixReport, MAX_DMA_LEN},
        error::Result,
        regs::{Reg, RegisterInterface},
        status::Poller,
    },
    core::fmt::{self, Write},
};

pub const KEY: [u8; 16] = [
    0x90, 0xE4, 0x15, 0xD6, 0x42, 0xBF, 0xCD, 0x59, 0xF1, 0xFC, 0xCA, 0x19, 0x6B, 0x3B, 0xB3, 0x09,
];
pub const NONCE: [u8; 16] = [
    0x8C, 0xEE, 0x7C, 0xDD, 0x81, 0x83, 0xCA, 0x6A, 0xA2, 0xDC, 0x9B, 0x8B, 0x20, 0xA1, 0x6E, 0x8E,
];
pub const AD: [u8; 9] = [0x2B, 0x0A, 0x5B, 0x7A, 0x81, 0xDE, 0x31, 0x73, 0xE2];
pub const PLAINTEXT: [u8; 9] = [0x32, 0x3B, 0x41, 0xEE, 0x00, 0xAE, 0x8A, 0x14, 0xAA];
pub const CIPHERTEXT: [u8; 9] = [0x3C, 0x71, 0xC7, 0xBA, 0xDE, 0x48, 0x01, 0x2E, 0x1D];
pub const TAG: [u8; TAG_LEN] = [
    0xB2, 0x6E, 0x66, 0xA8, 0xA5, 0x5D, 0x6A, 0x93, 0x28, 0xD8, 0xD0, 0x5B, 0xC1, 0x67, 0x8A, 0x3E,
];

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Summary {
    pub magic: u32,
    pub dma_read: MatrixReport,
    pub dma_write: MatrixReport,
    pub ciphertext_ok: bool,
    pub tag_ok: bool,
}

impl Summary {
    pub fn passed(&self) -> bool {
        self.dma_read.passed() && self.dma_write.passed() && self.ciphertext_ok && self.tag_ok
    }
}

impl fmt::Display for Summary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", self.dma_read)?;
        writeln!(f, "{}", self.dma_write)?;
        writeln!(
            f,
            "ASCON KAT: ciphertext {}, tag {}",
            pass_fail(self.ciphertext_ok),
            pass_fail(self.tag_ok)
        )?;
        write!(f, "self-test {}", pass_fail(self.passed()))
    }
}

/// DMA test data: the expected ciphertext followed by the start of the tag.
///
/// No byte is zero, so a transfer that stops short never matches the
/// cleared destination or an unread result word.
fn dma_pattern() -> [u8; 16] {
    let mut pattern = [0u8; 16];
    pattern[..CIPHERTEXT.len()].copy_from_slice(&CIPHERTEXT);
    pattern[CIPHERTEXT.len()..].copy_from_slice(&TAG[..16 - CIPHERTEXT.len()]);
    pattern
}

fn pass_fail(ok: bool) -> &'static str {
    if ok {
        "passed"
    } else {
        "FAILED"
    }
}

fn write_hex<W: Write>(out: &mut W, label: &str, bytes: &[u8]) {
    let mut buf = [0u8; 2 * TAG_LEN];
    let bytes = &bytes[..bytes.len().min(TAG_LEN)];
    let hex = &mut buf[..2 * bytes.len()];
    if hex::encode_to_slice(bytes, hex).is_err() {
        return;
    }
    if let Ok(s) = core::str::from_utf8(hex) {
        writeln!(out, "{label:>4} = {s}").ok();
    }
}

/// Runs the whole self-test on `regs`, reporting to `out`.
///
/// Mismatches are part of the returned [`Summary`]; only a device that stops
/// responding ends the run early.
pub fn run<R, W>(regs: &mut R, out: &mut W, poller: Poller) -> Result<Summary>
where
    R: RegisterInterface,
    W: Write,
{
    let magic = regs.read(Reg::Magic);
    writeln!(out, "MAGIC = {magic:#010x}").ok();
    log::info!("accelerator magic {:#010x}", magic);

    let pattern = dma_pattern();
    let source = Buffer::<16>::with_prefix(&pattern);
    let test_data = &pattern[..MAX_DMA_LEN];
    let mut dest = Buffer::<16>::zeroed();

    let dma_read = dma::test_dma_read(regs, out, &poller, &source, MAX_DMA_LEN)?;
    writeln!(out, "{dma_read}").ok();
    let dma_write = dma::test_dma_write(regs, out, &poller, test_data, MAX_DMA_LEN, &mut dest)?;
    writeln!(out, "{dma_write}").ok();

    writeln!(out, "ASCON test").ok();
    let mut ct = [0u8; PLAINTEXT.len()];
    let mut ascon = Ascon::new(&mut *regs, poller);
    let Tag(tag) = ascon.encrypt(&KEY, &NONCE, &AD, &PLAINTEXT, &mut ct)?;
    write_hex(out, "CT", &ct);
    write_hex(out, "TAG", &tag);

    let summary = Summary {
        magic,
        dma_read,
        dma_write,
        ciphertext_ok: ct == CIPHERTEXT,
        tag_ok: tag == TAG,
    };
    if !summary.passed() {
        log::warn!("self-test failed");
    }
    Ok(summary)
}
