//! Status register flags and the polling primitives every handshake is
//! built from.

use {
    crate::{
        error::Error,
        regs::{Reg, RegisterInterface},
    },
    bitflags::bitflags,
    croc_csr::utra::ascon,
};

/// Poll budget used by [`Poller::default`].
pub const DEFAULT_POLL_BUDGET: u32 = 1_000_000;

bitflags! {
    #[derive(Debug, Copy, Clone, PartialEq, Eq)]
    pub struct Status: u32 {
        /// Key consumed
        const KEY_DONE     = ascon::STATUS_KEY_DONE.shifted_mask();
        /// Nonce consumed
        const NONCE_DONE   = ascon::STATUS_NONCE_DONE.shifted_mask();
        /// Associated data consumed
        const AD_DONE      = ascon::STATUS_AD_DONE.shifted_mask();
        /// Message streamed through the cipher core
        const MSG_DONE     = ascon::STATUS_MSG_DONE.shifted_mask();
        /// A word is waiting in `BDO`
        const BDO_VALID    = ascon::STATUS_BDO_VALID.shifted_mask();
        /// Read-path DMA finished, result words are valid
        const DMA_RD_DONE  = ascon::STATUS_DMA_RD_DONE.shifted_mask();
        /// Write-path DMA accepts the next `DATA_IN` word
        const DMA_WR_READY = ascon::STATUS_DMA_WR_READY.shifted_mask();
        /// Write-path DMA finished writing to memory
        const DMA_WR_DONE  = ascon::STATUS_DMA_WR_DONE.shifted_mask();
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum WaitMode {
    /// At least one bit of the mask is set.
    AnySet,
    /// Every bit of the mask is set.
    AllSet,
}

impl WaitMode {
    pub fn satisfied(self, value: u32, mask: u32) -> bool {
        match self {
            WaitMode::AnySet => value & mask != 0,
            WaitMode::AllSet => value & mask == mask,
        }
    }
}

/// A status condition that never became true.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Timeout {
    pub reg: Reg,
    pub mask: u32,
    /// Last value sampled before giving up.
    pub last: u32,
}

impl From<Timeout> for Error {
    fn from(t: Timeout) -> Self {
        Error::DeviceTimeout {
            reg: t.reg,
            mask: t.mask,
            last: t.last,
        }
    }
}

/// Blocks until `reg & mask` satisfies `mode`. Never returns if the device
/// stops responding.
pub fn wait_until<R: RegisterInterface>(regs: &mut R, reg: Reg, mask: u32, mode: WaitMode) {
    while !mode.satisfied(regs.read(reg), mask) {}
}

/// Like [`wait_until`], giving up after `max_iterations` samples. The
/// register is always sampled at least once.
pub fn wait_until_or_timeout<R: RegisterInterface>(
    regs: &mut R,
    reg: Reg,
    mask: u32,
    mode: WaitMode,
    max_iterations: u32,
) -> Result<(), Timeout> {
    let mut last = 0;
    for _ in 0..max_iterations.max(1) {
        last = regs.read(reg);
        if mode.satisfied(last, mask) {
            return Ok(());
        }
    }

    log::warn!(
        "{} & {:#010x} not set after {} polls (last {:#010x})",
        reg.name(),
        mask,
        max_iterations,
        last
    );
    Err(Timeout { reg, mask, last })
}

/// How long the drivers are allowed to wait on a status bit.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Poller {
    budget: Option<u32>,
}

impl Default for Poller {
    fn default() -> Self {
        if cfg!(feature = "unbounded-poll") {
            Poller::unbounded()
        } else {
            Poller::bounded(DEFAULT_POLL_BUDGET)
        }
    }
}

impl Poller {
    pub const fn unbounded() -> Self {
        Self { budget: None }
    }

    pub const fn bounded(max_iterations: u32) -> Self {
        Self {
            budget: Some(max_iterations),
        }
    }

    pub fn budget(&self) -> Option<u32> {
        self.budget
    }

    pub fn wait<R: RegisterInterface>(
        &self,
        regs: &mut R,
        reg: Reg,
        mask: u32,
        mode: WaitMode,
    ) -> Result<(), Timeout> {
        match self.budget {
            Some(max_iterations) => wait_until_or_timeout(regs, reg, mask, mode, max_iterations),
            None => {
                wait_until(regs, reg, mask, mode);
                Ok(())
            }
        }
    }

    /// Waits until every flag of `flags` is set in `STATUS`.
    pub fn wait_status<R: RegisterInterface>(
        &self,
        regs: &mut R,
        flags: Status,
    ) -> Result<(), Timeout> {
        self.wait(regs, Reg::Status, flags.bits(), WaitMode::AllSet)
    }
}
