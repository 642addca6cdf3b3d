//! ASCON accelerator sequencer.
//!
//! A run is five phases, each a command word, a data pointer and a wait on
//! the phase's completion bit:
//!
//! `Idle -> KeySent -> NonceSent -> AdSent -> MessageStreamed -> TagRetrieved`
//!
//! Phases can't be skipped or repeated. A failed phase drops the sequencer
//! back to `Idle`; loading a new key starts over from either end of the chain.

use {
    crate::{
        command::{Command, DataType, Mode},
        error::{Error, Result},
        regs::{Reg, RegisterInterface},
        status::{Poller, Status},
    },
    core::sync::atomic::{compiler_fence, Ordering::SeqCst},
    croc_csr::utra::ascon,
};

pub const KEY_LEN: usize = 16;
pub const NONCE_LEN: usize = 16;
pub const TAG_LEN: usize = 16;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Phase {
    Idle,
    KeySent,
    NonceSent,
    AdSent,
    MessageStreamed,
    TagRetrieved,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Tag(pub [u8; TAG_LEN]);

/// Buffers of one authenticated encryption or decryption.
pub struct Job<'a> {
    pub mode: Mode,
    pub key: &'a [u8; KEY_LEN],
    pub nonce: &'a [u8; NONCE_LEN],
    pub ad: &'a [u8],
    /// Plaintext when encrypting, ciphertext when decrypting.
    pub input: &'a [u8],
    /// Receives the transformed input, at least `input.len()` bytes.
    pub output: &'a mut [u8],
}

pub struct Ascon<R> {
    regs: R,
    poller: Poller,
    phase: Phase,
    mode: Mode,
}

impl<R: RegisterInterface> Ascon<R> {
    pub fn new(regs: R, poller: Poller) -> Self {
        Self {
            regs,
            poller,
            phase: Phase::Idle,
            mode: Mode::Encrypt,
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Identification word of the device.
    pub fn magic(&mut self) -> u32 {
        self.regs.read(Reg::Magic)
    }

    pub fn release(self) -> R {
        self.regs
    }

    fn require(&self, expected: Phase) -> Result<()> {
        if self.phase != expected {
            return Err(Error::PhaseOrder {
                expected,
                actual: self.phase,
            });
        }
        Ok(())
    }

    fn enter(&mut self, next: Phase) {
        log::debug!("ascon: {:?} -> {:?}", self.phase, next);
        self.phase = next;
    }

    fn set_len(&mut self, len: usize) -> Result<()> {
        check_len(len)?;
        self.regs.write(Reg::Len, len as u32);
        Ok(())
    }

    /// Moves on to `next` if `step` succeeded. Any failure leaves the
    /// sequencer idle, ready for a new key.
    fn finish<T>(&mut self, step: Result<T>, next: Phase) -> Result<T> {
        match step {
            Ok(value) => {
                self.enter(next);
                Ok(value)
            }
            Err(e) => {
                log::warn!("ascon: {:?} aborted: {}", self.phase, e);
                self.phase = Phase::Idle;
                Err(e)
            }
        }
    }

    /// Writes the command, points the device at `data` through `reg` and
    /// waits for `done`.
    fn send(&mut self, cmd: Command, reg: Reg, data: &[u8], done: Status) -> Result<()> {
        self.regs.write(Reg::Cmd, cmd.encode());
        let addr = self.regs.bus_address(data.as_ptr(), data.len());
        self.regs.write(reg, addr);

        self.poller.wait_status(&mut self.regs, done)?;
        Ok(())
    }

    pub fn load_key(&mut self, mode: Mode, key: &[u8; KEY_LEN]) -> Result<()> {
        if !matches!(self.phase, Phase::Idle | Phase::TagRetrieved) {
            return Err(Error::PhaseOrder {
                expected: Phase::Idle,
                actual: self.phase,
            });
        }
        self.phase = Phase::Idle;
        self.mode = mode;

        // The key port is untyped; its header announces the nonce segment.
        let cmd = Command::new(mode, DataType::Nonce).eot(true);
        let sent = self.send(cmd, Reg::KeyAddr, key, Status::KEY_DONE);
        self.finish(sent, Phase::KeySent)
    }

    pub fn load_nonce(&mut self, nonce: &[u8; NONCE_LEN]) -> Result<()> {
        self.require(Phase::KeySent)?;

        let cmd = Command::new(self.mode, DataType::Nonce).eot(true);
        let sent = self.send(cmd, Reg::NonceAddr, nonce, Status::NONCE_DONE);
        self.finish(sent, Phase::NonceSent)
    }

    pub fn load_ad(&mut self, ad: &[u8]) -> Result<()> {
        self.require(Phase::NonceSent)?;

        let sent = self.send_ad(ad);
        self.finish(sent, Phase::AdSent)
    }

    fn send_ad(&mut self, ad: &[u8]) -> Result<()> {
        self.set_len(ad.len())?;
        let cmd = Command::new(self.mode, DataType::Ad).eot(true);
        self.send(cmd, Reg::AdAddr, ad, Status::AD_DONE)
    }

    /// Streams `input` through the cipher core; the device writes the result
    /// to `output`.
    pub fn stream_message(&mut self, input: &[u8], output: &mut [u8]) -> Result<()> {
        self.require(Phase::AdSent)?;

        let sent = self.send_message(input, output);
        self.finish(sent, Phase::MessageStreamed)
    }

    fn send_message(&mut self, input: &[u8], output: &mut [u8]) -> Result<()> {
        check_output(input, output)?;

        self.set_len(input.len())?;
        let out_addr = self
            .regs
            .bus_address(output.as_mut_ptr() as *const u8, output.len());
        self.regs.write(Reg::OutAddr, out_addr);

        let cmd = Command::new(self.mode, DataType::Msg).eot(true).eoi(true);
        self.send(cmd, Reg::MsgAddr, input, Status::MSG_DONE)?;
        // `output` was written by the device.
        compiler_fence(SeqCst);
        Ok(())
    }

    /// Pops the tag out of `BDO`, one word per `BDO_VALID`.
    pub fn retrieve_tag(&mut self) -> Result<Tag> {
        self.require(Phase::MessageStreamed)?;

        let tag = self.read_tag();
        self.finish(tag, Phase::TagRetrieved)
    }

    fn read_tag(&mut self) -> Result<Tag> {
        let cmd = Command::new(self.mode, DataType::Tag).eoo(true);
        self.regs.write(Reg::Cmd, cmd.encode());

        let mut tag = [0u8; TAG_LEN];
        for word in tag.chunks_exact_mut(4) {
            self.poller.wait_status(&mut self.regs, Status::BDO_VALID)?;
            word.copy_from_slice(&self.regs.read(Reg::Bdo).to_le_bytes());
        }
        Ok(Tag(tag))
    }

    /// Runs all five phases. Buffer sizes are checked before the device is
    /// touched.
    pub fn run(&mut self, job: Job<'_>) -> Result<Tag> {
        check_len(job.ad.len())?;
        check_output(job.input, job.output)?;
        check_len(job.input.len())?;

        self.load_key(job.mode, job.key)?;
        self.load_nonce(job.nonce)?;
        self.load_ad(job.ad)?;
        self.stream_message(job.input, job.output)?;
        self.retrieve_tag()
    }

    pub fn encrypt(
        &mut self,
        key: &[u8; KEY_LEN],
        nonce: &[u8; NONCE_LEN],
        ad: &[u8],
        plaintext: &[u8],
        ciphertext: &mut [u8],
    ) -> Result<Tag> {
        self.run(Job {
            mode: Mode::Encrypt,
            key,
            nonce,
            ad,
            input: plaintext,
            output: ciphertext,
        })
    }

    pub fn decrypt(
        &mut self,
        key: &[u8; KEY_LEN],
        nonce: &[u8; NONCE_LEN],
        ad: &[u8],
        ciphertext: &[u8],
        plaintext: &mut [u8],
    ) -> Result<Tag> {
        self.run(Job {
            mode: Mode::Decrypt,
            key,
            nonce,
            ad,
            input: ciphertext,
            output: plaintext,
        })
    }
}

fn check_len(len: usize) -> Result<()> {
    let max = ascon::LEN_LEN.mask();
    if len > max {
        return Err(Error::InvalidLength { len, max });
    }
    Ok(())
}

fn check_output(input: &[u8], output: &[u8]) -> Result<()> {
    if output.len() < input.len() {
        return Err(Error::BufferTooSmall {
            needed: input.len(),
            actual: output.len(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use {
        super::*,
        crate::{
            command::Fields,
            mock::{device, AccessKind},
        },
    };

    const KEY: [u8; 16] = [0x11; 16];
    const NONCE: [u8; 16] = [0x22; 16];

    #[test]
    fn phases_advance_in_order() {
        let mut dev = device();
        let mut ascon = Ascon::new(&mut dev, Poller::bounded(100));
        let mut ct = [0u8; 5];

        assert_eq!(ascon.phase(), Phase::Idle);
        ascon.load_key(Mode::Encrypt, &KEY).unwrap();
        assert_eq!(ascon.phase(), Phase::KeySent);
        ascon.load_nonce(&NONCE).unwrap();
        assert_eq!(ascon.phase(), Phase::NonceSent);
        ascon.load_ad(b"ad").unwrap();
        assert_eq!(ascon.phase(), Phase::AdSent);
        ascon.stream_message(b"hello", &mut ct).unwrap();
        assert_eq!(ascon.phase(), Phase::MessageStreamed);
        ascon.retrieve_tag().unwrap();
        assert_eq!(ascon.phase(), Phase::TagRetrieved);

        drop(ascon);
        assert_eq!(dev.violations(), 0);
    }

    #[test]
    fn out_of_order_phases_are_rejected() {
        let mut dev = device();
        let mut ascon = Ascon::new(&mut dev, Poller::bounded(100));

        assert_eq!(
            ascon.load_nonce(&NONCE),
            Err(Error::PhaseOrder {
                expected: Phase::KeySent,
                actual: Phase::Idle
            })
        );
        assert!(ascon.retrieve_tag().is_err());

        ascon.load_key(Mode::Encrypt, &KEY).unwrap();
        assert_eq!(
            ascon.load_key(Mode::Encrypt, &KEY),
            Err(Error::PhaseOrder {
                expected: Phase::Idle,
                actual: Phase::KeySent
            })
        );
        assert!(ascon.load_ad(&[]).is_err());
        assert_eq!(ascon.phase(), Phase::KeySent);
    }

    #[test]
    fn key_restarts_after_tag() {
        let mut dev = device();
        let mut ascon = Ascon::new(&mut dev, Poller::bounded(100));
        let mut ct = [0u8; 3];

        let first = ascon.encrypt(&KEY, &NONCE, b"", b"abc", &mut ct).unwrap();
        let second = ascon.encrypt(&KEY, &NONCE, b"", b"abc", &mut ct).unwrap();

        assert_eq!(first, second);
        drop(ascon);
        assert_eq!(dev.violations(), 0);
    }

    #[test]
    fn phase_commands() {
        let mut dev = device();
        dev.set_tracing(true);
        let mut ascon = Ascon::new(&mut dev, Poller::bounded(100));
        let mut pt = [0u8; 4];

        ascon.decrypt(&KEY, &NONCE, b"x", b"abcd", &mut pt).unwrap();
        drop(ascon);

        let cmds: std::vec::Vec<_> = dev
            .trace()
            .iter()
            .filter(|a| a.kind == AccessKind::Write && a.reg == Reg::Cmd)
            .map(|a| Fields::decode(a.value))
            .collect();
        let expect = |eot, eoi, ty: DataType, eoo| Fields {
            mode: 0,
            eot,
            eoi,
            ty: ty as u32,
            eoo,
        };
        assert_eq!(
            cmds,
            [
                expect(1, 0, DataType::Nonce, 0),
                expect(1, 0, DataType::Nonce, 0),
                expect(1, 0, DataType::Ad, 0),
                expect(1, 1, DataType::Msg, 0),
                expect(0, 0, DataType::Tag, 1),
            ]
        );
    }

    #[test]
    fn timeout_returns_to_idle() {
        let mut dev = device();
        dev.stall(Status::AD_DONE);
        let mut ascon = Ascon::new(&mut dev, Poller::bounded(30));

        ascon.load_key(Mode::Encrypt, &KEY).unwrap();
        ascon.load_nonce(&NONCE).unwrap();
        let err = ascon.load_ad(b"ad").unwrap_err();

        assert_eq!(
            err,
            Error::DeviceTimeout {
                reg: Reg::Status,
                mask: Status::AD_DONE.bits(),
                last: (Status::KEY_DONE | Status::NONCE_DONE).bits(),
            }
        );
        assert_eq!(ascon.phase(), Phase::Idle);
        assert!(ascon.load_key(Mode::Encrypt, &KEY).is_ok());
    }

    #[test]
    fn rejected_job_leaves_device_untouched() {
        let mut dev = device();
        dev.set_tracing(true);
        let mut ascon = Ascon::new(&mut dev, Poller::bounded(100));
        let mut short = [0u8; 2];
        let mut ct = [0u8; 3];

        assert_eq!(
            ascon.encrypt(&KEY, &NONCE, b"", b"abc", &mut short),
            Err(Error::BufferTooSmall {
                needed: 3,
                actual: 2
            })
        );
        assert_eq!(ascon.phase(), Phase::Idle);

        let ad = std::vec![0u8; 70_000];
        assert_eq!(
            ascon.encrypt(&KEY, &NONCE, &ad, b"abc", &mut ct),
            Err(Error::InvalidLength {
                len: 70_000,
                max: 0xffff
            })
        );
        assert_eq!(ascon.phase(), Phase::Idle);
        drop(ascon);
        assert!(dev.trace().is_empty());

        let mut ascon = Ascon::new(&mut dev, Poller::bounded(100));
        assert!(ascon.encrypt(&KEY, &NONCE, b"", b"abc", &mut ct).is_ok());
        assert_eq!(ascon.phase(), Phase::TagRetrieved);
    }

    #[test]
    fn failed_phase_returns_to_idle() {
        let mut dev = device();
        let mut ascon = Ascon::new(&mut dev, Poller::bounded(100));
        let mut short = [0u8; 2];
        let mut ct = [0u8; 3];

        ascon.load_key(Mode::Encrypt, &KEY).unwrap();
        ascon.load_nonce(&NONCE).unwrap();
        ascon.load_ad(b"").unwrap();
        assert!(matches!(
            ascon.stream_message(b"abc", &mut short),
            Err(Error::BufferTooSmall { .. })
        ));
        assert_eq!(ascon.phase(), Phase::Idle);

        ascon.load_key(Mode::Encrypt, &KEY).unwrap();
        ascon.load_nonce(&NONCE).unwrap();
        let ad = std::vec![0u8; 0x1_0000];
        assert!(matches!(
            ascon.load_ad(&ad),
            Err(Error::InvalidLength { .. })
        ));
        assert_eq!(ascon.phase(), Phase::Idle);

        assert!(ascon.encrypt(&KEY, &NONCE, b"", b"abc", &mut ct).is_ok());
        drop(ascon);
        assert_eq!(dev.violations(), 0);
    }
}
