//! 16550-compatible UART of the Croc SoC.

use {
    core::fmt::Write,
    croc_csr::{
        utra::uart::{
            DLL, DLM, IER, IIR_FCR, LCR_DLAB, LCR_WLS, LSR_DR, LSR_TEMT, LSR_THRE, MCR_LOOP,
            RBR_THR,
        },
        CSR, HW_UART_BASE,
    },
};

/// 8 data bits, no parity, one stop bit.
const WORD_LEN_8: u32 = 0b11;

/// Enable the FIFOs and clear both of them.
const FCR_ENABLE_AND_CLEAR: u32 = 0b111;

/// Depth of the receive FIFO.
pub const FIFO_DEPTH: usize = 16;

pub struct Uart {
    base_addr: usize,
}

impl Default for Uart {
    fn default() -> Self {
        Uart::new()
    }
}

impl Uart {
    pub fn new() -> Self {
        Self {
            base_addr: HW_UART_BASE,
        }
    }

    /// Creates `Uart` instance with a different base address.
    pub fn with_alt_base_addr(base_addr: usize) -> Self {
        Self { base_addr }
    }

    fn csr(&self) -> CSR<u32> {
        CSR::new(self.base_addr as *mut u32)
    }

    /// Programs the baud rate divisor and selects 8N1 framing. Interrupts
    /// stay disabled, the driver polls.
    pub fn init(&mut self, clock_hz: u32, baud: u32) {
        let divisor = (clock_hz / (16 * baud)).max(1);
        let mut csr = self.csr();

        csr.wo(IER, 0);
        csr.wfo(LCR_DLAB, 1);
        csr.wo(DLL, divisor & 0xff);
        csr.wo(DLM, (divisor >> 8) & 0xff);
        csr.wfo(LCR_WLS, WORD_LEN_8);
        csr.wo(IIR_FCR, FCR_ENABLE_AND_CLEAR);
    }

    /// Routes the transmitter back into the receiver.
    pub fn set_loopback(&mut self, enabled: bool) {
        self.csr().rmwf(MCR_LOOP, enabled as u32);
    }

    pub fn write_byte(&mut self, byte: u8) {
        let mut csr = self.csr();

        // Wait for room in the transmit holding register
        while csr.rf(LSR_THRE) == 0 {
            core::hint::spin_loop();
        }

        csr.wo(RBR_THR, byte as u32);
    }

    pub fn read_byte(&mut self) -> Option<u8> {
        let csr = self.csr();
        if csr.rf(LSR_DR) == 0 {
            return None;
        }
        Some(csr.r(RBR_THR) as u8)
    }

    pub fn write_str(&mut self, s: &str) {
        for byte in s.as_bytes().iter() {
            self.write_byte(*byte);
        }
    }

    /// Polls `LSR.DR` at most `budget` times (at least once) for a byte.
    fn poll_byte(&mut self, budget: u32) -> Option<u8> {
        for _ in 0..budget.max(1) {
            if let Some(byte) = self.read_byte() {
                return Some(byte);
            }
            core::hint::spin_loop();
        }
        None
    }

    /// Sends `line` through the internal loopback path and checks that every
    /// byte comes back in order, waiting at most `poll_budget` polls for
    /// each. The line must fit the receive FIFO. Loopback is off again on
    /// return.
    pub fn loopback_check(&mut self, line: &str, poll_budget: u32) -> bool {
        let sent = line.as_bytes();
        if sent.is_empty() || sent.len() > FIFO_DEPTH {
            return false;
        }

        self.flush();
        self.set_loopback(true);
        // Drop stale receive data.
        for _ in 0..FIFO_DEPTH {
            if self.read_byte().is_none() {
                break;
            }
        }
        self.write_str(line);

        let matched = sent
            .iter()
            .all(|want| self.poll_byte(poll_budget) == Some(*want));

        self.flush();
        self.set_loopback(false);
        matched
    }

    /// Blocks until the last byte has left the shift register.
    pub fn flush(&mut self) {
        let csr = self.csr();
        while csr.rf(LSR_TEMT) == 0 {
            core::hint::spin_loop();
        }
    }
}

impl Write for Uart {
    fn write_str(&mut self, s: &str) -> core::fmt::Result {
        Uart::write_str(self, s);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use {
        super::*,
        croc_csr::utra::uart::{LCR, LSR, MCR, UART_NUMREGS},
    };

    fn idle_window() -> [u32; UART_NUMREGS] {
        let mut window = [0u32; UART_NUMREGS];
        window[LSR.offset()] = LSR_THRE.shifted_mask() | LSR_TEMT.shifted_mask();
        window
    }

    #[test]
    fn init_programs_divisor_and_framing() {
        let mut window = idle_window();
        let mut uart = Uart::with_alt_base_addr(window.as_mut_ptr() as usize);

        uart.init(50_000_000, 115_200);

        // DLL/DLM alias RBR_THR/IER while DLAB is set.
        assert_eq!(window[DLL.offset()], 27);
        assert_eq!(window[DLM.offset()], 0);
        assert_eq!(window[LCR.offset()], WORD_LEN_8);
        assert_eq!(window[IIR_FCR.offset()], FCR_ENABLE_AND_CLEAR);
    }

    #[test]
    fn writes_go_through_thr() {
        let mut window = idle_window();
        let mut uart = Uart::with_alt_base_addr(window.as_mut_ptr() as usize);

        write!(uart, "ok {}", 7).unwrap();
        uart.flush();

        assert_eq!(window[RBR_THR.offset()], b'7' as u32);
    }

    #[test]
    fn read_byte_needs_data_ready() {
        let mut window = idle_window();
        window[RBR_THR.offset()] = b'x' as u32;
        let mut uart = Uart::with_alt_base_addr(window.as_mut_ptr() as usize);

        assert_eq!(uart.read_byte(), None);
        window[LSR.offset()] |= LSR_DR.shifted_mask();
        assert_eq!(uart.read_byte(), Some(b'x'));
    }

    #[test]
    fn loopback_toggles_mcr_bit() {
        let mut window = idle_window();
        window[MCR.offset()] = 0b11;
        let mut uart = Uart::with_alt_base_addr(window.as_mut_ptr() as usize);

        uart.set_loopback(true);
        assert_eq!(window[MCR.offset()], 0b1_0011);
        uart.set_loopback(false);
        assert_eq!(window[MCR.offset()], 0b11);
    }

    #[test]
    fn loopback_check_gives_up_without_data() {
        let mut window = idle_window();
        let mut uart = Uart::with_alt_base_addr(window.as_mut_ptr() as usize);

        assert!(!uart.loopback_check("ping", 8));
        assert_eq!(window[RBR_THR.offset()], b'g' as u32);
        assert_eq!(window[MCR.offset()] & MCR_LOOP.shifted_mask(), 0);
    }

    #[test]
    fn loopback_check_compares_echoed_bytes() {
        let mut window = idle_window();
        window[LSR.offset()] |= LSR_DR.shifted_mask();
        let mut uart = Uart::with_alt_base_addr(window.as_mut_ptr() as usize);

        // The holding register cell echoes the last byte written.
        assert!(uart.loopback_check("x", 8));
        assert!(!uart.loopback_check("xy", 8));
        assert!(!uart.loopback_check("", 8));
        assert!(!uart.loopback_check("seventeen bytes!!", 8));
        assert_eq!(window[MCR.offset()] & MCR_LOOP.shifted_mask(), 0);
    }
}
