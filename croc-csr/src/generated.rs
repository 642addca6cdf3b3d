// Register map of the Croc SoC peripherals. Offsets are word indices.

pub const HW_ASCON_BASE: usize = 0x2000_0000;
pub const HW_UART_BASE: usize = 0x0300_2000;

pub mod utra {
    pub mod ascon {
        pub const ASCON_NUMREGS: usize = 15;

        pub const MAGIC: crate::Register = crate::Register::new(0, 0xffffffff);
        pub const MAGIC_MAGIC: crate::Field = crate::Field::new(32, 0, MAGIC);

        // Writing starts a read-path DMA from the given bus address, reading
        // returns the first result word.
        pub const DMA_RD: crate::Register = crate::Register::new(1, 0xffffffff);
        pub const DMA_RD_ADDR: crate::Field = crate::Field::new(32, 0, DMA_RD);
        pub const RDATA0: crate::Register = DMA_RD;

        pub const RDATA1: crate::Register = crate::Register::new(2, 0xffffffff);
        pub const RDATA1_RDATA: crate::Field = crate::Field::new(32, 0, RDATA1);

        pub const RDATA2: crate::Register = crate::Register::new(3, 0xffffffff);
        pub const RDATA2_RDATA: crate::Field = crate::Field::new(32, 0, RDATA2);

        pub const DMA_WR: crate::Register = crate::Register::new(4, 0xffffffff);
        pub const DMA_WR_ADDR: crate::Field = crate::Field::new(32, 0, DMA_WR);

        pub const DATA_IN: crate::Register = crate::Register::new(5, 0xffffffff);
        pub const DATA_IN_DATA: crate::Field = crate::Field::new(32, 0, DATA_IN);

        pub const LEN: crate::Register = crate::Register::new(6, 0xffff);
        pub const LEN_LEN: crate::Field = crate::Field::new(16, 0, LEN);

        pub const CMD: crate::Register = crate::Register::new(7, 0x70f);
        pub const CMD_MODE: crate::Field = crate::Field::new(1, 0, CMD);
        pub const CMD_EOT: crate::Field = crate::Field::new(1, 1, CMD);
        pub const CMD_EOI: crate::Field = crate::Field::new(1, 2, CMD);
        pub const CMD_EOO: crate::Field = crate::Field::new(1, 3, CMD);
        pub const CMD_TYPE: crate::Field = crate::Field::new(3, 8, CMD);

        pub const STATUS: crate::Register = crate::Register::new(8, 0x71f);
        pub const STATUS_KEY_DONE: crate::Field = crate::Field::new(1, 0, STATUS);
        pub const STATUS_NONCE_DONE: crate::Field = crate::Field::new(1, 1, STATUS);
        pub const STATUS_AD_DONE: crate::Field = crate::Field::new(1, 2, STATUS);
        pub const STATUS_MSG_DONE: crate::Field = crate::Field::new(1, 3, STATUS);
        pub const STATUS_BDO_VALID: crate::Field = crate::Field::new(1, 4, STATUS);
        pub const STATUS_DMA_RD_DONE: crate::Field = crate::Field::new(1, 8, STATUS);
        pub const STATUS_DMA_WR_READY: crate::Field = crate::Field::new(1, 9, STATUS);
        pub const STATUS_DMA_WR_DONE: crate::Field = crate::Field::new(1, 10, STATUS);

        pub const KEY_ADDR: crate::Register = crate::Register::new(9, 0xffffffff);
        pub const KEY_ADDR_ADDR: crate::Field = crate::Field::new(32, 0, KEY_ADDR);

        pub const NONCE_ADDR: crate::Register = crate::Register::new(10, 0xffffffff);
        pub const NONCE_ADDR_ADDR: crate::Field = crate::Field::new(32, 0, NONCE_ADDR);

        pub const AD_ADDR: crate::Register = crate::Register::new(11, 0xffffffff);
        pub const AD_ADDR_ADDR: crate::Field = crate::Field::new(32, 0, AD_ADDR);

        pub const MSG_ADDR: crate::Register = crate::Register::new(12, 0xffffffff);
        pub const MSG_ADDR_ADDR: crate::Field = crate::Field::new(32, 0, MSG_ADDR);

        pub const OUT_ADDR: crate::Register = crate::Register::new(13, 0xffffffff);
        pub const OUT_ADDR_ADDR: crate::Field = crate::Field::new(32, 0, OUT_ADDR);

        pub const BDO: crate::Register = crate::Register::new(14, 0xffffffff);
        pub const BDO_DATA: crate::Field = crate::Field::new(32, 0, BDO);

        pub const HW_ASCON_BASE: usize = 0x2000_0000;
    }

    pub mod uart {
        pub const UART_NUMREGS: usize = 6;

        pub const RBR_THR: crate::Register = crate::Register::new(0, 0xff);
        pub const RBR_THR_DATA: crate::Field = crate::Field::new(8, 0, RBR_THR);
        // Divisor latch, visible while LCR.DLAB is set.
        pub const DLL: crate::Register = RBR_THR;

        pub const IER: crate::Register = crate::Register::new(1, 0xf);
        pub const DLM: crate::Register = IER;

        pub const IIR_FCR: crate::Register = crate::Register::new(2, 0xff);

        pub const LCR: crate::Register = crate::Register::new(3, 0xff);
        pub const LCR_WLS: crate::Field = crate::Field::new(2, 0, LCR);
        pub const LCR_DLAB: crate::Field = crate::Field::new(1, 7, LCR);

        pub const MCR: crate::Register = crate::Register::new(4, 0x3f);
        pub const MCR_LOOP: crate::Field = crate::Field::new(1, 4, MCR);

        pub const LSR: crate::Register = crate::Register::new(5, 0xff);
        pub const LSR_DR: crate::Field = crate::Field::new(1, 0, LSR);
        pub const LSR_THRE: crate::Field = crate::Field::new(1, 5, LSR);
        pub const LSR_TEMT: crate::Field = crate::Field::new(1, 6, LSR);

        pub const HW_UART_BASE: usize = 0x0300_2000;
    }
}
