//! Driver errors.

use {
    crate::{ascon::Phase, regs::Reg},
    core::fmt,
};

pub type Result<T> = core::result::Result<T, Error>;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Error {
    /// A command field value does not fit in its bit width.
    FieldOverflow {
        field: &'static str,
        value: u32,
        width: u32,
    },
    /// The type field of a command word holds no known data type tag.
    UnknownDataType(u32),
    /// A status condition did not become true within the poll budget.
    DeviceTimeout { reg: Reg, mask: u32, last: u32 },
    /// A DMA transfer length outside of what the device supports.
    InvalidLength { len: usize, max: usize },
    /// A caller-owned buffer is too short for the requested operation.
    BufferTooSmall { needed: usize, actual: usize },
    /// A cipher phase was requested out of order.
    PhaseOrder { expected: Phase, actual: Phase },
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::FieldOverflow {
                field,
                value,
                width,
            } => write!(
                f,
                "command field {field} value {value:#x} exceeds {width} bit(s)"
            ),
            Error::UnknownDataType(tag) => write!(f, "unknown data type tag {tag}"),
            Error::DeviceTimeout { reg, mask, last } => write!(
                f,
                "timed out waiting on {} & {mask:#010x} (last {last:#010x})",
                reg.name()
            ),
            Error::InvalidLength { len, max } => {
                write!(f, "transfer length {len} not in 1..={max}")
            }
            Error::BufferTooSmall { needed, actual } => {
                write!(f, "buffer holds {actual} bytes, {needed} needed")
            }
            Error::PhaseOrder { expected, actual } => {
                write!(f, "cipher phase out of order: in {actual:?}, expected {expected:?}")
            }
        }
    }
}
