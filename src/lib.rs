// SPDX-FileCopyrightText: 2024 Foundation Devices, Inc. <hello@foundationdevices.com>
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Driver and self-test for the ASCON accelerator of the Croc SoC.

#![cfg_attr(not(test), no_std)]

pub mod ascon;
pub mod command;
pub mod dma;
pub mod error;
#[cfg(feature = "logging")]
pub mod logging;
#[cfg(any(test, feature = "mock"))]
pub mod mock;
pub mod regs;
pub mod selftest;
pub mod status;
pub mod uart;

pub use {
    ascon::{Ascon, Job, Phase, Tag},
    command::{Command, DataType, Mode},
    error::{Error, Result},
    regs::{Mmio, Reg, RegisterInterface, SharedDevice},
    status::{Poller, Status, WaitMode},
};
