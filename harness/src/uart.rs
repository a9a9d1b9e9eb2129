// This file is part of fpga-bringup, a set of bring-up test utilities for FPGA accelerator cards.
//
// Copyright 2025 Canonical Ltd.
//
// SPDX-License-Identifier: GPL-3.0-only
//
// fpga-bringup is free software: you can redistribute it and/or modify it under the terms of the GNU General Public License version 3, as published by the Free Software Foundation.
//
// fpga-bringup is distributed in the hope that it will be useful, but WITHOUT ANY WARRANTY; without even the implied warranties of MERCHANTABILITY, SATISFACTORY QUALITY, or FITNESS FOR A PARTICULAR PURPOSE.  See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with this program.  If not, see http://www.gnu.org/licenses/.

//! Serial port bring-up and terminal bridge.
//!
//! The card exposes a 16550-style UART at the bottom of application BAR 0,
//! with registers on a 4-byte stride. [`init_uart`] programs it for 8N1
//! operation with FIFOs enabled, and [`spawn_bridge`] relays bytes in both
//! directions from two polling threads:
//! - inbound: wait for `LSR.DRDY`, read the receive buffer, write the byte to
//!   the output sink,
//! - outbound: take a byte from the input source, wait for `LSR.TEMT`, write
//!   the transmit holding register.
//!
//! Polls sleep between probes and are bounded so the threads can notice the
//! bridge's stop flag; the `uart_bridge` binary never sets the flag and runs
//! until the process is killed.

use crate::backends::backend::RegisterBar;
use crate::error::HarnessError;
use bitflags::bitflags;
use log::{error, trace};
use std::io::{Read, Write};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// Receive buffer (read) / transmit holding (write), or divisor low with DLAB set.
pub const RBR_ADDR: u64 = 0x00;
pub const THR_ADDR: u64 = 0x00;
pub const DLL_ADDR: u64 = 0x00;
/// Interrupt enable, or divisor high with DLAB set.
pub const IER_ADDR: u64 = 0x04;
pub const DLM_ADDR: u64 = 0x04;
/// FIFO control (write only).
pub const FCR_ADDR: u64 = 0x08;
/// Line control.
pub const LCR_ADDR: u64 = 0x0C;
/// Modem control.
pub const MCR_ADDR: u64 = 0x10;
/// Line status (read only).
pub const LSR_ADDR: u64 = 0x14;
/// Modem status (read only).
pub const MSR_ADDR: u64 = 0x18;
/// Scratch.
pub const SCR_ADDR: u64 = 0x1C;

/// Size of the UART register window in BAR 0.
pub const UART_WINDOW_SIZE: u64 = 0x20;

/// Divisor latch value programmed by [`init_uart`].
pub const BAUD_DIVISOR_LOW: u32 = 66;
pub const BAUD_DIVISOR_HIGH: u32 = 0;

bitflags! {
    /// FIFO control register bits.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Fcr: u32 {
        const FIFO_ENABLE = 1 << 0;
        const RCVR_RESET = 1 << 1;
        const XMIT_RESET = 1 << 2;
    }
}

bitflags! {
    /// Line control register bits.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Lcr: u32 {
        /// 8 data bits, no parity, 1 stop bit.
        const CHAR_8N1 = 0x03;
        /// Divisor latch access.
        const DLAB = 1 << 7;
    }
}

bitflags! {
    /// Line status register bits.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Lsr: u32 {
        /// Receive data ready.
        const DRDY = 1 << 0;
        /// Transmit holding register empty.
        const THRE = 1 << 5;
        /// Transmitter empty.
        const TEMT = 1 << 6;
    }
}

/// Sleep between register status probes.
pub const POLL_INTERVAL: Duration = Duration::from_micros(100);

/// How long a relay thread polls before rechecking the stop flag.
const STOP_POLL_WINDOW: Duration = Duration::from_millis(20);

/// Program the serial port for 8N1 operation with FIFOs enabled.
///
/// Interrupts are masked, both FIFOs are reset and enabled, and the baud
/// divisor is loaded through the divisor latch.
pub fn init_uart(bar: &dyn RegisterBar) -> Result<(), HarnessError> {
    trace!("initialising the serial port");
    bar.poke(IER_ADDR, 0)?;
    bar.poke(FCR_ADDR, 0)?;
    bar.poke(FCR_ADDR, (Fcr::XMIT_RESET | Fcr::RCVR_RESET).bits())?;
    bar.poke(FCR_ADDR, Fcr::FIFO_ENABLE.bits())?;
    bar.poke(LCR_ADDR, (Lcr::DLAB | Lcr::CHAR_8N1).bits())?;
    bar.poke(DLL_ADDR, BAUD_DIVISOR_LOW)?;
    bar.poke(DLM_ADDR, BAUD_DIVISOR_HIGH)?;
    bar.poke(LCR_ADDR, Lcr::CHAR_8N1.bits())?;
    Ok(())
}

/// Poll the register at `reg` until `value & mask != 0`.
///
/// Sleeps [`POLL_INTERVAL`] between probes. With a timeout, expiry returns
/// `HarnessError::Timeout`; with `None` the poll only ends when the bit is
/// set or a register access fails.
///
/// # Returns: `Result<u32, HarnessError>`
/// * `Ok(u32)` - The register value that had a masked bit set
/// * `Err(HarnessError::Timeout)` - Deadline passed with all masked bits clear
pub fn poll_status(
    bar: &dyn RegisterBar,
    reg: u64,
    mask: u32,
    timeout: Option<Duration>,
) -> Result<u32, HarnessError> {
    let deadline = timeout.map(|t| Instant::now() + t);
    loop {
        let value = bar.peek(reg)?;
        if value & mask != 0 {
            return Ok(value);
        }
        if let Some(deadline) = deadline {
            if Instant::now() >= deadline {
                return Err(HarnessError::Timeout(format!(
                    "status mask {mask:#x} not set in register {reg:#x}"
                )));
            }
        }
        thread::sleep(POLL_INTERVAL);
    }
}

/// A running bridge: two relay threads and their shared stop flag.
pub struct BridgeHandle {
    stop: Arc<AtomicBool>,
    inbound: JoinHandle<Result<(), HarnessError>>,
    outbound: JoinHandle<Result<(), HarnessError>>,
}

impl BridgeHandle {
    /// Wait for both relay threads without requesting a stop.
    ///
    /// The inbound relay never ends on its own, so this only returns once a
    /// register access fails or the outbound source hits end of input and
    /// the stop flag is raised by a failure. Used by the bridge binary,
    /// which is expected to run until the process is killed.
    pub fn join(self) -> Result<(), HarnessError> {
        Self::collect(self.inbound, self.outbound)
    }

    /// Raise the stop flag and wait for both relay threads.
    ///
    /// Returns the first error a thread reported, if any.
    pub fn shutdown(self) -> Result<(), HarnessError> {
        self.stop.store(true, Ordering::Relaxed);
        Self::collect(self.inbound, self.outbound)
    }

    fn collect(
        inbound: JoinHandle<Result<(), HarnessError>>,
        outbound: JoinHandle<Result<(), HarnessError>>,
    ) -> Result<(), HarnessError> {
        let inbound = inbound
            .join()
            .map_err(|_| HarnessError::Internal(String::from("inbound relay thread panicked")))?;
        let outbound = outbound
            .join()
            .map_err(|_| HarnessError::Internal(String::from("outbound relay thread panicked")))?;
        inbound.and(outbound)
    }
}

/// Spawn the two relay threads over a shared register window.
///
/// `input` feeds the card's transmit side (one byte at a time, end of input
/// ends the outbound relay); everything the card receives is written to
/// `output` and flushed per byte. A thread that hits a register access
/// failure logs it, raises the stop flag so its peer winds down too, and
/// reports the error through [`BridgeHandle::join`]/[`BridgeHandle::shutdown`].
pub fn spawn_bridge<R, W>(bar: Arc<dyn RegisterBar>, input: R, output: W) -> BridgeHandle
where
    R: Read + Send + 'static,
    W: Write + Send + 'static,
{
    let stop = Arc::new(AtomicBool::new(false));

    let inbound = {
        let bar = Arc::clone(&bar);
        let stop = Arc::clone(&stop);
        thread::spawn(move || {
            let res = relay_inbound(bar.as_ref(), output, &stop);
            if let Err(e) = &res {
                error!("inbound relay stopped: {e}");
                stop.store(true, Ordering::Relaxed);
            }
            res
        })
    };

    let outbound = {
        let stop = Arc::clone(&stop);
        thread::spawn(move || {
            let res = relay_outbound(bar.as_ref(), input, &stop);
            if let Err(e) = &res {
                error!("outbound relay stopped: {e}");
                stop.store(true, Ordering::Relaxed);
            }
            res
        })
    };

    BridgeHandle {
        stop,
        inbound,
        outbound,
    }
}

fn relay_inbound<W: Write>(
    bar: &dyn RegisterBar,
    mut output: W,
    stop: &AtomicBool,
) -> Result<(), HarnessError> {
    while !stop.load(Ordering::Relaxed) {
        match poll_status(bar, LSR_ADDR, Lsr::DRDY.bits(), Some(STOP_POLL_WINDOW)) {
            Ok(_) => {}
            // No data yet, go back around to recheck the stop flag.
            Err(HarnessError::Timeout(_)) => continue,
            Err(e) => return Err(e),
        }
        let value = bar.peek(RBR_ADDR)?;
        output
            .write_all(&[(value & 0xff) as u8])
            .and_then(|_| output.flush())
            .map_err(|e| HarnessError::Internal(format!("failed to write a relayed byte: {e}")))?;
    }
    Ok(())
}

fn relay_outbound<R: Read>(
    bar: &dyn RegisterBar,
    mut input: R,
    stop: &AtomicBool,
) -> Result<(), HarnessError> {
    let mut byte = [0u8; 1];
    while !stop.load(Ordering::Relaxed) {
        let n = match input.read(&mut byte) {
            Ok(n) => n,
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(e) => {
                return Err(HarnessError::Internal(format!(
                    "failed to read an outbound byte: {e}"
                )));
            }
        };
        if n == 0 {
            // End of input. The inbound relay keeps running.
            break;
        }
        loop {
            match poll_status(bar, LSR_ADDR, Lsr::TEMT.bits(), Some(STOP_POLL_WINDOW)) {
                Ok(_) => break,
                Err(HarnessError::Timeout(_)) => {
                    if stop.load(Ordering::Relaxed) {
                        return Ok(());
                    }
                }
                Err(e) => return Err(e),
            }
        }
        bar.poke(THR_ADDR, byte[0] as u32)?;
    }
    Ok(())
}
