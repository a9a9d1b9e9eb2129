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

//! In-process simulated card.
//!
//! Models just enough of the hardware for the bring-up procedures to run
//! without a card present: a sparse page-backed DRAM behind the DMA queues
//! and a 16550-style UART behind BAR 0. The sim answers every slot id with
//! the same single card.
//!
//! Cloning a [`SimBackend`] shares the card state, and the backend exposes
//! hooks (preload DRAM, corrupt the read path, inject or drain UART traffic)
//! that the test suite drives the verification paths with.

use crate::backends::backend::{
    Backend, DmaQueue, ImageStatus, RegisterBar, SlotImage, register_backend,
};
use crate::config::{DEFAULT_DEVICE_ID, DEFAULT_VENDOR_ID};
use crate::error::HarnessError;
use crate::uart;
use crate::uart::{Fcr, Lcr, Lsr};
use log::trace;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};

const PAGE_SIZE: u64 = 1 << 16;

/// Simulated hardware access backend.
#[derive(Debug, Clone, Default)]
pub struct SimBackend {
    card: Arc<SimCard>,
}

#[derive(Debug, Default)]
struct SimCard {
    dram: Mutex<SimDram>,
    uart: Mutex<SimUart>,
    slot: Mutex<SimSlot>,
}

#[derive(Debug, Default)]
struct SimDram {
    pages: HashMap<u64, Box<[u8]>>,
    corrupt: Option<(u64, u8)>,
}

impl SimDram {
    fn page_mut(&mut self, page_no: u64) -> &mut [u8] {
        self.pages
            .entry(page_no)
            .or_insert_with(|| vec![0u8; PAGE_SIZE as usize].into_boxed_slice())
    }

    fn write(&mut self, mut addr: u64, mut data: &[u8]) {
        while !data.is_empty() {
            let page_no = addr / PAGE_SIZE;
            let in_page = (addr % PAGE_SIZE) as usize;
            let n = data.len().min(PAGE_SIZE as usize - in_page);
            self.page_mut(page_no)[in_page..in_page + n].copy_from_slice(&data[..n]);
            addr += n as u64;
            data = &data[n..];
        }
    }

    fn read(&self, addr: u64, buf: &mut [u8]) {
        let mut pos = addr;
        let mut filled = 0;
        while filled < buf.len() {
            let page_no = pos / PAGE_SIZE;
            let in_page = (pos % PAGE_SIZE) as usize;
            let n = (buf.len() - filled).min(PAGE_SIZE as usize - in_page);
            match self.pages.get(&page_no) {
                Some(page) => buf[filled..filled + n].copy_from_slice(&page[in_page..in_page + n]),
                // Unwritten memory reads as zero.
                None => buf[filled..filled + n].fill(0),
            }
            pos += n as u64;
            filled += n;
        }
        if let Some((corrupt_addr, xor)) = self.corrupt {
            if corrupt_addr >= addr && corrupt_addr < addr + buf.len() as u64 {
                buf[(corrupt_addr - addr) as usize] ^= xor;
            }
        }
    }
}

#[derive(Debug, Default)]
struct SimUart {
    ier: u32,
    lcr: u32,
    mcr: u32,
    scr: u32,
    dll: u32,
    dlm: u32,
    fifo_enabled: bool,
    /// Bytes waiting for the host to read (card to host).
    rx: VecDeque<u8>,
    /// Bytes the host has transmitted (host to card).
    tx: Vec<u8>,
}

impl SimUart {
    fn dlab(&self) -> bool {
        self.lcr & Lcr::DLAB.bits() != 0
    }

    fn peek(&mut self, offset: u64) -> Result<u32, HarnessError> {
        match offset {
            uart::RBR_ADDR => {
                if self.dlab() {
                    Ok(self.dll)
                } else {
                    Ok(self.rx.pop_front().unwrap_or(0) as u32)
                }
            }
            uart::IER_ADDR => {
                if self.dlab() {
                    Ok(self.dlm)
                } else {
                    Ok(self.ier)
                }
            }
            // IIR: no interrupt sources are modelled.
            uart::FCR_ADDR => Ok(0),
            uart::LCR_ADDR => Ok(self.lcr),
            uart::MCR_ADDR => Ok(self.mcr),
            uart::LSR_ADDR => {
                let mut status = Lsr::THRE | Lsr::TEMT;
                if !self.rx.is_empty() {
                    status |= Lsr::DRDY;
                }
                Ok(status.bits())
            }
            uart::MSR_ADDR => Ok(0),
            uart::SCR_ADDR => Ok(self.scr),
            _ => Err(HarnessError::Argument(format!(
                "no serial port register at offset {offset:#x}"
            ))),
        }
    }

    fn poke(&mut self, offset: u64, value: u32) -> Result<(), HarnessError> {
        match offset {
            uart::THR_ADDR => {
                if self.dlab() {
                    self.dll = value & 0xff;
                } else {
                    self.tx.push((value & 0xff) as u8);
                }
                Ok(())
            }
            uart::IER_ADDR => {
                if self.dlab() {
                    self.dlm = value & 0xff;
                } else {
                    self.ier = value;
                }
                Ok(())
            }
            uart::FCR_ADDR => {
                let fcr = Fcr::from_bits_truncate(value);
                if fcr.contains(Fcr::RCVR_RESET) {
                    self.rx.clear();
                }
                self.fifo_enabled = fcr.contains(Fcr::FIFO_ENABLE);
                Ok(())
            }
            uart::LCR_ADDR => {
                self.lcr = value;
                Ok(())
            }
            uart::MCR_ADDR => {
                self.mcr = value;
                Ok(())
            }
            uart::SCR_ADDR => {
                self.scr = value;
                Ok(())
            }
            uart::LSR_ADDR | uart::MSR_ADDR => Err(HarnessError::Argument(format!(
                "serial port register at offset {offset:#x} is read only"
            ))),
            _ => Err(HarnessError::Argument(format!(
                "no serial port register at offset {offset:#x}"
            ))),
        }
    }
}

#[derive(Debug)]
struct SimSlot {
    image: SlotImage,
    image_after_rescan: Option<SlotImage>,
    rescans: u32,
}

impl Default for SimSlot {
    fn default() -> Self {
        SimSlot {
            image: SlotImage {
                status: ImageStatus::Loaded,
                vendor_id: DEFAULT_VENDOR_ID,
                device_id: DEFAULT_DEVICE_ID,
            },
            image_after_rescan: None,
            rescans: 0,
        }
    }
}

/// Snapshot of the simulated serial port state, for assertions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UartRegs {
    pub ier: u32,
    pub lcr: u32,
    pub dll: u32,
    pub dlm: u32,
    pub fifo_enabled: bool,
    pub rx_pending: usize,
}

impl SimBackend {
    pub fn new() -> Self {
        trace!("creating new sim backend");
        SimBackend::default()
    }

    /// Register this backend under the name "sim".
    pub fn register_backend() {
        register_backend("sim", || Box::new(SimBackend::new()));
    }

    fn lock_dram(&self) -> MutexGuard<'_, SimDram> {
        self.card.dram.lock().expect("sim dram lock poisoned")
    }

    fn lock_uart(&self) -> MutexGuard<'_, SimUart> {
        self.card.uart.lock().expect("sim uart lock poisoned")
    }

    fn lock_slot(&self) -> MutexGuard<'_, SimSlot> {
        self.card.slot.lock().expect("sim slot lock poisoned")
    }

    /// Preload `len` bytes of DRAM at `device_offset` with `value`.
    pub fn fill(&self, device_offset: u64, len: usize, value: u8) {
        self.lock_dram().write(device_offset, &vec![value; len]);
    }

    /// Copy `len` bytes of DRAM starting at `device_offset`.
    pub fn dram_snapshot(&self, device_offset: u64, len: usize) -> Vec<u8> {
        let mut buf = vec![0u8; len];
        self.lock_dram().read(device_offset, &mut buf);
        buf
    }

    /// XOR the byte at `device_offset` with `xor` on every DMA read.
    ///
    /// The stored contents stay intact, only the read path is affected.
    pub fn set_read_corruption(&self, device_offset: u64, xor: u8) {
        self.lock_dram().corrupt = Some((device_offset, xor));
    }

    pub fn clear_read_corruption(&self) {
        self.lock_dram().corrupt = None;
    }

    /// Queue bytes on the card's receive side, as if they arrived over the wire.
    pub fn push_inbound(&self, bytes: &[u8]) {
        self.lock_uart().rx.extend(bytes);
    }

    /// Number of bytes the host has transmitted so far.
    pub fn outbound_len(&self) -> usize {
        self.lock_uart().tx.len()
    }

    /// Drain everything the host has transmitted.
    pub fn take_outbound(&self) -> Vec<u8> {
        std::mem::take(&mut self.lock_uart().tx)
    }

    pub fn uart_registers(&self) -> UartRegs {
        let uart = self.lock_uart();
        UartRegs {
            ier: uart.ier,
            lcr: uart.lcr,
            dll: uart.dll,
            dlm: uart.dlm,
            fifo_enabled: uart.fifo_enabled,
            rx_pending: uart.rx.len(),
        }
    }

    /// Replace what the slot reports about its loaded image.
    pub fn set_slot_image(&self, image: SlotImage) {
        self.lock_slot().image = image;
    }

    /// Make the next rescan switch the slot to reporting `image`.
    pub fn set_image_after_rescan(&self, image: SlotImage) {
        self.lock_slot().image_after_rescan = Some(image);
    }

    /// How many rescans have been requested.
    pub fn rescan_count(&self) -> u32 {
        self.lock_slot().rescans
    }
}

impl Backend for SimBackend {
    /// The sim models a single card; every slot id resolves to it.
    fn describe_slot(&self, _slot_id: u32) -> Result<SlotImage, HarnessError> {
        Ok(self.lock_slot().image)
    }

    fn rescan_slot(&self, _slot_id: u32) -> Result<(), HarnessError> {
        let mut slot = self.lock_slot();
        slot.rescans += 1;
        if let Some(image) = slot.image_after_rescan.take() {
            slot.image = image;
        }
        Ok(())
    }

    fn attach_bar(
        &self,
        _slot_id: u32,
        _bar_id: u32,
    ) -> Result<Arc<dyn RegisterBar>, HarnessError> {
        Ok(Arc::new(SimBar {
            card: Arc::clone(&self.card),
        }))
    }

    fn open_queue(
        &self,
        _slot_id: u32,
        channel: u32,
        is_read: bool,
    ) -> Result<Box<dyn DmaQueue>, HarnessError> {
        Ok(Box::new(SimQueue {
            card: Arc::clone(&self.card),
            channel,
            is_read,
        }))
    }
}

/// BAR 0 of the simulated card: the serial port register window.
struct SimBar {
    card: Arc<SimCard>,
}

impl RegisterBar for SimBar {
    fn peek(&self, offset: u64) -> Result<u32, HarnessError> {
        if offset % 4 != 0 {
            return Err(HarnessError::Argument(format!(
                "unaligned register read at offset {offset:#x}"
            )));
        }
        self.card
            .uart
            .lock()
            .map_err(|_| HarnessError::Internal(String::from("sim uart lock poisoned")))?
            .peek(offset)
    }

    fn poke(&self, offset: u64, value: u32) -> Result<(), HarnessError> {
        if offset % 4 != 0 {
            return Err(HarnessError::Argument(format!(
                "unaligned register write at offset {offset:#x}"
            )));
        }
        self.card
            .uart
            .lock()
            .map_err(|_| HarnessError::Internal(String::from("sim uart lock poisoned")))?
            .poke(offset, value)
    }
}

/// One direction of a simulated DMA channel into the sparse DRAM.
struct SimQueue {
    card: Arc<SimCard>,
    channel: u32,
    is_read: bool,
}

impl DmaQueue for SimQueue {
    fn burst_write(&mut self, data: &[u8], device_offset: u64) -> Result<(), HarnessError> {
        if self.is_read {
            return Err(HarnessError::Argument(format!(
                "channel {} was opened for reading",
                self.channel
            )));
        }
        self.card
            .dram
            .lock()
            .map_err(|_| HarnessError::Internal(String::from("sim dram lock poisoned")))?
            .write(device_offset, data);
        Ok(())
    }

    fn burst_read(&mut self, buf: &mut [u8], device_offset: u64) -> Result<(), HarnessError> {
        if !self.is_read {
            return Err(HarnessError::Argument(format!(
                "channel {} was opened for writing",
                self.channel
            )));
        }
        self.card
            .dram
            .lock()
            .map_err(|_| HarnessError::Internal(String::from("sim dram lock poisoned")))?
            .read(device_offset, buf);
        Ok(())
    }
}
