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

//! Hardware access abstraction for the bring-up tools.
//!
//! This module defines the trait seam between the test procedures and the
//! card: a [`Backend`] hands out register windows ([`RegisterBar`]) and DMA
//! queues ([`DmaQueue`]) and answers slot queries. Backends register
//! themselves by name in a global registry so the binaries can select one at
//! runtime (`--backend xdma` against real hardware, `--backend sim` for a dry
//! run against the in-process card model).
//!
//! # Architecture
//!
//! - [`Backend`] - Top-level interface: slot description/rescan and factory
//!   methods for register windows and DMA queues
//! - [`RegisterBar`] - 32-bit peek/poke access to one PCIe BAR
//! - [`DmaQueue`] - blocking burst transfers between host buffers and device
//!   memory at a device offset
//!
//! # Backend Registration
//!
//! Backends are installed at startup with [`register_backend`] (usually via
//! [`register_backends`], which installs the built-in ones) and constructed
//! by name with [`backend_for_name`].

use crate::backends::sim::SimBackend;
use crate::backends::xdma::XdmaBackend;
use crate::error::HarnessError;
use std::any::Any;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, OnceLock};

/// Type alias for backend constructor functions.
///
/// Backend constructors take no arguments and return a boxed Backend trait
/// object. These functions are stored in the backend registry and called when
/// a backend is selected by name.
type BackendConstructor = fn() -> Box<dyn Backend>;

/// Global registry of backend implementations.
///
/// Initialized lazily on first registration and protected by a `Mutex` so
/// registration and lookup are safe from any thread.
pub static BACKEND_REGISTRY: OnceLock<Mutex<HashMap<&'static str, BackendConstructor>>> =
    OnceLock::new();

/// Whether a slot currently has a card image loaded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageStatus {
    Loaded,
    NotLoaded,
}

/// What a slot reports about its loaded image: readiness plus the PCI IDs of
/// the application function.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlotImage {
    pub status: ImageStatus,
    pub vendor_id: u16,
    pub device_id: u16,
}

/// 32-bit register access to one PCIe BAR of the card.
///
/// A single window may be shared by several threads (the UART bridge polls
/// status from one thread while the other writes data), so implementations
/// must synchronise internally where their state requires it.
pub trait RegisterBar: Send + Sync {
    /// Read the 32-bit register at `offset` bytes into the window.
    fn peek(&self, offset: u64) -> Result<u32, HarnessError>;

    /// Write the 32-bit register at `offset` bytes into the window.
    fn poke(&self, offset: u64, value: u32) -> Result<(), HarnessError>;
}

/// One direction of a DMA channel between host memory and device memory.
///
/// Transfers are blocking and all-or-nothing: a burst either completes for
/// its full length or returns an error.
pub trait DmaQueue {
    /// Write `data` to device memory starting at `device_offset`.
    fn burst_write(&mut self, data: &[u8], device_offset: u64) -> Result<(), HarnessError>;

    /// Fill `buf` from device memory starting at `device_offset`.
    fn burst_read(&mut self, buf: &mut [u8], device_offset: u64) -> Result<(), HarnessError>;
}

/// Trait representing a complete hardware access backend.
///
/// The trait extends `Any` to allow for runtime type checking and
/// downcasting, which the test suite uses to reach backend-specific hooks.
pub trait Backend: Any {
    /// Describe the image currently loaded in `slot_id`.
    ///
    /// # Returns: `Result<SlotImage, HarnessError>`
    /// * `Ok(SlotImage)` - Readiness and PCI IDs as the slot reports them
    /// * `Err(HarnessError)` - The slot could not be queried at all
    fn describe_slot(&self, slot_id: u32) -> Result<SlotImage, HarnessError>;

    /// Ask the host to re-enumerate the slot's functions.
    ///
    /// Used when a freshly loaded image does not yet show its expected PCI
    /// IDs.
    fn rescan_slot(&self, slot_id: u32) -> Result<(), HarnessError>;

    /// Attach to a BAR of the slot's application function.
    ///
    /// The returned window is reference counted so it can be shared between
    /// relay threads; it detaches when the last reference is dropped.
    fn attach_bar(&self, slot_id: u32, bar_id: u32)
    -> Result<Arc<dyn RegisterBar>, HarnessError>;

    /// Open one direction of a DMA channel. `is_read` selects the
    /// card-to-host direction, otherwise host-to-card.
    fn open_queue(
        &self,
        slot_id: u32,
        channel: u32,
        is_read: bool,
    ) -> Result<Box<dyn DmaQueue>, HarnessError>;
}

/// Initialize the backend registry.
///
/// Called automatically by [`register_backend`] via `OnceLock::get_or_init`.
pub fn init_backend_registry() -> Mutex<HashMap<&'static str, BackendConstructor>> {
    Mutex::new(HashMap::new())
}

/// Register a backend implementation in the global registry.
///
/// # Arguments
///
/// * `name` - Name the backend is selected by (e.g. "xdma")
/// * `constructor` - Function that creates a new backend instance
///
/// # Panics
///
/// Panics if the registry lock is poisoned (should never happen in normal operation).
pub fn register_backend(name: &'static str, constructor: BackendConstructor) {
    let mut registry = BACKEND_REGISTRY
        .get_or_init(init_backend_registry)
        .lock()
        .expect("couldnt get BACKEND_REGISTRY");

    registry.insert(name, constructor);
}

/// Register all built-in backend implementations.
///
/// Called at binary startup before any backend is selected.
pub fn register_backends() {
    XdmaBackend::register_backend();
    SimBackend::register_backend();
}

/// Construct the backend registered under `name`.
///
/// # Returns: `Result<Box<dyn Backend>, HarnessError>`
/// * `Ok(Box<dyn Backend>)` - Newly constructed backend instance
/// * `Err(HarnessError::Internal)` - Registry not initialized or lock failure
/// * `Err(HarnessError::Argument)` - No backend registered under `name`
pub fn backend_for_name(name: &str) -> Result<Box<dyn Backend>, HarnessError> {
    let registry = BACKEND_REGISTRY
        .get()
        .ok_or(HarnessError::Internal(String::from(
            "couldn't get BACKEND_REGISTRY",
        )))?
        .lock()
        .map_err(|_| HarnessError::Internal(String::from("couldn't lock BACKEND_REGISTRY")))?;

    if let Some(constructor) = registry.get(name) {
        return Ok(constructor());
    }

    let mut known: Vec<&str> = registry.keys().copied().collect();
    known.sort_unstable();
    Err(HarnessError::Argument(format!(
        "'{name}' is not a known backend (known backends: {})",
        known.join(", ")
    )))
}
