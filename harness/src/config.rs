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

/// The sysfs directory enumerating PCI functions. Typically `/sys/bus/pci/devices/`.
pub static PCI_DEVICES_DIR: &str = "/sys/bus/pci/devices/";

/// The file which triggers a PCI bus rescan when "1" is written to it.
/// Typically `/sys/bus/pci/rescan`.
pub static PCI_RESCAN_PATH: &str = "/sys/bus/pci/rescan";

/// The directory containing the DMA bridge character devices (`xdma<N>_h2c_<C>`
/// and `xdma<N>_c2h_<C>`).
pub static DMA_DEV_DIR: &str = "/dev/";

/// PCI vendor ID the application function of a loaded card image reports by default.
pub const DEFAULT_VENDOR_ID: u16 = 0x1D0F;

/// PCI device ID preassigned to application images by the card vendor.
pub const DEFAULT_DEVICE_ID: u16 = 0xF001;

/// Identifies the card a test run targets: which slot, and which PCI IDs the
/// loaded image is expected to report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlotSpec {
    pub slot_id: u32,
    pub vendor_id: u16,
    pub device_id: u16,
}

impl Default for SlotSpec {
    fn default() -> Self {
        SlotSpec {
            slot_id: 0,
            vendor_id: DEFAULT_VENDOR_ID,
            device_id: DEFAULT_DEVICE_ID,
        }
    }
}

impl SlotSpec {
    /// A spec for the given slot with the default vendor and device IDs.
    pub fn for_slot(slot_id: u32) -> Self {
        SlotSpec {
            slot_id,
            ..SlotSpec::default()
        }
    }
}
