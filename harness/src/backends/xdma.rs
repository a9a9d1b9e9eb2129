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

//! Real-hardware backend using the XDMA driver stack.
//!
//! Slot queries go through PCI sysfs: slot N is the Nth function (sorted by
//! sysfs name) whose `vendor` file matches the scan vendor id. Register
//! windows are the function's `resource<bar>` files mapped into the process,
//! and DMA queues are the driver's `xdma<slot>_h2c_<channel>` /
//! `xdma<slot>_c2h_<channel>` character devices, addressed positionally at
//! the device offset.

use crate::backends::backend::{
    Backend, DmaQueue, ImageStatus, RegisterBar, SlotImage, register_backend,
};
use crate::config;
use crate::error::HarnessError;
use crate::system_io::{fs_read, fs_read_dir, fs_read_exact_at, fs_write, fs_write_all_at};
use log::{info, trace};
use std::fs::{File, OpenOptions};
use std::os::unix::io::AsRawFd;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Backend for a card driven by the XDMA kernel driver.
#[derive(Debug)]
pub struct XdmaBackend {
    scan_vendor_id: u16,
}

impl Default for XdmaBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl XdmaBackend {
    pub fn new() -> Self {
        XdmaBackend {
            scan_vendor_id: config::DEFAULT_VENDOR_ID,
        }
    }

    /// A backend that scans for functions of a different vendor.
    pub fn for_vendor(vendor_id: u16) -> Self {
        XdmaBackend {
            scan_vendor_id: vendor_id,
        }
    }

    /// Register this backend under the name "xdma".
    pub fn register_backend() {
        register_backend("xdma", || Box::new(XdmaBackend::new()));
    }

    /// Find the sysfs directory of the function occupying `slot_id`.
    fn slot_function(&self, slot_id: u32) -> Result<Option<PathBuf>, HarnessError> {
        let mut entries = fs_read_dir(Path::new(config::PCI_DEVICES_DIR))?;
        entries.sort();

        let mut index = 0u32;
        for entry in entries {
            let dir = Path::new(config::PCI_DEVICES_DIR).join(&entry);
            let Ok(vendor) = read_hex_u16(&dir.join("vendor")) else {
                continue;
            };
            if vendor != self.scan_vendor_id {
                continue;
            }
            if index == slot_id {
                trace!("slot {slot_id} is function {entry}");
                return Ok(Some(dir));
            }
            index += 1;
        }
        Ok(None)
    }
}

impl Backend for XdmaBackend {
    fn describe_slot(&self, slot_id: u32) -> Result<SlotImage, HarnessError> {
        match self.slot_function(slot_id)? {
            None => Ok(SlotImage {
                status: ImageStatus::NotLoaded,
                vendor_id: 0,
                device_id: 0,
            }),
            Some(dir) => Ok(SlotImage {
                status: ImageStatus::Loaded,
                vendor_id: read_hex_u16(&dir.join("vendor"))?,
                device_id: read_hex_u16(&dir.join("device"))?,
            }),
        }
    }

    fn rescan_slot(&self, slot_id: u32) -> Result<(), HarnessError> {
        info!("requesting a PCI rescan for slot {slot_id}");
        fs_write(Path::new(config::PCI_RESCAN_PATH), "1")
    }

    fn attach_bar(
        &self,
        slot_id: u32,
        bar_id: u32,
    ) -> Result<Arc<dyn RegisterBar>, HarnessError> {
        let dir = self.slot_function(slot_id)?.ok_or_else(|| {
            HarnessError::Argument(format!("no card function found for slot {slot_id}"))
        })?;
        let bar = XdmaBar::map(&dir.join(format!("resource{bar_id}")))?;
        Ok(Arc::new(bar))
    }

    fn open_queue(
        &self,
        slot_id: u32,
        channel: u32,
        is_read: bool,
    ) -> Result<Box<dyn DmaQueue>, HarnessError> {
        let direction = if is_read { "c2h" } else { "h2c" };
        let path = Path::new(config::DMA_DEV_DIR).join(format!("xdma{slot_id}_{direction}_{channel}"));
        trace!("opening DMA queue {path:?}");
        let file = OpenOptions::new()
            .read(is_read)
            .write(!is_read)
            .open(&path)
            .map_err(|e| {
                if is_read {
                    HarnessError::IORead {
                        file: path.clone(),
                        e,
                    }
                } else {
                    HarnessError::IOWrite {
                        file: path.clone(),
                        e,
                    }
                }
            })?;
        Ok(Box::new(XdmaQueue {
            file,
            path,
            is_read,
        }))
    }
}

/// A mapped PCI BAR resource file.
struct XdmaBar {
    ptr: *mut u8,
    size: usize,
    path: PathBuf,
}

// Safety: the mapping is device register space, not host memory shared with
// other threads, and access goes through volatile 32-bit reads and writes on
// &self only.
unsafe impl Send for XdmaBar {}
unsafe impl Sync for XdmaBar {}

impl XdmaBar {
    fn map(path: &Path) -> Result<Self, HarnessError> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(path)
            .map_err(|e| HarnessError::Map {
                file: path.into(),
                e,
            })?;
        let size = file
            .metadata()
            .map_err(|e| HarnessError::Map {
                file: path.into(),
                e,
            })?
            .len() as usize;
        if size == 0 {
            return Err(HarnessError::Map {
                file: path.into(),
                e: std::io::Error::new(std::io::ErrorKind::InvalidData, "zero-length resource"),
            });
        }

        let ptr = unsafe {
            libc::mmap(
                std::ptr::null_mut(),
                size,
                libc::PROT_READ | libc::PROT_WRITE,
                libc::MAP_SHARED,
                file.as_raw_fd(),
                0,
            )
        };
        if ptr == libc::MAP_FAILED {
            return Err(HarnessError::Map {
                file: path.into(),
                e: std::io::Error::last_os_error(),
            });
        }
        trace!("mapped {size} bytes of {path:?}");

        // The fd can close here, the mapping stays valid until munmap.
        Ok(XdmaBar {
            ptr: ptr as *mut u8,
            size,
            path: path.to_owned(),
        })
    }

    fn checked_offset(&self, offset: u64) -> Result<usize, HarnessError> {
        if offset % 4 != 0 {
            return Err(HarnessError::Argument(format!(
                "unaligned register access at offset {offset:#x} in {:?}",
                self.path
            )));
        }
        let offset = offset as usize;
        if offset + 4 > self.size {
            return Err(HarnessError::Argument(format!(
                "register offset {offset:#x} is outside {:?} ({} bytes)",
                self.path, self.size
            )));
        }
        Ok(offset)
    }
}

impl RegisterBar for XdmaBar {
    fn peek(&self, offset: u64) -> Result<u32, HarnessError> {
        let offset = self.checked_offset(offset)?;
        Ok(unsafe { std::ptr::read_volatile(self.ptr.add(offset) as *const u32) })
    }

    fn poke(&self, offset: u64, value: u32) -> Result<(), HarnessError> {
        let offset = self.checked_offset(offset)?;
        unsafe { std::ptr::write_volatile(self.ptr.add(offset) as *mut u32, value) };
        Ok(())
    }
}

impl Drop for XdmaBar {
    fn drop(&mut self) {
        unsafe {
            libc::munmap(self.ptr as *mut libc::c_void, self.size);
        }
    }
}

/// One direction of an XDMA channel, backed by its character device.
struct XdmaQueue {
    file: File,
    path: PathBuf,
    is_read: bool,
}

impl DmaQueue for XdmaQueue {
    fn burst_write(&mut self, data: &[u8], device_offset: u64) -> Result<(), HarnessError> {
        if self.is_read {
            return Err(HarnessError::Argument(format!(
                "{:?} was opened for reading",
                self.path
            )));
        }
        fs_write_all_at(&self.file, &self.path, data, device_offset)
    }

    fn burst_read(&mut self, buf: &mut [u8], device_offset: u64) -> Result<(), HarnessError> {
        if !self.is_read {
            return Err(HarnessError::Argument(format!(
                "{:?} was opened for writing",
                self.path
            )));
        }
        fs_read_exact_at(&self.file, &self.path, buf, device_offset)
    }
}

fn read_hex_u16(path: &Path) -> Result<u16, HarnessError> {
    let contents = fs_read(path)?;
    parse_hex_u16(&contents).ok_or_else(|| {
        HarnessError::Internal(format!(
            "could not parse {path:?} contents {contents:?} as a PCI id"
        ))
    })
}

/// Parse a sysfs PCI id ("0x1d0f", with or without the prefix or a trailing
/// newline) into a u16.
fn parse_hex_u16(contents: &str) -> Option<u16> {
    let trimmed = contents.trim().trim_start_matches("0x");
    u16::from_str_radix(trimmed, 16).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_hex_u16_accepts_sysfs_forms() {
        assert_eq!(parse_hex_u16("0x1d0f\n"), Some(0x1d0f));
        assert_eq!(parse_hex_u16("f001"), Some(0xf001));
        assert_eq!(parse_hex_u16("  0x10EE "), Some(0x10ee));
    }

    #[test]
    fn test_parse_hex_u16_rejects_garbage() {
        assert_eq!(parse_hex_u16(""), None);
        assert_eq!(parse_hex_u16("0x"), None);
        assert_eq!(parse_hex_u16("not-an-id"), None);
        assert_eq!(parse_hex_u16("0x12345"), None);
    }
}
