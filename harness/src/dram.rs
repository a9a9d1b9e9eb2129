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

//! Verified DRAM image streaming.
//!
//! An image file is streamed into device DRAM through a fixed-size staging
//! buffer: each burst is written, read back at the same device offset, and
//! byte-compared before the next one is issued. A mismatch or any transfer
//! failure aborts the pass. [`zero_range`] clears a range with the same
//! write-readback-compare loop and a zero-filled staging buffer.

use crate::backends::backend::DmaQueue;
use crate::error::HarnessError;
use log::{debug, error, info};
use std::fs::File;
use std::io::Read;
use std::path::Path;

/// Capacity of one DRAM DIMM on the card.
pub const MEM_16_GIB: u64 = 1 << 34;

/// Device offset images are loaded at: the base of DIMM 3.
pub const IMAGE_BASE_OFFSET: u64 = 3 * MEM_16_GIB;

/// Default staging buffer size for DMA bursts.
pub const STAGING_BUFFER_SIZE: usize = 1 << 20;

/// Length of the scratch range at the bottom of DIMM 0 cleared after loading.
pub const ZERO_RANGE_LEN: u64 = 1 << 20;

/// Count the bytes at which `a` and `b` differ.
pub fn compare_buffers(a: &[u8], b: &[u8]) -> u64 {
    a.iter().zip(b.iter()).filter(|(x, y)| x != y).count() as u64
}

/// Stream `image_path` into device memory at `device_offset`, verifying every
/// burst on readback.
///
/// # Returns: `Result<u64, HarnessError>`
/// * `Ok(u64)` - Total bytes written and verified
/// * `Err(HarnessError::Verify)` - A burst read back differently than written
/// * `Err(HarnessError)` - The image could not be read or a transfer failed
pub fn stream_image(
    write_queue: &mut dyn DmaQueue,
    read_queue: &mut dyn DmaQueue,
    image_path: &Path,
    device_offset: u64,
    buffer_size: usize,
) -> Result<u64, HarnessError> {
    let mut image = File::open(image_path).map_err(|e| HarnessError::IORead {
        file: image_path.into(),
        e,
    })?;

    info!("streaming {image_path:?} to device offset {device_offset:#x}");
    let mut write_buffer = vec![0u8; buffer_size];
    let mut read_buffer = vec![0u8; buffer_size];
    let mut pos = device_offset;
    let mut total = 0u64;

    loop {
        let n = read_chunk(&mut image, &mut write_buffer).map_err(|e| HarnessError::IORead {
            file: image_path.into(),
            e,
        })?;
        if n == 0 {
            break;
        }

        verify_burst(write_queue, read_queue, &write_buffer[..n], &mut read_buffer[..n], pos)?;
        debug!("verified {n} bytes at {pos:#x}");

        total += n as u64;
        pos += n as u64;
        if n < buffer_size {
            break;
        }
    }

    info!("image streamed: {total} bytes at {device_offset:#x}");
    Ok(total)
}

/// Zero `len` bytes of device memory at `device_offset`, verifying every
/// burst on readback.
pub fn zero_range(
    write_queue: &mut dyn DmaQueue,
    read_queue: &mut dyn DmaQueue,
    device_offset: u64,
    len: u64,
    buffer_size: usize,
) -> Result<(), HarnessError> {
    info!("zeroing {len} bytes at device offset {device_offset:#x}");
    let zeroes = vec![0u8; buffer_size];
    let mut read_buffer = vec![0u8; buffer_size];
    let mut pos = device_offset;
    let mut remaining = len;

    while remaining > 0 {
        let n = remaining.min(buffer_size as u64) as usize;
        verify_burst(write_queue, read_queue, &zeroes[..n], &mut read_buffer[..n], pos)?;
        debug!("zeroed {n} bytes at {pos:#x}");
        pos += n as u64;
        remaining -= n as u64;
    }

    info!("zeroed {len} bytes at {device_offset:#x}");
    Ok(())
}

/// Write one burst, read it back at the same offset, and compare.
fn verify_burst(
    write_queue: &mut dyn DmaQueue,
    read_queue: &mut dyn DmaQueue,
    data: &[u8],
    read_buffer: &mut [u8],
    device_offset: u64,
) -> Result<(), HarnessError> {
    write_queue.burst_write(data, device_offset)?;
    read_queue.burst_read(read_buffer, device_offset)?;

    let differing = compare_buffers(read_buffer, data);
    if differing != 0 {
        error!("burst at {device_offset:#x} read back with {differing} differing byte(s)");
        return Err(HarnessError::Verify {
            device_offset,
            differing,
        });
    }
    Ok(())
}

/// Fill `buf` from `file`, stopping early only at end of file.
fn read_chunk(file: &mut File, buf: &mut [u8]) -> std::io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match file.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}
