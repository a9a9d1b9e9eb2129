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

//! Error Wrapping File System I/O Helpers
//!
//! Convenient wrappers around standard Rust file system operations with
//! automatic conversion to `HarnessError` types. All functions include trace
//! logging and carry the file path in the error context.
//!
//! Includes: whole-file and directory reads used for sysfs probing, a string
//! write used for sysfs control files, and positional byte I/O used for DMA
//! character devices.

use crate::error::HarnessError;
use log::trace;
use std::fs::{File, OpenOptions};
use std::io::{Read, Write};
use std::os::unix::fs::FileExt;
use std::path::Path;

/// Read the contents of a file to a String.
///
/// # Arguments
///
/// * `file_path` - Path to the file to read
///
/// # Returns: `Result<String, HarnessError>`
/// * `Ok(String)` - The complete contents of the file
/// * `Err(HarnessError::IORead)` - If the file cannot be read (doesn't exist, permissions, etc.)
pub fn fs_read(file_path: &Path) -> Result<String, HarnessError> {
    trace!("Attempting to read from {file_path:?}");
    let mut buf: String = String::new();
    let result = OpenOptions::new()
        .read(true)
        .open(file_path)
        .and_then(|mut f| f.read_to_string(&mut buf));

    match result {
        Ok(_) => {
            trace!("Reading done");
            Ok(buf)
        }
        Err(e) => Err(HarnessError::IORead {
            file: file_path.into(),
            e,
        }),
    }
}

/// Write a string value to an existing file.
///
/// # Arguments
///
/// * `file_path` - Path to the file to write
/// * `value` - The string value to write (implements `AsRef<str>`)
///
/// # Returns: `Result<(), HarnessError>`
/// * `Ok(())` - Write succeeded
/// * `Err(HarnessError::IOWrite)` - If the write fails (permissions, file doesn't exist, etc.)
pub fn fs_write(file_path: &Path, value: impl AsRef<str>) -> Result<(), HarnessError> {
    trace!(
        "Attempting to write {:?} to {:?}",
        value.as_ref(),
        file_path
    );
    let result = OpenOptions::new()
        .read(false)
        .write(true)
        .open(file_path)
        .and_then(|mut f| write!(f, "{}", value.as_ref()));
    match result {
        Ok(_) => {
            trace!("Write done.");
            Ok(())
        }
        Err(e) => Err(HarnessError::IOWrite {
            file: file_path.into(),
            e,
        }),
    }
}

/// Read the contents of a directory and return entry names.
///
/// Entries that cannot be read are silently skipped.
///
/// # Arguments
///
/// * `dir` - The directory path to list
///
/// # Returns: `Result<Vec<String>, HarnessError>`
/// * `Ok(Vec<String>)` - List of entry names in the directory
/// * `Err(HarnessError::IOReadDir)` - If the directory cannot be read
pub fn fs_read_dir(dir: &Path) -> Result<Vec<String>, HarnessError> {
    trace!("Attempting to read directory '{dir:?}'");
    std::fs::read_dir(dir).map_or_else(
        |e| {
            Err(HarnessError::IOReadDir {
                dir: dir.to_owned(),
                e,
            })
        },
        |iter| {
            let ret = iter
                .filter_map(Result::ok)
                .map(|entry| entry.file_name().to_string_lossy().into_owned())
                .collect();
            trace!("Dir reading done.");
            Ok(ret)
        },
    )
}

/// Read exactly `buf.len()` bytes from `file` at `offset`.
///
/// Short reads are an error so a DMA burst is either complete or failed.
pub fn fs_read_exact_at(
    file: &File,
    file_path: &Path,
    buf: &mut [u8],
    offset: u64,
) -> Result<(), HarnessError> {
    trace!(
        "Attempting to read {} bytes at {offset:#x} from {file_path:?}",
        buf.len()
    );
    file.read_exact_at(buf, offset)
        .map_err(|e| HarnessError::IORead {
            file: file_path.into(),
            e,
        })
}

/// Write all of `data` to `file` at `offset`.
pub fn fs_write_all_at(
    file: &File,
    file_path: &Path,
    data: &[u8],
    offset: u64,
) -> Result<(), HarnessError> {
    trace!(
        "Attempting to write {} bytes at {offset:#x} to {file_path:?}",
        data.len()
    );
    file.write_all_at(data, offset)
        .map_err(|e| HarnessError::IOWrite {
            file: file_path.into(),
            e,
        })
}
