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

use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum HarnessError {
    #[error("HarnessError::Argument: {0}")]
    Argument(String),
    #[error("HarnessError::Slot: Slot state is not as expected: {0}")]
    Slot(String),
    #[error(
        "HarnessError::Verify: Readback at device offset {device_offset:#x} does not match what was written: {differing} byte(s) differ"
    )]
    Verify { device_offset: u64, differing: u64 },
    #[error("HarnessError::Timeout: {0}")]
    Timeout(String),
    #[error("HarnessError::IORead: An IO error occurred when reading from {file:?}: {e}")]
    IORead { file: PathBuf, e: std::io::Error },
    #[error("HarnessError::IOWrite: An IO error occurred when writing to {file:?}: {e}")]
    IOWrite { file: PathBuf, e: std::io::Error },
    #[error("HarnessError::IOReadDir: An IO error occurred when reading directory {dir:?}: {e}")]
    IOReadDir { dir: PathBuf, e: std::io::Error },
    #[error("HarnessError::Map: Failed to map register window {file:?}: {e}")]
    Map { file: PathBuf, e: std::io::Error },
    #[error("HarnessError::Internal: An Internal error occurred: {0}")]
    Internal(String),
}
