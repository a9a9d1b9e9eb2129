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

//! Bring-up test harness for FPGA accelerator cards.
//!
//! This library backs two small test executables used while bringing up an
//! accelerator card:
//! - a DRAM image loader that streams a binary image into device memory over
//!   a DMA queue and verifies every burst on readback, then zero-fills a
//!   scratch range the same way ([`dram`]),
//! - a UART bridge that programs the card's serial port through a PCIe BAR
//!   register window and relays bytes between the terminal and the port from
//!   two polling threads ([`uart`]).
//!
//! All hardware access goes through the traits in [`backends`], so the same
//! procedures run against the real card (the `xdma` backend) or against an
//! in-process simulated card (the `sim` backend) used by the test suite and
//! for dry runs.
//!
//! # Environment Variables
//!
//! - `RUST_LOG` - Controls logging level (`trace`, `debug`, `info`, `warn`,
//!   `error` or `off`) when the binaries initialise `env_logger`. Defaults
//!   to `info`.

pub mod backends;
pub mod config;
pub mod dram;
pub mod error;
pub mod slot;
pub mod system_io;
pub mod uart;
