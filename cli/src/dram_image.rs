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

use bringup::backends::backend::{backend_for_name, register_backends};
use bringup::config::SlotSpec;
use bringup::dram::{
    IMAGE_BASE_OFFSET, STAGING_BUFFER_SIZE, ZERO_RANGE_LEN, stream_image, zero_range,
};
use bringup::error::HarnessError;
use bringup::slot::check_slot_ready;
use clap::Parser;
use log::{debug, error, info};
use std::path::PathBuf;
use std::process::ExitCode;

/// Stream an image file into device DRAM over DMA, verifying every burst on
/// readback, then clear the scratch range at the bottom of DIMM 0.
#[derive(Parser, Debug)]
#[command(name = "dram_image")]
struct Cli {
    /// Image file written to device DRAM.
    image: PathBuf,
    /// FPGA slot to target.
    #[arg(long, default_value_t = 0)]
    slot: u32,
    /// Hardware access backend ("xdma" for a real card, "sim" for a dry run).
    #[arg(long, default_value = "xdma")]
    backend: String,
}

fn run(cli: &Cli) -> Result<(), HarnessError> {
    let backend = backend_for_name(&cli.backend)?;
    let spec = SlotSpec::for_slot(cli.slot);

    info!("checking that the right image is loaded in slot {}...", cli.slot);
    check_slot_ready(backend.as_ref(), &spec)?;

    let mut read_queue = backend.open_queue(cli.slot, 0, true)?;
    let mut write_queue = backend.open_queue(cli.slot, 0, false)?;

    let written = stream_image(
        write_queue.as_mut(),
        read_queue.as_mut(),
        &cli.image,
        IMAGE_BASE_OFFSET,
        STAGING_BUFFER_SIZE,
    )?;
    info!("image written ({written} bytes)");

    zero_range(
        write_queue.as_mut(),
        read_queue.as_mut(),
        0,
        ZERO_RANGE_LEN,
        STAGING_BUFFER_SIZE,
    )?;
    info!("first MiB zeroed");
    Ok(())
}

fn main() -> ExitCode {
    // Progress and the verdict belong on stdout.
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .target(env_logger::Target::Stdout)
        .init();
    register_backends();
    let cli = Cli::parse();
    debug!("parsed cli command with {cli:?}");

    match run(&cli) {
        Ok(()) => {
            info!("TEST PASSED");
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("{e}");
            info!("TEST FAILED");
            ExitCode::FAILURE
        }
    }
}
