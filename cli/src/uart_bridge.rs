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
use bringup::error::HarnessError;
use bringup::slot::check_slot_ready;
use bringup::uart::{init_uart, spawn_bridge};
use clap::Parser;
use log::{debug, error, info};
use std::io;
use std::process::ExitCode;

/// Bridge the terminal to the card's serial port: bytes the card sends appear
/// on stdout, bytes typed on stdin are transmitted to the card. Runs until
/// the process is killed.
#[derive(Parser, Debug)]
#[command(name = "uart_bridge")]
struct Cli {
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

    check_slot_ready(backend.as_ref(), &spec)?;

    let bar = backend.attach_bar(cli.slot, 0)?;
    init_uart(bar.as_ref())?;

    info!(
        "serial port configured, relaying between the terminal and slot {}",
        cli.slot
    );
    spawn_bridge(bar, io::stdin(), io::stdout()).join()
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    register_backends();
    let cli = Cli::parse();
    debug!("parsed cli command with {cli:?}");

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e}");
            ExitCode::FAILURE
        }
    }
}
