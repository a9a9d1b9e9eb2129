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

use crate::common::test_functions::{SharedSink, wait_until};
use bringup::backends::backend::Backend;
use bringup::backends::sim::SimBackend;
use bringup::uart::{BAUD_DIVISOR_HIGH, BAUD_DIVISOR_LOW, Lcr, init_uart, spawn_bridge};
use googletest::prelude::*;
use std::io::Cursor;

#[gtest]
fn init_programs_the_serial_port() {
    let backend = SimBackend::new();
    // Anything stale in the receive FIFO must be gone after the reset.
    backend.push_inbound(b"stale");

    let bar = backend.attach_bar(0, 0).expect("failed to attach BAR 0");
    init_uart(bar.as_ref()).expect("serial port init failed");

    let regs = backend.uart_registers();
    assert_that!(regs.ier, eq(0));
    assert_that!(regs.dll, eq(BAUD_DIVISOR_LOW));
    assert_that!(regs.dlm, eq(BAUD_DIVISOR_HIGH));
    assert_that!(regs.lcr, eq(Lcr::CHAR_8N1.bits()));
    assert_that!(regs.rx_pending, eq(0));
    assert!(regs.fifo_enabled, "FIFOs should be enabled after init");
}

#[gtest]
fn bridge_relays_both_directions_without_deadlock() {
    let backend = SimBackend::new();
    let bar = backend.attach_bar(0, 0).unwrap();
    init_uart(bar.as_ref()).unwrap();

    // Both queues are non-empty before the bridge starts.
    backend.push_inbound(b"ping!");
    let sink = SharedSink::new();
    let handle = spawn_bridge(bar, Cursor::new(b"pong?".to_vec()), sink.clone());

    wait_until(|| sink.contents().len() == 5 && backend.outbound_len() == 5);
    handle.shutdown().expect("bridge reported an error");

    assert_that!(sink.contents(), eq(&b"ping!".to_vec()));
    assert_that!(backend.take_outbound(), eq(&b"pong?".to_vec()));
}

#[gtest]
fn idle_bridge_shuts_down_cleanly() {
    let backend = SimBackend::new();
    let bar = backend.attach_bar(0, 0).unwrap();
    init_uart(bar.as_ref()).unwrap();

    let handle = spawn_bridge(bar, Cursor::new(Vec::new()), SharedSink::new());
    handle.shutdown().expect("idle bridge should stop cleanly");
}

#[gtest]
fn bridge_keeps_relaying_inbound_after_input_ends() {
    let backend = SimBackend::new();
    let bar = backend.attach_bar(0, 0).unwrap();
    init_uart(bar.as_ref()).unwrap();

    let sink = SharedSink::new();
    let handle = spawn_bridge(bar, Cursor::new(Vec::new()), sink.clone());

    // The outbound source is already exhausted; inbound traffic must still
    // flow.
    backend.push_inbound(b"late");
    wait_until(|| sink.contents().len() == 4);
    handle.shutdown().expect("bridge reported an error");

    assert_that!(sink.contents(), eq(&b"late".to_vec()));
}
