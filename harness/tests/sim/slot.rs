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

use crate::common::test_functions::expect_err_contains;
use bringup::backends::backend::{ImageStatus, SlotImage};
use bringup::backends::sim::SimBackend;
use bringup::config::SlotSpec;
use bringup::slot::check_slot_ready;
use googletest::prelude::*;

#[gtest]
fn ready_slot_passes_without_rescan() {
    let backend = SimBackend::new();
    check_slot_ready(&backend, &SlotSpec::default()).expect("default sim slot should be ready");
    assert_that!(backend.rescan_count(), eq(0));
}

#[gtest]
fn unloaded_slot_fails_without_rescan() {
    let backend = SimBackend::new();
    backend.set_slot_image(SlotImage {
        status: ImageStatus::NotLoaded,
        vendor_id: 0,
        device_id: 0,
    });

    expect_err_contains(
        check_slot_ready(&backend, &SlotSpec::default()),
        "not loaded",
    );
    assert_that!(backend.rescan_count(), eq(0));
}

#[gtest]
fn mismatched_ids_fail_after_one_rescan() {
    let backend = SimBackend::new();
    backend.set_slot_image(SlotImage {
        status: ImageStatus::Loaded,
        vendor_id: 0x10EE,
        device_id: 0x7021,
    });

    expect_err_contains(
        check_slot_ready(&backend, &SlotSpec::default()),
        "HarnessError::Slot",
    );
    assert_that!(backend.rescan_count(), eq(1));
}

#[gtest]
fn rescan_recovering_expected_ids_passes() {
    let backend = SimBackend::new();
    let spec = SlotSpec::default();
    backend.set_slot_image(SlotImage {
        status: ImageStatus::Loaded,
        vendor_id: 0x10EE,
        device_id: 0x7021,
    });
    backend.set_image_after_rescan(SlotImage {
        status: ImageStatus::Loaded,
        vendor_id: spec.vendor_id,
        device_id: spec.device_id,
    });

    check_slot_ready(&backend, &spec).expect("slot should be ready after the rescan");
    assert_that!(backend.rescan_count(), eq(1));
}
