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

use crate::common::test_functions::{expect_err_contains, write_temp_image};
use bringup::backends::backend::Backend;
use bringup::backends::sim::SimBackend;
use bringup::dram::{IMAGE_BASE_OFFSET, stream_image, zero_range};
use bringup::error::HarnessError;
use googletest::prelude::*;
use rstest::*;

/// Small staging buffer so the tests exercise multi-burst streams cheaply.
const TEST_STAGING: usize = 4096;

fn test_image(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i % 251) as u8).collect()
}

#[gtest]
#[rstest]
#[case::empty_image(0)]
#[case::shorter_than_staging(1000)]
#[case::exact_staging_multiple(2 * TEST_STAGING)]
#[case::short_final_burst(2 * TEST_STAGING + 513)]
fn image_round_trip(#[case] len: usize) {
    let backend = SimBackend::new();
    let image = test_image(len);
    let file = write_temp_image(&image);

    let mut write_queue = backend
        .open_queue(0, 0, false)
        .expect("failed to open the write queue");
    let mut read_queue = backend
        .open_queue(0, 0, true)
        .expect("failed to open the read queue");

    let written = stream_image(
        write_queue.as_mut(),
        read_queue.as_mut(),
        file.path(),
        IMAGE_BASE_OFFSET,
        TEST_STAGING,
    )
    .expect("streaming failed");

    assert_that!(written, eq(len as u64));
    assert_that!(backend.dram_snapshot(IMAGE_BASE_OFFSET, len), eq(&image));
}

#[gtest]
fn missing_image_file_fails() {
    let backend = SimBackend::new();
    let mut write_queue = backend.open_queue(0, 0, false).unwrap();
    let mut read_queue = backend.open_queue(0, 0, true).unwrap();

    expect_err_contains(
        stream_image(
            write_queue.as_mut(),
            read_queue.as_mut(),
            std::path::Path::new("/nonexistent/image.bin"),
            IMAGE_BASE_OFFSET,
            TEST_STAGING,
        ),
        "HarnessError::IORead",
    );
}

#[gtest]
#[rstest]
#[case::in_first_burst(1234, IMAGE_BASE_OFFSET)]
#[case::in_second_burst(TEST_STAGING as u64 + 17, IMAGE_BASE_OFFSET + TEST_STAGING as u64)]
fn single_byte_corruption_fails_verification(
    #[case] corrupt_at: u64,
    #[case] expected_burst_offset: u64,
) {
    let backend = SimBackend::new();
    backend.set_read_corruption(IMAGE_BASE_OFFSET + corrupt_at, 0x40);
    let image = test_image(3 * TEST_STAGING);
    let file = write_temp_image(&image);

    let mut write_queue = backend.open_queue(0, 0, false).unwrap();
    let mut read_queue = backend.open_queue(0, 0, true).unwrap();

    let err = stream_image(
        write_queue.as_mut(),
        read_queue.as_mut(),
        file.path(),
        IMAGE_BASE_OFFSET,
        TEST_STAGING,
    )
    .expect_err("corrupted readback must fail verification");

    match &err {
        HarnessError::Verify {
            device_offset,
            differing,
        } => {
            assert_that!(*differing, eq(1));
            assert_that!(*device_offset, eq(expected_burst_offset));
        }
        other => panic!("expected a verification failure, got {other}"),
    }
}

#[gtest]
#[rstest]
#[case::staging_multiple(3 * TEST_STAGING as u64)]
#[case::short_final_burst(2 * TEST_STAGING as u64 + 100)]
fn zero_fill_clears_preloaded_range(#[case] len: u64) {
    let backend = SimBackend::new();
    backend.fill(0, len as usize, 0xA5);

    let mut write_queue = backend.open_queue(0, 0, false).unwrap();
    let mut read_queue = backend.open_queue(0, 0, true).unwrap();

    zero_range(write_queue.as_mut(), read_queue.as_mut(), 0, len, TEST_STAGING)
        .expect("zeroing failed");

    assert_that!(
        backend.dram_snapshot(0, len as usize),
        eq(&vec![0u8; len as usize])
    );
}

#[gtest]
fn queues_enforce_their_direction() {
    let backend = SimBackend::new();
    let mut write_queue = backend.open_queue(0, 0, false).unwrap();
    let mut read_queue = backend.open_queue(0, 0, true).unwrap();

    let mut buf = [0u8; 4];
    expect_err_contains(
        read_queue.burst_write(&[0u8; 4], 0),
        "HarnessError::Argument",
    );
    expect_err_contains(
        write_queue.burst_read(&mut buf, 0),
        "HarnessError::Argument",
    );
}
