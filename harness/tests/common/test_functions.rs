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

use bringup::error::HarnessError;
use googletest::prelude::*;
use std::io::Write;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tempfile::NamedTempFile;

/// Assert that `res` is an error whose message contains `needle`.
pub fn expect_err_contains<T: std::fmt::Debug>(res: Result<T, HarnessError>, needle: &str) {
    match res {
        Err(e) => {
            assert_that!(
                e.to_string(),
                contains_substring(needle.to_string()),
                "Mismatched error signature"
            );
        }
        Ok(v) => {
            panic!("expected an error containing {needle:?}, got Ok({v:?})");
        }
    }
}

/// Write `bytes` to a scratch file and return its handle.
pub fn write_temp_image(bytes: &[u8]) -> NamedTempFile {
    let mut file = NamedTempFile::new().expect("failed to create a scratch image file");
    file.write_all(bytes)
        .expect("failed to write the scratch image file");
    file.flush().expect("failed to flush the scratch image file");
    file
}

/// Spin until `cond` holds, panicking after five seconds.
pub fn wait_until(mut cond: impl FnMut() -> bool) {
    let deadline = Instant::now() + Duration::from_secs(5);
    while !cond() {
        if Instant::now() >= deadline {
            panic!("condition not reached within 5s");
        }
        std::thread::sleep(Duration::from_millis(1));
    }
}

/// Byte sink that can be handed to a bridge thread and inspected afterwards.
#[derive(Clone, Default)]
pub struct SharedSink(Arc<Mutex<Vec<u8>>>);

impl SharedSink {
    pub fn new() -> Self {
        SharedSink::default()
    }

    pub fn contents(&self) -> Vec<u8> {
        self.0.lock().expect("sink lock poisoned").clone()
    }
}

impl Write for SharedSink {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0
            .lock()
            .expect("sink lock poisoned")
            .extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}
