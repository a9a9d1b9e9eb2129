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

//! Slot readiness checks run before any test touches the card.

use crate::backends::backend::{Backend, ImageStatus};
use crate::config::SlotSpec;
use crate::error::HarnessError;
use log::{info, trace};

/// Check that the slot has a loaded image reporting the expected PCI IDs.
///
/// A freshly loaded image can still show stale IDs until the host
/// re-enumerates the slot, so an ID mismatch triggers one rescan and a second
/// look before the check fails.
///
/// # Returns: `Result<(), HarnessError>`
/// * `Ok(())` - The image is loaded and reports the expected IDs
/// * `Err(HarnessError::Slot)` - No loaded image, or wrong IDs after a rescan
pub fn check_slot_ready(backend: &dyn Backend, spec: &SlotSpec) -> Result<(), HarnessError> {
    trace!("describing slot {}", spec.slot_id);
    let image = backend.describe_slot(spec.slot_id)?;
    if image.status != ImageStatus::Loaded {
        return Err(HarnessError::Slot(format!(
            "image in slot {} is not loaded",
            spec.slot_id
        )));
    }
    if image.vendor_id == spec.vendor_id && image.device_id == spec.device_id {
        return Ok(());
    }

    info!(
        "slot {} reports PCI ids {:04x}:{:04x}, expected {:04x}:{:04x}; if the image was just loaded it may need a rescan, rescanning now",
        spec.slot_id, image.vendor_id, image.device_id, spec.vendor_id, spec.device_id
    );
    backend.rescan_slot(spec.slot_id)?;

    let image = backend.describe_slot(spec.slot_id)?;
    if image.status != ImageStatus::Loaded
        || image.vendor_id != spec.vendor_id
        || image.device_id != spec.device_id
    {
        return Err(HarnessError::Slot(format!(
            "slot {} reports PCI ids {:04x}:{:04x} after a rescan, expected {:04x}:{:04x}",
            spec.slot_id, image.vendor_id, image.device_id, spec.vendor_id, spec.device_id
        )));
    }
    Ok(())
}
