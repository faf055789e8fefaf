// Copyright (c) 2022-2023 The MobileCoin Foundation

//! Storage prediction for application installs

use log::debug;

use ledger_dmk_apdu::DeviceModelId;

use crate::manager::{Application, DeviceMetadata};

/// Check whether installing `plan` would exceed the device's application storage
///
/// Sizes are rounded up to the model's allocation blocks. Updated applications
/// replace their installed version, so its blocks are released first.
pub fn predict_out_of_memory(
    metadata: &DeviceMetadata,
    model: DeviceModelId,
    plan: &[Application],
) -> bool {
    let memory = model.memory();

    let used: u64 = metadata
        .installed_apps
        .iter()
        .map(|a| a.size_in_blocks as u64)
        .sum();

    let released: u64 = metadata
        .installed_apps
        .iter()
        .filter(|i| plan.iter().any(|a| a.version_name == i.name))
        .map(|a| a.size_in_blocks as u64)
        .sum();

    let required: u64 = plan
        .iter()
        .map(|a| memory.blocks(a.bytes.unwrap_or(0)))
        .sum();

    let available = memory.total_blocks().saturating_sub(used - released);

    debug!(
        "Storage: {} blocks required, {} available ({} used)",
        required, available, used
    );

    required > available
}
