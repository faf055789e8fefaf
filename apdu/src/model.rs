// Copyright (c) 2022-2023 The MobileCoin Foundation

//! Device models

use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString};

/// Supported device models
#[derive(
    Copy, Clone, PartialEq, Eq, Debug, Display, EnumString, EnumIter, Serialize, Deserialize,
)]
#[strum(serialize_all = "camelCase")]
#[serde(rename_all = "camelCase")]
pub enum DeviceModelId {
    NanoS,
    #[strum(serialize = "nanoSP")]
    #[serde(rename = "nanoSP")]
    NanoSP,
    NanoX,
    Stax,
    Flex,
}

/// Application storage layout
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub struct MemoryLayout {
    /// Allocation granularity in bytes
    pub block_size: u32,
    /// Storage available for applications in bytes
    pub memory_size: u32,
}

impl MemoryLayout {
    /// Number of blocks required to store `bytes`
    pub fn blocks(&self, bytes: u64) -> u64 {
        let b = self.block_size as u64;
        (bytes + b - 1) / b
    }

    /// Total number of blocks
    pub fn total_blocks(&self) -> u64 {
        self.memory_size as u64 / self.block_size as u64
    }
}

impl DeviceModelId {
    /// Application storage layout for this model
    pub fn memory(&self) -> MemoryLayout {
        match self {
            DeviceModelId::NanoS => MemoryLayout {
                block_size: 4 * 1024,
                memory_size: 320 * 1024,
            },
            DeviceModelId::NanoX => MemoryLayout {
                block_size: 4 * 1024,
                memory_size: 2 * 1024 * 1024,
            },
            DeviceModelId::NanoSP | DeviceModelId::Stax | DeviceModelId::Flex => MemoryLayout {
                block_size: 32,
                memory_size: 1533 * 1024,
            },
        }
    }
}
