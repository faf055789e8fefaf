// Copyright (c) 2022-2023 The MobileCoin Foundation

//! Session configuration

use std::time::Duration;

use serde::{Deserialize, Serialize};

use ledger_dmk_apdu::APDU_MAX_PAYLOAD;

/// Device session configuration
///
/// All fields have defaults, so partial configurations may be loaded
/// (for example from TOML).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Timeout for requests not awaiting the user
    pub request_timeout_ms: u64,

    /// Timeout for requests awaiting user confirmation, unbounded when unset
    pub user_timeout_ms: Option<u64>,

    /// Time allowed for the user to unlock the device
    pub unlock_timeout_ms: u64,

    /// Interval between device state polls while locked
    pub unlock_poll_ms: u64,

    /// Maximum payload per chunk for chunked transfers
    pub max_chunk_size: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            request_timeout_ms: 2_000,
            user_timeout_ms: None,
            unlock_timeout_ms: 30_000,
            unlock_poll_ms: 1_000,
            max_chunk_size: APDU_MAX_PAYLOAD,
        }
    }
}

impl SessionConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn user_timeout(&self) -> Option<Duration> {
        self.user_timeout_ms.map(Duration::from_millis)
    }

    pub fn unlock_timeout(&self) -> Duration {
        Duration::from_millis(self.unlock_timeout_ms)
    }

    pub fn unlock_poll(&self) -> Duration {
        Duration::from_millis(self.unlock_poll_ms)
    }
}
