// Copyright (c) 2022-2023 The MobileCoin Foundation

//! Session for connected ledger devices
//!
//! This provides the send-command primitive used by tasks and device actions,
//! along with a cache of the last known device state.

use std::{
    sync::{Arc, Mutex as StdMutex},
    time::Duration,
};

use log::{debug, trace};
use strum::Display;
use tokio::sync::Mutex;

use ledger_dmk_apdu::{
    os::{AppAndVersion, OsVersion},
    ApduResponse, Command, CommandError, DeviceModelId,
};

use crate::{config::SessionConfig, manager::DeviceMetadata, transport::Transport, Error};

/// Device status as last observed by the session
#[derive(Copy, Clone, PartialEq, Eq, Debug, Default, Display)]
pub enum DeviceStatus {
    /// Connected, nothing known yet
    #[default]
    Connected,
    /// Unlocked and responsive
    Ready,
    /// Reported as locked
    Locked,
}

/// Cached device state, updated by device actions
#[derive(Clone, PartialEq, Debug, Default)]
pub struct SessionState {
    pub status: DeviceStatus,
    /// Running application, if known
    pub current_app: Option<AppAndVersion>,
    /// Firmware information, if fetched
    pub os_version: Option<OsVersion>,
    /// Device metadata, if fetched
    pub metadata: Option<DeviceMetadata>,
    /// Secure connection permission granted by the user
    pub is_secure_connection_allowed: bool,
}

impl SessionState {
    /// Onboarding status from the cached firmware flags, assumed onboarded when unknown
    pub fn is_onboarded(&self) -> bool {
        self.os_version
            .as_ref()
            .map(|v| v.is_onboarded())
            .unwrap_or(true)
    }

    /// Name of the running application, if known
    pub fn current_app_name(&self) -> Option<&str> {
        self.current_app.as_ref().map(|a| a.name.as_str())
    }
}

/// Handle for a connected ledger device.
///
/// Clones share the underlying transport and state, commands are serialised
/// through the transport lock so only one frame is ever in flight.
#[derive(Clone)]
pub struct DeviceSession {
    /// Transport for communication
    t: Arc<Mutex<Box<dyn Transport>>>,
    /// Cached device state
    state: Arc<StdMutex<SessionState>>,
    /// Connected device model
    model: DeviceModelId,
    /// Timeouts and transfer limits
    config: SessionConfig,
}

impl std::fmt::Debug for DeviceSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeviceSession")
            .field("model", &self.model)
            .field("config", &self.config)
            .finish()
    }
}

impl DeviceSession {
    /// Create a session over a connected transport
    pub fn new(t: impl Transport + 'static, model: DeviceModelId) -> Self {
        Self {
            t: Arc::new(Mutex::new(Box::new(t))),
            state: Arc::new(StdMutex::new(SessionState::default())),
            model,
            config: SessionConfig::default(),
        }
    }

    /// Replace the session configuration
    pub fn with_config(mut self, config: SessionConfig) -> Self {
        self.config = config;
        self
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn model(&self) -> DeviceModelId {
        self.model
    }

    /// Snapshot of the cached device state
    pub fn state(&self) -> SessionState {
        self.state
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Update the cached device state
    pub fn update_state(&self, f: impl FnOnce(&mut SessionState)) {
        let mut s = self.state.lock().unwrap_or_else(|e| e.into_inner());
        f(&mut s);
    }

    /// Send a command using the request timeout
    pub async fn send_command<C: Command>(&self, cmd: &C) -> Result<C::Response, Error> {
        self.send_command_with_timeout(cmd, Some(self.config.request_timeout()))
            .await
    }

    /// Send a command awaiting user interaction, using the user timeout
    pub async fn send_user_command<C: Command>(&self, cmd: &C) -> Result<C::Response, Error> {
        self.send_command_with_timeout(cmd, self.config.user_timeout())
            .await
    }

    /// Send a command with an optional timeout and parse the response
    pub async fn send_command_with_timeout<C: Command>(
        &self,
        cmd: &C,
        timeout: Option<Duration>,
    ) -> Result<C::Response, Error> {
        let frame = cmd.apdu()?.to_bytes();

        debug!("Sending {} ({} bytes)", cmd.name(), frame.len());

        let resp = self.exchange(&frame, timeout).await?;

        match cmd.parse_response(&resp, self.model) {
            Ok(v) => Ok(v),
            Err(e) => {
                debug!("{} failed: {}", cmd.name(), e);

                if e.is_locked() {
                    self.update_state(|s| s.status = DeviceStatus::Locked);
                }

                Err(Error::Command(e))
            }
        }
    }

    /// Exchange a raw frame, used to relay frames for secure channels
    pub async fn exchange(
        &self,
        frame: &[u8],
        timeout: Option<Duration>,
    ) -> Result<ApduResponse, Error> {
        trace!("tx: {}", hex::encode(frame));

        let mut t = self.t.lock().await;

        let raw = match timeout {
            Some(d) => tokio::time::timeout(d, t.exchange(frame)).await??,
            None => t.exchange(frame).await?,
        };

        trace!("rx: {}", hex::encode(&raw));

        ApduResponse::from_bytes(&raw).map_err(|e| Error::Command(CommandError::Decoding(e)))
    }
}
