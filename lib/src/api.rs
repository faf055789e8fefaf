// Copyright (c) 2022-2023 The MobileCoin Foundation

//! Context passed to device actions

use std::{sync::Arc, time::Duration};

use ledger_dmk_apdu::{Command, DeviceModelId};

use crate::{
    config::SessionConfig,
    manager::{ManagerApi, SecureChannel},
    session::{DeviceSession, SessionState},
    Error,
};

/// Collaborators available to device actions: the device session along with
/// the optional manager API and secure channel.
#[derive(Clone)]
pub struct InternalApi {
    session: DeviceSession,
    manager: Option<Arc<dyn ManagerApi>>,
    secure_channel: Option<Arc<dyn SecureChannel>>,
}

impl std::fmt::Debug for InternalApi {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InternalApi")
            .field("session", &self.session)
            .field("manager", &self.manager.is_some())
            .field("secure_channel", &self.secure_channel.is_some())
            .finish()
    }
}

impl From<DeviceSession> for InternalApi {
    fn from(session: DeviceSession) -> Self {
        Self::new(session)
    }
}

impl InternalApi {
    pub fn new(session: DeviceSession) -> Self {
        Self {
            session,
            manager: None,
            secure_channel: None,
        }
    }

    pub fn with_manager(mut self, manager: impl ManagerApi + 'static) -> Self {
        self.manager = Some(Arc::new(manager));
        self
    }

    pub fn with_secure_channel(mut self, secure_channel: impl SecureChannel + 'static) -> Self {
        self.secure_channel = Some(Arc::new(secure_channel));
        self
    }

    pub fn session(&self) -> &DeviceSession {
        &self.session
    }

    pub fn model(&self) -> DeviceModelId {
        self.session.model()
    }

    pub fn config(&self) -> &SessionConfig {
        self.session.config()
    }

    pub fn state(&self) -> SessionState {
        self.session.state()
    }

    pub fn update_state(&self, f: impl FnOnce(&mut SessionState)) {
        self.session.update_state(f)
    }

    /// Manager API, required by metadata and install actions
    pub fn manager(&self) -> Result<&dyn ManagerApi, Error> {
        self.manager
            .as_deref()
            .ok_or_else(|| Error::InvalidState("No manager API configured".to_string()))
    }

    /// Secure channel, required by install actions
    pub fn secure_channel(&self) -> Result<&dyn SecureChannel, Error> {
        self.secure_channel
            .as_deref()
            .ok_or_else(|| Error::InvalidState("No secure channel configured".to_string()))
    }

    pub async fn send_command<C: Command>(&self, cmd: &C) -> Result<C::Response, Error> {
        self.session.send_command(cmd).await
    }

    pub async fn send_user_command<C: Command>(&self, cmd: &C) -> Result<C::Response, Error> {
        self.session.send_user_command(cmd).await
    }

    pub async fn send_command_with_timeout<C: Command>(
        &self,
        cmd: &C,
        timeout: Option<Duration>,
    ) -> Result<C::Response, Error> {
        self.session.send_command_with_timeout(cmd, timeout).await
    }
}
