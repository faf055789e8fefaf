// Copyright (c) 2022-2023 The MobileCoin Foundation

// Shared between test binaries, not all helpers are used by each
#![allow(dead_code)]

use std::{
    collections::VecDeque,
    str::FromStr,
    sync::{Arc, Mutex},
};

use async_trait::async_trait;
use log::{debug, LevelFilter};
use simplelog::SimpleLogger;

use ledger_dmk::{
    apdu::{os::AppAndVersion, DeviceModelId},
    DeviceSession, SessionConfig, Transport, TransportError,
};

pub const SW_OK: u16 = 0x9000;
pub const SW_LOCKED: u16 = 0x5515;
pub const SW_REFUSED: u16 = 0x5501;

/// Firmware information for a Nano X running 2.2.3
pub const NANO_X_OS_VERSION: &str =
    "33000004 05 322e322e33 04 e6000000 04 322e3330 04 312e3136 0100 0100 0100";

// Setup logging, level from LOG_LEVEL
pub fn setup() {
    let log_level = match std::env::var("LOG_LEVEL").map(|v| LevelFilter::from_str(&v)) {
        Ok(Ok(l)) => l,
        _ => LevelFilter::Debug,
    };

    let _ = SimpleLogger::init(log_level, simplelog::Config::default());
}

/// Scripted transport, replying to each frame with the next queued response
/// and recording sent frames
#[derive(Clone, Default)]
pub struct MockTransport {
    inner: Arc<Mutex<MockInner>>,
}

#[derive(Default)]
struct MockInner {
    responses: VecDeque<Vec<u8>>,
    sent: Vec<Vec<u8>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a response frame
    pub fn respond(&self, data: &[u8], status: u16) -> &Self {
        let mut r = data.to_vec();
        r.extend_from_slice(&status.to_be_bytes());

        self.inner.lock().unwrap().responses.push_back(r);
        self
    }

    /// Queue a response from hex, spaces are ignored
    pub fn respond_hex(&self, data: &str, status: u16) -> &Self {
        self.respond(&hex::decode(data.replace(' ', "")).unwrap(), status)
    }

    /// Queue a GetAppAndVersion response
    pub fn respond_app(&self, name: &str) -> &Self {
        self.respond(&app_and_version(name, "1.0.0"), SW_OK)
    }

    /// Frames sent so far
    pub fn sent(&self) -> Vec<Vec<u8>> {
        self.inner.lock().unwrap().sent.clone()
    }

    /// Instruction codes of the frames sent so far
    pub fn sent_ins(&self) -> Vec<u8> {
        self.sent().iter().map(|f| f[1]).collect()
    }

    /// Responses not yet consumed
    pub fn remaining(&self) -> usize {
        self.inner.lock().unwrap().responses.len()
    }

    /// Create a Nano X session over this transport
    pub fn session(&self) -> DeviceSession {
        DeviceSession::new(self.clone(), DeviceModelId::NanoX).with_config(SessionConfig {
            request_timeout_ms: 500,
            unlock_timeout_ms: 1_000,
            unlock_poll_ms: 10,
            ..Default::default()
        })
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn exchange(&mut self, frame: &[u8]) -> Result<Vec<u8>, TransportError> {
        let mut i = self.inner.lock().unwrap();

        debug!("mock rx: {}", hex::encode(frame));
        i.sent.push(frame.to_vec());

        i.responses
            .pop_front()
            .ok_or_else(|| TransportError::msg("no scripted response"))
    }
}

/// Encode a GetAppAndVersion response payload
pub fn app_and_version(name: &str, version: &str) -> Vec<u8> {
    let mut b = vec![0x01, name.len() as u8];
    b.extend_from_slice(name.as_bytes());
    b.push(version.len() as u8);
    b.extend_from_slice(version.as_bytes());
    b
}

/// Encode a ListApps page
pub fn list_apps_page(apps: &[(&str, u16)]) -> Vec<u8> {
    if apps.is_empty() {
        return vec![];
    }

    let mut b = vec![0x01];
    for (name, size_in_blocks) in apps {
        let mut e = vec![];
        e.extend_from_slice(&size_in_blocks.to_be_bytes());
        e.extend_from_slice(&0x0800u16.to_be_bytes());
        e.extend_from_slice(&[0xaa; 32]);
        e.extend_from_slice(&[0xbb; 32]);
        e.push(name.len() as u8);
        e.extend_from_slice(name.as_bytes());

        b.push(e.len() as u8);
        b.extend_from_slice(&e);
    }
    b
}

/// Session record for an application
pub fn app(name: &str) -> AppAndVersion {
    AppAndVersion {
        name: name.to_string(),
        version: "1.0.0".to_string(),
        flags: None,
    }
}
