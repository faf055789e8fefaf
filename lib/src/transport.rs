// Copyright (c) 2022-2023 The MobileCoin Foundation

//! Transport abstraction
//!
//! Device discovery and connection are left to transport implementations,
//! sessions only require a connected transport able to exchange one frame at a time.

use async_trait::async_trait;

/// Transport failure, wrapping the underlying transport error
#[derive(Debug, thiserror::Error)]
#[error("{0}")]
pub struct TransportError(#[from] anyhow::Error);

impl TransportError {
    pub fn msg(m: impl std::fmt::Display) -> Self {
        Self(anyhow::anyhow!("{}", m))
    }
}

/// A connected device transport
#[async_trait]
pub trait Transport: Send {
    /// Submit one command frame and await one response frame (including status word)
    async fn exchange(&mut self, frame: &[u8]) -> Result<Vec<u8>, TransportError>;
}

/// Boxed transports are transports
#[async_trait]
impl<T: Transport + ?Sized> Transport for Box<T> {
    async fn exchange(&mut self, frame: &[u8]) -> Result<Vec<u8>, TransportError> {
        (**self).exchange(frame).await
    }
}
