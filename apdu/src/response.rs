// Copyright (c) 2022-2023 The MobileCoin Foundation

//! Response frames

use crate::{parser::ParserError, status::SW_SUCCESS, ApduParser};

/// Response APDU, payload followed by a two byte status word
///
/// ```text
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// /                        DATA (0..N bytes)                      /
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// |      SW1      |      SW2      |
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// ```
#[derive(Clone, PartialEq, Eq, Debug, Default)]
pub struct ApduResponse {
    pub data: Vec<u8>,
    pub status: u16,
}

impl ApduResponse {
    pub fn new(data: Vec<u8>, status: u16) -> Self {
        Self { data, status }
    }

    /// Split raw response bytes into payload and status word
    pub fn from_bytes(raw: &[u8]) -> Result<Self, ParserError> {
        if raw.len() < 2 {
            return Err(ParserError::OutOfBounds {
                index: 0,
                length: 2,
                remaining: raw.len(),
            });
        }

        let (data, sw) = raw.split_at(raw.len() - 2);

        Ok(Self {
            data: data.to_vec(),
            status: u16::from_be_bytes([sw[0], sw[1]]),
        })
    }

    /// Encode response for the wire
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buff = self.data.clone();
        buff.extend_from_slice(&self.status.to_be_bytes());
        buff
    }

    /// Check whether the device reported success
    pub fn is_success(&self) -> bool {
        self.status == SW_SUCCESS
    }

    /// Create a parser over the response payload
    pub fn parser(&self) -> ApduParser<'_> {
        ApduParser::new(&self.data)
    }
}
