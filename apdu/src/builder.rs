// Copyright (c) 2022-2023 The MobileCoin Foundation

//! Command APDU builder
//!
//! ## Encoding
//!
//! ```text
//!  0                   1                   2                   3
//!  0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |      CLA      |      INS      |      P1       |      P2       |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |      LEN      |             DATA (0..255 bytes)               /
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! ```
//!
//! Every append either succeeds completely or leaves the frame untouched.

use heapless::Vec;
use log::trace;

use crate::{APDU_HEADER_LEN, APDU_MAX_PAYLOAD, APDU_MAX_SIZE};

/// Frame encoding errors, the frame is unchanged whenever one is returned
#[derive(Copy, Clone, PartialEq, Eq, Debug, thiserror::Error)]
pub enum BuilderError {
    /// Value does not fit the requested field width
    #[error("value {value:#x} exceeds maximum {max:#x}")]
    ValueOutOfRange { value: u32, max: u32 },

    /// Appending would overflow the 255 byte payload
    #[error("payload capacity exceeded (requested: {requested}, available: {available})")]
    CapacityExceeded { requested: usize, available: usize },

    /// Odd length or non hexadecimal characters
    #[error("invalid hexadecimal string")]
    InvalidHex,

    /// Empty strings cannot be encoded
    #[error("empty value")]
    Empty,
}

/// APDU header fields
#[derive(Copy, Clone, PartialEq, Eq, Debug, Default)]
pub struct ApduHeader {
    pub cla: u8,
    pub ins: u8,
    pub p1: u8,
    pub p2: u8,
}

impl ApduHeader {
    pub const fn new(cla: u8, ins: u8, p1: u8, p2: u8) -> Self {
        Self { cla, ins, p1, p2 }
    }
}

/// A complete command frame
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct Apdu {
    pub header: ApduHeader,
    data: Vec<u8, APDU_MAX_PAYLOAD>,
}

impl Apdu {
    /// Create a header-only frame
    pub fn new(header: ApduHeader) -> Self {
        Self {
            header,
            data: Vec::new(),
        }
    }

    /// Frame payload
    pub fn payload(&self) -> &[u8] {
        &self.data
    }

    /// Encode frame for the wire, `[CLA][INS][P1][P2][LEN][DATA..]`
    pub fn to_bytes(&self) -> std::vec::Vec<u8> {
        let h = &self.header;

        let mut buff = std::vec::Vec::with_capacity(APDU_HEADER_LEN + self.data.len());
        buff.extend_from_slice(&[h.cla, h.ins, h.p1, h.p2, self.data.len() as u8]);
        buff.extend_from_slice(&self.data);

        buff
    }
}

/// Cursor based frame builder
///
/// Payload bytes are written from offset 5 onwards, the length byte
/// is only filled on [ApduBuilder::serialize] / [ApduBuilder::build].
#[derive(Clone, Debug)]
pub struct ApduBuilder {
    buff: [u8; APDU_MAX_SIZE],
    index: usize,
}

impl ApduBuilder {
    /// Create an empty frame for the provided header
    pub fn new(header: ApduHeader) -> Self {
        let mut buff = [0u8; APDU_MAX_SIZE];
        buff[..4].copy_from_slice(&[header.cla, header.ins, header.p1, header.p2]);

        Self {
            buff,
            index: APDU_HEADER_LEN,
        }
    }

    /// Remaining payload capacity in bytes
    pub fn available_payload_length(&self) -> usize {
        APDU_MAX_PAYLOAD - (self.index - APDU_HEADER_LEN)
    }

    /// Current payload
    pub fn payload(&self) -> &[u8] {
        &self.buff[APDU_HEADER_LEN..self.index]
    }

    fn reserve(&self, n: usize) -> Result<(), BuilderError> {
        let available = self.available_payload_length();
        if n > available {
            return Err(BuilderError::CapacityExceeded {
                requested: n,
                available,
            });
        }
        Ok(())
    }

    fn write(&mut self, data: &[u8]) {
        self.buff[self.index..][..data.len()].copy_from_slice(data);
        self.index += data.len();
    }

    /// Append a single byte, `value` must fit in 8 bits
    pub fn add_byte(&mut self, value: u32) -> Result<&mut Self, BuilderError> {
        let v = u8::try_from(value).map_err(|_| BuilderError::ValueOutOfRange {
            value,
            max: u8::MAX as u32,
        })?;

        self.reserve(1)?;
        self.write(&[v]);

        Ok(self)
    }

    /// Append a big-endian short, `value` must fit in 16 bits
    pub fn add_short(&mut self, value: u32) -> Result<&mut Self, BuilderError> {
        let v = u16::try_from(value).map_err(|_| BuilderError::ValueOutOfRange {
            value,
            max: u16::MAX as u32,
        })?;

        self.reserve(2)?;
        self.write(&v.to_be_bytes());

        Ok(self)
    }

    /// Append a big-endian u32
    pub fn add_u32(&mut self, value: u32) -> Result<&mut Self, BuilderError> {
        self.reserve(4)?;
        self.write(&value.to_be_bytes());

        Ok(self)
    }

    /// Append raw bytes
    pub fn add_buffer(&mut self, value: &[u8]) -> Result<&mut Self, BuilderError> {
        self.reserve(value.len())?;
        self.write(value);

        Ok(self)
    }

    /// Append a hex string, with or without a `0x` prefix
    pub fn add_hex_string(&mut self, value: &str) -> Result<&mut Self, BuilderError> {
        let d = decode_hex(value)?;
        self.add_buffer(&d)
    }

    /// Append one byte per character of an ASCII string
    pub fn add_ascii_string(&mut self, value: &str) -> Result<&mut Self, BuilderError> {
        if !value.is_ascii() {
            return Err(BuilderError::ValueOutOfRange {
                value: value.chars().map(|c| c as u32).max().unwrap_or_default(),
                max: 0x7f,
            });
        }
        self.add_buffer(value.as_bytes())
    }

    /// Append a length byte followed by `value`
    pub fn encode_lv_from_buffer(&mut self, value: &[u8]) -> Result<&mut Self, BuilderError> {
        // Length byte shares the payload capacity
        self.reserve(value.len() + 1)?;

        self.write(&[value.len() as u8]);
        self.write(value);

        Ok(self)
    }

    /// Append a length-value field from a hex string
    pub fn encode_lv_from_hex(&mut self, value: &str) -> Result<&mut Self, BuilderError> {
        let d = decode_hex(value)?;
        self.encode_lv_from_buffer(&d)
    }

    /// Append a length-value field from an ASCII string
    pub fn encode_lv_from_ascii(&mut self, value: &str) -> Result<&mut Self, BuilderError> {
        if value.is_empty() {
            return Err(BuilderError::Empty);
        }
        if !value.is_ascii() {
            return Err(BuilderError::ValueOutOfRange {
                value: value.chars().map(|c| c as u32).max().unwrap_or_default(),
                max: 0x7f,
            });
        }
        self.encode_lv_from_buffer(value.as_bytes())
    }

    /// Overwrite P1 in place
    pub fn set_p1(&mut self, p1: u8) -> &mut Self {
        self.buff[2] = p1;
        self
    }

    /// Overwrite P2 in place
    pub fn set_p2(&mut self, p2: u8) -> &mut Self {
        self.buff[3] = p2;
        self
    }

    /// Drop all payload bytes, the header is kept
    pub fn clear_payload(&mut self) -> &mut Self {
        self.index = APDU_HEADER_LEN;
        self
    }

    /// Fetch the current header
    pub fn header(&self) -> ApduHeader {
        ApduHeader::new(self.buff[0], self.buff[1], self.buff[2], self.buff[3])
    }

    /// Serialize frame bytes up to the cursor
    pub fn serialize(&mut self) -> &[u8] {
        self.buff[4] = (self.index - APDU_HEADER_LEN) as u8;

        trace!("serialized: {:02x?}", &self.buff[..self.index]);

        &self.buff[..self.index]
    }

    /// Build an owned [Apdu] from the current frame
    pub fn build(&self) -> Apdu {
        let mut data = Vec::new();
        // Payload length is bounded by the cursor so this can not overflow
        let _ = data.extend_from_slice(self.payload());

        Apdu {
            header: self.header(),
            data,
        }
    }
}

/// Decode a hex string with an optional `0x` prefix
pub(crate) fn decode_hex(value: &str) -> Result<std::vec::Vec<u8>, BuilderError> {
    if value.is_empty() {
        return Err(BuilderError::Empty);
    }
    if value.len() % 2 != 0 {
        return Err(BuilderError::InvalidHex);
    }

    let digits = value.strip_prefix("0x").unwrap_or(value);
    if digits.is_empty() {
        return Err(BuilderError::Empty);
    }

    hex::decode(digits).map_err(|_| BuilderError::InvalidHex)
}
