// Copyright (c) 2022-2023 The MobileCoin Foundation

//! Response payload parser
//!
//! A forward-only reader over response data. Multi-byte integers are big-endian,
//! variable length fields are either length-value (`[LEN][VALUE..]`) or
//! tag-length-value (`[TAG][LEN][VALUE..]`) encoded.

use byteorder::{BigEndian, ByteOrder};

/// Parser errors
#[derive(Copy, Clone, PartialEq, Eq, Debug, thiserror::Error)]
pub enum ParserError {
    /// Field extends past the end of the response
    #[error("out of bounds read (index: {index}, length: {length}, remaining: {remaining})")]
    OutOfBounds {
        index: usize,
        length: usize,
        remaining: usize,
    },

    /// Field is not valid UTF-8
    #[error("invalid utf-8 string")]
    InvalidUtf8,
}

/// Tag-length-value field
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub struct TlvField<'a> {
    pub tag: u8,
    pub value: &'a [u8],
}

/// Response parser, borrows the response payload
#[derive(Clone, Debug)]
pub struct ApduParser<'a> {
    buff: &'a [u8],
    index: usize,
}

impl<'a> ApduParser<'a> {
    pub fn new(buff: &'a [u8]) -> Self {
        Self { buff, index: 0 }
    }

    /// Current read offset
    pub fn current_index(&self) -> usize {
        self.index
    }

    /// Bytes left to read
    pub fn remaining_length(&self) -> usize {
        self.buff.len() - self.index
    }

    /// Check at least `length` bytes remain
    pub fn test_minimal_length(&self, length: usize) -> bool {
        self.remaining_length() >= length
    }

    fn take(&mut self, length: usize) -> Result<&'a [u8], ParserError> {
        if !self.test_minimal_length(length) {
            return Err(ParserError::OutOfBounds {
                index: self.index,
                length,
                remaining: self.remaining_length(),
            });
        }

        let d = &self.buff[self.index..][..length];
        self.index += length;

        Ok(d)
    }

    pub fn extract_u8(&mut self) -> Result<u8, ParserError> {
        self.take(1).map(|d| d[0])
    }

    pub fn extract_u16(&mut self) -> Result<u16, ParserError> {
        self.take(2).map(BigEndian::read_u16)
    }

    pub fn extract_u32(&mut self) -> Result<u32, ParserError> {
        self.take(4).map(BigEndian::read_u32)
    }

    /// Extract a fixed length field
    pub fn extract_field_by_length(&mut self, length: usize) -> Result<&'a [u8], ParserError> {
        self.take(length)
    }

    /// Extract a length-value field
    ///
    /// On failure the read offset is restored so the caller may retry
    /// with another interpretation.
    pub fn extract_field_lv(&mut self) -> Result<&'a [u8], ParserError> {
        let start = self.index;

        let r = self
            .extract_u8()
            .and_then(|n| self.extract_field_by_length(n as usize));

        if r.is_err() {
            self.index = start;
        }

        r
    }

    /// Extract a tag-length-value field
    pub fn extract_field_tlv(&mut self) -> Result<TlvField<'a>, ParserError> {
        let start = self.index;

        let r = self.extract_u8().and_then(|tag| {
            self.extract_field_lv()
                .map(|value| TlvField { tag, value })
        });

        if r.is_err() {
            self.index = start;
        }

        r
    }

    /// Extract a length-value field as a UTF-8 string
    pub fn extract_string_lv(&mut self) -> Result<&'a str, ParserError> {
        let start = self.index;

        let d = self.extract_field_lv()?;
        match encode_to_string(d) {
            Ok(s) => Ok(s),
            Err(e) => {
                self.index = start;
                Err(e)
            }
        }
    }

    /// Remaining bytes, consuming them
    pub fn remaining(&mut self) -> &'a [u8] {
        let d = &self.buff[self.index..];
        self.index = self.buff.len();
        d
    }
}

/// Hex encode bytes, optionally with a `0x` prefix
pub fn encode_to_hex_string(value: &[u8], prefix: bool) -> String {
    let s = hex::encode(value);
    match prefix {
        true => format!("0x{s}"),
        false => s,
    }
}

/// Interpret bytes as a UTF-8 string
pub fn encode_to_string(value: &[u8]) -> Result<&str, ParserError> {
    core::str::from_utf8(value).map_err(|_| ParserError::InvalidUtf8)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn extract_integers() {
        let d = [0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07];
        let mut p = ApduParser::new(&d);

        assert_eq!(p.extract_u8(), Ok(0x01));
        assert_eq!(p.extract_u16(), Ok(0x0203));
        assert_eq!(p.extract_u32(), Ok(0x04050607));
        assert_eq!(p.remaining_length(), 0);
        assert!(p.extract_u8().is_err());
    }

    #[test]
    fn extract_lv_rolls_back() {
        // Length byte claims 4 bytes with only 2 available
        let d = [0x04, 0xaa, 0xbb];
        let mut p = ApduParser::new(&d);

        assert_eq!(
            p.extract_field_lv(),
            Err(ParserError::OutOfBounds {
                index: 1,
                length: 4,
                remaining: 2
            })
        );
        assert_eq!(p.current_index(), 0);

        assert_eq!(p.extract_u8(), Ok(0x04));
    }

    #[test]
    fn extract_lv_and_tlv() {
        let d = [0x02, b'o', b'k', 0x10, 0x01, 0xff, 0x00];
        let mut p = ApduParser::new(&d);

        assert_eq!(p.extract_string_lv(), Ok("ok"));
        assert_eq!(
            p.extract_field_tlv(),
            Ok(TlvField {
                tag: 0x10,
                value: &[0xff]
            })
        );

        // Zero length field is valid
        assert_eq!(p.extract_field_lv(), Ok(&[][..]));
        assert_eq!(p.remaining_length(), 0);
    }

    #[test]
    fn hex_strings() {
        assert_eq!(encode_to_hex_string(&[0x01, 0xab], true), "0x01ab");
        assert_eq!(encode_to_hex_string(&[0x01, 0xab], false), "01ab");
        assert_eq!(encode_to_hex_string(&[], false), "");
    }
}
