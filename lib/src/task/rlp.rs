// Copyright (c) 2022-2023 The MobileCoin Foundation

//! Minimal RLP support for locating the signature trailer of legacy transactions

/// RLP decoding errors
#[derive(Copy, Clone, PartialEq, Eq, Debug, thiserror::Error)]
pub enum RlpError {
    #[error("empty input")]
    Empty,
    #[error("truncated item (need {need} bytes, have {have})")]
    Truncated { need: usize, have: usize },
    #[error("length prefix overflow")]
    LengthOverflow,
    #[error("expected list")]
    NotAList,
    #[error("{0} trailing bytes")]
    TrailingBytes(usize),
}

/// Decoded item, borrowing from the source buffer
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub struct RlpItem<'a> {
    pub is_list: bool,
    /// Full encoding including the prefix
    pub raw: &'a [u8],
    pub payload: &'a [u8],
}

/// Decode the item at the start of `buff`
pub fn decode_item(buff: &[u8]) -> Result<RlpItem<'_>, RlpError> {
    let b = *buff.first().ok_or(RlpError::Empty)?;

    let (is_list, header_len, payload_len) = match b {
        0x00..=0x7f => (false, 0, 1),
        0x80..=0xb7 => (false, 1, (b - 0x80) as usize),
        0xb8..=0xbf => {
            let n = (b - 0xb7) as usize;
            (false, 1 + n, read_len(&buff[1..], n)?)
        }
        0xc0..=0xf7 => (true, 1, (b - 0xc0) as usize),
        0xf8..=0xff => {
            let n = (b - 0xf7) as usize;
            (true, 1 + n, read_len(&buff[1..], n)?)
        }
    };

    let total = header_len
        .checked_add(payload_len)
        .ok_or(RlpError::LengthOverflow)?;
    if buff.len() < total {
        return Err(RlpError::Truncated {
            need: total,
            have: buff.len(),
        });
    }

    Ok(RlpItem {
        is_list,
        raw: &buff[..total],
        payload: &buff[header_len..total],
    })
}

/// Decode a list consuming the whole buffer, returning its items
pub fn decode_list(buff: &[u8]) -> Result<Vec<RlpItem<'_>>, RlpError> {
    let list = decode_item(buff)?;
    if !list.is_list {
        return Err(RlpError::NotAList);
    }
    if list.raw.len() != buff.len() {
        return Err(RlpError::TrailingBytes(buff.len() - list.raw.len()));
    }

    let mut items = vec![];
    let mut p = list.payload;
    while !p.is_empty() {
        let i = decode_item(p)?;
        p = &p[i.raw.len()..];
        items.push(i);
    }

    Ok(items)
}

fn read_len(buff: &[u8], n: usize) -> Result<usize, RlpError> {
    if n > core::mem::size_of::<usize>() {
        return Err(RlpError::LengthOverflow);
    }
    if buff.len() < n {
        return Err(RlpError::Truncated {
            need: n + 1,
            have: buff.len() + 1,
        });
    }

    Ok(buff[..n].iter().fold(0usize, |a, b| (a << 8) | *b as usize))
}

/// Length of the list prefix for a payload of `payload_len` bytes
pub fn list_header_len(payload_len: usize) -> usize {
    match payload_len {
        0..=55 => 1,
        _ => 1 + be_len(payload_len),
    }
}

fn be_len(n: usize) -> usize {
    (core::mem::size_of::<usize>() - n.leading_zeros() as usize / 8).max(1)
}

fn be_bytes(n: usize) -> Vec<u8> {
    n.to_be_bytes()[core::mem::size_of::<usize>() - be_len(n)..].to_vec()
}

/// Encode a byte string
pub fn encode_bytes(v: &[u8]) -> Vec<u8> {
    match v.len() {
        1 if v[0] < 0x80 => v.to_vec(),
        0..=55 => {
            let mut b = vec![0x80 + v.len() as u8];
            b.extend_from_slice(v);
            b
        }
        n => {
            let l = be_bytes(n);
            let mut b = vec![0xb7 + l.len() as u8];
            b.extend_from_slice(&l);
            b.extend_from_slice(v);
            b
        }
    }
}

/// Encode an unsigned integer (big-endian, no leading zeros)
pub fn encode_uint(v: u64) -> Vec<u8> {
    let b = v.to_be_bytes();
    let start = b.iter().position(|b| *b != 0).unwrap_or(b.len());
    encode_bytes(&b[start..])
}

/// Encode a list of already encoded items
pub fn encode_list(items: &[Vec<u8>]) -> Vec<u8> {
    let payload: Vec<u8> = items.concat();

    let mut b = match payload.len() {
        0..=55 => vec![0xc0 + payload.len() as u8],
        n => {
            let l = be_bytes(n);
            let mut b = vec![0xf7 + l.len() as u8];
            b.extend_from_slice(&l);
            b
        }
    };
    b.extend_from_slice(&payload);
    b
}
