// Copyright (c) 2022-2023 The MobileCoin Foundation

//! Chunked transfer of payloads exceeding a single frame
//!
//! Chunks are sent strictly in order through the session, the first failure
//! aborts the transfer and the response to the final chunk is returned.

use log::{debug, warn};

use ledger_dmk_apdu::{Command, APDU_MAX_PAYLOAD};

use super::rlp;
use crate::{session::DeviceSession, Error};

/// A frame-sized view over a transfer buffer
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub struct Chunk<'a> {
    pub data: &'a [u8],
    /// Position of this chunk in the transfer
    pub index: usize,
    pub is_first: bool,
    /// More chunks follow this one
    pub has_more: bool,
}

/// Split `buffer` into chunks of at most `chunk_size` bytes (clamped to `1..=255`)
pub fn partition(buffer: &[u8], chunk_size: usize) -> Vec<Chunk<'_>> {
    let chunk_size = chunk_size.clamp(1, APDU_MAX_PAYLOAD);
    let n = (buffer.len() + chunk_size - 1) / chunk_size;

    buffer
        .chunks(chunk_size)
        .enumerate()
        .map(|(index, data)| Chunk {
            data,
            index,
            is_first: index == 0,
            has_more: index + 1 < n,
        })
        .collect()
}

/// Chunk size for legacy (pre EIP-2718) signing payloads
///
/// `buffer` is the encoded derivation path (`derivations_len` bytes) followed by
/// the RLP encoded transaction. Legacy firmware treats a final chunk starting
/// at the EIP-155 `v, r, s` trailer as a pre EIP-155 transaction, so the chunk
/// size is reduced until the final chunk is either empty or longer than the
/// trailer.
pub fn legacy_chunk_size(derivations_len: usize, buffer: &[u8]) -> usize {
    if buffer.len() <= APDU_MAX_PAYLOAD || derivations_len > buffer.len() {
        return APDU_MAX_PAYLOAD;
    }

    let items = match rlp::decode_list(&buffer[derivations_len..]) {
        Ok(v) => v,
        Err(e) => {
            warn!("Failed to decode legacy transaction ({}), using default chunks", e);
            return APDU_MAX_PAYLOAD;
        }
    };

    // Trailer is the RLP list of the last three items without its first prefix byte
    let vrs_payload: usize = items
        .iter()
        .rev()
        .take(3)
        .map(|i| i.raw.len())
        .sum();
    let vrs_len = vrs_payload + rlp::list_header_len(vrs_payload) - 1;

    let mut chunk_size = APDU_MAX_PAYLOAD;
    while chunk_size > derivations_len {
        let rem = buffer.len() % chunk_size;
        if rem == 0 || rem > vrs_len {
            break;
        }
        chunk_size -= 1;
    }

    debug!(
        "Legacy chunk size: {} (buffer: {}, trailer: {})",
        chunk_size,
        buffer.len(),
        vrs_len
    );

    chunk_size.max(1)
}

/// Sequential transfer of a buffer as a series of commands
#[derive(Clone, PartialEq, Debug)]
pub struct ChunkedTransfer<'a> {
    buffer: &'a [u8],
    chunk_size: Option<usize>,
}

impl<'a> ChunkedTransfer<'a> {
    /// Create a transfer using the session's maximum chunk size
    pub fn new(buffer: &'a [u8]) -> Self {
        Self {
            buffer,
            chunk_size: None,
        }
    }

    /// Create a transfer for a legacy signing payload, see [legacy_chunk_size]
    pub fn legacy(buffer: &'a [u8], derivations_len: usize) -> Self {
        Self::new(buffer).with_chunk_size(legacy_chunk_size(derivations_len, buffer))
    }

    /// Override the chunk size
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = Some(chunk_size);
        self
    }

    pub fn chunk_size(&self) -> Option<usize> {
        self.chunk_size
    }

    /// Chunks this transfer would send, using the default frame capacity
    /// when no chunk size is set
    pub fn chunks(&self) -> Vec<Chunk<'a>> {
        partition(self.buffer, self.chunk_size.unwrap_or(APDU_MAX_PAYLOAD))
    }

    /// Send all chunks, building each command with `f`, and return the final response
    pub async fn run<C, F>(&self, session: &DeviceSession, mut f: F) -> Result<C::Response, Error>
    where
        C: Command,
        F: FnMut(Chunk<'_>) -> C + Send,
    {
        let chunk_size = self
            .chunk_size
            .unwrap_or(session.config().max_chunk_size);
        let chunks = partition(self.buffer, chunk_size);

        let n = chunks.len();
        let mut resp = None;

        for c in chunks {
            let cmd = f(c);

            debug!("Sending chunk {}/{} ({} bytes)", c.index + 1, n, c.data.len());

            match session.send_command(&cmd).await {
                Ok(r) => resp = Some(r),
                Err(e) => {
                    debug!("Chunk {}/{} failed: {}", c.index + 1, n, e);
                    return Err(e);
                }
            }
        }

        resp.ok_or_else(|| Error::InvalidState("No data to transfer".to_string()))
    }
}
