// Copyright (c) 2022-2023 The MobileCoin Foundation

use ledger_dmk::{
    apdu::{ApduBuilder, ApduHeader, RawCommand},
    task::{
        encode_derivation_path,
        rlp::{encode_bytes, encode_list, encode_uint},
        Chunk, ChunkedTransfer,
    },
    Error, SessionConfig,
};

mod helpers;
use helpers::*;

/// Signing style command, `P1` flags continuation chunks
fn chunk_command(c: Chunk<'_>) -> RawCommand {
    let p1 = match c.is_first {
        true => 0x00,
        false => 0x80,
    };

    let mut b = ApduBuilder::new(ApduHeader::new(0xe0, 0x04, p1, 0x00));
    b.add_buffer(c.data).unwrap();
    RawCommand::new(b.build())
}

#[tokio::test]
async fn transfer_full_chunks() {
    setup();

    let buff: Vec<u8> = (0..255 * 3).map(|i| i as u8).collect();

    let t = MockTransport::new();
    t.respond(&[], SW_OK)
        .respond(&[], SW_OK)
        .respond(&[0x1b, 0x02], SW_OK);

    let r = ChunkedTransfer::new(&buff)
        .run(&t.session(), chunk_command)
        .await
        .unwrap();

    // Response to the final chunk
    assert_eq!(r, vec![0x1b, 0x02]);

    let sent = t.sent();
    assert_eq!(sent.len(), 3);
    for (i, f) in sent.iter().enumerate() {
        assert_eq!(f[2], if i == 0 { 0x00 } else { 0x80 });
        assert_eq!(f[4], 255);
        assert_eq!(&f[5..], &buff[i * 255..(i + 1) * 255]);
    }
}

#[tokio::test]
async fn transfer_session_chunk_size() {
    setup();

    let buff = vec![0xab; 300];

    let t = MockTransport::new();
    for _ in 0..3 {
        t.respond(&[], SW_OK);
    }

    let config = SessionConfig {
        max_chunk_size: 128,
        ..Default::default()
    };
    let session = t.session().with_config(config);

    ChunkedTransfer::new(&buff)
        .run(&session, chunk_command)
        .await
        .unwrap();

    let lengths: Vec<_> = t.sent().iter().map(|f| f[4]).collect();
    assert_eq!(lengths, vec![128, 128, 44]);
}

#[tokio::test]
async fn transfer_aborts_on_error() {
    setup();

    let buff = vec![0x01; 255 * 4];

    let t = MockTransport::new();
    t.respond(&[], SW_OK)
        .respond(&[], SW_REFUSED)
        .respond(&[], SW_OK)
        .respond(&[], SW_OK);

    let r = ChunkedTransfer::new(&buff)
        .run(&t.session(), chunk_command)
        .await;

    assert!(matches!(r, Err(Error::Command(e)) if e.is_refused()));
    assert_eq!(t.sent().len(), 2);
    assert_eq!(t.remaining(), 2);
}

#[tokio::test]
async fn transfer_empty() {
    setup();

    let t = MockTransport::new();
    let r = ChunkedTransfer::new(&[]).run(&t.session(), chunk_command).await;

    assert!(matches!(r, Err(Error::InvalidState(_))));
    assert!(t.sent().is_empty());
}

#[tokio::test]
async fn transfer_legacy_transaction() {
    setup();

    // Legacy transaction with a chain id overlapping the v, r, s trailer
    let to = hex::decode("0123456789abcdef0123456789abcdef01234567").unwrap();
    let tx = encode_list(&[
        encode_uint(0),
        encode_uint(2),
        encode_uint(1),
        encode_bytes(&to),
        encode_uint(0),
        encode_bytes(&[0u8; 452]),
        encode_uint(0x818181818181),
        encode_uint(0),
        encode_uint(0),
    ]);

    let mut buff = encode_derivation_path("m/44'/60'/0'/0/0").unwrap();
    let derivations_len = buff.len();
    buff.extend_from_slice(&tx);
    assert_eq!(buff.len(), 513);

    let transfer = ChunkedTransfer::legacy(&buff, derivations_len);
    assert_eq!(transfer.chunk_size(), Some(251));

    let t = MockTransport::new();
    for _ in 0..3 {
        t.respond(&[], SW_OK);
    }

    transfer.run(&t.session(), chunk_command).await.unwrap();

    let lengths: Vec<_> = t.sent().iter().map(|f| f[4]).collect();
    assert_eq!(lengths, vec![251, 251, 11]);
}
