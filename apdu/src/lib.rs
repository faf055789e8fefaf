// Copyright (c) 2022-2023 The MobileCoin Foundation

//! Protocol / APDU definitions for Ledger device management
//!
//! This module provides frame encoding and response parsing for communication
//! with Ledger devices, as well as the operating system commands used to
//! inspect device state and manage applications.
//!
//! Command frames are `[CLA][INS][P1][P2][LEN][DATA..]` with at most 255 bytes of data,
//! responses are `[DATA..][SW1][SW2]` where `0x9000` signals success.
//! All multi-byte integers are big-endian, as the device firmware expects.
//!

pub mod builder;
pub use builder::{Apdu, ApduBuilder, ApduHeader, BuilderError};

pub mod parser;
pub use parser::{ApduParser, ParserError};

pub mod response;
pub use response::ApduResponse;

pub mod status;
pub use status::{CommandError, GlobalError};

pub mod command;
pub use command::{Command, RawCommand};

pub mod model;
pub use model::DeviceModelId;

pub mod version;
pub use version::FirmwareVersion;

pub mod os;

/// Header length including the length byte
pub const APDU_HEADER_LEN: usize = 5;

/// Maximum payload length for a single frame
pub const APDU_MAX_PAYLOAD: usize = 255;

/// Maximum encoded frame length
pub const APDU_MAX_SIZE: usize = APDU_HEADER_LEN + APDU_MAX_PAYLOAD;

/// Name reported by the OS when no application is running
pub const DASHBOARD_APP_NAME: &str = "BOLOS";
