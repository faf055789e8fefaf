// Copyright (c) 2022-2023 The MobileCoin Foundation

//! Ledger Device Management Library
//!
//! This provides a [DeviceSession] for sending commands to a connected device
//! over a [Transport], [ChunkedTransfer](task::ChunkedTransfer) for payloads
//! exceeding a single frame, and device actions composing commands and tasks
//! into observable, cancellable workflows.
//!
//! ```no_run
//! # use ledger_dmk::{*, action::os::OpenApp, apdu::DeviceModelId};
//! # async fn open(t: impl Transport + 'static) -> Result<(), Error> {
//! let session = DeviceSession::new(t, DeviceModelId::NanoX);
//!
//! let mut handle = execute(OpenApp::new("Ethereum"), InternalApi::new(session));
//! while let Some(s) = handle.next_state().await {
//!     println!("{s:?}");
//! }
//! # Ok(())
//! # }
//! ```

/// Re-export `ledger-dmk-apdu` for consumers
pub use ledger_dmk_apdu::{self as apdu};

pub mod transport;
pub use transport::{Transport, TransportError};

mod error;
pub use error::Error;

mod config;
pub use config::SessionConfig;

mod session;
pub use session::{DeviceSession, DeviceStatus, SessionState};

mod api;
pub use api::InternalApi;

pub mod manager;

pub mod task;

pub mod action;
pub use action::{
    execute, ActionHandle, DeviceActionState, Interaction, UserInteractionRequired,
};
