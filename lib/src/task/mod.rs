// Copyright (c) 2022-2023 The MobileCoin Foundation

//! Tasks used by device actions
//!
//! Tasks are single units of work (a chunked transfer, an install plan)
//! without any user interaction state of their own.

pub mod chunked;
pub use chunked::{legacy_chunk_size, partition, Chunk, ChunkedTransfer};

pub mod install_plan;
pub use install_plan::{
    build_install_plan, ApplicationConstraint, ApplicationDependency, InstallPlan,
};

mod out_of_memory;
pub use out_of_memory::predict_out_of_memory;

pub mod path;
pub use path::encode_derivation_path;

pub mod rlp;
