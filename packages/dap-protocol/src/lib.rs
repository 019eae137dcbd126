//! Decoder for the CMSIS-DAP debug probe protocol.
//!
//! Requests and responses are decoded from the raw bytes exchanged with a
//! probe and rendered as `Command(args) -> Command(result)` lines.

#![no_std]

extern crate alloc;

pub mod commands;
pub mod record;

mod decode;
mod format;

pub use commands::{CommandName, DapCommand, DapStatus, Request, Response};
pub use decode::{Decode, DecodeError, DecodeErrorKind, DecodeWithLength};
pub use format::{Frequency, HexBytes};
pub use record::{DecodedRecord, RequestOutcome, ResponseOutcome};
