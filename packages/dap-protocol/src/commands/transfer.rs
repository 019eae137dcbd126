//! Transfer commands: DP/AP register access.

use alloc::vec::Vec;
use bitflags::bitflags;
use core::fmt;

use crate::{
    decode::{Decode, DecodeError, DecodeWithLength},
    format::{write_flags, write_list},
};

use super::{DapCommand, DapStatus, NoResponse, cmds, unexpected_response};

/// `DAP_TransferConfigure`
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct TransferConfigure {
    /// Extra idle cycles after each transfer.
    pub idle_cycles: u8,
    /// Retries after a WAIT response.
    pub wait_retry: u16,
    /// Retries on a value-match read mismatch.
    pub match_retry: u16,
}

impl Decode for TransferConfigure {
    fn decode(data: &mut &[u8]) -> Result<Self, DecodeError> {
        let idle_cycles = u8::decode(data)?;
        let wait_retry = u16::decode(data)?;
        let match_retry = u16::decode(data)?;

        Ok(Self {
            idle_cycles,
            wait_retry,
            match_retry,
        })
    }
}

impl fmt::Display for TransferConfigure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "idle_cycles={}, wait_retry={}, match_retry={}",
            self.idle_cycles, self.wait_retry, self.match_retry
        )
    }
}

impl DapCommand for TransferConfigure {
    const ID: u8 = cmds::TRANSFER_CONFIGURE;
    const NAME: &'static str = "TransferConfigure";

    type Response = DapStatus;

    fn decode_response(&self, data: &mut &[u8]) -> Result<DapStatus, DecodeError> {
        DapStatus::decode(data)
    }
}

bitflags! {
    /// Transfer request byte.
    #[derive(Debug, Clone, Copy, Eq, PartialEq)]
    pub struct TransferRequest: u8 {
        /// Access an AP register rather than a DP register.
        const AP = 1 << 0;
        const READ = 1 << 1;
        const A2 = 1 << 2;
        const A3 = 1 << 3;
        /// Read until the value matches (under the match mask).
        const MATCH_VALUE = 1 << 4;
        /// Write the match mask instead of a register.
        const MATCH_MASK = 1 << 5;
        const TIMESTAMP = 1 << 7;
    }
}

impl TransferRequest {
    pub fn port(&self) -> &'static str {
        if self.contains(Self::AP) { "AP" } else { "DP" }
    }

    /// Register address A[3:2].
    pub fn address(&self) -> u8 {
        (*self & (Self::A2 | Self::A3)).bits()
    }

    pub fn is_read(&self) -> bool {
        self.contains(Self::READ)
    }

    /// Whether a data word follows this request byte in the command.
    pub fn carries_word(&self) -> bool {
        !self.is_read() || self.contains(Self::MATCH_VALUE)
    }

    /// Whether the probe returns a data word for this request.
    pub fn returns_data(&self) -> bool {
        self.is_read() && !self.contains(Self::MATCH_VALUE)
    }

    /// Whether the probe returns a timestamp for this request.
    pub fn returns_timestamp(&self) -> bool {
        self.contains(Self::TIMESTAMP)
            && !self.contains(Self::MATCH_VALUE)
            && !self.contains(Self::MATCH_MASK)
    }
}

/// Acknowledge reported by the target for the last transfer.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum Ack {
    Ok,
    Wait,
    Fault,
    NoAck,
    Unknown(u8),
}

bitflags! {
    /// Error bits of the transfer response byte, above the acknowledge.
    #[derive(Debug, Clone, Copy, Eq, PartialEq)]
    pub struct TransferErrors: u8 {
        const PROTOCOL_ERROR = 1 << 3;
        const VALUE_MISMATCH = 1 << 4;
    }
}

impl TransferErrors {
    pub(crate) const NAMES: &'static [(u32, &'static str)] = &[
        (Self::PROTOCOL_ERROR.bits() as u32, "ProtocolError"),
        (Self::VALUE_MISMATCH.bits() as u32, "ValueMismatch"),
    ];
}

/// Transfer response byte shared by `DAP_Transfer` and `DAP_TransferBlock`.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct TransferAck {
    pub ack: Ack,
    pub errors: TransferErrors,
}

impl Decode for TransferAck {
    fn decode(data: &mut &[u8]) -> Result<Self, DecodeError> {
        let byte = u8::decode(data)?;
        let ack = match byte & 0x07 {
            1 => Ack::Ok,
            2 => Ack::Wait,
            4 => Ack::Fault,
            7 => Ack::NoAck,
            other => Ack::Unknown(other),
        };

        Ok(Self {
            ack,
            errors: TransferErrors::from_bits_retain(byte & !0x07),
        })
    }
}

impl fmt::Display for TransferAck {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.ack {
            Ack::Ok => f.write_str("Ok")?,
            Ack::Wait => f.write_str("Wait")?,
            Ack::Fault => f.write_str("Fault")?,
            Ack::NoAck => f.write_str("NoAck")?,
            Ack::Unknown(ack) => write!(f, "Ack({ack:#x})")?,
        }
        if !self.errors.is_empty() {
            f.write_str("|")?;
            write_flags(f, self.errors.bits().into(), TransferErrors::NAMES)?;
        }
        Ok(())
    }
}

/// One register access inside a `DAP_Transfer`.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct TransferOp {
    pub request: TransferRequest,
    /// Write data, match value or match mask, depending on `request`.
    pub value: Option<u32>,
}

impl Decode for TransferOp {
    fn decode(data: &mut &[u8]) -> Result<Self, DecodeError> {
        let request = TransferRequest::from_bits_retain(u8::decode(data)?);
        let value = if request.carries_word() {
            Some(u32::decode(data)?)
        } else {
            None
        };

        Ok(Self { request, value })
    }
}

impl fmt::Display for TransferOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let request = self.request;
        let value = self.value.unwrap_or_default();

        if request.is_read() {
            write!(f, "{} read @ {:#x}", request.port(), request.address())?;
            if request.contains(TransferRequest::MATCH_VALUE) {
                write!(f, " match {value:#010x}")?;
            }
        } else if request.contains(TransferRequest::MATCH_MASK) {
            write!(f, "match mask = {value:#010x}")?;
        } else {
            write!(
                f,
                "{} write @ {:#x} = {value:#010x}",
                request.port(),
                request.address()
            )?;
        }

        if request.contains(TransferRequest::TIMESTAMP) {
            f.write_str(" (TS)")?;
        }
        Ok(())
    }
}

/// `DAP_Transfer`
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Transfer {
    pub dap_index: u8,
    pub ops: Vec<TransferOp>,
}

impl Decode for Transfer {
    fn decode(data: &mut &[u8]) -> Result<Self, DecodeError> {
        let dap_index = u8::decode(data)?;
        let count = u8::decode(data)?;
        let ops = Vec::<TransferOp>::decode_with_len(data, count.into())?;

        Ok(Self { dap_index, ops })
    }
}

impl fmt::Display for Transfer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "dap_index={}", self.dap_index)?;
        for op in &self.ops {
            write!(f, ", {op}")?;
        }
        Ok(())
    }
}

/// Data returned for one executed transfer.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct TransferValue {
    pub timestamp: Option<u32>,
    pub data: Option<u32>,
}

impl fmt::Display for TransferValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.data, self.timestamp) {
            (Some(data), Some(timestamp)) => write!(f, "{data:#010x} (TS={timestamp})"),
            (Some(data), None) => write!(f, "{data:#010x}"),
            (None, Some(timestamp)) => write!(f, "TS={timestamp}"),
            (None, None) => Ok(()),
        }
    }
}

#[derive(Debug, Clone, Eq, PartialEq)]
pub struct TransferResponse {
    /// Number of transfers the probe executed.
    pub count: u8,
    pub ack: TransferAck,
    pub values: Vec<TransferValue>,
}

impl fmt::Display for TransferResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}, {}", self.count, self.ack)?;
        for value in &self.values {
            write!(f, ", {value}")?;
        }
        Ok(())
    }
}

impl DapCommand for Transfer {
    const ID: u8 = cmds::TRANSFER;
    const NAME: &'static str = "Transfer";

    type Response = TransferResponse;

    fn decode_response(&self, data: &mut &[u8]) -> Result<TransferResponse, DecodeError> {
        let count = u8::decode(data)?;
        let ack = TransferAck::decode(data)?;

        // Only executed transfers post data, in request order.
        let mut values = Vec::new();
        for op in self.ops.iter().take(count.into()) {
            let request = op.request;
            let timestamp = if request.returns_timestamp() {
                Some(u32::decode(data)?)
            } else {
                None
            };
            let word = if request.returns_data() {
                Some(u32::decode(data)?)
            } else {
                None
            };

            if timestamp.is_some() || word.is_some() {
                values.push(TransferValue {
                    timestamp,
                    data: word,
                });
            }
        }

        Ok(TransferResponse { count, ack, values })
    }
}

/// `DAP_TransferBlock`
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct TransferBlock {
    pub dap_index: u8,
    pub count: u16,
    pub request: TransferRequest,
    /// Write data; empty for reads.
    pub data: Vec<u32>,
}

impl Decode for TransferBlock {
    fn decode(data: &mut &[u8]) -> Result<Self, DecodeError> {
        let dap_index = u8::decode(data)?;
        let count = u16::decode(data)?;
        let request = TransferRequest::from_bits_retain(u8::decode(data)?);
        let words = if request.is_read() {
            Vec::new()
        } else {
            Vec::<u32>::decode_with_len(data, count.into())?
        };

        Ok(Self {
            dap_index,
            count,
            request,
            data: words,
        })
    }
}

struct Word(u32);

impl fmt::Display for Word {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#010x}", self.0)
    }
}

impl fmt::Display for TransferBlock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let request = self.request;
        let direction = if request.is_read() { "read" } else { "write" };
        write!(
            f,
            "dap_index={}, {} {direction}*{} @ {:#x}",
            self.dap_index,
            request.port(),
            self.count,
            request.address()
        )?;

        if !request.is_read() {
            f.write_str(" = ")?;
            write_list(f, self.data.iter().copied().map(Word))?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Eq, PartialEq)]
pub struct TransferBlockResponse {
    /// Number of transfers the probe executed.
    pub count: u16,
    pub ack: TransferAck,
    /// Read data; empty for writes.
    pub data: Vec<u32>,
}

impl fmt::Display for TransferBlockResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}, {}", self.count, self.ack)?;
        for word in &self.data {
            write!(f, ", {}", Word(*word))?;
        }
        Ok(())
    }
}

impl DapCommand for TransferBlock {
    const ID: u8 = cmds::TRANSFER_BLOCK;
    const NAME: &'static str = "TransferBlock";

    type Response = TransferBlockResponse;

    fn decode_response(&self, data: &mut &[u8]) -> Result<TransferBlockResponse, DecodeError> {
        let count = u16::decode(data)?;
        let ack = TransferAck::decode(data)?;
        let words = if self.request.is_read() {
            Vec::<u32>::decode_with_len(data, count.into())?
        } else {
            Vec::new()
        };

        Ok(TransferBlockResponse {
            count,
            ack,
            data: words,
        })
    }
}

/// `DAP_TransferAbort`. The probe never answers it.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct TransferAbort;

impl Decode for TransferAbort {
    fn decode(_data: &mut &[u8]) -> Result<Self, DecodeError> {
        Ok(Self)
    }
}

impl fmt::Display for TransferAbort {
    fn fmt(&self, _f: &mut fmt::Formatter<'_>) -> fmt::Result {
        Ok(())
    }
}

impl DapCommand for TransferAbort {
    const ID: u8 = cmds::TRANSFER_ABORT;
    const NAME: &'static str = "TransferAbort";

    type Response = NoResponse;

    fn decode_response(&self, _data: &mut &[u8]) -> Result<NoResponse, DecodeError> {
        Err(unexpected_response::<Self>())
    }
}
