//! Serial Wire Output trace commands.

use alloc::vec::Vec;
use bitflags::bitflags;
use core::fmt;

use crate::{
    decode::{Decode, DecodeError, DecodeWithLength},
    format::{HexBytes, write_flags},
};

use super::{DapCommand, DapStatus, cmds};

bitflags! {
    /// Trace status byte returned by the SWO status and data commands.
    #[derive(Debug, Clone, Copy, Eq, PartialEq)]
    pub struct TraceStatus: u8 {
        const ACTIVE = 1 << 0;
        const STREAM_ERROR = 1 << 6;
        const BUFFER_OVERRUN = 1 << 7;
    }
}

impl TraceStatus {
    pub(crate) const NAMES: &'static [(u32, &'static str)] = &[
        (Self::ACTIVE.bits() as u32, "Active"),
        (Self::STREAM_ERROR.bits() as u32, "StreamError"),
        (Self::BUFFER_OVERRUN.bits() as u32, "BufferOverrun"),
    ];
}

impl Decode for TraceStatus {
    fn decode(data: &mut &[u8]) -> Result<Self, DecodeError> {
        Ok(Self::from_bits_retain(u8::decode(data)?))
    }
}

impl fmt::Display for TraceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_flags(f, self.bits().into(), Self::NAMES)
    }
}

bitflags! {
    /// Fields requested from `DAP_SWO_ExtendedStatus`.
    #[derive(Debug, Clone, Copy, Eq, PartialEq)]
    pub struct ExtendedStatusControl: u8 {
        const STATUS = 1 << 0;
        const COUNT = 1 << 1;
        const TIMESTAMP = 1 << 2;
    }
}

impl ExtendedStatusControl {
    pub(crate) const NAMES: &'static [(u32, &'static str)] = &[
        (Self::STATUS.bits() as u32, "Status"),
        (Self::COUNT.bits() as u32, "Count"),
        (Self::TIMESTAMP.bits() as u32, "Timestamp"),
    ];
}

impl fmt::Display for ExtendedStatusControl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_flags(f, self.bits().into(), Self::NAMES)
    }
}

/// How captured trace data reaches the host.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum SwoTransportKind {
    None,
    /// Read with `DAP_SWO_Data`.
    DataCommand,
    /// Streamed over a separate WinUSB endpoint.
    WinUsbEndpoint,
    Unknown(u8),
}

/// `DAP_SWO_Transport`
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct SwoTransport {
    pub transport: SwoTransportKind,
}

impl Decode for SwoTransport {
    fn decode(data: &mut &[u8]) -> Result<Self, DecodeError> {
        let transport = match u8::decode(data)? {
            0 => SwoTransportKind::None,
            1 => SwoTransportKind::DataCommand,
            2 => SwoTransportKind::WinUsbEndpoint,
            other => SwoTransportKind::Unknown(other),
        };
        Ok(Self { transport })
    }
}

impl fmt::Display for SwoTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.transport {
            SwoTransportKind::None => f.write_str("None"),
            SwoTransportKind::DataCommand => f.write_str("DAP_SWO_Data"),
            SwoTransportKind::WinUsbEndpoint => f.write_str("WinUSB endpoint"),
            SwoTransportKind::Unknown(kind) => write!(f, "Unknown({kind:#04x})"),
        }
    }
}

impl DapCommand for SwoTransport {
    const ID: u8 = cmds::SWO_TRANSPORT;
    const NAME: &'static str = "SWO_Transport";

    type Response = DapStatus;

    fn decode_response(&self, data: &mut &[u8]) -> Result<DapStatus, DecodeError> {
        DapStatus::decode(data)
    }
}

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum SwoModeKind {
    Off,
    Uart,
    Manchester,
    Unknown(u8),
}

/// `DAP_SWO_Mode`
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct SwoMode {
    pub mode: SwoModeKind,
}

impl Decode for SwoMode {
    fn decode(data: &mut &[u8]) -> Result<Self, DecodeError> {
        let mode = match u8::decode(data)? {
            0 => SwoModeKind::Off,
            1 => SwoModeKind::Uart,
            2 => SwoModeKind::Manchester,
            other => SwoModeKind::Unknown(other),
        };
        Ok(Self { mode })
    }
}

impl fmt::Display for SwoMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.mode {
            SwoModeKind::Off => f.write_str("Off"),
            SwoModeKind::Uart => f.write_str("UART"),
            SwoModeKind::Manchester => f.write_str("Manchester"),
            SwoModeKind::Unknown(mode) => write!(f, "Unknown({mode:#04x})"),
        }
    }
}

impl DapCommand for SwoMode {
    const ID: u8 = cmds::SWO_MODE;
    const NAME: &'static str = "SWO_Mode";

    type Response = DapStatus;

    fn decode_response(&self, data: &mut &[u8]) -> Result<DapStatus, DecodeError> {
        DapStatus::decode(data)
    }
}

/// A baud rate, rendered with a `Bd` suffix.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct Baudrate(pub u32);

impl Decode for Baudrate {
    fn decode(data: &mut &[u8]) -> Result<Self, DecodeError> {
        Ok(Self(u32::decode(data)?))
    }
}

impl fmt::Display for Baudrate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} Bd", self.0)
    }
}

/// `DAP_SWO_Baudrate`
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct SwoBaudrate {
    pub requested: Baudrate,
}

impl Decode for SwoBaudrate {
    fn decode(data: &mut &[u8]) -> Result<Self, DecodeError> {
        Ok(Self {
            requested: Baudrate::decode(data)?,
        })
    }
}

impl fmt::Display for SwoBaudrate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.requested)
    }
}

impl DapCommand for SwoBaudrate {
    const ID: u8 = cmds::SWO_BAUDRATE;
    const NAME: &'static str = "SWO_Baudrate";

    /// The rate the probe actually configured. Zero means unsupported.
    type Response = Baudrate;

    fn decode_response(&self, data: &mut &[u8]) -> Result<Baudrate, DecodeError> {
        Baudrate::decode(data)
    }
}

/// `DAP_SWO_Control`
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct SwoControl {
    pub start: bool,
}

impl Decode for SwoControl {
    fn decode(data: &mut &[u8]) -> Result<Self, DecodeError> {
        Ok(Self {
            start: u8::decode(data)? & 1 != 0,
        })
    }
}

impl fmt::Display for SwoControl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(if self.start { "start" } else { "stop" })
    }
}

impl DapCommand for SwoControl {
    const ID: u8 = cmds::SWO_CONTROL;
    const NAME: &'static str = "SWO_Control";

    type Response = DapStatus;

    fn decode_response(&self, data: &mut &[u8]) -> Result<DapStatus, DecodeError> {
        DapStatus::decode(data)
    }
}

/// `DAP_SWO_Status`
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct SwoStatus;

impl Decode for SwoStatus {
    fn decode(_data: &mut &[u8]) -> Result<Self, DecodeError> {
        Ok(Self)
    }
}

impl fmt::Display for SwoStatus {
    fn fmt(&self, _f: &mut fmt::Formatter<'_>) -> fmt::Result {
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct SwoStatusResponse {
    pub status: TraceStatus,
    /// Bytes waiting in the trace buffer.
    pub count: u32,
}

impl Decode for SwoStatusResponse {
    fn decode(data: &mut &[u8]) -> Result<Self, DecodeError> {
        let status = TraceStatus::decode(data)?;
        let count = u32::decode(data)?;
        Ok(Self { status, count })
    }
}

impl fmt::Display for SwoStatusResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}, count={}", self.status, self.count)
    }
}

impl DapCommand for SwoStatus {
    const ID: u8 = cmds::SWO_STATUS;
    const NAME: &'static str = "SWO_Status";

    type Response = SwoStatusResponse;

    fn decode_response(&self, data: &mut &[u8]) -> Result<SwoStatusResponse, DecodeError> {
        SwoStatusResponse::decode(data)
    }
}

/// `DAP_SWO_ExtendedStatus`
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct SwoExtendedStatus {
    pub control: ExtendedStatusControl,
}

impl Decode for SwoExtendedStatus {
    fn decode(data: &mut &[u8]) -> Result<Self, DecodeError> {
        Ok(Self {
            control: ExtendedStatusControl::from_bits_retain(u8::decode(data)?),
        })
    }
}

impl fmt::Display for SwoExtendedStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.control)
    }
}

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct SwoExtendedStatusResponse {
    pub status: TraceStatus,
    pub count: u32,
    /// Sequence number of the next trace byte.
    pub index: u32,
    /// Test domain timer value of the trace byte at `index`.
    pub timestamp: u32,
}

impl Decode for SwoExtendedStatusResponse {
    fn decode(data: &mut &[u8]) -> Result<Self, DecodeError> {
        let status = TraceStatus::decode(data)?;
        let count = u32::decode(data)?;
        let index = u32::decode(data)?;
        let timestamp = u32::decode(data)?;

        Ok(Self {
            status,
            count,
            index,
            timestamp,
        })
    }
}

impl fmt::Display for SwoExtendedStatusResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}, count={}, index={}, timestamp={}",
            self.status, self.count, self.index, self.timestamp
        )
    }
}

impl DapCommand for SwoExtendedStatus {
    const ID: u8 = cmds::SWO_EXTENDED_STATUS;
    const NAME: &'static str = "SWO_ExtendedStatus";

    type Response = SwoExtendedStatusResponse;

    fn decode_response(
        &self,
        data: &mut &[u8],
    ) -> Result<SwoExtendedStatusResponse, DecodeError> {
        SwoExtendedStatusResponse::decode(data)
    }
}

/// `DAP_SWO_Data`
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct SwoData {
    pub max_count: u16,
}

impl Decode for SwoData {
    fn decode(data: &mut &[u8]) -> Result<Self, DecodeError> {
        Ok(Self {
            max_count: u16::decode(data)?,
        })
    }
}

impl fmt::Display for SwoData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "max_count={}", self.max_count)
    }
}

#[derive(Debug, Clone, Eq, PartialEq)]
pub struct SwoDataResponse {
    pub status: TraceStatus,
    pub trace: Vec<u8>,
}

impl Decode for SwoDataResponse {
    fn decode(data: &mut &[u8]) -> Result<Self, DecodeError> {
        let status = TraceStatus::decode(data)?;
        let count = u16::decode(data)?;
        let trace = Vec::decode_with_len(data, count.into())?;
        Ok(Self { status, trace })
    }
}

impl fmt::Display for SwoDataResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.status)?;
        if !self.trace.is_empty() {
            write!(f, ", {}", HexBytes(&self.trace))?;
        }
        Ok(())
    }
}

impl DapCommand for SwoData {
    const ID: u8 = cmds::SWO_DATA;
    const NAME: &'static str = "SWO_Data";

    type Response = SwoDataResponse;

    fn decode_response(&self, data: &mut &[u8]) -> Result<SwoDataResponse, DecodeError> {
        SwoDataResponse::decode(data)
    }
}
