//! General commands: probe information, host status, connection and reset.

use alloc::{string::String, vec::Vec};
use bitflags::bitflags;
use core::fmt::{self, Write};

use crate::{
    decode::{Decode, DecodeError, take},
    format::{Frequency, HexBytes, write_flags},
};

use super::{DapCommand, DapStatus, cmds};

/// Queryable probe information items.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum InfoId {
    VendorName,
    ProductName,
    SerialNumber,
    ProtocolVersion,
    TargetDeviceVendor,
    TargetDeviceName,
    TargetBoardVendor,
    TargetBoardName,
    FirmwareVersion,
    Capabilities,
    TestDomainTimer,
    UartReceiveBufferSize,
    UartTransmitBufferSize,
    SwoBufferSize,
    PacketCount,
    PacketSize,
    Unknown(u8),
}

impl InfoId {
    pub const fn from_byte(id: u8) -> Self {
        match id {
            0x01 => Self::VendorName,
            0x02 => Self::ProductName,
            0x03 => Self::SerialNumber,
            0x04 => Self::ProtocolVersion,
            0x05 => Self::TargetDeviceVendor,
            0x06 => Self::TargetDeviceName,
            0x07 => Self::TargetBoardVendor,
            0x08 => Self::TargetBoardName,
            0x09 => Self::FirmwareVersion,
            0xF0 => Self::Capabilities,
            0xF1 => Self::TestDomainTimer,
            0xFB => Self::UartReceiveBufferSize,
            0xFC => Self::UartTransmitBufferSize,
            0xFD => Self::SwoBufferSize,
            0xFE => Self::PacketCount,
            0xFF => Self::PacketSize,
            other => Self::Unknown(other),
        }
    }

    /// Whether the probe answers this item with a string.
    pub const fn is_text(&self) -> bool {
        matches!(
            self,
            Self::VendorName
                | Self::ProductName
                | Self::SerialNumber
                | Self::ProtocolVersion
                | Self::TargetDeviceVendor
                | Self::TargetDeviceName
                | Self::TargetBoardVendor
                | Self::TargetBoardName
                | Self::FirmwareVersion
        )
    }
}

impl fmt::Display for InfoId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::VendorName => "Vendor name",
            Self::ProductName => "Product name",
            Self::SerialNumber => "Serial number",
            Self::ProtocolVersion => "CMSIS-DAP Protocol version",
            Self::TargetDeviceVendor => "Target device vendor",
            Self::TargetDeviceName => "Target device name",
            Self::TargetBoardVendor => "Target board vendor",
            Self::TargetBoardName => "Target board name",
            Self::FirmwareVersion => "Product firmware version",
            Self::Capabilities => "Capabilities",
            Self::TestDomainTimer => "Test domain timer",
            Self::UartReceiveBufferSize => "UART receive buffer size",
            Self::UartTransmitBufferSize => "UART transmit buffer size",
            Self::SwoBufferSize => "SWO trace buffer size",
            Self::PacketCount => "Maximum packet count",
            Self::PacketSize => "Maximum packet size",
            Self::Unknown(id) => return write!(f, "Unknown({id:#04x})"),
        })
    }
}

bitflags! {
    /// Probe capabilities reported by the `Capabilities` info item.
    #[derive(Debug, Clone, Copy, Eq, PartialEq)]
    pub struct Capabilities: u16 {
        const SWD = 1 << 0;
        const JTAG = 1 << 1;
        const SWO_UART = 1 << 2;
        const SWO_MANCHESTER = 1 << 3;
        const ATOMIC = 1 << 4;
        const TEST_DOMAIN_TIMER = 1 << 5;
        const SWO_STREAMING_TRACE = 1 << 6;
        const UART = 1 << 7;

        /// Second capabilities byte, bit 0.
        const USB_COM = 1 << 8;
    }
}

impl Capabilities {
    pub(crate) const NAMES: &'static [(u32, &'static str)] = &[
        (Self::SWD.bits() as u32, "SWD"),
        (Self::JTAG.bits() as u32, "JTAG"),
        (Self::SWO_UART.bits() as u32, "SWO_UART"),
        (Self::SWO_MANCHESTER.bits() as u32, "SWO_Manchester"),
        (Self::ATOMIC.bits() as u32, "Atomic"),
        (Self::TEST_DOMAIN_TIMER.bits() as u32, "TestDomainTimer"),
        (Self::SWO_STREAMING_TRACE.bits() as u32, "SWO_StreamingTrace"),
        (Self::UART.bits() as u32, "UART"),
        (Self::USB_COM.bits() as u32, "USB_COM"),
    ];
}

impl fmt::Display for Capabilities {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_flags(f, self.bits().into(), Self::NAMES)
    }
}

/// `DAP_Info`
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct Info {
    pub id: InfoId,
}

impl Decode for Info {
    fn decode(data: &mut &[u8]) -> Result<Self, DecodeError> {
        Ok(Self {
            id: InfoId::from_byte(u8::decode(data)?),
        })
    }
}

impl fmt::Display for Info {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.id)
    }
}

/// Value of an info item. Its shape is chosen by the [`InfoId`] that was requested.
#[derive(Debug, Clone, Eq, PartialEq)]
pub enum InfoResponse {
    /// The probe does not provide this item (zero length).
    Unavailable,
    Text(String),
    Capabilities(Capabilities),
    TimerFrequency(Frequency),
    Value(u32),
    Raw(Vec<u8>),
}

impl fmt::Display for InfoResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unavailable => Ok(()),
            Self::Text(text) => {
                for c in text.chars() {
                    if c.is_control() {
                        write!(f, "{}", c.escape_default())?;
                    } else {
                        f.write_char(c)?;
                    }
                }
                Ok(())
            }
            Self::Capabilities(capabilities) => write!(f, "{capabilities}"),
            Self::TimerFrequency(frequency) => write!(f, "{frequency}"),
            Self::Value(value) => write!(f, "{value}"),
            Self::Raw(bytes) => write!(f, "{}", HexBytes(bytes)),
        }
    }
}

impl DapCommand for Info {
    const ID: u8 = cmds::INFO;
    const NAME: &'static str = "Info";

    type Response = InfoResponse;

    fn decode_response(&self, data: &mut &[u8]) -> Result<InfoResponse, DecodeError> {
        let len = u8::decode(data)?;
        let mut value = take::<InfoResponse>(data, len.into())?;

        if value.is_empty() {
            return Ok(InfoResponse::Unavailable);
        }

        Ok(match self.id {
            id if id.is_text() => {
                // Strings are sent with their NUL terminator.
                let end = value.iter().position(|&b| b == 0).unwrap_or(value.len());
                let text = core::str::from_utf8(&value[..end])
                    .map_err(|e| DecodeError::new::<InfoResponse>(e.into()))?;
                InfoResponse::Text(text.into())
            }
            InfoId::Capabilities => {
                let low = u16::from(value[0]);
                let high = value.get(1).copied().map(u16::from).unwrap_or(0);
                InfoResponse::Capabilities(Capabilities::from_bits_retain(low | (high << 8)))
            }
            InfoId::TestDomainTimer => {
                InfoResponse::TimerFrequency(Frequency(u32::decode(&mut value)?))
            }
            InfoId::PacketCount => InfoResponse::Value(u8::decode(&mut value)?.into()),
            InfoId::PacketSize => InfoResponse::Value(u16::decode(&mut value)?.into()),
            InfoId::UartReceiveBufferSize
            | InfoId::UartTransmitBufferSize
            | InfoId::SwoBufferSize => InfoResponse::Value(u32::decode(&mut value)?),
            _ => InfoResponse::Raw(value.to_vec()),
        })
    }
}

/// Which host status LED is being driven.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum HostStatusKind {
    Connect,
    Running,
    Unknown(u8),
}

/// `DAP_HostStatus`
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct HostStatus {
    pub kind: HostStatusKind,
    pub on: bool,
}

impl Decode for HostStatus {
    fn decode(data: &mut &[u8]) -> Result<Self, DecodeError> {
        let kind = match u8::decode(data)? {
            0 => HostStatusKind::Connect,
            1 => HostStatusKind::Running,
            other => HostStatusKind::Unknown(other),
        };
        let on = u8::decode(data)? != 0;

        Ok(Self { kind, on })
    }
}

impl fmt::Display for HostStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            HostStatusKind::Connect => f.write_str("connect")?,
            HostStatusKind::Running => f.write_str("running")?,
            HostStatusKind::Unknown(kind) => write!(f, "Unknown({kind:#04x})")?,
        }
        f.write_str(if self.on { ", on" } else { ", off" })
    }
}

impl DapCommand for HostStatus {
    const ID: u8 = cmds::HOST_STATUS;
    const NAME: &'static str = "HostStatus";

    type Response = DapStatus;

    fn decode_response(&self, data: &mut &[u8]) -> Result<DapStatus, DecodeError> {
        DapStatus::decode(data)
    }
}

/// Debug port selected by `DAP_Connect`.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum Port {
    Default,
    Swd,
    Jtag,
    Unknown(u8),
}

impl Decode for Port {
    fn decode(data: &mut &[u8]) -> Result<Self, DecodeError> {
        Ok(match u8::decode(data)? {
            0 => Self::Default,
            1 => Self::Swd,
            2 => Self::Jtag,
            other => Self::Unknown(other),
        })
    }
}

impl fmt::Display for Port {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Default => f.write_str("Default"),
            Self::Swd => f.write_str("SWD"),
            Self::Jtag => f.write_str("JTAG"),
            Self::Unknown(port) => write!(f, "Unknown({port:#04x})"),
        }
    }
}

/// `DAP_Connect`
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct Connect {
    pub port: Port,
}

impl Decode for Connect {
    fn decode(data: &mut &[u8]) -> Result<Self, DecodeError> {
        Ok(Self {
            port: Port::decode(data)?,
        })
    }
}

impl fmt::Display for Connect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.port)
    }
}

/// Port the probe actually initialized, or `Failed` (encoded as zero).
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum ConnectResponse {
    Failed,
    Connected(Port),
}

impl fmt::Display for ConnectResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Failed => f.write_str("Failed"),
            Self::Connected(port) => write!(f, "{port}"),
        }
    }
}

impl DapCommand for Connect {
    const ID: u8 = cmds::CONNECT;
    const NAME: &'static str = "Connect";

    type Response = ConnectResponse;

    fn decode_response(&self, data: &mut &[u8]) -> Result<ConnectResponse, DecodeError> {
        Ok(match Port::decode(data)? {
            Port::Default => ConnectResponse::Failed,
            port => ConnectResponse::Connected(port),
        })
    }
}

/// `DAP_Disconnect`
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct Disconnect;

impl Decode for Disconnect {
    fn decode(_data: &mut &[u8]) -> Result<Self, DecodeError> {
        Ok(Self)
    }
}

impl fmt::Display for Disconnect {
    fn fmt(&self, _f: &mut fmt::Formatter<'_>) -> fmt::Result {
        Ok(())
    }
}

impl DapCommand for Disconnect {
    const ID: u8 = cmds::DISCONNECT;
    const NAME: &'static str = "Disconnect";

    type Response = DapStatus;

    fn decode_response(&self, data: &mut &[u8]) -> Result<DapStatus, DecodeError> {
        DapStatus::decode(data)
    }
}

/// `DAP_WriteABORT`
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct WriteAbort {
    pub dap_index: u8,
    pub abort: u32,
}

impl Decode for WriteAbort {
    fn decode(data: &mut &[u8]) -> Result<Self, DecodeError> {
        let dap_index = u8::decode(data)?;
        let abort = u32::decode(data)?;

        Ok(Self { dap_index, abort })
    }
}

impl fmt::Display for WriteAbort {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "dap_index={}, abort={:#010x}", self.dap_index, self.abort)
    }
}

impl DapCommand for WriteAbort {
    const ID: u8 = cmds::WRITE_ABORT;
    const NAME: &'static str = "WriteABORT";

    type Response = DapStatus;

    fn decode_response(&self, data: &mut &[u8]) -> Result<DapStatus, DecodeError> {
        DapStatus::decode(data)
    }
}

/// `DAP_Delay`
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct Delay {
    /// Delay in microseconds.
    pub micros: u16,
}

impl Decode for Delay {
    fn decode(data: &mut &[u8]) -> Result<Self, DecodeError> {
        Ok(Self {
            micros: u16::decode(data)?,
        })
    }
}

impl fmt::Display for Delay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} us", self.micros)
    }
}

impl DapCommand for Delay {
    const ID: u8 = cmds::DELAY;
    const NAME: &'static str = "Delay";

    type Response = DapStatus;

    fn decode_response(&self, data: &mut &[u8]) -> Result<DapStatus, DecodeError> {
        DapStatus::decode(data)
    }
}

/// `DAP_ResetTarget`
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct ResetTarget;

impl Decode for ResetTarget {
    fn decode(_data: &mut &[u8]) -> Result<Self, DecodeError> {
        Ok(Self)
    }
}

impl fmt::Display for ResetTarget {
    fn fmt(&self, _f: &mut fmt::Formatter<'_>) -> fmt::Result {
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct ResetTargetResponse {
    pub status: DapStatus,
    /// Whether a device specific reset sequence is implemented and was run.
    pub executed: bool,
}

impl fmt::Display for ResetTargetResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}, executed={}", self.status, self.executed)
    }
}

impl DapCommand for ResetTarget {
    const ID: u8 = cmds::RESET_TARGET;
    const NAME: &'static str = "ResetTarget";

    type Response = ResetTargetResponse;

    fn decode_response(&self, data: &mut &[u8]) -> Result<ResetTargetResponse, DecodeError> {
        let status = DapStatus::decode(data)?;
        let executed = u8::decode(data)? != 0;

        Ok(ResetTargetResponse { status, executed })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::string::ToString;

    #[test]
    fn info_shape_follows_requested_id() {
        let capabilities = Info { id: InfoId::Capabilities };
        let response = capabilities
            .decode_response(&mut &[0x02, 0x13, 0x01][..])
            .unwrap();
        assert_eq!(response.to_string(), "SWD|JTAG|Atomic|USB_COM");

        let packet_size = Info { id: InfoId::PacketSize };
        let response = packet_size
            .decode_response(&mut &[0x02, 0x00, 0x02][..])
            .unwrap();
        assert_eq!(response, InfoResponse::Value(512));

        let timer = Info { id: InfoId::TestDomainTimer };
        let response = timer
            .decode_response(&mut &[0x04, 0x40, 0x42, 0x0F, 0x00][..])
            .unwrap();
        assert_eq!(response.to_string(), "1.000 MHz");
    }

    #[test]
    fn info_strings_stop_at_nul() {
        let vendor = Info { id: InfoId::VendorName };
        let response = vendor
            .decode_response(&mut &[0x05, b'A', b'R', b'M', 0, 0][..])
            .unwrap();
        assert_eq!(response, InfoResponse::Text("ARM".into()));
    }

    #[test]
    fn info_strings_escape_control_characters() {
        let product = Info { id: InfoId::ProductName };
        let response = product
            .decode_response(&mut &[0x05, b'C', b'M', 0x08, b'\n', b'X'][..])
            .unwrap();
        assert_eq!(response.to_string(), "CM\\u{8}\\nX");
    }

    #[test]
    fn info_zero_length_is_unavailable() {
        let serial = Info { id: InfoId::SerialNumber };
        let response = serial.decode_response(&mut &[0x00][..]).unwrap();
        assert_eq!(response, InfoResponse::Unavailable);
        assert_eq!(response.to_string(), "");
    }

    #[test]
    fn info_length_past_payload_is_an_error() {
        let serial = Info { id: InfoId::SerialNumber };
        assert!(serial.decode_response(&mut &[0x08, b'1'][..]).is_err());
    }

    #[test]
    fn unknown_info_ids_render_raw() {
        let info = Info::decode(&mut &[0x42][..]).unwrap();
        assert_eq!(info.to_string(), "Unknown(0x42)");
        let response = info.decode_response(&mut &[0x02, 0xAB, 0xCD][..]).unwrap();
        assert_eq!(response.to_string(), "ab:cd");
    }

    #[test]
    fn unnamed_capability_bits_are_kept() {
        let capabilities = Capabilities::from_bits_retain(0x0401);
        assert_eq!(capabilities.to_string(), "SWD|0x400");
    }

    #[test]
    fn connect_zero_means_failure() {
        let connect = Connect { port: Port::Swd };
        assert_eq!(
            connect.decode_response(&mut &[0x00][..]).unwrap(),
            ConnectResponse::Failed
        );
    }

    #[test]
    fn host_status_flags() {
        let status = HostStatus::decode(&mut &[0x01, 0x00][..]).unwrap();
        assert_eq!(status.to_string(), "running, off");
    }
}
