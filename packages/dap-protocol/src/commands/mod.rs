//! The CMSIS-DAP command table.
//!
//! Every command is a [`DapCommand`]: a request type decoded from the bytes
//! following the command code, plus the response shape it expects back from
//! the probe. [`Request`] and [`Response`] are generated from a single table
//! so that adding a command is one line plus its types.

use alloc::vec::Vec;
use core::fmt;

use crate::{
    decode::{Decode, DecodeError, DecodeErrorKind, take, take_rest},
    format::HexBytes,
};

pub mod general;
pub mod jtag;
pub mod queue;
pub mod swd;
pub mod swj;
pub mod swo;
pub mod transfer;

/// CMSIS-DAP command codes.
pub mod cmds {
    pub const INFO: u8 = 0x00;
    pub const HOST_STATUS: u8 = 0x01;
    pub const CONNECT: u8 = 0x02;
    pub const DISCONNECT: u8 = 0x03;
    pub const TRANSFER_CONFIGURE: u8 = 0x04;
    pub const TRANSFER: u8 = 0x05;
    pub const TRANSFER_BLOCK: u8 = 0x06;
    pub const TRANSFER_ABORT: u8 = 0x07;
    pub const WRITE_ABORT: u8 = 0x08;
    pub const DELAY: u8 = 0x09;
    pub const RESET_TARGET: u8 = 0x0A;

    pub const SWJ_PINS: u8 = 0x10;
    pub const SWJ_CLOCK: u8 = 0x11;
    pub const SWJ_SEQUENCE: u8 = 0x12;
    pub const SWD_CONFIGURE: u8 = 0x13;
    pub const JTAG_SEQUENCE: u8 = 0x14;
    pub const JTAG_CONFIGURE: u8 = 0x15;
    pub const JTAG_IDCODE: u8 = 0x16;

    pub const SWO_TRANSPORT: u8 = 0x17;
    pub const SWO_MODE: u8 = 0x18;
    pub const SWO_BAUDRATE: u8 = 0x19;
    pub const SWO_CONTROL: u8 = 0x1A;
    pub const SWO_STATUS: u8 = 0x1B;
    pub const SWO_DATA: u8 = 0x1C;
    pub const SWD_SEQUENCE: u8 = 0x1D;
    pub const SWO_EXTENDED_STATUS: u8 = 0x1E;

    pub const QUEUE_COMMANDS: u8 = 0x7E;
    pub const EXECUTE_COMMANDS: u8 = 0x7F;

    // vendor specific commands
    pub const VENDOR_FIRST: u8 = 0x80;
    pub const VENDOR_LAST: u8 = 0x9F;
}

/// A CMSIS-DAP command: request arguments plus the response shape they imply.
///
/// `Self` decodes the request bytes after the command code. The response is
/// decoded against `&self`, because several responses (`Info`, `Transfer`,
/// the sequence commands) can only be interpreted knowing what was asked.
pub trait DapCommand: Decode + fmt::Display {
    /// Leading command-code byte.
    const ID: u8;
    /// Name used when rendering.
    const NAME: &'static str;

    type Response: fmt::Display;

    /// Decodes the response bytes following the echoed command code.
    ///
    /// # Errors
    ///
    /// Returns a [`DecodeError`] if the response is shorter than this request
    /// requires.
    fn decode_response(&self, data: &mut &[u8]) -> Result<Self::Response, DecodeError>;
}

/// The status byte most commands answer with.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum DapStatus {
    Ok,
    Error,
    Unknown(u8),
}

impl DapStatus {
    pub const fn is_ok(&self) -> bool {
        matches!(self, Self::Ok)
    }
}

impl Decode for DapStatus {
    fn decode(data: &mut &[u8]) -> Result<Self, DecodeError> {
        Ok(match u8::decode(data)? {
            0x00 => Self::Ok,
            0xFF => Self::Error,
            other => Self::Unknown(other),
        })
    }
}

impl fmt::Display for DapStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ok => f.write_str("Ok"),
            Self::Error => f.write_str("Error"),
            Self::Unknown(status) => write!(f, "Unknown({status:#04x})"),
        }
    }
}

/// Uninhabited response type for commands the probe never answers.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum NoResponse {}

impl fmt::Display for NoResponse {
    fn fmt(&self, _f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {}
    }
}

pub(crate) fn unexpected_response<C>() -> DecodeError {
    DecodeError::new::<C>(DecodeErrorKind::UnexpectedResponse)
}

/// Command code plus undecoded arguments, for vendor and unknown commands.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct RawCommand {
    pub id: u8,
    pub data: Vec<u8>,
}

/// Display name of a command code.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum CommandName {
    Known(&'static str),
    Vendor(u8),
    Unknown(u8),
}

impl fmt::Display for CommandName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Known(name) => f.write_str(name),
            Self::Vendor(id) => write!(f, "Vendor({id:#04x})"),
            Self::Unknown(id) => write!(f, "Unknown({id:#04x})"),
        }
    }
}

macro_rules! command_table {
    ($($variant:ident($ty:ty),)*) => {
        /// A decoded request, keyed by its command code.
        #[derive(Debug, Clone, Eq, PartialEq)]
        pub enum Request {
            $($variant($ty),)*
            Vendor(RawCommand),
            Unknown(RawCommand),
        }

        /// A decoded response. The variant always matches the request it answers.
        #[derive(Debug, Clone, Eq, PartialEq)]
        pub enum Response {
            $($variant(<$ty as DapCommand>::Response),)*
            Vendor(RawCommand),
            Unknown(RawCommand),
        }

        impl CommandName {
            pub const fn from_id(id: u8) -> Self {
                match id {
                    $(<$ty as DapCommand>::ID => Self::Known(<$ty as DapCommand>::NAME),)*
                    cmds::VENDOR_FIRST..=cmds::VENDOR_LAST => Self::Vendor(id),
                    _ => Self::Unknown(id),
                }
            }
        }

        impl Request {
            /// The command code this request was sent with.
            pub const fn id(&self) -> u8 {
                match self {
                    $(Self::$variant(_) => <$ty as DapCommand>::ID,)*
                    Self::Vendor(raw) | Self::Unknown(raw) => raw.id,
                }
            }

            /// Decodes the probe's answer to this request, starting at the echoed command code.
            ///
            /// # Errors
            ///
            /// Returns a [`DecodeError`] if the response is empty, echoes a
            /// different command code, or is too short for this request.
            pub fn decode_response(&self, data: &mut &[u8]) -> Result<Response, DecodeError> {
                let id = take::<Response>(data, 1)?[0];
                if id != self.id() {
                    return Err(DecodeError::new::<Response>(DecodeErrorKind::CommandMismatch {
                        expected: self.id(),
                        found: id,
                    }));
                }

                Ok(match self {
                    $(Self::$variant(request) => {
                        Response::$variant(request.decode_response(data)?)
                    })*
                    Self::Vendor(_) => Response::Vendor(RawCommand { id, data: take_rest(data) }),
                    Self::Unknown(_) => Response::Unknown(RawCommand { id, data: take_rest(data) }),
                })
            }
        }

        impl Decode for Request {
            fn decode(data: &mut &[u8]) -> Result<Self, DecodeError> {
                let id = take::<Self>(data, 1)?[0];
                Ok(match id {
                    $(<$ty as DapCommand>::ID => Self::$variant(<$ty>::decode(data)?),)*
                    cmds::VENDOR_FIRST..=cmds::VENDOR_LAST => {
                        Self::Vendor(RawCommand { id, data: take_rest(data) })
                    }
                    _ => Self::Unknown(RawCommand { id, data: take_rest(data) }),
                })
            }
        }

        impl fmt::Display for Request {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                match self {
                    $(Self::$variant(request) => {
                        write!(f, "{}({})", <$ty as DapCommand>::NAME, request)
                    })*
                    Self::Vendor(raw) | Self::Unknown(raw) => {
                        write!(f, "{}({})", self.name(), HexBytes(&raw.data))
                    }
                }
            }
        }

        impl fmt::Display for Response {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                match self {
                    $(Self::$variant(response) => {
                        write!(f, "{}({})", <$ty as DapCommand>::NAME, response)
                    })*
                    Self::Vendor(raw) => {
                        write!(f, "{}({})", CommandName::Vendor(raw.id), HexBytes(&raw.data))
                    }
                    Self::Unknown(raw) => {
                        write!(f, "{}({})", CommandName::Unknown(raw.id), HexBytes(&raw.data))
                    }
                }
            }
        }
    };
}

command_table! {
    Info(general::Info),
    HostStatus(general::HostStatus),
    Connect(general::Connect),
    Disconnect(general::Disconnect),
    TransferConfigure(transfer::TransferConfigure),
    Transfer(transfer::Transfer),
    TransferBlock(transfer::TransferBlock),
    TransferAbort(transfer::TransferAbort),
    WriteAbort(general::WriteAbort),
    Delay(general::Delay),
    ResetTarget(general::ResetTarget),
    SwjPins(swj::SwjPins),
    SwjClock(swj::SwjClock),
    SwjSequence(swj::SwjSequence),
    SwdConfigure(swd::SwdConfigure),
    JtagSequence(jtag::JtagSequence),
    JtagConfigure(jtag::JtagConfigure),
    JtagIdcode(jtag::JtagIdcode),
    SwoTransport(swo::SwoTransport),
    SwoMode(swo::SwoMode),
    SwoBaudrate(swo::SwoBaudrate),
    SwoControl(swo::SwoControl),
    SwoStatus(swo::SwoStatus),
    SwoData(swo::SwoData),
    SwdSequence(swd::SwdSequence),
    SwoExtendedStatus(swo::SwoExtendedStatus),
    QueueCommands(queue::QueueCommands),
    ExecuteCommands(queue::ExecuteCommands),
}

impl Request {
    pub const fn name(&self) -> CommandName {
        CommandName::from_id(self.id())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::string::{String, ToString};

    fn render(request: &[u8], response: &[u8]) -> String {
        let mut data = request;
        let decoded = Request::decode(&mut data).unwrap();
        let mut data = response;
        let reply = decoded.decode_response(&mut data).unwrap();
        alloc::format!("{decoded} -> {reply}")
    }

    // One minimal, valid exchange per command code.
    const GOLDEN: &[(&[u8], &[u8], &str)] = &[
        (
            &[0x00, 0x04],
            &[0x00, 0x04, b'2', b'.', b'1', 0],
            "Info(CMSIS-DAP Protocol version) -> Info(2.1)",
        ),
        (&[0x01, 0x00, 0x01], &[0x01, 0x00], "HostStatus(connect, on) -> HostStatus(Ok)"),
        (&[0x02, 0x02], &[0x02, 0x02], "Connect(JTAG) -> Connect(JTAG)"),
        (&[0x03], &[0x03, 0x00], "Disconnect() -> Disconnect(Ok)"),
        (
            &[0x04, 0x00, 0x64, 0x00, 0x00, 0x00],
            &[0x04, 0x00],
            "TransferConfigure(idle_cycles=0, wait_retry=100, match_retry=0) -> TransferConfigure(Ok)",
        ),
        (
            &[0x05, 0x00, 0x01, 0x02],
            &[0x05, 0x01, 0x01, 0x77, 0x14, 0xA0, 0x2B],
            "Transfer(dap_index=0, DP read @ 0x0) -> Transfer(1, Ok, 0x2ba01477)",
        ),
        (
            &[0x06, 0x00, 0x01, 0x00, 0x0F],
            &[0x06, 0x01, 0x00, 0x01, 0x11, 0x00, 0x00, 0x00],
            "TransferBlock(dap_index=0, AP read*1 @ 0xc) -> TransferBlock(1, Ok, 0x00000011)",
        ),
        (
            &[0x08, 0x00, 0x1E, 0x00, 0x00, 0x00],
            &[0x08, 0x00],
            "WriteABORT(dap_index=0, abort=0x0000001e) -> WriteABORT(Ok)",
        ),
        (&[0x09, 0x64, 0x00], &[0x09, 0x00], "Delay(100 us) -> Delay(Ok)"),
        (&[0x0A], &[0x0A, 0x00, 0x01], "ResetTarget() -> ResetTarget(Ok, executed=true)"),
        (
            &[0x10, 0x80, 0x80, 0x00, 0x00, 0x00, 0x00],
            &[0x10, 0x8F],
            "SWJ_Pins(output=nRESET, select=nRESET, wait=0 us) -> SWJ_Pins(SWCLK_TCK|SWDIO_TMS|TDI|TDO|nRESET)",
        ),
        (&[0x11, 0x40, 0x42, 0x0F, 0x00], &[0x11, 0x00], "SWJ_Clock(1.000 MHz) -> SWJ_Clock(Ok)"),
        (&[0x12, 0x08, 0xFF], &[0x12, 0x00], "SWJ_Sequence(8, ff) -> SWJ_Sequence(Ok)"),
        (
            &[0x13, 0x00],
            &[0x13, 0x00],
            "SWD_Configure(turnaround=1, data_phase=false) -> SWD_Configure(Ok)",
        ),
        (
            &[0x14, 0x01, 0x85, 0x00],
            &[0x14, 0x00, 0x1B],
            "JTAG_Sequence(5 TMS=0 TDO 00) -> JTAG_Sequence(Ok, 1b)",
        ),
        (&[0x15, 0x01, 0x04], &[0x15, 0x00], "JTAG_Configure(4) -> JTAG_Configure(Ok)"),
        (
            &[0x16, 0x00],
            &[0x16, 0x00, 0x77, 0x04, 0xA0, 0x4B],
            "JTAG_IDCODE(0) -> JTAG_IDCODE(Ok, 0x4ba00477)",
        ),
        (&[0x16, 0x03], &[0x16, 0xFF], "JTAG_IDCODE(3) -> JTAG_IDCODE(Error)"),
        (&[0x17, 0x01], &[0x17, 0x00], "SWO_Transport(DAP_SWO_Data) -> SWO_Transport(Ok)"),
        (&[0x18, 0x01], &[0x18, 0x00], "SWO_Mode(UART) -> SWO_Mode(Ok)"),
        (
            &[0x19, 0x00, 0xC2, 0x01, 0x00],
            &[0x19, 0x00, 0xC2, 0x01, 0x00],
            "SWO_Baudrate(115200 Bd) -> SWO_Baudrate(115200 Bd)",
        ),
        (&[0x1A, 0x01], &[0x1A, 0x00], "SWO_Control(start) -> SWO_Control(Ok)"),
        (
            &[0x1B],
            &[0x1B, 0x01, 0x10, 0x00, 0x00, 0x00],
            "SWO_Status() -> SWO_Status(Active, count=16)",
        ),
        (
            &[0x1C, 0x40, 0x00],
            &[0x1C, 0x01, 0x02, 0x00, 0x01, 0x02],
            "SWO_Data(max_count=64) -> SWO_Data(Active, 01:02)",
        ),
        (&[0x1D, 0x01, 0x08, 0xFF], &[0x1D, 0x00], "SWD_Sequence(out 8 ff) -> SWD_Sequence(Ok)"),
        (
            &[0x1E, 0x03],
            &[0x1E, 0x01, 0x10, 0x00, 0x00, 0x00, 0x02, 0x00, 0x00, 0x00, 0x03, 0x00, 0x00, 0x00],
            "SWO_ExtendedStatus(Status|Count) -> SWO_ExtendedStatus(Active, count=16, index=2, timestamp=3)",
        ),
        (
            &[0x7F, 0x01, 0x03],
            &[0x7F, 0x01, 0x03, 0x00],
            "ExecuteCommands(Disconnect()) -> ExecuteCommands(Disconnect(Ok))",
        ),
        (&[0x80, 0x01, 0x02], &[0x80, 0xAA], "Vendor(0x80)(01:02) -> Vendor(0x80)(aa)"),
    ];

    #[test]
    fn golden_table() {
        for (request, response, expected) in GOLDEN {
            assert_eq!(render(request, response), *expected);
        }
    }

    #[test]
    fn silent_commands_reject_responses() {
        for request in [&[0x07u8][..], &[0x7E, 0x01, 0x03][..]] {
            let decoded = Request::decode(&mut &request[..]).unwrap();
            let err = decoded
                .decode_response(&mut &[request[0], 0x00][..])
                .unwrap_err();
            assert_eq!(err.kind(), DecodeErrorKind::UnexpectedResponse);
        }

        let queued = Request::decode(&mut &[0x7E, 0x01, 0x03][..]).unwrap();
        assert_eq!(queued.to_string(), "QueueCommands(Disconnect())");
        assert_eq!(
            Request::decode(&mut &[0x07][..]).unwrap().to_string(),
            "TransferAbort()"
        );
    }

    #[test]
    fn unknown_commands_keep_their_bytes() {
        assert_eq!(
            render(&[0xEE, 0x01], &[0xEE, 0x02, 0x03]),
            "Unknown(0xee)(01) -> Unknown(0xee)(02:03)"
        );
        assert_eq!(CommandName::from_id(0x9F), CommandName::Vendor(0x9F));
        assert_eq!(CommandName::from_id(0x11), CommandName::Known("SWJ_Clock"));
    }

    #[test]
    fn mismatched_echo_is_rejected() {
        let request = Request::decode(&mut &[0x03][..]).unwrap();
        let err = request.decode_response(&mut &[0xFF][..]).unwrap_err();
        assert_eq!(
            err.kind(),
            DecodeErrorKind::CommandMismatch {
                expected: 0x03,
                found: 0xFF
            }
        );
    }

    #[test]
    fn flag_names_cover_every_flag() {
        fn covered(names: &[(u32, &str)]) -> u32 {
            names.iter().fold(0, |bits, &(flag, _)| bits | flag)
        }

        assert_eq!(
            covered(general::Capabilities::NAMES),
            u32::from(general::Capabilities::all().bits())
        );
        assert_eq!(covered(swj::Pins::NAMES), u32::from(swj::Pins::all().bits()));
        assert_eq!(
            covered(swo::TraceStatus::NAMES),
            u32::from(swo::TraceStatus::all().bits())
        );
        assert_eq!(
            covered(swo::ExtendedStatusControl::NAMES),
            u32::from(swo::ExtendedStatusControl::all().bits())
        );
        assert_eq!(
            covered(transfer::TransferErrors::NAMES),
            u32::from(transfer::TransferErrors::all().bits())
        );
    }

    #[test]
    fn status_bytes() {
        assert_eq!(DapStatus::decode(&mut &[0x00][..]).unwrap(), DapStatus::Ok);
        assert_eq!(DapStatus::decode(&mut &[0xFF][..]).unwrap(), DapStatus::Error);
        assert_eq!(DapStatus::Unknown(0x05).to_string(), "Unknown(0x05)");
    }
}
