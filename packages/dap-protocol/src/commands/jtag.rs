//! JTAG-specific commands.

use alloc::vec::Vec;
use core::fmt;

use crate::{
    decode::{Decode, DecodeError, DecodeWithLength},
    format::{HexBytes, write_list},
};

use super::{DapCommand, DapStatus, cmds};

/// One sequence inside a `DAP_JTAG_Sequence` request.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct JtagSequenceItem {
    /// TCK cycles (1 to 64).
    pub cycles: u8,
    /// TMS level held for the whole sequence.
    pub tms: bool,
    /// Whether TDO is captured.
    pub capture_tdo: bool,
    /// TDI bits, LSB first.
    pub tdi: Vec<u8>,
}

impl JtagSequenceItem {
    pub const fn byte_len(&self) -> usize {
        (self.cycles as usize).div_ceil(8)
    }
}

impl Decode for JtagSequenceItem {
    fn decode(data: &mut &[u8]) -> Result<Self, DecodeError> {
        let info = u8::decode(data)?;
        let cycles = match info & 0x3F {
            0 => 64,
            cycles => cycles,
        };
        let tdi = Vec::decode_with_len(data, usize::from(cycles).div_ceil(8))?;

        Ok(Self {
            cycles,
            tms: info & (1 << 6) != 0,
            capture_tdo: info & (1 << 7) != 0,
            tdi,
        })
    }
}

impl fmt::Display for JtagSequenceItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} TMS={}", self.cycles, u8::from(self.tms))?;
        if self.capture_tdo {
            f.write_str(" TDO")?;
        }
        write!(f, " {}", HexBytes(&self.tdi))
    }
}

/// `DAP_JTAG_Sequence`
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct JtagSequence {
    pub sequences: Vec<JtagSequenceItem>,
}

impl Decode for JtagSequence {
    fn decode(data: &mut &[u8]) -> Result<Self, DecodeError> {
        let count = u8::decode(data)?;
        Ok(Self {
            sequences: Vec::decode_with_len(data, count.into())?,
        })
    }
}

impl fmt::Display for JtagSequence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_list(f, &self.sequences)
    }
}

/// Status plus TDO data for each capturing sequence.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct JtagSequenceResponse {
    pub status: DapStatus,
    pub tdo: Vec<Vec<u8>>,
}

impl fmt::Display for JtagSequenceResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.status)?;
        for capture in &self.tdo {
            write!(f, ", {}", HexBytes(capture))?;
        }
        Ok(())
    }
}

impl DapCommand for JtagSequence {
    const ID: u8 = cmds::JTAG_SEQUENCE;
    const NAME: &'static str = "JTAG_Sequence";

    type Response = JtagSequenceResponse;

    fn decode_response(&self, data: &mut &[u8]) -> Result<JtagSequenceResponse, DecodeError> {
        let status = DapStatus::decode(data)?;

        let mut tdo = Vec::new();
        if status.is_ok() {
            for sequence in self.sequences.iter().filter(|s| s.capture_tdo) {
                tdo.push(Vec::decode_with_len(data, sequence.byte_len())?);
            }
        }

        Ok(JtagSequenceResponse { status, tdo })
    }
}

/// `DAP_JTAG_Configure`: instruction register length of each device in the chain.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct JtagConfigure {
    pub ir_lengths: Vec<u8>,
}

impl Decode for JtagConfigure {
    fn decode(data: &mut &[u8]) -> Result<Self, DecodeError> {
        let count = u8::decode(data)?;
        Ok(Self {
            ir_lengths: Vec::decode_with_len(data, count.into())?,
        })
    }
}

impl fmt::Display for JtagConfigure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_list(f, &self.ir_lengths)
    }
}

impl DapCommand for JtagConfigure {
    const ID: u8 = cmds::JTAG_CONFIGURE;
    const NAME: &'static str = "JTAG_Configure";

    type Response = DapStatus;

    fn decode_response(&self, data: &mut &[u8]) -> Result<DapStatus, DecodeError> {
        DapStatus::decode(data)
    }
}

/// `DAP_JTAG_IDCODE`
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct JtagIdcode {
    /// Zero-based position of the device in the chain.
    pub index: u8,
}

impl Decode for JtagIdcode {
    fn decode(data: &mut &[u8]) -> Result<Self, DecodeError> {
        Ok(Self {
            index: u8::decode(data)?,
        })
    }
}

impl fmt::Display for JtagIdcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.index)
    }
}

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct JtagIdcodeResponse {
    pub status: DapStatus,
    /// Only sent when `status` is `Ok`.
    pub idcode: Option<u32>,
}

impl Decode for JtagIdcodeResponse {
    fn decode(data: &mut &[u8]) -> Result<Self, DecodeError> {
        let status = DapStatus::decode(data)?;
        let idcode = if status.is_ok() {
            Some(u32::decode(data)?)
        } else {
            None
        };
        Ok(Self { status, idcode })
    }
}

impl fmt::Display for JtagIdcodeResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.status)?;
        if let Some(idcode) = self.idcode {
            write!(f, ", {idcode:#010x}")?;
        }
        Ok(())
    }
}

impl DapCommand for JtagIdcode {
    const ID: u8 = cmds::JTAG_IDCODE;
    const NAME: &'static str = "JTAG_IDCODE";

    type Response = JtagIdcodeResponse;

    fn decode_response(&self, data: &mut &[u8]) -> Result<JtagIdcodeResponse, DecodeError> {
        JtagIdcodeResponse::decode(data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::string::ToString;

    #[test]
    fn sequence_without_capture() {
        // Five cycles with TMS high: the TAP reset sequence.
        let request = JtagSequence::decode(&mut &[0x01, 0x45, 0xFF][..]).unwrap();
        assert_eq!(request.to_string(), "5 TMS=1 ff");

        let response = request.decode_response(&mut &[0x00][..]).unwrap();
        assert!(response.tdo.is_empty());
        assert_eq!(response.to_string(), "Ok");
    }

    #[test]
    fn only_capturing_sequences_return_tdo() {
        let request =
            JtagSequence::decode(&mut &[0x02, 0x08, 0x00, 0x8C, 0x34, 0x12][..]).unwrap();
        assert_eq!(request.to_string(), "8 TMS=0 00, 12 TMS=0 TDO 34:12");

        let response = request.decode_response(&mut &[0x00, 0xCD, 0x0A][..]).unwrap();
        assert_eq!(response.to_string(), "Ok, cd:0a");
    }

    #[test]
    fn configure_chain() {
        let configure = JtagConfigure::decode(&mut &[0x02, 0x04, 0x05][..]).unwrap();
        assert_eq!(configure.to_string(), "4, 5");
    }

    #[test]
    fn idcode_response_requires_word() {
        let request = JtagIdcode { index: 1 };
        assert!(request.decode_response(&mut &[0x00, 0x77][..]).is_err());
    }

    #[test]
    fn rejected_idcode_read_has_no_word() {
        let request = JtagIdcode { index: 3 };
        let response = request.decode_response(&mut &[0xFF][..]).unwrap();
        assert_eq!(
            response,
            JtagIdcodeResponse {
                status: DapStatus::Error,
                idcode: None
            }
        );
        assert_eq!(response.to_string(), "Error");
    }
}
