//! SWD-specific commands.

use alloc::vec::Vec;
use core::fmt;

use crate::{
    decode::{Decode, DecodeError, DecodeWithLength},
    format::{HexBytes, write_list},
};

use super::{DapCommand, DapStatus, cmds};

/// `DAP_SWD_Configure`
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct SwdConfigure {
    pub config: u8,
}

impl SwdConfigure {
    /// Turnaround clock period in cycles (1 to 4).
    pub const fn turnaround(&self) -> u8 {
        (self.config & 0b11) + 1
    }

    /// Whether a data phase is always generated on WAIT/FAULT.
    pub const fn data_phase(&self) -> bool {
        self.config & (1 << 2) != 0
    }
}

impl Decode for SwdConfigure {
    fn decode(data: &mut &[u8]) -> Result<Self, DecodeError> {
        Ok(Self {
            config: u8::decode(data)?,
        })
    }
}

impl fmt::Display for SwdConfigure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "turnaround={}, data_phase={}",
            self.turnaround(),
            self.data_phase()
        )
    }
}

impl DapCommand for SwdConfigure {
    const ID: u8 = cmds::SWD_CONFIGURE;
    const NAME: &'static str = "SWD_Configure";

    type Response = DapStatus;

    fn decode_response(&self, data: &mut &[u8]) -> Result<DapStatus, DecodeError> {
        DapStatus::decode(data)
    }
}

/// One sequence inside a `DAP_SWD_Sequence` request.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct SwdSequenceItem {
    /// Clock cycles (1 to 64).
    pub cycles: u8,
    /// SWDIO is sampled instead of driven.
    pub input: bool,
    /// Output bits, LSB first. Empty for input sequences.
    pub data: Vec<u8>,
}

impl SwdSequenceItem {
    /// Number of bytes the cycles occupy on the wire.
    pub const fn byte_len(&self) -> usize {
        (self.cycles as usize).div_ceil(8)
    }
}

impl Decode for SwdSequenceItem {
    fn decode(data: &mut &[u8]) -> Result<Self, DecodeError> {
        let info = u8::decode(data)?;
        let cycles = match info & 0x3F {
            0 => 64,
            cycles => cycles,
        };
        let input = info & 0x80 != 0;

        let mut item = Self {
            cycles,
            input,
            data: Vec::new(),
        };
        if !input {
            item.data = Vec::decode_with_len(data, item.byte_len())?;
        }

        Ok(item)
    }
}

impl fmt::Display for SwdSequenceItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.input {
            write!(f, "in {}", self.cycles)
        } else {
            write!(f, "out {} {}", self.cycles, HexBytes(&self.data))
        }
    }
}

/// `DAP_SWD_Sequence`
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct SwdSequence {
    pub sequences: Vec<SwdSequenceItem>,
}

impl Decode for SwdSequence {
    fn decode(data: &mut &[u8]) -> Result<Self, DecodeError> {
        let count = u8::decode(data)?;
        Ok(Self {
            sequences: Vec::decode_with_len(data, count.into())?,
        })
    }
}

impl fmt::Display for SwdSequence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_list(f, &self.sequences)
    }
}

/// Status plus the bits sampled by each input sequence.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct SwdSequenceResponse {
    pub status: DapStatus,
    pub captures: Vec<Vec<u8>>,
}

impl fmt::Display for SwdSequenceResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.status)?;
        for capture in &self.captures {
            write!(f, ", {}", HexBytes(capture))?;
        }
        Ok(())
    }
}

impl DapCommand for SwdSequence {
    const ID: u8 = cmds::SWD_SEQUENCE;
    const NAME: &'static str = "SWD_Sequence";

    type Response = SwdSequenceResponse;

    fn decode_response(&self, data: &mut &[u8]) -> Result<SwdSequenceResponse, DecodeError> {
        let status = DapStatus::decode(data)?;

        // A failed sequence carries no captured data.
        let mut captures = Vec::new();
        if status.is_ok() {
            for sequence in self.sequences.iter().filter(|s| s.input) {
                captures.push(Vec::decode_with_len(data, sequence.byte_len())?);
            }
        }

        Ok(SwdSequenceResponse { status, captures })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::string::ToString;

    #[test]
    fn configure_fields() {
        let config = SwdConfigure::decode(&mut &[0x07][..]).unwrap();
        assert_eq!(config.turnaround(), 4);
        assert!(config.data_phase());
        assert_eq!(config.to_string(), "turnaround=4, data_phase=true");
    }

    #[test]
    fn mixed_sequences_capture_inputs() {
        // out 10 cycles, then in 3 cycles, then in 64 cycles.
        let request =
            SwdSequence::decode(&mut &[0x03, 0x0A, 0xFF, 0x03, 0x83, 0x80][..]).unwrap();
        assert_eq!(request.to_string(), "out 10 ff:03, in 3, in 64");

        let response = request
            .decode_response(&mut &[0x00, 0x05, 1, 2, 3, 4, 5, 6, 7, 8][..])
            .unwrap();
        assert_eq!(response.captures.len(), 2);
        assert_eq!(response.to_string(), "Ok, 05, 01:02:03:04:05:06:07:08");
    }

    #[test]
    fn failed_sequence_has_no_captures() {
        let request = SwdSequence::decode(&mut &[0x01, 0x88][..]).unwrap();
        let response = request.decode_response(&mut &[0xFF][..]).unwrap();
        assert_eq!(response.to_string(), "Error");
    }

    #[test]
    fn short_capture_is_an_error() {
        let request = SwdSequence::decode(&mut &[0x01, 0x90][..]).unwrap();
        assert!(request.decode_response(&mut &[0x00, 0x01][..]).is_err());
    }
}
