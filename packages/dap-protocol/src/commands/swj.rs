//! SWJ commands: shared SWD/JTAG pin control, clock and sequences.

use alloc::vec::Vec;
use bitflags::bitflags;
use core::fmt;

use crate::{
    decode::{Decode, DecodeError, DecodeWithLength},
    format::{Frequency, HexBytes, write_flags},
};

use super::{DapCommand, DapStatus, cmds};

bitflags! {
    /// SWD/JTAG pin bits used by `DAP_SWJ_Pins`.
    #[derive(Debug, Clone, Copy, Eq, PartialEq)]
    pub struct Pins: u8 {
        const SWCLK_TCK = 1 << 0;
        const SWDIO_TMS = 1 << 1;
        const TDI = 1 << 2;
        const TDO = 1 << 3;
        const NTRST = 1 << 5;
        const NRESET = 1 << 7;
    }
}

impl Pins {
    pub(crate) const NAMES: &'static [(u32, &'static str)] = &[
        (Self::SWCLK_TCK.bits() as u32, "SWCLK_TCK"),
        (Self::SWDIO_TMS.bits() as u32, "SWDIO_TMS"),
        (Self::TDI.bits() as u32, "TDI"),
        (Self::TDO.bits() as u32, "TDO"),
        (Self::NTRST.bits() as u32, "nTRST"),
        (Self::NRESET.bits() as u32, "nRESET"),
    ];
}

impl Decode for Pins {
    fn decode(data: &mut &[u8]) -> Result<Self, DecodeError> {
        Ok(Self::from_bits_retain(u8::decode(data)?))
    }
}

impl fmt::Display for Pins {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_flags(f, self.bits().into(), Self::NAMES)
    }
}

/// `DAP_SWJ_Pins`
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct SwjPins {
    /// Levels to drive on the selected pins.
    pub output: Pins,
    /// Pins to modify.
    pub select: Pins,
    /// Microseconds to wait for the selected pins to settle.
    pub wait: u32,
}

impl Decode for SwjPins {
    fn decode(data: &mut &[u8]) -> Result<Self, DecodeError> {
        let output = Pins::decode(data)?;
        let select = Pins::decode(data)?;
        let wait = u32::decode(data)?;

        Ok(Self {
            output,
            select,
            wait,
        })
    }
}

impl fmt::Display for SwjPins {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "output={}, select={}, wait={} us",
            self.output, self.select, self.wait
        )
    }
}

impl DapCommand for SwjPins {
    const ID: u8 = cmds::SWJ_PINS;
    const NAME: &'static str = "SWJ_Pins";

    /// Pin input levels read back after the wait.
    type Response = Pins;

    fn decode_response(&self, data: &mut &[u8]) -> Result<Pins, DecodeError> {
        Pins::decode(data)
    }
}

/// `DAP_SWJ_Clock`
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct SwjClock {
    pub clock: Frequency,
}

impl Decode for SwjClock {
    fn decode(data: &mut &[u8]) -> Result<Self, DecodeError> {
        Ok(Self {
            clock: Frequency(u32::decode(data)?),
        })
    }
}

impl fmt::Display for SwjClock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.clock)
    }
}

impl DapCommand for SwjClock {
    const ID: u8 = cmds::SWJ_CLOCK;
    const NAME: &'static str = "SWJ_Clock";

    type Response = DapStatus;

    fn decode_response(&self, data: &mut &[u8]) -> Result<DapStatus, DecodeError> {
        DapStatus::decode(data)
    }
}

/// `DAP_SWJ_Sequence`
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct SwjSequence {
    /// Number of bits clocked out on SWDIO/TMS (1 to 256).
    pub bit_count: u16,
    /// Bit data, LSB first.
    pub data: Vec<u8>,
}

impl Decode for SwjSequence {
    fn decode(data: &mut &[u8]) -> Result<Self, DecodeError> {
        // A count of zero encodes 256 bits.
        let bit_count = match u8::decode(data)? {
            0 => 256,
            count => u16::from(count),
        };
        let bytes = Vec::<u8>::decode_with_len(data, usize::from(bit_count).div_ceil(8))?;

        Ok(Self {
            bit_count,
            data: bytes,
        })
    }
}

impl fmt::Display for SwjSequence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}, {}", self.bit_count, HexBytes(&self.data))
    }
}

impl DapCommand for SwjSequence {
    const ID: u8 = cmds::SWJ_SEQUENCE;
    const NAME: &'static str = "SWJ_Sequence";

    type Response = DapStatus;

    fn decode_response(&self, data: &mut &[u8]) -> Result<DapStatus, DecodeError> {
        DapStatus::decode(data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::string::ToString;

    #[test]
    fn line_reset_sequence() {
        // 51 high bits followed by the JTAG-to-SWD switch prefix.
        let sequence = SwjSequence::decode(
            &mut &[0x33, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0x07][..],
        )
        .unwrap();
        assert_eq!(sequence.bit_count, 51);
        assert_eq!(sequence.to_string(), "51, ff:ff:ff:ff:ff:ff:07");
    }

    #[test]
    fn zero_count_is_256_bits() {
        let mut request = [0xAAu8; 33];
        request[0] = 0;
        let sequence = SwjSequence::decode(&mut &request[..]).unwrap();
        assert_eq!(sequence.bit_count, 256);
        assert_eq!(sequence.data.len(), 32);
    }

    #[test]
    fn truncated_sequence_is_an_error() {
        assert!(SwjSequence::decode(&mut &[0x10, 0xFF][..]).is_err());
    }

    #[test]
    fn clock_renders_as_frequency() {
        let clock = SwjClock::decode(&mut &[0x40, 0x42, 0x0F, 0x00][..]).unwrap();
        assert_eq!(clock.to_string(), "1.000 MHz");

        let slow = SwjClock::decode(&mut &[0xA0, 0x86, 0x01, 0x00][..]).unwrap();
        assert_eq!(slow.to_string(), "100.000 kHz");
    }

    #[test]
    fn pins_with_reserved_bits() {
        let pins = SwjPins::decode(&mut &[0x41, 0x01, 0x10, 0x00, 0x00, 0x00][..]).unwrap();
        assert_eq!(
            pins.to_string(),
            "output=SWCLK_TCK|0x40, select=SWCLK_TCK, wait=16 us"
        );
    }
}
