//! Parser for the Linux usbmon `u` text format.
//!
//! See <https://www.kernel.org/doc/html/latest/usb/usbmon.html> for the
//! layout of each line.

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::protocol::HexBytes;

/// Directory holding the per-bus usbmon text files.
pub const USBMON_DEBUGFS: &str = "/sys/kernel/debug/usb/usbmon";

#[derive(Debug, Error, PartialEq)]
pub enum UsbmonError {
    #[error("Line ended before the {0} field")]
    MissingField(&'static str),

    #[error("Invalid {field}: {value:?}")]
    InvalidField { field: &'static str, value: String },

    #[error("Data words are not valid hex: {0}")]
    Hex(#[from] hex::FromHexError),
}

/// Submission, callback (completion) or submission error.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventPhase {
    Submission,
    Callback,
    Error,
}

#[derive(Debug, Clone, Copy, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UrbKind {
    Control,
    Isochronous,
    Interrupt,
    Bulk,
}

impl fmt::Display for UrbKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Control => "Control",
            Self::Isochronous => "Isochronous",
            Self::Interrupt => "Interrupt",
            Self::Bulk => "Bulk",
        })
    }
}

/// Transfer direction, from the host's point of view.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    /// Device to host.
    In,
    /// Host to device.
    Out,
}

/// One usbmon event line.
#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
pub struct BusEvent {
    /// Opaque identifier shared by a submission and its completion.
    pub urb_tag: String,
    /// Microseconds, with whatever resolution the kernel clock offers.
    pub timestamp: u64,
    pub phase: EventPhase,
    pub kind: UrbKind,
    pub direction: Direction,
    pub bus: u16,
    pub device: u8,
    pub endpoint: u8,
    /// URB status. `None` when a control submission carries a setup packet instead.
    pub status: Option<i32>,
    /// Requested length for submissions, actual length for callbacks.
    pub length: u32,
    /// Captured data, if usbmon captured any. May be shorter than `length`.
    pub data: Option<Vec<u8>>,
}

impl BusEvent {
    /// Number of bytes usbmon captured for this event.
    pub fn captured_len(&self) -> usize {
        self.data.as_ref().map_or(0, Vec::len)
    }
}

impl fmt::Display for BusEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {}:{}:{} {}",
            self.urb_tag, self.bus, self.device, self.endpoint, self.kind
        )?;
        f.write_str(match self.direction {
            Direction::Out => " >",
            Direction::In => " <",
        })?;
        match &self.data {
            Some(data) => write!(f, " {}", HexBytes(data)),
            None => write!(f, "({})", self.length),
        }
    }
}

fn next_word<'a>(
    words: &mut impl Iterator<Item = &'a str>,
    field: &'static str,
) -> Result<&'a str, UsbmonError> {
    words.next().ok_or(UsbmonError::MissingField(field))
}

fn parse_number<T: FromStr>(value: &str, field: &'static str) -> Result<T, UsbmonError> {
    value.parse().map_err(|_| UsbmonError::InvalidField {
        field,
        value: value.to_owned(),
    })
}

impl FromStr for BusEvent {
    type Err = UsbmonError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let mut words = line.split_whitespace();

        let urb_tag = next_word(&mut words, "URB tag")?.to_owned();
        let timestamp = parse_number(next_word(&mut words, "timestamp")?, "timestamp")?;

        let phase = match next_word(&mut words, "event type")? {
            "S" => EventPhase::Submission,
            "C" => EventPhase::Callback,
            "E" => EventPhase::Error,
            other => {
                return Err(UsbmonError::InvalidField {
                    field: "event type",
                    value: other.to_owned(),
                });
            }
        };

        // Address word: `Bo:2:016:2` is a bulk OUT URB to endpoint 2 of
        // device 16 on bus 2.
        let address = next_word(&mut words, "address")?;
        let invalid_address = || UsbmonError::InvalidField {
            field: "address",
            value: address.to_owned(),
        };
        let mut parts = address.split(':');
        let mut pipe = parts.next().ok_or_else(invalid_address)?.chars();
        let kind = match pipe.next() {
            Some('C') => UrbKind::Control,
            Some('Z') => UrbKind::Isochronous,
            Some('I') => UrbKind::Interrupt,
            Some('B') => UrbKind::Bulk,
            _ => return Err(invalid_address()),
        };
        let direction = match pipe.next() {
            Some('i') => Direction::In,
            Some('o') => Direction::Out,
            _ => return Err(invalid_address()),
        };
        let bus = parse_number(parts.next().ok_or_else(invalid_address)?, "bus number")?;
        let device = parse_number(parts.next().ok_or_else(invalid_address)?, "device address")?;
        let endpoint = parse_number(parts.next().ok_or_else(invalid_address)?, "endpoint")?;

        // Status word: a setup tag letter followed by the five setup packet
        // words, or `status[:interval[:start_frame[:error_count]]]`.
        let status_word = next_word(&mut words, "status")?;
        let status = if status_word.starts_with(|c: char| c.is_ascii_alphabetic()) {
            for _ in 0..5 {
                next_word(&mut words, "setup packet")?;
            }
            None
        } else {
            let status = status_word.split(':').next().unwrap_or(status_word);
            Some(parse_number(status, "status")?)
        };

        if kind == UrbKind::Isochronous {
            let descriptors: usize =
                parse_number(next_word(&mut words, "descriptor count")?, "descriptor count")?;
            // At most five descriptors are printed.
            for _ in 0..descriptors.min(5) {
                next_word(&mut words, "isochronous descriptor")?;
            }
        }

        let length = parse_number(next_word(&mut words, "data length")?, "data length")?;

        // Data words are present only after a `=` tag. Other tags say why
        // nothing was captured.
        let data = match words.next() {
            Some("=") => Some(hex::decode(words.collect::<String>())?),
            _ => None,
        };

        Ok(Self {
            urb_tag,
            timestamp,
            phase,
            kind,
            direction,
            bus,
            device,
            endpoint,
            status,
            length,
            data,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bulk_out_submission() {
        let event: BusEvent = "ffff8d0c8a6e9e40 3575914555 S Bo:2:016:2 -115 2 = 0200"
            .parse()
            .unwrap();
        assert_eq!(event.urb_tag, "ffff8d0c8a6e9e40");
        assert_eq!(event.timestamp, 3575914555);
        assert_eq!(event.phase, EventPhase::Submission);
        assert_eq!(event.kind, UrbKind::Bulk);
        assert_eq!(event.direction, Direction::Out);
        assert_eq!((event.bus, event.device, event.endpoint), (2, 16, 2));
        assert_eq!(event.status, Some(-115));
        assert_eq!(event.length, 2);
        assert_eq!(event.data, Some(vec![0x02, 0x00]));
    }

    #[test]
    fn data_words_are_a_byte_stream() {
        let event: BusEvent = "ffff8d0c8a6e9e40 3575914700 C Bi:2:016:1 0 7 = 05010177 14a02b"
            .parse()
            .unwrap();
        assert_eq!(
            event.data,
            Some(vec![0x05, 0x01, 0x01, 0x77, 0x14, 0xA0, 0x2B])
        );
        assert_eq!(event.captured_len(), 7);
    }

    #[test]
    fn uncaptured_data() {
        let event: BusEvent = "ffff8d0c8a6e9f00 3575914560 S Bi:2:016:1 -115 512 <"
            .parse()
            .unwrap();
        assert_eq!(event.data, None);
        assert_eq!(event.length, 512);

        let event: BusEvent = "ffff8d0c8a6e9e40 3575914600 C Bo:2:016:2 0 2 >"
            .parse()
            .unwrap();
        assert_eq!(event.phase, EventPhase::Callback);
        assert_eq!(event.status, Some(0));
        assert_eq!(event.data, None);
    }

    #[test]
    fn interrupt_status_word() {
        let event: BusEvent = "ffff88003b5e0c00 1000 C Ii:1:003:1 0:8 64 = 00040000"
            .parse()
            .unwrap();
        assert_eq!(event.kind, UrbKind::Interrupt);
        assert_eq!(event.status, Some(0));
        assert_eq!(event.length, 64);
    }

    #[test]
    fn control_setup_packet() {
        let event: BusEvent = "d5ea89a0 3575914555 S Ci:1:001:0 s a3 00 0000 0003 0004 4 <"
            .parse()
            .unwrap();
        assert_eq!(event.kind, UrbKind::Control);
        assert_eq!(event.status, None);
        assert_eq!(event.length, 4);
    }

    #[test]
    fn isochronous_descriptors() {
        let event: BusEvent =
            "f2a1b000 2000 C Zi:1:004:3 0:1:1234:0 2 0:0:192 0:192:192 384 = 0102"
                .parse()
                .unwrap();
        assert_eq!(event.kind, UrbKind::Isochronous);
        assert_eq!(event.length, 384);
        assert_eq!(event.data, Some(vec![0x01, 0x02]));
    }

    #[test]
    fn submission_error() {
        let event: BusEvent = "ffff8d0c8a6e9e40 3575914555 E Bo:2:016:2 -19 0".parse().unwrap();
        assert_eq!(event.phase, EventPhase::Error);
        assert_eq!(event.status, Some(-19));
        assert_eq!(event.data, None);
    }

    #[test]
    fn bad_lines() {
        assert_eq!(
            "ffff 12".parse::<BusEvent>(),
            Err(UsbmonError::MissingField("event type"))
        );
        assert_eq!(
            "ffff 12 X Bo:2:016:2 0 0".parse::<BusEvent>(),
            Err(UsbmonError::InvalidField {
                field: "event type",
                value: "X".to_owned()
            })
        );
        assert!(matches!(
            "ffff 12 S Qo:2:016:2 0 0".parse::<BusEvent>(),
            Err(UsbmonError::InvalidField { field: "address", .. })
        ));
        assert!(matches!(
            "ffff 12 S Bo:2:016:2 -115 2 = 0g".parse::<BusEvent>(),
            Err(UsbmonError::Hex(_))
        ));
    }

    #[test]
    fn display() {
        let event: BusEvent = "ab 1 S Bo:2:016:2 -115 2 = 0200".parse().unwrap();
        assert_eq!(event.to_string(), "ab 2:16:2 Bulk > 02:00");

        let event: BusEvent = "ab 1 S Bi:2:016:1 -115 512 <".parse().unwrap();
        assert_eq!(event.to_string(), "ab 2:16:1 Bulk <(512)");
    }
}
