//! Reassembles usbmon submission/completion events into whole USB transfers.

use std::collections::HashMap;

use log::{debug, trace, warn};

use crate::usbmon::{BusEvent, Direction, EventPhase, UrbKind};

/// How a transfer ended.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum TransferStatus {
    Complete,
    /// Non-zero URB status, usually a negated errno.
    Failed(i32),
    /// Fewer bytes were captured or transferred than were reported or requested.
    Short { expected: u32, actual: u32 },
}

/// A completed bulk or interrupt transfer.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct UsbTransfer {
    pub urb_tag: String,
    pub direction: Direction,
    pub device: u8,
    pub endpoint: u8,
    /// Completion time in microseconds.
    pub timestamp: u64,
    pub payload: Vec<u8>,
    pub status: TransferStatus,
}

impl UsbTransfer {
    /// Builds a payload-less failed transfer from a submission error event.
    fn failed(event: BusEvent) -> Self {
        Self {
            status: TransferStatus::Failed(event.status.unwrap_or_default()),
            urb_tag: event.urb_tag,
            direction: event.direction,
            device: event.device,
            endpoint: event.endpoint,
            timestamp: event.timestamp,
            payload: Vec::new(),
        }
    }

    fn from_events(submission: BusEvent, completion: BusEvent) -> Self {
        match completion.status.unwrap_or_default() {
            0 => {}
            status => {
                return Self {
                    status: TransferStatus::Failed(status),
                    ..Self::failed(completion)
                };
            }
        }

        // usbmon captures OUT data when the URB is submitted and IN data when
        // it completes.
        let (mut payload, expected) = match completion.direction {
            Direction::Out => (submission.data.unwrap_or_default(), submission.length),
            Direction::In => (completion.data.unwrap_or_default(), completion.length),
        };
        payload.truncate(completion.length as usize);

        let actual = payload.len() as u32;
        let status = if actual < expected {
            TransferStatus::Short { expected, actual }
        } else {
            TransferStatus::Complete
        };

        Self {
            urb_tag: completion.urb_tag,
            direction: completion.direction,
            device: completion.device,
            endpoint: completion.endpoint,
            timestamp: completion.timestamp,
            payload,
            status,
        }
    }
}

/// Selects the traffic of one probe.
#[derive(Debug, Clone, Copy, Default, Eq, PartialEq)]
pub struct DeviceFilter {
    pub bus: Option<u16>,
    pub device: Option<u8>,
}

impl DeviceFilter {
    pub fn matches(&self, event: &BusEvent) -> bool {
        self.bus.is_none_or(|bus| bus == event.bus)
            && self.device.is_none_or(|device| device == event.device)
    }
}

/// Output of the [`TransferAssembler`].
#[derive(Debug, Clone, Eq, PartialEq)]
pub enum Assembled {
    Transfer(UsbTransfer),
    /// A completion whose submission was never seen, e.g. because the capture
    /// started while the URB was in flight.
    Orphan(BusEvent),
}

/// Pairs each usbmon submission with its completion by URB tag.
///
/// Only bulk and interrupt URBs are assembled; interrupt endpoints carry the
/// traffic of HID-based (v1) probes.
pub struct TransferAssembler<I> {
    events: I,
    filter: DeviceFilter,
    pending: HashMap<String, BusEvent>,
}

impl<I: Iterator<Item = BusEvent>> TransferAssembler<I> {
    pub fn new(events: I, filter: DeviceFilter) -> Self {
        Self {
            events,
            filter,
            pending: HashMap::new(),
        }
    }

    /// Number of submissions still waiting for a completion.
    pub fn pending(&self) -> usize {
        self.pending.len()
    }
}

impl<I: Iterator<Item = BusEvent>> Iterator for TransferAssembler<I> {
    type Item = Assembled;

    fn next(&mut self) -> Option<Assembled> {
        loop {
            let Some(event) = self.events.next() else {
                if !self.pending.is_empty() {
                    debug!(
                        "Discarding {} submissions without completion",
                        self.pending.len()
                    );
                    self.pending.clear();
                }
                return None;
            };

            if !matches!(event.kind, UrbKind::Bulk | UrbKind::Interrupt)
                || !self.filter.matches(&event)
            {
                continue;
            }
            trace!("{event}");

            match event.phase {
                EventPhase::Submission => {
                    if let Some(stale) = self.pending.insert(event.urb_tag.clone(), event) {
                        warn!("URB {} submitted again before completing", stale.urb_tag);
                    }
                }
                EventPhase::Error => {
                    return Some(Assembled::Transfer(UsbTransfer::failed(event)));
                }
                EventPhase::Callback => {
                    return Some(match self.pending.remove(&event.urb_tag) {
                        Some(submission) => {
                            Assembled::Transfer(UsbTransfer::from_events(submission, event))
                        }
                        None => {
                            warn!("Completion for unknown URB {}", event.urb_tag);
                            Assembled::Orphan(event)
                        }
                    });
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn events(lines: &[&str]) -> Vec<BusEvent> {
        lines.iter().map(|line| line.parse().unwrap()).collect()
    }

    fn assemble(lines: &[&str]) -> Vec<Assembled> {
        TransferAssembler::new(events(lines).into_iter(), DeviceFilter::default()).collect()
    }

    fn transfer(assembled: &Assembled) -> &UsbTransfer {
        match assembled {
            Assembled::Transfer(transfer) => transfer,
            Assembled::Orphan(event) => panic!("unexpected orphan {event}"),
        }
    }

    #[test]
    fn out_payload_comes_from_submission() {
        let assembled = assemble(&[
            "a 1 S Bo:2:016:2 -115 2 = 0200",
            "a 2 C Bo:2:016:2 0 2 >",
        ]);
        assert_eq!(assembled.len(), 1);

        let transfer = transfer(&assembled[0]);
        assert_eq!(transfer.direction, Direction::Out);
        assert_eq!(transfer.payload, vec![0x02, 0x00]);
        assert_eq!(transfer.status, TransferStatus::Complete);
        assert_eq!(transfer.timestamp, 2);
    }

    #[test]
    fn in_payload_comes_from_completion() {
        let assembled = assemble(&[
            "b 1 S Bi:2:016:1 -115 512 <",
            "b 3 C Bi:2:016:1 0 2 = 0201",
        ]);
        let transfer = transfer(&assembled[0]);
        assert_eq!(transfer.payload, vec![0x02, 0x01]);
        assert_eq!(transfer.status, TransferStatus::Complete);
    }

    #[test]
    fn truncated_capture_is_short() {
        let assembled = assemble(&[
            "b 1 S Bi:2:016:1 -115 512 <",
            "b 3 C Bi:2:016:1 0 64 = 00040000",
        ]);
        let transfer = transfer(&assembled[0]);
        assert_eq!(
            transfer.status,
            TransferStatus::Short {
                expected: 64,
                actual: 4
            }
        );
        assert_eq!(transfer.payload, vec![0x00, 0x04, 0x00, 0x00]);
    }

    #[test]
    fn partial_write_is_short() {
        let assembled = assemble(&[
            "a 1 S Bo:2:016:2 -115 4 = 05000102",
            "a 2 C Bo:2:016:2 0 2 >",
        ]);
        let transfer = transfer(&assembled[0]);
        assert_eq!(transfer.payload, vec![0x05, 0x00]);
        assert_eq!(
            transfer.status,
            TransferStatus::Short {
                expected: 4,
                actual: 2
            }
        );
    }

    #[test]
    fn failures() {
        let assembled = assemble(&[
            "a 1 S Bo:2:016:2 -115 2 = 0200",
            "a 2 C Bo:2:016:2 -32 0 >",
            "c 3 E Bo:2:016:2 -19 0",
        ]);
        assert_eq!(transfer(&assembled[0]).status, TransferStatus::Failed(-32));
        assert!(transfer(&assembled[0]).payload.is_empty());
        assert_eq!(transfer(&assembled[1]).status, TransferStatus::Failed(-19));
    }

    #[test]
    fn completion_without_submission_is_orphaned() {
        let assembled = assemble(&[
            "z 1 C Bi:2:016:1 0 2 = 0300",
            "a 2 S Bo:2:016:2 -115 1 = 03",
            "a 3 C Bo:2:016:2 0 1 >",
        ]);
        assert!(matches!(&assembled[0], Assembled::Orphan(event) if event.urb_tag == "z"));
        assert_eq!(transfer(&assembled[1]).payload, vec![0x03]);
    }

    #[test]
    fn interleaved_urbs() {
        let assembled = assemble(&[
            "a 1 S Bo:2:016:2 -115 1 = 03",
            "b 2 S Bi:2:016:1 -115 512 <",
            "a 3 C Bo:2:016:2 0 1 >",
            "b 4 C Bi:2:016:1 0 2 = 0300",
        ]);
        assert_eq!(transfer(&assembled[0]).urb_tag, "a");
        assert_eq!(transfer(&assembled[1]).urb_tag, "b");
    }

    #[test]
    fn pending_submissions_are_dropped_at_end() {
        let mut assembler = TransferAssembler::new(
            events(&["a 1 S Bo:2:016:2 -115 1 = 03"]).into_iter(),
            DeviceFilter::default(),
        );
        assert_eq!(assembler.next(), None);
        assert_eq!(assembler.pending(), 0);
    }

    #[test]
    fn filters() {
        let lines = [
            "a 1 S Bo:2:016:2 -115 1 = 03",
            "a 2 C Bo:2:016:2 0 1 >",
            "b 3 S Bo:2:017:2 -115 1 = 03",
            "b 4 C Bo:2:017:2 0 1 >",
            "c 5 S Co:2:016:0 s 21 09 0200 0000 0001 1 = 01",
            "c 6 C Co:2:016:0 0 1 >",
            "d 7 S Io:2:016:3 -115:1 1 = 02",
            "d 8 C Io:2:016:3 0:1 1 >",
        ];
        let filter = DeviceFilter {
            bus: Some(2),
            device: Some(16),
        };
        let tags: Vec<String> = TransferAssembler::new(events(&lines).into_iter(), filter)
            .map(|assembled| transfer(&assembled).urb_tag.clone())
            .collect();
        assert_eq!(tags, ["a", "d"]);
    }
}
