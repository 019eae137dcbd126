//! Pairs host-to-device requests with the device-to-host response that follows.

use log::debug;

use crate::{
    assembler::{Assembled, UsbTransfer},
    usbmon::{BusEvent, Direction},
};

/// One CMSIS-DAP round trip.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Transaction {
    pub request: UsbTransfer,
    /// `None` if another request was sent before any response arrived.
    pub response: Option<UsbTransfer>,
}

/// Output of the [`TransactionPairer`].
#[derive(Debug, Clone, Eq, PartialEq)]
pub enum Exchange {
    Transaction(Transaction),
    /// A completion with no matching submission, passed through as-is.
    Orphan(BusEvent),
    /// Device-to-host data with no request waiting for it.
    Unsolicited(UsbTransfer),
}

/// FIFO pairing with at most one outstanding request.
///
/// A probe answers requests in order, so the next IN transfer after an OUT
/// transfer is its response.
pub struct TransactionPairer<I> {
    transfers: I,
    outstanding: Option<UsbTransfer>,
}

impl<I: Iterator<Item = Assembled>> TransactionPairer<I> {
    pub fn new(transfers: I) -> Self {
        Self {
            transfers,
            outstanding: None,
        }
    }
}

impl<I: Iterator<Item = Assembled>> Iterator for TransactionPairer<I> {
    type Item = Exchange;

    fn next(&mut self) -> Option<Exchange> {
        loop {
            let transfer = match self.transfers.next() {
                Some(Assembled::Transfer(transfer)) => transfer,
                Some(Assembled::Orphan(event)) => return Some(Exchange::Orphan(event)),
                None => {
                    return self.outstanding.take().map(|request| {
                        Exchange::Transaction(Transaction {
                            request,
                            response: None,
                        })
                    });
                }
            };

            match transfer.direction {
                Direction::Out => {
                    if let Some(request) = self.outstanding.replace(transfer) {
                        debug!("No response to URB {}", request.urb_tag);
                        return Some(Exchange::Transaction(Transaction {
                            request,
                            response: None,
                        }));
                    }
                }
                Direction::In => match self.outstanding.take() {
                    Some(request) => {
                        return Some(Exchange::Transaction(Transaction {
                            request,
                            response: Some(transfer),
                        }));
                    }
                    None if transfer.payload.is_empty() => {
                        debug!("Dropping empty IN transfer {}", transfer.urb_tag);
                    }
                    None => return Some(Exchange::Unsolicited(transfer)),
                },
            }
        }
    }
}
