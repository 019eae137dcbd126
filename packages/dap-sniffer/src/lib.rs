//! Reconstructs CMSIS-DAP conversations from Linux usbmon traffic.
//!
//! Bus events flow through [`TransferAssembler`], [`TransactionPairer`] and
//! [`TraceDecoder`], each a lazy iterator adapter over the one before it.

pub use dap_protocol as protocol;

use std::fmt;

use log::debug;

use dap_protocol::{DecodedRecord, HexBytes, RequestOutcome, ResponseOutcome};

pub mod assembler;
pub mod capture;
pub mod pairer;
pub mod usbmon;

use crate::{
    assembler::{DeviceFilter, TransferAssembler, TransferStatus, UsbTransfer},
    pairer::{Exchange, Transaction, TransactionPairer},
    usbmon::BusEvent,
};

/// One line of decoded output.
#[derive(Debug, Clone, Eq, PartialEq)]
pub enum TraceLine {
    Record(DecodedRecord),
    /// Completion of a URB whose submission was not captured.
    UnmatchedCompletion { urb_tag: String },
    /// Device-to-host data with no request to answer.
    Unsolicited(Vec<u8>),
}

impl fmt::Display for TraceLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Record(record) => write!(f, "{record}"),
            Self::UnmatchedCompletion { urb_tag } => {
                write!(f, "Malformed(unmatched completion {urb_tag})")
            }
            Self::Unsolicited(data) => {
                write!(f, "Malformed(unsolicited response {})", HexBytes(data))
            }
        }
    }
}

/// Payload of a transfer, or its failure status.
fn payload(transfer: &UsbTransfer) -> Result<&[u8], i32> {
    match transfer.status {
        TransferStatus::Failed(status) => Err(status),
        TransferStatus::Short { expected, actual } => {
            debug!(
                "URB {} carried {actual} of {expected} bytes",
                transfer.urb_tag
            );
            Ok(&transfer.payload)
        }
        TransferStatus::Complete => Ok(&transfer.payload),
    }
}

impl From<Transaction> for DecodedRecord {
    fn from(transaction: Transaction) -> Self {
        let request = match payload(&transaction.request) {
            Ok(data) => RequestOutcome::decode(data),
            Err(status) => RequestOutcome::Failed(status),
        };

        let response = match transaction.response.as_ref().map(payload) {
            None => ResponseOutcome::Missing,
            Some(Ok(data)) => ResponseOutcome::decode(&request, data),
            Some(Err(status)) => ResponseOutcome::Failed(status),
        };

        DecodedRecord::new(request, response)
    }
}

impl From<Exchange> for TraceLine {
    fn from(exchange: Exchange) -> Self {
        match exchange {
            Exchange::Transaction(transaction) => Self::Record(transaction.into()),
            Exchange::Orphan(event) => Self::UnmatchedCompletion {
                urb_tag: event.urb_tag,
            },
            Exchange::Unsolicited(transfer) => Self::Unsolicited(transfer.payload),
        }
    }
}

/// Decodes each paired exchange into a [`TraceLine`].
pub struct TraceDecoder<I> {
    exchanges: I,
}

impl<I: Iterator<Item = Exchange>> TraceDecoder<I> {
    pub fn new(exchanges: I) -> Self {
        Self { exchanges }
    }
}

impl<I: Iterator<Item = Exchange>> Iterator for TraceDecoder<I> {
    type Item = TraceLine;

    fn next(&mut self) -> Option<TraceLine> {
        self.exchanges.next().map(TraceLine::from)
    }
}

/// Runs the whole pipeline over a stream of bus events.
pub fn decode_events<I>(
    events: I,
    filter: DeviceFilter,
) -> TraceDecoder<TransactionPairer<TransferAssembler<I::IntoIter>>>
where
    I: IntoIterator<Item = BusEvent>,
{
    TraceDecoder::new(TransactionPairer::new(TransferAssembler::new(
        events.into_iter(),
        filter,
    )))
}
