//! Request/response pairs decoded into a single displayable record.

use core::fmt;

use crate::{
    commands::{CommandName, Request, Response},
    decode::{Decode, DecodeError, DecodeErrorKind},
};

/// What became of the host-to-device half of a round trip.
#[derive(Debug, Clone, Eq, PartialEq)]
pub enum RequestOutcome {
    Decoded(Request),
    /// The payload was empty (`id` is `None`) or too short for its command.
    Malformed {
        id: Option<u8>,
        error: DecodeError,
    },
    /// The USB transfer carrying the request failed with this status.
    Failed(i32),
}

impl RequestOutcome {
    /// Decodes a request payload, starting at the command code.
    pub fn decode(payload: &[u8]) -> Self {
        let mut data = payload;
        match Request::decode(&mut data) {
            Ok(request) => Self::Decoded(request),
            Err(error) => Self::Malformed {
                id: payload.first().copied(),
                error,
            },
        }
    }

    /// Name of the command the host sent, if a command code was seen.
    pub const fn name(&self) -> Option<CommandName> {
        match self {
            Self::Decoded(request) => Some(request.name()),
            Self::Malformed { id: Some(id), .. } => Some(CommandName::from_id(*id)),
            Self::Malformed { id: None, .. } | Self::Failed(_) => None,
        }
    }
}

impl fmt::Display for RequestOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Decoded(request) => write!(f, "{request}"),
            Self::Malformed { id: Some(id), .. } => {
                write!(f, "{}(Malformed)", CommandName::from_id(*id))
            }
            Self::Malformed { id: None, .. } => f.write_str("Malformed"),
            Self::Failed(status) => write!(f, "Failed({status})"),
        }
    }
}

/// What became of the device-to-host half of a round trip.
#[derive(Debug, Clone, Eq, PartialEq)]
pub enum ResponseOutcome {
    Decoded(Response),
    /// No response was observed before the next request.
    Missing,
    Malformed(DecodeError),
    /// The USB transfer carrying the response failed with this status.
    Failed(i32),
}

impl ResponseOutcome {
    /// Decodes a response payload against the request it answers.
    pub fn decode(request: &RequestOutcome, payload: &[u8]) -> Self {
        let RequestOutcome::Decoded(request) = request else {
            return Self::Malformed(DecodeError::new::<Response>(
                DecodeErrorKind::MalformedRequest,
            ));
        };

        let mut data = payload;
        match request.decode_response(&mut data) {
            Ok(response) => Self::Decoded(response),
            Err(error) => Self::Malformed(error),
        }
    }
}

/// One CMSIS-DAP round trip, rendered as `Request(args) -> Response(result)`.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct DecodedRecord {
    pub request: RequestOutcome,
    pub response: ResponseOutcome,
}

impl DecodedRecord {
    pub const fn new(request: RequestOutcome, response: ResponseOutcome) -> Self {
        Self { request, response }
    }

    /// Decodes a request payload and, if one was observed, the response to it.
    ///
    /// This never fails: anything that cannot be decoded is kept as a
    /// malformed outcome on the side it occurred.
    pub fn decode(request: &[u8], response: Option<&[u8]>) -> Self {
        let request = RequestOutcome::decode(request);
        let response = match response {
            Some(payload) => ResponseOutcome::decode(&request, payload),
            None => ResponseOutcome::Missing,
        };
        Self { request, response }
    }
}

impl fmt::Display for DecodedRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> ", self.request)?;
        match &self.response {
            ResponseOutcome::Decoded(response) => write!(f, "{response}"),
            ResponseOutcome::Missing => match self.request.name() {
                Some(name) => write!(f, "{name}()"),
                None => f.write_str("Missing"),
            },
            ResponseOutcome::Malformed(_) => f.write_str("Malformed"),
            ResponseOutcome::Failed(status) => write!(f, "Failed({status})"),
        }
    }
}
