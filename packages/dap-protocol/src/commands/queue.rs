//! Command batching: `DAP_QueueCommands` and `DAP_ExecuteCommands`.

use alloc::vec::Vec;
use core::fmt;

use crate::{
    decode::{Decode, DecodeError, DecodeErrorKind},
    format::write_list,
};

use super::{DapCommand, NoResponse, Request, Response, cmds, unexpected_response};

fn decode_batch(data: &mut &[u8]) -> Result<Vec<Request>, DecodeError> {
    let count = u8::decode(data)?;
    let mut requests = Vec::with_capacity(count.into());

    for _ in 0..count {
        // Batches only hold plain commands.
        if let Some(&id @ (cmds::QUEUE_COMMANDS | cmds::EXECUTE_COMMANDS)) = data.first() {
            return Err(DecodeError::new::<Request>(DecodeErrorKind::NestedBatch { id }));
        }
        requests.push(Request::decode(data)?);
    }

    Ok(requests)
}

/// `DAP_QueueCommands`: requests buffered by the probe until an
/// `ExecuteCommands` or any other command flushes them.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct QueueCommands {
    pub requests: Vec<Request>,
}

impl Decode for QueueCommands {
    fn decode(data: &mut &[u8]) -> Result<Self, DecodeError> {
        Ok(Self {
            requests: decode_batch(data)?,
        })
    }
}

impl fmt::Display for QueueCommands {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_list(f, &self.requests)
    }
}

impl DapCommand for QueueCommands {
    const ID: u8 = cmds::QUEUE_COMMANDS;
    const NAME: &'static str = "QueueCommands";

    type Response = NoResponse;

    fn decode_response(&self, _data: &mut &[u8]) -> Result<NoResponse, DecodeError> {
        Err(unexpected_response::<Self>())
    }
}

/// `DAP_ExecuteCommands`
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct ExecuteCommands {
    pub requests: Vec<Request>,
}

impl Decode for ExecuteCommands {
    fn decode(data: &mut &[u8]) -> Result<Self, DecodeError> {
        Ok(Self {
            requests: decode_batch(data)?,
        })
    }
}

impl fmt::Display for ExecuteCommands {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_list(f, &self.requests)
    }
}

/// One response per executed request, in request order.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct ExecuteCommandsResponse {
    pub responses: Vec<Response>,
}

impl fmt::Display for ExecuteCommandsResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_list(f, &self.responses)
    }
}

impl DapCommand for ExecuteCommands {
    const ID: u8 = cmds::EXECUTE_COMMANDS;
    const NAME: &'static str = "ExecuteCommands";

    type Response = ExecuteCommandsResponse;

    fn decode_response(&self, data: &mut &[u8]) -> Result<ExecuteCommandsResponse, DecodeError> {
        let count = u8::decode(data)?;
        let executed = self.requests.get(..usize::from(count)).ok_or_else(|| {
            DecodeError::new::<Self>(DecodeErrorKind::ResultCountMismatch {
                count,
                requested: self.requests.len(),
            })
        })?;

        // Execution stops at the first failing command, so fewer responses than
        // requests is valid.
        let mut responses = Vec::with_capacity(executed.len());
        for request in executed {
            responses.push(request.decode_response(data)?);
        }

        Ok(ExecuteCommandsResponse { responses })
    }
}
