use alloc::vec::Vec;
use core::str::Utf8Error;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub struct DecodeError {
    kind: DecodeErrorKind,
    type_name: &'static str,
}

impl DecodeError {
    pub fn new<T>(kind: DecodeErrorKind) -> Self {
        Self {
            kind,
            type_name: core::any::type_name::<T>(),
        }
    }

    pub const fn kind(&self) -> DecodeErrorKind {
        self.kind
    }
}

impl core::fmt::Display for DecodeError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "Failed to decode {}: {}", self.type_name, self.kind)
    }
}

#[derive(Error, Clone, Copy, Debug, PartialEq, Eq)]
pub enum DecodeErrorKind {
    #[error("Payload was too short.")]
    UnexpectedEnd,

    #[error("Response echoed command {found:#04x}, expected {expected:#04x}.")]
    CommandMismatch { expected: u8, found: u8 },

    #[error("Command does not define a response, but one was received.")]
    UnexpectedResponse,

    #[error("Response reported {count} results for {requested} queued requests.")]
    ResultCountMismatch { count: u8, requested: usize },

    #[error("Command {id:#04x} cannot be nested inside a command batch.")]
    NestedBatch { id: u8 },

    #[error("Request could not be decoded, so its response cannot be interpreted.")]
    MalformedRequest,

    #[error(transparent)]
    Utf8Error(#[from] Utf8Error),
}

impl<T: Decode> DecodeWithLength for Vec<T> {
    fn decode_with_len(data: &mut &[u8], len: usize) -> Result<Self, DecodeError> {
        let mut vec = Vec::with_capacity(len);
        for _ in 0..len {
            vec.push(T::decode(data)?);
        }
        Ok(vec)
    }
}

/// A type that can be reconstructed (decoded) from a raw sequence of bytes.
///
/// The input slice is advanced by the number of bytes consumed. Trailing bytes
/// are left in place, which lets HID report padding pass through unnoticed.
pub trait Decode {
    /// Attempts to decode `Self` from the beginning of the provided byte slice.
    ///
    /// # Errors
    ///
    /// Returns a [`DecodeError`] if the input is malformed or insufficient
    /// to decode a complete value of this type.
    fn decode(data: &mut &[u8]) -> Result<Self, DecodeError>
    where
        Self: Sized;
}

/// A type that can be decoded from a sequence of bytes, given an indicator of
/// the number of items contained within the type.
pub trait DecodeWithLength {
    /// Attempts to decode `Self` from the provided byte slice, consuming exactly
    /// `len` items.
    ///
    /// # Errors
    ///
    /// Returns a [`DecodeError`] if the input is insufficient to decode `len`
    /// items.
    fn decode_with_len(data: &mut &[u8], len: usize) -> Result<Self, DecodeError>
    where
        Self: Sized;
}

impl Decode for () {
    fn decode(_data: &mut &[u8]) -> Result<Self, DecodeError> {
        Ok(())
    }
}

macro_rules! impl_decode_for_primitive {
    ($($t:ty),*) => {
        $(
            impl Decode for $t {
                fn decode(data: &mut &[u8]) -> Result<Self, DecodeError> {
                    let mut bytes = [0u8; size_of::<$t>()];
                    bytes.copy_from_slice(take::<$t>(data, size_of::<$t>())?);
                    Ok(Self::from_le_bytes(bytes))
                }
            }
        )*
    };
}

impl_decode_for_primitive!(u8, u16, u32, u64);

/// Splits `len` bytes off the front of `data`, reporting the shortfall against `T`.
pub(crate) fn take<'a, T>(data: &mut &'a [u8], len: usize) -> Result<&'a [u8], DecodeError> {
    if data.len() < len {
        return Err(DecodeError::new::<T>(DecodeErrorKind::UnexpectedEnd));
    }
    let (head, tail) = data.split_at(len);
    *data = tail;
    Ok(head)
}

/// Consumes everything left in `data`.
pub(crate) fn take_rest(data: &mut &[u8]) -> Vec<u8> {
    let rest = data.to_vec();
    *data = &[];
    rest
}
