use thiserror::Error;

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
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
    #[error("Packet was too short.")]
    UnexpectedEnd,

    #[error(
        "Could not decode {name} with unexpected byte. Found {value:x}, expected one of: {expected:x?}."
    )]
    UnexpectedByte {
        name: &'static str,
        value: u8,
        expected: &'static [u8],
    },

    #[error("CRC16 checksum mismatch. Found {value:x}, expected {expected:x}.")]
    Checksum { value: u16, expected: u16 },

    #[error("Packet did not start with a valid start marker.")]
    InvalidHeader,

    #[error("Packet declared an empty payload.")]
    EmptyPayload,

    #[error("Declared packet size {size} exceeds the buffer capacity of {capacity} bytes.")]
    Oversized { size: usize, capacity: usize },
}

/// A type that can be reconstructed (decoded) from a raw sequence of bytes.
///
/// The input slice will be advanced by the number of bytes successfully
/// consumed during decoding. All multi-byte integers on the wire are
/// big-endian.
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
                    let (bytes, rest) = data
                        .split_first_chunk::<{ size_of::<$t>() }>()
                        .ok_or_else(|| DecodeError::new::<Self>(DecodeErrorKind::UnexpectedEnd))?;
                    *data = rest;
                    Ok(Self::from_be_bytes(*bytes))
                }
            }
        )*
    };
}

impl_decode_for_primitive!(u8, u16, u32, i8, i16, i32);

impl<const N: usize, T: Decode + Copy + Default> Decode for [T; N] {
    fn decode(data: &mut &[u8]) -> Result<Self, DecodeError> {
        let mut arr = [T::default(); N];
        for item in arr.iter_mut() {
            *item = T::decode(data)?;
        }
        Ok(arr)
    }
}
