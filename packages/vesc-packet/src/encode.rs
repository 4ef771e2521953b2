use thiserror::Error;

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum EncodeError {
    #[error("Packet payload must contain at least a command id")]
    EmptyPayload,

    #[error("Payload of {len} bytes does not fit a two-byte length prefix")]
    PayloadTooLarge { len: usize },

    #[error("Output buffer holds {available} bytes but the packet needs {required}")]
    BufferTooSmall { required: usize, available: usize },
}

/// A type that can be encoded into a sequence of bytes.
pub trait Encode {
    /// Returns the number of bytes this value will take when encoded.
    fn size(&self) -> usize;

    /// Encodes this instance into the provided byte slice.
    ///
    /// `data` must be at least [`size`](Encode::size) bytes long.
    fn encode(&self, data: &mut [u8]);
}

macro_rules! impl_encode_for_primitive {
    ($($t:ty),*) => {
        $(
            impl Encode for $t {
                fn size(&self) -> usize {
                    size_of::<Self>()
                }

                fn encode(&self, data: &mut [u8]) {
                    data[..size_of::<Self>()].copy_from_slice(&self.to_be_bytes());
                }
            }
        )*
    };
}

impl_encode_for_primitive!(u8, u16, u32, i8, i16, i32);

impl Encode for () {
    fn size(&self) -> usize {
        0
    }
    fn encode(&self, _data: &mut [u8]) {}
}

impl Encode for &[u8] {
    fn size(&self) -> usize {
        self.len()
    }

    fn encode(&self, data: &mut [u8]) {
        data[..self.len()].copy_from_slice(self);
    }
}

impl<const N: usize> Encode for [u8; N] {
    fn size(&self) -> usize {
        N
    }

    fn encode(&self, data: &mut [u8]) {
        data[..N].copy_from_slice(self);
    }
}
