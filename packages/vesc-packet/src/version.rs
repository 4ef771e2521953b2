use core::fmt;

use crate::decode::{Decode, DecodeError};
use crate::encode::Encode;

/// A VESC firmware version.
///
/// A version of `0.0` means no firmware version reply has been received yet.
///
/// This type implements `PartialOrd`, meaning it can be compared to other
/// instances of itself.
#[derive(Debug, Default, Clone, Copy, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct FirmwareVersion {
    /// The major version
    pub major: u8,
    /// The minor version
    pub minor: u8,
}

impl FirmwareVersion {
    pub const fn new(major: u8, minor: u8) -> Self {
        Self { major, minor }
    }

    /// Returns `true` once the controller has reported its version.
    pub fn is_known(&self) -> bool {
        *self != Self::default()
    }
}

impl fmt::Display for FirmwareVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}

impl Encode for FirmwareVersion {
    fn size(&self) -> usize {
        2
    }

    fn encode(&self, data: &mut [u8]) {
        data[0] = self.major;
        data[1] = self.minor;
    }
}

impl Decode for FirmwareVersion {
    fn decode(data: &mut &[u8]) -> Result<Self, DecodeError> {
        let major = u8::decode(data)?;
        let minor = u8::decode(data)?;

        Ok(Self { major, minor })
    }
}
