use crc::Crc;

/// [CRC16 error-detecting algorithm](https://en.wikipedia.org/wiki/Cyclic_redundancy_check)
/// protecting every packet payload.
///
/// The controller firmware uses a table-driven CCITT CRC with polynomial `0x1021`,
/// a zero initial value and no reflection, which is CRC-16/XMODEM.
pub const VESC_CRC16: Crc<u16> = Crc::<u16>::new(&crc::CRC_16_XMODEM);

/// Computes the checksum of a packet payload.
#[inline]
pub fn crc16(payload: &[u8]) -> u16 {
    VESC_CRC16.checksum(payload)
}

#[cfg(test)]
mod tests {
    use super::crc16;

    #[test]
    fn check_value() {
        assert_eq!(crc16(b"123456789"), 0x31C3);
    }

    #[test]
    fn empty_is_zero() {
        assert_eq!(crc16(&[]), 0);
    }

    #[test]
    fn fw_version_query() {
        // Well-known COMM_FW_VERSION request: 02 01 00 00 00 03
        assert_eq!(crc16(&[0x00]), 0x0000);
        // COMM_GET_VALUES request: 02 01 04 40 84 03
        assert_eq!(crc16(&[0x04]), 0x4084);
    }
}
