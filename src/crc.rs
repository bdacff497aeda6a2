//! CRC-16/XMODEM over the row-data region: poly 0x1021, init 0x0000,
//! no reflection, no final XOR.

use crc::{Crc, CRC_16_XMODEM};

pub const XMODEM: Crc<u16> = Crc::<u16>::new(&CRC_16_XMODEM);

pub fn checksum(data: &[u8]) -> u16 {
    XMODEM.checksum(data)
}
