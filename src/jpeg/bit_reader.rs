/*---------------------------------------------------------------------------------------------
 *  Copyright (c) Microsoft Corporation. All rights reserved.
 *  Licensed under the Apache License, Version 2.0. See LICENSE.txt in the project root for license information.
 *  This software incorporates material from third parties. See NOTICE.txt for details.
 *--------------------------------------------------------------------------------------------*/

use crate::jpeg_code;
use crate::jpeg_error::{err_at, ErrorKind, Result};

use super::byte_reader::ByteReader;

/// Bit-level facade over the entropy-coded scan data. Bits are delivered
/// MSB-first out of a 64-bit register; stuffed 0x00 bytes after 0xFF are
/// stripped while the register is filled.
///
/// A 0xFF followed by anything other than 0x00 is a marker and never
/// enters the register. Restart markers are consumed explicitly through
/// [`BitReader::expect_restart`], so hitting a marker while filling means
/// the entropy data itself is malformed.
pub struct BitReader<'a, 'b> {
    inner: &'b mut ByteReader<'a>,
    bits: u64,
    bits_left: u32,
}

impl<'a, 'b> BitReader<'a, 'b> {
    pub fn new(inner: &'b mut ByteReader<'a>) -> Self {
        BitReader {
            inner,
            bits: 0,
            bits_left: 0,
        }
    }

    /// Offset of the byte cursor underneath the register; used to anchor
    /// error reports near the faulting bits.
    #[inline(always)]
    pub fn position(&self) -> usize {
        self.inner.position()
    }

    /// Returns the next `bits_to_read` bits as an unsigned integer
    /// (0 <= bits_to_read <= 16).
    #[inline(always)]
    pub fn read(&mut self, bits_to_read: u32) -> Result<u16> {
        if bits_to_read == 0 {
            return Ok(0);
        }

        if self.bits_left < bits_to_read {
            self.fill_register(bits_to_read)?;
        }

        let retval =
            (self.bits >> (self.bits_left - bits_to_read) & ((1 << bits_to_read) - 1)) as u16;
        self.bits_left -= bits_to_read;
        return Ok(retval);
    }

    /// Returns up to 8 buffered bits left-aligned in a byte, plus how many
    /// of them are real. Feeds the Huffman direct-lookup fast path.
    #[inline(always)]
    pub fn peek(&self) -> (u8, u32) {
        (
            ((self.bits.wrapping_shl(64 - self.bits_left)) >> 56) as u8,
            self.bits_left,
        )
    }

    #[inline(always)]
    pub fn advance(&mut self, bits: u32) {
        self.bits_left -= bits;
    }

    /// Tops up the register until at least `bits_to_read` bits are
    /// buffered, unstuffing 0xFF 0x00 pairs along the way.
    pub fn fill_register(&mut self, bits_to_read: u32) -> Result<()> {
        while self.bits_left < bits_to_read {
            let offset = self.inner.position();
            let b = self.inner.read_u8()?;

            if b == 0xFF {
                // 0xff can only appear escaped by a 0x00 inside scan data
                let next = self.inner.read_u8()?;
                if next != 0x00 {
                    return err_at(
                        ErrorKind::InvalidBitstream,
                        offset,
                        format!("marker 0xff{0:02x} inside entropy-coded data", next),
                    );
                }
            }

            self.bits = (self.bits << 8) | u64::from(b);
            self.bits_left += 8;
        }

        Ok(())
    }

    /// Discards the remaining bits of the current byte. Bits that were
    /// buffered past the current byte stay readable.
    pub fn align_to_byte(&mut self) {
        self.bits_left -= self.bits_left % 8;
    }

    /// Consumes the restart marker that must sit at the current position:
    /// discards padding bits, reads [0xFF, RST0+m] straight from the byte
    /// cursor and leaves the register empty for the next interval.
    pub fn expect_restart(&mut self, m: u8) -> Result<()> {
        self.align_to_byte();

        // the register never crosses a marker, so whole buffered bytes at
        // a restart boundary mean the MCU accounting went off the rails
        if self.bits_left != 0 {
            return err_at(
                ErrorKind::RestartOutOfSync,
                self.inner.position(),
                "entropy data continues where a restart marker was expected",
            );
        }

        let offset = self.inner.position();
        let b0 = self.inner.read_u8()?;
        let b1 = self.inner.read_u8()?;
        if b0 != 0xFF || b1 != jpeg_code::RST0 + m {
            return err_at(
                ErrorKind::RestartOutOfSync,
                offset,
                format!(
                    "expected restart marker ff{0:02x}, found {1:02x}{2:02x}",
                    jpeg_code::RST0 + m,
                    b0,
                    b1
                ),
            );
        }

        Ok(())
    }
}
