/*---------------------------------------------------------------------------------------------
 *  Copyright (c) Microsoft Corporation. All rights reserved.
 *  Licensed under the Apache License, Version 2.0. See LICENSE.txt in the project root for license information.
 *  This software incorporates material from third parties. See NOTICE.txt for details.
 *--------------------------------------------------------------------------------------------*/

use byteorder::{BigEndian, ReadBytesExt};

use crate::jpeg_error::{err_at, ErrorKind, Result};

/// Position-tracked cursor over the complete JPEG input. All reads fail
/// with `UnexpectedEof` carrying the current offset once the requested
/// span runs past the end of the buffer.
pub struct ByteReader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> ByteReader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        ByteReader { data, pos: 0 }
    }

    /// Offset of the next unread byte.
    #[inline(always)]
    pub fn position(&self) -> usize {
        self.pos
    }

    #[inline(always)]
    pub fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    #[inline(always)]
    pub fn peek_u8(&self) -> Result<u8> {
        match self.data.get(self.pos) {
            Some(&b) => Ok(b),
            None => err_at(ErrorKind::UnexpectedEof, self.pos, "read past end of input"),
        }
    }

    #[inline(always)]
    pub fn read_u8(&mut self) -> Result<u8> {
        let b = self.peek_u8()?;
        self.pos += 1;
        Ok(b)
    }

    pub fn read_u16_be(&mut self) -> Result<u16> {
        let mut rest = &self.data[self.pos.min(self.data.len())..];
        match rest.read_u16::<BigEndian>() {
            Ok(v) => {
                self.pos += 2;
                Ok(v)
            }
            Err(_) => err_at(ErrorKind::UnexpectedEof, self.pos, "read past end of input"),
        }
    }

    /// Borrows the next `n` bytes out of the input without copying.
    pub fn read_bytes(&mut self, n: usize) -> Result<&'a [u8]> {
        if self.remaining() < n {
            return err_at(
                ErrorKind::UnexpectedEof,
                self.pos,
                format!("{0} bytes requested, {1} left", n, self.remaining()),
            );
        }

        let slice = &self.data[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    pub fn skip(&mut self, n: usize) -> Result<()> {
        if self.remaining() < n {
            return err_at(
                ErrorKind::UnexpectedEof,
                self.pos,
                format!("cannot skip {0} bytes, {1} left", n, self.remaining()),
            );
        }

        self.pos += n;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn read_primitives() {
        let data = [0x12u8, 0x34, 0x56, 0x78, 0x9a];
        let mut r = ByteReader::new(&data);

        assert_eq!(r.peek_u8().unwrap(), 0x12);
        assert_eq!(r.position(), 0);
        assert_eq!(r.read_u8().unwrap(), 0x12);
        assert_eq!(r.read_u16_be().unwrap(), 0x3456);
        assert_eq!(r.position(), 3);
        assert_eq!(r.read_bytes(2).unwrap(), &[0x78, 0x9a]);
        assert_eq!(r.remaining(), 0);
    }

    #[test]
    fn eof_reports_offset() {
        let data = [0x12u8, 0x34];
        let mut r = ByteReader::new(&data);
        r.skip(2).unwrap();

        let e = r.read_u8().unwrap_err();
        assert_eq!(e.kind(), ErrorKind::UnexpectedEof);
        assert_eq!(e.offset(), 2);

        let e = r.read_u16_be().unwrap_err();
        assert_eq!(e.kind(), ErrorKind::UnexpectedEof);

        // a failed skip does not move the cursor
        assert!(r.skip(1).is_err());
        assert_eq!(r.position(), 2);
    }

    #[test]
    fn short_u16_read() {
        let data = [0x12u8];
        let mut r = ByteReader::new(&data);
        let e = r.read_u16_be().unwrap_err();
        assert_eq!(e.kind(), ErrorKind::UnexpectedEof);
        assert_eq!(e.offset(), 0);
    }
}
