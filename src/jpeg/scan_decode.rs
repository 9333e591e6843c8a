/*---------------------------------------------------------------------------------------------
 *  Copyright (c) Microsoft Corporation. All rights reserved.
 *  Licensed under the Apache License, Version 2.0. See LICENSE.txt in the project root for license information.
 *  This software incorporates material from third parties. See NOTICE.txt for details.
 *--------------------------------------------------------------------------------------------*/

use log::debug;

use crate::consts::{MAX_AC_CATEGORY, MAX_DC_CATEGORY};
use crate::helpers::{devli, lbits, rbits};
use crate::image::Plane;
use crate::jpeg_error::{err_at, ErrorKind, Result};

use super::bit_reader::BitReader;
use super::block::{quantization_transposed, CoeffBlock};
use super::byte_reader::ByteReader;
use super::idct::run_idct;
use super::jpeg_header::{HuffmanDecoder, JpegHeader};

/// Decodes the entropy-coded scan data into one sample plane per
/// component at the padded MCU-grid resolution. On return the reader
/// sits byte-aligned after the last MCU.
pub fn decode_scan(header: &JpegHeader, reader: &mut ByteReader) -> Result<Vec<Plane>> {
    let mut q_transposed = Vec::with_capacity(header.cmpc);
    let mut planes = Vec::with_capacity(header.cmpc);
    for cmp in 0..header.cmpc {
        let info = &header.cmp_info[cmp];
        q_transposed.push(quantization_transposed(
            &header.q_tables[usize::from(info.q_table_index)],
        ));
        planes.push(Plane::new(info.bch as usize * 8, info.bcv as usize * 8));
    }

    let mut bit_reader = BitReader::new(reader);

    // (re)set last DCs for diff coding
    let mut lastdc = [0i16; 3];

    let mut mcus_until_restart = header.rsti;
    let mut rst_index: u8 = 0;

    for mcu_y in 0..header.mcu_rows {
        for mcu_x in 0..header.mcus_per_row {
            if header.rsti > 0 && mcus_until_restart == 0 {
                bit_reader.expect_restart(rst_index)?;
                rst_index = (rst_index + 1) & 7;
                lastdc = [0; 3];
                mcus_until_restart = header.rsti;
            }

            for scan_idx in 0..header.cs_cmpc {
                let cmp = header.cs_cmp[scan_idx];
                let info = &header.cmp_info[cmp];

                for v in 0..info.sfv {
                    for h in 0..info.sfh {
                        let mut zigzag = [0i16; 64];
                        decode_block_seq(
                            &mut bit_reader,
                            header.get_huff_dc_table(cmp),
                            header.get_huff_ac_table(cmp),
                            &mut zigzag,
                        )?;

                        // fix dc
                        zigzag[0] = zigzag[0].wrapping_add(lastdc[cmp]);
                        lastdc[cmp] = zigzag[0];

                        let block = CoeffBlock::from_zigzag(&zigzag);
                        let tile = run_idct(&block.dequantize(&q_transposed[cmp]));

                        planes[cmp].place_tile(
                            (mcu_x * info.sfh + h) as usize,
                            (mcu_y * info.sfv + v) as usize,
                            &tile,
                        );
                    }
                }
            }

            if header.rsti > 0 {
                mcus_until_restart -= 1;
            }
        }
    }

    // padding bits of the final byte carry no data
    bit_reader.align_to_byte();

    debug!("scan complete, {0} MCUs decoded", header.mcu_count);

    Ok(planes)
}

/// Decodes one block into zig-zag order: a DC difference followed by AC
/// run/value pairs until EOB or coefficient 63.
fn decode_block_seq(
    bit_reader: &mut BitReader,
    dc_table: &HuffmanDecoder,
    ac_table: &HuffmanDecoder,
    block: &mut [i16; 64],
) -> Result<()> {
    // decode dc
    block[0] = read_dc(bit_reader, dc_table)?;

    // decode ac
    let mut bpos: usize = 1;
    while bpos < 64 {
        if let Some((z, s, coef)) = read_coef(bit_reader, ac_table)? {
            // SSSS = 0 is only meaningful for EOB (handled below) and ZRL
            if s == 0 && z != 15 {
                return err_at(
                    ErrorKind::InvalidBitstream,
                    bit_reader.position(),
                    format!("undefined AC symbol with run {0} and no value bits", z),
                );
            }

            if s > MAX_AC_CATEGORY {
                return err_at(
                    ErrorKind::InvalidBitstream,
                    bit_reader.position(),
                    format!("AC category {0} out of range", s),
                );
            }

            bpos += z;
            if bpos >= 64 {
                return err_at(
                    ErrorKind::InvalidBitstream,
                    bit_reader.position(),
                    "zero run past the end of the block",
                );
            }

            // no need to write the zeros since the block starts zeroed
            block[bpos] = coef;
            bpos += 1;
        } else {
            // EOB
            break;
        }
    }

    Ok(())
}

fn read_dc(bit_reader: &mut BitReader, table: &HuffmanDecoder) -> Result<i16> {
    match read_coef(bit_reader, table)? {
        None => Ok(0),
        Some((z, s, coef)) => {
            if z != 0 {
                return err_at(
                    ErrorKind::InvalidBitstream,
                    bit_reader.position(),
                    "not expecting non-zero run in DC coefficient",
                );
            }

            if s > MAX_DC_CATEGORY {
                return err_at(
                    ErrorKind::InvalidBitstream,
                    bit_reader.position(),
                    format!("DC category {0} out of range", s),
                );
            }

            Ok(coef)
        }
    }
}

/// Reads one Huffman symbol plus its value bits. Returns None for the
/// all-zero symbol (EOB as an AC symbol, zero difference as a DC symbol),
/// otherwise (run length, category, extended value).
#[inline(always)]
fn read_coef(bit_reader: &mut BitReader, table: &HuffmanDecoder) -> Result<Option<(usize, u8, i16)>> {
    let symbol = read_symbol(bit_reader, table)?;
    if symbol == 0 {
        return Ok(None);
    }

    let run = usize::from(lbits(symbol, 4));
    let category = rbits(symbol, 4);
    let raw = bit_reader.read(u32::from(category))?;

    Ok(Some((run, category, devli(category, raw))))
}

/// Resolves the next Huffman symbol. The direct lookup serves codes of up
/// to 8 bits straight out of the register; a window too narrow to be
/// conclusive is refilled once, and anything still unresolved is a long
/// code that goes through the canonical ranges.
#[inline(always)]
fn read_symbol(bit_reader: &mut BitReader, table: &HuffmanDecoder) -> Result<u8> {
    let (window, avail) = bit_reader.peek();
    let entry = table.lut[usize::from(window)];
    let len = u32::from(entry >> 8);

    if len != 0 && len <= avail {
        bit_reader.advance(len);
        return Ok((entry & 0xFF) as u8);
    }

    if avail < 8 {
        bit_reader.fill_register(8)?;

        let (window, avail) = bit_reader.peek();
        let entry = table.lut[usize::from(window)];
        let len = u32::from(entry >> 8);
        if len != 0 && len <= avail {
            bit_reader.advance(len);
            return Ok((entry & 0xFF) as u8);
        }
    }

    read_symbol_long(bit_reader, table)
}

/// Grows the code one bit at a time and checks it against each length's
/// canonical code range (the DECODE procedure of T.81 F.2.2.3). Reached
/// only for codes longer than 8 bits and for undefined codes.
#[cold]
fn read_symbol_long(bit_reader: &mut BitReader, table: &HuffmanDecoder) -> Result<u8> {
    let mut code: i32 = 0;

    for len in 1..=16usize {
        code = (code << 1) | i32::from(bit_reader.read(1)?);

        if code <= table.max_code[len] {
            let idx = table.val_ptr[len] + (code - i32::from(table.min_code[len])) as usize;
            return Ok(table.symbols[idx]);
        }
    }

    err_at(
        ErrorKind::InvalidBitstream,
        bit_reader.position(),
        "no huffman code matched within 16 bits",
    )
}
