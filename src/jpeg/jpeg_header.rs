/*---------------------------------------------------------------------------------------------
 *  Copyright (c) Microsoft Corporation. All rights reserved.
 *  Licensed under the Apache License, Version 2.0. See LICENSE.txt in the project root for license information.
 *  This software incorporates material from third parties. See NOTICE.txt for details.
 *--------------------------------------------------------------------------------------------*/

use log::debug;

use crate::consts::MAX_BLOCKS_PER_MCU;
use crate::helpers::*;
use crate::jpeg_code;
use crate::jpeg_error::{err_at, ErrorKind, Result, TableKind};

use super::byte_reader::ByteReader;
use super::component_info::ComponentInfo;

/// A Huffman table materialized for decoding: a direct lookup on the next
/// 8 bits of the stream for short codes, plus the canonical per-length
/// code ranges (T.81 F.2.2.3) for everything longer.
#[derive(Copy, Clone, Debug)]
pub struct HuffmanDecoder {
    /// indexed by the next 8 bits; high byte is the code length, low byte
    /// the symbol, 0 means the code is longer than 8 bits or undefined
    pub lut: [u16; 256],

    /// largest code of each length 1-16 (index 0 unused), -1 when the
    /// length has no codes
    pub max_code: [i32; 17],

    /// smallest code of each length
    pub min_code: [u16; 17],

    /// index of each length's first symbol in `symbols`
    pub val_ptr: [usize; 17],

    /// symbol values in code order
    pub symbols: [u8; 256],
}

impl Default for HuffmanDecoder {
    fn default() -> Self {
        HuffmanDecoder {
            lut: [0; 256],
            max_code: [-1; 17],
            min_code: [0; 17],
            val_ptr: [0; 17],
            symbols: [0; 256],
        }
    }
}

impl HuffmanDecoder {
    /// Builds the decoder from the wire format: 16 bytes with the number
    /// of codes per bit length, then the symbols for all lengths appended
    /// together. Returns the table and the number of symbols consumed.
    pub fn construct_from_segment(segment: &[u8], base: usize) -> Result<(Self, usize)> {
        ensure_space(segment, base, 0, 16)?;

        let mut total = 0usize;
        for i in 0..16 {
            total += usize::from(segment[i]);
        }

        if total > 256 {
            return err_at(
                ErrorKind::InvalidHuffmanTable,
                base,
                format!("huffman table defines {0} symbols, limit is 256", total),
            );
        }

        ensure_space(segment, base, 16, total)?;

        let mut dec = HuffmanDecoder::default();
        dec.symbols[..total].copy_from_slice(&segment[16..16 + total]);

        // canonical assignment: each length's codes are consecutive and
        // the running code doubles when moving to the next length, so a
        // length is fully described by its first code and symbol index
        let mut code: u32 = 0;
        let mut first_symbol = 0usize;

        for len in 1..=16usize {
            let n = usize::from(segment[len - 1]);

            if n > 0 {
                if code + (n as u32) > (1u32 << len) {
                    return err_at(
                        ErrorKind::InvalidHuffmanTable,
                        base,
                        format!("{0} codes do not fit in {1} bits", n, len),
                    );
                }

                dec.val_ptr[len] = first_symbol;
                dec.min_code[len] = code as u16;
                dec.max_code[len] = (code + (n as u32) - 1) as i32;

                first_symbol += n;
                code += n as u32;
            }

            code <<= 1;
        }

        // short codes additionally get a padded direct-lookup entry for
        // every window they are a prefix of
        for len in 1..=8usize {
            let n = usize::from(segment[len - 1]);

            for i in 0..n {
                let c = usize::from(dec.min_code[len]) + i;
                let entry = ((len as u16) << 8) | u16::from(dec.symbols[dec.val_ptr[len] + i]);

                let start = c << (8 - len);
                for slot in start..start + (1 << (8 - len)) {
                    dec.lut[slot] = entry;
                }
            }
        }

        Ok((dec, total))
    }
}

/// JFIF APP0 payload, kept for diagnostics.
#[derive(Debug, Clone, Copy, Default)]
pub struct AppInfo {
    pub version_major: u8,
    pub version_minor: u8,
    pub density_units: u8,
    pub x_density: u16,
    pub y_density: u16,
    pub thumbnail_width: u8,
    pub thumbnail_height: u8,
}

enum ParseSegmentResult {
    Continue,
    Sos,
}

/// Everything the decoder accumulates from the marker stream before the
/// entropy-coded data starts: tables, frame geometry, scan mapping and the
/// derived MCU layout.
pub struct JpegHeader {
    /// quantization tables in zig-zag order, 4 x 64
    pub q_tables: [[u16; 64]; 4],
    pub q_set: [bool; 4],

    /// huffman tables, indexed [class][id] (access via get_huff_xx_table)
    h_tables: [[HuffmanDecoder; 4]; 2],
    pub ht_set: [[bool; 4]; 2],

    pub app_info: Option<AppInfo>,

    pub cmp_info: [ComponentInfo; 3],

    /// component count
    pub cmpc: usize,

    pub img_width: u16,
    pub img_height: u16,

    /// max horizontal / vertical sample factors
    pub sfh_max: u32,
    pub sfv_max: u32,

    /// mcus per row, mcu rows, total count
    pub mcus_per_row: u32,
    pub mcu_rows: u32,
    pub mcu_count: u32,

    /// restart interval, 0 when disabled
    pub rsti: u32,

    /// component count in the scan and scan order -> component index
    pub cs_cmpc: usize,
    pub cs_cmp: [usize; 3],

    frame_seen: bool,
}

impl Default for JpegHeader {
    fn default() -> Self {
        return JpegHeader {
            q_tables: [[0; 64]; 4],
            q_set: [false; 4],
            h_tables: [[HuffmanDecoder::default(); 4]; 2],
            ht_set: [[false; 4]; 2],
            app_info: None,
            cmp_info: [
                ComponentInfo::default(),
                ComponentInfo::default(),
                ComponentInfo::default(),
            ],
            cmpc: 0,
            img_width: 0,
            img_height: 0,
            sfh_max: 0,
            sfv_max: 0,
            mcus_per_row: 0,
            mcu_rows: 0,
            mcu_count: 0,
            rsti: 0,
            cs_cmpc: 0,
            cs_cmp: [0; 3],
            frame_seen: false,
        };
    }
}

impl JpegHeader {
    pub fn get_huff_dc_table(&self, cmp: usize) -> &HuffmanDecoder {
        &self.h_tables[0][usize::from(self.cmp_info[cmp].huff_dc)]
    }

    pub fn get_huff_ac_table(&self, cmp: usize) -> &HuffmanDecoder {
        &self.h_tables[1][usize::from(self.cmp_info[cmp].huff_ac)]
    }

    /// Parses the marker stream from SOI through SOS and derives the MCU
    /// geometry. On return the reader sits on the first byte of the
    /// entropy-coded scan data.
    pub fn parse_to_scan(&mut self, reader: &mut ByteReader) -> Result<()> {
        if reader.remaining() < 2 {
            return err_at(ErrorKind::NotJpeg, 0, "input too short for an SOI marker");
        }

        if reader.read_u8()? != 0xFF || reader.read_u8()? != jpeg_code::SOI {
            return err_at(ErrorKind::NotJpeg, 0, "input does not start with ffd8");
        }

        loop {
            match self.parse_next_segment(reader)? {
                ParseSegmentResult::Sos => break,
                ParseSegmentResult::Continue => {}
            }
        }

        self.compute_mcu_geometry(reader.position())
    }

    fn parse_next_segment(&mut self, reader: &mut ByteReader) -> Result<ParseSegmentResult> {
        let marker_offset = reader.position();

        let prefix = reader.read_u8()?;
        if prefix != 0xFF {
            return err_at(
                ErrorKind::UnknownMarker(prefix),
                marker_offset,
                format!("expected a marker, found stray byte {0:02x}", prefix),
            );
        }

        // a marker may be preceded by any number of 0xff fill bytes
        let mut btype = reader.read_u8()?;
        while btype == 0xFF {
            btype = reader.read_u8()?;
        }

        match btype {
            jpeg_code::EOI => {
                return err_at(
                    ErrorKind::UnexpectedEof,
                    marker_offset,
                    "end of image before any scan data",
                );
            }

            jpeg_code::RST0..=jpeg_code::RST7 => {
                return err_at(
                    ErrorKind::RestartOutOfSync,
                    marker_offset,
                    "restart marker outside a scan",
                );
            }

            jpeg_code::SOI => {
                return err_at(
                    ErrorKind::UnknownMarker(btype),
                    marker_offset,
                    "second SOI marker",
                );
            }

            0x00 => {
                return err_at(
                    ErrorKind::UnknownMarker(0),
                    marker_offset,
                    "stuffed zero outside a scan",
                );
            }

            // SOF1..SOF15 in all their variants, minus DHT/JPG/DAC which
            // share the 0xCn block
            0xC1..=0xC3 | 0xC5..=0xC7 | 0xC9..=0xCB | 0xCD..=0xCF => {
                let mode = match btype {
                    jpeg_code::SOF2 => "progressive",
                    0xC3 | 0xC7 | 0xCB | 0xCF => "lossless",
                    0xC9 | 0xCA => "arithmetic-coded",
                    _ => "extended/differential",
                };
                return err_at(
                    ErrorKind::UnsupportedMode,
                    marker_offset,
                    format!("{0} JPEG (SOF marker ff{1:02x}) is not baseline", mode, btype),
                );
            }

            jpeg_code::SOF0
            | jpeg_code::DHT
            | jpeg_code::DQT
            | jpeg_code::DRI
            | jpeg_code::SOS
            | jpeg_code::COM
            | jpeg_code::APP0..=jpeg_code::APP15 => {
                let len_offset = reader.position();
                let segment_size = reader.read_u16_be()?;
                if segment_size < 2 {
                    return err_at(
                        ErrorKind::TruncatedSegment,
                        len_offset,
                        "segment length smaller than its own length field",
                    );
                }
                let payload = usize::from(segment_size) - 2;

                // COM and APP1..APP15 carry no decoder state, skip by length
                if btype == jpeg_code::COM || (btype > jpeg_code::APP0 && btype <= jpeg_code::APP15)
                {
                    debug!("skipping segment ff{0:02x} ({1} bytes)", btype, payload);
                    reader.skip(payload)?;
                    return Ok(ParseSegmentResult::Continue);
                }

                let base = reader.position();
                let segment = reader.read_bytes(payload)?;

                match btype {
                    jpeg_code::SOF0 => self.parse_sof0(segment, base)?,
                    jpeg_code::DHT => self.parse_dht(segment, base)?,
                    jpeg_code::DQT => self.parse_dqt(segment, base)?,
                    jpeg_code::DRI => self.parse_dri(segment, base)?,
                    jpeg_code::SOS => {
                        self.parse_sos(segment, base)?;
                        return Ok(ParseSegmentResult::Sos);
                    }
                    jpeg_code::APP0 => self.parse_app0(segment, base)?,
                    _ => {}
                }

                Ok(ParseSegmentResult::Continue)
            }

            _ => err_at(
                ErrorKind::UnknownMarker(btype),
                marker_offset,
                format!("unknown marker ff{0:02x} in header", btype),
            ),
        }
    }

    /// APP0: parse the JFIF payload, skip anything else.
    fn parse_app0(&mut self, segment: &[u8], base: usize) -> Result<()> {
        if segment.len() < 5 || &segment[0..5] != b"JFIF\0" {
            debug!("skipping non-JFIF APP0 ({0} bytes)", segment.len());
            return Ok(());
        }

        ensure_space(segment, base, 5, 9)?;

        let info = AppInfo {
            version_major: segment[5],
            version_minor: segment[6],
            density_units: segment[7],
            x_density: b_short(segment[8], segment[9]),
            y_density: b_short(segment[10], segment[11]),
            thumbnail_width: segment[12],
            thumbnail_height: segment[13],
        };

        // thumbnail pixels trail the fixed fields and are discarded
        let thumbnail =
            3 * usize::from(info.thumbnail_width) * usize::from(info.thumbnail_height);
        ensure_space(segment, base, 14, thumbnail)?;

        debug!(
            "JFIF {0}.{1:02}, density {2}x{3} (units {4})",
            info.version_major, info.version_minor, info.x_density, info.y_density,
            info.density_units
        );

        self.app_info = Some(info);
        Ok(())
    }

    fn parse_dqt(&mut self, segment: &[u8], base: usize) -> Result<()> {
        let len = segment.len();
        let mut hpos = 0;

        while hpos < len {
            let pq = usize::from(lbits(segment[hpos], 4));
            let tq = usize::from(rbits(segment[hpos], 4));

            if pq >= 2 || tq >= 4 {
                return err_at(
                    ErrorKind::UnsupportedMode,
                    base + hpos,
                    format!("DQT with precision {0} / destination {1}", pq, tq),
                );
            }

            hpos += 1;

            if pq == 0 {
                // 8 bit precision
                ensure_space(segment, base, hpos, 64)?;

                for i in 0..64 {
                    self.q_tables[tq][i] = u16::from(segment[hpos + i]);
                }

                hpos += 64;
            } else {
                // 16 bit precision, big endian
                ensure_space(segment, base, hpos, 128)?;

                for i in 0..64 {
                    self.q_tables[tq][i] = b_short(segment[hpos + (2 * i)], segment[hpos + (2 * i) + 1]);
                }

                hpos += 128;
            }

            self.q_set[tq] = true;
            debug!("DQT {0} ({1}-bit)", tq, if pq == 0 { 8 } else { 16 });
        }

        if hpos != len {
            return err_at(
                ErrorKind::TruncatedSegment,
                base + len,
                "size mismatch in dqt segment",
            );
        }

        Ok(())
    }

    fn parse_dht(&mut self, segment: &[u8], base: usize) -> Result<()> {
        let len = segment.len();
        let mut hpos = 0;

        while hpos < len {
            let tc = usize::from(lbits(segment[hpos], 4));
            let th = usize::from(rbits(segment[hpos], 4));

            if tc >= 2 || th >= 4 {
                return err_at(
                    ErrorKind::UnsupportedMode,
                    base + hpos,
                    format!("DHT with class {0} / destination {1}", tc, th),
                );
            }

            hpos += 1;

            let (table, symbol_count) =
                HuffmanDecoder::construct_from_segment(&segment[hpos..], base + hpos)?;
            self.h_tables[tc][th] = table;
            self.ht_set[tc][th] = true;

            debug!(
                "DHT class {0} id {1} with {2} symbols",
                tc, th, symbol_count
            );

            hpos += 16 + symbol_count;
        }

        if hpos != len {
            return err_at(
                ErrorKind::TruncatedSegment,
                base + len,
                "size mismatch in dht segment",
            );
        }

        Ok(())
    }

    fn parse_dri(&mut self, segment: &[u8], base: usize) -> Result<()> {
        if segment.len() != 2 {
            return err_at(
                ErrorKind::TruncatedSegment,
                base,
                "DRI payload must be exactly 2 bytes",
            );
        }

        self.rsti = u32::from(b_short(segment[0], segment[1]));
        debug!("restart interval {0} MCUs", self.rsti);
        Ok(())
    }

    fn parse_sof0(&mut self, segment: &[u8], base: usize) -> Result<()> {
        if self.frame_seen {
            return err_at(
                ErrorKind::UnsupportedMode,
                base,
                "image cannot have multiple SOF segments",
            );
        }

        ensure_space(segment, base, 0, 6)?;

        // sample precision, only 8 bit is allowed for baseline
        let precision = segment[0];
        if precision != 8 {
            return err_at(
                ErrorKind::UnsupportedMode,
                base,
                format!("{0} bit sample precision is not baseline", precision),
            );
        }

        self.img_height = b_short(segment[1], segment[2]);
        self.img_width = b_short(segment[3], segment[4]);

        if self.img_height == 0 || self.img_width == 0 {
            return err_at(
                ErrorKind::UnsupportedMode,
                base + 1,
                "image dimensions cannot be zero",
            );
        }

        self.cmpc = usize::from(segment[5]);
        if self.cmpc != 1 && self.cmpc != 3 {
            return err_at(
                ErrorKind::UnsupportedMode,
                base + 5,
                format!("{0} component image, only 1 or 3 are supported", self.cmpc),
            );
        }

        let mut hpos = 6;
        for cmp in 0..self.cmpc {
            ensure_space(segment, base, hpos, 3)?;

            let info = &mut self.cmp_info[cmp];
            info.jid = segment[hpos];
            info.sfh = u32::from(lbits(segment[hpos + 1], 4));
            info.sfv = u32::from(rbits(segment[hpos + 1], 4));

            if info.sfh < 1 || info.sfh > 4 || info.sfv < 1 || info.sfv > 4 {
                return err_at(
                    ErrorKind::UnsupportedMode,
                    base + hpos + 1,
                    format!("sampling factors {0}x{1} out of range 1..4", info.sfh, info.sfv),
                );
            }

            let tq = segment[hpos + 2];
            if tq >= 4 {
                return err_at(
                    ErrorKind::UnsupportedMode,
                    base + hpos + 2,
                    format!("quantization table selector {0} out of range", tq),
                );
            }
            info.q_table_index = tq;

            hpos += 3;
        }

        if hpos != segment.len() {
            return err_at(
                ErrorKind::TruncatedSegment,
                base + hpos,
                "size mismatch in sof0 segment",
            );
        }

        self.frame_seen = true;

        debug!(
            "SOF0 {0}x{1}, {2} component(s)",
            self.img_width, self.img_height, self.cmpc
        );

        Ok(())
    }

    fn parse_sos(&mut self, segment: &[u8], base: usize) -> Result<()> {
        if !self.frame_seen {
            return err_at(
                ErrorKind::UnsupportedMode,
                base,
                "SOS not preceded by a frame header",
            );
        }

        ensure_space(segment, base, 0, 1)?;

        self.cs_cmpc = usize::from(segment[0]);

        // baseline interleaved: the scan must carry every frame component
        if self.cs_cmpc != self.cmpc {
            return err_at(
                ErrorKind::UnsupportedMode,
                base,
                format!(
                    "{0} components in scan, frame defines {1}",
                    self.cs_cmpc, self.cmpc
                ),
            );
        }

        let mut hpos = 1;
        for i in 0..self.cs_cmpc {
            ensure_space(segment, base, hpos, 2)?;

            let mut cmp = 0;
            while cmp < self.cmpc && segment[hpos] != self.cmp_info[cmp].jid {
                cmp += 1;
            }

            if cmp == self.cmpc {
                return err_at(
                    ErrorKind::UnsupportedMode,
                    base + hpos,
                    format!("scan selects unknown component id {0}", segment[hpos]),
                );
            }

            self.cs_cmp[i] = cmp;
            self.cmp_info[cmp].huff_dc = lbits(segment[hpos + 1], 4);
            self.cmp_info[cmp].huff_ac = rbits(segment[hpos + 1], 4);

            if self.cmp_info[cmp].huff_dc >= 4 || self.cmp_info[cmp].huff_ac >= 4 {
                return err_at(
                    ErrorKind::UnsupportedMode,
                    base + hpos + 1,
                    "huffman table selector out of range",
                );
            }

            hpos += 2;
        }

        ensure_space(segment, base, hpos, 3)?;

        // baseline requires the full spectral band and no successive
        // approximation
        let ss = segment[hpos];
        let se = segment[hpos + 1];
        let sah = lbits(segment[hpos + 2], 4);
        let sal = rbits(segment[hpos + 2], 4);

        if ss != 0 || se != 63 || sah != 0 || sal != 0 {
            return err_at(
                ErrorKind::UnsupportedMode,
                base + hpos,
                format!(
                    "non-baseline scan header (Ss={0} Se={1} Ah={2} Al={3})",
                    ss, se, sah, sal
                ),
            );
        }

        self.verify_tables_present(base)
    }

    /// every table the scan references must have been defined by now
    fn verify_tables_present(&self, offset: usize) -> Result<()> {
        for i in 0..self.cs_cmpc {
            let info = &self.cmp_info[self.cs_cmp[i]];

            if !self.q_set[usize::from(info.q_table_index)] {
                return err_at(
                    ErrorKind::MissingTable(TableKind::Quantization, info.q_table_index),
                    offset,
                    format!("quantization table {0} was never defined", info.q_table_index),
                );
            }

            if !self.ht_set[0][usize::from(info.huff_dc)] {
                return err_at(
                    ErrorKind::MissingTable(TableKind::HuffmanDc, info.huff_dc),
                    offset,
                    format!("DC huffman table {0} was never defined", info.huff_dc),
                );
            }

            if !self.ht_set[1][usize::from(info.huff_ac)] {
                return err_at(
                    ErrorKind::MissingTable(TableKind::HuffmanAc, info.huff_ac),
                    offset,
                    format!("AC huffman table {0} was never defined", info.huff_ac),
                );
            }
        }

        Ok(())
    }

    fn compute_mcu_geometry(&mut self, offset: usize) -> Result<()> {
        for cmp in 0..self.cmpc {
            self.sfh_max = self.sfh_max.max(self.cmp_info[cmp].sfh);
            self.sfv_max = self.sfv_max.max(self.cmp_info[cmp].sfv);
        }

        self.mcus_per_row = div_ceil(u32::from(self.img_width), 8 * self.sfh_max);
        self.mcu_rows = div_ceil(u32::from(self.img_height), 8 * self.sfv_max);
        self.mcu_count = self.mcus_per_row * self.mcu_rows;

        let mut blocks_per_mcu = 0;
        for cmp in 0..self.cmpc {
            let info = &mut self.cmp_info[cmp];
            info.mbs = info.sfh * info.sfv;
            info.bch = self.mcus_per_row * info.sfh;
            info.bcv = self.mcu_rows * info.sfv;
            blocks_per_mcu += info.mbs;
        }

        if blocks_per_mcu > MAX_BLOCKS_PER_MCU {
            return err_at(
                ErrorKind::UnsupportedMode,
                offset,
                format!(
                    "{0} blocks per MCU exceeds the baseline limit of {1}",
                    blocks_per_mcu, MAX_BLOCKS_PER_MCU
                ),
            );
        }

        debug!(
            "MCU grid {0}x{1}, {2} blocks per MCU",
            self.mcus_per_row, self.mcu_rows, blocks_per_mcu
        );

        Ok(())
    }
}

fn ensure_space(segment: &[u8], base: usize, hpos: usize, amount: usize) -> Result<()> {
    if hpos + amount > segment.len() {
        return err_at(
            ErrorKind::TruncatedSegment,
            base + hpos,
            "segment shorter than its fixed fields",
        );
    }

    Ok(())
}
