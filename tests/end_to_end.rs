/*---------------------------------------------------------------------------------------------
 *  Copyright (c) Microsoft Corporation. All rights reserved.
 *  Licensed under the Apache License, Version 2.0. See LICENSE.txt in the project root for license information.
 *  This software incorporates material from third parties. See NOTICE.txt for details.
 *--------------------------------------------------------------------------------------------*/

use jpeg2ppm::jpeg_error::{ErrorKind, TableKind};
use jpeg2ppm::{decode, write_ppm, ColorSpace};

use rstest::rstest;

// ---------------------------------------------------------------------
// minimal JPEG builder: enough of an encoder to produce valid baseline
// streams with known coefficients
// ---------------------------------------------------------------------

/// DC table: twelve 4-bit codes, so the code for category T is T itself.
const DC_COUNTS: [u8; 16] = [0, 0, 0, 12, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0];
const DC_SYMBOLS: [u8; 12] = [0, 1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11];

/// AC table: 00 = EOB, 01 = (run 0, category 1), 100 = 0x11, 101 = ZRL.
const AC_COUNTS: [u8; 16] = [0, 2, 2, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0];
const AC_SYMBOLS: [u8; 4] = [0x00, 0x01, 0x11, 0xF0];

struct BitWriter {
    out: Vec<u8>,
    acc: u32,
    nbits: u32,
}

impl BitWriter {
    fn new() -> Self {
        BitWriter {
            out: Vec::new(),
            acc: 0,
            nbits: 0,
        }
    }

    fn put(&mut self, value: u16, bits: u32) {
        for i in (0..bits).rev() {
            self.acc = (self.acc << 1) | u32::from((value >> i) & 1);
            self.nbits += 1;
            if self.nbits == 8 {
                let b = self.acc as u8;
                self.out.push(b);
                // scan data escapes 0xff with a stuffed zero
                if b == 0xFF {
                    self.out.push(0x00);
                }
                self.acc = 0;
                self.nbits = 0;
            }
        }
    }

    /// fill the current byte with 1-bits, the padding real encoders use
    fn pad(&mut self) {
        while self.nbits != 0 {
            self.put(1, 1);
        }
    }
}

fn category(diff: i16) -> u8 {
    if diff == 0 {
        0
    } else {
        (16 - diff.unsigned_abs().leading_zeros()) as u8
    }
}

fn value_bits(diff: i16, t: u8) -> u16 {
    if diff >= 0 {
        diff as u16
    } else {
        (diff + ((1 << t) - 1)) as u16
    }
}

/// one block: DC difference, then end-of-block. `dc_code_len` is the code
/// length of the DC table in use (the test tables assign code T to
/// category T, either 4 or 8 bits wide).
fn encode_dc_only_block(bw: &mut BitWriter, diff: i16, dc_code_len: u32) {
    let t = category(diff);
    bw.put(u16::from(t), dc_code_len);
    bw.put(value_bits(diff, t), u32::from(t));
    bw.put(0b00, 2); // EOB
}

fn segment(out: &mut Vec<u8>, marker: u8, payload: &[u8]) {
    out.push(0xFF);
    out.push(marker);
    let len = (payload.len() + 2) as u16;
    out.push((len >> 8) as u8);
    out.push((len & 0xFF) as u8);
    out.extend_from_slice(payload);
}

fn dqt_all_ones(out: &mut Vec<u8>) {
    let mut payload = vec![0x00]; // Pq=0, Tq=0
    payload.extend_from_slice(&[1u8; 64]);
    segment(out, 0xDB, &payload);
}

fn dht(out: &mut Vec<u8>, class: u8, id: u8, counts: &[u8; 16], symbols: &[u8]) {
    let mut payload = vec![(class << 4) | id];
    payload.extend_from_slice(counts);
    payload.extend_from_slice(symbols);
    segment(out, 0xC4, &payload);
}

fn sof0(out: &mut Vec<u8>, width: u16, height: u16, comps: &[(u8, u8, u8)]) {
    let mut payload = vec![
        8,
        (height >> 8) as u8,
        (height & 0xFF) as u8,
        (width >> 8) as u8,
        (width & 0xFF) as u8,
        comps.len() as u8,
    ];
    for &(id, h, v) in comps {
        payload.push(id);
        payload.push((h << 4) | v);
        payload.push(0); // quantization table 0
    }
    segment(out, 0xC0, &payload);
}

fn sos(out: &mut Vec<u8>, comps: &[u8]) {
    let mut payload = vec![comps.len() as u8];
    for &id in comps {
        payload.push(id);
        payload.push(0x00); // DC table 0, AC table 0
    }
    payload.extend_from_slice(&[0, 63, 0]);
    segment(out, 0xDA, &payload);
}

fn standard_header(out: &mut Vec<u8>, width: u16, height: u16, comps: &[(u8, u8, u8)]) {
    out.extend_from_slice(&[0xFF, 0xD8]); // SOI
    segment(
        out,
        0xE0,
        &[
            b'J', b'F', b'I', b'F', 0, 1, 1, 0, 0, 1, 0, 1, 0, 0,
        ],
    );
    // a comment and an opaque APP1 payload, both skipped by length
    segment(out, 0xFE, b"no comment");
    segment(out, 0xE1, &[0xAA; 8]);
    dqt_all_ones(out);
    dht(out, 0, 0, &DC_COUNTS, &DC_SYMBOLS);
    dht(out, 1, 0, &AC_COUNTS, &AC_SYMBOLS);
    sof0(out, width, height, comps);
    sos(out, &comps.iter().map(|c| c.0).collect::<Vec<u8>>());
}

/// a complete image where every block is DC-only; diffs are consumed in
/// MCU interleave order
fn dc_only_jpeg(width: u16, height: u16, comps: &[(u8, u8, u8)], diffs: &[i16]) -> Vec<u8> {
    let mut out = Vec::new();
    standard_header(&mut out, width, height, comps);

    let mut bw = BitWriter::new();
    for &d in diffs {
        encode_dc_only_block(&mut bw, d, 4);
    }
    bw.pad();
    out.extend_from_slice(&bw.out);

    out.extend_from_slice(&[0xFF, 0xD9]); // EOI
    out
}

/// local replica of the JFIF conversion for computing expected rasters
fn ycbcr(y: u8, cb: u8, cr: u8) -> (u8, u8, u8) {
    let y = f32::from(y);
    let cb = f32::from(cb) - 128.0;
    let cr = f32::from(cr) - 128.0;
    let clamp = |v: f32| (v + 0.5).max(0.0).min(255.0) as u8;
    (
        clamp(y + 1.402 * cr),
        clamp(y - 0.344136 * cb - 0.714136 * cr),
        clamp(y + 1.772 * cb),
    )
}

// ---------------------------------------------------------------------
// scenarios
// ---------------------------------------------------------------------

/// 1x1 grayscale, single DC=0 block: the smallest possible decode
#[test]
fn minimal_grayscale() {
    let jpeg = dc_only_jpeg(1, 1, &[(1, 1, 1)], &[0]);

    let image = decode(&jpeg).unwrap();
    assert_eq!(image.width, 1);
    assert_eq!(image.height, 1);
    assert_eq!(image.color, ColorSpace::Luma);
    assert_eq!(image.data, vec![128]);

    let ppm = write_ppm(&image);
    assert_eq!(ppm, b"P6\n1 1\n255\n\x80\x80\x80");
}

/// 8x8 4:4:4 colour: one MCU of three flat blocks decodes to mid grey
#[test]
fn flat_gray_444() {
    let jpeg = dc_only_jpeg(8, 8, &[(1, 1, 1), (2, 1, 1), (3, 1, 1)], &[0, 0, 0]);

    let image = decode(&jpeg).unwrap();
    assert_eq!(image.width, 8);
    assert_eq!(image.height, 8);
    assert_eq!(image.color, ColorSpace::Rgb);
    assert_eq!(image.data, vec![128u8; 3 * 64]);
}

/// every supported chroma layout decodes a flat image to flat grey, with
/// the padded margin cropped away
#[rstest]
fn flat_gray_all_samplings(
    #[values((1, 1), (2, 1), (2, 2), (4, 1), (1, 2), (4, 2))] luma_sampling: (u8, u8),
) {
    let (h, v) = luma_sampling;

    // dimensions that do not fall on MCU boundaries exercise cropping
    let width = 8 * u16::from(h) + 5;
    let height = 8 * u16::from(v) + 3;

    // 2x2 MCU grid, all coefficients zero
    let blocks_per_mcu = usize::from(h) * usize::from(v) + 2;
    let diffs = vec![0i16; 4 * blocks_per_mcu];

    let jpeg = dc_only_jpeg(
        width,
        height,
        &[(1, h, v), (2, 1, 1), (3, 1, 1)],
        &diffs,
    );

    let image = decode(&jpeg).unwrap();
    assert_eq!(image.width, width);
    assert_eq!(image.height, height);
    assert_eq!(
        image.data,
        vec![128u8; 3 * usize::from(width) * usize::from(height)]
    );
}

/// 16x16 4:2:0 with known DC values per block: the full pipeline
/// (prediction, dequantization, IDCT, upsampling, conversion) must hit an
/// exactly predictable raster
#[test]
fn known_raster_420() {
    // Y blocks (raster order in the MCU): 64, 64, 0, 0 after prediction;
    // chroma offsets push Cb to 130 and Cr to 126
    let diffs = [64i16, 0, -64, 0, 16, -16];
    let jpeg = dc_only_jpeg(16, 16, &[(1, 2, 2), (2, 1, 1), (3, 1, 1)], &diffs);

    let image = decode(&jpeg).unwrap();
    assert_eq!(image.width, 16);
    assert_eq!(image.height, 16);
    assert_eq!(image.data.len(), 3 * 16 * 16);

    let mut expected = Vec::new();
    for y in 0..16 {
        for _x in 0..16 {
            let luma = if y < 8 { 136 } else { 128 };
            let (r, g, b) = ycbcr(luma, 130, 126);
            expected.extend_from_slice(&[r, g, b]);
        }
    }

    assert_eq!(image.data, expected);
}

/// restart markers reset the DC predictors, so identical per-interval
/// diffs produce identical intervals
#[test]
fn restart_resets_dc_predictors() {
    let mut out = Vec::new();
    standard_header_with_dri(&mut out, 16, 8, 1);

    let mut bw = BitWriter::new();
    encode_dc_only_block(&mut bw, 64, 4);
    bw.pad();
    out.extend_from_slice(&bw.out);

    out.extend_from_slice(&[0xFF, 0xD0]); // RST0

    let mut bw = BitWriter::new();
    encode_dc_only_block(&mut bw, 64, 4);
    bw.pad();
    out.extend_from_slice(&bw.out);

    out.extend_from_slice(&[0xFF, 0xD9]);

    let image = decode(&out).unwrap();
    // without the reset the second MCU would decode to 144
    assert_eq!(image.data, vec![136u8; 16 * 8]);
}

fn standard_header_with_dri(out: &mut Vec<u8>, width: u16, height: u16, ri: u16) {
    out.extend_from_slice(&[0xFF, 0xD8]);
    dqt_all_ones(out);
    dht(out, 0, 0, &DC_COUNTS, &DC_SYMBOLS);
    dht(out, 1, 0, &AC_COUNTS, &AC_SYMBOLS);
    sof0(out, width, height, &[(1, 1, 1)]);
    segment(out, 0xDD, &[(ri >> 8) as u8, (ri & 0xFF) as u8]);
    sos(out, &[1]);
}

/// a wrong restart index is out of sync, not silently accepted
#[test]
fn corrupted_restart_marker() {
    let mut out = Vec::new();
    standard_header_with_dri(&mut out, 16, 8, 1);

    let mut bw = BitWriter::new();
    encode_dc_only_block(&mut bw, 64, 4);
    bw.pad();
    out.extend_from_slice(&bw.out);

    out.extend_from_slice(&[0xFF, 0xD3]); // should have been RST0

    let mut bw = BitWriter::new();
    encode_dc_only_block(&mut bw, 64, 4);
    bw.pad();
    out.extend_from_slice(&bw.out);

    out.extend_from_slice(&[0xFF, 0xD9]);

    let e = decode(&out).unwrap_err();
    assert_eq!(e.kind(), ErrorKind::RestartOutOfSync);
}

/// 0xff bytes inside the entropy stream arrive escaped and must decode
/// transparently
#[test]
fn byte_stuffing_in_scan_data() {
    // an 8-bit DC code table makes the eleven value bits of category 11
    // line up into a full 0xff byte
    let mut wide_dc_counts = [0u8; 16];
    wide_dc_counts[7] = 12;

    let mut out = Vec::new();
    out.extend_from_slice(&[0xFF, 0xD8]);
    dqt_all_ones(&mut out);
    dht(&mut out, 0, 0, &wide_dc_counts, &DC_SYMBOLS);
    dht(&mut out, 1, 0, &AC_COUNTS, &AC_SYMBOLS);
    sof0(&mut out, 8, 8, &[(1, 1, 1)]);
    sos(&mut out, &[1]);

    let mut bw = BitWriter::new();
    encode_dc_only_block(&mut bw, 2047, 8);
    bw.pad();
    // the writer must have produced an escaped 0xff
    assert!(bw.out.windows(2).any(|w| w == [0xFF, 0x00]));
    out.extend_from_slice(&bw.out);

    out.extend_from_slice(&[0xFF, 0xD9]);

    let image = decode(&out).unwrap();
    // DC 2047 saturates the tile
    assert_eq!(image.data, vec![255u8; 64]);
}

/// an AC table whose only code (EOB) is nine bits long forces the decoder
/// off the direct lookup and through the canonical code ranges
#[test]
fn long_huffman_codes_decode_via_ranges() {
    let mut long_ac_counts = [0u8; 16];
    long_ac_counts[8] = 1;

    let mut out = Vec::new();
    out.extend_from_slice(&[0xFF, 0xD8]);
    dqt_all_ones(&mut out);
    dht(&mut out, 0, 0, &DC_COUNTS, &DC_SYMBOLS);
    dht(&mut out, 1, 0, &long_ac_counts, &[0x00]);
    sof0(&mut out, 8, 8, &[(1, 1, 1)]);
    sos(&mut out, &[1]);

    let mut bw = BitWriter::new();
    bw.put(0, 4); // DC category 0
    bw.put(0, 9); // nine-bit EOB
    bw.pad();
    out.extend_from_slice(&bw.out);

    out.extend_from_slice(&[0xFF, 0xD9]);

    let image = decode(&out).unwrap();
    assert_eq!(image.data, vec![128u8; 64]);
}

// ---------------------------------------------------------------------
// failure cases
// ---------------------------------------------------------------------

#[test]
fn not_a_jpeg() {
    let e = decode(b"not a jpeg at all").unwrap_err();
    assert_eq!(e.kind(), ErrorKind::NotJpeg);
    assert_eq!(e.offset(), 0);

    let e = decode(&[]).unwrap_err();
    assert_eq!(e.kind(), ErrorKind::NotJpeg);
}

/// scenario: DQT with its final coefficient byte removed
#[test]
fn truncated_dqt() {
    let mut out = Vec::new();
    out.extend_from_slice(&[0xFF, 0xD8]);

    let mut payload = vec![0x00];
    payload.extend_from_slice(&[1u8; 63]); // one value short
    segment(&mut out, 0xDB, &payload);

    let e = decode(&out).unwrap_err();
    assert_eq!(e.kind(), ErrorKind::TruncatedSegment);
}

/// scenario: progressive input is detected and refused outright
#[test]
fn progressive_is_unsupported() {
    let mut out = Vec::new();
    out.extend_from_slice(&[0xFF, 0xD8]);
    dqt_all_ones(&mut out);

    // SOF2 with an otherwise plausible payload
    let payload = [8u8, 0, 16, 0, 16, 1, 1, 0x11, 0];
    segment(&mut out, 0xC2, &payload);

    let e = decode(&out).unwrap_err();
    assert_eq!(e.kind(), ErrorKind::UnsupportedMode);
}

#[test]
fn twelve_bit_precision_is_unsupported() {
    let mut out = Vec::new();
    out.extend_from_slice(&[0xFF, 0xD8]);
    segment(&mut out, 0xC0, &[12u8, 0, 16, 0, 16, 1, 1, 0x11, 0]);

    let e = decode(&out).unwrap_err();
    assert_eq!(e.kind(), ErrorKind::UnsupportedMode);
}

/// the scan names AC table 0 which was never defined
#[test]
fn missing_huffman_table() {
    let mut out = Vec::new();
    out.extend_from_slice(&[0xFF, 0xD8]);
    dqt_all_ones(&mut out);
    dht(&mut out, 0, 0, &DC_COUNTS, &DC_SYMBOLS);
    // no AC table
    sof0(&mut out, 8, 8, &[(1, 1, 1)]);
    sos(&mut out, &[1]);

    let e = decode(&out).unwrap_err();
    assert_eq!(e.kind(), ErrorKind::MissingTable(TableKind::HuffmanAc, 0));
}

#[test]
fn missing_quantization_table() {
    let mut out = Vec::new();
    out.extend_from_slice(&[0xFF, 0xD8]);
    dht(&mut out, 0, 0, &DC_COUNTS, &DC_SYMBOLS);
    dht(&mut out, 1, 0, &AC_COUNTS, &AC_SYMBOLS);
    sof0(&mut out, 8, 8, &[(1, 1, 1)]);
    sos(&mut out, &[1]);

    let e = decode(&out).unwrap_err();
    assert_eq!(
        e.kind(),
        ErrorKind::MissingTable(TableKind::Quantization, 0)
    );
}

#[test]
fn oversubscribed_huffman_lengths() {
    let mut out = Vec::new();
    out.extend_from_slice(&[0xFF, 0xD8]);

    let mut counts = [0u8; 16];
    counts[0] = 3; // three 1-bit codes cannot exist
    dht(&mut out, 0, 0, &counts, &[1, 2, 3]);

    let e = decode(&out).unwrap_err();
    assert_eq!(e.kind(), ErrorKind::InvalidHuffmanTable);
}

#[test]
fn unknown_marker_in_header() {
    let mut out = Vec::new();
    out.extend_from_slice(&[0xFF, 0xD8]);
    out.extend_from_slice(&[0xFF, 0xC8]); // reserved JPG marker

    let e = decode(&out).unwrap_err();
    assert_eq!(e.kind(), ErrorKind::UnknownMarker(0xC8));
}

#[test]
fn truncated_scan_data() {
    let mut jpeg = dc_only_jpeg(1, 1, &[(1, 1, 1)], &[0]);
    jpeg.truncate(jpeg.len() - 3); // drop the scan byte and EOI

    let e = decode(&jpeg).unwrap_err();
    assert_eq!(e.kind(), ErrorKind::UnexpectedEof);
}

#[test]
fn mcu_block_limit_enforced() {
    // 4x4 luma sampling plus two chroma blocks is 18 blocks per MCU,
    // beyond the baseline limit of 10
    let jpeg = dc_only_jpeg(8, 8, &[(1, 4, 4), (2, 1, 1), (3, 1, 1)], &[0]);

    let e = decode(&jpeg).unwrap_err();
    assert_eq!(e.kind(), ErrorKind::UnsupportedMode);
}

/// a second component count (two) is outside the supported set {1, 3}
#[test]
fn two_component_frame_rejected() {
    let jpeg = dc_only_jpeg(8, 8, &[(1, 1, 1), (2, 1, 1)], &[0, 0]);

    let e = decode(&jpeg).unwrap_err();
    assert_eq!(e.kind(), ErrorKind::UnsupportedMode);
}
