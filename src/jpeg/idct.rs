/*---------------------------------------------------------------------------------------------
 *  Copyright (c) Microsoft Corporation. All rights reserved.
 *  Licensed under the Apache License, Version 2.0. See LICENSE.txt in the project root for license information.
 *  This software incorporates material from third parties. See NOTICE.txt for details.
 *--------------------------------------------------------------------------------------------*/

use wide::i32x8;

// 2048*sqrt(2)*cos(k*pi/16) rounded to integers, the 11-bit fixed-point
// cosine terms of the Wang factorization (see NOTICE.txt)
const C1: i32 = 2841;
const C2: i32 = 2676;
const C3: i32 = 2408;
const C5: i32 = 1609;
const C6: i32 = 1108;
const C7: i32 = 565;

// 256/sqrt(2)
const INV_SQRT2: i32 = 181;

/// Fixed-point layout of one 1-D pass. The row pass spreads the input
/// over 11 fractional bits and hands 3 of them to the column pass, whose
/// output shift folds the whole scale back out to plain sample values.
struct Pass {
    dc_shift: i32,
    dc_bias: i32,
    rot_bias: i32,
    rot_shift: i32,
    out_shift: i32,
}

const ROW_PASS: Pass = Pass {
    dc_shift: 11,
    dc_bias: 128,
    rot_bias: 0,
    rot_shift: 0,
    out_shift: 8,
};

const COL_PASS: Pass = Pass {
    dc_shift: 8,
    dc_bias: 8192,
    rot_bias: 4,
    rot_shift: 3,
    out_shift: 14,
};

/// Rotates a coefficient pair around a shared cosine term:
/// t = k*(a + b), then (t + ca*a, t + cb*b), rounded and rescaled as the
/// pass dictates. ca/cb carry the sign of their combination.
#[inline(always)]
fn rotate_pair(a: i32x8, b: i32x8, k: i32, ca: i32, cb: i32, pass: &Pass) -> (i32x8, i32x8) {
    let t = k * (a + b) + pass.rot_bias;
    ((t + ca * a) >> pass.rot_shift, (t + cb * b) >> pass.rot_shift)
}

/// One 1-D inverse transform applied to all eight lanes at once.
#[inline(always)]
fn transform_lanes(v: &[i32x8; 8], pass: &Pass) -> [i32x8; 8] {
    // even half: DC/4 butterfly plus the 2/6 rotation
    let dc = (v[0] << pass.dc_shift) + pass.dc_bias;
    let mid = v[4] << pass.dc_shift;
    let e_sum = dc + mid;
    let e_diff = dc - mid;
    let (f2, f6) = rotate_pair(v[2], v[6], C6, C2 - C6, -(C2 + C6), pass);

    // odd half: the 1/7 and 5/3 rotations, then their butterflies
    let (o1, o7) = rotate_pair(v[1], v[7], C7, C1 - C7, -(C1 + C7), pass);
    let (o5, o3) = rotate_pair(v[5], v[3], C3, -(C3 - C5), -(C3 + C5), pass);

    let odd0 = o1 + o5;
    let odd3 = o7 + o3;
    let d17 = o1 - o5;
    let d73 = o7 - o3;

    // the two middle odd outputs collapse onto a 1/sqrt(2) scaling, kept
    // at 8 fractional bits in both passes
    let odd1 = (INV_SQRT2 * (d17 + d73) + 128) >> 8;
    let odd2 = (INV_SQRT2 * (d17 - d73) + 128) >> 8;

    // recombine the even half
    let g0 = e_sum + f2;
    let g1 = e_diff + f6;
    let g2 = e_diff - f6;
    let g3 = e_sum - f2;

    // final butterflies, mirrored around the block centre
    [
        (g0 + odd0) >> pass.out_shift,
        (g1 + odd1) >> pass.out_shift,
        (g2 + odd2) >> pass.out_shift,
        (g3 + odd3) >> pass.out_shift,
        (g3 - odd3) >> pass.out_shift,
        (g2 - odd2) >> pass.out_shift,
        (g1 - odd1) >> pass.out_shift,
        (g0 - odd0) >> pass.out_shift,
    ]
}

/// Two-pass integer IDCT over dequantized coefficients in transposed
/// lane layout (one `i32x8` per transposed row, see `CoeffBlock`).
/// Emits the reconstructed 8x8 tile in raster order, level shifted by
/// +128 and clamped to [0, 255].
#[inline(always)]
pub fn run_idct(block: &[i32x8; 8]) -> [u8; 64] {
    let rows = transform_lanes(block, &ROW_PASS);
    let cols = i32x8::transpose(rows);
    let samples = transform_lanes(&cols, &COL_PASS);

    let mut out = [0u8; 64];
    for i in 0..8 {
        let shifted = (samples[i] + 128).max(i32x8::splat(0)).min(i32x8::splat(255));
        let lanes = shifted.to_array();
        for j in 0..8 {
            out[i * 8 + j] = lanes[j] as u8;
        }
    }

    out
}
