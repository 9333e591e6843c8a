/*---------------------------------------------------------------------------------------------
 *  Copyright (c) Microsoft Corporation. All rights reserved.
 *  Licensed under the Apache License, Version 2.0. See LICENSE.txt in the project root for license information.
 *  This software incorporates material from third parties. See NOTICE.txt for details.
 *--------------------------------------------------------------------------------------------*/

pub const RASTER_TO_ZIGZAG: [u8; 64] = [
    0, 1, 5, 6, 14, 15, 27, 28, 2, 4, 7, 13, 16, 26, 29, 42, 3, 8, 12, 17, 25, 30, 41, 43, 9, 11,
    18, 24, 31, 40, 44, 53, 10, 19, 23, 32, 39, 45, 52, 54, 20, 22, 33, 38, 46, 51, 55, 60, 21, 34,
    37, 47, 50, 56, 59, 61, 35, 36, 48, 49, 57, 58, 62, 63,
];

pub const ZIGZAG_TO_TRANSPOSED: [u8; 64] = [
    0, 8, 1, 2, 9, 16, 24, 17, 10, 3, 4, 11, 18, 25, 32, 40, 33, 26, 19, 12, 5, 6, 13, 20, 27, 34,
    41, 48, 56, 49, 42, 35, 28, 21, 14, 7, 15, 22, 29, 36, 43, 50, 57, 58, 51, 44, 37, 30, 23, 31,
    38, 45, 52, 59, 60, 53, 46, 39, 47, 54, 61, 62, 55, 63,
];

/// Baseline limit on the number of 8x8 blocks a single MCU may carry
/// across all components (B.2.3 of the JPEG standard).
pub const MAX_BLOCKS_PER_MCU: u32 = 10;

/// Highest DC coefficient category for 8-bit baseline data.
pub const MAX_DC_CATEGORY: u8 = 11;

/// Highest AC coefficient category for 8-bit baseline data.
pub const MAX_AC_CATEGORY: u8 = 10;

#[cfg(test)]
mod tests {
    use super::*;

    // the two permutations must agree: walking raster order through
    // RASTER_TO_ZIGZAG and then back through ZIGZAG_TO_TRANSPOSED has to
    // land on the transposed raster coordinate
    #[test]
    fn zigzag_tables_are_consistent() {
        for row in 0..8 {
            for col in 0..8 {
                let coord = row * 8 + col;
                let zz = RASTER_TO_ZIGZAG[coord] as usize;
                assert_eq!(ZIGZAG_TO_TRANSPOSED[zz] as usize, col * 8 + row);
            }
        }
    }

    #[test]
    fn zigzag_tables_are_permutations() {
        let mut seen = [false; 64];
        for &v in RASTER_TO_ZIGZAG.iter() {
            assert!(!seen[v as usize]);
            seen[v as usize] = true;
        }

        let mut seen = [false; 64];
        for &v in ZIGZAG_TO_TRANSPOSED.iter() {
            assert!(!seen[v as usize]);
            seen[v as usize] = true;
        }
    }
}
