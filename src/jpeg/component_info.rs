/*---------------------------------------------------------------------------------------------
 *  Copyright (c) Microsoft Corporation. All rights reserved.
 *  Licensed under the Apache License, Version 2.0. See LICENSE.txt in the project root for license information.
 *  This software incorporates material from third parties. See NOTICE.txt for details.
 *--------------------------------------------------------------------------------------------*/

#[derive(Debug, Clone)]
pub struct ComponentInfo {
    /// jpeg internal id from the frame header
    pub jid: u8,

    /// quantization table selector
    pub q_table_index: u8,

    /// no of huffman table (DC), set by the scan header
    pub huff_dc: u8,

    /// no of huffman table (AC), set by the scan header
    pub huff_ac: u8,

    /// sample factor horizontal
    pub sfh: u32,

    /// sample factor vertical
    pub sfv: u32,

    /// blocks in mcu
    pub mbs: u32,

    /// block count horizontal (interleaved)
    pub bch: u32,

    /// block count vertical (interleaved)
    pub bcv: u32,
}

impl Default for ComponentInfo {
    fn default() -> ComponentInfo {
        return ComponentInfo {
            jid: 0xff,
            q_table_index: 0xff,
            huff_dc: 0xff,
            huff_ac: 0xff,
            sfh: 0,
            sfv: 0,
            mbs: 0,
            bch: 0,
            bcv: 0,
        };
    }
}
