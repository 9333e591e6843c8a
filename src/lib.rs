/*---------------------------------------------------------------------------------------------
 *  Copyright (c) Microsoft Corporation. All rights reserved.
 *  Licensed under the Apache License, Version 2.0. See LICENSE.txt in the project root for license information.
 *  This software incorporates material from third parties. See NOTICE.txt for details.
 *--------------------------------------------------------------------------------------------*/

// Don't allow any unsafe code by default. Since this code has to potentially deal with
// badly/maliciously formatted images, we want this extra level of safety.
#![forbid(unsafe_code)]
#![forbid(trivial_numeric_casts)]

mod consts;
mod helpers;
mod image;
mod jpeg;
mod jpeg_code;
mod ppm;

pub mod jpeg_error;

use log::debug;

pub use image::{ColorSpace, Image};
pub use jpeg_error::{ErrorKind, JpegError, TableKind};
pub use ppm::{write_pgm_to, write_ppm, write_ppm_to};

use crate::jpeg::byte_reader::ByteReader;
use crate::jpeg::jpeg_header::JpegHeader;
use crate::jpeg::scan_decode::decode_scan;
use crate::jpeg_error::{err_at, AddContext, Result};

/// Decodes a complete baseline JFIF/JPEG byte stream into a raster of
/// 8-bit samples: RGB interleaved for colour images, a single luma plane
/// for grayscale ones.
///
/// The input must be the whole file; the decoder never does I/O. Anything
/// outside baseline sequential 8-bit coding is rejected with an error that
/// names the failure and the byte offset it was detected at.
pub fn decode(data: &[u8]) -> Result<Image> {
    let mut reader = ByteReader::new(data);

    let mut header = JpegHeader::default();
    header.parse_to_scan(&mut reader).context()?;

    let planes = decode_scan(&header, &mut reader).context()?;

    expect_end_of_image(&mut reader).context()?;

    let image = image::assemble_image(&header, &planes);

    debug!(
        "decoded {0}x{1} with {2} component(s)",
        image.width,
        image.height,
        image.num_components()
    );

    Ok(image)
}

/// After the last MCU only restart markers and fill bytes may precede the
/// EOI marker.
fn expect_end_of_image(reader: &mut ByteReader) -> Result<()> {
    loop {
        let offset = reader.position();

        let prefix = reader.read_u8()?;
        if prefix != 0xFF {
            return err_at(
                ErrorKind::UnknownMarker(prefix),
                offset,
                format!("stray byte {0:02x} after scan data", prefix),
            );
        }

        let mut btype = reader.read_u8()?;
        while btype == 0xFF {
            btype = reader.read_u8()?;
        }

        match btype {
            jpeg_code::EOI => return Ok(()),
            // stray restart markers between the last MCU and EOI carry no
            // data and are skipped
            jpeg_code::RST0..=jpeg_code::RST7 => {}
            _ => {
                return err_at(
                    ErrorKind::UnknownMarker(btype),
                    offset,
                    format!("expected EOI after scan data, found ff{0:02x}", btype),
                );
            }
        }
    }
}
