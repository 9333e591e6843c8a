/*---------------------------------------------------------------------------------------------
 *  Copyright (c) Microsoft Corporation. All rights reserved.
 *  Licensed under the Apache License, Version 2.0. See LICENSE.txt in the project root for license information.
 *  This software incorporates material from third parties. See NOTICE.txt for details.
 *--------------------------------------------------------------------------------------------*/

use std::io::Write;

use crate::image::{ColorSpace, Image};

/// Serializes an image as binary PPM (P6): the ASCII header
/// `P6\n<W> <H>\n255\n` followed by R,G,B interleaved rows, top to bottom,
/// with no trailing newline. A luma image is replicated across the three
/// channels.
pub fn write_ppm(image: &Image) -> Vec<u8> {
    let mut out = Vec::with_capacity(
        20 + 3 * usize::from(image.width) * usize::from(image.height),
    );

    // writing into a Vec cannot fail
    write_ppm_to(image, &mut out).unwrap();
    out
}

/// Streaming variant of [`write_ppm`]; fails only on downstream write
/// errors.
pub fn write_ppm_to<W: Write>(image: &Image, writer: &mut W) -> std::io::Result<()> {
    write!(writer, "P6\n{0} {1}\n255\n", image.width, image.height)?;

    match image.color {
        ColorSpace::Rgb => writer.write_all(&image.data)?,
        ColorSpace::Luma => {
            for &luma in &image.data {
                writer.write_all(&[luma, luma, luma])?;
            }
        }
    }

    Ok(())
}

/// Emits a luma image as PGM (P5), the single-channel sibling of P6.
/// Only monochrome images carry a luma plane; anything else is refused.
pub fn write_pgm_to<W: Write>(image: &Image, writer: &mut W) -> std::io::Result<()> {
    if image.color != ColorSpace::Luma {
        return Err(std::io::Error::new(
            std::io::ErrorKind::InvalidInput,
            "PGM output requires a monochrome image",
        ));
    }

    write!(writer, "P5\n{0} {1}\n255\n", image.width, image.height)?;
    writer.write_all(&image.data)?;

    Ok(())
}
