/*---------------------------------------------------------------------------------------------
 *  Copyright (c) Microsoft Corporation. All rights reserved.
 *  Licensed under the Apache License, Version 2.0. See LICENSE.txt in the project root for license information.
 *  This software incorporates material from third parties. See NOTICE.txt for details.
 *--------------------------------------------------------------------------------------------*/

use jpeg2ppm::jpeg_error::{ErrorKind, JpegError};
use jpeg2ppm::{decode, write_pgm_to, write_ppm_to, ColorSpace};

use log::{info, warn};
use simple_logger::SimpleLogger;

use std::env;
use std::fs::{File, OpenOptions};
use std::io::{stdin, stdout, IsTerminal, Read, Write};
use std::time::Instant;

// wrap main so that errors get printed nicely without a panic
fn main_with_result() -> Result<(), JpegError> {
    let args: Vec<String> = env::args().collect();

    let mut filenames = Vec::new();
    let mut overwrite = false;
    let mut gray = false;
    let mut filter_level = log::LevelFilter::Info;

    for i in 1..args.len() {
        match args[i].as_str() {
            "-quiet" => {
                filter_level = log::LevelFilter::Warn;
            }
            "-verbose" => {
                filter_level = log::LevelFilter::Debug;
            }
            "-overwrite" => {
                overwrite = true;
            }
            "-gray" => {
                // emit PGM with the raw luma plane instead of PPM
                gray = true;
            }
            "-version" => {
                println!("jpeg2ppm {}", env!("CARGO_PKG_VERSION"));
                return Ok(());
            }
            other => {
                if other.starts_with('-') {
                    return Err(JpegError::new(
                        ErrorKind::InternalError,
                        0,
                        format!("unknown switch {0}", other),
                    ));
                } else {
                    filenames.push(other);
                }
            }
        }
    }

    // only output the log if we are connected to a console (otherwise if
    // there is redirection we would corrupt the file)
    if stdout().is_terminal() {
        SimpleLogger::new().with_level(filter_level).init().unwrap();
    }

    let mut input_data = Vec::new();
    if filenames.is_empty() {
        if stdin().is_terminal() || stdout().is_terminal() {
            return Err(JpegError::new(
                ErrorKind::InternalError,
                0,
                "source and destination filename are needed or input needs to be redirected",
            ));
        }

        stdin().read_to_end(&mut input_data)?;
    } else {
        let mut file_in = File::open(filenames[0])?;
        file_in.read_to_end(&mut input_data)?;
    }

    let walltime = Instant::now();

    let image = decode(&input_data)?;

    info!(
        "decoded {0}x{1} ({2} bytes) in {3} ms",
        image.width,
        image.height,
        input_data.len(),
        walltime.elapsed().as_millis()
    );

    if gray && image.color != ColorSpace::Luma {
        warn!("-gray requested but the image is colour, writing PPM");
    }
    let write_gray = gray && image.color == ColorSpace::Luma;

    if filenames.len() < 2 {
        let mut out = stdout();
        if write_gray {
            write_pgm_to(&image, &mut out)?;
        } else {
            write_ppm_to(&image, &mut out)?;
        }
        out.flush()?;
    } else {
        let mut file_out = OpenOptions::new()
            .write(true)
            .truncate(true)
            .create(overwrite)
            .create_new(!overwrite)
            .open(filenames[1])?;

        if write_gray {
            write_pgm_to(&image, &mut file_out)?;
        } else {
            write_ppm_to(&image, &mut file_out)?;
        }
    }

    Ok(())
}

fn main() {
    match main_with_result() {
        Ok(_) => {}
        Err(e) => {
            eprintln!(
                "error code: {0} {1} {2}",
                e.kind(),
                e.kind().as_integer_error_code(),
                e.message()
            );
            std::process::exit(e.kind().as_integer_error_code());
        }
    }
}
