/*---------------------------------------------------------------------------------------------
 *  Copyright (c) Microsoft Corporation. All rights reserved.
 *  Licensed under the Apache License, Version 2.0. See LICENSE.txt in the project root for license information.
 *  This software incorporates material from third parties. See NOTICE.txt for details.
 *--------------------------------------------------------------------------------------------*/

use std::fmt::Display;
use std::io::ErrorKind as IoErrorKind;

/// Identifies which table class a [`ErrorKind::MissingTable`] refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableKind {
    Quantization,
    HuffmanDc,
    HuffmanAc,
}

impl Display for TableKind {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            TableKind::Quantization => write!(f, "quantization"),
            TableKind::HuffmanDc => write!(f, "DC Huffman"),
            TableKind::HuffmanAc => write!(f, "AC Huffman"),
        }
    }
}

/// Well-defined failure classes for everything that can go wrong while
/// decoding. Every error is fatal for the current decode; no partial
/// raster is ever returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum ErrorKind {
    /// Input does not start with the SOI marker at offset 0.
    NotJpeg,

    /// A read ran past the end of the input buffer.
    UnexpectedEof,

    /// A segment length field is inconsistent with the segment contents.
    TruncatedSegment,

    /// A coding mode outside baseline sequential 8-bit (SOF0 with 1 or 3
    /// components), e.g. progressive or arithmetic-coded images.
    UnsupportedMode,

    /// A marker byte outside the recognized set while parsing headers.
    UnknownMarker(u8),

    /// The scan references a table that was never defined.
    MissingTable(TableKind, u8),

    /// A DHT segment defines more than 256 symbols or assigns more codes
    /// to a bit length than that length can hold.
    InvalidHuffmanTable,

    /// The entropy-coded data is malformed: Huffman lookup miss, invalid
    /// coefficient category, or a zero run past the end of a block.
    InvalidBitstream,

    /// An expected RSTm marker was absent or carried the wrong index.
    RestartOutOfSync,

    /// An invariant that should be unreachable was violated.
    InternalError,
}

impl Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{:?}", self)
    }
}

impl ErrorKind {
    /// Converts the kind into an integer for use as a process exit code.
    pub fn as_integer_error_code(self) -> i32 {
        match self {
            ErrorKind::NotJpeg => 1,
            ErrorKind::UnexpectedEof => 2,
            ErrorKind::TruncatedSegment => 3,
            ErrorKind::UnsupportedMode => 4,
            ErrorKind::UnknownMarker(_) => 5,
            ErrorKind::MissingTable(_, _) => 6,
            ErrorKind::InvalidHuffmanTable => 7,
            ErrorKind::InvalidBitstream => 8,
            ErrorKind::RestartOutOfSync => 9,
            ErrorKind::InternalError => 10,
        }
    }
}

/// Since errors are rare and stop everything, we want them to be as lightweight as possible.
#[derive(Debug, Clone)]
struct JpegErrorInternal {
    kind: ErrorKind,
    offset: usize,
    message: String,
}

/// Standard error returned by the decoder: a failure kind plus the byte
/// offset in the input at which it was detected.
#[derive(Debug, Clone)]
pub struct JpegError {
    i: Box<JpegErrorInternal>,
}

pub type Result<T> = std::result::Result<T, JpegError>;

impl Display for JpegError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{0} at offset {1}: {2}",
            self.i.kind, self.i.offset, self.i.message
        )
    }
}

impl JpegError {
    pub fn new(kind: ErrorKind, offset: usize, message: impl AsRef<str>) -> JpegError {
        JpegError {
            i: Box::new(JpegErrorInternal {
                kind,
                offset,
                message: message.as_ref().to_owned(),
            }),
        }
    }

    /// Returns the failure kind used to classify the error.
    pub fn kind(&self) -> ErrorKind {
        self.i.kind
    }

    /// Returns the byte offset in the input at which the error was detected.
    pub fn offset(&self) -> usize {
        self.i.offset
    }

    /// Returns the human-readable description of the error.
    pub fn message(&self) -> &str {
        &self.i.message
    }

    /// Adds context to the error by appending the current location in the code. This
    /// allows for building a callstack of where the error occurred.
    #[cold]
    #[inline(never)]
    #[track_caller]
    pub fn add_context(&mut self) {
        self.i
            .message
            .push_str(&format!("\n at {}", std::panic::Location::caller()));
    }
}

#[cold]
#[track_caller]
pub fn err_at<T>(kind: ErrorKind, offset: usize, message: impl AsRef<str>) -> Result<T> {
    let mut e = JpegError::new(kind, offset, message.as_ref());
    e.add_context();
    return Err(e);
}

pub trait AddContext<T> {
    #[track_caller]
    fn context(self) -> Result<T>;
}

impl<T, E: Into<JpegError>> AddContext<T> for std::result::Result<T, E> {
    #[track_caller]
    fn context(self) -> Result<T> {
        match self {
            Ok(x) => Ok(x),
            Err(e) => {
                let mut e = e.into();
                e.add_context();
                Err(e)
            }
        }
    }
}

impl std::error::Error for JpegError {}

/// translates std::io::Error into JpegError (used by the CLI wrapper; the
/// decoder itself never does I/O)
impl From<std::io::Error> for JpegError {
    #[track_caller]
    fn from(e: std::io::Error) -> Self {
        let kind = if e.kind() == IoErrorKind::UnexpectedEof {
            ErrorKind::UnexpectedEof
        } else {
            ErrorKind::InternalError
        };
        let mut e = JpegError::new(kind, 0, e.to_string());
        e.add_context();
        e
    }
}

#[test]
fn test_error_accessors() {
    let e = JpegError::new(ErrorKind::UnknownMarker(0xC8), 42, "test error");
    assert_eq!(e.kind(), ErrorKind::UnknownMarker(0xC8));
    assert_eq!(e.offset(), 42);
    assert_eq!(e.message(), "test error");

    // an IO error that is not EOF maps to an internal error
    let e: JpegError = std::io::Error::new(IoErrorKind::NotFound, "file not found").into();
    assert_eq!(e.kind(), ErrorKind::InternalError);
}
