// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Header parsing traits

use std::num::NonZero;

/// A header which can be read from the front of a buffer.
pub trait Parse: Sized {
    /// Error returned when the buffer holds an illegal header.
    type Error: core::error::Error;
    /// Parse from a buffer.
    ///
    /// Returns the parsed value and the number of bytes it occupied.
    ///
    /// # Errors
    ///
    /// Returns an error in the event that parsing fails.
    fn parse(buf: &[u8]) -> Result<(Self, NonZero<usize>), ParseError<Self::Error>>;
}

/// A header which can be written to the front of a buffer.
pub trait DeParse {
    /// Error returned if serialization fails for reasons other than buffer length.
    type Error;

    /// Number of bytes [`DeParse::deparse`] will write.
    fn size(&self) -> NonZero<usize>;

    /// Write a data structure (e.g., a packet header) to a buffer.
    ///
    /// Returns the number of bytes written in the event of success.
    ///
    /// # Errors
    ///
    /// Will return an error if there is not enough space in the buffer
    /// or if serialization fails from some other (implementation-dependent) reason.
    fn deparse(&self, buf: &mut [u8]) -> Result<NonZero<usize>, DeParseError<Self::Error>>;
}

/// The buffer was shorter than the header requires.
#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("expected at least {expected} bytes, got {actual}")]
pub struct LengthError {
    pub(crate) expected: NonZero<usize>,
    pub(crate) actual: usize,
}

impl LengthError {
    /// Number of bytes the header needed.
    #[must_use]
    pub fn expected(&self) -> NonZero<usize> {
        self.expected
    }

    /// Number of bytes that were available.
    #[must_use]
    pub fn actual(&self) -> usize {
        self.actual
    }
}

/// Errors which may occur while parsing a header.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError<E: core::error::Error> {
    /// The buffer was too short.
    #[error(transparent)]
    Length(LengthError),
    /// The buffer held an illegal header.
    #[error(transparent)]
    Invalid(E),
}

/// Errors which may occur while writing a header.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum DeParseError<E> {
    /// The buffer was too short.
    #[error(transparent)]
    Length(LengthError),
    /// The header could not be serialized.
    #[error("invalid header")]
    Invalid(E),
}
