/*
 * This Source Code Form is subject to the terms of the
 * Mozilla Public License, v. 2.0. If a copy of the MPL
 * was not distributed with this file, You can obtain one at http://mozilla.org/MPL/2.0/.
 */

use std::fmt;

use crate::{block::BlockError, buffer::OutOfMemory};

pub type ScanResult<T> = std::result::Result<T, ScanError>;

/// Fatal errors: any of these abort [`Scanner::run`](super::Scanner::run)
/// immediately rather than being recorded on a processing
/// entry. Maps onto `PYP_READ_ERROR_MEMORY`/`_READ`/`_WRITE` in
/// `original_source/src/PypReader.h` (`_OPEN`/`_DIRECTORY` are
/// file-I/O specific and out of scope for this crate, which
/// never opens files itself).
#[derive(Debug)]
pub enum ScanError
{
    /// An allocation failed somewhere in the scanner's own
    /// bookkeeping (the tag stack, processing stack, or a
    /// region's [`DataBuffer`](crate::buffer::DataBuffer))
    OutOfMemory,

    /// The underlying byte source returned an error
    Read(BlockError),

    /// A [`Transform`](crate::transform::Transform) reported
    /// [`TransformStatus::ErrorMemory`](crate::transform::TransformStatus::ErrorMemory)
    /// or
    /// [`TransformStatus::ErrorWrite`](crate::transform::TransformStatus::ErrorWrite)
    TransformFailed(TransformFailure),

    /// [`Scanner::run`](super::Scanner::run)'s output writer
    /// returned an error
    Write(std::io::Error),
}

/// Which of a [`Transform`](crate::transform::Transform)'s two
/// fatal statuses was returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransformFailure
{
    Memory,
    Write,
}

impl fmt::Display for ScanError
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        match self
        {
            ScanError::OutOfMemory => f.write_str("out of memory while scanning"),
            ScanError::Read(e) => write!(f, "{}", e),
            ScanError::TransformFailed(TransformFailure::Memory) =>
            {
                f.write_str("a transform could not allocate the memory it needed")
            },
            ScanError::TransformFailed(TransformFailure::Write) =>
            {
                f.write_str("a transform failed to write its output")
            },
            ScanError::Write(e) => write!(f, "{}", e),
        }
    }
}

impl std::error::Error for ScanError
{
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)>
    {
        match self
        {
            ScanError::Read(e) => Some(e),
            ScanError::Write(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for ScanError
{
    fn from(e: std::io::Error) -> Self
    {
        ScanError::Write(e)
    }
}

impl From<OutOfMemory> for ScanError
{
    fn from(_: OutOfMemory) -> Self
    {
        ScanError::OutOfMemory
    }
}

impl From<BlockError> for ScanError
{
    fn from(e: BlockError) -> Self
    {
        ScanError::Read(e)
    }
}

impl From<ScanError> for crate::error::Error
{
    fn from(err: ScanError) -> Self
    {
        use crate::error::internal::{Error as Internal, ErrorCode, SourceError};

        match err
        {
            ScanError::OutOfMemory => Internal::new(ErrorCode::OutOfMemory).into(),
            ScanError::Read(BlockError::Io(e)) => Internal::new(SourceError::from(e)).into(),
            ScanError::TransformFailed(TransformFailure::Memory) =>
            {
                Internal::new(ErrorCode::OutOfMemory).into()
            },
            ScanError::TransformFailed(TransformFailure::Write) =>
            {
                Internal::new(ErrorCode::WriteFailed).into()
            },
            ScanError::Write(e) => Internal::new(SourceError::from(e)).into(),
        }
    }
}

/// The five-way non-fatal error classification recorded on a
/// [`ProcessingStackEntry`](super::stack::ProcessingStackEntry),
/// surfaced only at pop time (spec §4.F/§4.H). Maps onto
/// `PYP_READER_ERROR_ID_*` in `original_source/src/PypReader.h`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NonFatalErrorKind
{
    /// The stream ended (or the tag stack unwound to empty)
    /// while this region was still open, e.g. `text1<? code1`
    UnclosedTag,

    /// An opening continuation was found with no prior tag of
    /// its family to continue, e.g. `text1<?... code1 ?>`
    ContinuationUnmatchedOpening,

    /// An opening continuation didn't match the family of the
    /// tag it named, e.g.
    /// `text1<? code1 ...?>text2<?=... code2 ?>text3`
    ContinuationMismatchedOpening,

    /// A closing continuation didn't match the family of the
    /// tag it's closing
    ContinuationMismatchedClosing,
}

impl NonFatalErrorKind
{
    /// The default, English message for this error kind, used
    /// unless overridden in
    /// [`ErrorMessages`](super::ErrorMessages).
    pub fn default_message(self) -> &'static str
    {
        match self
        {
            NonFatalErrorKind::UnclosedTag => "unclosed tag",
            NonFatalErrorKind::ContinuationUnmatchedOpening =>
            {
                "continuation has no matching opening tag"
            },
            NonFatalErrorKind::ContinuationMismatchedOpening =>
            {
                "continuation does not match the opening tag's family"
            },
            NonFatalErrorKind::ContinuationMismatchedClosing =>
            {
                "continuation does not match the closing tag's family"
            },
        }
    }
}

impl fmt::Display for NonFatalErrorKind
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        f.write_str(self.default_message())
    }
}
