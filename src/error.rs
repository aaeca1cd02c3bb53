/*
 * This Source Code Form is subject to the terms of the
 * Mozilla Public License, v. 2.0. If a copy of the MPL
 * was not distributed with this file, You can obtain one at http://mozilla.org/MPL/2.0/.
 */

use std::{error::Error as StdError, fmt};

/// Result typedef used throughout this library's public API
pub type Result<T> = std::result::Result<T, Error>;

/// Opaque type representing all possible errors which can
/// occur while preprocessing a stream.
pub struct Error
{
    inner: Box<internal::Error>,
}

impl Error
{
    /// The byte offset into the input stream at which the
    /// error occurred, if the error carries position
    /// context.
    pub fn at(&self) -> Option<u64>
    {
        self.inner.has_context().then(|| self.inner.position.char_pos as u64)
    }

    /// The line at which the error occurred, if contextualized.
    pub fn line(&self) -> Option<u64>
    {
        self.inner.has_context().then(|| self.inner.position.line as u64)
    }

    /// Categorize the error into one of the following:
    ///
    /// - [`Category::IO`] the underlying byte stream surfaced
    ///   an error while doing IO
    /// - [`Category::Memory`] an allocation could not be
    ///   satisfied
    /// - [`Category::Grammar`] the user-supplied tag grammar
    ///   was malformed
    /// - [`Category::Write`] the output stream returned an
    ///   error while writing
    pub fn classify(&self) -> Category
    {
        self.inner.classify()
    }

    pub(crate) fn new(err: internal::Error) -> Self
    {
        Self {
            inner: Box::new(err),
        }
    }
}

/// Rough category of an [`Error`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Category
{
    /// The underlying byte stream returned an error while
    /// attempting IO
    IO,

    /// An allocation could not be satisfied
    Memory,

    /// The user-supplied tag grammar was malformed
    Grammar,

    /// The output (or error) stream returned an error while
    /// writing
    Write,
}

pub(crate) mod internal
{
    use std::{error::Error as StdError, fmt, io};

    use super::Category;
    use crate::position::StreamPosition;

    /// Internal error representation used throughout the
    /// library. Carries enough position context that it can
    /// be contextualized later, if context is available at
    /// all (grammar errors, for instance, have none).
    pub(crate) struct Error
    {
        pub kind:     ErrorKind,
        pub position: StreamPosition,
        contextless:  bool,
    }

    impl Error
    {
        pub fn new<T>(err: T) -> Self
        where
            T: Into<ErrorKind>,
        {
            Self {
                kind:        err.into(),
                position:    StreamPosition::new(),
                contextless: true,
            }
        }

        pub fn with_context<T>(err: T, position: StreamPosition) -> Self
        where
            T: Into<ErrorKind>,
        {
            Self {
                kind: err.into(),
                position,
                contextless: false,
            }
        }

        pub fn has_context(&self) -> bool
        {
            !self.contextless
        }

        pub fn classify(&self) -> Category
        {
            Into::into(&self.kind)
        }
    }

    #[derive(Debug)]
    pub(crate) enum ErrorKind
    {
        Code(ErrorCode),
        Source(SourceError),
    }

    /// Lightweight errors specific to this library. Should
    /// never grow to wrap large, heap-owning underlying
    /// errors -- use [`SourceError`] for those.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub(crate) enum ErrorCode
    {
        /// An allocation could not be satisfied
        OutOfMemory,

        /// The output or error stream rejected a write
        WriteFailed,

        /// A user tag grammar contained two tags with
        /// identical `(text, arbitraryChars)` in the same
        /// group
        DuplicateTag,
    }

    /// Heavy and/or external errors that can occur during
    /// library usage
    #[derive(Debug)]
    pub(crate) enum SourceError
    {
        /// Catch all wrapper for any underlying IO error
        /// reported to us while reading or writing
        IO(io::Error),
    }

    impl fmt::Debug for Error
    {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
        {
            let mut this = f.debug_struct("Error");

            this.field("kind", &self.kind);

            if self.has_context()
            {
                this.field("position", &self.position);
            }

            this.finish()
        }
    }

    impl fmt::Display for Error
    {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
        {
            use fmt::Display;

            if self.has_context()
            {
                f.write_fmt(format_args!(
                    "{}, on line {}, column {}, at index {}",
                    self.kind,
                    self.position.line,
                    self.position.column,
                    self.position.char_pos
                ))
            }
            else
            {
                Display::fmt(&self.kind, f)
            }
        }
    }

    impl StdError for Error
    {
        fn source(&self) -> Option<&(dyn StdError + 'static)>
        {
            StdError::source(&self.kind)
        }
    }

    impl From<Error> for super::Error
    {
        fn from(err: Error) -> Self
        {
            Self::new(err)
        }
    }

    impl<T> From<T> for Error
    where
        T: Into<ErrorKind>,
    {
        fn from(t: T) -> Self
        {
            Error::new(t.into())
        }
    }

    impl From<&'_ ErrorKind> for Category
    {
        fn from(kind: &'_ ErrorKind) -> Self
        {
            match kind
            {
                ErrorKind::Code(e) => e.into(),
                ErrorKind::Source(e) => e.into(),
            }
        }
    }

    impl fmt::Display for ErrorKind
    {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
        {
            match self
            {
                ErrorKind::Code(ref e) => fmt::Display::fmt(e, f),
                ErrorKind::Source(ref e) => fmt::Display::fmt(e, f),
            }
        }
    }

    impl StdError for ErrorKind {}

    impl From<ErrorCode> for ErrorKind
    {
        fn from(e: ErrorCode) -> Self
        {
            ErrorKind::Code(e)
        }
    }

    impl From<SourceError> for ErrorKind
    {
        fn from(e: SourceError) -> Self
        {
            ErrorKind::Source(e)
        }
    }

    impl From<ErrorCode> for Category
    {
        fn from(code: ErrorCode) -> Self
        {
            match code
            {
                ErrorCode::OutOfMemory => Category::Memory,
                ErrorCode::WriteFailed => Category::Write,
                ErrorCode::DuplicateTag => Category::Grammar,
            }
        }
    }

    impl From<&'_ ErrorCode> for Category
    {
        fn from(code: &'_ ErrorCode) -> Self
        {
            From::from(*code)
        }
    }

    impl fmt::Display for ErrorCode
    {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
        {
            match self
            {
                ErrorCode::OutOfMemory => f.write_str("out of memory"),
                ErrorCode::WriteFailed => f.write_str("failed to write to the output stream"),
                ErrorCode::DuplicateTag =>
                {
                    f.write_str("two identical tags were added to the same tag group")
                },
            }
        }
    }

    impl StdError for ErrorCode {}

    impl From<&'_ SourceError> for Category
    {
        fn from(_err: &'_ SourceError) -> Self
        {
            Category::IO
        }
    }

    impl fmt::Display for SourceError
    {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
        {
            match self
            {
                SourceError::IO(ref e) => fmt::Display::fmt(e, f),
            }
        }
    }

    impl StdError for SourceError
    {
        fn source(&self) -> Option<&(dyn StdError + 'static)>
        {
            match self
            {
                SourceError::IO(e) => Some(e),
            }
        }
    }

    impl From<io::Error> for SourceError
    {
        fn from(e: io::Error) -> Self
        {
            SourceError::IO(e)
        }
    }
}

impl fmt::Debug for Error
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        fmt::Debug::fmt(&self.inner, f)
    }
}

impl fmt::Display for Error
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        fmt::Display::fmt(&self.inner, f)
    }
}

impl StdError for Error
{
    fn source(&self) -> Option<&(dyn StdError + 'static)>
    {
        StdError::source(&self.inner)
    }
}
