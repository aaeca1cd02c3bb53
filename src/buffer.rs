/*
 * This Source Code Form is subject to the terms of the
 * Mozilla Public License, v. 2.0. If a copy of the MPL
 * was not distributed with this file, You can obtain one at http://mozilla.org/MPL/2.0/.
 */

//! The chunked byte accumulator used to collect a region's
//! payload as it streams past, and to hold a transform's
//! output before it is spliced back into its parent.
//!
//! A [`DataBuffer`] is a chain of opaque byte segments plus a
//! running total size. Segments of zero length are never
//! created.

use std::{error::Error as StdError, fmt};

/// A chained, append-only byte accumulator.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct DataBuffer
{
    segments:   Vec<Vec<u8>>,
    total_size: usize,
}

impl DataBuffer
{
    /// Construct a new, empty buffer
    pub fn new() -> Self
    {
        Self::default()
    }

    /// Total number of bytes held across all segments
    pub fn len(&self) -> usize
    {
        self.total_size
    }

    pub fn is_empty(&self) -> bool
    {
        self.total_size == 0
    }

    /// Append a fresh, zeroed segment of exactly `n` bytes,
    /// returning a writable handle into it.
    ///
    /// ## Panics
    ///
    /// Panics if `n == 0`; zero length segments are never
    /// created, as a fundamental invariant of this buffer.
    pub fn extend(&mut self, n: usize) -> &mut [u8]
    {
        assert!(n > 0, "DataBuffer::extend requires n > 0");

        self.segments.push(vec![0; n]);
        self.total_size += n;

        self.segments
            .last_mut()
            .expect("just pushed a segment")
            .as_mut_slice()
    }

    /// Append a copy of `bytes`.
    ///
    /// A no-op if `bytes` is empty -- no zero length segment
    /// is created.
    pub fn extend_with(&mut self, bytes: &[u8])
    {
        if bytes.is_empty()
        {
            return;
        }

        self.segments.push(bytes.to_vec());
        self.total_size += bytes.len();
    }

    /// Drop all segments, resetting the buffer to empty
    pub fn empty(&mut self)
    {
        self.segments.clear();
        self.total_size = 0;
    }

    /// Splice `other`'s segment chain onto the tail of
    /// `self`, consuming `other`.
    pub fn move_from(&mut self, mut other: Self)
    {
        self.total_size += other.total_size;
        self.segments.append(&mut other.segments);
    }

    /// Collapse the chain into at most one segment.
    ///
    /// An empty buffer remains empty. A buffer that already
    /// holds a single segment is returned as-is. Optionally
    /// appends a trailing NUL byte (not counted towards
    /// [`DataBuffer::len`]) for callers that need a
    /// C-string-compatible handle.
    pub fn unify(&mut self, null_terminate: bool) -> Result<&[u8], OutOfMemory>
    {
        if self.segments.len() > 1
        {
            let mut merged = Vec::new();
            merged.try_reserve_exact(self.total_size).map_err(|_| OutOfMemory)?;

            for segment in self.segments.drain(..)
            {
                merged.extend_from_slice(&segment);
            }

            self.segments.push(merged);
        }

        if null_terminate
        {
            match self.segments.first_mut()
            {
                Some(segment) if segment.last() != Some(&0) => segment.push(0),
                None =>
                {
                    self.segments.push(vec![0]);
                },
                _ =>
                {},
            }
        }

        Ok(self.segments.first().map(Vec::as_slice).unwrap_or(&[]))
    }

    /// Iterate over the buffer's segments in order
    pub fn segments(&self) -> impl Iterator<Item = &[u8]>
    {
        self.segments.iter().map(Vec::as_slice)
    }
}

/// The only failure mode [`DataBuffer::unify`] has
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OutOfMemory;

impl fmt::Display for OutOfMemory
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        f.write_str("out of memory while unifying a data buffer")
    }
}

impl StdError for OutOfMemory {}

impl From<OutOfMemory> for crate::error::Error
{
    fn from(_: OutOfMemory) -> Self
    {
        use crate::error::internal::{Error as Internal, ErrorCode};

        Internal::new(ErrorCode::OutOfMemory).into()
    }
}

#[cfg(test)]
mod tests
{
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn extend_grows_len()
    {
        let mut buf = DataBuffer::new();

        buf.extend(4).copy_from_slice(b"abcd");

        assert_eq!(buf.len(), 4);
    }

    #[test]
    fn extend_with_empty_is_noop()
    {
        let mut buf = DataBuffer::new();

        buf.extend_with(b"");

        assert!(buf.is_empty());
        assert_eq!(buf.segments().count(), 0);
    }

    #[test]
    fn empty_resets_everything()
    {
        let mut buf = DataBuffer::new();
        buf.extend_with(b"hello");
        buf.empty();

        assert!(buf.is_empty());
        assert_eq!(buf.segments().count(), 0);
    }

    #[test]
    fn move_from_appends_other_chain()
    {
        let mut a = DataBuffer::new();
        a.extend_with(b"foo");

        let mut b = DataBuffer::new();
        b.extend_with(b"bar");

        a.move_from(b);

        assert_eq!(a.len(), 6);
        assert_eq!(a.segments().collect::<Vec<_>>(), vec![b"foo".as_slice(), b"bar"]);
    }

    #[test]
    fn unify_collapses_multi_segment_chain()
    {
        let mut buf = DataBuffer::new();
        buf.extend_with(b"foo");
        buf.extend_with(b"bar");

        let merged = buf.unify(false).unwrap();

        assert_eq!(merged, b"foobar");
        assert_eq!(buf.segments().count(), 1);
    }

    #[test]
    fn unify_on_single_segment_is_identity()
    {
        let mut buf = DataBuffer::new();
        buf.extend_with(b"solo");

        let unified = buf.unify(false).unwrap().to_vec();

        assert_eq!(unified, b"solo");
    }

    #[test]
    fn unify_on_empty_stays_empty()
    {
        let mut buf = DataBuffer::new();

        let unified = buf.unify(false).unwrap();

        assert!(unified.is_empty());
    }

    #[test]
    fn unify_null_terminate_appends_single_nul()
    {
        let mut buf = DataBuffer::new();
        buf.extend_with(b"hi");

        let unified = buf.unify(true).unwrap().to_vec();

        assert_eq!(unified, b"hi\0");

        // Calling unify a second time shouldn't double up the NUL
        let unified_again = buf.unify(true).unwrap().to_vec();
        assert_eq!(unified_again, b"hi\0");
    }
}
