/*
 * This Source Code Form is subject to the terms of the
 * Mozilla Public License, v. 2.0. If a copy of the MPL
 * was not distributed with this file, You can obtain one at http://mozilla.org/MPL/2.0/.
 */

//! Tracks where in the input byte stream the scanner
//! currently is, namely:
//!
//! - How many bytes have been consumed?
//! - How many lines have been seen?
//! - What is the current column?
//!
//! `\r\n` pairs are folded into a single line advance; see
//! [`advance`] for the exact state machine.

use std::ops::{Add, AddAssign};

/// A single point in the input byte stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StreamPosition
{
    /// Bytes consumed from the start of the stream
    pub char_pos: usize,
    /// Lines consumed from the start of the stream
    pub line:     usize,
    /// Offset from the last line break into the current line
    pub column:   usize,

    newline: NewlineState,
}

impl StreamPosition
{
    /// Construct a new position at the very start of a
    /// stream
    pub fn new() -> Self
    {
        Self::default()
    }
}

/// Whether the last byte seen was a `\r`, used to fold
/// `\r\n` pairs into a single line advance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum NewlineState
{
    /// No pending `\r`
    Clean,
    /// The previous byte was a `\r`
    SawCr,
}

impl Default for NewlineState
{
    fn default() -> Self
    {
        Self::Clean
    }
}

/// Mutate `.pos` to reflect having consumed `byte`.
///
/// - `\r` advances the line and arms [`NewlineState::SawCr`]
/// - `\n` advances the line *unless* the previous byte was
///   `\r` (folding `\r\n` into one line)
/// - any other byte advances the column and disarms the
///   newline state
pub fn advance(pos: &mut StreamPosition, byte: u8)
{
    pos.char_pos += 1;

    match byte
    {
        b'\r' =>
        {
            pos.line += 1;
            pos.column = 0;
            pos.newline = NewlineState::SawCr;
        },
        b'\n' if pos.newline != NewlineState::SawCr =>
        {
            pos.line += 1;
            pos.column = 0;
            pos.newline = NewlineState::Clean;
        },
        b'\n' =>
        {
            // Second half of a \r\n pair, already accounted for
            pos.newline = NewlineState::Clean;
        },
        _ =>
        {
            pos.column += 1;
            pos.newline = NewlineState::Clean;
        },
    }
}

/// Advance `.pos` over an entire byte slice
pub fn advance_slice(pos: &mut StreamPosition, bytes: &[u8])
{
    for &b in bytes
    {
        advance(pos, b);
    }
}

/// A half-open `[start, end)` span of a region, as observed
/// by the scanner at the moment it fired the opener and the
/// moment it fired the matching closer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamLocation
{
    pub start: StreamPosition,
    pub end:   StreamPosition,
}

impl StreamLocation
{
    pub fn new(start: StreamPosition, end: StreamPosition) -> Self
    {
        Self { start, end }
    }

    /// Length in bytes of the span
    pub fn len(&self) -> usize
    {
        self.end.char_pos - self.start.char_pos
    }

    pub fn is_empty(&self) -> bool
    {
        self.len() == 0
    }
}

/// A singly-linked, append-only chain of [`StreamLocation`]s.
///
/// A region spanning multiple continuation fragments
/// accumulates one location per opener fragment here, so that
/// transforms can report every span a logical region touched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StreamLocationChain
{
    locations: Vec<StreamLocation>,
}

impl StreamLocationChain
{
    pub fn new() -> Self
    {
        Self::default()
    }

    pub fn push(&mut self, location: StreamLocation)
    {
        self.locations.push(location);
    }

    pub fn iter(&self) -> impl Iterator<Item = &StreamLocation>
    {
        self.locations.iter()
    }

    pub fn last(&self) -> Option<&StreamLocation>
    {
        self.locations.last()
    }

    pub fn last_mut(&mut self) -> Option<&mut StreamLocation>
    {
        self.locations.last_mut()
    }

    pub fn is_empty(&self) -> bool
    {
        self.locations.is_empty()
    }

    pub fn len(&self) -> usize
    {
        self.locations.len()
    }
}

impl Add for StreamPosition
{
    type Output = Self;

    fn add(mut self, rhs: Self) -> Self::Output
    {
        self += rhs;
        self
    }
}

impl AddAssign for StreamPosition
{
    /// Concatenate a position delta computed independently
    /// (e.g. via [`stats_of`](crate::position)-style helpers
    /// in tests) onto this position.
    fn add_assign(&mut self, rhs: Self)
    {
        self.char_pos += rhs.char_pos;
        self.line += rhs.line;

        match rhs.line
        {
            0 => self.column += rhs.column,
            _ => self.column = rhs.column,
        }
    }
}

#[cfg(test)]
mod tests
{
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn plain_bytes_advance_column()
    {
        let mut pos = StreamPosition::new();

        advance_slice(&mut pos, b"abc");

        assert_eq!(pos, StreamPosition {
            char_pos: 3,
            line: 0,
            column: 3,
            newline: NewlineState::Clean,
        });
    }

    #[test]
    fn lf_advances_line()
    {
        let mut pos = StreamPosition::new();

        advance_slice(&mut pos, b"ab\ncd");

        assert_eq!(pos.char_pos, 5);
        assert_eq!(pos.line, 1);
        assert_eq!(pos.column, 2);
    }

    #[test]
    fn crlf_counts_as_one_line()
    {
        let mut pos = StreamPosition::new();

        advance_slice(&mut pos, b"ab\r\ncd");

        assert_eq!(pos.char_pos, 6);
        assert_eq!(pos.line, 1);
        assert_eq!(pos.column, 2);
    }

    #[test]
    fn lone_cr_advances_line()
    {
        let mut pos = StreamPosition::new();

        advance_slice(&mut pos, b"ab\rcd");

        assert_eq!(pos.char_pos, 5);
        assert_eq!(pos.line, 1);
        assert_eq!(pos.column, 2);
    }

    #[test]
    fn two_lone_crs_are_two_lines()
    {
        let mut pos = StreamPosition::new();

        advance_slice(&mut pos, b"\r\r");

        assert_eq!(pos.line, 2);
    }

    #[test]
    fn stream_location_length_matches_byte_count()
    {
        let mut pos = StreamPosition::new();
        let start = pos;

        advance_slice(&mut pos, b"<? code ?>");

        let loc = StreamLocation::new(start, pos);

        assert_eq!(loc.len(), 10);
    }

    #[test]
    fn chain_push_and_last()
    {
        let mut chain = StreamLocationChain::new();
        let a = StreamLocation::new(StreamPosition::new(), StreamPosition::new());
        let b = StreamLocation::new(StreamPosition::new(), StreamPosition::new());

        chain.push(a);
        chain.push(b);

        assert_eq!(chain.len(), 2);
        assert_eq!(chain.last(), Some(&b));
    }
}
