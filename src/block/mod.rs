/*
 * This Source Code Form is subject to the terms of the
 * Mozilla Public License, v. 2.0. If a copy of the MPL
 * was not distributed with this file, You can obtain one at http://mozilla.org/MPL/2.0/.
 */

//! A rollback-capable block reader over an arbitrary
//! `std::io::Read` source.
//!
//! Grounded on `PypReadBlock`/`pypReadBlockCircularListCreate`
//! in `original_source/src/PypReader.c`: bytes are pulled from
//! the source in fixed-size chunks ("blocks") as the scanner
//! needs them, and a tentative match can roll the cursor back
//! to an earlier point as long as the blocks it touched are
//! still held.
//!
//! The original keeps blocks in a fixed-size circular list,
//! reusing the oldest block once the ring wraps back around to
//! it. This crate generalizes that into an unbounded,
//! append-only sequence -- Rust's allocator has no reason to
//! impose the original's fixed pool size, and blocks behind the
//! active rollback window are dropped as soon as they're no
//! longer reachable, which gives the same practical memory
//! bound without the wraparound bookkeeping. See DESIGN.md.

pub mod error;

use std::{collections::VecDeque, io};

pub use self::error::BlockError;
use crate::position::StreamPosition;

/// Default block size, `10240` bytes, matching
/// `original_source/src/Main.c`'s default `readBlockSize`.
pub const DEFAULT_BLOCK_SIZE: usize = 10240;

/// Default number of blocks kept ready before growing the
/// sequence, matching `original_source/src/Main.c`'s default
/// `readBlockCount`.
pub const DEFAULT_BLOCK_COUNT: usize = 2;

struct Block
{
    data: Vec<u8>,
}

impl Block
{
    fn len(&self) -> usize
    {
        self.data.len()
    }
}

/// A single rollback checkpoint: a cursor position plus the
/// stream position it corresponds to, so rolling back also
/// un-advances line/column tracking.
#[derive(Debug, Clone, Copy)]
struct Mark
{
    block:            usize,
    position:         usize,
    stream_position:  StreamPosition,
    arbitrary_chars:  usize,
}

struct Rollback
{
    start:        Mark,
    most_recent:  Mark,
}

/// Pulls bytes from an `R: std::io::Read` source one block at a
/// time, supporting rollback to any point still held in memory.
pub struct BlockReader<R>
{
    source:      R,
    block_size:  usize,
    blocks:      VecDeque<Block>,
    /// Global index of `blocks[0]`; blocks before this index
    /// have already been dropped
    base_index:  usize,
    current:     usize,
    position:    usize,
    exhausted:   bool,
    rollback:    Option<Rollback>,
}

impl<R> BlockReader<R>
where
    R: io::Read,
{
    pub fn new(source: R, block_size: usize, block_count: usize) -> Self
    {
        assert!(block_size > 0, "block_size must be > 0");

        Self {
            source,
            block_size,
            blocks: VecDeque::with_capacity(block_count.max(1)),
            base_index: 0,
            current: 0,
            position: 0,
            exhausted: false,
            rollback: None,
        }
    }

    pub fn with_defaults(source: R) -> Self
    {
        Self::new(source, DEFAULT_BLOCK_SIZE, DEFAULT_BLOCK_COUNT)
    }

    /// Whether the underlying source has returned EOF and the
    /// cursor has consumed every byte that was buffered from it
    pub fn is_exhausted(&self) -> bool
    {
        if !self.exhausted
        {
            return false;
        }

        match self.blocks.get(self.local(self.current))
        {
            Some(block) => self.position >= block.len(),
            None => true,
        }
    }

    fn local(&self, global: usize) -> usize
    {
        global - self.base_index
    }

    fn ensure_block(&mut self, global: usize) -> Result<bool, BlockError>
    {
        while self.base_index + self.blocks.len() <= global
        {
            if self.exhausted
            {
                return Ok(false);
            }

            let mut data = vec![0u8; self.block_size];
            let mut filled = 0;

            while filled < data.len()
            {
                let n = self.source.read(&mut data[filled..])?;

                if n == 0
                {
                    self.exhausted = true;
                    break;
                }

                filled += n;
            }

            data.truncate(filled);
            self.blocks.push_back(Block { data });

            if filled == 0
            {
                return Ok(false);
            }
        }

        Ok(true)
    }

    /// Look at, without consuming, the next byte in the stream.
    pub fn peek(&mut self) -> Result<Option<u8>, BlockError>
    {
        loop
        {
            if !self.ensure_block(self.current)?
            {
                return Ok(None);
            }

            let idx = self.local(self.current);
            let block_len = self.blocks[idx].len();

            if self.position < block_len
            {
                return Ok(Some(self.blocks[idx].data[self.position]));
            }

            if block_len < self.block_size
            {
                // A short block is necessarily the last one
                return Ok(None);
            }

            self.current += 1;
            self.position = 0;
        }
    }

    /// Consume and return the next byte, advancing `pos`
    /// through [`position::advance`](crate::position::advance).
    pub fn next_byte(&mut self, pos: &mut StreamPosition) -> Result<Option<u8>, BlockError>
    {
        match self.peek()?
        {
            None => Ok(None),
            Some(byte) =>
            {
                crate::position::advance(pos, byte);
                self.position += 1;
                Ok(Some(byte))
            },
        }
    }

    /// Begin a rollback window at the current cursor.
    pub fn begin_rollback(&mut self, stream_position: StreamPosition)
    {
        let mark = Mark {
            block: self.current,
            position: self.position,
            stream_position,
            arbitrary_chars: 0,
        };

        self.rollback = Some(Rollback {
            start: mark,
            most_recent: mark,
        });
    }

    pub fn is_rollback_active(&self) -> bool
    {
        self.rollback.is_some()
    }

    /// Record the current cursor as the most recent confirmed
    /// match point, e.g. after matching a complete tag while in
    /// wildcard (`arbitraryChars`) mode.
    pub fn record_most_recent(&mut self, stream_position: StreamPosition, arbitrary_chars: usize)
    {
        if let Some(rollback) = &mut self.rollback
        {
            rollback.most_recent = Mark {
                block: self.current,
                position: self.position,
                stream_position,
                arbitrary_chars,
            };
        }
    }

    /// Roll the cursor back to the start of the current
    /// rollback window, returning the stream position it was
    /// taken at. Ends the rollback window.
    pub fn rollback_to_start(&mut self) -> Option<StreamPosition>
    {
        let rollback = self.rollback.take()?;

        self.apply_mark(rollback.start);

        Some(rollback.start.stream_position)
    }

    /// Roll the cursor back to the most recent confirmed match
    /// point recorded via [`record_most_recent`]. Ends the
    /// rollback window.
    pub fn rollback_to_most_recent(&mut self) -> Option<(StreamPosition, usize)>
    {
        let rollback = self.rollback.take()?;

        self.apply_mark(rollback.most_recent);

        Some((rollback.most_recent.stream_position, rollback.most_recent.arbitrary_chars))
    }

    fn apply_mark(&mut self, mark: Mark)
    {
        self.current = mark.block;
        self.position = mark.position;
    }

    /// Commit the current cursor: ends the rollback window
    /// without moving the cursor, and drops any blocks that are
    /// now unreachable.
    pub fn commit(&mut self)
    {
        self.rollback = None;
        self.trim();
    }

    /// Drop fully-consumed blocks strictly before the active
    /// reachable window (the rollback start if one is active,
    /// otherwise the current cursor).
    fn trim(&mut self)
    {
        let keep_from = match &self.rollback
        {
            Some(r) => r.start.block,
            None => self.current,
        };

        while self.base_index < keep_from && !self.blocks.is_empty()
        {
            self.blocks.pop_front();
            self.base_index += 1;
        }
    }
}

#[cfg(test)]
mod tests
{
    use std::io::Cursor;

    use pretty_assertions::assert_eq;

    use super::*;

    fn drain<R: io::Read>(reader: &mut BlockReader<R>) -> anyhow::Result<Vec<u8>>
    {
        let mut pos = StreamPosition::new();
        let mut out = Vec::new();

        while let Some(b) = reader.next_byte(&mut pos)?
        {
            out.push(b);
        }

        Ok(out)
    }

    #[test]
    fn reads_all_bytes_across_small_blocks() -> anyhow::Result<()>
    {
        let mut reader = BlockReader::new(Cursor::new(b"hello, world!".to_vec()), 4, 2);

        assert_eq!(drain(&mut reader)?, b"hello, world!");

        Ok(())
    }

    #[test]
    fn rollback_to_start_replays_identical_bytes() -> anyhow::Result<()>
    {
        let mut reader = BlockReader::new(Cursor::new(b"abcdef".to_vec()), 3, 2);
        let mut pos = StreamPosition::new();

        reader.begin_rollback(pos);
        reader.next_byte(&mut pos)?;
        reader.next_byte(&mut pos)?;

        let restored = reader.rollback_to_start().unwrap();
        assert_eq!(restored, StreamPosition::new());
        assert!(!reader.is_rollback_active());

        let mut pos2 = StreamPosition::new();
        assert_eq!(drain_from(&mut reader, &mut pos2)?, b"abcdef");

        Ok(())
    }

    fn drain_from(reader: &mut BlockReader<Cursor<Vec<u8>>>, pos: &mut StreamPosition) -> anyhow::Result<Vec<u8>>
    {
        let mut out = Vec::new();

        while let Some(b) = reader.next_byte(pos)?
        {
            out.push(b);
        }

        Ok(out)
    }

    #[test]
    fn rollback_to_most_recent_keeps_confirmed_progress() -> anyhow::Result<()>
    {
        let mut reader = BlockReader::new(Cursor::new(b"<?=....?>".to_vec()), 3, 2);
        let mut pos = StreamPosition::new();

        reader.begin_rollback(pos);
        reader.next_byte(&mut pos)?; // '<'
        reader.next_byte(&mut pos)?; // '?'
        reader.next_byte(&mut pos)?; // '='
        reader.record_most_recent(pos, 0);
        reader.next_byte(&mut pos)?; // '.'
        reader.next_byte(&mut pos)?; // '.'

        let (restored, arbitrary) = reader.rollback_to_most_recent().unwrap();
        assert_eq!(restored.char_pos, 3);
        assert_eq!(arbitrary, 0);

        let mut out = Vec::new();
        while let Some(b) = reader.next_byte(&mut pos)?
        {
            out.push(b);
        }

        assert_eq!(out, b"....?>");

        Ok(())
    }

    #[test]
    fn identical_output_across_block_sizes() -> anyhow::Result<()>
    {
        let text = b"the quick brown fox jumps over the lazy dog, 12345".to_vec();

        for block_size in [1, 2, 3, 7, 64]
        {
            let mut reader = BlockReader::new(Cursor::new(text.clone()), block_size, 2);
            assert_eq!(drain(&mut reader)?, text, "block_size={}", block_size);
        }

        Ok(())
    }

    #[test]
    fn commit_trims_blocks_before_current() -> anyhow::Result<()>
    {
        let mut reader = BlockReader::new(Cursor::new(b"abcdefghij".to_vec()), 2, 2);
        let mut pos = StreamPosition::new();

        for _ in 0..6
        {
            reader.next_byte(&mut pos)?;
        }

        reader.commit();

        assert!(reader.base_index <= reader.current);

        Ok(())
    }
}
