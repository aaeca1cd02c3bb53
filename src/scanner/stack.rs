/*
 * This Source Code Form is subject to the terms of the
 * Mozilla Public License, v. 2.0. If a copy of the MPL
 * was not distributed with this file, You can obtain one at http://mozilla.org/MPL/2.0/.
 */

//! The two parallel stacks the scanner driver keeps while a
//! stream is open: the [`TagStack`] (which grammar applies at
//! the current nesting depth) and the [`ProcessingStack`] (the
//! data being accumulated for each currently-open region).
//!
//! Grounded on `PypTagStack`/`PypProcessingStack` in
//! `original_source/src/PypReader.c`. The original links stack
//! entries by hand-rolled pointers (`parent`); a plain `Vec` is
//! the natural Rust shape for a structure that is only ever
//! pushed to and popped from its tail.

use std::rc::Rc;

use crate::{
    buffer::DataBuffer,
    grammar::{trie::TrieGroupHandle, ProcessingInfo},
    position::StreamLocationChain,
    scanner::error::NonFatalErrorKind,
};

/// One open tag's matching context: which trie groups the
/// scanner should try to match against while this tag remains
/// open.
pub struct TagStackEntry
{
    /// The hook set belonging to the tag that opened this
    /// frame, if it has one -- used to decide whether a
    /// continuation belongs to the "same family" as this frame
    pub processing_info:  Option<Rc<ProcessingInfo>>,

    /// The merged trie the scanner matches against while this
    /// frame is active: nested openers and this frame's own
    /// closer(s), already compiled together by
    /// [`trie::optimize`](crate::grammar::trie::optimize) (its
    /// `closing` parameter), so a single lookup here finds
    /// either kind of hit
    pub candidates:        TrieGroupHandle,

    /// Whether this frame was opened by a continuation tag
    /// rather than a fresh opener
    pub is_continuation:   bool,
}

/// A LIFO stack of currently-open tags' matching contexts.
#[derive(Default)]
pub struct TagStack
{
    entries: Vec<TagStackEntry>,
}

impl TagStack
{
    pub fn new() -> Self
    {
        Self::default()
    }

    pub fn push(&mut self, entry: TagStackEntry)
    {
        self.entries.push(entry);
    }

    pub fn pop(&mut self) -> Option<TagStackEntry>
    {
        self.entries.pop()
    }

    pub fn top(&self) -> Option<&TagStackEntry>
    {
        self.entries.last()
    }

    pub fn top_mut(&mut self) -> Option<&mut TagStackEntry>
    {
        self.entries.last_mut()
    }

    pub fn is_empty(&self) -> bool
    {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize
    {
        self.entries.len()
    }

    pub fn depth(&self) -> usize
    {
        self.entries.len()
    }
}

/// One currently-open region's accumulated output and
/// bookkeeping.
pub struct ProcessingStackEntry
{
    /// Bytes collected for this region so far (its own text, or
    /// the parent's text once a child has been folded back in)
    pub buffer:            DataBuffer,

    /// The opening tag's hook set, if it had one
    pub processing_info:   Option<Rc<ProcessingInfo>>,

    /// Whether this entry was (re)opened by a continuation
    pub is_continuation:   bool,

    /// The non-fatal error recorded against this region, if
    /// any. Surfaced only when this entry is popped (spec
    /// §4.F/§4.H), so that
    /// [`O_ON_CONTINUATION_ALLOW_LATE_ERROR_OUTPUT`](super::flag::O_ON_CONTINUATION_ALLOW_LATE_ERROR_OUTPUT)
    /// can let the region finish evaluating first.
    pub error:              Option<NonFatalErrorKind>,

    /// Every span of input this region's opener fragment(s)
    /// covered
    pub locations:          StreamLocationChain,

    /// The [`TagStack`] depth at the moment this entry was
    /// pushed. A continuation gap is pushed without a matching
    /// tag-stack frame of its own, so comparing this against
    /// the live tag-stack depth is how the driver tells a gap
    /// (or any other depth-mismatched entry) apart from the
    /// region whose closer is actually being searched for.
    pub opened_at_depth:   usize,
}

impl ProcessingStackEntry
{
    pub fn new(processing_info: Option<Rc<ProcessingInfo>>, is_continuation: bool) -> Self
    {
        Self {
            buffer: DataBuffer::new(),
            processing_info,
            is_continuation,
            error: None,
            locations: StreamLocationChain::new(),
            opened_at_depth: 0,
        }
    }

    /// Record a non-fatal error against this entry, preferring
    /// whichever was set first (the original C tracks the
    /// *first* error id raised against a region, not the last).
    pub fn set_error(&mut self, kind: NonFatalErrorKind)
    {
        if self.error.is_none()
        {
            self.error = Some(kind);
        }
    }
}

/// A LIFO stack of currently-open regions' accumulated data.
#[derive(Default)]
pub struct ProcessingStack
{
    entries: Vec<ProcessingStackEntry>,
}

impl ProcessingStack
{
    pub fn new() -> Self
    {
        Self::default()
    }

    pub fn push(&mut self, entry: ProcessingStackEntry)
    {
        self.entries.push(entry);
    }

    pub fn pop(&mut self) -> Option<ProcessingStackEntry>
    {
        self.entries.pop()
    }

    pub fn top(&self) -> Option<&ProcessingStackEntry>
    {
        self.entries.last()
    }

    pub fn top_mut(&mut self) -> Option<&mut ProcessingStackEntry>
    {
        self.entries.last_mut()
    }

    /// The entry directly beneath the top, if there is one --
    /// used to find the region a continuation gap sits on top
    /// of without popping the gap first.
    pub fn second_from_top(&self) -> Option<&ProcessingStackEntry>
    {
        let len = self.entries.len();
        len.checked_sub(2).map(|i| &self.entries[i])
    }

    pub fn is_empty(&self) -> bool
    {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize
    {
        self.entries.len()
    }
}
