/*
 * This Source Code Form is subject to the terms of the
 * Mozilla Public License, v. 2.0. If a copy of the MPL
 * was not distributed with this file, You can obtain one at http://mozilla.org/MPL/2.0/.
 */

//! The scanner driver: the byte-at-a-time state machine that
//! ties [`block`](crate::block), [`grammar::trie`](crate::grammar::trie)
//! and the two stacks together into one streaming pass over an
//! input.
//!
//! Grounded directly on `pypReadFromStream` / `pypReadTagMatched`
//! / `pypReadRollback` / `pypReadPerformAction` in
//! `original_source/src/PypReader.c`. Two structural choices
//! depart from a literal line-for-line port, both noted in
//! DESIGN.md:
//!
//! - The original flushes literal text straight out of its
//!   block-addressed ring buffer by `(block, position)` range.
//!   This crate instead keeps a plain `Vec<u8>` of every byte
//!   read since the last flush point, truncating it on rollback
//!   the same way the block cursor itself is rolled back; this
//!   needs no extra surface on [`BlockReader`](crate::block::BlockReader).
//! - The original recomputes `streamPosition` using whichever
//!   byte happened to be in a local variable at the moment a
//!   rollback-with-no-match occurs, which can double count a
//!   byte's line/column contribution. This crate always restores
//!   the exact `StreamPosition` recorded at the relevant mark.

pub mod dispatch;
pub mod error;
pub mod flag;
pub mod stack;

use std::{any::Any, collections::HashMap, io, rc::Rc};

pub use self::{error::ScanError, flag::Flags};
use crate::{
    block::BlockReader,
    buffer::DataBuffer,
    grammar::{trie::TrieGroupHandle, ProcessingInfo, TagFlags},
    position::{StreamLocation, StreamPosition},
    scanner::{
        error::NonFatalErrorKind,
        stack::{ProcessingStack, ProcessingStackEntry, TagStack, TagStackEntry},
    },
};

/// Per-[`NonFatalErrorKind`] message table, substituted for a
/// region's collected bytes when that region's error is
/// surfaced.
///
/// Every kind has a built-in English default; only the kinds a
/// caller overrides need to be set.
#[derive(Debug, Clone, Default)]
pub struct ErrorMessages
{
    custom: HashMap<NonFatalErrorKind, String>,
}

impl ErrorMessages
{
    pub fn new() -> Self
    {
        Self::default()
    }

    /// Override the message used for `kind`.
    pub fn set(&mut self, kind: NonFatalErrorKind, message: impl Into<String>)
    {
        self.custom.insert(kind, message.into());
    }

    /// The message that should be substituted for `kind`,
    /// falling back to [`NonFatalErrorKind::default_message`].
    pub fn get(&self, kind: NonFatalErrorKind) -> &str
    {
        self.custom.get(&kind).map(String::as_str).unwrap_or_else(|| kind.default_message())
    }
}

/// A fired tag's completion data, copied out of its
/// [`TrieNode`](crate::grammar::trie::TrieNode) at the moment it
/// completes so the driver doesn't need to hold a borrow of the
/// trie across the stack mutations completion triggers.
#[derive(Clone)]
struct FiredTag
{
    children:         TrieGroupHandle,
    closing:          bool,
    flags:            TagFlags,
    processing_info:  Option<Rc<ProcessingInfo>>,
}

/// The deepest complete match found so far within the current
/// rollback window, mirroring `PypReadRollbackEntry` in
/// `original_source/src/PypReader.h`.
struct MostRecent
{
    tag:       FiredTag,
    position:  StreamPosition,
}

/// The in-progress match against one [`TrieNode`](crate::grammar::trie::TrieNode),
/// tracking how much of its own `text` has matched so far.
struct InProgress
{
    group:    TrieGroupHandle,
    index:    usize,
    matched:  usize,
}

/// Where a candidate window's first byte was found, and how
/// much of the pending-literal buffer existed before it.
struct CandidateStart
{
    pos:          StreamPosition,
    literal_len:  usize,
}

/// Where completed output should go: the outermost (root)
/// region's bytes, once flushed, either go straight out to a
/// caller-supplied writer or stay in a buffer for
/// [`Scanner::run_nested`] to hand back to its caller.
enum Sink<'w>
{
    Writer(&'w mut dyn io::Write),
    Buffer,
}

impl Sink<'_>
{
    fn write(&mut self, bytes: &[u8]) -> Result<(), ScanError>
    {
        if let Sink::Writer(w) = self
        {
            w.write_all(bytes)?;
        }

        Ok(())
    }
}

/// A compiled grammar plus the non-fatal-error policy and
/// message table to scan streams with.
///
/// Holds no per-run state -- [`Scanner::run`] and
/// [`Scanner::run_nested`] can both be called repeatedly, or
/// re-entrantly from within a [`Transform`](crate::transform::Transform)
/// invoked by an outer run, since each call constructs its own
/// [`BlockReader`], [`TagStack`] and [`ProcessingStack`] fresh.
pub struct Scanner
{
    root:      TrieGroupHandle,
    flags:     Flags,
    messages:  ErrorMessages,
}

impl Scanner
{
    /// Build a scanner from an already-[`optimize`](crate::grammar::trie::optimize)d
    /// grammar, with no flags set and default error messages.
    pub fn new(root: TrieGroupHandle) -> Self
    {
        Self {
            root,
            flags: Flags::empty(),
            messages: ErrorMessages::new(),
        }
    }

    pub fn with_flags(mut self, flags: Flags) -> Self
    {
        self.flags = flags;
        self
    }

    pub fn with_error_messages(mut self, messages: ErrorMessages) -> Self
    {
        self.messages = messages;
        self
    }

    /// Scan `input` with the default block size/count, writing
    /// output to `output` as soon as each region resolves.
    ///
    /// Non-fatal errors not covered by [`Flags::INLINE_ERRORS`]
    /// are discarded; use
    /// [`run_with_error_output`](Scanner::run_with_error_output)
    /// to route them to a side error stream instead.
    pub fn run<R, W>(&self, input: R, output: &mut W, user_data: &mut dyn Any) -> Result<(), ScanError>
    where
        R: io::Read,
        W: io::Write,
    {
        self.run_with_block_size(input, output, crate::block::DEFAULT_BLOCK_SIZE, crate::block::DEFAULT_BLOCK_COUNT, user_data)
    }

    /// Like [`Scanner::run`], with an explicit block size/count.
    pub fn run_with_block_size<R, W>(
        &self,
        input: R,
        output: &mut W,
        block_size: usize,
        block_count: usize,
        user_data: &mut dyn Any,
    ) -> Result<(), ScanError>
    where
        R: io::Read,
        W: io::Write,
    {
        self.run_with_error_output(input, output, block_size, block_count, &mut io::sink(), user_data)
    }

    /// Like [`Scanner::run_with_block_size`], additionally
    /// routing any non-fatal error whose
    /// [`Flags::INLINE_ERRORS`] is unset to `error_output`
    /// instead of discarding it (spec §7: "with inline-errors
    /// unset, messages go to the error stream").
    pub fn run_with_error_output<R, W, E>(
        &self,
        input: R,
        output: &mut W,
        block_size: usize,
        block_count: usize,
        error_output: &mut E,
        user_data: &mut dyn Any,
    ) -> Result<(), ScanError>
    where
        R: io::Read,
        W: io::Write,
        E: io::Write,
    {
        let reader = BlockReader::new(input, block_size, block_count);
        let mut run = Run::new(reader, self.root.clone(), self.flags, &self.messages, error_output);

        run.drive(Sink::Writer(output), user_data)
    }

    /// Scan `input`, returning the fully-collected output buffer
    /// instead of writing it anywhere. Intended for a host's
    /// `include`-equivalent: a [`Transform`](crate::transform::Transform)
    /// that wants to recursively preprocess another stream and
    /// splice the result into its own output can call this
    /// without needing its own `io::Write` sink.
    pub fn run_nested<R>(&self, input: R, user_data: &mut dyn Any) -> Result<DataBuffer, ScanError>
    where
        R: io::Read,
    {
        let reader = BlockReader::with_defaults(input);
        let mut run = Run::new(reader, self.root.clone(), self.flags, &self.messages, &mut io::sink());

        run.drive(Sink::Buffer, user_data)?;

        Ok(std::mem::take(&mut run.root_buffer))
    }
}

/// Per-invocation scanner state; constructed fresh by every
/// [`Scanner::run`]/[`run_nested`] call.
struct Run<'m, 'e, R>
{
    reader:           BlockReader<R>,
    tag_stack:        TagStack,
    processing_stack: ProcessingStack,
    flags:            Flags,
    messages:         &'m ErrorMessages,
    error_output:     &'e mut dyn io::Write,

    /// Every byte read since the last flush point, in stream
    /// order; truncated back on rollback the same way the
    /// reader's own cursor is.
    literal:          Vec<u8>,
    /// The [`StreamPosition`] corresponding to `literal[0]`
    flush_base:       StreamPosition,
    /// The current stream position (mirrors the reader's
    /// cursor; [`BlockReader`] doesn't expose its own)
    stream_pos:       StreamPosition,

    /// Which trie group is searched for a sibling match when
    /// `current` is `None`
    search_group:     TrieGroupHandle,
    /// The node presently being matched against, if any
    current:          Option<InProgress>,
    /// The deepest complete match in the active rollback window
    most_recent:      Option<MostRecent>,
    /// Where the active rollback window's candidate began
    candidate_start:  Option<CandidateStart>,
    /// Bytes still to be consumed unconditionally before firing
    /// a wildcard-suffixed tag
    wildcard:         Option<(FiredTag, usize)>,

    root_buffer:      DataBuffer,
}

impl<'m, 'e, R> Run<'m, 'e, R>
where
    R: io::Read,
{
    fn new(
        reader: BlockReader<R>,
        root: TrieGroupHandle,
        flags: Flags,
        messages: &'m ErrorMessages,
        error_output: &'e mut dyn io::Write,
    ) -> Self
    {
        let mut tag_stack = TagStack::new();
        tag_stack.push(TagStackEntry {
            processing_info: None,
            candidates: root.clone(),
            is_continuation: false,
        });

        Self {
            reader,
            tag_stack,
            processing_stack: ProcessingStack::new(),
            flags,
            messages,
            error_output,
            literal: Vec::new(),
            flush_base: StreamPosition::new(),
            stream_pos: StreamPosition::new(),
            search_group: root,
            current: None,
            most_recent: None,
            candidate_start: None,
            wildcard: None,
            root_buffer: DataBuffer::new(),
        }
    }

    fn read_byte(&mut self) -> Result<Option<u8>, ScanError>
    {
        match self.reader.next_byte(&mut self.stream_pos)?
        {
            Some(b) =>
            {
                self.literal.push(b);
                Ok(Some(b))
            },
            None => Ok(None),
        }
    }

    fn drive(&mut self, mut sink: Sink<'_>, user_data: &mut dyn Any) -> Result<(), ScanError>
    {
        loop
        {
            match self.reader.peek()?
            {
                None =>
                {
                    if self.reader.is_rollback_active()
                    {
                        self.rollback(&mut sink, user_data)?;
                        continue;
                    }

                    break;
                },
                Some(byte) =>
                {
                    self.step(byte, &mut sink, user_data)?;
                },
            }
        }

        let end = self.stream_pos;
        self.flush_literal_up_to(end, &mut sink)?;

        self.unwind_open_regions(&mut sink, user_data)?;

        Ok(())
    }

    fn step(&mut self, byte: u8, sink: &mut Sink<'_>, user_data: &mut dyn Any) -> Result<(), ScanError>
    {
        if let Some((_, remaining)) = &mut self.wildcard
        {
            self.read_byte()?;
            *remaining -= 1;

            if *remaining == 0
            {
                let (tag, _) = self.wildcard.take().expect("checked Some above");
                let position = self.stream_pos;

                self.most_recent = Some(MostRecent { tag, position });
                self.reader.record_most_recent(position, 0);

                self.finish_match(sink, user_data)?;
            }

            return Ok(());
        }

        if let Some(progress) = self.current.take()
        {
            let expected = progress.group.borrow().nodes[progress.index].text[progress.matched];

            if expected == byte
            {
                self.read_byte()?;

                let matched = progress.matched + 1;
                let text_len = progress.group.borrow().nodes[progress.index].text.len();

                if matched == text_len
                {
                    self.on_node_text_matched(progress.group, progress.index, sink, user_data)?;
                }
                else
                {
                    self.current = Some(InProgress {
                        group: progress.group,
                        index: progress.index,
                        matched,
                    });
                }
            }
            else
            {
                self.rollback(sink, user_data)?;
            }

            return Ok(());
        }

        // Idle: look for a sibling of `search_group` starting
        // with `byte`.
        let hit = self.search_group.borrow().nodes.iter().position(|n| n.text[0] == byte);

        match hit
        {
            Some(index) =>
            {
                if !self.reader.is_rollback_active()
                {
                    self.reader.begin_rollback(self.stream_pos);
                    self.candidate_start = Some(CandidateStart {
                        pos: self.stream_pos,
                        literal_len: self.literal.len(),
                    });
                }

                self.read_byte()?;

                let text_len = self.search_group.borrow().nodes[index].text.len();

                if text_len == 1
                {
                    self.on_node_text_matched(self.search_group.clone(), index, sink, user_data)?;
                }
                else
                {
                    self.current = Some(InProgress {
                        group: self.search_group.clone(),
                        index,
                        matched: 1,
                    });
                }
            },
            None =>
            {
                if self.reader.is_rollback_active()
                {
                    self.rollback(sink, user_data)?;
                }
                else
                {
                    self.read_byte()?;
                }
            },
        }

        Ok(())
    }

    /// A trie node's own `text` has just been fully matched.
    fn on_node_text_matched(
        &mut self,
        group: TrieGroupHandle,
        index: usize,
        sink: &mut Sink<'_>,
        user_data: &mut dyn Any,
    ) -> Result<(), ScanError>
    {
        let (complete, closing, arbitrary_chars, flags, processing_info, children) =
        {
            let borrowed = group.borrow();
            let node = &borrowed.nodes[index];
            (
                node.complete,
                node.closing,
                node.arbitrary_chars,
                node.flags,
                node.processing_info.clone(),
                node.children.clone(),
            )
        };

        if complete
        {
            let tag = FiredTag {
                children: children.clone(),
                closing,
                flags,
                processing_info,
            };

            self.most_recent = Some(MostRecent {
                tag,
                position: self.stream_pos,
            });
            self.reader.record_most_recent(self.stream_pos, arbitrary_chars);
        }

        if complete && arbitrary_chars > 0
        {
            let tag = self.most_recent.as_ref().expect("complete node recorded above").tag.clone();
            self.wildcard = Some((tag, arbitrary_chars));
        }
        else if children.borrow().nodes.is_empty()
        {
            return self.finish_match(sink, user_data);
        }
        else
        {
            self.search_group = children;
            self.current = None;
        }

        Ok(())
    }

    /// Accept `most_recent` as final: restore the reader/literal
    /// buffer to exactly that point (a no-op if nothing was
    /// over-read past it) and fire it.
    fn finish_match(&mut self, sink: &mut Sink<'_>, user_data: &mut dyn Any) -> Result<(), ScanError>
    {
        if let Some(most_recent) = &self.most_recent
        {
            self.reader.rollback_to_most_recent();

            let n = most_recent.position.char_pos - self.flush_base.char_pos;
            self.literal.truncate(n);
            self.stream_pos = most_recent.position;
        }

        self.current = None;
        self.fire(sink, user_data)
    }

    /// A mismatch occurred (either at Idle with no sibling
    /// matching, or mid-node against an already in-progress
    /// match): accept the deepest recorded complete match, or --
    /// if nothing ever completed -- abandon this candidate
    /// window entirely.
    fn rollback(&mut self, sink: &mut Sink<'_>, user_data: &mut dyn Any) -> Result<(), ScanError>
    {
        // A tag whose wildcard countdown can't complete before
        // EOF never matches: there aren't the bytes its grammar
        // requires. Abandon the whole window rather than firing
        // a short match.
        if self.wildcard.is_some()
        {
            self.wildcard = None;
        }

        if self.most_recent.is_some()
        {
            return self.finish_match(sink, user_data);
        }

        let start = self.candidate_start.take().expect("rollback only happens inside a window");
        self.reader.rollback_to_start();
        self.stream_pos = start.pos;
        self.literal.truncate(start.literal_len);
        self.current = None;
        self.search_group = self.tag_stack.top().expect("root frame never pops").candidates.clone();

        // Skip exactly the byte this candidate started on
        // without re-examining it as a match start, so the
        // window can't immediately reopen at the same position
        // and loop forever.
        self.read_byte()?;

        Ok(())
    }

    fn flush_literal_up_to(&mut self, target: StreamPosition, sink: &mut Sink<'_>) -> Result<(), ScanError>
    {
        let n = target.char_pos - self.flush_base.char_pos;

        if n > 0
        {
            let bytes: Vec<u8> = self.literal.drain(..n).collect();
            self.emit(&bytes, sink)?;
        }

        self.flush_base = target;

        Ok(())
    }

    fn emit(&mut self, bytes: &[u8], sink: &mut Sink<'_>) -> Result<(), ScanError>
    {
        if bytes.is_empty()
        {
            return Ok(());
        }

        match self.processing_stack.top_mut()
        {
            Some(top) => top.buffer.extend_with(bytes),
            None =>
            {
                self.root_buffer.extend_with(bytes);
                self.flush_root(sink)?;
            },
        }

        Ok(())
    }

    fn flush_root(&mut self, sink: &mut Sink<'_>) -> Result<(), ScanError>
    {
        if self.root_buffer.is_empty()
        {
            return Ok(());
        }

        let bytes: Vec<u8> = self.root_buffer.segments().flatten().copied().collect();
        sink.write(&bytes)?;
        self.root_buffer.empty();

        Ok(())
    }

    fn pop_processing(&mut self, sink: &mut Sink<'_>, user_data: &mut dyn Any) -> Result<(), ScanError>
    {
        dispatch::pop(
            &mut self.processing_stack,
            &mut self.root_buffer,
            self.messages,
            self.flags,
            self.error_output,
            user_data,
        )?;
        self.flush_root(sink)
    }

    /// The deepest recorded complete match is now final: flush
    /// the literal text before it, then act on what kind of tag
    /// it is.
    fn fire(&mut self, sink: &mut Sink<'_>, user_data: &mut dyn Any) -> Result<(), ScanError>
    {
        let most_recent = self.most_recent.take().expect("fire called with a recorded match");
        let start = self.candidate_start.take().expect("fire called inside an active window");

        self.flush_literal_up_to(start.pos, sink)?;

        let end_pos = most_recent.position;
        let tag_bytes: Vec<u8> = std::mem::take(&mut self.literal);
        self.flush_base = end_pos;

        let location = StreamLocation::new(start.pos, end_pos);
        let node = most_recent.tag;

        if !node.children.borrow().nodes.is_empty()
        {
            self.fire_opener(node, location, &tag_bytes, sink, user_data)?;
        }
        else if node.closing
        {
            self.fire_closer(node, &tag_bytes, sink, user_data)?;
        }
        else
        {
            // A plain escape: its own matched text passes
            // through verbatim, no stack change.
            self.emit(&tag_bytes, sink)?;
        }

        Ok(())
    }

    fn fire_opener(
        &mut self,
        node: FiredTag,
        location: StreamLocation,
        tag_bytes: &[u8],
        sink: &mut Sink<'_>,
        user_data: &mut dyn Any,
    ) -> Result<(), ScanError>
    {
        let is_continuation = node.flags.contains(TagFlags::CONTINUATION);
        let mut pending_error = None;
        let mut push_new_entry = true;

        if is_continuation && node.processing_info.is_some()
        {
            let gap_open = self.processing_stack.top().map(|t| t.is_continuation).unwrap_or(false);

            if gap_open
            {
                let underlying_pi = self.processing_stack.second_from_top().and_then(|p| p.processing_info.clone());
                let outcome = dispatch::decide_continuation(underlying_pi.as_ref(), node.processing_info.as_ref(), self.flags);

                // Pop the continuation gap: runs its (possibly
                // absent) continuation modifier and folds the
                // gap text back into the now-exposed region.
                self.pop_processing(sink, user_data)?;

                match outcome
                {
                    dispatch::ContinuationOutcome::Merge =>
                    {
                        if let Some(top) = self.processing_stack.top_mut()
                        {
                            top.locations.push(location);
                        }

                        push_new_entry = false;
                    },
                    dispatch::ContinuationOutcome::Mismatch =>
                    {
                        if self.flags.contains(Flags::ON_CONTINUATION_MISMATCHED_TAG_ERROR)
                        {
                            pending_error = Some(NonFatalErrorKind::ContinuationMismatchedOpening);

                            if let Some(top) = self.processing_stack.top_mut()
                            {
                                top.set_error(NonFatalErrorKind::ContinuationMismatchedClosing);
                            }
                        }

                        // The region the gap sat on is not being
                        // continued after all: close it out for
                        // real too.
                        self.pop_processing(sink, user_data)?;
                    },
                }
            }
            else if self.flags.contains(Flags::ON_CONTINUATION_UNMATCHED_TAG_ERROR)
            {
                pending_error = Some(NonFatalErrorKind::ContinuationUnmatchedOpening);
            }
        }

        self.tag_stack.push(TagStackEntry {
            processing_info: node.processing_info.clone(),
            candidates: node.children.clone(),
            is_continuation,
        });

        match node.processing_info
        {
            Some(info) if push_new_entry =>
            {
                let mut entry = ProcessingStackEntry::new(Some(info), false);
                entry.opened_at_depth = self.tag_stack.len();
                entry.locations.push(location);

                if let Some(err) = pending_error
                {
                    entry.set_error(err);
                }

                self.processing_stack.push(entry);
            },
            // Merge case: the existing (now re-exposed) entry
            // from before the gap is reused, nothing to push.
            Some(_) =>
            {},
            // Escape-with-children case: its own text is
            // literal, written into whatever buffer is
            // currently active; no processing entry at all.
            None =>
            {
                self.emit(tag_bytes, sink)?;
            },
        }

        self.search_group = node.children;
        self.current = None;

        Ok(())
    }

    fn fire_closer(
        &mut self,
        node: FiredTag,
        tag_bytes: &[u8],
        sink: &mut Sink<'_>,
        user_data: &mut dyn Any,
    ) -> Result<(), ScanError>
    {
        let matches_frame = self
            .processing_stack
            .top()
            .map(|t| t.opened_at_depth == self.tag_stack.len())
            .unwrap_or(false);

        if matches_frame
        {
            let (is_continuation, late_ok, continuation_modifier) = {
                let top = self.processing_stack.top().expect("matches_frame true");

                (
                    node.flags.contains(TagFlags::CONTINUATION),
                    top.error.is_none() || self.flags.contains(Flags::ON_CONTINUATION_ALLOW_LATE_ERROR_OUTPUT),
                    top.processing_info.as_ref().and_then(|pi| pi.continuation_modifier.clone()),
                )
            };

            self.tag_stack.pop();

            if is_continuation && late_ok
            {
                let mut gap_info = ProcessingInfo::new();
                gap_info.self_modifier = continuation_modifier;

                let mut gap = ProcessingStackEntry::new(Some(Rc::new(gap_info)), true);
                gap.opened_at_depth = self.tag_stack.len();

                self.processing_stack.push(gap);
            }
            else
            {
                self.pop_processing(sink, user_data)?;
            }
        }
        else
        {
            // This closer belongs to an unrelated, still-open
            // nested escape group: it's just literal text here.
            self.emit(tag_bytes, sink)?;
            self.tag_stack.pop();
        }

        self.search_group = self.tag_stack.top().expect("root frame never pops").candidates.clone();
        self.current = None;

        Ok(())
    }

    /// At end of stream, any still-open processing entries never
    /// saw their closer: mark them (if the relevant flag is set)
    /// and unwind them from innermost to outermost.
    fn unwind_open_regions(&mut self, sink: &mut Sink<'_>, user_data: &mut dyn Any) -> Result<(), ScanError>
    {
        while !self.processing_stack.is_empty()
        {
            if self.flags.contains(Flags::ON_UNCLOSED_TAG_ERROR)
            {
                if let Some(top) = self.processing_stack.top_mut()
                {
                    top.set_error(NonFatalErrorKind::UnclosedTag);
                }
            }

            self.pop_processing(sink, user_data)?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests
{
    use std::io::Cursor;

    use cfg_if::cfg_if;
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::grammar::{Tag, TagGroup};

    cfg_if! {
        if #[cfg(feature = "test_buffer_large")]
        {
            const EXTRA_BLOCK_SIZE: usize = 4 * 1024;
        }
        else if #[cfg(feature = "test_buffer_medium")]
        {
            const EXTRA_BLOCK_SIZE: usize = 97;
        }
        else if #[cfg(feature = "test_buffer_small")]
        {
            const EXTRA_BLOCK_SIZE: usize = 1;
        }
        else
        {
            const EXTRA_BLOCK_SIZE: usize = 64;
        }
    }

    /// `<? ... ?>` with no nested tags, no hooks: a minimal
    /// grammar useful for driver-level tests that don't care
    /// about transforms.
    fn bare_code_grammar() -> TrieGroupHandle
    {
        let closing = TagGroup::new();
        closing.borrow_mut().push(Tag::new("?>")).unwrap();

        let root = TagGroup::new();
        root.borrow_mut()
            .push(Tag::new("<?").with_closing(closing).with_processing_info(Rc::new(ProcessingInfo::new())))
            .unwrap();

        crate::grammar::trie::optimize(root, None).unwrap()
    }

    fn identity_scanner() -> Scanner
    {
        Scanner::new(bare_code_grammar())
    }

    fn run_to_string(scanner: &Scanner, input: &str) -> String
    {
        let mut output = Vec::new();
        let mut user_data = ();

        scanner.run(Cursor::new(input.as_bytes().to_vec()), &mut output, &mut user_data).unwrap();

        String::from_utf8(output).unwrap()
    }

    #[test]
    fn plain_literal_text_passes_through_unchanged()
    {
        let scanner = identity_scanner();

        assert_eq!(run_to_string(&scanner, "hello, world!"), "hello, world!");
    }

    #[test]
    fn region_with_no_self_modifier_passes_its_content_through()
    {
        let scanner = identity_scanner();

        assert_eq!(run_to_string(&scanner, "before <? code ?> after"), "before  code  after");
    }

    #[test]
    fn self_modifier_transforms_the_region_payload()
    {
        let transform: Rc<dyn crate::transform::Transform> =
            Rc::new(|mut input: DataBuffer, _: &crate::position::StreamLocationChain, _: &mut dyn Any| {
                let bytes = input.unify(false).unwrap().to_vec();
                let mut out = DataBuffer::new();
                out.extend_with(&bytes.to_ascii_uppercase());
                crate::transform::TransformOutcome::okay(out)
            });

        let closing = TagGroup::new();
        closing.borrow_mut().push(Tag::new("?>")).unwrap();

        let mut info = ProcessingInfo::new();
        info.self_modifier = Some(transform);

        let root = TagGroup::new();
        root.borrow_mut().push(Tag::new("<?").with_closing(closing).with_processing_info(Rc::new(info))).unwrap();

        let scanner = Scanner::new(crate::grammar::trie::optimize(root, None).unwrap());

        assert_eq!(run_to_string(&scanner, "a <? hi ?> b"), "a  HI  b");
    }

    #[test]
    fn partial_prefix_match_falls_back_to_the_shorter_tag()
    {
        let scanner = identity_scanner();

        // "<?X" starts a candidate match against "<?" but there
        // is nothing further to extend it into ('X' doesn't
        // continue "<?"'s own closing-group trie) -- so the
        // outer `<?` still opens normally and 'X' is the first
        // byte of its (pass-through) body.
        assert_eq!(run_to_string(&scanner, "<?X?>"), "X");
    }

    #[test]
    fn unmatched_open_tag_at_eof_reports_unclosed()
    {
        let scanner = identity_scanner().with_flags(Flags::ON_UNCLOSED_TAG_ERROR | Flags::INLINE_ERRORS);

        assert_eq!(run_to_string(&scanner, "text <? never closed"), "text unclosed tag");
    }

    #[test]
    fn unclosed_tag_without_inline_errors_goes_to_the_error_stream()
    {
        let scanner = identity_scanner().with_flags(Flags::ON_UNCLOSED_TAG_ERROR);

        let mut output = Vec::new();
        let mut errors = Vec::new();
        let mut user_data = ();

        scanner
            .run_with_error_output(
                Cursor::new(b"text <? never closed".to_vec()),
                &mut output,
                crate::block::DEFAULT_BLOCK_SIZE,
                crate::block::DEFAULT_BLOCK_COUNT,
                &mut errors,
                &mut user_data,
            )
            .unwrap();

        assert_eq!(String::from_utf8(output).unwrap(), "text ");
        assert_eq!(String::from_utf8(errors).unwrap(), "unclosed tag");
    }

    #[test]
    fn unclosed_tag_passes_through_when_flag_not_set()
    {
        let scanner = identity_scanner();

        assert_eq!(run_to_string(&scanner, "text <? never closed"), "text  never closed");
    }

    #[test]
    fn nested_quote_hides_closer_from_the_outer_region()
    {
        // An escape-style quote group with no processing info:
        // its own content (including a `?>`-shaped sequence) is
        // inert to the outer code region's closer search.
        let quote_closing = TagGroup::new();
        quote_closing.borrow_mut().push(Tag::new("'")).unwrap();

        let code_closing = TagGroup::new();
        code_closing.borrow_mut().push(Tag::new("?>")).unwrap();

        let quote_opener = TagGroup::new();
        quote_opener.borrow_mut().push(Tag::new("'").with_closing(quote_closing)).unwrap();

        let root = TagGroup::new();
        root.borrow_mut()
            .push(
                Tag::new("<?")
                    .with_closing(code_closing)
                    .with_children(quote_opener)
                    .with_processing_info(Rc::new(ProcessingInfo::new())),
            )
            .unwrap();

        let scanner = Scanner::new(crate::grammar::trie::optimize(root, None).unwrap());

        assert_eq!(run_to_string(&scanner, "<? say('?>') ?>end"), " say('?>') end");
    }

    #[test]
    fn identical_output_across_block_sizes()
    {
        let scanner = identity_scanner();
        let text = "alpha <? one ?> beta <? two ?> gamma, unclosed tail <? never";

        for block_size in [1usize, 2, 3, 7, EXTRA_BLOCK_SIZE]
        {
            let mut output = Vec::new();
            let mut user_data = ();

            scanner
                .run_with_block_size(Cursor::new(text.as_bytes().to_vec()), &mut output, block_size, 2, &mut user_data)
                .unwrap();

            assert_eq!(
                String::from_utf8(output).unwrap(),
                "alpha  one  beta  two  gamma, unclosed tail  never",
                "block_size={}",
                block_size
            );
        }
    }

    #[test]
    fn run_nested_returns_a_buffer_instead_of_writing()
    {
        let scanner = identity_scanner();
        let mut user_data = ();

        let mut buffer = scanner.run_nested(Cursor::new(b"x <? y ?> z".to_vec()), &mut user_data).unwrap();

        assert_eq!(buffer.unify(false).unwrap(), b"x  y  z");
    }

    #[test]
    fn matching_continuation_fragments_merge_without_running_the_transform_twice()
    {
        let calls = Rc::new(std::cell::RefCell::new(0usize));
        let calls_clone = calls.clone();

        let transform: Rc<dyn crate::transform::Transform> =
            Rc::new(move |mut input: DataBuffer, _: &crate::position::StreamLocationChain, _: &mut dyn Any| {
                *calls_clone.borrow_mut() += 1;
                let bytes = input.unify(false).unwrap().to_vec();
                let mut out = DataBuffer::new();
                out.extend_with(&bytes);
                crate::transform::TransformOutcome::okay(out)
            });

        let mut info = ProcessingInfo::new();
        info.self_modifier = Some(transform);
        let info = Rc::new(info);

        let opener_closing = TagGroup::new();
        opener_closing.borrow_mut().push(Tag::new("?>").with_flags(TagFlags::CONTINUATION)).unwrap();

        let reopener_closing = TagGroup::new();
        reopener_closing.borrow_mut().push(Tag::new("?>").with_flags(TagFlags::CONTINUATION)).unwrap();

        let root = TagGroup::new();
        root.borrow_mut()
            .push(
                Tag::new("<?")
                    .with_flags(TagFlags::CONTINUATION)
                    .with_closing(opener_closing)
                    .with_processing_info(info.clone()),
            )
            .unwrap();
        root.borrow_mut()
            .push(
                Tag::new("<?...")
                    .with_flags(TagFlags::CONTINUATION)
                    .with_closing(reopener_closing)
                    .with_processing_info(info),
            )
            .unwrap();

        let scanner = Scanner::new(crate::grammar::trie::optimize(root, None).unwrap());

        let out = run_to_string(&scanner, "a<? one ?>between<?... two ?>b");

        assert_eq!(out, "a one between two b");
        assert_eq!(*calls.borrow(), 1, "the merged fragments should run through self_modifier exactly once");
    }
}
