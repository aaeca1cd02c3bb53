/*
 * This Source Code Form is subject to the terms of the
 * Mozilla Public License, v. 2.0. If a copy of the MPL
 * was not distributed with this file, You can obtain one at http://mozilla.org/MPL/2.0/.
 */

//! The user-supplied tag grammar: the set of opener/closer
//! byte sequences the scanner matches against, plus the
//! transform hooks each opener carries.
//!
//! A grammar is a tree (in general, a graph: see
//! [`trie`](mod@trie)) of [`Tag`]s grouped into [`TagGroup`]s.
//! Before scanning, [`trie::optimize`] compiles a `TagGroup`
//! into the merged-prefix structure the scanner actually walks
//! byte by byte.

pub mod default;
pub mod error;
pub mod trie;

use std::{cell::RefCell, rc::Rc};

use bitflags::bitflags;

pub use self::error::GrammarError;
use crate::transform::Transform;

bitflags! {
    /// Per-tag behavior toggles, independent of the scanner-wide
    /// [`Flags`](crate::scanner::flag::Flags).
    #[derive(Default)]
    pub struct TagFlags: u32 {
        /// This tag is a continuation opener: the region it
        /// starts can be resumed by a later occurrence of the
        /// same family rather than only being closed
        const CONTINUATION = 0b0000_0001;
    }
}

/// A shared handle to a [`TagGroup`].
///
/// Grammars are graphs, not trees: a single closing group (for
/// example, the escape rules shared by several quote-flavored
/// tags) is commonly referenced from more than one [`Tag`], and
/// nested groups can reference an ancestor group to describe
/// quotes-within-quotes. `Rc<RefCell<_>>` is what lets a
/// grammar builder wire that up without `unsafe`.
pub type GroupHandle = Rc<RefCell<TagGroup>>;

/// The four optional transform hooks an opener tag may carry.
///
/// Every field is `None` for a plain, hookless tag. The hooks
/// are shared (`Rc`) rather than owned so that the scanner's
/// continuation rule (spec §4.H) can compare two tags' hook
/// sets by pointer identity to decide whether they belong to
/// the "same family".
#[derive(Clone, Default)]
pub struct ProcessingInfo
{
    /// Invoked on the region's own collected payload when it
    /// closes normally
    pub self_modifier: Option<Rc<dyn Transform>>,

    /// Invoked on a parent region's buffer when one of its
    /// children closed successfully
    pub child_success_modifier: Option<Rc<dyn Transform>>,

    /// Invoked on a parent region's buffer when one of its
    /// children closed with a non-fatal error
    pub child_failure_modifier: Option<Rc<dyn Transform>>,

    /// Invoked on the gap between two continuation fragments of
    /// the same family
    pub continuation_modifier: Option<Rc<dyn Transform>>,
}

impl ProcessingInfo
{
    pub fn new() -> Self
    {
        Self::default()
    }

    /// Whether `self` and `other` were built from the exact
    /// same hook set, i.e. are the "same family" for the
    /// purposes of the continuation rule
    pub fn same_family(this: &Rc<Self>, other: &Rc<Self>) -> bool
    {
        Rc::ptr_eq(this, other)
    }
}

/// A single opener or closer byte sequence in a grammar.
pub struct Tag
{
    pub text:            Vec<u8>,
    /// Number of trailing wildcard bytes this tag's match
    /// consumes greedily (maximal munch) after `text`, before
    /// the scanner commits to it. Zero for an exact tag.
    pub arbitrary_chars: usize,
    pub flags:           TagFlags,
    /// Nested openers scanned for once this tag has matched
    pub children:         Option<GroupHandle>,
    /// The group of tags that close this one
    pub closing:          Option<GroupHandle>,
    /// Present only on opener tags; `None` on pure closers
    pub processing_info:  Option<Rc<ProcessingInfo>>,
}

impl Tag
{
    pub fn new(text: impl Into<Vec<u8>>) -> Self
    {
        Self {
            text: text.into(),
            arbitrary_chars: 0,
            flags: TagFlags::empty(),
            children: None,
            closing: None,
            processing_info: None,
        }
    }

    pub fn with_arbitrary_chars(mut self, n: usize) -> Self
    {
        self.arbitrary_chars = n;
        self
    }

    pub fn with_flags(mut self, flags: TagFlags) -> Self
    {
        self.flags = flags;
        self
    }

    pub fn with_children(mut self, children: GroupHandle) -> Self
    {
        self.children = Some(children);
        self
    }

    pub fn with_closing(mut self, closing: GroupHandle) -> Self
    {
        self.closing = Some(closing);
        self
    }

    pub fn with_processing_info(mut self, info: Rc<ProcessingInfo>) -> Self
    {
        self.processing_info = Some(info);
        self
    }

    pub fn is_continuation(&self) -> bool
    {
        self.flags.contains(TagFlags::CONTINUATION)
    }
}

/// An ordered collection of [`Tag`]s considered for a match at
/// the same point in the scan.
///
/// Order matters only in that the first tag with a given
/// `(text, arbitrary_chars)` wins; adding a second one is a
/// construction error rather than silently shadowed.
#[derive(Default)]
pub struct TagGroup
{
    tags: Vec<Tag>,
}

impl TagGroup
{
    pub fn new() -> GroupHandle
    {
        Rc::new(RefCell::new(Self::default()))
    }

    /// Add `tag` to this group.
    ///
    /// ## Errors
    ///
    /// Returns [`GrammarError::DuplicateTag`] if a tag with the
    /// same `(text, arbitrary_chars)` is already present.
    pub fn push(&mut self, tag: Tag) -> Result<(), GrammarError>
    {
        let duplicate = self
            .tags
            .iter()
            .any(|existing| existing.text == tag.text && existing.arbitrary_chars == tag.arbitrary_chars);

        if duplicate
        {
            return Err(GrammarError::DuplicateTag);
        }

        self.tags.push(tag);

        Ok(())
    }

    pub fn is_empty(&self) -> bool
    {
        self.tags.is_empty()
    }

    pub fn len(&self) -> usize
    {
        self.tags.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Tag>
    {
        self.tags.iter()
    }
}
