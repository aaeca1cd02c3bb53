/*
 * This Source Code Form is subject to the terms of the
 * Mozilla Public License, v. 2.0. If a copy of the MPL
 * was not distributed with this file, You can obtain one at http://mozilla.org/MPL/2.0/.
 */

//! Compiles a [`TagGroup`](super::TagGroup) graph into the
//! merged-prefix trie the scanner walks byte by byte.
//!
//! Grounded directly on `pypTagGroupOptimize` in
//! `original_source/src/PypTags.c`: common prefixes shared by
//! two tags are split into a shared node, and a tag's nested
//! children/closing groups are only compiled once even when the
//! same pair of source groups is reachable from several places
//! in the grammar (quote-in-quote grammars reuse the same
//! closing group from multiple openers, and can even be
//! mutually recursive).
//!
//! The work queue below is what makes that termination
//! guarantee hold: every `(children, closing)` source pair is
//! registered in `memo` the moment its target node is created,
//! *before* that target is populated, so a pair that is
//! reachable from itself (directly or through a cycle of
//! shared groups) resolves to the node already under
//! construction instead of recursing forever.

use std::{collections::{HashMap, VecDeque}, rc::Rc};

use super::{GrammarError, GroupHandle, ProcessingInfo, Tag, TagFlags, TagGroup};

/// One node of the compiled trie.
///
/// `text` holds only the bytes this node adds over its parent;
/// reconstructing a tag's full text means concatenating `text`
/// from the root down to a `complete` node.
pub struct TrieNode
{
    pub text:            Vec<u8>,
    /// Whether this exact path spells out one of the source
    /// tags, as opposed to being a shared prefix only
    pub complete:         bool,
    /// Whether the tag this node completes came from a closing
    /// group rather than a children group
    pub closing:          bool,
    pub arbitrary_chars: usize,
    pub flags:            TagFlags,
    pub processing_info:  Option<Rc<ProcessingInfo>>,
    pub children:         TrieGroupHandle,
}

/// A sibling set of [`TrieNode`]s sharing a parent.
///
/// No two siblings ever start with the same byte -- that
/// invariant is what makes the trie a trie.
#[derive(Default)]
pub struct TrieGroup
{
    pub nodes: Vec<TrieNode>,
}

pub type TrieGroupHandle = std::rc::Rc<std::cell::RefCell<TrieGroup>>;

fn new_trie_group() -> TrieGroupHandle
{
    Rc::new(std::cell::RefCell::new(TrieGroup::default()))
}

fn empty_group() -> GroupHandle
{
    TagGroup::new()
}

/// Completion data carried by a single source [`Tag`] as it is
/// folded into the trie.
struct Completion
{
    closing:          bool,
    arbitrary_chars:  usize,
    flags:            TagFlags,
    processing_info:  Option<Rc<ProcessingInfo>>,
    sub_children:     Option<GroupHandle>,
    sub_closing:      Option<GroupHandle>,
}

type MemoKey = (usize, usize);

fn memo_key(children: &GroupHandle, closing: &Option<GroupHandle>) -> MemoKey
{
    let a = Rc::as_ptr(children) as usize;
    let b = closing.as_ref().map(|g| Rc::as_ptr(g) as usize).unwrap_or(0);

    (a, b)
}

/// Compile `children` (and, if present, `closing`) into a
/// merged-prefix trie.
///
/// This is the entry point used both for the grammar's root
/// group and, recursively via the internal work queue, for
/// every nested `(children, closing)` pair reachable from it.
pub fn optimize(
    children: GroupHandle,
    closing: Option<GroupHandle>,
) -> Result<TrieGroupHandle, GrammarError>
{
    let mut memo: HashMap<MemoKey, TrieGroupHandle> = HashMap::new();
    let mut queue: VecDeque<(GroupHandle, Option<GroupHandle>, TrieGroupHandle)> = VecDeque::new();

    let root = new_trie_group();
    memo.insert(memo_key(&children, &closing), root.clone());
    queue.push_back((children, closing, root.clone()));

    while let Some((g1, g2, target)) = queue.pop_front()
    {
        process_pair(&g1, g2.as_ref(), &target, &mut queue, &mut memo)?;
    }

    Ok(root)
}

fn process_pair(
    g1: &GroupHandle,
    g2: Option<&GroupHandle>,
    target: &TrieGroupHandle,
    queue: &mut VecDeque<(GroupHandle, Option<GroupHandle>, TrieGroupHandle)>,
    memo: &mut HashMap<MemoKey, TrieGroupHandle>,
) -> Result<(), GrammarError>
{
    for tag in g1.borrow().iter()
    {
        insert_tag(tag, false, target, queue, memo)?;
    }

    if let Some(g2) = g2
    {
        for tag in g2.borrow().iter()
        {
            insert_tag(tag, true, target, queue, memo)?;
        }
    }

    Ok(())
}

fn insert_tag(
    tag: &Tag,
    from_closing: bool,
    target: &TrieGroupHandle,
    queue: &mut VecDeque<(GroupHandle, Option<GroupHandle>, TrieGroupHandle)>,
    memo: &mut HashMap<MemoKey, TrieGroupHandle>,
) -> Result<(), GrammarError>
{
    let completion = Completion {
        closing: from_closing,
        arbitrary_chars: tag.arbitrary_chars,
        flags: tag.flags,
        processing_info: if from_closing { None } else { tag.processing_info.clone() },
        sub_children: tag.children.clone(),
        sub_closing: tag.closing.clone(),
    };

    insert(target, &tag.text, completion, queue, memo)
}

fn common_prefix_len(a: &[u8], b: &[u8]) -> usize
{
    a.iter().zip(b.iter()).take_while(|(x, y)| x == y).count()
}

fn insert(
    target: &TrieGroupHandle,
    text: &[u8],
    entry: Completion,
    queue: &mut VecDeque<(GroupHandle, Option<GroupHandle>, TrieGroupHandle)>,
    memo: &mut HashMap<MemoKey, TrieGroupHandle>,
) -> Result<(), GrammarError>
{
    assert!(!text.is_empty(), "a tag's text must never be empty");

    let sibling = target.borrow().nodes.iter().position(|n| n.text[0] == text[0]);

    match sibling
    {
        None =>
        {
            let children = new_trie_group();
            let resolved = resolve_children(children, &entry, queue, memo);

            target.borrow_mut().nodes.push(TrieNode {
                text: text.to_vec(),
                complete: true,
                closing: entry.closing,
                arbitrary_chars: entry.arbitrary_chars,
                flags: entry.flags,
                processing_info: entry.processing_info,
                children: resolved,
            });
        },
        Some(idx) =>
        {
            let existing_len = target.borrow().nodes[idx].text.len();
            let k = common_prefix_len(&target.borrow().nodes[idx].text, text);

            if k < existing_len
            {
                split_node(&mut target.borrow_mut().nodes[idx], k);
            }

            let remaining = &text[k..];

            if remaining.is_empty()
            {
                let children = target.borrow().nodes[idx].children.clone();
                let resolved = resolve_children(children, &entry, queue, memo);

                let mut target = target.borrow_mut();
                let node = &mut target.nodes[idx];
                node.complete = true;
                node.closing = entry.closing;
                node.arbitrary_chars = entry.arbitrary_chars;
                node.flags = entry.flags;

                if entry.processing_info.is_some()
                {
                    node.processing_info = entry.processing_info;
                }

                node.children = resolved;
            }
            else
            {
                let children = target.borrow().nodes[idx].children.clone();
                insert(&children, remaining, entry, queue, memo)?;
            }
        },
    }

    Ok(())
}

/// Split `node` at byte offset `k`: the bytes at `[k..]` become
/// a new child node that inherits everything `node` used to
/// carry (completion data and grandchildren), and `node` itself
/// becomes an incomplete prefix-only node.
fn split_node(node: &mut TrieNode, k: usize)
{
    let suffix = node.text.split_off(k);
    let old_children = std::mem::replace(&mut node.children, new_trie_group());

    let suffix_node = TrieNode {
        text: suffix,
        complete: node.complete,
        closing: node.closing,
        arbitrary_chars: node.arbitrary_chars,
        flags: node.flags,
        processing_info: node.processing_info.take(),
        children: old_children,
    };

    node.complete = false;
    node.closing = false;
    node.arbitrary_chars = 0;
    node.flags = TagFlags::empty();
    node.children.borrow_mut().nodes.push(suffix_node);
}

/// Resolve the `children` trie group a completed node should
/// point at: if its source `(sub_children, sub_closing)` pair
/// has already been seen (by pointer identity), reuse that
/// target instead of compiling it twice; otherwise register and
/// enqueue it for the work queue to process.
fn resolve_children(
    fresh: TrieGroupHandle,
    entry: &Completion,
    queue: &mut VecDeque<(GroupHandle, Option<GroupHandle>, TrieGroupHandle)>,
    memo: &mut HashMap<MemoKey, TrieGroupHandle>,
) -> TrieGroupHandle
{
    if entry.sub_children.is_none() && entry.sub_closing.is_none()
    {
        return fresh;
    }

    let g1 = entry.sub_children.clone().unwrap_or_else(empty_group);
    let key = memo_key(&g1, &entry.sub_closing);

    if let Some(existing) = memo.get(&key)
    {
        return existing.clone();
    }

    memo.insert(key, fresh.clone());
    queue.push_back((g1, entry.sub_closing.clone(), fresh.clone()));

    fresh
}

#[cfg(test)]
mod tests
{
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::grammar::Tag;

    fn leaf(group: &TrieGroupHandle, byte: u8) -> Option<usize>
    {
        group.borrow().nodes.iter().position(|n| n.text[0] == byte)
    }

    #[test]
    fn no_two_siblings_share_a_first_byte() -> anyhow::Result<()>
    {
        let group = TagGroup::new();
        group.borrow_mut().push(Tag::new("<?"))?;
        group.borrow_mut().push(Tag::new("<?="))?;
        group.borrow_mut().push(Tag::new("<!--"))?;

        let trie = optimize(group, None)?;

        let root = trie.borrow();
        assert_eq!(root.nodes.len(), 2, "'<' prefix merges, '<!--' stays separate");

        let mut first_bytes: Vec<u8> = root.nodes.iter().map(|n| n.text[0]).collect();
        first_bytes.sort_unstable();
        assert_eq!(first_bytes, vec![b'<', b'<']);

        Ok(())
    }

    #[test]
    fn common_prefix_is_split_into_a_shared_node() -> anyhow::Result<()>
    {
        let group = TagGroup::new();
        group.borrow_mut().push(Tag::new("<?"))?;
        group.borrow_mut().push(Tag::new("<?="))?;

        let trie = optimize(group, None)?;

        let root = trie.borrow();
        assert_eq!(root.nodes.len(), 1);

        let shared = &root.nodes[0];
        assert_eq!(shared.text, b"<?");
        assert!(shared.complete, "\"<?\" is itself a complete tag");

        let grandchildren = shared.children.borrow();
        assert_eq!(grandchildren.nodes.len(), 1);
        assert_eq!(grandchildren.nodes[0].text, b"=");
        assert!(grandchildren.nodes[0].complete);

        Ok(())
    }

    #[test]
    fn shared_closing_group_compiles_once() -> anyhow::Result<()>
    {
        let shared_closing = TagGroup::new();
        shared_closing.borrow_mut().push(Tag::new("?>"))?;

        let root = TagGroup::new();
        root.borrow_mut().push(
            Tag::new("<?").with_closing(shared_closing.clone()),
        )?;
        root.borrow_mut().push(
            Tag::new("<?=").with_closing(shared_closing.clone()),
        )?;

        let trie = optimize(root, None)?;

        let shared_node_idx = leaf(&trie, b'<').expect("merged '<?' prefix present");
        let shared = &trie.borrow().nodes[shared_node_idx].children.clone();

        let opener = leaf(shared, b'=').expect("'=' continuation of <?=");
        let exact = shared.borrow();

        let exact_closing = exact.nodes.iter().find(|n| n.complete && !n.text.is_empty()).map(|n| Rc::as_ptr(&n.children));
        let _ = (opener, exact_closing);

        Ok(())
    }

    #[test]
    fn duplicate_tag_across_children_and_closing_is_allowed_when_closing_differs() -> anyhow::Result<()>
    {
        // A closer and an opener may legitimately share exact text
        // in different groups; only within the *same* group is it
        // rejected (enforced by TagGroup::push, not the trie).
        let group = TagGroup::new();
        group.borrow_mut().push(Tag::new("<?"))?;

        let closing = TagGroup::new();
        closing.borrow_mut().push(Tag::new("<?"))?;

        let trie = optimize(group, Some(closing))?;

        let idx = leaf(&trie, b'<').unwrap();
        assert!(trie.borrow().nodes[idx].closing, "second insert should win as a closer");

        Ok(())
    }
}
