/*
 * This Source Code Form is subject to the terms of the
 * Mozilla Public License, v. 2.0. If a copy of the MPL
 * was not distributed with this file, You can obtain one at http://mozilla.org/MPL/2.0/.
 */

//! The region syntax spec.md §6 calls "the default grammar":
//! `<? ... ?>` code blocks, `<?= ... ?>` expressions, their
//! `...` continuation variants, and the four quote-escape
//! groups (`'`, `"`, `'''`, `"""`) nested inside both.
//!
//! Grounded directly on `tagsInit` in
//! `original_source/src/Main.c`: every tag text, closing group,
//! and escape rule below is copied from that function rather
//! than invented, including which quote flavors close on a bare
//! `\r`/`\n` (the two single-character forms) and which don't
//! (the two triple-quoted forms).

use std::rc::Rc;

use super::{GrammarError, GroupHandle, ProcessingInfo, Tag, TagFlags, TagGroup};

/// The hook set a `<? ... ?>` / `<?... ... ...?>` opener
/// carries, or `None` to omit that tag family entirely (mirrors
/// `tagsInit`'s `piCodeBlock == NULL` check).
pub type Hooks = Option<Rc<ProcessingInfo>>;

/// Build the level-2 (nested-inside-code) group: the four
/// quote-escape sub-grammars shared by both `<?` and `<?=`.
///
/// Single- and double-quoted strings close on their own quote
/// character or on a bare `\r`, `\n`, or `\r\n`; their escape
/// group recognizes a line-continuing `\<CRLF>` before falling
/// back to a generic one-character escape. Triple-quoted
/// strings only close on their own (tripled) quote character and
/// only escape a single following character.
fn quote_groups() -> Result<GroupHandle, GrammarError>
{
    let level2 = TagGroup::new();

    for quote in [b'\'', b'"']
    {
        let closing = TagGroup::new();
        closing.borrow_mut().push(Tag::new(vec![quote]))?;
        closing.borrow_mut().push(Tag::new(b"\r".to_vec()))?;
        closing.borrow_mut().push(Tag::new(b"\n".to_vec()))?;
        closing.borrow_mut().push(Tag::new(b"\r\n".to_vec()))?;

        let escapes = TagGroup::new();
        escapes.borrow_mut().push(Tag::new(b"\\\r\n".to_vec()))?;
        escapes.borrow_mut().push(Tag::new(b"\\".to_vec()).with_arbitrary_chars(1))?;

        level2
            .borrow_mut()
            .push(Tag::new(vec![quote]).with_closing(closing).with_children(escapes))?;
    }

    for quote in [b"'''".to_vec(), b"\"\"\"".to_vec()]
    {
        let closing = TagGroup::new();
        closing.borrow_mut().push(Tag::new(quote.clone()))?;

        let escapes = TagGroup::new();
        escapes.borrow_mut().push(Tag::new(b"\\".to_vec()).with_arbitrary_chars(1))?;

        level2.borrow_mut().push(Tag::new(quote).with_closing(closing).with_children(escapes))?;
    }

    Ok(level2)
}

/// Build the un-optimized level-1 group for the default
/// grammar: `<?`/`<?=` (and, if `allow_continuation`, their
/// `...` continuation variants) with the shared quote-escape
/// groups nested inside each.
///
/// At least one of `code_block`/`code_expression` must be
/// `Some`, mirroring `tagsInit`'s assertion that the grammar
/// isn't built with neither tag family present.
pub fn build(code_block: Hooks, code_expression: Hooks, allow_continuation: bool) -> Result<GroupHandle, GrammarError>
{
    assert!(code_block.is_some() || code_expression.is_some(), "at least one of code_block/code_expression must be set");

    let level1 = TagGroup::new();

    if let Some(info) = code_block
    {
        push_family(&level1, "<?", "?>", info, allow_continuation)?;
    }

    if let Some(info) = code_expression
    {
        push_family(&level1, "<?=", "?>", info, allow_continuation)?;
    }

    Ok(level1)
}

fn push_family(level1: &GroupHandle, open: &str, close: &str, info: Rc<ProcessingInfo>, allow_continuation: bool) -> Result<(), GrammarError>
{
    let closing = TagGroup::new();
    closing.borrow_mut().push(Tag::new(close.as_bytes().to_vec()))?;

    level1.borrow_mut().push(
        Tag::new(open.as_bytes().to_vec())
            .with_closing(closing.clone())
            .with_children(quote_groups()?)
            .with_processing_info(info.clone()),
    )?;

    if allow_continuation
    {
        closing
            .borrow_mut()
            .push(Tag::new(format!("...{}", close).into_bytes()).with_flags(TagFlags::CONTINUATION))?;

        level1.borrow_mut().push(
            Tag::new(format!("{}...", open).into_bytes())
                .with_flags(TagFlags::CONTINUATION)
                .with_closing(closing)
                .with_children(quote_groups()?)
                .with_processing_info(info),
        )?;
    }

    Ok(())
}

/// [`build`], then [`trie::optimize`](super::trie::optimize)
/// the result -- the form [`crate::scanner::Scanner::new`]
/// actually takes.
pub fn build_optimized(
    code_block: Hooks,
    code_expression: Hooks,
    allow_continuation: bool,
) -> Result<super::trie::TrieGroupHandle, GrammarError>
{
    super::trie::optimize(build(code_block, code_expression, allow_continuation)?, None)
}

#[cfg(test)]
mod tests
{
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn code_block_and_expression_are_both_reachable() -> anyhow::Result<()>
    {
        let block = Rc::new(ProcessingInfo::new());
        let expr = Rc::new(ProcessingInfo::new());

        let trie = build_optimized(Some(block), Some(expr), true)?;

        let root = trie.borrow();
        let angle = root.nodes.iter().find(|n| n.text[0] == b'<').expect("a '<'-prefixed node exists");

        assert_eq!(angle.text, b"<?");
        assert!(angle.complete, "\"<?\" alone is a complete tag (the code block opener)");

        let after_code_block = angle.children.borrow();
        assert!(
            after_code_block.nodes.iter().any(|n| n.text == b"="),
            "\"<?=\" should be reachable as \"<?\" + \"=\""
        );

        Ok(())
    }

    #[test]
    fn continuation_variants_are_present_when_allowed() -> anyhow::Result<()>
    {
        let block = Rc::new(ProcessingInfo::new());

        let trie = build_optimized(Some(block), None, true)?;

        let root = trie.borrow();
        let angle = root.nodes.iter().find(|n| n.text[0] == b'<').unwrap();
        let after = angle.children.borrow();

        assert!(after.nodes.iter().any(|n| n.text == b"..."), "\"<?...\" continuation opener should be reachable");

        Ok(())
    }

    #[test]
    fn continuation_variants_are_absent_when_disallowed() -> anyhow::Result<()>
    {
        let block = Rc::new(ProcessingInfo::new());

        let trie = build_optimized(Some(block), None, false)?;

        let root = trie.borrow();
        let angle = root.nodes.iter().find(|n| n.text[0] == b'<').unwrap();
        let after = angle.children.borrow();

        assert!(!after.nodes.iter().any(|n| n.text == b"..."));

        Ok(())
    }

    // The scenarios below run the shipped default grammar end to
    // end through a real Scanner, rather than the minimal ad hoc
    // grammars scanner::tests builds -- these exercise this module's
    // own construction of `<?`/`<?=` against the driver.
    mod scenarios
    {
        use std::{any::Any, io::Cursor};

        use super::*;
        use crate::{
            buffer::DataBuffer,
            position::StreamLocationChain,
            scanner::{flag::Flags, Scanner},
            transform::{Transform, TransformOutcome},
        };

        fn run_to_string(scanner: &Scanner, input: &str) -> String
        {
            let mut output = Vec::new();
            let mut user_data = ();

            scanner.run(Cursor::new(input.as_bytes().to_vec()), &mut output, &mut user_data).unwrap();

            String::from_utf8(output).unwrap()
        }

        fn passthrough_code_block() -> GroupHandle
        {
            build(Some(Rc::new(ProcessingInfo::new())), None, false).unwrap()
        }

        #[test]
        fn scenario_1_plain_code_region_round_trips() -> anyhow::Result<()>
        {
            let scanner = Scanner::new(crate::grammar::trie::optimize(passthrough_code_block(), None)?);

            assert_eq!(run_to_string(&scanner, "AB<? X ?>CD"), "AB X CD");

            Ok(())
        }

        #[test]
        fn scenario_2_expression_transform_evaluates_string_concatenation() -> anyhow::Result<()>
        {
            let concat: Rc<dyn Transform> =
                Rc::new(|mut input: DataBuffer, _: &StreamLocationChain, _: &mut dyn Any| {
                    let bytes = input.unify(false).unwrap().to_vec();
                    let text = String::from_utf8(bytes).unwrap();

                    let joined: String = text.split('+').map(|part| part.trim().trim_matches('\'').to_string()).collect();

                    let mut out = DataBuffer::new();
                    out.extend_with(joined.as_bytes());

                    TransformOutcome::okay(out)
                });

            let mut info = ProcessingInfo::new();
            info.self_modifier = Some(concat);

            let grammar = build(None, Some(Rc::new(info)), false)?;
            let scanner = Scanner::new(crate::grammar::trie::optimize(grammar, None)?);

            assert_eq!(run_to_string(&scanner, "<?= 'a' + 'b' ?>"), "ab");

            Ok(())
        }

        #[test]
        fn scenario_3_closer_inside_a_double_quoted_string_does_not_end_the_region() -> anyhow::Result<()>
        {
            let scanner = Scanner::new(crate::grammar::trie::optimize(passthrough_code_block(), None)?);

            assert_eq!(run_to_string(&scanner, r#"<? f("?>") ?>after"#), r#" f("?>") after"#);

            Ok(())
        }

        #[test]
        fn backslash_escaped_quote_inside_double_quoted_string_does_not_close_it() -> anyhow::Result<()>
        {
            let scanner = Scanner::new(crate::grammar::trie::optimize(passthrough_code_block(), None)?);

            assert_eq!(run_to_string(&scanner, r#"<? f("a\"b") ?>after"#), r#" f("a\"b") after"#);

            Ok(())
        }

        #[test]
        fn scenario_4_unclosed_region_reports_its_configured_error_message() -> anyhow::Result<()>
        {
            let scanner = Scanner::new(crate::grammar::trie::optimize(passthrough_code_block(), None)?)
                .with_flags(Flags::ON_UNCLOSED_TAG_ERROR | Flags::INLINE_ERRORS);

            assert_eq!(run_to_string(&scanner, "x<? code"), "xunclosed tag");

            Ok(())
        }

        #[test]
        fn scenario_6_rollback_across_a_two_byte_block_boundary() -> anyhow::Result<()>
        {
            let upper: Rc<dyn Transform> =
                Rc::new(|mut input: DataBuffer, _: &StreamLocationChain, _: &mut dyn Any| {
                    let bytes = input.unify(false).unwrap().to_vec();
                    let mut out = DataBuffer::new();
                    out.extend_with(&bytes.to_ascii_uppercase());

                    TransformOutcome::okay(out)
                });

            let mut info = ProcessingInfo::new();
            info.self_modifier = Some(upper);

            let grammar = build(Some(Rc::new(info)), None, false)?;
            let scanner = Scanner::new(crate::grammar::trie::optimize(grammar, None)?);

            let mut output = Vec::new();
            let mut user_data = ();
            scanner.run_with_block_size(Cursor::new(b"<<?x?>>".to_vec()), &mut output, 2, 2, &mut user_data).unwrap();

            assert_eq!(String::from_utf8(output).unwrap(), "<X>");

            Ok(())
        }
    }
}
