/*
 * This Source Code Form is subject to the terms of the
 * Mozilla Public License, v. 2.0. If a copy of the MPL
 * was not distributed with this file, You can obtain one at http://mozilla.org/MPL/2.0/.
 */

//! The pop pipeline and continuation rule from spec §4.H: what
//! happens to a region's collected bytes once its closing tag
//! has fired (or its enclosing region is popped out from under
//! it).
//!
//! Grounded on `pypProcessingStackPopProcess` /
//! `pypProcessingStackModifyDataBuffer` /
//! `pypProcessingStackModifyDataBufferUsingParent` in
//! `original_source/src/PypReader.c`.

use std::{any::Any, io, rc::Rc};

use crate::{
    buffer::DataBuffer,
    grammar::ProcessingInfo,
    position::StreamLocationChain,
    scanner::{
        error::{ScanError, TransformFailure},
        flag::Flags,
        stack::ProcessingStack,
        ErrorMessages,
    },
    transform::{Transform, TransformStatus},
};

fn run(
    transform: &Rc<dyn Transform>,
    input: DataBuffer,
    locations: &StreamLocationChain,
    user_data: &mut dyn Any,
) -> Result<(DataBuffer, TransformStatus), ScanError>
{
    let outcome = transform.apply(input, locations, user_data);

    if outcome.status.is_fatal()
    {
        let failure = match outcome.status
        {
            TransformStatus::ErrorMemory => TransformFailure::Memory,
            TransformStatus::ErrorWrite => TransformFailure::Write,
            _ => unreachable!("is_fatal only returns true for Memory/Write"),
        };

        return Err(ScanError::TransformFailed(failure));
    }

    Ok((outcome.output, outcome.status))
}

/// Pop the top entry off `stack` and run it through the four
/// step pop pipeline from spec §4.H, moving the result into the
/// new stack tail's buffer, or into `root_output` if the popped
/// entry was the outermost region.
///
/// A non-fatal error recorded on the popped entry is handled per
/// [`Flags::INLINE_ERRORS`]: set, the message is substituted for
/// the entry's buffer and continues through the normal
/// parent-hook pipeline below; unset (the default, matching the
/// CLI's default `errorStream != NULL`), the message is written
/// to `error_sink` and the region contributes nothing at all to
/// its parent, mirroring `pypProcessingStackPopProcess` in
/// `original_source/src/PypReader.c` returning immediately on
/// that branch.
///
/// ## Errors
///
/// Propagates a fatal [`ScanError::TransformFailed`] if any
/// invoked transform reports
/// [`TransformStatus::ErrorMemory`]/[`ErrorWrite`], or
/// [`ScanError::Write`] if `error_sink` fails.
///
/// ## Panics
///
/// Panics if `stack` is empty; the scanner driver never pops an
/// entry that wasn't first pushed.
pub fn pop(
    stack: &mut ProcessingStack,
    root_output: &mut DataBuffer,
    messages: &ErrorMessages,
    flags: Flags,
    error_sink: &mut dyn io::Write,
    user_data: &mut dyn Any,
) -> Result<(), ScanError>
{
    let entry = stack.pop().expect("pop called against an empty processing stack");

    let (mut buffer, status) = match entry.error
    {
        None if entry.buffer.is_empty() => (entry.buffer, None),

        None => match entry.processing_info.as_ref().and_then(|info| info.self_modifier.clone())
        {
            Some(transform) =>
            {
                let (output, status) = run(&transform, entry.buffer, &entry.locations, user_data)?;
                (output, Some(status))
            },
            None => (entry.buffer, Some(TransformStatus::Okay)),
        },

        Some(kind) if flags.contains(Flags::INLINE_ERRORS) =>
        {
            let mut replacement = DataBuffer::new();
            replacement.extend_with(messages.get(kind).as_bytes());

            (replacement, Some(TransformStatus::ErrorCodeExecution))
        },

        Some(kind) =>
        {
            error_sink.write_all(messages.get(kind).as_bytes()).map_err(ScanError::Write)?;

            return Ok(());
        },
    };

    if let Some(status) = status
    {
        let hook = stack.top().and_then(|parent| match status
        {
            TransformStatus::Okay => parent.processing_info.as_ref().and_then(|p| p.child_success_modifier.clone()),
            TransformStatus::ErrorCodeExecution if flags.contains(Flags::TREAT_SYNTAX_ERRORS_AS_SUCCESS) => None,
            TransformStatus::ErrorCodeExecution => parent.processing_info.as_ref().and_then(|p| p.child_failure_modifier.clone()),
            _ => None,
        });

        if let Some(transform) = hook
        {
            let (output, _) = run(&transform, buffer, &entry.locations, user_data)?;
            buffer = output;
        }
    }

    match stack.top_mut()
    {
        Some(parent) => parent.buffer.move_from(buffer),
        None => root_output.move_from(buffer),
    }

    Ok(())
}

/// What should happen when a continuation closer `C_cont` is
/// immediately followed by another opener `O'_cont` of a
/// continuation-capable family, relative to the family `O`
/// that's currently open.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContinuationOutcome
{
    /// `O'_cont` belongs to the same family as `O` (directly, or
    /// coerced by
    /// [`O_ON_CONTINUATION_MISMATCHED_TAG_CONTINUE`](super::flag::O_ON_CONTINUATION_MISMATCHED_TAG_CONTINUE)):
    /// merge into the existing region entry, no transform fires
    Merge,

    /// The families differ and coercion isn't enabled: both the
    /// continuation and the region it was continuing are popped
    Mismatch,
}

/// Decide a continuation rule outcome (spec §4.H).
pub fn decide_continuation(
    opener: Option<&Rc<ProcessingInfo>>,
    reopener: Option<&Rc<ProcessingInfo>>,
    flags: Flags,
) -> ContinuationOutcome
{
    let same_family = match (opener, reopener)
    {
        (Some(a), Some(b)) => ProcessingInfo::same_family(a, b),
        (None, None) => true,
        _ => false,
    };

    if same_family || flags.contains(Flags::ON_CONTINUATION_MISMATCHED_TAG_CONTINUE)
    {
        ContinuationOutcome::Merge
    }
    else
    {
        ContinuationOutcome::Mismatch
    }
}
